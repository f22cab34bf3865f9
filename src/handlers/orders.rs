use super::common::{
    created_response, success_response, validate_input, AppJson, AppPath, StatusUpdateRequest,
};
use crate::{
    commands::orders::{CreateOrderCommand, CreateOrderResult, UpdateOrderStatusResult},
    errors::ServiceError,
    services::orders::OrderDetails,
    ApiResponse, AppState,
};
use axum::{extract::State, response::IntoResponse};
use tracing::info;

/// Create an order and reserve stock for every line
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    tag = "orders",
    summary = "Create order",
    description = "Creates an order with one line per product. Prices are captured at creation time and stock is decremented in the same transaction; if any line cannot be satisfied nothing is written.",
    request_body = CreateOrderCommand,
    responses(
        (status = 201, description = "Order created", body = ApiResponse<CreateOrderResult>),
        (status = 400, description = "Invalid request or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn create_order(
    State(state): State<AppState>,
    AppJson(payload): AppJson<CreateOrderCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let created = state.services.orders.create_order(payload).await?;
    info!(order_id = created.order_id, "Order created via API");

    Ok(created_response(created))
}

/// Get an order with its lines and returns
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    tag = "orders",
    summary = "Get order",
    params(("id" = i32, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order found", body = ApiResponse<OrderDetails>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn get_order(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.get_order(id).await?;
    Ok(success_response(order))
}

/// Update order status
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    tag = "orders",
    summary = "Update order status",
    params(("id" = i32, Path, description = "Order ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<UpdateOrderStatusResult>),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .orders
        .update_order_status(id, payload.status)
        .await?;
    info!(order_id = id, status = %updated.status, "Order status updated via API");

    Ok(success_response(updated))
}
