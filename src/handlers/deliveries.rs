use super::common::{
    created_response, success_response, validate_input, AppJson, AppPath, AppQuery,
    StatusUpdateRequest,
};
use crate::{
    commands::deliveries::{CreateDeliveryCommand, CreateDeliveryResult, UpdateDeliveryStatusResult},
    errors::ServiceError,
    services::deliveries::DeliveryDetails,
    ApiResponse, AppState,
};
use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

/// Fleet selection for a new delivery, passed in the query string
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DeliveryFleetQuery {
    /// Driver to dispatch
    pub driver_id: Option<i32>,
    /// Truck to dispatch
    pub truck_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDeliveryRequest {
    /// Orders to load onto the truck
    pub order_ids: Vec<i32>,
}

/// Dispatch a driver and truck with a set of orders
#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    tag = "deliveries",
    summary = "Create delivery",
    description = "Claims an available driver and truck and binds the listed unassigned orders to the new delivery.",
    params(DeliveryFleetQuery),
    request_body = CreateDeliveryRequest,
    responses(
        (status = 201, description = "Delivery created", body = ApiResponse<CreateDeliveryResult>),
        (status = 400, description = "Invalid order set or fleet unavailable", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Driver or truck not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<DeliveryFleetQuery>,
    AppJson(payload): AppJson<CreateDeliveryRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let driver_id = query
        .driver_id
        .ok_or_else(|| ServiceError::ValidationError("driverId is required".to_string()))?;
    let truck_id = query
        .truck_id
        .ok_or_else(|| ServiceError::ValidationError("truckId is required".to_string()))?;

    let command = CreateDeliveryCommand {
        driver_id,
        truck_id,
        order_ids: payload.order_ids,
    };
    validate_input(&command)?;

    let created = state.services.deliveries.create_delivery(command).await?;
    info!(
        delivery_id = created.delivery_id,
        orders = created.order_ids.len(),
        "Delivery created via API"
    );

    Ok(created_response(created))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/{id}",
    tag = "deliveries",
    summary = "Get delivery",
    params(("id" = i32, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery found", body = ApiResponse<DeliveryDetails>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let delivery = state.services.deliveries.get_delivery(id).await?;
    Ok(success_response(delivery))
}

/// Update delivery status, releasing the fleet on completion or cancellation
#[utoipa::path(
    put,
    path = "/api/v1/deliveries/{id}/status",
    tag = "deliveries",
    summary = "Update delivery status",
    params(("id" = i32, Path, description = "Delivery ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<UpdateDeliveryStatusResult>),
        (status = 400, description = "Unknown status or delivery already closed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .deliveries
        .update_delivery_status(id, payload.status)
        .await?;
    info!(delivery_id = id, status = %updated.status, "Delivery status updated via API");

    Ok(success_response(updated))
}
