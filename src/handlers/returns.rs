use super::common::{
    created_response, success_response, validate_input, AppJson, AppPath, AppQuery,
    StatusUpdateRequest,
};
use crate::{
    commands::returns::{
        AssignServiceCenterCommand, AssignServiceCenterResult, ProcessReturnsCommand,
        ProcessReturnsResult, ReturnRequest, UpdateReturnStatusResult,
    },
    errors::ServiceError,
    services::returns::ServiceCenterQueueEntry,
    ApiResponse, AppState,
};
use axum::{extract::State, response::IntoResponse};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ServiceCenterQueueQuery {
    /// Restrict the queue to one service center
    pub service_center_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceCenterQueue {
    pub entries: Vec<ServiceCenterQueueEntry>,
}

/// Record a batch of returns
#[utoipa::path(
    post,
    path = "/api/v1/returns",
    tag = "returns",
    summary = "Process returns",
    description = "Records one return per order item, merging repeated returns into the existing row. The batch is applied atomically.",
    request_body = Vec<ReturnRequest>,
    responses(
        (status = 201, description = "Returns recorded", body = ApiResponse<ProcessReturnsResult>),
        (status = 400, description = "Invalid request or quantity exceeded", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order item not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn process_returns(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Vec<ReturnRequest>>,
) -> Result<impl IntoResponse, ServiceError> {
    let command = ProcessReturnsCommand::new(payload);
    validate_input(&command)?;

    let processed = state.services.returns.process_returns(command).await?;
    info!(lines = processed.returns.len(), "Returns processed via API");

    Ok(created_response(processed))
}

/// Route a damaged, picked-up return to a service center
#[utoipa::path(
    post,
    path = "/api/v1/returns/assign-service-center",
    tag = "returns",
    summary = "Assign service center",
    request_body = AssignServiceCenterCommand,
    responses(
        (status = 200, description = "Return assigned", body = ApiResponse<AssignServiceCenterResult>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Return not eligible or service center not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn assign_service_center(
    State(state): State<AppState>,
    AppJson(payload): AppJson<AssignServiceCenterCommand>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;

    let assigned = state.services.returns.assign_service_center(payload).await?;
    info!(
        return_id = assigned.return_id,
        service_center_id = assigned.service_center_id,
        "Return assigned via API"
    );

    Ok(success_response(assigned))
}

#[utoipa::path(
    put,
    path = "/api/v1/returns/{id}/status",
    tag = "returns",
    summary = "Update return status",
    params(("id" = i32, Path, description = "Return ID")),
    request_body = StatusUpdateRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<UpdateReturnStatusResult>),
        (status = 400, description = "Unknown status or transition not allowed", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Return not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn update_return_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<StatusUpdateRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state
        .services
        .returns
        .update_return_status(id, payload.status)
        .await?;
    info!(return_id = id, status = %updated.status, "Return status updated via API");

    Ok(success_response(updated))
}

/// Open returns waiting at service centers
#[utoipa::path(
    get,
    path = "/api/v1/returns/service-center-queue",
    tag = "returns",
    summary = "Service center queue",
    params(ServiceCenterQueueQuery),
    responses(
        (status = 200, description = "Queue entries", body = ApiResponse<ServiceCenterQueue>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []))
)]
pub async fn service_center_queue(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ServiceCenterQueueQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let entries = state
        .services
        .returns
        .service_center_queue(query.service_center_id)
        .await?;

    Ok(success_response(ServiceCenterQueue { entries }))
}
