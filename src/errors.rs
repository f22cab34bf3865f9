use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use sea_orm::SqlErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error body returned by every failing endpoint
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Insufficient stock for product 7: requested 3, available 1",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

/// Failure classes shared by every workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input; nothing was touched.
    Validation,
    /// A referenced row does not exist (or is not eligible).
    NotFound,
    /// Business precondition failed or a concurrent writer won.
    Conflict,
    /// Missing or rejected credentials.
    Auth,
    /// Persistence or internal failure; details are never exposed.
    Store,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Product with id {0} not found")]
    ProductNotFound(i32),

    #[error("Order item with id {0} not found")]
    OrderItemNotFound(i32),

    #[error("Return {0} not found or not eligible for service center assignment")]
    ReturnNotEligible(i32),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i32,
        requested: i32,
        available: i32,
    },

    #[error("Invalid order set: {0}")]
    InvalidOrderSet(String),

    #[error("Driver {0} is not available")]
    DriverUnavailable(i32),

    #[error("Truck {0} is not available")]
    TruckUnavailable(i32),

    #[error("Return quantity exceeds order item quantity for item {order_item_id}: {requested_total} > {ordered}")]
    ReturnQuantityExceeded {
        order_item_id: i32,
        requested_total: i32,
        ordered: i32,
    },

    #[error("Concurrent update detected: {0}")]
    LostRace(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::DatabaseError(error.into_db_err())
    }

    /// Maps a write failure inside a workflow. A unique-index collision there
    /// means a concurrent request created the same row first.
    pub fn from_write(error: DbErr, context: &str) -> Self {
        match error.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                ServiceError::LostRace(format!("{} was created concurrently", context))
            }
            _ => ServiceError::DatabaseError(error),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::NotFound(_)
            | Self::ProductNotFound(_)
            | Self::OrderItemNotFound(_)
            | Self::ReturnNotEligible(_) => ErrorKind::NotFound,
            Self::InsufficientStock { .. }
            | Self::InvalidOrderSet(_)
            | Self::DriverUnavailable(_)
            | Self::TruckUnavailable(_)
            | Self::ReturnQuantityExceeded { .. }
            | Self::LostRace(_)
            | Self::Conflict(_) => ErrorKind::Conflict,
            Self::Unauthorized(_) | Self::Forbidden(_) => ErrorKind::Auth,
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => ErrorKind::Store,
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            _ => match self.kind() {
                ErrorKind::Validation | ErrorKind::Conflict => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Auth | ErrorKind::Store => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Store failures return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database transaction failed".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.kind() == ErrorKind::Store {
            tracing::error!(error = %self, "request failed with store error");
        }

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}
