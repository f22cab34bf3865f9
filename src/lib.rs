//! ERP Fulfillment API Library
//!
//! Orders, deliveries and returns for a warehouse-backed fulfillment system.
//! Every workflow runs as one database transaction behind a role-based gate.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::State,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub auth: Arc<AuthService>,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires services over a shared pool and event channel
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: Arc<events::EventSender>,
        auth: Arc<AuthService>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), event_sender.clone());
        Self {
            db,
            config,
            event_sender,
            auth,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn success_response_outside_request_omits_request_id() {
        let value = serde_json::to_value(ApiResponse::success(7)).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], 7);
        assert!(value["meta"].get("request_id").is_none());
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned API routes, each group behind its permission gate
pub fn api_v1_routes() -> Router<AppState> {
    let orders_create = Router::new()
        .route("/orders", post(handlers::orders::create_order))
        .with_permission(perm::ORDERS_CREATE);

    let orders_read = Router::new()
        .route("/orders/:id", get(handlers::orders::get_order))
        .with_permission(perm::ORDERS_READ);

    let orders_update = Router::new()
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .with_permission(perm::ORDERS_UPDATE_STATUS);

    let deliveries_create = Router::new()
        .route("/deliveries", post(handlers::deliveries::create_delivery))
        .with_permission(perm::DELIVERIES_CREATE);

    let deliveries_read = Router::new()
        .route("/deliveries/:id", get(handlers::deliveries::get_delivery))
        .with_permission(perm::DELIVERIES_READ);

    let deliveries_update = Router::new()
        .route(
            "/deliveries/:id/status",
            put(handlers::deliveries::update_delivery_status),
        )
        .with_permission(perm::DELIVERIES_UPDATE_STATUS);

    let returns_create = Router::new()
        .route("/returns", post(handlers::returns::process_returns))
        .with_permission(perm::RETURNS_CREATE);

    let returns_assign = Router::new()
        .route(
            "/returns/assign-service-center",
            post(handlers::returns::assign_service_center),
        )
        .with_permission(perm::RETURNS_ASSIGN_SERVICE_CENTER);

    let returns_update = Router::new()
        .route(
            "/returns/:id/status",
            put(handlers::returns::update_return_status),
        )
        .with_permission(perm::RETURNS_UPDATE_STATUS);

    let returns_queue = Router::new()
        .route(
            "/returns/service-center-queue",
            get(handlers::returns::service_center_queue),
        )
        .with_permission(perm::RETURNS_READ_QUEUE);

    Router::new()
        .merge(orders_create)
        .merge(orders_read)
        .merge(orders_update)
        .merge(deliveries_create)
        .merge(deliveries_read)
        .merge(deliveries_update)
        .merge(returns_create)
        .merge(returns_assign)
        .merge(returns_update)
        .merge(returns_queue)
}

/// Full application router: health, metrics, docs and the versioned API
pub fn app_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.request_timeout_secs);
    let auth = state.auth.clone();

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_handler))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        .layer(tracing::configure_http_tracing())
        .layer(TimeoutLayer::new(timeout))
        // Auth middleware resolves the AuthService from request extensions
        .layer(Extension(auth))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    let db_status = match db::check_connection(&state.db).await {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}
