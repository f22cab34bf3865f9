#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use erp_api::{
    auth::{AuthConfig, AuthService, Role},
    config::AppConfig,
    db::{self, DbPool},
    entities::{
        driver, product, service_center, truck, DriverStatus, TruckStatus,
    },
    events::{Event, EventSender},
    AppState,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_erp_api_integration_runs_0123";

/// Fresh in-memory database with the full schema applied.
///
/// A single pooled connection keeps every query on the same SQLite memory
/// database for the lifetime of the pool.
pub async fn test_db() -> Arc<DbPool> {
    let pool = db::establish_connection_with_config(&db::DbConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
        ..db::DbConfig::default()
    })
    .await
    .expect("failed to create test database");

    db::run_migrations(&pool)
        .await
        .expect("failed to run migrations in tests");

    Arc::new(pool)
}

/// Event sender whose receiving half the test keeps, so emitted events can be asserted.
pub fn event_channel() -> (Arc<EventSender>, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(256);
    (Arc::new(EventSender::new(tx)), rx)
}

/// Drains whatever the workflows have published so far.
pub fn drain_events(rx: &mut mpsc::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub async fn seed_product(db: &DbPool, name: &str, price: Decimal, stock: i32) -> product::Model {
    product::ActiveModel {
        name: Set(name.to_string()),
        price: Set(price),
        stock_quantity: Set(stock),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed product")
}

pub async fn seed_driver(db: &DbPool, name: &str, status: DriverStatus) -> driver::Model {
    driver::ActiveModel {
        name: Set(name.to_string()),
        status: Set(status.as_str().to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed driver")
}

pub async fn seed_truck(db: &DbPool, plate: &str, status: TruckStatus) -> truck::Model {
    truck::ActiveModel {
        license_plate: Set(plate.to_string()),
        status: Set(status.as_str().to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed truck")
}

pub async fn seed_service_center(db: &DbPool, name: &str) -> service_center::Model {
    service_center::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed service center")
}

/// Helper harness serving the full router over an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub events: mpsc::Receiver<Event>,
    auth_service: Arc<AuthService>,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = test_db().await;
        let (event_sender, events) = event_channel();

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration_secs),
        )));

        let state = AppState::new(db, cfg, event_sender, auth_service.clone());
        let router = erp_api::app_router(state.clone());

        Self {
            router,
            state,
            events,
            auth_service,
        }
    }

    pub fn db(&self) -> &DbPool {
        &self.state.db
    }

    /// Bearer token for a user holding `role`.
    pub fn token(&self, role: Role) -> String {
        self.auth_service
            .issue_token(&format!("{}-user", role.as_str().to_lowercase()), role)
            .expect("issue test token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, &str)],
        token: &str,
    ) -> Response {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {}", token));
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = builder.body(Body::empty()).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for JSON requests made as a given role.
    pub async fn request_as(
        &self,
        role: Role,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let token = self.token(role);
        self.request(method, uri, body, Some(&token)).await
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Decimal fields serialize as strings.
pub fn decimal_field(value: &Value) -> Decimal {
    value
        .as_str()
        .expect("decimal rendered as string")
        .parse()
        .expect("parseable decimal")
}
