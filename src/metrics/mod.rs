/*!
 * # Metrics Module
 *
 * Prometheus registry for workflow outcomes and business counters,
 * exposed in text format at `/metrics`.
 */

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use std::time::Duration;
use thiserror::Error;
use tracing::error;

use crate::errors::{ErrorKind, ServiceError};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> Response {
        error!(error = %self, "metrics export failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

/// Counters tied to fulfillment activity
pub struct BusinessMetrics {
    pub orders_created: IntCounter,
    pub deliveries_created: IntCounter,
    pub returns_processed: IntCounter,
    pub returns_assigned: IntCounter,
    pub status_changes: IntCounterVec,
}

impl BusinessMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self {
            orders_created: IntCounter::new("erp_orders_created_total", "Orders created")?,
            deliveries_created: IntCounter::new(
                "erp_deliveries_created_total",
                "Deliveries dispatched",
            )?,
            returns_processed: IntCounter::new(
                "erp_return_lines_processed_total",
                "Return request lines applied",
            )?,
            returns_assigned: IntCounter::new(
                "erp_returns_assigned_total",
                "Returns routed to a service center",
            )?,
            status_changes: IntCounterVec::new(
                Opts::new("erp_status_changes_total", "Status transitions by entity"),
                &["entity", "status"],
            )?,
        };

        registry.register(Box::new(metrics.orders_created.clone()))?;
        registry.register(Box::new(metrics.deliveries_created.clone()))?;
        registry.register(Box::new(metrics.returns_processed.clone()))?;
        registry.register(Box::new(metrics.returns_assigned.clone()))?;
        registry.register(Box::new(metrics.status_changes.clone()))?;
        Ok(metrics)
    }
}

/// Outcome and latency per workflow
pub struct WorkflowMetrics {
    pub outcomes: IntCounterVec,
    pub duration: HistogramVec,
}

impl WorkflowMetrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let metrics = Self {
            outcomes: IntCounterVec::new(
                Opts::new("erp_workflow_outcomes_total", "Workflow results by class"),
                &["workflow", "outcome"],
            )?,
            duration: HistogramVec::new(
                HistogramOpts::new("erp_workflow_duration_seconds", "Workflow latency"),
                &["workflow"],
            )?,
        };

        registry.register(Box::new(metrics.outcomes.clone()))?;
        registry.register(Box::new(metrics.duration.clone()))?;
        Ok(metrics)
    }

    pub fn record<T>(&self, workflow: &str, elapsed: Duration, result: &Result<T, ServiceError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(e) => outcome_label(e.kind()),
        };
        self.outcomes.with_label_values(&[workflow, outcome]).inc();
        self.duration
            .with_label_values(&[workflow])
            .observe(elapsed.as_secs_f64());
    }
}

fn outcome_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::Validation => "validation",
        ErrorKind::NotFound => "not_found",
        ErrorKind::Conflict => "conflict",
        ErrorKind::Auth => "auth",
        ErrorKind::Store => "store",
    }
}

// Global registry and instances
lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref BUSINESS_METRICS: BusinessMetrics =
        BusinessMetrics::new(&REGISTRY).expect("business metrics can be registered");
    pub static ref WORKFLOW_METRICS: WorkflowMetrics =
        WorkflowMetrics::new(&REGISTRY).expect("workflow metrics can be registered");
}

pub fn export_metrics() -> Result<String, MetricsError> {
    // Touch the statics so every family is registered before the first scrape.
    lazy_static::initialize(&BUSINESS_METRICS);
    lazy_static::initialize(&WORKFLOW_METRICS);

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(|e| MetricsError::ExportError(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| MetricsError::ExportError(e.to_string()))
}

// HTTP endpoint handler for metrics
pub async fn metrics_handler() -> Result<Response, MetricsError> {
    let body = export_metrics()?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_outcomes_are_labelled_by_error_class() {
        let ok: Result<(), ServiceError> = Ok(());
        let conflict: Result<(), ServiceError> = Err(ServiceError::LostRace("truck".into()));

        let before = WORKFLOW_METRICS
            .outcomes
            .with_label_values(&["unit_test", "conflict"])
            .get();
        WORKFLOW_METRICS.record("unit_test", Duration::from_millis(3), &ok);
        WORKFLOW_METRICS.record("unit_test", Duration::from_millis(3), &conflict);

        assert_eq!(
            WORKFLOW_METRICS
                .outcomes
                .with_label_values(&["unit_test", "conflict"])
                .get(),
            before + 1
        );
    }

    #[test]
    fn export_contains_registered_families() {
        BUSINESS_METRICS.orders_created.inc();
        let text = export_metrics().unwrap();
        assert!(text.contains("erp_orders_created_total"));
    }
}
