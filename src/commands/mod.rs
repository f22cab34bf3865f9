use crate::{
    db::DbPool,
    errors::{ErrorKind, ServiceError},
    events::EventSender,
    metrics::WORKFLOW_METRICS,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, warn};

/// Command trait for implementing the Command Pattern
///
/// Each command wraps one workflow: it validates its own input, runs inside a
/// single transaction and publishes its domain event after commit.
#[async_trait]
pub trait Command: Send + Sync {
    /// The return type of the command when executed successfully
    type Result;

    /// Execute the command with the given dependencies
    ///
    /// # Arguments
    /// * `db_pool` - Database connection pool for persistence operations
    /// * `event_sender` - Channel to publish domain events
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError>;
}

/// Records latency and outcome for a finished workflow and logs rejections.
pub(crate) fn observe<T>(workflow: &'static str, started: Instant, result: &Result<T, ServiceError>) {
    WORKFLOW_METRICS.record(workflow, started.elapsed(), result);

    if let Err(e) = result {
        match e.kind() {
            ErrorKind::Store => error!(workflow, error = %e, "workflow failed"),
            _ => warn!(workflow, error = %e, "workflow rejected"),
        }
    }
}

pub mod deliveries;
pub mod orders;
pub mod returns;
