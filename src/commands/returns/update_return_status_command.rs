use crate::{
    commands::{observe, Command},
    db::{run_workflow, DbPool},
    entities::{return_entity, ReturnStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const WORKFLOW: &str = "update_return_status";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateReturnStatusCommand {
    pub return_id: i32,
    #[validate(length(min = 1, message = "status is required"))]
    pub new_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateReturnStatusResult {
    pub return_id: i32,
    pub old_status: String,
    pub status: String,
    pub resolved_date: Option<DateTime<Utc>>,
}

#[async_trait::async_trait]
impl Command for UpdateReturnStatusCommand {
    type Result = UpdateReturnStatusResult;

    #[instrument(skip(self, db_pool, event_sender), fields(return_id = self.return_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let started = Instant::now();
        let result = self.run(db_pool.as_ref()).await;
        observe(WORKFLOW, started, &result);
        let updated = result?;

        BUSINESS_METRICS
            .status_changes
            .with_label_values(&["return", &updated.status])
            .inc();
        info!(
            old_status = %updated.old_status,
            new_status = %updated.status,
            "Return status updated successfully"
        );

        event_sender
            .send_or_log(Event::ReturnStatusChanged {
                return_id: updated.return_id,
                old_status: updated.old_status.clone(),
                new_status: updated.status.clone(),
            })
            .await;

        Ok(updated)
    }
}

impl UpdateReturnStatusCommand {
    pub async fn run<C: TransactionTrait>(
        &self,
        db: &C,
    ) -> Result<UpdateReturnStatusResult, ServiceError> {
        self.validate()?;
        let next = ReturnStatus::from_str(&self.new_status).map_err(|_| {
            ServiceError::ValidationError(format!("Unknown return status '{}'", self.new_status))
        })?;

        let return_id = self.return_id;
        run_workflow(db, WORKFLOW, move |txn| {
            Box::pin(async move { transition(txn, return_id, next).await })
        })
        .await
    }
}

async fn transition(
    txn: &DatabaseTransaction,
    return_id: i32,
    next: ReturnStatus,
) -> Result<UpdateReturnStatusResult, ServiceError> {
    let existing = return_entity::Entity::find_by_id(return_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Return {} not found", return_id)))?;

    let current = existing.status().ok_or_else(|| {
        ServiceError::InternalError(format!(
            "Return {} has unrecognised status '{}'",
            return_id, existing.return_status
        ))
    })?;

    if !current.can_transition_to(next) {
        return Err(ServiceError::Conflict(format!(
            "Return {} cannot move from {} to {}",
            return_id,
            current.as_str(),
            next.as_str()
        )));
    }

    let resolved_date = match next {
        ReturnStatus::Resolved => Some(Utc::now()),
        _ => existing.resolved_date,
    };

    let updated = return_entity::Entity::update_many()
        .col_expr(return_entity::Column::ReturnStatus, Expr::value(next.as_str()))
        .col_expr(return_entity::Column::ResolvedDate, Expr::value(resolved_date))
        .filter(return_entity::Column::Id.eq(return_id))
        .filter(return_entity::Column::ReturnStatus.eq(current.as_str()))
        .exec(txn)
        .await?;

    if updated.rows_affected != 1 {
        return Err(ServiceError::LostRace(format!(
            "return {} changed status during the request",
            return_id
        )));
    }

    Ok(UpdateReturnStatusResult {
        return_id,
        old_status: current.as_str().to_string(),
        status: next.as_str().to_string(),
        resolved_date,
    })
}
