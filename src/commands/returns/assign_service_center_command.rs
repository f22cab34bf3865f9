use crate::{
    commands::{observe, Command},
    db::{run_workflow, DbPool},
    entities::{return_entity, service_center, ReturnStatus, DAMAGE_REASON},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
};
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, Select,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const WORKFLOW: &str = "assign_service_center";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AssignServiceCenterCommand {
    #[validate(range(min = 1, message = "return_id must be positive"))]
    pub return_id: i32,
    #[validate(range(min = 1, message = "service_center_id must be positive"))]
    pub service_center_id: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignServiceCenterResult {
    pub return_id: i32,
    pub service_center_id: i32,
    pub return_status: String,
}

#[async_trait::async_trait]
impl Command for AssignServiceCenterCommand {
    type Result = AssignServiceCenterResult;

    #[instrument(
        skip(self, db_pool, event_sender),
        fields(return_id = self.return_id, service_center_id = self.service_center_id)
    )]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let started = Instant::now();
        let result = self.run(db_pool.as_ref()).await;
        observe(WORKFLOW, started, &result);
        let assigned = result?;

        BUSINESS_METRICS.returns_assigned.inc();
        info!("Return assigned to service center");

        event_sender
            .send_or_log(Event::ReturnAssignedToServiceCenter {
                return_id: assigned.return_id,
                service_center_id: assigned.service_center_id,
            })
            .await;

        Ok(assigned)
    }
}

/// Returns that may be routed: filed for damage and already picked up.
fn eligible(return_id: i32) -> Select<return_entity::Entity> {
    return_entity::Entity::find()
        .filter(return_entity::Column::Id.eq(return_id))
        .filter(return_entity::Column::ReturnReason.eq(DAMAGE_REASON))
        .filter(return_entity::Column::ReturnStatus.eq(ReturnStatus::PickedUp.as_str()))
}

impl AssignServiceCenterCommand {
    pub async fn run<C: TransactionTrait>(
        &self,
        db: &C,
    ) -> Result<AssignServiceCenterResult, ServiceError> {
        self.validate()?;

        let command = self.clone();
        run_workflow(db, WORKFLOW, move |txn| {
            Box::pin(async move { command.apply(txn).await })
        })
        .await
    }

    async fn apply(
        &self,
        txn: &DatabaseTransaction,
    ) -> Result<AssignServiceCenterResult, ServiceError> {
        service_center::Entity::find_by_id(self.service_center_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Service center {} not found",
                    self.service_center_id
                ))
            })?;

        let candidate = eligible(self.return_id)
            .one(txn)
            .await?
            .ok_or(ServiceError::ReturnNotEligible(self.return_id))?;

        // Same predicate on the write so a concurrent status change is caught.
        let updated = return_entity::Entity::update_many()
            .col_expr(
                return_entity::Column::ServiceCenterId,
                Expr::value(self.service_center_id),
            )
            .filter(return_entity::Column::Id.eq(self.return_id))
            .filter(return_entity::Column::ReturnReason.eq(DAMAGE_REASON))
            .filter(return_entity::Column::ReturnStatus.eq(ReturnStatus::PickedUp.as_str()))
            .exec(txn)
            .await?;

        if updated.rows_affected != 1 {
            return Err(ServiceError::ReturnNotEligible(self.return_id));
        }

        Ok(AssignServiceCenterResult {
            return_id: candidate.id,
            service_center_id: self.service_center_id,
            return_status: candidate.return_status,
        })
    }
}
