use crate::{
    commands::{observe, Command},
    db::{run_workflow, DbPool},
    entities::{order, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
};
use sea_orm::{ActiveModelTrait, DatabaseTransaction, EntityTrait, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const WORKFLOW: &str = "update_order_status";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateOrderStatusCommand {
    pub order_id: i32,
    #[validate(length(min = 1, message = "status is required"))]
    pub new_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusResult {
    pub order_id: i32,
    pub old_status: String,
    pub status: String,
}

#[async_trait::async_trait]
impl Command for UpdateOrderStatusCommand {
    type Result = UpdateOrderStatusResult;

    #[instrument(skip(self, db_pool, event_sender), fields(order_id = self.order_id))]
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
            .with_label_values(&["order", &updated.status])
            .inc();
        info!(
            old_status = %updated.old_status,
            new_status = %updated.status,
            "Order status updated successfully"
        );

        event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id: updated.order_id,
                old_status: updated.old_status.clone(),
                new_status: updated.status.clone(),
            })
            .await;

        Ok(updated)
    }
}

impl UpdateOrderStatusCommand {
    pub async fn run<C: TransactionTrait>(
        &self,
        db: &C,
    ) -> Result<UpdateOrderStatusResult, ServiceError> {
        self.validate()?;
        let new_status = OrderStatus::from_str(&self.new_status).map_err(|_| {
            ServiceError::ValidationError(format!("Unknown order status '{}'", self.new_status))
        })?;

        let order_id = self.order_id;
        run_workflow(db, WORKFLOW, move |txn| {
            Box::pin(async move { update_status(txn, order_id, new_status).await })
        })
        .await
    }
}

async fn update_status(
    txn: &DatabaseTransaction,
    order_id: i32,
    new_status: OrderStatus,
) -> Result<UpdateOrderStatusResult, ServiceError> {
    let existing = order::Entity::find_by_id(order_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

    let old_status = existing.status.clone();
    let mut active: order::ActiveModel = existing.into();
    active.status = Set(new_status.as_str().to_string());
    let saved = active.update(txn).await?;

    Ok(UpdateOrderStatusResult {
        order_id: saved.id,
        old_status,
        status: saved.status,
    })
}
