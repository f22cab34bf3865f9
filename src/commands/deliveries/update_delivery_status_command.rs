use crate::{
    commands::{observe, Command},
    db::{run_workflow, DbPool},
    entities::{delivery, driver, order, truck, DeliveryStatus, DriverStatus, OrderStatus, TruckStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const WORKFLOW: &str = "update_delivery_status";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateDeliveryStatusCommand {
    pub delivery_id: i32,
    #[validate(length(min = 1, message = "status is required"))]
    pub new_status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateDeliveryStatusResult {
    pub delivery_id: i32,
    pub old_status: String,
    pub status: String,
    /// Orders whose status or binding changed with this transition.
    pub orders_affected: u64,
}

#[async_trait::async_trait]
impl Command for UpdateDeliveryStatusCommand {
    type Result = UpdateDeliveryStatusResult;

    #[instrument(skip(self, db_pool, event_sender), fields(delivery_id = self.delivery_id))]
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
            .with_label_values(&["delivery", &updated.status])
            .inc();
        info!(
            old_status = %updated.old_status,
            new_status = %updated.status,
            orders_affected = updated.orders_affected,
            "Delivery status updated successfully"
        );

        event_sender
            .send_or_log(Event::DeliveryStatusChanged {
                delivery_id: updated.delivery_id,
                old_status: updated.old_status.clone(),
                new_status: updated.status.clone(),
            })
            .await;

        Ok(updated)
    }
}

impl UpdateDeliveryStatusCommand {
    pub async fn run<C: TransactionTrait>(
        &self,
        db: &C,
    ) -> Result<UpdateDeliveryStatusResult, ServiceError> {
        self.validate()?;
        let new_status = DeliveryStatus::from_str(&self.new_status).map_err(|_| {
            ServiceError::ValidationError(format!("Unknown delivery status '{}'", self.new_status))
        })?;

        let delivery_id = self.delivery_id;
        run_workflow(db, WORKFLOW, move |txn| {
            Box::pin(async move { transition(txn, delivery_id, new_status).await })
        })
        .await
    }
}

async fn transition(
    txn: &DatabaseTransaction,
    delivery_id: i32,
    new_status: DeliveryStatus,
) -> Result<UpdateDeliveryStatusResult, ServiceError> {
    let existing = delivery::Entity::find_by_id(delivery_id)
        .one(txn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Delivery {} not found", delivery_id)))?;

    let old_status = existing.status.clone();
    if DeliveryStatus::from_str(&old_status).is_ok_and(|s| s.is_terminal()) {
        return Err(ServiceError::Conflict(format!(
            "Delivery {} is already {}",
            delivery_id, old_status
        )));
    }

    let driver_id = existing.driver_id;
    let truck_id = existing.truck_id;
    let mut active: delivery::ActiveModel = existing.into();
    active.status = Set(new_status.as_str().to_string());
    let saved = active.update(txn).await?;

    let orders_affected = match new_status {
        DeliveryStatus::Delivered => {
            release_fleet(txn, driver_id, truck_id).await?;
            order::Entity::update_many()
                .col_expr(order::Column::Status, Expr::value(OrderStatus::Delivered.as_str()))
                .filter(order::Column::DeliveryId.eq(delivery_id))
                .exec(txn)
                .await?
                .rows_affected
        }
        DeliveryStatus::Cancelled => {
            release_fleet(txn, driver_id, truck_id).await?;
            // Unbound orders become eligible for a new delivery.
            order::Entity::update_many()
                .col_expr(order::Column::DeliveryId, Expr::value(Option::<i32>::None))
                .col_expr(order::Column::Status, Expr::value(OrderStatus::Pending.as_str()))
                .filter(order::Column::DeliveryId.eq(delivery_id))
                .exec(txn)
                .await?
                .rows_affected
        }
        DeliveryStatus::Pending | DeliveryStatus::Delivering => 0,
    };

    Ok(UpdateDeliveryStatusResult {
        delivery_id: saved.id,
        old_status,
        status: saved.status,
        orders_affected,
    })
}

async fn release_fleet(
    txn: &DatabaseTransaction,
    driver_id: i32,
    truck_id: i32,
) -> Result<(), ServiceError> {
    driver::Entity::update_many()
        .col_expr(driver::Column::Status, Expr::value(DriverStatus::Available.as_str()))
        .filter(driver::Column::Id.eq(driver_id))
        .filter(driver::Column::Status.eq(DriverStatus::Working.as_str()))
        .exec(txn)
        .await?;

    truck::Entity::update_many()
        .col_expr(truck::Column::Status, Expr::value(TruckStatus::Available.as_str()))
        .filter(truck::Column::Id.eq(truck_id))
        .filter(truck::Column::Status.eq(TruckStatus::Working.as_str()))
        .exec(txn)
        .await?;

    Ok(())
}
