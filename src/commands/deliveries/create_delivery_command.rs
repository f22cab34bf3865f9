use crate::{
    commands::{observe, Command},
    db::{run_workflow, DbPool},
    entities::{delivery, driver, order, truck, DeliveryStatus, DriverStatus, OrderStatus, TruckStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const WORKFLOW: &str = "create_delivery";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateDeliveryCommand {
    pub driver_id: i32,
    pub truck_id: i32,
    #[validate(length(min = 1, message = "At least one order is required"))]
    pub order_ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDeliveryResult {
    pub delivery_id: i32,
    pub driver_id: i32,
    pub truck_id: i32,
    pub departure_time: DateTime<Utc>,
    pub status: String,
    pub order_ids: Vec<i32>,
}

#[async_trait::async_trait]
impl Command for CreateDeliveryCommand {
    type Result = CreateDeliveryResult;

    #[instrument(
        skip(self, db_pool, event_sender),
        fields(driver_id = self.driver_id, truck_id = self.truck_id)
    )]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let started = Instant::now();
        let result = self.run(db_pool.as_ref()).await;
        observe(WORKFLOW, started, &result);
        let created = result?;

        BUSINESS_METRICS.deliveries_created.inc();
        info!(
            delivery_id = created.delivery_id,
            orders = created.order_ids.len(),
            "Delivery created successfully"
        );

        event_sender
            .send_or_log(Event::DeliveryCreated {
                delivery_id: created.delivery_id,
                driver_id: created.driver_id,
                truck_id: created.truck_id,
                order_ids: created.order_ids.clone(),
            })
            .await;

        Ok(created)
    }
}

impl CreateDeliveryCommand {
    pub async fn run<C: TransactionTrait>(
        &self,
        db: &C,
    ) -> Result<CreateDeliveryResult, ServiceError> {
        self.validate()?;

        let mut seen = HashSet::with_capacity(self.order_ids.len());
        if let Some(duplicate) = self.order_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(ServiceError::ValidationError(format!(
                "Order {} is listed more than once",
                duplicate
            )));
        }

        let command = self.clone();
        run_workflow(db, WORKFLOW, move |txn| {
            Box::pin(async move { command.apply(txn).await })
        })
        .await
    }

    async fn check_preconditions(&self, txn: &DatabaseTransaction) -> Result<(), ServiceError> {
        let driver = driver::Entity::find_by_id(self.driver_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Driver {} not found", self.driver_id)))?;
        if driver.status != DriverStatus::Available.as_str() {
            return Err(ServiceError::DriverUnavailable(self.driver_id));
        }

        let truck = truck::Entity::find_by_id(self.truck_id)
            .one(txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Truck {} not found", self.truck_id)))?;
        if truck.status != TruckStatus::Available.as_str() {
            return Err(ServiceError::TruckUnavailable(self.truck_id));
        }

        let orders = order::Entity::find()
            .filter(order::Column::Id.is_in(self.order_ids.clone()))
            .all(txn)
            .await?;

        let found: HashSet<i32> = orders.iter().map(|o| o.id).collect();
        let missing: Vec<i32> = self
            .order_ids
            .iter()
            .copied()
            .filter(|id| !found.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::InvalidOrderSet(format!(
                "orders not found: {:?}",
                missing
            )));
        }

        let mut assigned: Vec<i32> = orders
            .iter()
            .filter(|o| o.delivery_id.is_some())
            .map(|o| o.id)
            .collect();
        if !assigned.is_empty() {
            assigned.sort_unstable();
            return Err(ServiceError::InvalidOrderSet(format!(
                "orders already assigned to a delivery: {:?}",
                assigned
            )));
        }

        Ok(())
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> Result<CreateDeliveryResult, ServiceError> {
        self.check_preconditions(txn).await?;

        let saved = delivery::ActiveModel {
            driver_id: Set(self.driver_id),
            truck_id: Set(self.truck_id),
            departure_time: Set(Utc::now()),
            status: Set(DeliveryStatus::Delivering.as_str().to_string()),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        // The status filters re-check availability at write time.
        let claimed_driver = driver::Entity::update_many()
            .col_expr(driver::Column::Status, Expr::value(DriverStatus::Working.as_str()))
            .filter(driver::Column::Id.eq(self.driver_id))
            .filter(driver::Column::Status.eq(DriverStatus::Available.as_str()))
            .exec(txn)
            .await?;
        if claimed_driver.rows_affected != 1 {
            return Err(ServiceError::LostRace(format!(
                "driver {} was assigned by another request",
                self.driver_id
            )));
        }

        let claimed_truck = truck::Entity::update_many()
            .col_expr(truck::Column::Status, Expr::value(TruckStatus::Working.as_str()))
            .filter(truck::Column::Id.eq(self.truck_id))
            .filter(truck::Column::Status.eq(TruckStatus::Available.as_str()))
            .exec(txn)
            .await?;
        if claimed_truck.rows_affected != 1 {
            return Err(ServiceError::LostRace(format!(
                "truck {} was assigned by another request",
                self.truck_id
            )));
        }

        let bound = order::Entity::update_many()
            .col_expr(order::Column::DeliveryId, Expr::value(saved.id))
            .col_expr(order::Column::Status, Expr::value(OrderStatus::Delivering.as_str()))
            .filter(order::Column::Id.is_in(self.order_ids.clone()))
            .filter(order::Column::DeliveryId.is_null())
            .exec(txn)
            .await?;
        if bound.rows_affected != self.order_ids.len() as u64 {
            return Err(ServiceError::LostRace(format!(
                "{} of {} orders were assigned by another request",
                self.order_ids.len() as u64 - bound.rows_affected,
                self.order_ids.len()
            )));
        }

        Ok(CreateDeliveryResult {
            delivery_id: saved.id,
            driver_id: saved.driver_id,
            truck_id: saved.truck_id,
            departure_time: saved.departure_time,
            status: saved.status,
            order_ids: self.order_ids.clone(),
        })
    }
}
