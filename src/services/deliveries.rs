use crate::{
    commands::deliveries::{
        CreateDeliveryCommand, CreateDeliveryResult, UpdateDeliveryStatusCommand,
        UpdateDeliveryStatusResult,
    },
    commands::Command,
    db::DbPool,
    entities::{delivery, order},
    errors::ServiceError,
    events::EventSender,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeliveryDetails {
    pub delivery_id: i32,
    pub driver_id: i32,
    pub truck_id: i32,
    pub departure_time: DateTime<Utc>,
    pub status: String,
    pub order_ids: Vec<i32>,
}

/// Service for dispatching and tracking deliveries
#[derive(Clone)]
pub struct DeliveryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl DeliveryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a delivery and binds the orders to it
    #[instrument(skip(self, command), fields(driver_id = command.driver_id, truck_id = command.truck_id))]
    pub async fn create_delivery(
        &self,
        command: CreateDeliveryCommand,
    ) -> Result<CreateDeliveryResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_delivery_status(
        &self,
        delivery_id: i32,
        new_status: String,
    ) -> Result<UpdateDeliveryStatusResult, ServiceError> {
        UpdateDeliveryStatusCommand {
            delivery_id,
            new_status,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    #[instrument(skip(self))]
    pub async fn get_delivery(&self, delivery_id: i32) -> Result<DeliveryDetails, ServiceError> {
        let db = &*self.db_pool;

        let found = delivery::Entity::find_by_id(delivery_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Delivery {} not found", delivery_id)))?;

        let order_ids = order::Entity::find()
            .filter(order::Column::DeliveryId.eq(delivery_id))
            .order_by_asc(order::Column::Id)
            .all(db)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();

        Ok(DeliveryDetails {
            delivery_id: found.id,
            driver_id: found.driver_id,
            truck_id: found.truck_id,
            departure_time: found.departure_time,
            status: found.status,
            order_ids,
        })
    }
}
