use crate::{
    commands::orders::{
        CreateOrderCommand, CreateOrderResult, UpdateOrderStatusCommand, UpdateOrderStatusResult,
    },
    commands::Command,
    db::DbPool,
    entities::{order, order_item, return_entity},
    errors::ServiceError,
    events::EventSender,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderDetails {
    pub order_id: i32,
    pub customer_id: i32,
    pub order_date: DateTime<Utc>,
    pub status: String,
    pub total_amount: Decimal,
    pub delivery_id: Option<i32>,
    pub items: Vec<OrderItemDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemDetails {
    pub order_item_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price_at_time: Decimal,
    pub line_total: Decimal,
    pub status: String,
    pub returned_quantity: i32,
    pub return_id: Option<i32>,
    pub return_status: Option<String>,
}

impl OrderItemDetails {
    fn from_models(item: order_item::Model, ret: Option<return_entity::Model>) -> Self {
        Self {
            order_item_id: item.id,
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price_at_time: item.unit_price_at_time,
            line_total: item.line_total(),
            status: item.status,
            returned_quantity: ret.as_ref().map(|r| r.quantity).unwrap_or(0),
            return_id: ret.as_ref().map(|r| r.id),
            return_status: ret.map(|r| r.return_status),
        }
    }
}

/// Service for order creation, status changes and lookups
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an order, its lines and the matching stock decrements
    #[instrument(skip(self, command), fields(customer_id = command.customer_id))]
    pub async fn create_order(
        &self,
        command: CreateOrderCommand,
    ) -> Result<CreateOrderResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Sets an order's status
    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: i32,
        new_status: String,
    ) -> Result<UpdateOrderStatusResult, ServiceError> {
        UpdateOrderStatusCommand {
            order_id,
            new_status,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Order with its lines and any returns recorded against them
    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderDetails, ServiceError> {
        let db = &*self.db_pool;

        let found = order::Entity::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Id)
            .find_also_related(return_entity::Entity)
            .all(db)
            .await?
            .into_iter()
            .map(|(item, ret)| OrderItemDetails::from_models(item, ret))
            .collect();

        Ok(OrderDetails {
            order_id: found.id,
            customer_id: found.customer_id,
            order_date: found.order_date,
            status: found.status,
            total_amount: found.total_amount,
            delivery_id: found.delivery_id,
            items,
        })
    }
}
