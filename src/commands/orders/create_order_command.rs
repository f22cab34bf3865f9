use crate::{
    commands::{observe, Command},
    db::{run_workflow, DbPool},
    entities::{order, order_item, product, OrderItemStatus, OrderStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::BUSINESS_METRICS,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

const WORKFLOW: &str = "create_order";

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderCommand {
    #[validate(range(min = 1, message = "customer_id must be positive"))]
    pub customer_id: i32,
    /// Defaults to the time the request is processed.
    pub order_date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "At least one product is required"))]
    pub products: Vec<OrderLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: i32,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderResult {
    pub order_id: i32,
    pub customer_id: i32,
    pub status: String,
    pub order_date: DateTime<Utc>,
    pub total_amount: Decimal,
    pub items: Vec<CreatedOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedOrderItem {
    pub order_item_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price_at_time: Decimal,
}

#[async_trait::async_trait]
impl Command for CreateOrderCommand {
    type Result = CreateOrderResult;

    #[instrument(skip(self, db_pool, event_sender), fields(customer_id = self.customer_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let started = Instant::now();
        let result = self.run(db_pool.as_ref()).await;
        observe(WORKFLOW, started, &result);
        let created = result?;

        BUSINESS_METRICS.orders_created.inc();
        info!(
            order_id = created.order_id,
            total_amount = %created.total_amount,
            items_count = created.items.len(),
            "Order created successfully"
        );

        event_sender
            .send_or_log(Event::OrderCreated {
                order_id: created.order_id,
                customer_id: created.customer_id,
                total_amount: created.total_amount,
                item_count: created.items.len(),
            })
            .await;

        Ok(created)
    }
}

impl CreateOrderCommand {
    /// Validates the request, then creates the order, its lines and the
    /// stock decrements in one transaction.
    pub async fn run<C: TransactionTrait>(&self, db: &C) -> Result<CreateOrderResult, ServiceError> {
        self.validate()?;
        for line in &self.products {
            line.validate()?;
        }

        let command = self.clone();
        run_workflow(db, WORKFLOW, move |txn| {
            Box::pin(async move { command.apply(txn).await })
        })
        .await
    }

    /// Total quantity per product, in first-seen order.
    fn requested_per_product(&self) -> Result<Vec<(i32, i32)>, ServiceError> {
        let mut requested: Vec<(i32, i32)> = Vec::with_capacity(self.products.len());
        for line in &self.products {
            match requested.iter_mut().find(|(id, _)| *id == line.product_id) {
                Some((_, quantity)) => {
                    *quantity = quantity.checked_add(line.quantity).ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "total quantity for product {} is too large",
                            line.product_id
                        ))
                    })?;
                }
                None => requested.push((line.product_id, line.quantity)),
            }
        }
        Ok(requested)
    }

    async fn apply(&self, txn: &DatabaseTransaction) -> Result<CreateOrderResult, ServiceError> {
        // Read every price and stock level before writing anything.
        let mut prices: HashMap<i32, Decimal> = HashMap::new();
        for (product_id, requested) in self.requested_per_product()? {
            let product = product::Entity::find_by_id(product_id)
                .one(txn)
                .await?
                .ok_or(ServiceError::ProductNotFound(product_id))?;

            if product.stock_quantity < requested {
                return Err(ServiceError::InsufficientStock {
                    product_id,
                    requested,
                    available: product.stock_quantity,
                });
            }
            prices.insert(product_id, product.price);
        }

        let mut lines = Vec::with_capacity(self.products.len());
        let mut total_amount = Decimal::ZERO;
        for line in &self.products {
            let price = prices
                .get(&line.product_id)
                .copied()
                .ok_or(ServiceError::ProductNotFound(line.product_id))?;
            total_amount += price * Decimal::from(line.quantity);
            lines.push((line, price));
        }

        let order_date = self.order_date.unwrap_or_else(Utc::now);
        let saved_order = order::ActiveModel {
            customer_id: Set(self.customer_id),
            order_date: Set(order_date),
            status: Set(OrderStatus::Pending.as_str().to_string()),
            total_amount: Set(total_amount),
            delivery_id: Set(None),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        let mut items = Vec::with_capacity(lines.len());
        for (line, price) in lines {
            let saved_item = order_item::ActiveModel {
                order_id: Set(saved_order.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price_at_time: Set(price),
                status: Set(OrderItemStatus::Pending.as_str().to_string()),
                ..Default::default()
            }
            .insert(txn)
            .await?;

            decrement_stock(txn, line.product_id, line.quantity).await?;

            items.push(CreatedOrderItem {
                order_item_id: saved_item.id,
                product_id: saved_item.product_id,
                quantity: saved_item.quantity,
                unit_price_at_time: saved_item.unit_price_at_time,
            });
        }

        Ok(CreateOrderResult {
            order_id: saved_order.id,
            customer_id: saved_order.customer_id,
            status: saved_order.status,
            order_date: saved_order.order_date,
            total_amount: saved_order.total_amount,
            items,
        })
    }
}

/// Conditional decrement: succeeds only while the row still holds enough stock.
async fn decrement_stock(
    txn: &DatabaseTransaction,
    product_id: i32,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).sub(quantity),
        )
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::StockQuantity.gte(quantity))
        .exec(txn)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let available = product::Entity::find_by_id(product_id)
        .one(txn)
        .await?
        .map(|p| p.stock_quantity)
        .unwrap_or(0);

    Err(ServiceError::InsufficientStock {
        product_id,
        requested: quantity,
        available,
    })
}
