use crate::{
    commands::{observe, Command},
    db::{run_workflow, DbPool},
    entities::{order_item, return_entity, OrderItemStatus, ReturnStatus},
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
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

const WORKFLOW: &str = "process_returns";

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ReturnRequest {
    pub order_item_id: i32,
    #[validate(custom = "not_blank")]
    pub return_reason: String,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    /// Defaults to the time the request is processed.
    pub return_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessReturnsCommand {
    #[validate(length(min = 1, message = "At least one return is required"))]
    pub returns: Vec<ReturnRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProcessedReturn {
    pub return_id: i32,
    pub order_item_id: i32,
    /// Cumulative quantity now recorded against the order item.
    pub quantity: i32,
    /// True when the request was folded into an existing return row.
    pub merged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProcessReturnsResult {
    pub returns: Vec<ProcessedReturn>,
}

#[async_trait::async_trait]
impl Command for ProcessReturnsCommand {
    type Result = ProcessReturnsResult;

    #[instrument(skip(self, db_pool, event_sender), fields(lines = self.returns.len()))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let started = Instant::now();
        let result = self.run(db_pool.as_ref()).await;
        observe(WORKFLOW, started, &result);
        let processed = result?;

        BUSINESS_METRICS
            .returns_processed
            .inc_by(processed.returns.len() as u64);
        info!(returns = processed.returns.len(), "Returns processed");

        event_sender
            .send_or_log(Event::ReturnsProcessed {
                return_ids: processed.returns.iter().map(|r| r.return_id).collect(),
                processed_at: Utc::now(),
            })
            .await;

        Ok(processed)
    }
}

impl ProcessReturnsCommand {
    pub fn new(returns: Vec<ReturnRequest>) -> Self {
        Self { returns }
    }

    pub async fn run<C: TransactionTrait>(
        &self,
        db: &C,
    ) -> Result<ProcessReturnsResult, ServiceError> {
        self.validate()?;
        for request in &self.returns {
            request.validate()?;
        }

        let requests = self.returns.clone();
        run_workflow(db, WORKFLOW, move |txn| {
            Box::pin(async move {
                let mut processed = Vec::with_capacity(requests.len());
                // Sequential on purpose: later lines must see earlier writes.
                for request in &requests {
                    processed.push(apply_one(txn, request).await?);
                }
                Ok(ProcessReturnsResult { returns: processed })
            })
        })
        .await
    }
}

async fn apply_one(
    txn: &DatabaseTransaction,
    request: &ReturnRequest,
) -> Result<ProcessedReturn, ServiceError> {
    let item = order_item::Entity::find_by_id(request.order_item_id)
        .one(txn)
        .await?
        .ok_or(ServiceError::OrderItemNotFound(request.order_item_id))?;

    let existing = return_entity::Entity::find()
        .filter(return_entity::Column::OrderItemId.eq(item.id))
        .one(txn)
        .await?;

    let already_returned = existing.as_ref().map(|r| r.quantity).unwrap_or(0);
    let requested_total = already_returned.saturating_add(request.quantity);
    if requested_total > item.quantity {
        return Err(ServiceError::ReturnQuantityExceeded {
            order_item_id: item.id,
            requested_total,
            ordered: item.quantity,
        });
    }

    let return_date = request.return_date.unwrap_or_else(Utc::now);

    let processed = match existing {
        Some(row) => {
            // The quantity bound is re-checked by the update itself.
            let merged = return_entity::Entity::update_many()
                .col_expr(
                    return_entity::Column::Quantity,
                    Expr::col(return_entity::Column::Quantity).add(request.quantity),
                )
                .col_expr(return_entity::Column::ReturnDate, Expr::value(return_date))
                .filter(return_entity::Column::Id.eq(row.id))
                .filter(return_entity::Column::Quantity.lte(item.quantity - request.quantity))
                .exec(txn)
                .await?;

            if merged.rows_affected != 1 {
                return Err(ServiceError::LostRace(format!(
                    "return for order item {} changed during the request",
                    item.id
                )));
            }

            debug!(return_id = row.id, quantity = requested_total, "merged into existing return");
            ProcessedReturn {
                return_id: row.id,
                order_item_id: item.id,
                quantity: requested_total,
                merged: true,
            }
        }
        None => {
            let inserted = return_entity::ActiveModel {
                order_item_id: Set(item.id),
                return_reason: Set(request.return_reason.clone()),
                return_status: Set(ReturnStatus::Pending.as_str().to_string()),
                quantity: Set(request.quantity),
                return_date: Set(return_date),
                resolved_date: Set(None),
                service_center_id: Set(None),
                ..Default::default()
            }
            .insert(txn)
            .await
            .map_err(|e| {
                ServiceError::from_write(e, &format!("return for order item {}", item.id))
            })?;

            ProcessedReturn {
                return_id: inserted.id,
                order_item_id: item.id,
                quantity: inserted.quantity,
                merged: false,
            }
        }
    };

    if requested_total == item.quantity {
        let mut line: order_item::ActiveModel = item.into();
        line.status = Set(OrderItemStatus::Returned.as_str().to_string());
        line.update(txn).await?;
    }

    Ok(processed)
}
