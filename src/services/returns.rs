use crate::{
    commands::returns::{
        AssignServiceCenterCommand, AssignServiceCenterResult, ProcessReturnsCommand,
        ProcessReturnsResult, UpdateReturnStatusCommand, UpdateReturnStatusResult,
    },
    commands::Command,
    db::DbPool,
    entities::{order_item, product, return_entity, service_center, ReturnStatus},
    errors::ServiceError,
    events::EventSender,
};
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;

/// A return waiting at (or on its way to) a service center
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceCenterQueueEntry {
    pub return_id: i32,
    pub order_item_id: i32,
    pub product_name: Option<String>,
    pub quantity: i32,
    pub service_center_id: i32,
    pub service_center_name: String,
    pub return_status: String,
    pub return_date: DateTime<Utc>,
}

/// Service for managing returns
#[derive(Clone)]
pub struct ReturnService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ReturnService {
    /// Creates a new return service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Applies a batch of return requests atomically
    #[instrument(skip(self, command), fields(lines = command.returns.len()))]
    pub async fn process_returns(
        &self,
        command: ProcessReturnsCommand,
    ) -> Result<ProcessReturnsResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Routes an eligible return to a service center
    #[instrument(skip(self))]
    pub async fn assign_service_center(
        &self,
        command: AssignServiceCenterCommand,
    ) -> Result<AssignServiceCenterResult, ServiceError> {
        command
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_return_status(
        &self,
        return_id: i32,
        new_status: String,
    ) -> Result<UpdateReturnStatusResult, ServiceError> {
        UpdateReturnStatusCommand {
            return_id,
            new_status,
        }
        .execute(self.db_pool.clone(), self.event_sender.clone())
        .await
    }

    /// Open returns assigned to a service center, optionally for one center
    #[instrument(skip(self))]
    pub async fn service_center_queue(
        &self,
        service_center_id: Option<i32>,
    ) -> Result<Vec<ServiceCenterQueueEntry>, ServiceError> {
        let db = &*self.db_pool;

        let mut query = return_entity::Entity::find()
            .filter(return_entity::Column::ServiceCenterId.is_not_null())
            .filter(return_entity::Column::ReturnStatus.is_in([
                ReturnStatus::Pending.as_str(),
                ReturnStatus::PickedUp.as_str(),
            ]));
        if let Some(center) = service_center_id {
            query = query.filter(return_entity::Column::ServiceCenterId.eq(center));
        }

        let rows = query
            .order_by_asc(return_entity::Column::ReturnDate)
            .order_by_asc(return_entity::Column::Id)
            .find_also_related(service_center::Entity)
            .all(db)
            .await?;

        let item_ids: Vec<i32> = rows.iter().map(|(r, _)| r.order_item_id).collect();
        let items: HashMap<i32, order_item::Model> = order_item::Entity::find()
            .filter(order_item::Column::Id.is_in(item_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|item| (item.id, item))
            .collect();

        let product_ids: Vec<i32> = items.values().map(|i| i.product_id).collect();
        let product_names: HashMap<i32, String> = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        Ok(rows
            .into_iter()
            .filter_map(|(ret, center)| {
                let center = center?;
                let product_name = items
                    .get(&ret.order_item_id)
                    .and_then(|item| product_names.get(&item.product_id))
                    .cloned();
                Some(ServiceCenterQueueEntry {
                    return_id: ret.id,
                    order_item_id: ret.order_item_id,
                    product_name,
                    quantity: ret.quantity,
                    service_center_id: center.id,
                    service_center_name: center.name,
                    return_status: ret.return_status,
                    return_date: ret.return_date,
                })
            })
            .collect())
    }
}
