use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;

/// Only returns filed with this reason may go to a service center.
pub const DAMAGE_REASON: &str = "damage";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReturnStatus {
    Pending,
    PickedUp,
    Resolved,
}

impl ReturnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReturnStatus::Pending => "pending",
            ReturnStatus::PickedUp => "picked_up",
            ReturnStatus::Resolved => "resolved",
        }
    }

    pub fn can_transition_to(&self, next: ReturnStatus) -> bool {
        matches!(
            (self, next),
            (ReturnStatus::Pending, ReturnStatus::PickedUp)
                | (ReturnStatus::PickedUp, ReturnStatus::Resolved)
        )
    }
}

/// Cumulative return record; at most one row exists per order item.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "returns")]
#[schema(as = Return)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub order_item_id: i32,
    pub return_reason: String,
    pub return_status: String,
    pub quantity: i32,
    pub return_date: DateTime<Utc>,
    pub resolved_date: Option<DateTime<Utc>>,
    pub service_center_id: Option<i32>,
}

impl Model {
    pub fn status(&self) -> Option<ReturnStatus> {
        self.return_status.parse().ok()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_item::Entity",
        from = "Column::OrderItemId",
        to = "super::order_item::Column::Id"
    )]
    OrderItem,
    #[sea_orm(
        belongs_to = "super::service_center::Entity",
        from = "Column::ServiceCenterId",
        to = "super::service_center::Column::Id"
    )]
    ServiceCenter,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::service_center::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ServiceCenter.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_text() {
        assert_eq!("picked_up".parse::<ReturnStatus>().unwrap(), ReturnStatus::PickedUp);
        assert_eq!(ReturnStatus::PickedUp.as_str(), ReturnStatus::PickedUp.to_string());
        assert!("lost".parse::<ReturnStatus>().is_err());
    }

    #[test]
    fn only_forward_transitions_are_allowed() {
        assert!(ReturnStatus::Pending.can_transition_to(ReturnStatus::PickedUp));
        assert!(ReturnStatus::PickedUp.can_transition_to(ReturnStatus::Resolved));
        assert!(!ReturnStatus::Pending.can_transition_to(ReturnStatus::Resolved));
        assert!(!ReturnStatus::Resolved.can_transition_to(ReturnStatus::Pending));
    }
}
