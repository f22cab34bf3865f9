//! Return disposition: eligibility for service-center routing, status lifecycle and the queue.

mod common;

use assert_matches::assert_matches;
use common::{drain_events, event_channel, seed_product, seed_service_center, test_db};
use erp_api::{
    commands::orders::{CreateOrderCommand, OrderLineRequest},
    commands::returns::{AssignServiceCenterCommand, ProcessReturnsCommand, ReturnRequest},
    db::DbPool,
    entities::return_entity,
    errors::ServiceError,
    events::Event,
    services::{orders::OrderService, returns::ReturnService},
};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;
use std::sync::Arc;

struct Fixture {
    db: Arc<DbPool>,
    returns: ReturnService,
    rx: tokio::sync::mpsc::Receiver<Event>,
    center_id: i32,
}

async fn fixture() -> Fixture {
    let db = test_db().await;
    let (events, mut rx) = event_channel();
    let returns = ReturnService::new(db.clone(), events);
    let center = seed_service_center(&db, "North Repair Hub").await;
    drain_events(&mut rx);
    Fixture {
        db,
        returns,
        rx,
        center_id: center.id,
    }
}

/// Orders one unit of a fresh product and files a return against it.
async fn filed_return(fx: &Fixture, product_name: &str, reason: &str) -> i32 {
    let (events, _rx) = common::event_channel();
    let orders = OrderService::new(fx.db.clone(), events);
    let product = seed_product(&fx.db, product_name, dec!(20.00), 10).await;
    let item_id = orders
        .create_order(CreateOrderCommand {
            customer_id: 8,
            order_date: None,
            products: vec![OrderLineRequest {
                product_id: product.id,
                quantity: 1,
            }],
        })
        .await
        .unwrap()
        .items[0]
        .order_item_id;

    fx.returns
        .process_returns(ProcessReturnsCommand::new(vec![ReturnRequest {
            order_item_id: item_id,
            return_reason: reason.to_string(),
            quantity: 1,
            return_date: None,
        }]))
        .await
        .unwrap()
        .returns[0]
        .return_id
}

fn assign(return_id: i32, service_center_id: i32) -> AssignServiceCenterCommand {
    AssignServiceCenterCommand {
        return_id,
        service_center_id,
    }
}

#[tokio::test]
async fn damaged_picked_up_return_is_assigned() {
    let mut fx = fixture().await;
    let return_id = filed_return(&fx, "Kettle", "damage").await;
    fx.returns
        .update_return_status(return_id, "picked_up".into())
        .await
        .unwrap();
    drain_events(&mut fx.rx);

    let assigned = fx
        .returns
        .assign_service_center(assign(return_id, fx.center_id))
        .await
        .unwrap();
    assert_eq!(assigned.return_status, "picked_up");

    let row = return_entity::Entity::find_by_id(return_id)
        .one(fx.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.service_center_id, Some(fx.center_id));

    assert_matches!(
        drain_events(&mut fx.rx).as_slice(),
        [Event::ReturnAssignedToServiceCenter { return_id: r, service_center_id: c }]
            if *r == return_id && *c == fx.center_id
    );
}

#[tokio::test]
async fn pending_or_non_damage_returns_are_not_eligible() {
    let fx = fixture().await;

    let pending = filed_return(&fx, "Toaster", "damage").await;
    assert_matches!(
        fx.returns.assign_service_center(assign(pending, fx.center_id)).await,
        Err(ServiceError::ReturnNotEligible(id)) if id == pending
    );

    let unwanted = filed_return(&fx, "Blender", "changed mind").await;
    fx.returns
        .update_return_status(unwanted, "picked_up".into())
        .await
        .unwrap();
    assert_matches!(
        fx.returns.assign_service_center(assign(unwanted, fx.center_id)).await,
        Err(ServiceError::ReturnNotEligible(_))
    );

    for id in [pending, unwanted] {
        let row = return_entity::Entity::find_by_id(id)
            .one(fx.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.service_center_id, None);
    }
}

#[tokio::test]
async fn unknown_service_center_or_return_is_not_found() {
    let fx = fixture().await;
    let return_id = filed_return(&fx, "Mixer", "damage").await;

    assert_matches!(
        fx.returns.assign_service_center(assign(return_id, 555)).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        fx.returns.assign_service_center(assign(555, fx.center_id)).await,
        Err(ServiceError::ReturnNotEligible(555))
    );
}

#[tokio::test]
async fn return_status_moves_forward_only() {
    let fx = fixture().await;
    let return_id = filed_return(&fx, "Heater", "damage").await;

    assert_matches!(
        fx.returns.update_return_status(return_id, "resolved".into()).await,
        Err(ServiceError::Conflict(_))
    );
    assert_matches!(
        fx.returns.update_return_status(return_id, "shredded".into()).await,
        Err(ServiceError::ValidationError(_))
    );

    let picked = fx
        .returns
        .update_return_status(return_id, "picked_up".into())
        .await
        .unwrap();
    assert_eq!(picked.old_status, "pending");
    assert!(picked.resolved_date.is_none());

    let resolved = fx
        .returns
        .update_return_status(return_id, "resolved".into())
        .await
        .unwrap();
    assert!(resolved.resolved_date.is_some());

    assert_matches!(
        fx.returns.update_return_status(return_id, "pending".into()).await,
        Err(ServiceError::Conflict(_))
    );
}

#[tokio::test]
async fn queue_lists_open_assigned_returns_per_center() {
    let fx = fixture().await;
    let other_center = seed_service_center(&fx.db, "South Repair Hub").await;

    let mut routed = Vec::new();
    for (name, center) in [("Fan", fx.center_id), ("Drill", other_center.id)] {
        let id = filed_return(&fx, name, "damage").await;
        fx.returns
            .update_return_status(id, "picked_up".into())
            .await
            .unwrap();
        fx.returns
            .assign_service_center(assign(id, center))
            .await
            .unwrap();
        routed.push(id);
    }
    // Filed but never routed, so it stays out of every queue.
    filed_return(&fx, "Saw", "damage").await;

    let all = fx.returns.service_center_queue(None).await.unwrap();
    assert_eq!(all.len(), 2);

    let north = fx
        .returns
        .service_center_queue(Some(fx.center_id))
        .await
        .unwrap();
    assert_eq!(north.len(), 1);
    assert_eq!(north[0].return_id, routed[0]);
    assert_eq!(north[0].product_name.as_deref(), Some("Fan"));
    assert_eq!(north[0].service_center_name, "North Repair Hub");

    fx.returns
        .update_return_status(routed[0], "resolved".into())
        .await
        .unwrap();
    assert!(fx
        .returns
        .service_center_queue(Some(fx.center_id))
        .await
        .unwrap()
        .is_empty());
}
