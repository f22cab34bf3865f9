//! Return processing: one row per order item, merged until the ordered quantity.

mod common;

use assert_matches::assert_matches;
use common::{drain_events, event_channel, seed_product, test_db};
use erp_api::{
    commands::orders::{CreateOrderCommand, OrderLineRequest},
    commands::returns::{ProcessReturnsCommand, ReturnRequest},
    db::DbPool,
    entities::{order_item, return_entity},
    errors::ServiceError,
    events::Event,
    services::{orders::OrderService, returns::ReturnService},
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use std::sync::Arc;

async fn ordered_item(db: &Arc<DbPool>, orders: &OrderService, quantity: i32) -> i32 {
    let product = seed_product(db, "Lamp", dec!(12.00), 50).await;
    orders
        .create_order(CreateOrderCommand {
            customer_id: 3,
            order_date: None,
            products: vec![OrderLineRequest {
                product_id: product.id,
                quantity,
            }],
        })
        .await
        .expect("seed order")
        .items[0]
        .order_item_id
}

fn request(order_item_id: i32, reason: &str, quantity: i32) -> ReturnRequest {
    ReturnRequest {
        order_item_id,
        return_reason: reason.to_string(),
        quantity,
        return_date: None,
    }
}

async fn returns_for(db: &DbPool, order_item_id: i32) -> Vec<return_entity::Model> {
    return_entity::Entity::find()
        .filter(return_entity::Column::OrderItemId.eq(order_item_id))
        .all(db)
        .await
        .unwrap()
}

#[tokio::test]
async fn repeated_returns_merge_and_overflow_is_rejected() {
    let db = test_db().await;
    let (events, mut rx) = event_channel();
    let orders = OrderService::new(db.clone(), events.clone());
    let returns = ReturnService::new(db.clone(), events);
    let item_id = ordered_item(&db, &orders, 5).await;
    drain_events(&mut rx);

    let first = returns
        .process_returns(ProcessReturnsCommand::new(vec![request(item_id, "damage", 2)]))
        .await
        .unwrap();
    assert!(!first.returns[0].merged);

    let second = returns
        .process_returns(ProcessReturnsCommand::new(vec![request(item_id, "wrong size", 2)]))
        .await
        .unwrap();
    assert!(second.returns[0].merged);
    assert_eq!(second.returns[0].return_id, first.returns[0].return_id);
    assert_eq!(second.returns[0].quantity, 4);

    let rows = returns_for(&db, item_id).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, 4);
    assert_eq!(rows[0].return_reason, "damage");
    assert_eq!(rows[0].return_status, "pending");

    let third = returns
        .process_returns(ProcessReturnsCommand::new(vec![request(item_id, "damage", 2)]))
        .await;
    assert_matches!(
        third,
        Err(ServiceError::ReturnQuantityExceeded { requested_total: 6, ordered: 5, .. })
    );
    assert_eq!(returns_for(&db, item_id).await[0].quantity, 4);

    let published = drain_events(&mut rx);
    assert_eq!(published.len(), 2);
    assert!(published
        .iter()
        .all(|e| matches!(e, Event::ReturnsProcessed { .. })));
}

#[tokio::test]
async fn huge_follow_up_return_is_rejected_as_exceeded() {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let orders = OrderService::new(db.clone(), events.clone());
    let returns = ReturnService::new(db.clone(), events);
    let item_id = ordered_item(&db, &orders, 5).await;

    returns
        .process_returns(ProcessReturnsCommand::new(vec![request(item_id, "damage", 1)]))
        .await
        .unwrap();

    let oversized = returns
        .process_returns(ProcessReturnsCommand::new(vec![request(item_id, "damage", i32::MAX)]))
        .await;
    assert_matches!(
        oversized,
        Err(ServiceError::ReturnQuantityExceeded { ordered: 5, .. })
    );
    assert_eq!(returns_for(&db, item_id).await[0].quantity, 1);
}

#[tokio::test]
async fn batch_is_atomic_when_a_later_line_fails() {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let orders = OrderService::new(db.clone(), events.clone());
    let returns = ReturnService::new(db.clone(), events);
    let item_id = ordered_item(&db, &orders, 3).await;

    let result = returns
        .process_returns(ProcessReturnsCommand::new(vec![
            request(item_id, "damage", 1),
            request(4_040, "damage", 1),
        ]))
        .await;

    assert_matches!(result, Err(ServiceError::OrderItemNotFound(4_040)));
    assert_eq!(return_entity::Entity::find().count(db.as_ref()).await.unwrap(), 0);
}

#[tokio::test]
async fn lines_in_one_batch_accumulate_against_the_same_item() {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let orders = OrderService::new(db.clone(), events.clone());
    let returns = ReturnService::new(db.clone(), events);
    let item_id = ordered_item(&db, &orders, 3).await;

    let over = returns
        .process_returns(ProcessReturnsCommand::new(vec![
            request(item_id, "damage", 2),
            request(item_id, "damage", 2),
        ]))
        .await;
    assert_matches!(over, Err(ServiceError::ReturnQuantityExceeded { .. }));
    assert!(returns_for(&db, item_id).await.is_empty());

    let exact = returns
        .process_returns(ProcessReturnsCommand::new(vec![
            request(item_id, "damage", 2),
            request(item_id, "damage", 1),
        ]))
        .await
        .unwrap();
    assert_eq!(exact.returns[1].quantity, 3);

    let line = order_item::Entity::find_by_id(item_id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(line.status, "returned");

    let details = orders.get_order(line.order_id).await.unwrap();
    assert_eq!(details.items[0].returned_quantity, 3);
    assert_eq!(details.items[0].return_status.as_deref(), Some("pending"));
}

#[tokio::test]
async fn invalid_requests_never_reach_the_store() {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let returns = ReturnService::new(db.clone(), events);

    assert_matches!(
        returns.process_returns(ProcessReturnsCommand::new(vec![])).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        returns
            .process_returns(ProcessReturnsCommand::new(vec![request(1, "", 1)]))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        returns
            .process_returns(ProcessReturnsCommand::new(vec![request(1, "damage", 0)]))
            .await,
        Err(ServiceError::ValidationError(_))
    );
}
