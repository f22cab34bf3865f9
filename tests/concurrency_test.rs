//! Concurrent workflow requests competing for the same stock, fleet or return slot.

mod common;

use common::{event_channel, seed_driver, seed_product, seed_truck, test_db};
use erp_api::{
    commands::deliveries::CreateDeliveryCommand,
    commands::orders::{CreateOrderCommand, OrderLineRequest},
    commands::returns::{ProcessReturnsCommand, ReturnRequest},
    entities::{product, return_entity, DriverStatus, TruckStatus},
    errors::ServiceError,
    services::{deliveries::DeliveryService, orders::OrderService, returns::ReturnService},
};
use rust_decimal_macros::dec;
use sea_orm::EntityTrait;

fn single_line(product_id: i32, quantity: i32) -> CreateOrderCommand {
    CreateOrderCommand {
        customer_id: 1,
        order_date: None,
        products: vec![OrderLineRequest {
            product_id,
            quantity,
        }],
    }
}

#[tokio::test]
async fn concurrent_orders_never_oversell() {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let orders = OrderService::new(db.clone(), events);
    let stocked = seed_product(&db, "Scarce", dec!(1.00), 10).await;

    let mut tasks = vec![];
    for _ in 0..20 {
        let orders = orders.clone();
        let product_id = stocked.id;
        tasks.push(tokio::spawn(async move {
            orders.create_order(single_line(product_id, 1)).await
        }));
    }

    let mut success = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => success += 1,
            Err(e) => assert!(
                matches!(
                    e,
                    ServiceError::InsufficientStock { .. } | ServiceError::LostRace(_)
                ),
                "unexpected failure: {e}"
            ),
        }
    }

    let after = product::Entity::find_by_id(stocked.id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(success, 10, "exactly 10 orders should succeed; got {}", success);
    assert_eq!(after.stock_quantity, 0);
}

#[tokio::test]
async fn one_driver_is_dispatched_once() {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let orders = OrderService::new(db.clone(), events.clone());
    let deliveries = DeliveryService::new(db.clone(), events);

    let stocked = seed_product(&db, "Box", dec!(1.00), 10).await;
    let driver = seed_driver(&db, "Solo", DriverStatus::Available).await;

    let mut tasks = vec![];
    for n in 0..5 {
        let order_id = orders
            .create_order(single_line(stocked.id, 1))
            .await
            .unwrap()
            .order_id;
        let truck = seed_truck(&db, &format!("TRK-{n}"), TruckStatus::Available).await;
        let deliveries = deliveries.clone();
        let driver_id = driver.id;
        tasks.push(tokio::spawn(async move {
            deliveries
                .create_delivery(CreateDeliveryCommand {
                    driver_id,
                    truck_id: truck.id,
                    order_ids: vec![order_id],
                })
                .await
        }));
    }

    let mut success = 0;
    for task in tasks {
        match task.await.expect("task panicked") {
            Ok(_) => success += 1,
            Err(e) => assert!(
                matches!(
                    e,
                    ServiceError::DriverUnavailable(_) | ServiceError::LostRace(_)
                ),
                "unexpected failure: {e}"
            ),
        }
    }
    assert_eq!(success, 1);
}

#[tokio::test]
async fn concurrent_returns_respect_the_ordered_quantity() {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let orders = OrderService::new(db.clone(), events.clone());
    let returns = ReturnService::new(db.clone(), events);

    let stocked = seed_product(&db, "Mug", dec!(4.00), 10).await;
    let item_id = orders
        .create_order(single_line(stocked.id, 4))
        .await
        .unwrap()
        .items[0]
        .order_item_id;

    let mut tasks = vec![];
    for _ in 0..8 {
        let returns = returns.clone();
        tasks.push(tokio::spawn(async move {
            returns
                .process_returns(ProcessReturnsCommand::new(vec![ReturnRequest {
                    order_item_id: item_id,
                    return_reason: "damage".to_string(),
                    quantity: 1,
                    return_date: None,
                }]))
                .await
        }));
    }

    let mut success = 0;
    for task in tasks {
        if task.await.expect("task panicked").is_ok() {
            success += 1;
        }
    }

    let rows = return_entity::Entity::find().all(db.as_ref()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].quantity, success);
    assert_eq!(success, 4);
}
