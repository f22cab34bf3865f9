//! Property-based tests for return accumulation.
//!
//! Whatever sequence of return requests arrives for an order item, the stored
//! return never exceeds the ordered quantity and equals the sum of the
//! requests that were accepted.

mod common;

use common::{event_channel, seed_product, test_db};
use erp_api::{
    commands::orders::{CreateOrderCommand, OrderLineRequest},
    commands::returns::{ProcessReturnsCommand, ReturnRequest},
    entities::return_entity,
    errors::ServiceError,
    services::{orders::OrderService, returns::ReturnService},
};
use proptest::prelude::*;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

/// Replays `requests` one batch at a time; returns (stored quantity, expected quantity).
async fn replay(ordered: i32, requests: Vec<i32>) -> (i32, i32) {
    let db = test_db().await;
    let (events, _rx) = event_channel();
    let orders = OrderService::new(db.clone(), events.clone());
    let returns = ReturnService::new(db.clone(), events);

    let product = seed_product(&db, "Chair", dec!(15.00), ordered).await;
    let item_id = orders
        .create_order(CreateOrderCommand {
            customer_id: 1,
            order_date: None,
            products: vec![OrderLineRequest {
                product_id: product.id,
                quantity: ordered,
            }],
        })
        .await
        .expect("seed order")
        .items[0]
        .order_item_id;

    let mut expected = 0;
    for quantity in requests {
        let result = returns
            .process_returns(ProcessReturnsCommand::new(vec![ReturnRequest {
                order_item_id: item_id,
                return_reason: "damage".to_string(),
                quantity,
                return_date: None,
            }]))
            .await;

        if expected + quantity <= ordered {
            let processed = result.expect("return within the ordered quantity");
            expected += quantity;
            assert_eq!(processed.returns[0].quantity, expected);
        } else {
            assert!(matches!(
                result,
                Err(ServiceError::ReturnQuantityExceeded { .. })
            ));
        }
    }

    let stored = return_entity::Entity::find()
        .filter(return_entity::Column::OrderItemId.eq(item_id))
        .all(db.as_ref())
        .await
        .expect("load returns");
    assert!(stored.len() <= 1, "one return row per order item");

    (stored.first().map(|r| r.quantity).unwrap_or(0), expected)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn returned_quantity_never_exceeds_ordered(
        ordered in 1i32..12,
        requests in prop::collection::vec(1i32..6, 1..8),
    ) {
        let (stored, expected) = runtime().block_on(replay(ordered, requests));
        prop_assert!(stored <= ordered);
        prop_assert_eq!(stored, expected);
    }
}
