pub mod common;
pub mod deliveries;
pub mod orders;
pub mod returns;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    deliveries::DeliveryService, orders::OrderService, returns::ReturnService,
};
use std::sync::Arc;

/// Container for all the services used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub deliveries: Arc<DeliveryService>,
    pub returns: Arc<ReturnService>,
}

impl AppServices {
    /// Creates a new AppServices container sharing one pool and event channel
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db_pool.clone(), event_sender.clone())),
            deliveries: Arc::new(DeliveryService::new(
                db_pool.clone(),
                event_sender.clone(),
            )),
            returns: Arc::new(ReturnService::new(db_pool, event_sender)),
        }
    }
}
