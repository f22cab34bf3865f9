use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends after a committed workflow without waiting for channel capacity.
    /// A full or closed channel is logged and never surfaces to the caller.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.sender.try_send(event) {
            warn!(event = name, error = %e, "failed to publish domain event");
        }
    }
}

/// Domain events emitted once a workflow transaction has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i32,
        customer_id: i32,
        total_amount: Decimal,
        item_count: usize,
    },
    OrderStatusChanged {
        order_id: i32,
        old_status: String,
        new_status: String,
    },
    DeliveryCreated {
        delivery_id: i32,
        driver_id: i32,
        truck_id: i32,
        order_ids: Vec<i32>,
    },
    DeliveryStatusChanged {
        delivery_id: i32,
        old_status: String,
        new_status: String,
    },
    ReturnsProcessed {
        return_ids: Vec<i32>,
        processed_at: DateTime<Utc>,
    },
    ReturnStatusChanged {
        return_id: i32,
        old_status: String,
        new_status: String,
    },
    ReturnAssignedToServiceCenter {
        return_id: i32,
        service_center_id: i32,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::DeliveryCreated { .. } => "delivery_created",
            Event::DeliveryStatusChanged { .. } => "delivery_status_changed",
            Event::ReturnsProcessed { .. } => "returns_processed",
            Event::ReturnStatusChanged { .. } => "return_status_changed",
            Event::ReturnAssignedToServiceCenter { .. } => "return_assigned_to_service_center",
        }
    }
}

// Handlers implementing this trait receive every event in arrival order.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Writes a structured log line per event.
pub struct LoggingEventHandler;

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle_event(&self, event: &Event) -> Result<(), String> {
        match event {
            Event::OrderCreated {
                order_id,
                customer_id,
                total_amount,
                item_count,
            } => {
                info!(order_id, customer_id, %total_amount, item_count, "order created");
            }
            Event::DeliveryCreated {
                delivery_id,
                driver_id,
                truck_id,
                order_ids,
            } => {
                info!(
                    delivery_id,
                    driver_id,
                    truck_id,
                    orders = order_ids.len(),
                    "delivery dispatched"
                );
            }
            Event::ReturnsProcessed { return_ids, .. } => {
                info!(returns = ?return_ids, "returns recorded");
            }
            Event::ReturnAssignedToServiceCenter {
                return_id,
                service_center_id,
            } => {
                info!(return_id, service_center_id, "return routed to service center");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, %old_status, %new_status, "order status changed");
            }
            Event::DeliveryStatusChanged {
                delivery_id,
                old_status,
                new_status,
            } => {
                info!(delivery_id, %old_status, %new_status, "delivery status changed");
            }
            Event::ReturnStatusChanged {
                return_id,
                old_status,
                new_status,
            } => {
                info!(return_id, %old_status, %new_status, "return status changed");
            }
        }
        Ok(())
    }
}

// Drains the channel and fans each event out to the registered handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!(handlers = handlers.len(), "Starting event processing loop");

    while let Some(event) = rx.recv().await {
        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(event = event.name(), error = %e, "event handler failed");
            }
        }
    }

    warn!("Event processing loop has ended");
}
