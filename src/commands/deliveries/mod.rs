pub mod create_delivery_command;
pub mod update_delivery_status_command;

pub use create_delivery_command::{CreateDeliveryCommand, CreateDeliveryResult};
pub use update_delivery_status_command::{
    UpdateDeliveryStatusCommand, UpdateDeliveryStatusResult,
};
