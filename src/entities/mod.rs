pub mod delivery;
pub mod driver;
pub mod order;
pub mod order_item;
pub mod product;
pub mod return_entity;
pub mod service_center;
pub mod truck;

pub use delivery::DeliveryStatus;
pub use driver::DriverStatus;
pub use order::OrderStatus;
pub use order_item::OrderItemStatus;
pub use return_entity::{ReturnStatus, DAMAGE_REASON};
pub use truck::TruckStatus;
