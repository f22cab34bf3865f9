pub mod assign_service_center_command;
pub mod process_returns_command;
pub mod update_return_status_command;

pub use assign_service_center_command::{AssignServiceCenterCommand, AssignServiceCenterResult};
pub use process_returns_command::{
    ProcessReturnsCommand, ProcessReturnsResult, ProcessedReturn, ReturnRequest,
};
pub use update_return_status_command::{UpdateReturnStatusCommand, UpdateReturnStatusResult};
