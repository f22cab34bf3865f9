// Workflow-facing services
pub mod deliveries;
pub mod orders;
pub mod returns;
