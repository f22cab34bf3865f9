/*!
 * # Permissions Module
 *
 * Each workflow entry point is named by a `resource:action` permission.
 * The policy table in `rbac` decides which roles may use it.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE_STATUS: &'static str = "update_status";
    pub const ASSIGN_SERVICE_CENTER: &'static str = "assign_service_center";
    pub const READ_QUEUE: &'static str = "read_queue";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const ORDERS: &'static str = "orders";
    pub const DELIVERIES: &'static str = "deliveries";
    pub const RETURNS: &'static str = "returns";
}

/// Common permission string constants for compile-time safety
pub mod consts {
    // Orders
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_UPDATE_STATUS: &str = "orders:update_status";

    // Deliveries
    pub const DELIVERIES_CREATE: &str = "deliveries:create";
    pub const DELIVERIES_READ: &str = "deliveries:read";
    pub const DELIVERIES_UPDATE_STATUS: &str = "deliveries:update_status";

    // Returns
    pub const RETURNS_CREATE: &str = "returns:create";
    pub const RETURNS_ASSIGN_SERVICE_CENTER: &str = "returns:assign_service_center";
    pub const RETURNS_UPDATE_STATUS: &str = "returns:update_status";
    pub const RETURNS_READ_QUEUE: &str = "returns:read_queue";
}

/// Formats a permission string from resource and action
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}
