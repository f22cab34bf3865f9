/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Declarative policy table mapping each permission to the roles allowed to
 * invoke it. Unknown permissions are denied to every role.
 */

use super::permissions::consts;
use super::{Actor, AuthError};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::{Display, EnumString};
use tracing::warn;

/// Roles carried in the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Role {
    Admin,
    Warehouse,
    Sale,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Warehouse => "Warehouse",
            Role::Sale => "Sale",
        }
    }
}

const ALL_ROLES: &[Role] = &[Role::Admin, Role::Warehouse, Role::Sale];
const OPERATIONS: &[Role] = &[Role::Admin, Role::Warehouse];

// Define the policy table
lazy_static! {
    pub static ref POLICY: HashMap<&'static str, &'static [Role]> = {
        let mut policy: HashMap<&'static str, &'static [Role]> = HashMap::new();

        // Orders
        policy.insert(consts::ORDERS_CREATE, ALL_ROLES);
        policy.insert(consts::ORDERS_READ, ALL_ROLES);
        policy.insert(consts::ORDERS_UPDATE_STATUS, OPERATIONS);

        // Deliveries
        policy.insert(consts::DELIVERIES_CREATE, OPERATIONS);
        policy.insert(consts::DELIVERIES_READ, ALL_ROLES);
        policy.insert(consts::DELIVERIES_UPDATE_STATUS, OPERATIONS);

        // Returns
        policy.insert(consts::RETURNS_CREATE, ALL_ROLES);
        policy.insert(consts::RETURNS_ASSIGN_SERVICE_CENTER, OPERATIONS);
        policy.insert(consts::RETURNS_UPDATE_STATUS, OPERATIONS);
        policy.insert(consts::RETURNS_READ_QUEUE, OPERATIONS);

        policy
    };
}

/// Roles allowed to use `permission`; empty when the permission is unknown.
pub fn allowed_roles(permission: &str) -> &'static [Role] {
    POLICY.get(permission).copied().unwrap_or(&[])
}

/// Fails when the actor's role is not allowed for `permission`.
pub fn check_privilege(actor: &Actor, permission: &str) -> Result<(), AuthError> {
    if allowed_roles(permission).contains(&actor.role) {
        return Ok(());
    }

    warn!(
        user_id = %actor.user_id,
        role = actor.role.as_str(),
        permission,
        "privilege check failed"
    );
    Err(AuthError::InsufficientPermissions)
}
