use crate::context::SecurityContext;
use crate::SecurityError;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::str::FromStr;
use tracing::warn;

/// Hotel staff roles as propagated by the gateway in `X-Roles`.
/// Unknown values are preserved rather than rejected so a new role rolled
/// out at the gateway does not 500 older services.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    SuperAdmin,
    Admin,
    Manager,
    Storekeeper,
    FrontDesk,
    Housekeeping,
    Unknown(String),
}

impl FromStr for Role {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "super_admin" | "SuperAdmin" => Role::SuperAdmin,
            "admin" | "Admin" => Role::Admin,
            "manager" | "Manager" => Role::Manager,
            "storekeeper" | "Storekeeper" => Role::Storekeeper,
            "front_desk" | "FrontDesk" => Role::FrontDesk,
            "housekeeping" | "Housekeeping" => Role::Housekeeping,
            other => Role::Unknown(other.to_string()),
        })
    }
}

pub fn ensure_role(ctx: &SecurityContext, required: Role) -> Result<(), SecurityError> {
    if ctx.roles.iter().any(|r| *r == required) { return Ok(()); }
    warn!(tenant_id = %ctx.tenant_id, ?required, roles = ?ctx.roles, "role_check_failed");
    Err(SecurityError::Forbidden)
}

pub fn ensure_any_role(ctx: &SecurityContext, required: &[Role]) -> Result<(), SecurityError> {
    if ctx.roles.iter().any(|r| required.iter().any(|x| x == r)) { return Ok(()); }
    warn!(tenant_id = %ctx.tenant_id, ?required, roles = ?ctx.roles, "any_role_check_failed");
    Err(SecurityError::Forbidden)
}
