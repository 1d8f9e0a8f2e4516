use crate::{roles::Role, SecurityContext, SecurityError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    InventoryView,
    InventoryManage,
    StockAdjust,
    ReportsView,
}

// Which roles are allowed each capability. Front desk and housekeeping read
// stock levels (minibar, linen) but never mutate items or quantities.
fn allowed_roles(cap: Capability) -> &'static [Role] {
    use Capability::*;
    use Role::*;
    match cap {
        InventoryView => &[SuperAdmin, Admin, Manager, Storekeeper, FrontDesk, Housekeeping],
        InventoryManage => &[SuperAdmin, Admin, Manager],
        StockAdjust => &[SuperAdmin, Admin, Manager, Storekeeper],
        ReportsView => &[SuperAdmin, Admin, Manager, Storekeeper],
    }
}

pub fn ensure_capability(ctx: &SecurityContext, cap: Capability) -> Result<(), SecurityError> {
    let allowed = allowed_roles(cap);
    if ctx.roles.iter().any(|r| allowed.iter().any(|a| a == r)) { return Ok(()); }
    Err(SecurityError::Forbidden)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common_audit::AuditActor;
    use uuid::Uuid;

    fn mk_ctx(roles: Vec<Role>) -> SecurityContext {
        SecurityContext { tenant_id: Uuid::new_v4(), actor: AuditActor { id: Some(Uuid::new_v4()), name: None, email: None }, roles, trace_id: None }
    }

    #[test]
    fn front_desk_cannot_manage_items() {
        let ctx = mk_ctx(vec![Role::FrontDesk]);
        assert!(ensure_capability(&ctx, Capability::InventoryManage).is_err(), "FrontDesk should not manage items");
        assert!(ensure_capability(&ctx, Capability::StockAdjust).is_err(), "FrontDesk should not adjust stock");
    }

    #[test]
    fn storekeeper_can_adjust_stock_but_not_manage_items() {
        let ctx = mk_ctx(vec![Role::Storekeeper]);
        assert!(ensure_capability(&ctx, Capability::StockAdjust).is_ok());
        assert!(ensure_capability(&ctx, Capability::InventoryManage).is_err());
    }

    #[test]
    fn housekeeping_can_view() {
        let ctx = mk_ctx(vec![Role::Housekeeping]);
        assert!(ensure_capability(&ctx, Capability::InventoryView).is_ok());
    }

    #[test]
    fn superadmin_has_all() {
        let ctx = mk_ctx(vec![Role::SuperAdmin]);
        for cap in [Capability::InventoryView, Capability::InventoryManage, Capability::StockAdjust, Capability::ReportsView] {
            assert!(ensure_capability(&ctx, cap).is_ok(), "SuperAdmin missing {:?}", cap);
        }
    }

    #[test]
    fn unknown_role_gets_nothing() {
        let ctx = mk_ctx(vec![Role::Unknown("chef".into())]);
        assert!(ensure_capability(&ctx, Capability::InventoryView).is_err());
    }
}
