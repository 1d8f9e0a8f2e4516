pub mod app;
pub mod item_handlers;
pub mod responses;
pub mod stock_handlers;

pub use crate::app::build_router;
pub use crate::item_handlers::*;
pub use crate::responses::*;
pub use crate::stock_handlers::*;

use common_audit::AuditProducer;
use common_observability::InventoryMetrics;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_REORDER_LEVEL: i32 = 5;
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

pub const SERVICE_NAME: &str = "inventory-service";

/// Shared application state; lives here (not main.rs) so tests and library
/// code can construct it.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub metrics: Arc<InventoryMetrics>,
    pub audit: AuditProducer,
    pub low_stock_sweep: Duration,
}
