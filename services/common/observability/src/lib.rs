use prometheus::{Histogram, IntCounter, IntCounterVec, IntGauge, Registry};

#[derive(Clone)]
pub struct InventoryMetrics {
    pub registry: Registry,
    pub http_errors_total: IntCounterVec,
    pub stock_movements_total: IntCounterVec,
    pub insufficient_stock_rejections: IntCounter,
    pub audit_emit_failures: IntCounter,
    pub low_stock_items: IntGauge,
    pub low_stock_sweep_duration_seconds: Histogram,
}

impl InventoryMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let http_errors_total = IntCounterVec::new(
            prometheus::Opts::new(
                "http_errors_total",
                "Count of HTTP error responses emitted (status >= 400)"
            ),
            &["service", "code", "status"]
        ).unwrap();
        let stock_movements_total = IntCounterVec::new(
            prometheus::Opts::new(
                "stock_movements_total",
                "Committed stock transactions by type"
            ),
            &["type"]
        ).unwrap();
        let insufficient_stock_rejections = IntCounter::new(
            "insufficient_stock_rejections_total",
            "Stock mutations rejected for driving quantity below zero",
        ).unwrap();
        let audit_emit_failures = IntCounter::new(
            "audit_event_emit_failures_total",
            "Audit event emission failures",
        ).unwrap();
        // Single gauge across tenants; per-tenant labels would be unbounded
        let low_stock_items = IntGauge::new(
            "low_stock_items",
            "Active items at or below their reorder level, all tenants",
        ).unwrap();
        let low_stock_sweep_duration_seconds = Histogram::with_opts(
            prometheus::HistogramOpts::new(
                "low_stock_sweep_duration_seconds",
                "Duration of a low-stock sweep"
            ).buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0])
        ).unwrap();
        let _ = registry.register(Box::new(http_errors_total.clone()));
        let _ = registry.register(Box::new(stock_movements_total.clone()));
        let _ = registry.register(Box::new(insufficient_stock_rejections.clone()));
        let _ = registry.register(Box::new(audit_emit_failures.clone()));
        let _ = registry.register(Box::new(low_stock_items.clone()));
        let _ = registry.register(Box::new(low_stock_sweep_duration_seconds.clone()));
        InventoryMetrics {
            registry,
            http_errors_total,
            stock_movements_total,
            insufficient_stock_rejections,
            audit_emit_failures,
            low_stock_items,
            low_stock_sweep_duration_seconds,
        }
    }
}

impl Default for InventoryMetrics {
    fn default() -> Self { Self::new() }
}
