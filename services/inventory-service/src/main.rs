use anyhow::Context;
use common_audit::{AuditProducer, PgAuditSink};
use common_money::log_rounding_mode_once;
use common_observability::InventoryMetrics;
use inventory_service::{build_router, AppState, SERVICE_NAME};
use sqlx::PgPool;
use std::{env, net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();
    log_rounding_mode_once();

    let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let db = PgPool::connect(&database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let low_stock_sweep = env::var("LOW_STOCK_SWEEP_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(300));

    let metrics = Arc::new(InventoryMetrics::new());
    let audit = AuditProducer::for_service(PgAuditSink::new(db.clone()), SERVICE_NAME);
    let state = AppState {
        db,
        metrics: metrics.clone(),
        audit,
        low_stock_sweep,
    };

    spawn_low_stock_sweeper(state.clone());

    let app = build_router(state);

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8091);
    let ip: std::net::IpAddr = host.parse()?;
    let addr = SocketAddr::from((ip, port));
    info!(%addr, "starting inventory-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically counts active items at or below their reorder level and
/// publishes the count as a gauge, so alerting does not depend on anyone
/// polling the low-stock endpoint.
fn spawn_low_stock_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = interval(state.low_stock_sweep);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_count: Option<i64> = None;
        loop {
            ticker.tick().await;
            let start = std::time::Instant::now();
            match sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM inventory_items
                 WHERE is_active = TRUE AND quantity_in_stock <= reorder_level",
            )
            .fetch_one(&state.db)
            .await
            {
                Ok(count) => {
                    state.metrics.low_stock_items.set(count);
                    if last_count.is_some_and(|prev| count > prev) {
                        info!(count, "More items dropped to or below their reorder level");
                    }
                    last_count = Some(count);
                }
                Err(err) => error!(?err, "Low-stock sweep query failed"),
            }
            state
                .metrics
                .low_stock_sweep_duration_seconds
                .observe(start.elapsed().as_secs_f64());
        }
    });
}
