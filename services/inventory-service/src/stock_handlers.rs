use crate::item_handlers::{record_item_audit, InventoryItem, ITEM_COLUMNS};
use crate::responses::{CountedEnvelope, Envelope, ListEnvelope};
use crate::{AppState, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_http_errors::ApiError;
use common_money::{normalize_scale, Money};
use common_security::{ensure_capability, Capability, SecurityCtxExtractor};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{query_as, FromRow, Postgres, QueryBuilder, Row};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockTransactionType {
    Restock,
    Consumption,
    Transfer,
    Adjustment,
    Waste,
    Return,
}

impl StockTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restock => "restock",
            Self::Consumption => "consumption",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
            Self::Waste => "waste",
            Self::Return => "return",
        }
    }
}

impl fmt::Display for StockTransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StockTransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restock" => Ok(Self::Restock),
            "consumption" => Ok(Self::Consumption),
            "transfer" => Ok(Self::Transfer),
            "adjustment" => Ok(Self::Adjustment),
            "waste" => Ok(Self::Waste),
            "return" => Ok(Self::Return),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

/// Maps a request quantity to the signed delta stored in the ledger.
///
/// Inbound types (restock, return) require a positive quantity. Outbound
/// types (consumption, waste) take a positive magnitude and are stored
/// negated. Transfers and adjustments are signed as given. Zero never
/// moves stock and is rejected everywhere.
pub fn signed_delta(tx_type: StockTransactionType, quantity: i32) -> Result<i32, &'static str> {
    use StockTransactionType::*;
    if quantity == 0 {
        return Err("quantity must not be zero");
    }
    match tx_type {
        Restock | Return => {
            if quantity < 0 {
                Err("quantity must be positive for inbound stock")
            } else {
                Ok(quantity)
            }
        }
        Consumption | Waste => {
            if quantity < 0 {
                Err("quantity must be a positive amount to deduct")
            } else {
                Ok(-quantity)
            }
        }
        Transfer | Adjustment => Ok(quantity),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDeltaError {
    InsufficientStock,
    Overflow,
}

/// Applies a signed delta to the current quantity, rejecting results below
/// zero and additions that overflow the counter.
pub fn apply_delta(current: i32, delta: i32) -> Result<i32, StockDeltaError> {
    match current.checked_add(delta) {
        Some(q) if q >= 0 => Ok(q),
        Some(_) => Err(StockDeltaError::InsufficientStock),
        None => Err(StockDeltaError::Overflow),
    }
}

pub const TRANSACTION_COLUMNS: &str =
    "id, tenant_id, item_id, transaction_type, quantity, unit_price, transaction_date, department, \
     reference_number, reason, performed_by, performed_by_name, status, created_at";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub item_id: Uuid,
    pub transaction_type: String,
    pub quantity: i32,
    pub unit_price: Option<Money>,
    pub transaction_date: DateTime<Utc>,
    pub department: Option<String>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub performed_by: Option<Uuid>,
    pub performed_by_name: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    #[serde(rename = "type")]
    pub transaction_type: StockTransactionType,
    pub quantity: i32,
    pub unit_price: Option<BigDecimal>,
    /// Defaults to now when the caller does not supply one.
    pub transaction_date: Option<DateTime<Utc>>,
    pub department: Option<String>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StockAdjustment {
    pub item: InventoryItem,
    pub transaction: StockTransaction,
}

/// Applies one stock movement: locks the item row, appends the ledger entry
/// and updates the cached quantity in a single database transaction.
pub async fn adjust_stock(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(item_id): Path<Uuid>,
    Json(req): Json<AdjustStockRequest>,
) -> Result<Json<Envelope<StockAdjustment>>, ApiError> {
    ensure_capability(&sec, Capability::StockAdjust)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "stock_adjust", trace_id: sec.trace_id })?;

    let delta = signed_delta(req.transaction_type, req.quantity)
        .map_err(|msg| ApiError::bad_request_msg("invalid_quantity", sec.trace_id, msg))?;

    let mut tx = state.db.begin().await.map_err(|e| ApiError::internal(e, sec.trace_id))?;

    // FOR UPDATE serializes concurrent movements against the same item.
    let item = query_as::<_, InventoryItem>(
        &format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 AND tenant_id = $2 FOR UPDATE"),
    )
    .bind(item_id)
    .bind(sec.tenant_id)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;
    let item = match item {
        Some(item) => item,
        None => return Err(ApiError::not_found("item_not_found", sec.trace_id)),
    };

    let new_quantity = match apply_delta(item.quantity_in_stock, delta) {
        Ok(q) => q,
        Err(StockDeltaError::InsufficientStock) => {
            state.metrics.insufficient_stock_rejections.inc();
            return Err(ApiError::bad_request_msg(
                "insufficient_stock",
                sec.trace_id,
                format!(
                    "Cannot deduct {} from '{}': only {} in stock",
                    delta.unsigned_abs(),
                    item.name,
                    item.quantity_in_stock
                ),
            ));
        }
        Err(StockDeltaError::Overflow) => {
            return Err(ApiError::bad_request_msg(
                "invalid_quantity",
                sec.trace_id,
                "adjustment would overflow the stock counter",
            ));
        }
    };

    let unit_price = req
        .unit_price
        .map(|p| normalize_scale(&p))
        .unwrap_or_else(|| item.price_per_unit.inner().clone());
    let transaction_date = req.transaction_date.unwrap_or_else(Utc::now);

    let transaction = query_as::<_, StockTransaction>(
        &format!(
            "INSERT INTO stock_transactions (id, tenant_id, item_id, transaction_type, quantity, unit_price, transaction_date, department, reference_number, reason, performed_by, performed_by_name)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {TRANSACTION_COLUMNS}"
        ),
    )
    .bind(Uuid::new_v4())
    .bind(sec.tenant_id)
    .bind(item.id)
    .bind(req.transaction_type.as_str())
    .bind(delta)
    .bind(&unit_price)
    .bind(transaction_date)
    .bind(req.department.as_deref().filter(|s| !s.is_empty()))
    .bind(req.reference_number.as_deref().filter(|s| !s.is_empty()))
    .bind(req.reason.as_deref().filter(|s| !s.is_empty()))
    .bind(sec.actor.id)
    .bind(sec.actor.name.as_deref())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    let item = query_as::<_, InventoryItem>(
        &format!(
            "UPDATE inventory_items SET quantity_in_stock = $1, updated_at = NOW()
             WHERE id = $2 AND tenant_id = $3
             RETURNING {ITEM_COLUMNS}"
        ),
    )
    .bind(new_quantity)
    .bind(item.id)
    .bind(sec.tenant_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, sec.trace_id))?;

    state
        .metrics
        .stock_movements_total
        .with_label_values(&[req.transaction_type.as_str()])
        .inc();

    // Corrections against deactivated items are allowed; the audit row
    // flags them so reviewers can tell.
    let payload = json!({
        "transaction_id": transaction.id,
        "type": transaction.transaction_type,
        "quantity": transaction.quantity,
        "quantity_after": item.quantity_in_stock,
        "department": transaction.department,
        "reference_number": transaction.reference_number,
        "item_active": item.is_active,
    });
    record_item_audit(&state, &sec, item.id, "stock_adjusted", payload, json!({})).await;

    tracing::info!(
        item_id = %item.id,
        tx_type = %req.transaction_type,
        delta,
        quantity_after = item.quantity_in_stock,
        "Recorded stock movement"
    );

    Ok(Json(Envelope::ok(StockAdjustment { item, transaction })))
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(rename = "type")]
    pub transaction_type: Option<StockTransactionType>,
}

fn apply_transaction_filters(
    qb: &mut QueryBuilder<'_, Postgres>,
    tenant_id: Uuid,
    item_id: Uuid,
    params: &TransactionListQuery,
) {
    qb.push_bind(tenant_id);
    qb.push(" AND item_id = ");
    qb.push_bind(item_id);
    if let Some(start) = params.start_date {
        qb.push(" AND transaction_date >= ");
        qb.push_bind(start);
    }
    if let Some(end) = params.end_date {
        qb.push(" AND transaction_date <= ");
        qb.push_bind(end);
    }
    if let Some(tx_type) = params.transaction_type {
        qb.push(" AND transaction_type = ");
        qb.push_bind(tx_type.as_str());
    }
}

pub async fn list_item_transactions(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(item_id): Path<Uuid>,
    Query(params): Query<TransactionListQuery>,
) -> Result<Json<ListEnvelope<StockTransaction>>, ApiError> {
    ensure_capability(&sec, Capability::InventoryView)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "inventory_view", trace_id: sec.trace_id })?;

    let exists: Option<(Uuid,)> = query_as("SELECT id FROM inventory_items WHERE id = $1 AND tenant_id = $2")
        .bind(item_id)
        .bind(sec.tenant_id)
        .fetch_optional(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, sec.trace_id))?;
    if exists.is_none() {
        return Err(ApiError::not_found("item_not_found", sec.trace_id));
    }

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let offset = (page - 1) * limit;

    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM stock_transactions WHERE tenant_id = ");
    apply_transaction_filters(&mut count_qb, sec.tenant_id, item_id, &params);
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    let mut qb = QueryBuilder::<Postgres>::new(format!(
        "SELECT {TRANSACTION_COLUMNS} FROM stock_transactions WHERE tenant_id = "
    ));
    apply_transaction_filters(&mut qb, sec.tenant_id, item_id, &params);
    qb.push(" ORDER BY transaction_date DESC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    let transactions = qb
        .build_query_as::<StockTransaction>()
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    Ok(Json(ListEnvelope::ok(transactions, total, page, limit)))
}

pub async fn list_low_stock(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> Result<Json<CountedEnvelope<InventoryItem>>, ApiError> {
    ensure_capability(&sec, Capability::InventoryView)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "inventory_view", trace_id: sec.trace_id })?;

    let items = query_as::<_, InventoryItem>(
        &format!(
            "SELECT {ITEM_COLUMNS} FROM inventory_items
             WHERE tenant_id = $1 AND is_active = TRUE AND quantity_in_stock <= reorder_level
             ORDER BY quantity_in_stock ASC, name ASC"
        ),
    )
    .bind(sec.tenant_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    Ok(Json(CountedEnvelope::ok(items)))
}

#[derive(Debug, Serialize)]
pub struct CategoryStats {
    pub category: String,
    pub item_count: i64,
    pub total_value: Money,
}

#[derive(Debug, Serialize)]
pub struct InventoryStats {
    pub total_items: i64,
    pub active_items: i64,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
    pub total_stock_value: Money,
    pub categories: Vec<CategoryStats>,
}

pub async fn inventory_stats(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
) -> Result<Json<Envelope<InventoryStats>>, ApiError> {
    ensure_capability(&sec, Capability::ReportsView)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "reports_view", trace_id: sec.trace_id })?;

    let row = sqlx::query(
        "SELECT COUNT(*) AS total_items,
                COUNT(*) FILTER (WHERE is_active) AS active_items,
                COUNT(*) FILTER (WHERE is_active AND quantity_in_stock > 0 AND quantity_in_stock <= reorder_level) AS low_stock_count,
                COUNT(*) FILTER (WHERE is_active AND quantity_in_stock = 0) AS out_of_stock_count,
                COALESCE(SUM(price_per_unit * quantity_in_stock) FILTER (WHERE is_active), 0) AS total_stock_value
         FROM inventory_items WHERE tenant_id = $1",
    )
    .bind(sec.tenant_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    let categories = sqlx::query(
        "SELECT category,
                COUNT(*) AS item_count,
                COALESCE(SUM(price_per_unit * quantity_in_stock), 0) AS total_value
         FROM inventory_items
         WHERE tenant_id = $1 AND is_active = TRUE
         GROUP BY category
         ORDER BY category",
    )
    .bind(sec.tenant_id)
    .fetch_all(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?
    .into_iter()
    .map(|r| CategoryStats {
        category: r.get("category"),
        item_count: r.get("item_count"),
        total_value: Money::new(r.get::<BigDecimal, _>("total_value")),
    })
    .collect();

    let stats = InventoryStats {
        total_items: row.get("total_items"),
        active_items: row.get("active_items"),
        low_stock_count: row.get("low_stock_count"),
        out_of_stock_count: row.get("out_of_stock_count"),
        total_stock_value: Money::new(row.get::<BigDecimal, _>("total_stock_value")),
        categories,
    };

    Ok(Json(Envelope::ok(stats)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_types_require_positive_quantity() {
        assert_eq!(signed_delta(StockTransactionType::Restock, 10), Ok(10));
        assert_eq!(signed_delta(StockTransactionType::Return, 3), Ok(3));
        assert!(signed_delta(StockTransactionType::Restock, -5).is_err());
        assert!(signed_delta(StockTransactionType::Return, -1).is_err());
    }

    #[test]
    fn outbound_types_store_negated_magnitude() {
        assert_eq!(signed_delta(StockTransactionType::Consumption, 4), Ok(-4));
        assert_eq!(signed_delta(StockTransactionType::Waste, 2), Ok(-2));
        assert!(signed_delta(StockTransactionType::Consumption, -4).is_err());
    }

    #[test]
    fn signed_types_pass_through() {
        assert_eq!(signed_delta(StockTransactionType::Transfer, -7), Ok(-7));
        assert_eq!(signed_delta(StockTransactionType::Transfer, 7), Ok(7));
        assert_eq!(signed_delta(StockTransactionType::Adjustment, -2), Ok(-2));
    }

    #[test]
    fn apply_delta_guards_floor_and_ceiling() {
        assert_eq!(apply_delta(10, -4), Ok(6));
        assert_eq!(apply_delta(10, -10), Ok(0));
        assert_eq!(apply_delta(10, -11), Err(StockDeltaError::InsufficientStock));
        assert_eq!(apply_delta(i32::MAX, 1), Err(StockDeltaError::Overflow));
        assert_eq!(apply_delta(i32::MAX - 5, 5), Ok(i32::MAX));
    }

    #[test]
    fn zero_is_rejected_for_every_type() {
        use StockTransactionType::*;
        for t in [Restock, Consumption, Transfer, Adjustment, Waste, Return] {
            assert!(signed_delta(t, 0).is_err(), "{t} accepted zero");
        }
    }

    #[test]
    fn transaction_type_round_trips_through_str() {
        use StockTransactionType::*;
        for t in [Restock, Consumption, Transfer, Adjustment, Waste, Return] {
            assert_eq!(t.as_str().parse::<StockTransactionType>(), Ok(t));
        }
        assert!("refund".parse::<StockTransactionType>().is_err());
    }

    #[test]
    fn adjust_request_accepts_wire_shape() {
        let req: AdjustStockRequest = serde_json::from_str(
            r#"{"type":"consumption","quantity":3,"department":"housekeeping","reason":"Room 204 minibar"}"#,
        )
        .unwrap();
        assert_eq!(req.transaction_type, StockTransactionType::Consumption);
        assert_eq!(req.quantity, 3);
        assert!(req.transaction_date.is_none());
    }
}
