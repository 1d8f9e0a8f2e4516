use crate::responses::{Envelope, ListEnvelope};
use crate::{AppState, DEFAULT_PAGE_LIMIT, DEFAULT_REORDER_LEVEL, MAX_PAGE_LIMIT};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_audit::{AuditActor, AuditSeverity};
use common_http_errors::ApiError;
use common_money::{normalize_scale, Money};
use common_security::{ensure_capability, Capability, SecurityContext, SecurityCtxExtractor};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{query_as, Postgres, QueryBuilder};
use uuid::Uuid;

pub const ITEM_COLUMNS: &str =
    "id, tenant_id, sku, name, category, unit, quantity_in_stock, reorder_level, max_stock_level, \
     reorder_point, reorder_quantity, price_per_unit, supplier_id, location, is_active, \
     is_perishable, expiry_date, created_at, updated_at";

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub quantity_in_stock: i32,
    pub reorder_level: i32,
    pub max_stock_level: Option<i32>,
    pub reorder_point: Option<i32>,
    pub reorder_quantity: Option<i32>,
    pub price_per_unit: Money,
    pub supplier_id: Option<Uuid>,
    pub location: Option<String>,
    pub is_active: bool,
    pub is_perishable: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn total_value(&self) -> Money {
        Money::new(self.price_per_unit.inner() * BigDecimal::from(self.quantity_in_stock))
    }
}

// total_value is derived, never stored; serialize it alongside the columns.
impl Serialize for InventoryItem {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("InventoryItem", 20)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("tenant_id", &self.tenant_id)?;
        state.serialize_field("sku", &self.sku)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("category", &self.category)?;
        state.serialize_field("unit", &self.unit)?;
        state.serialize_field("quantity_in_stock", &self.quantity_in_stock)?;
        state.serialize_field("reorder_level", &self.reorder_level)?;
        state.serialize_field("max_stock_level", &self.max_stock_level)?;
        state.serialize_field("reorder_point", &self.reorder_point)?;
        state.serialize_field("reorder_quantity", &self.reorder_quantity)?;
        state.serialize_field("price_per_unit", &self.price_per_unit)?;
        state.serialize_field("total_value", &self.total_value())?;
        state.serialize_field("supplier_id", &self.supplier_id)?;
        state.serialize_field("location", &self.location)?;
        state.serialize_field("is_active", &self.is_active)?;
        state.serialize_field("is_perishable", &self.is_perishable)?;
        state.serialize_field("expiry_date", &self.expiry_date)?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("updated_at", &self.updated_at)?;
        state.end()
    }
}

fn item_to_value(item: &InventoryItem) -> Value {
    serde_json::to_value(item).unwrap_or(Value::Null)
}

/// Best-effort audit write; a failed audit never fails the request.
pub(crate) async fn record_item_audit(
    state: &AppState,
    sec: &SecurityContext,
    item_id: Uuid,
    action: &str,
    payload: Value,
    meta: Value,
) {
    let actor = AuditActor {
        id: sec.actor.id,
        name: sec.actor.name.clone(),
        email: sec.actor.email.clone(),
    };
    if let Err(err) = state
        .audit
        .emit(sec.tenant_id, actor, "inventory_item", Some(item_id), action, AuditSeverity::Info, sec.trace_id, payload, meta)
        .await
    {
        state.metrics.audit_emit_failures.inc();
        tracing::warn!(?err, item_id = %item_id, action, "Failed to write inventory audit event");
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<Uuid>,
    pub stock_status: Option<String>,
    pub is_active: Option<bool>,
}

/// Appends the tenant bind and every present filter to a builder whose SQL
/// already ends with `WHERE tenant_id = `. Empty strings count as absent,
/// matching the wire contract (clients omit empty filters entirely).
fn apply_item_filters(qb: &mut QueryBuilder<'_, Postgres>, tenant_id: Uuid, params: &ItemListQuery) -> Result<(), ApiError> {
    qb.push_bind(tenant_id);
    if let Some(search) = params.search.as_deref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (name ILIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" OR sku ILIKE ");
        qb.push_bind(pattern);
        qb.push(")");
    }
    if let Some(category) = params.category.as_deref().filter(|s| !s.is_empty()) {
        qb.push(" AND category = ");
        qb.push_bind(category.to_string());
    }
    if let Some(supplier) = params.supplier {
        qb.push(" AND supplier_id = ");
        qb.push_bind(supplier);
    }
    match params.stock_status.as_deref().filter(|s| !s.is_empty()) {
        None => {}
        Some("out_of_stock") => { qb.push(" AND quantity_in_stock = 0"); }
        Some("low_stock") => { qb.push(" AND quantity_in_stock > 0 AND quantity_in_stock <= reorder_level"); }
        Some("in_stock") => { qb.push(" AND quantity_in_stock > reorder_level"); }
        Some(other) => {
            return Err(ApiError::bad_request_msg("invalid_stock_status", None, format!("Unknown stock_status '{other}'")));
        }
    }
    if let Some(active) = params.is_active {
        qb.push(" AND is_active = ");
        qb.push_bind(active);
    }
    Ok(())
}

pub async fn list_items(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Query(params): Query<ItemListQuery>,
) -> Result<Json<ListEnvelope<InventoryItem>>, ApiError> {
    ensure_capability(&sec, Capability::InventoryView)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "inventory_view", trace_id: sec.trace_id })?;

    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let offset = (page - 1) * limit;

    let mut count_qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM inventory_items WHERE tenant_id = ");
    apply_item_filters(&mut count_qb, sec.tenant_id, &params)?;
    let total: i64 = count_qb
        .build_query_scalar()
        .fetch_one(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE tenant_id = "));
    apply_item_filters(&mut qb, sec.tenant_id, &params)?;
    qb.push(" ORDER BY name ASC LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);
    let items = qb
        .build_query_as::<InventoryItem>()
        .fetch_all(&state.db)
        .await
        .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    Ok(Json(ListEnvelope::ok(items, total, page, limit)))
}

pub async fn get_item(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Envelope<InventoryItem>>, ApiError> {
    ensure_capability(&sec, Capability::InventoryView)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "inventory_view", trace_id: sec.trace_id })?;

    let item = query_as::<_, InventoryItem>(
        &format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 AND tenant_id = $2"),
    )
    .bind(item_id)
    .bind(sec.tenant_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    match item {
        Some(item) => Ok(Json(Envelope::ok(item))),
        None => Err(ApiError::not_found("item_not_found", sec.trace_id)),
    }
}

#[derive(Debug, Deserialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    #[serde(default)]
    pub initial_quantity: i32,
    pub reorder_level: Option<i32>,
    pub max_stock_level: Option<i32>,
    pub reorder_point: Option<i32>,
    pub reorder_quantity: Option<i32>,
    pub price_per_unit: Option<BigDecimal>,
    pub supplier_id: Option<Uuid>,
    pub location: Option<String>,
    #[serde(default)]
    pub is_perishable: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

pub async fn create_item(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Json(new_item): Json<NewItem>,
) -> Result<Json<Envelope<InventoryItem>>, ApiError> {
    ensure_capability(&sec, Capability::InventoryManage)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "inventory_manage", trace_id: sec.trace_id })?;

    if new_item.sku.trim().is_empty() || new_item.name.trim().is_empty() {
        return Err(ApiError::bad_request_msg("invalid_item", sec.trace_id, "sku and name must be non-empty"));
    }
    if new_item.initial_quantity < 0 {
        return Err(ApiError::bad_request_msg("invalid_quantity", sec.trace_id, "initial_quantity must not be negative"));
    }

    let item_id = Uuid::new_v4();
    let price = new_item.price_per_unit.map(|p| normalize_scale(&p)).unwrap_or_else(|| BigDecimal::from(0));

    let mut tx = state.db.begin().await.map_err(|e| ApiError::internal(e, sec.trace_id))?;

    let inserted = query_as::<_, InventoryItem>(
        &format!(
            "INSERT INTO inventory_items (id, tenant_id, sku, name, category, unit, quantity_in_stock, reorder_level, max_stock_level, reorder_point, reorder_quantity, price_per_unit, supplier_id, location, is_perishable, expiry_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
             RETURNING {ITEM_COLUMNS}"
        ),
    )
    .bind(item_id)
    .bind(sec.tenant_id)
    .bind(new_item.sku.trim())
    .bind(new_item.name.trim())
    .bind(new_item.category.as_deref().filter(|s| !s.is_empty()).unwrap_or("general"))
    .bind(new_item.unit.as_deref().filter(|s| !s.is_empty()).unwrap_or("unit"))
    .bind(new_item.initial_quantity)
    .bind(new_item.reorder_level.unwrap_or(DEFAULT_REORDER_LEVEL))
    .bind(new_item.max_stock_level)
    .bind(new_item.reorder_point)
    .bind(new_item.reorder_quantity)
    .bind(&price)
    .bind(new_item.supplier_id)
    .bind(new_item.location.as_deref())
    .bind(new_item.is_perishable)
    .bind(new_item.expiry_date)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if e.as_database_error().map(|d| d.is_unique_violation()).unwrap_or(false) {
            ApiError::bad_request_msg("duplicate_sku", sec.trace_id, format!("An item with SKU '{}' already exists", new_item.sku.trim()))
        } else {
            ApiError::internal(e, sec.trace_id)
        }
    })?;

    // Opening balance enters the ledger too, so transaction sums reconcile
    // with quantity_in_stock from day one.
    if inserted.quantity_in_stock > 0 {
        sqlx::query(
            "INSERT INTO stock_transactions (id, tenant_id, item_id, transaction_type, quantity, unit_price, reason, performed_by, performed_by_name)
             VALUES ($1, $2, $3, 'restock', $4, $5, 'Opening balance', $6, $7)",
        )
        .bind(Uuid::new_v4())
        .bind(sec.tenant_id)
        .bind(inserted.id)
        .bind(inserted.quantity_in_stock)
        .bind(&price)
        .bind(sec.actor.id)
        .bind(sec.actor.name.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::internal(e, sec.trace_id))?;
    }

    tx.commit().await.map_err(|e| ApiError::internal(e, sec.trace_id))?;

    record_item_audit(&state, &sec, inserted.id, "created", json!({"after": item_to_value(&inserted)}), json!({})).await;

    Ok(Json(Envelope::ok(inserted)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateItem {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub reorder_level: i32,
    pub max_stock_level: Option<i32>,
    pub reorder_point: Option<i32>,
    pub reorder_quantity: Option<i32>,
    pub price_per_unit: BigDecimal,
    pub supplier_id: Option<Uuid>,
    pub location: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub is_perishable: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Full replace of an item's descriptive fields. `sku` is identity and
/// `quantity_in_stock` only moves through the stock endpoint, never here.
pub async fn update_item(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(item_id): Path<Uuid>,
    Json(upd): Json<UpdateItem>,
) -> Result<Json<Envelope<InventoryItem>>, ApiError> {
    ensure_capability(&sec, Capability::InventoryManage)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "inventory_manage", trace_id: sec.trace_id })?;

    let existing = query_as::<_, InventoryItem>(
        &format!("SELECT {ITEM_COLUMNS} FROM inventory_items WHERE id = $1 AND tenant_id = $2"),
    )
    .bind(item_id)
    .bind(sec.tenant_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;
    let existing = match existing {
        Some(item) => item,
        None => return Err(ApiError::not_found("item_not_found", sec.trace_id)),
    };

    let item = query_as::<_, InventoryItem>(
        &format!(
            "UPDATE inventory_items
             SET name = $1, category = $2, unit = $3, reorder_level = $4, max_stock_level = $5,
                 reorder_point = $6, reorder_quantity = $7, price_per_unit = $8, supplier_id = $9,
                 location = $10, is_active = $11, is_perishable = $12, expiry_date = $13, updated_at = NOW()
             WHERE id = $14 AND tenant_id = $15
             RETURNING {ITEM_COLUMNS}"
        ),
    )
    .bind(upd.name)
    .bind(upd.category)
    .bind(upd.unit)
    .bind(upd.reorder_level)
    .bind(upd.max_stock_level)
    .bind(upd.reorder_point)
    .bind(upd.reorder_quantity)
    .bind(normalize_scale(&upd.price_per_unit))
    .bind(upd.supplier_id)
    .bind(upd.location)
    .bind(upd.is_active)
    .bind(upd.is_perishable)
    .bind(upd.expiry_date)
    .bind(item_id)
    .bind(sec.tenant_id)
    .fetch_one(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    let changes = json!({
        "before": item_to_value(&existing),
        "after": item_to_value(&item),
    });
    record_item_audit(&state, &sec, item.id, "updated", changes, json!({})).await;

    Ok(Json(Envelope::ok(item)))
}

/// Soft delete: flips `is_active` off and leaves the transaction history in
/// place, so historical consumption reports keep reconciling.
pub async fn delete_item(
    State(state): State<AppState>,
    SecurityCtxExtractor(sec): SecurityCtxExtractor,
    Path(item_id): Path<Uuid>,
) -> Result<Json<Envelope<InventoryItem>>, ApiError> {
    ensure_capability(&sec, Capability::InventoryManage)
        .map_err(|_| ApiError::ForbiddenMissingRole { role: "inventory_manage", trace_id: sec.trace_id })?;

    let item = query_as::<_, InventoryItem>(
        &format!(
            "UPDATE inventory_items SET is_active = FALSE, updated_at = NOW()
             WHERE id = $1 AND tenant_id = $2
             RETURNING {ITEM_COLUMNS}"
        ),
    )
    .bind(item_id)
    .bind(sec.tenant_id)
    .fetch_optional(&state.db)
    .await
    .map_err(|e| ApiError::internal(e, sec.trace_id))?;

    let item = match item {
        Some(item) => item,
        None => return Err(ApiError::not_found("item_not_found", sec.trace_id)),
    };

    record_item_audit(&state, &sec, item.id, "deactivated", json!({"after": item_to_value(&item)}), json!({})).await;

    Ok(Json(Envelope::ok(item)))
}
