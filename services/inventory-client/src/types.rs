use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A reference to an inventory item as callers hold it.
///
/// Forms that edit an item and forms that create one share their plumbing,
/// so "which item?" is answered explicitly: `New` is an item that does not
/// exist yet and never resolves to a fetch, `Existing` is a persisted row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    New,
    Existing(Uuid),
}

impl ItemRef {
    pub fn id(&self) -> Option<Uuid> {
        match self {
            Self::New => None,
            Self::Existing(id) => Some(*id),
        }
    }
}

impl FromStr for ItemRef {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "new" {
            return Ok(Self::New);
        }
        Uuid::parse_str(s).map(Self::Existing)
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => f.write_str("new"),
            Self::Existing(id) => write!(f, "{id}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
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
    pub price_per_unit: BigDecimal,
    pub total_value: BigDecimal,
    pub supplier_id: Option<Uuid>,
    pub location: Option<String>,
    pub is_active: bool,
    pub is_perishable: bool,
    pub expiry_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockTransaction {
    pub id: Uuid,
    pub item_id: Uuid,
    pub transaction_type: String,
    pub quantity: i32,
    pub unit_price: Option<BigDecimal>,
    pub transaction_date: DateTime<Utc>,
    pub department: Option<String>,
    pub reference_number: Option<String>,
    pub reason: Option<String>,
    pub performed_by: Option<Uuid>,
    pub performed_by_name: Option<String>,
    pub status: String,
}

/// Returned by stock adjustments: the item after the movement together with
/// the ledger entry that was recorded.
#[derive(Debug, Clone, Deserialize)]
pub struct StockAdjustment {
    pub item: InventoryItem,
    pub transaction: StockTransaction,
}

/// List filters. Absent (or empty-string) fields are omitted from the query
/// string entirely; the service treats omission as "no constraint".
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub search: Option<String>,
    pub category: Option<String>,
    pub supplier: Option<Uuid>,
    pub stock_status: Option<StockStatus>,
    pub is_active: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "in_stock",
            Self::LowStock => "low_stock",
            Self::OutOfStock => "out_of_stock",
        }
    }
}

impl ItemFilter {
    /// Query pairs for the list endpoint, skipping anything unset or empty.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(category) = self.category.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        if let Some(supplier) = self.supplier {
            pairs.push(("supplier", supplier.to_string()));
        }
        if let Some(status) = self.stock_status {
            pairs.push(("stock_status", status.as_str().to_string()));
        }
        if let Some(active) = self.is_active {
            pairs.push(("is_active", active.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub initial_quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_stock_level: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_point: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reorder_quantity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_unit: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub is_perishable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

/// Full replacement of an item's descriptive fields. SKU and stock quantity
/// are not here: the first is immutable, the second only moves through
/// [`crate::InventoryClient::update_stock_level`].
#[derive(Debug, Clone, Serialize)]
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
    pub is_perishable: bool,
    pub expiry_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementType {
    Restock,
    Consumption,
    Transfer,
    Adjustment,
    Waste,
    Return,
}

/// One stock movement as submitted. `transaction_date` is optional; when the
/// caller leaves it unset the client stamps the current time before sending,
/// so the ledger never depends on server receipt time.
#[derive(Debug, Clone, Serialize)]
pub struct StockMovement {
    #[serde(rename = "type")]
    pub movement_type: StockMovementType,
    pub quantity: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<BigDecimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StockMovement {
    pub fn new(movement_type: StockMovementType, quantity: i32) -> Self {
        Self {
            movement_type,
            quantity,
            unit_price: None,
            transaction_date: None,
            department: None,
            reference_number: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub movement_type: Option<StockMovementType>,
}

impl TransactionQuery {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(start) = self.start_date {
            pairs.push(("start_date", start.to_rfc3339()));
        }
        if let Some(end) = self.end_date {
            pairs.push(("end_date", end.to_rfc3339()));
        }
        if let Some(t) = self.movement_type {
            let tag = match t {
                StockMovementType::Restock => "restock",
                StockMovementType::Consumption => "consumption",
                StockMovementType::Transfer => "transfer",
                StockMovementType::Adjustment => "adjustment",
                StockMovementType::Waste => "waste",
                StockMovementType::Return => "return",
            };
            pairs.push(("type", tag.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryStats {
    pub category: String,
    pub item_count: i64,
    pub total_value: BigDecimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InventoryStats {
    pub total_items: i64,
    pub active_items: i64,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
    pub total_stock_value: BigDecimal,
    pub categories: Vec<CategoryStats>,
}

/// Both legs of a completed stock transfer, in execution order.
#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub debit: StockTransaction,
    pub credit: StockTransaction,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[allow(dead_code)]
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListEnvelope<T> {
    #[allow(dead_code)]
    pub success: bool,
    pub data: Vec<T>,
    pub total: i64,
    pub pagination: Pagination,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

/// One page of a listing, with enough pagination state to fetch the next.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
}
