//! Typed client for the inventory service.
//!
//! Wraps the REST surface (items, stock movements, transaction history,
//! low-stock and stats reporting) and implements two-leg stock transfers
//! on top of it.

mod client;
mod error;
mod types;

pub use client::{Identity, InventoryClient};
pub use error::{ClientError, ClientResult};
pub use types::{
    CategoryStats, InventoryItem, InventoryStats, ItemFilter, ItemRef, NewItem, Page,
    StockAdjustment, StockMovement, StockMovementType, StockStatus, StockTransaction,
    TransactionQuery, TransferReceipt, UpdateItem,
};
