//! Warehouses and stock rows.
//!
//! Inventory answers stock queries from the product service and keeps its
//! rows in step with two broadcast facts: every new product gets an empty row
//! in each warehouse, and every order line takes its quantity out of stock.

mod records;
mod replicas;
mod responder;
mod service;

pub use records::{
    CreateInventory, CreateWarehouse, InventoryItem, InventoryState, StockKey, UpdateInventory, Warehouse,
};
pub use replicas::{DecrementOnOrderLine, StockRowsOnProductCreated};
pub use responder::StockResponder;
pub use service::InventoryService;
