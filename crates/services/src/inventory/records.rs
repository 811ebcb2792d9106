use chrono::{DateTime, Utc};
use common::RecordId;
use serde::{Deserialize, Serialize};
use store::{Record, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: RecordId,
    pub name: String,
    pub location: String,
    pub created_at: DateTime<Utc>,
}

impl Record for Warehouse {
    type Key = RecordId;
    const TABLE: &'static str = "warehouses";

    fn key(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Natural key of a stock row: `(warehouse_pk, product_pk)`.
pub type StockKey = (RecordId, RecordId);

/// Units of one product held in one warehouse.
///
/// `quantity` may go negative when more was ordered than was in stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: RecordId,
    pub product_pk: RecordId,
    pub warehouse_pk: RecordId,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
}

impl InventoryItem {
    pub fn new(warehouse_pk: RecordId, product_pk: RecordId, quantity: i64) -> Self {
        Self {
            id: RecordId::new(),
            product_pk,
            warehouse_pk,
            quantity,
            created_at: Utc::now(),
        }
    }
}

impl Record for InventoryItem {
    type Key = StockKey;
    const TABLE: &'static str = "inventory";

    fn key(&self) -> StockKey {
        (self.warehouse_pk, self.product_pk)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct InventoryState {
    pub warehouses: Table<Warehouse>,
    pub items: Table<InventoryItem>,
}

impl InventoryState {
    /// Total units of `product` across every warehouse.
    pub fn total_of(&self, product: RecordId) -> i64 {
        self.items
            .filter(|item| item.product_pk == product)
            .into_iter()
            .map(|item| item.quantity)
            .sum()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateWarehouse {
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateInventory {
    pub product_pk: String,
    pub warehouse_pk: String,
    #[serde(default)]
    pub quantity: i64,
}

/// Sets the quantity of one stock row.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateInventory {
    pub warehouse_pk: String,
    pub product_pk: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ByProduct {
    pub product_pk: String,
}
