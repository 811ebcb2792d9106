use async_trait::async_trait;
use chrono::Utc;
use common::RecordId;
use fabric::{CommandEnvelope, CommandHandler};
use serde_json::Value;
use store::Store;

use super::records::{
    ByProduct, CreateInventory, CreateWarehouse, InventoryItem, InventoryState, UpdateInventory, Warehouse,
};
use crate::payload::{self, ById};
use crate::{Result, ServiceError};

const WAREHOUSE: &str = "warehouse";
const INVENTORY: &str = "inventory";

/// Owns warehouses and stock rows.
pub struct InventoryService {
    store: Store<InventoryState>,
}

impl InventoryService {
    pub fn new(store: Store<InventoryState>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store<InventoryState> {
        &self.store
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_warehouse(&self, input: CreateWarehouse) -> Result<Warehouse> {
        let warehouse = Warehouse {
            id: RecordId::new(),
            name: payload::text("name", &input.name, 1, 100)?,
            location: payload::text("location", &input.location, 0, 200)?,
            created_at: Utc::now(),
        };
        let created = self
            .store
            .transact(|state| -> Result<Warehouse> { Ok(state.warehouses.insert(warehouse)?.clone()) })
            .await?;
        tracing::info!(id = %created.id, "warehouse created");
        Ok(created)
    }

    pub async fn get_warehouse(&self, id: &str) -> Result<Warehouse> {
        let key = payload::own_id(WAREHOUSE, id)?;
        self.store
            .read()
            .await
            .warehouses
            .get(&key)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(WAREHOUSE, id))
    }

    pub async fn get_all_warehouses(&self) -> Vec<Warehouse> {
        self.store.read().await.warehouses.all().into_iter().cloned().collect()
    }

    /// Adds a stock row for a product in an existing warehouse.
    #[tracing::instrument(skip(self))]
    pub async fn create_inventory(&self, input: CreateInventory) -> Result<InventoryItem> {
        let warehouse = payload::own_id(WAREHOUSE, &input.warehouse_pk)?;
        let product = payload::reference("product_pk", &input.product_pk)?;
        if input.quantity < 0 {
            return Err(ServiceError::validation("quantity must not be negative"));
        }

        self.store
            .transact(|state| -> Result<InventoryItem> {
                if !state.warehouses.contains(&warehouse) {
                    return Err(ServiceError::not_found(WAREHOUSE, &input.warehouse_pk));
                }
                if state.items.contains(&(warehouse, product)) {
                    return Err(ServiceError::Conflict(format!(
                        "product {product} already has a stock row in warehouse {warehouse}"
                    )));
                }
                let item = InventoryItem::new(warehouse, product, input.quantity);
                Ok(state.items.insert(item)?.clone())
            })
            .await
    }

    /// Every stock row of a product, one per warehouse holding it.
    pub async fn get(&self, product_pk: &str) -> Result<Vec<InventoryItem>> {
        let product = payload::reference("product_pk", product_pk)?;
        let state = self.store.read().await;
        Ok(state
            .items
            .filter(|item| item.product_pk == product)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Sets the quantity of an existing stock row.
    #[tracing::instrument(skip(self))]
    pub async fn update(&self, input: UpdateInventory) -> Result<InventoryItem> {
        let row = format!("{}/{}", input.warehouse_pk, input.product_pk);
        let (Some(warehouse), Some(product)) = (RecordId::parse(&input.warehouse_pk), RecordId::parse(&input.product_pk))
        else {
            return Err(ServiceError::not_found(INVENTORY, row));
        };
        if input.quantity < 0 {
            return Err(ServiceError::validation("quantity must not be negative"));
        }

        self.store
            .transact(|state| {
                let item = state
                    .items
                    .get_mut(&(warehouse, product))
                    .ok_or_else(|| ServiceError::not_found(INVENTORY, &row))?;
                item.quantity = input.quantity;
                Ok(item.clone())
            })
            .await
    }
}

#[async_trait]
impl CommandHandler for InventoryService {
    type Error = ServiceError;

    fn service(&self) -> &'static str {
        INVENTORY
    }

    async fn handle(&self, command: CommandEnvelope) -> Result<Value> {
        match command.action.as_str() {
            "create_warehouse" => payload::to_value(&self.create_warehouse(payload::parse(&command)?).await?),
            "get_warehouse" => {
                let ById { id } = payload::parse(&command)?;
                payload::to_value(&self.get_warehouse(&id).await?)
            }
            "get_all_warehouses" => payload::to_value(&self.get_all_warehouses().await),
            "create_inventory" => payload::to_value(&self.create_inventory(payload::parse(&command)?).await?),
            "get" => {
                let ByProduct { product_pk } = payload::parse(&command)?;
                payload::to_value(&self.get(&product_pk).await?)
            }
            "update" => payload::to_value(&self.update(payload::parse(&command)?).await?),
            other => Err(ServiceError::UnknownAction(other.to_string())),
        }
    }
}
