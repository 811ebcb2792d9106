//! Replica handlers keeping stock rows in step with products and orders.

use async_trait::async_trait;
use common::{RecordId, topics};
use fabric::BroadcastFrame;
use replica::{ReplicaError, ReplicaHandler, ReplicaOutcome};
use serde::Deserialize;
use store::Store;

use super::records::{InventoryItem, InventoryState};

/// The part of `product.created` inventory reads.
#[derive(Debug, Deserialize)]
struct ProductFact {
    id: Option<RecordId>,
}

/// The part of `orderline.created` inventory reads.
#[derive(Debug, Deserialize)]
struct OrderLineFact {
    product_pk: Option<RecordId>,
    quantity: i64,
    #[serde(default)]
    warehouse_pk: Option<RecordId>,
}

/// Gives every new product an empty stock row in each known warehouse.
pub struct StockRowsOnProductCreated {
    store: Store<InventoryState>,
}

impl StockRowsOnProductCreated {
    pub fn new(store: Store<InventoryState>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReplicaHandler for StockRowsOnProductCreated {
    fn name(&self) -> &'static str {
        "inventory.stock_rows"
    }

    fn topic(&self) -> &'static str {
        topics::PRODUCT_CREATED
    }

    async fn apply(&self, frame: &BroadcastFrame) -> replica::Result<ReplicaOutcome> {
        let fact: ProductFact = frame.parse_payload()?;
        let product = fact.id.ok_or(ReplicaError::MissingKey("id"))?;

        self.store
            .transact(|state| {
                let warehouses: Vec<RecordId> = state.warehouses.all().into_iter().map(|w| w.id).collect();
                if warehouses.is_empty() {
                    return Ok(ReplicaOutcome::Skipped("no warehouses".to_string()));
                }
                let mut created = 0;
                for warehouse in warehouses {
                    let (_, inserted) = state
                        .items
                        .get_or_insert_with((warehouse, product), || InventoryItem::new(warehouse, product, 0));
                    if inserted {
                        created += 1;
                    }
                }
                tracing::debug!(%product, created, "stock rows ensured");
                Ok(if created > 0 {
                    ReplicaOutcome::Created
                } else {
                    ReplicaOutcome::AlreadyPresent
                })
            })
            .await
    }
}

/// Takes each order line's quantity out of stock.
///
/// With a named warehouse the row is created if absent and always
/// decremented; stock may go negative, which is logged as oversold. A
/// warehouse this service has never seen still gets its row, and is logged. Without
/// one, the first row holding enough units is decremented, and the line is
/// skipped when no row does. Applying the same line twice decrements twice.
pub struct DecrementOnOrderLine {
    store: Store<InventoryState>,
}

impl DecrementOnOrderLine {
    pub fn new(store: Store<InventoryState>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ReplicaHandler for DecrementOnOrderLine {
    fn name(&self) -> &'static str {
        "inventory.decrement"
    }

    fn topic(&self) -> &'static str {
        topics::ORDERLINE_CREATED
    }

    async fn apply(&self, frame: &BroadcastFrame) -> replica::Result<ReplicaOutcome> {
        let line: OrderLineFact = frame.parse_payload()?;
        let product = line.product_pk.ok_or(ReplicaError::MissingKey("product_pk"))?;
        if line.quantity <= 0 {
            return Err(ReplicaError::Rejected(format!("quantity must be positive, got {}", line.quantity)));
        }

        self.store
            .transact(|state| -> replica::Result<ReplicaOutcome> {
                match line.warehouse_pk {
                    Some(warehouse) => {
                        if !state.warehouses.contains(&warehouse) {
                            tracing::warn!(%product, %warehouse, "order line names an unknown warehouse");
                            metrics::counter!("inventory_unknown_warehouse_total").increment(1);
                        }
                        let (item, _) = state
                            .items
                            .get_or_insert_with((warehouse, product), || InventoryItem::new(warehouse, product, 0));
                        item.quantity -= line.quantity;
                        if item.quantity < 0 {
                            tracing::warn!(%product, %warehouse, quantity = item.quantity, "product oversold");
                            metrics::counter!("inventory_oversold_total").increment(1);
                        }
                        Ok(ReplicaOutcome::Adjusted)
                    }
                    None => {
                        let Some(key) = state
                            .items
                            .find(|item| item.product_pk == product && item.quantity >= line.quantity)
                            .map(|item| (item.warehouse_pk, item.product_pk))
                        else {
                            return Ok(ReplicaOutcome::Skipped(format!(
                                "no warehouse holds {} units of {product}",
                                line.quantity
                            )));
                        };
                        state.items.update(&key, |item| item.quantity -= line.quantity)?;
                        Ok(ReplicaOutcome::Adjusted)
                    }
                }
            })
            .await
    }
}
