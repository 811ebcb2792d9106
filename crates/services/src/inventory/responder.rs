use async_trait::async_trait;
use common::RecordId;
use fabric::PeerHandler;
use store::Store;

use super::records::InventoryState;
use crate::contracts::{StockAnswer, StockQuery, StockRequest};

/// Answers the product service's stock queries.
pub struct StockResponder {
    store: Store<InventoryState>,
}

impl StockResponder {
    pub fn new(store: Store<InventoryState>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PeerHandler<StockQuery> for StockResponder {
    async fn answer(&self, request: StockRequest) -> StockAnswer {
        match request {
            StockRequest::GetNbInInventory { product_pk } => {
                let quantity = match RecordId::parse(&product_pk) {
                    Some(product) => self.store.read().await.total_of(product),
                    None => 0,
                };
                StockAnswer { quantity }
            }
        }
    }
}
