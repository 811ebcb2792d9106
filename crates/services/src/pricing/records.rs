use chrono::{DateTime, Utc};
use common::RecordId;
use serde::{Deserialize, Serialize};
use store::{Record, Table};

/// Price given to a product the moment pricing learns about it.
pub const DEFAULT_PRICE: f64 = 0.0;

/// The current price of one product, keyed by the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub id: RecordId,
    pub product_pk: RecordId,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

impl Price {
    pub fn new(product_pk: RecordId, price: f64) -> Self {
        Self {
            id: RecordId::new(),
            product_pk,
            price,
            created_at: Utc::now(),
        }
    }
}

impl Record for Price {
    type Key = RecordId;
    const TABLE: &'static str = "prices";

    fn key(&self) -> RecordId {
        self.product_pk
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[derive(Debug, Clone, Default)]
pub struct PricingState {
    pub prices: Table<Price>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePrice {
    pub product_pk: String,
    pub price: f64,
}

/// Leaves the price unchanged when `price` is absent.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdatePrice {
    pub product_pk: String,
    #[serde(default)]
    pub price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ByProduct {
    pub product_pk: String,
}
