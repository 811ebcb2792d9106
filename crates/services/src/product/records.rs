use chrono::{DateTime, Utc};
use common::RecordId;
use serde::{Deserialize, Serialize};
use store::{Record, Table};

/// Product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Electronics,
    Clothing,
    Food,
    Books,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Electronics => "electronics",
            Category::Clothing => "clothing",
            Category::Food => "food",
            Category::Books => "books",
            Category::Other => "other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalogue entry. This is also the payload of `product.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub available: bool,
    pub created_at: DateTime<Utc>,
}

impl Record for Product {
    type Key = RecordId;
    const TABLE: &'static str = "products";

    fn key(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Everything the product service stores.
#[derive(Debug, Clone, Default)]
pub struct ProductState {
    pub products: Table<Product>,
}

fn available_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProduct {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub available: Option<bool>,
}

/// A product with its current price and total stock, read from the peers.
///
/// `price` and `stock` are null when the peer could not be asked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetails {
    #[serde(flatten)]
    pub product: Product,
    pub price: Option<f64>,
    pub stock: Option<i64>,
}
