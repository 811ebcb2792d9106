use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::RecordId;
use serde::{Deserialize, Serialize};
use store::{Record, Table};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One product on an order. This is also the payload of `orderline.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: RecordId,
    pub order_pk: RecordId,
    pub product_pk: RecordId,
    pub quantity: i64,
    pub unit_price: f64,
    /// Warehouse to ship from; any warehouse with enough stock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse_pk: Option<RecordId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    pub customer_pk: RecordId,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn total(&self) -> f64 {
        self.lines.iter().map(|l| l.quantity as f64 * l.unit_price).sum()
    }
}

impl Record for Order {
    type Key = RecordId;
    const TABLE: &'static str = "orders";

    fn key(&self) -> RecordId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Payload of `order.created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub id: RecordId,
    pub customer_pk: RecordId,
}

#[derive(Debug, Clone, Default)]
pub struct OrderState {
    pub orders: Table<Order>,
    /// Products seen on `product.created`.
    pub known_products: BTreeSet<RecordId>,
    /// Customers seen on `customer.created`.
    pub known_customers: BTreeSet<RecordId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOrderLine {
    pub product_pk: String,
    pub quantity: i64,
    pub unit_price: f64,
    #[serde(default)]
    pub warehouse_pk: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub customer_pk: String,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateOrder {
    pub id: String,
    pub status: OrderStatus,
}
