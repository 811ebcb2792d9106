//! Peer contracts between the product service and its two peers.
//!
//! Product ids travel as plain strings: the answering side owns no product
//! records and treats an id it cannot read like one it has never seen.

use fabric::PeerProtocol;
use serde::{Deserialize, Serialize};

/// Product asks pricing for a product's current price.
#[derive(Debug)]
pub struct PriceQuery;

impl PeerProtocol for PriceQuery {
    const NAME: &'static str = "price_query";
    type Request = PriceRequest;
    type Response = PriceAnswer;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PriceRequest {
    GetPrice { product_pk: String },
}

/// `price` is null when no price is recorded for the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAnswer {
    pub price: Option<f64>,
}

/// Product asks inventory how many units of a product are in stock.
#[derive(Debug)]
pub struct StockQuery;

impl PeerProtocol for StockQuery {
    const NAME: &'static str = "stock_query";
    type Request = StockRequest;
    type Response = StockAnswer;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StockRequest {
    GetNbInInventory { product_pk: String },
}

/// Total quantity across every warehouse; zero for unknown products.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockAnswer {
    pub quantity: i64,
}
