//! One price per product.

mod records;
mod service;

pub use records::{CreatePrice, Price, PricingState, UpdatePrice};
pub use service::{DefaultPriceOnProductCreated, PriceResponder, PricingService};
