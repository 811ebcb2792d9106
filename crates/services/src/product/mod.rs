//! Product catalogue.

mod records;
mod service;

pub use records::{Category, CreateProduct, Product, ProductDetails, ProductState, UpdateProduct};
pub use service::{ProductPeers, ProductService};
