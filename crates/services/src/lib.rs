//! The business services of the order-management system.
//!
//! Each service owns a private [`store::Store`], answers its command
//! vocabulary through a [`fabric::CommandHandler`], and talks to the other
//! services only through the fabric:
//! - product: catalogue owner, publishes `product.created`, reads price and
//!   stock from its peers when building the detailed view
//! - customer: customer records, publishes `customer.created`
//! - inventory: warehouses and stock rows, answers stock queries, keeps stock
//!   rows in step with new products and order lines
//! - pricing: one price per product, answers price queries, creates a default
//!   price for every new product
//! - order: orders and their lines, publishes `order.created` and
//!   `orderline.created`
//!
//! [`node`] wires one service into a running process.

pub mod config;
pub mod contracts;
pub mod customer;
pub mod error;
pub mod inventory;
pub mod node;
pub mod order;
pub mod pricing;
pub mod product;

mod payload;

pub use config::NodeConfig;
pub use error::{Result, ServiceError};
pub use node::{Listeners, RunningNode, run, start};
