//! Shared types used across the order-management services.

pub mod topics;
pub mod types;

pub use types::{RecordId, ServiceName};
