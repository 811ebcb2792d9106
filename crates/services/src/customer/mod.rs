//! Customer records.

mod records;
mod service;

pub use records::{CreateCustomer, Customer, CustomerState, UpdateCustomer};
pub use service::CustomerService;
