//! Private record store owned by a single service.
//!
//! Every service keeps its records in its own [`Store`]. Changes go through a
//! [`UnitOfWork`]: the unit works on a copy of the state and either commits it
//! back in one step or is dropped, which rolls everything back.

pub mod error;
pub mod memory;
pub mod table;

pub use error::{Result, StoreError};
pub use memory::{Store, UnitOfWork};
pub use table::{Record, Table};
