use thiserror::Error;

/// Errors that can occur when changing records in a store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A record with the same key already exists.
    #[error("Duplicate key in {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },

    /// The record to change does not exist.
    #[error("Missing key in {table}: {key}")]
    MissingKey { table: &'static str, key: String },
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
