//! HTTP routes, one module per service.

pub mod customer;
pub mod health;
pub mod inventory;
pub mod metrics;
pub mod order;
pub mod pricing;
pub mod product;

use axum::Json;
use serde_json::{Map, Value};

use crate::error::ApiError;

/// Reply of a route that returns the service's data as-is.
pub type Reply = Result<Json<Value>, ApiError>;

/// Command data built from a request body plus path parameters.
///
/// Path parameters win over body fields of the same name.
pub(crate) fn command_data<const N: usize>(body: Option<Map<String, Value>>, path: [(&str, String); N]) -> Map<String, Value> {
    let mut data = body.unwrap_or_default();
    for (key, value) in path {
        data.insert(key.to_string(), Value::String(value));
    }
    data
}
