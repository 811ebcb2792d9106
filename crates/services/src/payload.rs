//! Helpers shared by the command handlers.

use common::RecordId;
use fabric::CommandEnvelope;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, ServiceError};

/// `{"id": ...}`
#[derive(Debug, Deserialize)]
pub(crate) struct ById {
    pub id: String,
}

pub(crate) fn parse<T: DeserializeOwned>(command: &CommandEnvelope) -> Result<T> {
    Ok(command.parse_data()?)
}

pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

/// Resolves the id of a record this service owns.
///
/// A malformed id cannot name any record, so it is reported as not found.
pub(crate) fn own_id(kind: &'static str, raw: &str) -> Result<RecordId> {
    RecordId::parse(raw).ok_or_else(|| ServiceError::not_found(kind, raw))
}

/// Resolves a reference to a record owned by another service.
pub(crate) fn reference(field: &str, raw: &str) -> Result<RecordId> {
    RecordId::parse(raw).ok_or_else(|| ServiceError::validation(format!("{field} is not a valid id: {raw:?}")))
}

/// Trims `value` and checks its length in characters.
pub(crate) fn text(field: &str, value: &str, min: usize, max: usize) -> Result<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if min > 0 && len == 0 {
        return Err(ServiceError::validation(format!("{field} must not be blank")));
    }
    if len < min || len > max {
        return Err(ServiceError::validation(format!(
            "{field} must be between {min} and {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn optional_text(field: &str, value: Option<&str>, min: usize, max: usize) -> Result<Option<String>> {
    value.map(|v| text(field, v, min, max)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_trims_and_checks_bounds() {
        assert_eq!(text("name", "  Lamp ", 1, 100).unwrap(), "Lamp");
        assert_eq!(
            text("name", "   ", 1, 100).unwrap_err().to_string(),
            "Validation error: name must not be blank"
        );
        assert!(text("name", &"x".repeat(101), 1, 100).is_err());
        assert_eq!(text("description", "", 0, 1000).unwrap(), "");
    }

    #[test]
    fn malformed_own_id_is_not_found() {
        let err = own_id("product", "not-a-uuid").unwrap_err();
        assert_eq!(err.to_string(), "product not found: not-a-uuid");
    }

    #[test]
    fn malformed_reference_is_a_validation_error() {
        let err = reference("customer_pk", "nope").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
