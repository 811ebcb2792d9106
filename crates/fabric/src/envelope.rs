//! Wire shapes carried by the channels.
//!
//! Command and response envelopes are compact JSON objects. A broadcast frame
//! is a topic token, one space, then the JSON payload. None of the encodings
//! ever contain a raw newline, so each fits on one line of the framing layer.
//! Encoding fails with `MalformedEnvelope` when the line would be longer than
//! the receiving side accepts.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FabricError, Result};
use crate::frame::MAX_FRAME_LEN;

/// Returns true if `topic` is selected by the subscription `prefix`.
///
/// Matching is a plain byte prefix, so `"product"` selects
/// `"product.created"` and the empty prefix selects everything.
pub fn topic_matches(topic: &str, prefix: &str) -> bool {
    topic.starts_with(prefix)
}

/// A request on the command channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub action: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl CommandEnvelope {
    pub fn new(action: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            data,
        }
    }

    /// Builds an envelope from any serializable payload that encodes as a JSON object.
    pub fn with_payload<T: Serialize>(action: impl Into<String>, payload: &T) -> Result<Self> {
        match serde_json::to_value(payload).map_err(FabricError::malformed)? {
            Value::Object(data) => Ok(Self::new(action, data)),
            Value::Null => Ok(Self::new(action, Map::new())),
            other => Err(FabricError::malformed(format!(
                "command data must be an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn encode(&self) -> Result<String> {
        if self.action.trim().is_empty() {
            return Err(FabricError::malformed("action must not be empty"));
        }
        let line = serde_json::to_string(self).map_err(FabricError::malformed)?;
        fits_frame(line, "command")
    }

    pub fn decode(frame: &str) -> Result<Self> {
        let envelope: CommandEnvelope = serde_json::from_str(frame).map_err(FabricError::malformed)?;
        if envelope.action.trim().is_empty() {
            return Err(FabricError::malformed("action must not be empty"));
        }
        Ok(envelope)
    }

    /// Deserializes the data mapping into a typed payload.
    pub fn parse_data<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        T::deserialize(Value::Object(self.data.clone()))
    }
}

/// A reply on the command channel.
///
/// `data` is meaningful only when `success` is true, `error` only when it is
/// false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn encode(&self) -> Result<String> {
        let line = serde_json::to_string(self).map_err(FabricError::malformed)?;
        fits_frame(line, "response")
    }

    pub fn decode(frame: &str) -> Result<Self> {
        let mut envelope: ResponseEnvelope =
            serde_json::from_str(frame).map_err(FabricError::malformed)?;
        if envelope.success {
            envelope.error = None;
            envelope.data.get_or_insert(Value::Null);
        } else {
            if envelope.error.is_none() {
                return Err(FabricError::malformed("failure response without error"));
            }
            envelope.data = None;
        }
        Ok(envelope)
    }

    /// Splits the envelope into the success value or the domain error text.
    pub fn into_result(self) -> std::result::Result<Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(self.error.unwrap_or_default())
        }
    }
}

/// A fact published on the broadcast channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastFrame {
    pub topic: String,
    pub payload: Value,
}

impl BroadcastFrame {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<String> {
        validate_topic(&self.topic)?;
        let payload = serde_json::to_string(&self.payload).map_err(FabricError::malformed)?;
        fits_frame(format!("{} {}", self.topic, payload), "broadcast frame")
    }

    /// Splits on the first whitespace; everything after it is the JSON payload.
    pub fn decode(frame: &str) -> Result<Self> {
        let (topic, payload) = frame
            .split_once(char::is_whitespace)
            .ok_or_else(|| FabricError::malformed("broadcast frame has no payload"))?;
        validate_topic(topic)?;
        let payload = serde_json::from_str(payload).map_err(FabricError::malformed)?;
        Ok(Self {
            topic: topic.to_string(),
            payload,
        })
    }

    /// Deserializes the payload into a typed fact.
    pub fn parse_payload<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }
}

/// Passes `line` through if a peer's codec will accept it.
pub(crate) fn fits_frame(line: String, what: &str) -> Result<String> {
    if line.len() > MAX_FRAME_LEN {
        return Err(FabricError::malformed(format!("{what} exceeds {MAX_FRAME_LEN} bytes")));
    }
    Ok(line)
}

pub(crate) fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(FabricError::malformed("topic must not be empty"));
    }
    if topic.chars().any(char::is_whitespace) {
        return Err(FabricError::malformed(format!("topic contains whitespace: {topic:?}")));
    }
    Ok(())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
