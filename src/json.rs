// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! JSON representation
//!
//! A [`Value`] maps onto JSON as a string or an array of values; nothing else is a valid value.
//! Messages use the camel-cased field names documented on [`Message`](crate::Message).
//!
//! Decoding is defensive: the input comes from a peer, so any decoding failure becomes a
//! [`MessageError::Decode`] rather than a panic, and the decoded message still has to pass
//! [`Message::validate`] before a [`Link`](crate::Link) applies it.
//!
//! # Examples
//!
//! ## A demand for a single user
//!
//! ```json
//! {
//!   "maybeData": ["lookup", ["user", "42"]],
//!   "startMillis": 0,
//!   "maybeEndMillis": 500
//! }
//! ```
//!
//! ## Silence that never ends
//!
//! ```json
//! { "maybeData": null, "startMillis": 500, "maybeEndMillis": null }
//! ```
use crate::{Message, Value, error::MessageError};

impl Message {
    /// Decodes a message from JSON bytes.
    ///
    /// # Errors
    ///
    /// Fails with [`MessageError::Decode`] if the bytes are not a JSON message.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, MessageError> {
        serde_json::from_slice(bytes).map_err(|e| MessageError::Decode(e.to_string()))
    }

    /// Encodes the message as JSON bytes.
    pub fn to_json_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Converts a [`Value`] to a [`serde_json::Value`].
impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => s.into(),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
        }
    }
}

/// Converts a [`serde_json::Value`] to a [`Value`], rejecting anything but strings and arrays.
impl TryFrom<serde_json::Value> for Value {
    type Error = MessageError;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::String(s) => Ok(Value::String(s)),
            serde_json::Value::Array(items) => items
                .into_iter()
                .map(Value::try_from)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            other => Err(MessageError::Decode(format!(
                "expected a string or an array, found {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{DemandBatch, Entry, Message, MessageError, ResponseBatch, Value, entry, value};
    use serde_json::json;

    #[test]
    fn message_field_names() {
        let message = Message {
            permanent_until_millis: 1000,
            demands: vec![DemandBatch {
                delay_millis: 50,
                demand_data_history: vec![entry!("ping", 0, 500), entry!(_, 500)],
            }],
            responses: vec![ResponseBatch {
                delay_millis: 50,
                demand_data: value!("ping"),
                response_data_history: vec![entry!(["pong", "1"], 50, 550)],
            }],
        };
        let encoded: serde_json::Value =
            serde_json::from_slice(&message.to_json_vec().unwrap()).unwrap();
        assert_eq!(
            encoded,
            json!({
                "permanentUntilMillis": 1000,
                "demands": [{
                    "delayMillis": 50,
                    "demandDataHistory": [
                        { "maybeData": "ping", "startMillis": 0, "maybeEndMillis": 500 },
                        { "maybeData": null, "startMillis": 500, "maybeEndMillis": null },
                    ],
                }],
                "responses": [{
                    "delayMillis": 50,
                    "demandData": "ping",
                    "responseDataHistory": [
                        { "maybeData": ["pong", "1"], "startMillis": 50, "maybeEndMillis": 550 },
                    ],
                }],
            })
        );
        assert_eq!(
            Message::from_json_slice(&message.to_json_vec().unwrap()),
            Ok(message)
        );
    }

    #[test]
    fn missing_batches_default_to_empty() {
        let message = Message::from_json_slice(br#"{ "permanentUntilMillis": 7 }"#).unwrap();
        assert_eq!(message, Message::watermark(7));
    }

    #[test]
    fn decode_failures_are_errors() {
        let inputs: [&[u8]; 3] = [
            b"not json",
            br#"{ "permanentUntilMillis": "soon" }"#,
            br#"{ "permanentUntilMillis": 0, "demands": [{ "delayMillis": 0,
                "demandDataHistory": [{ "maybeData": 42, "startMillis": 0 }] }] }"#,
        ];
        for bad in inputs {
            assert!(
                matches!(Message::from_json_slice(bad), Err(MessageError::Decode(_))),
                "{}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn values_to_and_from_json() {
        let v = value!(["lookup", ["user", "42"]]);
        let j = serde_json::Value::from(v.clone());
        assert_eq!(j, json!(["lookup", ["user", "42"]]));
        assert_eq!(Value::try_from(j), Ok(v));
        assert!(Value::try_from(json!({ "a": "b" })).is_err());
        assert!(Value::try_from(json!(["a", 1])).is_err());
    }

    #[test]
    fn entry_end_defaults_to_open() {
        let entry: Entry = serde_json::from_value(json!({
            "maybeData": null,
            "startMillis": 3,
        }))
        .unwrap();
        assert_eq!(entry, entry!(_, 3));
    }
}
