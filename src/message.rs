// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The wire record exchanged between two [`Link`](crate::Link)s.
//!
//! A [`Message`] carries the sender's permanent-until watermark and the parts of its demand and
//! response histories the receiver has not seen yet. With the `serde` feature the field names
//! are camel-cased, so a message looks like this on the wire:
//!
//! ```json
//! {
//!   "permanentUntilMillis": 1000,
//!   "demands": [
//!     { "delayMillis": 50, "demandDataHistory": [
//!       { "maybeData": "ping", "startMillis": 0, "maybeEndMillis": 500 } ] }
//!   ],
//!   "responses": [
//!     { "delayMillis": 50, "demandData": "ping", "responseDataHistory": [
//!       { "maybeData": "pong", "startMillis": 50, "maybeEndMillis": 550 } ] }
//!   ]
//! }
//! ```
use crate::{Entry, LinkConfig, Value, error::MessageError, history::Millis};

/// One flush worth of changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Message {
    /// The sender promises that nothing it says about time before this instant will change.
    pub permanent_until_millis: Millis,
    #[cfg_attr(feature = "serde", serde(default))]
    pub demands: Vec<DemandBatch>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub responses: Vec<ResponseBatch>,
}

/// The unsent part of one demander's demand history.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct DemandBatch {
    pub delay_millis: Millis,
    pub demand_data_history: Vec<Entry>,
}

/// The unsent part of the response history answering `demand_data` at `delay_millis`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ResponseBatch {
    pub delay_millis: Millis,
    pub demand_data: Value,
    pub response_data_history: Vec<Entry>,
}

impl Message {
    /// A message carrying nothing but a watermark.
    #[must_use]
    pub fn watermark(permanent_until_millis: Millis) -> Self {
        Self {
            permanent_until_millis,
            ..Self::default()
        }
    }

    /// Whether the message carries no history at all.
    #[must_use]
    pub fn is_bare(&self) -> bool {
        self.demands.is_empty() && self.responses.is_empty()
    }

    /// Checks everything about the message that can be checked without knowing the receiver's
    /// state.
    ///
    /// # Errors
    ///
    /// Returns the first problem found. A message that fails validation must be rejected as a
    /// whole.
    pub fn validate(&self, config: &LinkConfig) -> Result<(), MessageError> {
        let count = self.demands.len() + self.responses.len();
        if count > config.max_batches {
            return Err(MessageError::TooManyBatches {
                count,
                max: config.max_batches,
            });
        }

        for batch in &self.demands {
            validate_delay(batch.delay_millis)?;
            validate_history(&batch.demand_data_history, config)?;
        }

        for batch in &self.responses {
            validate_delay(batch.delay_millis)?;
            validate_depth(&batch.demand_data, config)?;
            validate_history(&batch.response_data_history, config)?;
            if let Some(open) = batch.response_data_history.iter().find(|e| e.end.is_none()) {
                return Err(MessageError::UnboundedResponse {
                    delay: batch.delay_millis,
                    start: open.start,
                });
            }
        }
        Ok(())
    }
}

fn validate_delay(delay: Millis) -> Result<(), MessageError> {
    if delay < 0 {
        return Err(MessageError::NegativeDelay(delay));
    }
    Ok(())
}

fn validate_depth(value: &Value, config: &LinkConfig) -> Result<(), MessageError> {
    let depth = value.depth();
    if depth > config.max_value_depth {
        return Err(MessageError::TooDeep {
            depth,
            max: config.max_value_depth,
        });
    }
    Ok(())
}

// Entries must be individually valid and in order. Gaps are fine, they are read as silence.
fn validate_history(entries: &[Entry], config: &LinkConfig) -> Result<(), MessageError> {
    for entry in entries {
        entry.validate()?;
        if let Some(data) = &entry.data {
            validate_depth(data, config)?;
        }
    }
    for pair in entries.windows(2) {
        let (previous, next) = (&pair[0], &pair[1]);
        if !previous.ends_by(next.start) {
            return Err(MessageError::Disordered {
                start: next.start,
                previous_end: previous.end,
            });
        }
    }
    Ok(())
}
