// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Error types.
//!
//! Two families of failures exist. Invariant violations ([`HistoryError`], most of [`LinkError`])
//! are programming errors by the caller: the violating call returns an error and leaves its
//! target in its last valid state. Malformed inbound messages ([`MessageError`]) cross a trust
//! boundary and are recoverable per message: the message is rejected as a whole and the
//! [`Link`](crate::Link) carries on as if it had never arrived.
use crate::history::Millis;

/// An entry could not be added to an [`ActivityHistory`](crate::ActivityHistory).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// The entry ends before it starts.
    #[error("entry ends at {end} before it starts at {start}")]
    EndBeforeStart { start: Millis, end: Millis },

    /// The entry never ends, but the history only accepts bounded entries.
    #[error("entry starting at {start} never ends, but this history only holds bounded entries")]
    Unbounded { start: Millis },
}

/// An inbound [`Message`](crate::Message) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The bytes could not be decoded into a message at all.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// A history in the message holds an entry that is malformed on its own.
    #[error("malformed entry: {0}")]
    Entry(#[from] HistoryError),

    /// A history in the message is not ordered, or has an open-ended entry before its last one.
    #[error("entry starting at {start} overlaps the previous entry ending at {previous_end:?}")]
    Disordered {
        start: Millis,
        previous_end: Option<Millis>,
    },

    /// A response entry never ends. Responses are only ever re-asserted, never sealed.
    #[error("response entry for delay {delay} starting at {start} never ends")]
    UnboundedResponse { delay: Millis, start: Millis },

    #[error("negative delay {0}")]
    NegativeDelay(Millis),

    /// A value nests deeper than the configured maximum.
    #[error("value nests {depth} levels deep, at most {max} are accepted")]
    TooDeep { depth: usize, max: usize },

    /// The message carries more batches than the configured maximum.
    #[error("message carries {count} batches, at most {max} are accepted")]
    TooManyBatches { count: usize, max: usize },

    /// The message's watermark is lower than one already received, so it was reordered or
    /// replayed by the transport.
    #[error("watermark {received} is older than the already received {known}")]
    StaleWatermark { received: Millis, known: Millis },
}

/// A [`Link`](crate::Link) operation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("rejected inbound message: {0}")]
    Message(#[from] MessageError),

    /// The demander was scrapped or never existed on this link.
    #[error("unknown demander")]
    UnknownDemander,

    /// A demander cannot describe time this link has already promised is final.
    #[error("demand starting at {start} precedes the promised permanent-until watermark {watermark}")]
    BeforeWatermark { start: Millis, watermark: Millis },

    #[error("negative delay {0}")]
    NegativeDelay(Millis),
}
