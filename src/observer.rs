// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Observe changes to an [`ActivityHistory`](crate::ActivityHistory).
//!
//! Observers are notified synchronously, before the mutating call returns, and only when the
//! mutation actually changed something. Re-asserting content a history already holds does not
//! notify.
//!
//! For a testing-oriented example, see [`RecordingObserver`].
use crate::history::Millis;

/// Receives notifications about changes to a history.
///
/// Both methods default to doing nothing, so implementors only override what they care about.
#[expect(unused_variables)]
pub trait HistoryObserver {
    /// New content was added. Everything at or after `from` may have changed; nothing before it
    /// did.
    fn data_added(&mut self, from: Millis) {}

    /// Entries ending before `before` were dropped.
    fn forgotten(&mut self, before: Millis) {}
}

/// An observer that does nothing.
///
/// Using it helps the compiler optimise the notification away.
pub struct DummyObserver;

impl HistoryObserver for DummyObserver {}

/// Tracks the earliest instant touched by a series of additions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EarliestChange(pub Option<Millis>);

impl HistoryObserver for EarliestChange {
    fn data_added(&mut self, from: Millis) {
        self.0 = Some(self.0.map_or(from, |seen| seen.min(from)));
    }
}

/// An observer that records all calls in a human readable form. This is mostly useful for
/// tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    /// A string-representation of each call that the observer has received.
    pub changes_seen: Vec<String>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryObserver for RecordingObserver {
    fn data_added(&mut self, from: Millis) {
        self.changes_seen.push(format!("added from {from}"));
    }

    fn forgotten(&mut self, before: Millis) {
        self.changes_seen.push(format!("forgot before {before}"));
    }
}
