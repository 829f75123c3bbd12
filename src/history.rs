// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Activity histories
//!
//! An [`ActivityHistory`] records the value of one logical signal over time, as a sequence of
//! [`Entry`] intervals. The sequence is kept
//!
//! - **ordered and contiguous**: every entry starts where the previous one ended;
//! - **coalesced**: neighbouring entries never hold equal data;
//! - **append-only**: new content can only describe time after everything already described, so
//!   nothing a peer has been told is ever retroactively rewritten;
//! - **never empty**: a fresh (or fully forgotten) history holds a zero-width silent placeholder
//!   marking the instant from which it starts describing the signal.
//!
//! Representing a continuously-valued signal as intervals rather than samples keeps the memory
//! footprint proportional to the number of distinct active segments rather than the number of
//! updates, and lets silence and indefinitely ongoing activity be modelled directly.
//!
//! The end of the last entry is the instant up to which the history is known
//! ([`ActivityHistory::known_until`]). A last entry without an end describes the signal forever;
//! such a history is *finished* and ignores further additions.
use crate::{
    Value,
    error::HistoryError,
    observer::{DummyObserver, HistoryObserver},
};
use std::fmt;

mod entry;
pub use entry::Entry;
pub(crate) use entry::min_end;

/// Milliseconds, used both for instants and for durations.
pub type Millis = i64;

/// A coalesced, gap-filled, non-overlapping sequence of [`Entry`] intervals.
#[derive(Clone, PartialEq, Eq)]
pub struct ActivityHistory<T = Value> {
    // invariant: never empty, contiguous, only the last entry may be open-ended, and the only
    // zero-width entry that can exist is a lone placeholder.
    entries: Vec<Entry<T>>,
    bounded: bool,
}

impl<T: fmt::Debug> fmt::Debug for ActivityHistory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<T> ActivityHistory<T>
where
    T: Clone + PartialEq,
{
    /// Creates a history that starts describing its signal at `start`.
    #[must_use]
    pub fn new(start: Millis) -> Self {
        Self {
            entries: vec![Entry::silent(start, Some(start))],
            bounded: false,
        }
    }

    /// Creates a history that rejects open-ended entries.
    ///
    /// Response histories are bounded: a response is only ever re-asserted or superseded, and
    /// sealing it forever would keep it from ever being collected.
    #[must_use]
    pub fn bounded(start: Millis) -> Self {
        Self {
            bounded: true,
            ..Self::new(start)
        }
    }

    /// All entries, in order.
    #[must_use]
    pub fn entries(&self) -> &[Entry<T>] {
        &self.entries
    }

    fn last(&self) -> &Entry<T> {
        self.entries.last().expect("history is never empty")
    }

    /// The earliest instant this history still describes.
    #[must_use]
    pub fn first_start(&self) -> Millis {
        self.entries[0].start
    }

    /// The instant up to which this history describes its signal, or `None` if it describes it
    /// forever.
    #[must_use]
    pub fn known_until(&self) -> Option<Millis> {
        self.last().end
    }

    /// Whether the history describes its signal forever, so that no more content can be added.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.known_until().is_none()
    }

    /// Whether the history holds nothing but its zero-width placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.entries.len() == 1 && self.entries[0].is_zero_width()
    }

    /// Whether every entry is silent.
    #[must_use]
    pub fn is_all_silent(&self) -> bool {
        self.entries.iter().all(Entry::is_silent)
    }

    /// The entry describing the instant `millis`, if the history still knows it.
    #[must_use]
    pub fn entry_at(&self, millis: Millis) -> Option<&Entry<T>> {
        let i = self.entries.partition_point(|e| e.ends_by(millis));
        self.entries.get(i).filter(|e| e.contains(millis))
    }

    /// Snapshots everything described from `millis` onwards, with the first entry clipped to
    /// start no earlier than `millis`.
    #[must_use]
    pub fn entries_since(&self, millis: Millis) -> Vec<Entry<T>> {
        let i = self.entries.partition_point(|e| e.ends_by(millis));
        self.entries[i..]
            .iter()
            .cloned()
            .filter_map(|e| e.clipped_from(millis))
            .collect()
    }

    /// Adds new content to the end of the history.
    ///
    /// Whatever part of `entry` precedes [`Self::known_until`] is ignored, and any gap between
    /// the known end and the entry's start is filled with silence. Returns whether the history
    /// changed.
    ///
    /// # Errors
    ///
    /// Fails without touching the history if the entry ends before it starts, or if it is
    /// open-ended and the history is [bounded](Self::bounded).
    pub fn add_entry(&mut self, entry: Entry<T>) -> Result<bool, HistoryError> {
        self.add_entry_observed(entry, &mut DummyObserver)
    }

    /// Like [`Self::add_entry`], but notifies `observer` if the history changed.
    pub fn add_entry_observed<O>(
        &mut self,
        entry: Entry<T>,
        observer: &mut O,
    ) -> Result<bool, HistoryError>
    where
        O: HistoryObserver,
    {
        entry.validate()?;
        if self.bounded && entry.end.is_none() {
            return Err(HistoryError::Unbounded { start: entry.start });
        }
        let Some(known_until) = self.known_until() else {
            // already describes everything, forever
            return Ok(false);
        };

        let start = entry.start.max(known_until);
        let mut changed = false;
        if known_until < start {
            changed |= self.push_merged(Entry::silent(known_until, Some(start)));
        }
        // if the entry ends at or before the true start, the gap fill above was all it had to say
        if entry.end.is_none_or(|end| start < end) {
            changed |= self.push_merged(Entry::new(entry.data, start, entry.end));
        }

        if changed {
            observer.data_added(known_until);
        }
        Ok(changed)
    }

    // `entry` must start exactly at the current known end and must not be zero-width.
    fn push_merged(&mut self, entry: Entry<T>) -> bool {
        let last = self.entries.last_mut().expect("history is never empty");
        debug_assert_eq!(last.end, Some(entry.start));
        if last.data == entry.data {
            last.end = entry.end;
        } else if last.is_zero_width() {
            // only a lone placeholder can be zero-width
            *last = entry;
        } else {
            self.entries.push(entry);
        }
        true
    }

    /// Asserts `data` over `[start, end)`, or from `start` on forever if `end` is `None`.
    pub fn set_data(
        &mut self,
        data: T,
        start: Millis,
        end: Option<Millis>,
    ) -> Result<bool, HistoryError> {
        self.add_entry(Entry::active(data, start, end))
    }

    /// Asserts silence over `[start, end)`.
    ///
    /// A zero-width suspension (`start == end`) merely marks the history as known, and silent,
    /// up to that instant.
    pub fn suspend_data(&mut self, start: Millis, end: Option<Millis>) -> Result<bool, HistoryError> {
        self.add_entry(Entry::silent(start, end))
    }

    /// Asserts silence from `start` on, forever.
    pub fn finish_data(&mut self, start: Millis) -> Result<bool, HistoryError> {
        self.add_entry(Entry::silent(start, None))
    }

    /// Drops every entry that ends before `millis`. Returns whether anything was dropped.
    ///
    /// If that would leave the history empty, a zero-width silent placeholder is kept at the
    /// last forgotten boundary, so that new content can still never describe forgotten time.
    pub fn forget_before(&mut self, millis: Millis) -> bool {
        self.forget_before_observed(millis, &mut DummyObserver)
    }

    /// Like [`Self::forget_before`], but notifies `observer` if anything was dropped.
    pub fn forget_before_observed<O>(&mut self, millis: Millis, observer: &mut O) -> bool
    where
        O: HistoryObserver,
    {
        if self.is_placeholder() {
            return false;
        }
        let keep_from = self
            .entries
            .partition_point(|e| e.end.is_some_and(|end| end < millis));
        if keep_from == 0 {
            return false;
        }

        let boundary = self.entries[keep_from - 1].end;
        self.entries.drain(..keep_from);
        if self.entries.is_empty() {
            let boundary = boundary.expect("only entries with an end are forgotten");
            self.entries.push(Entry::silent(boundary, Some(boundary)));
        }
        observer.forgotten(millis);
        true
    }
}
