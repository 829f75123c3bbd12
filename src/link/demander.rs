// (c) Copyright 2025 Helsing GmbH. All rights reserved.
use super::{ResponseMap, reconcile::reconcile, request_flush};
use crate::{
    ActivityHistory, Entry, Value,
    error::LinkError,
    history::Millis,
    transport::Transport,
};
use std::fmt;

slotmap::new_key_type! {
    /// Identifies a demander of one [`Link`](crate::Link).
    ///
    /// Ids are never reused, so an id of a scrapped demander stays invalid forever.
    pub struct DemanderId;
}

pub(super) type ResponseCallback = Box<dyn FnMut(&[Entry])>;

/// A local stream of demand, and the response derived for it.
pub(super) struct Demander {
    pub(super) delay: Millis,
    pub(super) demand: ActivityHistory,
    pub(super) response: ActivityHistory,
    // demand before this instant has been handed to the transport
    pub(super) sent_until: Millis,
    // the open-ended end of the demand has been handed to the transport
    pub(super) sent_finished: bool,
    pub(super) on_response_available: ResponseCallback,
}

impl fmt::Debug for Demander {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Demander")
            .field("delay", &self.delay)
            .field("demand", &self.demand)
            .field("response", &self.response)
            .field("sent_until", &self.sent_until)
            .field("sent_finished", &self.sent_finished)
            .finish_non_exhaustive()
    }
}

impl Demander {
    pub(super) fn new(
        out_permanent_until: Millis,
        delay: Millis,
        on_response_available: ResponseCallback,
    ) -> Self {
        Self {
            delay,
            demand: ActivityHistory::new(out_permanent_until),
            response: ActivityHistory::new(out_permanent_until.saturating_add(delay)),
            sent_until: out_permanent_until,
            sent_finished: false,
            on_response_available,
        }
    }

    pub(super) fn notify(&mut self) {
        (self.on_response_available)(self.response.entries());
    }

    /// Everything about the demand the peer has not been told yet, marking it as told.
    pub(super) fn take_unsent_demand(&mut self) -> Option<Vec<Entry>> {
        if self.sent_finished {
            return None;
        }
        let entries = self.demand.entries_since(self.sent_until);
        match self.demand.known_until() {
            Some(known) => self.sent_until = known,
            None => self.sent_finished = true,
        }
        (!entries.is_empty()).then_some(entries)
    }

    /// Forgets demand that has been both sent and reconciled.
    pub(super) fn compact(&mut self) {
        let reconciled = self
            .response
            .known_until()
            .map(|known| known.saturating_sub(self.delay));
        let before = reconciled.map_or(self.sent_until, |r| r.min(self.sent_until));
        self.demand.forget_before(before);
    }

    pub(super) fn is_scrappable(&self) -> bool {
        self.sent_finished && self.response.is_finished()
    }
}

/// A handle for writing the demand of one demander and reading its response.
///
/// Obtained from [`Link::demander`](crate::Link::demander). Every write is reconciled against
/// the responses received so far before it returns, and schedules a flush if it changed the
/// demand.
pub struct DemanderMut<'link, Tr> {
    pub(super) demander: &'link mut Demander,
    pub(super) in_responses: &'link ResponseMap<ActivityHistory>,
    pub(super) in_permanent_until: Millis,
    pub(super) send_pending: &'link mut bool,
    pub(super) transport: &'link mut Tr,
}

impl<Tr: Transport> DemanderMut<'_, Tr> {
    /// The assumed round trip between demanding something and the response to it.
    #[must_use]
    pub fn delay(&self) -> Millis {
        self.demander.delay
    }

    /// Demands `data` over `[start, end)`, or from `start` on if `end` is `None`.
    ///
    /// Like every history write, this only ever extends the demand: whatever part of the
    /// interval is already described is ignored. Returns whether the demand changed.
    pub fn set_demand(
        &mut self,
        data: Value,
        start: Millis,
        end: Option<Millis>,
    ) -> Result<bool, LinkError> {
        self.write(Entry::active(data, start, end))
    }

    /// Demands nothing over `[start, end)`.
    pub fn suspend_demand(&mut self, start: Millis, end: Option<Millis>) -> Result<bool, LinkError> {
        self.write(Entry::silent(start, end))
    }

    /// Demands nothing from `start` on, forever.
    ///
    /// This is how a demander is cancelled: once the peer has been told, and the response is
    /// known up to the same point, the demander is dropped by the next flush.
    pub fn finish_demand(&mut self, start: Millis) -> Result<bool, LinkError> {
        self.write(Entry::silent(start, None))
    }

    fn write(&mut self, entry: Entry) -> Result<bool, LinkError> {
        if !self.demander.demand.add_entry(entry)? {
            return Ok(false);
        }
        if reconcile(self.demander, self.in_responses, self.in_permanent_until)? {
            self.demander.notify();
        }
        request_flush(self.send_pending, self.transport);
        Ok(true)
    }

    /// The demand, as far as it has not been forgotten.
    #[must_use]
    pub fn demand_entries(&self) -> &[Entry] {
        self.demander.demand.entries()
    }

    /// The response derived so far, in response time.
    #[must_use]
    pub fn response_entries(&self) -> &[Entry] {
        self.demander.response.entries()
    }

    /// Forgets response entries ending before `millis`, in response time.
    pub fn forget_response_before(&mut self, millis: Millis) -> bool {
        self.demander.response.forget_before(millis)
    }

    /// Forgets response entries answering demand that ended before `millis`, in demand time.
    pub fn forget_response_before_demand_millis(&mut self, millis: Millis) -> bool {
        self.demander
            .response
            .forget_before(millis.saturating_add(self.demander.delay))
    }

    /// Whether the demand has finished, the peer knows it, and the response is complete.
    ///
    /// A scrappable demander is dropped by the next flush.
    #[must_use]
    pub fn is_scrappable(&self) -> bool {
        self.demander.is_scrappable()
    }
}
