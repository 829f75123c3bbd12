// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # Links
//!
//! A [`Link`] is one endpoint of the demand/response protocol. It owns
//!
//! - the **demanders**: local demand streams, each with the response derived for it;
//! - the **outgoing responses**: what this side answers to the peer's demand, keyed by
//!   `(delay, demanded value)`;
//! - the **incoming responses**: what the peer answered, keyed the same way;
//! - the **incoming demand log**: the peer's demand, as it arrived.
//!
//! and the two watermarks that bound all of it: the instant before which this side promised
//! the peer nothing will change any more, and the instant the peer promised the same for itself.
//!
//! ## Batching
//!
//! Every mutation that changes something the peer should learn about asks the transport to
//! defer a flush, once, until that flush has run. [`Link::flush`] then collects everything new
//! into a single [`Message`], collects dead state, and sends nothing at all if the peer would
//! learn nothing.
//!
//! ## Collection
//!
//! Nothing in a link grows without bound as long as both sides keep raising their watermarks:
//!
//! - demand is forgotten once it was sent and its response reconciled;
//! - outgoing responses are forgotten once sent and before our watermark, and dropped entirely
//!   once they hold nothing beyond it;
//! - incoming responses are forgotten before the earliest instant any demander still needs;
//! - demanders are dropped once their demand finished, the peer knows, and their response is
//!   complete.
use crate::{
    ActivityHistory, Entry, GcMap, LinkConfig, Value,
    error::{LinkError, MessageError},
    history::Millis,
    message::{DemandBatch, Message, ResponseBatch},
    observer::EarliestChange,
    transport::Transport,
};
use slotmap::SlotMap;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

mod demander;
mod reconcile;

use demander::Demander;
pub use demander::{DemanderId, DemanderMut};
use reconcile::reconcile;

/// Histories keyed by delay, then by the demanded value.
pub(crate) type ResponseMap<V> = GcMap<Millis, GcMap<Value, V, Millis>>;

fn in_response_history(_: &Value, start: Millis) -> ActivityHistory {
    ActivityHistory::bounded(start)
}

pub(crate) fn in_response_delay(_: &Millis, (): ()) -> GcMap<Value, ActivityHistory, Millis> {
    GcMap::new(in_response_history)
}

/// A response this side asserts, and how much of it the peer has been sent.
#[derive(Debug)]
struct OutResponse {
    history: ActivityHistory,
    sent_until: Millis,
}

impl OutResponse {
    fn is_collectible(&self, watermark: Millis) -> bool {
        self.history
            .known_until()
            .is_none_or(|known| known <= self.sent_until && known <= watermark)
    }
}

fn out_response(_: &Value, start: Millis) -> OutResponse {
    OutResponse {
        history: ActivityHistory::bounded(start),
        sent_until: start,
    }
}

fn out_response_delay(_: &Millis, (): ()) -> GcMap<Value, OutResponse, Millis> {
    GcMap::new(out_response)
}

/// Demand received from the peer in one message, for one of its demanders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InDemand {
    delay: Millis,
    history: ActivityHistory,
}

impl InDemand {
    /// The delay at which the peer expects responses to this demand.
    #[must_use]
    pub fn delay(&self) -> Millis {
        self.delay
    }

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        self.history.entries()
    }

    #[must_use]
    pub fn history(&self) -> &ActivityHistory {
        &self.history
    }
}

// Asks for a flush unless one is already pending.
fn request_flush<Tr: Transport>(send_pending: &mut bool, transport: &mut Tr) {
    if !*send_pending {
        *send_pending = true;
        transport.defer_flush();
    }
}

/// One endpoint of the demand/response protocol.
///
/// All methods take `&mut self` and run to completion; callbacks run before the call that
/// triggered them returns.
pub struct Link<Tr> {
    config: LinkConfig,
    transport: Tr,

    // we promised the peer that nothing we say before this changes any more
    other_out_permanent_until: Millis,
    sent_out_permanent_until: Option<Millis>,
    // the peer promised us the same
    in_permanent_until: Millis,
    // incoming responses before this are of no use to any demander
    in_response_ignorance: Millis,

    demanders: SlotMap<DemanderId, Demander>,
    out_responses: ResponseMap<OutResponse>,
    in_responses: ResponseMap<ActivityHistory>,
    in_demands: Vec<InDemand>,

    send_pending: bool,
    on_demand_available: Option<Box<dyn FnMut()>>,
}

impl<Tr> std::fmt::Debug for Link<Tr> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("other_out_permanent_until", &self.other_out_permanent_until)
            .field("sent_out_permanent_until", &self.sent_out_permanent_until)
            .field("in_permanent_until", &self.in_permanent_until)
            .field("in_response_ignorance", &self.in_response_ignorance)
            .field("demanders", &self.demanders.len())
            .field("out_responses", &self.out_responses)
            .field("in_responses", &self.in_responses)
            .field("in_demands", &self.in_demands)
            .field("send_pending", &self.send_pending)
            .finish_non_exhaustive()
    }
}

impl<Tr: Transport> Link<Tr> {
    /// Creates a link with the default [`LinkConfig`].
    pub fn new(transport: Tr) -> Self {
        Self::with_config(LinkConfig::default(), transport)
    }

    pub fn with_config(config: LinkConfig, transport: Tr) -> Self {
        let start = config.start_millis;
        Self {
            config,
            transport,
            other_out_permanent_until: start,
            sent_out_permanent_until: None,
            in_permanent_until: start,
            in_response_ignorance: start,
            demanders: SlotMap::with_key(),
            out_responses: GcMap::new(out_response_delay),
            in_responses: GcMap::new(in_response_delay),
            in_demands: Vec::new(),
            send_pending: false,
            on_demand_available: None,
        }
    }

    /// Registers a callback run whenever a received message carried demand.
    ///
    /// The new demand is then available from [`Self::in_demands`].
    pub fn on_demand_available(&mut self, callback: impl FnMut() + 'static) {
        self.on_demand_available = Some(Box::new(callback));
    }

    #[must_use]
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    #[must_use]
    pub fn transport(&self) -> &Tr {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Tr {
        &mut self.transport
    }

    /// The watermark this side has promised the peer.
    #[must_use]
    pub fn other_out_permanent_until(&self) -> Millis {
        self.other_out_permanent_until
    }

    /// The watermark most recently handed to the transport, if any.
    #[must_use]
    pub fn sent_out_permanent_until(&self) -> Option<Millis> {
        self.sent_out_permanent_until
    }

    /// The watermark the peer has promised this side.
    #[must_use]
    pub fn in_permanent_until(&self) -> Millis {
        self.in_permanent_until
    }

    /// Incoming responses before this instant are of no use to any demander any more.
    #[must_use]
    pub fn in_response_ignorance(&self) -> Millis {
        self.in_response_ignorance
    }

    fn trigger_send(&mut self) {
        request_flush(&mut self.send_pending, &mut self.transport);
    }

    /// Creates a demander whose demand starts at `out_permanent_until` and whose responses are
    /// expected `delay` after the demand.
    ///
    /// `on_response_available` is called with the whole derived response whenever it grew.
    ///
    /// Until its first demand is written, the demander does not hold back the forgetting of
    /// received responses.
    ///
    /// # Errors
    ///
    /// Fails if `delay` is negative, or if the demand would start before the watermark this side
    /// has already promised.
    pub fn new_out_demander(
        &mut self,
        out_permanent_until: Millis,
        delay: Millis,
        on_response_available: impl FnMut(&[Entry]) + 'static,
    ) -> Result<DemanderId, LinkError> {
        if delay < 0 {
            return Err(LinkError::NegativeDelay(delay));
        }
        if out_permanent_until < self.other_out_permanent_until {
            return Err(LinkError::BeforeWatermark {
                start: out_permanent_until,
                watermark: self.other_out_permanent_until,
            });
        }
        let demander = Demander::new(out_permanent_until, delay, Box::new(on_response_available));
        let id = self.demanders.insert(demander);
        debug!(?id, out_permanent_until, delay, "created demander");
        Ok(id)
    }

    /// Returns a handle to the demander `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`LinkError::UnknownDemander`] if the demander was scrapped, or was never
    /// created on this link.
    pub fn demander(&mut self, id: DemanderId) -> Result<DemanderMut<'_, Tr>, LinkError> {
        let demander = self
            .demanders
            .get_mut(id)
            .ok_or(LinkError::UnknownDemander)?;
        Ok(DemanderMut {
            demander,
            in_responses: &self.in_responses,
            in_permanent_until: self.in_permanent_until,
            send_pending: &mut self.send_pending,
            transport: &mut self.transport,
        })
    }

    /// Ids of all demanders that have not been scrapped yet.
    pub fn demander_ids(&self) -> impl Iterator<Item = DemanderId> + '_ {
        self.demanders.keys()
    }

    /// Asserts `data` as the response to `input` at `delay`, over `[start, end)` in response
    /// time.
    ///
    /// Responses are never open-ended; keep re-asserting to extend one. Returns whether the
    /// response changed.
    pub fn set_out_response(
        &mut self,
        delay: Millis,
        input: &Value,
        data: Value,
        start: Millis,
        end: Millis,
    ) -> Result<bool, LinkError> {
        self.write_out_response(delay, input, Entry::active(data, start, Some(end)))
    }

    /// Asserts that there is no response to `input` at `delay` over `[start, end)`.
    pub fn suspend_out_response(
        &mut self,
        delay: Millis,
        input: &Value,
        start: Millis,
        end: Millis,
    ) -> Result<bool, LinkError> {
        self.write_out_response(delay, input, Entry::silent(start, Some(end)))
    }

    fn write_out_response(
        &mut self,
        delay: Millis,
        input: &Value,
        entry: Entry,
    ) -> Result<bool, LinkError> {
        if delay < 0 {
            return Err(LinkError::NegativeDelay(delay));
        }
        entry.validate()?;
        let watermark = self.other_out_permanent_until;
        let response = self
            .out_responses
            .get_or_make(&delay, ())
            .get_or_make(input, watermark);
        let changed = response.history.add_entry(entry)?;
        if changed {
            self.trigger_send();
        }
        Ok(changed)
    }

    /// The outgoing response to `input` at `delay`, as far as it is still held.
    #[must_use]
    pub fn out_response_entries(&self, delay: Millis, input: &Value) -> Option<&[Entry]> {
        self.out_responses
            .get(&delay)?
            .get(input)
            .map(|response| response.history.entries())
    }

    /// The response to `input` at `delay` received from the peer, as far as it is still held.
    #[must_use]
    pub fn in_response_entries(&self, delay: Millis, input: &Value) -> Option<&[Entry]> {
        self.in_responses
            .get(&delay)?
            .get(input)
            .map(ActivityHistory::entries)
    }

    /// Demand received from the peer, one item per demander and message, oldest first.
    #[must_use]
    pub fn in_demands(&self) -> &[InDemand] {
        &self.in_demands
    }

    /// Takes all received demand out of the link.
    pub fn take_in_demands(&mut self) -> Vec<InDemand> {
        std::mem::take(&mut self.in_demands)
    }

    /// Forgets received demand ending before `millis`, dropping demand with nothing left.
    pub fn forget_in_demand_before(&mut self, millis: Millis) {
        self.in_demands.retain_mut(|demand| {
            demand.history.forget_before(millis);
            !demand.history.is_placeholder()
        });
    }

    /// Promises the peer that nothing this side says about time before `millis` will change.
    ///
    /// Every outgoing history is marked silent up to `millis`, so later writes can no longer
    /// describe that time. Raising the watermark to an instant at or before the current one does
    /// nothing and returns `false`.
    pub fn raise_other_out_permanent_until(&mut self, millis: Millis) -> Result<bool, LinkError> {
        if millis <= self.other_out_permanent_until {
            return Ok(false);
        }
        self.other_out_permanent_until = millis;

        for response in self.out_responses.values_mut().flat_map(GcMap::values_mut) {
            response.history.suspend_data(millis, Some(millis))?;
        }
        for (_, demander) in &mut self.demanders {
            if demander.demand.suspend_data(millis, Some(millis))?
                && reconcile(demander, &self.in_responses, self.in_permanent_until)?
            {
                demander.notify();
            }
        }

        debug!(watermark = millis, "raised outgoing watermark");
        self.trigger_send();
        Ok(true)
    }

    /// Applies a message received from the peer.
    ///
    /// # Errors
    ///
    /// Fails if the message does not validate, or if its watermark is lower than one already
    /// received. A rejected message leaves the link untouched.
    pub fn receive_message(&mut self, message: Message) -> Result<(), LinkError> {
        if let Err(error) = message.validate(&self.config) {
            warn!(%error, "rejected inbound message");
            return Err(error.into());
        }
        if message.permanent_until_millis < self.in_permanent_until {
            let error = MessageError::StaleWatermark {
                received: message.permanent_until_millis,
                known: self.in_permanent_until,
            };
            warn!(%error, "rejected inbound message");
            return Err(error.into());
        }

        let Message {
            permanent_until_millis,
            demands,
            responses,
        } = message;
        debug!(
            watermark = permanent_until_millis,
            demands = demands.len(),
            responses = responses.len(),
            "received message"
        );

        let demand_arrived = !demands.is_empty();
        for batch in demands {
            let mut history = ActivityHistory::new(self.in_permanent_until);
            for entry in batch.demand_data_history {
                history.add_entry(entry)?;
            }
            self.in_demands.push(InDemand {
                delay: batch.delay_millis,
                history,
            });
        }

        let mut touched: SmallVec<[Millis; 4]> = SmallVec::new();
        for batch in responses {
            let history = self
                .in_responses
                .get_or_make(&batch.delay_millis, ())
                .get_or_make(&batch.demand_data, self.in_response_ignorance);
            let mut earliest = EarliestChange::default();
            for entry in batch.response_data_history {
                history.add_entry_observed(entry, &mut earliest)?;
            }
            if let EarliestChange(Some(from)) = earliest {
                trace!(
                    delay = batch.delay_millis,
                    input = ?batch.demand_data,
                    from,
                    "received response"
                );
                if !touched.contains(&batch.delay_millis) {
                    touched.push(batch.delay_millis);
                }
            }
        }

        let raised = permanent_until_millis > self.in_permanent_until;
        if raised {
            self.in_permanent_until = permanent_until_millis;
            for history in self.in_responses.values_mut().flat_map(GcMap::values_mut) {
                history.suspend_data(permanent_until_millis, Some(permanent_until_millis))?;
            }
        }

        for (_, demander) in &mut self.demanders {
            if (raised || touched.contains(&demander.delay))
                && reconcile(demander, &self.in_responses, self.in_permanent_until)?
            {
                demander.notify();
            }
        }

        self.update_in_response_ignorance();
        self.forget_in_responses();

        if demand_arrived {
            if let Some(callback) = &mut self.on_demand_available {
                callback();
            }
        }
        Ok(())
    }

    /// Decodes a JSON message and applies it like [`Self::receive_message`].
    #[cfg(feature = "json")]
    pub fn receive_json(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let message = Message::from_json_slice(bytes).inspect_err(|error| {
            warn!(%error, "rejected inbound message");
        })?;
        self.receive_message(message)
    }

    fn update_in_response_ignorance(&mut self) {
        self.in_response_ignorance = self
            .demanders
            .values()
            // a demander without demand needs no response before its first demand
            .filter(|demander| !demander.demand.is_placeholder())
            .filter_map(|demander| demander.response.known_until())
            .fold(self.in_permanent_until, Millis::min);
    }

    fn forget_in_responses(&mut self) {
        let ignorance = self.in_response_ignorance;
        for history in self.in_responses.values_mut().flat_map(GcMap::values_mut) {
            history.forget_before(ignorance);
        }
    }

    /// Sends everything the peer has not been told yet, as a single message, and collects dead
    /// state.
    ///
    /// This is meant to be called by whatever the transport's
    /// [`defer_flush`](Transport::defer_flush) scheduled, but calling it at any other time is
    /// harmless. If the peer would learn nothing new, nothing is sent.
    pub fn flush(&mut self) {
        self.send_pending = false;
        let watermark = self.other_out_permanent_until;

        let mut demands = Vec::new();
        for (_, demander) in &mut self.demanders {
            if let Some(entries) = demander.take_unsent_demand() {
                demands.push(DemandBatch {
                    delay_millis: demander.delay,
                    demand_data_history: entries,
                });
            }
            demander.compact();
        }

        let mut responses = Vec::new();
        for (delay, by_input) in self.out_responses.iter_mut() {
            for (input, response) in by_input.iter_mut() {
                response
                    .history
                    .forget_before(response.sent_until.min(watermark));
                let entries = response.history.entries_since(response.sent_until);
                if let Some(known) = response.history.known_until() {
                    response.sent_until = known;
                }
                if !entries.is_empty() {
                    responses.push(ResponseBatch {
                        delay_millis: *delay,
                        demand_data: input.clone(),
                        response_data_history: entries,
                    });
                }
            }
        }
        responses.sort_by(|a, b| {
            (a.delay_millis, &a.demand_data).cmp(&(b.delay_millis, &b.demand_data))
        });

        self.out_responses.sweep(|_, by_input| {
            by_input.sweep(|_, response| response.is_collectible(watermark))
        });
        self.demanders.retain(|id, demander| {
            let scrappable = demander.is_scrappable();
            if scrappable {
                debug!(?id, "scrapped demander");
            }
            !scrappable
        });

        self.update_in_response_ignorance();
        self.forget_in_responses();
        let ignorance = self.in_response_ignorance;
        self.in_responses.sweep(|_, by_input| {
            by_input.sweep(|_, history| history.known_until().is_some_and(|k| k <= ignorance))
        });

        let message = Message {
            permanent_until_millis: watermark,
            demands,
            responses,
        };
        if message.is_bare() && self.sent_out_permanent_until == Some(watermark) {
            trace!("nothing to send");
            return;
        }
        debug!(
            watermark,
            demands = message.demands.len(),
            responses = message.responses.len(),
            "sending message"
        );
        self.sent_out_permanent_until = Some(watermark);
        self.transport.send_message(message);
    }
}

impl Link<crate::transport::Outbox> {
    /// Runs a flush if one was requested, and returns everything sent since the last call.
    ///
    /// This stands in for a scheduler when the link is driven by hand.
    pub fn run_deferred(&mut self) -> Vec<Message> {
        if self.transport.take_flush_request() {
            self.flush();
        }
        self.transport.take_sent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{entry, transport::Outbox, value};
    use std::{cell::RefCell, rc::Rc};

    fn link() -> Link<Outbox> {
        Link::new(Outbox::default())
    }

    #[test]
    fn demander_validation() {
        let mut link = link();
        assert_eq!(
            link.new_out_demander(0, -1, |_| {}),
            Err(LinkError::NegativeDelay(-1))
        );
        link.raise_other_out_permanent_until(100).unwrap();
        assert_eq!(
            link.new_out_demander(99, 0, |_| {}),
            Err(LinkError::BeforeWatermark {
                start: 99,
                watermark: 100
            })
        );
        assert!(link.new_out_demander(100, 0, |_| {}).is_ok());
    }

    #[test]
    fn unknown_demander() {
        let mut link = link();
        let id = link.new_out_demander(0, 0, |_| {}).unwrap();
        let mut other = self::link();
        assert!(matches!(other.demander(id), Err(LinkError::UnknownDemander)));
        assert!(link.demander(id).is_ok());
    }

    #[test]
    fn one_flush_request_per_batch() {
        let mut link = link();
        let id = link.new_out_demander(0, 10, |_| {}).unwrap();
        {
            let mut d = link.demander(id).unwrap();
            d.set_demand(value!("a"), 0, Some(10)).unwrap();
            d.set_demand(value!("b"), 10, Some(20)).unwrap();
        }
        link.set_out_response(5, &value!("x"), value!("y"), 0, 10)
            .unwrap();
        assert_eq!(link.transport().flush_requests(), 1);

        let sent = link.run_deferred();
        assert_eq!(sent.len(), 1);
        assert_eq!(
            sent[0].demands[0].demand_data_history,
            [entry!("a", 0, 10), entry!("b", 10, 20)]
        );
        assert_eq!(
            sent[0].responses[0].response_data_history,
            [entry!("y", 0, 10)]
        );

        // re-asserting known content changes nothing, and requests nothing
        assert_eq!(
            link.demander(id)
                .unwrap()
                .set_demand(value!("a"), 0, Some(10)),
            Ok(false)
        );
        assert_eq!(link.transport().flush_requests(), 0);
    }

    #[test]
    fn idle_flushes_send_nothing() {
        let mut link = link();
        link.flush();
        assert_eq!(link.transport_mut().take_sent(), [Message::watermark(0)]);
        link.flush();
        link.flush();
        assert!(link.transport().sent().is_empty());
    }

    #[test]
    fn malformed_out_response_leaves_no_trace() {
        let mut link = link();
        assert!(matches!(
            link.set_out_response(0, &value!("x"), value!("y"), 10, 5),
            Err(LinkError::History(_))
        ));
        assert_eq!(link.out_response_entries(0, &value!("x")), None);
        assert_eq!(
            link.suspend_out_response(-3, &value!("x"), 0, 5),
            Err(LinkError::NegativeDelay(-3))
        );
        assert_eq!(link.transport().flush_requests(), 0);
    }

    #[test]
    fn rejected_messages_change_nothing() {
        let mut link = link();
        link.receive_message(Message::watermark(100)).unwrap();

        let stale = Message::watermark(50);
        assert_eq!(
            link.receive_message(stale),
            Err(LinkError::Message(MessageError::StaleWatermark {
                received: 50,
                known: 100
            }))
        );

        let malformed = Message {
            permanent_until_millis: 200,
            demands: vec![DemandBatch {
                delay_millis: 0,
                demand_data_history: vec![entry!("x", 300, 250)],
            }],
            responses: vec![],
        };
        assert!(link.receive_message(malformed).is_err());
        assert_eq!(link.in_permanent_until(), 100);
        assert!(link.in_demands().is_empty());
    }

    #[test]
    fn received_demand_is_anchored_at_the_previous_watermark() {
        let mut link = link();
        let arrivals = Rc::new(RefCell::new(0));
        link.on_demand_available({
            let arrivals = Rc::clone(&arrivals);
            move || *arrivals.borrow_mut() += 1
        });

        link.receive_message(Message::watermark(100)).unwrap();
        assert_eq!(*arrivals.borrow(), 0);

        link.receive_message(Message {
            permanent_until_millis: 200,
            demands: vec![DemandBatch {
                delay_millis: 7,
                demand_data_history: vec![entry!("old", 50, 120), entry!("new", 120, 200)],
            }],
            responses: vec![],
        })
        .unwrap();
        assert_eq!(*arrivals.borrow(), 1);

        let demands = link.take_in_demands();
        assert_eq!(demands.len(), 1);
        assert_eq!(demands[0].delay(), 7);
        assert_eq!(
            demands[0].entries(),
            [entry!("old", 100, 120), entry!("new", 120, 200)]
        );
        assert!(link.in_demands().is_empty());
    }

    #[test]
    fn forgetting_received_demand() {
        let mut link = link();
        link.receive_message(Message {
            permanent_until_millis: 0,
            demands: vec![
                DemandBatch {
                    delay_millis: 0,
                    demand_data_history: vec![entry!("a", 0, 10)],
                },
                DemandBatch {
                    delay_millis: 0,
                    demand_data_history: vec![entry!("b", 0, 30)],
                },
            ],
            responses: vec![],
        })
        .unwrap();

        link.forget_in_demand_before(20);
        assert_eq!(link.in_demands().len(), 1);
        assert_eq!(link.in_demands()[0].entries(), [entry!("b", 0, 30)]);
    }

    #[test]
    fn responses_reconcile_on_arrival() {
        let mut link = link();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let id = link
            .new_out_demander(0, 50, {
                let seen = Rc::clone(&seen);
                move |entries| seen.borrow_mut().push(entries.to_vec())
            })
            .unwrap();
        link.demander(id)
            .unwrap()
            .set_demand(value!("D"), 0, Some(100))
            .unwrap();
        assert!(seen.borrow().is_empty());

        link.receive_message(Message {
            permanent_until_millis: 0,
            demands: vec![],
            responses: vec![ResponseBatch {
                delay_millis: 50,
                demand_data: value!("D"),
                response_data_history: vec![entry!("R", 50, 80)],
            }],
        })
        .unwrap();
        assert_eq!(*seen.borrow(), [vec![entry!("R", 50, 80)]]);

        // the watermark alone lets the rest resolve to silence
        link.receive_message(Message::watermark(150)).unwrap();
        assert_eq!(
            seen.borrow().last(),
            Some(&vec![entry!("R", 50, 80), entry!(_, 80, 150)])
        );
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn watermark_raises_are_monotonic() {
        let mut link = link();
        assert_eq!(link.raise_other_out_permanent_until(100), Ok(true));
        assert_eq!(link.raise_other_out_permanent_until(100), Ok(false));
        assert_eq!(link.raise_other_out_permanent_until(50), Ok(false));
        assert_eq!(link.other_out_permanent_until(), 100);

        // writes before the promise are ignored
        assert_eq!(
            link.set_out_response(0, &value!("x"), value!("y"), 0, 100),
            Ok(false)
        );
        assert_eq!(
            link.set_out_response(0, &value!("x"), value!("y"), 0, 150),
            Ok(true)
        );
        assert_eq!(
            link.out_response_entries(0, &value!("x")),
            Some(&[entry!("y", 100, 150)][..])
        );
    }

    #[test]
    fn raising_the_watermark_silences_existing_responses() {
        let mut link = link();
        link.set_out_response(0, &value!("x"), value!("y"), 0, 50)
            .unwrap();

        assert_eq!(link.raise_other_out_permanent_until(100), Ok(true));
        assert_eq!(
            link.out_response_entries(0, &value!("x")),
            Some(&[entry!("y", 0, 50), entry!(_, 50, 100)][..])
        );
        assert_eq!(link.raise_other_out_permanent_until(80), Ok(false));

        let sent = link.run_deferred();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].permanent_until_millis, 100);
        assert_eq!(
            sent[0].responses[0].response_data_history,
            [entry!("y", 0, 50), entry!(_, 50, 100)]
        );

        link.flush();
        assert!(link.run_deferred().is_empty());
    }

    #[test]
    fn demanders_without_demand_do_not_pin_received_responses() {
        let mut link = link();
        let active = link.new_out_demander(0, 0, |_| {}).unwrap();
        let idle = link.new_out_demander(0, 0, |_| {}).unwrap();
        link.demander(active)
            .unwrap()
            .set_demand(value!("a"), 0, Some(100))
            .unwrap();

        link.receive_message(Message {
            permanent_until_millis: 100,
            demands: vec![],
            responses: vec![ResponseBatch {
                delay_millis: 0,
                demand_data: value!("a"),
                response_data_history: vec![entry!("A", 0, 100)],
            }],
        })
        .unwrap();
        assert_eq!(link.in_response_ignorance(), 100);

        // demand written later is silent up to where it starts
        link.demander(idle)
            .unwrap()
            .set_demand(value!("b"), 100, Some(150))
            .unwrap();
        assert_eq!(
            link.demander(idle).unwrap().response_entries(),
            [entry!(_, 0, 100)]
        );
        link.flush();
        assert_eq!(link.in_response_ignorance(), 100);
    }
}
