// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Ready-made answerers for demand received by a [`Link`].
//!
//! Both consume the link's [incoming demand](Link::take_in_demands) and assert a response for
//! every demanded stretch, `delay` after the demand itself. A demand that never ends is answered
//! up to a fixed horizon past its start, since responses themselves never run open-ended.
//!
//! - [`SilentResponder`] answers everything with silence. It is useful as the far side of a
//!   link that should only ever demand.
//! - [`Relay`] dispatches `["name", payload]` demands to named handlers, and answers anything it
//!   does not understand with silence.
use crate::{
    Link, LinkRandomState, Value, create_map, error::LinkError, history::Millis,
    transport::Transport,
};
use std::collections::HashMap;
use tracing::debug;

/// How far past its start an open-ended demand is answered, unless configured otherwise.
pub const DEFAULT_HORIZON: Millis = 60_000;

// Answers every demanded stretch with whatever `answer` makes of it, silence for `None`.
// Returns how many stretches were answered.
fn answer_in_demands<Tr: Transport>(
    link: &mut Link<Tr>,
    horizon: Millis,
    mut answer: impl FnMut(&Value) -> Option<Value>,
) -> Result<usize, LinkError> {
    let mut answered = 0;
    for demand in link.take_in_demands() {
        let delay = demand.delay();
        for entry in demand.entries() {
            let Some(input) = &entry.data else {
                continue;
            };
            let end = entry.end.unwrap_or(entry.start.saturating_add(horizon));
            let (start, end) = (entry.start.saturating_add(delay), end.saturating_add(delay));
            match answer(input) {
                Some(output) => link.set_out_response(delay, input, output, start, end)?,
                None => link.suspend_out_response(delay, input, start, end)?,
            };
            answered += 1;
        }
    }
    Ok(answered)
}

/// Answers every demand with silence.
#[derive(Debug, Clone, Copy)]
pub struct SilentResponder {
    horizon: Millis,
}

impl Default for SilentResponder {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
        }
    }
}

impl SilentResponder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_horizon(horizon: Millis) -> Self {
        Self { horizon }
    }

    /// Answers all demand the link has received so far. Returns how many stretches were
    /// answered.
    pub fn respond<Tr: Transport>(&self, link: &mut Link<Tr>) -> Result<usize, LinkError> {
        answer_in_demands(link, self.horizon, |_| None)
    }
}

/// Computes the response to a routed payload. `None` answers with silence.
pub type Handler = Box<dyn FnMut(&Value) -> Option<Value>>;

/// Dispatches demands of the form `["name", payload]` to the handler registered for `name`.
///
/// ```rust
/// # use demandlink::{resource::Relay, value};
/// let mut relay = Relay::new();
/// relay.route("echo", |payload| Some(payload.clone()));
/// assert!(relay.has_route("echo"));
/// ```
pub struct Relay {
    handlers: HashMap<String, Handler, LinkRandomState>,
    horizon: Millis,
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("routes", &self.handlers.keys().collect::<Vec<_>>())
            .field("horizon", &self.horizon)
            .finish()
    }
}

impl Default for Relay {
    fn default() -> Self {
        Self {
            handlers: create_map(),
            horizon: DEFAULT_HORIZON,
        }
    }
}

impl Relay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_horizon(horizon: Millis) -> Self {
        Self {
            horizon,
            ..Self::default()
        }
    }

    /// Registers `handler` for demands named `name`, replacing any earlier handler.
    pub fn route(
        &mut self,
        name: impl Into<String>,
        handler: impl FnMut(&Value) -> Option<Value> + 'static,
    ) -> &mut Self {
        self.handlers.insert(name.into(), Box::new(handler));
        self
    }

    #[must_use]
    pub fn has_route(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Answers all demand the link has received so far. Returns how many stretches were
    /// answered.
    pub fn respond<Tr: Transport>(&mut self, link: &mut Link<Tr>) -> Result<usize, LinkError> {
        let handlers = &mut self.handlers;
        answer_in_demands(link, self.horizon, |input| {
            let Some([name, payload]) = input.as_list() else {
                debug!(?input, "malformed demand, answering with silence");
                return None;
            };
            let Some(handler) = name.as_str().and_then(|name| handlers.get_mut(name)) else {
                debug!(?name, "no route for demand, answering with silence");
                return None;
            };
            handler(payload)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DemandBatch, Message, entry, transport::Outbox, value};

    fn with_demand(delay: Millis, demand: Vec<crate::Entry>) -> Link<Outbox> {
        let mut link = Link::new(Outbox::default());
        link.receive_message(Message {
            permanent_until_millis: 0,
            demands: vec![DemandBatch {
                delay_millis: delay,
                demand_data_history: demand,
            }],
            responses: vec![],
        })
        .unwrap();
        link
    }

    #[test]
    fn silence_for_everything() {
        let mut link = with_demand(10, vec![entry!("a", 0, 5), entry!(_, 5, 8), entry!("b", 8)]);
        assert_eq!(SilentResponder::with_horizon(100).respond(&mut link), Ok(2));
        assert!(link.in_demands().is_empty());
        assert_eq!(
            link.out_response_entries(10, &value!("a")),
            Some(&[entry!(_, 0, 15)][..])
        );
        // the open-ended demand is answered up to the horizon
        assert_eq!(
            link.out_response_entries(10, &value!("b")),
            Some(&[entry!(_, 0, 118)][..])
        );
    }

    #[test]
    fn relay_dispatches_by_name() {
        let mut link = with_demand(
            0,
            vec![
                entry!(["echo", "hi"], 0, 10),
                entry!(["shout", "hi"], 10, 20),
                entry!("bare", 20, 30),
                entry!(["missing", "x"], 30, 40),
                entry!(["echo", ["nested"]], 40, 50),
            ],
        );

        let mut relay = Relay::new();
        relay
            .route("echo", |payload| Some(payload.clone()))
            .route("shout", |payload| {
                payload.as_str().map(|s| Value::from(s.to_uppercase()))
            });
        assert_eq!(relay.respond(&mut link), Ok(5));

        let response = |input: Value| link.out_response_entries(0, &input).map(<[_]>::to_vec);
        assert_eq!(response(value!(["echo", "hi"])), Some(vec![entry!("hi", 0, 10)]));
        assert_eq!(
            response(value!(["shout", "hi"])),
            Some(vec![entry!(_, 0, 10), entry!("HI", 10, 20)])
        );
        assert_eq!(response(value!("bare")), Some(vec![entry!(_, 0, 30)]));
        assert_eq!(response(value!(["missing", "x"])), Some(vec![entry!(_, 0, 40)]));
        assert_eq!(
            response(value!(["echo", ["nested"]])),
            Some(vec![entry!(_, 0, 40), entry!(["nested"], 40, 50)])
        );
    }
}
