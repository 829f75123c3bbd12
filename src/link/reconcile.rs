// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! Derives a demander's response from its demand and the responses received from the peer.
//!
//! The demand is read shifted by the demander's delay: demand at `t` is answered by response at
//! `t + delay`. Starting where the derived response currently ends, the walk steps through the
//! demand one entry at a time and, for each, looks up the received response history keyed by
//! that entry's value. The derived response only ever grows, so every step appends.
//!
//! Each step produces one of:
//!
//! - silence, where the demand is silent;
//! - the received response, where one is known for the demanded value;
//! - silence, where nothing was received but the peer has promised its responses are final;
//!
//! and the walk stops as soon as none of these apply.
use super::{Demander, ResponseMap};
use crate::{
    ActivityHistory, Entry,
    error::HistoryError,
    history::{Millis, min_end},
};

/// Extends the demander's response as far as currently possible. Returns whether it changed.
pub(super) fn reconcile(
    demander: &mut Demander,
    in_responses: &ResponseMap<ActivityHistory>,
    in_permanent_until: Millis,
) -> Result<bool, HistoryError> {
    let delay = demander.delay;
    let by_input = in_responses.get(&delay);
    let mut changed = false;

    while let Some(cursor) = demander.response.known_until() {
        let Some(demand) = demander.demand.entry_at(cursor.saturating_sub(delay)) else {
            break;
        };
        let segment_end = demand.end.map(|end| end.saturating_add(delay));

        let next = match &demand.data {
            None => Entry::silent(cursor, segment_end),
            Some(input) => {
                let received = by_input.and_then(|by_input| by_input.get(input));
                match received.and_then(|history| history.entry_at(cursor)) {
                    Some(response) => Entry::new(
                        response.data.clone(),
                        cursor,
                        min_end(segment_end, response.end),
                    ),
                    None if cursor < in_permanent_until => {
                        // nothing more will arrive for this stretch
                        let until = match received {
                            Some(history) if cursor < history.first_start() => {
                                history.first_start()
                            }
                            _ => in_permanent_until,
                        };
                        Entry::silent(cursor, min_end(segment_end, Some(until)))
                    }
                    None => break,
                }
            }
        };

        tracing::trace!(?next, delay, "reconciled response");
        if !demander.response.add_entry(next)? {
            break;
        }
        changed = true;
    }
    Ok(changed)
}
