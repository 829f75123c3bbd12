// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! # demandlink: continuous-time demand/response synchronization
//!
//! This crate implements a protocol that keeps two endpoints, connected by an unreliable and
//! latency-bearing link, in agreement about two kinds of time-varying signals:
//!
//! - **demand**: what one side is requesting, and
//! - **response**: what the other side is supplying for a given demanded value.
//!
//! Both are recorded as interval histories rather than samples, and only the part of a history
//! the peer has not seen yet travels over the wire. Each side periodically promises that its
//! state before some instant is final (its *permanent-until watermark*), which lets the peer
//! forget everything before that instant. Memory is therefore bounded by how far apart the two
//! sides' watermarks are, not by how long the session has been running.
//!
//! ## Core Concepts
//!
//! - [`ActivityHistory`]: a coalesced, gap-filled, non-overlapping sequence of [`Entry`]
//!   intervals describing one signal from a start instant onward. Entries are either active
//!   (carry a [`Value`]) or explicitly silent.
//! - [`Link`]: one protocol endpoint. It owns every history involved, batches local changes
//!   into [`Message`]s and folds incoming messages back into local state.
//! - **Demanders**: per-request demand streams created through
//!   [`Link::new_out_demander`]. A demander writes a demand history and reads a derived
//!   response history, with a fixed assumed round-trip `delay`.
//! - [`GcMap`] and [`KeyedMap`]: the containers holding response histories, keyed by
//!   `(delay, demanded value)` and collected by explicit, watermark-driven sweeps.
//!
//! Responses are correlated with demands by delay and by *structural equality of the demanded
//! value*, not by an opaque request id. Distinct demand values at the same delay therefore
//! multiplex onto separate response channels automatically.
//!
//! ## Getting Started: ping/pong over a loopback
//!
//! ```rust
//! use demandlink::{Link, transport::Outbox, value};
//!
//! let mut alice = Link::new(Outbox::default());
//! let mut bob = Link::new(Outbox::default());
//!
//! // Alice demands "ping" for half a second, expecting answers a second later.
//! let id = alice.new_out_demander(0, 1000, |_| {}).unwrap();
//! alice.demander(id).unwrap().set_demand(value!("ping"), 0, Some(500)).unwrap();
//!
//! // The scheduler runs the deferred flush, and the transport carries the message.
//! for message in alice.run_deferred() {
//!     bob.receive_message(message).unwrap();
//! }
//!
//! // Bob answers every demand he received.
//! for demand in bob.take_in_demands() {
//!     for entry in demand.entries() {
//!         if let (Some(input), Some(end)) = (&entry.data, entry.end) {
//!             let delay = demand.delay();
//!             bob.set_out_response(delay, input, value!("pong"), entry.start + delay, end + delay)
//!                 .unwrap();
//!         }
//!     }
//! }
//! for message in bob.run_deferred() {
//!     alice.receive_message(message).unwrap();
//! }
//!
//! let response = alice.demander(id).unwrap().response_entries().to_vec();
//! assert_eq!(response, [demandlink::entry!("pong", 1000, 1500)]);
//! ```
//!
//! ## Scheduling
//!
//! A [`Link`] never sends inline. Mutations ask the [`Transport`](transport::Transport) to defer
//! a flush, once per batch, and the caller's scheduler later invokes [`Link::flush`]. All
//! mutations made before the flush fires collapse into a single message, and a flush with
//! nothing new to say sends nothing at all.
//!
//! **This crate includes no networking.** Transports are supplied by the caller; the crate only
//! requires that messages are delivered without reordering or duplication.
//!
//! ## Features
//!
//! - `json`: Enables encoding and decoding messages as JSON, including defensive decoding of
//!   untrusted input. This feature is enabled by default.
//! - `serde`: Provides `serde` support for values, entries, messages and configuration.
//! - `arbitrary`: Implements `quickcheck::Arbitrary` for values and entries, useful for
//!   property-based testing.
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

use ahash::RandomState;
use std::{
    hash::BuildHasher,
    sync::atomic::{AtomicBool, Ordering},
};

// Use a constant seed for hashing to make message layouts and benchmarks reproducible.
pub(crate) const DETERMINISTIC_HASHER: RandomState = RandomState::with_seeds(48, 1516, 23, 42);

pub mod config;
pub use config::LinkConfig;
pub mod error;
pub use error::{HistoryError, LinkError, MessageError};
pub mod gc_map;
pub use gc_map::GcMap;
pub mod history;
pub use history::{ActivityHistory, Entry, Millis};
#[cfg(feature = "json")]
mod json;
pub mod keyed_map;
pub use keyed_map::KeyedMap;
pub mod link;
pub use link::{DemanderId, DemanderMut, InDemand, Link};
/// Macros usable for tests and initialization
pub mod macros;
pub mod message;
pub use message::{DemandBatch, Message, ResponseBatch};
pub mod observer;
pub mod resource;
pub mod transport;
mod value;
pub use value::Value;

static ENABLE_DETERMINISM: AtomicBool = AtomicBool::new(false);

/// Makes all hash-keyed containers iterate deterministically.
///
/// This should only be enabled for testing, as it increases the odds of DoS
/// scenarios.
#[doc(hidden)]
pub fn enable_determinism() {
    ENABLE_DETERMINISM.store(true, Ordering::Release);
}

/// Checks if determinism is enabled.
#[doc(hidden)]
pub fn determinism_enabled() -> bool {
    ENABLE_DETERMINISM.load(Ordering::Acquire)
}

#[inline]
fn make_random_state() -> RandomState {
    if determinism_enabled() {
        DETERMINISTIC_HASHER
    } else {
        RandomState::new()
    }
}

fn create_map<K, V>() -> std::collections::HashMap<K, V, LinkRandomState> {
    std::collections::HashMap::with_hasher(LinkRandomState::default())
}

/// A small wrapper around [`ahash::RandomState`] that switches to a fixed seed once
/// [`enable_determinism`] has been called.
#[derive(Clone)]
pub struct LinkRandomState {
    inner: RandomState,
}

impl Default for LinkRandomState {
    #[inline]
    fn default() -> Self {
        Self {
            inner: make_random_state(),
        }
    }
}

impl BuildHasher for LinkRandomState {
    type Hasher = <RandomState as BuildHasher>::Hasher;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        self.inner.build_hasher()
    }
}
