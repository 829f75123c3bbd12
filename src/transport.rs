// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! The seam between a [`Link`](crate::Link) and whatever actually carries its messages.
//!
//! A link never blocks and never owns a timer. It asks its [`Transport`] to schedule a flush,
//! and hands it finished messages; how and when either happens is up to the caller.
use crate::Message;

/// Carries messages of one [`Link`](crate::Link) to its peer.
///
/// Implementations must deliver messages in order and at most once.
pub trait Transport {
    /// Requests that [`Link::flush`](crate::Link::flush) be called soon, outside of the current
    /// call stack.
    ///
    /// A link requests at most one flush until that flush has run, so implementations do not
    /// need to deduplicate requests.
    fn defer_flush(&mut self);

    /// Sends `message` to the peer.
    fn send_message(&mut self, message: Message);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn defer_flush(&mut self) {
        (**self).defer_flush();
    }

    fn send_message(&mut self, message: Message) {
        (**self).send_message(message);
    }
}

/// A transport that just records what it is asked to do.
///
/// This is the natural transport for tests and for single-threaded loopbacks: the caller decides
/// when a requested flush runs, and picks up the sent messages afterwards.
#[derive(Debug, Default)]
pub struct Outbox {
    flush_requests: usize,
    sent: Vec<Message>,
}

impl Outbox {
    /// Number of flush requests since the last [`Self::take_flush_request`].
    #[must_use]
    pub fn flush_requests(&self) -> usize {
        self.flush_requests
    }

    /// Consumes all pending flush requests, returning whether there were any.
    pub fn take_flush_request(&mut self) -> bool {
        std::mem::take(&mut self.flush_requests) > 0
    }

    /// Messages sent since the last [`Self::take_sent`].
    #[must_use]
    pub fn sent(&self) -> &[Message] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for Outbox {
    fn defer_flush(&mut self) {
        self.flush_requests += 1;
    }

    fn send_message(&mut self, message: Message) {
        self.sent.push(message);
    }
}
