// (c) Copyright 2025 Helsing GmbH. All rights reserved.
#![allow(dead_code)]

use demandlink::{Link, transport::Outbox};

/// Installs a log subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn link() -> Link<Outbox> {
    init_tracing();
    Link::new(Outbox::default())
}

/// Runs `from`'s pending flush and hands everything it sent to `to`. Returns the number of
/// messages delivered.
pub fn deliver(from: &mut Link<Outbox>, to: &mut Link<Outbox>) -> usize {
    let messages = from.run_deferred();
    let count = messages.len();
    for message in messages {
        to.receive_message(message).expect("peer messages are valid");
    }
    count
}

/// Like [`deliver`], but round-trips every message through its JSON encoding.
pub fn deliver_json(from: &mut Link<Outbox>, to: &mut Link<Outbox>) -> usize {
    let messages = from.run_deferred();
    let count = messages.len();
    for message in messages {
        let bytes = message.to_json_vec().expect("messages encode");
        to.receive_json(&bytes).expect("peer messages are valid");
    }
    count
}
