// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! This demo wires two links together through an in-memory loopback and walks through one
//! demand from start to end: Alice asks for a greeting, Bob answers it, both sides raise their
//! watermarks, and Alice finally cancels the demand so that everything is collected.
//!
//! Run it with `RUST_LOG=debug` to see what each link logs along the way.
use demandlink::{Link, transport::Outbox, value};
use std::error::Error;

// The demand value is the request itself. Bob answers every demand with a greeting addressed to
// whoever is named in it.
fn greet(demand: &demandlink::Value) -> demandlink::Value {
    let name = demand
        .as_list()
        .and_then(|items| items.get(1))
        .and_then(demandlink::Value::as_str)
        .unwrap_or("stranger");
    demandlink::Value::from(format!("hello, {name}"))
}

// Delivers whatever `from` has to say to `to`, the way a scheduler and a socket would.
fn pump(from: &mut Link<Outbox>, to: &mut Link<Outbox>) -> Result<usize, Box<dyn Error>> {
    let messages = from.run_deferred();
    let count = messages.len();
    for message in messages {
        let bytes = message.to_json_vec()?;
        println!("   -> {}", String::from_utf8_lossy(&bytes));
        to.receive_json(&bytes)?;
    }
    Ok(count)
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut alice = Link::new(Outbox::default());
    let mut bob = Link::new(Outbox::default());

    // DEMAND
    println!("1. Alice demands a greeting for 500ms, expecting answers 100ms later.");
    let id = alice.new_out_demander(0, 100, |response| {
        println!("   alice sees the response {response:?}");
    })?;
    alice
        .demander(id)?
        .set_demand(value!(["greet", "alice"]), 0, Some(500))?;
    pump(&mut alice, &mut bob)?;

    // RESPONSE
    println!("2. Bob answers every demand he received.");
    for demand in bob.take_in_demands() {
        let delay = demand.delay();
        for entry in demand.entries() {
            if let (Some(input), Some(end)) = (&entry.data, entry.end) {
                bob.set_out_response(delay, input, greet(input), entry.start + delay, end + delay)?;
            }
        }
    }
    pump(&mut bob, &mut alice)?;

    // WATERMARKS
    println!("3. Both sides promise that the first second is final.");
    alice.raise_other_out_permanent_until(1000)?;
    bob.raise_other_out_permanent_until(1000)?;
    pump(&mut alice, &mut bob)?;
    pump(&mut bob, &mut alice)?;

    // CANCELLATION
    println!("4. Alice cancels the demand; the next flush drops the demander.");
    alice.demander(id)?.finish_demand(1000)?;
    pump(&mut alice, &mut bob)?;
    assert_eq!(alice.demander_ids().count(), 0);

    // IDLE
    println!("5. Nothing changed, so nothing is sent.");
    alice.flush();
    assert_eq!(pump(&mut alice, &mut bob)?, 0);

    Ok(())
}
