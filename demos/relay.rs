// (c) Copyright 2025 Helsing GmbH. All rights reserved.
//! This demo puts a [`Relay`] behind a link: the far side routes `["name", payload]` demands to
//! named handlers, and answers anything it does not know with silence.
//!
//! Three demanders share one link. Two ask the same question, so they share one response
//! channel; the third asks for something nobody handles.
use demandlink::{Link, Value, resource::Relay, transport::Outbox, value};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut client = Link::new(Outbox::default());
    let mut server = Link::new(Outbox::default());

    let mut relay = Relay::new();
    relay
        .route("upper", |payload| {
            payload.as_str().map(|s| Value::from(s.to_uppercase()))
        })
        .route("count", |payload| {
            payload.as_list().map(|items| Value::from(items.len().to_string()))
        });

    let requests = [
        value!(["upper", "shout"]),
        value!(["upper", "shout"]),
        value!(["unknown", "anything"]),
    ];
    let mut ids = Vec::new();
    for (i, request) in requests.into_iter().enumerate() {
        let id = client.new_out_demander(0, 10, move |response| {
            println!("demander {i}: {response:?}");
        })?;
        client.demander(id)?.set_demand(request, 0, Some(100))?;
        ids.push(id);
    }

    for message in client.run_deferred() {
        server.receive_message(message)?;
    }
    let answered = relay.respond(&mut server)?;
    println!("server answered {answered} demanded stretches");

    let replies = server.run_deferred();
    for reply in &replies {
        println!("server sent {} response batches", reply.responses.len());
    }
    for reply in replies {
        client.receive_message(reply)?;
    }

    for id in ids {
        println!("{:?}", client.demander(id)?.response_entries());
    }
    Ok(())
}
