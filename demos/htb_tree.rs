//! Wires the service together with in-memory collaborators and runs the
//! canonical HTB tree: a root qdisc, two sibling classes, and a filter.
//! Not part of the published crates; a smoke check for manual runs only.

use std::sync::Arc;

use tcplane_adapter::MockAdapter;
use tcplane_app::{TcPlaneConfig, TrafficControlService};
use tcplane_domain::HtbOverrides;
use tcplane_engine::{Command, InMemoryEventStore};
use tcplane_types::{Bandwidth, DeviceName, Handle, MatchPredicate};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let device = DeviceName::new("eth0").unwrap();
    let service = TrafficControlService::new(
        InMemoryEventStore::new(),
        Arc::new(MockAdapter::new()),
        &TcPlaneConfig::default(),
    );

    let outcome = service
        .submit(Command::CreateHtbQdisc {
            device: device.clone(),
            handle: Handle::new(1, 0),
            default_class: Handle::new(1, 30),
        })
        .await
        .expect("root qdisc installs cleanly");
    println!("committed {} event(s), now at version {}", outcome.events.len(), outcome.version_after);

    service
        .submit(Command::CreateHtbClass {
            device: device.clone(),
            parent: Handle::new(1, 0),
            handle: Handle::new(1, 10),
            name: "web".into(),
            rate: Bandwidth::parse("100mbps").unwrap(),
            ceil: Bandwidth::parse("200mbps").unwrap(),
            priority: Some(1),
            overrides: HtbOverrides::default(),
        })
        .await
        .expect("web class installs cleanly");

    service
        .submit(Command::CreateHtbClass {
            device: device.clone(),
            parent: Handle::new(1, 0),
            handle: Handle::new(1, 20),
            name: "db".into(),
            rate: Bandwidth::parse("50mbps").unwrap(),
            ceil: Bandwidth::parse("100mbps").unwrap(),
            priority: Some(2),
            overrides: HtbOverrides::default(),
        })
        .await
        .expect("db class installs cleanly");

    let outcome = service
        .submit(Command::CreateFilter {
            device: device.clone(),
            parent: Handle::new(1, 0),
            priority: 10,
            handle: Handle::new(0x800, 1),
            flow_id: Handle::new(1, 10),
            matches: vec![MatchPredicate::PortDestination(443)],
        })
        .await
        .expect("filter installs cleanly");

    let aggregate = service.query(&device).await.expect("device is queryable");
    println!("final version: {}", aggregate.version());
    println!("classes under root: {:?}", aggregate.hierarchy().children(Handle::new(1, 0)));
    for event in &outcome.events {
        println!("{event:?}");
    }
}
