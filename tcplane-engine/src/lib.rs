//! Hierarchy manager, aggregate, event store, and dispatcher for the
//! traffic-control policy engine.
//!
//! This crate holds everything that replays: given the same event log, the
//! same state comes back out. No kernel I/O lives here — see `tcplane-adapter`.

pub mod aggregate;
pub mod dispatcher;
pub mod error;
pub mod hierarchy;
pub mod store;

pub use aggregate::{Command, TrafficControlAggregate};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{Error, Result};
pub use hierarchy::{HierarchyManager, PriorityInheritance};
pub use store::{EventStore, InMemoryEventStore, SledEventStore};
