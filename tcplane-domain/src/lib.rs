//! Entities and events for the traffic-control policy engine.
//!
//! This crate carries no kernel calls, no storage, and no hierarchy logic —
//! it is the shape of the domain (qdiscs, classes, filters, events) plus
//! the pure computations (§4.2) that must be deterministic across replay.

pub mod class;
pub mod deletion;
pub mod error;
pub mod event;
pub mod filter;
pub mod qdisc;

pub use class::{Class, HtbDefaults, HtbParams, compute_htb_defaults};
pub use deletion::DeletionStrategy;
pub use error::{Error, Result};
pub use event::{Event, EventPayload, HtbOverrides};
pub use filter::Filter;
pub use qdisc::{Qdisc, TbfLimit};
