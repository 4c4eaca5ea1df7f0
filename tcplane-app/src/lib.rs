//! Application service wiring the event-sourced engine to a kernel
//! adapter: dispatch a command, persist its events, then reflect them onto
//! the live kernel state.

pub mod config;
pub mod error;
pub mod service;

pub use config::{EventStoreMode, TcPlaneConfig};
pub use error::{Result, ServiceError};
pub use service::TrafficControlService;
