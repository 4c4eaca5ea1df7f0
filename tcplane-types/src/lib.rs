//! Value types for the traffic-control policy engine.
//!
//! Everything here is pure and total where possible; fallible constructors
//! return a tagged [`Error`] rather than panicking. Nothing in this crate
//! touches the kernel, an event store, or any other collaborator.

mod bandwidth;
mod device;
mod handle;
mod match_predicate;
mod priority;

pub use bandwidth::Bandwidth;
pub use device::DeviceName;
pub use handle::Handle;
pub use match_predicate::MatchPredicate;
pub use priority::Priority;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while parsing or constructing a value type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The input did not match the expected shape at all.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The input had the right shape but an unrecognized unit.
    #[error("invalid unit: {0}")]
    InvalidUnit(String),

    /// A numeric value parsed fine but fell outside its valid range.
    #[error("value out of range: {0}")]
    OutOfRange(String),
}
