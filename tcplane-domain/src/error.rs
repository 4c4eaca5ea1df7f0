//! Domain-level validation and invariant errors.

use tcplane_types::Handle;

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Validation and invariant failures, per spec §4.4.3.
///
/// These are value results, not out-of-band exceptions: a rejected
/// operation leaves state untouched and returns one of these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A parameter failed a shape or range check.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Two entities on the same device share a handle.
    #[error("handle conflict on device {device}: {handle} already exists")]
    HandleConflict {
        /// The device the conflict occurred on.
        device: String,
        /// The handle that was already taken.
        handle: Handle,
    },

    /// The referenced parent does not exist.
    #[error("parent missing: {0}")]
    ParentMissing(Handle),

    /// Linking would create a cycle in the hierarchy.
    #[error("cycle detected: {0} is an ancestor of the proposed parent")]
    Cycle(Handle),

    /// The hierarchy would exceed its configured maximum depth.
    #[error("depth exceeded: {handle} would sit at depth {depth}, max is {max}")]
    DepthExceeded {
        /// The handle that would be too deep.
        handle: Handle,
        /// The depth it would end up at.
        depth: usize,
        /// The configured maximum.
        max: usize,
    },

    /// An entity was used where a different kind was required
    /// (e.g. a non-HTB qdisc given as the parent of an HTB class).
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A class was applied without an explicit priority.
    #[error("unset priority on class {0}")]
    UnsetPriority(Handle),
}
