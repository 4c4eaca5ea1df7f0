//! Engine-level errors: domain validation plus concurrency and store I/O.

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the hierarchy manager, aggregate, event store, and
/// dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A command was rejected by domain validation; no state changed.
    #[error(transparent)]
    Domain(#[from] tcplane_domain::Error),

    /// An append raced another writer for the same aggregate and version.
    /// The caller may retry by reloading and re-applying.
    #[error("concurrency conflict on {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that was being appended to.
        aggregate_id: String,
        /// The version the caller expected to extend.
        expected: u64,
        /// The version actually stored.
        actual: u64,
    },

    /// The durable store failed an I/O operation. The aggregate is
    /// considered unavailable until an operator investigates.
    #[error("event store I/O failure: {0}")]
    StoreIo(String),

    /// A stored event payload could not be decoded.
    #[error("event payload corrupt for {aggregate_id} v{version}: {reason}")]
    PayloadCorrupt {
        /// The aggregate whose log is corrupt.
        aggregate_id: String,
        /// The offending version.
        version: u64,
        /// Why decoding failed.
        reason: String,
    },
}
