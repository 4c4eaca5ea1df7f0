//! The application service's composed error type.

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Every error the application service can return, composed from its
/// collaborators so callers can match on the underlying kind while still
/// handling one type at the service boundary.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// A command was rejected, a store append raced another writer, or the
    /// store itself failed. See [`tcplane_engine::Error`] for the kind.
    #[error(transparent)]
    Engine(#[from] tcplane_engine::Error),

    /// The kernel adapter failed after the triggering event was already
    /// committed. The log remains authoritative; this failure does not
    /// unwind it.
    #[error(transparent)]
    Adapter(#[from] tcplane_adapter::Error),
}
