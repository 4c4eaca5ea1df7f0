//! Kernel adapter errors: the boundary between the policy engine and the OS.

/// Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a [`crate::KernelAdapter`] implementation may report. The core
/// treats all of these as recoverable at the command boundary: the event
/// is already committed, and a separate reconciliation pass (out of scope)
/// can retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The target network device does not exist.
    #[error("device missing: {0}")]
    DeviceMissing(String),

    /// The calling process lacks the capability to modify this device.
    #[error("permission denied on {0}")]
    PermissionDenied(String),

    /// The kernel rejected the request outright.
    #[error("kernel rejected request: {0}")]
    KernelRejected(String),

    /// This adapter does not implement the requested operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}
