//! Class deletion strategies.

use serde::{Deserialize, Serialize};

/// How to handle a class's children when it is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionStrategy {
    /// Remove this class and all descendants.
    Cascade,
    /// Re-parent each child to this class's parent, then remove it.
    PromoteChildren,
    /// Re-parent each child to the device's root handle, then remove it.
    OrphanChildren,
    /// Fail if this class has any children; otherwise remove it alone.
    FailIfChildren,
}
