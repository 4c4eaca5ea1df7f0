//! Configuration the core recognizes. No environment variables are read
//! here; callers construct this programmatically (from a file loader, a
//! CLI, or a test harness — all external to this crate).

use std::path::PathBuf;

use tcplane_engine::PriorityInheritance;

/// Where the event store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventStoreMode {
    /// Not persisted; lost on process exit. The default.
    #[default]
    Memory,
    /// Persisted to a `sled` database at `path`.
    Durable {
        /// Filesystem path to the database directory.
        path: PathBuf,
    },
}

/// Configuration options the core recognizes (§6.4).
#[derive(Debug, Clone, PartialEq)]
pub struct TcPlaneConfig {
    /// Maximum hierarchy depth enforced by every aggregate's hierarchy
    /// manager. Must be positive.
    pub max_hierarchy_depth: usize,
    /// Priority-inheritance rule applied when a class is placed without an
    /// explicit priority override.
    pub default_priority_inheritance: PriorityInheritance,
    /// Which event store backend to use.
    pub event_store_mode: EventStoreMode,
}

impl Default for TcPlaneConfig {
    fn default() -> Self {
        TcPlaneConfig {
            max_hierarchy_depth: 8,
            default_priority_inheritance: PriorityInheritance::None,
            event_store_mode: EventStoreMode::Memory,
        }
    }
}
