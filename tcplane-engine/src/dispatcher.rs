//! Routes commands to the aggregate and wraps the load-mutate-persist cycle
//! with per-device serialization and optimistic-concurrency append.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tcplane_domain::Event;
use tcplane_types::DeviceName;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};

use crate::aggregate::{Command, TrafficControlAggregate};
use crate::error::Result;
use crate::hierarchy::PriorityInheritance;
use crate::store::EventStore;

/// The result of one successfully dispatched command.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// The aggregate the command targeted.
    pub aggregate_id: String,
    /// The version before this command was applied.
    pub version_before: u64,
    /// The version after this command was applied.
    pub version_after: u64,
    /// The events produced and committed, in order.
    pub events: Vec<Event>,
}

/// Routes commands to their target aggregate, serializing per device.
///
/// Each device gets its own `tokio::sync::Mutex` so unrelated devices are
/// processed without contention, while commands against the same device
/// queue behind the same lock (spec §5).
pub struct Dispatcher<S: EventStore> {
    store: S,
    max_hierarchy_depth: usize,
    default_priority_inheritance: PriorityInheritance,
    locks: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<S: EventStore> Dispatcher<S> {
    /// Build a dispatcher over `store`, enforcing `max_hierarchy_depth` and
    /// `default_priority_inheritance` on every aggregate it loads.
    pub fn new(
        store: S,
        max_hierarchy_depth: usize,
        default_priority_inheritance: PriorityInheritance,
    ) -> Self {
        Dispatcher {
            store,
            max_hierarchy_depth,
            default_priority_inheritance,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Borrow the underlying store (used by callers that need direct
    /// access, e.g. to construct a read replica).
    pub fn store(&self) -> &S {
        &self.store
    }

    fn lock_for(&self, aggregate_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().expect("lock map poisoned");
        locks
            .entry(aggregate_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Load, mutate, and persist one command: load the aggregate's current
    /// stream, replay it, apply the command, and append the resulting
    /// events with `expected_version` equal to the version just loaded.
    pub async fn dispatch(&self, command: Command) -> Result<DispatchOutcome> {
        let device = command.device().clone();
        let aggregate_id = Event::aggregate_id_for(&device);
        let lock = self.lock_for(&aggregate_id);
        let _guard = lock.lock().await;

        let history = self.store.load(&aggregate_id).await?;
        let version_before = history.len() as u64;
        let mut aggregate = TrafficControlAggregate::replay(
            device.clone(),
            self.max_hierarchy_depth,
            self.default_priority_inheritance,
            &history,
        );

        let new_events = match aggregate.handle_command(&command) {
            Ok(events) => events,
            Err(e) => {
                warn!(aggregate_id, %e, "command rejected");
                return Err(e);
            }
        };

        self.store
            .append(&aggregate_id, version_before, new_events.clone())
            .await?;
        for event in &new_events {
            aggregate.apply(event);
        }

        debug!(
            aggregate_id,
            version_before,
            version_after = aggregate.version(),
            events_appended = new_events.len(),
            "command committed"
        );

        Ok(DispatchOutcome {
            aggregate_id,
            version_before,
            version_after: aggregate.version(),
            events: new_events,
        })
    }

    /// Load and replay a device's aggregate for a read-only query.
    pub async fn query(&self, device: &DeviceName) -> Result<TrafficControlAggregate> {
        let aggregate_id = Event::aggregate_id_for(device);
        let history = self.store.load(&aggregate_id).await?;
        Ok(TrafficControlAggregate::replay(
            device.clone(),
            self.max_hierarchy_depth,
            self.default_priority_inheritance,
            &history,
        ))
    }
}
