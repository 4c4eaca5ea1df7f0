//! Append-only, per-aggregate event log with optimistic concurrency.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use sled::transaction::{ConflictableTransactionError, TransactionError};
use tcplane_domain::Event;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// An append-only event log keyed by aggregate id.
///
/// `append` is optimistic: it succeeds only if `expected_version` matches
/// the aggregate's current version, otherwise it returns
/// [`Error::ConcurrencyConflict`] and the store is left unchanged.
pub trait EventStore: Send + Sync {
    /// Load every event committed for `aggregate_id`, oldest first.
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>>;

    /// Append `events` if `expected_version` matches the current version.
    async fn append(&self, aggregate_id: &str, expected_version: u64, events: Vec<Event>) -> Result<()>;
}

/// An in-memory event store, for tests and the no-persistence configuration.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEventStore {
    logs: Arc<Mutex<BTreeMap<String, Vec<Event>>>>,
}

impl InMemoryEventStore {
    /// Create an empty store.
    pub fn new() -> Self {
        InMemoryEventStore::default()
    }
}

impl EventStore for InMemoryEventStore {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        let logs = self.logs.lock().await;
        Ok(logs.get(aggregate_id).cloned().unwrap_or_default())
    }

    async fn append(&self, aggregate_id: &str, expected_version: u64, events: Vec<Event>) -> Result<()> {
        let mut logs = self.logs.lock().await;
        let log = logs.entry(aggregate_id.to_string()).or_default();
        let current = log.len() as u64;
        if current != expected_version {
            return Err(Error::ConcurrencyConflict {
                aggregate_id: aggregate_id.to_string(),
                expected: expected_version,
                actual: current,
            });
        }
        log.extend(events);
        Ok(())
    }
}

/// A durable, crash-safe event store backed by an embedded `sled` database.
///
/// Each append is one `sled` transaction: the version counter and every new
/// event row are written atomically, so a crash mid-append leaves no
/// partial record observable on reopen.
#[derive(Debug, Clone)]
pub struct SledEventStore {
    db: sled::Db,
}

#[derive(Debug)]
enum AppendAbort {
    Conflict { expected: u64, actual: u64 },
    Serialize(String),
}

fn version_key(aggregate_id: &str) -> String {
    format!("v:{aggregate_id}")
}

fn event_key(aggregate_id: &str, version: u64) -> String {
    format!("e:{aggregate_id}\0{version:020}")
}

impl SledEventStore {
    /// Open (or create) the durable store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = sled::open(path).map_err(|e| Error::StoreIo(e.to_string()))?;
        Ok(SledEventStore { db })
    }
}

impl EventStore for SledEventStore {
    async fn load(&self, aggregate_id: &str) -> Result<Vec<Event>> {
        let db = self.db.clone();
        let aggregate_id = aggregate_id.to_string();
        tokio::task::spawn_blocking(move || {
            let prefix = format!("e:{aggregate_id}\0");
            let mut events = Vec::new();
            for entry in db.scan_prefix(prefix.as_bytes()) {
                let (_, value) = entry.map_err(|e| Error::StoreIo(e.to_string()))?;
                let version = events.len() as u64 + 1;
                let event: Event = serde_json::from_slice(&value).map_err(|e| Error::PayloadCorrupt {
                    aggregate_id: aggregate_id.clone(),
                    version,
                    reason: e.to_string(),
                })?;
                events.push(event);
            }
            Ok(events)
        })
        .await
        .map_err(|e| Error::StoreIo(e.to_string()))?
    }

    async fn append(&self, aggregate_id: &str, expected_version: u64, events: Vec<Event>) -> Result<()> {
        let db = self.db.clone();
        let aggregate_id = aggregate_id.to_string();
        tokio::task::spawn_blocking(move || {
            let v_key = version_key(&aggregate_id);
            let outcome = db.transaction(|tx| {
                let current: u64 = match tx.get(v_key.as_bytes())? {
                    Some(bytes) => {
                        let raw: [u8; 8] = bytes.as_ref().try_into().unwrap_or([0; 8]);
                        u64::from_be_bytes(raw)
                    }
                    None => 0,
                };
                if current != expected_version {
                    return Err(ConflictableTransactionError::Abort(AppendAbort::Conflict {
                        expected: expected_version,
                        actual: current,
                    }));
                }
                let mut version = current;
                for event in &events {
                    version += 1;
                    let payload = serde_json::to_vec(event).map_err(|e| {
                        ConflictableTransactionError::Abort(AppendAbort::Serialize(e.to_string()))
                    })?;
                    tx.insert(event_key(&aggregate_id, version).as_bytes(), payload)?;
                }
                tx.insert(v_key.as_bytes(), &version.to_be_bytes())?;
                Ok(())
            });

            match outcome {
                Ok(()) => Ok(()),
                Err(TransactionError::Abort(AppendAbort::Conflict { expected, actual })) => {
                    Err(Error::ConcurrencyConflict {
                        aggregate_id,
                        expected,
                        actual,
                    })
                }
                Err(TransactionError::Abort(AppendAbort::Serialize(reason))) => Err(Error::PayloadCorrupt {
                    aggregate_id,
                    version: expected_version,
                    reason,
                }),
                Err(TransactionError::Storage(e)) => Err(Error::StoreIo(e.to_string())),
            }
        })
        .await
        .map_err(|e| Error::StoreIo(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcplane_domain::EventPayload;
    use tcplane_types::{DeviceName, Handle};

    fn sample_event(device: &DeviceName, version: u64) -> Event {
        Event {
            aggregate_id: Event::aggregate_id_for(device),
            version,
            device: device.clone(),
            payload: EventPayload::QdiscDeleted {
                handle: Handle::new(1, 0),
            },
        }
    }

    #[tokio::test]
    async fn memory_store_appends_in_order_and_loads_them_back() {
        let store = InMemoryEventStore::new();
        let device = DeviceName::new("eth0").unwrap();
        let id = Event::aggregate_id_for(&device);
        store.append(&id, 0, vec![sample_event(&device, 1)]).await.unwrap();
        store.append(&id, 1, vec![sample_event(&device, 2)]).await.unwrap();
        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.len(), 2);
    }

    #[tokio::test]
    async fn memory_store_rejects_stale_expected_version() {
        let store = InMemoryEventStore::new();
        let device = DeviceName::new("eth0").unwrap();
        let id = Event::aggregate_id_for(&device);
        store.append(&id, 0, vec![sample_event(&device, 1)]).await.unwrap();
        let result = store.append(&id, 0, vec![sample_event(&device, 1)]).await;
        assert!(matches!(result, Err(Error::ConcurrencyConflict { .. })));
    }

    #[tokio::test]
    async fn only_one_of_two_concurrent_appends_succeeds() {
        let store = InMemoryEventStore::new();
        let device = DeviceName::new("eth0").unwrap();
        let id = Event::aggregate_id_for(&device);
        let a = store.append(&id, 0, vec![sample_event(&device, 1)]);
        let b = store.append(&id, 0, vec![sample_event(&device, 1)]);
        let (r1, r2) = tokio::join!(a, b);
        let successes = [r1.is_ok(), r2.is_ok()].into_iter().filter(|x| *x).count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn sled_store_is_crash_safe_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let device = DeviceName::new("eth0").unwrap();
        let id = Event::aggregate_id_for(&device);
        {
            let store = SledEventStore::open(dir.path()).unwrap();
            store.append(&id, 0, vec![sample_event(&device, 1)]).await.unwrap();
        }
        let reopened = SledEventStore::open(dir.path()).unwrap();
        let loaded = reopened.load(&id).await.unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn sled_store_rejects_stale_expected_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = SledEventStore::open(dir.path()).unwrap();
        let device = DeviceName::new("eth0").unwrap();
        let id = Event::aggregate_id_for(&device);
        store.append(&id, 0, vec![sample_event(&device, 1)]).await.unwrap();
        let result = store.append(&id, 0, vec![sample_event(&device, 1)]).await;
        assert!(matches!(result, Err(Error::ConcurrencyConflict { .. })));
    }
}
