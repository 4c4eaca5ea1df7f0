//! Orchestrates the end-to-end command path: dispatch, then apply committed
//! events to the kernel adapter in the order they were produced.

use std::sync::Arc;
use std::time::Instant;

use tcplane_domain::{Event, EventPayload};
use tcplane_engine::{Command, DispatchOutcome, Dispatcher, EventStore, TrafficControlAggregate};
use tcplane_types::DeviceName;
use tracing::{error, info, warn};

use tcplane_adapter::KernelAdapter;

use crate::config::TcPlaneConfig;
use crate::error::{Result, ServiceError};

fn command_kind(command: &Command) -> &'static str {
    match command {
        Command::CreateHtbQdisc { .. } => "create-htb-qdisc",
        Command::CreateTbfQdisc { .. } => "create-tbf-qdisc",
        Command::CreatePrioQdisc { .. } => "create-prio-qdisc",
        Command::CreateFqCodelQdisc { .. } => "create-fq-codel-qdisc",
        Command::CreateNetemQdisc { .. } => "create-netem-qdisc",
        Command::CreateHtbClass { .. } => "create-htb-class",
        Command::CreateFilter { .. } => "create-filter",
        Command::DeleteQdisc { .. } => "delete-qdisc",
        Command::DeleteClass { .. } => "delete-class",
        Command::ModifyClass { .. } => "modify-class",
    }
}

/// The orchestrator exposed to external collaborators (builders, file
/// loaders, a CLI — all out of scope here). Accepts commands, drives the
/// dispatcher, and on a successful commit applies the new events to the
/// kernel adapter in event order.
pub struct TrafficControlService<S: EventStore> {
    dispatcher: Dispatcher<S>,
    adapter: Arc<dyn KernelAdapter>,
}

impl<S: EventStore> TrafficControlService<S> {
    /// Build a service over `store` and `adapter`, honoring `config`.
    pub fn new(store: S, adapter: Arc<dyn KernelAdapter>, config: &TcPlaneConfig) -> Self {
        TrafficControlService {
            dispatcher: Dispatcher::new(
                store,
                config.max_hierarchy_depth,
                config.default_priority_inheritance,
            ),
            adapter,
        }
    }

    /// Replay a device's aggregate for a read-only query.
    pub async fn query(&self, device: &DeviceName) -> Result<TrafficControlAggregate> {
        Ok(self.dispatcher.query(device).await?)
    }

    /// Submit one command: dispatch it, then apply the events it produced
    /// to the kernel adapter. A rejected command never reaches the
    /// adapter. An adapter failure is surfaced to the caller but does not
    /// roll back the already-committed events — the log stays the source
    /// of truth.
    pub async fn submit(&self, command: Command) -> Result<DispatchOutcome> {
        let device = command.device().clone();
        let kind = command_kind(&command);
        let started = Instant::now();

        let outcome = match self.dispatcher.dispatch(command).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    device = %device,
                    command_kind = kind,
                    outcome = "rejected",
                    duration_microseconds = started.elapsed().as_micros() as u64,
                    error = %e,
                    "command rejected"
                );
                return Err(e.into());
            }
        };

        let after = self.dispatcher.query(&device).await?;
        let mut first_adapter_error = None;
        for event in &outcome.events {
            if let Err(e) = self.apply_event(&device, event, &after).await {
                error!(
                    device = %device,
                    command_kind = kind,
                    error = %e,
                    "adapter call failed; event already committed, log remains authoritative"
                );
                if first_adapter_error.is_none() {
                    first_adapter_error = Some(e);
                }
            }
        }

        info!(
            device = %device,
            command_kind = kind,
            outcome = "committed",
            version_before = outcome.version_before,
            version_after = outcome.version_after,
            events_appended = outcome.events.len(),
            duration_microseconds = started.elapsed().as_micros() as u64,
            "command committed"
        );

        match first_adapter_error {
            Some(e) => Err(ServiceError::Adapter(e)),
            None => Ok(outcome),
        }
    }

    async fn apply_event(
        &self,
        device: &DeviceName,
        event: &Event,
        after: &TrafficControlAggregate,
    ) -> std::result::Result<(), tcplane_adapter::Error> {
        match &event.payload {
            EventPayload::QdiscCreated { handle, qdisc, .. } => {
                self.adapter.add_qdisc(device, qdisc, *handle).await
            }
            EventPayload::QdiscDeleted { handle } => self.adapter.delete_qdisc(device, *handle).await,
            EventPayload::ClassCreated { handle, .. } => {
                if let Some(class) = after.class(*handle) {
                    self.adapter.add_class(&class).await
                } else {
                    Ok(())
                }
            }
            EventPayload::ClassDeleted { handle, .. } => self.adapter.delete_class(device, *handle).await,
            // The adapter contract has no update operation; a modified
            // class is re-materialized the next time it's deleted/created.
            EventPayload::ClassModified { .. } => Ok(()),
            EventPayload::FilterCreated {
                parent,
                priority,
                handle,
                ..
            } => {
                let filter = after
                    .filters()
                    .into_iter()
                    .find(|f| f.parent == *parent && f.priority == *priority && f.handle == *handle);
                if let Some(filter) = filter {
                    self.adapter.add_filter(&filter).await
                } else {
                    Ok(())
                }
            }
            EventPayload::FilterDeleted {
                parent,
                priority,
                handle,
            } => self.adapter.delete_filter(device, *parent, *priority, *handle).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcplane_adapter::MockAdapter;
    use tcplane_domain::HtbOverrides;
    use tcplane_engine::InMemoryEventStore;
    use tcplane_types::{Bandwidth, Handle};

    fn dev() -> DeviceName {
        DeviceName::new("eth0").unwrap()
    }

    fn service() -> (TrafficControlService<InMemoryEventStore>, Arc<MockAdapter>) {
        let adapter = Arc::new(MockAdapter::new());
        let config = TcPlaneConfig::default();
        let service = TrafficControlService::new(InMemoryEventStore::new(), adapter.clone(), &config);
        (service, adapter)
    }

    #[tokio::test]
    async fn committed_qdisc_reaches_the_adapter() {
        let (service, adapter) = service();
        service
            .submit(Command::CreateHtbQdisc {
                device: dev(),
                handle: Handle::new(1, 0),
                default_class: Handle::new(1, 30),
            })
            .await
            .unwrap();
        let calls = adapter.calls().await;
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn rejected_command_never_reaches_the_adapter() {
        let (service, adapter) = service();
        service
            .submit(Command::CreateHtbQdisc {
                device: dev(),
                handle: Handle::new(1, 1),
                default_class: Handle::new(1, 30),
            })
            .await
            .unwrap_err();
        assert!(adapter.calls().await.is_empty());
    }

    #[tokio::test]
    async fn adapter_failure_does_not_unwind_the_committed_event() {
        let (service, adapter) = service();
        adapter
            .fail_next_call(tcplane_adapter::Error::KernelRejected("nope".into()))
            .await;
        let result = service
            .submit(Command::CreateHtbQdisc {
                device: dev(),
                handle: Handle::new(1, 0),
                default_class: Handle::new(1, 30),
            })
            .await;
        assert!(result.is_err());
        let aggregate = service.query(&dev()).await.unwrap();
        assert_eq!(aggregate.version(), 1);
        assert!(aggregate.qdisc(Handle::new(1, 0)).is_some());
    }

    #[tokio::test]
    async fn class_creation_materializes_computed_htb_params_at_the_adapter() {
        let (service, adapter) = service();
        service
            .submit(Command::CreateHtbQdisc {
                device: dev(),
                handle: Handle::new(1, 0),
                default_class: Handle::new(1, 30),
            })
            .await
            .unwrap();
        service
            .submit(Command::CreateHtbClass {
                device: dev(),
                parent: Handle::new(1, 0),
                handle: Handle::new(1, 10),
                name: "web".into(),
                rate: Bandwidth::parse("100mbps").unwrap(),
                ceil: Bandwidth::parse("200mbps").unwrap(),
                priority: Some(1),
                overrides: HtbOverrides::default(),
            })
            .await
            .unwrap();
        let classes = adapter.list_classes(&dev()).await.unwrap();
        assert_eq!(classes.len(), 1);
        assert!(classes[0].htb.burst > 0);
    }
}
