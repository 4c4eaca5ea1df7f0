//! An in-memory [`KernelAdapter`] that records every call it receives and
//! lets tests script failures, standing in for real kernel I/O.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tcplane_domain::{Class, Filter, Qdisc};
use tcplane_types::{DeviceName, Handle};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::stats::{ClassStats, LinkStats, QdiscStats};
use crate::KernelAdapter;

/// One call the mock observed, in the order it was received.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    /// `add_qdisc` was called.
    AddQdisc {
        /// The device it targeted.
        device: DeviceName,
        /// The handle it installed at.
        handle: Handle,
        /// The qdisc installed.
        qdisc: Qdisc,
    },
    /// `delete_qdisc` was called.
    DeleteQdisc {
        /// The device it targeted.
        device: DeviceName,
        /// The handle removed.
        handle: Handle,
    },
    /// `add_class` was called.
    AddClass {
        /// The class installed.
        class: Class,
    },
    /// `delete_class` was called.
    DeleteClass {
        /// The device it targeted.
        device: DeviceName,
        /// The handle removed.
        handle: Handle,
    },
    /// `add_filter` was called.
    AddFilter {
        /// The filter installed.
        filter: Filter,
    },
    /// `delete_filter` was called.
    DeleteFilter {
        /// The device it targeted.
        device: DeviceName,
        /// The filter's parent handle.
        parent: Handle,
        /// The filter's priority.
        priority: u16,
        /// The filter's own handle.
        handle: Handle,
    },
}

/// An in-memory, scriptable stand-in for real kernel I/O.
#[derive(Default)]
pub struct MockAdapter {
    calls: Mutex<Vec<RecordedCall>>,
    qdiscs: Mutex<BTreeMap<(DeviceName, Handle), Qdisc>>,
    classes: Mutex<BTreeMap<(DeviceName, Handle), Class>>,
    filters: Mutex<Vec<Filter>>,
    next_failure: Mutex<Option<Error>>,
}

impl MockAdapter {
    /// A fresh mock with nothing installed and no scripted failures.
    pub fn new() -> Self {
        MockAdapter::default()
    }

    /// Every call observed so far, in order.
    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    /// Make the next mutating call (add/delete) return `error` instead of
    /// succeeding, then resume returning success.
    pub async fn fail_next_call(&self, error: Error) {
        *self.next_failure.lock().await = Some(error);
    }

    async fn record(&self, call: RecordedCall) -> Result<()> {
        self.calls.lock().await.push(call);
        if let Some(error) = self.next_failure.lock().await.take() {
            return Err(error);
        }
        Ok(())
    }

    async fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(Error::Unsupported("stats query cancelled".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KernelAdapter for MockAdapter {
    async fn add_qdisc(&self, device: &DeviceName, qdisc: &Qdisc, handle: Handle) -> Result<()> {
        self.record(RecordedCall::AddQdisc {
            device: device.clone(),
            handle,
            qdisc: qdisc.clone(),
        })
        .await?;
        self.qdiscs
            .lock()
            .await
            .insert((device.clone(), handle), qdisc.clone());
        Ok(())
    }

    async fn delete_qdisc(&self, device: &DeviceName, handle: Handle) -> Result<()> {
        self.record(RecordedCall::DeleteQdisc {
            device: device.clone(),
            handle,
        })
        .await?;
        self.qdiscs.lock().await.remove(&(device.clone(), handle));
        Ok(())
    }

    async fn list_qdiscs(&self, device: &DeviceName) -> Result<Vec<(Handle, Qdisc)>> {
        Ok(self
            .qdiscs
            .lock()
            .await
            .iter()
            .filter(|((d, _), _)| d == device)
            .map(|((_, h), q)| (*h, q.clone()))
            .collect())
    }

    async fn add_class(&self, class: &Class) -> Result<()> {
        self.record(RecordedCall::AddClass { class: class.clone() }).await?;
        self.classes
            .lock()
            .await
            .insert((class.device.clone(), class.handle), class.clone());
        Ok(())
    }

    async fn delete_class(&self, device: &DeviceName, handle: Handle) -> Result<()> {
        self.record(RecordedCall::DeleteClass {
            device: device.clone(),
            handle,
        })
        .await?;
        self.classes.lock().await.remove(&(device.clone(), handle));
        Ok(())
    }

    async fn list_classes(&self, device: &DeviceName) -> Result<Vec<Class>> {
        Ok(self
            .classes
            .lock()
            .await
            .iter()
            .filter(|((d, _), _)| d == device)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn add_filter(&self, filter: &Filter) -> Result<()> {
        self.record(RecordedCall::AddFilter {
            filter: filter.clone(),
        })
        .await?;
        self.filters.lock().await.push(filter.clone());
        Ok(())
    }

    async fn delete_filter(&self, device: &DeviceName, parent: Handle, priority: u16, handle: Handle) -> Result<()> {
        self.record(RecordedCall::DeleteFilter {
            device: device.clone(),
            parent,
            priority,
            handle,
        })
        .await?;
        self.filters.lock().await.retain(|f| {
            !(&f.device == device && f.parent == parent && f.priority == priority && f.handle == handle)
        });
        Ok(())
    }

    async fn list_filters(&self, device: &DeviceName) -> Result<Vec<Filter>> {
        Ok(self
            .filters
            .lock()
            .await
            .iter()
            .filter(|f| &f.device == device)
            .cloned()
            .collect())
    }

    async fn qdisc_stats(&self, _device: &DeviceName, _handle: Handle, cancel: &CancellationToken) -> Result<QdiscStats> {
        Self::check_cancelled(cancel).await?;
        Ok(QdiscStats::default())
    }

    async fn class_stats(&self, _device: &DeviceName, _handle: Handle, cancel: &CancellationToken) -> Result<ClassStats> {
        Self::check_cancelled(cancel).await?;
        Ok(ClassStats::default())
    }

    async fn link_stats(&self, _device: &DeviceName, cancel: &CancellationToken) -> Result<LinkStats> {
        Self::check_cancelled(cancel).await?;
        Ok(LinkStats::default())
    }
}
