//! The boundary between the deterministic policy engine and the kernel.
//!
//! The core never talks to netlink or any other kernel transport directly;
//! it calls [`KernelAdapter`]. A real implementation lives outside this
//! crate (out of scope, §1); [`mock::MockAdapter`] stands in for tests.

pub mod error;
pub mod mock;
pub mod stats;

pub use error::{Error, Result};
pub use mock::MockAdapter;
pub use stats::{ClassStats, LinkStats, QdiscStats};

use async_trait::async_trait;
use tcplane_domain::{Class, Filter, Qdisc};
use tcplane_types::{DeviceName, Handle};
use tokio_util::sync::CancellationToken;

/// The set of operations the policy engine issues against the kernel.
///
/// Implementations must preserve parameter semantics bit-exactly when
/// translating to the kernel wire protocol: TBF buffer/limit/burst in
/// bytes, FQ_CODEL target/interval in microseconds, HTB rate/ceil in bits
/// per second with burst/cburst in bytes, handles as `(major<<16)|minor`.
#[async_trait]
pub trait KernelAdapter: Send + Sync {
    /// Install `qdisc` on `device`.
    async fn add_qdisc(&self, device: &DeviceName, qdisc: &Qdisc, handle: Handle) -> Result<()>;
    /// Remove the qdisc at `handle` from `device`.
    async fn delete_qdisc(&self, device: &DeviceName, handle: Handle) -> Result<()>;
    /// List every qdisc currently installed on `device`.
    async fn list_qdiscs(&self, device: &DeviceName) -> Result<Vec<(Handle, Qdisc)>>;

    /// Install `class` on its device.
    async fn add_class(&self, class: &Class) -> Result<()>;
    /// Remove the class at `handle` from `device`.
    async fn delete_class(&self, device: &DeviceName, handle: Handle) -> Result<()>;
    /// List every class currently installed on `device`.
    async fn list_classes(&self, device: &DeviceName) -> Result<Vec<Class>>;

    /// Install `filter` on its device.
    async fn add_filter(&self, filter: &Filter) -> Result<()>;
    /// Remove the filter identified by `(parent, priority, handle)`.
    async fn delete_filter(&self, device: &DeviceName, parent: Handle, priority: u16, handle: Handle) -> Result<()>;
    /// List every filter currently installed on `device`.
    async fn list_filters(&self, device: &DeviceName) -> Result<Vec<Filter>>;

    /// Fetch counters for one qdisc. `cancel` may be signalled to abandon
    /// a slow query; cancellation leaves no state behind since stats
    /// collection is side-effect free.
    async fn qdisc_stats(&self, device: &DeviceName, handle: Handle, cancel: &CancellationToken) -> Result<QdiscStats>;
    /// Fetch counters for one class.
    async fn class_stats(&self, device: &DeviceName, handle: Handle, cancel: &CancellationToken) -> Result<ClassStats>;
    /// Fetch link-level counters for a device.
    async fn link_stats(&self, device: &DeviceName, cancel: &CancellationToken) -> Result<LinkStats>;
}
