//! Immutable records of aggregate state transitions.

use serde::{Deserialize, Serialize};
use tcplane_types::{DeviceName, Handle, Priority};

use crate::deletion::DeletionStrategy;
use crate::qdisc::Qdisc;

/// Advanced HTB parameters a caller may override; any field left `None` is
/// computed from `rate`/`ceil` at event-apply time (spec §4.2).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtbOverrides {
    /// Explicit burst override, in bytes.
    pub burst: Option<u32>,
    /// Explicit cburst override, in bytes.
    pub cburst: Option<u32>,
    /// Explicit quantum override, in bytes.
    pub quantum: Option<u32>,
    /// Per-packet overhead override, in bytes.
    pub overhead: Option<u32>,
    /// Minimum packet unit override, in bytes.
    pub mpu: Option<u32>,
    /// MTU override, in bytes.
    pub mtu: Option<u32>,
    /// Internal HTB priority override.
    pub htb_prio: Option<u8>,
}

/// The semantic payload of one committed state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    /// A qdisc was created.
    QdiscCreated {
        /// The qdisc's handle.
        handle: Handle,
        /// Parent handle; the device root qdisc uses the root handle.
        parent: Handle,
        /// The qdisc variant and its parameters.
        qdisc: Qdisc,
    },
    /// A qdisc was deleted.
    QdiscDeleted {
        /// The deleted qdisc's handle.
        handle: Handle,
    },
    /// A class was created.
    ClassCreated {
        /// The class's handle.
        handle: Handle,
        /// The parent qdisc or class handle.
        parent: Handle,
        /// Operator-facing name.
        name: String,
        /// Guaranteed rate in bits per second.
        rate_bps: u64,
        /// Borrowing ceiling in bits per second (`0` means "same as rate").
        ceil_bps: u64,
        /// Priority at creation time; legacy logs omitting this fail to
        /// load rather than guessing (spec §9 open question).
        priority: Priority,
        /// Advanced overrides; unset fields are computed from rate/ceil.
        overrides: HtbOverrides,
    },
    /// A class was deleted.
    ClassDeleted {
        /// The deleted class's handle.
        handle: Handle,
        /// The strategy used for any children.
        strategy: DeletionStrategy,
    },
    /// A class's mutable fields were changed.
    ClassModified {
        /// The class being modified.
        handle: Handle,
        /// New name, if changed.
        name: Option<String>,
        /// New priority, if changed.
        priority: Option<Priority>,
        /// New parent, if the class was moved.
        new_parent: Option<Handle>,
    },
    /// A filter was created.
    FilterCreated {
        /// The parent qdisc or class this filter is attached to.
        parent: Handle,
        /// Evaluation priority.
        priority: u16,
        /// This filter's own handle.
        handle: Handle,
        /// The class packets matching this filter are steered into.
        flow_id: Handle,
        /// Canonical string form of each match predicate, in order.
        matches: Vec<String>,
    },
    /// A filter was deleted.
    FilterDeleted {
        /// The filter's parent handle.
        parent: Handle,
        /// The filter's priority.
        priority: u16,
        /// The filter's own handle.
        handle: Handle,
    },
}

/// An immutable record of one state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The aggregate this event belongs to, `"tc:<device>"`.
    pub aggregate_id: String,
    /// Monotone version; `previous_version + 1`.
    pub version: u64,
    /// The device the transition applies to.
    pub device: DeviceName,
    /// The semantic payload.
    pub payload: EventPayload,
}

impl Event {
    /// Build the canonical aggregate id for a device.
    pub fn aggregate_id_for(device: &DeviceName) -> String {
        format!("tc:{device}")
    }
}
