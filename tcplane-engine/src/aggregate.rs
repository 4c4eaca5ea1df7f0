//! `TrafficControlAggregate`: the consistency boundary for one device.

use std::collections::BTreeMap;

use tcplane_domain::{
    Class, DeletionStrategy, Error as DomainError, Event, EventPayload, Filter, HtbDefaults,
    HtbOverrides, HtbParams, Qdisc, TbfLimit, compute_htb_defaults,
};
use tcplane_types::{Bandwidth, DeviceName, Handle, MatchPredicate};

use crate::error::{Error, Result};
use crate::hierarchy::{HierarchyManager, PriorityInheritance};

/// A command accepted by the aggregate. Construction is total; every
/// rejection happens inside [`TrafficControlAggregate::handle_command`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Install the device's root HTB qdisc.
    CreateHtbQdisc {
        /// Target device.
        device: DeviceName,
        /// Root handle (`minor` must be `0`).
        handle: Handle,
        /// Class to use for otherwise-unclassified traffic.
        default_class: Handle,
    },
    /// Install the device's root TBF qdisc.
    CreateTbfQdisc {
        /// Target device.
        device: DeviceName,
        /// Root handle.
        handle: Handle,
        /// Sustained rate.
        rate: Bandwidth,
        /// Bucket depth in bytes.
        buffer: u32,
        /// Queue limit.
        limit: TbfLimit,
        /// Burst size in bytes.
        burst: u32,
    },
    /// Install the device's root PRIO qdisc.
    CreatePrioQdisc {
        /// Target device.
        device: DeviceName,
        /// Root handle.
        handle: Handle,
        /// Number of bands.
        bands: u8,
        /// Priority-to-band map.
        priomap: [u8; 16],
    },
    /// Install the device's root FQ_CODEL qdisc.
    CreateFqCodelQdisc {
        /// Target device.
        device: DeviceName,
        /// Root handle.
        handle: Handle,
        /// Maximum queued packets.
        limit: u32,
        /// Number of sub-flows.
        flows: u32,
        /// Target sojourn time in microseconds.
        target_us: u32,
        /// Codel interval in microseconds.
        interval_us: u32,
        /// DRR quantum in bytes.
        quantum: u32,
        /// Whether to mark instead of drop.
        ecn: bool,
    },
    /// Install the device's root NETEM qdisc.
    CreateNetemQdisc {
        /// Target device.
        device: DeviceName,
        /// Root handle.
        handle: Handle,
        /// Base one-way delay in microseconds.
        delay_us: u32,
        /// Delay jitter in microseconds.
        jitter_us: u32,
        /// Packet loss percentage.
        loss_percent: f64,
        /// Packet duplication percentage.
        duplicate_percent: f64,
        /// Packet corruption percentage.
        corrupt_percent: f64,
        /// Packet reorder percentage.
        reorder_percent: f64,
        /// Number of packets between reordered ones.
        gap: u32,
        /// Queue limit in packets.
        limit: u32,
        /// Delay distribution name.
        distribution: Option<String>,
    },
    /// Create an HTB class under an existing HTB qdisc or class.
    CreateHtbClass {
        /// Target device.
        device: DeviceName,
        /// Parent qdisc or class handle.
        parent: Handle,
        /// This class's own handle.
        handle: Handle,
        /// Operator-facing name.
        name: String,
        /// Guaranteed rate.
        rate: Bandwidth,
        /// Borrowing ceiling; `Bandwidth::ZERO` means "same as rate".
        ceil: Bandwidth,
        /// Priority; `None` is rejected with `unset-priority`.
        priority: Option<u8>,
        /// Advanced overrides.
        overrides: HtbOverrides,
    },
    /// Create a packet-classification filter.
    CreateFilter {
        /// Target device.
        device: DeviceName,
        /// Parent qdisc or class handle.
        parent: Handle,
        /// Evaluation priority.
        priority: u16,
        /// This filter's own handle.
        handle: Handle,
        /// The class matching packets are steered into.
        flow_id: Handle,
        /// Ordered match predicates.
        matches: Vec<MatchPredicate>,
    },
    /// Remove a device's root qdisc. Fails if any class is still attached.
    DeleteQdisc {
        /// Target device.
        device: DeviceName,
        /// Root handle to remove.
        handle: Handle,
    },
    /// Remove a class, handling its children per `strategy`.
    DeleteClass {
        /// Target device.
        device: DeviceName,
        /// Class to remove.
        handle: Handle,
        /// How to treat any children.
        strategy: DeletionStrategy,
    },
    /// Change a class's name, priority, or parent.
    ModifyClass {
        /// Target device.
        device: DeviceName,
        /// Class to modify.
        handle: Handle,
        /// New name, if changing.
        name: Option<String>,
        /// New priority, if changing.
        priority: Option<u8>,
        /// New parent, if moving.
        new_parent: Option<Handle>,
    },
}

impl Command {
    /// The device this command targets.
    pub fn device(&self) -> &DeviceName {
        match self {
            Command::CreateHtbQdisc { device, .. }
            | Command::CreateTbfQdisc { device, .. }
            | Command::CreatePrioQdisc { device, .. }
            | Command::CreateFqCodelQdisc { device, .. }
            | Command::CreateNetemQdisc { device, .. }
            | Command::CreateHtbClass { device, .. }
            | Command::CreateFilter { device, .. }
            | Command::DeleteQdisc { device, .. }
            | Command::DeleteClass { device, .. }
            | Command::ModifyClass { device, .. } => device,
        }
    }
}

/// The consistency boundary owning all qdiscs, classes, and filters for one
/// device. Rebuilt by replaying its event log; never mutated except through
/// [`TrafficControlAggregate::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficControlAggregate {
    device: DeviceName,
    aggregate_id: String,
    version: u64,
    max_hierarchy_depth: usize,
    default_priority_inheritance: PriorityInheritance,
    root_qdisc: Option<Handle>,
    qdiscs: BTreeMap<Handle, Qdisc>,
    classes: BTreeMap<Handle, Class>,
    filters: Vec<Filter>,
    hierarchy: HierarchyManager,
}

impl TrafficControlAggregate {
    /// Create an empty aggregate for `device`, with no events applied yet.
    /// `default_priority_inheritance` governs how `CreateHtbClass` resolves
    /// a class placed without an explicit priority (§6.4).
    pub fn new(
        device: DeviceName,
        max_hierarchy_depth: usize,
        default_priority_inheritance: PriorityInheritance,
    ) -> Self {
        let aggregate_id = Event::aggregate_id_for(&device);
        TrafficControlAggregate {
            device,
            aggregate_id,
            version: 0,
            max_hierarchy_depth,
            default_priority_inheritance,
            root_qdisc: None,
            qdiscs: BTreeMap::new(),
            classes: BTreeMap::new(),
            filters: Vec::new(),
            hierarchy: HierarchyManager::new(Handle::default(), max_hierarchy_depth),
        }
    }

    /// Rebuild an aggregate by replaying `events` in order from an empty
    /// state. Deterministic: the same log always yields the same state.
    pub fn replay(
        device: DeviceName,
        max_hierarchy_depth: usize,
        default_priority_inheritance: PriorityInheritance,
        events: &[Event],
    ) -> Self {
        let mut aggregate =
            TrafficControlAggregate::new(device, max_hierarchy_depth, default_priority_inheritance);
        for event in events {
            aggregate.apply(event);
        }
        aggregate
            .hierarchy
            .validate()
            .expect("a log of well-formed events replays into a consistent hierarchy");
        aggregate
    }

    /// This aggregate's canonical id, `"tc:<device>"`.
    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    /// The current version; equals the number of events applied.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// A read-model copy of one class, if it exists.
    pub fn class(&self, handle: Handle) -> Option<Class> {
        self.classes.get(&handle).cloned()
    }

    /// A read-model copy of every class, ordered by handle.
    pub fn classes(&self) -> Vec<Class> {
        self.classes.values().cloned().collect()
    }

    /// A read-model copy of one qdisc, if it exists.
    pub fn qdisc(&self, handle: Handle) -> Option<Qdisc> {
        self.qdiscs.get(&handle).cloned()
    }

    /// A read-model copy of every filter.
    pub fn filters(&self) -> Vec<Filter> {
        self.filters.clone()
    }

    /// The hierarchy manager backing this aggregate's classes.
    pub fn hierarchy(&self) -> &HierarchyManager {
        &self.hierarchy
    }

    fn qdisc_validate(&self, handle: Handle) -> Result<()> {
        if !handle.is_root() {
            return Err(DomainError::InvalidParameter(format!(
                "{handle} is not a valid root qdisc handle (minor must be 0)"
            ))
            .into());
        }
        if self.qdiscs.contains_key(&handle) {
            return Err(DomainError::HandleConflict {
                device: self.device.to_string(),
                handle,
            }
            .into());
        }
        if self.root_qdisc.is_some() {
            return Err(DomainError::TypeMismatch(format!(
                "device {} already has a root qdisc",
                self.device
            ))
            .into());
        }
        Ok(())
    }

    fn class_parent_kind_ok(&self, parent: Handle) -> Result<()> {
        if let Some(qdisc) = self.qdiscs.get(&parent) {
            if !qdisc.is_htb() {
                return Err(DomainError::TypeMismatch(format!(
                    "parent qdisc {parent} is not HTB"
                ))
                .into());
            }
            Ok(())
        } else if self.classes.contains_key(&parent) {
            Ok(())
        } else {
            Err(DomainError::ParentMissing(parent).into())
        }
    }

    fn effective_parent_ceil(&self, parent: Handle) -> Option<Bandwidth> {
        self.classes.get(&parent).map(|c| c.htb.ceil)
    }

    /// Resolve a class's priority: an explicit override wins outright;
    /// otherwise fall back to `default_priority_inheritance` against
    /// `hierarchy_with_handle`, which already carries `handle`'s candidate
    /// placement so inheritance can see its parent. Still unresolved after
    /// that is `unset-priority`.
    fn resolve_priority(
        &self,
        handle: Handle,
        priority: Option<u8>,
        hierarchy_with_handle: &HierarchyManager,
    ) -> Result<tcplane_types::Priority> {
        if let Some(priority) = priority {
            return tcplane_types::Priority::new(priority)
                .map_err(|e| DomainError::InvalidParameter(e.to_string()).into());
        }
        let mut priorities: BTreeMap<Handle, tcplane_types::Priority> = self
            .classes
            .iter()
            .filter_map(|(h, c)| c.priority.map(|p| (*h, p)))
            .collect();
        hierarchy_with_handle
            .apply_priority_inheritance(self.default_priority_inheritance, &mut priorities);
        priorities
            .get(&handle)
            .copied()
            .ok_or_else(|| DomainError::UnsetPriority(handle).into())
    }

    /// Validate `command` against current state and, if accepted, return the
    /// events it produces. Pure: never mutates `self`. Callers commit the
    /// returned events with [`TrafficControlAggregate::apply`].
    pub fn handle_command(&self, command: &Command) -> Result<Vec<Event>> {
        let device = command.device().clone();
        let payload = match command {
            Command::CreateHtbQdisc {
                handle,
                default_class,
                ..
            } => {
                self.qdisc_validate(*handle)?;
                EventPayload::QdiscCreated {
                    handle: *handle,
                    parent: *handle,
                    qdisc: Qdisc::Htb {
                        default_class: *default_class,
                    },
                }
            }
            Command::CreateTbfQdisc {
                handle,
                rate,
                buffer,
                limit,
                burst,
                ..
            } => {
                self.qdisc_validate(*handle)?;
                let qdisc = Qdisc::Tbf {
                    rate: *rate,
                    buffer: *buffer,
                    limit: *limit,
                    burst: *burst,
                };
                qdisc.validate().map_err(Error::from)?;
                EventPayload::QdiscCreated {
                    handle: *handle,
                    parent: *handle,
                    qdisc,
                }
            }
            Command::CreatePrioQdisc {
                handle,
                bands,
                priomap,
                ..
            } => {
                self.qdisc_validate(*handle)?;
                let qdisc = Qdisc::Prio {
                    bands: *bands,
                    priomap: *priomap,
                };
                qdisc.validate().map_err(Error::from)?;
                EventPayload::QdiscCreated {
                    handle: *handle,
                    parent: *handle,
                    qdisc,
                }
            }
            Command::CreateFqCodelQdisc {
                handle,
                limit,
                flows,
                target_us,
                interval_us,
                quantum,
                ecn,
                ..
            } => {
                self.qdisc_validate(*handle)?;
                let qdisc = Qdisc::FqCodel {
                    limit: *limit,
                    flows: *flows,
                    target_us: *target_us,
                    interval_us: *interval_us,
                    quantum: *quantum,
                    ecn: *ecn,
                };
                qdisc.validate().map_err(Error::from)?;
                EventPayload::QdiscCreated {
                    handle: *handle,
                    parent: *handle,
                    qdisc,
                }
            }
            Command::CreateNetemQdisc {
                handle,
                delay_us,
                jitter_us,
                loss_percent,
                duplicate_percent,
                corrupt_percent,
                reorder_percent,
                gap,
                limit,
                distribution,
                ..
            } => {
                self.qdisc_validate(*handle)?;
                let qdisc = Qdisc::Netem {
                    delay_us: *delay_us,
                    jitter_us: *jitter_us,
                    loss_percent: *loss_percent,
                    duplicate_percent: *duplicate_percent,
                    corrupt_percent: *corrupt_percent,
                    reorder_percent: *reorder_percent,
                    gap: *gap,
                    limit: *limit,
                    distribution: distribution.clone(),
                };
                qdisc.validate().map_err(Error::from)?;
                EventPayload::QdiscCreated {
                    handle: *handle,
                    parent: *handle,
                    qdisc,
                }
            }
            Command::CreateHtbClass {
                parent,
                handle,
                name,
                rate,
                ceil,
                priority,
                overrides,
                ..
            } => {
                if self.classes.contains_key(handle) || self.qdiscs.contains_key(handle) {
                    return Err(DomainError::HandleConflict {
                        device: device.to_string(),
                        handle: *handle,
                    }
                    .into());
                }
                self.class_parent_kind_ok(*parent)?;
                let mut candidate_hierarchy = self.hierarchy.clone();
                candidate_hierarchy.add(*handle, *parent)?;
                let priority = self.resolve_priority(*handle, *priority, &candidate_hierarchy)?;
                let effective_ceil = if ceil.as_bps() == 0 { *rate } else { *ceil };
                if effective_ceil < *rate {
                    return Err(DomainError::InvalidParameter(format!(
                        "ceil {effective_ceil} is below rate {rate}"
                    ))
                    .into());
                }
                if let Some(parent_ceil) = self.effective_parent_ceil(*parent)
                    && effective_ceil > parent_ceil
                {
                    return Err(DomainError::InvalidParameter(format!(
                        "child ceil {effective_ceil} exceeds parent ceil {parent_ceil}"
                    ))
                    .into());
                }
                EventPayload::ClassCreated {
                    handle: *handle,
                    parent: *parent,
                    name: name.clone(),
                    rate_bps: rate.as_bps(),
                    ceil_bps: ceil.as_bps(),
                    priority,
                    overrides: *overrides,
                }
            }
            Command::CreateFilter {
                parent,
                priority,
                handle,
                flow_id,
                matches,
                ..
            } => {
                if !self.qdiscs.contains_key(parent) && !self.classes.contains_key(parent) {
                    return Err(DomainError::ParentMissing(*parent).into());
                }
                if !self.classes.contains_key(flow_id) {
                    return Err(DomainError::InvalidParameter(format!(
                        "flow id {flow_id} does not resolve to an existing class"
                    ))
                    .into());
                }
                EventPayload::FilterCreated {
                    parent: *parent,
                    priority: *priority,
                    handle: *handle,
                    flow_id: *flow_id,
                    matches: matches.iter().map(|m| m.to_string()).collect(),
                }
            }
            Command::DeleteQdisc { handle, .. } => {
                if !self.qdiscs.contains_key(handle) {
                    return Err(DomainError::ParentMissing(*handle).into());
                }
                if self.root_qdisc == Some(*handle) && self.hierarchy.children(*handle).len() > 0
                {
                    return Err(DomainError::InvalidParameter(format!(
                        "{handle} still has classes attached"
                    ))
                    .into());
                }
                EventPayload::QdiscDeleted { handle: *handle }
            }
            Command::DeleteClass {
                handle, strategy, ..
            } => {
                if !self.classes.contains_key(handle) {
                    return Err(DomainError::ParentMissing(*handle).into());
                }
                if *strategy == DeletionStrategy::FailIfChildren
                    && self.hierarchy.has_children(*handle)
                {
                    return Err(DomainError::InvalidParameter(format!(
                        "{handle} has children"
                    ))
                    .into());
                }
                EventPayload::ClassDeleted {
                    handle: *handle,
                    strategy: *strategy,
                }
            }
            Command::ModifyClass {
                handle,
                name,
                priority,
                new_parent,
                ..
            } => {
                if !self.classes.contains_key(handle) {
                    return Err(DomainError::ParentMissing(*handle).into());
                }
                let priority = priority
                    .map(|p| {
                        tcplane_types::Priority::new(p)
                            .map_err(|e| DomainError::InvalidParameter(e.to_string()))
                    })
                    .transpose()?;
                if let Some(new_parent) = new_parent {
                    self.class_parent_kind_ok(*new_parent)?;
                    self.hierarchy.clone().move_to(*handle, *new_parent)?;
                }
                EventPayload::ClassModified {
                    handle: *handle,
                    name: name.clone(),
                    priority,
                    new_parent: *new_parent,
                }
            }
        };
        Ok(vec![Event {
            aggregate_id: Event::aggregate_id_for(&device),
            version: self.version + 1,
            device,
            payload,
        }])
    }

    /// Apply a previously-accepted event, advancing `version` by one.
    /// Total and deterministic: never fails, never panics on well-formed
    /// events produced by [`TrafficControlAggregate::handle_command`] or
    /// loaded from the event store.
    pub fn apply(&mut self, event: &Event) {
        match &event.payload {
            EventPayload::QdiscCreated {
                handle,
                parent,
                qdisc,
            } => {
                self.qdiscs.insert(*handle, qdisc.clone());
                if parent == handle {
                    self.root_qdisc = Some(*handle);
                    self.hierarchy = HierarchyManager::new(*handle, self.max_hierarchy_depth);
                }
            }
            EventPayload::QdiscDeleted { handle } => {
                self.qdiscs.remove(handle);
                if self.root_qdisc == Some(*handle) {
                    self.root_qdisc = None;
                    self.hierarchy = HierarchyManager::new(Handle::default(), self.max_hierarchy_depth);
                }
            }
            EventPayload::ClassCreated {
                handle,
                parent,
                name,
                rate_bps,
                ceil_bps,
                priority,
                overrides,
            } => {
                let rate = Bandwidth::from_bps(*rate_bps);
                let ceil = if *ceil_bps == 0 {
                    rate
                } else {
                    Bandwidth::from_bps(*ceil_bps)
                };
                let defaults = HtbDefaults {
                    mtu: overrides.mtu.unwrap_or(1500),
                    mpu: overrides.mpu.unwrap_or(64),
                    overhead: overrides.overhead.unwrap_or(4),
                };
                let (quantum, burst, cburst) = compute_htb_defaults(rate, ceil, &defaults);
                let htb = HtbParams {
                    rate,
                    ceil,
                    burst: overrides.burst.unwrap_or(burst),
                    cburst: overrides.cburst.unwrap_or(cburst),
                    quantum: overrides.quantum.unwrap_or(quantum),
                    overhead: defaults.overhead,
                    mpu: defaults.mpu,
                    mtu: defaults.mtu,
                    htb_prio: overrides.htb_prio.unwrap_or(priority.value()),
                };
                let depth = self
                    .hierarchy
                    .add(*handle, *parent)
                    .expect("hierarchy placement was validated before this event was produced");
                self.classes.insert(
                    *handle,
                    Class {
                        device: self.device.clone(),
                        handle: *handle,
                        parent: *parent,
                        name: name.clone(),
                        priority: Some(*priority),
                        depth,
                        children: Vec::new(),
                        htb,
                    },
                );
            }
            EventPayload::ClassDeleted { handle, strategy } => {
                self.apply_class_deletion(*handle, *strategy);
            }
            EventPayload::ClassModified {
                handle,
                name,
                priority,
                new_parent,
            } => {
                if let Some(new_parent) = new_parent {
                    self.hierarchy
                        .move_to(*handle, *new_parent)
                        .expect("move was validated before this event was produced");
                }
                if let Some(class) = self.classes.get_mut(handle) {
                    if let Some(name) = name {
                        class.name = name.clone();
                    }
                    if let Some(priority) = priority {
                        class.priority = Some(*priority);
                    }
                    if let Some(new_parent) = new_parent {
                        class.parent = *new_parent;
                    }
                }
                self.sync_class_tree_fields();
            }
            EventPayload::FilterCreated {
                parent,
                priority,
                handle,
                flow_id,
                matches,
            } => {
                let matches = matches
                    .iter()
                    .map(|s| {
                        MatchPredicate::parse(s)
                            .expect("stored match predicate was validated before being written")
                    })
                    .collect();
                self.filters.push(Filter {
                    device: self.device.clone(),
                    parent: *parent,
                    priority: *priority,
                    handle: *handle,
                    flow_id: *flow_id,
                    matches,
                });
            }
            EventPayload::FilterDeleted {
                parent,
                priority,
                handle,
            } => {
                self.filters
                    .retain(|f| !(f.parent == *parent && f.priority == *priority && f.handle == *handle));
            }
        }
        self.version += 1;
    }

    fn apply_class_deletion(&mut self, handle: Handle, strategy: DeletionStrategy) {
        match strategy {
            DeletionStrategy::Cascade => {
                let descendants = self.hierarchy.descendants(handle);
                self.hierarchy.remove_cascade(handle);
                self.classes.remove(&handle);
                for descendant in descendants {
                    self.classes.remove(&descendant);
                }
            }
            DeletionStrategy::PromoteChildren => {
                self.hierarchy
                    .promote_children(handle)
                    .expect("strategy was validated before this event was produced");
                self.classes.remove(&handle);
            }
            DeletionStrategy::OrphanChildren => {
                self.hierarchy
                    .orphan_children(handle)
                    .expect("strategy was validated before this event was produced");
                self.classes.remove(&handle);
            }
            DeletionStrategy::FailIfChildren => {
                self.hierarchy
                    .remove_if_childless(handle)
                    .expect("childlessness was validated before this event was produced");
                self.classes.remove(&handle);
            }
        }
        self.sync_class_tree_fields();
    }

    fn sync_class_tree_fields(&mut self) {
        let handles: Vec<Handle> = self.classes.keys().copied().collect();
        for handle in handles {
            let depth = self.hierarchy.depth(handle).unwrap_or(0);
            let children = self.hierarchy.children(handle).to_vec();
            if let Some(class) = self.classes.get_mut(&handle) {
                class.depth = depth;
                class.children = children;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev() -> DeviceName {
        DeviceName::new("eth0").unwrap()
    }

    fn h(major: u16, minor: u16) -> Handle {
        Handle::new(major, minor)
    }

    fn apply_ok(aggregate: &mut TrafficControlAggregate, command: Command) {
        let events = aggregate.handle_command(&command).unwrap();
        for event in &events {
            aggregate.apply(event);
        }
    }

    #[test]
    fn rejected_command_leaves_version_unchanged() {
        let mut aggregate = TrafficControlAggregate::new(dev(), 8, PriorityInheritance::None);
        apply_ok(
            &mut aggregate,
            Command::CreateHtbQdisc {
                device: dev(),
                handle: h(1, 0),
                default_class: h(1, 30),
            },
        );
        let before = aggregate.version();
        let rejected = aggregate.handle_command(&Command::CreateHtbQdisc {
            device: dev(),
            handle: h(1, 0),
            default_class: h(1, 30),
        });
        assert!(rejected.is_err());
        assert_eq!(aggregate.version(), before);
    }

    #[test]
    fn class_without_priority_is_rejected() {
        let mut aggregate = TrafficControlAggregate::new(dev(), 8, PriorityInheritance::None);
        apply_ok(
            &mut aggregate,
            Command::CreateHtbQdisc {
                device: dev(),
                handle: h(1, 0),
                default_class: h(1, 30),
            },
        );
        let result = aggregate.handle_command(&Command::CreateHtbClass {
            device: dev(),
            parent: h(1, 0),
            handle: h(1, 10),
            name: "web".into(),
            rate: Bandwidth::parse("100mbps").unwrap(),
            ceil: Bandwidth::parse("200mbps").unwrap(),
            priority: None,
            overrides: HtbOverrides::default(),
        });
        assert!(matches!(
            result,
            Err(Error::Domain(DomainError::UnsetPriority(_)))
        ));
    }

    #[test]
    fn unset_priority_inherits_parent_plus_one_when_configured() {
        let mut aggregate =
            TrafficControlAggregate::new(dev(), 8, PriorityInheritance::InheritParentPlusOne);
        apply_ok(
            &mut aggregate,
            Command::CreateHtbQdisc {
                device: dev(),
                handle: h(1, 0),
                default_class: h(1, 30),
            },
        );
        apply_ok(
            &mut aggregate,
            Command::CreateHtbClass {
                device: dev(),
                parent: h(1, 0),
                handle: h(1, 10),
                name: "parent".into(),
                rate: Bandwidth::parse("100mbps").unwrap(),
                ceil: Bandwidth::parse("200mbps").unwrap(),
                priority: Some(2),
                overrides: HtbOverrides::default(),
            },
        );
        apply_ok(
            &mut aggregate,
            Command::CreateHtbClass {
                device: dev(),
                parent: h(1, 10),
                handle: h(1, 11),
                name: "child".into(),
                rate: Bandwidth::parse("10mbps").unwrap(),
                ceil: Bandwidth::ZERO,
                priority: None,
                overrides: HtbOverrides::default(),
            },
        );
        let child = aggregate.class(h(1, 11)).unwrap();
        assert_eq!(child.priority, Some(tcplane_types::Priority::new(3).unwrap()));
    }

    #[test]
    fn valid_htb_tree_produces_expected_hierarchy() {
        let mut aggregate = TrafficControlAggregate::new(dev(), 8, PriorityInheritance::None);
        apply_ok(
            &mut aggregate,
            Command::CreateHtbQdisc {
                device: dev(),
                handle: h(1, 0),
                default_class: h(1, 30),
            },
        );
        apply_ok(
            &mut aggregate,
            Command::CreateHtbClass {
                device: dev(),
                parent: h(1, 0),
                handle: h(1, 10),
                name: "web".into(),
                rate: Bandwidth::parse("100mbps").unwrap(),
                ceil: Bandwidth::parse("200mbps").unwrap(),
                priority: Some(1),
                overrides: HtbOverrides::default(),
            },
        );
        apply_ok(
            &mut aggregate,
            Command::CreateHtbClass {
                device: dev(),
                parent: h(1, 0),
                handle: h(1, 20),
                name: "db".into(),
                rate: Bandwidth::parse("50mbps").unwrap(),
                ceil: Bandwidth::parse("100mbps").unwrap(),
                priority: Some(2),
                overrides: HtbOverrides::default(),
            },
        );
        apply_ok(
            &mut aggregate,
            Command::CreateFilter {
                device: dev(),
                parent: h(1, 0),
                priority: 10,
                handle: h(800, 1),
                flow_id: h(1, 10),
                matches: vec![MatchPredicate::PortDestination(443)],
            },
        );
        assert_eq!(aggregate.version(), 4);
        let mut children = aggregate.hierarchy().children(h(1, 0)).to_vec();
        children.sort();
        assert_eq!(children, vec![h(1, 10), h(1, 20)]);
    }

    #[test]
    fn parent_with_non_htb_qdisc_is_rejected() {
        let mut aggregate = TrafficControlAggregate::new(dev(), 8, PriorityInheritance::None);
        apply_ok(
            &mut aggregate,
            Command::CreatePrioQdisc {
                device: dev(),
                handle: h(1, 0),
                bands: 3,
                priomap: [0; 16],
            },
        );
        let result = aggregate.handle_command(&Command::CreateHtbClass {
            device: dev(),
            parent: h(1, 0),
            handle: h(1, 10),
            name: "web".into(),
            rate: Bandwidth::parse("10mbps").unwrap(),
            ceil: Bandwidth::ZERO,
            priority: Some(0),
            overrides: HtbOverrides::default(),
        });
        assert!(matches!(
            result,
            Err(Error::Domain(DomainError::TypeMismatch(_)))
        ));
    }

    #[test]
    fn cycle_attempt_is_rejected_without_mutation() {
        let mut aggregate = TrafficControlAggregate::new(dev(), 8, PriorityInheritance::None);
        apply_ok(
            &mut aggregate,
            Command::CreateHtbQdisc {
                device: dev(),
                handle: h(1, 0),
                default_class: h(1, 1),
            },
        );
        for (parent, handle) in [(h(1, 0), h(1, 1)), (h(1, 1), h(1, 10)), (h(1, 10), h(1, 20))] {
            apply_ok(
                &mut aggregate,
                Command::CreateHtbClass {
                    device: dev(),
                    parent,
                    handle,
                    name: "c".into(),
                    rate: Bandwidth::parse("10mbps").unwrap(),
                    ceil: Bandwidth::ZERO,
                    priority: Some(0),
                    overrides: HtbOverrides::default(),
                },
            );
        }
        let before = aggregate.clone();
        let result = aggregate.handle_command(&Command::ModifyClass {
            device: dev(),
            handle: h(1, 1),
            name: None,
            priority: None,
            new_parent: Some(h(1, 20)),
        });
        assert!(matches!(result, Err(Error::Domain(DomainError::Cycle(_)))));
        assert_eq!(aggregate, before);
    }

    #[test]
    fn fail_if_children_does_not_partially_delete() {
        let mut aggregate = TrafficControlAggregate::new(dev(), 8, PriorityInheritance::None);
        apply_ok(
            &mut aggregate,
            Command::CreateHtbQdisc {
                device: dev(),
                handle: h(1, 0),
                default_class: h(1, 1),
            },
        );
        apply_ok(
            &mut aggregate,
            Command::CreateHtbClass {
                device: dev(),
                parent: h(1, 0),
                handle: h(1, 1),
                name: "parent".into(),
                rate: Bandwidth::parse("10mbps").unwrap(),
                ceil: Bandwidth::ZERO,
                priority: Some(0),
                overrides: HtbOverrides::default(),
            },
        );
        apply_ok(
            &mut aggregate,
            Command::CreateHtbClass {
                device: dev(),
                parent: h(1, 1),
                handle: h(1, 2),
                name: "child".into(),
                rate: Bandwidth::parse("5mbps").unwrap(),
                ceil: Bandwidth::ZERO,
                priority: Some(0),
                overrides: HtbOverrides::default(),
            },
        );
        let before = aggregate.clone();
        let result = aggregate.handle_command(&Command::DeleteClass {
            device: dev(),
            handle: h(1, 1),
            strategy: DeletionStrategy::FailIfChildren,
        });
        assert!(result.is_err());
        assert_eq!(aggregate, before);
    }

    #[test]
    fn replay_reproduces_online_state() {
        let mut online = TrafficControlAggregate::new(dev(), 8, PriorityInheritance::None);
        let mut log = Vec::new();
        for command in [
            Command::CreateHtbQdisc {
                device: dev(),
                handle: h(1, 0),
                default_class: h(1, 30),
            },
            Command::CreateHtbClass {
                device: dev(),
                parent: h(1, 0),
                handle: h(1, 10),
                name: "web".into(),
                rate: Bandwidth::parse("100mbps").unwrap(),
                ceil: Bandwidth::parse("200mbps").unwrap(),
                priority: Some(1),
                overrides: HtbOverrides::default(),
            },
            Command::CreateFilter {
                device: dev(),
                parent: h(1, 0),
                priority: 10,
                handle: h(800, 1),
                flow_id: h(1, 10),
                matches: vec![MatchPredicate::PortDestination(443)],
            },
        ] {
            let events = online.handle_command(&command).unwrap();
            for event in &events {
                online.apply(event);
                log.push(event.clone());
            }
        }
        let replayed = TrafficControlAggregate::replay(dev(), 8, PriorityInheritance::None, &log);
        assert_eq!(online, replayed);
    }
}
