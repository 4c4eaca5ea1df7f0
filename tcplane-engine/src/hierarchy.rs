//! Parent/child indices, cycle prevention, and bandwidth distribution for
//! the class hierarchy of a single device.

use std::collections::BTreeMap;

use tcplane_domain::Error as DomainError;
use tcplane_types::{Bandwidth, Handle, Priority};

use crate::error::Result;

/// Priority-inheritance rule applied to newly-placed classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PriorityInheritance {
    /// Leave priorities untouched.
    #[default]
    None,
    /// Inherit the parent's priority exactly.
    InheritParent,
    /// Inherit the parent's priority plus one, clamped to 7.
    InheritParentPlusOne,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Node {
    parent: Handle,
    children: Vec<Handle>,
    depth: usize,
}

/// Maintains the parent/child forest of classes under one device's root
/// qdisc handle, enforcing depth and cycle-freedom invariants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyManager {
    root: Handle,
    max_depth: usize,
    nodes: BTreeMap<Handle, Node>,
    root_children: Vec<Handle>,
}

impl HierarchyManager {
    /// Create a manager for a device whose root qdisc has handle `root`.
    pub fn new(root: Handle, max_depth: usize) -> Self {
        HierarchyManager {
            root,
            max_depth,
            nodes: BTreeMap::new(),
            root_children: Vec::new(),
        }
    }

    /// The configured maximum hierarchy depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn parent_depth(&self, parent: Handle) -> Option<usize> {
        if parent == self.root {
            Some(0)
        } else {
            self.nodes.get(&parent).map(|n| n.depth)
        }
    }

    fn children_of_mut(&mut self, handle: Handle) -> &mut Vec<Handle> {
        if handle == self.root {
            &mut self.root_children
        } else {
            &mut self.nodes.get_mut(&handle).expect("handle registered").children
        }
    }

    /// Register `handle` under `parent`. Fails if the parent is missing, or
    /// placement would exceed [`Self::max_depth`].
    pub fn add(&mut self, handle: Handle, parent: Handle) -> Result<usize> {
        let parent_depth = self
            .parent_depth(parent)
            .ok_or(DomainError::ParentMissing(parent))?;
        let depth = parent_depth + 1;
        if depth > self.max_depth {
            return Err(DomainError::DepthExceeded {
                handle,
                depth,
                max: self.max_depth,
            }
            .into());
        }
        self.nodes.insert(
            handle,
            Node {
                parent,
                children: Vec::new(),
                depth,
            },
        );
        self.children_of_mut(parent).push(handle);
        Ok(depth)
    }

    /// Direct children of `handle` (or of the root, if `handle` is the root).
    pub fn children(&self, handle: Handle) -> &[Handle] {
        if handle == self.root {
            &self.root_children
        } else {
            self.nodes
                .get(&handle)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[])
        }
    }

    /// This class's parent, or `None` for the root.
    pub fn parent(&self, handle: Handle) -> Option<Handle> {
        if handle == self.root {
            None
        } else {
            self.nodes.get(&handle).map(|n| n.parent)
        }
    }

    /// This class's depth (root's direct children are depth 1).
    pub fn depth(&self, handle: Handle) -> Option<usize> {
        if handle == self.root {
            Some(0)
        } else {
            self.nodes.get(&handle).map(|n| n.depth)
        }
    }

    /// All descendants of `handle`, in depth-first order.
    pub fn descendants(&self, handle: Handle) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut queue: Vec<Handle> = self.children(handle).to_vec();
        while let Some(h) = queue.pop() {
            out.push(h);
            queue.extend(self.children(h));
        }
        out
    }

    /// All ancestors of `handle`, nearest first, ending at (but not
    /// including) the root.
    pub fn ancestors(&self, handle: Handle) -> Vec<Handle> {
        let mut out = Vec::new();
        let mut current = handle;
        while let Some(node) = self.nodes.get(&current) {
            if node.parent == self.root {
                break;
            }
            out.push(node.parent);
            current = node.parent;
        }
        out
    }

    /// Whether `ancestor` is `handle` itself or one of its ancestors.
    fn is_ancestor_of(&self, ancestor: Handle, handle: Handle) -> bool {
        if ancestor == handle {
            return true;
        }
        let mut current = handle;
        while let Some(node) = self.nodes.get(&current) {
            if node.parent == ancestor {
                return true;
            }
            if node.parent == self.root {
                break;
            }
            current = node.parent;
        }
        false
    }

    /// Unlink `handle` from its parent and forget it, without touching
    /// descendants. Callers that need cascading removal use [`Self::delete`].
    fn unlink(&mut self, handle: Handle) {
        if let Some(node) = self.nodes.remove(&handle) {
            let siblings = self.children_of_mut(node.parent);
            siblings.retain(|h| *h != handle);
        }
    }

    fn remove_subtree(&mut self, handle: Handle) {
        for child in self.children(handle).to_vec() {
            self.remove_subtree(child);
        }
        self.unlink(handle);
    }

    /// Move `handle` to become a child of `new_parent`. A no-op success if
    /// `new_parent` is already its parent. Rejects a missing parent, a
    /// cycle, or any descendant exceeding [`Self::max_depth`].
    pub fn move_to(&mut self, handle: Handle, new_parent: Handle) -> Result<()> {
        let current_parent = self.parent(handle).ok_or(DomainError::ParentMissing(handle))?;
        if current_parent == new_parent {
            return Ok(());
        }
        let new_parent_depth = self
            .parent_depth(new_parent)
            .ok_or(DomainError::ParentMissing(new_parent))?;
        if self.is_ancestor_of(handle, new_parent) {
            return Err(DomainError::Cycle(handle).into());
        }

        let new_depth = new_parent_depth + 1;
        let depth_delta = new_depth as isize - self.nodes[&handle].depth as isize;
        let deepest_descendant = self
            .descendants(handle)
            .iter()
            .map(|h| self.nodes[h].depth)
            .max()
            .unwrap_or(self.nodes[&handle].depth);
        if (deepest_descendant as isize + depth_delta) as usize > self.max_depth {
            return Err(DomainError::DepthExceeded {
                handle,
                depth: (deepest_descendant as isize + depth_delta) as usize,
                max: self.max_depth,
            }
            .into());
        }

        self.children_of_mut(current_parent).retain(|h| *h != handle);
        self.children_of_mut(new_parent).push(handle);
        self.nodes.get_mut(&handle).unwrap().parent = new_parent;
        self.reset_depths(handle, new_depth);
        Ok(())
    }

    fn reset_depths(&mut self, handle: Handle, depth: usize) {
        self.nodes.get_mut(&handle).unwrap().depth = depth;
        for child in self.children(handle).to_vec() {
            self.reset_depths(child, depth + 1);
        }
    }

    /// Remove `handle` and its whole subtree.
    pub fn remove_cascade(&mut self, handle: Handle) {
        self.remove_subtree(handle);
    }

    /// Re-parent each direct child of `handle` to `handle`'s own parent,
    /// then remove `handle` alone.
    pub fn promote_children(&mut self, handle: Handle) -> Result<()> {
        let parent = self.parent(handle).ok_or(DomainError::ParentMissing(handle))?;
        for child in self.children(handle).to_vec() {
            self.move_to(child, parent)?;
        }
        self.unlink(handle);
        Ok(())
    }

    /// Re-parent each direct child of `handle` to the device root, then
    /// remove `handle` alone.
    pub fn orphan_children(&mut self, handle: Handle) -> Result<()> {
        for child in self.children(handle).to_vec() {
            self.move_to(child, self.root)?;
        }
        self.unlink(handle);
        Ok(())
    }

    /// Remove `handle` alone; fails if it has any children.
    pub fn remove_if_childless(&mut self, handle: Handle) -> Result<()> {
        if self.has_children(handle) {
            return Err(DomainError::InvalidParameter(format!(
                "{handle} has children"
            ))
            .into());
        }
        self.unlink(handle);
        Ok(())
    }

    /// Whether `handle` has at least one direct child.
    pub fn has_children(&self, handle: Handle) -> bool {
        !self.children(handle).is_empty()
    }

    /// Recompute and verify depth and bidirectional-link consistency across
    /// the whole structure.
    pub fn validate(&self) -> Result<()> {
        for (&handle, node) in &self.nodes {
            let expected_depth = if node.parent == self.root {
                1
            } else {
                self.nodes
                    .get(&node.parent)
                    .ok_or(DomainError::ParentMissing(node.parent))?
                    .depth
                    + 1
            };
            if expected_depth != node.depth {
                return Err(DomainError::DepthExceeded {
                    handle,
                    depth: node.depth,
                    max: self.max_depth,
                }
                .into());
            }
            let parent_children = self.children(node.parent);
            if !parent_children.contains(&handle) {
                return Err(DomainError::ParentMissing(node.parent).into());
            }
        }
        Ok(())
    }

    /// Apply a priority-inheritance rule to `priorities`, processing
    /// parents before children so results are order-independent.
    pub fn apply_priority_inheritance(
        &self,
        rule: PriorityInheritance,
        priorities: &mut BTreeMap<Handle, Priority>,
    ) {
        if rule == PriorityInheritance::None {
            return;
        }
        let mut handles: Vec<Handle> = self.nodes.keys().copied().collect();
        handles.sort_by_key(|h| self.nodes[h].depth);

        for handle in handles {
            if priorities.contains_key(&handle) {
                continue;
            }
            let parent = self.nodes[&handle].parent;
            let Some(parent_priority) = priorities.get(&parent).copied() else {
                continue;
            };
            let inherited = match rule {
                PriorityInheritance::None => unreachable!(),
                PriorityInheritance::InheritParent => parent_priority,
                PriorityInheritance::InheritParentPlusOne => parent_priority.saturating_next(),
            };
            priorities.insert(handle, inherited);
        }
    }

    /// Distribute `parent_rate` among `demands` (handle, priority, demanded
    /// rate), highest priority group first. Within a priority group,
    /// demand is satisfied in full if capacity allows; otherwise the
    /// remaining capacity is split proportionally to demand. Ties within a
    /// priority/rate are broken by ascending handle value.
    ///
    /// Returns each child's allocation and the oversubscription ratio
    /// (total demand / `parent_rate`).
    pub fn bandwidth_distribution(
        parent_rate: Bandwidth,
        demands: &[(Handle, Priority, Bandwidth)],
    ) -> (BTreeMap<Handle, Bandwidth>, f64) {
        let mut by_priority: BTreeMap<Priority, Vec<(Handle, Bandwidth)>> = BTreeMap::new();
        let mut total_demand = 0u64;
        for &(handle, priority, demand) in demands {
            total_demand += demand.as_bps();
            by_priority.entry(priority).or_default().push((handle, demand));
        }
        for group in by_priority.values_mut() {
            group.sort_by_key(|(h, _)| *h);
        }

        let oversubscription = if parent_rate.as_bps() == 0 {
            if total_demand == 0 { 0.0 } else { f64::INFINITY }
        } else {
            total_demand as f64 / parent_rate.as_bps() as f64
        };

        let mut remaining = parent_rate.as_bps();
        let mut allocation = BTreeMap::new();
        for (_, group) in by_priority {
            let group_demand: u64 = group.iter().map(|(_, d)| d.as_bps()).sum();
            if group_demand <= remaining {
                for (handle, demand) in &group {
                    allocation.insert(*handle, *demand);
                }
                remaining -= group_demand;
            } else if remaining == 0 {
                for (handle, _) in &group {
                    allocation.insert(*handle, Bandwidth::ZERO);
                }
            } else {
                for (handle, demand) in &group {
                    let share = demand.as_bps() as f64 / group_demand as f64 * remaining as f64;
                    allocation.insert(*handle, Bandwidth::from_bps(share.round() as u64));
                }
                remaining = 0;
            }
        }
        (allocation, oversubscription)
    }
}
