//! Packet-classification filters.

use serde::{Deserialize, Serialize};
use tcplane_types::{DeviceName, Handle, MatchPredicate};

/// A filter steering matching packets into a class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// The device this filter lives on.
    pub device: DeviceName,
    /// The qdisc or class this filter is attached to.
    pub parent: Handle,
    /// Evaluation priority; lower values are tried first.
    pub priority: u16,
    /// This filter's own handle.
    pub handle: Handle,
    /// The class packets matching this filter are steered into.
    pub flow_id: Handle,
    /// Ordered predicates; a packet matches only if all of them match.
    pub matches: Vec<MatchPredicate>,
}
