//! Qdisc variants and their kernel-facing parameters.

use serde::{Deserialize, Serialize};
use tcplane_types::{Bandwidth, Handle};

use crate::error::{Error, Result};

/// A queuing discipline to attach to a device or class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Qdisc {
    /// Hierarchical token bucket: supports guaranteed rate and ceiling with
    /// borrowing, via child classes.
    Htb {
        /// Class to use for otherwise-unclassified traffic.
        default_class: Handle,
    },
    /// Token bucket filter: single-rate shaper, leaf-only.
    Tbf {
        /// Sustained rate.
        rate: Bandwidth,
        /// Bucket depth in bytes.
        buffer: u32,
        /// Queue limit.
        limit: TbfLimit,
        /// Burst size in bytes.
        burst: u32,
    },
    /// Strict-priority qdisc with N bands.
    Prio {
        /// Number of bands, 2..=16.
        bands: u8,
        /// Priority-to-band map; exactly 16 entries, each `< bands`.
        priomap: [u8; 16],
    },
    /// Fair queuing + controlled delay AQM.
    FqCodel {
        /// Maximum queued packets.
        limit: u32,
        /// Number of sub-flows; must be a power of two.
        flows: u32,
        /// Target sojourn time in microseconds.
        target_us: u32,
        /// Codel interval in microseconds; must be `>= target_us`.
        interval_us: u32,
        /// Deficit round-robin quantum in bytes.
        quantum: u32,
        /// Whether to mark (ECN) instead of drop when possible.
        ecn: bool,
    },
    /// Network emulator: optional impairment qdisc, usually a device root.
    Netem {
        /// Base one-way delay in microseconds.
        delay_us: u32,
        /// Delay jitter in microseconds.
        jitter_us: u32,
        /// Packet loss percentage, `0.0..=100.0`.
        loss_percent: f64,
        /// Packet duplication percentage, `0.0..=100.0`.
        duplicate_percent: f64,
        /// Packet corruption percentage, `0.0..=100.0`.
        corrupt_percent: f64,
        /// Packet reorder percentage, `0.0..=100.0`.
        reorder_percent: f64,
        /// Number of packets between reordered ones ("gap").
        gap: u32,
        /// Queue limit in packets.
        limit: u32,
        /// Delay distribution name (e.g. `"normal"`, `"pareto"`).
        distribution: Option<String>,
    },
}

/// TBF's queue limit, expressed in either bytes or packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TbfLimit {
    /// Limit expressed in bytes.
    Bytes(u32),
    /// Limit expressed in packets.
    Packets(u32),
}

impl Qdisc {
    /// The kernel qdisc kind string (`"htb"`, `"tbf"`, ...).
    pub fn kind(&self) -> &'static str {
        match self {
            Qdisc::Htb { .. } => "htb",
            Qdisc::Tbf { .. } => "tbf",
            Qdisc::Prio { .. } => "prio",
            Qdisc::FqCodel { .. } => "fq_codel",
            Qdisc::Netem { .. } => "netem",
        }
    }

    /// Whether this qdisc kind supports attaching HTB-flavored classes.
    pub fn is_htb(&self) -> bool {
        matches!(self, Qdisc::Htb { .. })
    }

    /// Validate the qdisc's own parameters, independent of hierarchy
    /// placement (which the aggregate checks separately).
    pub fn validate(&self) -> Result<()> {
        match self {
            Qdisc::Htb { .. } => Ok(()),
            Qdisc::Tbf { .. } => Ok(()),
            Qdisc::Prio { bands, priomap } => {
                if !(2..=16).contains(bands) {
                    return Err(Error::InvalidParameter(format!(
                        "prio bands {bands} outside 2..=16"
                    )));
                }
                for (i, band) in priomap.iter().enumerate() {
                    if *band >= *bands {
                        return Err(Error::InvalidParameter(format!(
                            "prio priomap[{i}] = {band} is not < bands ({bands})"
                        )));
                    }
                }
                Ok(())
            }
            Qdisc::FqCodel {
                limit,
                flows,
                target_us,
                interval_us,
                ..
            } => {
                if *limit == 0 {
                    return Err(Error::InvalidParameter("fq_codel limit must be > 0".into()));
                }
                if *flows == 0 || !flows.is_power_of_two() {
                    return Err(Error::InvalidParameter(format!(
                        "fq_codel flows {flows} must be a power of two"
                    )));
                }
                if *target_us == 0 {
                    return Err(Error::InvalidParameter("fq_codel target must be > 0".into()));
                }
                if interval_us < target_us {
                    return Err(Error::InvalidParameter(format!(
                        "fq_codel interval {interval_us} must be >= target {target_us}"
                    )));
                }
                Ok(())
            }
            Qdisc::Netem {
                loss_percent,
                duplicate_percent,
                corrupt_percent,
                reorder_percent,
                ..
            } => {
                for (name, value) in [
                    ("loss", loss_percent),
                    ("duplicate", duplicate_percent),
                    ("corrupt", corrupt_percent),
                    ("reorder", reorder_percent),
                ] {
                    if !(0.0..=100.0).contains(value) {
                        return Err(Error::InvalidParameter(format!(
                            "netem {name} percent {value} outside 0..=100"
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}
