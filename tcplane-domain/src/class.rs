//! Bandwidth classes and their HTB computed defaults.

use serde::{Deserialize, Serialize};
use tcplane_types::{Bandwidth, DeviceName, Handle, Priority};

/// HTB-specific parameters carried by every class (this engine only models
/// HTB-flavored classes, per spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtbParams {
    /// Guaranteed rate.
    pub rate: Bandwidth,
    /// Borrowing ceiling; `rate <= ceil` when `ceil > 0`.
    pub ceil: Bandwidth,
    /// Token bucket burst size in bytes.
    pub burst: u32,
    /// Ceiling-bucket burst size in bytes.
    pub cburst: u32,
    /// DRR quantum in bytes.
    pub quantum: u32,
    /// Per-packet overhead charged against the rate, in bytes.
    pub overhead: u32,
    /// Minimum packet unit in bytes.
    pub mpu: u32,
    /// Maximum transmission unit in bytes.
    pub mtu: u32,
    /// Internal HTB priority (borrowing order among siblings).
    pub htb_prio: u8,
}

/// Defaults used when computing HTB parameters from rate/ceil (spec §4.2).
pub struct HtbDefaults {
    /// Maximum transmission unit in bytes.
    pub mtu: u32,
    /// Minimum packet unit in bytes.
    pub mpu: u32,
    /// Per-packet overhead in bytes.
    pub overhead: u32,
}

impl Default for HtbDefaults {
    fn default() -> Self {
        HtbDefaults {
            mtu: 1500,
            mpu: 64,
            overhead: 4,
        }
    }
}

/// Compute `quantum`, `burst`, and `cburst` from `rate`/`ceil` when not
/// supplied explicitly. Pure and deterministic: replay must reproduce
/// exactly the values computed online.
pub fn compute_htb_defaults(rate: Bandwidth, ceil: Bandwidth, defaults: &HtbDefaults) -> (u32, u32, u32) {
    let quantum = clamp_u32(rate.as_bps() / 8 / 1000, 1000, 60_000);
    let burst = compute_bucket(rate, defaults);
    let cburst = compute_bucket(ceil, defaults);
    (quantum as u32, burst, cburst)
}

fn compute_bucket(rate: Bandwidth, defaults: &HtbDefaults) -> u32 {
    let rate_bytes_per_second = rate.as_bps() / 8;
    // 64ms of tokens at this rate, the kernel's default timer resolution.
    let raw = rate_bytes_per_second * 64 / 1000;
    let packets = raw.div_ceil(defaults.mtu as u64).max(1);
    let with_overhead = raw + packets * defaults.overhead as u64;
    let floor = (1600u64).max(2 * defaults.mtu as u64);
    with_overhead.max(floor) as u32
}

fn clamp_u32(value: u64, min: u64, max: u64) -> u64 {
    value.clamp(min, max)
}

/// A bandwidth class: a named priority bucket under a classful qdisc or
/// another class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    /// The device this class lives on.
    pub device: DeviceName,
    /// This class's own handle.
    pub handle: Handle,
    /// The parent qdisc or class handle.
    pub parent: Handle,
    /// Operator-facing name.
    pub name: String,
    /// Scheduling priority; `None` until explicitly set, a hard validation
    /// failure at apply time if still unset.
    pub priority: Option<Priority>,
    /// Depth in the hierarchy; the root qdisc's direct children are depth 1.
    pub depth: usize,
    /// Direct child handles, maintained by the hierarchy manager.
    pub children: Vec<Handle>,
    /// HTB-specific shaping parameters.
    pub htb: HtbParams,
}

impl Class {
    /// Whether every child has already been enumerated under this class.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}
