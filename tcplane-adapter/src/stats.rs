//! Counter snapshots returned by the kernel adapter.
//!
//! These mirror the counters the kernel itself exposes per qdisc/class/link
//! (`tc -s` output): packet and byte totals plus the drop/overlimit signals
//! that indicate a shaper is actively biting.

/// Counters for one qdisc.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QdiscStats {
    /// Bytes sent through this qdisc.
    pub bytes: u64,
    /// Packets sent through this qdisc.
    pub packets: u64,
    /// Packets dropped (queue overflow, AQM, etc).
    pub drops: u64,
    /// Times the qdisc delayed packets due to rate limiting.
    pub overlimits: u64,
    /// Packets currently queued.
    pub qlen: u32,
}

/// Counters for one class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassStats {
    /// Bytes sent through this class.
    pub bytes: u64,
    /// Packets sent through this class.
    pub packets: u64,
    /// Packets dropped.
    pub drops: u64,
    /// Times this class borrowed tokens from a parent.
    pub borrows: u64,
    /// Packets currently queued for this class.
    pub qlen: u32,
}

/// Link-level counters for a device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Bytes received.
    pub rx_bytes: u64,
    /// Bytes transmitted.
    pub tx_bytes: u64,
    /// Packets received.
    pub rx_packets: u64,
    /// Packets transmitted.
    pub tx_packets: u64,
    /// Receive errors.
    pub rx_errors: u64,
    /// Transmit errors.
    pub tx_errors: u64,
}
