//! Filter match predicates and their canonical string form.
//!
//! Each variant serializes to a string that round-trips through event
//! payloads (e.g. `"ip dst 192.168.1.10/32"`, `"ip dport 443 0xffff"`).

use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A protocol tag carried by a [`MatchPredicate::Protocol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolTag {
    /// TCP.
    Tcp,
    /// UDP.
    Udp,
    /// ICMP.
    Icmp,
}

impl fmt::Display for ProtocolTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtocolTag::Tcp => "tcp",
            ProtocolTag::Udp => "udp",
            ProtocolTag::Icmp => "icmp",
        };
        write!(f, "{s}")
    }
}

/// A CIDR-notation address and prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cidr {
    /// The network address.
    pub addr: IpAddr,
    /// The prefix length in bits.
    pub prefix_len: u8,
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl Cidr {
    fn parse(s: &str) -> Result<Self> {
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| Error::InvalidFormat(format!("not a CIDR: {s}")))?;
        let addr: IpAddr = addr
            .parse()
            .map_err(|_| Error::InvalidFormat(format!("invalid address: {addr}")))?;
        let prefix_len: u8 = prefix
            .parse()
            .map_err(|_| Error::InvalidFormat(format!("invalid prefix length: {prefix}")))?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix_len > max {
            return Err(Error::OutOfRange(format!(
                "prefix length {prefix_len} exceeds {max}"
            )));
        }
        Ok(Cidr { addr, prefix_len })
    }
}

/// A single packet-classification predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPredicate {
    /// Match on source IP/CIDR.
    IpSource(Cidr),
    /// Match on destination IP/CIDR.
    IpDestination(Cidr),
    /// Match on source port.
    PortSource(u16),
    /// Match on destination port.
    PortDestination(u16),
    /// Match on transport protocol.
    Protocol(ProtocolTag),
    /// Match on a firewall mark.
    FirewallMark(u32),
}

impl fmt::Display for MatchPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPredicate::IpSource(cidr) => write!(f, "ip src {cidr}"),
            MatchPredicate::IpDestination(cidr) => write!(f, "ip dst {cidr}"),
            MatchPredicate::PortSource(port) => write!(f, "ip sport {port} 0xffff"),
            MatchPredicate::PortDestination(port) => write!(f, "ip dport {port} 0xffff"),
            MatchPredicate::Protocol(proto) => write!(f, "ip protocol {proto}"),
            MatchPredicate::FirewallMark(mark) => write!(f, "fw mark {mark:#x}"),
        }
    }
}

impl MatchPredicate {
    /// Parse the canonical string form produced by [`MatchPredicate::fmt`].
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match parts.as_slice() {
            ["ip", "src", cidr] => Ok(MatchPredicate::IpSource(Cidr::parse(cidr)?)),
            ["ip", "dst", cidr] => Ok(MatchPredicate::IpDestination(Cidr::parse(cidr)?)),
            ["ip", "sport", port, _mask] => Ok(MatchPredicate::PortSource(parse_port(port)?)),
            ["ip", "dport", port, _mask] => Ok(MatchPredicate::PortDestination(parse_port(port)?)),
            ["ip", "protocol", proto] => Ok(MatchPredicate::Protocol(parse_protocol(proto)?)),
            ["fw", "mark", mark] => Ok(MatchPredicate::FirewallMark(parse_mark(mark)?)),
            _ => Err(Error::InvalidFormat(format!("unrecognized match: {s}"))),
        }
    }
}

fn parse_port(s: &str) -> Result<u16> {
    s.parse()
        .map_err(|_| Error::InvalidFormat(format!("invalid port: {s}")))
}

fn parse_mark(s: &str) -> Result<u32> {
    if let Some(hex) = s.strip_prefix("0x") {
        u32::from_str_radix(hex, 16).map_err(|_| Error::InvalidFormat(format!("invalid mark: {s}")))
    } else {
        s.parse()
            .map_err(|_| Error::InvalidFormat(format!("invalid mark: {s}")))
    }
}

fn parse_protocol(s: &str) -> Result<ProtocolTag> {
    match s {
        "tcp" => Ok(ProtocolTag::Tcp),
        "udp" => Ok(ProtocolTag::Udp),
        "icmp" => Ok(ProtocolTag::Icmp),
        _ => Err(Error::InvalidFormat(format!("unknown protocol: {s}"))),
    }
}
