//! FIB prefix: the key of a forwarding-table entry.

use crate::{IpAddress, IpPrefix, MplsEos, MplsLabel, ParseError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Protocol of a forwarding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FibProtocol {
    Ip4,
    Ip6,
    Mpls,
}

impl FibProtocol {
    /// The payload protocol of packets forwarded by a table of this protocol.
    pub const fn to_dpo_proto(self) -> DpoProto {
        match self {
            FibProtocol::Ip4 => DpoProto::Ip4,
            FibProtocol::Ip6 => DpoProto::Ip6,
            FibProtocol::Mpls => DpoProto::Mpls,
        }
    }
}

impl fmt::Display for FibProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FibProtocol::Ip4 => write!(f, "ipv4"),
            FibProtocol::Ip6 => write!(f, "ipv6"),
            FibProtocol::Mpls => write!(f, "mpls"),
        }
    }
}

/// Protocol of the packets a forwarding object handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DpoProto {
    Ip4,
    Ip6,
    Mpls,
    Ethernet,
}

impl fmt::Display for DpoProto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DpoProto::Ip4 => write!(f, "ip4"),
            DpoProto::Ip6 => write!(f, "ip6"),
            DpoProto::Mpls => write!(f, "mpls"),
            DpoProto::Ethernet => write!(f, "ethernet"),
        }
    }
}

impl FromStr for DpoProto {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ip4" | "ipv4" => Ok(DpoProto::Ip4),
            "ip6" | "ipv6" => Ok(DpoProto::Ip6),
            "mpls" => Ok(DpoProto::Mpls),
            "ethernet" => Ok(DpoProto::Ethernet),
            _ => Err(ParseError::InvalidProtocol(s.to_string())),
        }
    }
}

/// The key of a FIB entry.
///
/// MPLS entries carry the payload protocol the packet has once the label is
/// popped, which is what an end-of-stack label entry forwards as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FibPrefix {
    Ip(IpPrefix),
    Mpls {
        label: MplsLabel,
        eos: MplsEos,
        payload: DpoProto,
    },
}

impl FibPrefix {
    /// Length reported for MPLS entries (a label is 20 bits plus the EOS bit).
    pub const MPLS_LEN: u8 = 21;

    /// An end-of-stack label entry whose payload is `payload`.
    pub fn mpls_eos(label: MplsLabel, payload: DpoProto) -> Self {
        FibPrefix::Mpls {
            label,
            eos: MplsEos::Eos,
            payload,
        }
    }

    /// A non-end-of-stack label entry.
    pub fn mpls_non_eos(label: MplsLabel) -> Self {
        FibPrefix::Mpls {
            label,
            eos: MplsEos::NonEos,
            payload: DpoProto::Mpls,
        }
    }

    /// The host prefix for an address.
    pub fn host(address: IpAddress) -> Self {
        FibPrefix::Ip(IpPrefix::host(address))
    }

    pub fn proto(&self) -> FibProtocol {
        match self {
            FibPrefix::Ip(p) if p.is_ipv4() => FibProtocol::Ip4,
            FibPrefix::Ip(_) => FibProtocol::Ip6,
            FibPrefix::Mpls { .. } => FibProtocol::Mpls,
        }
    }

    pub fn prefix_len(&self) -> u8 {
        match self {
            FibPrefix::Ip(p) => p.prefix_len(),
            FibPrefix::Mpls { .. } => Self::MPLS_LEN,
        }
    }

    /// Payload protocol: the address family for IP, the stashed payload for MPLS.
    pub fn payload_proto(&self) -> DpoProto {
        match self {
            FibPrefix::Ip(_) => self.proto().to_dpo_proto(),
            FibPrefix::Mpls { payload, .. } => *payload,
        }
    }

    pub fn as_ip(&self) -> Option<&IpPrefix> {
        match self {
            FibPrefix::Ip(p) => Some(p),
            FibPrefix::Mpls { .. } => None,
        }
    }

    pub fn is_mpls(&self) -> bool {
        matches!(self, FibPrefix::Mpls { .. })
    }

    /// True for an IP host route.
    pub fn is_host(&self) -> bool {
        self.as_ip().is_some_and(IpPrefix::is_host_route)
    }

    /// True if `other` is equal to or more specific than this prefix.
    /// MPLS prefixes only contain themselves.
    pub fn contains(&self, other: &FibPrefix) -> bool {
        match (self, other) {
            (FibPrefix::Ip(a), FibPrefix::Ip(b)) => a.contains(b),
            _ => self == other,
        }
    }

    /// This prefix shortened to `len` bits; `None` for MPLS or a longer `len`.
    pub fn truncate(&self, len: u8) -> Option<FibPrefix> {
        self.as_ip().and_then(|p| p.truncate(len)).map(FibPrefix::Ip)
    }
}

impl From<IpPrefix> for FibPrefix {
    fn from(prefix: IpPrefix) -> Self {
        FibPrefix::Ip(prefix)
    }
}

impl PartialOrd for FibPrefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FibPrefix {
    /// Addresses first (then length); labels by value, then EOS bit.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (FibPrefix::Ip(a), FibPrefix::Ip(b)) => a.cmp(b),
            (FibPrefix::Ip(_), FibPrefix::Mpls { .. }) => Ordering::Less,
            (FibPrefix::Mpls { .. }, FibPrefix::Ip(_)) => Ordering::Greater,
            (
                FibPrefix::Mpls {
                    label: la,
                    eos: ea,
                    payload: pa,
                },
                FibPrefix::Mpls {
                    label: lb,
                    eos: eb,
                    payload: pb,
                },
            ) => la.cmp(lb).then(ea.cmp(eb)).then(pa.cmp(pb)),
        }
    }
}

impl fmt::Display for FibPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FibPrefix::Ip(p) => p.fmt(f),
            FibPrefix::Mpls { label, eos, .. } => write!(f, "{}:{}", label, eos),
        }
    }
}

impl FromStr for FibPrefix {
    type Err = ParseError;

    /// Parses `a.b.c.d/len`, `x::/len`, or `label:eos|neos[:payload]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains('/') {
            return s.parse::<IpPrefix>().map(FibPrefix::Ip);
        }

        let mut parts = s.split(':');
        let label: MplsLabel = parts
            .next()
            .ok_or_else(|| ParseError::InvalidFibPrefix(s.to_string()))?
            .parse()?;
        let eos: MplsEos = parts
            .next()
            .ok_or_else(|| ParseError::InvalidFibPrefix(s.to_string()))?
            .parse()?;
        let payload = match (eos, parts.next()) {
            (MplsEos::Eos, Some(p)) => p.parse()?,
            (MplsEos::Eos, None) => DpoProto::Ip4,
            (MplsEos::NonEos, _) => DpoProto::Mpls,
        };
        if parts.next().is_some() {
            return Err(ParseError::InvalidFibPrefix(s.to_string()));
        }

        Ok(FibPrefix::Mpls {
            label,
            eos,
            payload,
        })
    }
}
