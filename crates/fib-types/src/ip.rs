//! IP address and prefix types with safe parsing.
//!
//! Prefixes are stored with their host bits cleared so that two spellings of
//! the same network (`10.0.0.1/24` and `10.0.0.0/24`) index the same entry.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// An IPv4 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv4Address(Ipv4Addr);

impl Ipv4Address {
    pub const UNSPECIFIED: Self = Ipv4Address(Ipv4Addr::UNSPECIFIED);

    pub const fn new(a: u8, b: u8, c: u8, d: u8) -> Self {
        Ipv4Address(Ipv4Addr::new(a, b, c, d))
    }

    pub const fn inner(&self) -> Ipv4Addr {
        self.0
    }

    pub const fn octets(&self) -> [u8; 4] {
        self.0.octets()
    }

    /// Returns the address as a host-order integer.
    pub fn to_bits(&self) -> u32 {
        u32::from(self.0)
    }

    fn masked(&self, len: u8) -> Self {
        let mask = if len == 0 { 0 } else { u32::MAX << (32 - u32::from(len)) };
        Ipv4Address(Ipv4Addr::from(self.to_bits() & mask))
    }
}

impl fmt::Display for Ipv4Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv4Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv4Addr>()
            .map(Ipv4Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv4Addr> for Ipv4Address {
    fn from(addr: Ipv4Addr) -> Self {
        Ipv4Address(addr)
    }
}

/// An IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ipv6Address(Ipv6Addr);

impl Ipv6Address {
    pub const UNSPECIFIED: Self = Ipv6Address(Ipv6Addr::UNSPECIFIED);

    pub const fn inner(&self) -> Ipv6Addr {
        self.0
    }

    pub const fn segments(&self) -> [u16; 8] {
        self.0.segments()
    }

    /// Returns the address as a host-order integer.
    pub fn to_bits(&self) -> u128 {
        u128::from(self.0)
    }

    fn masked(&self, len: u8) -> Self {
        let mask = if len == 0 { 0 } else { u128::MAX << (128 - u32::from(len)) };
        Ipv6Address(Ipv6Addr::from(self.to_bits() & mask))
    }
}

impl fmt::Display for Ipv6Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Ipv6Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<Ipv6Addr>()
            .map(Ipv6Address)
            .map_err(|_| ParseError::InvalidIpAddress(s.to_string()))
    }
}

impl From<Ipv6Addr> for Ipv6Address {
    fn from(addr: Ipv6Addr) -> Self {
        Ipv6Address(addr)
    }
}

/// An IP address that can be either IPv4 or IPv6.
///
/// Ordering places every IPv4 address before every IPv6 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IpAddress {
    V4(Ipv4Address),
    V6(Ipv6Address),
}

impl IpAddress {
    /// Returns true if this is an IPv4 address.
    pub const fn is_ipv4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    /// Returns true if this is an IPv6 address.
    pub const fn is_ipv6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Maximum prefix length for this address family.
    pub const fn max_prefix_len(&self) -> u8 {
        match self {
            IpAddress::V4(_) => 32,
            IpAddress::V6(_) => 128,
        }
    }

    fn masked(&self, len: u8) -> Self {
        match self {
            IpAddress::V4(a) => IpAddress::V4(a.masked(len)),
            IpAddress::V6(a) => IpAddress::V6(a.masked(len)),
        }
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(addr) => addr.fmt(f),
            IpAddress::V6(addr) => addr.fmt(f),
        }
    }
}

impl FromStr for IpAddress {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.contains(':') {
            s.parse::<Ipv6Address>().map(IpAddress::V6)
        } else {
            s.parse::<Ipv4Address>().map(IpAddress::V4)
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(Ipv4Address(addr))
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(Ipv6Address(addr))
    }
}

/// An IP prefix in CIDR notation (e.g., 10.0.0.0/24 or 2001:db8::/32).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpPrefix {
    address: IpAddress,
    prefix_len: u8,
}

impl IpPrefix {
    /// Creates a new IP prefix, clearing any host bits.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix length is invalid for the address type
    /// (>32 for IPv4, >128 for IPv6).
    pub fn new(address: IpAddress, prefix_len: u8) -> Result<Self, ParseError> {
        let max_len = address.max_prefix_len();
        if prefix_len > max_len {
            return Err(ParseError::InvalidIpPrefix(format!(
                "prefix length {} exceeds maximum {} for address type",
                prefix_len, max_len
            )));
        }

        Ok(IpPrefix {
            address: address.masked(prefix_len),
            prefix_len,
        })
    }

    /// Creates the host prefix (/32 or /128) for an address.
    pub fn host(address: IpAddress) -> Self {
        IpPrefix {
            address,
            prefix_len: address.max_prefix_len(),
        }
    }

    /// Returns the network address of this prefix.
    pub const fn address(&self) -> &IpAddress {
        &self.address
    }

    /// Returns the prefix length in bits.
    pub const fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Returns true if this is an IPv4 prefix.
    pub const fn is_ipv4(&self) -> bool {
        self.address.is_ipv4()
    }

    /// Returns true if this is an IPv6 prefix.
    pub const fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }

    /// Returns true if this is a host route (/32 for IPv4, /128 for IPv6).
    pub const fn is_host_route(&self) -> bool {
        self.prefix_len == self.address.max_prefix_len()
    }

    /// Returns true if this is the default route (0.0.0.0/0 or ::/0).
    pub fn is_default(&self) -> bool {
        self.prefix_len == 0
    }

    /// Returns this prefix shortened to `len` bits, or `None` if `len` is
    /// longer than the current length.
    pub fn truncate(&self, len: u8) -> Option<Self> {
        if len > self.prefix_len {
            return None;
        }
        Some(IpPrefix {
            address: self.address.masked(len),
            prefix_len: len,
        })
    }

    /// Returns true if `other` lies within this prefix (equal prefixes
    /// contain each other). Prefixes of different families never do.
    pub fn contains(&self, other: &IpPrefix) -> bool {
        if self.is_ipv4() != other.is_ipv4() || self.prefix_len > other.prefix_len {
            return false;
        }
        other.address.masked(self.prefix_len) == self.address
    }
}

impl PartialOrd for IpPrefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IpPrefix {
    /// Address first, then length.
    fn cmp(&self, other: &Self) -> Ordering {
        self.address
            .cmp(&other.address)
            .then(self.prefix_len.cmp(&other.prefix_len))
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix_len)
    }
}

impl FromStr for IpPrefix {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr_str, len_str) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseError::InvalidIpPrefix(s.to_string()))?;

        let address: IpAddress = addr_str.parse()?;
        let prefix_len: u8 = len_str
            .parse()
            .map_err(|_| ParseError::InvalidIpPrefix(s.to_string()))?;

        IpPrefix::new(address, prefix_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ip_prefix_parse() {
        let prefix: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert!(prefix.is_ipv4());
        assert_eq!(prefix.prefix_len(), 24);

        let v6_prefix: IpPrefix = "2001:db8::/32".parse().unwrap();
        assert!(v6_prefix.is_ipv6());
        assert_eq!(v6_prefix.prefix_len(), 32);
    }

    #[test]
    fn test_host_bits_are_masked() {
        let prefix: IpPrefix = "10.1.2.3/16".parse().unwrap();
        assert_eq!(prefix.to_string(), "10.1.0.0/16");

        let v6: IpPrefix = "2001:db8::1/64".parse().unwrap();
        assert_eq!(v6.to_string(), "2001:db8::/64");
    }

    #[test]
    fn test_host_route() {
        let addr: IpAddress = "10.0.0.1".parse().unwrap();
        let host = IpPrefix::host(addr);
        assert!(host.is_host_route());
        assert_eq!(host.to_string(), "10.0.0.1/32");

        let network: IpPrefix = "10.0.0.0/24".parse().unwrap();
        assert!(!network.is_host_route());
    }

    #[test]
    fn test_contains() {
        let net: IpPrefix = "10.0.0.0/8".parse().unwrap();
        let sub: IpPrefix = "10.1.0.0/16".parse().unwrap();
        let other: IpPrefix = "11.0.0.0/16".parse().unwrap();
        let default: IpPrefix = "0.0.0.0/0".parse().unwrap();
        let v6_default: IpPrefix = "::/0".parse().unwrap();

        assert!(net.contains(&sub));
        assert!(net.contains(&net));
        assert!(!sub.contains(&net));
        assert!(!net.contains(&other));
        assert!(default.contains(&other));
        assert!(!v6_default.contains(&other));
    }

    #[test]
    fn test_truncate() {
        let host: IpPrefix = "10.1.2.3/32".parse().unwrap();
        assert_eq!(host.truncate(24).unwrap().to_string(), "10.1.2.0/24");
        assert_eq!(host.truncate(0).unwrap().to_string(), "0.0.0.0/0");

        let net: IpPrefix = "10.0.0.0/8".parse().unwrap();
        assert!(net.truncate(16).is_none());
    }

    #[test]
    fn test_ordering_address_then_length() {
        let a: IpPrefix = "10.0.0.0/8".parse().unwrap();
        let b: IpPrefix = "10.0.0.0/24".parse().unwrap();
        let c: IpPrefix = "9.0.0.0/24".parse().unwrap();

        let mut v = vec![b, a, c];
        v.sort();
        assert_eq!(v, vec![c, a, b]);
    }

    #[test]
    fn test_invalid_prefix_length() {
        assert!("10.0.0.0/33".parse::<IpPrefix>().is_err());
        assert!("2001:db8::/129".parse::<IpPrefix>().is_err());
        assert!("10.0.0.0".parse::<IpPrefix>().is_err());
    }
}
