//! Value types shared by the FIB crates.
//!
//! This crate provides the address and prefix types that identify a
//! forwarding-table entry:
//!
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: IP network prefixes (CIDR notation, host bits masked)
//! - [`MplsLabel`] / [`MplsEos`]: MPLS local labels and their stack position
//! - [`FibPrefix`]: the key of a FIB entry (IP prefix or MPLS label)
//! - [`FibProtocol`] / [`DpoProto`]: table protocol and payload protocol tags
//! - [`InterfaceIndex`]: software interface index

mod interface;
mod ip;
mod mpls;
mod prefix;

pub use interface::InterfaceIndex;
pub use ip::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use mpls::{MplsEos, MplsLabel};
pub use prefix::{DpoProto, FibPrefix, FibProtocol};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid MPLS label: {0} (must be 0-1048575)")]
    InvalidMplsLabel(u32),

    #[error("invalid FIB prefix format: {0}")]
    InvalidFibPrefix(String),

    #[error("invalid protocol: {0}")]
    InvalidProtocol(String),
}
