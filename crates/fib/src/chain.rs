//! Forwarding chain types.

use fib_types::{DpoProto, FibPrefix, MplsEos};
use std::fmt;

/// The kind of forwarding chain a child asks an entry for.
///
/// An entry caches one load-balance per chain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainType {
    UnicastIp4,
    UnicastIp6,
    /// Packets whose last label is popped here.
    MplsEos,
    /// Packets that still carry labels after this one.
    MplsNonEos,
}

impl ChainType {
    pub const COUNT: usize = 4;

    pub const ALL: [ChainType; Self::COUNT] = [
        ChainType::UnicastIp4,
        ChainType::UnicastIp6,
        ChainType::MplsEos,
        ChainType::MplsNonEos,
    ];

    /// Slot of this chain in an entry's forwarding cache.
    pub const fn index(self) -> usize {
        match self {
            ChainType::UnicastIp4 => 0,
            ChainType::UnicastIp6 => 1,
            ChainType::MplsEos => 2,
            ChainType::MplsNonEos => 3,
        }
    }

    /// Chain that forwards packets of protocol `proto`. Ethernet payloads
    /// have no unicast chain and stay on the EOS chain.
    pub const fn from_dpo_proto(proto: DpoProto) -> Self {
        match proto {
            DpoProto::Ip4 => ChainType::UnicastIp4,
            DpoProto::Ip6 => ChainType::UnicastIp6,
            DpoProto::Mpls => ChainType::MplsNonEos,
            DpoProto::Ethernet => ChainType::MplsEos,
        }
    }

    /// Protocol of the load-balance built for this chain.
    pub const fn dpo_proto(self) -> DpoProto {
        match self {
            ChainType::UnicastIp4 => DpoProto::Ip4,
            ChainType::UnicastIp6 => DpoProto::Ip6,
            ChainType::MplsEos | ChainType::MplsNonEos => DpoProto::Mpls,
        }
    }

    /// The chain an entry for `prefix` forwards on by default.
    pub fn default_for(prefix: &FibPrefix) -> Self {
        match prefix {
            FibPrefix::Ip(p) if p.is_ipv4() => ChainType::UnicastIp4,
            FibPrefix::Ip(_) => ChainType::UnicastIp6,
            FibPrefix::Mpls {
                eos: MplsEos::Eos,
                payload,
                ..
            } => Self::from_dpo_proto(*payload),
            FibPrefix::Mpls {
                eos: MplsEos::NonEos,
                ..
            } => ChainType::MplsNonEos,
        }
    }

    /// The chain a request for `self` on `prefix` is really served from.
    ///
    /// Nobody can build an EOS chain without knowing what is under the
    /// label, so an EOS request gets the entry's default chain, which for
    /// an EOS label entry is the chain of its payload.
    pub fn fixup(self, prefix: &FibPrefix) -> Self {
        match self {
            ChainType::MplsEos => Self::default_for(prefix),
            other => other,
        }
    }
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainType::UnicastIp4 => write!(f, "unicast-ip4"),
            ChainType::UnicastIp6 => write!(f, "unicast-ip6"),
            ChainType::MplsEos => write!(f, "mpls-eos"),
            ChainType::MplsNonEos => write!(f, "mpls-neos"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fib_types::MplsLabel;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_chain() {
        let v4: FibPrefix = "10.0.0.0/8".parse().unwrap();
        let v6: FibPrefix = "2001:db8::/32".parse().unwrap();
        let label = MplsLabel::new(100).unwrap();

        assert_eq!(ChainType::default_for(&v4), ChainType::UnicastIp4);
        assert_eq!(ChainType::default_for(&v6), ChainType::UnicastIp6);
        assert_eq!(
            ChainType::default_for(&FibPrefix::mpls_eos(label, DpoProto::Ip6)),
            ChainType::UnicastIp6
        );
        assert_eq!(
            ChainType::default_for(&FibPrefix::mpls_non_eos(label)),
            ChainType::MplsNonEos
        );
    }

    #[test]
    fn test_eos_fixup() {
        let label = MplsLabel::new(16).unwrap();
        let eos = FibPrefix::mpls_eos(label, DpoProto::Ip4);
        let v6: FibPrefix = "2001:db8::1/128".parse().unwrap();

        assert_eq!(ChainType::MplsEos.fixup(&eos), ChainType::UnicastIp4);
        assert_eq!(ChainType::MplsEos.fixup(&v6), ChainType::UnicastIp6);
        assert_eq!(ChainType::MplsNonEos.fixup(&eos), ChainType::MplsNonEos);
        assert_eq!(ChainType::UnicastIp6.fixup(&eos), ChainType::UnicastIp6);
    }

    #[test]
    fn test_slots_are_dense() {
        let slots: Vec<usize> = ChainType::ALL.iter().map(|c| c.index()).collect();
        assert_eq!(slots, vec![0, 1, 2, 3]);
        assert_eq!(ChainType::MplsNonEos.to_string(), "mpls-neos");
    }
}
