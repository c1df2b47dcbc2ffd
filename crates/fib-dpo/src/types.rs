//! Type-safe forwarding object ids and the DPO value.
//!
//! A data-path object (DPO) is what a FIB entry contributes to the packets
//! it forwards: drop them, punt them to the host, send them to an adjacency,
//! or spread them over a load-balance. Object ids are typed so a
//! load-balance id can never be handed to something expecting an adjacency.

use fib_types::{DpoProto, MplsLabel};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Raw hardware object id.
pub type RawObjectId = u64;

/// Marker trait for forwarding object kinds.
pub trait DpoObjectKind: Send + Sync + 'static {
    /// Name used when formatting ids of this kind.
    fn type_name() -> &'static str;
}

/// A typed forwarding object id.
///
/// ```
/// use fib_dpo::{AdjacencyId, LoadBalanceId};
///
/// let lb = LoadBalanceId::from_raw(3);
/// let adj = AdjacencyId::from_raw(3);
/// assert_eq!(lb.as_raw(), adj.as_raw());
/// // fn takes_lb(_: LoadBalanceId) {}
/// // takes_lb(adj); // Error: expected LoadBalanceId, found AdjacencyId
/// ```
#[derive(Clone, Copy)]
pub struct DpoObjectId<T: DpoObjectKind> {
    raw: RawObjectId,
    _marker: PhantomData<T>,
}

impl<T: DpoObjectKind> DpoObjectId<T> {
    pub const fn from_raw(raw: RawObjectId) -> Self {
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub const fn as_raw(&self) -> RawObjectId {
        self.raw
    }
}

impl<T: DpoObjectKind> fmt::Debug for DpoObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", T::type_name(), self.raw)
    }
}

impl<T: DpoObjectKind> fmt::Display for DpoObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl<T: DpoObjectKind> PartialEq for DpoObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T: DpoObjectKind> Eq for DpoObjectId<T> {}

impl<T: DpoObjectKind> Hash for DpoObjectId<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

macro_rules! define_object_kind {
    ($name:ident, $type_name:literal, $id_alias:ident) => {
        #[doc = concat!("Marker type for ", $type_name, " objects.")]
        #[derive(Debug, Clone, Copy)]
        pub struct $name;

        impl DpoObjectKind for $name {
            fn type_name() -> &'static str {
                $type_name
            }
        }

        #[doc = concat!("Id of a ", $type_name, " object.")]
        pub type $id_alias = DpoObjectId<$name>;
    };
}

define_object_kind!(LoadBalanceKind, "load-balance", LoadBalanceId);
define_object_kind!(AdjacencyKind, "adjacency", AdjacencyId);

/// A data-path object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dpo {
    /// Discard.
    Drop(DpoProto),
    /// Deliver to the local host.
    Receive(DpoProto),
    Adjacency { proto: DpoProto, id: AdjacencyId },
    LoadBalance { proto: DpoProto, id: LoadBalanceId },
}

impl Dpo {
    pub fn proto(&self) -> DpoProto {
        match self {
            Dpo::Drop(proto) | Dpo::Receive(proto) => *proto,
            Dpo::Adjacency { proto, .. } | Dpo::LoadBalance { proto, .. } => *proto,
        }
    }

    pub fn is_drop(&self) -> bool {
        matches!(self, Dpo::Drop(_))
    }

    /// The load-balance this object refers to, if any.
    pub fn load_balance(&self) -> Option<LoadBalanceId> {
        match self {
            Dpo::LoadBalance { id, .. } => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Dpo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dpo::Drop(proto) => write!(f, "dpo-drop {}", proto),
            Dpo::Receive(proto) => write!(f, "dpo-receive {}", proto),
            Dpo::Adjacency { proto, id } => write!(f, "{}-adjacency:[@{}]", proto, id),
            Dpo::LoadBalance { proto, id } => write!(f, "{}-load-balance:[@{}]", proto, id),
        }
    }
}

/// One bucket of a load-balance: where to send the packet, with which
/// weight, after pushing which labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LbBucket {
    pub dpo: Dpo,
    pub weight: u32,
    pub labels: Vec<MplsLabel>,
}

impl LbBucket {
    pub fn new(dpo: Dpo, weight: u32) -> Self {
        Self {
            dpo,
            weight,
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<MplsLabel>) -> Self {
        self.labels = labels;
        self
    }
}

impl fmt::Display for LbBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} weight:{}", self.dpo, self.weight)?;
        if !self.labels.is_empty() {
            write!(f, " labels:[")?;
            for (i, label) in self.labels.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", label)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}
