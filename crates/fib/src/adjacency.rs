//! Adjacencies: the attached next hops paths resolve through.
//!
//! Building the rewrite is the hardware manager's business; the FIB only
//! tracks which adjacencies exist, whether their interface is up, and who
//! depends on them.

use crate::error::Result;
use crate::fib::Fib;
use fib_dpo::AdjacencyId;
use fib_node::{
    back_walk_sync, BackWalkCtx, BackWalkFlags, BackWalkRc, BackWalkReason, FibNode, Index,
    MemoryUsage, NodeIndex, NodePtr, NodeType, NodeVft,
};
use fib_types::{DpoProto, InterfaceIndex, IpAddress};
use log::{debug, info};
use std::fmt;

pub type AdjIndex = Index<Adjacency>;

/// What an adjacency is shared by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AdjacencyKey {
    pub proto: DpoProto,
    pub interface: InterfaceIndex,
    /// `None` for a glean adjacency covering the whole subnet.
    pub next_hop: Option<IpAddress>,
}

impl fmt::Display for AdjacencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.next_hop {
            Some(nh) => write!(f, "{} via {} {}", self.proto, nh, self.interface),
            None => write!(f, "{} glean {}", self.proto, self.interface),
        }
    }
}

#[derive(Debug)]
pub struct Adjacency {
    pub(crate) node: FibNode,
    id: AdjacencyId,
    key: AdjacencyKey,
    up: bool,
}

impl Adjacency {
    pub fn id(&self) -> AdjacencyId {
        self.id
    }

    pub fn key(&self) -> &AdjacencyKey {
        &self.key
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn locks(&self) -> u32 {
        self.node.locks()
    }
}

pub(crate) struct AdjacencyVft;

impl NodeVft<Fib> for AdjacencyVft {
    const KIND: NodeType = NodeType::Adjacency;

    fn get_node(fib: &Fib, index: NodeIndex) -> Option<&FibNode> {
        fib.adjacencies.get(Index::from_untyped(index)).map(|a| &a.node)
    }

    fn get_node_mut(fib: &mut Fib, index: NodeIndex) -> Option<&mut FibNode> {
        fib.adjacencies
            .get_mut(Index::from_untyped(index))
            .map(|a| &mut a.node)
    }

    fn last_lock_gone(fib: &mut Fib, index: NodeIndex) {
        let adj: AdjIndex = Index::from_untyped(index);
        if let Some(mut gone) = fib.adjacencies.free(adj) {
            debug!("Adjacency: Deleted {} [{}]", gone.key, adj);
            gone.node.deinit();
            fib.adjacency_db.remove(&gone.key);
        }
    }

    fn back_walk(fib: &mut Fib, index: NodeIndex, ctx: &BackWalkCtx) -> BackWalkRc {
        back_walk_sync(fib, NodePtr::new(NodeType::Adjacency, index), ctx)
    }

    fn memory_usage(fib: &Fib) -> MemoryUsage {
        MemoryUsage {
            name: "Adjacency",
            in_use: fib.adjacencies.len(),
            allocated: fib.adjacencies.allocated(),
            element_size: std::mem::size_of::<Adjacency>(),
        }
    }
}

impl Fib {
    /// Returns the adjacency for `key`, creating it if needed. A new
    /// adjacency is unlocked; the path that links to it takes the lock.
    pub(crate) fn adj_find_or_create(&mut self, key: AdjacencyKey) -> Result<AdjIndex> {
        if let Some(adj) = self.adjacency_db.get(&key) {
            return Ok(*adj);
        }
        let id = AdjacencyId::from_raw(self.next_object_id());
        let up = self.interface_is_up(key.interface);
        let adj = self.adjacencies.alloc(Adjacency {
            node: FibNode::new(NodeType::Adjacency),
            id,
            key,
            up,
        })?;
        self.adjacency_db.insert(key, adj);
        debug!("Adjacency: Created {} [{}] {}", key, adj, id);
        Ok(adj)
    }

    pub fn adjacency(&self, adj: AdjIndex) -> Option<&Adjacency> {
        self.adjacencies.get(adj)
    }

    pub fn adjacency_find(&self, key: &AdjacencyKey) -> Option<AdjIndex> {
        self.adjacency_db.get(key).copied()
    }

    /// Interfaces are up until told otherwise.
    pub(crate) fn interface_is_up(&self, interface: InterfaceIndex) -> bool {
        self.interface_state.get(&interface).copied().unwrap_or(true)
    }

    /// Records an interface's admin state and re-resolves everything that
    /// forwards through its adjacencies.
    pub fn interface_state_change(&mut self, interface: InterfaceIndex, up: bool) {
        if self.interface_is_up(interface) == up {
            self.interface_state.insert(interface, up);
            return;
        }
        info!(
            "Fib: Interface {} {}",
            interface,
            if up { "up" } else { "down" }
        );
        self.interface_state.insert(interface, up);
        let reason = if up {
            BackWalkReason::INTERFACE_UP
        } else {
            BackWalkReason::INTERFACE_DOWN
        };
        self.adj_walk_interface(interface, up, reason);
    }

    /// Forgets an interface: its adjacencies go down and its table
    /// bindings are dropped. The interface stays down until it is brought
    /// up again.
    pub fn interface_delete(&mut self, interface: InterfaceIndex) {
        info!("Fib: Interface {} deleted", interface);
        self.interface_state.insert(interface, false);
        self.interface_tables.retain(|(_, itf), _| *itf != interface);
        self.adj_walk_interface(interface, false, BackWalkReason::INTERFACE_DELETE);
    }

    fn adj_walk_interface(&mut self, interface: InterfaceIndex, up: bool, reason: BackWalkReason) {
        let adjs: Vec<AdjIndex> = self
            .adjacencies
            .iter()
            .filter(|(_, adj)| adj.key.interface == interface)
            .map(|(index, _)| index)
            .collect();
        let ctx = BackWalkCtx::new(reason).with_flags(BackWalkFlags::FORCE_SYNC);
        for adj in adjs {
            if let Some(adjacency) = self.adjacencies.get_mut(adj) {
                adjacency.up = up;
            }
            back_walk_sync(self, NodePtr::new(NodeType::Adjacency, adj.untyped()), &ctx);
        }
    }
}
