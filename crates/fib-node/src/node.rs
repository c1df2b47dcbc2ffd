//! The dependency-graph node embedded in every FIB object that has
//! dependents.

use crate::pool::NodeIndex;
use crate::walk::{BackWalkCtx, BackWalkRc};
use log::{debug, error};
use std::fmt;

/// Kind of a graph node. Used to dispatch to the node's capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Entry,
    PathList,
    Adjacency,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Entry => write!(f, "entry"),
            NodeType::PathList => write!(f, "path-list"),
            NodeType::Adjacency => write!(f, "adj"),
        }
    }
}

/// A pointer to a node of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePtr {
    pub kind: NodeType,
    pub index: NodeIndex,
}

impl NodePtr {
    pub const fn new(kind: NodeType, index: NodeIndex) -> Self {
        Self { kind, index }
    }
}

impl fmt::Display for NodePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.index)
    }
}

/// Position of a child in its parent's child list. Stable until the child
/// is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SiblingIndex(u32);

impl SiblingIndex {
    pub const fn value(&self) -> u32 {
        self.0
    }
}

/// Lock count and dependents of a graph object.
#[derive(Debug, Clone)]
pub struct FibNode {
    kind: NodeType,
    locks: u32,
    children: Vec<Option<NodePtr>>,
    free_siblings: Vec<u32>,
}

impl FibNode {
    pub fn new(kind: NodeType) -> Self {
        Self {
            kind,
            locks: 0,
            children: Vec::new(),
            free_siblings: Vec::new(),
        }
    }

    pub fn kind(&self) -> NodeType {
        self.kind
    }

    pub fn locks(&self) -> u32 {
        self.locks
    }

    /// Takes a lock and returns the new count.
    pub fn lock(&mut self) -> u32 {
        self.locks += 1;
        self.locks
    }

    /// Releases a lock. Returns `None` if the node held none.
    pub fn unlock(&mut self) -> Option<u32> {
        self.locks = self.locks.checked_sub(1)?;
        Some(self.locks)
    }

    /// Registers a dependent. The returned sibling index is what the child
    /// hands back to [`FibNode::child_remove`].
    pub fn child_add(&mut self, child: NodePtr) -> SiblingIndex {
        if let Some(sibling) = self.free_siblings.pop() {
            self.children[sibling as usize] = Some(child);
            return SiblingIndex(sibling);
        }
        self.children.push(Some(child));
        SiblingIndex(self.children.len() as u32 - 1)
    }

    /// Removes a dependent. Returns `None` if the sibling slot was empty.
    pub fn child_remove(&mut self, sibling: SiblingIndex) -> Option<NodePtr> {
        let child = self.children.get_mut(sibling.0 as usize)?.take()?;
        self.free_siblings.push(sibling.0);
        Some(child)
    }

    /// Dependents in sibling order.
    pub fn children(&self) -> impl Iterator<Item = NodePtr> + '_ {
        self.children.iter().flatten().copied()
    }

    pub fn child_count(&self) -> usize {
        self.children.len() - self.free_siblings.len()
    }

    /// Drops every child link. Called when the object is finalized.
    pub fn deinit(&mut self) {
        if self.child_count() > 0 {
            debug!(
                "FibNode: {} deinit with {} children",
                self.kind,
                self.child_count()
            );
        }
        self.children.clear();
        self.free_siblings.clear();
    }
}

/// Memory accounting for one object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryUsage {
    pub name: &'static str,
    pub in_use: usize,
    pub allocated: usize,
    pub element_size: usize,
}

impl MemoryUsage {
    pub fn bytes(&self) -> usize {
        self.allocated * self.element_size
    }
}

impl fmt::Display for MemoryUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:>8} {:>10} {:>6} {:>10}",
            self.name,
            self.in_use,
            self.allocated,
            self.element_size,
            self.bytes()
        )
    }
}

/// Capabilities every graph node kind provides to a graph context `G`.
pub trait NodeVft<G: ?Sized> {
    const KIND: NodeType;

    fn get_node(graph: &G, index: NodeIndex) -> Option<&FibNode>;

    fn get_node_mut(graph: &mut G, index: NodeIndex) -> Option<&mut FibNode>;

    /// Finalizes the object once nothing holds a lock on it.
    fn last_lock_gone(graph: &mut G, index: NodeIndex);

    /// Reacts to a change in something this node depends on.
    fn back_walk(graph: &mut G, index: NodeIndex, ctx: &BackWalkCtx) -> BackWalkRc;

    fn memory_usage(graph: &G) -> MemoryUsage;
}

/// Takes a lock on a node. Returns the new lock count, or `None` for a
/// stale handle.
pub fn node_lock<G: ?Sized, V: NodeVft<G>>(graph: &mut G, index: NodeIndex) -> Option<u32> {
    V::get_node_mut(graph, index).map(|node| node.lock())
}

/// Releases a lock on a node, finalizing it when the last lock goes.
/// Returns `None` for a stale handle or a node that holds no lock.
pub fn node_unlock<G: ?Sized, V: NodeVft<G>>(graph: &mut G, index: NodeIndex) -> Option<u32> {
    let node = V::get_node_mut(graph, index)?;
    let Some(locks) = node.unlock() else {
        error!("FibNode: Unlock of unlocked {} {}", V::KIND, index);
        return None;
    };
    if locks == 0 {
        debug!("FibNode: {} {} last lock gone", V::KIND, index);
        V::last_lock_gone(graph, index);
    }
    Some(locks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Index, Pool};
    use pretty_assertions::assert_eq;

    struct Thing {
        node: FibNode,
    }

    struct Graph {
        things: Pool<Thing>,
        finalized: Vec<NodeIndex>,
    }

    struct ThingVft;

    impl NodeVft<Graph> for ThingVft {
        const KIND: NodeType = NodeType::PathList;

        fn get_node(graph: &Graph, index: NodeIndex) -> Option<&FibNode> {
            graph.things.get(Index::from_untyped(index)).map(|t| &t.node)
        }

        fn get_node_mut(graph: &mut Graph, index: NodeIndex) -> Option<&mut FibNode> {
            graph
                .things
                .get_mut(Index::from_untyped(index))
                .map(|t| &mut t.node)
        }

        fn last_lock_gone(graph: &mut Graph, index: NodeIndex) {
            graph.things.free(Index::from_untyped(index));
            graph.finalized.push(index);
        }

        fn back_walk(_graph: &mut Graph, _index: NodeIndex, _ctx: &BackWalkCtx) -> BackWalkRc {
            BackWalkRc::Continue
        }

        fn memory_usage(graph: &Graph) -> MemoryUsage {
            MemoryUsage {
                name: "thing",
                in_use: graph.things.len(),
                allocated: graph.things.allocated(),
                element_size: std::mem::size_of::<Thing>(),
            }
        }
    }

    fn ptr(slot: u32) -> NodePtr {
        let mut pool: Pool<()> = Pool::new("p", 64);
        let mut last = None;
        for _ in 0..=slot {
            last = Some(pool.alloc(()).unwrap());
        }
        NodePtr::new(NodeType::Entry, last.unwrap().untyped())
    }

    #[test]
    fn test_sibling_indexes_are_stable() {
        let mut node = FibNode::new(NodeType::Entry);
        let a = node.child_add(ptr(0));
        let b = node.child_add(ptr(1));
        let c = node.child_add(ptr(2));

        assert_eq!(node.child_remove(b), Some(ptr(1)));
        assert_eq!(node.child_remove(b), None);
        assert_eq!(node.children().collect::<Vec<_>>(), vec![ptr(0), ptr(2)]);

        let d = node.child_add(ptr(3));
        assert_eq!(d, b);
        assert_ne!(a, c);
        assert_eq!(node.child_count(), 3);

        node.deinit();
        assert_eq!(node.child_count(), 0);
    }

    #[test]
    fn test_unlock_to_zero_finalizes_once() {
        let mut graph = Graph {
            things: Pool::new("thing", 4),
            finalized: Vec::new(),
        };
        let thing = graph
            .things
            .alloc(Thing {
                node: FibNode::new(NodeType::PathList),
            })
            .unwrap()
            .untyped();

        assert_eq!(node_lock::<_, ThingVft>(&mut graph, thing), Some(1));
        assert_eq!(node_lock::<_, ThingVft>(&mut graph, thing), Some(2));
        assert_eq!(node_unlock::<_, ThingVft>(&mut graph, thing), Some(1));
        assert!(graph.finalized.is_empty());
        assert_eq!(node_unlock::<_, ThingVft>(&mut graph, thing), Some(0));
        assert_eq!(graph.finalized, vec![thing]);

        assert_eq!(node_unlock::<_, ThingVft>(&mut graph, thing), None);
        assert_eq!(ThingVft::memory_usage(&graph).in_use, 0);
        assert!(ThingVft::get_node(&graph, thing).is_none());
    }
}
