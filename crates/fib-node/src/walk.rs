//! Back walks: change notifications from a node to its dependents.

use crate::define_flags;
use crate::node::{FibNode, NodePtr};
use log::debug;

define_flags! {
    /// Why a back walk was started.
    pub struct BackWalkReason: u32 {
        /// A dependency was (re)resolved.
        const RESOLVE = 1 << 0, "resolve";
        /// Forwarding must be re-evaluated.
        const EVALUATE = 1 << 1, "evaluate";
        const INTERFACE_UP = 1 << 2, "if-up";
        const INTERFACE_DOWN = 1 << 3, "if-down";
        const INTERFACE_DELETE = 1 << 4, "if-delete";
        /// An adjacency's rewrite changed.
        const ADJ_UPDATE = 1 << 5, "adj-update";
        const ADJ_DOWN = 1 << 6, "adj-down";
    }
}

impl BackWalkReason {
    /// Reasons for which an entry re-activates its best source.
    pub const REACTIVATE: Self = Self::EVALUATE
        .union(Self::ADJ_UPDATE)
        .union(Self::ADJ_DOWN)
        .union(Self::INTERFACE_UP)
        .union(Self::INTERFACE_DOWN)
        .union(Self::INTERFACE_DELETE);
}

define_flags! {
    /// Modifiers of a back walk.
    pub struct BackWalkFlags: u8 {
        /// The walk must complete before the initiator continues.
        const FORCE_SYNC = 1 << 0, "sync";
    }
}

/// State carried down a back walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackWalkCtx {
    pub reason: BackWalkReason,
    pub flags: BackWalkFlags,
    /// Number of hops from the node that started the walk.
    pub depth: u32,
}

impl BackWalkCtx {
    pub fn new(reason: BackWalkReason) -> Self {
        Self {
            reason,
            flags: BackWalkFlags::NONE,
            depth: 0,
        }
    }

    pub fn with_flags(mut self, flags: BackWalkFlags) -> Self {
        self.flags = flags;
        self
    }

    /// The context as seen by the next level of children.
    pub fn descend(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..*self
        }
    }
}

/// Result of visiting one node during a back walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackWalkRc {
    Continue,
    /// The walk hit the depth limit and went no further.
    DepthExceeded,
}

/// A graph whose nodes can be walked by kind-tagged pointers.
pub trait NodeGraph {
    fn node(&self, ptr: NodePtr) -> Option<&FibNode>;

    /// Delivers a walk to one node, dispatching on `ptr.kind`.
    fn node_back_walk(&mut self, ptr: NodePtr, ctx: &BackWalkCtx) -> BackWalkRc;

    /// Deepest a walk may recurse.
    fn max_walk_depth(&self) -> u32;
}

/// Synchronously walks every child of `parent`.
///
/// Children are snapshotted first; a child removed by an earlier sibling's
/// walk fails its handle check and is skipped.
pub fn back_walk_sync<G: NodeGraph + ?Sized>(
    graph: &mut G,
    parent: NodePtr,
    ctx: &BackWalkCtx,
) -> BackWalkRc {
    let children: Vec<NodePtr> = match graph.node(parent) {
        Some(node) => node.children().collect(),
        None => return BackWalkRc::Continue,
    };
    if children.is_empty() {
        return BackWalkRc::Continue;
    }
    if ctx.depth >= graph.max_walk_depth() {
        debug!(
            "BackWalk: {} stopped at depth {} ({})",
            parent, ctx.depth, ctx.reason
        );
        return BackWalkRc::DepthExceeded;
    }

    let child_ctx = ctx.descend();
    let mut rc = BackWalkRc::Continue;
    for child in children {
        if graph.node(child).is_none() {
            continue;
        }
        if graph.node_back_walk(child, &child_ctx) == BackWalkRc::DepthExceeded {
            rc = BackWalkRc::DepthExceeded;
        }
    }
    rc
}
