//! Object storage and dependency-graph plumbing for the FIB.
//!
//! Every FIB object (entry, path-list, adjacency, load-balance) lives in a
//! [`Pool`] and is named by a generational [`Index`], so a handle to a freed
//! object is detected instead of silently aliasing whatever reused the slot.
//!
//! Objects that others depend on embed a [`FibNode`]: a lock count plus the
//! list of dependent children. When a parent changes it back-walks its
//! children with a [`BackWalkCtx`]:
//!
//! ```text
//!   adjacency ──> path-list ──> entry ──> path-list ──> entry
//!    (parent)      (child)
//! ```
//!
//! - [`Pool`] / [`Index`]: arena with stable generational handles
//! - [`SyncMap`]: keyed index that never auto-creates entries
//! - [`FibNode`] / [`NodePtr`]: graph node and typed child pointer
//! - [`NodeVft`] / [`NodeGraph`]: per-kind capabilities and walk dispatch
//! - [`define_flags!`]: bitset types used for flags and walk reasons

mod flags;
mod node;
mod pool;
mod sync_map;
mod walk;

pub use node::{
    node_lock, node_unlock, FibNode, MemoryUsage, NodePtr, NodeType, NodeVft, SiblingIndex,
};
pub use pool::{Index, NodeIndex, Pool, PoolError};
pub use sync_map::SyncMap;
pub use walk::{back_walk_sync, BackWalkCtx, BackWalkFlags, BackWalkRc, BackWalkReason, NodeGraph};
