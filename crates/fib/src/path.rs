//! Route paths and the shared path-lists built from them.
//!
//! A path-list is identified by its set of paths; every source that
//! configures the same set shares one path-list. Paths are resolved when
//! the path-list is created: an attached path links to its adjacency, a
//! recursive path links to the entry for its next hop, creating a
//! recursive-resolution placeholder entry if there is none.

use crate::adjacency::{AdjIndex, AdjacencyKey, AdjacencyVft};
use crate::chain::ChainType;
use crate::entry::{EntryIndex, EntryVft};
use crate::error::{FibError, Result};
use crate::fib::{Fib, FibEvent};
use crate::source::{EntryFlags, SourceKind};
use fib_dpo::{Dpo, LbBucket};
use fib_node::{
    back_walk_sync, node_lock, node_unlock, BackWalkCtx, BackWalkRc, FibNode, Index, MemoryUsage,
    NodeIndex, NodePtr, NodeType, NodeVft, SiblingIndex,
};
use fib_types::{DpoProto, FibPrefix, InterfaceIndex, IpAddress, MplsLabel};
use log::{debug, warn};
use std::fmt;

pub type PathListIndex = Index<PathList>;

/// Where a path forwards to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NextHop {
    /// Out of an interface, to a neighbour or (without an address) to
    /// the whole attached subnet.
    Attached {
        interface: InterfaceIndex,
        address: Option<IpAddress>,
    },
    /// Through whatever the entry for `via` in `table_id` forwards to.
    Recursive { via: FibPrefix, table_id: u32 },
}

/// The identity of a path. Out-labels are not part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey {
    pub proto: DpoProto,
    pub next_hop: NextHop,
    pub weight: u32,
}

/// A path as configured by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePath {
    pub proto: DpoProto,
    pub next_hop: NextHop,
    pub weight: u32,
    /// Labels pushed on packets sent down this path.
    pub labels: Vec<MplsLabel>,
}

impl RoutePath {
    /// A neighbour on an interface.
    pub fn attached(interface: InterfaceIndex, address: IpAddress) -> Self {
        let proto = if address.is_ipv4() {
            DpoProto::Ip4
        } else {
            DpoProto::Ip6
        };
        Self::new(
            proto,
            NextHop::Attached {
                interface,
                address: Some(address),
            },
        )
    }

    /// The subnet attached to an interface.
    pub fn attached_glean(proto: DpoProto, interface: InterfaceIndex) -> Self {
        Self::new(
            proto,
            NextHop::Attached {
                interface,
                address: None,
            },
        )
    }

    /// Resolve through the entry for `via` in `table_id`.
    pub fn recursive(via: FibPrefix, table_id: u32) -> Self {
        Self::new(
            via.proto().to_dpo_proto(),
            NextHop::Recursive { via, table_id },
        )
    }

    fn new(proto: DpoProto, next_hop: NextHop) -> Self {
        Self {
            proto,
            next_hop,
            weight: 1,
            labels: Vec::new(),
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_labels(mut self, labels: Vec<MplsLabel>) -> Self {
        self.labels = labels;
        self
    }

    pub fn key(&self) -> PathKey {
        PathKey {
            proto: self.proto,
            next_hop: self.next_hop,
            weight: self.weight,
        }
    }
}

impl From<PathKey> for RoutePath {
    fn from(key: PathKey) -> Self {
        Self {
            proto: key.proto,
            next_hop: key.next_hop,
            weight: key.weight,
            labels: Vec::new(),
        }
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextHop::Attached {
                interface,
                address: Some(address),
            } => write!(f, "via {} {}", address, interface),
            NextHop::Attached {
                interface,
                address: None,
            } => write!(f, "attached {}", interface),
            NextHop::Recursive { via, table_id } => write!(f, "via {} in fib:{}", via, table_id),
        }
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} weight:{}", self.proto, self.next_hop, self.weight)?;
        if !self.labels.is_empty() {
            let labels: Vec<String> = self.labels.iter().map(|l| l.to_string()).collect();
            write!(f, " labels:[{}]", labels.join(" "))?;
        }
        Ok(())
    }
}

/// What a path is linked to once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathResolution {
    Unresolved,
    Adjacency { adj: AdjIndex, sibling: SiblingIndex },
    Entry { via: EntryIndex, sibling: SiblingIndex },
}

#[derive(Debug, Clone)]
pub struct FibPath {
    key: PathKey,
    pub(crate) resolution: PathResolution,
    pub(crate) looped: bool,
}

impl FibPath {
    pub fn key(&self) -> &PathKey {
        &self.key
    }

    /// True when resolving this path leads back to an entry that depends
    /// on it.
    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn via_entry(&self) -> Option<EntryIndex> {
        match self.resolution {
            PathResolution::Entry { via, .. } => Some(via),
            _ => None,
        }
    }

    pub fn adjacency(&self) -> Option<AdjIndex> {
        match self.resolution {
            PathResolution::Adjacency { adj, .. } => Some(adj),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct PathList {
    pub(crate) node: FibNode,
    pub(crate) paths: Vec<FibPath>,
    pub(crate) looped: bool,
}

impl PathList {
    pub fn paths(&self) -> &[FibPath] {
        &self.paths
    }

    pub fn is_looped(&self) -> bool {
        self.looped
    }

    pub fn locks(&self) -> u32 {
        self.node.locks()
    }

    pub fn child_count(&self) -> usize {
        self.node.child_count()
    }

    fn keys(&self) -> Vec<PathKey> {
        self.paths.iter().map(|p| p.key).collect()
    }
}

pub(crate) struct PathListVft;

impl NodeVft<Fib> for PathListVft {
    const KIND: NodeType = NodeType::PathList;

    fn get_node(fib: &Fib, index: NodeIndex) -> Option<&FibNode> {
        fib.path_lists.get(Index::from_untyped(index)).map(|p| &p.node)
    }

    fn get_node_mut(fib: &mut Fib, index: NodeIndex) -> Option<&mut FibNode> {
        fib.path_lists
            .get_mut(Index::from_untyped(index))
            .map(|p| &mut p.node)
    }

    fn last_lock_gone(fib: &mut Fib, index: NodeIndex) {
        fib.path_list_destroy(Index::from_untyped(index));
    }

    fn back_walk(fib: &mut Fib, index: NodeIndex, ctx: &BackWalkCtx) -> BackWalkRc {
        let pl: PathListIndex = Index::from_untyped(index);
        fib.record(FibEvent::Walked {
            node: NodePtr::new(NodeType::PathList, index),
            reason: ctx.reason,
            flags: ctx.flags,
        });
        if fib.path_lists.get(pl).is_some_and(|list| list.looped) {
            fib.path_list_loop_detect(pl, &[]);
        }
        back_walk_sync(fib, NodePtr::new(NodeType::PathList, index), ctx)
    }

    fn memory_usage(fib: &Fib) -> MemoryUsage {
        MemoryUsage {
            name: "Path-list",
            in_use: fib.path_lists.len(),
            allocated: fib.path_lists.allocated(),
            element_size: std::mem::size_of::<PathList>(),
        }
    }
}

impl Fib {
    /// Returns the path-list for this set of paths, creating and resolving
    /// it if it does not exist yet. The caller takes the first lock.
    pub(crate) fn path_list_find_or_create(&mut self, paths: &[RoutePath]) -> Result<PathListIndex> {
        let mut keys: Vec<PathKey> = paths.iter().map(RoutePath::key).collect();
        keys.sort();
        keys.dedup();
        if keys.is_empty() {
            return Err(FibError::InvalidPaths("empty path set".to_string()));
        }
        if let Some(pl) = self.path_list_db.get(&keys) {
            return Ok(*pl);
        }

        let pl = self.path_lists.alloc(PathList {
            node: FibNode::new(NodeType::PathList),
            paths: keys
                .iter()
                .map(|key| FibPath {
                    key: *key,
                    resolution: PathResolution::Unresolved,
                    looped: false,
                })
                .collect(),
            looped: false,
        })?;
        self.path_list_db.insert(keys.clone(), pl);
        debug!("PathList: Created [{}] with {} paths", pl, keys.len());

        for (i, key) in keys.iter().enumerate() {
            if let Err(e) = self.path_resolve(pl, i, key) {
                warn!("PathList: [{}] failed to resolve {}: {}", pl, key.next_hop, e);
                self.path_list_destroy(pl);
                return Err(e);
            }
        }
        Ok(pl)
    }

    fn path_resolve(&mut self, pl: PathListIndex, i: usize, key: &PathKey) -> Result<()> {
        let child = NodePtr::new(NodeType::PathList, pl.untyped());
        let resolution = match key.next_hop {
            NextHop::Attached { interface, address } => {
                let adj = self.adj_find_or_create(AdjacencyKey {
                    proto: key.proto,
                    interface,
                    next_hop: address,
                })?;
                match self.node_child_add::<AdjacencyVft>(adj.untyped(), child) {
                    Some(sibling) => PathResolution::Adjacency { adj, sibling },
                    None => PathResolution::Unresolved,
                }
            }
            NextHop::Recursive { via, table_id } => {
                let entry = self.table_entry_source_add(
                    table_id,
                    via,
                    SourceKind::RecursiveResolution,
                    EntryFlags::NONE,
                    None,
                )?;
                match self.node_child_add::<EntryVft>(entry.untyped(), child) {
                    Some(sibling) => PathResolution::Entry { via: entry, sibling },
                    None => PathResolution::Unresolved,
                }
            }
        };
        if let Some(path) = self
            .path_lists
            .get_mut(pl)
            .and_then(|list| list.paths.get_mut(i))
        {
            path.resolution = resolution;
        }
        Ok(())
    }

    fn path_list_destroy(&mut self, pl: PathListIndex) {
        let Some(mut list) = self.path_lists.free(pl) else {
            return;
        };
        debug!("PathList: Deleted [{}]", pl);
        self.path_list_db.remove(&list.keys());
        list.node.deinit();

        for path in &list.paths {
            match path.resolution {
                PathResolution::Unresolved => {}
                PathResolution::Adjacency { adj, sibling } => {
                    self.node_child_remove::<AdjacencyVft>(adj.untyped(), sibling);
                }
                PathResolution::Entry { via, sibling } => {
                    // Drop the placeholder source while the child link still
                    // keeps the via entry alive.
                    if let Err(e) =
                        self.table_entry_source_remove(via, SourceKind::RecursiveResolution)
                    {
                        debug!("PathList: [{}] via {} already gone: {}", pl, via, e);
                    }
                    self.node_child_remove::<EntryVft>(via.untyped(), sibling);
                }
            }
        }
    }

    pub(crate) fn path_list_lock(&mut self, pl: PathListIndex) {
        node_lock::<Fib, PathListVft>(self, pl.untyped());
    }

    pub(crate) fn path_list_unlock(&mut self, pl: PathListIndex) {
        node_unlock::<Fib, PathListVft>(self, pl.untyped());
    }

    pub fn path_list(&self, pl: PathListIndex) -> Option<&PathList> {
        self.path_lists.get(pl)
    }

    /// One bucket per usable path. `labels` supplies each path's
    /// out-labels. A looped path forwards to drop; an attached path whose
    /// adjacency is down is skipped. With nothing usable the result is a
    /// single drop bucket.
    pub(crate) fn path_list_contribute(
        &mut self,
        pl: PathListIndex,
        chain: ChainType,
        labels: &[(PathKey, Vec<MplsLabel>)],
    ) -> Vec<LbBucket> {
        let proto = chain.dpo_proto();
        let paths: Vec<FibPath> = match self.path_lists.get(pl) {
            Some(list) => list.paths.clone(),
            None => return vec![LbBucket::new(Dpo::Drop(proto), 1)],
        };

        let mut buckets = Vec::with_capacity(paths.len());
        for path in paths {
            let dpo = if path.looped {
                Some(Dpo::Drop(proto))
            } else {
                match path.resolution {
                    PathResolution::Unresolved => None,
                    PathResolution::Adjacency { adj, .. } => self
                        .adjacencies
                        .get(adj)
                        .filter(|a| a.is_up())
                        .map(|a| Dpo::Adjacency { proto, id: a.id() }),
                    PathResolution::Entry { via, .. } => Some(self.entry_forwarding_for_child(via, chain)),
                }
            };
            let Some(dpo) = dpo else {
                continue;
            };
            let out_labels = labels
                .iter()
                .find(|(key, _)| *key == path.key)
                .map(|(_, l)| l.clone())
                .unwrap_or_default();
            buckets.push(LbBucket::new(dpo, path.key.weight).with_labels(out_labels));
        }

        if buckets.is_empty() {
            buckets.push(LbBucket::new(Dpo::Drop(proto), 1));
        }
        buckets
    }

    /// Marks every recursive path whose via entry is on `trail` (or leads
    /// back to it) as looped. Returns whether any path is looped.
    pub(crate) fn path_list_loop_detect(&mut self, pl: PathListIndex, trail: &[EntryIndex]) -> bool {
        let vias: Vec<(usize, EntryIndex)> = match self.path_lists.get(pl) {
            Some(list) => list
                .paths
                .iter()
                .enumerate()
                .filter_map(|(i, p)| p.via_entry().map(|via| (i, via)))
                .collect(),
            None => return false,
        };

        let mut looped = false;
        for (i, via) in vias {
            let path_looped = trail.contains(&via) || {
                let mut copy = trail.to_vec();
                self.recursive_loop_detect(via, &mut copy)
            };
            if let Some(path) = self
                .path_lists
                .get_mut(pl)
                .and_then(|list| list.paths.get_mut(i))
            {
                path.looped = path_looped;
            }
            looped |= path_looped;
        }
        if let Some(list) = self.path_lists.get_mut(pl) {
            list.looped = looped;
        }
        looped
    }

    /// The interface of the first path that resolves to one.
    pub(crate) fn path_list_resolving_interface(
        &self,
        pl: PathListIndex,
        visited: &mut Vec<EntryIndex>,
    ) -> Option<InterfaceIndex> {
        let list = self.path_lists.get(pl)?;
        list.paths.iter().filter(|p| !p.looped).find_map(|path| {
            match (path.key.next_hop, path.resolution) {
                (NextHop::Attached { interface, .. }, _) => Some(interface),
                (_, PathResolution::Entry { via, .. }) => {
                    self.entry_resolving_interface(via, visited)
                }
                _ => None,
            }
        })
    }

    /// Adds the interfaces packets from this path-list may arrive on.
    pub(crate) fn path_list_urpf(
        &self,
        pl: PathListIndex,
        out: &mut Vec<InterfaceIndex>,
        visited: &mut Vec<EntryIndex>,
    ) {
        let Some(list) = self.path_lists.get(pl) else {
            return;
        };
        for path in list.paths.iter().filter(|p| !p.looped) {
            match (path.key.next_hop, path.resolution) {
                (NextHop::Attached { interface, .. }, _) => out.push(interface),
                (_, PathResolution::Entry { via, .. }) => self.entry_urpf(via, out, visited),
                _ => {}
            }
        }
    }

    /// The configured form of every path, without labels.
    pub(crate) fn path_list_encode(&self, pl: PathListIndex) -> Vec<RoutePath> {
        self.path_lists
            .get(pl)
            .map(|list| list.paths.iter().map(|p| RoutePath::from(p.key)).collect())
            .unwrap_or_default()
    }
}
