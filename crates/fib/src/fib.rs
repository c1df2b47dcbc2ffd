//! The FIB context: every pool, index and collaborator the engine uses.

use crate::adjacency::{AdjIndex, Adjacency, AdjacencyKey, AdjacencyVft};
use crate::attached_export::{ExportRecord, ImportRecord};
use crate::chain::ChainType;
use crate::config::FibConfig;
use crate::entry::{EntryIndex, EntryVft, FibEntry};
use crate::error::Result;
use crate::load_balance::{LbIndex, LoadBalance};
use crate::path::{PathKey, PathList, PathListIndex, PathListVft};
use crate::source::SourceKind;
use crate::table::FibTable;
use fib_dpo::{HwCommand, HwCommandQueue, HwStatus, LoadBalanceId};
use fib_node::{
    node_unlock, BackWalkCtx, BackWalkFlags, BackWalkRc, BackWalkReason, FibNode, NodeGraph, NodeIndex, NodePtr,
    NodeType, NodeVft, Pool, SiblingIndex, SyncMap,
};
use fib_types::{FibProtocol, InterfaceIndex};
use log::{debug, error, info, warn};

/// A lifecycle step taken on an entry, recorded while the journal is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FibEvent {
    Activated { entry: EntryIndex, source: SourceKind },
    Deactivated { entry: EntryIndex, source: SourceKind },
    Installed { entry: EntryIndex, source: SourceKind },
    Uninstalled { entry: EntryIndex },
    /// An entry or path-list received a back walk.
    Walked {
        node: NodePtr,
        reason: BackWalkReason,
        flags: BackWalkFlags,
    },
}

/// The forwarding information base.
///
/// All state lives here and is mutated through `&mut self`; objects refer
/// to each other by generational handles that are re-validated on use.
pub struct Fib {
    pub(crate) config: FibConfig,
    pub(crate) entries: Pool<FibEntry>,
    pub(crate) path_lists: Pool<PathList>,
    /// Path-lists are shared by everything with the same path set.
    pub(crate) path_list_db: SyncMap<Vec<PathKey>, PathListIndex>,
    pub(crate) adjacencies: Pool<Adjacency>,
    pub(crate) adjacency_db: SyncMap<AdjacencyKey, AdjIndex>,
    pub(crate) load_balances: Pool<LoadBalance>,
    pub(crate) load_balance_db: SyncMap<LoadBalanceId, LbIndex>,
    pub(crate) imports: Pool<ImportRecord>,
    pub(crate) exports: Pool<ExportRecord>,
    pub(crate) tables: SyncMap<(FibProtocol, u32), FibTable>,
    pub(crate) interface_tables: SyncMap<(FibProtocol, InterfaceIndex), u32>,
    pub(crate) interface_state: SyncMap<InterfaceIndex, bool>,
    /// Forwarding slots being built; a recursive request for one of them
    /// resolves to drop.
    pub(crate) building: Vec<(EntryIndex, ChainType)>,
    hw: Box<dyn HwCommandQueue>,
    next_object_id: u64,
    journal: Option<Vec<FibEvent>>,
}

impl Fib {
    /// Creates an empty FIB that programs hardware through `hw`.
    pub fn new(config: FibConfig, hw: Box<dyn HwCommandQueue>) -> Self {
        info!(
            "Fib: Created (entries:{} path-lists:{} load-balances:{} walk depth:{})",
            config.max_entries,
            config.max_path_lists,
            config.max_load_balances,
            config.walk_max_depth
        );
        Self {
            entries: Pool::new("entry", config.max_entries),
            path_lists: Pool::new("path-list", config.max_path_lists),
            path_list_db: SyncMap::new(),
            adjacencies: Pool::new("adjacency", config.max_adjacencies),
            adjacency_db: SyncMap::new(),
            load_balances: Pool::new("load-balance", config.max_load_balances),
            load_balance_db: SyncMap::new(),
            imports: Pool::new("import", config.max_entries),
            exports: Pool::new("export", config.max_entries),
            tables: SyncMap::new(),
            interface_tables: SyncMap::new(),
            interface_state: SyncMap::new(),
            building: Vec::new(),
            hw,
            next_object_id: 1,
            journal: None,
            config,
        }
    }

    pub fn config(&self) -> &FibConfig {
        &self.config
    }

    /// Starts or stops recording [`FibEvent`]s.
    pub fn set_journal(&mut self, enabled: bool) {
        self.journal = enabled.then(Vec::new);
    }

    /// Returns and clears the recorded events.
    pub fn take_journal(&mut self) -> Vec<FibEvent> {
        self.journal.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub(crate) fn record(&mut self, event: FibEvent) {
        if let Some(journal) = self.journal.as_mut() {
            journal.push(event);
        }
    }

    /// Allocates an id for a new hardware object.
    pub(crate) fn next_object_id(&mut self) -> u64 {
        let id = self.next_object_id;
        self.next_object_id += 1;
        id
    }

    pub(crate) fn hw_enqueue(&mut self, cmd: HwCommand) {
        let status = self.hw.enqueue(cmd.clone());
        if let Err(e) = status.into_result() {
            warn!("Fib: Enqueue of {} failed: {}", cmd, e);
        }
    }

    /// Number of hardware commands waiting for [`Fib::flush_hw`].
    pub fn hw_pending(&self) -> usize {
        self.hw.pending()
    }

    /// Pushes every queued hardware command. On a retryable failure the
    /// commands stay queued for the next flush.
    pub async fn flush_hw(&mut self) -> Result<HwStatus> {
        let pending = self.hw.pending();
        match self.hw.flush().await {
            Ok(status) => {
                debug!("Fib: Flushed {} hardware commands ({})", pending, status);
                Ok(status)
            }
            Err(e) if e.is_retryable() => {
                warn!("Fib: Flush failed, {} commands kept: {}", self.hw.pending(), e);
                Err(e.into())
            }
            Err(e) => {
                error!("Fib: Flush failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Registers `child` as a dependent of the node `parent` of kind `V`,
    /// taking a lock on the parent.
    pub(crate) fn node_child_add<V: NodeVft<Fib>>(
        &mut self,
        parent: NodeIndex,
        child: NodePtr,
    ) -> Option<SiblingIndex> {
        let node = V::get_node_mut(self, parent)?;
        let sibling = node.child_add(child);
        node.lock();
        Some(sibling)
    }

    /// Undoes [`Fib::node_child_add`]. The parent may be finalized.
    pub(crate) fn node_child_remove<V: NodeVft<Fib>>(
        &mut self,
        parent: NodeIndex,
        sibling: SiblingIndex,
    ) {
        let removed = V::get_node_mut(self, parent).and_then(|node| node.child_remove(sibling));
        if removed.is_some() {
            node_unlock::<Fib, V>(self, parent);
        } else {
            debug!("Fib: {} {} has no child at {}", V::KIND, parent, sibling.value());
        }
    }
}

impl NodeGraph for Fib {
    fn node(&self, ptr: NodePtr) -> Option<&FibNode> {
        match ptr.kind {
            NodeType::Entry => EntryVft::get_node(self, ptr.index),
            NodeType::PathList => PathListVft::get_node(self, ptr.index),
            NodeType::Adjacency => AdjacencyVft::get_node(self, ptr.index),
        }
    }

    fn node_back_walk(&mut self, ptr: NodePtr, ctx: &BackWalkCtx) -> BackWalkRc {
        match ptr.kind {
            NodeType::Entry => EntryVft::back_walk(self, ptr.index, ctx),
            NodeType::PathList => PathListVft::back_walk(self, ptr.index, ctx),
            NodeType::Adjacency => AdjacencyVft::back_walk(self, ptr.index, ctx),
        }
    }

    fn max_walk_depth(&self) -> u32 {
        self.config.walk_max_depth
    }
}
