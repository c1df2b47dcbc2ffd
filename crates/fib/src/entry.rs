//! FIB entries: one per (table, prefix), holding every source's
//! contribution and the forwarding built from the winner.

use crate::adjacency::AdjacencyVft;
use crate::attached_export::{ExportIndex, ImportIndex};
use crate::chain::ChainType;
use crate::error::{FibError, Result};
use crate::fib::{Fib, FibEvent};
use crate::load_balance::LbIndex;
use crate::path::{PathListIndex, PathListVft, RoutePath};
use crate::source::{EntryFlags, EntrySource, SourceKind};
use fib_dpo::Dpo;
use fib_node::{
    back_walk_sync, node_lock, node_unlock, BackWalkCtx, BackWalkFlags, BackWalkRc,
    BackWalkReason, FibNode, Index, MemoryUsage, NodeIndex, NodePtr, NodeType, NodeVft,
    SiblingIndex,
};
use fib_types::{FibPrefix, InterfaceIndex};
use log::{debug, warn};
use std::cmp::Ordering;

pub type EntryIndex = Index<FibEntry>;

#[derive(Debug)]
pub struct FibEntry {
    pub(crate) node: FibNode,
    pub(crate) table_id: u32,
    pub(crate) prefix: FibPrefix,
    /// Ascending priority; the best source is first.
    pub(crate) sources: Vec<EntrySource>,
    pub(crate) forwarding: [Option<LbIndex>; ChainType::COUNT],
    /// The default chain has been handed to hardware as a route.
    pub(crate) installed: bool,
    /// Path-list of the active source.
    pub(crate) parent: Option<PathListIndex>,
    pub(crate) sibling: Option<SiblingIndex>,
    /// Entries whose sources track this one as their cover.
    pub(crate) covered: Vec<EntryIndex>,
    pub(crate) import: Option<ImportIndex>,
    pub(crate) export: Option<ExportIndex>,
}

impl FibEntry {
    fn new(table_id: u32, prefix: FibPrefix) -> Self {
        Self {
            node: FibNode::new(NodeType::Entry),
            table_id,
            prefix,
            sources: Vec::new(),
            forwarding: [None; ChainType::COUNT],
            installed: false,
            parent: None,
            sibling: None,
            covered: Vec::new(),
            import: None,
            export: None,
        }
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn prefix(&self) -> &FibPrefix {
        &self.prefix
    }

    pub fn sources(&self) -> &[EntrySource] {
        &self.sources
    }

    pub fn source(&self, kind: SourceKind) -> Option<&EntrySource> {
        self.sources.iter().find(|s| s.kind == kind)
    }

    pub fn best_source(&self) -> Option<&EntrySource> {
        self.sources.first()
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn parent(&self) -> Option<PathListIndex> {
        self.parent
    }

    pub fn locks(&self) -> u32 {
        self.node.locks()
    }

    pub fn child_count(&self) -> usize {
        self.node.child_count()
    }

    /// Number of cover-tracking registrations on this entry.
    pub fn covered_count(&self) -> usize {
        self.covered.len()
    }

    pub fn default_chain(&self) -> ChainType {
        ChainType::default_for(&self.prefix)
    }

    pub(crate) fn slot(&self, chain: ChainType) -> Option<LbIndex> {
        self.forwarding[chain.index()]
    }
}

pub(crate) struct EntryVft;

impl NodeVft<Fib> for EntryVft {
    const KIND: NodeType = NodeType::Entry;

    fn get_node(fib: &Fib, index: NodeIndex) -> Option<&FibNode> {
        fib.entries.get(Index::from_untyped(index)).map(|e| &e.node)
    }

    fn get_node_mut(fib: &mut Fib, index: NodeIndex) -> Option<&mut FibNode> {
        fib.entries
            .get_mut(Index::from_untyped(index))
            .map(|e| &mut e.node)
    }

    fn last_lock_gone(fib: &mut Fib, index: NodeIndex) {
        fib.entry_last_lock_gone(Index::from_untyped(index));
    }

    fn back_walk(fib: &mut Fib, index: NodeIndex, ctx: &BackWalkCtx) -> BackWalkRc {
        let entry: EntryIndex = Index::from_untyped(index);
        fib.record(FibEvent::Walked {
            node: NodePtr::new(NodeType::Entry, index),
            reason: ctx.reason,
            flags: ctx.flags,
        });
        if ctx.reason.intersects(BackWalkReason::REACTIVATE) {
            if let Some(best) = fib.best_source_kind(entry) {
                if let Err(e) = fib.src_action_reactivate(entry, best) {
                    warn!("FibEntry: {} reactivate {} failed: {}", entry, best, e);
                }
            }
        }

        // Whatever started the walk, dependents only need to re-evaluate,
        // and nothing below here is forced synchronous.
        let next = BackWalkCtx {
            reason: BackWalkReason::EVALUATE,
            flags: ctx.flags.difference(BackWalkFlags::FORCE_SYNC),
            depth: ctx.depth,
        };
        back_walk_sync(fib, NodePtr::new(NodeType::Entry, index), &next);
        BackWalkRc::Continue
    }

    fn memory_usage(fib: &Fib) -> MemoryUsage {
        MemoryUsage {
            name: "Entry",
            in_use: fib.entries.len(),
            allocated: fib.entries.allocated(),
            element_size: std::mem::size_of::<FibEntry>(),
        }
    }
}

impl Fib {
    fn entry_alloc(&mut self, table_id: u32, prefix: FibPrefix) -> Result<EntryIndex> {
        let entry = self.entries.alloc(FibEntry::new(table_id, prefix))?;
        debug!("FibEntry: Alloc {} {}:{}", entry, table_id, prefix);
        Ok(entry)
    }

    /// Creates the entry for (`table_id`, `prefix`) with `source` as its
    /// only source and indexes it in its table.
    ///
    /// # Errors
    ///
    /// `InvalidPaths` for an empty path set, `EntryExists` if the table
    /// already has an entry for the prefix, `PoolExhausted` when out of
    /// entries, path-lists or load-balances.
    pub fn create(
        &mut self,
        table_id: u32,
        prefix: FibPrefix,
        source: SourceKind,
        flags: EntryFlags,
        paths: &[RoutePath],
    ) -> Result<EntryIndex> {
        if paths.is_empty() {
            return Err(FibError::InvalidPaths(format!(
                "{}:{} created without paths",
                table_id, prefix
            )));
        }
        self.entry_create(table_id, prefix, source, flags, None, paths)
    }

    /// Creates an entry whose only source forwards with `dpo`.
    pub fn create_special(
        &mut self,
        table_id: u32,
        prefix: FibPrefix,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Dpo,
    ) -> Result<EntryIndex> {
        self.entry_create(table_id, prefix, source, flags, Some(dpo), &[])
    }

    pub(crate) fn entry_create(
        &mut self,
        table_id: u32,
        prefix: FibPrefix,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Option<Dpo>,
        paths: &[RoutePath],
    ) -> Result<EntryIndex> {
        self.table_find_or_create(prefix.proto(), table_id)?;
        if self.table_lookup_exact(table_id, &prefix).is_some() {
            return Err(FibError::EntryExists { table_id, prefix });
        }

        let entry = self.entry_alloc(table_id, prefix)?;
        if let Err(e) = self.entry_init_source(entry, source, flags, dpo, paths) {
            self.entry_discard(entry);
            return Err(e);
        }
        self.table_entry_insert(entry);
        Ok(entry)
    }

    fn entry_init_source(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Option<Dpo>,
        paths: &[RoutePath],
    ) -> Result<()> {
        self.src_action_add(entry, source, flags, dpo);
        if !paths.is_empty() {
            self.src_action_path_swap(entry, source, flags, paths)?;
        }
        self.src_action_activate(entry, source)?;
        self.post_install_actions(entry, source, EntryFlags::NONE)
    }

    /// Finalizes an entry nobody has locked yet.
    fn entry_discard(&mut self, entry: EntryIndex) {
        self.lock_node(entry);
        node_unlock::<Fib, EntryVft>(self, entry.untyped());
    }

    pub(crate) fn lock_node(&mut self, entry: EntryIndex) -> Option<u32> {
        node_lock::<Fib, EntryVft>(self, entry.untyped())
    }

    pub fn get(&self, entry: EntryIndex) -> Result<&FibEntry> {
        self.entries
            .get(entry)
            .ok_or(FibError::EntryNotFound(entry))
    }

    pub(crate) fn get_mut(&mut self, entry: EntryIndex) -> Result<&mut FibEntry> {
        self.entries
            .get_mut(entry)
            .ok_or(FibError::EntryNotFound(entry))
    }

    /// Live entries in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (EntryIndex, &FibEntry)> {
        self.entries.iter()
    }

    pub fn lock(&mut self, entry: EntryIndex) -> Result<()> {
        self.lock_node(entry)
            .map(|_| ())
            .ok_or(FibError::EntryNotFound(entry))
    }

    /// Releases a lock; the last one finalizes the entry.
    pub fn unlock(&mut self, entry: EntryIndex) -> Result<()> {
        node_unlock::<Fib, EntryVft>(self, entry.untyped())
            .map(|_| ())
            .ok_or(FibError::EntryNotFound(entry))
    }

    fn entry_last_lock_gone(&mut self, entry: EntryIndex) {
        let Some(gone) = self.entries.free(entry) else {
            return;
        };
        debug!(
            "FibEntry: {} {}:{} last lock gone",
            entry, gone.table_id, gone.prefix
        );
        let FibEntry {
            mut node,
            sources,
            forwarding,
            parent,
            sibling,
            import,
            export,
            ..
        } = gone;
        node.deinit();

        if let Some(import) = import {
            self.attached_export_release_import(import);
        }
        if let Some(export) = export {
            self.attached_export_release_export(export);
        }
        for lb in forwarding.into_iter().flatten() {
            self.lb_unlock(lb);
        }
        if let (Some(pl), Some(sibling)) = (parent, sibling) {
            self.node_child_remove::<PathListVft>(pl.untyped(), sibling);
        }
        for source in sources {
            if let Some(cover) = source.cover {
                self.cover_untrack(cover, entry);
            }
            if let Some(pl) = source.path_list {
                self.path_list_unlock(pl);
            }
        }
    }

    pub fn get_prefix(&self, entry: EntryIndex) -> Result<FibPrefix> {
        Ok(self.get(entry)?.prefix)
    }

    pub fn get_table_id(&self, entry: EntryIndex) -> Result<u32> {
        Ok(self.get(entry)?.table_id)
    }

    pub fn get_path_list(&self, entry: EntryIndex) -> Result<Option<PathListIndex>> {
        Ok(self.get(entry)?.parent)
    }

    /// Flags of the best source; empty when the entry has no source.
    pub fn get_flags(&self, entry: EntryIndex) -> Result<EntryFlags> {
        Ok(self
            .get(entry)?
            .best_source()
            .map(|s| s.flags)
            .unwrap_or(EntryFlags::NONE))
    }

    pub fn get_best_source(&self, entry: EntryIndex) -> Result<Option<SourceKind>> {
        Ok(self.get(entry)?.best_source().map(|s| s.kind))
    }

    pub(crate) fn best_source_kind(&self, entry: EntryIndex) -> Option<SourceKind> {
        self.entries
            .get(entry)
            .and_then(|e| e.best_source())
            .map(|s| s.kind)
    }

    /// Interface the entry's forwarding leaves through.
    pub fn get_resolving_interface(&self, entry: EntryIndex) -> Result<Option<InterfaceIndex>> {
        self.get(entry)?;
        Ok(self.entry_resolving_interface(entry, &mut Vec::new()))
    }

    pub(crate) fn entry_resolving_interface(
        &self,
        entry: EntryIndex,
        visited: &mut Vec<EntryIndex>,
    ) -> Option<InterfaceIndex> {
        if visited.contains(&entry) {
            return None;
        }
        visited.push(entry);
        let pl = self.entries.get(entry)?.parent?;
        self.path_list_resolving_interface(pl, visited)
    }

    /// Returns the forwarding for `chain`, building it on demand. The
    /// caller owns a lock on the result and releases it with
    /// [`Fib::dpo_release`].
    pub fn contribute_forwarding(&mut self, entry: EntryIndex, chain: ChainType) -> Result<Dpo> {
        let chain = chain.fixup(&self.get(entry)?.prefix);
        if self.get(entry)?.slot(chain).is_none() {
            let best = self.best_source_kind(entry);
            self.mk_lb(entry, best, chain)?;
        }
        match self.get(entry)?.slot(chain) {
            Some(lb) => {
                self.lb_lock(lb);
                let dpo = self.lb_get(lb).map(|l| l.dpo());
                Ok(dpo.unwrap_or(Dpo::Drop(chain.dpo_proto())))
            }
            None => Ok(Dpo::Drop(chain.dpo_proto())),
        }
    }

    /// Forwarding a path of a child path-list resolves to. Never fails:
    /// anything unavailable forwards to drop.
    pub(crate) fn entry_forwarding_for_child(&mut self, via: EntryIndex, chain: ChainType) -> Dpo {
        let chain = match self.entries.get(via) {
            Some(entry) => chain.fixup(&entry.prefix),
            None => return Dpo::Drop(chain.dpo_proto()),
        };
        if self.building.contains(&(via, chain)) {
            debug!("FibEntry: {} {} chain is being built", via, chain);
            return Dpo::Drop(chain.dpo_proto());
        }
        match self.contribute_forwarding(via, chain) {
            Ok(dpo) => dpo,
            Err(e) => {
                warn!("FibEntry: {} no {} forwarding: {}", via, chain, e);
                Dpo::Drop(chain.dpo_proto())
            }
        }
    }

    /// The installed forwarding of the entry's default chain, without
    /// taking a lock. `None` when the entry is not installed.
    pub fn contribute_ip_forwarding(&self, entry: EntryIndex) -> Result<Option<Dpo>> {
        let entry = self.get(entry)?;
        Ok(entry
            .slot(entry.default_chain())
            .and_then(|lb| self.lb_get(lb))
            .map(|lb| lb.dpo()))
    }

    /// Cached forwarding of one chain, if built.
    pub fn cached_forwarding(&self, entry: EntryIndex, chain: ChainType) -> Result<Option<Dpo>> {
        Ok(self
            .get(entry)?
            .slot(chain)
            .and_then(|lb| self.lb_get(lb))
            .map(|lb| lb.dpo()))
    }

    /// Interfaces a packet forwarded by this entry may legitimately
    /// arrive on, sorted.
    pub fn contribute_urpf(&self, entry: EntryIndex) -> Result<Vec<InterfaceIndex>> {
        self.get(entry)?;
        let mut interfaces = Vec::new();
        self.entry_urpf(entry, &mut interfaces, &mut Vec::new());
        interfaces.sort();
        interfaces.dedup();
        Ok(interfaces)
    }

    pub(crate) fn entry_urpf(
        &self,
        entry: EntryIndex,
        out: &mut Vec<InterfaceIndex>,
        visited: &mut Vec<EntryIndex>,
    ) {
        if visited.contains(&entry) {
            return;
        }
        visited.push(entry);
        if let Some(pl) = self.entries.get(entry).and_then(|e| e.parent) {
            self.path_list_urpf(pl, out, visited);
        }
    }

    /// Registers `child` as a dependent of the entry; the entry stays
    /// alive until the child is removed.
    pub fn child_add(&mut self, entry: EntryIndex, child: NodePtr) -> Result<SiblingIndex> {
        self.node_child_add::<EntryVft>(entry.untyped(), child)
            .ok_or(FibError::EntryNotFound(entry))
    }

    pub fn child_remove(&mut self, entry: EntryIndex, sibling: SiblingIndex) -> Result<()> {
        self.get(entry)?;
        self.node_child_remove::<EntryVft>(entry.untyped(), sibling);
        Ok(())
    }

    /// Walks the recursion below `entry`, marking paths that lead back to
    /// an entry on `trail`. When the entry's loop state flips, every
    /// cached chain is rebuilt in place. Returns whether the entry is
    /// looped.
    pub fn recursive_loop_detect(&mut self, entry: EntryIndex, trail: &mut Vec<EntryIndex>) -> bool {
        let Some(pl) = self.entries.get(entry).and_then(|e| e.parent) else {
            return false;
        };
        trail.push(entry);

        let was_looped = self.path_lists.get(pl).is_some_and(|list| list.looped);
        let is_looped = self.path_list_loop_detect(pl, trail);
        if was_looped != is_looped {
            debug!(
                "FibEntry: {} loop {}",
                entry,
                if is_looped { "formed" } else { "cleared" }
            );
            let best = self.best_source_kind(entry);
            for chain in ChainType::ALL {
                let built = self
                    .entries
                    .get(entry)
                    .is_some_and(|e| e.slot(chain).is_some());
                if built {
                    if let Err(e) = self.mk_lb(entry, best, chain) {
                        warn!("FibEntry: {} rebuild of {} failed: {}", entry, chain, e);
                    }
                }
            }
        }
        is_looped
    }

    /// The winning paths, with the winner's out-labels.
    pub fn encode(&self, entry: EntryIndex) -> Result<Vec<RoutePath>> {
        let fib_entry = self.get(entry)?;
        let Some(pl) = fib_entry.parent else {
            return Ok(Vec::new());
        };
        let best = fib_entry.best_source();
        Ok(self
            .path_list_encode(pl)
            .into_iter()
            .map(|path| {
                let labels = best
                    .and_then(|s| s.paths.iter().find(|p| p.path.key() == path.key()))
                    .map(|p| p.path.labels.clone())
                    .unwrap_or_default();
                path.with_labels(labels)
            })
            .collect())
    }

    /// Sort order of entries: address (or label and EOS), then length.
    pub fn entry_cmp(&self, a: EntryIndex, b: EntryIndex) -> Result<Ordering> {
        Ok(self.get(a)?.prefix.cmp(&self.get(b)?.prefix))
    }

    /// Number of live entries.
    pub fn pool_size(&self) -> usize {
        self.entries.len()
    }

    /// Memory used by each object type.
    pub fn memory_usage(&self) -> Vec<MemoryUsage> {
        let (sources, extensions) = self.entries.iter().fold((0, 0), |(s, x), (_, entry)| {
            let exts = entry
                .sources
                .iter()
                .flat_map(|src| src.paths.iter())
                .filter(|p| !p.path.labels.is_empty())
                .count();
            (s + entry.sources.len(), x + exts)
        });
        vec![
            EntryVft::memory_usage(self),
            MemoryUsage {
                name: "Entry Source",
                in_use: sources,
                allocated: sources,
                element_size: std::mem::size_of::<EntrySource>(),
            },
            MemoryUsage {
                name: "Entry Path-Extensions",
                in_use: extensions,
                allocated: extensions,
                element_size: std::mem::size_of::<RoutePath>(),
            },
            PathListVft::memory_usage(self),
            AdjacencyVft::memory_usage(self),
            self.lb_memory_usage(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FibConfig;
    use fib_dpo::RecordingQueue;
    use fib_types::{DpoProto, MplsLabel};
    use pretty_assertions::assert_eq;

    fn fib() -> Fib {
        Fib::new(FibConfig::default(), Box::new(RecordingQueue::new()))
    }

    fn pfx(s: &str) -> FibPrefix {
        s.parse().unwrap()
    }

    fn nh(itf: u32, addr: &str) -> RoutePath {
        RoutePath::attached(InterfaceIndex::new(itf), addr.parse().unwrap())
    }

    #[test]
    fn test_locks_keep_entry_alive() {
        let mut fib = fib();
        let prefix = pfx("10.0.0.0/8");
        let entry = fib
            .create(0, prefix, SourceKind::Api, EntryFlags::NONE, &[nh(1, "1.1.1.1")])
            .unwrap();
        assert_eq!(fib.get(entry).unwrap().locks(), 1);
        fib.lock(entry).unwrap();

        fib.table_entry_delete(0, &prefix, SourceKind::Api).unwrap();
        assert_eq!(fib.table_lookup_exact(0, &prefix), None);
        let held = fib.get(entry).unwrap();
        assert!(held.sources().is_empty());
        assert!(!held.is_installed());

        fib.unlock(entry).unwrap();
        assert!(matches!(fib.get(entry), Err(FibError::EntryNotFound(_))));
    }

    #[test]
    fn test_encode_carries_winner_labels() {
        let mut fib = fib();
        let label = MplsLabel::new(1000).unwrap();
        let entry = fib
            .create(
                0,
                pfx("10.0.0.0/8"),
                SourceKind::Api,
                EntryFlags::NONE,
                &[nh(1, "1.1.1.1").with_labels(vec![label]), nh(2, "2.2.2.2")],
            )
            .unwrap();

        let encoded = fib.encode(entry).unwrap();
        assert_eq!(
            encoded,
            vec![nh(1, "1.1.1.1").with_labels(vec![label]), nh(2, "2.2.2.2")]
        );
        let lb = fib.cached_forwarding(entry, ChainType::UnicastIp4).unwrap().unwrap();
        let buckets = fib.load_balance(lb.load_balance().unwrap()).unwrap().buckets();
        assert_eq!(buckets[0].labels, vec![label]);
        assert!(buckets[1].labels.is_empty());
    }

    #[test]
    fn test_entry_order() {
        let mut fib = fib();
        let short = fib
            .create(0, pfx("10.0.0.0/8"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "1.1.1.1")])
            .unwrap();
        let long = fib
            .create(0, pfx("10.0.0.0/24"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "1.1.1.1")])
            .unwrap();
        let other = fib
            .create(0, pfx("9.0.0.0/8"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "1.1.1.1")])
            .unwrap();

        assert_eq!(fib.entry_cmp(short, long).unwrap(), Ordering::Less);
        assert_eq!(fib.entry_cmp(other, short).unwrap(), Ordering::Less);
        assert_eq!(fib.entry_cmp(long, long).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_forwarding_of_unresolved_chain_is_built_on_demand() {
        let mut fib = fib();
        let entry = fib
            .create(0, pfx("10.0.0.0/8"), SourceKind::Api, EntryFlags::NONE, &[nh(1, "1.1.1.1")])
            .unwrap();
        assert_eq!(fib.cached_forwarding(entry, ChainType::MplsNonEos).unwrap(), None);

        let dpo = fib.contribute_forwarding(entry, ChainType::MplsNonEos).unwrap();
        assert_eq!(dpo.proto(), DpoProto::Mpls);
        assert_eq!(
            fib.cached_forwarding(entry, ChainType::MplsNonEos).unwrap(),
            Some(dpo)
        );
        let id = dpo.load_balance().unwrap();
        assert_eq!(fib.load_balance(id).unwrap().locks(), 2);
        fib.dpo_release(&dpo);
        assert_eq!(fib.load_balance(id).unwrap().locks(), 1);
    }

    #[test]
    fn test_default_route_drops() {
        let mut fib = fib();
        fib.table_find_or_create(fib_types::FibProtocol::Ip6, 3).unwrap();
        let entry = fib.table_lookup_exact(3, &pfx("::/0")).unwrap();

        assert_eq!(fib.get_best_source(entry).unwrap(), Some(SourceKind::DefaultRoute));
        assert_eq!(fib.get_flags(entry).unwrap(), EntryFlags::DROP);
        assert_eq!(fib.get_resolving_interface(entry).unwrap(), None);
        assert!(fib.contribute_urpf(entry).unwrap().is_empty());
        let dpo = fib.contribute_ip_forwarding(entry).unwrap().unwrap();
        let lb = fib.load_balance(dpo.load_balance().unwrap()).unwrap();
        assert_eq!(lb.buckets()[0].dpo, Dpo::Drop(DpoProto::Ip6));
    }
}
