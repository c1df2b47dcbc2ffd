//! Source actions.
//!
//! Every change to an entry goes through its sources: a source is added,
//! changed or removed, then the entry re-selects its best source and
//! rebuilds its forwarding from it. Only the best source is active; the
//! others keep their configuration until they win again.
//!
//! Each source kind's behaviour on activation and on changes of the
//! entry's cover lives in the `src_behaviour_*` hooks at the end of this
//! file.

use crate::chain::ChainType;
use crate::entry::EntryIndex;
use crate::error::{FibError, Result};
use crate::fib::{Fib, FibEvent};
use crate::path::{PathKey, PathListIndex, PathListVft, RoutePath};
use crate::source::{
    CoverResult, EntryFlags, EntrySource, SourceBehaviour, SourceKind, SourcePath, SourceStatus,
};
use fib_dpo::{Dpo, HwCommand, LbBucket};
use fib_node::{back_walk_sync, BackWalkCtx, BackWalkFlags, BackWalkReason, NodePtr, NodeType};
use fib_types::MplsLabel;
use log::{debug, error};
use std::cmp::Ordering;

/// What to do with the best source when it changed but was not removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StillPresent {
    Reactivate,
    Restart,
}

impl Fib {
    fn src_find(&self, entry: EntryIndex, kind: SourceKind) -> Option<&EntrySource> {
        self.entries.get(entry)?.source(kind)
    }

    fn src_find_mut(&mut self, entry: EntryIndex, kind: SourceKind) -> Option<&mut EntrySource> {
        self.entries
            .get_mut(entry)?
            .sources
            .iter_mut()
            .find(|s| s.kind == kind)
    }

    /// The best source and its flags, before a change is applied.
    fn best_with_flags(&self, entry: EntryIndex) -> Result<Option<(SourceKind, EntryFlags)>> {
        Ok(self.get(entry)?.best_source().map(|s| (s.kind, s.flags)))
    }

    /// Takes a reference on `kind`, creating the source with `flags` and
    /// `dpo` on the first add.
    pub(crate) fn src_action_add(
        &mut self,
        entry: EntryIndex,
        kind: SourceKind,
        flags: EntryFlags,
        dpo: Option<Dpo>,
    ) {
        let Some(fib_entry) = self.entries.get_mut(entry) else {
            return;
        };
        if let Some(src) = fib_entry.sources.iter_mut().find(|s| s.kind == kind) {
            src.ref_count += 1;
            return;
        }
        let mut src = EntrySource::new(kind, flags);
        src.ref_count = 1;
        src.dpo = dpo;
        let pos = fib_entry.sources.partition_point(|s| s.kind < kind);
        fib_entry.sources.insert(pos, src);
        debug!("FibEntry: {} added source {} flags:{}", entry, kind, flags);
    }

    /// Replaces the flags and forwarding object of `kind`, creating the
    /// source if it is missing.
    fn src_action_update(
        &mut self,
        entry: EntryIndex,
        kind: SourceKind,
        flags: EntryFlags,
        dpo: Option<Dpo>,
    ) {
        match self.src_find_mut(entry, kind) {
            Some(src) => {
                src.flags = flags;
                src.dpo = dpo;
            }
            None => self.src_action_add(entry, kind, flags, dpo),
        }
    }

    /// Replaces every path of `kind` with `paths`.
    pub(crate) fn src_action_path_swap(
        &mut self,
        entry: EntryIndex,
        kind: SourceKind,
        flags: EntryFlags,
        paths: &[RoutePath],
    ) -> Result<()> {
        let mut configured: Vec<SourcePath> = Vec::with_capacity(paths.len());
        for path in paths {
            match configured.iter_mut().find(|p| p.path.key() == path.key()) {
                Some(existing) => existing.path = path.clone(),
                None => configured.push(SourcePath::new(path.clone())),
            }
        }
        let src = self
            .src_find_mut(entry, kind)
            .ok_or(FibError::EntryNotFound(entry))?;
        src.flags = flags;
        src.paths = configured;
        self.src_rebuild_path_list(entry, kind)
    }

    /// Adds one path to `kind`. Adding a path the source already has only
    /// counts another reference (and takes the new labels).
    fn src_action_path_add(
        &mut self,
        entry: EntryIndex,
        kind: SourceKind,
        flags: EntryFlags,
        path: &RoutePath,
    ) -> Result<()> {
        let src = self
            .src_find_mut(entry, kind)
            .ok_or(FibError::EntryNotFound(entry))?;
        src.flags = flags;
        if let Some(existing) = src.paths.iter_mut().find(|p| p.path.key() == path.key()) {
            existing.refs += 1;
            existing.path.labels = path.labels.clone();
            return Ok(());
        }
        src.paths.push(SourcePath::new(path.clone()));
        self.src_rebuild_path_list(entry, kind)
    }

    /// Drops one reference to a path of `kind`. Returns true when the
    /// source lost its last path.
    fn src_action_path_remove(
        &mut self,
        entry: EntryIndex,
        kind: SourceKind,
        path: &RoutePath,
    ) -> Result<bool> {
        let Some(src) = self.src_find_mut(entry, kind) else {
            return Ok(false);
        };
        let Some(pos) = src.paths.iter().position(|p| p.path.key() == path.key()) else {
            debug!("FibEntry: {} source {} has no path {}", entry, kind, path);
            return Ok(false);
        };
        src.paths[pos].refs -= 1;
        if src.paths[pos].refs > 0 {
            return Ok(false);
        }
        src.paths.remove(pos);
        if src.paths.is_empty() {
            return Ok(true);
        }
        self.src_rebuild_path_list(entry, kind)?;
        Ok(false)
    }

    /// Points the source at the shared path-list for its current paths.
    fn src_rebuild_path_list(&mut self, entry: EntryIndex, kind: SourceKind) -> Result<()> {
        let paths: Vec<RoutePath> = match self.src_find(entry, kind) {
            Some(src) => src.paths.iter().map(|p| p.path.clone()).collect(),
            None => return Ok(()),
        };
        let pl = if paths.is_empty() {
            None
        } else {
            let pl = self.path_list_find_or_create(&paths)?;
            self.path_list_lock(pl);
            Some(pl)
        };
        let old = match self.src_find_mut(entry, kind) {
            Some(src) => std::mem::replace(&mut src.path_list, pl),
            None => pl,
        };
        if let Some(old) = old {
            self.path_list_unlock(old);
        }
        Ok(())
    }

    /// Deletes the source record, deactivating it first if it is active.
    fn src_remove_record(&mut self, entry: EntryIndex, kind: SourceKind) {
        if self.src_find(entry, kind).is_some_and(|s| s.active) {
            self.src_action_deactivate(entry, kind);
        }
        let Some(fib_entry) = self.entries.get_mut(entry) else {
            return;
        };
        let Some(pos) = fib_entry.sources.iter().position(|s| s.kind == kind) else {
            return;
        };
        let src = fib_entry.sources.remove(pos);
        debug!("FibEntry: {} removed source {}", entry, kind);
        if let Some(cover) = src.cover {
            self.cover_untrack(cover, entry);
        }
        if let Some(pl) = src.path_list {
            self.path_list_unlock(pl);
        }
    }

    /// Links the entry under `pl` as a child, replacing any previous link.
    fn entry_link_parent(&mut self, entry: EntryIndex, pl: Option<PathListIndex>) {
        let Some(fib_entry) = self.entries.get(entry) else {
            return;
        };
        if fib_entry.parent == pl {
            return;
        }
        let (old, old_sibling) = (fib_entry.parent, fib_entry.sibling);

        let child = NodePtr::new(NodeType::Entry, entry.untyped());
        let sibling =
            pl.and_then(|pl| self.node_child_add::<PathListVft>(pl.untyped(), child));
        if let Some(fib_entry) = self.entries.get_mut(entry) {
            fib_entry.parent = pl;
            fib_entry.sibling = sibling;
        }
        if let (Some(old), Some(old_sibling)) = (old, old_sibling) {
            self.node_child_remove::<PathListVft>(old.untyped(), old_sibling);
        }
    }

    /// Makes `kind` the source the entry forwards with.
    pub(crate) fn src_action_activate(&mut self, entry: EntryIndex, kind: SourceKind) -> Result<()> {
        let Some(src) = self.src_find_mut(entry, kind) else {
            return Ok(());
        };
        src.active = true;
        self.record(FibEvent::Activated {
            entry,
            source: kind,
        });

        let install = self.src_behaviour_activate(entry, kind)?;
        let pl = self.src_find(entry, kind).and_then(|s| s.path_list);
        self.entry_link_parent(entry, pl);
        self.recursive_loop_detect(entry, &mut Vec::new());

        if install {
            self.src_action_install(entry, kind)
        } else {
            self.src_action_uninstall(entry);
            Ok(())
        }
    }

    /// Stops forwarding with `kind`. The cached load-balances stay so the
    /// next winner can update them in place.
    pub(crate) fn src_action_deactivate(&mut self, entry: EntryIndex, kind: SourceKind) {
        self.record(FibEvent::Deactivated {
            entry,
            source: kind,
        });
        self.src_behaviour_deactivate(entry, kind);
        if let Some(src) = self.src_find_mut(entry, kind) {
            src.active = false;
        }
        self.entry_link_parent(entry, None);
    }

    /// Re-applies the active source after its configuration or something
    /// it depends on changed.
    pub(crate) fn src_action_reactivate(&mut self, entry: EntryIndex, kind: SourceKind) -> Result<()> {
        let pl = match self.src_find(entry, kind) {
            Some(src) => src.path_list,
            None => return Ok(()),
        };
        if self.get(entry)?.parent != pl {
            self.entry_link_parent(entry, pl);
            self.recursive_loop_detect(entry, &mut Vec::new());
        }
        if self.src_behaviour_reactivate(entry, kind) {
            self.src_action_install(entry, kind)
        } else {
            self.src_action_uninstall(entry);
            Ok(())
        }
    }

    /// Builds the default chain from `kind`, hands the route to hardware
    /// if it was not already there, and refreshes every other chain built
    /// so far.
    pub(crate) fn src_action_install(&mut self, entry: EntryIndex, kind: SourceKind) -> Result<()> {
        let default_chain = self.get(entry)?.default_chain();
        self.mk_lb(entry, Some(kind), default_chain)?;

        let fib_entry = self.get(entry)?;
        if !fib_entry.installed {
            let (table_id, prefix) = (fib_entry.table_id, fib_entry.prefix);
            if let Some(dpo) = self.cached_forwarding(entry, default_chain)? {
                self.hw_enqueue(HwCommand::RouteInstall {
                    table_id,
                    prefix,
                    dpo,
                });
                self.get_mut(entry)?.installed = true;
            }
        }

        for chain in ChainType::ALL {
            if chain != default_chain && self.get(entry)?.slot(chain).is_some() {
                self.mk_lb(entry, Some(kind), chain)?;
            }
        }
        self.record(FibEvent::Installed {
            entry,
            source: kind,
        });
        Ok(())
    }

    /// Withdraws the route and releases every cached load-balance.
    pub(crate) fn src_action_uninstall(&mut self, entry: EntryIndex) {
        let Some(fib_entry) = self.entries.get_mut(entry) else {
            return;
        };
        let slots = std::mem::take(&mut fib_entry.forwarding);
        let withdraw = std::mem::replace(&mut fib_entry.installed, false)
            .then_some((fib_entry.table_id, fib_entry.prefix));

        if let Some((table_id, prefix)) = withdraw {
            self.hw_enqueue(HwCommand::RouteWithdraw { table_id, prefix });
        }
        for lb in slots.into_iter().flatten() {
            self.lb_unlock(lb);
        }
        self.record(FibEvent::Uninstalled { entry });
    }

    /// Creates or updates the load-balance of one chain from `source`'s
    /// contribution. An existing load-balance is updated in place.
    pub(crate) fn mk_lb(
        &mut self,
        entry: EntryIndex,
        source: Option<SourceKind>,
        chain: ChainType,
    ) -> Result<()> {
        self.building.push((entry, chain));
        let buckets = self.src_contribute(entry, source, chain);
        self.building.retain(|b| *b != (entry, chain));

        let slot = match self.entries.get(entry) {
            Some(fib_entry) => fib_entry.slot(chain),
            None => {
                self.buckets_release(&buckets);
                return Ok(());
            }
        };
        match slot {
            Some(lb) => self.lb_update(lb, buckets),
            None => {
                let lb = self.lb_create(chain.dpo_proto(), buckets)?;
                match self.entries.get_mut(entry) {
                    Some(fib_entry) => fib_entry.forwarding[chain.index()] = Some(lb),
                    None => self.lb_unlock(lb),
                }
            }
        }
        Ok(())
    }

    /// The buckets `source` contributes for `chain`.
    fn src_contribute(
        &mut self,
        entry: EntryIndex,
        source: Option<SourceKind>,
        chain: ChainType,
    ) -> Vec<LbBucket> {
        let proto = chain.dpo_proto();
        let drop = vec![LbBucket::new(Dpo::Drop(proto), 1)];
        let Some(src) = source.and_then(|kind| self.src_find(entry, kind)) else {
            return drop;
        };

        if src.flags.contains(EntryFlags::DROP) {
            return drop;
        }
        if src.flags.contains(EntryFlags::LOCAL) {
            return vec![LbBucket::new(Dpo::Receive(proto), 1)];
        }
        if let Some(dpo) = src.dpo {
            let dpo = match dpo {
                Dpo::Drop(_) => Dpo::Drop(proto),
                Dpo::Receive(_) => Dpo::Receive(proto),
                other => other,
            };
            self.dpo_lock(&dpo);
            return vec![LbBucket::new(dpo, 1)];
        }
        let Some(pl) = src.path_list else {
            return drop;
        };
        let labels: Vec<(PathKey, Vec<MplsLabel>)> = src
            .paths
            .iter()
            .filter(|p| !p.path.labels.is_empty())
            .map(|p| (p.path.key(), p.path.labels.clone()))
            .collect();
        self.path_list_contribute(pl, chain, &labels)
    }

    /// Re-selects the best source after `source` was added or changed.
    fn source_change(
        &mut self,
        entry: EntryIndex,
        old_best: Option<(SourceKind, EntryFlags)>,
        source: SourceKind,
    ) -> Result<()> {
        let bflags = old_best.map(|(_, flags)| flags).unwrap_or(EntryFlags::NONE);
        match old_best.map(|(best, _)| source.cmp(&best)) {
            None => self.src_action_activate(entry, source)?,
            Some(Ordering::Less) => {
                if let Some((best, _)) = old_best {
                    self.src_action_deactivate(entry, best);
                }
                self.src_action_activate(entry, source)?;
            }
            Some(Ordering::Equal) => {
                self.src_action_deactivate(entry, source);
                self.src_action_activate(entry, source)?;
            }
            Some(Ordering::Greater) => return Ok(()),
        }
        self.post_update_actions(entry, source, bflags)
    }

    /// Re-selects the best source after `source` lost a reference.
    fn source_removal(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        (best, bflags): (SourceKind, EntryFlags),
        gone: bool,
        still_present: StillPresent,
    ) -> Result<SourceStatus> {
        match source.cmp(&best) {
            Ordering::Less => {
                error!("FibEntry: {} source {} ranks above best source {}", entry, source, best);
                return Ok(SourceStatus::StillPresent);
            }
            Ordering::Greater => return Ok(SourceStatus::StillPresent),
            Ordering::Equal => {}
        }

        if !gone {
            match still_present {
                StillPresent::Reactivate => self.src_action_reactivate(entry, source)?,
                StillPresent::Restart => {
                    self.src_action_deactivate(entry, source);
                    self.src_action_activate(entry, source)?;
                }
            }
            self.post_update_actions(entry, source, bflags)?;
            return Ok(SourceStatus::StillPresent);
        }

        match self.best_source_kind(entry) {
            Some(next) => {
                debug!("FibEntry: {} best source {} -> {}", entry, best, next);
                self.src_action_activate(entry, next)?;
                self.post_update_actions(entry, next, bflags)?;
                Ok(SourceStatus::StillPresent)
            }
            None => {
                debug!("FibEntry: {} has no sources left", entry);
                self.src_action_uninstall(entry);
                self.post_flag_update_actions(entry, bflags)?;
                let ctx = BackWalkCtx::new(BackWalkReason::EVALUATE)
                    .with_flags(BackWalkFlags::FORCE_SYNC);
                back_walk_sync(self, NodePtr::new(NodeType::Entry, entry.untyped()), &ctx);
                Ok(SourceStatus::NoSourcesLeft)
            }
        }
    }

    /// Tells everything that depends on the entry that its forwarding
    /// changed, then runs the install-time actions.
    fn post_update_actions(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        old_flags: EntryFlags,
    ) -> Result<()> {
        let ctx =
            BackWalkCtx::new(BackWalkReason::EVALUATE).with_flags(BackWalkFlags::FORCE_SYNC);
        back_walk_sync(self, NodePtr::new(NodeType::Entry, entry.untyped()), &ctx);
        self.cover_update_notify(entry);
        self.post_install_actions(entry, source, old_flags)
    }

    pub(crate) fn post_install_actions(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        old_flags: EntryFlags,
    ) -> Result<()> {
        self.post_flag_update_actions(entry, old_flags)?;
        self.src_behaviour_installed(entry, source);
        Ok(())
    }

    /// Starts or stops importing attached routes when the IMPORT flag of
    /// the best source comes or goes.
    fn post_flag_update_actions(&mut self, entry: EntryIndex, old_flags: EntryFlags) -> Result<()> {
        let new_flags = self.get_flags(entry)?;
        let was_import = old_flags.contains(EntryFlags::IMPORT);
        let is_import = new_flags.contains(EntryFlags::IMPORT);

        if is_import && !was_import {
            let prefix = self.get_prefix(entry)?;
            match self.get_resolving_interface(entry)? {
                Some(interface) => {
                    let export_table = self.interface_table(prefix.proto(), interface);
                    self.attached_export_import(entry, export_table)?;
                }
                None => debug!("FibEntry: {} import without an interface", entry),
            }
        } else if was_import && !is_import {
            self.attached_export_purge(entry);
        }

        if new_flags.contains(EntryFlags::ATTACHED) && !old_flags.contains(EntryFlags::ATTACHED) {
            debug!("FibEntry: {} is now attached", entry);
        }
        Ok(())
    }

    /// Adds a reference to a source that forwards with `dpo` instead of
    /// paths.
    pub fn special_add(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Dpo,
    ) -> Result<()> {
        self.src_special_add(entry, source, flags, Some(dpo))
    }

    pub(crate) fn src_special_add(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Option<Dpo>,
    ) -> Result<()> {
        let best = self.best_with_flags(entry)?;
        self.src_action_add(entry, source, flags, dpo);
        self.source_change(entry, best, source)
    }

    /// Changes the flags and forwarding of a special source, adding it if
    /// the entry does not have it.
    pub fn special_update(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Dpo,
    ) -> Result<()> {
        let best = self.best_with_flags(entry)?;
        self.src_action_update(entry, source, flags, Some(dpo));
        self.source_change(entry, best, source)
    }

    /// Drops one reference to a special source.
    ///
    /// Returns `NoSourcesLeft` when the entry has no sources any more; the
    /// caller is then expected to remove it from its table.
    pub fn special_remove(&mut self, entry: EntryIndex, source: SourceKind) -> Result<SourceStatus> {
        let Some(best) = self.best_with_flags(entry)? else {
            return Ok(SourceStatus::NoSourcesLeft);
        };
        let Some(src) = self.src_find_mut(entry, source) else {
            debug!("FibEntry: {} has no source {}", entry, source);
            return Ok(SourceStatus::StillPresent);
        };
        src.ref_count = src.ref_count.saturating_sub(1);
        let gone = src.ref_count == 0;
        if gone {
            self.src_remove_record(entry, source);
        }
        self.source_removal(entry, source, best, gone, StillPresent::Reactivate)
    }

    /// Adds one path to `source`, creating the source if needed.
    pub fn path_add(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        flags: EntryFlags,
        path: &RoutePath,
    ) -> Result<()> {
        let best = self.best_with_flags(entry)?;
        let created = self.src_find(entry, source).is_none();
        if created {
            self.src_action_add(entry, source, flags, None);
        }
        if let Err(e) = self.src_action_path_add(entry, source, flags, path) {
            if created {
                self.src_remove_record(entry, source);
            }
            return Err(e);
        }
        self.source_change(entry, best, source)
    }

    /// Removes one reference to a path of `source`. The source goes away
    /// with its last path.
    pub fn path_remove(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        path: &RoutePath,
    ) -> Result<SourceStatus> {
        let Some(best) = self.best_with_flags(entry)? else {
            return Ok(SourceStatus::NoSourcesLeft);
        };
        if self.src_find(entry, source).is_none() {
            debug!("FibEntry: {} has no source {}", entry, source);
            return Ok(SourceStatus::StillPresent);
        }
        let gone = self.src_action_path_remove(entry, source, path)?;
        if gone {
            self.src_remove_record(entry, source);
        }
        self.source_removal(entry, source, best, gone, StillPresent::Restart)
    }

    /// Replaces every path of `source`, creating the source if needed.
    pub fn update(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
        flags: EntryFlags,
        paths: &[RoutePath],
    ) -> Result<()> {
        if paths.is_empty() {
            return Err(FibError::InvalidPaths(format!(
                "update of {} on entry {} without paths",
                source, entry
            )));
        }
        let best = self.best_with_flags(entry)?;
        let created = self.src_find(entry, source).is_none();
        if created {
            self.src_action_add(entry, source, flags, None);
        }
        if let Err(e) = self.src_action_path_swap(entry, source, flags, paths) {
            if created {
                self.src_remove_record(entry, source);
            }
            return Err(e);
        }
        self.source_change(entry, best, source)
    }

    /// Removes `source` from the entry.
    pub fn delete(&mut self, entry: EntryIndex, source: SourceKind) -> Result<SourceStatus> {
        self.special_remove(entry, source)
    }

    fn src_behaviour_activate(&mut self, entry: EntryIndex, kind: SourceKind) -> Result<bool> {
        let Some(src) = self.src_find(entry, kind) else {
            return Ok(false);
        };
        let flags = src.flags;
        let (table_id, prefix) = {
            let fib_entry = self.get(entry)?;
            (fib_entry.table_id, fib_entry.prefix)
        };

        match kind.behaviour() {
            SourceBehaviour::Adjacency => {
                let cover = self.table_less_specific(table_id, &prefix);
                self.src_set_cover(entry, kind, cover);
                Ok(cover.is_some_and(|c| self.entry_is_attached(c)))
            }
            SourceBehaviour::Interface if flags.contains(EntryFlags::LOCAL) => {
                let cover = self.table_less_specific(table_id, &prefix);
                self.src_set_cover(entry, kind, cover);
                Ok(true)
            }
            SourceBehaviour::RecursiveResolution => {
                let Some(cover) = self.table_less_specific(table_id, &prefix) else {
                    return Ok(true);
                };
                self.src_set_cover(entry, kind, Some(cover));
                let pl = self.rr_inherit(entry, cover)?;
                let old = self
                    .src_find_mut(entry, kind)
                    .and_then(|src| std::mem::replace(&mut src.path_list, pl));
                if let Some(old) = old {
                    self.path_list_unlock(old);
                }
                Ok(true)
            }
            _ => Ok(true),
        }
    }

    fn src_set_cover(&mut self, entry: EntryIndex, kind: SourceKind, cover: Option<EntryIndex>) {
        if let Some(cover) = cover {
            self.cover_track(cover, entry);
        }
        if let Some(src) = self.src_find_mut(entry, kind) {
            src.cover = cover;
        }
    }

    /// The path-list a recursive-resolution entry forwards with, locked.
    /// A host under an attached cover gets its own neighbour; anything
    /// else forwards like its cover.
    fn rr_inherit(&mut self, entry: EntryIndex, cover: EntryIndex) -> Result<Option<PathListIndex>> {
        let prefix = self.get_prefix(entry)?;
        if self.entry_is_attached(cover) && prefix.is_host() {
            let interface = self.get_resolving_interface(cover)?;
            if let (Some(interface), Some(ip)) = (interface, prefix.as_ip()) {
                let pl = self.path_list_find_or_create(&[RoutePath::attached(interface, *ip.address())])?;
                self.path_list_lock(pl);
                return Ok(Some(pl));
            }
        }
        let pl = self.get(cover)?.parent;
        if let Some(pl) = pl {
            self.path_list_lock(pl);
        }
        Ok(pl)
    }

    pub(crate) fn entry_is_attached(&self, entry: EntryIndex) -> bool {
        self.get_flags(entry)
            .is_ok_and(|flags| flags.contains(EntryFlags::ATTACHED))
    }

    fn src_behaviour_deactivate(&mut self, entry: EntryIndex, kind: SourceKind) {
        let Some(src) = self.src_find_mut(entry, kind) else {
            return;
        };
        let cover = src.cover.take();
        let inherited = match kind.behaviour() {
            SourceBehaviour::RecursiveResolution => src.path_list.take(),
            _ => None,
        };

        if let Some(cover) = cover {
            if kind.behaviour() != SourceBehaviour::RecursiveResolution {
                self.attached_export_covered_removed(cover, entry);
            }
            self.cover_untrack(cover, entry);
        }
        if let Some(pl) = inherited {
            self.path_list_unlock(pl);
        }
    }

    /// Whether a re-activated source may install.
    fn src_behaviour_reactivate(&self, entry: EntryIndex, kind: SourceKind) -> bool {
        match kind.behaviour() {
            SourceBehaviour::Adjacency => self
                .src_find(entry, kind)
                .and_then(|s| s.cover)
                .is_some_and(|cover| self.entry_is_attached(cover)),
            _ => true,
        }
    }

    fn src_behaviour_installed(&mut self, entry: EntryIndex, kind: SourceKind) {
        let Some(src) = self.src_find(entry, kind) else {
            return;
        };
        let exports = match kind.behaviour() {
            SourceBehaviour::Adjacency => true,
            SourceBehaviour::Interface => src.flags.contains(EntryFlags::LOCAL),
            _ => false,
        };
        if let (true, Some(cover)) = (exports, src.cover) {
            self.attached_export_covered_added(cover, entry);
        }
    }

    /// A source's reaction to the entry's cover being replaced.
    pub(crate) fn src_behaviour_cover_change(
        &mut self,
        entry: EntryIndex,
        kind: SourceKind,
    ) -> Result<CoverResult> {
        let Some(src) = self.src_find(entry, kind) else {
            return Ok(CoverResult::default());
        };
        if !src.active {
            return Ok(CoverResult::default());
        }
        let (flags, cover) = (src.flags, src.cover);

        match kind.behaviour() {
            SourceBehaviour::Adjacency => {
                self.src_behaviour_deactivate(entry, kind);
                let install = self.src_behaviour_activate(entry, kind)?;
                Ok(CoverResult {
                    install,
                    walk: if install {
                        BackWalkReason::EVALUATE
                    } else {
                        BackWalkReason::NONE
                    },
                })
            }
            SourceBehaviour::Interface if flags.contains(EntryFlags::LOCAL) => {
                self.src_behaviour_deactivate(entry, kind);
                self.src_behaviour_activate(entry, kind)?;
                Ok(CoverResult::default())
            }
            SourceBehaviour::RecursiveResolution => {
                let fib_entry = self.get(entry)?;
                let now = self.table_less_specific(fib_entry.table_id, &fib_entry.prefix);
                if now == cover {
                    return Ok(CoverResult::default());
                }
                self.src_behaviour_deactivate(entry, kind);
                self.src_behaviour_activate(entry, kind)?;
                Ok(CoverResult {
                    install: true,
                    walk: BackWalkReason::EVALUATE,
                })
            }
            _ => Ok(CoverResult::default()),
        }
    }

    /// A source's reaction to the forwarding or flags of its cover
    /// changing.
    pub(crate) fn src_behaviour_cover_update(
        &mut self,
        entry: EntryIndex,
        kind: SourceKind,
    ) -> Result<CoverResult> {
        let Some(src) = self.src_find(entry, kind) else {
            return Ok(CoverResult::default());
        };
        if !src.active {
            return Ok(CoverResult::default());
        }
        let cover = src.cover;

        match (kind.behaviour(), cover) {
            (SourceBehaviour::Adjacency, _) => {
                let install = cover.is_some_and(|c| self.entry_is_attached(c));
                Ok(CoverResult {
                    install,
                    walk: if install {
                        BackWalkReason::EVALUATE
                    } else {
                        BackWalkReason::NONE
                    },
                })
            }
            (SourceBehaviour::RecursiveResolution, Some(cover)) => {
                let pl = self.rr_inherit(entry, cover)?;
                let old = self
                    .src_find_mut(entry, kind)
                    .and_then(|src| std::mem::replace(&mut src.path_list, pl));
                if let Some(old) = old {
                    self.path_list_unlock(old);
                }
                Ok(CoverResult {
                    install: true,
                    walk: BackWalkReason::EVALUATE,
                })
            }
            _ => Ok(CoverResult::default()),
        }
    }
}
