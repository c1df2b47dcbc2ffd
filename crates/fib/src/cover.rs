//! Cover tracking.
//!
//! Some sources depend on the entry's cover, the longest less-specific
//! prefix in the same table. They register with the cover and are told
//! when the cover is replaced (an entry was inserted between them, or
//! the cover was removed) or when the cover's forwarding changed.

use crate::entry::EntryIndex;
use crate::error::Result;
use crate::fib::Fib;
use crate::source::CoverResult;
use fib_node::{back_walk_sync, BackWalkCtx, NodePtr, NodeType};
use log::{debug, warn};

/// Which of the cover notifications is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CoverEvent {
    Changed,
    Updated,
}

impl Fib {
    pub(crate) fn cover_track(&mut self, cover: EntryIndex, covered: EntryIndex) {
        if let Some(entry) = self.entries.get_mut(cover) {
            entry.covered.push(covered);
            debug!("FibEntry: {} tracks cover {}", covered, cover);
        }
    }

    pub(crate) fn cover_untrack(&mut self, cover: EntryIndex, covered: EntryIndex) {
        if let Some(entry) = self.entries.get_mut(cover) {
            if let Some(pos) = entry.covered.iter().position(|c| *c == covered) {
                entry.covered.remove(pos);
            }
        }
    }

    /// Entries tracking `cover`, each once.
    fn covered_snapshot(&self, cover: EntryIndex) -> Vec<EntryIndex> {
        let mut covered = self
            .entries
            .get(cover)
            .map(|e| e.covered.clone())
            .unwrap_or_default();
        covered.sort();
        covered.dedup();
        covered
    }

    /// Tells the entries tracking `cover` that their cover may have been
    /// replaced. With `new_cover` (an entry just inserted below `cover`),
    /// only the entries it now covers are told; without it (`cover` is
    /// being removed) all of them are.
    pub(crate) fn cover_change_notify(&mut self, cover: EntryIndex, new_cover: Option<EntryIndex>) {
        let new_prefix = match new_cover {
            Some(new_cover) => match self.entries.get(new_cover) {
                Some(entry) => Some(entry.prefix),
                None => return,
            },
            None => None,
        };
        for covered in self.covered_snapshot(cover) {
            if Some(covered) == new_cover {
                continue;
            }
            let affected = match (&new_prefix, self.entries.get(covered)) {
                (_, None) => false,
                (None, Some(_)) => true,
                (Some(new_prefix), Some(entry)) => new_prefix.contains(&entry.prefix),
            };
            if affected {
                if let Err(e) = self.cover_changed(covered) {
                    warn!("FibEntry: {} cover change failed: {}", covered, e);
                }
            }
        }
    }

    /// Tells the entries tracking `cover` that its forwarding changed.
    pub(crate) fn cover_update_notify(&mut self, cover: EntryIndex) {
        for covered in self.covered_snapshot(cover) {
            if let Err(e) = self.cover_updated(covered) {
                warn!("FibEntry: {} cover update failed: {}", covered, e);
            }
        }
    }

    /// The entry's cover was replaced. Every source re-evaluates; the
    /// best source's reaction decides whether the entry stays installed.
    pub fn cover_changed(&mut self, entry: EntryIndex) -> Result<()> {
        self.cover_react(entry, CoverEvent::Changed)
    }

    /// The forwarding or flags of the entry's cover changed.
    pub fn cover_updated(&mut self, entry: EntryIndex) -> Result<()> {
        self.cover_react(entry, CoverEvent::Updated)
    }

    fn cover_react(&mut self, entry: EntryIndex, event: CoverEvent) -> Result<()> {
        self.attached_export_cover_resync(entry);

        let fib_entry = self.get(entry)?;
        let Some(best) = fib_entry.best_source().map(|s| s.kind) else {
            return Ok(());
        };
        let bflags = self.get_flags(entry)?;
        let kinds: Vec<_> = fib_entry.sources.iter().map(|s| s.kind).collect();

        let mut res = CoverResult::default();
        for kind in kinds {
            let reaction = match event {
                CoverEvent::Changed => self.src_behaviour_cover_change(entry, kind)?,
                CoverEvent::Updated => self.src_behaviour_cover_update(entry, kind)?,
            };
            if kind == best {
                res = reaction;
            }
        }
        debug!(
            "FibEntry: {} cover {:?} install:{} walk:{}",
            entry, event, res.install, res.walk
        );

        if res.install {
            self.src_action_reactivate(entry, best)?;
            self.post_install_actions(entry, best, bflags)?;
        } else {
            self.src_action_uninstall(entry);
        }

        if !res.walk.is_empty() {
            back_walk_sync(
                self,
                NodePtr::new(NodeType::Entry, entry.untyped()),
                &BackWalkCtx::new(res.walk),
            );
        }
        Ok(())
    }
}
