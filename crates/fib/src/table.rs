//! Forwarding tables: the (protocol, table id) indexes of entries, and the
//! table-level helpers that find or create entries by prefix.
//!
//! A table holds one lock on every entry it indexes. Removing a source
//! through a table helper evicts the entry once it has no sources left.

use crate::entry::EntryIndex;
use crate::error::Result;
use crate::fib::Fib;
use crate::path::RoutePath;
use crate::source::{EntryFlags, SourceKind, SourceStatus};
use fib_dpo::Dpo;
use fib_node::SyncMap;
use fib_types::{FibPrefix, FibProtocol, InterfaceIndex};
use log::{debug, info, warn};

/// One forwarding table.
#[derive(Debug)]
pub struct FibTable {
    proto: FibProtocol,
    table_id: u32,
    entries: SyncMap<FibPrefix, EntryIndex>,
}

impl FibTable {
    fn new(proto: FibProtocol, table_id: u32) -> Self {
        Self {
            proto,
            table_id,
            entries: SyncMap::new(),
        }
    }

    pub fn proto(&self) -> FibProtocol {
        self.proto
    }

    pub fn table_id(&self) -> u32 {
        self.table_id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by prefix.
    pub fn entries(&self) -> Vec<(FibPrefix, EntryIndex)> {
        let mut entries: Vec<(FibPrefix, EntryIndex)> =
            self.entries.iter().map(|(p, e)| (*p, *e)).collect();
        entries.sort();
        entries
    }
}

impl Fib {
    /// Creates the table if it does not exist. A new IP table starts
    /// with a 0/0 route that drops.
    pub(crate) fn table_find_or_create(&mut self, proto: FibProtocol, table_id: u32) -> Result<()> {
        if self.tables.contains_key(&(proto, table_id)) {
            return Ok(());
        }
        info!("FibTable: Created {} table {}", proto, table_id);
        self.tables
            .insert((proto, table_id), FibTable::new(proto, table_id));

        let default_route: Option<FibPrefix> = match proto {
            FibProtocol::Ip4 => Some("0.0.0.0/0".parse()?),
            FibProtocol::Ip6 => Some("::/0".parse()?),
            FibProtocol::Mpls => None,
        };
        if let Some(prefix) = default_route {
            self.entry_create(
                table_id,
                prefix,
                SourceKind::DefaultRoute,
                EntryFlags::DROP,
                Some(Dpo::Drop(proto.to_dpo_proto())),
                &[],
            )?;
        }
        Ok(())
    }

    pub fn table(&self, proto: FibProtocol, table_id: u32) -> Option<&FibTable> {
        self.tables.get(&(proto, table_id))
    }

    /// Every table, sorted by protocol then id.
    pub fn tables(&self) -> Vec<&FibTable> {
        let mut tables: Vec<&FibTable> = self.tables.values().collect();
        tables.sort_by_key(|t| (t.proto, t.table_id));
        tables
    }

    /// The entry for exactly `prefix`.
    pub fn table_lookup_exact(&self, table_id: u32, prefix: &FibPrefix) -> Option<EntryIndex> {
        self.tables
            .get(&(prefix.proto(), table_id))?
            .entries
            .get(prefix)
            .copied()
    }

    /// Longest-prefix match. MPLS tables only match exactly.
    pub fn table_lookup(&self, table_id: u32, prefix: &FibPrefix) -> Option<EntryIndex> {
        if prefix.is_mpls() {
            return self.table_lookup_exact(table_id, prefix);
        }
        (0..=prefix.prefix_len())
            .rev()
            .filter_map(|len| prefix.truncate(len))
            .find_map(|candidate| self.table_lookup_exact(table_id, &candidate))
    }

    /// The longest entry strictly less specific than `prefix`: its cover.
    pub(crate) fn table_less_specific(&self, table_id: u32, prefix: &FibPrefix) -> Option<EntryIndex> {
        if prefix.is_mpls() {
            return None;
        }
        (0..prefix.prefix_len())
            .rev()
            .filter_map(|len| prefix.truncate(len))
            .find_map(|candidate| self.table_lookup_exact(table_id, &candidate))
    }

    /// Indexes a new entry and tells the entries it now covers.
    pub(crate) fn table_entry_insert(&mut self, entry: EntryIndex) {
        let Some((table_id, prefix)) = self.entries.get(entry).map(|e| (e.table_id, e.prefix))
        else {
            return;
        };
        let Some(table) = self.tables.get_mut(&(prefix.proto(), table_id)) else {
            return;
        };
        table.entries.insert(prefix, entry);
        self.lock_node(entry);
        debug!("FibTable: Inserted {}:{} as {}", table_id, prefix, entry);

        if let Some(cover) = self.table_less_specific(table_id, &prefix) {
            self.cover_change_notify(cover, Some(entry));
        }
    }

    /// Evicts an entry from its table and releases the table's lock.
    fn table_entry_remove(&mut self, entry: EntryIndex) {
        let Some((table_id, prefix)) = self.entries.get(entry).map(|e| (e.table_id, e.prefix))
        else {
            return;
        };
        let indexed = self
            .tables
            .get_mut(&(prefix.proto(), table_id))
            .filter(|table| table.entries.get(&prefix) == Some(&entry))
            .and_then(|table| table.entries.remove(&prefix));
        if indexed.is_none() {
            return;
        }
        debug!("FibTable: Removed {}:{} ({})", table_id, prefix, entry);
        self.cover_change_notify(entry, None);
        if let Err(e) = self.unlock(entry) {
            warn!("FibTable: Unlock of {} failed: {}", entry, e);
        }
    }

    /// Adds a reference to `source` on the entry for `prefix`, creating
    /// the entry if needed. `dpo` is the forwarding of a special source.
    pub(crate) fn table_entry_source_add(
        &mut self,
        table_id: u32,
        prefix: FibPrefix,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Option<Dpo>,
    ) -> Result<EntryIndex> {
        match self.table_lookup_exact(table_id, &prefix) {
            Some(entry) => {
                self.src_special_add(entry, source, flags, dpo)?;
                Ok(entry)
            }
            None => self.entry_create(table_id, prefix, source, flags, dpo, &[]),
        }
    }

    /// Drops a reference to `source` on `entry`, evicting the entry from
    /// its table when no source remains.
    pub(crate) fn table_entry_source_remove(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
    ) -> Result<SourceStatus> {
        self.lock(entry)?;
        let status = self.special_remove(entry, source);
        if let Ok(SourceStatus::NoSourcesLeft) = status {
            self.table_entry_remove(entry);
        }
        self.unlock(entry)?;
        status
    }

    pub fn table_entry_special_add(
        &mut self,
        table_id: u32,
        prefix: FibPrefix,
        source: SourceKind,
        flags: EntryFlags,
        dpo: Dpo,
    ) -> Result<EntryIndex> {
        self.table_entry_source_add(table_id, prefix, source, flags, Some(dpo))
    }

    /// Adds a path for `source` to the entry for `prefix`.
    pub fn table_entry_path_add(
        &mut self,
        table_id: u32,
        prefix: FibPrefix,
        source: SourceKind,
        flags: EntryFlags,
        path: &RoutePath,
    ) -> Result<EntryIndex> {
        match self.table_lookup_exact(table_id, &prefix) {
            Some(entry) => {
                self.path_add(entry, source, flags, path)?;
                Ok(entry)
            }
            None => self.create(table_id, prefix, source, flags, std::slice::from_ref(path)),
        }
    }

    /// Sets the paths of `source` on the entry for `prefix`.
    pub fn table_entry_update(
        &mut self,
        table_id: u32,
        prefix: FibPrefix,
        source: SourceKind,
        flags: EntryFlags,
        paths: &[RoutePath],
    ) -> Result<EntryIndex> {
        match self.table_lookup_exact(table_id, &prefix) {
            Some(entry) => {
                self.update(entry, source, flags, paths)?;
                Ok(entry)
            }
            None => self.create(table_id, prefix, source, flags, paths),
        }
    }

    /// Removes a path of `source` from the entry for `prefix`. A prefix
    /// with no entry reports `NoSourcesLeft`.
    pub fn table_entry_path_remove(
        &mut self,
        table_id: u32,
        prefix: &FibPrefix,
        source: SourceKind,
        path: &RoutePath,
    ) -> Result<SourceStatus> {
        let Some(entry) = self.table_lookup_exact(table_id, prefix) else {
            return Ok(SourceStatus::NoSourcesLeft);
        };
        self.lock(entry)?;
        let status = self.path_remove(entry, source, path);
        if let Ok(SourceStatus::NoSourcesLeft) = status {
            self.table_entry_remove(entry);
        }
        self.unlock(entry)?;
        status
    }

    pub fn table_entry_special_remove(
        &mut self,
        table_id: u32,
        prefix: &FibPrefix,
        source: SourceKind,
    ) -> Result<SourceStatus> {
        match self.table_lookup_exact(table_id, prefix) {
            Some(entry) => self.table_entry_source_remove(entry, source),
            None => Ok(SourceStatus::NoSourcesLeft),
        }
    }

    /// Removes `source` from the entry for `prefix`.
    pub fn table_entry_delete(
        &mut self,
        table_id: u32,
        prefix: &FibPrefix,
        source: SourceKind,
    ) -> Result<SourceStatus> {
        self.table_entry_special_remove(table_id, prefix, source)
    }

    pub fn table_entry_delete_index(
        &mut self,
        entry: EntryIndex,
        source: SourceKind,
    ) -> Result<SourceStatus> {
        self.table_entry_source_remove(entry, source)
    }

    /// Binds an interface to a table; attached routes on the interface
    /// are exported from that table.
    pub fn interface_bind_table(&mut self, proto: FibProtocol, interface: InterfaceIndex, table_id: u32) {
        info!("FibTable: {} bound to {} table {}", interface, proto, table_id);
        self.interface_tables.insert((proto, interface), table_id);
    }

    /// The table an interface is bound to, or the default table.
    pub fn interface_table(&self, proto: FibProtocol, interface: InterfaceIndex) -> u32 {
        self.interface_tables
            .get(&(proto, interface))
            .copied()
            .unwrap_or(self.config.default_table_id)
    }
}
