//! Attached export.
//!
//! An entry with the IMPORT flag copies the attached host routes of its
//! prefix from the table of its interface (the export table) into its
//! own table. The entry for the same prefix in the export table is the
//! exporter: every host route it covers is imported, and hosts that come
//! and go under it later are pushed to each importer.

use crate::entry::EntryIndex;
use crate::error::Result;
use crate::fib::Fib;
use crate::source::{EntryFlags, SourceKind};
use fib_node::Index;
use fib_types::{FibPrefix, FibProtocol};
use log::{debug, info, warn};

pub type ImportIndex = Index<ImportRecord>;
pub type ExportIndex = Index<ExportRecord>;

/// The importing side: who imports from where, and what it imported.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    importer: EntryIndex,
    proto: FibProtocol,
    import_table: u32,
    export_table: u32,
    exporter: EntryIndex,
    imported: Vec<FibPrefix>,
}

impl ImportRecord {
    pub fn importer(&self) -> EntryIndex {
        self.importer
    }

    pub fn proto(&self) -> FibProtocol {
        self.proto
    }

    pub fn import_table(&self) -> u32 {
        self.import_table
    }

    pub fn export_table(&self) -> u32 {
        self.export_table
    }

    pub fn exporter(&self) -> EntryIndex {
        self.exporter
    }

    /// Prefixes copied into the import table, in import order.
    pub fn imported(&self) -> &[FibPrefix] {
        &self.imported
    }
}

/// The exporting side: the importers to push covered hosts to.
#[derive(Debug, Clone)]
pub struct ExportRecord {
    exporter: EntryIndex,
    importers: Vec<ImportIndex>,
}

impl ExportRecord {
    pub fn exporter(&self) -> EntryIndex {
        self.exporter
    }

    pub fn importers(&self) -> &[ImportIndex] {
        &self.importers
    }
}

impl Fib {
    /// Starts importing the attached hosts of `importer`'s prefix from
    /// `export_table`. Any previous import is purged first.
    pub(crate) fn attached_export_import(
        &mut self,
        importer: EntryIndex,
        export_table: u32,
    ) -> Result<()> {
        let entry = self.get(importer)?;
        let (import_table, prefix) = (entry.table_id, entry.prefix);
        if import_table == export_table {
            debug!(
                "AttachedExport: {} {} imports from its own table",
                importer, prefix
            );
            return Ok(());
        }
        self.attached_export_purge(importer);

        let exporter = self.table_entry_source_add(
            export_table,
            prefix,
            SourceKind::AttachedExport,
            EntryFlags::NONE,
            None,
        )?;
        self.lock(exporter)?;

        let import = match self.imports.alloc(ImportRecord {
            importer,
            proto: prefix.proto(),
            import_table,
            export_table,
            exporter,
            imported: Vec::new(),
        }) {
            Ok(import) => import,
            Err(e) => {
                self.attached_export_release_exporter(exporter);
                return Err(e.into());
            }
        };
        self.get_mut(importer)?.import = Some(import);

        let export = match self.get(exporter)?.export {
            Some(export) => export,
            None => {
                let export = self.exports.alloc(ExportRecord {
                    exporter,
                    importers: Vec::new(),
                })?;
                self.get_mut(exporter)?.export = Some(export);
                export
            }
        };
        if let Some(record) = self.exports.get_mut(export) {
            record.importers.push(import);
        }
        info!(
            "AttachedExport: {} {} imports from table {} exporter {}",
            importer, prefix, export_table, exporter
        );

        let mut covered = self.get(exporter)?.covered.clone();
        covered.sort();
        covered.dedup();
        for entry in covered {
            self.attached_export_import_one(import, entry);
        }
        Ok(())
    }

    /// Copies one covered host into an import's table.
    fn attached_export_import_one(&mut self, import: ImportIndex, covered: EntryIndex) {
        let Some(record) = self.imports.get(import) else {
            return;
        };
        let import_table = record.import_table;
        let Some(entry) = self.entries.get(covered) else {
            return;
        };
        let exportable = match entry.best_source() {
            Some(src) => {
                src.kind == SourceKind::Adjacency
                    || (src.kind == SourceKind::Interface && src.flags.contains(EntryFlags::LOCAL))
            }
            None => false,
        };
        if !exportable {
            return;
        }
        let prefix = entry.prefix;
        let flags = self.get_flags(covered).unwrap_or(EntryFlags::NONE) & EntryFlags::LOCAL;
        let paths = match self.encode(covered) {
            Ok(paths) if !paths.is_empty() => paths,
            _ => {
                debug!("AttachedExport: {} has no paths to export", prefix);
                return;
            }
        };

        match self.table_entry_update(import_table, prefix, SourceKind::AttachedExport, flags, &paths)
        {
            Ok(_) => {
                if let Some(record) = self.imports.get_mut(import) {
                    if !record.imported.contains(&prefix) {
                        record.imported.push(prefix);
                    }
                }
                debug!("AttachedExport: Imported {} into table {}", prefix, import_table);
            }
            Err(e) => warn!(
                "AttachedExport: Failed to import {} into table {}: {}",
                prefix, import_table, e
            ),
        }
    }

    /// Stops `importer` importing and deletes what it imported.
    pub(crate) fn attached_export_purge(&mut self, importer: EntryIndex) {
        let import = self
            .entries
            .get_mut(importer)
            .and_then(|entry| entry.import.take());
        if let Some(import) = import {
            self.attached_export_release_import(import);
        }
    }

    pub(crate) fn attached_export_release_import(&mut self, import: ImportIndex) {
        let Some(record) = self.imports.free(import) else {
            return;
        };
        debug!(
            "AttachedExport: {} stops importing {} routes from table {}",
            record.importer,
            record.imported.len(),
            record.export_table
        );
        for prefix in &record.imported {
            if let Err(e) =
                self.table_entry_special_remove(record.import_table, prefix, SourceKind::AttachedExport)
            {
                warn!("AttachedExport: Failed to remove {}: {}", prefix, e);
            }
        }

        let export = self.entries.get(record.exporter).and_then(|e| e.export);
        if let Some(export) = export {
            let empty = match self.exports.get_mut(export) {
                Some(exports) => {
                    exports.importers.retain(|i| *i != import);
                    exports.importers.is_empty()
                }
                None => false,
            };
            if empty {
                self.exports.free(export);
                if let Some(entry) = self.entries.get_mut(record.exporter) {
                    entry.export = None;
                }
            }
        }
        self.attached_export_release_exporter(record.exporter);
    }

    fn attached_export_release_exporter(&mut self, exporter: EntryIndex) {
        if let Err(e) = self.table_entry_source_remove(exporter, SourceKind::AttachedExport) {
            debug!("AttachedExport: Exporter {} already gone: {}", exporter, e);
        }
        if self.entries.contains(exporter) {
            if let Err(e) = self.unlock(exporter) {
                debug!("AttachedExport: Exporter {} unlock: {}", exporter, e);
            }
        }
    }

    /// Drops the export record of an exporter being finalized.
    pub(crate) fn attached_export_release_export(&mut self, export: ExportIndex) {
        if let Some(record) = self.exports.free(export) {
            if !record.importers.is_empty() {
                warn!(
                    "AttachedExport: Exporter {} gone with {} importers",
                    record.exporter,
                    record.importers.len()
                );
            }
        }
    }

    /// A host appeared under `cover`; push it to every importer.
    pub(crate) fn attached_export_covered_added(&mut self, cover: EntryIndex, covered: EntryIndex) {
        let importers = self.attached_export_importers(cover);
        for import in importers {
            self.attached_export_import_one(import, covered);
        }
    }

    /// A host under `cover` went away; withdraw it from every importer.
    pub(crate) fn attached_export_covered_removed(&mut self, cover: EntryIndex, covered: EntryIndex) {
        let Some(prefix) = self.entries.get(covered).map(|e| e.prefix) else {
            return;
        };
        for import in self.attached_export_importers(cover) {
            let Some(record) = self.imports.get_mut(import) else {
                continue;
            };
            let Some(pos) = record.imported.iter().position(|p| *p == prefix) else {
                continue;
            };
            record.imported.remove(pos);
            let import_table = record.import_table;
            if let Err(e) =
                self.table_entry_special_remove(import_table, &prefix, SourceKind::AttachedExport)
            {
                warn!("AttachedExport: Failed to remove {}: {}", prefix, e);
            }
        }
    }

    fn attached_export_importers(&self, exporter: EntryIndex) -> Vec<ImportIndex> {
        self.entries
            .get(exporter)
            .and_then(|e| e.export)
            .and_then(|export| self.exports.get(export))
            .map(|record| record.importers.clone())
            .unwrap_or_default()
    }

    /// Re-imports after the importer's cover changed, in case its
    /// exporter is no longer the right one.
    pub(crate) fn attached_export_cover_resync(&mut self, importer: EntryIndex) {
        let Some(import) = self.entries.get(importer).and_then(|e| e.import) else {
            return;
        };
        let Some(export_table) = self.imports.get(import).map(|r| r.export_table) else {
            return;
        };
        self.attached_export_purge(importer);
        if let Err(e) = self.attached_export_import(importer, export_table) {
            warn!("AttachedExport: {} re-import failed: {}", importer, e);
        }
    }

    pub fn import_record(&self, entry: EntryIndex) -> Option<&ImportRecord> {
        self.entries
            .get(entry)
            .and_then(|e| e.import)
            .and_then(|import| self.imports.get(import))
    }

    pub fn export_record(&self, entry: EntryIndex) -> Option<&ExportRecord> {
        self.entries
            .get(entry)
            .and_then(|e| e.export)
            .and_then(|export| self.exports.get(export))
    }
}
