//! Text rendering of entries, for the CLI and for logs.

use crate::chain::ChainType;
use crate::entry::EntryIndex;
use crate::error::Result;
use crate::fib::Fib;
use crate::load_balance::LbIndex;
use crate::path::PathListIndex;
use fib_dpo::Dpo;
use std::fmt::Write;

/// How much of an entry to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FormatLevel {
    /// Prefix and forwarding.
    #[default]
    Brief,
    /// Adds sources, paths, covered entries and imports.
    Detail,
    /// Adds every chain built and the entry's children.
    Detail2,
}

impl Fib {
    /// Renders one entry.
    ///
    /// ```text
    /// 10.0.0.0/24 fib:0 index:3 locks:2
    ///   src:api refs:1 flags:attached,
    ///     path-list:[1] locks:1 ip4 via 10.0.0.1 if1 weight:1
    ///  forwarding:   unicast-ip4-chain
    ///   [@0]: ip4-load-balance:[@7] buckets:1
    ///     [0] ip4-adjacency:[@5] weight:1
    /// ```
    pub fn format(&self, entry: EntryIndex, level: FormatLevel) -> Result<String> {
        let fib_entry = self.get(entry)?;
        let mut s = String::new();

        let _ = write!(s, "{}", fib_entry.prefix);
        if level >= FormatLevel::Detail {
            let _ = write!(
                s,
                " fib:{} index:{} locks:{}",
                fib_entry.table_id,
                entry,
                fib_entry.locks()
            );
            for src in fib_entry.sources() {
                let _ = write!(s, "\n  src:{} refs:{}", src.kind(), src.ref_count());
                if !src.flags().is_empty() {
                    let _ = write!(s, " flags:{},", src.flags());
                }
                if src.is_active() {
                    let _ = write!(s, " active");
                }
                if let Some(dpo) = src.dpo() {
                    let _ = write!(s, "\n    {}", dpo);
                }
                if let Some(pl) = src.path_list() {
                    let _ = write!(s, "\n    {}", self.format_path_list(pl));
                }
                let extensions: Vec<String> = src
                    .paths()
                    .iter()
                    .filter(|p| !p.path().labels.is_empty())
                    .map(|p| p.path().to_string())
                    .collect();
                if !extensions.is_empty() {
                    let _ = write!(s, "\n    Extensions:");
                    for ext in extensions {
                        let _ = write!(s, "\n     {}", ext);
                    }
                }
            }
            if !fib_entry.covered.is_empty() {
                let covered: Vec<String> =
                    fib_entry.covered.iter().map(|c| c.to_string()).collect();
                let _ = write!(
                    s,
                    "\n tracking {} covered: {}",
                    covered.len(),
                    covered.join(" ")
                );
            }
            if let Some(import) = self.import_record(entry) {
                let _ = write!(
                    s,
                    "\n Attached-Import: export-table:{} exporter:{} imported:{}",
                    import.export_table(),
                    import.exporter(),
                    import.imported().len()
                );
            }
            if let Some(export) = self.export_record(entry) {
                let _ = write!(s, "\n Attached-Export: importers:{}", export.importers().len());
            }
            let _ = write!(s, "\n forwarding: ");
        } else {
            s.push('\n');
        }

        let chain = fib_entry.default_chain();
        match fib_entry.slot(chain) {
            None => s.push_str("  UNRESOLVED\n"),
            Some(lb) => {
                let _ = write!(s, "  {}-chain\n{}", chain, self.format_lb(lb, 2));
                if level >= FormatLevel::Detail2 {
                    let _ = write!(s, " Delegates:\n");
                    for other in ChainType::ALL {
                        if other == chain {
                            continue;
                        }
                        if let Some(lb) = fib_entry.slot(other) {
                            let _ = write!(s, "  {}-chain\n{}", other, self.format_lb(lb, 2));
                        }
                    }
                }
            }
        }

        if level >= FormatLevel::Detail2 {
            let children: Vec<String> = fib_entry.node.children().map(|c| c.to_string()).collect();
            let _ = write!(s, "\nchildren:{}", children.join(" "));
        }
        Ok(s)
    }

    fn format_path_list(&self, pl: PathListIndex) -> String {
        let Some(list) = self.path_list(pl) else {
            return format!("path-list:[{}] invalid", pl);
        };
        let mut s = format!("path-list:[{}] locks:{}", pl, list.locks());
        if list.is_looped() {
            s.push_str(" looped");
        }
        for path in list.paths() {
            let _ = write!(s, "\n      {} {}", path.key().proto, path.key().next_hop);
            let _ = write!(s, " weight:{}", path.key().weight);
            if path.is_looped() {
                s.push_str(" looped");
            }
            match (path.adjacency(), path.via_entry()) {
                (Some(adj), _) => {
                    if let Some(adjacency) = self.adjacency(adj) {
                        let _ = write!(
                            s,
                            " {}{}",
                            adjacency.id(),
                            if adjacency.is_up() { "" } else { " down" }
                        );
                    }
                }
                (None, Some(via)) => {
                    let _ = write!(s, " via-fib:{}", via);
                }
                (None, None) => s.push_str(" unresolved"),
            }
        }
        s
    }

    fn format_lb(&self, lb: LbIndex, indent: usize) -> String {
        let pad = " ".repeat(indent);
        let Some(object) = self.lb_get(lb) else {
            return format!("{}[@0]: invalid\n", pad);
        };
        let mut s = format!(
            "{}[@0]: {} buckets:{} locks:{}\n",
            pad,
            object.dpo(),
            object.buckets().len(),
            object.locks()
        );
        for (i, bucket) in object.buckets().iter().enumerate() {
            let _ = write!(s, "{}  [{}] {} weight:{}", pad, i, bucket.dpo, bucket.weight);
            if !bucket.labels.is_empty() {
                let labels: Vec<String> = bucket.labels.iter().map(|l| l.to_string()).collect();
                let _ = write!(s, " labels:[{}]", labels.join(" "));
            }
            s.push('\n');
            if let Dpo::LoadBalance { id, .. } = bucket.dpo {
                if let Some(&inner) = self.load_balance_db.get(&id) {
                    s.push_str(&self.format_lb(inner, indent + 4));
                }
            }
        }
        s
    }

    /// One line per entry, in slot order.
    pub fn show_entries(&self) -> String {
        let mut s = String::from("FIB Entries:\n");
        for (index, entry) in self.entries() {
            let _ = writeln!(s, "{}@{}", index.slot(), entry.prefix());
            if let Ok(text) = self.format(index, FormatLevel::Brief) {
                for line in text.lines().skip(1) {
                    let _ = writeln!(s, "  {}", line.trim_start());
                }
            }
        }
        s
    }

    /// Detail view of the entry in `slot`.
    pub fn show_entry(&self, slot: u32) -> String {
        self.entries()
            .find(|(index, _)| index.slot() == slot)
            .and_then(|(index, _)| self.format(index, FormatLevel::Detail).ok())
            .unwrap_or_else(|| format!("entry {} invalid", slot))
    }

    /// Memory use by object type.
    pub fn show_memory(&self) -> String {
        let mut s = format!(
            "{:<20} {:>8} {:>10} {:>6} {:>10}\n",
            "Name", "In-use", "Allocated", "Size", "Bytes"
        );
        for usage in self.memory_usage() {
            let _ = writeln!(s, "{}", usage);
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FibConfig;
    use crate::path::RoutePath;
    use crate::source::{EntryFlags, SourceKind};
    use fib_dpo::RecordingQueue;
    use fib_types::{FibPrefix, InterfaceIndex};

    fn fib() -> Fib {
        Fib::new(FibConfig::default(), Box::new(RecordingQueue::new()))
    }

    #[test]
    fn test_detail_shows_sources_and_forwarding() {
        let mut fib = fib();
        let prefix: FibPrefix = "10.0.0.0/24".parse().unwrap();
        let path = RoutePath::attached(InterfaceIndex::new(1), "10.0.0.1".parse().unwrap());
        let entry = fib
            .create(0, prefix, SourceKind::Api, EntryFlags::NONE, &[path])
            .unwrap();

        let text = fib.format(entry, FormatLevel::Detail).unwrap();
        assert!(text.starts_with("10.0.0.0/24 fib:0 index:"));
        assert!(text.contains("src:api refs:1 active"));
        assert!(text.contains("via 10.0.0.1 if1"));
        assert!(text.contains("unicast-ip4-chain"));
        assert!(text.contains("ip4-adjacency"));

        let brief = fib.format(entry, FormatLevel::Brief).unwrap();
        assert!(brief.starts_with("10.0.0.0/24\n"));
        assert!(!brief.contains("src:"));
    }

    #[test]
    fn test_show_entry_invalid_slot() {
        let fib = fib();
        assert_eq!(fib.show_entry(42), "entry 42 invalid");
        assert_eq!(fib.show_entries(), "FIB Entries:\n");
    }

    #[test]
    fn test_detail2_lists_children() {
        let mut fib = fib();
        let entry = fib
            .create_special(
                0,
                "1.1.1.1/32".parse().unwrap(),
                SourceKind::Special,
                EntryFlags::NONE,
                Dpo::Drop(fib_types::DpoProto::Ip4),
            )
            .unwrap();
        let text = fib.format(entry, FormatLevel::Detail2).unwrap();
        assert!(text.ends_with("\nchildren:"));
        assert!(text.contains("dpo-drop ip4"));
    }
}
