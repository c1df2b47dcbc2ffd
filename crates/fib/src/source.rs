//! Route sources: who contributed to an entry, and how each kind behaves.

use crate::entry::EntryIndex;
use crate::path::{PathListIndex, RoutePath};
use fib_dpo::Dpo;
use fib_node::{define_flags, BackWalkReason};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A control-plane source of routes, in priority order: the first variant
/// wins over every later one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Routes the FIB owns itself (receive, drop).
    Special,
    /// Connected and local prefixes of interfaces.
    Interface,
    Classify,
    Api,
    Cli,
    Lisp,
    Map,
    Dhcp,
    /// Host routes learned from neighbour resolution.
    Adjacency,
    Mpls,
    /// Host routes copied in from another table.
    AttachedExport,
    /// Placeholder entries created to resolve recursive next hops.
    RecursiveResolution,
    /// The 0/0 drop route of every IP table.
    DefaultRoute,
}

impl SourceKind {
    pub const ALL: [SourceKind; 13] = [
        SourceKind::Special,
        SourceKind::Interface,
        SourceKind::Classify,
        SourceKind::Api,
        SourceKind::Cli,
        SourceKind::Lisp,
        SourceKind::Map,
        SourceKind::Dhcp,
        SourceKind::Adjacency,
        SourceKind::Mpls,
        SourceKind::AttachedExport,
        SourceKind::RecursiveResolution,
        SourceKind::DefaultRoute,
    ];

    pub const fn name(&self) -> &'static str {
        match self {
            SourceKind::Special => "special",
            SourceKind::Interface => "interface",
            SourceKind::Classify => "classify",
            SourceKind::Api => "api",
            SourceKind::Cli => "cli",
            SourceKind::Lisp => "lisp",
            SourceKind::Map => "map",
            SourceKind::Dhcp => "dhcp",
            SourceKind::Adjacency => "adjacency",
            SourceKind::Mpls => "mpls",
            SourceKind::AttachedExport => "attached-export",
            SourceKind::RecursiveResolution => "recursive-resolution",
            SourceKind::DefaultRoute => "default-route",
        }
    }

    /// How this source reacts to activation and cover changes.
    pub const fn behaviour(&self) -> SourceBehaviour {
        match self {
            SourceKind::Special | SourceKind::DefaultRoute => SourceBehaviour::Special,
            SourceKind::Interface => SourceBehaviour::Interface,
            SourceKind::Adjacency => SourceBehaviour::Adjacency,
            SourceKind::AttachedExport => SourceBehaviour::AttachedExport,
            SourceKind::RecursiveResolution => SourceBehaviour::RecursiveResolution,
            SourceKind::Classify
            | SourceKind::Api
            | SourceKind::Cli
            | SourceKind::Lisp
            | SourceKind::Map
            | SourceKind::Dhcp
            | SourceKind::Mpls => SourceBehaviour::Simple,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The behaviours source kinds share.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBehaviour {
    /// Path based; ignores its cover.
    Simple,
    /// A fixed forwarding object instead of paths.
    Special,
    Interface,
    /// Installs only while its cover is attached.
    Adjacency,
    AttachedExport,
    /// Inherits the forwarding of its cover.
    RecursiveResolution,
}

impl SourceBehaviour {
    /// True for behaviours that track the entry's cover while active.
    pub const fn tracks_cover(&self) -> bool {
        matches!(
            self,
            SourceBehaviour::Adjacency | SourceBehaviour::RecursiveResolution
        )
    }
}

define_flags! {
    /// Attributes a source gives the entry it wins on.
    pub struct EntryFlags: u16 {
        /// The prefix is a subnet directly reachable on an interface.
        const ATTACHED = 1 << 0, "attached";
        const CONNECTED = 1 << 1, "connected";
        /// The prefix is an address of this system.
        const LOCAL = 1 << 2, "local";
        /// Import attached host routes from the interface's table.
        const IMPORT = 1 << 3, "import";
        /// The source supplies its own forwarding object.
        const EXCLUSIVE = 1 << 4, "exclusive";
        const DROP = 1 << 5, "drop";
    }
}

impl EntryFlags {
    /// Looks up a single flag by its label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, name)| *name == label)
            .map(|(flag, _)| *flag)
    }
}

/// Outcome of a source removal: whether the entry has any source left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    StillPresent,
    NoSourcesLeft,
}

/// A source's reaction to a change of the entry's cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverResult {
    /// Whether the entry should stay installed.
    pub install: bool,
    /// Walk to start on the entry's dependents, `NONE` for no walk.
    pub walk: BackWalkReason,
}

impl CoverResult {
    pub const fn install() -> Self {
        Self {
            install: true,
            walk: BackWalkReason::NONE,
        }
    }
}

impl Default for CoverResult {
    fn default() -> Self {
        Self::install()
    }
}

/// One path of a source, counted by how many times it was added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    pub(crate) path: RoutePath,
    pub(crate) refs: u32,
}

impl SourcePath {
    pub(crate) fn new(path: RoutePath) -> Self {
        Self { path, refs: 1 }
    }

    pub fn path(&self) -> &RoutePath {
        &self.path
    }

    pub fn refs(&self) -> u32 {
        self.refs
    }
}

/// A source's contribution to one entry.
#[derive(Debug, Clone)]
pub struct EntrySource {
    pub(crate) kind: SourceKind,
    pub(crate) flags: EntryFlags,
    pub(crate) ref_count: u32,
    pub(crate) active: bool,
    pub(crate) path_list: Option<PathListIndex>,
    pub(crate) paths: Vec<SourcePath>,
    pub(crate) dpo: Option<Dpo>,
    /// Cover being tracked, for behaviours that track one.
    pub(crate) cover: Option<EntryIndex>,
}

impl EntrySource {
    pub(crate) fn new(kind: SourceKind, flags: EntryFlags) -> Self {
        Self {
            kind,
            flags,
            ref_count: 0,
            active: false,
            path_list: None,
            paths: Vec::new(),
            dpo: None,
            cover: None,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn flags(&self) -> EntryFlags {
        self.flags
    }

    /// Number of add operations not yet matched by a remove.
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn path_list(&self) -> Option<PathListIndex> {
        self.path_list
    }

    pub fn paths(&self) -> &[SourcePath] {
        &self.paths
    }

    pub fn dpo(&self) -> Option<Dpo> {
        self.dpo
    }

    pub fn cover(&self) -> Option<EntryIndex> {
        self.cover
    }

    /// Reference count of the path equal to `path`, labels aside.
    pub fn path_refs(&self, path: &RoutePath) -> Option<u32> {
        self.paths
            .iter()
            .find(|p| p.path.key() == path.key())
            .map(|p| p.refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_priority_order() {
        let mut sorted = SourceKind::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, SourceKind::ALL.to_vec());
        assert!(SourceKind::Interface < SourceKind::Api);
        assert!(SourceKind::Api < SourceKind::Adjacency);
        assert!(SourceKind::RecursiveResolution < SourceKind::DefaultRoute);
    }

    #[test]
    fn test_behaviours() {
        assert_eq!(SourceKind::Cli.behaviour(), SourceBehaviour::Simple);
        assert_eq!(SourceKind::DefaultRoute.behaviour(), SourceBehaviour::Special);
        assert!(SourceKind::Adjacency.behaviour().tracks_cover());
        assert!(!SourceKind::Interface.behaviour().tracks_cover());
    }

    #[test]
    fn test_flag_labels() {
        let flags = EntryFlags::ATTACHED | EntryFlags::CONNECTED;
        assert_eq!(flags.to_string(), "attached,connected");
        assert_eq!(EntryFlags::from_label("import"), Some(EntryFlags::IMPORT));
        assert_eq!(EntryFlags::from_label("bogus"), None);
    }

    #[test]
    fn test_source_kind_serde_names() {
        let kind: SourceKind = serde_json::from_str("\"recursive-resolution\"").unwrap();
        assert_eq!(kind, SourceKind::RecursiveResolution);
        assert_eq!(kind.to_string(), "recursive-resolution");
    }
}
