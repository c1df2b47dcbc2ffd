//! Multi-source FIB entry resolution.
//!
//! Many control-plane sources (interfaces, the API, neighbour resolution,
//! recursive resolution, ...) may each contribute a route for the same
//! prefix. A [`FibEntry`] keeps every contribution, ranks them by
//! [`SourceKind`] and forwards with the best one. Changes propagate
//! through a dependency graph: adjacencies and entries back-walk the
//! path-lists that resolve through them, which re-evaluate the entries
//! that use them.
//!
//! - [`Fib`]: the context owning every pool and table
//! - [`entry`] / [`entry_src`]: entries and the source actions on them
//! - [`path`]: route paths and shared path-lists
//! - [`table`]: per (protocol, id) prefix indexes and table-level helpers
//! - [`cover`]: tracking of less-specific covering entries
//! - [`attached_export`]: importing attached hosts between tables
//! - [`load_balance`] / [`adjacency`]: the forwarding objects
//! - [`scenario`]: JSON operation scripts
//!
//! # Example
//!
//! ```
//! use vnet_fib::{ChainType, EntryFlags, Fib, FibConfig, RoutePath, SourceKind};
//! use fib_dpo::RecordingQueue;
//! use fib_types::InterfaceIndex;
//!
//! let mut fib = Fib::new(FibConfig::default(), Box::new(RecordingQueue::new()));
//! let path = RoutePath::attached(InterfaceIndex::new(1), "10.0.0.1".parse().unwrap());
//! let entry = fib
//!     .table_entry_path_add(0, "10.1.0.0/16".parse().unwrap(), SourceKind::Api, EntryFlags::NONE, &path)
//!     .unwrap();
//!
//! assert_eq!(fib.get_best_source(entry).unwrap(), Some(SourceKind::Api));
//! let dpo = fib.contribute_forwarding(entry, ChainType::UnicastIp4).unwrap();
//! assert!(!dpo.is_drop());
//! fib.dpo_release(&dpo);
//! ```

pub mod adjacency;
pub mod attached_export;
pub mod chain;
pub mod config;
pub mod cover;
pub mod entry;
pub mod entry_src;
pub mod error;
pub mod fib;
pub mod format;
pub mod load_balance;
pub mod path;
pub mod scenario;
pub mod source;
pub mod table;

pub use adjacency::{AdjIndex, Adjacency, AdjacencyKey};
pub use attached_export::{ExportRecord, ImportRecord};
pub use chain::ChainType;
pub use config::FibConfig;
pub use entry::{EntryIndex, FibEntry};
pub use error::{FibError, Result};
pub use fib::{Fib, FibEvent};
pub use format::FormatLevel;
pub use load_balance::LoadBalance;
pub use path::{NextHop, PathKey, PathList, PathListIndex, RoutePath};
pub use scenario::Scenario;
pub use source::{CoverResult, EntryFlags, EntrySource, SourceKind, SourceStatus};
pub use table::FibTable;
