//! Error type for FIB operations.

use crate::entry::EntryIndex;
use fib_dpo::HwError;
use fib_node::PoolError;
use fib_types::{FibPrefix, FibProtocol, ParseError};

/// Error type for FIB operations.
#[derive(Debug, thiserror::Error)]
pub enum FibError {
    /// The handle is stale or was never allocated.
    #[error("FIB entry not found: {0}")]
    EntryNotFound(EntryIndex),

    #[error("FIB entry already exists: {table_id}:{prefix}")]
    EntryExists { table_id: u32, prefix: FibPrefix },

    #[error("Invalid paths: {0}")]
    InvalidPaths(String),

    #[error("Table not found: {proto} {table_id}")]
    TableNotFound { proto: FibProtocol, table_id: u32 },

    #[error(transparent)]
    PoolExhausted(#[from] PoolError),

    #[error("Hardware error: {0}")]
    Hardware(#[from] HwError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid scenario: {0}")]
    InvalidScenario(String),
}

/// Result type for FIB operations.
pub type Result<T> = std::result::Result<T, FibError>;
