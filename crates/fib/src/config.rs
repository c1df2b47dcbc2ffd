//! FIB configuration.

use serde::{Deserialize, Serialize};

/// Sizing and behaviour knobs for a [`crate::Fib`].
///
/// Every pool is bounded; running out is reported as
/// [`crate::FibError::PoolExhausted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FibConfig {
    /// Maximum number of live entries.
    pub max_entries: usize,
    /// Maximum number of live path-lists.
    pub max_path_lists: usize,
    /// Maximum number of live load-balance objects.
    pub max_load_balances: usize,
    /// Maximum number of live adjacencies.
    pub max_adjacencies: usize,
    /// Deepest a back walk recurses before it stops.
    pub walk_max_depth: u32,
    /// Table an interface resolves to when it has no explicit binding.
    pub default_table_id: u32,
}

impl Default for FibConfig {
    fn default() -> Self {
        Self {
            max_entries: 65536,
            max_path_lists: 65536,
            max_load_balances: 131072,
            max_adjacencies: 16384,
            walk_max_depth: 32,
            default_table_id: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: FibConfig =
            serde_json::from_str(r#"{ "max_entries": 8, "walk_max_depth": 4 }"#).unwrap();
        assert_eq!(config.max_entries, 8);
        assert_eq!(config.walk_max_depth, 4);
        assert_eq!(config.max_path_lists, FibConfig::default().max_path_lists);
    }
}
