//! JSON scenarios: a FIB configuration plus a list of operations to
//! replay against it.
//!
//! ```json
//! {
//!   "config": { "walk_max_depth": 16 },
//!   "bindings": [ { "proto": "Ip4", "interface": 2, "table_id": 1 } ],
//!   "operations": [
//!     { "op": "path_add", "prefix": "10.0.0.0/24", "source": "api",
//!       "path": { "interface": 1, "next_hop": "10.0.0.1" } },
//!     { "op": "interface_state", "interface": 1, "up": false }
//!   ]
//! }
//! ```

use crate::config::FibConfig;
use crate::error::{FibError, Result};
use crate::fib::Fib;
use crate::path::RoutePath;
use crate::source::{EntryFlags, SourceKind};
use fib_dpo::Dpo;
use fib_types::{DpoProto, FibPrefix, FibProtocol, InterfaceIndex, IpAddress, MplsLabel};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: FibConfig,
    #[serde(default)]
    pub bindings: Vec<Binding>,
    pub operations: Vec<Operation>,
}

/// An interface bound to a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub proto: FibProtocol,
    pub interface: u32,
    pub table_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    PathAdd {
        #[serde(default)]
        table_id: u32,
        prefix: String,
        source: SourceKind,
        #[serde(default)]
        flags: Vec<String>,
        path: PathSpec,
    },
    PathRemove {
        #[serde(default)]
        table_id: u32,
        prefix: String,
        source: SourceKind,
        path: PathSpec,
    },
    Update {
        #[serde(default)]
        table_id: u32,
        prefix: String,
        source: SourceKind,
        #[serde(default)]
        flags: Vec<String>,
        paths: Vec<PathSpec>,
    },
    SpecialAdd {
        #[serde(default)]
        table_id: u32,
        prefix: String,
        source: SourceKind,
        #[serde(default)]
        flags: Vec<String>,
        dpo: SpecialDpo,
    },
    SpecialRemove {
        #[serde(default)]
        table_id: u32,
        prefix: String,
        source: SourceKind,
    },
    Delete {
        #[serde(default)]
        table_id: u32,
        prefix: String,
        source: SourceKind,
    },
    InterfaceState {
        interface: u32,
        up: bool,
    },
    InterfaceDelete {
        interface: u32,
    },
}

/// Forwarding of a special source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialDpo {
    Drop,
    Receive,
}

/// A path: attached (`interface`, optional `next_hop`) or recursive
/// (`via`, optional `via_table`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathSpec {
    #[serde(default)]
    pub proto: Option<DpoProto>,
    #[serde(default)]
    pub interface: Option<u32>,
    #[serde(default)]
    pub next_hop: Option<String>,
    #[serde(default)]
    pub via: Option<String>,
    #[serde(default)]
    pub via_table: Option<u32>,
    #[serde(default)]
    pub weight: Option<u32>,
    #[serde(default)]
    pub labels: Vec<u32>,
}

impl PathSpec {
    pub fn to_route_path(&self, prefix: &FibPrefix) -> Result<RoutePath> {
        let path = match (&self.via, self.interface) {
            (Some(via), _) => {
                let via: FibPrefix = via.parse()?;
                RoutePath::recursive(via, self.via_table.unwrap_or(0))
            }
            (None, Some(interface)) => {
                let interface = InterfaceIndex::new(interface);
                match &self.next_hop {
                    Some(nh) => RoutePath::attached(interface, nh.parse::<IpAddress>()?),
                    None => RoutePath::attached_glean(
                        self.proto.unwrap_or_else(|| prefix.payload_proto()),
                        interface,
                    ),
                }
            }
            (None, None) => {
                return Err(FibError::InvalidScenario(
                    "path needs an interface or a via prefix".to_string(),
                ))
            }
        };
        let labels = self
            .labels
            .iter()
            .map(|l| MplsLabel::new(*l))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(path.with_weight(self.weight.unwrap_or(1)).with_labels(labels))
    }
}

fn parse_flags(flags: &[String]) -> Result<EntryFlags> {
    flags.iter().try_fold(EntryFlags::NONE, |acc, label| {
        EntryFlags::from_label(label)
            .map(|flag| acc | flag)
            .ok_or_else(|| FibError::InvalidScenario(format!("unknown flag '{}'", label)))
    })
}

impl Scenario {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| FibError::InvalidScenario(e.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| FibError::InvalidScenario(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    /// Applies the bindings, then every operation in order. Stops at the
    /// first failing operation.
    pub fn apply(&self, fib: &mut Fib) -> Result<()> {
        for binding in &self.bindings {
            fib.interface_bind_table(
                binding.proto,
                InterfaceIndex::new(binding.interface),
                binding.table_id,
            );
        }
        for (i, op) in self.operations.iter().enumerate() {
            debug!("Scenario: [{}] {:?}", i, op);
            apply_one(fib, op)
                .map_err(|e| FibError::InvalidScenario(format!("operation {}: {}", i, e)))?;
        }
        info!("Scenario: Applied {} operations", self.operations.len());
        Ok(())
    }
}

fn apply_one(fib: &mut Fib, op: &Operation) -> Result<()> {
    match op {
        Operation::PathAdd {
            table_id,
            prefix,
            source,
            flags,
            path,
        } => {
            let prefix: FibPrefix = prefix.parse()?;
            let path = path.to_route_path(&prefix)?;
            fib.table_entry_path_add(*table_id, prefix, *source, parse_flags(flags)?, &path)?;
        }
        Operation::PathRemove {
            table_id,
            prefix,
            source,
            path,
        } => {
            let prefix: FibPrefix = prefix.parse()?;
            let path = path.to_route_path(&prefix)?;
            fib.table_entry_path_remove(*table_id, &prefix, *source, &path)?;
        }
        Operation::Update {
            table_id,
            prefix,
            source,
            flags,
            paths,
        } => {
            let prefix: FibPrefix = prefix.parse()?;
            let paths = paths
                .iter()
                .map(|p| p.to_route_path(&prefix))
                .collect::<Result<Vec<_>>>()?;
            fib.table_entry_update(*table_id, prefix, *source, parse_flags(flags)?, &paths)?;
        }
        Operation::SpecialAdd {
            table_id,
            prefix,
            source,
            flags,
            dpo,
        } => {
            let prefix: FibPrefix = prefix.parse()?;
            let proto = prefix.payload_proto();
            let dpo = match dpo {
                SpecialDpo::Drop => Dpo::Drop(proto),
                SpecialDpo::Receive => Dpo::Receive(proto),
            };
            fib.table_entry_special_add(*table_id, prefix, *source, parse_flags(flags)?, dpo)?;
        }
        Operation::SpecialRemove {
            table_id,
            prefix,
            source,
        } => {
            fib.table_entry_special_remove(*table_id, &prefix.parse()?, *source)?;
        }
        Operation::Delete {
            table_id,
            prefix,
            source,
        } => {
            fib.table_entry_delete(*table_id, &prefix.parse()?, *source)?;
        }
        Operation::InterfaceState { interface, up } => {
            fib.interface_state_change(InterfaceIndex::new(*interface), *up);
        }
        Operation::InterfaceDelete { interface } => {
            fib.interface_delete(InterfaceIndex::new(*interface));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_operations() {
        let scenario = Scenario::from_json(
            r#"{
                "operations": [
                    { "op": "path_add", "prefix": "10.0.0.0/24", "source": "api",
                      "flags": ["attached"],
                      "path": { "interface": 1, "next_hop": "10.0.0.1", "labels": [16] } },
                    { "op": "special_add", "table_id": 2, "prefix": "1.1.1.1/32",
                      "source": "special", "dpo": "drop" },
                    { "op": "interface_state", "interface": 1, "up": false }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.operations.len(), 3);
        assert_eq!(scenario.config.max_entries, FibConfig::default().max_entries);
        match &scenario.operations[0] {
            Operation::PathAdd { table_id, source, flags, path, .. } => {
                assert_eq!(*table_id, 0);
                assert_eq!(*source, SourceKind::Api);
                assert_eq!(parse_flags(flags).unwrap(), EntryFlags::ATTACHED);
                let route = path.to_route_path(&"10.0.0.0/24".parse().unwrap()).unwrap();
                assert_eq!(route.to_string(), "ip4 via 10.0.0.1 if1 weight:1 labels:[16]");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(Scenario::from_json("{}").is_err());
        assert!(parse_flags(&["bogus".to_string()]).is_err());
        let empty = PathSpec::default();
        assert!(empty.to_route_path(&"10.0.0.0/8".parse().unwrap()).is_err());
    }

    #[test]
    fn test_glean_path_takes_prefix_proto() {
        let spec = PathSpec {
            interface: Some(4),
            ..Default::default()
        };
        let path = spec.to_route_path(&"2001:db8::/64".parse().unwrap()).unwrap();
        assert_eq!(path.proto, DpoProto::Ip6);
        assert_eq!(path.to_string(), "ip6 attached if4 weight:1");
    }
}
