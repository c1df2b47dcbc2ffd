//! Interface identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a software interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InterfaceIndex(u32);

impl InterfaceIndex {
    pub const fn new(index: u32) -> Self {
        InterfaceIndex(index)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl From<u32> for InterfaceIndex {
    fn from(index: u32) -> Self {
        InterfaceIndex(index)
    }
}

impl fmt::Display for InterfaceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "if{}", self.0)
    }
}
