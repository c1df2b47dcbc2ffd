//! MPLS label types.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 20-bit MPLS label value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MplsLabel(u32);

impl MplsLabel {
    /// Largest encodable label.
    pub const MAX: u32 = (1 << 20) - 1;

    /// IPv4 explicit null.
    pub const IPV4_EXPLICIT_NULL: Self = MplsLabel(0);
    /// IPv6 explicit null.
    pub const IPV6_EXPLICIT_NULL: Self = MplsLabel(2);
    /// Implicit null (penultimate hop pop).
    pub const IMPLICIT_NULL: Self = MplsLabel(3);

    /// Creates a label, rejecting values wider than 20 bits.
    pub fn new(value: u32) -> Result<Self, ParseError> {
        if value > Self::MAX {
            return Err(ParseError::InvalidMplsLabel(value));
        }
        Ok(MplsLabel(value))
    }

    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns true for the reserved label range (0-15).
    pub const fn is_reserved(&self) -> bool {
        self.0 < 16
    }
}

impl TryFrom<u32> for MplsLabel {
    type Error = ParseError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        MplsLabel::new(value)
    }
}

impl From<MplsLabel> for u32 {
    fn from(label: MplsLabel) -> Self {
        label.0
    }
}

impl fmt::Display for MplsLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MplsLabel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .parse()
            .map_err(|_| ParseError::InvalidFibPrefix(s.to_string()))?;
        MplsLabel::new(value)
    }
}

/// Position of a label in the stack: bottom (end-of-stack) or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MplsEos {
    NonEos,
    Eos,
}

impl fmt::Display for MplsEos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MplsEos::NonEos => write!(f, "neos"),
            MplsEos::Eos => write!(f, "eos"),
        }
    }
}

impl FromStr for MplsEos {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eos" => Ok(MplsEos::Eos),
            "neos" | "non-eos" => Ok(MplsEos::NonEos),
            _ => Err(ParseError::InvalidFibPrefix(s.to_string())),
        }
    }
}
