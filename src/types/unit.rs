//! Codec unit types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unit types that carry decoder parameter sets (VPS, SPS, PPS).
pub const PARAMETER_UNIT_TYPES: [u8; 3] = [32, 33, 34];

/// Unit types that start an independently decodable picture.
pub const KEYFRAME_UNIT_TYPES: [u8; 3] = [19, 20, 21];

/// Unit type extracted from the first unit header of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    /// A 6-bit type value read after the start code
    Known(u8),

    /// No start code, or nothing after it
    Unknown,
}

/// Downstream grouping of unit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Parameter,
    Keyframe,
    Ordinary,
}

impl UnitType {
    /// Group this type for caching and re-injection decisions.
    ///
    /// `Unknown` is ordinary: it is neither cached nor preceded by parameter sets.
    pub fn kind(self) -> UnitKind {
        match self {
            UnitType::Known(t) if PARAMETER_UNIT_TYPES.contains(&t) => UnitKind::Parameter,
            UnitType::Known(t) if KEYFRAME_UNIT_TYPES.contains(&t) => UnitKind::Keyframe,
            _ => UnitKind::Ordinary,
        }
    }

    pub fn is_parameter(self) -> bool {
        self.kind() == UnitKind::Parameter
    }

    pub fn is_keyframe(self) -> bool {
        self.kind() == UnitKind::Keyframe
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitType::Known(t) => write!(f, "{}", t),
            UnitType::Unknown => f.write_str("unknown"),
        }
    }
}
