// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Leaf kinds and widths.

use crate::ids::EnumId;
use serde::{Deserialize, Serialize};

/// Storage width of a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LeafWidth {
    B8,
    B16,
    B32,
    B64,
}

impl LeafWidth {
    pub fn bytes(self) -> usize {
        match self {
            Self::B8 => 1,
            Self::B16 => 2,
            Self::B32 => 4,
            Self::B64 => 8,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::B8 => 0,
            Self::B16 => 1,
            Self::B32 => 2,
            Self::B64 => 3,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::B8),
            1 => Some(Self::B16),
            2 => Some(Self::B32),
            3 => Some(Self::B64),
            _ => None,
        }
    }

    /// Mask of the bits representable at this width.
    pub fn mask(self) -> u64 {
        match self {
            Self::B64 => u64::MAX,
            w => (1u64 << (w.bytes() * 8)) - 1,
        }
    }
}

/// Innermost scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeafKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Enum(EnumId, LeafWidth),
}

impl LeafKind {
    /// Encoded size in bytes.
    pub fn size(self) -> usize {
        self.width().bytes()
    }

    pub fn width(self) -> LeafWidth {
        match self {
            Self::Bool | Self::I8 | Self::U8 => LeafWidth::B8,
            Self::I16 | Self::U16 => LeafWidth::B16,
            Self::I32 | Self::U32 | Self::F32 => LeafWidth::B32,
            Self::I64 | Self::U64 | Self::F64 => LeafWidth::B64,
            Self::Enum(_, width) => width,
        }
    }

    /// Wire code; enums are encoded separately and have none.
    pub fn code(self) -> Option<u8> {
        Some(match self {
            Self::Bool => 0,
            Self::I8 => 1,
            Self::I16 => 2,
            Self::I32 => 3,
            Self::I64 => 4,
            Self::U8 => 5,
            Self::U16 => 6,
            Self::U32 => 7,
            Self::U64 => 8,
            Self::F32 => 9,
            Self::F64 => 10,
            Self::Enum(..) => return None,
        })
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Bool,
            1 => Self::I8,
            2 => Self::I16,
            3 => Self::I32,
            4 => Self::I64,
            5 => Self::U8,
            6 => Self::U16,
            7 => Self::U32,
            8 => Self::U64,
            9 => Self::F32,
            10 => Self::F64,
            _ => return None,
        })
    }

    /// Short name used in synthesized type names and dumps.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::I8 => "I8",
            Self::I16 => "I16",
            Self::I32 => "I32",
            Self::I64 => "I64",
            Self::U8 => "U8",
            Self::U16 => "U16",
            Self::U32 => "U32",
            Self::U64 => "U64",
            Self::F32 => "F32",
            Self::F64 => "F64",
            Self::Enum(..) => "Enum",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        (0..=10).filter_map(Self::from_code).find(|k| k.name() == name)
    }

    pub fn is_enum(self) -> bool {
        matches!(self, Self::Enum(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_codes_roundtrip() {
        for code in 0..=10 {
            let kind = LeafKind::from_code(code).expect("valid code");
            assert_eq!(kind.code(), Some(code));
            assert_eq!(LeafKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(LeafKind::from_code(11), None);
    }

    #[test]
    fn test_sizes() {
        assert_eq!(LeafKind::Bool.size(), 1);
        assert_eq!(LeafKind::F32.size(), 4);
        assert_eq!(LeafKind::Enum(EnumId(0), LeafWidth::B16).size(), 2);
        assert_eq!(LeafWidth::B16.mask(), 0xFFFF);
        assert_eq!(LeafWidth::B64.mask(), u64::MAX);
    }
}
