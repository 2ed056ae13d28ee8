// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Member bindings.
//!
//! A bound struct has one [`MemberBinding`] per own member. Each binding is a
//! [`TypeBinding`]: an innermost leaf or struct, possibly wrapped in chained
//! range layers. `Array<Optional<String>>` binds as
//!
//! ```text
//! Range(Array, U32) -> Range(Optional, Uni) -> Range(String, U32) -> Leaf(U8)
//! ```
//!
//! Range layers are [`RangeCodec`]s shared through the context's codec cache,
//! so every `Array<Foo>` in the process points at the same codec.

mod binder;
pub mod custom;
pub mod ranges;

pub use custom::{CustomBinding, CustomId, CustomLoadView, CustomSaveContext};
pub use ranges::{ItemSlice, ItemSlots, MakeItemsRequest, MakePhase, RangeCache};

use crate::ids::{DeclId, MemberId};
use crate::leaf::LeafKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How an item count is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RangeSizeType {
    /// Zero or one item, one byte.
    Uni,
    U8,
    U16,
    U32,
    U64,
}

impl RangeSizeType {
    pub fn code(self) -> u8 {
        match self {
            Self::Uni => 0,
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 3,
            Self::U64 => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Uni,
            1 => Self::U8,
            2 => Self::U16,
            3 => Self::U32,
            4 => Self::U64,
            _ => return None,
        })
    }

    /// Largest encodable count.
    pub fn max(self) -> u64 {
        match self {
            Self::Uni => 1,
            Self::U8 => u64::from(u8::MAX),
            Self::U16 => u64::from(u16::MAX),
            Self::U32 => u64::from(u32::MAX),
            Self::U64 => u64::MAX,
        }
    }

    /// Encoded size of the count in bytes.
    pub fn bytes(self) -> usize {
        match self {
            Self::Uni | Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }

    /// Smallest sized type that can hold `len`.
    pub fn fitting(len: u32) -> Self {
        if len <= u32::from(u8::MAX) {
            Self::U8
        } else if len <= u32::from(u16::MAX) {
            Self::U16
        } else {
            Self::U32
        }
    }
}

/// Container shape handled by a range codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKind {
    Array,
    StaticArray(u32),
    String,
    Optional,
    Unique,
    Set,
    Map,
}

/// How to reach one field's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeBinding {
    Leaf(LeafKind),
    Struct(DeclId),
    Range(Arc<RangeCodec>),
    /// Set or map, delta-encoded against the default.
    Delta(DeltaId),
    /// Static array saved as numbered members.
    Static(StaticId),
    Custom(CustomId),
}

impl TypeBinding {
    /// Innermost non-range binding.
    pub fn innermost(&self) -> &TypeBinding {
        match self {
            Self::Range(codec) => match &codec.item {
                ItemBinding::Single(item) => item.innermost(),
                ItemBinding::Pair { .. } => self,
            },
            other => other,
        }
    }

    /// Range layers from outermost to innermost.
    pub fn range_chain(&self) -> Vec<&Arc<RangeCodec>> {
        let mut out = Vec::new();
        let mut current = self;
        while let Self::Range(codec) = current {
            out.push(codec);
            match &codec.item {
                ItemBinding::Single(item) => current = item,
                ItemBinding::Pair { .. } => break,
            }
        }
        out
    }
}

/// Items of a range: a single type, or key/value pairs for maps.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemBinding {
    Single(TypeBinding),
    Pair {
        pair: DeclId,
        key: TypeBinding,
        value: TypeBinding,
    },
}

/// Shared strategy object for one container shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeCodec {
    pub kind: RangeKind,
    pub size: RangeSizeType,
    pub item: ItemBinding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeltaId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StaticId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaKind {
    Set,
    Map,
}

/// Set or map bound as a `Set<T>`/`Map<K,V>` struct with `Assign`, `Remove`
/// and `Insert` members.
#[derive(Debug, Clone)]
pub struct DeltaBinding {
    pub decl: DeclId,
    pub kind: DeltaKind,
    /// Codec for whole items (`Assign`, `Insert`).
    pub items: Arc<RangeCodec>,
    /// Codec for removed keys.
    pub keys: Arc<RangeCodec>,
}

/// Static array bound as a struct with members `0..len`.
#[derive(Debug, Clone)]
pub struct StaticBinding {
    pub decl: DeclId,
    pub len: u32,
    pub item: TypeBinding,
    pub members: Vec<MemberId>,
}

#[derive(Debug, Clone)]
pub struct MemberBinding {
    pub member: MemberId,
    /// Absolute index into the flattened `StructValue`.
    pub field: usize,
    pub ty: TypeBinding,
}

#[derive(Debug, Clone)]
pub struct StructBinding {
    pub decl: DeclId,
    pub name: String,
    pub occupancy: crate::declaration::Occupancy,
    /// Super struct, kept for sparse structs only.
    pub super_decl: Option<DeclId>,
    /// Flattened field count, super fields included.
    pub num_fields: usize,
    pub members: Vec<MemberBinding>,
}

impl StructBinding {
    pub fn member(&self, member: MemberId) -> Option<&MemberBinding> {
        self.members.iter().find(|m| m.member == member)
    }
}
