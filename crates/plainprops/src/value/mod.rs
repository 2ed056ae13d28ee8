// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Live values.
//!
//! A [`Value`] is the host's view of one field. Structs keep their fields in
//! flattened declaration order, super fields first, so field `N` of an
//! instance is `StructValue::field(N)`.
//!
//! Equality is bitwise for floats (so every value equals itself) and
//! unordered for sets and maps.

pub mod bits;
pub mod sparse;

pub use sparse::{Sparse, SparseItem, SparseMap, SparseSet};

use crate::leaf::LeafKind;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// A dynamic value that can hold any bindable field.
#[derive(Debug, Clone)]
pub enum Value {
    // Leaves
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Enum(u64),

    // Composites
    String(String),
    Struct(StructValue),
    Array(Vec<Value>),
    Set(SparseSet),
    Map(SparseMap),
    Optional(Option<Box<Value>>),
    Unique(Option<Box<Value>>),

    // Custom-bound natives
    Handle(Option<String>),
    Delegate(ScriptDelegate),
    Multicast(Vec<ScriptDelegate>),
}

/// Struct instance with flattened fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StructValue {
    fields: Vec<Value>,
}

/// Map item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MapEntry {
    pub key: Value,
    pub value: Value,
}

/// Bound object method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptDelegate {
    pub object: String,
    pub function: String,
}

impl MapEntry {
    pub fn new(key: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl ScriptDelegate {
    pub fn new(object: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            function: function.into(),
        }
    }
}

impl StructValue {
    pub fn new(fields: Vec<Value>) -> Self {
        Self { fields }
    }

    pub fn field(&self, idx: usize) -> Option<&Value> {
        self.fields.get(idx)
    }

    pub fn field_mut(&mut self, idx: usize) -> Option<&mut Value> {
        self.fields.get_mut(idx)
    }

    /// Replace field `idx`. Returns false when out of range.
    pub fn set_field(&mut self, idx: usize, value: impl Into<Value>) -> bool {
        match self.fields.get_mut(idx) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Value> {
        self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_zero(&self) -> bool {
        self.fields.iter().all(Value::is_zero)
    }
}

macro_rules! impl_value_accessor {
    ($name:ident, $variant:ident, $type:ty) => {
        /// Try to get the leaf as this type.
        pub fn $name(&self) -> Option<$type> {
            match self {
                Self::$variant(v) => Some(*v),
                _ => None,
            }
        }
    };
}

macro_rules! impl_value_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for Value {
            fn from(v: $type) -> Self {
                Self::$variant(v)
            }
        }
    };
}

impl Value {
    impl_value_accessor!(as_bool, Bool, bool);
    impl_value_accessor!(as_i8, I8, i8);
    impl_value_accessor!(as_i16, I16, i16);
    impl_value_accessor!(as_i32, I32, i32);
    impl_value_accessor!(as_i64, I64, i64);
    impl_value_accessor!(as_u8, U8, u8);
    impl_value_accessor!(as_u16, U16, u16);
    impl_value_accessor!(as_u32, U32, u32);
    impl_value_accessor!(as_u64, U64, u64);
    impl_value_accessor!(as_f32, F32, f32);
    impl_value_accessor!(as_f64, F64, f64);
    impl_value_accessor!(as_enum, Enum, u64);

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SparseSet> {
        match self {
            Self::Set(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&SparseMap> {
        match self {
            Self::Map(v) => Some(v),
            _ => None,
        }
    }

    /// Variant name, used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "Bool",
            Self::I8(_) => "I8",
            Self::I16(_) => "I16",
            Self::I32(_) => "I32",
            Self::I64(_) => "I64",
            Self::U8(_) => "U8",
            Self::U16(_) => "U16",
            Self::U32(_) => "U32",
            Self::U64(_) => "U64",
            Self::F32(_) => "F32",
            Self::F64(_) => "F64",
            Self::Enum(_) => "Enum",
            Self::String(_) => "String",
            Self::Struct(_) => "Struct",
            Self::Array(_) => "Array",
            Self::Set(_) => "Set",
            Self::Map(_) => "Map",
            Self::Optional(_) => "Optional",
            Self::Unique(_) => "Unique",
            Self::Handle(_) => "Handle",
            Self::Delegate(_) => "Delegate",
            Self::Multicast(_) => "Multicast",
        }
    }

    /// Whether this value is what zero-initialized storage would hold.
    ///
    /// Arrays count as zero when every element is zero, which matches the
    /// layout of static arrays.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Bool(v) => !v,
            Self::String(v) => v.is_empty(),
            Self::Struct(v) => v.is_zero(),
            Self::Array(v) => v.iter().all(Value::is_zero),
            Self::Set(v) => v.is_empty(),
            Self::Map(v) => v.is_empty(),
            Self::Optional(v) | Self::Unique(v) => v.is_none(),
            Self::Handle(v) => v.is_none(),
            Self::Delegate(v) => v.object.is_empty() && v.function.is_empty(),
            Self::Multicast(v) => v.is_empty(),
            leaf => leaf.leaf_bits() == Some(0),
        }
    }

    /// Raw bits of a leaf, truncated to its natural width.
    pub fn leaf_bits(&self) -> Option<u64> {
        Some(match *self {
            Self::Bool(v) => u64::from(v),
            Self::I8(v) => v as u8 as u64,
            Self::I16(v) => v as u16 as u64,
            Self::I32(v) => v as u32 as u64,
            Self::I64(v) => v as u64,
            Self::U8(v) => u64::from(v),
            Self::U16(v) => u64::from(v),
            Self::U32(v) => u64::from(v),
            Self::U64(v) => v,
            Self::F32(v) => u64::from(v.to_bits()),
            Self::F64(v) => v.to_bits(),
            Self::Enum(v) => v,
            _ => return None,
        })
    }

    /// Leaf bits for `kind`, or `None` when the variant does not match.
    pub fn leaf_bits_as(&self, kind: LeafKind) -> Option<u64> {
        let matches = matches!(
            (kind, self),
            (LeafKind::Bool, Self::Bool(_))
                | (LeafKind::I8, Self::I8(_))
                | (LeafKind::I16, Self::I16(_))
                | (LeafKind::I32, Self::I32(_))
                | (LeafKind::I64, Self::I64(_))
                | (LeafKind::U8, Self::U8(_))
                | (LeafKind::U16, Self::U16(_))
                | (LeafKind::U32, Self::U32(_))
                | (LeafKind::U64, Self::U64(_))
                | (LeafKind::F32, Self::F32(_))
                | (LeafKind::F64, Self::F64(_))
                | (LeafKind::Enum(..), Self::Enum(_))
        );
        if matches {
            self.leaf_bits()
        } else {
            None
        }
    }

    /// Rebuild a leaf from raw bits.
    pub fn from_leaf_bits(kind: LeafKind, bits: u64) -> Self {
        match kind {
            LeafKind::Bool => Self::Bool(bits != 0),
            LeafKind::I8 => Self::I8(bits as u8 as i8),
            LeafKind::I16 => Self::I16(bits as u16 as i16),
            LeafKind::I32 => Self::I32(bits as u32 as i32),
            LeafKind::I64 => Self::I64(bits as i64),
            LeafKind::U8 => Self::U8(bits as u8),
            LeafKind::U16 => Self::U16(bits as u16),
            LeafKind::U32 => Self::U32(bits as u32),
            LeafKind::U64 => Self::U64(bits),
            LeafKind::F32 => Self::F32(f32::from_bits(bits as u32)),
            LeafKind::F64 => Self::F64(f64::from_bits(bits)),
            LeafKind::Enum(_, width) => Self::Enum(bits & width.mask()),
        }
    }

    pub fn zero_leaf(kind: LeafKind) -> Self {
        Self::from_leaf_bits(kind, 0)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Bool(_) => 0,
            Self::I8(_) => 1,
            Self::I16(_) => 2,
            Self::I32(_) => 3,
            Self::I64(_) => 4,
            Self::U8(_) => 5,
            Self::U16(_) => 6,
            Self::U32(_) => 7,
            Self::U64(_) => 8,
            Self::F32(_) => 9,
            Self::F64(_) => 10,
            Self::Enum(_) => 11,
            Self::String(_) => 12,
            Self::Struct(_) => 13,
            Self::Array(_) => 14,
            Self::Set(_) => 15,
            Self::Map(_) => 16,
            Self::Optional(_) => 17,
            Self::Unique(_) => 18,
            Self::Handle(_) => 19,
            Self::Delegate(_) => 20,
            Self::Multicast(_) => 21,
        }
    }

    /// Total order used to sort set and map items before encoding.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::I8(a), Self::I8(b)) => a.cmp(b),
            (Self::I16(a), Self::I16(b)) => a.cmp(b),
            (Self::I32(a), Self::I32(b)) => a.cmp(b),
            (Self::I64(a), Self::I64(b)) => a.cmp(b),
            (Self::F32(a), Self::F32(b)) => a.total_cmp(b),
            (Self::F64(a), Self::F64(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Struct(a), Self::Struct(b)) => cmp_slices(&a.fields, &b.fields),
            (Self::Array(a), Self::Array(b)) => cmp_slices(a, b),
            (Self::Set(a), Self::Set(b)) => cmp_slices(&sorted(a.iter()), &sorted(b.iter())),
            (Self::Map(a), Self::Map(b)) => {
                let a = sorted_entries(a);
                let b = sorted_entries(b);
                a.len().cmp(&b.len()).then_with(|| {
                    a.iter()
                        .zip(b.iter())
                        .map(|(x, y)| x.total_cmp(y))
                        .find(|o| o.is_ne())
                        .unwrap_or(Ordering::Equal)
                })
            }
            (Self::Optional(a), Self::Optional(b)) | (Self::Unique(a), Self::Unique(b)) => {
                match (a, b) {
                    (Some(a), Some(b)) => a.total_cmp(b),
                    _ => a.is_some().cmp(&b.is_some()),
                }
            }
            (Self::Handle(a), Self::Handle(b)) => a.cmp(b),
            (Self::Delegate(a), Self::Delegate(b)) => a.cmp(b),
            (Self::Multicast(a), Self::Multicast(b)) => a.cmp(b),
            (a, b) if a.rank() == b.rank() => match (a.leaf_bits(), b.leaf_bits()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => Ordering::Equal,
            },
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

impl MapEntry {
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.key
            .total_cmp(&other.key)
            .then_with(|| self.value.total_cmp(&other.value))
    }
}

fn cmp_slices(a: &[Value], b: &[Value]) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| {
        a.iter()
            .zip(b)
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    })
}

fn sorted<'a>(items: impl Iterator<Item = &'a Value>) -> Vec<Value> {
    let mut out: Vec<Value> = items.cloned().collect();
    out.sort_by(Value::total_cmp);
    out
}

fn sorted_entries(map: &SparseMap) -> Vec<&MapEntry> {
    let mut out: Vec<&MapEntry> = map.iter().collect();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Struct(a), Self::Struct(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::Optional(a), Self::Optional(b)) | (Self::Unique(a), Self::Unique(b)) => a == b,
            (Self::Handle(a), Self::Handle(b)) => a == b,
            (Self::Delegate(a), Self::Delegate(b)) => a == b,
            (Self::Multicast(a), Self::Multicast(b)) => a == b,
            (a, b) => a.rank() == b.rank() && a.leaf_bits().is_some() && a.leaf_bits() == b.leaf_bits(),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::String(v) => v.hash(state),
            Self::Struct(v) => v.hash(state),
            Self::Array(v) => v.hash(state),
            Self::Set(v) => {
                // order independent
                let sum = v
                    .iter()
                    .fold(0u64, |acc, item| acc.wrapping_add(sparse::hash_key(item)));
                (v.len(), sum).hash(state);
            }
            Self::Map(v) => {
                let sum = v.iter().fold(0u64, |acc, e| {
                    acc.wrapping_add(sparse::hash_key(&e.key) ^ sparse::hash_key(&e.value).rotate_left(1))
                });
                (v.len(), sum).hash(state);
            }
            Self::Optional(v) | Self::Unique(v) => v.hash(state),
            Self::Handle(v) => v.hash(state),
            Self::Delegate(v) => v.hash(state),
            Self::Multicast(v) => v.hash(state),
            leaf => leaf.leaf_bits().hash(state),
        }
    }
}

impl_value_from!(bool, Bool);
impl_value_from!(i8, I8);
impl_value_from!(i16, I16);
impl_value_from!(i32, I32);
impl_value_from!(i64, I64);
impl_value_from!(u8, U8);
impl_value_from!(u16, U16);
impl_value_from!(u32, U32);
impl_value_from!(u64, U64);
impl_value_from!(f32, F32);
impl_value_from!(f64, F64);
impl_value_from!(String, String);
impl_value_from!(StructValue, Struct);
impl_value_from!(SparseSet, Set);
impl_value_from!(SparseMap, Map);
impl_value_from!(ScriptDelegate, Delegate);

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}
