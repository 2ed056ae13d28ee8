// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Host reflection capability.
//!
//! The engine never inspects host types directly. It asks a [`HostReflection`]
//! implementation for the ordered field list of a struct, the enumerators of an
//! enum, and for the constructor of a type. [`HostRegistry`] is an in-memory
//! host suitable for tools and tests.

mod registry;

pub use registry::{EnumBuilder, HostRegistry, StructBuilder};

use crate::declaration::{EnumMode, Occupancy};
use crate::leaf::LeafWidth;
use crate::value::StructValue;
use std::fmt;

/// Closed set of field kinds the binder understands.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldKind {
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
    /// Enum by full type name.
    Enum(String),
    /// Struct by full type name.
    Struct(String),
    String,
    Array(Box<FieldKind>),
    /// Fixed-length array.
    StaticArray(Box<FieldKind>, u32),
    Set(Box<FieldKind>),
    Map(Box<FieldKind>, Box<FieldKind>),
    Optional(Box<FieldKind>),
    Unique(Box<FieldKind>),
    /// Native type handled by a registered custom binding.
    Native(String),
}

impl FieldKind {
    pub fn array(item: FieldKind) -> Self {
        Self::Array(Box::new(item))
    }

    pub fn static_array(item: FieldKind, len: u32) -> Self {
        Self::StaticArray(Box::new(item), len)
    }

    pub fn set(item: FieldKind) -> Self {
        Self::Set(Box::new(item))
    }

    pub fn map(key: FieldKind, value: FieldKind) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn optional(item: FieldKind) -> Self {
        Self::Optional(Box::new(item))
    }

    pub fn unique(item: FieldKind) -> Self {
        Self::Unique(Box::new(item))
    }

    pub fn structure(name: impl Into<String>) -> Self {
        Self::Struct(name.into())
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::Enum(name.into())
    }

    pub fn native(name: impl Into<String>) -> Self {
        Self::Native(name.into())
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::I8 => write!(f, "i8"),
            Self::I16 => write!(f, "i16"),
            Self::I32 => write!(f, "i32"),
            Self::I64 => write!(f, "i64"),
            Self::U8 => write!(f, "u8"),
            Self::U16 => write!(f, "u16"),
            Self::U32 => write!(f, "u32"),
            Self::U64 => write!(f, "u64"),
            Self::F32 => write!(f, "f32"),
            Self::F64 => write!(f, "f64"),
            Self::Enum(name) | Self::Struct(name) => write!(f, "{}", name),
            Self::String => write!(f, "String"),
            Self::Array(item) => write!(f, "Array<{}>", item),
            Self::StaticArray(item, len) => write!(f, "[{}; {}]", item, len),
            Self::Set(item) => write!(f, "Set<{}>", item),
            Self::Map(key, value) => write!(f, "Map<{}, {}>", key, value),
            Self::Optional(item) => write!(f, "Optional<{}>", item),
            Self::Unique(item) => write!(f, "Unique<{}>", item),
            Self::Native(name) => write!(f, "native {}", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub kind: FieldKind,
}

/// Struct layout as reported by the host. `fields` lists own fields only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructInfo {
    pub name: String,
    pub occupancy: Occupancy,
    pub super_type: Option<String>,
    pub fields: Vec<FieldInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumInfo {
    pub name: String,
    pub mode: EnumMode,
    pub width: LeafWidth,
    pub enumerators: Vec<(String, u64)>,
}

/// What the engine needs from the host's reflection system.
pub trait HostReflection {
    fn resolve_struct(&self, name: &str) -> Option<StructInfo>;

    fn resolve_enum(&self, name: &str) -> Option<EnumInfo>;

    /// Run the default constructor of `name` on a zero-initialized instance.
    ///
    /// `instance` holds the flattened fields (super fields first). Returns
    /// `false` when the type has no constructor beyond zero-initialization.
    fn construct(&self, name: &str, instance: &mut StructValue) -> bool {
        let _ = (name, instance);
        false
    }
}
