// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.
//!
//! Three families, by recoverability:
//!
//! - **Schema/bind** errors (`SchemaError`, `BindError`): development-time faults,
//!   meant to surface in CI rather than at runtime.
//! - **Wire** errors (`WireError`): a corrupt or truncated blob. Fatal for the
//!   current load call only; the caller may retry with other input.
//! - **Save/load** errors (`SaveError`, `LoadError`): a live value or saved
//!   record that does not fit its binding. Output written before the fault is
//!   not rolled back, so the caller must discard it.
//!
//! Diff results are never errors.

use std::fmt;

/// Declaration faults raised by the schema registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    DuplicateStruct(String),
    DuplicateEnum(String),
    UnresolvedSuper { ty: String, super_type: String },
    InvalidEnum { ty: String, reason: String },
    /// A member name appears twice once the super chain is flattened.
    DuplicateMember { ty: String, member: String },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateStruct(name) => write!(f, "Struct declared twice: {}", name),
            Self::DuplicateEnum(name) => write!(f, "Enum declared twice: {}", name),
            Self::UnresolvedSuper { ty, super_type } => {
                write!(f, "Super {} of {} is not declared", super_type, ty)
            }
            Self::InvalidEnum { ty, reason } => write!(f, "Invalid enum {}: {}", ty, reason),
            Self::DuplicateMember { ty, member } => {
                write!(f, "Member {} of {} repeats a member name", member, ty)
            }
        }
    }
}

impl std::error::Error for SchemaError {}

/// Faults raised while binding host types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    Schema(SchemaError),
    UnknownStruct(String),
    UnknownEnum(String),
    UnrecognizedFieldKind {
        owner: String,
        field: String,
        kind: String,
    },
    NotBound(String),
    DuplicateCustom(String),
}

impl fmt::Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Schema(err) => write!(f, "Schema error: {}", err),
            Self::UnknownStruct(name) => write!(f, "Host cannot resolve struct: {}", name),
            Self::UnknownEnum(name) => write!(f, "Host cannot resolve enum: {}", name),
            Self::UnrecognizedFieldKind { owner, field, kind } => {
                write!(f, "Unrecognized field kind {} for {}.{}", kind, owner, field)
            }
            Self::NotBound(name) => write!(f, "Type is not bound: {}", name),
            Self::DuplicateCustom(name) => write!(f, "Custom binding registered twice: {}", name),
        }
    }
}

impl std::error::Error for BindError {}

impl From<SchemaError> for BindError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

/// Malformed blob contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    BadMagic {
        offset: usize,
        expected: u32,
        found: u32,
    },
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    InvalidVarInt {
        offset: usize,
    },
    InvalidSchema(String),
    InvalidNames(String),
    TrailingBytes {
        offset: usize,
    },
    InvalidPayload {
        offset: usize,
        reason: String,
    },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic {
                offset,
                expected,
                found,
            } => write!(
                f,
                "Bad magic at offset {}: expected {:#010x}, found {:#010x}",
                offset, expected, found
            ),
            Self::Truncated {
                offset,
                needed,
                available,
            } => write!(
                f,
                "Truncated at offset {}: need {} bytes, {} available",
                offset, needed, available
            ),
            Self::InvalidVarInt { offset } => write!(f, "Invalid varint at offset {}", offset),
            Self::InvalidSchema(reason) => write!(f, "Invalid schema: {}", reason),
            Self::InvalidNames(reason) => write!(f, "Invalid name table: {}", reason),
            Self::TrailingBytes { offset } => write!(f, "Unexpected bytes at offset {}", offset),
            Self::InvalidPayload { offset, reason } => {
                write!(f, "Invalid payload at offset {}: {}", offset, reason)
            }
        }
    }
}

impl std::error::Error for WireError {}

/// Faults raised while building or writing a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    Bind(BindError),
    Wire(WireError),
    ValueMismatch {
        expected: String,
        found: &'static str,
    },
    FieldCount {
        ty: String,
        expected: usize,
        found: usize,
    },
    InvalidEnumValue {
        ty: String,
        value: u64,
    },
    TooManyItems {
        count: u64,
        max: u64,
    },
    ItemCount {
        expected: u64,
        found: u64,
    },
    InconsistentMember {
        ty: String,
        member: String,
    },
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(err) => write!(f, "Bind error: {}", err),
            Self::Wire(err) => write!(f, "Wire error: {}", err),
            Self::ValueMismatch { expected, found } => {
                write!(f, "Value mismatch: expected {}, got {}", expected, found)
            }
            Self::FieldCount {
                ty,
                expected,
                found,
            } => write!(
                f,
                "Struct {} expects {} fields, value has {}",
                ty, expected, found
            ),
            Self::InvalidEnumValue { ty, value } => {
                write!(f, "Value {:#x} is not valid for enum {}", value, ty)
            }
            Self::TooManyItems { count, max } => {
                write!(f, "Range of {} items exceeds size type maximum {}", count, max)
            }
            Self::ItemCount { expected, found } => {
                write!(f, "Static array expects {} items, value has {}", expected, found)
            }
            Self::InconsistentMember { ty, member } => {
                write!(f, "Member {}.{} saved with conflicting types", ty, member)
            }
        }
    }
}

impl std::error::Error for SaveError {}

impl From<BindError> for SaveError {
    fn from(err: BindError) -> Self {
        Self::Bind(err)
    }
}

impl From<WireError> for SaveError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

/// Faults raised while loading records into live values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Wire(WireError),
    Bind(BindError),
    UnknownSchema(u32),
    UnboundType(String),
    UnknownMember { ty: String, member: String },
    TypeMismatch { ty: String, member: String },
    ValueMismatch { expected: String, found: &'static str },
    ItemCount { expected: u64, found: u64 },
    FieldCount { ty: String, expected: usize, found: usize },
    InvalidUtf8,
    ObjectIndex { index: usize, len: usize },
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wire(err) => write!(f, "Wire error: {}", err),
            Self::Bind(err) => write!(f, "Bind error: {}", err),
            Self::UnknownSchema(id) => write!(f, "Record references unknown schema {}", id),
            Self::UnboundType(name) => write!(f, "Saved type has no live binding: {}", name),
            Self::UnknownMember { ty, member } => {
                write!(f, "Saved member {}.{} has no live binding", ty, member)
            }
            Self::TypeMismatch { ty, member } => {
                write!(f, "Saved type of {}.{} does not match its binding", ty, member)
            }
            Self::ValueMismatch { expected, found } => {
                write!(f, "Value mismatch: expected {}, got {}", expected, found)
            }
            Self::ItemCount { expected, found } => {
                write!(f, "Item count mismatch: expected {}, got {}", expected, found)
            }
            Self::FieldCount {
                ty,
                expected,
                found,
            } => write!(
                f,
                "Struct {} expects {} fields, destination has {}",
                ty, expected, found
            ),
            Self::InvalidUtf8 => write!(f, "String payload is not valid UTF-8"),
            Self::ObjectIndex { index, len } => {
                write!(f, "Object index out of bounds: {} >= {}", index, len)
            }
        }
    }
}

impl std::error::Error for LoadError {}

impl From<WireError> for LoadError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

impl From<BindError> for LoadError {
    fn from(err: BindError) -> Self {
        Self::Bind(err)
    }
}

/// Faults raised by the YAML debug dump.
#[derive(Debug)]
pub enum TextError {
    Yaml(serde_yaml::Error),
    Wire(WireError),
    MissingNames,
    Syntax(String),
}

impl fmt::Display for TextError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::Wire(err) => write!(f, "Wire error: {}", err),
            Self::MissingNames => write!(f, "Batch has no name table"),
            Self::Syntax(msg) => write!(f, "Invalid dump: {}", msg),
        }
    }
}

impl std::error::Error for TextError {}

impl From<serde_yaml::Error> for TextError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err)
    }
}

impl From<WireError> for TextError {
    fn from(err: WireError) -> Self {
        Self::Wire(err)
    }
}

/// Faults raised while loading a `BatchConfig`.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "I/O error: {}", err),
            Self::Yaml(err) => write!(f, "YAML error: {}", err),
            Self::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err)
    }
}
