// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! In-memory host with fluent builders.

use super::{EnumInfo, FieldInfo, FieldKind, HostReflection, StructInfo};
use crate::declaration::{EnumMode, Occupancy};
use crate::leaf::LeafWidth;
use crate::value::{StructValue, Value};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct RegisteredStruct {
    info: StructInfo,
    /// Constructor values for own fields.
    defaults: Vec<Option<Value>>,
}

/// Reflection host backed by hash maps.
#[derive(Debug, Default, Clone)]
pub struct HostRegistry {
    structs: HashMap<String, RegisteredStruct>,
    enums: HashMap<String, EnumInfo>,
}

impl HostRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a struct, replacing any previous one with the same name.
    pub fn add_struct(&mut self, builder: StructBuilder) -> &mut Self {
        let registered = builder.build();
        self.structs
            .insert(registered.info.name.clone(), registered);
        self
    }

    pub fn add_enum(&mut self, builder: EnumBuilder) -> &mut Self {
        let info = builder.build();
        self.enums.insert(info.name.clone(), info);
        self
    }

    /// Number of flattened fields of `name`, super fields included.
    pub fn num_fields(&self, name: &str) -> Option<usize> {
        let entry = self.structs.get(name)?;
        let inherited = match &entry.info.super_type {
            Some(super_type) => self.num_fields(super_type)?,
            None => 0,
        };
        Some(inherited + entry.info.fields.len())
    }

    /// Flattened index of `field` in `name`, searching own fields before supers.
    pub fn field_index(&self, name: &str, field: &str) -> Option<usize> {
        let entry = self.structs.get(name)?;
        let inherited = match &entry.info.super_type {
            Some(super_type) => self.num_fields(super_type)?,
            None => 0,
        };
        if let Some(pos) = entry.info.fields.iter().position(|f| f.name == field) {
            return Some(inherited + pos);
        }
        self.field_index(entry.info.super_type.as_deref()?, field)
    }
}

impl HostReflection for HostRegistry {
    fn resolve_struct(&self, name: &str) -> Option<StructInfo> {
        self.structs.get(name).map(|s| s.info.clone())
    }

    fn resolve_enum(&self, name: &str) -> Option<EnumInfo> {
        self.enums.get(name).cloned()
    }

    fn construct(&self, name: &str, instance: &mut StructValue) -> bool {
        let Some(entry) = self.structs.get(name) else {
            return false;
        };
        let mut constructed = false;
        let offset = match &entry.info.super_type {
            Some(super_type) => {
                constructed |= self.construct(super_type, instance);
                self.num_fields(super_type).unwrap_or(0)
            }
            None => 0,
        };
        for (i, (field, default)) in entry.info.fields.iter().zip(&entry.defaults).enumerate() {
            let idx = offset + i;
            match (default, &field.kind) {
                (Some(value), _) => {
                    constructed |= instance.set_field(idx, value.clone());
                }
                (None, FieldKind::Struct(nested)) => {
                    if let Some(Value::Struct(inner)) = instance.field_mut(idx) {
                        constructed |= self.construct(nested, inner);
                    }
                }
                (None, _) => {}
            }
        }
        constructed
    }
}

/// Fluent builder for host structs.
#[derive(Debug)]
pub struct StructBuilder {
    info: StructInfo,
    defaults: Vec<Option<Value>>,
}

impl StructBuilder {
    /// New sparse struct without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: StructInfo {
                name: name.into(),
                occupancy: Occupancy::AllowSparse,
                super_type: None,
                fields: Vec::new(),
            },
            defaults: Vec::new(),
        }
    }

    /// Every member is always serialized.
    pub fn dense(mut self) -> Self {
        self.info.occupancy = Occupancy::RequireAll;
        self
    }

    pub fn sparse(mut self) -> Self {
        self.info.occupancy = Occupancy::AllowSparse;
        self
    }

    pub fn super_type(mut self, name: impl Into<String>) -> Self {
        self.info.super_type = Some(name.into());
        self
    }

    /// Add a zero-initialized field.
    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.info.fields.push(FieldInfo {
            name: name.into(),
            kind,
        });
        self.defaults.push(None);
        self
    }

    /// Add a field the constructor sets to `value`.
    pub fn field_default(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        value: impl Into<Value>,
    ) -> Self {
        self.info.fields.push(FieldInfo {
            name: name.into(),
            kind,
        });
        self.defaults.push(Some(value.into()));
        self
    }

    fn build(self) -> RegisteredStruct {
        RegisteredStruct {
            info: self.info,
            defaults: self.defaults,
        }
    }
}

/// Fluent builder for host enums.
#[derive(Debug)]
pub struct EnumBuilder {
    info: EnumInfo,
    next_value: u64,
}

impl EnumBuilder {
    /// New flat enum with 8-bit storage.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            info: EnumInfo {
                name: name.into(),
                mode: EnumMode::Flat,
                width: LeafWidth::B8,
                enumerators: Vec::new(),
            },
            next_value: 0,
        }
    }

    /// Switch to flag mode; `variant` then allocates the next free bit.
    pub fn flags(mut self) -> Self {
        self.info.mode = EnumMode::Flag;
        if self.next_value == 0 {
            self.next_value = 1;
        }
        self
    }

    pub fn width(mut self, width: LeafWidth) -> Self {
        self.info.width = width;
        self
    }

    /// Add a variant with auto-incrementing value (next bit for flags).
    pub fn variant(mut self, name: impl Into<String>) -> Self {
        let value = self.next_value;
        self.info.enumerators.push((name.into(), value));
        self.next_value = match self.info.mode {
            EnumMode::Flat => value.wrapping_add(1),
            EnumMode::Flag => value.wrapping_shl(1),
        };
        self
    }

    /// Add a variant with explicit value.
    pub fn variant_value(mut self, name: impl Into<String>, value: u64) -> Self {
        self.info.enumerators.push((name.into(), value));
        self.next_value = match self.info.mode {
            EnumMode::Flat => value.wrapping_add(1),
            EnumMode::Flag if value == 0 => 1,
            EnumMode::Flag => value.wrapping_shl(1),
        };
        self
    }

    fn build(self) -> EnumInfo {
        self.info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> HostRegistry {
        let mut host = HostRegistry::new();
        host.add_struct(
            StructBuilder::new("Game::Vec2")
                .dense()
                .field("X", FieldKind::F32)
                .field("Y", FieldKind::F32),
        )
        .add_struct(
            StructBuilder::new("Game::Actor")
                .field_default("Health", FieldKind::I32, 100i32)
                .field("Position", FieldKind::structure("Game::Vec2")),
        )
        .add_struct(
            StructBuilder::new("Game::Player")
                .super_type("Game::Actor")
                .field_default("Name", FieldKind::String, "anon"),
        )
        .add_enum(EnumBuilder::new("Game::Mask").flags().variant("A").variant("B").variant("C"));
        host
    }

    #[test]
    fn test_flattened_field_indices() {
        let host = registry();
        assert_eq!(host.num_fields("Game::Player"), Some(3));
        assert_eq!(host.field_index("Game::Player", "Name"), Some(2));
        assert_eq!(host.field_index("Game::Player", "Health"), Some(0));
        assert_eq!(host.field_index("Game::Player", "Missing"), None);
    }

    #[test]
    fn test_construct_runs_super_constructor() {
        let host = registry();
        let mut instance = StructValue::new(vec![
            Value::I32(0),
            Value::Struct(StructValue::new(vec![Value::F32(0.0), Value::F32(0.0)])),
            Value::from(""),
        ]);
        assert!(host.construct("Game::Player", &mut instance));
        assert_eq!(instance.field(0), Some(&Value::I32(100)));
        assert_eq!(instance.field(2), Some(&Value::from("anon")));

        let mut vec2 = StructValue::new(vec![Value::F32(0.0), Value::F32(0.0)]);
        assert!(!host.construct("Game::Vec2", &mut vec2));
    }

    #[test]
    fn test_flag_builder_allocates_bits() {
        let host = registry();
        let info = host.resolve_enum("Game::Mask").expect("enum");
        let values: Vec<u64> = info.enumerators.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![1, 2, 4]);
        assert_eq!(info.mode, EnumMode::Flag);
    }
}
