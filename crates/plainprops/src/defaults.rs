// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Default instance cache.
//!
//! Every bound struct is classified once: either its zero-initialized
//! instance is already its default ([`DefaultKind::Zero`]) or the host
//! constructor changes it and the constructed instance is kept
//! ([`DefaultKind::Instanced`]). Both kinds store the instance so lookups
//! never allocate.

use crate::bind::{ItemBinding, RangeKind, TypeBinding};
use crate::context::Context;
use crate::error::BindError;
use crate::ids::DeclId;
use crate::reflect::HostReflection;
use crate::value::{SparseMap, SparseSet, StructValue, Value};

/// How a type's default was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultKind {
    /// Zero-initialized storage is the default.
    Zero,
    /// The constructor produces a non-zero instance.
    Instanced,
}

#[derive(Debug, Clone)]
struct DefaultEntry {
    kind: DefaultKind,
    instance: StructValue,
}

/// Per-type defaults, indexed by declaration id.
#[derive(Debug, Default, Clone)]
pub struct DefaultInstanceCache {
    entries: Vec<Option<DefaultEntry>>,
}

impl DefaultInstanceCache {
    /// Record a classification. A type that is already classified keeps its
    /// first entry.
    pub fn bind(&mut self, decl: DeclId, kind: DefaultKind, instance: StructValue) -> DefaultKind {
        let idx = decl.index();
        if self.entries.len() <= idx {
            self.entries.resize(idx + 1, None);
        }
        match &self.entries[idx] {
            Some(existing) => existing.kind,
            None => {
                self.entries[idx] = Some(DefaultEntry { kind, instance });
                kind
            }
        }
    }

    pub fn get(&self, decl: DeclId) -> Option<&StructValue> {
        self.entry(decl).map(|e| &e.instance)
    }

    pub fn kind(&self, decl: DeclId) -> Option<DefaultKind> {
        self.entry(decl).map(|e| e.kind)
    }

    /// Release a type's entry. Returns whether one existed.
    pub fn drop_type(&mut self, decl: DeclId) -> bool {
        match self.entries.get_mut(decl.index()) {
            Some(slot) => slot.take().is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, decl: DeclId) -> Option<&DefaultEntry> {
        self.entries.get(decl.index()).and_then(Option::as_ref)
    }
}

impl Context {
    /// Classify a bound struct, running the host constructor once.
    pub(crate) fn classify_default(
        &mut self,
        host: &dyn HostReflection,
        decl: DeclId,
    ) -> Result<DefaultKind, BindError> {
        if let Some(kind) = self.defaults.kind(decl) {
            return Ok(kind);
        }
        let name = match self.struct_binding(decl) {
            Some(binding) => binding.name.clone(),
            None => return Err(BindError::NotBound(self.type_name(decl))),
        };
        let mut instance = self.zero_struct(decl);
        let constructed = host.construct(&name, &mut instance);
        let kind = if instance.is_zero() {
            DefaultKind::Zero
        } else {
            DefaultKind::Instanced
        };
        log::debug!(
            "[plainprops] default of {} is {:?} (constructor ran: {})",
            name,
            kind,
            constructed
        );
        Ok(self.defaults.bind(decl, kind, instance))
    }

    /// Zero-initialized instance of a bound struct. Nested structs take their
    /// cached default when one exists.
    pub fn zero_struct(&self, decl: DeclId) -> StructValue {
        let mut visiting = Vec::new();
        self.zero_struct_guarded(decl, &mut visiting)
    }

    fn zero_struct_guarded(&self, decl: DeclId, visiting: &mut Vec<DeclId>) -> StructValue {
        let Some(binding) = self.struct_binding(decl) else {
            return StructValue::default();
        };
        if visiting.contains(&decl) {
            return StructValue::default();
        }
        visiting.push(decl);
        let mut fields = match binding.super_decl {
            Some(super_decl) => self.zero_struct_guarded(super_decl, visiting).into_fields(),
            None => Vec::new(),
        };
        fields.resize(binding.num_fields, Value::Bool(false));
        for member in &binding.members {
            if let Some(slot) = fields.get_mut(member.field) {
                *slot = self.zero_of(&member.ty, visiting);
            }
        }
        visiting.pop();
        StructValue::new(fields)
    }

    /// Freshly constructed value for a binding: leaves are zero, containers
    /// empty and structs their default instance.
    pub fn zero_value(&self, ty: &TypeBinding) -> Value {
        let mut visiting = Vec::new();
        self.zero_of(ty, &mut visiting)
    }

    fn zero_of(&self, ty: &TypeBinding, visiting: &mut Vec<DeclId>) -> Value {
        match ty {
            TypeBinding::Leaf(kind) => Value::zero_leaf(*kind),
            TypeBinding::Struct(decl) => match self.defaults.get(*decl) {
                Some(instance) => Value::Struct(instance.clone()),
                None => Value::Struct(self.zero_struct_guarded(*decl, visiting)),
            },
            TypeBinding::Range(codec) => match (codec.kind, &codec.item) {
                (RangeKind::StaticArray(len), ItemBinding::Single(item)) => {
                    Value::Array((0..len).map(|_| self.zero_of(item, visiting)).collect())
                }
                _ => codec.zero_container(self),
            },
            TypeBinding::Delta(id) => match self.delta_binding(*id).map(|d| d.kind) {
                Some(crate::bind::DeltaKind::Map) => Value::Map(SparseMap::new()),
                _ => Value::Set(SparseSet::new()),
            },
            TypeBinding::Static(id) => match self.static_binding(*id) {
                Some(fixed) => {
                    Value::Array((0..fixed.len).map(|_| self.zero_of(&fixed.item, visiting)).collect())
                }
                None => Value::Array(Vec::new()),
            },
            TypeBinding::Custom(id) => match self.custom(*id) {
                Some(custom) => custom.binding.zero(),
                None => Value::Bool(false),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{FieldKind, HostRegistry, StructBuilder};

    #[test]
    fn test_cache_bind_is_idempotent() {
        let mut cache = DefaultInstanceCache::default();
        let decl = DeclId(3);
        let first = StructValue::new(vec![Value::I32(1)]);
        assert_eq!(cache.bind(decl, DefaultKind::Instanced, first.clone()), DefaultKind::Instanced);
        assert_eq!(
            cache.bind(decl, DefaultKind::Zero, StructValue::new(vec![Value::I32(0)])),
            DefaultKind::Instanced
        );
        assert_eq!(cache.get(decl), Some(&first));
        assert_eq!(cache.len(), 1);
        assert!(cache.drop_type(decl));
        assert!(!cache.drop_type(decl));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_zero_and_instanced_classification() {
        let mut host = HostRegistry::new();
        host.add_struct(
            StructBuilder::new("Test::Plain")
                .field("A", FieldKind::I32)
                .field("B", FieldKind::String),
        )
        .add_struct(
            StructBuilder::new("Test::Tuned")
                .field_default("Speed", FieldKind::F32, 1.5f32)
                .field("Name", FieldKind::String),
        );
        let mut ctx = Context::default();
        let plain = ctx.bind_struct(&host, "Test::Plain").expect("bind plain");
        let tuned = ctx.bind_struct(&host, "Test::Tuned").expect("bind tuned");

        assert_eq!(ctx.default_kind(plain), Some(DefaultKind::Zero));
        assert_eq!(ctx.default_kind(tuned), Some(DefaultKind::Instanced));
        let instance = ctx.default_instance(tuned).expect("instance");
        assert_eq!(instance.field(0), Some(&Value::F32(1.5)));
        assert_eq!(instance.field(1), Some(&Value::String(String::new())));
    }

    #[test]
    fn test_nested_struct_uses_cached_default() {
        let mut host = HostRegistry::new();
        host.add_struct(StructBuilder::new("Test::Inner").field_default("X", FieldKind::I16, 9i16))
            .add_struct(
                StructBuilder::new("Test::Outer")
                    .field("Inner", FieldKind::structure("Test::Inner"))
                    .field("Items", FieldKind::array(FieldKind::structure("Test::Inner"))),
            );
        let mut ctx = Context::default();
        let outer = ctx.bind_struct(&host, "Test::Outer").expect("bind");
        let zero = ctx.zero_struct(outer);
        assert_eq!(
            zero.field(0),
            Some(&Value::Struct(StructValue::new(vec![Value::I16(9)])))
        );
        assert_eq!(ctx.default_kind(outer), Some(DefaultKind::Instanced));

        let inner = ctx.find_struct("Test::Inner").expect("inner");
        assert!(ctx.invalidate_default(inner));
        assert_eq!(ctx.default_kind(inner), None);
    }
}
