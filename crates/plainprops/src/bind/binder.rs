// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Recursive member binder.
//!
//! Binding a struct resolves it through the host, binds its super and every
//! nested struct or enum on demand, declares it and builds one
//! [`MemberBinding`] per own field. Containers wrap the item binding in
//! shared range codecs; sets and maps become delta structs; short static
//! arrays in sparse structs become numbered sub-field structs.

use super::{
    DeltaBinding, DeltaId, DeltaKind, ItemBinding, MemberBinding, RangeKind, RangeSizeType,
    StaticBinding, StaticId, StructBinding, TypeBinding,
};
use crate::context::Context;
use crate::declaration::Occupancy;
use crate::error::BindError;
use crate::ids::{DeclId, EnumId, MemberId};
use crate::leaf::LeafKind;
use crate::reflect::{FieldKind, HostReflection, StructInfo};
use std::collections::HashSet;

struct Binder<'c, 'h> {
    ctx: &'c mut Context,
    host: &'h dyn HostReflection,
    in_progress: HashSet<DeclId>,
    /// Completed in dependency order, nested types first.
    bound: Vec<DeclId>,
    /// Declared by this run.
    declared: Vec<DeclId>,
}

impl<'c, 'h> Binder<'c, 'h> {
    fn new(ctx: &'c mut Context, host: &'h dyn HostReflection) -> Self {
        Self {
            ctx,
            host,
            in_progress: HashSet::new(),
            bound: Vec::new(),
            declared: Vec::new(),
        }
    }

    fn bind_struct(&mut self, name: &str) -> Result<DeclId, BindError> {
        let key = self.ctx.type_key(name);
        let decl = self.ctx.types.index_struct(key);
        if self.ctx.is_bound(decl) || self.in_progress.contains(&decl) {
            return Ok(decl);
        }
        let info = self
            .host
            .resolve_struct(name)
            .ok_or_else(|| BindError::UnknownStruct(name.to_string()))?;

        self.in_progress.insert(decl);
        let result = self.bind_info(decl, &info);
        self.in_progress.remove(&decl);
        let binding = result?;

        let idx = decl.index();
        if self.ctx.structs.len() <= idx {
            self.ctx.structs.resize_with(idx + 1, || None);
        }
        log::debug!(
            "[plainprops] bound {} ({} members, {:?})",
            binding.name,
            binding.members.len(),
            binding.occupancy
        );
        self.ctx.structs[idx] = Some(binding);
        self.bound.push(decl);
        Ok(decl)
    }

    fn bind_info(&mut self, decl: DeclId, info: &StructInfo) -> Result<StructBinding, BindError> {
        let super_binding = match &info.super_type {
            Some(super_name) => {
                let super_decl = self.bind_struct(super_name)?;
                let binding = self
                    .ctx
                    .struct_binding(super_decl)
                    .cloned()
                    .ok_or_else(|| BindError::NotBound(super_name.clone()))?;
                Some(binding)
            }
            None => None,
        };
        let super_decl = super_binding.as_ref().map(|b| b.decl);
        let base = super_binding.as_ref().map_or(0, |b| b.num_fields);

        if self.ctx.declarations.get_struct(decl).is_none() {
            let key = self
                .ctx
                .types
                .struct_key(decl)
                .ok_or_else(|| BindError::UnknownStruct(info.name.clone()))?;
            let own: Vec<MemberId> = info
                .fields
                .iter()
                .map(|f| MemberId(self.ctx.intern(&f.name)))
                .collect();
            self.ctx
                .declarations
                .declare_struct(&info.name, decl, key, own, info.occupancy, super_decl)?;
            self.declared.push(decl);
        }

        let dense = info.occupancy == Occupancy::RequireAll;
        let mut members = match &super_binding {
            Some(binding) if dense => self.flatten(binding),
            _ => Vec::new(),
        };
        for (i, field) in info.fields.iter().enumerate() {
            let ty = self.bind_kind(&info.name, Some(info.occupancy), &field.name, &field.kind)?;
            members.push(MemberBinding {
                member: MemberId(self.ctx.intern(&field.name)),
                field: base + i,
                ty,
            });
        }

        Ok(StructBinding {
            decl,
            name: info.name.clone(),
            occupancy: info.occupancy,
            super_decl: if dense { None } else { super_decl },
            num_fields: base + info.fields.len(),
            members,
        })
    }

    /// Member bindings of `binding` and all of its supers, outermost first.
    fn flatten(&self, binding: &StructBinding) -> Vec<MemberBinding> {
        let mut out = match binding.super_decl.and_then(|d| self.ctx.struct_binding(d)) {
            Some(parent) => self.flatten(parent),
            None => Vec::new(),
        };
        out.extend(binding.members.iter().cloned());
        out
    }

    /// `occupancy` is the owner's for direct fields and `None` inside containers.
    fn bind_kind(
        &mut self,
        owner: &str,
        occupancy: Option<Occupancy>,
        field: &str,
        kind: &FieldKind,
    ) -> Result<TypeBinding, BindError> {
        let leaf = |kind| Ok(TypeBinding::Leaf(kind));
        match kind {
            FieldKind::Bool => leaf(LeafKind::Bool),
            FieldKind::I8 => leaf(LeafKind::I8),
            FieldKind::I16 => leaf(LeafKind::I16),
            FieldKind::I32 => leaf(LeafKind::I32),
            FieldKind::I64 => leaf(LeafKind::I64),
            FieldKind::U8 => leaf(LeafKind::U8),
            FieldKind::U16 => leaf(LeafKind::U16),
            FieldKind::U32 => leaf(LeafKind::U32),
            FieldKind::U64 => leaf(LeafKind::U64),
            FieldKind::F32 => leaf(LeafKind::F32),
            FieldKind::F64 => leaf(LeafKind::F64),
            FieldKind::Enum(name) => {
                let (id, width) = self.bind_enum(name)?;
                leaf(LeafKind::Enum(id, width))
            }
            FieldKind::Struct(name) => Ok(TypeBinding::Struct(self.bind_struct(name)?)),
            FieldKind::String => Ok(self.range(
                RangeKind::String,
                RangeSizeType::U32,
                TypeBinding::Leaf(LeafKind::U8),
            )),
            FieldKind::Array(item) => {
                let item = self.bind_kind(owner, None, field, item)?;
                Ok(self.range(RangeKind::Array, RangeSizeType::U32, item))
            }
            FieldKind::Optional(item) => {
                let item = self.bind_kind(owner, None, field, item)?;
                Ok(self.range(RangeKind::Optional, RangeSizeType::Uni, item))
            }
            FieldKind::Unique(item) => {
                let item = self.bind_kind(owner, None, field, item)?;
                Ok(self.range(RangeKind::Unique, RangeSizeType::Uni, item))
            }
            FieldKind::StaticArray(item_kind, len) => {
                let item = self.bind_kind(owner, None, field, item_kind)?;
                let numbered = occupancy == Some(Occupancy::AllowSparse)
                    && *len <= self.ctx.config.max_static_array_members;
                if numbered {
                    Ok(TypeBinding::Static(self.bind_static(kind, item, *len)?))
                } else {
                    Ok(self.range(RangeKind::StaticArray(*len), RangeSizeType::fitting(*len), item))
                }
            }
            FieldKind::Set(item_kind) => {
                let item = self.bind_kind(owner, None, field, item_kind)?;
                Ok(TypeBinding::Delta(self.bind_set(kind, item)?))
            }
            FieldKind::Map(key_kind, value_kind) => {
                let key = self.bind_kind(owner, None, field, key_kind)?;
                let value = self.bind_kind(owner, None, field, value_kind)?;
                let pair_name = format!("Pair<{}, {}>", key_kind, value_kind);
                Ok(TypeBinding::Delta(self.bind_map(kind, &pair_name, key, value)?))
            }
            FieldKind::Native(name) => match self.ctx.customs.find(name) {
                Some(id) => Ok(TypeBinding::Custom(id)),
                None => Err(BindError::UnrecognizedFieldKind {
                    owner: owner.to_string(),
                    field: field.to_string(),
                    kind: kind.to_string(),
                }),
            },
        }
    }

    fn range(&mut self, kind: RangeKind, size: RangeSizeType, item: TypeBinding) -> TypeBinding {
        TypeBinding::Range(self.ctx.ranges.intern(kind, size, ItemBinding::Single(item)))
    }

    fn bind_enum(&mut self, name: &str) -> Result<(EnumId, crate::leaf::LeafWidth), BindError> {
        if let Some(id) = self.ctx.find_enum(name) {
            if let Some(decl) = self.ctx.resolve_enum(id) {
                return Ok((id, decl.width));
            }
        }
        let info = self
            .host
            .resolve_enum(name)
            .ok_or_else(|| BindError::UnknownEnum(name.to_string()))?;
        let id = self.ctx.declare_enum(&info)?;
        let width = self.ctx.resolve_enum(id).map_or(info.width, |d| d.width);
        log::debug!("[plainprops] bound enum {} ({:?})", name, info.mode);
        Ok((id, width))
    }

    fn bind_static(&mut self, shape: &FieldKind, item: TypeBinding, len: u32) -> Result<StaticId, BindError> {
        let members: Vec<MemberId> = (0..len)
            .map(|i| MemberId(self.ctx.intern(&i.to_string())))
            .collect();
        let decl = self
            .ctx
            .declare_builtin(&shape.to_string(), members.clone(), Occupancy::AllowSparse)?;
        if let Some(&id) = self.ctx.static_index.get(&decl) {
            return Ok(id);
        }
        let id = StaticId(self.ctx.statics.len() as u32);
        self.ctx.statics.push(StaticBinding {
            decl,
            len,
            item,
            members,
        });
        self.ctx.static_index.insert(decl, id);
        Ok(id)
    }

    fn delta_decl(&mut self, shape: &FieldKind) -> Result<DeclId, BindError> {
        let b = self.ctx.builtin;
        Ok(self.ctx.declare_builtin(
            &shape.to_string(),
            vec![b.assign, b.remove, b.insert],
            Occupancy::AllowSparse,
        )?)
    }

    fn bind_set(&mut self, shape: &FieldKind, item: TypeBinding) -> Result<DeltaId, BindError> {
        let decl = self.delta_decl(shape)?;
        if let Some(&id) = self.ctx.delta_index.get(&decl) {
            return Ok(id);
        }
        let items = self
            .ctx
            .ranges
            .intern(RangeKind::Set, RangeSizeType::U32, ItemBinding::Single(item));
        Ok(self.push_delta(DeltaBinding {
            decl,
            kind: DeltaKind::Set,
            keys: items.clone(),
            items,
        }))
    }

    fn bind_map(
        &mut self,
        shape: &FieldKind,
        pair_name: &str,
        key: TypeBinding,
        value: TypeBinding,
    ) -> Result<DeltaId, BindError> {
        let decl = self.delta_decl(shape)?;
        if let Some(&id) = self.ctx.delta_index.get(&decl) {
            return Ok(id);
        }
        let b = self.ctx.builtin;
        let pair = self
            .ctx
            .declare_builtin(pair_name, vec![b.key, b.value], Occupancy::RequireAll)?;
        let items = self.ctx.ranges.intern(
            RangeKind::Map,
            RangeSizeType::U32,
            ItemBinding::Pair {
                pair,
                key: key.clone(),
                value,
            },
        );
        let keys = self
            .ctx
            .ranges
            .intern(RangeKind::Set, RangeSizeType::U32, ItemBinding::Single(key));
        Ok(self.push_delta(DeltaBinding {
            decl,
            kind: DeltaKind::Map,
            items,
            keys,
        }))
    }

    fn push_delta(&mut self, binding: DeltaBinding) -> DeltaId {
        let id = DeltaId(self.ctx.deltas.len() as u32);
        self.ctx.delta_index.insert(binding.decl, id);
        self.ctx.deltas.push(binding);
        id
    }
}

impl Context {
    /// Bind `name` and everything it references, then classify the defaults
    /// of every newly bound struct.
    ///
    /// Binding an already bound type is a no-op returning its id.
    pub fn bind_struct(&mut self, host: &dyn HostReflection, name: &str) -> Result<DeclId, BindError> {
        let mut binder = Binder::new(self, host);
        let result = binder.bind_struct(name);
        let bound = std::mem::take(&mut binder.bound);
        let declared = std::mem::take(&mut binder.declared);

        for decl in declared {
            if !self.is_bound(decl) {
                self.declarations.drop_struct(decl);
            }
        }
        for &decl in &bound {
            self.classify_default(host, decl)?;
        }
        if let Err(err) = &result {
            log::debug!("[plainprops] binding {} failed: {}", name, err);
        }
        result
    }

    /// Bind an enum on its own.
    pub fn bind_enum(&mut self, host: &dyn HostReflection, name: &str) -> Result<EnumId, BindError> {
        let mut binder = Binder::new(self, host);
        binder.bind_enum(name).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchConfig;
    use crate::reflect::{EnumBuilder, HostRegistry, StructBuilder};
    use std::sync::Arc;

    fn host() -> HostRegistry {
        let mut host = HostRegistry::new();
        host.add_enum(EnumBuilder::new("Game::Color").variant("Red").variant("Blue"))
            .add_struct(
                StructBuilder::new("Game::Base")
                    .field("Id", FieldKind::U32)
                    .field("Tint", FieldKind::enumeration("Game::Color")),
            )
            .add_struct(
                StructBuilder::new("Game::Item")
                    .super_type("Game::Base")
                    .field("Tags", FieldKind::set(FieldKind::String))
                    .field("Stats", FieldKind::map(FieldKind::String, FieldKind::F32))
                    .field("Slots", FieldKind::static_array(FieldKind::I16, 4))
                    .field("Names", FieldKind::array(FieldKind::optional(FieldKind::String)))
                    .field("Children", FieldKind::array(FieldKind::structure("Game::Item"))),
            )
            .add_struct(
                StructBuilder::new("Game::Point")
                    .dense()
                    .super_type("Game::Base")
                    .field("X", FieldKind::F32)
                    .field("Grid", FieldKind::static_array(FieldKind::U8, 300)),
            );
        host
    }

    #[test]
    fn test_sparse_struct_keeps_super() {
        let mut ctx = Context::default();
        let item = ctx.bind_struct(&host(), "Game::Item").expect("bind");
        let binding = ctx.struct_binding(item).expect("bound");
        let base = ctx.find_struct("Game::Base").expect("base");
        assert_eq!(binding.super_decl, Some(base));
        assert_eq!(binding.num_fields, 7);
        assert_eq!(binding.members.len(), 5);
        assert_eq!(ctx.field_index(item, "Tint"), Some(1));
        assert_eq!(ctx.field_index(item, "Slots"), Some(4));

        let tags = ctx.member_id("Tags").expect("interned");
        assert!(matches!(
            ctx.member_binding(item, tags).map(|m| &m.ty),
            Some(TypeBinding::Delta(_))
        ));
        let slots = ctx.member_id("Slots").expect("interned");
        assert!(matches!(
            ctx.member_binding(item, slots).map(|m| &m.ty),
            Some(TypeBinding::Static(_))
        ));
    }

    #[test]
    fn test_dense_struct_flattens_and_binds_static_as_range() {
        let mut ctx = Context::default();
        let point = ctx.bind_struct(&host(), "Game::Point").expect("bind");
        let binding = ctx.struct_binding(point).expect("bound");
        assert_eq!(binding.super_decl, None);
        assert_eq!(binding.members.len(), 4);
        let grid = ctx.member_id("Grid").expect("interned");
        match ctx.member_binding(point, grid).map(|m| &m.ty) {
            Some(TypeBinding::Range(codec)) => {
                assert_eq!(codec.kind, RangeKind::StaticArray(300));
                assert_eq!(codec.size, RangeSizeType::U16);
            }
            other => panic!("unexpected {:?}", other),
        }
        let decl = ctx.resolve_struct(point).expect("declared");
        assert_eq!(decl.members.len(), 4);
    }

    #[test]
    fn test_identical_shapes_share_codecs() {
        let mut host = host();
        host.add_struct(
            StructBuilder::new("Game::Other")
                .field("Names", FieldKind::array(FieldKind::optional(FieldKind::String))),
        );
        let mut ctx = Context::default();
        let item = ctx.bind_struct(&host, "Game::Item").expect("item");
        let other = ctx.bind_struct(&host, "Game::Other").expect("other");
        let names = ctx.member_id("Names").expect("interned");
        let a = ctx.member_binding(item, names).map(|m| m.ty.clone());
        let b = ctx.member_binding(other, names).map(|m| m.ty.clone());
        match (a, b) {
            (Some(TypeBinding::Range(a)), Some(TypeBinding::Range(b))) => {
                assert!(Arc::ptr_eq(&a, &b));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unrecognized_native_is_fatal() {
        let mut host = HostRegistry::new();
        host.add_struct(StructBuilder::new("Game::Weird").field("Blob", FieldKind::native("Texture")));
        let mut ctx = Context::default();
        let err = ctx.bind_struct(&host, "Game::Weird").expect_err("unrecognized");
        assert!(matches!(err, BindError::UnrecognizedFieldKind { ref kind, .. } if kind == "native Texture"));
        let decl = ctx.find_struct("Game::Weird").expect("indexed");
        assert!(ctx.resolve_struct(decl).is_none());
        assert!(!ctx.is_bound(decl));
    }

    #[test]
    fn test_unknown_struct_and_enum() {
        let mut host = HostRegistry::new();
        host.add_struct(StructBuilder::new("Game::A").field("E", FieldKind::enumeration("Game::Nope")));
        let mut ctx = Context::default();
        assert_eq!(
            ctx.bind_struct(&host, "Game::Missing"),
            Err(BindError::UnknownStruct("Game::Missing".into()))
        );
        assert_eq!(
            ctx.bind_struct(&host, "Game::A"),
            Err(BindError::UnknownEnum("Game::Nope".into()))
        );
    }

    #[test]
    fn test_static_limit_from_config() {
        let mut ctx = Context::new(BatchConfig {
            max_static_array_members: 2,
            ..BatchConfig::default()
        });
        let item = ctx.bind_struct(&host(), "Game::Item").expect("bind");
        let slots = ctx.member_id("Slots").expect("interned");
        assert!(matches!(
            ctx.member_binding(item, slots).map(|m| &m.ty),
            Some(TypeBinding::Range(_))
        ));
    }

    #[test]
    fn test_rebind_after_unbind() {
        let host = host();
        let mut ctx = Context::default();
        let base = ctx.bind_struct(&host, "Game::Base").expect("bind");
        assert_eq!(ctx.bind_struct(&host, "Game::Base"), Ok(base));
        assert!(ctx.unbind_struct(base));
        assert!(ctx.default_instance(base).is_none());
        assert_eq!(ctx.bind_struct(&host, "Game::Base"), Ok(base));
        assert!(ctx.default_instance(base).is_some());
    }
}
