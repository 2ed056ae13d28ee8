// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded records to live values.
//!
//! A [`LoadPlan`] maps the schema-time ids of one batch onto the live context:
//! name table entries to [`NameId`]s, struct schemas to [`DeclId`]s and enum
//! schemas to [`EnumId`]s. [`StructLoader`] then replays decoded records onto
//! destination values, checking every saved type against its binding.
//! Members absent from a record keep their destination value.

use crate::bind::{
    CustomLoadView, ItemBinding, ItemSlots, MakeItemsRequest, RangeCodec, StaticBinding,
    TypeBinding,
};
use crate::context::Context;
use crate::error::{BindError, LoadError};
use crate::ids::{DeclId, EnumId, MemberId, NameId, TypeKey};
use crate::leaf::LeafKind;
use crate::read::{ReadStruct, ReadValue};
use crate::schema::{SchemaBatch, SchemaType, StructSchema};
use crate::value::{StructValue, Value};

#[derive(Debug, Clone)]
enum NamePlan {
    /// Table index to live name, with the saved text for messages.
    Table {
        ids: Vec<Option<NameId>>,
        text: Vec<String>,
    },
    /// Schema names are live ids below this bound.
    InMemory(usize),
}

/// Schema-time ids of one batch resolved against a context.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    names: NamePlan,
    structs: Vec<Option<DeclId>>,
    enums: Vec<Option<EnumId>>,
}

impl LoadPlan {
    /// Resolve `schemas`. `names` is the batch name table, absent for
    /// InMemoryNames batches.
    pub fn new(ctx: &Context, names: Option<&[String]>, schemas: &SchemaBatch) -> Self {
        let names = match names {
            Some(table) => NamePlan::Table {
                ids: table.iter().map(|s| ctx.names.find(s)).collect(),
                text: table.to_vec(),
            },
            None => NamePlan::InMemory(ctx.names.len()),
        };
        let mut plan = Self {
            names,
            structs: Vec::with_capacity(schemas.structs.len()),
            enums: Vec::with_capacity(schemas.enums.len()),
        };
        for s in &schemas.structs {
            let decl = plan.key(s.scope, s.name).and_then(|k| ctx.types.find_struct(k));
            plan.structs.push(decl);
        }
        for e in &schemas.enums {
            let id = plan.key(e.scope, e.name).and_then(|k| ctx.types.find_enum(k));
            plan.enums.push(id);
        }
        log::debug!(
            "[plainprops] load plan: {}/{} structs, {}/{} enums resolved",
            plan.structs.iter().flatten().count(),
            plan.structs.len(),
            plan.enums.iter().flatten().count(),
            plan.enums.len()
        );
        plan
    }

    fn key(&self, scope: u32, name: u32) -> Option<TypeKey> {
        Some(TypeKey {
            scope: self.name_id(scope)?,
            name: self.name_id(name)?,
        })
    }

    pub fn name_id(&self, raw: u32) -> Option<NameId> {
        match &self.names {
            NamePlan::Table { ids, .. } => ids.get(raw as usize).copied().flatten(),
            NamePlan::InMemory(len) => ((raw as usize) < *len).then_some(NameId(raw)),
        }
    }

    pub fn member_id(&self, raw: u32) -> Option<MemberId> {
        self.name_id(raw).map(MemberId)
    }

    /// Live declaration of struct schema `idx`.
    pub fn struct_decl(&self, idx: u32) -> Option<DeclId> {
        self.structs.get(idx as usize).copied().flatten()
    }

    pub fn enum_id(&self, idx: u32) -> Option<EnumId> {
        self.enums.get(idx as usize).copied().flatten()
    }

    /// Saved spelling of name `raw`, for messages.
    pub(crate) fn describe(&self, ctx: &Context, raw: u32) -> String {
        match &self.names {
            NamePlan::Table { text, .. } => text
                .get(raw as usize)
                .cloned()
                .unwrap_or_else(|| format!("#{}", raw)),
            NamePlan::InMemory(_) => match ctx.names.get(raw) {
                Some(name) => name.to_string(),
                None => format!("#{}", raw),
            },
        }
    }
}

/// Where a value is being loaded, for error messages.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Site {
    pub decl: DeclId,
    pub member: Option<MemberId>,
}

impl Site {
    pub(crate) fn mismatch(self, ctx: &Context) -> LoadError {
        LoadError::TypeMismatch {
            ty: ctx.type_name(self.decl),
            member: match self.member {
                Some(m) => ctx.names.resolve(m.0).to_string(),
                None => "(super)".to_string(),
            },
        }
    }
}

/// Replays decoded records of one batch.
pub(crate) struct StructLoader<'p> {
    pub(crate) ctx: &'p Context,
    pub(crate) plan: &'p LoadPlan,
    pub(crate) schemas: &'p SchemaBatch,
}

impl<'p> StructLoader<'p> {
    pub(crate) fn new(ctx: &'p Context, plan: &'p LoadPlan, schemas: &'p SchemaBatch) -> Self {
        Self { ctx, plan, schemas }
    }

    pub(crate) fn struct_schema(&self, idx: u32) -> Result<&'p StructSchema, LoadError> {
        self.schemas
            .structs
            .get(idx as usize)
            .ok_or(LoadError::UnknownSchema(idx))
    }

    /// Apply `read` onto `dst`, a flattened instance of `decl` or of a type
    /// deriving from it.
    pub(crate) fn load_struct(
        &self,
        decl: DeclId,
        read: &ReadStruct,
        dst: &mut StructValue,
    ) -> Result<(), LoadError> {
        let binding = self
            .ctx
            .struct_binding(decl)
            .ok_or_else(|| LoadError::UnboundType(self.ctx.type_name(decl)))?;
        if dst.len() < binding.num_fields {
            return Err(LoadError::FieldCount {
                ty: binding.name.clone(),
                expected: binding.num_fields,
                found: dst.len(),
            });
        }
        let schema = self.struct_schema(read.schema)?;

        for (mi, value) in &read.members {
            let saved = schema
                .members
                .get(*mi)
                .ok_or(LoadError::UnknownSchema(read.schema))?;
            let Some(raw) = saved.name else {
                let site = Site { decl, member: None };
                let (Some(super_decl), SchemaType::Struct(idx), ReadValue::Struct(inner)) =
                    (binding.super_decl, &saved.ty, value)
                else {
                    return Err(site.mismatch(self.ctx));
                };
                if self.plan.struct_decl(*idx) != Some(super_decl) {
                    return Err(site.mismatch(self.ctx));
                }
                self.load_struct(super_decl, inner, dst)?;
                continue;
            };
            let member = self
                .plan
                .member_id(raw)
                .and_then(|m| binding.member(m))
                .ok_or_else(|| LoadError::UnknownMember {
                    ty: binding.name.clone(),
                    member: self.plan.describe(self.ctx, raw),
                })?;
            let site = Site {
                decl,
                member: Some(member.member),
            };
            let field = dst
                .field_mut(member.field)
                .ok_or_else(|| site.mismatch(self.ctx))?;
            self.load_value(site, &member.ty, &saved.ty, value, field)?;
        }
        Ok(())
    }

    /// Check that struct schema `idx` maps onto `decl`.
    fn expect_struct(&self, site: Site, ty: &SchemaType, decl: DeclId) -> Result<(), LoadError> {
        match ty {
            SchemaType::Struct(idx) if self.plan.struct_decl(*idx) == Some(decl) => Ok(()),
            _ => Err(site.mismatch(self.ctx)),
        }
    }

    pub(crate) fn load_value(
        &self,
        site: Site,
        binding: &TypeBinding,
        ty: &SchemaType,
        read: &ReadValue,
        dst: &mut Value,
    ) -> Result<(), LoadError> {
        match binding {
            TypeBinding::Leaf(kind) => {
                let matches = match (kind, ty) {
                    (LeafKind::Enum(id, width), SchemaType::Enum { width: w, schema }) => {
                        width == w && self.plan.enum_id(*schema) == Some(*id)
                    }
                    (_, SchemaType::Leaf(saved)) => saved == kind,
                    _ => false,
                };
                let ReadValue::Leaf(bits) = read else {
                    return Err(site.mismatch(self.ctx));
                };
                if !matches {
                    return Err(site.mismatch(self.ctx));
                }
                *dst = Value::from_leaf_bits(*kind, *bits);
                Ok(())
            }
            TypeBinding::Struct(decl) => {
                self.expect_struct(site, ty, *decl)?;
                let ReadValue::Struct(inner) = read else {
                    return Err(site.mismatch(self.ctx));
                };
                let fits = self
                    .ctx
                    .struct_binding(*decl)
                    .is_some_and(|b| dst.as_struct().is_some_and(|s| s.len() == b.num_fields));
                if !fits {
                    *dst = Value::Struct(
                        self.ctx
                            .new_instance(*decl)
                            .unwrap_or_else(|| self.ctx.zero_struct(*decl)),
                    );
                }
                match dst.as_struct_mut() {
                    Some(target) => self.load_struct(*decl, inner, target),
                    None => Err(site.mismatch(self.ctx)),
                }
            }
            TypeBinding::Range(codec) => self.load_range_value(site, codec, ty, read, dst),
            TypeBinding::Delta(id) => {
                let delta = self
                    .ctx
                    .delta_binding(*id)
                    .ok_or_else(|| LoadError::Bind(BindError::NotBound(format!("delta#{}", id.0))))?;
                self.expect_struct(site, ty, delta.decl)?;
                let ReadValue::Struct(inner) = read else {
                    return Err(site.mismatch(self.ctx));
                };
                self.load_delta(site, delta, inner, dst)
            }
            TypeBinding::Static(id) => {
                let fixed = self
                    .ctx
                    .static_binding(*id)
                    .ok_or_else(|| LoadError::Bind(BindError::NotBound(format!("static#{}", id.0))))?;
                self.expect_struct(site, ty, fixed.decl)?;
                let ReadValue::Struct(inner) = read else {
                    return Err(site.mismatch(self.ctx));
                };
                if dst.as_array().map(<[Value]>::len) != Some(fixed.len as usize) {
                    *dst = self.ctx.zero_value(binding);
                }
                self.load_static(site, fixed, inner, dst)
            }
            TypeBinding::Custom(id) => {
                let custom = self
                    .ctx
                    .custom(*id)
                    .ok_or_else(|| LoadError::Bind(BindError::NotBound(format!("custom#{}", id.0))))?;
                self.expect_struct(site, ty, custom.decl)?;
                let ReadValue::Struct(inner) = read else {
                    return Err(site.mismatch(self.ctx));
                };
                let view = CustomLoadView {
                    ctx: self.ctx,
                    plan: self.plan,
                    schemas: self.schemas,
                    read: inner,
                    custom,
                };
                custom.binding.load(&view, dst)
            }
        }
    }

    fn load_static(
        &self,
        site: Site,
        fixed: &StaticBinding,
        read: &ReadStruct,
        dst: &mut Value,
    ) -> Result<(), LoadError> {
        let schema = self.struct_schema(read.schema)?;
        let Value::Array(items) = dst else {
            return Err(site.mismatch(self.ctx));
        };
        for (mi, value) in &read.members {
            let saved = schema
                .members
                .get(*mi)
                .ok_or(LoadError::UnknownSchema(read.schema))?;
            let pos = saved
                .name
                .and_then(|raw| self.plan.member_id(raw))
                .and_then(|m| fixed.members.iter().position(|&f| f == m))
                .ok_or_else(|| site.mismatch(self.ctx))?;
            let slot = items.get_mut(pos).ok_or_else(|| site.mismatch(self.ctx))?;
            self.load_value(site, &fixed.item, &saved.ty, value, slot)?;
        }
        Ok(())
    }

    /// Load a saved range through `codec`, replacing `dst`.
    pub(crate) fn load_range_value(
        &self,
        site: Site,
        codec: &RangeCodec,
        ty: &SchemaType,
        read: &ReadValue,
        dst: &mut Value,
    ) -> Result<(), LoadError> {
        let (SchemaType::Range(size, item_ty), ReadValue::Range(items)) = (ty, read) else {
            return Err(site.mismatch(self.ctx));
        };
        if *size != codec.size {
            return Err(site.mismatch(self.ctx));
        }
        self.load_range(site, codec, item_ty, items, dst)
    }

    fn load_range(
        &self,
        site: Site,
        codec: &RangeCodec,
        item_ty: &SchemaType,
        items: &[ReadValue],
        dst: &mut Value,
    ) -> Result<(), LoadError> {
        let mut req = MakeItemsRequest::new(items.len() as u64);
        let mut next = 0usize;
        loop {
            let made = match codec.make_items(self.ctx, dst, &mut req)? {
                ItemSlots::Values(slots) => {
                    let ItemBinding::Single(item) = &codec.item else {
                        return Err(site.mismatch(self.ctx));
                    };
                    for slot in slots.iter_mut() {
                        let read = items.get(next).ok_or_else(|| site.mismatch(self.ctx))?;
                        self.load_value(site, item, item_ty, read, slot)?;
                        next += 1;
                    }
                    slots.len()
                }
                ItemSlots::Bytes(slots) => {
                    if *item_ty != SchemaType::Leaf(LeafKind::U8) {
                        return Err(site.mismatch(self.ctx));
                    }
                    for slot in slots.iter_mut() {
                        match items.get(next) {
                            Some(ReadValue::Leaf(bits)) => *slot = *bits as u8,
                            _ => return Err(site.mismatch(self.ctx)),
                        }
                        next += 1;
                    }
                    slots.len()
                }
                ItemSlots::Entries(slots) => {
                    let ItemBinding::Pair { pair, key, value } = &codec.item else {
                        return Err(site.mismatch(self.ctx));
                    };
                    self.expect_struct(site, item_ty, *pair)?;
                    let builtin = self.ctx.builtin;
                    for slot in slots.iter_mut() {
                        let Some(ReadValue::Struct(entry)) = items.get(next) else {
                            return Err(site.mismatch(self.ctx));
                        };
                        let schema = self.struct_schema(entry.schema)?;
                        for (mi, saved_value) in &entry.members {
                            let saved = schema
                                .members
                                .get(*mi)
                                .ok_or(LoadError::UnknownSchema(entry.schema))?;
                            match saved.name.and_then(|raw| self.plan.member_id(raw)) {
                                Some(m) if m == builtin.key => {
                                    self.load_value(site, key, &saved.ty, saved_value, &mut slot.key)?
                                }
                                Some(m) if m == builtin.value => {
                                    self.load_value(site, value, &saved.ty, saved_value, &mut slot.value)?
                                }
                                _ => return Err(site.mismatch(self.ctx)),
                            }
                        }
                        next += 1;
                    }
                    slots.len()
                }
            };
            if !req.advance(made) {
                break;
            }
        }
        log::trace!("[plainprops] loaded {} {} items", next, codec.kind.name());
        Ok(())
    }
}
