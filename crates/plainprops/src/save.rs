// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Live values to built value trees.
//!
//! Without a default every member is built. With a default, members of
//! sparse structs that equal the default are skipped, nested structs
//! recurse, and sets and maps are delta-encoded. Dense structs ignore the
//! default and always build every member.

use crate::bind::{
    CustomSaveContext, ItemBinding, ItemSlice, RangeCodec, RangeKind, StructBinding, TypeBinding,
};
use crate::build::{BuiltItems, BuiltRange, BuiltStruct, BuiltType, BuiltValue, MemberBuilder};
use crate::context::Context;
use crate::declaration::Occupancy;
use crate::error::{BindError, SaveError};
use crate::ids::DeclId;
use crate::leaf::LeafKind;
use crate::value::{MapEntry, StructValue, Value};
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

/// Items selected for one range.
#[derive(Debug)]
pub(crate) enum RangeItems<'v> {
    Bytes(Vec<u8>),
    Values(Vec<&'v Value>),
    Entries(Vec<&'v MapEntry>),
}

impl<'v> RangeItems<'v> {
    fn from_slices(slices: &[ItemSlice<'v>]) -> Self {
        if slices.iter().all(|s| matches!(s, ItemSlice::Bytes(_))) && !slices.is_empty() {
            let mut bytes = Vec::new();
            for slice in slices {
                if let ItemSlice::Bytes(b) = *slice {
                    bytes.extend_from_slice(b);
                }
            }
            return Self::Bytes(bytes);
        }
        if slices.iter().any(|s| matches!(s, ItemSlice::Entries(_))) {
            let mut entries = Vec::new();
            for slice in slices {
                if let ItemSlice::Entries(e) = *slice {
                    entries.extend(e.iter());
                }
            }
            return Self::Entries(entries);
        }
        let mut values = Vec::new();
        for slice in slices {
            if let ItemSlice::Values(v) = *slice {
                values.extend(v.iter());
            }
        }
        Self::Values(values)
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Self::Bytes(v) => v.len(),
            Self::Values(v) => v.len(),
            Self::Entries(v) => v.len(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Builds value trees into one arena.
pub(crate) struct StructSaver<'c, 'a> {
    pub(crate) ctx: &'c Context,
    pub(crate) bump: &'a Bump,
}

impl<'c, 'a> StructSaver<'c, 'a> {
    pub(crate) fn new(ctx: &'c Context, bump: &'a Bump) -> Self {
        Self { ctx, bump }
    }

    /// Build one top-level object.
    pub(crate) fn save_object(
        &self,
        decl: DeclId,
        value: &StructValue,
        default: Option<&StructValue>,
    ) -> Result<&'a BuiltStruct<'a>, SaveError> {
        let binding = self.binding(decl)?;
        check_len(binding, value)?;
        if let Some(default) = default {
            check_len(binding, default)?;
        }
        self.save_struct(decl, value, default)
    }

    fn binding(&self, decl: DeclId) -> Result<&'c StructBinding, SaveError> {
        self.ctx
            .struct_binding(decl)
            .ok_or_else(|| SaveError::Bind(BindError::NotBound(self.ctx.type_name(decl))))
    }

    /// `value` holds the flattened fields of the most derived type; supers
    /// read their prefix of it.
    fn save_struct(
        &self,
        decl: DeclId,
        value: &StructValue,
        default: Option<&StructValue>,
    ) -> Result<&'a BuiltStruct<'a>, SaveError> {
        let binding = self.binding(decl)?;
        let default = match binding.occupancy {
            Occupancy::AllowSparse => default,
            Occupancy::RequireAll => None,
        };
        let mut out = MemberBuilder::new(self.bump);
        if let Some(super_decl) = binding.super_decl {
            let built = self.save_struct(super_decl, value, default)?;
            if default.is_none() || !built.is_empty() {
                out.add_super(built);
            }
        }
        for member in &binding.members {
            let field = value.field(member.field).ok_or_else(|| SaveError::FieldCount {
                ty: binding.name.clone(),
                expected: binding.num_fields,
                found: value.len(),
            })?;
            let base = default.and_then(|d| d.field(member.field));
            if let Some(built) = self.save_value(&member.ty, field, base)? {
                out.add(Some(member.member), built);
            }
        }
        Ok(out.build(decl))
    }

    /// Build `value` relative to `default`. `None` means equal to the default.
    pub(crate) fn save_value(
        &self,
        ty: &TypeBinding,
        value: &Value,
        default: Option<&Value>,
    ) -> Result<Option<BuiltValue<'a>>, SaveError> {
        let Some(default) = default else {
            return self.save_full(ty, value).map(Some);
        };
        match ty {
            TypeBinding::Leaf(kind) => {
                let bits = self.leaf_bits(*kind, value)?;
                if default.leaf_bits_as(*kind) == Some(bits) {
                    Ok(None)
                } else {
                    Ok(Some(BuiltValue::Leaf(*kind, bits)))
                }
            }
            TypeBinding::Struct(decl) => {
                let current = self.struct_value(*decl, value)?;
                let base = default
                    .as_struct()
                    .filter(|d| d.len() == current.len());
                if base == Some(current) {
                    return Ok(None);
                }
                let built = self.save_struct(*decl, current, base)?;
                if base.is_some() && built.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(BuiltValue::Struct(built)))
                }
            }
            TypeBinding::Range(codec) => {
                if value == default {
                    Ok(None)
                } else {
                    Ok(Some(BuiltValue::Range(self.build_range(codec, value)?)))
                }
            }
            TypeBinding::Delta(id) => Ok(self
                .save_delta(*id, value, Some(default))?
                .map(BuiltValue::Struct)),
            TypeBinding::Static(id) => {
                if value == default {
                    return Ok(None);
                }
                let built = self.save_static(*id, value, Some(default))?;
                if built.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(BuiltValue::Struct(built)))
                }
            }
            TypeBinding::Custom(id) => {
                let custom = self.custom(*id)?;
                if !custom.binding.diff(value, default) {
                    return Ok(None);
                }
                self.save_full(ty, value).map(Some)
            }
        }
    }

    /// Build every member of `value`.
    pub(crate) fn save_full(&self, ty: &TypeBinding, value: &Value) -> Result<BuiltValue<'a>, SaveError> {
        match ty {
            TypeBinding::Leaf(kind) => Ok(BuiltValue::Leaf(*kind, self.leaf_bits(*kind, value)?)),
            TypeBinding::Struct(decl) => {
                let current = self.struct_value(*decl, value)?;
                Ok(BuiltValue::Struct(self.save_struct(*decl, current, None)?))
            }
            TypeBinding::Range(codec) => Ok(BuiltValue::Range(self.build_range(codec, value)?)),
            TypeBinding::Delta(id) => match self.save_delta(*id, value, None)? {
                Some(built) => Ok(BuiltValue::Struct(built)),
                None => Err(mismatch("Set or Map", value)),
            },
            TypeBinding::Static(id) => Ok(BuiltValue::Struct(self.save_static(*id, value, None)?)),
            TypeBinding::Custom(id) => {
                let custom = self.custom(*id)?;
                let cx = CustomSaveContext {
                    ctx: self.ctx,
                    bump: self.bump,
                    custom,
                };
                let mut out = MemberBuilder::new(self.bump);
                custom.binding.save(&cx, &mut out, value)?;
                Ok(BuiltValue::Struct(out.build(custom.decl)))
            }
        }
    }

    fn struct_value<'v>(&self, decl: DeclId, value: &'v Value) -> Result<&'v StructValue, SaveError> {
        let current = value
            .as_struct()
            .ok_or_else(|| mismatch(&self.ctx.type_name(decl), value))?;
        check_len(self.binding(decl)?, current)?;
        Ok(current)
    }

    fn save_static(
        &self,
        id: crate::bind::StaticId,
        value: &Value,
        default: Option<&Value>,
    ) -> Result<&'a BuiltStruct<'a>, SaveError> {
        let fixed = self
            .ctx
            .static_binding(id)
            .ok_or_else(|| SaveError::Bind(BindError::NotBound(format!("static#{}", id.0))))?;
        let items = value
            .as_array()
            .ok_or_else(|| mismatch("StaticArray", value))?;
        if items.len() != fixed.len as usize {
            return Err(SaveError::ItemCount {
                expected: u64::from(fixed.len),
                found: items.len() as u64,
            });
        }
        let base = default
            .and_then(Value::as_array)
            .filter(|d| d.len() == items.len());
        let mut out = MemberBuilder::new(self.bump);
        for (i, (item, &member)) in items.iter().zip(&fixed.members).enumerate() {
            let item_default = base.map(|d| &d[i]);
            if let Some(built) = self.save_value(&fixed.item, item, item_default)? {
                out.add(Some(member), built);
            }
        }
        Ok(out.build(fixed.decl))
    }

    fn custom(&self, id: crate::bind::CustomId) -> Result<&'c crate::bind::custom::RegisteredCustom, SaveError> {
        self.ctx
            .custom(id)
            .ok_or_else(|| SaveError::Bind(BindError::NotBound(format!("custom#{}", id.0))))
    }

    /// Leaf bits of `value`, validating enum values against their declaration.
    fn leaf_bits(&self, kind: LeafKind, value: &Value) -> Result<u64, SaveError> {
        let bits = value
            .leaf_bits_as(kind)
            .ok_or_else(|| mismatch(kind.name(), value))?;
        if let LeafKind::Enum(id, _) = kind {
            let valid = self.ctx.resolve_enum(id).is_some_and(|e| e.accepts(bits));
            if !valid {
                return Err(SaveError::InvalidEnumValue {
                    ty: self.ctx.enum_name(id),
                    value: bits,
                });
            }
        }
        Ok(bits)
    }

    /// Every item of a live container.
    pub(crate) fn build_range(&self, codec: &RangeCodec, value: &Value) -> Result<&'a BuiltRange<'a>, SaveError> {
        let slices = codec.read_items(value)?;
        self.build_items(codec, RangeItems::from_slices(&slices))
    }

    /// Selected items, in order unless the codec is a set or map and
    /// `sort_set_items` is on.
    pub(crate) fn build_items(
        &self,
        codec: &RangeCodec,
        items: RangeItems<'_>,
    ) -> Result<&'a BuiltRange<'a>, SaveError> {
        let count = items.len() as u64;
        if count > codec.size.max() {
            return Err(SaveError::TooManyItems {
                count,
                max: codec.size.max(),
            });
        }
        let sort = self.ctx.config.sort_set_items && matches!(codec.kind, RangeKind::Set | RangeKind::Map);
        let built = match (&codec.item, items) {
            (ItemBinding::Single(TypeBinding::Leaf(LeafKind::U8)), RangeItems::Bytes(bytes)) => {
                BuiltItems::Bytes(self.bump.alloc_slice_copy(&bytes))
            }
            (ItemBinding::Single(item), RangeItems::Values(mut values)) => {
                if sort {
                    values.sort_by(|a, b| a.total_cmp(b));
                }
                self.build_values(item, &values)?
            }
            (ItemBinding::Pair { pair, key, value }, RangeItems::Entries(mut entries)) => {
                if sort {
                    entries.sort_by(|a, b| a.key.total_cmp(&b.key));
                }
                let b = self.ctx.builtin;
                let mut out = BumpVec::with_capacity_in(entries.len(), self.bump);
                for entry in entries {
                    let mut members = MemberBuilder::new(self.bump);
                    members.add(Some(b.key), self.save_full(key, &entry.key)?);
                    members.add(Some(b.value), self.save_full(value, &entry.value)?);
                    out.push(members.build(*pair));
                }
                BuiltItems::Structs(out.into_bump_slice())
            }
            (_, RangeItems::Bytes(_)) => return Err(SaveError::ValueMismatch {
                expected: codec.kind.name().to_string(),
                found: "String",
            }),
            (ItemBinding::Single(_), RangeItems::Entries(_)) => {
                return Err(SaveError::ValueMismatch {
                    expected: codec.kind.name().to_string(),
                    found: "Map",
                })
            }
            (ItemBinding::Pair { .. }, RangeItems::Values(_)) => {
                return Err(SaveError::ValueMismatch {
                    expected: "Map".to_string(),
                    found: codec.kind.name(),
                })
            }
        };
        Ok(self.bump.alloc(BuiltRange {
            size: codec.size,
            item: self.built_type_of(&codec.item)?,
            items: built,
        }))
    }

    fn build_values(&self, item: &TypeBinding, values: &[&Value]) -> Result<BuiltItems<'a>, SaveError> {
        match item {
            TypeBinding::Leaf(kind) => {
                let mut bits = BumpVec::with_capacity_in(values.len(), self.bump);
                for value in values {
                    bits.push(self.leaf_bits(*kind, value)?);
                }
                Ok(BuiltItems::Leaves(bits.into_bump_slice()))
            }
            TypeBinding::Range(inner) => {
                let mut ranges = BumpVec::with_capacity_in(values.len(), self.bump);
                for value in values {
                    ranges.push(self.build_range(inner, value)?);
                }
                Ok(BuiltItems::Ranges(ranges.into_bump_slice()))
            }
            other => {
                let mut structs = BumpVec::with_capacity_in(values.len(), self.bump);
                for value in values {
                    match self.save_full(other, value)? {
                        BuiltValue::Struct(built) => structs.push(built),
                        _ => return Err(mismatch("Struct", value)),
                    }
                }
                Ok(BuiltItems::Structs(structs.into_bump_slice()))
            }
        }
    }

    fn built_type_of(&self, item: &ItemBinding) -> Result<BuiltType<'a>, SaveError> {
        match item {
            ItemBinding::Single(ty) => self.built_type(ty),
            ItemBinding::Pair { pair, .. } => Ok(BuiltType::Struct(*pair)),
        }
    }

    /// Schema shape of a binding, as seen by range items.
    fn built_type(&self, ty: &TypeBinding) -> Result<BuiltType<'a>, SaveError> {
        let not_bound = |what: String| SaveError::Bind(BindError::NotBound(what));
        Ok(match ty {
            TypeBinding::Leaf(kind) => BuiltType::Leaf(*kind),
            TypeBinding::Struct(decl) => BuiltType::Struct(*decl),
            TypeBinding::Range(codec) => {
                let inner = self.built_type_of(&codec.item)?;
                BuiltType::Range(codec.size, self.bump.alloc(inner))
            }
            TypeBinding::Delta(id) => BuiltType::Struct(
                self.ctx
                    .delta_binding(*id)
                    .ok_or_else(|| not_bound(format!("delta#{}", id.0)))?
                    .decl,
            ),
            TypeBinding::Static(id) => BuiltType::Struct(
                self.ctx
                    .static_binding(*id)
                    .ok_or_else(|| not_bound(format!("static#{}", id.0)))?
                    .decl,
            ),
            TypeBinding::Custom(id) => BuiltType::Struct(self.custom(*id)?.decl),
        })
    }
}

fn check_len(binding: &StructBinding, value: &StructValue) -> Result<(), SaveError> {
    if value.len() == binding.num_fields {
        Ok(())
    } else {
        Err(SaveError::FieldCount {
            ty: binding.name.clone(),
            expected: binding.num_fields,
            found: value.len(),
        })
    }
}

pub(crate) fn mismatch(expected: &str, found: &Value) -> SaveError {
    SaveError::ValueMismatch {
        expected: expected.to_string(),
        found: found.kind_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::{EnumBuilder, FieldKind, HostRegistry, StructBuilder};

    fn setup() -> (Context, DeclId) {
        let mut host = HostRegistry::new();
        host.add_enum(EnumBuilder::new("Test::Mode").variant("Off").variant("On"))
            .add_struct(
                StructBuilder::new("Test::Record")
                    .field("Count", FieldKind::I32)
                    .field("Mode", FieldKind::enumeration("Test::Mode"))
                    .field("Label", FieldKind::String)
                    .field("Values", FieldKind::array(FieldKind::U16)),
            );
        let mut ctx = Context::default();
        let decl = ctx.bind_struct(&host, "Test::Record").expect("bind");
        (ctx, decl)
    }

    fn record(count: i32, mode: u64, label: &str) -> StructValue {
        StructValue::new(vec![
            Value::I32(count),
            Value::Enum(mode),
            Value::from(label),
            Value::from(vec![1u16, 2]),
        ])
    }

    #[test]
    fn test_full_save_builds_every_member() {
        let (ctx, decl) = setup();
        let bump = Bump::new();
        let saver = StructSaver::new(&ctx, &bump);
        let built = saver.save_object(decl, &record(0, 0, ""), None).expect("save");
        assert_eq!(built.members.len(), 4);
    }

    #[test]
    fn test_delta_save_skips_equal_members() {
        let (ctx, decl) = setup();
        let bump = Bump::new();
        let saver = StructSaver::new(&ctx, &bump);
        let base = record(0, 0, "x");
        let built = saver
            .save_object(decl, &record(5, 0, "x"), Some(&base))
            .expect("save");
        assert_eq!(built.members.len(), 1);
        let count = ctx.member_id("Count");
        assert!(matches!(built.get(count), Some(BuiltValue::Leaf(LeafKind::I32, 5))));

        let unchanged = saver.save_object(decl, &base, Some(&base)).expect("save");
        assert!(unchanged.is_empty());
    }

    #[test]
    fn test_rejects_invalid_values() {
        let (ctx, decl) = setup();
        let bump = Bump::new();
        let saver = StructSaver::new(&ctx, &bump);
        assert!(matches!(
            saver.save_object(decl, &record(0, 7, ""), None),
            Err(SaveError::InvalidEnumValue { value: 7, .. })
        ));
        let short = StructValue::new(vec![Value::I32(0)]);
        assert!(matches!(
            saver.save_object(decl, &short, None),
            Err(SaveError::FieldCount { expected: 4, found: 1, .. })
        ));
        let mut wrong = record(0, 0, "");
        wrong.set_field(0, 1.0f32);
        assert!(matches!(
            saver.save_object(decl, &wrong, None),
            Err(SaveError::ValueMismatch { found: "F32", .. })
        ));
    }
}
