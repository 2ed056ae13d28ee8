// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Live value and schema comparison.
//!
//! Value diffs walk two instances of the same bound struct through their
//! bindings without serializing. Sets and maps compare by membership, so
//! slot order never produces a difference.

use crate::bind::{ItemBinding, RangeKind, TypeBinding};
use crate::context::Context;
use crate::delta::sparse_differs;
use crate::error::TextError;
use crate::ids::DeclId;
use crate::read::BatchView;
use crate::text::dump_batch;
use crate::value::{StructValue, Value};
use std::collections::BTreeMap;
use std::fmt;

/// One step of a [`DiffPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffSegment {
    Member(String),
    Index(usize),
    /// Map key, rendered.
    Key(String),
}

/// Location of a difference, rendered as `Stats{hp}.Slots[2]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffPath(pub Vec<DiffSegment>);

impl fmt::Display for DiffPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                DiffSegment::Member(name) if i == 0 => write!(f, "{}", name)?,
                DiffSegment::Member(name) => write!(f, ".{}", name)?,
                DiffSegment::Index(idx) => write!(f, "[{}]", idx)?,
                DiffSegment::Key(key) => write!(f, "{{{}}}", key)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    First,
    All,
}

struct Differ<'c> {
    ctx: &'c Context,
    mode: Mode,
    path: Vec<DiffSegment>,
    found: Vec<DiffPath>,
}

impl<'c> Differ<'c> {
    fn new(ctx: &'c Context, mode: Mode) -> Self {
        Self {
            ctx,
            mode,
            path: Vec::new(),
            found: Vec::new(),
        }
    }

    /// Record a difference at the current path. Returns whether to stop.
    fn record(&mut self) -> bool {
        self.found.push(DiffPath(self.path.clone()));
        self.mode == Mode::First
    }

    fn nested<F>(&mut self, segment: DiffSegment, f: F) -> bool
    where
        F: FnOnce(&mut Self) -> bool,
    {
        self.path.push(segment);
        let stop = f(self);
        self.path.pop();
        stop
    }

    fn walk_struct(&mut self, decl: DeclId, a: &StructValue, b: &StructValue) -> bool {
        let Some(binding) = self.ctx.struct_binding(decl) else {
            return a != b && self.record();
        };
        if a.len() != b.len() || a.len() < binding.num_fields {
            return self.record();
        }
        if let Some(super_decl) = binding.super_decl {
            if self.walk_struct(super_decl, a, b) {
                return true;
            }
        }
        for member in &binding.members {
            let (Some(fa), Some(fb)) = (a.field(member.field), b.field(member.field)) else {
                continue;
            };
            let name = self.ctx.names.resolve(member.member.0).to_string();
            if self.nested(DiffSegment::Member(name), |d| d.walk_value(&member.ty, fa, fb)) {
                return true;
            }
        }
        false
    }

    fn walk_value(&mut self, ty: &TypeBinding, a: &Value, b: &Value) -> bool {
        match ty {
            TypeBinding::Leaf(_) => a != b && self.record(),
            TypeBinding::Struct(decl) => match (a, b) {
                (Value::Struct(sa), Value::Struct(sb)) => self.walk_struct(*decl, sa, sb),
                _ => a != b && self.record(),
            },
            TypeBinding::Range(codec) => match (codec.kind, &codec.item) {
                (RangeKind::Array | RangeKind::StaticArray(_), ItemBinding::Single(item)) => {
                    self.walk_items(item, a, b)
                }
                (RangeKind::Optional | RangeKind::Unique, ItemBinding::Single(item)) => {
                    match (a, b) {
                        (Value::Optional(Some(ia)), Value::Optional(Some(ib)))
                        | (Value::Unique(Some(ia)), Value::Unique(Some(ib))) => {
                            self.walk_value(item, ia, ib)
                        }
                        _ => a != b && self.record(),
                    }
                }
                (RangeKind::Map, ItemBinding::Pair { value, .. }) => self.walk_map(value, a, b),
                _ => a != b && self.record(),
            },
            TypeBinding::Delta(id) => match self.ctx.delta_binding(*id).map(|d| &d.items.item) {
                Some(ItemBinding::Pair { value, .. }) => self.walk_map(value, a, b),
                _ => match (a, b) {
                    (Value::Set(sa), Value::Set(sb)) => sparse_differs(sa, sb) && self.record(),
                    _ => a != b && self.record(),
                },
            },
            TypeBinding::Static(id) => match self.ctx.static_binding(*id) {
                Some(fixed) => self.walk_items(&fixed.item, a, b),
                None => a != b && self.record(),
            },
            TypeBinding::Custom(id) => {
                let differs = match self.ctx.custom(*id) {
                    Some(custom) => custom.binding.diff(a, b),
                    None => a != b,
                };
                differs && self.record()
            }
        }
    }

    fn walk_items(&mut self, item: &TypeBinding, a: &Value, b: &Value) -> bool {
        let (Some(ia), Some(ib)) = (a.as_array(), b.as_array()) else {
            return a != b && self.record();
        };
        if ia.len() != ib.len() {
            return self.record();
        }
        for (i, (va, vb)) in ia.iter().zip(ib).enumerate() {
            if self.nested(DiffSegment::Index(i), |d| d.walk_value(item, va, vb)) {
                return true;
            }
        }
        false
    }

    fn walk_map(&mut self, value_ty: &TypeBinding, a: &Value, b: &Value) -> bool {
        let (Some(ma), Some(mb)) = (a.as_map(), b.as_map()) else {
            return a != b && self.record();
        };
        if ma.len() != mb.len() {
            return self.record();
        }
        for entry in ma.iter() {
            let label = key_label(&entry.key);
            let stop = match mb.get_by_key(&entry.key).map(|e| &e.value) {
                Some(other) => self.nested(DiffSegment::Key(label), |d| {
                    d.walk_value(value_ty, &entry.value, other)
                }),
                None => self.nested(DiffSegment::Key(label), Self::record),
            };
            if stop {
                return true;
            }
        }
        false
    }
}

/// Map key as shown in a path.
pub fn key_label(key: &Value) -> String {
    match key {
        Value::Bool(v) => v.to_string(),
        Value::I8(v) => v.to_string(),
        Value::I16(v) => v.to_string(),
        Value::I32(v) => v.to_string(),
        Value::I64(v) => v.to_string(),
        Value::U8(v) => v.to_string(),
        Value::U16(v) => v.to_string(),
        Value::U32(v) => v.to_string(),
        Value::U64(v) | Value::Enum(v) => v.to_string(),
        Value::F32(v) => v.to_string(),
        Value::F64(v) => v.to_string(),
        Value::String(s) => s.clone(),
        other => format!("<{}>", other.kind_name()),
    }
}

/// Whether two instances of `decl` differ.
pub fn diff_struct(ctx: &Context, decl: DeclId, a: &StructValue, b: &StructValue) -> bool {
    Differ::new(ctx, Mode::First).walk_struct(decl, a, b)
}

/// First difference between two instances of `decl`.
pub fn diff_path(ctx: &Context, decl: DeclId, a: &StructValue, b: &StructValue) -> Option<DiffPath> {
    let mut differ = Differ::new(ctx, Mode::First);
    differ.walk_struct(decl, a, b);
    differ.found.into_iter().next()
}

/// Every difference between two instances of `decl`.
pub fn diff_all(ctx: &Context, decl: DeclId, a: &StructValue, b: &StructValue) -> Vec<DiffPath> {
    let mut differ = Differ::new(ctx, Mode::All);
    differ.walk_struct(decl, a, b);
    differ.found
}

/// Schema-level difference between two batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaDiff {
    OnlyInLeft(String),
    OnlyInRight(String),
    Changed(String),
}

/// Compare the struct and enum schemas of two StableNames batches by name.
pub fn diff_schemas(left: &BatchView<'_>, right: &BatchView<'_>) -> Result<Vec<SchemaDiff>, TextError> {
    let (l, r) = (dump_batch(left)?, dump_batch(right)?);
    let mut sides: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for s in &l.structs {
        sides.entry(s.full_name()).or_default().0 = Some(serde_yaml::to_string(s)?);
    }
    for e in &l.enums {
        sides.entry(e.full_name()).or_default().0 = Some(serde_yaml::to_string(e)?);
    }
    for s in &r.structs {
        sides.entry(s.full_name()).or_default().1 = Some(serde_yaml::to_string(s)?);
    }
    for e in &r.enums {
        sides.entry(e.full_name()).or_default().1 = Some(serde_yaml::to_string(e)?);
    }
    Ok(sides
        .into_iter()
        .filter_map(|(name, sides)| match sides {
            (Some(_), None) => Some(SchemaDiff::OnlyInLeft(name)),
            (None, Some(_)) => Some(SchemaDiff::OnlyInRight(name)),
            (Some(a), Some(b)) if a != b => Some(SchemaDiff::Changed(name)),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_rendering() {
        let path = DiffPath(vec![
            DiffSegment::Member("Stats".into()),
            DiffSegment::Key("hp".into()),
            DiffSegment::Member("Slots".into()),
            DiffSegment::Index(2),
        ]);
        assert_eq!(path.to_string(), "Stats{hp}.Slots[2]");
        assert_eq!(DiffPath::default().to_string(), "<root>");
    }

    #[test]
    fn test_key_labels() {
        assert_eq!(key_label(&Value::from("hp")), "hp");
        assert_eq!(key_label(&Value::I32(-4)), "-4");
        assert_eq!(key_label(&Value::U8(7)), "7");
        assert_eq!(key_label(&Value::Array(vec![])), "<Array>");
    }
}
