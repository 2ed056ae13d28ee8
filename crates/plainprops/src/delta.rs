// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Set and map deltas.
//!
//! A set or map saved against a default becomes a `Set<T>`/`Map<K,V>` struct:
//!
//! - no default: `Assign` holds every item;
//! - empty default: `Insert` holds every current item;
//! - empty current: `Remove` holds every default key;
//! - otherwise `Remove` holds default keys missing from current and `Insert`
//!   holds current items missing from default (for maps, the exact key/value
//!   pair).
//!
//! Empty sub-ranges are omitted. Both passes index a bitset by slot, so the
//! computation is linear in the backing sizes of both containers.

use crate::bind::{DeltaBinding, DeltaId, DeltaKind};
use crate::build::{BuiltStruct, MemberBuilder};
use crate::error::{BindError, LoadError, SaveError};
use crate::load::{Site, StructLoader};
use crate::read::ReadStruct;
use crate::save::{mismatch, RangeItems, StructSaver};
use crate::value::bits::BitSet;
use crate::value::{Sparse, SparseItem, SparseMap, SparseSet, Value};

/// Outcome of comparing a live set or map with its default.
#[derive(Debug)]
pub(crate) enum SparseDelta<'v> {
    /// Equal to the default.
    Unchanged,
    /// No default; write everything.
    Assign,
    Changes {
        remove: Vec<&'v Value>,
        insert: RangeItems<'v>,
    },
}

/// Compare `current` against `default`.
pub(crate) fn compute_delta<'v>(
    current: &'v Value,
    default: Option<&'v Value>,
) -> Result<SparseDelta<'v>, SaveError> {
    let Some(default) = default else {
        return Ok(SparseDelta::Assign);
    };
    match (current, default) {
        (Value::Set(cur), Value::Set(def)) => Ok(classify(cur, def, RangeItems::Values)),
        (Value::Map(cur), Value::Map(def)) => Ok(classify(cur, def, RangeItems::Entries)),
        (Value::Set(_) | Value::Map(_), other) => Err(mismatch(current.kind_name(), other)),
        (other, _) => Err(mismatch("Set or Map", other)),
    }
}

fn classify<'v, T: SparseItem>(
    current: &'v Sparse<T>,
    default: &'v Sparse<T>,
    wrap: fn(Vec<&'v T>) -> RangeItems<'v>,
) -> SparseDelta<'v> {
    if default.is_empty() {
        if current.is_empty() {
            return SparseDelta::Unchanged;
        }
        return SparseDelta::Changes {
            remove: Vec::new(),
            insert: wrap(current.iter().collect()),
        };
    }
    if current.is_empty() {
        return SparseDelta::Changes {
            remove: default.iter().map(|item| item.key()).collect(),
            insert: wrap(Vec::new()),
        };
    }

    let mut removed = BitSet::new(default.max_index());
    for idx in 0..default.max_index() {
        if let Some(item) = default.get(idx) {
            removed.set(idx, !current.contains_key(item.key()));
        }
    }
    let mut inserted = BitSet::new(current.max_index());
    for idx in 0..current.max_index() {
        if let Some(item) = current.get(idx) {
            inserted.set(idx, !default.contains_item(item));
        }
    }
    if !removed.any() && !inserted.any() {
        return SparseDelta::Unchanged;
    }
    SparseDelta::Changes {
        remove: removed
            .iter_ones()
            .filter_map(|i| default.get(i))
            .map(|item| item.key())
            .collect(),
        insert: wrap(inserted.iter_ones().filter_map(|i| current.get(i)).collect()),
    }
}

/// Whether two sets or maps hold different items.
pub(crate) fn sparse_differs<T: SparseItem>(a: &Sparse<T>, b: &Sparse<T>) -> bool {
    a.len() != b.len() || a.iter().any(|item| !b.contains_item(item))
}

fn kind_matches(kind: DeltaKind, value: &Value) -> bool {
    matches!(
        (kind, value),
        (DeltaKind::Set, Value::Set(_)) | (DeltaKind::Map, Value::Map(_))
    )
}

impl<'c, 'a> StructSaver<'c, 'a> {
    /// Build the delta struct of a set or map, or `None` when unchanged.
    pub(crate) fn save_delta(
        &self,
        id: DeltaId,
        value: &Value,
        default: Option<&Value>,
    ) -> Result<Option<&'a BuiltStruct<'a>>, SaveError> {
        let delta = self
            .ctx
            .delta_binding(id)
            .ok_or_else(|| SaveError::Bind(BindError::NotBound(format!("delta#{}", id.0))))?;
        if !kind_matches(delta.kind, value) {
            return Err(mismatch(
                match delta.kind {
                    DeltaKind::Set => "Set",
                    DeltaKind::Map => "Map",
                },
                value,
            ));
        }
        let b = self.ctx.builtin;
        let mut out = MemberBuilder::new(self.bump);
        match compute_delta(value, default)? {
            SparseDelta::Unchanged => return Ok(None),
            SparseDelta::Assign => out.add_range(b.assign, self.build_range(&delta.items, value)?),
            SparseDelta::Changes { remove, insert } => {
                if !remove.is_empty() {
                    out.add_range(b.remove, self.build_items(&delta.keys, RangeItems::Values(remove))?);
                }
                if !insert.is_empty() {
                    out.add_range(b.insert, self.build_items(&delta.items, insert)?);
                }
            }
        }
        Ok(Some(out.build(delta.decl)))
    }
}

impl StructLoader<'_> {
    /// Replay a saved delta struct onto `dst`.
    pub(crate) fn load_delta(
        &self,
        site: Site,
        delta: &DeltaBinding,
        read: &ReadStruct,
        dst: &mut Value,
    ) -> Result<(), LoadError> {
        if !kind_matches(delta.kind, dst) {
            *dst = empty(delta.kind);
        }
        let schema = self.struct_schema(read.schema)?;
        let b = self.ctx.builtin;
        let (mut assign, mut remove, mut insert) = (None, None, None);
        for (mi, value) in &read.members {
            let saved = schema
                .members
                .get(*mi)
                .ok_or_else(|| site.mismatch(self.ctx))?;
            let member = saved.name.and_then(|raw| self.plan.member_id(raw));
            match member {
                Some(m) if m == b.assign => assign = Some((&saved.ty, value)),
                Some(m) if m == b.remove => remove = Some((&saved.ty, value)),
                Some(m) if m == b.insert => insert = Some((&saved.ty, value)),
                _ => return Err(site.mismatch(self.ctx)),
            }
        }

        if let Some((ty, value)) = assign {
            self.load_range_value(site, &delta.items, ty, value, dst)?;
        }
        if let Some((ty, value)) = remove {
            let mut keys = Value::Set(SparseSet::new());
            self.load_range_value(site, &delta.keys, ty, value, &mut keys)?;
            if let Value::Set(keys) = keys {
                for key in keys.iter() {
                    match dst {
                        Value::Set(set) => {
                            set.remove(key);
                        }
                        Value::Map(map) => {
                            map.remove(key);
                        }
                        _ => {}
                    }
                }
            }
        }
        if let Some((ty, value)) = insert {
            let dst_empty = match dst {
                Value::Set(set) => set.is_empty(),
                Value::Map(map) => map.is_empty(),
                _ => true,
            };
            if dst_empty {
                self.load_range_value(site, &delta.items, ty, value, dst)?;
            } else {
                let mut added = empty(delta.kind);
                self.load_range_value(site, &delta.items, ty, value, &mut added)?;
                match (dst, added) {
                    (Value::Set(set), Value::Set(added)) => {
                        for item in added.iter() {
                            set.insert(item.clone());
                        }
                    }
                    (Value::Map(map), Value::Map(added)) => {
                        for entry in added.iter() {
                            map.insert(entry.clone());
                        }
                    }
                    _ => return Err(site.mismatch(self.ctx)),
                }
            }
        }
        Ok(())
    }
}

fn empty(kind: DeltaKind) -> Value {
    match kind {
        DeltaKind::Set => Value::Set(SparseSet::new()),
        DeltaKind::Map => Value::Map(SparseMap::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MapEntry;

    fn set(items: &[&str]) -> Value {
        Value::Set(items.iter().map(|s| Value::from(*s)).collect())
    }

    fn labels(values: &[&Value]) -> Vec<String> {
        let mut out: Vec<String> = values
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_symmetric_difference() {
        let default = set(&["a", "b", "c"]);
        let current = set(&["b", "c", "d"]);
        match compute_delta(&current, Some(&default)).expect("delta") {
            SparseDelta::Changes { remove, insert } => {
                assert_eq!(labels(&remove), vec!["a"]);
                match insert {
                    RangeItems::Values(values) => assert_eq!(labels(&values), vec!["d"]),
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_state_machine_edges() {
        let empty_set = set(&[]);
        let some = set(&["x", "y"]);
        assert!(matches!(compute_delta(&some, None), Ok(SparseDelta::Assign)));
        assert!(matches!(compute_delta(&empty_set, None), Ok(SparseDelta::Assign)));
        assert!(matches!(
            compute_delta(&empty_set, Some(&empty_set)),
            Ok(SparseDelta::Unchanged)
        ));
        assert!(matches!(compute_delta(&some, Some(&some)), Ok(SparseDelta::Unchanged)));
        match compute_delta(&some, Some(&empty_set)).expect("delta") {
            SparseDelta::Changes { remove, insert } => {
                assert!(remove.is_empty());
                assert_eq!(insert.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
        match compute_delta(&empty_set, Some(&some)).expect("delta") {
            SparseDelta::Changes { remove, insert } => {
                assert_eq!(labels(&remove), vec!["x", "y"]);
                assert!(insert.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(compute_delta(&some, Some(&Value::I32(0))).is_err());
    }

    #[test]
    fn test_map_value_change_inserts_without_removing() {
        let default: SparseMap = [MapEntry::new("hp", 10i32), MapEntry::new("mp", 5i32)]
            .into_iter()
            .collect();
        let current: SparseMap = [MapEntry::new("hp", 12i32), MapEntry::new("mp", 5i32)]
            .into_iter()
            .collect();
        let (default, current) = (Value::Map(default), Value::Map(current));
        match compute_delta(&current, Some(&default)).expect("delta") {
            SparseDelta::Changes { remove, insert } => {
                assert!(remove.is_empty());
                match insert {
                    RangeItems::Entries(entries) => {
                        assert_eq!(entries.len(), 1);
                        assert_eq!(entries[0].value, Value::I32(12));
                    }
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sparse_differs_ignores_order() {
        let a: SparseSet = (0..4).map(Value::I32).collect();
        let b: SparseSet = (0..4).rev().map(Value::I32).collect();
        assert!(!sparse_differs(&a, &b));
        let c: SparseSet = (1..5).map(Value::I32).collect();
        assert!(sparse_differs(&a, &c));
        assert!(sparse_differs(&c, &a));
    }
}
