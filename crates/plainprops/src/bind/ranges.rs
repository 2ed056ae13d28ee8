// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Range codecs: the item protocol between live containers and the engine.
//!
//! Saving calls [`RangeCodec::read_items`] for a flat, possibly chunked view of
//! the items. Loading calls [`RangeCodec::make_items`] repeatedly with one
//! [`MakeItemsRequest`] until it reports completion:
//!
//! ```text
//! FirstCall -> Continuation* -> FinalCall?
//! ```
//!
//! Each call grows the container by at most `MAX_CHUNK` items and returns the
//! new slots. Containers that must commit after bulk insertion (sets and maps
//! rehash, strings validate UTF-8) request a final call.

use super::{ItemBinding, RangeCodec, RangeKind, RangeSizeType};
use crate::config::MAX_CHUNK;
use crate::context::Context;
use crate::error::{LoadError, SaveError};
use crate::value::{MapEntry, SparseMap, SparseSet, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Process-wide cache of codecs keyed by full shape.
#[derive(Debug, Default)]
pub struct RangeCache {
    codecs: HashMap<RangeCodec, Arc<RangeCodec>>,
}

impl RangeCache {
    /// Shared codec for this shape, created on first use.
    pub fn intern(&mut self, kind: RangeKind, size: RangeSizeType, item: ItemBinding) -> Arc<RangeCodec> {
        let codec = RangeCodec { kind, size, item };
        if let Some(shared) = self.codecs.get(&codec) {
            return Arc::clone(shared);
        }
        let shared = Arc::new(codec.clone());
        self.codecs.insert(codec, Arc::clone(&shared));
        shared
    }

    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// One chunk of items read out of a live container.
#[derive(Debug, Clone, Copy)]
pub enum ItemSlice<'v> {
    Values(&'v [Value]),
    Entries(&'v [MapEntry]),
    Bytes(&'v [u8]),
}

impl ItemSlice<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Entries(v) => v.len(),
            Self::Bytes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Freshly constructed slots to load items into.
#[derive(Debug)]
pub enum ItemSlots<'r> {
    Values(&'r mut [Value]),
    Entries(&'r mut [MapEntry]),
    Bytes(&'r mut [u8]),
}

impl ItemSlots<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Values(v) => v.len(),
            Self::Entries(v) => v.len(),
            Self::Bytes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MakePhase {
    FirstCall,
    Continuation,
    FinalCall,
}

/// State threaded through repeated `make_items` calls for one container.
#[derive(Debug)]
pub struct MakeItemsRequest {
    pub num_total: u64,
    pub num_made: u64,
    phase: MakePhase,
    final_call_requested: bool,
    staging: Vec<u8>,
}

impl MakeItemsRequest {
    pub fn new(num_total: u64) -> Self {
        Self {
            num_total,
            num_made: 0,
            phase: MakePhase::FirstCall,
            final_call_requested: false,
            staging: Vec::new(),
        }
    }

    pub fn phase(&self) -> MakePhase {
        self.phase
    }

    /// Ask for one more call after all items are made.
    pub fn request_final_call(&mut self) {
        self.final_call_requested = true;
    }

    pub fn final_call_requested(&self) -> bool {
        self.final_call_requested
    }

    fn next_chunk(&self) -> usize {
        match self.phase {
            MakePhase::FinalCall => 0,
            _ => (self.num_total - self.num_made).min(MAX_CHUNK as u64) as usize,
        }
    }

    /// Record `made` loaded items. Returns whether another call is needed.
    pub fn advance(&mut self, made: usize) -> bool {
        self.num_made += made as u64;
        match self.phase {
            MakePhase::FinalCall => false,
            _ if self.num_made < self.num_total => {
                self.phase = MakePhase::Continuation;
                true
            }
            _ if self.final_call_requested => {
                self.phase = MakePhase::FinalCall;
                true
            }
            _ => false,
        }
    }
}

impl RangeKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Array => "Array",
            Self::StaticArray(_) => "StaticArray",
            Self::String => "String",
            Self::Optional => "Optional",
            Self::Unique => "Unique",
            Self::Set => "Set",
            Self::Map => "Map",
        }
    }
}

impl RangeCodec {
    /// Items of `value` in save order.
    pub fn read_items<'v>(&self, value: &'v Value) -> Result<Vec<ItemSlice<'v>>, SaveError> {
        let slices = match (self.kind, value) {
            (RangeKind::Array, Value::Array(items)) => vec![ItemSlice::Values(items)],
            (RangeKind::StaticArray(len), Value::Array(items)) => {
                if items.len() != len as usize {
                    return Err(SaveError::ItemCount {
                        expected: u64::from(len),
                        found: items.len() as u64,
                    });
                }
                vec![ItemSlice::Values(items)]
            }
            (RangeKind::String, Value::String(s)) => vec![ItemSlice::Bytes(s.as_bytes())],
            (RangeKind::Optional, Value::Optional(item))
            | (RangeKind::Unique, Value::Unique(item)) => match item {
                Some(item) => vec![ItemSlice::Values(std::slice::from_ref(&**item))],
                None => Vec::new(),
            },
            (RangeKind::Set, Value::Set(set)) => set.runs().map(ItemSlice::Values).collect(),
            (RangeKind::Map, Value::Map(map)) => map.runs().map(ItemSlice::Entries).collect(),
            (kind, other) => {
                return Err(SaveError::ValueMismatch {
                    expected: kind.name().to_string(),
                    found: other.kind_name(),
                })
            }
        };
        Ok(slices)
    }

    /// Grow `dst` and return the next batch of constructed slots.
    pub fn make_items<'r>(
        &self,
        ctx: &Context,
        dst: &'r mut Value,
        req: &'r mut MakeItemsRequest,
    ) -> Result<ItemSlots<'r>, LoadError> {
        let first = req.phase == MakePhase::FirstCall;
        let grow = req.next_chunk();
        let reserve = req.num_total.min(MAX_CHUNK as u64) as usize;

        match self.kind {
            RangeKind::Array | RangeKind::StaticArray(_) => {
                if first {
                    if let RangeKind::StaticArray(len) = self.kind {
                        if req.num_total != u64::from(len) {
                            return Err(LoadError::ItemCount {
                                expected: u64::from(len),
                                found: req.num_total,
                            });
                        }
                    }
                    *dst = Value::Array(Vec::with_capacity(reserve));
                }
                let Value::Array(items) = dst else {
                    return Err(self.mismatch(dst));
                };
                let start = items.len();
                items.extend((0..grow).map(|_| self.zero_item(ctx)));
                Ok(ItemSlots::Values(&mut items[start..]))
            }
            RangeKind::String => {
                if first {
                    req.staging.clear();
                    req.staging.reserve(reserve);
                    req.request_final_call();
                }
                if req.phase == MakePhase::FinalCall {
                    let bytes = std::mem::take(&mut req.staging);
                    let text = String::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8)?;
                    *dst = Value::String(text);
                    return Ok(ItemSlots::Bytes(Default::default()));
                }
                let start = req.staging.len();
                req.staging.resize(start + grow, 0);
                Ok(ItemSlots::Bytes(&mut req.staging[start..]))
            }
            RangeKind::Optional | RangeKind::Unique => {
                if first {
                    if req.num_total > 1 {
                        return Err(LoadError::ItemCount {
                            expected: 1,
                            found: req.num_total,
                        });
                    }
                    let slot = (req.num_total == 1).then(|| Box::new(self.zero_item(ctx)));
                    *dst = match self.kind {
                        RangeKind::Optional => Value::Optional(slot),
                        _ => Value::Unique(slot),
                    };
                }
                match dst {
                    Value::Optional(Some(item)) | Value::Unique(Some(item)) if grow == 1 => {
                        Ok(ItemSlots::Values(std::slice::from_mut(&mut **item)))
                    }
                    _ => Ok(ItemSlots::Values(Default::default())),
                }
            }
            RangeKind::Set => {
                if first {
                    *dst = Value::Set(SparseSet::with_capacity(reserve));
                    req.request_final_call();
                }
                let Value::Set(set) = dst else {
                    return Err(self.mismatch(dst));
                };
                if req.phase == MakePhase::FinalCall {
                    set.rehash();
                    return Ok(ItemSlots::Values(Default::default()));
                }
                Ok(ItemSlots::Values(set.extend_unindexed(grow, || self.zero_item(ctx))))
            }
            RangeKind::Map => {
                if first {
                    *dst = Value::Map(SparseMap::with_capacity(reserve));
                    req.request_final_call();
                }
                let Value::Map(map) = dst else {
                    return Err(self.mismatch(dst));
                };
                if req.phase == MakePhase::FinalCall {
                    map.rehash();
                    return Ok(ItemSlots::Entries(Default::default()));
                }
                Ok(ItemSlots::Entries(map.extend_unindexed(grow, || self.zero_entry(ctx))))
            }
        }
    }

    /// Empty container of this shape; static arrays hold zero items.
    pub fn zero_container(&self, ctx: &Context) -> Value {
        match self.kind {
            RangeKind::Array => Value::Array(Vec::new()),
            RangeKind::StaticArray(len) => {
                Value::Array((0..len).map(|_| self.zero_item(ctx)).collect())
            }
            RangeKind::String => Value::String(String::new()),
            RangeKind::Optional => Value::Optional(None),
            RangeKind::Unique => Value::Unique(None),
            RangeKind::Set => Value::Set(SparseSet::new()),
            RangeKind::Map => Value::Map(SparseMap::new()),
        }
    }

    fn zero_item(&self, ctx: &Context) -> Value {
        match &self.item {
            ItemBinding::Single(item) => ctx.zero_value(item),
            ItemBinding::Pair { .. } => Value::Bool(false),
        }
    }

    fn zero_entry(&self, ctx: &Context) -> MapEntry {
        match &self.item {
            ItemBinding::Pair { key, value, .. } => MapEntry {
                key: ctx.zero_value(key),
                value: ctx.zero_value(value),
            },
            ItemBinding::Single(item) => MapEntry {
                key: ctx.zero_value(item),
                value: Value::Bool(false),
            },
        }
    }

    fn mismatch(&self, found: &Value) -> LoadError {
        LoadError::ValueMismatch {
            expected: self.kind.name().to_string(),
            found: found.kind_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::TypeBinding;
    use crate::leaf::LeafKind;

    fn drive(codec: &RangeCodec, ctx: &Context, dst: &mut Value, items: &[Value]) -> usize {
        let mut req = MakeItemsRequest::new(items.len() as u64);
        let mut next = 0;
        let mut calls = 0;
        loop {
            calls += 1;
            let made = match codec.make_items(ctx, dst, &mut req).expect("make items") {
                ItemSlots::Values(slots) => {
                    for slot in slots.iter_mut() {
                        *slot = items[next].clone();
                        next += 1;
                    }
                    slots.len()
                }
                ItemSlots::Bytes(slots) => {
                    for slot in slots.iter_mut() {
                        *slot = items[next].as_u8().expect("byte");
                        next += 1;
                    }
                    slots.len()
                }
                ItemSlots::Entries(_) => unreachable!("no map in this test"),
            };
            if !req.advance(made) {
                return calls;
            }
        }
    }

    fn codec(cache: &mut RangeCache, kind: RangeKind, size: RangeSizeType, leaf: LeafKind) -> Arc<RangeCodec> {
        cache.intern(kind, size, ItemBinding::Single(TypeBinding::Leaf(leaf)))
    }

    #[test]
    fn test_identical_shapes_share_codec() {
        let mut cache = RangeCache::default();
        let a = codec(&mut cache, RangeKind::Array, RangeSizeType::U32, LeafKind::I32);
        let b = codec(&mut cache, RangeKind::Array, RangeSizeType::U32, LeafKind::I32);
        let c = codec(&mut cache, RangeKind::Array, RangeSizeType::U32, LeafKind::I64);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_array_grows_in_chunks() {
        let ctx = Context::default();
        let mut cache = RangeCache::default();
        let array = codec(&mut cache, RangeKind::Array, RangeSizeType::U32, LeafKind::I32);
        let items: Vec<Value> = (0..600).map(Value::I32).collect();
        let mut dst = Value::Array(vec![Value::I32(7)]);
        let calls = drive(&array, &ctx, &mut dst, &items);
        assert_eq!(calls, 3);
        assert_eq!(dst, Value::Array(items));
    }

    #[test]
    fn test_set_requests_final_rehash() {
        let ctx = Context::default();
        let mut cache = RangeCache::default();
        let set = codec(&mut cache, RangeKind::Set, RangeSizeType::U32, LeafKind::I32);
        let items = vec![Value::I32(1), Value::I32(2), Value::I32(2)];
        let mut dst = Value::Set(SparseSet::new());
        let calls = drive(&set, &ctx, &mut dst, &items);
        assert_eq!(calls, 2);
        let loaded = dst.as_set().expect("set");
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains_key(&Value::I32(2)));
    }

    #[test]
    fn test_string_commits_on_final_call() {
        let ctx = Context::default();
        let mut cache = RangeCache::default();
        let string = codec(&mut cache, RangeKind::String, RangeSizeType::U32, LeafKind::U8);
        let items: Vec<Value> = "héllo".bytes().map(Value::U8).collect();
        let mut dst = Value::String(String::new());
        drive(&string, &ctx, &mut dst, &items);
        assert_eq!(dst.as_str(), Some("héllo"));

        let mut req = MakeItemsRequest::new(1);
        let mut dst = Value::String(String::new());
        if let ItemSlots::Bytes(slots) = string.make_items(&ctx, &mut dst, &mut req).expect("first") {
            slots[0] = 0xFF;
        }
        assert!(req.advance(1));
        assert_eq!(
            string.make_items(&ctx, &mut dst, &mut req).map(|s| s.len()),
            Err(LoadError::InvalidUtf8)
        );
    }

    #[test]
    fn test_optional_accepts_at_most_one() {
        let ctx = Context::default();
        let mut cache = RangeCache::default();
        let optional = codec(&mut cache, RangeKind::Optional, RangeSizeType::Uni, LeafKind::F64);
        let mut dst = Value::Optional(None);
        drive(&optional, &ctx, &mut dst, &[Value::F64(2.5)]);
        assert_eq!(dst, Value::Optional(Some(Box::new(Value::F64(2.5)))));

        drive(&optional, &ctx, &mut dst, &[]);
        assert_eq!(dst, Value::Optional(None));

        let mut req = MakeItemsRequest::new(2);
        assert!(matches!(
            optional.make_items(&ctx, &mut dst, &mut req),
            Err(LoadError::ItemCount { expected: 1, found: 2 })
        ));
    }

    #[test]
    fn test_static_array_requires_exact_length() {
        let ctx = Context::default();
        let mut cache = RangeCache::default();
        let fixed = codec(&mut cache, RangeKind::StaticArray(3), RangeSizeType::U8, LeafKind::U16);
        let mut dst = Value::Array(Vec::new());
        let mut req = MakeItemsRequest::new(2);
        assert!(matches!(
            fixed.make_items(&ctx, &mut dst, &mut req),
            Err(LoadError::ItemCount { expected: 3, found: 2 })
        ));
        assert_eq!(fixed.zero_container(&ctx), Value::Array(vec![Value::U16(0); 3]));
    }

    #[test]
    fn test_read_items_yields_runs() {
        let mut cache = RangeCache::default();
        let set = codec(&mut cache, RangeKind::Set, RangeSizeType::U32, LeafKind::I32);
        let mut live: SparseSet = (0..5).map(Value::I32).collect();
        live.remove(&Value::I32(2));
        let value = Value::Set(live);
        let chunks = set.read_items(&value).expect("read");
        let sizes: Vec<usize> = chunks.iter().map(ItemSlice::len).collect();
        assert_eq!(sizes, vec![2, 2]);
        assert!(set.read_items(&Value::I32(0)).is_err());
    }
}
