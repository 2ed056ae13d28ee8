// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Custom bindings for native types the generic binder cannot decompose.
//!
//! A custom binding owns a synthesized struct declaration in the `PlainProps`
//! scope and translates between a live [`Value`] and that struct's members.
//! Built-ins cover object handles, delegates and multicast delegates.

use crate::build::{BuiltStruct, MemberBuilder};
use crate::context::Context;
use crate::error::{LoadError, SaveError};
use crate::ids::{DeclId, MemberId};
use crate::load::LoadPlan;
use crate::read::{ReadStruct, ReadValue};
use crate::schema::SchemaBatch;
use crate::value::{ScriptDelegate, Value};
use bumpalo::Bump;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CustomId(pub(crate) u32);

/// Translation between one native field kind and its declared members.
pub trait CustomBinding: Send + Sync + fmt::Debug {
    /// Native kind name, also the declared type name.
    fn name(&self) -> &str;

    /// Declared member names, in order.
    fn members(&self) -> &'static [&'static str];

    /// Value of a zero-initialized field.
    fn zero(&self) -> Value;

    /// Add the members describing `src`.
    fn save<'a>(
        &self,
        cx: &CustomSaveContext<'_, 'a>,
        out: &mut MemberBuilder<'a>,
        src: &Value,
    ) -> Result<(), SaveError>;

    /// Apply saved members onto `dst`. Absent members keep their value.
    fn load(&self, src: &CustomLoadView<'_>, dst: &mut Value) -> Result<(), LoadError>;

    /// Whether `a` and `b` differ. Equal values are omitted from delta saves.
    fn diff(&self, a: &Value, b: &Value) -> bool {
        a != b
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RegisteredCustom {
    pub binding: Arc<dyn CustomBinding>,
    pub decl: DeclId,
    pub members: Vec<MemberId>,
}

/// Custom bindings of a context, by native kind name.
#[derive(Debug, Default)]
pub struct CustomRegistry {
    entries: Vec<RegisteredCustom>,
    by_name: HashMap<String, CustomId>,
}

impl CustomRegistry {
    pub(crate) fn insert(&mut self, entry: RegisteredCustom) -> CustomId {
        let id = CustomId(self.entries.len() as u32);
        self.by_name.insert(entry.binding.name().to_string(), id);
        self.entries.push(entry);
        id
    }

    pub fn find(&self, name: &str) -> Option<CustomId> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn get(&self, id: CustomId) -> Option<&RegisteredCustom> {
        self.entries.get(id.0 as usize)
    }

    pub fn decl(&self, id: CustomId) -> Option<DeclId> {
        self.get(id).map(|c| c.decl)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a custom binding sees while saving.
pub struct CustomSaveContext<'c, 'a> {
    pub(crate) ctx: &'c Context,
    pub(crate) bump: &'a Bump,
    pub(crate) custom: &'c RegisteredCustom,
}

impl<'c, 'a> CustomSaveContext<'c, 'a> {
    /// Declared member `idx`.
    pub fn member(&self, idx: usize) -> Result<MemberId, SaveError> {
        self.custom
            .members
            .get(idx)
            .copied()
            .ok_or_else(|| SaveError::InconsistentMember {
                ty: self.custom.binding.name().to_string(),
                member: idx.to_string(),
            })
    }

    pub fn decl(&self) -> DeclId {
        self.custom.decl
    }

    pub fn bump(&self) -> &'a Bump {
        self.bump
    }

    /// Declaration of another registered custom.
    pub fn custom_decl(&self, name: &str) -> Option<DeclId> {
        let id = self.ctx.customs.find(name)?;
        self.ctx.customs.decl(id)
    }

    /// Save `value` with another registered custom binding.
    pub fn save_custom(&self, name: &str, value: &Value) -> Result<&'a BuiltStruct<'a>, SaveError> {
        let custom = self
            .ctx
            .customs
            .find(name)
            .and_then(|id| self.ctx.customs.get(id))
            .ok_or_else(|| {
                SaveError::Bind(crate::error::BindError::NotBound(name.to_string()))
            })?;
        let nested = CustomSaveContext {
            ctx: self.ctx,
            bump: self.bump,
            custom,
        };
        let mut out = MemberBuilder::new(self.bump);
        custom.binding.save(&nested, &mut out, value)?;
        Ok(out.build(custom.decl))
    }
}

/// Saved members of one custom-bound struct.
pub struct CustomLoadView<'v> {
    pub(crate) ctx: &'v Context,
    pub(crate) plan: &'v LoadPlan,
    pub(crate) schemas: &'v SchemaBatch,
    pub(crate) read: &'v ReadStruct,
    pub(crate) custom: &'v RegisteredCustom,
}

impl<'v> CustomLoadView<'v> {
    /// Declared member `idx`.
    pub fn member(&self, idx: usize) -> Result<MemberId, LoadError> {
        self.custom
            .members
            .get(idx)
            .copied()
            .ok_or_else(|| LoadError::UnknownMember {
                ty: self.custom.binding.name().to_string(),
                member: idx.to_string(),
            })
    }

    /// Saved value of declared member `idx`, if present.
    pub fn get(&self, idx: usize) -> Result<Option<&'v ReadValue>, LoadError> {
        let member = self.member(idx)?;
        let Some(schema) = self.schemas.structs.get(self.read.schema as usize) else {
            return Err(LoadError::UnknownSchema(self.read.schema));
        };
        Ok(self.read.members.iter().find_map(|(mi, value)| {
            let name = schema.members.get(*mi)?.name?;
            (self.plan.member_id(name) == Some(member)).then_some(value)
        }))
    }

    /// String member `idx`, if present.
    pub fn string(&self, idx: usize) -> Result<Option<String>, LoadError> {
        match self.get(idx)? {
            Some(value) => Ok(Some(read_string(value)?)),
            None => Ok(None),
        }
    }

    /// Struct range member `idx`, each item loaded by the custom binding `custom`.
    pub fn load_nested(&self, idx: usize, custom: &str) -> Result<Vec<Value>, LoadError> {
        let Some(value) = self.get(idx)? else {
            return Ok(Vec::new());
        };
        let registered = self
            .ctx
            .customs
            .find(custom)
            .and_then(|id| self.ctx.customs.get(id))
            .ok_or_else(|| LoadError::UnboundType(custom.to_string()))?;
        let ReadValue::Range(items) = value else {
            return Err(mismatch(custom, "Leaf"));
        };
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let ReadValue::Struct(read) = item else {
                return Err(mismatch(custom, "Range"));
            };
            let view = CustomLoadView {
                ctx: self.ctx,
                plan: self.plan,
                schemas: self.schemas,
                read,
                custom: registered,
            };
            let mut loaded = registered.binding.zero();
            registered.binding.load(&view, &mut loaded)?;
            out.push(loaded);
        }
        Ok(out)
    }
}

fn mismatch(expected: &str, found: &'static str) -> LoadError {
    LoadError::ValueMismatch {
        expected: expected.to_string(),
        found,
    }
}

/// Decode a `U8` range into UTF-8 text.
pub(crate) fn read_string(value: &ReadValue) -> Result<String, LoadError> {
    let ReadValue::Range(items) = value else {
        return Err(mismatch("String", "Struct"));
    };
    let bytes = items
        .iter()
        .map(|item| match item {
            ReadValue::Leaf(bits) => Ok(*bits as u8),
            _ => Err(mismatch("U8", "Struct")),
        })
        .collect::<Result<Vec<u8>, LoadError>>()?;
    String::from_utf8(bytes).map_err(|_| LoadError::InvalidUtf8)
}

fn save_mismatch(expected: &str, found: &Value) -> SaveError {
    SaveError::ValueMismatch {
        expected: expected.to_string(),
        found: found.kind_name(),
    }
}

fn load_mismatch(expected: &str, found: &Value) -> LoadError {
    LoadError::ValueMismatch {
        expected: expected.to_string(),
        found: found.kind_name(),
    }
}

// =======================================================================
// Built-in bindings
// =======================================================================

/// Object reference saved as its path.
#[derive(Debug, Default)]
pub struct ObjectHandleBinding;

impl CustomBinding for ObjectHandleBinding {
    fn name(&self) -> &str {
        "ObjectHandle"
    }

    fn members(&self) -> &'static [&'static str] {
        &["Path"]
    }

    fn zero(&self) -> Value {
        Value::Handle(None)
    }

    fn save<'a>(
        &self,
        cx: &CustomSaveContext<'_, 'a>,
        out: &mut MemberBuilder<'a>,
        src: &Value,
    ) -> Result<(), SaveError> {
        match src {
            Value::Handle(Some(path)) => out.add_string(cx.member(0)?, path),
            Value::Handle(None) => {}
            other => return Err(save_mismatch(self.name(), other)),
        }
        Ok(())
    }

    fn load(&self, src: &CustomLoadView<'_>, dst: &mut Value) -> Result<(), LoadError> {
        if !matches!(dst, Value::Handle(_)) {
            return Err(load_mismatch(self.name(), dst));
        }
        *dst = Value::Handle(src.string(0)?);
        Ok(())
    }
}

/// Single bound method.
#[derive(Debug, Default)]
pub struct DelegateBinding;

impl CustomBinding for DelegateBinding {
    fn name(&self) -> &str {
        "Delegate"
    }

    fn members(&self) -> &'static [&'static str] {
        &["Object", "Function"]
    }

    fn zero(&self) -> Value {
        Value::Delegate(ScriptDelegate::default())
    }

    fn save<'a>(
        &self,
        cx: &CustomSaveContext<'_, 'a>,
        out: &mut MemberBuilder<'a>,
        src: &Value,
    ) -> Result<(), SaveError> {
        let Value::Delegate(delegate) = src else {
            return Err(save_mismatch(self.name(), src));
        };
        out.add_string(cx.member(0)?, &delegate.object);
        out.add_string(cx.member(1)?, &delegate.function);
        Ok(())
    }

    fn load(&self, src: &CustomLoadView<'_>, dst: &mut Value) -> Result<(), LoadError> {
        let Value::Delegate(delegate) = dst else {
            return Err(load_mismatch(self.name(), dst));
        };
        if let Some(object) = src.string(0)? {
            delegate.object = object;
        }
        if let Some(function) = src.string(1)? {
            delegate.function = function;
        }
        Ok(())
    }
}

/// Invocation list of delegates.
#[derive(Debug, Default)]
pub struct MulticastDelegateBinding;

impl CustomBinding for MulticastDelegateBinding {
    fn name(&self) -> &str {
        "MulticastDelegate"
    }

    fn members(&self) -> &'static [&'static str] {
        &["Invocations"]
    }

    fn zero(&self) -> Value {
        Value::Multicast(Vec::new())
    }

    fn save<'a>(
        &self,
        cx: &CustomSaveContext<'_, 'a>,
        out: &mut MemberBuilder<'a>,
        src: &Value,
    ) -> Result<(), SaveError> {
        let Value::Multicast(invocations) = src else {
            return Err(save_mismatch(self.name(), src));
        };
        if invocations.is_empty() {
            return Ok(());
        }
        let decl = cx
            .custom_decl("Delegate")
            .ok_or_else(|| SaveError::Bind(crate::error::BindError::NotBound("Delegate".into())))?;
        let items = invocations
            .iter()
            .map(|d| cx.save_custom("Delegate", &Value::Delegate(d.clone())))
            .collect::<Result<Vec<_>, _>>()?;
        out.add_struct_range(cx.member(0)?, decl, &items);
        Ok(())
    }

    fn load(&self, src: &CustomLoadView<'_>, dst: &mut Value) -> Result<(), LoadError> {
        if !matches!(dst, Value::Multicast(_)) {
            return Err(load_mismatch(self.name(), dst));
        }
        let invocations = src
            .load_nested(0, "Delegate")?
            .into_iter()
            .filter_map(|v| match v {
                Value::Delegate(d) => Some(d),
                _ => None,
            })
            .collect();
        *dst = Value::Multicast(invocations);
        Ok(())
    }
}

/// Bindings every context starts with.
pub(crate) fn builtin_bindings() -> Vec<Arc<dyn CustomBinding>> {
    vec![
        Arc::new(ObjectHandleBinding),
        Arc::new(DelegateBinding),
        Arc::new(MulticastDelegateBinding),
    ]
}
