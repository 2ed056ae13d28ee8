// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Process-wide engine state.
//!
//! A [`Context`] owns the name interner, the schema registry, every binding,
//! the codec cache, the default instance cache and the custom binding
//! registry. It is passed by reference into every save, load and diff call.
//!
//! # Concurrency
//!
//! Binding mutates the context and needs `&mut Context`. Saving, loading and
//! diffing only read it, so after warm-up any number of threads can share one
//! [`SharedContext`] behind a read lock. Mounted batches are registered through
//! `&Context` in a concurrent map.

use crate::bind::custom::{builtin_bindings, CustomRegistry, RegisteredCustom};
use crate::bind::{
    CustomBinding, CustomId, DeltaBinding, DeltaId, MemberBinding, RangeCache, StaticBinding,
    StaticId, StructBinding,
};
use crate::config::{BatchConfig, BUILTIN_SCOPE};
use crate::declaration::{
    Declarations, EnumDeclaration, Enumerator, Occupancy, StructDeclaration,
};
use crate::defaults::{DefaultInstanceCache, DefaultKind};
use crate::error::{BindError, SchemaError};
use crate::ids::{
    join_type_name, split_type_name, DeclId, EnumId, MemberId, NameId, Names, TypeIndex, TypeKey,
};
use crate::reflect::EnumInfo;
use crate::schema::SchemaBatch;
use crate::value::StructValue;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Context shared between threads. Bind under the write lock, save/load/diff
/// under read locks.
pub type SharedContext = Arc<RwLock<Context>>;

/// Member names of synthesized declarations.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BuiltinMembers {
    pub assign: MemberId,
    pub remove: MemberId,
    pub insert: MemberId,
    pub key: MemberId,
    pub value: MemberId,
}

/// Handle of a mounted batch schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(u32);

#[derive(Debug)]
pub struct Context {
    pub(crate) config: BatchConfig,
    pub(crate) names: Names,
    pub(crate) types: TypeIndex,
    pub(crate) declarations: Declarations,
    pub(crate) structs: Vec<Option<StructBinding>>,
    pub(crate) ranges: RangeCache,
    pub(crate) deltas: Vec<DeltaBinding>,
    pub(crate) delta_index: HashMap<DeclId, DeltaId>,
    pub(crate) statics: Vec<StaticBinding>,
    pub(crate) static_index: HashMap<DeclId, StaticId>,
    pub(crate) customs: CustomRegistry,
    pub(crate) defaults: DefaultInstanceCache,
    pub(crate) builtin: BuiltinMembers,
    mounts: DashMap<MountId, Arc<SchemaBatch>>,
    next_mount: AtomicU32,
}

impl Default for Context {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

impl Context {
    /// New context with the built-in custom bindings registered.
    pub fn new(config: BatchConfig) -> Self {
        let mut names = Names::new();
        let builtin = BuiltinMembers {
            assign: MemberId(names.intern("Assign")),
            remove: MemberId(names.intern("Remove")),
            insert: MemberId(names.intern("Insert")),
            key: MemberId(names.intern("Key")),
            value: MemberId(names.intern("Value")),
        };
        let mut ctx = Self {
            declarations: Declarations::new(config.duplicate_declarations),
            config,
            names,
            types: TypeIndex::default(),
            structs: Vec::new(),
            ranges: RangeCache::default(),
            deltas: Vec::new(),
            delta_index: HashMap::new(),
            statics: Vec::new(),
            static_index: HashMap::new(),
            customs: CustomRegistry::default(),
            defaults: DefaultInstanceCache::default(),
            builtin,
            mounts: DashMap::new(),
            next_mount: AtomicU32::new(0),
        };
        for binding in builtin_bindings() {
            if let Err(err) = ctx.register_custom(binding) {
                log::warn!("[plainprops] built-in custom binding rejected: {}", err);
            }
        }
        ctx
    }

    /// Wrap for sharing between threads.
    pub fn into_shared(self) -> SharedContext {
        Arc::new(RwLock::new(self))
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn names(&self) -> &Names {
        &self.names
    }

    pub fn declarations(&self) -> &Declarations {
        &self.declarations
    }

    pub fn intern(&mut self, s: &str) -> NameId {
        self.names.intern(s)
    }

    /// Member id of an already interned name.
    pub fn member_id(&self, name: &str) -> Option<MemberId> {
        self.names.find(name).map(MemberId)
    }

    pub(crate) fn type_key(&mut self, full_name: &str) -> TypeKey {
        let (scope, name) = split_type_name(full_name);
        TypeKey {
            scope: self.names.intern(scope),
            name: self.names.intern(name),
        }
    }

    fn find_key(&self, full_name: &str) -> Option<TypeKey> {
        let (scope, name) = split_type_name(full_name);
        Some(TypeKey {
            scope: self.names.find(scope)?,
            name: self.names.find(name)?,
        })
    }

    pub fn find_struct(&self, full_name: &str) -> Option<DeclId> {
        self.types.find_struct(self.find_key(full_name)?)
    }

    pub fn find_enum(&self, full_name: &str) -> Option<EnumId> {
        self.types.find_enum(self.find_key(full_name)?)
    }

    /// `Scope::Name` of a struct.
    pub fn type_name(&self, decl: DeclId) -> String {
        match self.types.struct_key(decl) {
            Some(key) => self.key_name(key),
            None => decl.to_string(),
        }
    }

    pub fn enum_name(&self, id: EnumId) -> String {
        match self.types.enum_key(id) {
            Some(key) => self.key_name(key),
            None => format!("enum#{}", id.index()),
        }
    }

    pub(crate) fn key_name(&self, key: TypeKey) -> String {
        join_type_name(self.names.resolve(key.scope), self.names.resolve(key.name))
    }

    // =======================================================================
    // Schema registry
    // =======================================================================

    /// Declare a struct by member names without binding it.
    pub fn declare_struct(
        &mut self,
        full_name: &str,
        members: &[&str],
        occupancy: Occupancy,
        super_type: Option<&str>,
    ) -> Result<DeclId, SchemaError> {
        let key = self.type_key(full_name);
        let id = self.types.index_struct(key);
        let super_id = match super_type {
            Some(name) => Some(self.find_struct(name).ok_or_else(|| {
                SchemaError::UnresolvedSuper {
                    ty: full_name.to_string(),
                    super_type: name.to_string(),
                }
            })?),
            None => None,
        };
        let members = members
            .iter()
            .map(|m| MemberId(self.names.intern(m)))
            .collect();
        self.declarations
            .declare_struct(full_name, id, key, members, occupancy, super_id)?;
        Ok(id)
    }

    /// Declare an enum from host information.
    pub fn declare_enum(&mut self, info: &EnumInfo) -> Result<EnumId, SchemaError> {
        let key = self.type_key(&info.name);
        let id = self.types.index_enum(key);
        let enumerators = info
            .enumerators
            .iter()
            .map(|(name, constant)| Enumerator {
                name: self.names.intern(name),
                constant: *constant,
            })
            .collect();
        self.declarations.declare_enum(
            &info.name,
            EnumDeclaration {
                id,
                ty: key,
                mode: info.mode,
                width: info.width,
                enumerators,
            },
        )?;
        Ok(id)
    }

    pub fn resolve_struct(&self, decl: DeclId) -> Option<&StructDeclaration> {
        self.declarations.get_struct(decl)
    }

    pub fn resolve_enum(&self, id: EnumId) -> Option<&EnumDeclaration> {
        self.declarations.get_enum(id)
    }

    /// Declare an engine-synthesized struct once; later calls return the same id.
    pub(crate) fn declare_builtin(
        &mut self,
        name: &str,
        members: Vec<MemberId>,
        occupancy: Occupancy,
    ) -> Result<DeclId, SchemaError> {
        let key = TypeKey {
            scope: self.names.intern(BUILTIN_SCOPE),
            name: self.names.intern(name),
        };
        let id = self.types.index_struct(key);
        if self.declarations.get_struct(id).is_none() {
            let full_name = join_type_name(BUILTIN_SCOPE, name);
            self.declarations
                .declare_struct(&full_name, id, key, members, occupancy, None)?;
        }
        Ok(id)
    }

    // =======================================================================
    // Bindings
    // =======================================================================

    pub fn is_bound(&self, decl: DeclId) -> bool {
        self.struct_binding(decl).is_some()
    }

    pub fn struct_binding(&self, decl: DeclId) -> Option<&StructBinding> {
        self.structs.get(decl.index()).and_then(Option::as_ref)
    }

    pub fn member_binding(&self, decl: DeclId, member: MemberId) -> Option<&MemberBinding> {
        self.struct_binding(decl)?.member(member)
    }

    /// Flattened field index of `member`, searching super structs as well.
    pub fn field_index(&self, decl: DeclId, member: &str) -> Option<usize> {
        let member = self.member_id(member)?;
        let mut current = Some(decl);
        while let Some(decl) = current {
            let binding = self.struct_binding(decl)?;
            if let Some(m) = binding.member(member) {
                return Some(m.field);
            }
            current = binding.super_decl;
        }
        None
    }

    pub fn delta_binding(&self, id: DeltaId) -> Option<&DeltaBinding> {
        self.deltas.get(id.0 as usize)
    }

    pub fn static_binding(&self, id: StaticId) -> Option<&StaticBinding> {
        self.statics.get(id.0 as usize)
    }

    pub(crate) fn custom(&self, id: CustomId) -> Option<&RegisteredCustom> {
        self.customs.get(id)
    }

    /// Number of distinct range codecs created so far.
    pub fn num_range_codecs(&self) -> usize {
        self.ranges.len()
    }

    /// Drop a struct's binding, declaration and default instance.
    pub fn unbind_struct(&mut self, decl: DeclId) -> bool {
        let bound = match self.structs.get_mut(decl.index()) {
            Some(slot) => slot.take().is_some(),
            None => false,
        };
        self.defaults.drop_type(decl);
        self.declarations.drop_struct(decl);
        if bound {
            log::debug!("[plainprops] unbound {}", self.type_name(decl));
        }
        bound
    }

    /// Register a custom binding for native fields of kind `binding.name()`.
    pub fn register_custom(&mut self, binding: Arc<dyn CustomBinding>) -> Result<CustomId, BindError> {
        let name = binding.name().to_string();
        if self.customs.find(&name).is_some() {
            return Err(BindError::DuplicateCustom(name));
        }
        let members: Vec<MemberId> = binding
            .members()
            .iter()
            .map(|m| MemberId(self.names.intern(m)))
            .collect();
        let decl = self.declare_builtin(&name, members.clone(), Occupancy::AllowSparse)?;
        let id = self.customs.insert(RegisteredCustom {
            binding,
            decl,
            members,
        });
        log::debug!("[plainprops] registered custom binding {}", name);
        Ok(id)
    }

    // =======================================================================
    // Default instances
    // =======================================================================

    /// Default instance of a bound struct: zero or constructed.
    pub fn default_instance(&self, decl: DeclId) -> Option<&StructValue> {
        self.defaults.get(decl)
    }

    pub fn default_kind(&self, decl: DeclId) -> Option<DefaultKind> {
        self.defaults.kind(decl)
    }

    /// Fresh instance initialized from the default.
    pub fn new_instance(&self, decl: DeclId) -> Option<StructValue> {
        self.default_instance(decl).cloned()
    }

    /// Forget a classification; the next bind of the type classifies it again.
    pub fn invalidate_default(&mut self, decl: DeclId) -> bool {
        self.defaults.drop_type(decl)
    }

    pub fn defaults(&self) -> &DefaultInstanceCache {
        &self.defaults
    }

    // =======================================================================
    // Mounted batches
    // =======================================================================

    pub(crate) fn mount(&self, schemas: Arc<SchemaBatch>) -> MountId {
        let id = MountId(self.next_mount.fetch_add(1, Ordering::Relaxed));
        self.mounts.insert(id, schemas);
        log::debug!("[plainprops] mounted batch {:?}", id);
        id
    }

    pub(crate) fn unmount(&self, id: MountId) {
        if self.mounts.remove(&id).is_some() {
            log::debug!("[plainprops] unmounted batch {:?}", id);
        }
    }

    pub fn mounted(&self, id: MountId) -> Option<Arc<SchemaBatch>> {
        self.mounts.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn num_mounted(&self) -> usize {
        self.mounts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::EnumMode;
    use crate::leaf::LeafWidth;

    #[test]
    fn test_builtin_customs_registered() {
        let ctx = Context::default();
        assert_eq!(ctx.customs.len(), 3);
        let id = ctx.customs.find("Delegate").expect("delegate");
        let decl = ctx.customs.decl(id).expect("decl");
        assert_eq!(ctx.type_name(decl), "PlainProps::Delegate");
    }

    #[test]
    fn test_duplicate_custom_rejected() {
        let mut ctx = Context::default();
        let err = ctx
            .register_custom(Arc::new(crate::bind::custom::DelegateBinding))
            .expect_err("duplicate");
        assert_eq!(err, BindError::DuplicateCustom("Delegate".into()));
    }

    #[test]
    fn test_declare_and_resolve() {
        let mut ctx = Context::new(BatchConfig {
            duplicate_declarations: crate::config::DuplicatePolicy::Fail,
            ..BatchConfig::default()
        });
        let base = ctx
            .declare_struct("Game::Base", &["A"], Occupancy::AllowSparse, None)
            .expect("base");
        let derived = ctx
            .declare_struct("Game::Derived", &["B"], Occupancy::RequireAll, Some("Game::Base"))
            .expect("derived");
        assert_eq!(ctx.find_struct("Game::Base"), Some(base));
        let decl = ctx.resolve_struct(derived).expect("declared");
        assert_eq!(decl.members.len(), 2);
        assert!(matches!(
            ctx.declare_struct("Game::Base", &["A"], Occupancy::AllowSparse, None),
            Err(SchemaError::DuplicateStruct(_))
        ));
        assert!(matches!(
            ctx.declare_struct("Game::Orphan", &[], Occupancy::AllowSparse, Some("Game::Missing")),
            Err(SchemaError::UnresolvedSuper { .. })
        ));
        assert!(matches!(
            ctx.declare_struct("Game::Shadow", &["A"], Occupancy::RequireAll, Some("Game::Base")),
            Err(SchemaError::DuplicateMember { .. })
        ));

        let info = EnumInfo {
            name: "Game::Color".into(),
            mode: EnumMode::Flat,
            width: LeafWidth::B8,
            enumerators: vec![("Red".into(), 0), ("Green".into(), 1)],
        };
        let color = ctx.declare_enum(&info).expect("enum");
        assert_eq!(ctx.enum_name(color), "Game::Color");
        assert_eq!(ctx.resolve_enum(color).map(|e| e.enumerators.len()), Some(2));
    }

    #[test]
    fn test_mount_bookkeeping() {
        let ctx = Context::default();
        let a = ctx.mount(Arc::new(SchemaBatch::default()));
        let b = ctx.mount(Arc::new(SchemaBatch::default()));
        assert_ne!(a, b);
        assert_eq!(ctx.num_mounted(), 2);
        ctx.unmount(a);
        assert_eq!(ctx.num_mounted(), 1);
        assert!(ctx.mounted(b).is_some());
    }
}
