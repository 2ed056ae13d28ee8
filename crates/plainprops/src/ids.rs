// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Interned names and type identifiers.
//!
//! Equality of names, members and types is by id. The same string always
//! interns to the same [`NameId`], and the same `(scope, name)` pair always
//! indexes to the same [`DeclId`] or [`EnumId`] within one [`crate::Context`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Interned string handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NameId(pub(crate) u32);

impl NameId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Interned struct member name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub NameId);

/// Struct declaration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub(crate) u32);

impl DeclId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Enum declaration id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub(crate) u32);

impl EnumId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scoped type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    pub scope: NameId,
    pub name: NameId,
}

/// Split `"Game::Items::Sword"` into `("Game::Items", "Sword")`.
pub fn split_type_name(full: &str) -> (&str, &str) {
    full.rsplit_once("::").unwrap_or(("", full))
}

/// Join a scope and name back into a full type name.
pub fn join_type_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}::{}", scope, name)
    }
}

/// String interner.
#[derive(Debug, Default, Clone)]
pub struct Names {
    strings: Vec<Arc<str>>,
    lookup: HashMap<Arc<str>, NameId>,
}

impl Names {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> NameId {
        if let Some(&id) = self.lookup.get(s) {
            return id;
        }
        let id = NameId(self.strings.len() as u32);
        let shared: Arc<str> = Arc::from(s);
        self.strings.push(shared.clone());
        self.lookup.insert(shared, id);
        id
    }

    pub fn find(&self, s: &str) -> Option<NameId> {
        self.lookup.get(s).copied()
    }

    /// Resolve an id produced by this interner.
    pub fn resolve(&self, id: NameId) -> &str {
        self.strings.get(id.0 as usize).map_or("<invalid>", |s| s)
    }

    pub fn get(&self, raw: u32) -> Option<&str> {
        self.strings.get(raw as usize).map(|s| &**s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

/// Indexes type keys into struct and enum ids.
#[derive(Debug, Default, Clone)]
pub struct TypeIndex {
    structs: HashMap<TypeKey, DeclId>,
    struct_keys: Vec<TypeKey>,
    enums: HashMap<TypeKey, EnumId>,
    enum_keys: Vec<TypeKey>,
}

impl TypeIndex {
    pub fn index_struct(&mut self, key: TypeKey) -> DeclId {
        if let Some(&id) = self.structs.get(&key) {
            return id;
        }
        let id = DeclId(self.struct_keys.len() as u32);
        self.struct_keys.push(key);
        self.structs.insert(key, id);
        id
    }

    pub fn index_enum(&mut self, key: TypeKey) -> EnumId {
        if let Some(&id) = self.enums.get(&key) {
            return id;
        }
        let id = EnumId(self.enum_keys.len() as u32);
        self.enum_keys.push(key);
        self.enums.insert(key, id);
        id
    }

    pub fn find_struct(&self, key: TypeKey) -> Option<DeclId> {
        self.structs.get(&key).copied()
    }

    pub fn find_enum(&self, key: TypeKey) -> Option<EnumId> {
        self.enums.get(&key).copied()
    }

    pub fn struct_key(&self, id: DeclId) -> Option<TypeKey> {
        self.struct_keys.get(id.index()).copied()
    }

    pub fn enum_key(&self, id: EnumId) -> Option<TypeKey> {
        self.enum_keys.get(id.index()).copied()
    }

    pub fn num_structs(&self) -> usize {
        self.struct_keys.len()
    }
}

impl fmt::Display for DeclId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "decl#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut names = Names::new();
        let a = names.intern("Health");
        let b = names.intern("Armor");
        assert_ne!(a, b);
        assert_eq!(names.intern("Health"), a);
        assert_eq!(names.resolve(b), "Armor");
        assert_eq!(names.find("Missing"), None);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_same_scoped_type_indexes_once() {
        let mut names = Names::new();
        let mut types = TypeIndex::default();
        let key = TypeKey {
            scope: names.intern("Game"),
            name: names.intern("Player"),
        };
        let other = TypeKey {
            scope: names.intern("Editor"),
            name: names.intern("Player"),
        };
        let id = types.index_struct(key);
        assert_eq!(types.index_struct(key), id);
        assert_ne!(types.index_struct(other), id);
        assert_eq!(types.struct_key(id), Some(key));
        // enums index separately
        assert_eq!(types.index_enum(key).index(), 0);
    }

    #[test]
    fn test_split_type_name() {
        assert_eq!(split_type_name("Game::Items::Sword"), ("Game::Items", "Sword"));
        assert_eq!(split_type_name("Sword"), ("", "Sword"));
        assert_eq!(join_type_name("Game", "Sword"), "Game::Sword");
        assert_eq!(join_type_name("", "Sword"), "Sword");
    }
}
