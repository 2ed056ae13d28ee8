// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema registry: struct and enum declarations.
//!
//! Lookups are O(1) by id. Declaration order never matters; only the member
//! list and occupancy of a declaration do.

use crate::config::DuplicatePolicy;
use crate::error::SchemaError;
use crate::ids::{DeclId, EnumId, MemberId, NameId, TypeKey};
use crate::leaf::LeafWidth;
use serde::{Deserialize, Serialize};

/// Whether every member of a struct is always serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Occupancy {
    /// Dense: all members always present.
    RequireAll,
    /// Members equal to the default may be omitted.
    #[default]
    AllowSparse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructDeclaration {
    pub id: DeclId,
    pub ty: TypeKey,
    /// Member order; flattened through the super chain for `RequireAll`.
    pub members: Vec<MemberId>,
    pub occupancy: Occupancy,
    /// Kept only for `AllowSparse`; `RequireAll` declarations are flattened.
    pub super_id: Option<DeclId>,
}

impl StructDeclaration {
    pub fn position(&self, member: MemberId) -> Option<usize> {
        self.members.iter().position(|&m| m == member)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnumMode {
    /// Exactly one enumerator.
    Flat,
    /// Bitwise union of enumerators.
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Enumerator {
    pub name: NameId,
    pub constant: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDeclaration {
    pub id: EnumId,
    pub ty: TypeKey,
    pub mode: EnumMode,
    pub width: LeafWidth,
    pub enumerators: Vec<Enumerator>,
}

impl EnumDeclaration {
    /// Whether `value` is representable by this enum.
    pub fn accepts(&self, value: u64) -> bool {
        if value & !self.width.mask() != 0 {
            return false;
        }
        match self.mode {
            EnumMode::Flat => self.enumerators.iter().any(|e| e.constant == value),
            EnumMode::Flag => {
                let all = self.enumerators.iter().fold(0u64, |acc, e| acc | e.constant);
                value & !all == 0
            }
        }
    }

    pub fn name_of(&self, value: u64) -> Option<NameId> {
        self.enumerators
            .iter()
            .find(|e| e.constant == value)
            .map(|e| e.name)
    }

    fn validate(&self, type_name: &str) -> Result<(), SchemaError> {
        let invalid = |reason: String| SchemaError::InvalidEnum {
            ty: type_name.to_string(),
            reason,
        };
        for (i, e) in self.enumerators.iter().enumerate() {
            if e.constant & !self.width.mask() != 0 {
                return Err(invalid(format!(
                    "constant {:#x} exceeds width {:?}",
                    e.constant, self.width
                )));
            }
            if self.mode == EnumMode::Flag && e.constant.count_ones() > 1 {
                return Err(invalid(format!("flag {:#x} is not a single bit", e.constant)));
            }
            if self.enumerators[..i].iter().any(|p| p.constant == e.constant) {
                return Err(invalid(format!("constant {:#x} repeats", e.constant)));
            }
        }
        Ok(())
    }
}

/// All declarations of a context, indexed by id.
#[derive(Debug, Default, Clone)]
pub struct Declarations {
    structs: Vec<Option<StructDeclaration>>,
    enums: Vec<Option<EnumDeclaration>>,
    policy: DuplicatePolicy,
}

impl Declarations {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            structs: Vec::new(),
            enums: Vec::new(),
            policy,
        }
    }

    /// Declare a struct. For `RequireAll` the super chain is flattened here.
    pub fn declare_struct(
        &mut self,
        type_name: &str,
        id: DeclId,
        ty: TypeKey,
        members: Vec<MemberId>,
        occupancy: Occupancy,
        super_id: Option<DeclId>,
    ) -> Result<(), SchemaError> {
        if self.get_struct(id).is_some() {
            return self.duplicate(SchemaError::DuplicateStruct(type_name.to_string()));
        }

        let (members, super_id) = match (occupancy, super_id) {
            (Occupancy::RequireAll, Some(super_id)) => {
                let mut flat = self.flattened_members(super_id).ok_or_else(|| {
                    SchemaError::UnresolvedSuper {
                        ty: type_name.to_string(),
                        super_type: super_id.to_string(),
                    }
                })?;
                flat.extend(members);
                (flat, None)
            }
            (_, Some(super_id)) if self.get_struct(super_id).is_none() => {
                return Err(SchemaError::UnresolvedSuper {
                    ty: type_name.to_string(),
                    super_type: super_id.to_string(),
                });
            }
            (_, super_id) => (members, super_id),
        };
        for (i, member) in members.iter().enumerate() {
            if members[..i].contains(member) {
                return Err(SchemaError::DuplicateMember {
                    ty: type_name.to_string(),
                    member: format!("name#{}", member.0.index()),
                });
            }
        }

        let idx = id.index();
        if self.structs.len() <= idx {
            self.structs.resize(idx + 1, None);
        }
        self.structs[idx] = Some(StructDeclaration {
            id,
            ty,
            members,
            occupancy,
            super_id,
        });
        Ok(())
    }

    pub fn declare_enum(
        &mut self,
        type_name: &str,
        decl: EnumDeclaration,
    ) -> Result<(), SchemaError> {
        if self.get_enum(decl.id).is_some() {
            return self.duplicate(SchemaError::DuplicateEnum(type_name.to_string()));
        }
        decl.validate(type_name)?;
        let idx = decl.id.index();
        if self.enums.len() <= idx {
            self.enums.resize(idx + 1, None);
        }
        self.enums[idx] = Some(decl);
        Ok(())
    }

    pub fn get_struct(&self, id: DeclId) -> Option<&StructDeclaration> {
        self.structs.get(id.index()).and_then(Option::as_ref)
    }

    pub fn get_enum(&self, id: EnumId) -> Option<&EnumDeclaration> {
        self.enums.get(id.index()).and_then(Option::as_ref)
    }

    pub fn drop_struct(&mut self, id: DeclId) {
        if let Some(slot) = self.structs.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// Members of `id` including every super, outermost super first.
    pub fn flattened_members(&self, id: DeclId) -> Option<Vec<MemberId>> {
        let decl = self.get_struct(id)?;
        let mut out = match decl.super_id {
            Some(super_id) => self.flattened_members(super_id)?,
            None => Vec::new(),
        };
        out.extend_from_slice(&decl.members);
        Some(out)
    }

    fn duplicate(&self, err: SchemaError) -> Result<(), SchemaError> {
        match self.policy {
            DuplicatePolicy::Fail => Err(err),
            DuplicatePolicy::Ignore => {
                log::warn!("[plainprops] ignoring duplicate declaration: {}", err);
                Ok(())
            }
        }
    }
}
