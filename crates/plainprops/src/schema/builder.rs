// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Collects the partial schemas of a batch from its built values.
//!
//! Only members that appear in some saved instance are declared, in
//! declaration order with the super pseudo-member first. A struct is dense
//! when it is `RequireAll` or when every noted instance carries every noted
//! member.

use super::{EnumSchema, SchemaBatch, SchemaMember, SchemaType, StructSchema};
use crate::build::{BuiltRange, BuiltStruct, BuiltType, BuiltValue};
use crate::context::Context;
use crate::declaration::Occupancy;
use crate::error::{BindError, SaveError};
use crate::ids::{DeclId, EnumId, MemberId};
use crate::leaf::LeafKind;
use std::collections::HashMap;

#[derive(Debug)]
struct NotedStruct {
    decl: DeclId,
    members: Vec<MemberId>,
    require_all: bool,
    /// Slot 0 is the super pseudo-member, slot `i + 1` is `members[i]`.
    slots: Vec<Option<SchemaType>>,
    instances: usize,
    min_members: usize,
}

/// Notes built structs and emits their schemas.
pub struct SchemasBuilder<'c> {
    ctx: &'c Context,
    structs: Vec<NotedStruct>,
    struct_index: HashMap<DeclId, u32>,
    enums: Vec<EnumId>,
    enum_index: HashMap<EnumId, u32>,
}

/// Schemas of a batch plus the mapping back to live declarations.
#[derive(Debug, Clone)]
pub struct NotedSchemas {
    /// Schemas with process name ids.
    pub batch: SchemaBatch,
    /// Struct schema index to declaration.
    pub decls: Vec<DeclId>,
    pub index: HashMap<DeclId, u32>,
}

impl<'c> SchemasBuilder<'c> {
    pub fn new(ctx: &'c Context) -> Self {
        Self {
            ctx,
            structs: Vec::new(),
            struct_index: HashMap::new(),
            enums: Vec::new(),
            enum_index: HashMap::new(),
        }
    }

    /// Note one saved instance and everything it references.
    pub fn note_struct(&mut self, built: &BuiltStruct<'_>) -> Result<u32, SaveError> {
        let idx = self.index_struct(built.decl)?;
        for member in built.members {
            let ty = self.note_value(&member.value)?;
            let noted = &mut self.structs[idx as usize];
            let slot = match member.name {
                None => 0,
                Some(name) => match noted.members.iter().position(|&m| m == name) {
                    Some(pos) => pos + 1,
                    None => return Err(self.inconsistent(built.decl, Some(name))),
                },
            };
            match &noted.slots[slot] {
                Some(existing) if *existing != ty => {
                    return Err(self.inconsistent(built.decl, member.name));
                }
                Some(_) => {}
                None => noted.slots[slot] = Some(ty),
            }
        }
        let noted = &mut self.structs[idx as usize];
        noted.instances += 1;
        noted.min_members = noted.min_members.min(built.members.len());
        Ok(idx)
    }

    fn note_value(&mut self, value: &BuiltValue<'_>) -> Result<SchemaType, SaveError> {
        match value {
            BuiltValue::Leaf(kind, _) => Ok(self.leaf_type(*kind)),
            BuiltValue::Struct(inner) => Ok(SchemaType::Struct(self.note_struct(inner)?)),
            BuiltValue::Range(range) => self.note_range(range),
        }
    }

    fn note_range(&mut self, range: &BuiltRange<'_>) -> Result<SchemaType, SaveError> {
        let item = self.note_type(&range.item)?;
        match range.items {
            crate::build::BuiltItems::Structs(items) => {
                for inner in items {
                    self.note_struct(inner)?;
                }
            }
            crate::build::BuiltItems::Ranges(items) => {
                for inner in items {
                    self.note_range(inner)?;
                }
            }
            crate::build::BuiltItems::Leaves(_) | crate::build::BuiltItems::Bytes(_) => {}
        }
        Ok(SchemaType::Range(range.size, Box::new(item)))
    }

    fn note_type(&mut self, ty: &BuiltType<'_>) -> Result<SchemaType, SaveError> {
        match ty {
            BuiltType::Leaf(kind) => Ok(self.leaf_type(*kind)),
            BuiltType::Struct(decl) => Ok(SchemaType::Struct(self.index_struct(*decl)?)),
            BuiltType::Range(size, item) => {
                Ok(SchemaType::Range(*size, Box::new(self.note_type(item)?)))
            }
        }
    }

    fn leaf_type(&mut self, kind: LeafKind) -> SchemaType {
        match kind {
            LeafKind::Enum(id, width) => SchemaType::Enum {
                width,
                schema: self.index_enum(id),
            },
            other => SchemaType::Leaf(other),
        }
    }

    fn index_struct(&mut self, decl: DeclId) -> Result<u32, SaveError> {
        if let Some(&idx) = self.struct_index.get(&decl) {
            return Ok(idx);
        }
        let declaration = self
            .ctx
            .declarations
            .get_struct(decl)
            .ok_or_else(|| SaveError::Bind(BindError::NotBound(decl.to_string())))?;
        let idx = self.structs.len() as u32;
        self.structs.push(NotedStruct {
            decl,
            members: declaration.members.clone(),
            require_all: declaration.occupancy == Occupancy::RequireAll,
            slots: vec![None; declaration.members.len() + 1],
            instances: 0,
            min_members: usize::MAX,
        });
        self.struct_index.insert(decl, idx);
        Ok(idx)
    }

    fn index_enum(&mut self, id: EnumId) -> u32 {
        if let Some(&idx) = self.enum_index.get(&id) {
            return idx;
        }
        let idx = self.enums.len() as u32;
        self.enums.push(id);
        self.enum_index.insert(id, idx);
        idx
    }

    fn inconsistent(&self, decl: DeclId, member: Option<MemberId>) -> SaveError {
        SaveError::InconsistentMember {
            ty: self.ctx.type_name(decl),
            member: match member {
                Some(m) => self.ctx.names.resolve(m.0).to_string(),
                None => "(super)".to_string(),
            },
        }
    }

    /// Emit the schemas in first-noted order.
    pub fn build(self) -> Result<NotedSchemas, SaveError> {
        let mut structs = Vec::with_capacity(self.structs.len());
        let mut decls = Vec::with_capacity(self.structs.len());
        for noted in &self.structs {
            let key = self
                .ctx
                .types
                .struct_key(noted.decl)
                .ok_or_else(|| SaveError::Bind(BindError::NotBound(noted.decl.to_string())))?;
            let mut members = Vec::new();
            for (slot, ty) in noted.slots.iter().enumerate() {
                let Some(ty) = ty else { continue };
                let name = match slot {
                    0 => None,
                    n => Some(noted.members[n - 1].0.index()),
                };
                members.push(SchemaMember {
                    name,
                    ty: ty.clone(),
                });
            }
            let dense = noted.require_all
                || noted.instances == 0
                || noted.min_members == members.len();
            structs.push(StructSchema {
                scope: key.scope.index(),
                name: key.name.index(),
                dense,
                members,
            });
            decls.push(noted.decl);
        }

        let mut enums = Vec::with_capacity(self.enums.len());
        for &id in &self.enums {
            let decl = self.ctx.declarations.get_enum(id).ok_or_else(|| {
                SaveError::Bind(BindError::UnknownEnum(format!("enum#{}", id.index())))
            })?;
            enums.push(EnumSchema {
                scope: decl.ty.scope.index(),
                name: decl.ty.name.index(),
                mode: decl.mode,
                width: decl.width,
                enumerators: decl
                    .enumerators
                    .iter()
                    .map(|e| (e.name.index(), e.constant))
                    .collect(),
            });
        }

        Ok(NotedSchemas {
            batch: SchemaBatch { structs, enums },
            decls,
            index: self.struct_index,
        })
    }
}
