// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema section: the partial struct and enum declarations of one batch.
//!
//! # Layout
//!
//! ```text
//! u32 num_structs, u32 num_enums
//! struct: u32 scope, u32 name, u8 flags (bit0 dense), u32 num_members,
//!         (u32 member_name, type)*
//! type:   0 leaf_code | 1 width_code u32 enum | 2 u32 struct | 3 size_code type
//! enum:   u32 scope, u32 name, u8 mode, u8 width, u32 count, (u32 name, u64 constant)*
//! ```
//!
//! Name fields hold either name table indices or process name ids, depending
//! on the batch's [`SchemaFormat`](crate::config::SchemaFormat). The super
//! pseudo-member is named `SUPER_NAME`.

mod builder;

pub use builder::{NotedSchemas, SchemasBuilder};

use crate::bind::RangeSizeType;
use crate::config::SUPER_NAME;
use crate::declaration::EnumMode;
use crate::error::WireError;
use crate::leaf::{LeafKind, LeafWidth};
use crate::ser::{ByteReader, ByteWriter, WireResult};

const TAG_LEAF: u8 = 0;
const TAG_ENUM: u8 = 1;
const TAG_STRUCT: u8 = 2;
const TAG_RANGE: u8 = 3;

const FLAG_DENSE: u8 = 1;

/// Saved type of a member or range item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaType {
    /// Non-enum leaf.
    Leaf(LeafKind),
    Enum { width: LeafWidth, schema: u32 },
    Struct(u32),
    Range(RangeSizeType, Box<SchemaType>),
}

impl SchemaType {
    /// Leaf width, for leaves and enums.
    pub fn leaf_width(&self) -> Option<LeafWidth> {
        match self {
            Self::Leaf(kind) => Some(kind.width()),
            Self::Enum { width, .. } => Some(*width),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaMember {
    /// `None` for the super pseudo-member.
    pub name: Option<u32>,
    pub ty: SchemaType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructSchema {
    pub scope: u32,
    pub name: u32,
    /// No presence bitmap; every member is always written.
    pub dense: bool,
    pub members: Vec<SchemaMember>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumSchema {
    pub scope: u32,
    pub name: u32,
    pub mode: EnumMode,
    pub width: LeafWidth,
    pub enumerators: Vec<(u32, u64)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaBatch {
    pub structs: Vec<StructSchema>,
    pub enums: Vec<EnumSchema>,
}

impl SchemaBatch {
    /// Every name reference in walk order: per struct its scope, name and
    /// member names, then per enum its scope, name and enumerator names.
    pub fn walk_names(&self) -> Vec<u32> {
        let mut out = Vec::new();
        for s in &self.structs {
            out.push(s.scope);
            out.push(s.name);
            out.extend(s.members.iter().filter_map(|m| m.name));
        }
        for e in &self.enums {
            out.push(e.scope);
            out.push(e.name);
            out.extend(e.enumerators.iter().map(|(name, _)| *name));
        }
        out
    }

    /// Copy with every name reference passed through `f`.
    pub fn remap_names(&self, f: impl Fn(u32) -> u32) -> SchemaBatch {
        SchemaBatch {
            structs: self
                .structs
                .iter()
                .map(|s| StructSchema {
                    scope: f(s.scope),
                    name: f(s.name),
                    dense: s.dense,
                    members: s
                        .members
                        .iter()
                        .map(|m| SchemaMember {
                            name: m.name.map(&f),
                            ty: m.ty.clone(),
                        })
                        .collect(),
                })
                .collect(),
            enums: self
                .enums
                .iter()
                .map(|e| EnumSchema {
                    scope: f(e.scope),
                    name: f(e.name),
                    mode: e.mode,
                    width: e.width,
                    enumerators: e.enumerators.iter().map(|(n, c)| (f(*n), *c)).collect(),
                })
                .collect(),
        }
    }

    pub fn encode(&self, w: &mut ByteWriter) {
        w.write_u32(self.structs.len() as u32);
        w.write_u32(self.enums.len() as u32);
        for s in &self.structs {
            w.write_u32(s.scope);
            w.write_u32(s.name);
            w.write_u8(if s.dense { FLAG_DENSE } else { 0 });
            w.write_u32(s.members.len() as u32);
            for m in &s.members {
                w.write_u32(m.name.unwrap_or(SUPER_NAME));
                encode_type(w, &m.ty);
            }
        }
        for e in &self.enums {
            w.write_u32(e.scope);
            w.write_u32(e.name);
            w.write_u8(match e.mode {
                EnumMode::Flat => 0,
                EnumMode::Flag => 1,
            });
            w.write_u8(e.width.code());
            w.write_u32(e.enumerators.len() as u32);
            for (name, constant) in &e.enumerators {
                w.write_u32(*name);
                w.write_u64(*constant);
            }
        }
    }

    pub fn decode(r: &mut ByteReader<'_>) -> WireResult<Self> {
        let num_structs = r.read_u32()? as usize;
        let num_enums = r.read_u32()? as usize;
        let mut structs = Vec::with_capacity(num_structs.min(r.remaining()));
        for _ in 0..num_structs {
            let scope = r.read_u32()?;
            let name = r.read_u32()?;
            let flags = r.read_u8()?;
            let num_members = r.read_u32()? as usize;
            let mut members = Vec::with_capacity(num_members.min(r.remaining()));
            for _ in 0..num_members {
                let raw = r.read_u32()?;
                let ty = decode_type(r, 0)?;
                members.push(SchemaMember {
                    name: (raw != SUPER_NAME).then_some(raw),
                    ty,
                });
            }
            structs.push(StructSchema {
                scope,
                name,
                dense: flags & FLAG_DENSE != 0,
                members,
            });
        }
        let mut enums = Vec::with_capacity(num_enums.min(r.remaining()));
        for _ in 0..num_enums {
            let scope = r.read_u32()?;
            let name = r.read_u32()?;
            let mode = match r.read_u8()? {
                0 => EnumMode::Flat,
                1 => EnumMode::Flag,
                other => return Err(invalid(format!("enum mode {}", other))),
            };
            let width = LeafWidth::from_code(r.read_u8()?)
                .ok_or_else(|| invalid("enum width".to_string()))?;
            let count = r.read_u32()? as usize;
            let mut enumerators = Vec::with_capacity(count.min(r.remaining()));
            for _ in 0..count {
                let name = r.read_u32()?;
                let constant = r.read_u64()?;
                enumerators.push((name, constant));
            }
            enums.push(EnumSchema {
                scope,
                name,
                mode,
                width,
                enumerators,
            });
        }
        Ok(Self { structs, enums })
    }

    /// Check cross references. `num_names` bounds name indices when a name
    /// table is present.
    pub fn validate(&self, num_names: Option<usize>) -> WireResult<()> {
        let check_name = |raw: u32| match num_names {
            Some(n) if raw as usize >= n => Err(WireError::InvalidNames(format!(
                "name index {} out of {}",
                raw, n
            ))),
            _ => Ok(()),
        };
        for s in &self.structs {
            check_name(s.scope)?;
            check_name(s.name)?;
            for m in &s.members {
                if let Some(name) = m.name {
                    check_name(name)?;
                }
                self.validate_type(&m.ty)?;
            }
        }
        for e in &self.enums {
            check_name(e.scope)?;
            check_name(e.name)?;
            for (name, constant) in &e.enumerators {
                check_name(*name)?;
                if constant & !e.width.mask() != 0 {
                    return Err(invalid(format!("enumerator {:#x} exceeds width", constant)));
                }
            }
        }
        Ok(())
    }

    fn validate_type(&self, ty: &SchemaType) -> WireResult<()> {
        match ty {
            SchemaType::Leaf(_) => Ok(()),
            SchemaType::Enum { width, schema } => match self.enums.get(*schema as usize) {
                Some(e) if e.width == *width => Ok(()),
                Some(_) => Err(invalid(format!("enum {} width mismatch", schema))),
                None => Err(invalid(format!("enum index {} out of range", schema))),
            },
            SchemaType::Struct(idx) if (*idx as usize) < self.structs.len() => Ok(()),
            SchemaType::Struct(idx) => Err(invalid(format!("struct index {} out of range", idx))),
            SchemaType::Range(_, item) => self.validate_type(item),
        }
    }
}

fn invalid(reason: String) -> WireError {
    WireError::InvalidSchema(reason)
}

fn encode_type(w: &mut ByteWriter, ty: &SchemaType) {
    match ty {
        SchemaType::Leaf(kind) => {
            w.write_u8(TAG_LEAF);
            w.write_u8(kind.code().unwrap_or(0));
        }
        SchemaType::Enum { width, schema } => {
            w.write_u8(TAG_ENUM);
            w.write_u8(width.code());
            w.write_u32(*schema);
        }
        SchemaType::Struct(idx) => {
            w.write_u8(TAG_STRUCT);
            w.write_u32(*idx);
        }
        SchemaType::Range(size, item) => {
            w.write_u8(TAG_RANGE);
            w.write_u8(size.code());
            encode_type(w, item);
        }
    }
}

fn decode_type(r: &mut ByteReader<'_>, depth: usize) -> WireResult<SchemaType> {
    if depth > crate::config::MAX_NESTING_DEPTH {
        return Err(invalid("range nesting too deep".to_string()));
    }
    match r.read_u8()? {
        TAG_LEAF => {
            let code = r.read_u8()?;
            LeafKind::from_code(code)
                .map(SchemaType::Leaf)
                .ok_or_else(|| invalid(format!("leaf code {}", code)))
        }
        TAG_ENUM => {
            let width = LeafWidth::from_code(r.read_u8()?)
                .ok_or_else(|| invalid("enum width".to_string()))?;
            let schema = r.read_u32()?;
            Ok(SchemaType::Enum { width, schema })
        }
        TAG_STRUCT => Ok(SchemaType::Struct(r.read_u32()?)),
        TAG_RANGE => {
            let code = r.read_u8()?;
            let size = RangeSizeType::from_code(code)
                .ok_or_else(|| invalid(format!("size code {}", code)))?;
            let item = decode_type(r, depth + 1)?;
            Ok(SchemaType::Range(size, Box::new(item)))
        }
        tag => Err(invalid(format!("type tag {}", tag))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SchemaBatch {
        SchemaBatch {
            structs: vec![
                StructSchema {
                    scope: 0,
                    name: 1,
                    dense: false,
                    members: vec![
                        SchemaMember {
                            name: None,
                            ty: SchemaType::Struct(1),
                        },
                        SchemaMember {
                            name: Some(2),
                            ty: SchemaType::Range(
                                RangeSizeType::U32,
                                Box::new(SchemaType::Leaf(LeafKind::U8)),
                            ),
                        },
                        SchemaMember {
                            name: Some(3),
                            ty: SchemaType::Enum {
                                width: LeafWidth::B8,
                                schema: 0,
                            },
                        },
                    ],
                },
                StructSchema {
                    scope: 0,
                    name: 4,
                    dense: true,
                    members: vec![],
                },
            ],
            enums: vec![EnumSchema {
                scope: 0,
                name: 5,
                mode: EnumMode::Flag,
                width: LeafWidth::B8,
                enumerators: vec![(6, 1), (7, 2)],
            }],
        }
    }

    #[test]
    fn test_encode_decode() {
        let batch = sample();
        let mut w = ByteWriter::new();
        batch.encode(&mut w);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        let decoded = SchemaBatch::decode(&mut r).expect("decode");
        r.finish().expect("consumed");
        assert_eq!(decoded, batch);
        decoded.validate(Some(8)).expect("valid");
    }

    #[test]
    fn test_walk_order_skips_super() {
        assert_eq!(sample().walk_names(), vec![0, 1, 2, 3, 0, 4, 0, 5, 6, 7]);
    }

    #[test]
    fn test_validate_rejects_bad_refs() {
        let mut batch = sample();
        assert!(matches!(batch.validate(Some(7)), Err(WireError::InvalidNames(_))));
        batch.structs[1].members.push(SchemaMember {
            name: Some(2),
            ty: SchemaType::Struct(9),
        });
        assert!(matches!(batch.validate(None), Err(WireError::InvalidSchema(_))));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let mut w = ByteWriter::new();
        w.write_u32(1);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u32(0);
        w.write_u8(0);
        w.write_u32(1);
        w.write_u32(2);
        w.write_u8(9);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            SchemaBatch::decode(&mut r),
            Err(WireError::InvalidSchema(_))
        ));
    }
}
