// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML debug dump of a batch.
//!
//! ```yaml
//! structs:
//! - scope: Game
//!   name: Item
//!   dense: false
//!   members:
//!   - name: Count
//!     type: !leaf I32
//! enums: []
//! objects:
//! - type: Game::Item
//!   value:
//!     Count: 3
//! ```
//!
//! Leaves print as numbers, enums by enumerator name (`A | B` for flags), U8
//! ranges as strings when they hold UTF-8 and NaN floats as `nan:0x<bits>`.
//! Only StableNames blobs can be printed. Parsing a printed dump rebuilds the
//! identical blob.

use crate::bind::RangeSizeType;
use crate::config::SchemaFormat;
use crate::declaration::EnumMode;
use crate::error::TextError;
use crate::ids::{join_type_name, Names};
use crate::leaf::{LeafKind, LeafWidth};
use crate::read::{BatchView, ReadStruct, ReadValue};
use crate::schema::{EnumSchema, SchemaBatch, SchemaMember, SchemaType, StructSchema};
use crate::ser::ByteWriter;
use crate::write::{encode_read_struct, write_blob};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Number, Value as Yaml};
use std::collections::HashMap;

/// Member key of the super pseudo-member.
pub const SUPER_KEY: &str = "(super)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchDump {
    pub structs: Vec<StructDump>,
    pub enums: Vec<EnumDump>,
    pub objects: Vec<ObjectDump>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDump {
    pub scope: String,
    pub name: String,
    pub dense: bool,
    pub members: Vec<MemberDump>,
}

impl StructDump {
    pub fn full_name(&self) -> String {
        join_type_name(&self.scope, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDump {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeDump,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeDump {
    Leaf(String),
    /// Enum by full type name.
    Enum(String),
    /// Struct by full type name.
    Struct(String),
    Range {
        size: RangeSizeType,
        item: Box<TypeDump>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDump {
    pub scope: String,
    pub name: String,
    pub mode: EnumMode,
    pub width: LeafWidth,
    pub enumerators: Vec<EnumeratorDump>,
}

impl EnumDump {
    pub fn full_name(&self) -> String {
        join_type_name(&self.scope, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumeratorDump {
    pub name: String,
    pub value: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDump {
    #[serde(rename = "type")]
    pub ty: String,
    pub value: Yaml,
}

fn syntax(msg: impl Into<String>) -> TextError {
    TextError::Syntax(msg.into())
}

// =======================================================================
// Printing
// =======================================================================

struct Printer<'v> {
    view: &'v BatchView<'v>,
    names: &'v [String],
}

impl Printer<'_> {
    fn name(&self, raw: u32) -> Result<&str, TextError> {
        self.names
            .get(raw as usize)
            .map(String::as_str)
            .ok_or_else(|| syntax(format!("name index {} out of range", raw)))
    }

    fn struct_name(&self, idx: u32) -> Result<String, TextError> {
        let s = self
            .view
            .schemas
            .structs
            .get(idx as usize)
            .ok_or_else(|| syntax(format!("struct {} out of range", idx)))?;
        Ok(join_type_name(self.name(s.scope)?, self.name(s.name)?))
    }

    fn enum_schema(&self, idx: u32) -> Result<&EnumSchema, TextError> {
        self.view
            .schemas
            .enums
            .get(idx as usize)
            .ok_or_else(|| syntax(format!("enum {} out of range", idx)))
    }

    fn type_dump(&self, ty: &SchemaType) -> Result<TypeDump, TextError> {
        Ok(match ty {
            SchemaType::Leaf(kind) => TypeDump::Leaf(kind.name().to_string()),
            SchemaType::Enum { schema, .. } => {
                let e = self.enum_schema(*schema)?;
                TypeDump::Enum(join_type_name(self.name(e.scope)?, self.name(e.name)?))
            }
            SchemaType::Struct(idx) => TypeDump::Struct(self.struct_name(*idx)?),
            SchemaType::Range(size, item) => TypeDump::Range {
                size: *size,
                item: Box::new(self.type_dump(item)?),
            },
        })
    }

    fn struct_dump(&self, s: &StructSchema) -> Result<StructDump, TextError> {
        let members = s
            .members
            .iter()
            .map(|m| {
                Ok(MemberDump {
                    name: match m.name {
                        Some(raw) => self.name(raw)?.to_string(),
                        None => SUPER_KEY.to_string(),
                    },
                    ty: self.type_dump(&m.ty)?,
                })
            })
            .collect::<Result<Vec<_>, TextError>>()?;
        Ok(StructDump {
            scope: self.name(s.scope)?.to_string(),
            name: self.name(s.name)?.to_string(),
            dense: s.dense,
            members,
        })
    }

    fn enum_dump(&self, e: &EnumSchema) -> Result<EnumDump, TextError> {
        Ok(EnumDump {
            scope: self.name(e.scope)?.to_string(),
            name: self.name(e.name)?.to_string(),
            mode: e.mode,
            width: e.width,
            enumerators: e
                .enumerators
                .iter()
                .map(|(raw, value)| {
                    Ok(EnumeratorDump {
                        name: self.name(*raw)?.to_string(),
                        value: *value,
                    })
                })
                .collect::<Result<Vec<_>, TextError>>()?,
        })
    }

    fn struct_value(&self, read: &ReadStruct) -> Result<Yaml, TextError> {
        let schema = self
            .view
            .schemas
            .structs
            .get(read.schema as usize)
            .ok_or_else(|| syntax(format!("struct {} out of range", read.schema)))?;
        let mut map = Mapping::new();
        for (mi, value) in &read.members {
            let member = schema
                .members
                .get(*mi)
                .ok_or_else(|| syntax(format!("member {} out of range", mi)))?;
            let key = match member.name {
                Some(raw) => self.name(raw)?.to_string(),
                None => SUPER_KEY.to_string(),
            };
            map.insert(Yaml::String(key), self.value(&member.ty, value)?);
        }
        Ok(Yaml::Mapping(map))
    }

    fn value(&self, ty: &SchemaType, value: &ReadValue) -> Result<Yaml, TextError> {
        match (ty, value) {
            (SchemaType::Leaf(kind), ReadValue::Leaf(bits)) => Ok(leaf_yaml(*kind, *bits)),
            (SchemaType::Enum { schema, .. }, ReadValue::Leaf(bits)) => {
                self.enum_yaml(self.enum_schema(*schema)?, *bits)
            }
            (SchemaType::Struct(_), ReadValue::Struct(inner)) => self.struct_value(inner),
            (SchemaType::Range(_, item), ReadValue::Range(items)) => {
                if **item == SchemaType::Leaf(LeafKind::U8) {
                    let bytes: Option<Vec<u8>> = items
                        .iter()
                        .map(|i| match i {
                            ReadValue::Leaf(b) => Some(*b as u8),
                            _ => None,
                        })
                        .collect();
                    if let Some(text) = bytes.and_then(|b| String::from_utf8(b).ok()) {
                        return Ok(Yaml::String(text));
                    }
                }
                items
                    .iter()
                    .map(|i| self.value(item, i))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Yaml::Sequence)
            }
            (_, other) => Err(syntax(format!(
                "{} value for schema type {:?}",
                other.kind_name(),
                ty
            ))),
        }
    }

    fn enum_yaml(&self, e: &EnumSchema, bits: u64) -> Result<Yaml, TextError> {
        if let Some((raw, _)) = e.enumerators.iter().find(|(_, c)| *c == bits) {
            return Ok(Yaml::String(self.name(*raw)?.to_string()));
        }
        if e.mode == EnumMode::Flag && bits != 0 {
            let mut parts = Vec::new();
            let mut covered = 0u64;
            for (raw, constant) in &e.enumerators {
                if *constant != 0 && bits & constant == *constant {
                    parts.push(self.name(*raw)?);
                    covered |= constant;
                }
            }
            if covered == bits {
                return Ok(Yaml::String(parts.join(" | ")));
            }
        }
        Ok(Yaml::Number(Number::from(bits)))
    }
}

fn leaf_yaml(kind: LeafKind, bits: u64) -> Yaml {
    match kind {
        LeafKind::Bool => Yaml::Bool(bits != 0),
        LeafKind::I8 => Yaml::Number(Number::from(i64::from(bits as u8 as i8))),
        LeafKind::I16 => Yaml::Number(Number::from(i64::from(bits as u16 as i16))),
        LeafKind::I32 => Yaml::Number(Number::from(i64::from(bits as u32 as i32))),
        LeafKind::I64 => Yaml::Number(Number::from(bits as i64)),
        LeafKind::F32 => {
            let f = f32::from_bits(bits as u32);
            if f.is_nan() {
                Yaml::String(format!("nan:{:#010x}", bits as u32))
            } else {
                Yaml::Number(Number::from(f64::from(f)))
            }
        }
        LeafKind::F64 => {
            let f = f64::from_bits(bits);
            if f.is_nan() {
                Yaml::String(format!("nan:{:#018x}", bits))
            } else {
                Yaml::Number(Number::from(f))
            }
        }
        _ => Yaml::Number(Number::from(bits)),
    }
}

/// Structured dump of a StableNames batch.
pub fn dump_batch(view: &BatchView<'_>) -> Result<BatchDump, TextError> {
    let names = view.names.as_deref().ok_or(TextError::MissingNames)?;
    let printer = Printer { view, names };
    let structs = view
        .schemas
        .structs
        .iter()
        .map(|s| printer.struct_dump(s))
        .collect::<Result<Vec<_>, _>>()?;
    let enums = view
        .schemas
        .enums
        .iter()
        .map(|e| printer.enum_dump(e))
        .collect::<Result<Vec<_>, _>>()?;
    let mut objects = Vec::with_capacity(view.objects.len());
    for (i, record) in view.objects.iter().enumerate() {
        let read = view.read_object(i)?;
        objects.push(ObjectDump {
            ty: printer.struct_name(record.schema)?,
            value: printer.struct_value(&read)?,
        });
    }
    Ok(BatchDump {
        structs,
        enums,
        objects,
    })
}

/// Render a StableNames batch as YAML.
pub fn print_yaml(view: &BatchView<'_>) -> Result<String, TextError> {
    if view.format != SchemaFormat::StableNames {
        return Err(TextError::MissingNames);
    }
    Ok(serde_yaml::to_string(&dump_batch(view)?)?)
}

// =======================================================================
// Parsing
// =======================================================================

struct Parser<'d> {
    schemas: SchemaBatch,
    names: Names,
    structs: HashMap<String, u32>,
    enums: HashMap<String, u32>,
    dump: &'d BatchDump,
}

impl<'d> Parser<'d> {
    /// Intern names in schema walk order so ids match table indices.
    fn new(dump: &'d BatchDump) -> Result<Self, TextError> {
        let mut names = Names::new();
        let mut structs = HashMap::new();
        let mut enums = HashMap::new();
        for (i, s) in dump.structs.iter().enumerate() {
            names.intern(&s.scope);
            names.intern(&s.name);
            for m in &s.members {
                if m.name != SUPER_KEY {
                    names.intern(&m.name);
                }
            }
            if structs.insert(s.full_name(), i as u32).is_some() {
                return Err(syntax(format!("struct {} listed twice", s.full_name())));
            }
        }
        for (i, e) in dump.enums.iter().enumerate() {
            names.intern(&e.scope);
            names.intern(&e.name);
            for en in &e.enumerators {
                names.intern(&en.name);
            }
            if enums.insert(e.full_name(), i as u32).is_some() {
                return Err(syntax(format!("enum {} listed twice", e.full_name())));
            }
        }
        let mut parser = Self {
            schemas: SchemaBatch::default(),
            names,
            structs,
            enums,
            dump,
        };
        parser.build_schemas()?;
        Ok(parser)
    }

    fn id(&self, name: &str) -> Result<u32, TextError> {
        self.names
            .find(name)
            .map(|n| n.index())
            .ok_or_else(|| syntax(format!("name {} not interned", name)))
    }

    fn build_schemas(&mut self) -> Result<(), TextError> {
        let mut structs = Vec::with_capacity(self.dump.structs.len());
        for s in &self.dump.structs {
            let members = s
                .members
                .iter()
                .map(|m| {
                    Ok(SchemaMember {
                        name: if m.name == SUPER_KEY {
                            None
                        } else {
                            Some(self.id(&m.name)?)
                        },
                        ty: self.schema_type(&m.ty)?,
                    })
                })
                .collect::<Result<Vec<_>, TextError>>()?;
            structs.push(StructSchema {
                scope: self.id(&s.scope)?,
                name: self.id(&s.name)?,
                dense: s.dense,
                members,
            });
        }
        let mut enums = Vec::with_capacity(self.dump.enums.len());
        for e in &self.dump.enums {
            enums.push(EnumSchema {
                scope: self.id(&e.scope)?,
                name: self.id(&e.name)?,
                mode: e.mode,
                width: e.width,
                enumerators: e
                    .enumerators
                    .iter()
                    .map(|en| Ok((self.id(&en.name)?, en.value)))
                    .collect::<Result<Vec<_>, TextError>>()?,
            });
        }
        self.schemas = SchemaBatch { structs, enums };
        self.schemas.validate(Some(self.names.len()))?;
        Ok(())
    }

    fn schema_type(&self, ty: &TypeDump) -> Result<SchemaType, TextError> {
        Ok(match ty {
            TypeDump::Leaf(name) => SchemaType::Leaf(
                LeafKind::from_name(name).ok_or_else(|| syntax(format!("unknown leaf {}", name)))?,
            ),
            TypeDump::Enum(name) => {
                let schema = *self
                    .enums
                    .get(name)
                    .ok_or_else(|| syntax(format!("unknown enum {}", name)))?;
                SchemaType::Enum {
                    width: self.dump.enums[schema as usize].width,
                    schema,
                }
            }
            TypeDump::Struct(name) => SchemaType::Struct(
                *self
                    .structs
                    .get(name)
                    .ok_or_else(|| syntax(format!("unknown struct {}", name)))?,
            ),
            TypeDump::Range { size, item } => {
                SchemaType::Range(*size, Box::new(self.schema_type(item)?))
            }
        })
    }

    fn read_struct(&self, idx: u32, value: &Yaml) -> Result<ReadStruct, TextError> {
        let Yaml::Mapping(map) = value else {
            return Err(syntax("struct value must be a mapping"));
        };
        let schema = &self.schemas.structs[idx as usize];
        let dump = &self.dump.structs[idx as usize];
        let mut members = Vec::with_capacity(map.len());
        for (key, member_value) in map {
            let key = key
                .as_str()
                .ok_or_else(|| syntax("member keys must be strings"))?;
            let mi = dump
                .members
                .iter()
                .position(|m| m.name == key)
                .ok_or_else(|| syntax(format!("{} has no member {}", dump.full_name(), key)))?;
            members.push((mi, self.read_value(&schema.members[mi].ty, member_value)?));
        }
        members.sort_by_key(|(mi, _)| *mi);
        Ok(ReadStruct { schema: idx, members })
    }

    fn read_value(&self, ty: &SchemaType, value: &Yaml) -> Result<ReadValue, TextError> {
        match ty {
            SchemaType::Leaf(kind) => Ok(ReadValue::Leaf(parse_leaf(*kind, value)?)),
            SchemaType::Enum { schema, width } => {
                let e = &self.dump.enums[*schema as usize];
                let bits = match value {
                    Yaml::String(text) => text
                        .split(" | ")
                        .map(|part| {
                            e.enumerators
                                .iter()
                                .find(|en| en.name == part.trim())
                                .map(|en| en.value)
                                .ok_or_else(|| syntax(format!("{} has no enumerator {}", e.full_name(), part)))
                        })
                        .try_fold(0u64, |acc, v| v.map(|v| acc | v))?,
                    other => number_u64(other)?,
                };
                Ok(ReadValue::Leaf(bits & width.mask()))
            }
            SchemaType::Struct(idx) => Ok(ReadValue::Struct(self.read_struct(*idx, value)?)),
            SchemaType::Range(size, item) => {
                let items = match value {
                    Yaml::String(text) if **item == SchemaType::Leaf(LeafKind::U8) => {
                        text.bytes().map(|b| ReadValue::Leaf(u64::from(b))).collect()
                    }
                    Yaml::Sequence(items) => items
                        .iter()
                        .map(|i| self.read_value(item, i))
                        .collect::<Result<Vec<_>, _>>()?,
                    _ => return Err(syntax("range value must be a sequence")),
                };
                if items.len() as u64 > (*size).max() {
                    return Err(syntax(format!(
                        "{} items exceed {:?} range limit {}",
                        items.len(),
                        size,
                        (*size).max()
                    )));
                }
                Ok(ReadValue::Range(items))
            }
        }
    }
}

fn number_u64(value: &Yaml) -> Result<u64, TextError> {
    value
        .as_u64()
        .ok_or_else(|| syntax(format!("expected unsigned number, got {:?}", value)))
}

fn parse_leaf(kind: LeafKind, value: &Yaml) -> Result<u64, TextError> {
    let mask = kind.width().mask();
    match kind {
        LeafKind::Bool => value
            .as_bool()
            .map(u64::from)
            .ok_or_else(|| syntax("expected bool")),
        LeafKind::I8 | LeafKind::I16 | LeafKind::I32 | LeafKind::I64 => value
            .as_i64()
            .map(|v| v as u64 & mask)
            .ok_or_else(|| syntax(format!("expected integer, got {:?}", value))),
        LeafKind::F32 | LeafKind::F64 => {
            if let Some(text) = value.as_str() {
                let hex = text
                    .strip_prefix("nan:0x")
                    .ok_or_else(|| syntax(format!("bad float {}", text)))?;
                return u64::from_str_radix(hex, 16)
                    .map(|b| b & mask)
                    .map_err(|_| syntax(format!("bad float {}", text)));
            }
            let f = value
                .as_f64()
                .ok_or_else(|| syntax(format!("expected float, got {:?}", value)))?;
            Ok(match kind {
                LeafKind::F32 => u64::from((f as f32).to_bits()),
                _ => f.to_bits(),
            })
        }
        _ => Ok(number_u64(value)? & mask),
    }
}

/// Rebuild a StableNames blob from a printed dump.
pub fn parse_yaml(text: &str) -> Result<Vec<u8>, TextError> {
    let dump: BatchDump = serde_yaml::from_str(text)?;
    let parser = Parser::new(&dump)?;
    let mut records = Vec::with_capacity(dump.objects.len());
    for object in &dump.objects {
        let idx = *parser
            .structs
            .get(&object.ty)
            .ok_or_else(|| syntax(format!("unknown object type {}", object.ty)))?;
        let read = parser.read_struct(idx, &object.value)?;
        let mut w = ByteWriter::new();
        encode_read_struct(&mut w, &parser.schemas, &read)?;
        records.push((idx, w.into_inner()));
    }
    Ok(write_blob(
        SchemaFormat::StableNames,
        &parser.schemas,
        &parser.names,
        &records,
    )?)
}
