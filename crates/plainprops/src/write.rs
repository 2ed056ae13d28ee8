// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blob writer.
//!
//! Payloads are encoded against the batch schemas: the schema decides
//! whether a struct carries a presence bitmap and in which order members are
//! written. The same encoder serves built value trees (saving) and decoded
//! [`ReadStruct`] trees (re-encoding a parsed text dump).

use crate::bind::RangeSizeType;
use crate::build::{BuiltItems, BuiltRange, BuiltStruct, BuiltType, BuiltValue};
use crate::config::{
    SchemaFormat, END_MAGIC, NAMES_MAGIC, OBJECTS_MAGIC, RECORD_MAGIC, SCHEMAS_MAGIC,
    SCHEMA_ALIGNMENT,
};
use crate::error::{SaveError, WireError};
use crate::ids::Names;
use crate::read::{ReadStruct, ReadValue};
use crate::schema::{NotedSchemas, SchemaBatch, SchemaType, StructSchema};
use crate::ser::{ByteWriter, WireResult};
use std::collections::HashMap;

/// Encode a built struct, then its nested structs as skippable slices.
pub(crate) fn encode_built_struct(
    w: &mut ByteWriter,
    noted: &NotedSchemas,
    built: &BuiltStruct<'_>,
) -> Result<(), SaveError> {
    let idx = *noted.index.get(&built.decl).ok_or_else(|| {
        WireError::InvalidSchema(format!("{} was never noted", built.decl))
    })?;
    let schema = struct_schema(&noted.batch, idx)?;

    let values: Vec<Option<&BuiltValue<'_>>> = schema
        .members
        .iter()
        .map(|sm| {
            built
                .members
                .iter()
                .find(|m| m.name.map(|n| n.0.index()) == sm.name)
                .map(|m| &m.value)
        })
        .collect();
    write_presence(w, schema, values.iter().map(Option::is_some))?;

    for value in values.into_iter().flatten() {
        match value {
            BuiltValue::Leaf(kind, bits) => w.write_leaf(kind.width(), *bits),
            BuiltValue::Struct(inner) => {
                let mut nested = ByteWriter::new();
                encode_built_struct(&mut nested, noted, inner)?;
                w.write_skippable(nested.as_bytes());
            }
            BuiltValue::Range(range) => encode_built_range(w, noted, range)?,
        }
    }
    Ok(())
}

fn encode_built_range(
    w: &mut ByteWriter,
    noted: &NotedSchemas,
    range: &BuiltRange<'_>,
) -> Result<(), SaveError> {
    write_count(w, range.size, range.items.len() as u64);
    match range.items {
        BuiltItems::Leaves(bits) => {
            let BuiltType::Leaf(kind) = range.item else {
                return Err(WireError::InvalidSchema("leaf items of non-leaf range".into()).into());
            };
            for &b in bits {
                w.write_leaf(kind.width(), b);
            }
        }
        BuiltItems::Bytes(bytes) => w.write_bytes(bytes),
        BuiltItems::Structs(items) => {
            for inner in items {
                let mut nested = ByteWriter::new();
                encode_built_struct(&mut nested, noted, inner)?;
                w.write_skippable(nested.as_bytes());
            }
        }
        BuiltItems::Ranges(items) => {
            for inner in items {
                encode_built_range(w, noted, inner)?;
            }
        }
    }
    Ok(())
}

/// Encode a decoded struct against `schemas`.
pub(crate) fn encode_read_struct(
    w: &mut ByteWriter,
    schemas: &SchemaBatch,
    read: &ReadStruct,
) -> WireResult<()> {
    let schema = struct_schema(schemas, read.schema)?;
    let mut values: Vec<Option<&ReadValue>> = vec![None; schema.members.len()];
    for (mi, value) in &read.members {
        let slot = values.get_mut(*mi).ok_or_else(|| {
            WireError::InvalidSchema(format!("member {} out of range", mi))
        })?;
        *slot = Some(value);
    }
    write_presence(w, schema, values.iter().map(Option::is_some))?;
    for (member, value) in schema.members.iter().zip(values) {
        if let Some(value) = value {
            encode_read_value(w, schemas, &member.ty, value)?;
        }
    }
    Ok(())
}

fn encode_read_value(
    w: &mut ByteWriter,
    schemas: &SchemaBatch,
    ty: &SchemaType,
    value: &ReadValue,
) -> WireResult<()> {
    match (ty, value) {
        (SchemaType::Leaf(_) | SchemaType::Enum { .. }, ReadValue::Leaf(bits)) => {
            let width = ty
                .leaf_width()
                .ok_or_else(|| WireError::InvalidSchema("leaf width".into()))?;
            w.write_leaf(width, *bits);
        }
        (SchemaType::Struct(_), ReadValue::Struct(inner)) => {
            let mut nested = ByteWriter::new();
            encode_read_struct(&mut nested, schemas, inner)?;
            w.write_skippable(nested.as_bytes());
        }
        (SchemaType::Range(size, item), ReadValue::Range(items)) => {
            write_count(w, *size, items.len() as u64);
            for inner in items {
                encode_read_value(w, schemas, item, inner)?;
            }
        }
        (_, other) => {
            return Err(WireError::InvalidSchema(format!(
                "{} value for schema type {:?}",
                other.kind_name(),
                ty
            )))
        }
    }
    Ok(())
}

fn struct_schema(schemas: &SchemaBatch, idx: u32) -> WireResult<&StructSchema> {
    schemas
        .structs
        .get(idx as usize)
        .ok_or_else(|| WireError::InvalidSchema(format!("struct index {} out of range", idx)))
}

/// Bitmap for sparse structs; dense structs must have every member.
fn write_presence(
    w: &mut ByteWriter,
    schema: &StructSchema,
    present: impl Iterator<Item = bool>,
) -> WireResult<()> {
    let mut bitmap = vec![0u8; schema.members.len().div_ceil(8)];
    let mut all = true;
    for (i, p) in present.enumerate() {
        if p {
            bitmap[i / 8] |= 1 << (i % 8);
        }
        all &= p;
    }
    if schema.dense {
        if !all {
            return Err(WireError::InvalidSchema(format!(
                "dense struct {} with absent members",
                schema.name
            )));
        }
    } else {
        w.write_bytes(&bitmap);
    }
    Ok(())
}

pub(crate) fn write_count(w: &mut ByteWriter, size: RangeSizeType, count: u64) {
    match size {
        RangeSizeType::Uni | RangeSizeType::U8 => w.write_u8(count as u8),
        RangeSizeType::U16 => w.write_u16(count as u16),
        RangeSizeType::U32 => w.write_u32(count as u32),
        RangeSizeType::U64 => w.write_u64(count),
    }
}

/// Frame schemas and encoded records into a blob.
///
/// `schemas` carries ids of `names`. With StableNames the referenced names
/// are written as a table in first-use walk order and the schemas remapped
/// to table indices.
pub(crate) fn write_blob(
    format: SchemaFormat,
    schemas: &SchemaBatch,
    names: &Names,
    records: &[(u32, Vec<u8>)],
) -> WireResult<Vec<u8>> {
    let mut w = ByteWriter::new();

    let schemas = match format {
        SchemaFormat::StableNames => {
            let mut table: HashMap<u32, u32> = HashMap::new();
            let mut text = Vec::new();
            for raw in schemas.walk_names() {
                if table.contains_key(&raw) {
                    continue;
                }
                let name = names
                    .get(raw)
                    .ok_or_else(|| WireError::InvalidNames(format!("unknown name id {}", raw)))?;
                text.extend_from_slice(name.as_bytes());
                text.push(0);
                table.insert(raw, table.len() as u32);
            }
            w.write_u32(NAMES_MAGIC);
            w.write_skippable(&text);
            schemas.remap_names(|raw| table.get(&raw).copied().unwrap_or(raw))
        }
        SchemaFormat::InMemoryNames => schemas.clone(),
    };

    w.write_u32(SCHEMAS_MAGIC);
    w.align(SCHEMA_ALIGNMENT);
    let mut section = ByteWriter::new();
    schemas.encode(&mut section);
    w.write_u32(section.offset() as u32);
    w.write_bytes(section.as_bytes());

    w.write_u32(OBJECTS_MAGIC);
    for (schema, payload) in records {
        let mut record = ByteWriter::new();
        record.write_u32(RECORD_MAGIC);
        record.write_u32(*schema);
        record.write_bytes(payload);
        w.write_skippable(record.as_bytes());
    }
    w.write_varint(0);
    w.write_u32(END_MAGIC);

    log::debug!(
        "[plainprops] wrote {:?} blob: {} records, {} bytes",
        format,
        records.len(),
        w.offset()
    );
    Ok(w.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::LeafKind;
    use crate::read::read_batch;
    use crate::schema::SchemaMember;

    fn fixture() -> (Names, SchemaBatch) {
        let mut names = Names::new();
        let scope = names.intern("Game").index();
        let name = names.intern("Score").index();
        let points = names.intern("Points").index();
        let batch = SchemaBatch {
            structs: vec![StructSchema {
                scope,
                name,
                dense: true,
                members: vec![SchemaMember {
                    name: Some(points),
                    ty: SchemaType::Leaf(LeafKind::U16),
                }],
            }],
            enums: vec![],
        };
        (names, batch)
    }

    fn record(schemas: &SchemaBatch, points: u64) -> Vec<u8> {
        let mut w = ByteWriter::new();
        encode_read_struct(
            &mut w,
            schemas,
            &ReadStruct {
                schema: 0,
                members: vec![(0, ReadValue::Leaf(points))],
            },
        )
        .expect("encode");
        w.into_inner()
    }

    #[test]
    fn test_stable_blob_framing() {
        let (names, schemas) = fixture();
        let records = vec![(0, record(&schemas, 7)), (0, record(&schemas, 300))];
        let blob = write_blob(SchemaFormat::StableNames, &schemas, &names, &records).expect("blob");
        assert_eq!(&blob[..4], &NAMES_MAGIC.to_le_bytes());
        assert_eq!(&blob[blob.len() - 4..], &END_MAGIC.to_le_bytes());

        let view = read_batch(&blob, SchemaFormat::StableNames).expect("read");
        assert_eq!(
            view.names.as_deref(),
            Some(&["Game".to_string(), "Score".to_string(), "Points".to_string()][..])
        );
        assert_eq!(view.objects.len(), 2);
        let second = view.read_object(1).expect("object");
        assert_eq!(second.members, vec![(0, ReadValue::Leaf(300))]);
    }

    #[test]
    fn test_in_memory_blob_keeps_ids() {
        let (names, schemas) = fixture();
        let blob = write_blob(SchemaFormat::InMemoryNames, &schemas, &names, &[]).expect("blob");
        assert_eq!(&blob[..4], &SCHEMAS_MAGIC.to_le_bytes());
        let view = read_batch(&blob, SchemaFormat::InMemoryNames).expect("read");
        assert!(view.names.is_none());
        assert_eq!(view.schemas, schemas);
        assert!(read_batch(&blob, SchemaFormat::StableNames).is_err());
    }

    #[test]
    fn test_truncation_detected_everywhere() {
        let (names, schemas) = fixture();
        let records = vec![(0, record(&schemas, 1))];
        let blob = write_blob(SchemaFormat::StableNames, &schemas, &names, &records).expect("blob");
        for len in 0..blob.len() {
            assert!(
                read_batch(&blob[..len], SchemaFormat::StableNames).is_err(),
                "prefix of {} bytes accepted",
                len
            );
        }
    }

    #[test]
    fn test_dense_struct_requires_all_members() {
        let (_, schemas) = fixture();
        let mut w = ByteWriter::new();
        let empty = ReadStruct {
            schema: 0,
            members: vec![],
        };
        assert!(encode_read_struct(&mut w, &schemas, &empty).is_err());
    }
}
