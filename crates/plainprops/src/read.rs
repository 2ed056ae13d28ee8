// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Blob reader.
//!
//! [`read_batch`] validates the section framing, decodes the name table and
//! schemas, and slices out the object records without touching their
//! payloads. [`BatchView::read_object`] decodes one payload into a
//! [`ReadStruct`] tree, checked against the schemas.

use crate::bind::RangeSizeType;
use crate::config::{
    SchemaFormat, END_MAGIC, MAX_NESTING_DEPTH, NAMES_MAGIC, OBJECTS_MAGIC, RECORD_MAGIC,
    SCHEMAS_MAGIC, SCHEMA_ALIGNMENT,
};
use crate::error::WireError;
use crate::schema::{SchemaBatch, SchemaType};
use crate::ser::{ByteReader, WireResult};

/// One object record.
#[derive(Debug, Clone, Copy)]
pub struct ObjectRecord<'b> {
    /// Struct schema index.
    pub schema: u32,
    pub payload: &'b [u8],
    /// Absolute offset of the payload.
    pub offset: usize,
}

/// Parsed framing of a blob.
#[derive(Debug, Clone)]
pub struct BatchView<'b> {
    bytes: &'b [u8],
    pub format: SchemaFormat,
    /// Name table, StableNames only.
    pub names: Option<Vec<String>>,
    pub schemas: SchemaBatch,
    pub objects: Vec<ObjectRecord<'b>>,
}

/// Decoded member or range item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadValue {
    Leaf(u64),
    Struct(ReadStruct),
    Range(Vec<ReadValue>),
}

impl ReadValue {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Leaf(_) => "Leaf",
            Self::Struct(_) => "Struct",
            Self::Range(_) => "Range",
        }
    }
}

/// Decoded struct: present members by schema member index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadStruct {
    pub schema: u32,
    pub members: Vec<(usize, ReadValue)>,
}

/// Schema format of a blob, from its first magic.
pub fn detect_format(bytes: &[u8]) -> WireResult<SchemaFormat> {
    let mut r = ByteReader::new(bytes);
    match r.read_u32()? {
        NAMES_MAGIC => Ok(SchemaFormat::StableNames),
        SCHEMAS_MAGIC => Ok(SchemaFormat::InMemoryNames),
        found => Err(WireError::BadMagic {
            offset: 0,
            expected: SCHEMAS_MAGIC,
            found,
        }),
    }
}

/// Validate the framing of a blob written with `format`.
pub fn read_batch(bytes: &[u8], format: SchemaFormat) -> WireResult<BatchView<'_>> {
    let mut r = ByteReader::new(bytes);

    let names = match format {
        SchemaFormat::StableNames => {
            r.expect_magic(NAMES_MAGIC)?;
            let table = r.read_skippable()?;
            Some(decode_names(table, r.position() - table.len())?)
        }
        SchemaFormat::InMemoryNames => None,
    };

    r.expect_magic(SCHEMAS_MAGIC)?;
    r.align(SCHEMA_ALIGNMENT)?;
    let size = r.read_u32()? as usize;
    let section = r.read_bytes(size)?;
    let mut sr = r.sub(section);
    let schemas = SchemaBatch::decode(&mut sr)?;
    sr.finish()?;
    schemas.validate(names.as_ref().map(Vec::len))?;

    r.expect_magic(OBJECTS_MAGIC)?;
    let mut objects = Vec::new();
    loop {
        let record = r.read_skippable()?;
        if record.is_empty() {
            break;
        }
        let mut rr = r.sub(record);
        rr.expect_magic(RECORD_MAGIC)?;
        let offset = rr.position();
        let schema = rr.read_u32()?;
        if schema as usize >= schemas.structs.len() {
            return Err(WireError::InvalidSchema(format!(
                "record at {} references struct {} of {}",
                offset,
                schema,
                schemas.structs.len()
            )));
        }
        let payload = rr.read_bytes(rr.remaining())?;
        objects.push(ObjectRecord {
            schema,
            payload,
            offset: offset + 4,
        });
    }
    r.expect_magic(END_MAGIC)?;
    r.finish()?;

    log::debug!(
        "[plainprops] read batch: {} structs, {} enums, {} objects",
        schemas.structs.len(),
        schemas.enums.len(),
        objects.len()
    );
    Ok(BatchView {
        bytes,
        format,
        names,
        schemas,
        objects,
    })
}

fn decode_names(table: &[u8], offset: usize) -> WireResult<Vec<String>> {
    if table.is_empty() {
        return Ok(Vec::new());
    }
    let Some((&0, body)) = table.split_last() else {
        return Err(WireError::InvalidNames(format!(
            "table at {} is not NUL-terminated",
            offset
        )));
    };
    body.split(|&b| b == 0)
        .map(|raw| {
            std::str::from_utf8(raw)
                .map(str::to_string)
                .map_err(|_| WireError::InvalidNames(format!("invalid UTF-8 in table at {}", offset)))
        })
        .collect()
}

impl<'b> BatchView<'b> {
    /// The whole blob.
    pub fn bytes(&self) -> &'b [u8] {
        self.bytes
    }

    /// Name `raw` from the table.
    pub fn name(&self, raw: u32) -> Option<&str> {
        self.names.as_ref()?.get(raw as usize).map(String::as_str)
    }

    /// Decode object `i`.
    pub fn read_object(&self, i: usize) -> WireResult<ReadStruct> {
        let record = self.objects.get(i).ok_or_else(|| WireError::InvalidPayload {
            offset: self.bytes.len(),
            reason: format!("object {} of {}", i, self.objects.len()),
        })?;
        let mut r = ByteReader::new(self.bytes).sub(record.payload);
        let read = read_struct(&self.schemas, record.schema, &mut r, 0)?;
        r.finish()?;
        Ok(read)
    }
}

/// Decode a struct payload of schema `idx`.
pub fn read_struct(
    schemas: &SchemaBatch,
    idx: u32,
    r: &mut ByteReader<'_>,
    depth: usize,
) -> WireResult<ReadStruct> {
    if depth > MAX_NESTING_DEPTH {
        return Err(WireError::InvalidPayload {
            offset: r.position(),
            reason: "nesting too deep".to_string(),
        });
    }
    let schema = schemas
        .structs
        .get(idx as usize)
        .ok_or_else(|| WireError::InvalidSchema(format!("struct index {} out of range", idx)))?;

    let n = schema.members.len();
    let present: Vec<bool> = if schema.dense {
        vec![true; n]
    } else {
        let bitmap = r.read_bytes(n.div_ceil(8))?;
        (0..n).map(|i| bitmap[i / 8] & (1 << (i % 8)) != 0).collect()
    };

    let mut members = Vec::with_capacity(n);
    for (i, member) in schema.members.iter().enumerate() {
        if present[i] {
            members.push((i, read_value(schemas, &member.ty, r, depth)?));
        }
    }
    Ok(ReadStruct { schema: idx, members })
}

fn read_value(
    schemas: &SchemaBatch,
    ty: &SchemaType,
    r: &mut ByteReader<'_>,
    depth: usize,
) -> WireResult<ReadValue> {
    match ty {
        SchemaType::Leaf(_) | SchemaType::Enum { .. } => {
            let width = ty.leaf_width().ok_or_else(|| WireError::InvalidSchema("leaf width".into()))?;
            Ok(ReadValue::Leaf(r.read_leaf(width)?))
        }
        SchemaType::Struct(idx) => {
            let slice = r.read_skippable()?;
            let mut sub = r.sub(slice);
            let read = read_struct(schemas, *idx, &mut sub, depth + 1)?;
            sub.finish()?;
            Ok(ReadValue::Struct(read))
        }
        SchemaType::Range(size, item) => {
            let offset = r.position();
            let count = read_count(r, *size)?;
            // every item takes at least one byte
            if count > r.remaining() as u64 {
                return Err(WireError::Truncated {
                    offset,
                    needed: usize::try_from(count).unwrap_or(usize::MAX),
                    available: r.remaining(),
                });
            }
            let mut items = Vec::with_capacity(count as usize);
            for _ in 0..count {
                items.push(read_value(schemas, item, r, depth + 1)?);
            }
            Ok(ReadValue::Range(items))
        }
    }
}

/// Item count in its size type.
pub fn read_count(r: &mut ByteReader<'_>, size: RangeSizeType) -> WireResult<u64> {
    let offset = r.position();
    let count = match size {
        RangeSizeType::Uni | RangeSizeType::U8 => u64::from(r.read_u8()?),
        RangeSizeType::U16 => u64::from(r.read_u16()?),
        RangeSizeType::U32 => u64::from(r.read_u32()?),
        RangeSizeType::U64 => r.read_u64()?,
    };
    if size == RangeSizeType::Uni && count > 1 {
        return Err(WireError::InvalidPayload {
            offset,
            reason: format!("optional holds {} items", count),
        });
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::LeafKind;
    use crate::schema::{SchemaMember, StructSchema};
    use crate::ser::ByteWriter;

    fn schemas() -> SchemaBatch {
        SchemaBatch {
            structs: vec![StructSchema {
                scope: 0,
                name: 1,
                dense: false,
                members: vec![
                    SchemaMember {
                        name: Some(2),
                        ty: SchemaType::Leaf(LeafKind::I32),
                    },
                    SchemaMember {
                        name: Some(3),
                        ty: SchemaType::Range(
                            RangeSizeType::U32,
                            Box::new(SchemaType::Leaf(LeafKind::U8)),
                        ),
                    },
                ],
            }],
            enums: vec![],
        }
    }

    #[test]
    fn test_sparse_struct_skips_absent() {
        let mut w = ByteWriter::new();
        w.write_u8(0b10);
        w.write_u32(2);
        w.write_bytes(b"hi");
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        let read = read_struct(&schemas(), 0, &mut r, 0).expect("read");
        r.finish().expect("consumed");
        assert_eq!(read.members.len(), 1);
        assert_eq!(
            read.members[0],
            (
                1,
                ReadValue::Range(vec![ReadValue::Leaf(u64::from(b'h')), ReadValue::Leaf(u64::from(b'i'))])
            )
        );
    }

    #[test]
    fn test_oversized_count_is_truncation() {
        let mut w = ByteWriter::new();
        w.write_u8(0b10);
        w.write_u32(1_000_000);
        let bytes = w.into_inner();
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            read_struct(&schemas(), 0, &mut r, 0),
            Err(WireError::Truncated { offset: 1, .. })
        ));
    }

    #[test]
    fn test_uni_count_above_one_rejected() {
        let bytes = [2u8];
        let mut r = ByteReader::new(&bytes);
        assert!(matches!(
            read_count(&mut r, RangeSizeType::Uni),
            Err(WireError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_detect_format_rejects_garbage() {
        assert!(matches!(
            detect_format(&[1, 2, 3, 4]),
            Err(WireError::BadMagic { offset: 0, .. })
        ));
        assert!(matches!(detect_format(&[1]), Err(WireError::Truncated { .. })));
        assert_eq!(
            detect_format(&NAMES_MAGIC.to_le_bytes()).expect("format"),
            SchemaFormat::StableNames
        );
    }

    #[test]
    fn test_name_table_decoding() {
        assert_eq!(
            decode_names(b"Game\0Item\0", 0).expect("names"),
            vec!["Game".to_string(), "Item".to_string()]
        );
        assert!(decode_names(b"Game", 0).is_err());
        assert_eq!(decode_names(b"", 0).expect("empty"), Vec::<String>::new());
    }
}
