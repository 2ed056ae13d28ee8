// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! PlainProps configuration - wire constants and batch options.
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: Compile-time wire constants (magics, sentinels, chunk size)
//! - **Level 2 (Dynamic)**: `BatchConfig`, owned by a `Context`, optionally loaded from YAML
//!
//! # Example
//!
//! ```
//! use plainprops::config::{BatchConfig, SchemaFormat};
//!
//! let config = BatchConfig::from_yaml_str("schema_format: InMemoryNames\nsort_set_items: true\n")
//!     .expect("valid config");
//! assert_eq!(config.schema_format, SchemaFormat::InMemoryNames);
//! assert!(config.sort_set_items);
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

// =======================================================================
// Blob layout markers
// =======================================================================

/// Precedes the name table (StableNames only).
pub const NAMES_MAGIC: u32 = 0xFEED_F00D;

/// Precedes the schema section.
pub const SCHEMAS_MAGIC: u32 = 0xABCD_1234;

/// Precedes the object record stream.
pub const OBJECTS_MAGIC: u32 = 0xDADA_DAAA;

/// First word of every object record.
pub const RECORD_MAGIC: u32 = 0x9988_7766;

/// Last word of a blob.
pub const END_MAGIC: u32 = 0xF0F1_F2F3;

/// Member name used for the unnamed super pseudo-member in schemas.
pub const SUPER_NAME: u32 = u32::MAX;

/// Alignment of the schema size word.
pub const SCHEMA_ALIGNMENT: usize = 4;

// =======================================================================
// Engine limits
// =======================================================================

/// Maximum number of items a container grows by in one `MakeItems` call.
pub const MAX_CHUNK: usize = 256;

/// Deepest struct/range nesting accepted when decoding a payload.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Default upper bound for binding a static array as numbered sub-fields.
pub const DEFAULT_MAX_STATIC_ARRAY_MEMBERS: u32 = 64;

/// Hard upper bound accepted for `max_static_array_members`.
pub const MAX_STATIC_ARRAY_MEMBERS_LIMIT: u32 = 4096;

/// Scope of engine-synthesized declarations (delta structs, pairs, numbered arrays).
pub const BUILTIN_SCOPE: &str = "PlainProps";

/// How type and member names are recorded in a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchemaFormat {
    /// A name table is written; ids in the schema index into it.
    #[default]
    StableNames,
    /// No name table; ids are process-local and only valid for this run.
    InMemoryNames,
}

/// What to do when the same struct or enum id is declared twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Reject with a `SchemaError`.
    Fail,
    /// Keep the first declaration and log a warning.
    Ignore,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Fail
        } else {
            Self::Ignore
        }
    }
}

/// Options shared by binding, saving and loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Name encoding used by `BatchSaver::write`.
    pub schema_format: SchemaFormat,
    /// Static arrays up to this length in sparse structs bind as numbered sub-fields.
    pub max_static_array_members: u32,
    /// Sort set and map items by a total order before encoding.
    pub sort_set_items: bool,
    /// Duplicate declaration handling.
    pub duplicate_declarations: DuplicatePolicy,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            schema_format: SchemaFormat::default(),
            max_static_array_members: DEFAULT_MAX_STATIC_ARRAY_MEMBERS,
            sort_set_items: false,
            duplicate_declarations: DuplicatePolicy::default(),
        }
    }
}

impl BatchConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_static_array_members > MAX_STATIC_ARRAY_MEMBERS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_static_array_members {} exceeds {}",
                self.max_static_array_members, MAX_STATIC_ARRAY_MEMBERS_LIMIT
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magics_are_distinct() {
        let magics = [
            NAMES_MAGIC,
            SCHEMAS_MAGIC,
            OBJECTS_MAGIC,
            RECORD_MAGIC,
            END_MAGIC,
        ];
        for (i, a) in magics.iter().enumerate() {
            for b in &magics[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = BatchConfig::from_yaml_str("sort_set_items: true\n").expect("parse");
        assert!(config.sort_set_items);
        assert_eq!(config.schema_format, SchemaFormat::StableNames);
        assert_eq!(
            config.max_static_array_members,
            DEFAULT_MAX_STATIC_ARRAY_MEMBERS
        );
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = BatchConfig {
            schema_format: SchemaFormat::InMemoryNames,
            max_static_array_members: 8,
            sort_set_items: true,
            duplicate_declarations: DuplicatePolicy::Ignore,
        };
        let yaml = config.to_yaml().expect("serialize");
        assert_eq!(BatchConfig::from_yaml_str(&yaml).expect("parse"), config);
    }

    #[test]
    fn test_rejects_oversized_static_array_limit() {
        let err = BatchConfig::from_yaml_str("max_static_array_members: 100000\n")
            .expect_err("limit exceeded");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plainprops.yaml");
        std::fs::write(&path, "max_static_array_members: 4\n").expect("write");
        let config = BatchConfig::from_yaml_file(&path).expect("load");
        assert_eq!(config.max_static_array_members, 4);
    }
}
