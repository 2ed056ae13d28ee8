// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # PlainProps - reflection-driven binary property serialization
//!
//! Saves and loads batches of reflected host objects to a compact,
//! schema-carrying binary format. Objects can be delta-encoded against a
//! default instance, so only members that differ reach the wire. Sets and
//! maps are written as remove/insert operations against their default.
//!
//! ## Quick Start
//!
//! ```rust
//! use bumpalo::Bump;
//! use plainprops::{BatchLoader, BatchSaver, Context, FieldKind, HostRegistry, StructBuilder};
//! use plainprops::{SchemaFormat, StructValue, Value};
//!
//! let mut host = HostRegistry::new();
//! host.add_struct(
//!     StructBuilder::new("Game::Score")
//!         .field("Points", FieldKind::I32)
//!         .field("Player", FieldKind::String),
//! );
//! let mut ctx = Context::default();
//! let score = ctx.bind_struct(&host, "Game::Score").expect("bind");
//!
//! let bump = Bump::new();
//! let mut saver = BatchSaver::new(&ctx, &bump);
//! let value = StructValue::new(vec![Value::I32(40), Value::from("ada")]);
//! saver.save(score, &value, None).expect("save");
//! let blob = saver.write().expect("write");
//!
//! let loader = BatchLoader::new(&ctx, &blob, SchemaFormat::StableNames).expect("load");
//! let (_, loaded) = loader.load_new(0).expect("object");
//! assert_eq!(loaded, value);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------+
//! |  Host reflection (HostReflection / HostRegistry)               |
//! +---------------------------------------------------------------+
//! |  Binding: declarations, struct bindings, range codecs          |
//! +---------------------------------------------------------------+
//! |  Save: StructSaver -> built trees -> schemas -> payloads       |
//! |  Load: blob -> BatchView -> LoadPlan -> StructLoader           |
//! +---------------------------------------------------------------+
//! |  Wire: ByteWriter / ByteReader, magics, skippable slices       |
//! +---------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`context`] - engine state, start here
//! - [`reflect`] - host type descriptions
//! - [`batch`] - batch save and load drivers
//! - [`diff`] - live value and schema comparison
//! - [`text`] - YAML dump and parse of blobs

/// Batch save and load drivers.
pub mod batch;
/// Struct, member and range bindings, range codecs, custom bindings.
pub mod bind;
/// Arena-allocated value trees produced by saving.
pub mod build;
/// Wire constants and runtime options.
pub mod config;
/// Engine state shared by every operation.
pub mod context;
/// Struct and enum declarations.
pub mod declaration;
/// Default instance cache.
pub mod defaults;
mod delta;
/// Value and schema comparison.
pub mod diff;
/// Error types.
pub mod error;
/// Names and type identifiers.
pub mod ids;
/// Leaf kinds and widths.
pub mod leaf;
/// Blob decoding into loadable objects.
pub mod load;
/// Blob reading and validation.
pub mod read;
/// Host reflection interface.
pub mod reflect;
pub(crate) mod save;
/// Batch schemas and their encoding.
pub mod schema;
/// Byte cursors.
pub mod ser;
/// YAML text form of blobs.
pub mod text;
/// Dynamic values.
pub mod value;
pub(crate) mod write;

pub use batch::{BatchLoader, BatchSaver};
pub use bind::{CustomBinding, RangeKind, RangeSizeType, TypeBinding};
pub use config::{BatchConfig, DuplicatePolicy, SchemaFormat};
pub use context::{Context, MountId, SharedContext};
pub use declaration::{EnumMode, Occupancy};
pub use defaults::DefaultKind;
pub use diff::{diff_all, diff_path, diff_schemas, diff_struct, DiffPath, DiffSegment, SchemaDiff};
pub use error::{BindError, ConfigError, LoadError, SaveError, SchemaError, TextError, WireError};
pub use ids::{DeclId, EnumId, MemberId, NameId};
pub use leaf::{LeafKind, LeafWidth};
pub use read::{detect_format, read_batch, BatchView};
pub use reflect::{EnumBuilder, FieldKind, HostReflection, HostRegistry, StructBuilder};
pub use schema::SchemaBatch;
pub use text::{parse_yaml, print_yaml};
pub use value::{MapEntry, ScriptDelegate, SparseMap, SparseSet, StructValue, Value};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
