// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Byte-level primitives shared by the blob writer and reader.

pub mod cursor;

pub use cursor::{ByteReader, ByteWriter};

use crate::error::WireError;

/// Result type for byte-level reads.
pub type WireResult<T> = Result<T, WireError>;
