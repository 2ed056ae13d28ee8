// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::float_cmp)] // Test assertions with constants
#![allow(clippy::doc_markdown)] // Test documentation
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::too_many_lines)] // Example/test code
#![allow(clippy::wildcard_imports)] // Test utility imports
#![allow(clippy::redundant_closure_for_method_calls)] // Test code clarity
#![allow(clippy::similar_names)] // Test variable naming
#![allow(clippy::needless_pass_by_value)] // Test functions

//! Save/load round trips through complete blobs.

mod common;

use bumpalo::Bump;
use common::*;
use plainprops::{
    detect_format, parse_yaml, print_yaml, read_batch, BatchLoader, BatchSaver, Context,
    DeclId, LoadError, SchemaFormat, StructValue, Value, WireError,
};

fn save_one(ctx: &Context, decl: DeclId, value: &StructValue, default: Option<&StructValue>) -> Vec<u8> {
    let bump = Bump::new();
    let mut saver = BatchSaver::new(ctx, &bump);
    saver.save(decl, value, default).expect("save");
    saver.write().expect("write")
}

fn load_one(ctx: &Context, blob: &[u8]) -> StructValue {
    let loader = BatchLoader::new(ctx, blob, SchemaFormat::StableNames).expect("loader");
    loader.load_new(0).expect("load").1
}

#[test]
fn test_full_save_roundtrips_every_shape() {
    let (ctx, decl) = bound("Game::Player");
    let value = player(42, Some("zed"));
    let blob = save_one(&ctx, decl, &value, None);
    assert_eq!(load_one(&ctx, &blob), value);

    let absent = player(7, None);
    let blob = save_one(&ctx, decl, &absent, None);
    assert_eq!(load_one(&ctx, &blob), absent);
}

#[test]
fn test_delta_save_roundtrips_onto_default() {
    let (ctx, decl) = bound("Game::Player");
    let default = ctx.new_instance(decl).expect("default");
    assert_eq!(default.field(6), Some(&Value::I16(1)));

    let value = player(3, Some("kit"));
    let delta = save_one(&ctx, decl, &value, Some(&default));
    let full = save_one(&ctx, decl, &value, None);
    assert_eq!(load_one(&ctx, &delta), value);
    assert_eq!(load_one(&ctx, &full), value);

    let unchanged = save_one(&ctx, decl, &default, Some(&default));
    assert!(unchanged.len() < full.len());
    assert_eq!(load_one(&ctx, &unchanged), default);
}

#[test]
fn test_resave_of_loaded_value_is_byte_identical() {
    let (ctx, decl) = bound("Game::Player");
    let first = save_one(&ctx, decl, &player(9, Some("ivy")), None);
    let loaded = load_one(&ctx, &first);
    assert_eq!(save_one(&ctx, decl, &loaded, None), first);
}

#[test]
fn test_many_objects_in_one_batch() {
    let (ctx, decl) = bound("Game::Player");
    let bump = Bump::new();
    let mut saver = BatchSaver::new(&ctx, &bump);
    let values: Vec<StructValue> = (0..20).map(|i| player(i, (i % 2 == 0).then_some("even"))).collect();
    for value in &values {
        saver.save(decl, value, None).expect("save");
    }
    let blob = saver.write().expect("write");

    let mut loader = BatchLoader::new(&ctx, &blob, SchemaFormat::StableNames).expect("loader");
    assert_eq!(loader.num_objects(), values.len());
    for expected in &values {
        let mut dst = StructValue::default();
        loader.load_next(&mut dst).expect("load");
        assert_eq!(&dst, expected);
    }
}

#[test]
fn test_in_memory_names_roundtrip() {
    let (ctx, decl) = bound("Game::Player");
    let bump = Bump::new();
    let mut saver = BatchSaver::with_format(&ctx, &bump, SchemaFormat::InMemoryNames);
    let value = player(1, Some("mem"));
    saver.save(decl, &value, None).expect("save");
    let blob = saver.write().expect("write");
    assert_eq!(detect_format(&blob).expect("format"), SchemaFormat::InMemoryNames);

    let loader = BatchLoader::new(&ctx, &blob, SchemaFormat::InMemoryNames).expect("loader");
    assert_eq!(loader.load_new(0).expect("load").1, value);
}

#[test]
fn test_text_dump_reparses_to_same_blob() {
    let (ctx, decl) = bound("Game::Player");
    let default = ctx.new_instance(decl).expect("default");
    let bump = Bump::new();
    let mut saver = BatchSaver::new(&ctx, &bump);
    saver.save(decl, &player(5, Some("txt")), None).expect("save");
    saver.save(decl, &player(6, None), Some(&default)).expect("save");
    let blob = saver.write().expect("write");

    let view = read_batch(&blob, SchemaFormat::StableNames).expect("view");
    let yaml = print_yaml(&view).expect("print");
    assert!(yaml.contains("Game::Player"), "{}", yaml);
    assert!(yaml.contains("sword"), "{}", yaml);
    assert_eq!(parse_yaml(&yaml).expect("parse"), blob);
}

#[test]
fn test_blob_survives_file_io() {
    let (ctx, decl) = bound("Game::Player");
    let value = player(77, Some("disk"));
    let blob = save_one(&ctx, decl, &value, None);

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("player.pprops");
    std::fs::write(&path, &blob).expect("write file");
    let read_back = std::fs::read(&path).expect("read file");
    assert_eq!(load_one(&ctx, &read_back), value);
}

#[test]
fn test_corrupt_blobs_are_rejected() {
    let (ctx, decl) = bound("Game::Player");
    let blob = save_one(&ctx, decl, &player(1, Some("x")), None);

    let mut bad_magic = blob.clone();
    bad_magic[0] ^= 0xFF;
    assert!(matches!(
        BatchLoader::new(&ctx, &bad_magic, SchemaFormat::StableNames),
        Err(LoadError::Wire(WireError::BadMagic { .. }))
    ));

    for len in [0, 3, blob.len() / 2, blob.len() - 1] {
        assert!(
            BatchLoader::new(&ctx, &blob[..len], SchemaFormat::StableNames).is_err(),
            "prefix of {} bytes accepted",
            len
        );
    }
    assert_eq!(ctx.num_mounted(), 0);
}

#[test]
fn test_loading_into_fresh_context_binds_by_name() {
    let (ctx, decl) = bound("Game::Player");
    let value = player(11, Some("far"));
    let blob = save_one(&ctx, decl, &value, None);

    // Bind other types first so live ids differ from the saving context.
    let mut other = Context::default();
    other.bind_struct(&host(), "Game::Counter").expect("bind counter");
    let other_decl = other.bind_struct(&host(), "Game::Player").expect("bind player");
    assert_ne!(other_decl, decl);
    let loaded = load_one(&other, &blob);
    assert_eq!(loaded, value);
}
