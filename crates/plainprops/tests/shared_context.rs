// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test/bench code readability over pedantic
#![allow(clippy::cast_possible_truncation)] // Test parameters
#![allow(clippy::missing_panics_doc)] // Tests/examples panic on failure
#![allow(clippy::wildcard_imports)] // Test utility imports

//! Concurrent saving and loading through one shared context.

mod common;

use bumpalo::Bump;
use common::*;
use plainprops::{BatchLoader, BatchSaver, Context, SchemaFormat, SharedContext};
use std::sync::Arc;
use std::thread;

#[test]
fn test_parallel_save_load_after_warmup() {
    let mut ctx = Context::default();
    let decl = ctx.bind_struct(&host(), "Game::Player").expect("bind");
    let shared: SharedContext = ctx.into_shared();

    let handles: Vec<_> = (0..8u32)
        .map(|t| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let ctx = shared.read();
                for i in 0..25 {
                    let value = player(t * 100 + i, Some("thread"));
                    let bump = Bump::new();
                    let mut saver = BatchSaver::new(&ctx, &bump);
                    saver.save(decl, &value, None).expect("save");
                    let blob = saver.write().expect("write");
                    let loader =
                        BatchLoader::new(&ctx, &blob, SchemaFormat::StableNames).expect("loader");
                    assert_eq!(loader.load_new(0).expect("load").1, value);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread panicked");
    }
    assert_eq!(shared.read().num_mounted(), 0);
}

#[test]
fn test_mounts_are_tracked_across_threads() {
    let mut ctx = Context::default();
    let decl = ctx.bind_struct(&host(), "Game::Counter").expect("bind");
    let shared = ctx.into_shared();

    let blob = {
        let ctx = shared.read();
        let bump = Bump::new();
        let mut saver = BatchSaver::new(&ctx, &bump);
        saver.save(decl, &counter(1, &["x"]), None).expect("save");
        saver.write().expect("write")
    };
    let blob = Arc::new(blob);

    let ctx = shared.read();
    let held = BatchLoader::new(&ctx, &blob, SchemaFormat::StableNames).expect("loader");
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let local = BatchLoader::new(&ctx, &blob, SchemaFormat::StableNames).expect("loader");
                assert!(ctx.mounted(local.mount_id()).is_some());
            });
        }
    });
    assert_eq!(ctx.num_mounted(), 1);
    assert!(ctx.mounted(held.mount_id()).is_some());
    drop(held);
    assert_eq!(ctx.num_mounted(), 0);
}
