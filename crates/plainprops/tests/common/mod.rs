// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared host fixture for integration tests.

#![allow(dead_code)]

use plainprops::{
    Context, DeclId, EnumBuilder, FieldKind, HostRegistry, MapEntry, SparseMap, SparseSet,
    StructBuilder, StructValue, Value,
};

pub const STAT_HP: u64 = 0;
pub const STAT_MANA: u64 = 1;
pub const STAT_SPEED: u64 = 2;

/// `Game::Player` derives from `Game::Entity` and touches every field shape.
pub fn host() -> HostRegistry {
    let mut host = HostRegistry::new();
    host.add_enum(
        EnumBuilder::new("Game::Stat")
            .variant("Hp")
            .variant("Mana")
            .variant("Speed"),
    )
    .add_struct(
        StructBuilder::new("Game::Item")
            .field("Name", FieldKind::String)
            .field_default("Weight", FieldKind::F32, 1.0f32),
    )
    .add_struct(StructBuilder::new("Game::Entity").field("Id", FieldKind::U32))
    .add_struct(
        StructBuilder::new("Game::Player")
            .super_type("Game::Entity")
            .field("Nick", FieldKind::optional(FieldKind::String))
            .field(
                "Aliases",
                FieldKind::array(FieldKind::optional(FieldKind::String)),
            )
            .field("Items", FieldKind::set(FieldKind::structure("Game::Item")))
            .field(
                "Stats",
                FieldKind::map(
                    FieldKind::enumeration("Game::Stat"),
                    FieldKind::array(FieldKind::I32),
                ),
            )
            .field("Color", FieldKind::static_array(FieldKind::U8, 3))
            .field_default("Level", FieldKind::I16, 1i16),
    )
    .add_struct(
        StructBuilder::new("Game::Counter")
            .field_default("Count", FieldKind::I32, 0i32)
            .field_default("Tags", FieldKind::set(FieldKind::String), tags(&["a", "b", "c"])),
    );
    host
}

pub fn bound(name: &str) -> (Context, DeclId) {
    let mut ctx = Context::default();
    let decl = ctx.bind_struct(&host(), name).expect("bind");
    (ctx, decl)
}

pub fn tags(items: &[&str]) -> Value {
    Value::Set(items.iter().map(|s| Value::from(*s)).collect::<SparseSet>())
}

pub fn item(name: &str, weight: f32) -> Value {
    Value::Struct(StructValue::new(vec![Value::from(name), Value::F32(weight)]))
}

pub fn some(s: &str) -> Value {
    Value::Optional(Some(Box::new(Value::from(s))))
}

pub fn stats(entries: &[(u64, &[i32])]) -> Value {
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| {
                MapEntry::new(
                    Value::Enum(*k),
                    Value::Array(v.iter().map(|x| Value::I32(*x)).collect()),
                )
            })
            .collect::<SparseMap>(),
    )
}

pub fn player(id: u32, nick: Option<&str>) -> StructValue {
    StructValue::new(vec![
        Value::U32(id),
        Value::Optional(nick.map(|n| Box::new(Value::from(n)))),
        Value::Array(vec![some("ace"), Value::Optional(None), some("")]),
        Value::Set(
            [item("sword", 3.5), item("shield", 1.0)]
                .into_iter()
                .collect::<SparseSet>(),
        ),
        stats(&[(STAT_HP, &[100, 90]), (STAT_SPEED, &[])]),
        Value::Array(vec![Value::U8(255), Value::U8(0), Value::U8(12)]),
        Value::I16(7),
    ])
}

pub fn counter(count: i32, tag_items: &[&str]) -> StructValue {
    StructValue::new(vec![Value::I32(count), tags(tag_items)])
}
