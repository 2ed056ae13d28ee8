// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Built value tree.
//!
//! Saving turns live values into this arena-allocated tree; writing turns the
//! tree into bytes. Nodes are `Copy` and borrow from one `bumpalo::Bump` owned
//! by the save operation, so dropping the arena frees the whole tree at once.

use crate::bind::RangeSizeType;
use crate::ids::{DeclId, MemberId};
use crate::leaf::LeafKind;
use bumpalo::collections::Vec as BumpVec;
use bumpalo::Bump;

#[derive(Debug, Clone, Copy)]
pub struct BuiltStruct<'a> {
    pub decl: DeclId,
    /// Members in declaration order; the super pseudo-member comes first.
    pub members: &'a [BuiltMember<'a>],
}

impl<'a> BuiltStruct<'a> {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member by name; `None` looks up the super pseudo-member.
    pub fn get(&self, name: Option<MemberId>) -> Option<&BuiltValue<'a>> {
        self.members
            .iter()
            .find(|m| m.name == name)
            .map(|m| &m.value)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BuiltMember<'a> {
    /// `None` for the super pseudo-member.
    pub name: Option<MemberId>,
    pub value: BuiltValue<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum BuiltValue<'a> {
    /// Raw bits, truncated to the leaf width.
    Leaf(LeafKind, u64),
    Struct(&'a BuiltStruct<'a>),
    Range(&'a BuiltRange<'a>),
}

#[derive(Debug, Clone, Copy)]
pub struct BuiltRange<'a> {
    pub size: RangeSizeType,
    /// Item type, kept so empty ranges still describe their schema.
    pub item: BuiltType<'a>,
    pub items: BuiltItems<'a>,
}

#[derive(Debug, Clone, Copy)]
pub enum BuiltItems<'a> {
    Leaves(&'a [u64]),
    Bytes(&'a [u8]),
    Structs(&'a [&'a BuiltStruct<'a>]),
    Ranges(&'a [&'a BuiltRange<'a>]),
}

impl BuiltItems<'_> {
    pub fn len(&self) -> usize {
        match self {
            Self::Leaves(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::Structs(v) => v.len(),
            Self::Ranges(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shape of a range item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltType<'a> {
    Leaf(LeafKind),
    Struct(DeclId),
    Range(RangeSizeType, &'a BuiltType<'a>),
}

/// Collects the members of one struct.
#[derive(Debug)]
pub struct MemberBuilder<'a> {
    bump: &'a Bump,
    members: BumpVec<'a, BuiltMember<'a>>,
}

impl<'a> MemberBuilder<'a> {
    pub fn new(bump: &'a Bump) -> Self {
        Self {
            bump,
            members: BumpVec::new_in(bump),
        }
    }

    pub fn bump(&self) -> &'a Bump {
        self.bump
    }

    pub fn add(&mut self, name: Option<MemberId>, value: BuiltValue<'a>) {
        self.members.push(BuiltMember { name, value });
    }

    pub fn add_leaf(&mut self, member: MemberId, kind: LeafKind, bits: u64) {
        self.add(Some(member), BuiltValue::Leaf(kind, bits));
    }

    /// UTF-8 bytes as a `U32`-sized range of `U8`.
    pub fn add_string(&mut self, member: MemberId, text: &str) {
        let range = string_range(self.bump, text);
        self.add(Some(member), BuiltValue::Range(range));
    }

    pub fn add_struct(&mut self, member: MemberId, value: &'a BuiltStruct<'a>) {
        self.add(Some(member), BuiltValue::Struct(value));
    }

    pub fn add_super(&mut self, value: &'a BuiltStruct<'a>) {
        self.add(None, BuiltValue::Struct(value));
    }

    pub fn add_range(&mut self, member: MemberId, range: &'a BuiltRange<'a>) {
        self.add(Some(member), BuiltValue::Range(range));
    }

    /// `U32`-sized range of `decl` structs.
    pub fn add_struct_range(&mut self, member: MemberId, decl: DeclId, items: &[&'a BuiltStruct<'a>]) {
        let items = self.bump.alloc_slice_copy(items);
        let range = self.bump.alloc(BuiltRange {
            size: RangeSizeType::U32,
            item: BuiltType::Struct(decl),
            items: BuiltItems::Structs(items),
        });
        self.add(Some(member), BuiltValue::Range(range));
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn build(self, decl: DeclId) -> &'a BuiltStruct<'a> {
        let bump = self.bump;
        bump.alloc(BuiltStruct {
            decl,
            members: self.members.into_bump_slice(),
        })
    }
}

pub(crate) fn string_range<'a>(bump: &'a Bump, text: &str) -> &'a BuiltRange<'a> {
    let bytes = bump.alloc_slice_copy(text.as_bytes());
    bump.alloc(BuiltRange {
        size: RangeSizeType::U32,
        item: BuiltType::Leaf(LeafKind::U8),
        items: BuiltItems::Bytes(bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NameId;

    #[test]
    fn test_member_builder_keeps_order() {
        let bump = Bump::new();
        let a = MemberId(NameId(1));
        let b = MemberId(NameId(2));

        let inner = MemberBuilder::new(&bump).build(DeclId(1));
        let mut builder = MemberBuilder::new(&bump);
        builder.add_super(inner);
        builder.add_leaf(a, LeafKind::I32, 7);
        builder.add_string(b, "hi");
        let built = builder.build(DeclId(0));

        assert_eq!(built.members.len(), 3);
        assert!(built.members[0].name.is_none());
        assert!(matches!(built.get(Some(a)), Some(BuiltValue::Leaf(LeafKind::I32, 7))));
        match built.get(Some(b)) {
            Some(BuiltValue::Range(range)) => {
                assert_eq!(range.items.len(), 2);
                assert_eq!(range.item, BuiltType::Leaf(LeafKind::U8));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
