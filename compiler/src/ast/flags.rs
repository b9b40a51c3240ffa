//! Bit-set flags carried by arena nodes

pub use parser::ModifierFlags;

use crate::checker::types::PrimitiveKind;

/// Implicit primitive <-> reference conversions the checker attached to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BoxingUnboxingFlags(u32);

impl BoxingUnboxingFlags {
    pub const NONE: Self = Self(0);

    pub const BOX_TO_BOOLEAN: Self = Self(1 << 0);
    pub const BOX_TO_BYTE: Self = Self(1 << 1);
    pub const BOX_TO_SHORT: Self = Self(1 << 2);
    pub const BOX_TO_CHAR: Self = Self(1 << 3);
    pub const BOX_TO_INT: Self = Self(1 << 4);
    pub const BOX_TO_LONG: Self = Self(1 << 5);
    pub const BOX_TO_FLOAT: Self = Self(1 << 6);
    pub const BOX_TO_DOUBLE: Self = Self(1 << 7);

    pub const UNBOX_TO_BOOLEAN: Self = Self(1 << 8);
    pub const UNBOX_TO_BYTE: Self = Self(1 << 9);
    pub const UNBOX_TO_SHORT: Self = Self(1 << 10);
    pub const UNBOX_TO_CHAR: Self = Self(1 << 11);
    pub const UNBOX_TO_INT: Self = Self(1 << 12);
    pub const UNBOX_TO_LONG: Self = Self(1 << 13);
    pub const UNBOX_TO_FLOAT: Self = Self(1 << 14);
    pub const UNBOX_TO_DOUBLE: Self = Self(1 << 15);

    pub const BOXING_FLAG: Self = Self(0x00ff);
    pub const UNBOXING_FLAG: Self = Self(0xff00);

    pub fn box_to(kind: PrimitiveKind) -> Self {
        Self(1 << Self::shift(kind))
    }

    pub fn unbox_to(kind: PrimitiveKind) -> Self {
        Self(1 << (Self::shift(kind) + 8))
    }

    fn shift(kind: PrimitiveKind) -> u32 {
        match kind {
            PrimitiveKind::Boolean => 0,
            PrimitiveKind::Byte => 1,
            PrimitiveKind::Short => 2,
            PrimitiveKind::Char => 3,
            PrimitiveKind::Int => 4,
            PrimitiveKind::Long => 5,
            PrimitiveKind::Float => 6,
            PrimitiveKind::Double => 7,
        }
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Only the bits also set in `mask`
    pub fn masked(self, mask: Self) -> Self {
        Self(self.0 & mask.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn has_boxing(self) -> bool {
        self.intersects(Self::BOXING_FLAG)
    }

    pub fn has_unboxing(self) -> bool {
        self.intersects(Self::UNBOXING_FLAG)
    }
}
