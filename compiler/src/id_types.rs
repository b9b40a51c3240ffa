//! Typed indices into the per-compilation tables
//!
//! Nodes, scopes, variables and interned types all live in `Vec`-backed
//! tables owned by one compilation unit. The ids below are `u32` newtypes so
//! a scope index can never be used where a node index is expected.

use std::fmt;

/// Behaviour shared by every id newtype
pub trait IdType: Copy + Eq + std::hash::Hash + fmt::Debug {
    fn from_raw(raw: u32) -> Self;

    fn as_raw(self) -> u32;

    fn is_valid(self) -> bool;

    fn invalid() -> Self;

    /// Position in the owning table
    fn index(self) -> usize {
        self.as_raw() as usize
    }
}

macro_rules! define_id_type {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn as_raw(self) -> u32 {
                self.0
            }

            /// Id of the entry stored at `index` in its table
            pub fn from_index(index: usize) -> Self {
                debug_assert!(index < u32::MAX as usize, "{} table overflow", stringify!($name));
                Self(index as u32)
            }

            pub const fn index(self) -> usize {
                self.0 as usize
            }

            /// False for the sentinel value
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            pub const fn invalid() -> Self {
                Self(u32::MAX)
            }

            pub const fn first() -> Self {
                Self(0)
            }

            pub const fn next(self) -> Self {
                Self(self.0.wrapping_add(1))
            }
        }

        impl IdType for $name {
            fn from_raw(raw: u32) -> Self {
                Self::from_raw(raw)
            }

            fn as_raw(self) -> u32 {
                self.as_raw()
            }

            fn is_valid(self) -> bool {
                self.is_valid()
            }

            fn invalid() -> Self {
                Self::invalid()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::invalid()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(<invalid>)", stringify!($name))
                }
            }
        }
    };
}

define_id_type! {
    /// Node in an [`AstArena`](crate::ast::AstArena)
    NodeId
}

define_id_type! {
    /// Scope created by the binder for a scope-bearing node
    ScopeId
}

define_id_type! {
    /// Declared name resolved by the binder
    VariableId
}

define_id_type! {
    /// Interned type in the checker's type table
    TypeId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel() {
        assert!(!NodeId::invalid().is_valid());
        assert!(NodeId::first().is_valid());
        assert_eq!(NodeId::default(), NodeId::invalid());
    }

    #[test]
    fn test_sequence_and_index() {
        let id = ScopeId::first().next().next();
        assert_eq!(id.index(), 2);
        assert_eq!(ScopeId::from_index(2), id);
        assert_eq!(format!("{}", id), "ScopeId(2)");
        assert_eq!(format!("{}", TypeId::invalid()), "TypeId(<invalid>)");
    }
}
