//! Transient checker state and the guards that override it
//!
//! Synthesized code is checked as if written inside the class it was spliced
//! into, and may touch members user code could not. Both guards restore the
//! state they replaced when dropped, on every exit path.

use std::ops::{Deref, DerefMut};

use crate::checker::Checker;
use crate::id_types::{NodeId, ScopeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckerStatus(u32);

impl CheckerStatus {
    pub const NONE: Self = Self(0);
    /// Private members are accessible from anywhere
    pub const IGNORE_VISIBILITY: Self = Self(1 << 0);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckerContext {
    pub status: CheckerStatus,
    /// Overrides the class found by walking up from the checked node
    pub containing_class: Option<NodeId>,
    /// Scope for resolving names of nodes not yet in the tree
    pub scope: Option<ScopeId>,
}

impl CheckerContext {
    pub fn new(status: CheckerStatus, containing_class: Option<NodeId>) -> Self {
        Self {
            status,
            containing_class,
            scope: None,
        }
    }

    pub fn ignores_visibility(&self) -> bool {
        self.status.contains(CheckerStatus::IGNORE_VISIBILITY)
    }
}

/// Installs a status and containing class for its lifetime
pub struct SavedCheckerContext<'c> {
    checker: &'c mut Checker,
    saved: CheckerContext,
}

impl<'c> SavedCheckerContext<'c> {
    pub fn new(checker: &'c mut Checker, status: CheckerStatus, containing_class: Option<NodeId>) -> Self {
        let saved = checker.context;
        checker.context.status = status;
        checker.context.containing_class = containing_class;
        Self { checker, saved }
    }
}

impl Deref for SavedCheckerContext<'_> {
    type Target = Checker;

    fn deref(&self) -> &Checker {
        self.checker
    }
}

impl DerefMut for SavedCheckerContext<'_> {
    fn deref_mut(&mut self) -> &mut Checker {
        self.checker
    }
}

impl Drop for SavedCheckerContext<'_> {
    fn drop(&mut self) {
        self.checker.context = self.saved;
    }
}

/// Sets the checker's active scope for its lifetime
pub struct ScopeContext<'c> {
    checker: &'c mut Checker,
    saved: Option<ScopeId>,
}

impl<'c> ScopeContext<'c> {
    pub fn new(checker: &'c mut Checker, scope: Option<ScopeId>) -> Self {
        let saved = std::mem::replace(&mut checker.context.scope, scope);
        Self { checker, saved }
    }
}

impl Deref for ScopeContext<'_> {
    type Target = Checker;

    fn deref(&self) -> &Checker {
        self.checker
    }
}

impl DerefMut for ScopeContext<'_> {
    fn deref_mut(&mut self) -> &mut Checker {
        self.checker
    }
}

impl Drop for ScopeContext<'_> {
    fn drop(&mut self) {
        self.checker.context.scope = self.saved;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guards_nest_and_restore() {
        let mut checker = Checker::new();
        let class = NodeId::from_raw(7);
        {
            let mut saved = SavedCheckerContext::new(&mut checker, CheckerStatus::IGNORE_VISIBILITY, Some(class));
            assert!(saved.context().ignores_visibility());
            {
                let scoped = ScopeContext::new(&mut saved, Some(ScopeId::from_raw(3)));
                assert_eq!(scoped.context().scope, Some(ScopeId::from_raw(3)));
                assert_eq!(scoped.context().containing_class, Some(class));
            }
            assert_eq!(saved.context().scope, None);
        }
        assert!(!checker.context().ignores_visibility());
        assert_eq!(checker.context().containing_class, None);
    }
}
