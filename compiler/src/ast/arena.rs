//! Node storage and the structural primitives every phase builds on

use crate::ast::{BoxingUnboxingFlags, ChildList, MemberKind, NodeKind, Span};
use crate::error::LoweringResult;
use crate::id_types::{NodeId, ScopeId, TypeId, VariableId};

#[derive(Debug, Clone)]
pub struct AstNode {
    pub kind: NodeKind,
    pub span: Span,
    /// Non-owning back reference; `None` for the root and detached nodes
    pub parent: Option<NodeId>,
    /// Checked type, written once by the checker
    pub ty: Option<TypeId>,
    /// Binding attached by the binder to declarations and references
    pub variable: Option<VariableId>,
    /// Scope owned by a scope-bearing node
    pub scope: Option<ScopeId>,
    pub boxing_flags: BoxingUnboxingFlags,
}

/// Length of an arena at some point, for undoing a failed build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMark(usize);

/// Owner of every node of one compilation unit. Nodes are never freed one by
/// one; nodes cut out of the tree simply become unreachable.
#[derive(Debug, Clone, Default)]
pub struct AstArena {
    nodes: Vec<AstNode>,
}

impl AstArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate a node and make it the parent of the children named in `kind`
    pub fn alloc(&mut self, kind: NodeKind, span: Span) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        let children = kind.children();
        self.nodes.push(AstNode {
            kind,
            span,
            parent: None,
            ty: None,
            variable: None,
            scope: None,
            boxing_flags: BoxingUnboxingFlags::NONE,
        });
        for child in children {
            self.nodes[child.index()].parent = Some(id);
        }
        id
    }

    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn children(&self, id: NodeId) -> ChildList {
        self.nodes[id.index()].kind.children()
    }

    pub fn set_parent(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.nodes[id.index()].parent = parent;
    }

    /// Point every direct child of `id` back at `id`
    pub fn adopt_children(&mut self, id: NodeId) {
        for child in self.children(id) {
            self.nodes[child.index()].parent = Some(id);
        }
    }

    /// Forget the scope owned by `id`; the binder creates a fresh one
    pub fn clear_scope(&mut self, id: NodeId) {
        self.nodes[id.index()].scope = None;
    }

    pub fn identifier_name(&self, id: NodeId) -> Option<&str> {
        self.kind(id).identifier_name()
    }

    // =========================================================================
    // Rewriting
    // =========================================================================

    /// Put `new` in the child slot of `parent` holding `old`.
    ///
    /// `old` is detached unless it was already re-parented into `new`. Cached
    /// types of `parent` and its ancestors are dropped.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> bool {
        let mut replaced = false;
        for slot in self.nodes[parent.index()].kind.child_slots_mut() {
            if *slot == old {
                *slot = new;
                replaced = true;
                break;
            }
        }
        if replaced {
            self.nodes[new.index()].parent = Some(parent);
            if old != new && self.nodes[old.index()].parent == Some(parent) {
                self.nodes[old.index()].parent = None;
            }
            self.invalidate_types_upward(parent);
        }
        replaced
    }

    /// Append to the child list of a list-owning node
    pub fn push_child(&mut self, owner: NodeId, child: NodeId) -> bool {
        match self.nodes[owner.index()].kind.list_mut() {
            Some(list) => {
                list.push(child);
                self.nodes[child.index()].parent = Some(owner);
                true
            }
            None => false,
        }
    }

    /// Insert into the child list of a list-owning node
    pub fn insert_child(&mut self, owner: NodeId, index: usize, child: NodeId) -> bool {
        match self.nodes[owner.index()].kind.list_mut() {
            Some(list) if index <= list.len() => {
                list.insert(index, child);
                self.nodes[child.index()].parent = Some(owner);
                true
            }
            _ => false,
        }
    }

    /// Remove from the child list of a list-owning node and detach it
    pub fn remove_child(&mut self, owner: NodeId, child: NodeId) -> bool {
        let removed = match self.nodes[owner.index()].kind.list_mut() {
            Some(list) => match list.iter().position(|c| *c == child) {
                Some(pos) => {
                    list.remove(pos);
                    true
                }
                None => false,
            },
            None => false,
        };
        if removed && self.nodes[child.index()].parent == Some(owner) {
            self.nodes[child.index()].parent = None;
        }
        removed
    }

    /// Replace every direct child of `id` with `f(child)`
    pub fn transform_children<F>(&mut self, id: NodeId, mut f: F)
    where
        F: FnMut(&mut AstArena, NodeId) -> NodeId,
    {
        for child in self.children(id) {
            let new = f(self, child);
            if new != child {
                self.replace_child(id, child, new);
            }
        }
    }

    /// Post-order rewrite of the subtree under `id`: children first, then the
    /// node itself. Returns what `id` was replaced with.
    ///
    /// Replacements returned by `f` are not walked again.
    pub fn transform_children_recursively<F>(&mut self, id: NodeId, name: &str, f: &mut F) -> LoweringResult<NodeId>
    where
        F: FnMut(&mut AstArena, NodeId) -> LoweringResult<NodeId>,
    {
        let _span = tracing::debug_span!("transform", transformation = name).entered();
        self.transform_post_order(id, f)
    }

    fn transform_post_order<F>(&mut self, id: NodeId, f: &mut F) -> LoweringResult<NodeId>
    where
        F: FnMut(&mut AstArena, NodeId) -> LoweringResult<NodeId>,
    {
        for child in self.children(id) {
            let new = self.transform_post_order(child, f)?;
            if new != child {
                self.replace_child(id, child, new);
            }
        }
        f(self, id)
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    pub fn iterate<F: FnMut(NodeId)>(&self, id: NodeId, mut f: F) {
        for child in self.children(id) {
            f(child);
        }
    }

    /// Pre-order over every descendant of `id`, excluding `id`
    pub fn iterate_recursively<F: FnMut(NodeId)>(&self, id: NodeId, mut f: F) {
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            f(node);
            stack.extend(self.children(node).into_iter().rev());
        }
    }

    /// `id` and all of its descendants in pre-order
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        self.iterate_recursively(id, |node| out.push(node));
        out
    }

    pub fn find_ancestor<P>(&self, id: NodeId, mut pred: P) -> Option<NodeId>
    where
        P: FnMut(&NodeKind) -> bool,
    {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if pred(self.kind(node)) {
                return Some(node);
            }
            current = self.parent(node);
        }
        None
    }

    /// Scope of the nearest scope-bearing ancestor
    pub fn enclosing_scope(&self, id: NodeId) -> Option<ScopeId> {
        let mut current = self.parent(id);
        while let Some(node) = current {
            if let Some(scope) = self.nodes[node.index()].scope {
                return Some(scope);
            }
            current = self.parent(node);
        }
        None
    }

    /// Identifiers that name something declared elsewhere, as opposed to
    /// declaration names and property names of `a.b`
    pub fn is_reference_identifier(&self, id: NodeId) -> bool {
        if !matches!(self.kind(id), NodeKind::Identifier { .. }) {
            return false;
        }
        match self.parent(id).map(|p| self.kind(p)) {
            Some(
                NodeKind::VariableDeclaration { name, .. }
                | NodeKind::FunctionDeclaration { name, .. }
                | NodeKind::Parameter { name, .. }
                | NodeKind::ClassDeclaration { name, .. }
                | NodeKind::InterfaceDeclaration { name, .. }
                | NodeKind::ClassProperty { name, .. }
                | NodeKind::MethodDefinition { name, .. },
            ) => *name != id,
            Some(NodeKind::MemberExpression {
                kind: MemberKind::Property,
                property,
                ..
            }) => *property != id,
            _ => true,
        }
    }

    // =========================================================================
    // Copies and metadata
    // =========================================================================

    /// Deep copy of the subtree under `id`. The copy has no type, binding,
    /// scope or boxing flags; those are recomputed once it is spliced in.
    pub fn clone_subtree(&mut self, id: NodeId, new_parent: Option<NodeId>) -> NodeId {
        let mut kind = self.kind(id).clone();
        let copies: ChildList = self
            .children(id)
            .into_iter()
            .map(|child| self.clone_subtree(child, None))
            .collect();
        for (slot, copy) in kind.child_slots_mut().into_iter().zip(copies) {
            *slot = copy;
        }
        let span = self.span(id);
        let copy = self.alloc(kind, span);
        self.nodes[copy.index()].parent = new_parent;
        copy
    }

    /// Write the checked type of `id`
    pub fn set_type(&mut self, id: NodeId, ty: TypeId) {
        let slot = &mut self.nodes[id.index()].ty;
        debug_assert!(
            slot.map_or(true, |prev| prev == ty),
            "checked type of {} rewritten without invalidation",
            id
        );
        *slot = Some(ty);
    }

    /// Drop the cached type of `id` and of every ancestor
    pub fn invalidate_types_upward(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node) = current {
            self.nodes[node.index()].ty = None;
            current = self.parent(node);
        }
    }

    pub fn clear_types_recursively(&mut self, id: NodeId) {
        for node in self.subtree(id) {
            self.nodes[node.index()].ty = None;
        }
    }

    pub fn set_span_recursively(&mut self, id: NodeId, span: Span) {
        for node in self.subtree(id) {
            self.nodes[node.index()].span = span;
        }
    }

    /// Deep comparison of two subtrees, possibly from different arenas.
    /// Ids, spans, types and bindings are ignored.
    pub fn structurally_equal(&self, a: NodeId, other: &AstArena, b: NodeId) -> bool {
        let (left, right) = (self.kind(a), other.kind(b));
        let (left_children, right_children) = (left.children(), right.children());
        if left_children.len() != right_children.len() {
            return false;
        }
        let mut left_shape = left.clone();
        let mut right_shape = right.clone();
        for slot in left_shape.child_slots_mut() {
            *slot = NodeId::invalid();
        }
        for slot in right_shape.child_slots_mut() {
            *slot = NodeId::invalid();
        }
        left_shape == right_shape
            && left_children
                .iter()
                .zip(right_children.iter())
                .all(|(l, r)| self.structurally_equal(*l, other, *r))
    }

    pub fn mark(&self) -> ArenaMark {
        ArenaMark(self.nodes.len())
    }

    /// Free every node allocated since `mark`. Callers restore parent links
    /// of older nodes they touched.
    pub fn rollback(&mut self, mark: ArenaMark) {
        self.nodes.truncate(mark.0);
    }
}
