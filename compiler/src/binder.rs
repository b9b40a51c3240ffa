//! Scopes and variable bindings
//!
//! The binder walks an arena subtree, gives every scope-bearing node a
//! [`Scope`], declares the names introduced inside it and attaches a
//! [`VariableId`] to each identifier in reference position. Lowering calls
//! [`Binder::resolve_references_for_subtree`] again for every spliced
//! replacement, against the scope enclosing the splice point.
//!
//! Function, class and interface names are hoisted to the start of their
//! scope; `let`/`const` names become visible after their initializer.

use std::fmt;
use std::ops::{Deref, DerefMut};

use indexmap::IndexMap;
use log::trace;

use crate::ast::{AstArena, MethodKind, NodeKind, Span, VarKind};
use crate::error::{LoweringError, LoweringResult};
use crate::id_types::{NodeId, ScopeId, VariableId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    Module,
    Class,
    Interface,
    Function,
    Block,
}

impl ScopeKind {
    /// Scope created for a scope-bearing node
    fn of(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Program { .. } => Some(ScopeKind::Module),
            NodeKind::ClassDeclaration { .. } => Some(ScopeKind::Class),
            NodeKind::InterfaceDeclaration { .. } => Some(ScopeKind::Interface),
            NodeKind::ScriptFunction { .. } => Some(ScopeKind::Function),
            NodeKind::BlockStatement { .. } | NodeKind::BlockExpression { .. } => Some(ScopeKind::Block),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Node that bears this scope
    pub owner: NodeId,
    /// In declaration order
    pub bindings: IndexMap<String, VariableId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Let,
    Const,
    Param,
    Field,
    Method,
    Accessor,
    Function,
    Class,
    Interface,
}

impl VariableKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariableKind::Let => "let",
            VariableKind::Const => "const",
            VariableKind::Param => "parameter",
            VariableKind::Field => "field",
            VariableKind::Method => "method",
            VariableKind::Accessor => "accessor",
            VariableKind::Function => "function",
            VariableKind::Class => "class",
            VariableKind::Interface => "interface",
        }
    }

    pub fn is_member(self) -> bool {
        matches!(
            self,
            VariableKind::Field | VariableKind::Method | VariableKind::Accessor
        )
    }

    /// Two declarations of these kinds under one name share a variable
    fn overloads(self, other: VariableKind, scope: ScopeKind) -> bool {
        let callable = |k: VariableKind| matches!(k, VariableKind::Method | VariableKind::Accessor);
        if callable(self) && callable(other) {
            return true;
        }
        // an interface field and a user accessor of the same name are merged
        // when the field is rewritten into accessors
        scope == ScopeKind::Interface
            && matches!(
                (self, other),
                (VariableKind::Field, VariableKind::Accessor) | (VariableKind::Accessor, VariableKind::Field)
            )
    }
}

impl fmt::Display for VariableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    /// First declaration; overloads are reached through it
    pub declaration: NodeId,
    pub kind: VariableKind,
}

/// Declaration name and variable kind of a declaring node
pub fn declaration_of(arena: &AstArena, node: NodeId) -> Option<(NodeId, VariableKind)> {
    match arena.kind(node) {
        NodeKind::VariableDeclaration { kind, name, .. } => Some((
            *name,
            match kind {
                VarKind::Let => VariableKind::Let,
                VarKind::Const => VariableKind::Const,
            },
        )),
        NodeKind::FunctionDeclaration { name, .. } => Some((*name, VariableKind::Function)),
        NodeKind::Parameter { name, .. } => Some((*name, VariableKind::Param)),
        NodeKind::ClassDeclaration { name, .. } => Some((*name, VariableKind::Class)),
        NodeKind::InterfaceDeclaration { name, .. } => Some((*name, VariableKind::Interface)),
        NodeKind::ClassProperty { name, .. } => Some((*name, VariableKind::Field)),
        NodeKind::MethodDefinition { kind, name, .. } => Some((
            *name,
            match kind {
                MethodKind::Get | MethodKind::Set => VariableKind::Accessor,
                MethodKind::Method | MethodKind::Constructor => VariableKind::Method,
            },
        )),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Binder {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
    current: Option<ScopeId>,
}

/// Restores the binder's current scope when dropped
pub struct ScopeGuard<'b> {
    binder: &'b mut Binder,
    saved: Option<ScopeId>,
}

impl Deref for ScopeGuard<'_> {
    type Target = Binder;

    fn deref(&self) -> &Binder {
        self.binder
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Binder {
        self.binder
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.binder.current = self.saved;
    }
}

impl Binder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn variable(&self, id: VariableId) -> &Variable {
        &self.variables[id.index()]
    }

    pub fn current_scope(&self) -> Option<ScopeId> {
        self.current
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    /// Make `scope` current until the guard is dropped
    pub fn enter_scope(&mut self, scope: ScopeId) -> ScopeGuard<'_> {
        self.enter(Some(scope))
    }

    fn enter(&mut self, scope: Option<ScopeId>) -> ScopeGuard<'_> {
        let saved = std::mem::replace(&mut self.current, scope);
        ScopeGuard { binder: self, saved }
    }

    /// Bind a freshly converted program; returns the module scope
    pub fn bind_program(&mut self, arena: &mut AstArena, root: NodeId) -> LoweringResult<ScopeId> {
        self.resolve_references_for_subtree(arena, root, None)?;
        arena
            .get(root)
            .scope
            .ok_or_else(|| LoweringError::internal("program root was not given a scope", arena.span(root)))
    }

    /// Declare the names introduced by `node`'s subtree and bind every
    /// reference in it. Declarations land in `enclosing` unless a
    /// scope-bearing node inside the subtree introduces its own scope.
    pub fn resolve_references_for_subtree(
        &mut self,
        arena: &mut AstArena,
        node: NodeId,
        enclosing: Option<ScopeId>,
    ) -> LoweringResult<()> {
        trace!("resolving {} in {:?}", arena.kind(node).name(), enclosing);
        let mut guard = self.enter(enclosing);
        guard.visit(arena, node)
    }

    fn visit(&mut self, arena: &mut AstArena, node: NodeId) -> LoweringResult<()> {
        if let Some(name) = arena.identifier_name(node) {
            if arena.is_reference_identifier(node) {
                let variable = self.find_decl(name);
                arena.get_mut(node).variable = variable;
            }
            return Ok(());
        }

        let declared = declaration_of(arena, node);
        if let Some((name, VariableKind::Let | VariableKind::Const)) = declared {
            for child in arena.children(node) {
                if child != name {
                    self.visit(arena, child)?;
                }
            }
            self.declare_node(arena, node)?;
            return Ok(());
        }
        if declared.is_some() {
            self.declare_node(arena, node)?;
        }

        if let Some(kind) = ScopeKind::of(arena.kind(node)) {
            let scope = self.open_scope(arena, node, kind);
            let mut guard = self.enter(Some(scope));
            guard.hoist(arena, node)?;
            for child in arena.children(node) {
                guard.visit(arena, child)?;
            }
        } else {
            for child in arena.children(node) {
                self.visit(arena, child)?;
            }
        }
        Ok(())
    }

    /// Reuse the scope `node` already owns, emptied, or create one
    fn open_scope(&mut self, arena: &mut AstArena, node: NodeId, kind: ScopeKind) -> ScopeId {
        if let Some(existing) = arena.get(node).scope {
            let scope = &mut self.scopes[existing.index()];
            scope.bindings.clear();
            scope.parent = self.current;
            return existing;
        }
        let id = ScopeId::from_index(self.scopes.len());
        self.scopes.push(Scope {
            kind,
            parent: self.current,
            owner: node,
            bindings: IndexMap::new(),
        });
        arena.get_mut(node).scope = Some(id);
        id
    }

    fn hoist(&mut self, arena: &mut AstArena, node: NodeId) -> LoweringResult<()> {
        let items = match arena.kind(node) {
            NodeKind::Program { statements }
            | NodeKind::BlockStatement { statements }
            | NodeKind::BlockExpression { statements } => statements.clone(),
            NodeKind::ClassDeclaration { body, .. } => body.clone(),
            NodeKind::InterfaceDeclaration { body, .. } => match arena.kind(*body) {
                NodeKind::InterfaceBody { members } => members.clone(),
                _ => Vec::new(),
            },
            _ => return Ok(()),
        };
        for item in items {
            if matches!(
                arena.kind(item),
                NodeKind::FunctionDeclaration { .. }
                    | NodeKind::ClassDeclaration { .. }
                    | NodeKind::InterfaceDeclaration { .. }
                    | NodeKind::ClassProperty { .. }
                    | NodeKind::MethodDefinition { .. }
            ) {
                self.declare_node(arena, item)?;
            }
        }
        Ok(())
    }

    fn declare_node(&mut self, arena: &mut AstArena, node: NodeId) -> LoweringResult<VariableId> {
        let Some((name_id, kind)) = declaration_of(arena, node) else {
            return Err(LoweringError::internal(
                format!("{} does not declare a name", arena.kind(node).name()),
                arena.span(node),
            ));
        };
        let span = arena.span(name_id);
        let name = arena
            .identifier_name(name_id)
            .ok_or_else(|| LoweringError::internal("declaration name is not an identifier", span))?
            .to_string();
        let variable = if kind == VariableKind::Param {
            self.add_param_decl(&name, node, span)?
        } else {
            self.declare(&name, node, kind, span)?
        };
        arena.get_mut(node).variable = Some(variable);
        arena.get_mut(name_id).variable = Some(variable);
        Ok(variable)
    }

    pub fn add_param_decl(&mut self, name: &str, decl: NodeId, span: Span) -> LoweringResult<VariableId> {
        self.declare(name, decl, VariableKind::Param, span)
    }

    /// Add `name` to the current scope. Declaring the same node twice and
    /// overloading methods return the existing variable.
    pub fn declare(&mut self, name: &str, decl: NodeId, kind: VariableKind, span: Span) -> LoweringResult<VariableId> {
        let scope = self
            .current
            .ok_or_else(|| LoweringError::internal(format!("'{}' declared outside any scope", name), span))?;
        if let Some(existing) = self.find_local(scope, name) {
            let variable = self.variable(existing);
            if variable.declaration == decl || variable.kind.overloads(kind, self.scope(scope).kind) {
                return Ok(existing);
            }
            self.throw_on_redeclaration(span, name, kind)?;
        }
        let id = VariableId::from_index(self.variables.len());
        self.variables.push(Variable {
            name: name.to_string(),
            declaration: decl,
            kind,
        });
        self.scopes[scope.index()].bindings.insert(name.to_string(), id);
        Ok(id)
    }

    /// Look `name` up through the current scope chain
    pub fn find_decl(&self, name: &str) -> Option<VariableId> {
        self.current.and_then(|scope| self.find_decl_from(scope, name))
    }

    pub fn find_decl_from(&self, scope: ScopeId, name: &str) -> Option<VariableId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.scope(id);
            if let Some(&variable) = scope.bindings.get(name) {
                return Some(variable);
            }
            current = scope.parent;
        }
        None
    }

    pub fn find_local(&self, scope: ScopeId, name: &str) -> Option<VariableId> {
        self.scope(scope).bindings.get(name).copied()
    }

    /// Fail if `name` is already bound in the current scope
    pub fn throw_on_redeclaration(&self, span: Span, name: &str, kind: VariableKind) -> LoweringResult<()> {
        match self.current.and_then(|scope| self.find_local(scope, name)) {
            Some(_) => Err(LoweringError::Redeclaration {
                name: name.to_string(),
                kind: kind.as_str(),
                span,
            }),
            None => Ok(()),
        }
    }

    /// Members declared in the scope of a class or interface declaration
    pub fn members<'b>(&'b self, arena: &AstArena, decl: NodeId) -> impl Iterator<Item = (&'b str, VariableId)> + 'b {
        arena
            .get(decl)
            .scope
            .map(|scope| self.scope(scope))
            .into_iter()
            .flat_map(|scope| scope.bindings.iter().map(|(name, id)| (name.as_str(), *id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::from_syntax::SyntaxConverter;

    fn bind(src: &str) -> (AstArena, NodeId, Binder, LoweringResult<ScopeId>) {
        let module = parser::parse_module(src).unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &module).unwrap();
        let mut binder = Binder::new();
        let result = binder.bind_program(&mut arena, root);
        (arena, root, binder, result)
    }

    fn references(arena: &AstArena, root: NodeId, name: &str) -> Vec<NodeId> {
        arena
            .subtree(root)
            .into_iter()
            .filter(|&n| arena.identifier_name(n) == Some(name) && arena.is_reference_identifier(n))
            .collect()
    }

    #[test]
    fn test_references_bind_to_declarations() {
        let (arena, root, binder, result) = bind("let a: int = 1; a += 2; function f(p: int): int { return p + a; }");
        let module = result.unwrap();
        let a = binder.find_local(module, "a").unwrap();
        for reference in references(&arena, root, "a") {
            assert_eq!(arena.get(reference).variable, Some(a));
        }
        let p = references(&arena, root, "p");
        assert_eq!(p.len(), 1);
        let variable = binder.variable(arena.get(p[0]).variable.unwrap());
        assert_eq!(variable.kind, VariableKind::Param);
        assert!(binder.find_local(module, "f").is_some());
    }

    #[test]
    fn test_functions_are_hoisted() {
        let (arena, root, _binder, result) = bind("f(); function f(): void {}");
        result.unwrap();
        let calls = references(&arena, root, "f");
        assert!(arena.get(calls[0]).variable.is_some());
    }

    #[test]
    fn test_let_is_not_visible_in_its_initializer() {
        let (arena, root, _binder, result) = bind("let a: int = a;");
        result.unwrap();
        let reference = references(&arena, root, "a")[0];
        assert_eq!(arena.get(reference).variable, None);
    }

    #[test]
    fn test_redeclaration() {
        let (_, _, _, result) = bind("let a: int = 1; let a: int = 2;");
        match result.unwrap_err() {
            LoweringError::Redeclaration { name, kind, .. } => {
                assert_eq!(name, "a");
                assert_eq!(kind, "let");
            }
            other => panic!("expected a redeclaration, got {:?}", other),
        }
    }

    #[test]
    fn test_accessors_overload() {
        let src = "class C { get x(): int { return 1; } set x(v: int) {} }";
        let (arena, _root, binder, result) = bind(src);
        let module = result.unwrap();
        let class = binder.variable(binder.find_local(module, "C").unwrap()).declaration;
        let members: Vec<_> = binder.members(&arena, class).collect();
        assert_eq!(members.len(), 1);
        assert_eq!(binder.variable(members[0].1).kind, VariableKind::Accessor);
    }

    #[test]
    fn test_shadowing_in_block() {
        let (_, _, _, result) = bind("let a: int = 1; { let a: int = 2; }");
        assert!(result.is_ok());
    }

    #[test]
    fn test_rebinding_reuses_scopes() {
        let (mut arena, root, mut binder, result) = bind("let a: int = 1; { a = 2; }");
        result.unwrap();
        let scopes = binder.scope_count();
        binder.resolve_references_for_subtree(&mut arena, root, None).unwrap();
        assert_eq!(binder.scope_count(), scopes);
        assert!(binder.current_scope().is_none());
    }

    #[test]
    fn test_scope_guard_restores() {
        let (_, _, mut binder, result) = bind("let a: int = 1;");
        let module = result.unwrap();
        {
            let guard = binder.enter_scope(module);
            assert!(guard.find_decl("a").is_some());
            assert!(guard
                .throw_on_redeclaration(Span::default(), "a", VariableKind::Let)
                .is_err());
        }
        assert!(binder.find_decl("a").is_none());
    }
}
