//! Type checker for arena ASTs
//!
//! [`Checker::check`] computes the type of a node, recursing into children
//! as needed, and caches it in the node's type slot so a second call is
//! free. Lowering re-runs it on every spliced subtree; cached types above a
//! splice point are dropped by the arena and recomputed on demand.
//!
//! User errors are collected as [`CheckError`]s and the offending node gets
//! the error type, which is compatible with everything so one mistake does
//! not cascade. `Err` is reserved for trees the checker cannot make sense of.

pub mod context;
pub mod types;

use fxhash::{FxHashMap, FxHashSet};
use indexmap::IndexMap;
use log::debug;

pub use context::{CheckerContext, CheckerStatus, SavedCheckerContext, ScopeContext};
pub use types::{PrimitiveKind, Type, TypeTable};

use crate::ast::{AstArena, BinaryOp, BoxingUnboxingFlags, MemberKind, MethodKind, ModifierFlags, NodeKind, Span, UnaryOp};
use crate::binder::{Binder, VariableKind};
use crate::error::{LoweringError, LoweringResult};
use crate::id_types::{NodeId, TypeId};

#[derive(Debug, Clone, PartialEq)]
pub struct CheckError {
    pub message: String,
    pub span: Span,
}

/// A field, accessor pair or method as seen from outside its class
#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub kind: VariableKind,
    pub decl: NodeId,
    /// Class or interface that declares it
    pub owner: NodeId,
    pub modifiers: ModifierFlags,
    /// Value type; a function type for methods
    pub ty: TypeId,
    pub readable: bool,
    pub writable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Default)]
pub struct Checker {
    types: TypeTable,
    context: CheckerContext,
    errors: Vec<CheckError>,
    member_cache: FxHashMap<NodeId, IndexMap<String, Member>>,
    /// Declarations whose supertypes are registered in the type table
    hierarchy_known: FxHashSet<NodeId>,
}

impl Checker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn types_mut(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    pub fn context(&self) -> &CheckerContext {
        &self.context
    }

    pub fn errors(&self) -> &[CheckError] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn take_errors(&mut self) -> Vec<CheckError> {
        std::mem::take(&mut self.errors)
    }

    /// Type of `node`, computed once and cached in its type slot
    pub fn check(&mut self, arena: &mut AstArena, binder: &Binder, node: NodeId) -> LoweringResult<TypeId> {
        if let Some(ty) = arena.get(node).ty {
            return Ok(ty);
        }
        let ty = self.check_node(arena, binder, node)?;
        arena.set_type(node, ty);
        Ok(ty)
    }

    pub fn check_program(&mut self, arena: &mut AstArena, binder: &Binder, root: NodeId) -> LoweringResult<()> {
        self.check(arena, binder, root)?;
        debug!("checked program: {} error(s)", self.errors.len());
        Ok(())
    }

    /// Forget member tables after a class or interface body was rewritten.
    /// Tables of subtypes embed inherited members, so all of them go.
    pub fn invalidate_declaration(&mut self, decl: NodeId) {
        debug!("invalidating member tables after rewrite of {}", decl);
        self.member_cache.clear();
    }

    fn report(&mut self, message: impl Into<String>, span: Span) -> TypeId {
        let message = message.into();
        debug!("type error at {}..{}: {}", span.start, span.end, message);
        self.errors.push(CheckError { message, span });
        self.types.error_type()
    }

    fn describe(&self, ty: TypeId) -> String {
        self.types.type_to_string(ty)
    }

    fn check_node(&mut self, arena: &mut AstArena, binder: &Binder, node: NodeId) -> LoweringResult<TypeId> {
        let span = arena.span(node);
        let kind = arena.kind(node).clone();
        let void = self.types.void_type();
        let ty = match kind {
            NodeKind::Program { statements }
            | NodeKind::BlockStatement { statements }
            | NodeKind::InterfaceBody { members: statements } => {
                for statement in statements {
                    self.check(arena, binder, statement)?;
                }
                void
            }

            NodeKind::Identifier { name } => self.identifier(arena, binder, node, &name)?,
            NodeKind::NumberLiteral { value } => {
                if is_floating(&value) {
                    self.types.double_type()
                } else {
                    self.types.int_type()
                }
            }
            NodeKind::BigIntLiteral { .. } => self.types.bigint_type(),
            NodeKind::StringLiteral { .. } => self.types.string_type(),
            NodeKind::BooleanLiteral { .. } => self.types.boolean_type(),
            NodeKind::UndefinedLiteral => self.types.undefined_type(),
            NodeKind::NullLiteral => self.types.null_type(),
            NodeKind::ThisExpression => match self.containing_class(arena, node) {
                Some(class) => self.nominal_type(arena, binder, class)?,
                None => self.report("'this' used outside of a class", span),
            },
            NodeKind::MemberExpression { kind, object, property } => {
                self.member_expression(arena, binder, node, kind, object, property, Access::Read)?
            }
            NodeKind::CallExpression { callee, arguments } => self.call(arena, binder, callee, &arguments, span)?,
            NodeKind::NewExpression { class, arguments } => self.new_expression(arena, binder, class, &arguments, span)?,
            NodeKind::ArrayExpression { elements } => {
                let mut arms = Vec::with_capacity(elements.len());
                for element in elements {
                    arms.push(self.check(arena, binder, element)?);
                }
                let element = if arms.is_empty() {
                    self.types.object_type()
                } else {
                    self.types.union(arms)
                };
                self.types.array(element)
            }
            NodeKind::BinaryExpression { op, left, right } => {
                let lhs = self.check(arena, binder, left)?;
                let rhs = self.check(arena, binder, right)?;
                self.binary(arena, op, (left, lhs), (right, rhs), span)
            }
            NodeKind::UnaryExpression { op, operand } => {
                let operand_ty = self.check(arena, binder, operand)?;
                self.unary(arena, op, operand, operand_ty, span)
            }
            NodeKind::UpdateExpression { op, operand, .. } => {
                let ty = self.target(arena, binder, operand, Access::ReadWrite)?;
                let numeric = self.types.numeric_kind(ty).is_some_and(PrimitiveKind::is_numeric);
                if numeric || ty == self.types.bigint_type() || self.types.is_error(ty) {
                    self.unbox(arena, operand, ty);
                    ty
                } else {
                    let shown = self.describe(ty);
                    self.report(format!("operator '{}' cannot be applied to '{}'", op.as_str(), shown), span)
                }
            }
            NodeKind::AssignmentExpression { op, target, value } => match op.binary_op() {
                None => {
                    let target_ty = self.target(arena, binder, target, Access::Write)?;
                    let value_ty = self.check(arena, binder, value)?;
                    self.expect_assignable(arena, value, value_ty, target_ty);
                    target_ty
                }
                Some(binary) => {
                    let target_ty = self.target(arena, binder, target, Access::ReadWrite)?;
                    let value_ty = self.check(arena, binder, value)?;
                    let result = self.binary(arena, binary, (target, target_ty), (value, value_ty), span);
                    if !self.castable(result, target_ty) {
                        let (from, to) = (self.describe(result), self.describe(target_ty));
                        self.report(
                            format!("result of '{}' has type '{}' which cannot be stored in '{}'", op.as_str(), from, to),
                            span,
                        );
                    }
                    target_ty
                }
            },
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                self.condition(arena, binder, test)?;
                let a = self.check(arena, binder, consequent)?;
                let b = self.check(arena, binder, alternate)?;
                self.types.union(vec![a, b])
            }
            NodeKind::AsExpression { expr, ty } => {
                let from = self.check(arena, binder, expr)?;
                let to = self.check(arena, binder, ty)?;
                if self.castable(from, to) {
                    self.coerce(arena, expr, from, to);
                    to
                } else {
                    let (a, b) = (self.describe(from), self.describe(to));
                    self.report(format!("cannot convert '{}' to '{}'", a, b), span)
                }
            }
            NodeKind::BlockExpression { statements } => {
                let mut value = void;
                for statement in &statements {
                    self.check(arena, binder, *statement)?;
                }
                if let Some(last) = statements.last() {
                    if let NodeKind::ExpressionStatement { expr } = arena.kind(*last) {
                        let expr = *expr;
                        value = self.check(arena, binder, expr)?;
                    }
                }
                value
            }

            NodeKind::ExpressionStatement { expr } => {
                self.check(arena, binder, expr)?;
                void
            }
            NodeKind::VariableDeclaration { ty, init, .. } => {
                let declared = ty.map(|ty| self.check(arena, binder, ty)).transpose()?;
                if let Some(init) = init {
                    let value = self.check(arena, binder, init)?;
                    if let Some(declared) = declared {
                        self.expect_assignable(arena, init, value, declared);
                    }
                }
                void
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                self.condition(arena, binder, test)?;
                self.check(arena, binder, consequent)?;
                if let Some(alternate) = alternate {
                    self.check(arena, binder, alternate)?;
                }
                void
            }
            NodeKind::WhileStatement { test, body } => {
                self.condition(arena, binder, test)?;
                self.check(arena, binder, body)?;
                void
            }
            NodeKind::ReturnStatement { argument } => {
                self.return_statement(arena, binder, node, argument)?;
                void
            }
            NodeKind::EmptyStatement => void,

            NodeKind::FunctionDeclaration { function, .. } => self.check(arena, binder, function)?,
            NodeKind::ScriptFunction { body, .. } => {
                let (params, ret) = self.signature(arena, binder, node)?;
                if let Some(body) = body {
                    self.check(arena, binder, body)?;
                }
                self.types.function(params, ret)
            }
            NodeKind::Parameter { ty, .. } => self.check(arena, binder, ty)?,
            NodeKind::ClassDeclaration { body, implements, .. } => {
                let ty = self.nominal_type(arena, binder, node)?;
                for member in body {
                    self.check(arena, binder, member)?;
                }
                self.check_implements(arena, binder, node, &implements)?;
                ty
            }
            NodeKind::InterfaceDeclaration { body, .. } => {
                let ty = self.nominal_type(arena, binder, node)?;
                self.check(arena, binder, body)?;
                ty
            }
            NodeKind::ClassProperty { ty, init, .. } => {
                let declared = self.check(arena, binder, ty)?;
                if let Some(init) = init {
                    let value = self.check(arena, binder, init)?;
                    self.expect_assignable(arena, init, value, declared);
                }
                declared
            }
            NodeKind::MethodDefinition { function, overloads, .. } => {
                let ty = self.check(arena, binder, function)?;
                for overload in overloads {
                    self.check(arena, binder, overload)?;
                }
                ty
            }

            NodeKind::TypeReference { name } => self.resolve_type_name(arena, binder, node, &name)?,
            NodeKind::UnionType { types } => {
                let mut arms = Vec::with_capacity(types.len());
                for arm in types {
                    arms.push(self.check(arena, binder, arm)?);
                }
                self.types.union(arms)
            }
            NodeKind::ArrayType { element } => {
                let element = self.check(arena, binder, element)?;
                self.types.array(element)
            }
        };
        Ok(ty)
    }

    // =========================================================================
    // Names and declarations
    // =========================================================================

    fn identifier(&mut self, arena: &mut AstArena, binder: &Binder, node: NodeId, name: &str) -> LoweringResult<TypeId> {
        let span = arena.span(node);
        if !arena.is_reference_identifier(node) {
            return Ok(self.types.void_type());
        }
        let Some(variable) = arena.get(node).variable else {
            return Ok(self.report(format!("cannot find name '{}'", name), span));
        };
        let variable = binder.variable(variable);
        let decl = variable.declaration;
        match variable.kind {
            VariableKind::Let | VariableKind::Const => match arena.kind(decl).clone() {
                NodeKind::VariableDeclaration { ty: Some(ty), .. } => self.check(arena, binder, ty),
                NodeKind::VariableDeclaration { init: Some(init), .. } => self.check(arena, binder, init),
                _ => Ok(self.types.undefined_type()),
            },
            VariableKind::Param => self.check(arena, binder, decl),
            VariableKind::Function => match arena.kind(decl) {
                NodeKind::FunctionDeclaration { function, .. } => {
                    let function = *function;
                    let (params, ret) = self.signature(arena, binder, function)?;
                    Ok(self.types.function(params, ret))
                }
                other => Err(LoweringError::internal(
                    format!("function binding points at {}", other.name()),
                    span,
                )),
            },
            VariableKind::Class | VariableKind::Interface => self.nominal_type(arena, binder, decl),
            VariableKind::Field | VariableKind::Method | VariableKind::Accessor => Ok(self.report(
                format!("member '{}' must be accessed through 'this'", name),
                span,
            )),
        }
    }

    /// Parameter and return types of a `ScriptFunction`
    fn signature(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        function: NodeId,
    ) -> LoweringResult<(Vec<TypeId>, TypeId)> {
        let NodeKind::ScriptFunction {
            params, return_type, ..
        } = arena.kind(function).clone()
        else {
            return Err(LoweringError::internal(
                format!("expected a function signature, found {}", arena.kind(function).name()),
                arena.span(function),
            ));
        };
        let mut param_types = Vec::with_capacity(params.len());
        for param in params {
            param_types.push(self.check(arena, binder, param)?);
        }
        let ret = match return_type {
            Some(ty) => self.check(arena, binder, ty)?,
            None => self.types.void_type(),
        };
        Ok((param_types, ret))
    }

    /// Class or interface type of a declaration, registering its supertypes
    /// the first time it is seen
    fn nominal_type(&mut self, arena: &AstArena, binder: &Binder, decl: NodeId) -> LoweringResult<TypeId> {
        let (name, supers, is_class) = match arena.kind(decl) {
            NodeKind::ClassDeclaration {
                name,
                extends,
                implements,
                ..
            } => (*name, extends.iter().chain(implements).copied().collect::<Vec<_>>(), true),
            NodeKind::InterfaceDeclaration { name, extends, .. } => (*name, extends.clone(), false),
            other => {
                return Err(LoweringError::internal(
                    format!("{} is not a class or interface", other.name()),
                    arena.span(decl),
                ))
            }
        };
        let name = arena.identifier_name(name).unwrap_or_default().to_string();
        let ty = if is_class {
            self.types.class(decl, &name)
        } else {
            self.types.interface(decl, &name)
        };
        if self.hierarchy_known.insert(decl) {
            let mut resolved = Vec::with_capacity(supers.len());
            for reference in supers {
                match self.nominal_declaration(arena, binder, reference) {
                    Some(super_decl) => resolved.push(self.nominal_type(arena, binder, super_decl)?),
                    None => {
                        let shown = arena.identifier_name(reference).unwrap_or_default().to_string();
                        self.report(format!("cannot find class or interface '{}'", shown), arena.span(reference));
                    }
                }
            }
            self.types.set_supertypes(decl, resolved);
        }
        Ok(ty)
    }

    /// Declaration a class or interface name refers to
    fn nominal_declaration(&self, arena: &AstArena, binder: &Binder, reference: NodeId) -> Option<NodeId> {
        let variable = binder.variable(arena.get(reference).variable?);
        matches!(variable.kind, VariableKind::Class | VariableKind::Interface).then_some(variable.declaration)
    }

    fn resolve_type_name(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        node: NodeId,
        name: &str,
    ) -> LoweringResult<TypeId> {
        if let Some(kind) = PrimitiveKind::from_name(name) {
            return Ok(self.types.primitive(kind));
        }
        if let Some(kind) = PrimitiveKind::from_boxed_name(name) {
            return Ok(self.types.boxed(kind));
        }
        let builtin = match name {
            "string" => Some(self.types.string_type()),
            "bigint" => Some(self.types.bigint_type()),
            "undefined" => Some(self.types.undefined_type()),
            "null" => Some(self.types.null_type()),
            "void" => Some(self.types.void_type()),
            "Object" => Some(self.types.object_type()),
            _ => None,
        };
        if let Some(ty) = builtin {
            return Ok(ty);
        }
        let span = arena.span(node);
        let scope = arena.enclosing_scope(node).or(self.context.scope);
        let found = scope
            .and_then(|scope| binder.find_decl_from(scope, name))
            .map(|variable| binder.variable(variable));
        match found {
            Some(variable) if matches!(variable.kind, VariableKind::Class | VariableKind::Interface) => {
                self.nominal_type(arena, binder, variable.declaration)
            }
            Some(_) => Ok(self.report(format!("'{}' is not a type", name), span)),
            None => Ok(self.report(format!("cannot find type '{}'", name), span)),
        }
    }

    fn containing_class(&self, arena: &AstArena, node: NodeId) -> Option<NodeId> {
        self.context
            .containing_class
            .or_else(|| arena.find_ancestor(node, |kind| matches!(kind, NodeKind::ClassDeclaration { .. })))
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Member `name` of a class or interface, including inherited ones
    pub fn member(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        decl: NodeId,
        name: &str,
    ) -> LoweringResult<Option<Member>> {
        self.ensure_members(arena, binder, decl)?;
        Ok(self.member_cache.get(&decl).and_then(|table| table.get(name)).cloned())
    }

    /// Every member of a class or interface, inherited ones first
    pub fn members(&mut self, arena: &mut AstArena, binder: &Binder, decl: NodeId) -> LoweringResult<Vec<Member>> {
        self.ensure_members(arena, binder, decl)?;
        Ok(self
            .member_cache
            .get(&decl)
            .map(|table| table.values().cloned().collect())
            .unwrap_or_default())
    }

    fn ensure_members(&mut self, arena: &mut AstArena, binder: &Binder, decl: NodeId) -> LoweringResult<()> {
        if self.member_cache.contains_key(&decl) {
            return Ok(());
        }
        // placeholder entry stops a cyclic hierarchy from recursing forever
        self.member_cache.insert(decl, IndexMap::new());

        let (supers, own) = match arena.kind(decl) {
            NodeKind::ClassDeclaration {
                extends,
                implements,
                body,
                ..
            } => (extends.iter().chain(implements).copied().collect::<Vec<_>>(), body.clone()),
            NodeKind::InterfaceDeclaration { extends, body, .. } => {
                let members = match arena.kind(*body) {
                    NodeKind::InterfaceBody { members } => members.clone(),
                    _ => Vec::new(),
                };
                (extends.clone(), members)
            }
            _ => (Vec::new(), Vec::new()),
        };

        let mut table = IndexMap::new();
        for reference in supers {
            if let Some(super_decl) = self.nominal_declaration(arena, binder, reference) {
                self.ensure_members(arena, binder, super_decl)?;
                if let Some(inherited) = self.member_cache.get(&super_decl) {
                    for (name, member) in inherited {
                        table.insert(name.clone(), member.clone());
                    }
                }
            }
        }
        for member in own {
            self.collect_member(arena, binder, decl, member, &mut table)?;
        }
        self.member_cache.insert(decl, table);
        Ok(())
    }

    fn collect_member(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        owner: NodeId,
        member: NodeId,
        table: &mut IndexMap<String, Member>,
    ) -> LoweringResult<()> {
        match arena.kind(member).clone() {
            NodeKind::ClassProperty {
                modifiers, name, ty, ..
            } => {
                let name = arena.identifier_name(name).unwrap_or_default().to_string();
                let mut ty = self.check(arena, binder, ty)?;
                if modifiers.contains(ModifierFlags::OPTIONAL) {
                    let undefined = self.types.undefined_type();
                    ty = self.types.union(vec![ty, undefined]);
                }
                table.insert(
                    name.clone(),
                    Member {
                        name,
                        kind: VariableKind::Field,
                        decl: member,
                        owner,
                        modifiers,
                        ty,
                        readable: true,
                        writable: !modifiers.contains(ModifierFlags::READONLY),
                    },
                );
            }
            NodeKind::MethodDefinition {
                kind,
                modifiers,
                name,
                function,
                overloads,
            } => {
                let name = arena.identifier_name(name).unwrap_or_default().to_string();
                let (params, ret) = self.signature(arena, binder, function)?;
                let pairs_with_existing = table
                    .get(&name)
                    .is_some_and(|existing| existing.owner == owner && existing.kind == VariableKind::Accessor);
                match kind {
                    MethodKind::Get | MethodKind::Set if pairs_with_existing => {
                        if let Some(existing) = table.get_mut(&name) {
                            if kind == MethodKind::Get {
                                existing.ty = ret;
                                existing.readable = true;
                            } else {
                                existing.writable = true;
                            }
                        }
                    }
                    MethodKind::Get | MethodKind::Set => {
                        let is_getter = kind == MethodKind::Get;
                        let ty = if is_getter {
                            ret
                        } else {
                            params.first().copied().unwrap_or_else(|| self.types.error_type())
                        };
                        table.insert(
                            name.clone(),
                            Member {
                                name,
                                kind: VariableKind::Accessor,
                                decl: member,
                                owner,
                                modifiers,
                                ty,
                                readable: is_getter,
                                writable: !is_getter,
                            },
                        );
                    }
                    MethodKind::Method | MethodKind::Constructor => {
                        let ty = self.types.function(params, ret);
                        table.insert(
                            name.clone(),
                            Member {
                                name,
                                kind: VariableKind::Method,
                                decl: member,
                                owner,
                                modifiers,
                                ty,
                                readable: true,
                                writable: false,
                            },
                        );
                    }
                }
                for overload in overloads {
                    self.collect_member(arena, binder, owner, overload, table)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn member_expression(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        node: NodeId,
        kind: MemberKind,
        object: NodeId,
        property: NodeId,
        access: Access,
    ) -> LoweringResult<TypeId> {
        let span = arena.span(node);
        let object_ty = self.check(arena, binder, object)?;
        if self.types.is_error(object_ty) {
            return Ok(object_ty);
        }

        if kind == MemberKind::Element {
            let index_ty = self.check(arena, binder, property)?;
            let integral = self.types.numeric_kind(index_ty).is_some_and(PrimitiveKind::is_integral);
            if !integral && !self.types.is_error(index_ty) {
                let shown = self.describe(index_ty);
                return Ok(self.report(format!("array index must be integral, found '{}'", shown), span));
            }
            self.unbox(arena, property, index_ty);
            return Ok(match self.types.get(object_ty) {
                Type::Array(element) => *element,
                _ => {
                    let shown = self.describe(object_ty);
                    self.report(format!("type '{}' cannot be indexed", shown), span)
                }
            });
        }

        let name = arena.identifier_name(property).unwrap_or_default().to_string();
        let decl = match self.types.get(object_ty) {
            Type::Array(_) | Type::String if name == "length" => {
                if access != Access::Read {
                    return Ok(self.report("'length' is read-only", span));
                }
                return Ok(self.types.int_type());
            }
            Type::Class { decl, .. } | Type::Interface { decl, .. } => *decl,
            _ => {
                let shown = self.describe(object_ty);
                return Ok(self.report(format!("property '{}' does not exist on type '{}'", name, shown), span));
            }
        };
        let Some(member) = self.member(arena, binder, decl, &name)? else {
            let shown = self.describe(object_ty);
            return Ok(self.report(format!("property '{}' does not exist on type '{}'", name, shown), span));
        };

        if member.modifiers.contains(ModifierFlags::PRIVATE)
            && !self.context.ignores_visibility()
            && self.containing_class(arena, node) != Some(member.owner)
        {
            return Ok(self.report(format!("'{}' is private and only accessible inside its class", name), span));
        }
        if access != Access::Write && !member.readable {
            return Ok(self.report(format!("'{}' has a setter but no getter", name), span));
        }
        if access != Access::Read && !member.writable {
            let in_constructor = member.kind == VariableKind::Field
                && arena
                    .find_ancestor(node, |kind| {
                        matches!(
                            kind,
                            NodeKind::MethodDefinition {
                                kind: MethodKind::Constructor,
                                ..
                            }
                        )
                    })
                    .is_some_and(|ctor| arena.parent(ctor) == Some(member.owner));
            if !in_constructor {
                return Ok(self.report(format!("cannot assign to read-only member '{}'", name), span));
            }
        }
        Ok(member.ty)
    }

    /// Type of an assignment or update target, with writability checks
    fn target(&mut self, arena: &mut AstArena, binder: &Binder, target: NodeId, access: Access) -> LoweringResult<TypeId> {
        let span = arena.span(target);
        match arena.kind(target).clone() {
            NodeKind::Identifier { name } => {
                let ty = self.check(arena, binder, target)?;
                if let Some(variable) = arena.get(target).variable {
                    match binder.variable(variable).kind {
                        VariableKind::Const => {
                            return Ok(self.report(format!("cannot assign to constant '{}'", name), span))
                        }
                        VariableKind::Let | VariableKind::Param => {}
                        other => {
                            return Ok(self.report(format!("cannot assign to {} '{}'", other, name), span));
                        }
                    }
                }
                Ok(ty)
            }
            NodeKind::MemberExpression { kind, object, property } => {
                if let Some(ty) = arena.get(target).ty {
                    return Ok(ty);
                }
                let ty = self.member_expression(arena, binder, target, kind, object, property, access)?;
                arena.set_type(target, ty);
                Ok(ty)
            }
            _ => Ok(self.report("invalid assignment target", span)),
        }
    }

    fn check_implements(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        class: NodeId,
        implements: &[NodeId],
    ) -> LoweringResult<()> {
        for &reference in implements {
            let Some(interface) = self.nominal_declaration(arena, binder, reference) else {
                continue;
            };
            if !matches!(arena.kind(interface), NodeKind::InterfaceDeclaration { .. }) {
                self.report("a class can only implement interfaces", arena.span(reference));
                continue;
            }
            for required in self.members(arena, binder, interface)? {
                let Some(provided) = self.member(arena, binder, class, &required.name)? else {
                    continue;
                };
                if provided.owner != class {
                    continue;
                }
                if !self.types.is_assignable(provided.ty, required.ty) {
                    let (have, want) = (self.describe(provided.ty), self.describe(required.ty));
                    let interface_name = arena.identifier_name(reference).unwrap_or_default().to_string();
                    self.report(
                        format!(
                            "'{}' has type '{}' but interface '{}' requires '{}'",
                            required.name, have, interface_name, want
                        ),
                        arena.span(provided.decl),
                    );
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn call(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        callee: NodeId,
        arguments: &[NodeId],
        span: Span,
    ) -> LoweringResult<TypeId> {
        let callee_ty = self.check(arena, binder, callee)?;
        let mut argument_types = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            argument_types.push(self.check(arena, binder, argument)?);
        }
        match self.types.get(callee_ty).clone() {
            Type::Function { params, ret } => {
                self.check_arguments(arena, arguments, &argument_types, &params, span);
                Ok(ret)
            }
            Type::Error => Ok(callee_ty),
            _ => {
                let shown = self.describe(callee_ty);
                Ok(self.report(format!("type '{}' is not callable", shown), span))
            }
        }
    }

    fn check_arguments(
        &mut self,
        arena: &mut AstArena,
        arguments: &[NodeId],
        argument_types: &[TypeId],
        params: &[TypeId],
        span: Span,
    ) {
        if params.len() != arguments.len() {
            self.report(
                format!("expected {} argument(s), found {}", params.len(), arguments.len()),
                span,
            );
            return;
        }
        for ((&argument, &ty), &param) in arguments.iter().zip(argument_types).zip(params) {
            self.expect_assignable(arena, argument, ty, param);
        }
    }

    fn new_expression(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        class: NodeId,
        arguments: &[NodeId],
        span: Span,
    ) -> LoweringResult<TypeId> {
        let mut argument_types = Vec::with_capacity(arguments.len());
        for &argument in arguments {
            argument_types.push(self.check(arena, binder, argument)?);
        }
        let name = arena.identifier_name(class).unwrap_or_default().to_string();
        let Some(decl) = self.nominal_declaration(arena, binder, class) else {
            return Ok(self.report(format!("cannot find class '{}'", name), span));
        };
        if !matches!(arena.kind(decl), NodeKind::ClassDeclaration { .. }) {
            return Ok(self.report(format!("cannot instantiate interface '{}'", name), span));
        }
        let ty = self.check(arena, binder, class)?;
        let params = match self.member(arena, binder, decl, "constructor")? {
            Some(ctor) => match self.types.get(ctor.ty) {
                Type::Function { params, .. } => params.clone(),
                _ => Vec::new(),
            },
            None => Vec::new(),
        };
        self.check_arguments(arena, arguments, &argument_types, &params, span);
        Ok(ty)
    }

    fn binary(
        &mut self,
        arena: &mut AstArena,
        op: BinaryOp,
        (left, lhs): (NodeId, TypeId),
        (right, rhs): (NodeId, TypeId),
        span: Span,
    ) -> TypeId {
        if self.types.is_error(lhs) || self.types.is_error(rhs) {
            return self.types.error_type();
        }
        let boolean = self.types.boolean_type();
        if op.is_logical() {
            if self.types.is_assignable(lhs, boolean) && self.types.is_assignable(rhs, boolean) {
                self.unbox(arena, left, lhs);
                self.unbox(arena, right, rhs);
                return boolean;
            }
            return self.operator_error(op, lhs, rhs, span);
        }
        if matches!(op, BinaryOp::Eq | BinaryOp::NotEq) {
            return boolean;
        }

        let string = self.types.string_type();
        if op == BinaryOp::Add && (lhs == string || rhs == string) {
            return string;
        }
        let bigint = self.types.bigint_type();
        if lhs == bigint && rhs == bigint && op != BinaryOp::Ushr {
            return if op.is_comparison() { boolean } else { bigint };
        }

        let numeric = |kind: Option<PrimitiveKind>| kind.filter(|k| k.is_numeric());
        let (Some(a), Some(b)) = (
            numeric(self.types.numeric_kind(lhs)),
            numeric(self.types.numeric_kind(rhs)),
        ) else {
            return self.operator_error(op, lhs, rhs, span);
        };
        if op.is_bitwise() && !(a.is_integral() && b.is_integral()) {
            return self.operator_error(op, lhs, rhs, span);
        }
        self.unbox(arena, left, lhs);
        self.unbox(arena, right, rhs);
        if op.is_comparison() {
            return boolean;
        }
        let result = match op {
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::Ushr => a.arithmetic_result(a),
            _ => a.arithmetic_result(b),
        };
        self.types.primitive(result)
    }

    fn operator_error(&mut self, op: BinaryOp, lhs: TypeId, rhs: TypeId, span: Span) -> TypeId {
        let (a, b) = (self.describe(lhs), self.describe(rhs));
        self.report(
            format!("operator '{}' cannot be applied to '{}' and '{}'", op.as_str(), a, b),
            span,
        )
    }

    fn unary(&mut self, arena: &mut AstArena, op: UnaryOp, operand: NodeId, ty: TypeId, span: Span) -> TypeId {
        if self.types.is_error(ty) {
            return ty;
        }
        let kind = self.types.numeric_kind(ty);
        let result = match op {
            UnaryOp::Not => kind.filter(|k| *k == PrimitiveKind::Boolean),
            UnaryOp::Neg | UnaryOp::Plus => kind.filter(|k| k.is_numeric()).map(|k| k.arithmetic_result(k)),
            UnaryOp::BitNot => kind.filter(|k| k.is_integral()).map(|k| k.arithmetic_result(k)),
        };
        match result {
            Some(kind) => {
                self.unbox(arena, operand, ty);
                self.types.primitive(kind)
            }
            None if ty == self.types.bigint_type() && matches!(op, UnaryOp::Neg | UnaryOp::BitNot) => ty,
            None => {
                let shown = self.describe(ty);
                self.report(format!("operator '{}' cannot be applied to '{}'", op.as_str(), shown), span)
            }
        }
    }

    fn condition(&mut self, arena: &mut AstArena, binder: &Binder, test: NodeId) -> LoweringResult<()> {
        let ty = self.check(arena, binder, test)?;
        let boolean = self.types.boolean_type();
        if self.types.is_assignable(ty, boolean) {
            self.coerce(arena, test, ty, boolean);
        } else {
            let shown = self.describe(ty);
            self.report(format!("condition must be boolean, found '{}'", shown), arena.span(test));
        }
        Ok(())
    }

    fn return_statement(
        &mut self,
        arena: &mut AstArena,
        binder: &Binder,
        node: NodeId,
        argument: Option<NodeId>,
    ) -> LoweringResult<()> {
        let function = arena.find_ancestor(node, |kind| matches!(kind, NodeKind::ScriptFunction { .. }));
        let declared = match function.map(|f| arena.kind(f)) {
            Some(NodeKind::ScriptFunction {
                return_type: Some(ty), ..
            }) => {
                let ty = *ty;
                Some(self.check(arena, binder, ty)?)
            }
            _ => None,
        };
        match (argument, declared) {
            (Some(argument), Some(declared)) => {
                let ty = self.check(arena, binder, argument)?;
                self.expect_assignable(arena, argument, ty, declared);
            }
            (Some(argument), None) => {
                self.check(arena, binder, argument)?;
            }
            (None, Some(declared)) => {
                let undefined = self.types.undefined_type();
                if declared != self.types.void_type() && !self.types.is_assignable(undefined, declared) {
                    let shown = self.describe(declared);
                    self.report(format!("missing return value of type '{}'", shown), arena.span(node));
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    // =========================================================================
    // Conversions
    // =========================================================================

    /// `as` is allowed between related types and between numeric types
    fn castable(&self, from: TypeId, to: TypeId) -> bool {
        if self.types.is_assignable(from, to) || self.types.is_assignable(to, from) {
            return true;
        }
        let numeric = |ty| self.types.numeric_kind(ty).is_some_and(PrimitiveKind::is_numeric);
        numeric(from) && numeric(to)
    }

    fn expect_assignable(&mut self, arena: &mut AstArena, node: NodeId, source: TypeId, target: TypeId) {
        let integer_literal = matches!(arena.kind(node), NodeKind::NumberLiteral { value } if !is_floating(value));
        let numeric_target = self.types.numeric_kind(target).is_some_and(PrimitiveKind::is_numeric);
        if self.types.is_assignable(source, target) || (integer_literal && numeric_target) {
            self.coerce(arena, node, source, target);
        } else {
            let (a, b) = (self.describe(source), self.describe(target));
            self.report(
                format!("type '{}' is not assignable to type '{}'", a, b),
                arena.span(node),
            );
        }
    }

    /// Record the implicit boxing or unboxing a value needs to fit its slot
    fn coerce(&mut self, arena: &mut AstArena, node: NodeId, source: TypeId, target: TypeId) {
        let flag = match self.types.get(source) {
            Type::Primitive(kind) if self.types.is_reference(target) => BoxingUnboxingFlags::box_to(*kind),
            Type::Boxed(kind) if self.types.is_primitive(target) => BoxingUnboxingFlags::unbox_to(*kind),
            _ => return,
        };
        arena.get_mut(node).boxing_flags.insert(flag);
    }

    fn unbox(&mut self, arena: &mut AstArena, node: NodeId, ty: TypeId) {
        if let Type::Boxed(kind) = self.types.get(ty) {
            arena
                .get_mut(node)
                .boxing_flags
                .insert(BoxingUnboxingFlags::unbox_to(*kind));
        }
    }
}

fn is_floating(literal: &str) -> bool {
    let hex = literal.starts_with("0x") || literal.starts_with("0X");
    !hex && literal.contains(['.', 'e', 'E'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::from_syntax::SyntaxConverter;

    struct Checked {
        arena: AstArena,
        root: NodeId,
        binder: Binder,
        checker: Checker,
    }

    fn check_with(src: &str, status: CheckerStatus) -> Checked {
        let module = parser::parse_module(src).unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &module).unwrap();
        let mut binder = Binder::new();
        binder.bind_program(&mut arena, root).unwrap();
        let mut checker = Checker::new();
        {
            let mut saved = SavedCheckerContext::new(&mut checker, status, None);
            saved.check_program(&mut arena, &binder, root).unwrap();
        }
        Checked {
            arena,
            root,
            binder,
            checker,
        }
    }

    fn check(src: &str) -> Checked {
        check_with(src, CheckerStatus::NONE)
    }

    fn messages(checked: &Checked) -> Vec<&str> {
        checked.checker.errors().iter().map(|e| e.message.as_str()).collect()
    }

    fn find(checked: &Checked, pred: impl Fn(&NodeKind) -> bool) -> NodeId {
        checked
            .arena
            .subtree(checked.root)
            .into_iter()
            .find(|&n| pred(checked.arena.kind(n)))
            .expect("node present")
    }

    #[test]
    fn test_well_typed_program() {
        let checked = check("let a: int = 1; a += 2; let d: double = a * 1.5;");
        assert!(checked.checker.errors().is_empty(), "{:?}", messages(&checked));
        let compound = find(&checked, |k| matches!(k, NodeKind::AssignmentExpression { .. }));
        let ty = checked.arena.get(compound).ty.unwrap();
        assert_eq!(checked.checker.types().type_to_string(ty), "int");
    }

    #[test]
    fn test_check_is_cached() {
        let mut checked = check("let a: int = 1;");
        let types_before = checked.checker.types().len();
        let ty = checked
            .checker
            .check(&mut checked.arena, &checked.binder, checked.root)
            .unwrap();
        assert_eq!(ty, checked.checker.types().void_type());
        assert_eq!(checked.checker.types().len(), types_before);
    }

    #[test]
    fn test_assignment_mismatch() {
        let checked = check("let a: int = 1; a = \"text\";");
        assert_eq!(messages(&checked), vec!["type 'string' is not assignable to type 'int'"]);
    }

    #[test]
    fn test_compound_assignment_may_narrow() {
        let checked = check("let b: byte = 1; b += 1; b <<= 2;");
        assert!(checked.checker.errors().is_empty(), "{:?}", messages(&checked));
        let bad = check("let s: string = \"a\"; s -= 1;");
        assert_eq!(bad.checker.error_count(), 1);
    }

    #[test]
    fn test_const_is_not_assignable() {
        let checked = check("const c: int = 1; c += 1;");
        assert_eq!(messages(&checked), vec!["cannot assign to constant 'c'"]);
    }

    #[test]
    fn test_private_member_visibility() {
        let src = "class C { private x: int = 1; read(): int { return this.x; } } \
                   function f(c: C): int { return c.x; }";
        let checked = check(src);
        assert_eq!(checked.checker.error_count(), 1);
        assert!(messages(&checked)[0].contains("private"));

        let relaxed = check_with(src, CheckerStatus::IGNORE_VISIBILITY);
        assert!(relaxed.checker.errors().is_empty());
    }

    #[test]
    fn test_interface_accessors() {
        let src = "interface I { get x(): int; set x(value: int): void; readonly y: int; } \
                   function f(i: I): int { i.x = 2; return i.x + i.y; }";
        let checked = check(src);
        assert!(checked.checker.errors().is_empty(), "{:?}", messages(&checked));

        let readonly = check("interface I { readonly y: int; } function f(i: I): void { i.y = 1; }");
        assert_eq!(messages(&readonly), vec!["cannot assign to read-only member 'y'"]);
    }

    #[test]
    fn test_inherited_members_and_implements() {
        let src = "interface A { x?: number; } interface B extends A {} \
                   class C implements B { x: number = 1; } \
                   function f(c: C): B { return c; }";
        let checked = check(src);
        assert!(checked.checker.errors().is_empty(), "{:?}", messages(&checked));

        let incompatible = check("interface I { x: int; } class C implements I { x: string = \"\"; }");
        assert_eq!(incompatible.checker.error_count(), 1);
    }

    #[test]
    fn test_boxing_flags() {
        let checked = check("let o: Object = 1; function f(a: Int, b: int): int { return a + b; }");
        assert!(checked.checker.errors().is_empty(), "{:?}", messages(&checked));
        let literal = find(&checked, |k| matches!(k, NodeKind::NumberLiteral { .. }));
        assert!(checked.arena.get(literal).boxing_flags.contains(BoxingUnboxingFlags::BOX_TO_INT));
        let a = checked
            .arena
            .subtree(checked.root)
            .into_iter()
            .find(|&n| checked.arena.identifier_name(n) == Some("a") && checked.arena.is_reference_identifier(n))
            .unwrap();
        let flags = checked.arena.get(a).boxing_flags;
        assert!(flags.contains(BoxingUnboxingFlags::UNBOX_TO_INT));
        assert!(!flags.has_boxing());
    }

    #[test]
    fn test_arrays_and_blocks() {
        let src = "let xs: int[] = [1, 2]; xs[0] += 1; let n: int = xs.length; \
                   let v: int = ({ let t: int = xs[1]; t; });";
        let checked = check(src);
        assert!(checked.checker.errors().is_empty(), "{:?}", messages(&checked));
    }

    #[test]
    fn test_calls_and_new() {
        let src = "class P { constructor(a: int) {} m(x: double): boolean { return x > 1; } } \
                   let p: P = new P(1); let ok: boolean = p.m(2);";
        let checked = check(src);
        assert!(checked.checker.errors().is_empty(), "{:?}", messages(&checked));

        let arity = check("function f(a: int): void {} f();");
        assert_eq!(messages(&arity), vec!["expected 1 argument(s), found 0"]);
    }

    #[test]
    fn test_unknown_names() {
        let checked = check("let a: Missing = b;");
        assert_eq!(
            messages(&checked),
            vec!["cannot find type 'Missing'", "cannot find name 'b'"]
        );
    }
}
