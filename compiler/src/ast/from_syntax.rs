//! Move parser syntax trees into an [`AstArena`]
//!
//! While converting a format template, placeholders are replaced by the
//! caller's insertions. A fragment lands exactly where its placeholder stood;
//! an index used a second time splices a deep clone so every node keeps a
//! single parent.

use fxhash::FxHashSet;
use parser::{
    Block, ClassDecl, ClassElement, ClassElementKind, Expr, ExprKind, FormatErrorCode, FunctionDecl, Ident,
    InterfaceDecl, Item, Module, Param, Placeholder, PlaceholderKind, Stmt, StmtKind, Type, TypeKind,
};

use crate::ast::{AstArena, MemberKind, NodeKind, Span};
use crate::error::{LoweringError, LoweringResult};
use crate::id_types::NodeId;

/// A prebuilt fragment filling one placeholder index
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    Node(NodeId),
    /// For `@@S`, `@@[N` and `@@[E` placeholders
    List(Vec<NodeId>),
}

impl Insertion {
    /// Every node referenced by this insertion
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            Insertion::Node(id) => std::slice::from_ref(id),
            Insertion::List(ids) => ids,
        }
    }
}

impl From<NodeId> for Insertion {
    fn from(id: NodeId) -> Self {
        Insertion::Node(id)
    }
}

impl From<Vec<NodeId>> for Insertion {
    fn from(ids: Vec<NodeId>) -> Self {
        Insertion::List(ids)
    }
}

/// Check every placeholder of a template against the insertion list before
/// anything is allocated
pub fn validate_placeholders(
    arena: &AstArena,
    placeholders: &[Placeholder],
    insertions: &[Insertion],
) -> LoweringResult<()> {
    for p in placeholders {
        let Some(insertion) = insertions.get(p.index - 1) else {
            return Err(LoweringError::format(
                FormatErrorCode::InsertNodeAbsent,
                format!(
                    "placeholder '{}' has no insertion ({} supplied)",
                    p,
                    insertions.len()
                ),
                p.span,
            ));
        };
        let accepted = match (p.is_list(), insertion) {
            (true, Insertion::List(items)) => items.iter().all(|item| {
                let kind = arena.kind(*item);
                match p.kind {
                    PlaceholderKind::Statements => kind.is_statement() || kind.is_expression(),
                    PlaceholderKind::Expression => kind.is_expression(),
                    PlaceholderKind::Node => true,
                    PlaceholderKind::Identifier | PlaceholderKind::Type => false,
                }
            }),
            (false, Insertion::Node(id)) => {
                let kind = arena.kind(*id);
                match p.kind {
                    PlaceholderKind::Expression => kind.is_expression(),
                    PlaceholderKind::Identifier => kind.identifier_name().is_some(),
                    PlaceholderKind::Type => kind.is_type(),
                    PlaceholderKind::Node => true,
                    PlaceholderKind::Statements => false,
                }
            }
            _ => false,
        };
        if !accepted {
            return Err(mismatch(p, arena, insertion));
        }
    }
    Ok(())
}

fn mismatch(p: &Placeholder, arena: &AstArena, insertion: &Insertion) -> LoweringError {
    let found = match insertion {
        Insertion::Node(id) => arena.kind(*id).name().to_string(),
        Insertion::List(items) => format!("a list of {} nodes", items.len()),
    };
    LoweringError::format(
        FormatErrorCode::InvalidInsertNode,
        format!("placeholder '{}' cannot take {}", p, found),
        p.span,
    )
}

pub struct SyntaxConverter<'a> {
    arena: &'a mut AstArena,
    insertions: &'a [Insertion],
    used: FxHashSet<usize>,
}

impl<'a> SyntaxConverter<'a> {
    pub fn new(arena: &'a mut AstArena, insertions: &'a [Insertion]) -> Self {
        Self {
            arena,
            insertions,
            used: FxHashSet::default(),
        }
    }

    /// Convert a whole parsed file into a `Program` node
    pub fn convert_module(arena: &mut AstArena, module: &Module) -> LoweringResult<NodeId> {
        SyntaxConverter::new(arena, &[]).module(module)
    }

    pub fn module(&mut self, module: &Module) -> LoweringResult<NodeId> {
        let statements = self.stmt_items(&module.items)?;
        Ok(self.arena.alloc(NodeKind::Program { statements }, module.span))
    }

    // =========================================================================
    // Placeholders
    // =========================================================================

    fn insertion(&self, p: &Placeholder) -> LoweringResult<&'a Insertion> {
        self.insertions.get(p.index - 1).ok_or_else(|| {
            LoweringError::format(
                FormatErrorCode::InsertNodeAbsent,
                format!("placeholder '{}' has no insertion", p),
                p.span,
            )
        })
    }

    /// The fragment for `p`, cloned when the index was already spliced
    fn take(&mut self, p: &Placeholder) -> LoweringResult<NodeId> {
        match self.insertion(p)? {
            Insertion::Node(id) => {
                if self.used.insert(p.index) {
                    Ok(*id)
                } else {
                    Ok(self.arena.clone_subtree(*id, None))
                }
            }
            other => Err(mismatch(p, self.arena, other)),
        }
    }

    fn take_list(&mut self, p: &Placeholder) -> LoweringResult<Vec<NodeId>> {
        match self.insertion(p)? {
            Insertion::List(items) => {
                if self.used.insert(p.index) {
                    Ok(items.clone())
                } else {
                    Ok(items
                        .iter()
                        .map(|item| self.arena.clone_subtree(*item, None))
                        .collect())
                }
            }
            other => Err(mismatch(p, self.arena, other)),
        }
    }

    fn wrong_position(&self, p: &Placeholder, id: NodeId, position: &str) -> LoweringError {
        LoweringError::format(
            FormatErrorCode::InvalidInsertNode,
            format!(
                "placeholder '{}' in {} cannot take {}",
                p,
                position,
                self.arena.kind(id).name()
            ),
            p.span,
        )
    }

    /// Statements stay as they are; expressions get an expression statement
    fn as_statement(&mut self, id: NodeId, p: &Placeholder) -> LoweringResult<NodeId> {
        let kind = self.arena.kind(id);
        if kind.is_statement() {
            Ok(id)
        } else if kind.is_expression() {
            let span = self.arena.span(id);
            Ok(self.arena.alloc(NodeKind::ExpressionStatement { expr: id }, span))
        } else {
            Err(self.wrong_position(p, id, "a statement list"))
        }
    }

    // =========================================================================
    // Names and types
    // =========================================================================

    fn ident(&mut self, ident: &Ident) -> LoweringResult<NodeId> {
        match ident {
            Ident::Name { name, span } => Ok(self.arena.alloc(NodeKind::Identifier { name: name.clone() }, *span)),
            Ident::Placeholder(p) => {
                let id = self.take(p)?;
                if self.arena.identifier_name(id).is_none() {
                    return Err(self.wrong_position(p, id, "a name position"));
                }
                Ok(id)
            }
        }
    }

    fn opt_ident(&mut self, ident: &Option<Ident>) -> LoweringResult<Option<NodeId>> {
        ident.as_ref().map(|i| self.ident(i)).transpose()
    }

    fn idents(&mut self, idents: &[Ident]) -> LoweringResult<Vec<NodeId>> {
        idents.iter().map(|i| self.ident(i)).collect()
    }

    pub fn type_node(&mut self, ty: &Type) -> LoweringResult<NodeId> {
        let kind = match &ty.kind {
            TypeKind::Named(name) => NodeKind::TypeReference { name: name.clone() },
            TypeKind::Union(arms) => NodeKind::UnionType {
                types: arms.iter().map(|arm| self.type_node(arm)).collect::<LoweringResult<_>>()?,
            },
            TypeKind::Array(element) => NodeKind::ArrayType {
                element: self.type_node(element)?,
            },
            TypeKind::Placeholder(p) => {
                let id = self.take(p)?;
                if !self.arena.kind(id).is_type() {
                    return Err(self.wrong_position(p, id, "a type position"));
                }
                return Ok(id);
            }
        };
        Ok(self.arena.alloc(kind, ty.span))
    }

    fn opt_type(&mut self, ty: &Option<Type>) -> LoweringResult<Option<NodeId>> {
        ty.as_ref().map(|t| self.type_node(t)).transpose()
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    pub fn expr(&mut self, expr: &Expr) -> LoweringResult<NodeId> {
        let kind = match &expr.kind {
            ExprKind::Number(value) => NodeKind::NumberLiteral { value: value.clone() },
            ExprKind::BigInt(digits) => NodeKind::BigIntLiteral { digits: digits.clone() },
            ExprKind::String(value) => NodeKind::StringLiteral { value: value.clone() },
            ExprKind::Bool(value) => NodeKind::BooleanLiteral { value: *value },
            ExprKind::Undefined => NodeKind::UndefinedLiteral,
            ExprKind::Null => NodeKind::NullLiteral,
            ExprKind::This => NodeKind::ThisExpression,
            ExprKind::Ident(ident) => return self.ident(ident),
            ExprKind::Member { object, property } => NodeKind::MemberExpression {
                kind: MemberKind::Property,
                object: self.expr(object)?,
                property: self.ident(property)?,
            },
            ExprKind::Index { object, index } => NodeKind::MemberExpression {
                kind: MemberKind::Element,
                object: self.expr(object)?,
                property: self.expr(index)?,
            },
            ExprKind::Call { callee, args } => NodeKind::CallExpression {
                callee: self.expr(callee)?,
                arguments: self.expr_items(args)?,
            },
            ExprKind::New { class, args } => NodeKind::NewExpression {
                class: self.ident(class)?,
                arguments: self.expr_items(args)?,
            },
            ExprKind::Array(items) => NodeKind::ArrayExpression {
                elements: self.expr_items(items)?,
            },
            ExprKind::Binary { op, left, right } => NodeKind::BinaryExpression {
                op: *op,
                left: self.expr(left)?,
                right: self.expr(right)?,
            },
            ExprKind::Unary { op, operand } => NodeKind::UnaryExpression {
                op: *op,
                operand: self.expr(operand)?,
            },
            ExprKind::Update { op, prefix, operand } => NodeKind::UpdateExpression {
                op: *op,
                prefix: *prefix,
                operand: self.expr(operand)?,
            },
            ExprKind::Assign { op, target, value } => NodeKind::AssignmentExpression {
                op: *op,
                target: self.expr(target)?,
                value: self.expr(value)?,
            },
            ExprKind::Conditional {
                test,
                consequent,
                alternate,
            } => NodeKind::ConditionalExpression {
                test: self.expr(test)?,
                consequent: self.expr(consequent)?,
                alternate: self.expr(alternate)?,
            },
            ExprKind::As { expr: inner, ty } => NodeKind::AsExpression {
                expr: self.expr(inner)?,
                ty: self.type_node(ty)?,
            },
            ExprKind::Block(block) => NodeKind::BlockExpression {
                statements: self.stmt_items(&block.items)?,
            },
            ExprKind::Placeholder(p) => {
                let id = self.take(p)?;
                if !self.arena.kind(id).is_expression() {
                    return Err(self.wrong_position(p, id, "an expression position"));
                }
                return Ok(id);
            }
        };
        Ok(self.arena.alloc(kind, expr.span))
    }

    fn opt_expr(&mut self, expr: &Option<Expr>) -> LoweringResult<Option<NodeId>> {
        expr.as_ref().map(|e| self.expr(e)).transpose()
    }

    /// Argument and array element lists, with `@@[E` splices
    fn expr_items(&mut self, items: &[Item<Expr>]) -> LoweringResult<Vec<NodeId>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::Node(expr) => out.push(self.expr(expr)?),
                Item::Splice(p) => {
                    for id in self.take_list(p)? {
                        if !self.arena.kind(id).is_expression() {
                            return Err(self.wrong_position(p, id, "an argument list"));
                        }
                        out.push(id);
                    }
                }
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Statements
    // =========================================================================

    pub fn stmt_items(&mut self, items: &[Item<Stmt>]) -> LoweringResult<Vec<NodeId>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::Node(stmt) => out.push(self.stmt(stmt)?),
                Item::Splice(p) => {
                    for id in self.take_list(p)? {
                        let stmt = self.as_statement(id, p)?;
                        out.push(stmt);
                    }
                }
            }
        }
        Ok(out)
    }

    fn block(&mut self, block: &Block) -> LoweringResult<NodeId> {
        let statements = self.stmt_items(&block.items)?;
        Ok(self.arena.alloc(NodeKind::BlockStatement { statements }, block.span))
    }

    pub fn stmt(&mut self, stmt: &Stmt) -> LoweringResult<NodeId> {
        let span = stmt.span;
        let kind = match &stmt.kind {
            StmtKind::Var { kind, name, ty, init } => NodeKind::VariableDeclaration {
                kind: *kind,
                name: self.ident(name)?,
                ty: self.opt_type(ty)?,
                init: self.opt_expr(init)?,
            },
            StmtKind::Block(block) => return self.block(block),
            StmtKind::If {
                test,
                consequent,
                alternate,
            } => NodeKind::IfStatement {
                test: self.expr(test)?,
                consequent: self.stmt(consequent)?,
                alternate: alternate.as_ref().map(|s| self.stmt(s)).transpose()?,
            },
            StmtKind::While { test, body } => NodeKind::WhileStatement {
                test: self.expr(test)?,
                body: self.stmt(body)?,
            },
            StmtKind::Return(argument) => NodeKind::ReturnStatement {
                argument: self.opt_expr(argument)?,
            },
            StmtKind::Empty => NodeKind::EmptyStatement,
            StmtKind::Expr(expr) => NodeKind::ExpressionStatement { expr: self.expr(expr)? },
            StmtKind::Function(decl) => return self.function_decl(decl, span),
            StmtKind::Class(decl) => return self.class_decl(decl, span),
            StmtKind::Interface(decl) => return self.interface_decl(decl, span),
            StmtKind::Placeholder(p) => {
                let id = self.take(p)?;
                return self.as_statement(id, p);
            }
        };
        Ok(self.arena.alloc(kind, span))
    }

    fn params(&mut self, params: &[Param]) -> LoweringResult<Vec<NodeId>> {
        params
            .iter()
            .map(|param| {
                let name = self.ident(&param.name)?;
                let ty = self.type_node(&param.ty)?;
                Ok(self.arena.alloc(NodeKind::Parameter { name, ty }, param.span))
            })
            .collect()
    }

    fn function(
        &mut self,
        params: &[Param],
        return_type: &Option<Type>,
        body: Option<&Block>,
        span: Span,
    ) -> LoweringResult<NodeId> {
        let params = self.params(params)?;
        let return_type = self.opt_type(return_type)?;
        let body = body.map(|b| self.block(b)).transpose()?;
        Ok(self.arena.alloc(
            NodeKind::ScriptFunction {
                params,
                return_type,
                body,
            },
            span,
        ))
    }

    fn function_decl(&mut self, decl: &FunctionDecl, span: Span) -> LoweringResult<NodeId> {
        let name = self.ident(&decl.name)?;
        let function = self.function(&decl.params, &decl.return_type, Some(&decl.body), span)?;
        Ok(self.arena.alloc(NodeKind::FunctionDeclaration { name, function }, span))
    }

    pub fn class_decl(&mut self, decl: &ClassDecl, span: Span) -> LoweringResult<NodeId> {
        let name = self.ident(&decl.name)?;
        let extends = self.opt_ident(&decl.extends)?;
        let implements = self.idents(&decl.implements)?;
        let body = self.member_items(&decl.body)?;
        Ok(self.arena.alloc(
            NodeKind::ClassDeclaration {
                modifiers: decl.modifiers,
                name,
                extends,
                implements,
                body,
            },
            span,
        ))
    }

    fn interface_decl(&mut self, decl: &InterfaceDecl, span: Span) -> LoweringResult<NodeId> {
        let name = self.ident(&decl.name)?;
        let extends = self.idents(&decl.extends)?;
        let members = self.member_items(&decl.body)?;
        let body = self.arena.alloc(NodeKind::InterfaceBody { members }, decl.body_span);
        Ok(self.arena.alloc(NodeKind::InterfaceDeclaration { name, extends, body }, span))
    }

    // =========================================================================
    // Class members
    // =========================================================================

    fn member_items(&mut self, items: &[Item<ClassElement>]) -> LoweringResult<Vec<NodeId>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Item::Node(element) => out.push(self.class_element(element)?),
                Item::Splice(p) => {
                    for id in self.take_list(p)? {
                        if !self.arena.kind(id).is_class_element() {
                            return Err(self.wrong_position(p, id, "a member list"));
                        }
                        out.push(id);
                    }
                }
            }
        }
        Ok(out)
    }

    pub fn class_element(&mut self, element: &ClassElement) -> LoweringResult<NodeId> {
        let kind = match &element.kind {
            ClassElementKind::Property { name, ty, init } => NodeKind::ClassProperty {
                modifiers: element.modifiers,
                name: self.ident(name)?,
                ty: self.type_node(ty)?,
                init: self.opt_expr(init)?,
            },
            ClassElementKind::Method {
                kind,
                name,
                params,
                return_type,
                body,
            } => {
                let name = self.ident(name)?;
                let function = self.function(params, return_type, body.as_ref(), element.span)?;
                NodeKind::MethodDefinition {
                    kind: *kind,
                    modifiers: element.modifiers,
                    name,
                    function,
                    overloads: Vec::new(),
                }
            }
            ClassElementKind::Placeholder(p) => {
                let id = self.take(p)?;
                if !self.arena.kind(id).is_class_element() {
                    return Err(self.wrong_position(p, id, "a member position"));
                }
                return Ok(id);
            }
        };
        Ok(self.arena.alloc(kind, element.span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_module_sets_parents() {
        let module = parser::parse_module("let a: int = 1; a += 2;").unwrap();
        let mut arena = AstArena::new();
        let root = SyntaxConverter::convert_module(&mut arena, &module).unwrap();
        assert_eq!(arena.parent(root), None);
        arena.iterate_recursively(root, |node| {
            let parent = arena.parent(node).expect("every descendant has a parent");
            assert!(arena.children(parent).contains(&node));
        });
    }

    #[test]
    fn test_validate_rejects_missing_and_mismatched() {
        let mut arena = AstArena::new();
        let number = arena.alloc(NodeKind::NumberLiteral { value: "1".into() }, Span::default());
        let p = Placeholder {
            kind: PlaceholderKind::Identifier,
            array: false,
            index: 1,
            span: Span::new(0, 4),
        };
        let err = validate_placeholders(&arena, &[p], &[]).unwrap_err();
        assert_eq!(err.format_code(), Some(FormatErrorCode::InsertNodeAbsent));
        let err = validate_placeholders(&arena, &[p], &[Insertion::Node(number)]).unwrap_err();
        assert_eq!(err.format_code(), Some(FormatErrorCode::InvalidInsertNode));
        let err = validate_placeholders(&arena, &[p], &[Insertion::List(vec![number])]).unwrap_err();
        assert_eq!(err.format_code(), Some(FormatErrorCode::InvalidInsertNode));
    }
}
