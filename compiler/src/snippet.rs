//! Build AST fragments from source text
//!
//! A lowering phase describes replacement code as a short snippet of
//! surface syntax. The `create_*` functions parse plain text; the
//! `create_formatted_*` variants also accept `@@` placeholders filled from an
//! insertion list:
//!
//! ```text
//! @@I1 = (@@I2 + (@@E3)) as @@T4
//! ```
//!
//! Each call parses with a fresh [`ParserContext`](parser::ParserContext),
//! so building a snippet never disturbs a parse in progress. Fragments come
//! back detached (no parent); [`LoweringContext::integrate`] splices them in.
//!
//! A failing build allocates nothing that stays reachable: placeholders are
//! checked against the insertions before conversion starts, and anything
//! allocated by a conversion that fails later is rolled back.
//!
//! [`LoweringContext::integrate`]: crate::lowering::LoweringContext::integrate

use log::trace;
use parser::{
    parse_snippet_with_status, CollectPlaceholders, ModifierFlags, ParserStatus, Snippet, SnippetKind, StmtKind,
};

use crate::ast::from_syntax::{validate_placeholders, Insertion, SyntaxConverter};
use crate::ast::{AstArena, NodeKind, Span};
use crate::error::{LoweringError, LoweringResult};
use crate::id_types::NodeId;

pub struct SnippetBuilder<'a> {
    arena: &'a mut AstArena,
}

impl<'a> SnippetBuilder<'a> {
    pub fn new(arena: &'a mut AstArena) -> Self {
        Self { arena }
    }

    pub fn arena(&mut self) -> &mut AstArena {
        self.arena
    }

    // =========================================================================
    // Plain snippets
    // =========================================================================

    /// `flags` are extra parser status bits, e.g. `IN_CLASS_BODY`
    pub fn create_expression(&mut self, text: &str, flags: ParserStatus) -> LoweringResult<NodeId> {
        self.formatted_expression(text, flags, false, &[])
    }

    /// Exactly one statement
    pub fn create_statement(&mut self, text: &str) -> LoweringResult<NodeId> {
        let statements = self.statements(text, false, &[])?;
        single(statements, text, "statement")
    }

    pub fn create_statements(&mut self, text: &str) -> LoweringResult<Vec<NodeId>> {
        self.statements(text, false, &[])
    }

    /// One top-level statement, which may be a declaration
    pub fn create_top_level_statement(&mut self, text: &str) -> LoweringResult<NodeId> {
        self.top_level(text, false, &[])
    }

    pub fn create_type_annotation(&mut self, text: &str) -> LoweringResult<NodeId> {
        self.type_annotation(text, false, &[])
    }

    /// A class member; `modifiers` are added to the ones written in `text`
    pub fn create_class_element(&mut self, text: &str, modifiers: ModifierFlags) -> LoweringResult<NodeId> {
        self.class_element(text, SnippetKind::ClassElement, modifiers, false, &[])
    }

    pub fn create_class_declaration(&mut self, text: &str) -> LoweringResult<NodeId> {
        self.class_declaration(text, false, &[])
    }

    pub fn create_constructor(&mut self, text: &str, modifiers: ModifierFlags) -> LoweringResult<NodeId> {
        self.class_element(text, SnippetKind::Constructor, modifiers, false, &[])
    }

    // =========================================================================
    // Format templates
    // =========================================================================

    pub fn create_formatted_expression(&mut self, text: &str, insertions: &[Insertion]) -> LoweringResult<NodeId> {
        self.formatted_expression(text, ParserStatus::NONE, true, insertions)
    }

    pub fn create_formatted_statement(&mut self, text: &str, insertions: &[Insertion]) -> LoweringResult<NodeId> {
        let statements = self.statements(text, true, insertions)?;
        single(statements, text, "statement")
    }

    pub fn create_formatted_statements(
        &mut self,
        text: &str,
        insertions: &[Insertion],
    ) -> LoweringResult<Vec<NodeId>> {
        self.statements(text, true, insertions)
    }

    pub fn create_formatted_top_level_statement(
        &mut self,
        text: &str,
        insertions: &[Insertion],
    ) -> LoweringResult<NodeId> {
        self.top_level(text, true, insertions)
    }

    pub fn create_formatted_type_annotation(
        &mut self,
        text: &str,
        insertions: &[Insertion],
    ) -> LoweringResult<NodeId> {
        self.type_annotation(text, true, insertions)
    }

    pub fn create_formatted_class_element(
        &mut self,
        text: &str,
        modifiers: ModifierFlags,
        insertions: &[Insertion],
    ) -> LoweringResult<NodeId> {
        self.class_element(text, SnippetKind::ClassElement, modifiers, true, insertions)
    }

    pub fn create_formatted_class_declaration(
        &mut self,
        text: &str,
        insertions: &[Insertion],
    ) -> LoweringResult<NodeId> {
        self.class_declaration(text, true, insertions)
    }

    pub fn create_formatted_constructor(
        &mut self,
        text: &str,
        modifiers: ModifierFlags,
        insertions: &[Insertion],
    ) -> LoweringResult<NodeId> {
        self.class_element(text, SnippetKind::Constructor, modifiers, true, insertions)
    }

    // =========================================================================
    // Shared machinery
    // =========================================================================

    /// Parse `text`, validate placeholders, then convert with rollback
    fn build<T, F>(
        &mut self,
        text: &str,
        kind: SnippetKind,
        flags: ParserStatus,
        format: bool,
        insertions: &[Insertion],
        convert: F,
    ) -> LoweringResult<T>
    where
        F: FnOnce(&mut SyntaxConverter<'_>, &Snippet) -> LoweringResult<T>,
    {
        trace!("building {:?} snippet: {}", kind, text);
        let snippet = parse_snippet_with_status(text, kind, format, flags)?;
        validate_placeholders(self.arena, &snippet.placeholders(), insertions)?;

        let mark = self.arena.mark();
        let saved_parents: Vec<(NodeId, Option<NodeId>)> = insertions
            .iter()
            .flat_map(|insertion| insertion.nodes().iter().copied())
            .map(|id| (id, self.arena.parent(id)))
            .collect();

        let result = {
            let mut converter = SyntaxConverter::new(self.arena, insertions);
            convert(&mut converter, &snippet)
        };
        if result.is_err() {
            self.arena.rollback(mark);
            for (id, parent) in saved_parents {
                self.arena.set_parent(id, parent);
            }
        }
        result
    }

    fn formatted_expression(
        &mut self,
        text: &str,
        flags: ParserStatus,
        format: bool,
        insertions: &[Insertion],
    ) -> LoweringResult<NodeId> {
        self.build(text, SnippetKind::Expression, flags, format, insertions, |conv, snippet| {
            match snippet {
                Snippet::Expression(expr) => conv.expr(expr),
                _ => Err(unexpected(text)),
            }
        })
    }

    fn statements(&mut self, text: &str, format: bool, insertions: &[Insertion]) -> LoweringResult<Vec<NodeId>> {
        self.build(
            text,
            SnippetKind::Statements,
            ParserStatus::NONE,
            format,
            insertions,
            |conv, snippet| match snippet {
                Snippet::Statements(items) => conv.stmt_items(items),
                _ => Err(unexpected(text)),
            },
        )
    }

    fn top_level(&mut self, text: &str, format: bool, insertions: &[Insertion]) -> LoweringResult<NodeId> {
        let statements = self.build(
            text,
            SnippetKind::TopLevel,
            ParserStatus::NONE,
            format,
            insertions,
            |conv, snippet| match snippet {
                Snippet::TopLevel(module) => conv.stmt_items(&module.items),
                _ => Err(unexpected(text)),
            },
        )?;
        single(statements, text, "top-level statement")
    }

    fn type_annotation(&mut self, text: &str, format: bool, insertions: &[Insertion]) -> LoweringResult<NodeId> {
        self.build(
            text,
            SnippetKind::TypeAnnotation,
            ParserStatus::NONE,
            format,
            insertions,
            |conv, snippet| match snippet {
                Snippet::Type(ty) => conv.type_node(ty),
                _ => Err(unexpected(text)),
            },
        )
    }

    fn class_element(
        &mut self,
        text: &str,
        kind: SnippetKind,
        modifiers: ModifierFlags,
        format: bool,
        insertions: &[Insertion],
    ) -> LoweringResult<NodeId> {
        let id = self.build(text, kind, ParserStatus::NONE, format, insertions, |conv, snippet| {
            match snippet {
                Snippet::ClassElement(element) => conv.class_element(element),
                _ => Err(unexpected(text)),
            }
        })?;
        match self.arena.kind_mut(id) {
            NodeKind::ClassProperty { modifiers: own, .. } | NodeKind::MethodDefinition { modifiers: own, .. } => {
                own.insert(modifiers)
            }
            _ => {}
        }
        Ok(id)
    }

    fn class_declaration(&mut self, text: &str, format: bool, insertions: &[Insertion]) -> LoweringResult<NodeId> {
        self.build(
            text,
            SnippetKind::ClassDeclaration,
            ParserStatus::NONE,
            format,
            insertions,
            |conv, snippet| match snippet {
                Snippet::ClassDeclaration(stmt) => match &stmt.kind {
                    StmtKind::Class(_) | StmtKind::Interface(_) => conv.stmt(stmt),
                    _ => Err(unexpected(text)),
                },
                _ => Err(unexpected(text)),
            },
        )
    }
}

fn unexpected(text: &str) -> LoweringError {
    LoweringError::internal(
        format!("snippet parser returned the wrong fragment kind for '{}'", text),
        Span::new(0, text.len()),
    )
}

fn single(mut statements: Vec<NodeId>, text: &str, what: &str) -> LoweringResult<NodeId> {
    if statements.len() == 1 {
        if let Some(stmt) = statements.pop() {
            return Ok(stmt);
        }
    }
    Err(LoweringError::Syntax {
        code: None,
        message: format!("expected exactly one {}, found {}", what, statements.len()),
        span: Span::new(0, text.len()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::printer::print;
    use parser::FormatErrorCode;

    fn ident(arena: &mut AstArena, name: &str) -> NodeId {
        arena.alloc(NodeKind::Identifier { name: name.into() }, Span::default())
    }

    #[test]
    fn test_plain_statement() {
        let mut arena = AstArena::new();
        let stmt = SnippetBuilder::new(&mut arena)
            .create_statement("let x: int = 1 + 2;")
            .unwrap();
        assert!(matches!(arena.kind(stmt), NodeKind::VariableDeclaration { .. }));
        assert_eq!(arena.parent(stmt), None);
    }

    #[test]
    fn test_statement_count_is_checked() {
        let mut arena = AstArena::new();
        let err = SnippetBuilder::new(&mut arena)
            .create_statement("a; b;")
            .unwrap_err();
        assert!(matches!(err, LoweringError::Syntax { code: None, .. }));
    }

    #[test]
    fn test_formatted_identifier_assignment() {
        let mut arena = AstArena::new();
        let target = ident(&mut arena, "x");
        let read = ident(&mut arena, "x");
        let value = ident(&mut arena, "y");
        let ty = SnippetBuilder::new(&mut arena).create_type_annotation("int").unwrap();
        let expr = SnippetBuilder::new(&mut arena)
            .create_formatted_expression(
                "@@I1 = (@@I2 + (@@E3)) as @@T4",
                &[target.into(), read.into(), value.into(), ty.into()],
            )
            .unwrap();
        assert_eq!(print(&arena, expr), "x = (x + y) as int");
        assert_eq!(arena.parent(target), Some(expr));
    }

    #[test]
    fn test_reused_index_is_cloned() {
        let mut arena = AstArena::new();
        let object = ident(&mut arena, "o");
        let expr = SnippetBuilder::new(&mut arena)
            .create_formatted_expression("@@E1.f = @@E1.f", &[object.into()])
            .unwrap();
        let mut objects = Vec::new();
        arena.iterate_recursively(expr, |node| {
            if arena.identifier_name(node) == Some("o") {
                objects.push(node);
            }
        });
        assert_eq!(objects.len(), 2);
        assert_ne!(objects[0], objects[1]);
        for node in objects {
            assert!(arena.parent(node).is_some());
        }
    }

    #[test]
    fn test_statement_list_splice() {
        let mut arena = AstArena::new();
        let hoisted = SnippetBuilder::new(&mut arena)
            .create_statements("let a: int = 1; let b: int = 2;")
            .unwrap();
        let call = SnippetBuilder::new(&mut arena).create_expression("f()", ParserStatus::NONE).unwrap();
        let expr = SnippetBuilder::new(&mut arena)
            .create_formatted_expression("({ @@S1 @@E2; })", &[hoisted.into(), call.into()])
            .unwrap();
        match arena.kind(expr) {
            NodeKind::BlockExpression { statements } => assert_eq!(statements.len(), 3),
            other => panic!("expected a block expression, got {:?}", other),
        }
    }

    #[test]
    fn test_spliced_list_keeps_growing() {
        let mut arena = AstArena::new();
        let hoisted = SnippetBuilder::new(&mut arena).create_statements("let a: int = 1;").unwrap();
        let call = SnippetBuilder::new(&mut arena).create_expression("f()", ParserStatus::NONE).unwrap();
        let expr = SnippetBuilder::new(&mut arena)
            .create_formatted_expression("({ @@S1 @@E2; })", &[hoisted.into(), call.into()])
            .unwrap();

        let late = SnippetBuilder::new(&mut arena).create_statement("let b: int = a;").unwrap();
        assert!(arena.insert_child(expr, 1, late));
        let tail = SnippetBuilder::new(&mut arena).create_statement("b;").unwrap();
        assert!(arena.push_child(expr, tail));

        assert_eq!(
            crate::ast::printer::print_compact(&arena, expr),
            "({ let a: int = 1; let b: int = a; f(); b; })"
        );
        for statement in arena.children(expr) {
            assert_eq!(arena.parent(statement), Some(expr));
        }
        assert!(crate::verifier::AstVerifier::with_default_checks()
            .verify(&arena, expr, None)
            .is_empty());
    }

    #[test]
    fn test_argument_splice() {
        let mut arena = AstArena::new();
        let a = ident(&mut arena, "a");
        let b = ident(&mut arena, "b");
        let call = SnippetBuilder::new(&mut arena)
            .create_formatted_expression("foo(@@[E1, 3)", &[vec![a, b].into()])
            .unwrap();
        assert_eq!(print(&arena, call), "foo(a, b, 3)");
    }

    #[test]
    fn test_expression_in_statement_position_is_wrapped() {
        let mut arena = AstArena::new();
        let value = ident(&mut arena, "v");
        let stmt = SnippetBuilder::new(&mut arena)
            .create_formatted_statement("@@E1", &[value.into()])
            .unwrap();
        assert!(matches!(arena.kind(stmt), NodeKind::ExpressionStatement { expr } if *expr == value));
    }

    #[test]
    fn test_failed_build_rolls_back() {
        let mut arena = AstArena::new();
        let value = ident(&mut arena, "v");
        let stmt = SnippetBuilder::new(&mut arena).create_top_level_statement("return;").err();
        assert!(stmt.is_some(), "return outside a function body is rejected");

        let before = arena.len();
        // @@N2 in expression position receives a statement
        let empty = arena.alloc(NodeKind::EmptyStatement, Span::default());
        let before_with_empty = arena.len();
        let err = SnippetBuilder::new(&mut arena)
            .create_formatted_expression("@@E1 + @@N2", &[value.into(), empty.into()])
            .unwrap_err();
        assert_eq!(err.format_code(), Some(FormatErrorCode::InvalidInsertNode));
        assert_eq!(arena.len(), before_with_empty);
        assert_eq!(arena.parent(value), None);
        assert!(before < before_with_empty);
    }

    #[test]
    fn test_placeholder_errors() {
        let mut arena = AstArena::new();
        let number = arena.alloc(NodeKind::NumberLiteral { value: "1".into() }, Span::default());
        let mut builder = SnippetBuilder::new(&mut arena);

        let absent = builder.create_formatted_expression("@@E2", &[number.into()]).unwrap_err();
        assert_eq!(absent.format_code(), Some(FormatErrorCode::InsertNodeAbsent));

        let mismatch = builder.create_formatted_expression("@@I1", &[number.into()]).unwrap_err();
        assert_eq!(mismatch.format_code(), Some(FormatErrorCode::InvalidInsertNode));

        let bad_kind = builder.create_formatted_expression("@@Q1", &[number.into()]).unwrap_err();
        assert_eq!(bad_kind.format_code(), Some(FormatErrorCode::InvalidFormatNode));

        let bad_index = builder.create_formatted_expression("@@E0", &[number.into()]).unwrap_err();
        assert_eq!(bad_index.format_code(), Some(FormatErrorCode::InvalidNumberNode));

        let plain = builder.create_expression("@@E1", ParserStatus::NONE).unwrap_err();
        assert!(matches!(plain, LoweringError::Syntax { code: None, .. }));
    }

    #[test]
    fn test_class_element_modifiers_are_added() {
        let mut arena = AstArena::new();
        let getter = SnippetBuilder::new(&mut arena)
            .create_class_element(
                "get x(): int;",
                ModifierFlags::PUBLIC.union(ModifierFlags::ABSTRACT),
            )
            .unwrap();
        match arena.kind(getter) {
            NodeKind::MethodDefinition { modifiers, .. } => {
                assert!(modifiers.contains(ModifierFlags::ABSTRACT));
                assert!(modifiers.contains(ModifierFlags::PUBLIC));
            }
            other => panic!("expected a method, got {:?}", other),
        }
    }

    #[test]
    fn test_constructor_and_declarations() {
        let mut arena = AstArena::new();
        let mut builder = SnippetBuilder::new(&mut arena);
        builder
            .create_constructor("constructor(a: int) { this.a = a; }", ModifierFlags::PUBLIC)
            .unwrap();
        assert!(builder.create_constructor("get a(): int;", ModifierFlags::NONE).is_err());
        let class = builder.create_class_declaration("class C { a: int; }").unwrap();
        let top = builder.create_top_level_statement("function f(): void {}").unwrap();
        assert!(matches!(arena.kind(class), NodeKind::ClassDeclaration { .. }));
        assert!(matches!(arena.kind(top), NodeKind::FunctionDeclaration { .. }));
    }
}
