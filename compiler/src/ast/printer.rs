//! Render arena subtrees back to canonical surface syntax
//!
//! Output re-parses to a structurally equal tree. Parentheses are only
//! emitted where precedence needs them, except that binary, assignment and
//! conditional operands of `as` are always wrapped.

use crate::ast::{AstArena, MemberKind, MethodKind, ModifierFlags, NodeKind, UnaryOp};
use crate::id_types::NodeId;

const PREC_ASSIGN: u8 = 1;
const PREC_CONDITIONAL: u8 = 2;
const PREC_AS: u8 = 2 + parser::RELATIONAL_PRECEDENCE;
const PREC_PREFIX: u8 = 13;
const PREC_POSTFIX: u8 = 14;
const PREC_ACCESS: u8 = 15;
const PREC_PRIMARY: u8 = 16;

/// Source text for any node
pub fn print(arena: &AstArena, id: NodeId) -> String {
    let mut printer = Printer::new(arena);
    printer.node(id);
    printer.out
}

/// Same as [`print`] with every run of whitespace collapsed to one space
pub fn print_compact(arena: &AstArena, id: NodeId) -> String {
    print(arena, id).split_whitespace().collect::<Vec<_>>().join(" ")
}

struct Printer<'a> {
    arena: &'a AstArena,
    out: String,
    indent: usize,
    /// Statements inside `({ ... })` stay on one line
    inline: usize,
}

impl<'a> Printer<'a> {
    fn new(arena: &'a AstArena) -> Self {
        Self {
            arena,
            out: String::new(),
            indent: 0,
            inline: 0,
        }
    }

    fn node(&mut self, id: NodeId) {
        let arena = self.arena;
        let kind = arena.kind(id);
        if kind.is_expression() {
            let text = self.expr(id, 0);
            self.out.push_str(&text);
        } else if kind.is_type() {
            let text = self.type_text(id);
            self.out.push_str(&text);
        } else {
            match kind {
                NodeKind::Program { statements } => {
                    for (i, stmt) in statements.iter().enumerate() {
                        if i > 0 {
                            self.out.push('\n');
                        }
                        self.stmt(*stmt);
                    }
                }
                NodeKind::ClassProperty { .. } | NodeKind::MethodDefinition { .. } => {
                    let in_interface = arena
                        .parent(id)
                        .is_some_and(|p| matches!(arena.kind(p), NodeKind::InterfaceBody { .. }));
                    self.member(id, in_interface)
                }
                NodeKind::Parameter { .. } => {
                    let text = self.param(id);
                    self.out.push_str(&text);
                }
                NodeKind::ScriptFunction { .. } => self.signature_and_body(id),
                NodeKind::InterfaceBody { members } => self.member_block(members, true),
                _ => self.stmt(id),
            }
        }
    }

    fn newline(&mut self) {
        if self.inline > 0 {
            self.out.push(' ');
        } else {
            self.out.push('\n');
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
        }
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn stmt(&mut self, id: NodeId) {
        let arena = self.arena;
        match arena.kind(id) {
            NodeKind::ExpressionStatement { expr } => {
                let text = self.expr(*expr, 0);
                self.out.push_str(&text);
                self.out.push(';');
            }
            NodeKind::VariableDeclaration { kind, name, ty, init } => {
                self.out.push_str(kind.as_str());
                self.out.push(' ');
                self.out.push_str(self.name(*name));
                if let Some(ty) = ty {
                    let text = self.type_text(*ty);
                    self.out.push_str(": ");
                    self.out.push_str(&text);
                }
                if let Some(init) = init {
                    let text = self.expr(*init, PREC_ASSIGN);
                    self.out.push_str(" = ");
                    self.out.push_str(&text);
                }
                self.out.push(';');
            }
            NodeKind::BlockStatement { statements } => self.block(statements),
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                let test = self.expr(*test, 0);
                self.out.push_str(&format!("if ({}) ", test));
                self.stmt(*consequent);
                if let Some(alternate) = alternate {
                    self.out.push_str(" else ");
                    self.stmt(*alternate);
                }
            }
            NodeKind::WhileStatement { test, body } => {
                let test = self.expr(*test, 0);
                self.out.push_str(&format!("while ({}) ", test));
                self.stmt(*body);
            }
            NodeKind::ReturnStatement { argument } => match argument {
                Some(argument) => {
                    let text = self.expr(*argument, 0);
                    self.out.push_str(&format!("return {};", text));
                }
                None => self.out.push_str("return;"),
            },
            NodeKind::EmptyStatement => self.out.push(';'),
            NodeKind::FunctionDeclaration { name, function } => {
                self.out.push_str("function ");
                self.out.push_str(self.name(*name));
                self.signature_and_body(*function);
            }
            NodeKind::ClassDeclaration {
                modifiers,
                name,
                extends,
                implements,
                body,
            } => {
                self.modifiers(*modifiers, false);
                self.out.push_str("class ");
                self.out.push_str(self.name(*name));
                if let Some(base) = extends {
                    self.out.push_str(" extends ");
                    self.out.push_str(self.name(*base));
                }
                if !implements.is_empty() {
                    let names: Vec<&str> = implements.iter().map(|i| self.name(*i)).collect();
                    self.out.push_str(" implements ");
                    self.out.push_str(&names.join(", "));
                }
                self.out.push(' ');
                self.member_block(body, false);
            }
            NodeKind::InterfaceDeclaration { name, extends, body } => {
                self.out.push_str("interface ");
                self.out.push_str(self.name(*name));
                if !extends.is_empty() {
                    let names: Vec<&str> = extends.iter().map(|i| self.name(*i)).collect();
                    self.out.push_str(" extends ");
                    self.out.push_str(&names.join(", "));
                }
                self.out.push(' ');
                if let NodeKind::InterfaceBody { members } = arena.kind(*body) {
                    self.member_block(members, true);
                }
            }
            kind if kind.is_expression() => {
                let text = self.expr(id, 0);
                self.out.push_str(&text);
                self.out.push(';');
            }
            _ => self.node(id),
        }
    }

    fn block(&mut self, statements: &[NodeId]) {
        if statements.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push('{');
        self.indent += 1;
        for stmt in statements {
            self.newline();
            self.stmt(*stmt);
        }
        self.indent -= 1;
        self.newline();
        self.out.push('}');
    }

    // =========================================================================
    // Class and interface members
    // =========================================================================

    /// Members of interfaces are implicitly public and abstract
    fn member_block(&mut self, members: &[NodeId], in_interface: bool) {
        if members.is_empty() {
            self.out.push_str("{}");
            return;
        }
        self.out.push('{');
        self.indent += 1;
        for member in members {
            self.newline();
            self.member(*member, in_interface);
        }
        self.indent -= 1;
        self.newline();
        self.out.push('}');
    }

    fn member(&mut self, id: NodeId, in_interface: bool) {
        let arena = self.arena;
        match arena.kind(id) {
            NodeKind::ClassProperty {
                modifiers,
                name,
                ty,
                init,
            } => {
                self.modifiers(*modifiers, in_interface);
                self.out.push_str(self.name(*name));
                if modifiers.contains(ModifierFlags::OPTIONAL) {
                    self.out.push('?');
                }
                let ty = self.type_text(*ty);
                self.out.push_str(": ");
                self.out.push_str(&ty);
                if let Some(init) = init {
                    let text = self.expr(*init, PREC_ASSIGN);
                    self.out.push_str(" = ");
                    self.out.push_str(&text);
                }
                self.out.push(';');
            }
            NodeKind::MethodDefinition {
                kind,
                modifiers,
                name,
                function,
                overloads,
            } => {
                self.modifiers(*modifiers, in_interface);
                match kind {
                    MethodKind::Get => self.out.push_str("get "),
                    MethodKind::Set => self.out.push_str("set "),
                    MethodKind::Method | MethodKind::Constructor => {}
                }
                self.out.push_str(self.name(*name));
                self.signature_and_body(*function);
                for overload in overloads {
                    self.newline();
                    self.member(*overload, in_interface);
                }
            }
            _ => self.stmt(id),
        }
    }

    fn modifiers(&mut self, mut modifiers: ModifierFlags, in_interface: bool) {
        if in_interface {
            modifiers.remove(ModifierFlags::PUBLIC.union(ModifierFlags::ABSTRACT));
        }
        for (flag, keyword) in ModifierFlags::KEYWORDS {
            if modifiers.contains(flag) {
                self.out.push_str(keyword);
                self.out.push(' ');
            }
        }
    }

    /// `(params): R { ... }` or `(params): R;`
    fn signature_and_body(&mut self, function: NodeId) {
        let arena = self.arena;
        let NodeKind::ScriptFunction {
            params,
            return_type,
            body,
        } = arena.kind(function)
        else {
            return;
        };
        let params: Vec<String> = params.iter().map(|p| self.param(*p)).collect();
        self.out.push('(');
        self.out.push_str(&params.join(", "));
        self.out.push(')');
        if let Some(ret) = return_type {
            let text = self.type_text(*ret);
            self.out.push_str(": ");
            self.out.push_str(&text);
        }
        match body {
            Some(body) => {
                self.out.push(' ');
                self.stmt(*body);
            }
            None => self.out.push(';'),
        }
    }

    fn param(&self, id: NodeId) -> String {
        match self.arena.kind(id) {
            NodeKind::Parameter { name, ty } => format!("{}: {}", self.name(*name), self.type_text(*ty)),
            _ => String::new(),
        }
    }

    fn name(&self, id: NodeId) -> &'a str {
        self.arena.identifier_name(id).unwrap_or("<?>")
    }

    // =========================================================================
    // Types
    // =========================================================================

    fn type_text(&self, id: NodeId) -> String {
        match self.arena.kind(id) {
            NodeKind::TypeReference { name } => name.clone(),
            NodeKind::UnionType { types } => types
                .iter()
                .map(|arm| match self.arena.kind(*arm) {
                    NodeKind::UnionType { .. } => format!("({})", self.type_text(*arm)),
                    _ => self.type_text(*arm),
                })
                .collect::<Vec<_>>()
                .join(" | "),
            NodeKind::ArrayType { element } => match self.arena.kind(*element) {
                NodeKind::UnionType { .. } => format!("({})[]", self.type_text(*element)),
                _ => format!("{}[]", self.type_text(*element)),
            },
            _ => String::from("<?>"),
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    fn expr(&mut self, id: NodeId, min_prec: u8) -> String {
        let (text, prec) = self.expr_inner(id);
        if prec < min_prec {
            format!("({})", text)
        } else {
            text
        }
    }

    fn list(&mut self, items: &[NodeId]) -> String {
        items
            .iter()
            .map(|item| self.expr(*item, PREC_ASSIGN))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn expr_inner(&mut self, id: NodeId) -> (String, u8) {
        let arena = self.arena;
        match arena.kind(id) {
            NodeKind::Identifier { name } => (name.clone(), PREC_PRIMARY),
            NodeKind::NumberLiteral { value } => (value.clone(), PREC_PRIMARY),
            NodeKind::BigIntLiteral { digits } => (format!("{}n", digits), PREC_PRIMARY),
            NodeKind::StringLiteral { value } => (quote(value), PREC_PRIMARY),
            NodeKind::BooleanLiteral { value } => (value.to_string(), PREC_PRIMARY),
            NodeKind::UndefinedLiteral => ("undefined".into(), PREC_PRIMARY),
            NodeKind::NullLiteral => ("null".into(), PREC_PRIMARY),
            NodeKind::ThisExpression => ("this".into(), PREC_PRIMARY),
            NodeKind::MemberExpression { kind, object, property } => {
                let object = self.expr(*object, PREC_ACCESS);
                let text = match kind {
                    MemberKind::Property => format!("{}.{}", object, self.name(*property)),
                    MemberKind::Element => format!("{}[{}]", object, self.expr(*property, 0)),
                };
                (text, PREC_ACCESS)
            }
            NodeKind::CallExpression { callee, arguments } => {
                let callee = self.expr(*callee, PREC_ACCESS);
                (format!("{}({})", callee, self.list(arguments)), PREC_ACCESS)
            }
            NodeKind::NewExpression { class, arguments } => (
                format!("new {}({})", self.name(*class), self.list(arguments)),
                PREC_ACCESS,
            ),
            NodeKind::ArrayExpression { elements } => (format!("[{}]", self.list(elements)), PREC_PRIMARY),
            NodeKind::BinaryExpression { op, left, right } => {
                let prec = 2 + op.precedence();
                let left = self.expr(*left, prec);
                let right = self.expr(*right, prec + 1);
                (format!("{} {} {}", left, op.as_str(), right), prec)
            }
            NodeKind::UnaryExpression { op, operand } => {
                let mut operand = self.expr(*operand, PREC_PREFIX);
                let sign = matches!(op, UnaryOp::Neg | UnaryOp::Plus);
                if sign && (operand.starts_with('-') || operand.starts_with('+')) {
                    operand = format!("({})", operand);
                }
                (format!("{}{}", op.as_str(), operand), PREC_PREFIX)
            }
            NodeKind::UpdateExpression { op, prefix, operand } => {
                if *prefix {
                    let operand = self.expr(*operand, PREC_POSTFIX);
                    (format!("{}{}", op.as_str(), operand), PREC_PREFIX)
                } else {
                    let operand = self.expr(*operand, PREC_ACCESS);
                    (format!("{}{}", operand, op.as_str()), PREC_POSTFIX)
                }
            }
            NodeKind::AssignmentExpression { op, target, value } => {
                let target = self.expr(*target, PREC_POSTFIX);
                let value = self.expr(*value, PREC_ASSIGN);
                (format!("{} {} {}", target, op.as_str(), value), PREC_ASSIGN)
            }
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                let test = self.expr(*test, PREC_CONDITIONAL + 1);
                let consequent = self.expr(*consequent, PREC_ASSIGN);
                let alternate = self.expr(*alternate, PREC_ASSIGN);
                (format!("{} ? {} : {}", test, consequent, alternate), PREC_CONDITIONAL)
            }
            NodeKind::AsExpression { expr, ty } => {
                let wrap = matches!(
                    arena.kind(*expr),
                    NodeKind::BinaryExpression { .. }
                        | NodeKind::AssignmentExpression { .. }
                        | NodeKind::ConditionalExpression { .. }
                );
                let operand = if wrap {
                    format!("({})", self.expr(*expr, 0))
                } else {
                    self.expr(*expr, PREC_AS)
                };
                (format!("{} as {}", operand, self.type_text(*ty)), PREC_AS)
            }
            NodeKind::BlockExpression { statements } => {
                if statements.is_empty() {
                    return ("({})".into(), PREC_PRIMARY);
                }
                let start = self.out.len();
                self.inline += 1;
                self.out.push_str("({");
                for stmt in statements {
                    self.out.push(' ');
                    self.stmt(*stmt);
                }
                self.out.push_str(" })");
                self.inline -= 1;
                let text = self.out.split_off(start);
                (text, PREC_PRIMARY)
            }
            _ => {
                let start = self.out.len();
                self.node(id);
                (self.out.split_off(start), PREC_PRIMARY)
            }
        }
    }
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snippet::SnippetBuilder;

    fn roundtrip_expression(text: &str) -> String {
        let mut arena = AstArena::new();
        let id = SnippetBuilder::new(&mut arena)
            .create_expression(text, parser::ParserStatus::NONE)
            .unwrap();
        print(&arena, id)
    }

    #[test]
    fn test_minimal_parentheses() {
        assert_eq!(roundtrip_expression("a + b * c"), "a + b * c");
        assert_eq!(roundtrip_expression("(a + b) * c"), "(a + b) * c");
        assert_eq!(roundtrip_expression("a - (b - c)"), "a - (b - c)");
        assert_eq!(roundtrip_expression("x = y = 1"), "x = y = 1");
        assert_eq!(roundtrip_expression("-(-x)"), "-(-x)");
    }

    #[test]
    fn test_as_operands() {
        assert_eq!(roundtrip_expression("(a + 2) as int"), "(a + 2) as int");
        assert_eq!(roundtrip_expression("a.b as long"), "a.b as long");
        assert_eq!(roundtrip_expression("(x as int) + 1"), "(x as int) + 1");
    }

    #[test]
    fn test_block_expression_is_inline() {
        assert_eq!(
            roundtrip_expression("({ let t: int = 1; t; })"),
            "({ let t: int = 1; t; })"
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(roundtrip_expression("[1, 2n, \"q\\\"\", true, null]"), "[1, 2n, \"q\\\"\", true, null]");
        assert_eq!(roundtrip_expression("new Foo(a, b).c[i++]"), "new Foo(a, b).c[i++]");
    }

    #[test]
    fn test_interface_and_overloads() {
        let mut arena = AstArena::new();
        let mut builder = SnippetBuilder::new(&mut arena);
        let decl = builder
            .create_class_declaration("interface I extends J { get x(): number | undefined; y: int[]; }")
            .unwrap();
        let getter = match arena.kind(decl) {
            NodeKind::InterfaceDeclaration { body, .. } => match arena.kind(*body) {
                NodeKind::InterfaceBody { members } => members[0],
                _ => unreachable!(),
            },
            _ => unreachable!(),
        };
        let setter = SnippetBuilder::new(&mut arena)
            .create_class_element("set x(value: number | undefined): void;", ModifierFlags::NONE)
            .unwrap();
        arena.push_child(getter, setter);
        assert_eq!(
            print(&arena, decl),
            "interface I extends J {\n    get x(): number | undefined;\n    set x(value: number | undefined): void;\n    y: int[];\n}"
        );
    }
}
