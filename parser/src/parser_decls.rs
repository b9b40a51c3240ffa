//! Statements, blocks and declarations (functions, classes, interfaces)

use nom::{error::context, Parser};

use crate::ast::*;
use crate::parser_core::{
    contextual, fail, illegal_placeholder, keyword, modifiers, name, peek_placeholder, symbol, ws,
    PResult, ParserContext, ParserStatus,
};
use crate::parser_expr::expression;
use crate::parser_types::type_annotation;

// =============================================================================
// Statement lists
// =============================================================================

/// Parse a whole compilation unit
pub fn module_items<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Module> {
    let (rest, items) = statement_list_until_eof(ctx, input)?;
    Ok((
        rest,
        Module {
            items,
            span: Span::new(0, ctx.full.len()),
        },
    ))
}

/// Statements up to the end of the input
pub fn statement_list_until_eof<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Vec<Item<Stmt>>> {
    let mut items = Vec::new();
    let mut input = input;
    loop {
        let (rest, _) = ws(input)?;
        if rest.is_empty() {
            return Ok((rest, items));
        }
        let (rest, item) = statement_item(ctx, rest)?;
        items.push(item);
        input = rest;
    }
}

/// One entry of a statement list: a statement or a list placeholder
pub fn statement_item<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Item<Stmt>> {
    if let Some((rest, p)) = peek_placeholder(ctx, input)? {
        if p.is_list() {
            return match p.kind {
                PlaceholderKind::Statements | PlaceholderKind::Node | PlaceholderKind::Expression => {
                    let (rest, _) = skip_semicolon(rest)?;
                    Ok((rest, Item::Splice(p)))
                }
                _ => illegal_placeholder(ctx, p, "a statement list"),
            };
        }
        if matches!(p.kind, PlaceholderKind::Node | PlaceholderKind::Expression) {
            // A lone placeholder stands for a whole statement
            let (after, _) = ws(rest)?;
            if !continues_expression(after) {
                let (rest, _) = skip_semicolon(after)?;
                let span = Span::new(p.span.start, ctx.position(rest));
                return Ok((rest, Item::Node(Stmt::new(StmtKind::Placeholder(p), span))));
            }
        }
    }
    let (rest, stmt) = statement(ctx, input)?;
    Ok((rest, Item::Node(stmt)))
}

fn skip_semicolon(input: &str) -> PResult<'_, ()> {
    let (after, _) = ws(input)?;
    Ok((after.strip_prefix(';').unwrap_or(after), ()))
}

/// Input after a placeholder that continues an expression (`@@E1 = x`,
/// `@@E1.y`, `@@E1 as T`) rather than ending a statement
fn continues_expression(input: &str) -> bool {
    input.starts_with(|c: char| ".[(=+-*/%<>&|^?!,:".contains(c)) || keyword("as")(input).is_ok()
}

/// `{ statement* }`
pub fn block<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Block> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (mut input, _) = context("expected '{'", symbol("{")).parse(input)?;
    let mut items = Vec::new();
    loop {
        let (rest, _) = ws(input)?;
        if let Some(rest) = rest.strip_prefix('}') {
            return Ok((
                rest,
                Block {
                    items,
                    span: ctx.span_from(start, rest),
                },
            ));
        }
        if rest.is_empty() {
            return fail(rest, None, "expected '}' to close the block", 0);
        }
        let (rest, item) = statement_item(ctx, rest)?;
        items.push(item);
        input = rest;
    }
}

// =============================================================================
// Statements
// =============================================================================

pub fn statement<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Stmt> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);

    if let Some(rest) = input.strip_prefix(';') {
        return Ok((rest, Stmt::new(StmtKind::Empty, ctx.span_from(start, rest))));
    }
    if input.starts_with('{') {
        let (rest, body) = block(ctx, input)?;
        return Ok((rest, Stmt::new(StmtKind::Block(body), ctx.span_from(start, rest))));
    }
    if keyword("let")(input).is_ok() || keyword("const")(input).is_ok() {
        return var_decl(ctx, input);
    }
    if let Ok((rest, _)) = keyword("if")(input) {
        return if_stmt(ctx, start, rest);
    }
    if let Ok((rest, _)) = keyword("while")(input) {
        let (rest, test) = parenthesized(ctx, rest)?;
        let (rest, body) = context("expected a loop body", |i| statement(ctx, i)).parse(rest)?;
        return Ok((
            rest,
            Stmt::new(
                StmtKind::While {
                    test,
                    body: Box::new(body),
                },
                ctx.span_from(start, rest),
            ),
        ));
    }
    if let Ok((rest, _)) = keyword("return")(input) {
        if !ctx.has(ParserStatus::IN_FUNCTION) {
            return fail(input, None, "'return' outside of a function", "return".len());
        }
        let (after, _) = ws(rest)?;
        let (rest, value) = if after.starts_with(';') {
            (after, None)
        } else {
            let (rest, value) = expression(ctx, after)?;
            (rest, Some(value))
        };
        let (rest, _) = context("expected ';' after return", symbol(";")).parse(rest)?;
        return Ok((rest, Stmt::new(StmtKind::Return(value), ctx.span_from(start, rest))));
    }
    if keyword("function")(input).is_ok() {
        return function_decl(ctx, input);
    }
    if starts_type_declaration(input) {
        return class_or_interface_decl(ctx, input);
    }

    let (rest, expr) = context("expected a statement", |i| expression(ctx, i)).parse(input)?;
    let (rest, _) = context("expected ';' after expression", symbol(";")).parse(rest)?;
    Ok((rest, Stmt::new(StmtKind::Expr(expr), ctx.span_from(start, rest))))
}

fn starts_type_declaration(input: &str) -> bool {
    keyword("class")(input).is_ok()
        || keyword("interface")(input).is_ok()
        || ModifierFlags::KEYWORDS
            .iter()
            .any(|(_, kw)| keyword(*kw)(input).is_ok())
}

fn parenthesized<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = context("expected '('", symbol("(")).parse(input)?;
    let (input, expr) = expression(ctx, input)?;
    let (input, _) = context("expected ')'", symbol(")")).parse(input)?;
    Ok((input, expr))
}

fn if_stmt<'a>(ctx: &ParserContext<'a>, start: usize, input: &'a str) -> PResult<'a, Stmt> {
    let (input, test) = parenthesized(ctx, input)?;
    let (input, consequent) =
        context("expected a statement after 'if'", |i| statement(ctx, i)).parse(input)?;
    let (input, alternate) = match keyword("else")(input) {
        Ok((rest, _)) => {
            let (rest, alternate) =
                context("expected a statement after 'else'", |i| statement(ctx, i)).parse(rest)?;
            (rest, Some(Box::new(alternate)))
        }
        Err(_) => (input, None),
    };
    Ok((
        input,
        Stmt::new(
            StmtKind::If {
                test,
                consequent: Box::new(consequent),
                alternate,
            },
            ctx.span_from(start, input),
        ),
    ))
}

/// `let x: T = e;` / `const x = e;`
fn var_decl<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Stmt> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (input, kind) = match keyword("let")(input) {
        Ok((rest, _)) => (rest, VarKind::Let),
        Err(_) => {
            let (rest, _) = keyword("const")(input)?;
            (rest, VarKind::Const)
        }
    };
    let (input, var_name) = context("expected a variable name", |i| name(ctx, i)).parse(input)?;

    let (input, ty) = match symbol(":").parse(input) {
        Ok((rest, _)) => {
            let (rest, ty) = context("expected a type after ':'", |i| type_annotation(ctx, i)).parse(rest)?;
            (rest, Some(ty))
        }
        Err(_) => (input, None),
    };

    let (input, init) = match initializer(input) {
        Some(rest) => {
            let (rest, value) =
                context("expected an initializer after '='", |i| expression(ctx, i)).parse(rest)?;
            (rest, Some(value))
        }
        None => (input, None),
    };

    if kind == VarKind::Const && init.is_none() {
        return fail(input, None, "'const' declarations must be initialized", 1);
    }
    let (input, _) = context("expected ';' after variable declaration", symbol(";")).parse(input)?;
    Ok((
        input,
        Stmt::new(
            StmtKind::Var {
                kind,
                name: var_name,
                ty,
                init,
            },
            ctx.span_from(start, input),
        ),
    ))
}

/// Input after a single `=` (not `==`)
fn initializer(input: &str) -> Option<&str> {
    let (after, _) = ws(input).ok()?;
    let rest = after.strip_prefix('=')?;
    if rest.starts_with('=') {
        None
    } else {
        Some(rest)
    }
}

// =============================================================================
// Functions
// =============================================================================

/// `(a: int, b: string)`
fn params<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Vec<Param>> {
    let (mut input, _) = context("expected '('", symbol("(")).parse(input)?;
    let mut params = Vec::new();
    loop {
        if let Ok((rest, _)) = symbol(")").parse(input) {
            return Ok((rest, params));
        }
        if !params.is_empty() {
            let (rest, _) = context("expected ',' or ')' in parameter list", symbol(",")).parse(input)?;
            input = rest;
        }
        let (rest, _) = ws(input)?;
        let start = ctx.position(rest);
        let (rest, param_name) = context("expected a parameter name", |i| name(ctx, i)).parse(rest)?;
        let (rest, _) = context("expected ':' after the parameter name", symbol(":")).parse(rest)?;
        let (rest, ty) = context("expected a parameter type", |i| type_annotation(ctx, i)).parse(rest)?;
        params.push(Param {
            name: param_name,
            ty,
            span: ctx.span_from(start, rest),
        });
        input = rest;
    }
}

fn function_body<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Block> {
    let _guard = ctx.enter(
        ParserStatus::IN_FUNCTION,
        ParserStatus::IN_CLASS_BODY.union(ParserStatus::IN_INTERFACE_BODY),
    );
    block(ctx, input)
}

/// `function f(a: int): int { ... }`
pub fn function_decl<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Stmt> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (input, _) = keyword("function")(input)?;
    let (input, fn_name) = context("expected a function name", |i| name(ctx, i)).parse(input)?;
    let (input, fn_params) = params(ctx, input)?;
    let (input, return_type) = return_type(ctx, input)?;
    let (input, body) = function_body(ctx, input)?;
    Ok((
        input,
        Stmt::new(
            StmtKind::Function(FunctionDecl {
                name: fn_name,
                params: fn_params,
                return_type,
                body,
            }),
            ctx.span_from(start, input),
        ),
    ))
}

fn return_type<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Option<Type>> {
    match symbol(":").parse(input) {
        Ok((rest, _)) => {
            let (rest, ty) = context("expected a return type", |i| type_annotation(ctx, i)).parse(rest)?;
            Ok((rest, Some(ty)))
        }
        Err(_) => Ok((input, None)),
    }
}

// =============================================================================
// Classes and interfaces
// =============================================================================

/// `abstract class C extends B implements I { ... }` or `interface I extends J { ... }`
pub fn class_or_interface_decl<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Stmt> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (input, flags) = modifiers(input)?;

    if let Ok((rest, _)) = keyword("class")(input) {
        let (rest, class) = class_rest(ctx, flags, rest)?;
        return Ok((rest, Stmt::new(StmtKind::Class(class), ctx.span_from(start, rest))));
    }
    if let Ok((rest, _)) = keyword("interface")(input) {
        if !flags.is_empty() {
            return fail(ctx.at(start), None, "modifiers are not allowed on interfaces", 1);
        }
        let (rest, iface) = interface_rest(ctx, rest)?;
        return Ok((rest, Stmt::new(StmtKind::Interface(iface), ctx.span_from(start, rest))));
    }
    if !flags.is_empty() {
        return fail(input, None, "expected 'class' after modifiers", 1);
    }
    fail(input, None, "expected 'class' or 'interface'", 1)
}

fn name_list<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Vec<Ident>> {
    let (mut input, first) = context("expected a type name", |i| name(ctx, i)).parse(input)?;
    let mut names = vec![first];
    while let Ok((rest, _)) = symbol(",").parse(input) {
        let (rest, next) = context("expected a type name after ','", |i| name(ctx, i)).parse(rest)?;
        names.push(next);
        input = rest;
    }
    Ok((input, names))
}

fn class_rest<'a>(ctx: &ParserContext<'a>, flags: ModifierFlags, input: &'a str) -> PResult<'a, ClassDecl> {
    let (input, class_name) = context("expected a class name", |i| name(ctx, i)).parse(input)?;

    let (input, extends) = match keyword("extends")(input) {
        Ok((rest, _)) => {
            let (rest, base) = context("expected a base class name", |i| name(ctx, i)).parse(rest)?;
            (rest, Some(base))
        }
        Err(_) => (input, None),
    };
    let (input, implements) = match keyword("implements")(input) {
        Ok((rest, _)) => name_list(ctx, rest)?,
        Err(_) => (input, Vec::new()),
    };

    let _guard = ctx.enter(
        ParserStatus::IN_CLASS_BODY,
        ParserStatus::IN_INTERFACE_BODY.union(ParserStatus::IN_FUNCTION),
    );
    let (input, (body, _)) = member_list(ctx, input)?;
    Ok((
        input,
        ClassDecl {
            modifiers: flags,
            name: class_name,
            extends,
            implements,
            body,
        },
    ))
}

fn interface_rest<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, InterfaceDecl> {
    let (input, iface_name) = context("expected an interface name", |i| name(ctx, i)).parse(input)?;
    let (input, extends) = match keyword("extends")(input) {
        Ok((rest, _)) => name_list(ctx, rest)?,
        Err(_) => (input, Vec::new()),
    };

    let _guard = ctx.enter(
        ParserStatus::IN_INTERFACE_BODY,
        ParserStatus::IN_CLASS_BODY.union(ParserStatus::IN_FUNCTION),
    );
    let (input, (body, body_span)) = member_list(ctx, input)?;
    Ok((
        input,
        InterfaceDecl {
            name: iface_name,
            extends,
            body,
            body_span,
        },
    ))
}

/// `{ member* }`
fn member_list<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, (Vec<Item<ClassElement>>, Span)> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (mut input, _) = context("expected '{' to open the body", symbol("{")).parse(input)?;
    let mut members = Vec::new();
    loop {
        let (rest, _) = ws(input)?;
        if let Some(rest) = rest.strip_prefix('}') {
            return Ok((rest, (members, ctx.span_from(start, rest))));
        }
        if rest.is_empty() {
            return fail(rest, None, "expected '}' to close the body", 0);
        }
        if let Some((after, p)) = peek_placeholder(ctx, rest)? {
            if p.array {
                if p.kind != PlaceholderKind::Node {
                    return illegal_placeholder(ctx, p, "a class body");
                }
                members.push(Item::Splice(p));
                input = skip_semicolon(after)?.0;
                continue;
            }
        }
        let (rest, element) = class_element(ctx, rest)?;
        members.push(Item::Node(element));
        input = rest;
    }
}

/// One class or interface member
pub fn class_element<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, ClassElement> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);

    if let Some((rest, p)) = peek_placeholder(ctx, input)? {
        match (p.kind, p.array) {
            (PlaceholderKind::Node, false) => {
                let (rest, _) = skip_semicolon(rest)?;
                return Ok((
                    rest,
                    ClassElement {
                        modifiers: ModifierFlags::NONE,
                        kind: ClassElementKind::Placeholder(p),
                        span: ctx.span_from(start, rest),
                    },
                ));
            }
            (PlaceholderKind::Identifier, false) => {}
            _ => return illegal_placeholder(ctx, p, "a class member position"),
        }
    }

    let (input, mut flags) = modifiers(input)?;

    let (kw_input, _) = ws(input)?;
    let kw_start = ctx.position(kw_input);
    if let Ok((after_kw, _)) = contextual("constructor")(kw_input) {
        if symbol("(").parse(after_kw).is_ok() {
            if ctx.has(ParserStatus::IN_INTERFACE_BODY) {
                return fail(kw_input, None, "interfaces cannot declare constructors", "constructor".len());
            }
            let (rest, ctor_params) = params(ctx, after_kw)?;
            let (rest, body) = function_body(ctx, rest)?;
            return Ok((
                rest,
                ClassElement {
                    modifiers: flags,
                    kind: ClassElementKind::Method {
                        kind: MethodKind::Constructor,
                        name: Ident::new("constructor", ctx.span_from(kw_start, after_kw)),
                        params: ctor_params,
                        return_type: None,
                        body: Some(body),
                    },
                    span: ctx.span_from(start, rest),
                },
            ));
        }
    }

    for (word, kind) in [("get", MethodKind::Get), ("set", MethodKind::Set)] {
        // `get(` is a method named get, `get x(` is an accessor
        if let Ok((after_word, _)) = contextual(word)(input) {
            if let Ok((after_name, accessor_name)) = name(ctx, after_word) {
                if symbol("(").parse(after_name).is_ok() {
                    return method_rest(ctx, start, flags, kind, accessor_name, after_name);
                }
            }
        }
    }

    let (input, member_name) = context("expected a member name", |i| name(ctx, i)).parse(input)?;
    if symbol("(").parse(input).is_ok() {
        return method_rest(ctx, start, flags, MethodKind::Method, member_name, input);
    }

    let (input, optional) = match symbol("?").parse(input) {
        Ok((rest, _)) => (rest, true),
        Err(_) => (input, false),
    };
    if optional {
        flags.insert(ModifierFlags::OPTIONAL);
    }
    let (input, _) = context("expected ':' after the property name", symbol(":")).parse(input)?;
    let (input, ty) = context("expected a property type", |i| type_annotation(ctx, i)).parse(input)?;
    let (input, init) = match initializer(input) {
        Some(rest) => {
            if ctx.has(ParserStatus::IN_INTERFACE_BODY) {
                return fail(input, None, "interface properties cannot have an initializer", 1);
            }
            let (rest, value) =
                context("expected an initializer after '='", |i| expression(ctx, i)).parse(rest)?;
            (rest, Some(value))
        }
        None => (input, None),
    };
    let (input, _) = member_terminator(input, "expected ';' after the property")?;

    Ok((
        input,
        ClassElement {
            modifiers: flags,
            kind: ClassElementKind::Property {
                name: member_name,
                ty,
                init,
            },
            span: ctx.span_from(start, input),
        },
    ))
}

/// `;` after a member, optional before the closing `}` of the body
fn member_terminator<'a>(input: &'a str, message: &'static str) -> PResult<'a, ()> {
    if let Ok((rest, _)) = symbol(";").parse(input) {
        return Ok((rest, ()));
    }
    if symbol("}").parse(input).is_ok() {
        return Ok((input, ()));
    }
    let (rest, _) = context(message, symbol(";")).parse(input)?;
    Ok((rest, ()))
}

fn method_rest<'a>(
    ctx: &ParserContext<'a>,
    start: usize,
    flags: ModifierFlags,
    kind: MethodKind,
    method_name: Ident,
    input: &'a str,
) -> PResult<'a, ClassElement> {
    let params_start = input;
    let (input, method_params) = params(ctx, input)?;
    match kind {
        MethodKind::Get if !method_params.is_empty() => {
            return fail(params_start, None, "a getter cannot have parameters", 1);
        }
        MethodKind::Set if method_params.len() != 1 => {
            return fail(params_start, None, "a setter must have exactly one parameter", 1);
        }
        _ => {}
    }
    let (input, ret) = return_type(ctx, input)?;

    let (input, body) = match symbol(";").parse(input) {
        Ok((rest, _)) => (rest, None),
        Err(_) if symbol("}").parse(input).is_ok() => (input, None),
        Err(_) => {
            let (rest, body) = context("expected a method body or ';'", |i| function_body(ctx, i)).parse(input)?;
            (rest, Some(body))
        }
    };

    Ok((
        input,
        ClassElement {
            modifiers: flags,
            kind: ClassElementKind::Method {
                kind,
                name: method_name,
                params: method_params,
                return_type: ret,
                body,
            },
            span: ctx.span_from(start, input),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_stmt(text: &str, format: bool) -> Stmt {
        let ctx = ParserContext::new(text, format);
        let _guard = ctx.enter(ParserStatus::IN_FUNCTION, ParserStatus::NONE);
        statement(&ctx, text).unwrap().1
    }

    #[test]
    fn test_var_decl() {
        match parse_stmt("let a: int = 1;", false).kind {
            StmtKind::Var { kind, name, ty, init } => {
                assert_eq!(kind, VarKind::Let);
                assert_eq!(name.as_str(), Some("a"));
                assert!(ty.is_some());
                assert!(init.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_return_outside_function() {
        let ctx = ParserContext::new("return 1;", false);
        assert!(matches!(statement(&ctx, ctx.full), Err(nom::Err::Failure(_))));
    }

    #[test]
    fn test_class_members() {
        let text = "abstract class C implements I, J { private x: int = 1; get y(): int { return 1; } set y(v: int) {} constructor(a: int) {} get(): int { return 2; } }";
        match parse_stmt(text, false).kind {
            StmtKind::Class(class) => {
                assert!(class.modifiers.contains(ModifierFlags::ABSTRACT));
                assert_eq!(class.implements.len(), 2);
                let kinds: Vec<_> = class
                    .body
                    .iter()
                    .map(|item| match item {
                        Item::Node(ClassElement { kind: ClassElementKind::Method { kind, .. }, .. }) => Some(*kind),
                        _ => None,
                    })
                    .collect();
                assert_eq!(
                    kinds,
                    vec![
                        None,
                        Some(MethodKind::Get),
                        Some(MethodKind::Set),
                        Some(MethodKind::Constructor),
                        Some(MethodKind::Method)
                    ]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_interface_optional_field() {
        match parse_stmt("interface I extends J { x?: number; readonly y: int; }", false).kind {
            StmtKind::Interface(iface) => {
                assert_eq!(iface.extends.len(), 1);
                match &iface.body[0] {
                    Item::Node(element) => assert!(element.modifiers.contains(ModifierFlags::OPTIONAL)),
                    other => panic!("unexpected {:?}", other),
                }
                match &iface.body[1] {
                    Item::Node(element) => assert!(element.modifiers.contains(ModifierFlags::READONLY)),
                    other => panic!("unexpected {:?}", other),
                }
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_last_member_semicolon_is_optional() {
        match parse_stmt("interface I { y: int; x?: number }", false).kind {
            StmtKind::Interface(iface) => assert_eq!(iface.body.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        match parse_stmt("class C { n: int = 0 }", false).kind {
            StmtKind::Class(class) => assert_eq!(class.body.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        match parse_stmt("interface J { get x(): int }", false).kind {
            StmtKind::Interface(iface) => assert_eq!(iface.body.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_member_semicolon_required_between_members() {
        let ctx = ParserContext::new("class C { a: int b: int; }", false);
        assert!(statement(&ctx, ctx.full).is_err());
    }

    #[test]
    fn test_interface_rejects_constructor() {
        let ctx = ParserContext::new("interface I { constructor() {} }", false);
        assert!(matches!(statement(&ctx, ctx.full), Err(nom::Err::Failure(_))));
    }

    #[test]
    fn test_statement_placeholders() {
        let text = "{ @@S1 let t = @@E2; @@N3 @@E4; }";
        match parse_stmt(text, true).kind {
            StmtKind::Block(block) => {
                assert!(matches!(block.items[0], Item::Splice(_)));
                assert!(matches!(block.items[1], Item::Node(_)));
                assert!(matches!(
                    block.items[2],
                    Item::Node(Stmt { kind: StmtKind::Placeholder(_), .. })
                ));
                assert!(matches!(
                    block.items[3],
                    Item::Node(Stmt { kind: StmtKind::Placeholder(_), .. })
                ));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_type_placeholder_in_statement_list() {
        let ctx = ParserContext::new("{ @@[T1 }", true);
        match statement(&ctx, ctx.full) {
            Err(nom::Err::Failure(e)) => assert_eq!(
                e.hard.and_then(|h| h.code),
                Some(crate::error::FormatErrorCode::InvalidFormatNode)
            ),
            other => panic!("expected failure, got {:?}", other),
        }
    }
}
