//! Expression parsing
//!
//! This module handles all expression parsing with proper precedence and associativity

use nom::{
    bytes::complete::{tag, take_while1},
    error::context,
    Parser,
};

use crate::ast::*;
use crate::parser_core::{
    fail, illegal_placeholder, is_ident_char, keyword, name, peek_placeholder, symbol, ws,
    PResult, ParserContext, identifier,
};
use crate::parser_decls::block;
use crate::parser_types::type_annotation;

/// Parse any expression
pub fn expression<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    assignment_expr(ctx, input)
}

/// Parse assignment expression: `a = b`, `a += b`, etc.
pub fn assignment_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (input, left) = conditional_expr(ctx, input)?;

    let (after_ws, _) = ws(input)?;
    for (op_str, op) in AssignOp::ALL {
        let Some(rest) = after_ws.strip_prefix(op_str) else {
            continue;
        };
        // `==` is an equality, handled further down
        if op == AssignOp::Assign && rest.starts_with('=') {
            break;
        }
        if !left.is_assignment_target() {
            return fail(after_ws, None, "invalid assignment target", op_str.len());
        }
        // Right-associative
        let (rest, value) = context("expected an expression after the assignment operator", |i| {
            assignment_expr(ctx, i)
        })
        .parse(rest)?;
        return Ok((
            rest,
            Expr::new(
                ExprKind::Assign {
                    op,
                    target: Box::new(left),
                    value: Box::new(value),
                },
                ctx.span_from(start, rest),
            ),
        ));
    }

    Ok((input, left))
}

/// Parse conditional expression: `test ? a : b`
fn conditional_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (input, test) = logical_or_expr(ctx, input)?;

    if let Ok((rest, _)) = symbol("?").parse(input) {
        let (rest, consequent) =
            context("expected an expression after '?'", |i| assignment_expr(ctx, i)).parse(rest)?;
        let (rest, _) = context("expected ':' in conditional expression", symbol(":")).parse(rest)?;
        let (rest, alternate) =
            context("expected an expression after ':'", |i| assignment_expr(ctx, i)).parse(rest)?;
        return Ok((
            rest,
            Expr::new(
                ExprKind::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                ctx.span_from(start, rest),
            ),
        ));
    }
    Ok((input, test))
}

type SubExpr<'a> = fn(&ParserContext<'a>, &'a str) -> PResult<'a, Expr>;

fn logical_or_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(ctx, input, logical_and_expr, &[("||", BinaryOp::Or)])
}

fn logical_and_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(ctx, input, bitwise_or_expr, &[("&&", BinaryOp::And)])
}

fn bitwise_or_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(ctx, input, bitwise_xor_expr, &[("|", BinaryOp::BitOr)])
}

fn bitwise_xor_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(ctx, input, bitwise_and_expr, &[("^", BinaryOp::BitXor)])
}

fn bitwise_and_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(ctx, input, equality_expr, &[("&", BinaryOp::BitAnd)])
}

fn equality_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(
        ctx,
        input,
        relational_expr,
        &[("==", BinaryOp::Eq), ("!=", BinaryOp::NotEq)],
    )
}

const RELATIONAL_OPS: &[(&str, BinaryOp)] = &[
    ("<=", BinaryOp::Le),
    (">=", BinaryOp::Ge),
    ("<", BinaryOp::Lt),
    (">", BinaryOp::Gt),
];

/// Comparison operators and the postfix `as` cast share one level
fn relational_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (mut input, mut left) = shift_expr(ctx, input)?;

    loop {
        if let Ok((rest, _)) = keyword("as")(input) {
            let (rest, ty) =
                context("expected a type after 'as'", |i| type_annotation(ctx, i)).parse(rest)?;
            left = Expr::new(
                ExprKind::As {
                    expr: Box::new(left),
                    ty,
                },
                ctx.span_from(start, rest),
            );
            input = rest;
            continue;
        }

        let (after_ws, _) = ws(input)?;
        if let Some((rest, op)) = match_operator(after_ws, RELATIONAL_OPS) {
            let (rest, right) = context("expected an expression after the operator", |i| {
                shift_expr(ctx, i)
            })
            .parse(rest)?;
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                ctx.span_from(start, rest),
            );
            input = rest;
            continue;
        }
        break;
    }
    Ok((input, left))
}

fn shift_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(
        ctx,
        input,
        additive_expr,
        &[
            (">>>", BinaryOp::Ushr),
            (">>", BinaryOp::Shr),
            ("<<", BinaryOp::Shl),
        ],
    )
}

fn additive_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(
        ctx,
        input,
        multiplicative_expr,
        &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
    )
}

fn multiplicative_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    binary_expr(
        ctx,
        input,
        unary_expr,
        &[
            ("*", BinaryOp::Mul),
            ("/", BinaryOp::Div),
            ("%", BinaryOp::Mod),
        ],
    )
}

/// Parse a left-associative chain of binary operators
fn binary_expr<'a>(
    ctx: &ParserContext<'a>,
    input: &'a str,
    sub_expr: SubExpr<'a>,
    ops: &[(&'static str, BinaryOp)],
) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (mut input, mut left) = sub_expr(ctx, input)?;

    loop {
        let (after_ws, _) = ws(input)?;
        let Some((rest, op)) = match_operator(after_ws, ops) else {
            break;
        };
        let (rest, right) =
            context("expected an expression after the operator", |i| sub_expr(ctx, i)).parse(rest)?;
        left = Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ctx.span_from(start, rest),
        );
        input = rest;
    }
    Ok((input, left))
}

/// Match one operator of `ops`, refusing prefixes of longer operators
/// (`|` in `||`, `+` in `+=` or `++`, `<` in `<<`).
fn match_operator<'a>(input: &'a str, ops: &[(&'static str, BinaryOp)]) -> Option<(&'a str, BinaryOp)> {
    for (op_str, op) in ops {
        let Some(rest) = input.strip_prefix(op_str) else {
            continue;
        };
        if rest.starts_with('=') {
            continue;
        }
        let last = op_str.chars().last();
        if matches!(last, Some('|' | '&' | '+' | '-' | '<' | '>')) && rest.starts_with(last.unwrap_or(' ')) {
            continue;
        }
        return Some((rest, *op));
    }
    None
}

/// Parse unary expression: `-x`, `!x`, `++x`
fn unary_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);

    for (op_str, op) in [("++", UpdateOp::Increment), ("--", UpdateOp::Decrement)] {
        if let Some(rest) = input.strip_prefix(op_str) {
            let (rest, operand) =
                context("expected an operand after the update operator", |i| unary_expr(ctx, i))
                    .parse(rest)?;
            if !operand.is_assignment_target() {
                return fail(input, None, "invalid update operand", op_str.len());
            }
            return Ok((
                rest,
                Expr::new(
                    ExprKind::Update {
                        op,
                        prefix: true,
                        operand: Box::new(operand),
                    },
                    ctx.span_from(start, rest),
                ),
            ));
        }
    }

    let unary_ops = [
        ('-', UnaryOp::Neg),
        ('+', UnaryOp::Plus),
        ('!', UnaryOp::Not),
        ('~', UnaryOp::BitNot),
    ];
    for (op_char, op) in unary_ops {
        if let Some(rest) = input.strip_prefix(op_char) {
            let (rest, operand) =
                context("expected an operand after the unary operator", |i| unary_expr(ctx, i))
                    .parse(rest)?;
            return Ok((
                rest,
                Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    ctx.span_from(start, rest),
                ),
            ));
        }
    }

    postfix_expr(ctx, input)
}

/// Member access, element access, calls and postfix updates
fn postfix_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (mut input, mut expr) = primary_expr(ctx, input)?;

    loop {
        let (after_ws, _) = ws(input)?;

        if let Some(rest) = after_ws.strip_prefix('.') {
            let (rest, property) =
                context("expected a member name after '.'", |i| name(ctx, i)).parse(rest)?;
            expr = Expr::new(
                ExprKind::Member {
                    object: Box::new(expr),
                    property,
                },
                ctx.span_from(start, rest),
            );
            input = rest;
        } else if let Some(rest) = after_ws.strip_prefix('[') {
            let (rest, index) = expression(ctx, rest)?;
            let (rest, _) = context("expected ']' after element index", symbol("]")).parse(rest)?;
            expr = Expr::new(
                ExprKind::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                },
                ctx.span_from(start, rest),
            );
            input = rest;
        } else if after_ws.starts_with('(') {
            let (rest, args) = arguments(ctx, after_ws)?;
            expr = Expr::new(
                ExprKind::Call {
                    callee: Box::new(expr),
                    args,
                },
                ctx.span_from(start, rest),
            );
            input = rest;
        } else if let Some((op_str, op)) = [("++", UpdateOp::Increment), ("--", UpdateOp::Decrement)]
            .into_iter()
            .find(|(s, _)| after_ws.starts_with(s))
        {
            if !expr.is_assignment_target() {
                return fail(after_ws, None, "invalid update operand", op_str.len());
            }
            let rest = &after_ws[op_str.len()..];
            expr = Expr::new(
                ExprKind::Update {
                    op,
                    prefix: false,
                    operand: Box::new(expr),
                },
                ctx.span_from(start, rest),
            );
            return Ok((rest, expr));
        } else {
            break;
        }
    }
    Ok((input, expr))
}

/// Parse a parenthesized argument list, allowing `@@[E n` splices
pub fn arguments<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Vec<Item<Expr>>> {
    let (mut input, _) = symbol("(").parse(input)?;
    let mut args = Vec::new();

    loop {
        if let Ok((rest, _)) = symbol(")").parse(input) {
            return Ok((rest, args));
        }
        if !args.is_empty() {
            let (rest, _) = context("expected ',' or ')' in argument list", symbol(",")).parse(input)?;
            input = rest;
        }
        let (rest, item) = list_expression(ctx, input, "an argument list")?;
        args.push(item);
        input = rest;
    }
}

/// One entry of an argument or array list
fn list_expression<'a>(ctx: &ParserContext<'a>, input: &'a str, position: &str) -> PResult<'a, Item<Expr>> {
    if let Some((rest, p)) = peek_placeholder(ctx, input)? {
        if p.array {
            return match p.kind {
                PlaceholderKind::Expression | PlaceholderKind::Node => Ok((rest, Item::Splice(p))),
                _ => illegal_placeholder(ctx, p, position),
            };
        }
    }
    let (rest, expr) = context("expected an expression", |i| expression(ctx, i)).parse(input)?;
    Ok((rest, Item::Node(expr)))
}

fn primary_expr<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);

    if let Some((rest, p)) = peek_placeholder(ctx, input)? {
        if p.array {
            return illegal_placeholder(ctx, p, "an expression position");
        }
        return match p.kind {
            PlaceholderKind::Expression | PlaceholderKind::Node => {
                Ok((rest, Expr::new(ExprKind::Placeholder(p), p.span)))
            }
            PlaceholderKind::Identifier => Ok((
                rest,
                Expr::new(ExprKind::Ident(Ident::Placeholder(p)), p.span),
            )),
            _ => illegal_placeholder(ctx, p, "an expression position"),
        };
    }

    if input.starts_with(|c: char| c.is_ascii_digit()) {
        return number_literal(ctx, input);
    }
    if input.starts_with('"') || input.starts_with('\'') {
        return string_literal(ctx, input);
    }

    let literals = [
        ("true", ExprKind::Bool(true)),
        ("false", ExprKind::Bool(false)),
        ("undefined", ExprKind::Undefined),
        ("null", ExprKind::Null),
        ("this", ExprKind::This),
    ];
    for (kw, kind) in literals {
        if let Ok((rest, _)) = keyword(kw)(input) {
            return Ok((rest, Expr::new(kind, ctx.span_from(start, rest))));
        }
    }

    if let Ok((rest, _)) = keyword("new")(input) {
        let (rest, class) = context("expected a class name after 'new'", |i| name(ctx, i)).parse(rest)?;
        let (rest, args) =
            context("expected '(' after the class name", |i| arguments(ctx, i)).parse(rest)?;
        return Ok((
            rest,
            Expr::new(ExprKind::New { class, args }, ctx.span_from(start, rest)),
        ));
    }

    if let Some(mut rest) = input.strip_prefix('[') {
        let mut items = Vec::new();
        loop {
            if let Ok((after, _)) = symbol("]").parse(rest) {
                return Ok((
                    after,
                    Expr::new(ExprKind::Array(items), ctx.span_from(start, after)),
                ));
            }
            if !items.is_empty() {
                let (after, _) =
                    context("expected ',' or ']' in array literal", symbol(",")).parse(rest)?;
                rest = after;
            }
            let (after, item) = list_expression(ctx, rest, "an array literal")?;
            items.push(item);
            rest = after;
        }
    }

    if let Some(rest) = input.strip_prefix('(') {
        let (inner, _) = ws(rest)?;
        if inner.starts_with('{') {
            let (rest, body) = block(ctx, inner)?;
            let (rest, _) =
                context("expected ')' to close the block expression", symbol(")")).parse(rest)?;
            return Ok((
                rest,
                Expr::new(ExprKind::Block(body), ctx.span_from(start, rest)),
            ));
        }
        let (rest, expr) = expression(ctx, rest)?;
        let (rest, _) = context("expected ')'", symbol(")")).parse(rest)?;
        return Ok((rest, expr));
    }

    let (rest, (ident, span)) = context("expected an expression", |i| identifier(ctx, i)).parse(input)?;
    Ok((rest, Expr::new(ExprKind::Ident(Ident::new(ident, span)), span)))
}

/// `12`, `2.5`, `123n`
fn number_literal<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let start = ctx.position(input);
    let (rest, int_part) = take_while1(|c: char| c.is_ascii_digit()).parse(input)?;

    if let Ok((after, _)) = tag::<_, _, crate::custom_error::ContextualError<&str>>("n").parse(rest) {
        if !after.starts_with(is_ident_char) {
            return Ok((
                after,
                Expr::new(ExprKind::BigInt(int_part.to_string()), ctx.span_from(start, after)),
            ));
        }
    }

    let mut rest = rest;
    if let Some(after_dot) = rest.strip_prefix('.') {
        if after_dot.starts_with(|c: char| c.is_ascii_digit()) {
            let (after, _) = take_while1(|c: char| c.is_ascii_digit()).parse(after_dot)?;
            rest = after;
        }
    }
    if rest.starts_with(is_ident_char) {
        return fail(rest, None, "invalid number literal", 1);
    }
    let text = &input[..input.len() - rest.len()];
    Ok((
        rest,
        Expr::new(ExprKind::Number(text.to_string()), ctx.span_from(start, rest)),
    ))
}

/// Single or double quoted string with the usual escapes
fn string_literal<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Expr> {
    let start = ctx.position(input);
    let mut chars = input.char_indices();
    let quote = match chars.next() {
        Some((_, q)) => q,
        None => return fail(input, None, "expected a string literal", 0),
    };

    let mut value = String::new();
    let mut escaped = false;
    for (i, c) in chars {
        if escaped {
            value.push(match c {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                '0' => '\0',
                other => other,
            });
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            let rest = &input[i + 1..];
            return Ok((
                rest,
                Expr::new(ExprKind::String(value), ctx.span_from(start, rest)),
            ));
        } else if c == '\n' {
            break;
        } else {
            value.push(c);
        }
    }
    fail(input, None, "unterminated string literal", 1)
}
