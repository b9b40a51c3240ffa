//! Type annotation parsing

use nom::{error::context, Parser};

use crate::ast::*;
use crate::parser_core::{
    identifier, illegal_placeholder, keyword, peek_placeholder, symbol, ws, PResult, ParserContext,
};

/// Parse a type annotation: `int`, `Foo[]`, `number | undefined`, `@@T1`
pub fn type_annotation<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Type> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (mut input, first) = postfix_type(ctx, input)?;

    let mut arms = vec![first];
    loop {
        let (after_ws, _) = ws(input)?;
        if after_ws.starts_with('|') && !after_ws.starts_with("||") && !after_ws.starts_with("|=") {
            let (rest, arm) = context("expected a type after '|'", |i| postfix_type(ctx, i))
                .parse(&after_ws[1..])?;
            arms.push(arm);
            input = rest;
        } else {
            break;
        }
    }

    if arms.len() == 1 {
        Ok((input, arms.remove(0)))
    } else {
        Ok((
            input,
            Type {
                kind: TypeKind::Union(arms),
                span: ctx.span_from(start, input),
            },
        ))
    }
}

/// `T[]`, `T[][]`
fn postfix_type<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Type> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (mut input, mut ty) = primary_type(ctx, input)?;

    while let Ok((rest, _)) = (symbol("["), symbol("]")).parse(input) {
        ty = Type {
            kind: TypeKind::Array(Box::new(ty)),
            span: ctx.span_from(start, rest),
        };
        input = rest;
    }
    Ok((input, ty))
}

fn primary_type<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Type> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);

    if let Some((rest, p)) = peek_placeholder(ctx, input)? {
        if p.kind == PlaceholderKind::Type && !p.array {
            return Ok((
                rest,
                Type {
                    kind: TypeKind::Placeholder(p),
                    span: p.span,
                },
            ));
        }
        return illegal_placeholder(ctx, p, "a type position");
    }

    if let Ok((rest, _)) = symbol("(").parse(input) {
        let (rest, inner) = type_annotation(ctx, rest)?;
        let (rest, _) = context("expected ')' to close the type", symbol(")")).parse(rest)?;
        return Ok((rest, inner));
    }

    for kw in ["undefined", "null", "void"] {
        if let Ok((rest, _)) = keyword(kw)(input) {
            return Ok((
                rest,
                Type {
                    kind: TypeKind::Named(kw.to_string()),
                    span: ctx.span_from(start, rest),
                },
            ));
        }
    }

    let (rest, (name, span)) = context("expected a type", |i| identifier(ctx, i)).parse(input)?;
    Ok((
        rest,
        Type {
            kind: TypeKind::Named(name),
            span,
        },
    ))
}

/// True when `ty` already has an `undefined` arm
pub fn includes_undefined(ty: &Type) -> bool {
    match &ty.kind {
        TypeKind::Named(name) => name == "undefined",
        TypeKind::Union(arms) => arms.iter().any(includes_undefined),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Type {
        let ctx = ParserContext::new(text, true);
        type_annotation(&ctx, text).unwrap().1
    }

    #[test]
    fn test_union_and_array() {
        let ty = parse("number[] | undefined");
        match ty.kind {
            TypeKind::Union(arms) => {
                assert_eq!(arms.len(), 2);
                assert!(matches!(arms[0].kind, TypeKind::Array(_)));
                assert_eq!(arms[1].kind, TypeKind::Named("undefined".into()));
            }
            other => panic!("expected union, got {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_array_of_union() {
        let ty = parse("(int | string)[]");
        match ty.kind {
            TypeKind::Array(element) => assert!(matches!(element.kind, TypeKind::Union(_))),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_type_placeholder() {
        let ty = parse("@@T4");
        assert!(matches!(ty.kind, TypeKind::Placeholder(Placeholder { index: 4, .. })));
    }

    #[test]
    fn test_expression_placeholder_in_type_position() {
        let ctx = ParserContext::new("@@E1", true);
        match type_annotation(&ctx, ctx.full) {
            Err(nom::Err::Failure(e)) => assert_eq!(
                e.hard.and_then(|h| h.code),
                Some(crate::error::FormatErrorCode::InvalidFormatNode)
            ),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_includes_undefined() {
        assert!(includes_undefined(&parse("int | undefined")));
        assert!(!includes_undefined(&parse("int")));
    }
}
