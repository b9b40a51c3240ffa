//! Parser context, shared lexical helpers and the public entry points
//!
//! Every grammar function takes the [`ParserContext`] of the text being
//! parsed plus the remaining input, mirroring `fn x<'a>(ctx, input) -> PResult<'a, T>`.
//! Transient state (are we inside a class body, a function, a format
//! template) lives in a [`ParserStatus`] cell that nested rules change
//! through a [`StatusGuard`], which restores the outer status on drop.

use std::cell::Cell;

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, multispace1, satisfy},
    combinator::{opt, recognize, value},
    error::{ErrorKind, ParseError as _},
    multi::many0,
    IResult, Parser,
};

use crate::ast::*;
use crate::custom_error::ContextualError;
use crate::error::{FormatErrorCode, ParseError, ParseResult};
use crate::parser_decls::{
    class_element, class_or_interface_decl, module_items, statement_list_until_eof,
};
use crate::parser_expr::expression;
use crate::parser_types::type_annotation;

/// Parser result type with contextual errors to capture context strings
pub type PResult<'a, T> = IResult<&'a str, T, ContextualError<&'a str>>;

/// Transient parser state flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParserStatus(u32);

impl ParserStatus {
    pub const NONE: Self = Self(0);
    pub const IN_CLASS_BODY: Self = Self(1 << 0);
    pub const IN_INTERFACE_BODY: Self = Self(1 << 1);
    pub const IN_FUNCTION: Self = Self(1 << 2);
    /// Placeholder tokens are legal
    pub const FORMAT_MODE: Self = Self(1 << 3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    pub fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// State shared by all grammar rules while parsing one text
#[derive(Debug)]
pub struct ParserContext<'a> {
    pub full: &'a str,
    status: Cell<ParserStatus>,
}

impl<'a> ParserContext<'a> {
    pub fn new(full: &'a str, format: bool) -> Self {
        let status = if format {
            ParserStatus::FORMAT_MODE
        } else {
            ParserStatus::NONE
        };
        Self {
            full,
            status: Cell::new(status),
        }
    }

    pub fn status(&self) -> ParserStatus {
        self.status.get()
    }

    pub fn has(&self, flag: ParserStatus) -> bool {
        self.status.get().contains(flag)
    }

    /// Switch status flags until the returned guard is dropped
    pub fn enter(&self, insert: ParserStatus, remove: ParserStatus) -> StatusGuard<'_> {
        let saved = self.status.get();
        let mut next = saved;
        next.remove(remove);
        next.insert(insert);
        self.status.set(next);
        StatusGuard {
            cell: &self.status,
            saved,
        }
    }

    pub fn position(&self, input: &str) -> usize {
        self.full.len() - input.len()
    }

    pub fn span_from(&self, start: usize, input: &str) -> Span {
        Span::new(start, self.position(input))
    }

    /// Remaining input starting at a byte offset of the full text
    pub fn at(&self, offset: usize) -> &'a str {
        &self.full[offset.min(self.full.len())..]
    }
}

/// Restores the parser status it replaced when dropped
pub struct StatusGuard<'c> {
    cell: &'c Cell<ParserStatus>,
    saved: ParserStatus,
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        self.cell.set(self.saved);
    }
}

// =============================================================================
// Lexical helpers
// =============================================================================

/// Skip whitespace and comments
pub fn ws(input: &str) -> PResult<'_, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), line_comment),
            value((), block_comment),
        ))),
    )
    .parse(input)
}

/// Line comment: // comment
fn line_comment(input: &str) -> PResult<'_, &str> {
    recognize((tag("//"), take_while(|c| c != '\n'), opt(char('\n')))).parse(input)
}

/// Block comment: /* comment */
fn block_comment(input: &str) -> PResult<'_, &str> {
    recognize((tag("/*"), take_until("*/"), tag("*/"))).parse(input)
}

const KEYWORDS: &[&str] = &[
    "let", "const", "if", "else", "while", "return", "function", "class", "interface", "extends",
    "implements", "public", "private", "protected", "static", "abstract", "readonly", "override",
    "new", "this", "true", "false", "undefined", "null", "as", "void",
];

pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.contains(&s)
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn error<'a, T>(input: &'a str, kind: ErrorKind) -> PResult<'a, T> {
    Err(nom::Err::Error(ContextualError::from_error_kind(input, kind)))
}

/// Raise a non-recoverable error at `input`
pub fn fail<'a, T>(
    input: &'a str,
    code: Option<FormatErrorCode>,
    message: impl Into<String>,
    len: usize,
) -> PResult<'a, T> {
    Err(nom::Err::Failure(ContextualError::hard(input, code, message, len)))
}

/// A whole keyword, not the prefix of a longer identifier
pub fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = ws(input)?;
        let (rest, word) = tag(kw).parse(input)?;
        if rest.starts_with(is_ident_char) {
            return error(input, ErrorKind::Tag);
        }
        Ok((rest, word))
    }
}

/// Punctuation, after optional whitespace
pub fn symbol<'a>(sym: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = ws(input)?;
        tag(sym).parse(input)
    }
}

/// Contextual word such as `get`, `set` or `constructor`: an identifier
/// spelled exactly `word`
pub fn contextual<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    move |input| {
        let (input, _) = ws(input)?;
        let (rest, found) = recognize((satisfy(is_ident_start), take_while(is_ident_char))).parse(input)?;
        if found != word {
            return error(input, ErrorKind::Tag);
        }
        Ok((rest, found))
    }
}

/// Parse an identifier
pub fn identifier<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, (String, Span)> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (rest, word) = recognize((satisfy(is_ident_start), take_while(is_ident_char))).parse(input)?;
    if is_keyword(word) {
        return error(input, ErrorKind::Verify);
    }
    Ok((rest, (word.to_string(), ctx.span_from(start, rest))))
}

/// A name in declaration or member position: an identifier or `@@I n`
pub fn name<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Ident> {
    if let Some((rest, p)) = peek_placeholder(ctx, input)? {
        if p.kind == PlaceholderKind::Identifier && !p.array {
            return Ok((rest, Ident::Placeholder(p)));
        }
        return illegal_placeholder(ctx, p, "a name position");
    }
    let (rest, (name, span)) = identifier(ctx, input)?;
    Ok((rest, Ident::new(name, span)))
}

// =============================================================================
// Placeholders
// =============================================================================

/// Lex a placeholder token starting (after whitespace) at `input`.
///
/// Returns a recoverable error when the input does not start with `@@`;
/// every other problem is a hard failure.
pub fn placeholder_token<'a>(ctx: &ParserContext<'a>, input: &'a str) -> PResult<'a, Placeholder> {
    let (input, _) = ws(input)?;
    let start = ctx.position(input);
    let (rest, _) = tag("@@").parse(input)?;

    if !ctx.has(ParserStatus::FORMAT_MODE) {
        return fail(input, None, "placeholder outside of a format template", 2);
    }

    let (rest, array) = match rest.strip_prefix('[') {
        Some(after) => (after, true),
        None => (rest, false),
    };

    let Some(code) = rest.chars().next() else {
        return fail(
            input,
            Some(FormatErrorCode::InvalidFormatNode),
            "placeholder is missing its kind",
            ctx.position(rest) - start,
        );
    };
    let Some(kind) = PlaceholderKind::from_code(code) else {
        return fail(
            input,
            Some(FormatErrorCode::InvalidFormatNode),
            format!("unknown placeholder kind '{}'", code),
            ctx.position(rest) - start + code.len_utf8(),
        );
    };
    let rest = &rest[code.len_utf8()..];

    let digits_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let (digits, rest) = rest.split_at(digits_len);
    let token_len = ctx.position(rest) - start;
    if digits.is_empty() {
        return fail(
            input,
            Some(FormatErrorCode::InvalidNumberNode),
            "placeholder is missing its index",
            token_len,
        );
    }
    let index = match digits.parse::<u32>() {
        Ok(0) => {
            return fail(
                input,
                Some(FormatErrorCode::InvalidNumberNode),
                "placeholder indices start at 1",
                token_len,
            )
        }
        Ok(n) => n as usize,
        Err(_) => {
            return fail(
                input,
                Some(FormatErrorCode::InvalidNumberNode),
                format!("placeholder index '{}' is out of range", digits),
                token_len,
            )
        }
    };

    Ok((
        rest,
        Placeholder {
            kind,
            array,
            index,
            span: Span::new(start, start + token_len),
        },
    ))
}

/// `Some` when a placeholder starts at `input`
pub fn peek_placeholder<'a>(
    ctx: &ParserContext<'a>,
    input: &'a str,
) -> Result<Option<(&'a str, Placeholder)>, nom::Err<ContextualError<&'a str>>> {
    match placeholder_token(ctx, input) {
        Ok((rest, p)) => Ok(Some((rest, p))),
        Err(nom::Err::Error(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Reject a well-formed placeholder whose kind is not allowed where it stands
pub fn illegal_placeholder<'a, T>(ctx: &ParserContext<'a>, p: Placeholder, position: &str) -> PResult<'a, T> {
    fail(
        ctx.at(p.span.start),
        Some(FormatErrorCode::InvalidFormatNode),
        format!("placeholder '{}' is not allowed in {}", p, position),
        p.span.len(),
    )
}

/// Zero or more modifier keywords
pub fn modifiers<'a>(input: &'a str) -> PResult<'a, ModifierFlags> {
    let mut flags = ModifierFlags::NONE;
    let mut input = input;
    loop {
        let next = ModifierFlags::KEYWORDS
            .iter()
            .find_map(|(flag, kw)| keyword(*kw)(input).ok().map(|(rest, _)| (rest, *flag)));
        match next {
            Some((rest, flag)) => {
                if flags.contains(flag) {
                    return fail(input, None, "duplicate modifier", 1);
                }
                flags.insert(flag);
                input = rest;
            }
            None => return Ok((input, flags)),
        }
    }
}

// =============================================================================
// Entry points
// =============================================================================

/// Grammatical category a snippet is parsed as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnippetKind {
    Expression,
    /// Statement list inside a function body
    Statements,
    /// Module-level statements and declarations
    TopLevel,
    TypeAnnotation,
    ClassElement,
    ClassDeclaration,
    Constructor,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Snippet {
    Expression(Expr),
    Statements(Vec<Item<Stmt>>),
    TopLevel(Module),
    Type(Type),
    ClassElement(ClassElement),
    /// A class or interface declaration statement
    ClassDeclaration(Stmt),
}

impl CollectPlaceholders for Snippet {
    fn collect_placeholders(&self, out: &mut Vec<Placeholder>) {
        match self {
            Snippet::Expression(e) => e.collect_placeholders(out),
            Snippet::Statements(items) => items.collect_placeholders(out),
            Snippet::TopLevel(module) => module.collect_placeholders(out),
            Snippet::Type(ty) => ty.collect_placeholders(out),
            Snippet::ClassElement(element) => element.collect_placeholders(out),
            Snippet::ClassDeclaration(stmt) => stmt.collect_placeholders(out),
        }
    }
}

/// Require that only whitespace follows
fn end_of_input(input: &str) -> PResult<'_, ()> {
    let (input, _) = ws(input)?;
    if input.is_empty() {
        Ok((input, ()))
    } else {
        let near: String = input.chars().take(12).collect();
        fail(input, None, format!("unexpected input '{}'", near), 1)
    }
}

fn finish<'a, T>(ctx: &ParserContext<'a>, result: PResult<'a, T>) -> ParseResult<T> {
    let parsed = result.and_then(|(rest, value)| {
        let (rest, _) = end_of_input(rest)?;
        Ok((rest, value))
    });
    parsed
        .map(|(_, value)| value)
        .map_err(|e| ParseError::from_nom(ctx.full, e))
}

/// Parse a whole compilation unit
pub fn parse_module(text: &str) -> ParseResult<Module> {
    let ctx = ParserContext::new(text, false);
    finish(&ctx, module_items(&ctx, text))
}

/// Parse a snippet of source, optionally as a format template.
///
/// Each call parses with its own [`ParserContext`], so a snippet built in
/// the middle of lowering never sees or disturbs any other parse.
pub fn parse_snippet(text: &str, kind: SnippetKind, format: bool) -> ParseResult<Snippet> {
    parse_snippet_with_status(text, kind, format, ParserStatus::NONE)
}

/// [`parse_snippet`] with extra status flags set for the whole parse
pub fn parse_snippet_with_status(
    text: &str,
    kind: SnippetKind,
    format: bool,
    extra: ParserStatus,
) -> ParseResult<Snippet> {
    let ctx = ParserContext::new(text, format);
    let _extra = ctx.enter(extra, ParserStatus::NONE);
    match kind {
        SnippetKind::Expression => {
            let _guard = ctx.enter(ParserStatus::IN_FUNCTION, ParserStatus::NONE);
            finish(&ctx, expression(&ctx, text)).map(Snippet::Expression)
        }
        SnippetKind::Statements => {
            let _guard = ctx.enter(ParserStatus::IN_FUNCTION, ParserStatus::NONE);
            finish(&ctx, statement_list_until_eof(&ctx, text)).map(Snippet::Statements)
        }
        SnippetKind::TopLevel => finish(&ctx, module_items(&ctx, text)).map(Snippet::TopLevel),
        SnippetKind::TypeAnnotation => finish(&ctx, type_annotation(&ctx, text)).map(Snippet::Type),
        SnippetKind::ClassElement => {
            let _guard = ctx.enter(ParserStatus::IN_CLASS_BODY, ParserStatus::NONE);
            finish(&ctx, class_element(&ctx, text)).map(Snippet::ClassElement)
        }
        SnippetKind::ClassDeclaration => {
            finish(&ctx, class_or_interface_decl(&ctx, text)).map(Snippet::ClassDeclaration)
        }
        SnippetKind::Constructor => {
            let _guard = ctx.enter(ParserStatus::IN_CLASS_BODY, ParserStatus::NONE);
            let element = finish(&ctx, class_element(&ctx, text))?;
            match &element.kind {
                ClassElementKind::Method {
                    kind: MethodKind::Constructor,
                    ..
                } => Ok(Snippet::ClassElement(element)),
                _ => Err(ParseError::new("expected a constructor", element.span)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_guard_restores() {
        let ctx = ParserContext::new("", true);
        {
            let _outer = ctx.enter(ParserStatus::IN_CLASS_BODY, ParserStatus::NONE);
            {
                let _inner = ctx.enter(ParserStatus::IN_FUNCTION, ParserStatus::IN_CLASS_BODY);
                assert!(ctx.has(ParserStatus::IN_FUNCTION));
                assert!(!ctx.has(ParserStatus::IN_CLASS_BODY));
            }
            assert!(ctx.has(ParserStatus::IN_CLASS_BODY));
            assert!(!ctx.has(ParserStatus::IN_FUNCTION));
        }
        assert_eq!(ctx.status(), ParserStatus::FORMAT_MODE);
    }

    #[test]
    fn test_identifier_rejects_keywords() {
        let ctx = ParserContext::new("  gensym$1 rest", false);
        let (rest, (name, span)) = identifier(&ctx, ctx.full).unwrap();
        assert_eq!(name, "gensym$1");
        assert_eq!(span, Span::new(2, 10));
        assert_eq!(rest, " rest");

        let ctx = ParserContext::new("return", false);
        assert!(identifier(&ctx, ctx.full).is_err());
    }

    #[test]
    fn test_keyword_needs_word_boundary() {
        assert!(keyword("let")("letter").is_err());
        assert!(keyword("let")(" let x").is_ok());
    }

    #[test]
    fn test_placeholder_token() {
        let ctx = ParserContext::new("@@[S12", true);
        let (_, p) = placeholder_token(&ctx, ctx.full).unwrap();
        assert_eq!(p.kind, PlaceholderKind::Statements);
        assert!(p.array);
        assert_eq!(p.index, 12);
        assert_eq!(p.span, Span::new(0, 6));
    }

    #[test]
    fn test_placeholder_token_errors() {
        let cases = [
            ("@@Q1", FormatErrorCode::InvalidFormatNode),
            ("@@E", FormatErrorCode::InvalidNumberNode),
            ("@@E0", FormatErrorCode::InvalidNumberNode),
            ("@@E99999999999999999999", FormatErrorCode::InvalidNumberNode),
        ];
        for (text, code) in cases {
            let ctx = ParserContext::new(text, true);
            match placeholder_token(&ctx, text) {
                Err(nom::Err::Failure(e)) => {
                    assert_eq!(e.hard.and_then(|h| h.code), Some(code), "{}", text)
                }
                other => panic!("{}: expected failure, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_placeholder_outside_format_mode() {
        let ctx = ParserContext::new("@@E1", false);
        match placeholder_token(&ctx, ctx.full) {
            Err(nom::Err::Failure(e)) => assert_eq!(e.hard.and_then(|h| h.code), None),
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_modifiers() {
        let (_, flags) = modifiers("public abstract x").unwrap();
        assert!(flags.contains(ModifierFlags::PUBLIC));
        assert!(flags.contains(ModifierFlags::ABSTRACT));
        assert!(!flags.contains(ModifierFlags::STATIC));
    }
}
