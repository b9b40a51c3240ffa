//! Snippet parsing through the public entry points

use parser::{
    parse_module, parse_snippet, ClassElementKind, CollectPlaceholders, ExprKind, FormatErrorCode,
    Item, MethodKind, PlaceholderKind, Snippet, SnippetKind, StmtKind, TypeKind,
};

#[test]
fn test_expression_template() {
    let snippet = parse_snippet("@@I1 = (@@I2 * (@@E3)) as @@T4", SnippetKind::Expression, true).unwrap();
    match &snippet {
        Snippet::Expression(expr) => assert!(matches!(expr.kind, ExprKind::Assign { .. })),
        other => panic!("unexpected {:?}", other),
    }
    let kinds: Vec<_> = snippet.placeholders().iter().map(|p| p.kind).collect();
    assert_eq!(
        kinds,
        vec![
            PlaceholderKind::Identifier,
            PlaceholderKind::Identifier,
            PlaceholderKind::Expression,
            PlaceholderKind::Type
        ]
    );
}

#[test]
fn test_statements_template() {
    let snippet = parse_snippet("let @@I1 = @@E2; @@S3 return @@I1;", SnippetKind::Statements, true).unwrap();
    match snippet {
        Snippet::Statements(items) => {
            assert_eq!(items.len(), 3);
            assert!(matches!(items[1], Item::Splice(_)));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_class_element_template() {
    let snippet = parse_snippet("public abstract get @@I1(): @@T2;", SnippetKind::ClassElement, true).unwrap();
    match snippet {
        Snippet::ClassElement(element) => match element.kind {
            ClassElementKind::Method { kind, body, .. } => {
                assert_eq!(kind, MethodKind::Get);
                assert!(body.is_none());
            }
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_constructor_template() {
    let ok = parse_snippet("constructor(x: int) { this.x = x; }", SnippetKind::Constructor, false);
    assert!(ok.is_ok());

    let err = parse_snippet("foo(): void {}", SnippetKind::Constructor, false).unwrap_err();
    assert_eq!(err.message, "expected a constructor");
}

#[test]
fn test_class_declaration_template() {
    let snippet = parse_snippet("class @@I1 implements I { @@[N2 }", SnippetKind::ClassDeclaration, true).unwrap();
    match snippet {
        Snippet::ClassDeclaration(stmt) => match stmt.kind {
            StmtKind::Class(class) => assert!(matches!(class.body[0], Item::Splice(_))),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_type_template() {
    match parse_snippet("@@T1 | undefined", SnippetKind::TypeAnnotation, true).unwrap() {
        Snippet::Type(ty) => assert!(matches!(ty.kind, TypeKind::Union(_))),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_placeholder_errors_carry_codes() {
    let cases = [
        ("@@X1 + 1", FormatErrorCode::InvalidFormatNode),
        ("@@T1 + 1", FormatErrorCode::InvalidFormatNode),
        ("@@E + 1", FormatErrorCode::InvalidNumberNode),
        ("@@E0 + 1", FormatErrorCode::InvalidNumberNode),
    ];
    for (text, code) in cases {
        let err = parse_snippet(text, SnippetKind::Expression, true).unwrap_err();
        assert_eq!(err.code, Some(code), "{}", text);
        assert_eq!(err.span.start, 0, "{}", text);
    }
}

#[test]
fn test_placeholder_outside_format_mode() {
    let err = parse_snippet("@@E1 + 1", SnippetKind::Expression, false).unwrap_err();
    assert_eq!(err.code, None);
    assert!(err.message.contains("placeholder"));

    assert!(parse_module("let a = @@E1;").is_err());
}

#[test]
fn test_syntax_error_position() {
    let err = parse_module("let a: int = 1;\na += ;").unwrap_err();
    assert_eq!(err.code, None);
    assert!(err.span.start >= 16, "error at {}", err.span.start);
}

#[test]
fn test_trailing_input_is_rejected() {
    let err = parse_snippet("a + 1 )", SnippetKind::Expression, false).unwrap_err();
    assert!(err.message.contains("unexpected input"));
}
