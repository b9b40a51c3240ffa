use compiler::ast::from_syntax::{Insertion, SyntaxConverter};
use compiler::ast::printer::print_compact;
use compiler::ast::{AstArena, NodeKind, Span};
use compiler::id_types::NodeId;
use compiler::pipeline::{LoweringPipeline, PipelineConfig, PipelineResult};
use compiler::verifier::{AstVerifier, NULL_PARENT};
use compiler::{LoweringError, Module, SnippetBuilder};
use parser::FormatErrorCode;

fn lower(src: &str) -> PipelineResult {
    compiler::logging::init_test();
    let result = LoweringPipeline::with_config(PipelineConfig::debug()).compile_source("test.ets", src);
    assert!(result.is_success(), "{:?}", result.diagnostics);
    result
}

fn lowered_module(src: &str) -> Module {
    lower(src).module.unwrap()
}

fn convert(src: &str) -> (AstArena, NodeId) {
    let parsed = parser::parse_module(src).expect("expected source parses");
    let mut arena = AstArena::new();
    let root = SyntaxConverter::convert_module(&mut arena, &parsed).unwrap();
    (arena, root)
}

fn assert_lowers_to(src: &str, expected: &str) {
    let module = lowered_module(src);
    let (arena, root) = convert(expected);
    assert!(
        module.arena.structurally_equal(module.root, &arena, root),
        "lowered:  {}\nexpected: {}",
        print_compact(&module.arena, module.root),
        print_compact(&arena, root)
    );
}

fn count(module: &Module, pred: impl Fn(&AstArena, NodeId) -> bool) -> usize {
    module
        .arena
        .subtree(module.root)
        .into_iter()
        .filter(|&n| pred(&module.arena, n))
        .count()
}

#[test]
fn test_compound_assignment_end_to_end() {
    assert_lowers_to("let a: int = 1; a += 2;", "let a: int = 1; a = (a + 2) as int;");
}

#[test]
fn test_compound_assignment_over_numeric_types() {
    let arithmetic = ["+", "-", "*", "/"];
    let bitwise = ["%", "<<", ">>", "&", "|", "^"];
    for (ty, ops) in [
        ("int", [&arithmetic[..], &bitwise[..]].concat()),
        ("long", [&arithmetic[..], &bitwise[..]].concat()),
        ("short", arithmetic.to_vec()),
        ("double", arithmetic.to_vec()),
    ] {
        for op in ops {
            let src = format!("let x: {ty} = 1; let y: {ty} = 2; x {op}= y;");
            let expected = format!("let x: {ty} = 1; let y: {ty} = 2; x = (x {op} y) as {ty};");
            assert_lowers_to(&src, &expected);
        }
    }
}

#[test]
fn test_side_effecting_index_runs_once() {
    let src = "let xs: int[] = [1, 2, 3]; let i: int = 0; \
               function a(): int[] { return xs; } \
               a()[i++] += 10;";
    let module = lowered_module(src);

    let calls_to_a = count(&module, |arena, n| match arena.kind(n) {
        NodeKind::CallExpression { callee, .. } => arena.identifier_name(*callee) == Some("a"),
        _ => false,
    });
    let writes_to_i = count(&module, |arena, n| match arena.kind(n) {
        NodeKind::AssignmentExpression { target, .. } => arena.identifier_name(*target) == Some("i"),
        _ => false,
    });
    let updates = count(&module, |arena, n| matches!(arena.kind(n), NodeKind::UpdateExpression { .. }));
    assert_eq!(calls_to_a, 1);
    assert_eq!(writes_to_i, 1);
    assert_eq!(updates, 0);
}

#[test]
fn test_member_target_object_runs_once() {
    let src = "class Counter { n: int = 0; } \
               let c: Counter = new Counter(); \
               function current(): Counter { return c; } \
               current().n *= 2; \
               current().n--;";
    let module = lowered_module(src);
    let calls = count(&module, |arena, n| match arena.kind(n) {
        NodeKind::CallExpression { callee, .. } => arena.identifier_name(*callee) == Some("current"),
        _ => false,
    });
    assert_eq!(calls, 2);
}

#[test]
fn test_optional_interface_property() {
    let module = lowered_module("interface I { x?: number }");
    assert_eq!(
        print_compact(&module.arena, module.root),
        "interface I { get x(): number | undefined; set x(value: number | undefined): void; }"
    );
}

#[test]
fn test_interface_without_fields_remains() {
    assert_lowers_to(
        "interface I { get x(): int; set x(v: int): void; }",
        "interface I { get x(): int; set x(v: int): void; }",
    );
}

#[test]
fn test_interface_fields_are_gone() {
    let module = lowered_module("interface I { readonly a: int; b?: string; c: double | undefined; }");
    let fields = count(&module, |arena, n| matches!(arena.kind(n), NodeKind::ClassProperty { .. }));
    assert_eq!(fields, 0);
    let text = print_compact(&module.arena, module.root);
    assert!(text.contains("get a(): int;"), "{}", text);
    assert!(!text.contains("set a("), "{}", text);
    assert!(text.contains("set b(value: string | undefined): void;"), "{}", text);
    assert!(text.contains("get c(): double | undefined;"), "{}", text);
}

#[test]
fn test_class_fields_follow_inherited_optional_properties() {
    let src = "interface A { x?: number; } \
               interface B extends A { y: int; } \
               class C implements B { x: number = 1; y: int = 2; } \
               class D implements A { x: number | undefined = undefined; }";
    let module = lowered_module(src);
    let text = print_compact(&module.arena, module.root);
    assert!(text.contains("class C implements B { x: number | undefined = 1; y: int = 2; }"), "{}", text);
    assert!(text.contains("class D implements A { x: number | undefined = undefined; }"), "{}", text);
}

#[test]
fn test_both_phases_compose() {
    let src = "interface P { n?: int; } \
               class Q implements P { n: int = 0; count: int = 0; bump(): void { this.count += 1; } }";
    let module = lowered_module(src);
    let text = print_compact(&module.arena, module.root);
    assert!(text.contains("get n(): int | undefined;"), "{}", text);
    assert!(text.contains("n: int | undefined = 0;"), "{}", text);
    assert!(text.contains("this.count = (this.count + 1) as int;"), "{}", text);
    assert!(!text.contains("+="), "{}", text);
}

#[test]
fn test_arithmetic_on_widened_field_is_reported_before_lowering() {
    let src = "interface P { n?: int; } \
               class Q implements P { n: int = 0; bump(): void { this.n += 1; } }";
    let result = LoweringPipeline::new().compile_source("test.ets", src);
    assert!(!result.is_success());
    assert!(result.report.phase_names().is_empty());
    let error = result.diagnostics.errors().next().unwrap();
    assert_eq!(error.code.as_deref(), Some("E1001"));
    assert_eq!(error.span.start.byte_offset, src.find("this.n += 1").unwrap());
}

#[test]
fn test_formatted_builds_are_structurally_equal() {
    let build = || {
        let mut arena = AstArena::new();
        let target = arena.alloc(NodeKind::Identifier { name: "total".into() }, Span::default());
        let value = arena.alloc(NodeKind::NumberLiteral { value: "3".into() }, Span::default());
        let statement = SnippetBuilder::new(&mut arena)
            .create_formatted_statement("@@I1 = (@@I1 * @@E2) as int;", &[target.into(), value.into()])
            .unwrap();
        (arena, statement)
    };
    let (left, a) = build();
    let (right, b) = build();
    assert!(left.structurally_equal(a, &right, b));
    assert_eq!(print_compact(&left, a), "total = (total * 3) as int;");
}

#[test]
fn test_placeholder_error_leaves_tree_untouched() {
    let (mut arena, root) = convert("let a: int = 1; a + 1;");
    let before = print_compact(&arena, root);
    let nodes_before = arena.len();
    let statement = arena.children(root)[1];
    let expr = arena.children(statement)[0];

    for (template, insertions) in [
        ("@@E1 * @@E3", vec![Insertion::from(expr)]),
        ("@@I1 * 2", vec![Insertion::from(expr)]),
        ("@@E0 * 2", vec![Insertion::from(expr)]),
    ] {
        let err = SnippetBuilder::new(&mut arena)
            .create_formatted_expression(template, &insertions)
            .unwrap_err();
        assert!(matches!(err, LoweringError::Syntax { code: Some(_), .. }), "{:?}", err);
        assert!(matches!(
            err.format_code(),
            Some(
                FormatErrorCode::InsertNodeAbsent
                    | FormatErrorCode::InvalidInsertNode
                    | FormatErrorCode::InvalidNumberNode
            )
        ));
    }

    assert_eq!(arena.len(), nodes_before);
    assert_eq!(arena.parent(expr), Some(statement));
    assert_eq!(print_compact(&arena, root), before);
    assert!(AstVerifier::with_default_checks().verify(&arena, root, None).is_empty());
}

#[test]
fn test_lowered_trees_have_no_orphans() {
    let src = "interface Shape { area?: double; readonly sides: int; } \
               class Square implements Shape { area: double = 0.0; sides: int = 4; side: double = 1.0; \
                   grow(by: double): void { this.side += by; this.area = this.side * this.side; } } \
               let total: long = 0; let k: int = 3; \
               function step(): int { k--; return k; } \
               while (k > 0) { total += step(); } \
               let copy: int = k++;";
    let result = lower(src);
    assert!(result.verifier_messages.is_empty(), "{:?}", result.verifier_messages);

    let module = result.module.unwrap();
    let messages = AstVerifier::with_default_checks().verify(&module.arena, module.root, None);
    assert!(messages.iter().all(|m| m.tag != NULL_PARENT), "{:?}", messages);
    assert!(messages.is_empty());
}

#[test]
fn test_disabled_phase_leaves_construct() {
    let config = PipelineConfig::from_toml_str("[lowering]\nenable_op_assignment = false\n").unwrap();
    let result = LoweringPipeline::with_config(config).compile_source("t.ets", "let a: int = 1; a += 2;");
    assert!(result.is_success());
    assert_eq!(result.report.phase_names(), vec!["InterfacePropertyDeclarationsPhase"]);
    assert!(result.lowered_source().unwrap().contains("a += 2;"));
}

#[test]
fn test_synthesized_code_reports_user_positions() {
    let src = "let a: int = 1;\nlet s: string = \"x\";\na += 2;\n";
    let module = lowered_module(src);
    let offset = src.find("a += 2").unwrap();
    let assignment = module
        .arena
        .subtree(module.root)
        .into_iter()
        .find(|&n| matches!(module.arena.kind(n), NodeKind::AssignmentExpression { .. }))
        .unwrap();
    for node in module.arena.subtree(assignment) {
        assert_eq!(module.arena.span(node).start, offset);
    }
}
