//! Benchmarks for the snippet builder and the lowering phases

use compiler::ast::{AstArena, NodeKind, Span};
use compiler::pipeline::{lower_sources_parallel, LoweringPipeline, PipelineConfig};
use compiler::SnippetBuilder;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn generate_compound_assignments(count: usize) -> String {
    let mut code = String::from("let xs: int[] = [0, 1, 2, 3];\nlet total: long = 0;\n");
    code.push_str("function pick(): int[] { return xs; }\n");
    for i in 0..count {
        code.push_str(&format!("let v{}: int = {};\n", i, i));
        code.push_str(&format!("v{} += {};\n", i, i + 1));
        code.push_str(&format!("pick()[{}] *= v{};\n", i % 4, i));
        code.push_str(&format!("total += v{}++;\n", i));
    }
    code
}

fn generate_interfaces(count: usize) -> String {
    let mut code = String::new();
    for i in 0..count {
        code.push_str(&format!(
            "interface I{} {{ a{}?: number; readonly b{}: int; c{}: string; }}\n",
            i, i, i, i
        ));
        code.push_str(&format!(
            "class C{} implements I{} {{ a{}: number = 1; b{}: int = 2; c{}: string = \"\"; }}\n",
            i, i, i, i, i
        ));
    }
    code
}

fn benchmark_snippet_builder(c: &mut Criterion) {
    c.bench_function("formatted_statement", |b| {
        b.iter(|| {
            let mut arena = AstArena::new();
            let target = arena.alloc(NodeKind::Identifier { name: "x".into() }, Span::default());
            let value = arena.alloc(NodeKind::NumberLiteral { value: "2".into() }, Span::default());
            let statement = SnippetBuilder::new(&mut arena).create_formatted_statement(
                black_box("@@I1 = (@@I1 + (@@E2)) as int;"),
                &[target.into(), value.into()],
            );
            black_box(statement.ok());
        });
    });
}

fn benchmark_op_assignment(c: &mut Criterion) {
    let mut group = c.benchmark_group("op_assignment_lowering");

    for count in [10, 50, 200].iter() {
        let code = generate_compound_assignments(*count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &code, |b, code| {
            b.iter(|| {
                let mut pipeline = LoweringPipeline::with_config(PipelineConfig::release());
                let result = pipeline.compile_source("bench.ets", black_box(code));
                black_box(result);
            });
        });
    }

    group.finish();
}

fn benchmark_interface_properties(c: &mut Criterion) {
    let mut group = c.benchmark_group("interface_properties");

    for count in [10, 50].iter() {
        let code = generate_interfaces(*count);

        group.bench_with_input(BenchmarkId::from_parameter(count), &code, |b, code| {
            b.iter(|| {
                let mut pipeline = LoweringPipeline::with_config(PipelineConfig::release());
                black_box(pipeline.compile_source("bench.ets", black_box(code)));
            });
        });
    }

    group.finish();
}

fn benchmark_parallel_units(c: &mut Criterion) {
    let sources: Vec<(String, String)> = (0..16)
        .map(|i| (format!("unit{}.ets", i), generate_compound_assignments(20)))
        .collect();
    c.bench_function("parallel_units", |b| {
        b.iter(|| black_box(lower_sources_parallel(&PipelineConfig::release(), black_box(&sources))));
    });
}

criterion_group!(
    benches,
    benchmark_snippet_builder,
    benchmark_op_assignment,
    benchmark_interface_properties,
    benchmark_parallel_units
);

criterion_main!(benches);
