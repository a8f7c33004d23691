//! Engine benchmarks.
//!
//! - Compilation of a mid-sized script, cold and through the code cache
//! - Interpreter throughput on loops, calls, property access and strings
//! - Generator resumption

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use spacey_vm::{CompileOptions, Engine, compile};

const FIB: &str = "function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); } fib(20)";

const LOOP: &str = "var sum = 0; for (var i = 0; i < 100000; i++) { sum += i % 7; } sum";

const OBJECTS: &str = "var points = []; \
    for (var i = 0; i < 2000; i++) points.push({ x: i, y: i * 2 }); \
    points.filter(p => p.x % 2).map(p => p.x + p.y).reduce((a, b) => a + b, 0)";

const STRINGS: &str = "var parts = []; \
    for (var i = 0; i < 1000; i++) parts.push('item' + i); \
    parts.join(',').split(',').map(s => s.toUpperCase()).join('').length";

const GENERATORS: &str = "function* range(n) { for (var i = 0; i < n; i++) yield i; } \
    var total = 0; for (var v of range(5000)) total += v; total";

fn library_source() -> String {
    (0..50)
        .map(|i| {
            format!(
                "function helper{i}(a, b) {{ var o = {{ a, b, list: [a, b, {i}] }}; \
                 for (var k in o) {{ if (o[k] === undefined) delete o[k]; }} \
                 return JSON.stringify(o) + `${{a}}-${{b}}`; }}\n"
            )
        })
        .collect()
}

fn bench_compile(c: &mut Criterion) {
    let source = library_source();
    let mut group = c.benchmark_group("compile");
    group.throughput(Throughput::Bytes(source.len() as u64));

    group.bench_function("cold", |b| {
        b.iter(|| compile(black_box(&source), &CompileOptions::default()).unwrap())
    });

    let engine = Engine::new();
    engine.compile(&source, &CompileOptions::default()).unwrap();
    group.bench_function("cached", |b| {
        b.iter(|| engine.compile(black_box(&source), &CompileOptions::default()).unwrap())
    });

    group.finish();
}

fn bench_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("execute");

    for (name, source) in [
        ("fib", FIB),
        ("loop", LOOP),
        ("objects", OBJECTS),
        ("strings", STRINGS),
        ("generators", GENERATORS),
    ] {
        let code = compile(source, &CompileOptions::default()).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(name), &code, |b, code| {
            b.iter(|| {
                let mut engine = Engine::new();
                black_box(engine.run(code.clone()).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_engine_creation(c: &mut Criterion) {
    c.bench_function("engine_new", |b| b.iter(|| black_box(Engine::new())));
}

criterion_group!(benches, bench_compile, bench_execute, bench_engine_creation);
criterion_main!(benches);
