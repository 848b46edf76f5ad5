//! Benchmarks for dead code removal.
//!
//! Measures deleting long chains of trivially dead instructions, both through
//! the utility directly and through the `dce` pass driven by the pass manager.

extern crate pilopt;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use pilopt::prelude::*;
use pilopt::utils::recursively_delete_trivially_dead_instructions;
use std::hint::black_box;

/// `chain(seed) { %0 = integer_literal 1; %n+1 = add %n, %n; ...; return seed }`
fn chain(name: &str, depth: usize) -> (Function, InstId) {
    let mut f = Function::new(name, PilLinkage::Public);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let seed = b.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
    let mut last = b.integer_literal(PilType::Int(64), 1);
    for _ in 0..depth {
        last = b.builtin(BuiltinOp::Add, last, last, PilType::Int(64));
    }
    b.return_(seed);

    let tip = f.value(last).defining_inst().unwrap();
    (f, tip)
}

fn bench_delete_dead_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_dead_chain");
    for depth in [100usize, 1_000, 5_000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || chain("chain", depth),
                |(mut f, tip)| {
                    let erased = recursively_delete_trivially_dead_instructions(
                        &mut f,
                        &[tip],
                        false,
                        |_, _| {},
                    );
                    black_box(erased)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_dce_pass(c: &mut Criterion) {
    let options = PilOptions::new().with_custom_pass_list(["dce"]);

    let mut group = c.benchmark_group("dce_pass");
    for depth in [100usize, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || {
                    let mut module = Module::new("bench");
                    for index in 0..8 {
                        module.add_function(chain(&format!("chain{index}"), depth).0);
                    }
                    module
                },
                |mut module| {
                    let diagnostics = DiagnosticCollector::default();
                    let mut registry = PassRegistry::with_builtin_passes();
                    let report =
                        run_compilation(&mut module, &options, &mut registry, &diagnostics)
                            .unwrap();
                    black_box(report.changed)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_delete_dead_chain, bench_dce_pass);
criterion_main!(benches);
