//! Results do not depend on scheduling.
//!
//! The same module compiled twice, or compiled once sequentially and once with
//! function passes on the rayon pool, must print identically and report the
//! same events in the same order.

use pilopt::prelude::*;

const FUNCTIONS: usize = 24;

fn int() -> PilType {
    PilType::Int(64)
}

/// A function with a constant diamond, a dead chain, a call to its successor
/// and, for some indices, a copy/destroy pair or an unreachable located block.
fn generated(index: usize) -> Function {
    let linkage = if index % 5 == 4 {
        PilLinkage::Private
    } else {
        PilLinkage::Public
    };
    let mut f = Function::new(format!("f{index}"), linkage);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    let left = b.create_block(Section::Main);
    let right = b.create_block(Section::Main);
    let join = b.create_block(Section::Main);
    let result = b.add_block_arg(join, int(), OwnershipKind::Trivial);

    b.emit_block(entry);
    let object = b.add_block_arg(entry, PilType::Object("Klass".into()), OwnershipKind::Owned);
    if index + 1 < FUNCTIONS && index % 5 != 3 {
        let callee = b.function_ref(format!("f{}", index + 1));
        let object_copy = b.copy_value(object);
        b.apply(callee, &[object_copy], int(), None);
    }
    if index % 3 == 0 {
        let copy = b.copy_value(object);
        b.destroy_value(copy);
    }
    b.destroy_value(object);

    let mut chain = b.integer_literal(int(), 1);
    for _ in 0..index % 4 + 1 {
        chain = b.builtin(BuiltinOp::Add, chain, chain, int());
    }
    b.debug_value(chain, "chain");
    let condition = b.integer_literal(PilType::Int(1), i128::from(index % 2 == 0));
    b.cond_branch(condition, left, &[], right, &[]);

    b.emit_block(left);
    let small = b.integer_literal(int(), 10);
    b.branch(join, &[small]);

    b.emit_block(right);
    let large = b.integer_literal(int(), 20);
    b.branch(join, &[large]);

    b.emit_block(join);
    b.return_(result);

    if index % 7 == 0 {
        let dead = b.create_block(Section::Main);
        b.emit_block(dead);
        let line = u32::try_from(100 + index).unwrap_or(u32::MAX);
        b.set_loc(Some(SourceLoc::new(line, 1)));
        let zero = b.integer_literal(int(), 0);
        b.return_(zero);
    }
    f
}

fn module() -> Module {
    let mut module = Module::new("generated");
    for index in 0..FUNCTIONS {
        module.add_function(generated(index));
    }
    module
}

struct Run {
    printed: String,
    events: Vec<String>,
    diagnostics: Vec<String>,
    state: RunState,
}

fn compile(options: &PilOptions) -> Result<Run> {
    let mut module = module();
    let diagnostics = DiagnosticCollector::default();
    let mut registry = PassRegistry::with_builtin_passes();
    let report = run_compilation(&mut module, options, &mut registry, &diagnostics)?;

    let events = report
        .events
        .iter()
        .map(|event| {
            format!(
                "{:?} {:?} {:?}: {}",
                event.kind, event.pass, event.function, event.message
            )
        })
        .collect();
    let mut reported: Vec<String> = diagnostics
        .diagnostics()
        .iter()
        .map(ToString::to_string)
        .collect();
    reported.sort();

    Ok(Run {
        printed: module.to_string(),
        events,
        diagnostics: reported,
        state: report.state,
    })
}

fn assert_same(a: &Run, b: &Run) {
    assert_eq!(a.state, b.state);
    assert_eq!(a.printed, b.printed);
    assert_eq!(a.events, b.events);
    assert_eq!(a.diagnostics, b.diagnostics);
}

#[test]
fn test_repeated_runs_are_identical() -> Result<()> {
    let options = PilOptions::new().with_opt_mode(OptimizationMode::ForSpeed);
    let first = compile(&options)?;
    let second = compile(&options)?;

    assert_eq!(first.state, RunState::Completed);
    assert!(!first.events.is_empty());
    assert_same(&first, &second);
    Ok(())
}

#[test]
fn test_parallel_matches_sequential_onone() -> Result<()> {
    let sequential = compile(&PilOptions::new())?;
    let parallel = compile(&PilOptions::new().with_parallel(true))?;
    assert_same(&sequential, &parallel);
    Ok(())
}

#[test]
fn test_parallel_matches_sequential_for_speed() -> Result<()> {
    let base = PilOptions::new()
        .with_opt_mode(OptimizationMode::ForSpeed)
        .with_statistics(true)
        .with_verify_all(true);
    let sequential = compile(&base)?;
    let parallel = compile(&base.clone().with_parallel(true))?;

    assert_eq!(sequential.state, RunState::Completed);
    assert_eq!(
        sequential.diagnostics.len(),
        (0..FUNCTIONS).filter(|index| index % 7 == 0).count()
    );
    assert_same(&sequential, &parallel);
    Ok(())
}
