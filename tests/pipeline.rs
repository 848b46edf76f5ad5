//! End-to-end pipeline tests.
//!
//! These tests drive [`run_compilation`] through the public API only:
//! 1. Build a module with the builder
//! 2. Schedule the standard plan (or a custom pass list) from options
//! 3. Check the transformed module, the recorded events and the diagnostics

use pilopt::passmgr::{Event, RunStats};
use pilopt::pil::eval::{EvalValue, Evaluator, Outcome};
use pilopt::prelude::*;

fn int() -> PilType {
    PilType::Int(64)
}

fn object() -> PilType {
    PilType::Object("Klass".into())
}

/// `main` selects between two constants on a literal `true` and calls `helper`.
fn main_function() -> Function {
    let mut f = Function::new("main", PilLinkage::Public);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    let taken = b.create_block(Section::Main);
    let not_taken = b.create_block(Section::Main);
    let join = b.create_block(Section::Main);
    let result = b.add_block_arg(join, int(), OwnershipKind::Trivial);

    b.emit_block(entry);
    let helper = b.function_ref("helper");
    b.apply(helper, &[], int(), None);
    let unused = b.integer_literal(int(), 9);
    b.debug_value(unused, "unused");
    let condition = b.integer_literal(PilType::Int(1), 1);
    b.cond_branch(condition, taken, &[], not_taken, &[]);

    b.emit_block(taken);
    let one = b.integer_literal(int(), 1);
    b.branch(join, &[one]);

    b.emit_block(not_taken);
    let two = b.integer_literal(int(), 2);
    b.branch(join, &[two]);

    b.emit_block(join);
    b.return_(result);
    f
}

fn leaf(name: &str, linkage: PilLinkage, value: i128) -> Function {
    let mut f = Function::new(name, linkage);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let literal = b.integer_literal(int(), value);
    b.return_(literal);
    f
}

/// `owner(x) { %c = copy_value x; destroy_value x; return %c }`
fn owner_function() -> Function {
    let mut f = Function::new("owner", PilLinkage::Public);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let x = b.add_block_arg(entry, object(), OwnershipKind::Owned);
    let copy = b.copy_value(x);
    b.destroy_value(x);
    b.return_(copy);
    f
}

/// `dead_tail() { return 0 } bb1: %x = integer_literal 1 (line 7); return %x`
fn function_with_dead_block() -> Function {
    let mut f = Function::new("dead_tail", PilLinkage::Public);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    let dead = b.create_block(Section::Main);
    b.emit_block(entry);
    let zero = b.integer_literal(int(), 0);
    b.return_(zero);
    b.emit_block(dead);
    b.set_loc(Some(SourceLoc::new(7, 5)));
    let one = b.integer_literal(int(), 1);
    b.return_(one);
    f
}

fn program() -> Module {
    let mut module = Module::new("program");
    module.add_function(main_function());
    module.add_function(leaf("helper", PilLinkage::Private, 3));
    module.add_function(leaf("orphan", PilLinkage::Private, 4));
    module.add_function(owner_function());
    module
}

fn compile(module: &mut Module, options: &PilOptions) -> Result<(RunReport, DiagnosticCollector)> {
    let diagnostics = DiagnosticCollector::new(options.diagnostics.clone());
    let mut registry = PassRegistry::with_builtin_passes();
    let report = run_compilation(module, options, &mut registry, &diagnostics)?;
    Ok((report, diagnostics))
}

fn names(module: &Module) -> Vec<&str> {
    module.functions().iter().map(Function::name).collect()
}

fn function<'m>(module: &'m Module, name: &str) -> Result<&'m Function> {
    module
        .function(name)
        .ok_or_else(|| Error::Error(format!("{name} was removed")))
}

fn mnemonics(func: &Function) -> Vec<&'static str> {
    func.instructions()
        .into_iter()
        .map(|inst| func.kind(inst).mnemonic())
        .collect()
}

#[test]
fn test_onone_lowers_ownership_only() -> Result<()> {
    let mut module = program();
    let (report, diagnostics) = compile(&mut module, &PilOptions::default())?;

    assert!(report.is_success());
    assert!(report.changed);
    assert!(diagnostics.diagnostics().is_empty());
    assert_eq!(names(&module), vec!["main", "helper", "orphan", "owner"]);
    assert!(module.functions().iter().all(|f| !f.has_ownership()));

    assert_eq!(function(&module, "main")?.block_count(), 4);
    assert_eq!(
        mnemonics(function(&module, "owner")?),
        vec!["strong_retain", "strong_release", "return"]
    );
    assert_eq!(report.events.count_kind(EventKind::OwnershipLowered), 2);
    for func in module.functions() {
        func.verify()?;
    }
    Ok(())
}

#[test]
fn test_for_speed_simplifies_and_removes_dead_functions() -> Result<()> {
    let mut module = program();
    let options = PilOptions::new()
        .with_opt_mode(OptimizationMode::ForSpeed)
        .with_verify_all(true);
    let (report, diagnostics) = compile(&mut module, &options)?;

    assert!(report.is_success());
    assert!(diagnostics.diagnostics().is_empty());
    assert_eq!(names(&module), vec!["main", "helper", "owner"]);
    assert_eq!(report.events.count_kind(EventKind::FunctionRemoved), 1);
    assert!(report.events.count_kind(EventKind::BranchFolded) >= 1);

    let main = function(&module, "main")?;
    assert_eq!(main.block_count(), 1);
    assert_eq!(
        mnemonics(main),
        vec!["function_ref", "apply", "integer_literal", "return"]
    );

    let outcome = Evaluator::new(&module).run("main", Vec::new())?;
    assert_eq!(outcome, Outcome::Returned(EvalValue::Int(1)));

    assert_eq!(report.stats, RunStats::from_log(&report.events));
    assert_eq!(report.stats.functions_removed, 1);
    assert!(report.stats.branches_folded >= 1);
    assert!(report.events.functions_affected().contains("main"));
    assert_eq!(
        report.stats.functions_transformed,
        report.events.functions_affected().len()
    );
    Ok(())
}

#[test]
fn test_disabled_pass_is_not_run() -> Result<()> {
    let mut module = program();
    let options = PilOptions::new()
        .with_opt_mode(OptimizationMode::ForSpeed)
        .with_disabled_pass("sil-deadfuncelim");
    let (report, _) = compile(&mut module, &options)?;

    assert!(report.is_success());
    assert_eq!(names(&module), vec!["main", "helper", "orphan", "owner"]);
    assert_eq!(report.events.count_kind(EventKind::FunctionRemoved), 0);
    Ok(())
}

#[test]
fn test_diagnostics_only_keeps_ownership() -> Result<()> {
    let mut module = program();
    module.add_function(function_with_dead_block());
    let options = PilOptions::new().with_diagnostics_only(true);
    let (report, diagnostics) = compile(&mut module, &options)?;

    assert!(report.is_success());
    assert!(module.functions().iter().all(Function::has_ownership));
    let reported = diagnostics.diagnostics();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].id, DiagnosticId::UnreachableCode);
    assert_eq!(reported[0].loc, Some(SourceLoc::new(7, 5)));
    assert_eq!(reported[0].function.as_deref(), Some("dead_tail"));
    assert_eq!(report.events.count_kind(EventKind::UnreachableCodeRemoved), 1);
    Ok(())
}

#[test]
fn test_errors_in_diagnostic_pipeline_stop_the_run() -> Result<()> {
    let mut module = program();
    module.add_function(function_with_dead_block());
    let options = PilOptions::new()
        .with_diagnostic_options(DiagnosticOptions::new().with_warnings_as_errors(true));
    let (report, diagnostics) = compile(&mut module, &options)?;

    assert_eq!(report.state, RunState::AbortedOnFatalDiagnostic);
    assert!(!report.is_success());
    assert_eq!(diagnostics.error_count(), 1);
    assert_eq!(diagnostics.diagnostics()[0].severity, Severity::Error);
    // The Onone pipeline never ran.
    assert!(module.functions().iter().all(Function::has_ownership));
    Ok(())
}

#[test]
fn test_custom_pass_list_runs_in_order() -> Result<()> {
    let mut module = program();
    let options = PilOptions::new().with_custom_pass_list(["simplify-cfg", "dce", "inst-count"]);
    let (report, _) = compile(&mut module, &options)?;

    assert!(report.is_success());
    assert_eq!(report.passes_executed, 3);
    assert_eq!(report.change_counts.get("main"), Some(&2));
    assert_eq!(report.change_counts.get("helper"), None);

    let statistics: Vec<&Event> = report
        .events
        .filter_kind(EventKind::StatisticsRecorded)
        .collect();
    assert_eq!(statistics.len(), module.len());
    assert_eq!(statistics[0].function.as_deref(), Some("main"));
    assert!(statistics[0].message.starts_with("1 block(s), 4 instruction(s)"));
    Ok(())
}

#[test]
fn test_unimplemented_catalog_passes_are_skipped() -> Result<()> {
    let mut module = program();
    let options = PilOptions::new().with_custom_pass_list(["cse", "licm", "dce"]);
    let (report, _) = compile(&mut module, &options)?;

    assert!(report.is_success());
    assert_eq!(report.passes_executed, 1);
    Ok(())
}

#[test]
fn test_invalid_options_are_rejected() {
    let mut module = program();

    let unknown = PilOptions::new().with_custom_pass_list(["dead-code"]);
    assert!(matches!(
        compile(&mut module, &unknown),
        Err(Error::UnknownPass(tag)) if tag == "dead-code"
    ));

    let unlowered = PilOptions::new()
        .with_opt_mode(OptimizationMode::ForSize)
        .with_ownership_lowering(false);
    assert!(matches!(
        compile(&mut module, &unlowered),
        Err(Error::UnsupportedOptions(_))
    ));

    let mixed = PilOptions::new()
        .with_diagnostics_only(true)
        .with_custom_pass_list(["dce"]);
    assert!(matches!(
        compile(&mut module, &mixed),
        Err(Error::UnsupportedOptions(_))
    ));

    assert_eq!(names(&module), vec!["main", "helper", "orphan", "owner"]);
}

#[test]
fn test_custom_pass_manager_run() -> Result<()> {
    let mut module = program();
    let options = PilOptions::new();
    let diagnostics = DiagnosticCollector::default();
    let mut registry = PassRegistry::with_builtin_passes();

    let mut manager = PassManager::new(&module, &mut registry, &options, &diagnostics);
    assert_eq!(manager.state(), RunState::NotStarted);
    let changed = manager.run_pass(&mut module, PassKind::SimplifyCFG, 0)?;
    assert!(changed);
    assert_eq!(manager.state(), RunState::RunningPass(0));
    assert!(!manager.run_pass(&mut module, PassKind::SimplifyCFG, 1)?);

    let report = manager.finish();
    assert_eq!(report.passes_executed, 2);
    assert_eq!(report.change_counts.get("main"), Some(&1));
    Ok(())
}

#[test]
fn test_stats_of_a_run_without_changes() -> Result<()> {
    let mut module = Module::new("empty");
    module.add_function(leaf("helper", PilLinkage::Public, 3));
    let options = PilOptions::new().with_custom_pass_list(["dce", "simplify-cfg"]);
    let (report, _) = compile(&mut module, &options)?;

    assert!(report.is_success());
    assert!(!report.changed);
    assert_eq!(report.stats, RunStats::default());
    Ok(())
}

/// Dominance summary recorded for `name` by the most recent dominance pass run.
fn last_dominance_summary(manager: &PassManager<'_>, name: &str) -> Option<String> {
    manager
        .context()
        .events
        .filter_kind(EventKind::AnalysisComputed)
        .filter(|event| event.function.as_deref() == Some(name))
        .last()
        .map(|event| event.message.clone())
}

#[test]
fn test_cached_dominance_follows_cfg_changes() -> Result<()> {
    let mut module = program();
    let original_blocks = function(&module, "main")?.layout().to_vec();
    let options = PilOptions::new();
    let diagnostics = DiagnosticCollector::default();
    let mut registry = PassRegistry::with_builtin_passes();
    let mut manager = PassManager::new(&module, &mut registry, &options, &diagnostics);

    assert!(!manager.run_pass(&mut module, PassKind::ComputeDominanceInfo, 0)?);
    let cache = manager.analyses("main").ok_or(Error::Error("no cache for main".into()))?;
    assert_eq!(cache.computations(), 2);
    assert!(cache.is_valid(AnalysisKind::Dominance));
    let summary = last_dominance_summary(&manager, "main").unwrap_or_default();
    assert!(summary.starts_with("4 of 4 block(s) reachable"), "{summary}");

    // A pass reporting no change keeps every cached analysis.
    assert!(!manager.run_pass(&mut module, PassKind::ComputeDominanceInfo, 1)?);
    let cache = manager.analyses("main").ok_or(Error::Error("no cache for main".into()))?;
    assert_eq!(cache.computations(), 2);

    assert!(manager.run_pass(&mut module, PassKind::SimplifyCFG, 2)?);
    let cache = manager.analyses("main").ok_or(Error::Error("no cache for main".into()))?;
    assert!(!cache.is_valid(AnalysisKind::Dominance));
    assert!(!cache.is_valid(AnalysisKind::PostDominance));
    assert!(cache.cached_dominance().is_none());
    let untouched = manager.analyses("helper").ok_or(Error::Error("no cache for helper".into()))?;
    assert!(untouched.is_valid(AnalysisKind::Dominance));
    assert_eq!(untouched.computations(), 2);

    assert!(!manager.run_pass(&mut module, PassKind::ComputeDominanceInfo, 3)?);
    let cache = manager.analyses("main").ok_or(Error::Error("no cache for main".into()))?;
    assert_eq!(cache.computations(), 4);
    let summary = last_dominance_summary(&manager, "main").unwrap_or_default();
    assert!(summary.starts_with("1 of 1 block(s) reachable"), "{summary}");

    let main = function(&module, "main")?;
    let dominance = cache
        .cached_dominance()
        .ok_or(Error::Error("dominance not recomputed".into()))?;
    for &block in main.layout() {
        assert!(dominance.is_reachable(block));
    }
    for block in original_blocks.iter().filter(|block| !main.layout().contains(block)) {
        assert!(!dominance.is_reachable(*block));
    }
    Ok(())
}

/// Dead code elimination stand-in whose setup always fails.
struct BrokenSetup;

impl PilPass for BrokenSetup {
    fn kind(&self) -> PassKind {
        PassKind::DCE
    }

    fn run_on_function(
        &self,
        _func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        _events: &EventLog,
    ) -> Result<bool> {
        Ok(false)
    }

    fn initialize(&mut self, _ctx: &PassContext<'_>) -> Result<()> {
        Err(Error::Error("missing configuration".into()))
    }
}

/// Stand-in whose teardown always fails.
struct BrokenTeardown;

impl PilPass for BrokenTeardown {
    fn kind(&self) -> PassKind {
        PassKind::DCE
    }

    fn run_on_function(
        &self,
        _func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        _events: &EventLog,
    ) -> Result<bool> {
        Ok(false)
    }

    fn finalize(&mut self, _ctx: &PassContext<'_>) -> Result<()> {
        Err(Error::Error("could not flush".into()))
    }
}

/// Runs `inst-count` followed by a `dce` replaced with `pass`.
fn run_with_failing_dce(pass: Box<dyn PilPass>) -> Result<(RunReport, DiagnosticCollector)> {
    let mut module = program();
    let options = PilOptions::new();
    let diagnostics = DiagnosticCollector::default();
    let mut registry = PassRegistry::with_builtin_passes();
    registry.register(pass);

    let mut manager = PassManager::new(&module, &mut registry, &options, &diagnostics);
    manager.run_pass(&mut module, PassKind::InstCount, 0)?;
    manager.run_pass(&mut module, PassKind::DCE, 1)?;
    assert!(manager.is_aborted());
    // Nothing runs after the failure.
    assert!(!manager.run_pass(&mut module, PassKind::SimplifyCFG, 2)?);
    Ok((manager.finish(), diagnostics))
}

#[test]
fn test_failing_initialize_aborts_the_run() -> Result<()> {
    let (report, diagnostics) = run_with_failing_dce(Box::new(BrokenSetup))?;

    assert_eq!(report.state, RunState::AbortedOnFatalDiagnostic);
    assert!(!report.is_success());
    assert_eq!(report.passes_executed, 1);
    assert!(!report.changed);
    let reported = diagnostics.diagnostics();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].id, DiagnosticId::PassFailed);
    assert_eq!(reported[0].severity, Severity::Fatal);
    assert!(reported[0].message.contains("'dce'"));
    assert!(reported[0].message.contains("missing configuration"));
    Ok(())
}

#[test]
fn test_failing_finalize_aborts_the_run() -> Result<()> {
    let (report, diagnostics) = run_with_failing_dce(Box::new(BrokenTeardown))?;

    assert_eq!(report.state, RunState::AbortedOnFatalDiagnostic);
    assert_eq!(report.passes_executed, 2);
    let reported = diagnostics.diagnostics();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].id, DiagnosticId::PassFailed);
    assert!(reported[0].message.contains("could not flush"));
    Ok(())
}
