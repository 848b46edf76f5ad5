//! Pipeline execution.
//!
//! The [`PassManager`] walks a [`CompilationPlan`] pipeline by pipeline, stage by
//! stage, pass by pass. For each pass it:
//!
//! 1. checks whether a fatal diagnostic was raised and aborts if so,
//! 2. computes the analyses the pass requires for every function whose cached
//!    result is stale,
//! 3. runs the pass on every function definition (or once on the module),
//! 4. drops the cached analyses the pass invalidated on every function it changed.
//!
//! A fixpoint stage repeats its passes until one iteration changes nothing, bounded
//! by [`PilOptions::max_fixpoint_iterations`]. A stage marked `stop_on_error` ends
//! the invocation when an error diagnostic was reported during it.
//!
//! # Parallelism
//!
//! With [`PilOptions::parallel`] set, function passes run over the module's
//! functions on the rayon pool. Each worker owns exactly one `&mut Function` and
//! records into its own [`EventLog`]; the logs are merged in module order after
//! the pass, so the report is identical to a sequential run.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use rayon::prelude::*;

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    diagnostics::{Diagnostic, DiagnosticEngine, DiagnosticId},
    options::PilOptions,
    passmgr::{
        CompilationPlan, EventLog, PassContext, PassKind, PassPipelinePlan, PassRegistry,
        PassStage, PilPass, RunStats, StageItem,
    },
    pil::{Function, Module},
    Error, Result,
};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunState {
    /// Nothing ran yet.
    NotStarted,
    /// Running the pass at this position of the current pipeline's pass list.
    RunningPass(usize),
    /// Every scheduled pass ran.
    Completed,
    /// A fatal diagnostic (or an error in a stop-on-error stage) ended the run.
    AbortedOnFatalDiagnostic,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("not started"),
            Self::RunningPass(index) => write!(f, "running pass #{index}"),
            Self::Completed => f.write_str("completed"),
            Self::AbortedOnFatalDiagnostic => f.write_str("aborted on fatal diagnostic"),
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Final state.
    pub state: RunState,
    /// Pass runs with an implementation, fixpoint iterations counted separately.
    pub passes_executed: usize,
    /// Whether any pass changed the module.
    pub changed: bool,
    /// Everything the passes recorded, in module order per pass.
    pub events: EventLog,
    /// Number of changing pass runs per function name.
    pub change_counts: BTreeMap<String, usize>,
    /// Counters derived from `events`.
    pub stats: RunStats,
}

impl RunReport {
    /// Returns `true` if every scheduled pass ran.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.state == RunState::Completed
    }
}

/// Runs pipelines over one module.
///
/// # Examples
///
/// ```rust
/// use pilopt::diagnostics::DiagnosticCollector;
/// use pilopt::options::PilOptions;
/// use pilopt::passmgr::{PassManager, PassPipelinePlan, PassRegistry, RunState};
/// use pilopt::pil::Module;
///
/// let mut module = Module::new("m");
/// let options = PilOptions::new();
/// let diagnostics = DiagnosticCollector::default();
/// let mut registry = PassRegistry::with_builtin_passes();
///
/// let mut manager = PassManager::new(&module, &mut registry, &options, &diagnostics);
/// manager.run_pipeline(&mut module, &PassPipelinePlan::from_tags(&["dce"])?)?;
/// let report = manager.finish();
/// assert_eq!(report.state, RunState::Completed);
/// # Ok::<(), pilopt::Error>(())
/// ```
pub struct PassManager<'a> {
    registry: &'a mut PassRegistry,
    ctx: PassContext<'a>,
    analyses: HashMap<String, AnalysisCache>,
    state: RunState,
    passes_executed: usize,
    changed: bool,
}

/// Result of one function-pass run on one function.
struct FunctionOutcome {
    events: EventLog,
    result: Result<bool>,
}

impl<'a> PassManager<'a> {
    /// Creates a manager for runs over `module`.
    #[must_use]
    pub fn new(
        module: &Module,
        registry: &'a mut PassRegistry,
        options: &'a PilOptions,
        diagnostics: &'a dyn DiagnosticEngine,
    ) -> Self {
        Self {
            registry,
            ctx: PassContext::new(module, options, diagnostics),
            analyses: HashMap::new(),
            state: RunState::NotStarted,
            passes_executed: 0,
            changed: false,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> RunState {
        self.state
    }

    /// Shared run state, including the events recorded so far.
    #[must_use]
    pub fn context(&self) -> &PassContext<'a> {
        &self.ctx
    }

    /// Analyses cached for function `name` between passes.
    #[must_use]
    pub fn analyses(&self, name: &str) -> Option<&AnalysisCache> {
        self.analyses.get(name)
    }

    /// Returns `true` once the run was aborted.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.state == RunState::AbortedOnFatalDiagnostic
    }

    /// Runs every pipeline of `plan` in order.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if shared run state was poisoned. Pass
    /// failures are not errors here: they are reported as fatal diagnostics and
    /// abort the run.
    pub fn run_plan(&mut self, module: &mut Module, plan: &CompilationPlan) -> Result<()> {
        for pipeline in plan.pipelines() {
            self.run_pipeline(module, pipeline)?;
            if self.is_aborted() {
                break;
            }
        }
        Ok(())
    }

    /// Runs one pipeline.
    ///
    /// # Returns
    ///
    /// `true` if any pass of the pipeline changed the module.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if shared run state was poisoned.
    pub fn run_pipeline(&mut self, module: &mut Module, pipeline: &PassPipelinePlan) -> Result<bool> {
        if self.is_aborted() {
            return Ok(false);
        }
        log::debug!("running pipeline {} on module {}", pipeline.name(), module.name());

        let mut changed = false;
        let mut offset = 0;
        for stage in pipeline.stages() {
            changed |= self.run_stage(module, stage, offset)?;
            if self.is_aborted() {
                log::info!(
                    "pipeline {} aborted in stage '{}'",
                    pipeline.name(),
                    stage.name
                );
                return Ok(changed);
            }
            offset += stage.pass_kinds().count();
        }

        self.state = RunState::Completed;
        Ok(changed)
    }

    fn run_stage(&mut self, module: &mut Module, stage: &PassStage, offset: usize) -> Result<bool> {
        let iterations = if stage.fixpoint {
            self.ctx.options.max_fixpoint_iterations
        } else {
            1
        };

        let mut changed = false;
        for iteration in 0..iterations {
            let mut index = offset;
            let mut iteration_changed = false;
            for item in &stage.items {
                let passes = match item {
                    StageItem::Pass(kind) => std::slice::from_ref(kind),
                    StageItem::Group(group) => {
                        log::trace!("stage '{}': group {}", stage.name, group.name);
                        group.passes.as_slice()
                    }
                };
                for &kind in passes {
                    iteration_changed |= self.run_pass(module, kind, index)?;
                    if self.is_aborted() {
                        return Ok(changed | iteration_changed);
                    }
                    index += 1;
                }
            }
            changed |= iteration_changed;

            if !iteration_changed {
                break;
            }
            if stage.fixpoint {
                log::debug!(
                    "stage '{}' iteration {} changed the module",
                    stage.name,
                    iteration + 1
                );
            }
        }

        if stage.stop_on_error && self.ctx.diagnostics.has_errors() {
            log::info!("stage '{}' reported errors, stopping", stage.name);
            self.state = RunState::AbortedOnFatalDiagnostic;
        }
        Ok(changed)
    }

    /// Runs a single pass over `module`.
    ///
    /// Passes without a registered implementation are skipped.
    ///
    /// # Returns
    ///
    /// `true` if the pass changed the module.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if shared run state was poisoned.
    pub fn run_pass(&mut self, module: &mut Module, kind: PassKind, index: usize) -> Result<bool> {
        if self.ctx.diagnostics.has_fatal() {
            log::info!("fatal diagnostic reported, not running {kind}");
            self.state = RunState::AbortedOnFatalDiagnostic;
            return Ok(false);
        }

        let Some(pass) = self.registry.get_mut(kind) else {
            log::debug!("skipping {kind}: no implementation registered");
            return Ok(false);
        };
        self.state = RunState::RunningPass(index);

        if let Err(error) = pass.initialize(&self.ctx) {
            self.report_failure(kind, &error.to_string());
            self.state = RunState::AbortedOnFatalDiagnostic;
            return Ok(false);
        }

        let pass: &dyn PilPass = pass;
        let changed = if pass.is_module_pass() {
            Self::run_module_pass(pass, module, &self.ctx, &mut self.analyses)?
        } else {
            Self::run_function_pass(pass, module, &self.ctx, &mut self.analyses)?
        };

        let mut finalized = true;
        if let Some(pass) = self.registry.get_mut(kind) {
            if let Err(error) = pass.finalize(&self.ctx) {
                self.report_failure(kind, &error.to_string());
                finalized = false;
            }
        }

        self.passes_executed += 1;
        self.changed |= changed;
        if !finalized || self.ctx.diagnostics.has_fatal() {
            self.state = RunState::AbortedOnFatalDiagnostic;
        }
        Ok(changed)
    }

    fn run_module_pass(
        pass: &dyn PilPass,
        module: &mut Module,
        ctx: &PassContext<'_>,
        analyses: &mut HashMap<String, AnalysisCache>,
    ) -> Result<bool> {
        log::trace!("running module pass {} on {}", pass.tag(), module.name());
        let changed = match pass.run_on_module(module, ctx) {
            Ok(changed) => changed,
            Err(error) => {
                ctx.diagnose(Diagnostic::new(
                    DiagnosticId::PassFailed,
                    Error::Pass {
                        pass: pass.tag(),
                        message: error.to_string(),
                    }
                    .to_string(),
                ));
                return Ok(false);
            }
        };

        if changed {
            let invalidated = pass.invalidates();
            analyses.retain(|name, _| module.function(name).is_some());
            for cache in analyses.values_mut() {
                cache.invalidate(invalidated);
            }
            ctx.rebuild_call_graph(module)?;
            if ctx.options.verify_all {
                for func in module.functions() {
                    verify_after(pass, func);
                }
            }
        }
        Ok(changed)
    }

    fn run_function_pass(
        pass: &dyn PilPass,
        module: &mut Module,
        ctx: &PassContext<'_>,
        analyses: &mut HashMap<String, AnalysisCache>,
    ) -> Result<bool> {
        let mut caches: Vec<AnalysisCache> = module
            .functions()
            .iter()
            .map(|func| analyses.remove(func.name()).unwrap_or_default())
            .collect();

        let run_one = |(func, cache): (&mut Function, &mut AnalysisCache)| -> FunctionOutcome {
            let events = EventLog::new();
            if !func.is_definition() {
                return FunctionOutcome {
                    events,
                    result: Ok(false),
                };
            }

            for &analysis in pass.required_analyses() {
                cache.ensure(analysis, func);
            }
            log::trace!("running {} on {}", pass.tag(), func.name());
            let result = pass.run_on_function(func, cache, ctx, &events);
            if let Ok(true) = result {
                cache.invalidate(pass.invalidates());
            }
            if ctx.options.verify_all {
                verify_after(pass, func);
            }
            FunctionOutcome { events, result }
        };

        let outcomes: Vec<FunctionOutcome> = if ctx.options.parallel {
            module
                .functions_mut()
                .par_iter_mut()
                .zip(caches.par_iter_mut())
                .map(run_one)
                .collect()
        } else {
            module
                .functions_mut()
                .iter_mut()
                .zip(caches.iter_mut())
                .map(run_one)
                .collect()
        };

        let mut changed = false;
        let mut calls_changed = false;
        for ((func, cache), outcome) in module.functions().iter().zip(caches).zip(outcomes) {
            ctx.events.merge(&outcome.events);
            match outcome.result {
                Ok(true) => {
                    changed = true;
                    calls_changed |= pass.invalidates().contains(InvalidationKind::CALLS);
                    ctx.record_change(func.name());
                }
                Ok(false) => {}
                Err(error) => {
                    ctx.diagnose(
                        Diagnostic::new(
                            DiagnosticId::PassFailed,
                            Error::Pass {
                                pass: pass.tag(),
                                message: error.to_string(),
                            }
                            .to_string(),
                        )
                        .in_function(func.name()),
                    );
                }
            }
            analyses.insert(func.name().to_string(), cache);
        }

        if calls_changed {
            ctx.rebuild_call_graph(module)?;
        }
        Ok(changed)
    }

    fn report_failure(&self, kind: PassKind, message: &str) {
        self.ctx.diagnose(Diagnostic::new(
            DiagnosticId::PassFailed,
            Error::Pass {
                pass: kind.tag(),
                message: message.to_string(),
            }
            .to_string(),
        ));
    }

    /// Ends the run and returns its report.
    #[must_use]
    pub fn finish(self) -> RunReport {
        let change_counts = self
            .ctx
            .change_counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect();
        RunReport {
            state: self.state,
            passes_executed: self.passes_executed,
            changed: self.changed,
            stats: RunStats::from_log(&self.ctx.events),
            events: self.ctx.events,
            change_counts,
        }
    }
}

fn verify_after(pass: &dyn PilPass, func: &Function) {
    if let Err(error) = func.verify() {
        panic!(
            "function {} is broken after pass '{}': {error}",
            func.name(),
            pass.tag()
        );
    }
}

/// Runs the whole compilation plan of `options` over `module`.
///
/// # Errors
///
/// Returns [`crate::Error::UnknownPass`] or [`crate::Error::UnsupportedOptions`]
/// if the options cannot be scheduled, and [`crate::Error::LockError`] if shared
/// run state was poisoned. A fatal diagnostic is not an error: the report's
/// state is [`RunState::AbortedOnFatalDiagnostic`] and the module holds the
/// result of the last pass that ran.
///
/// # Examples
///
/// ```rust
/// use pilopt::diagnostics::DiagnosticCollector;
/// use pilopt::options::{OptimizationMode, PilOptions};
/// use pilopt::passmgr::{run_compilation, PassRegistry};
/// use pilopt::pil::Module;
///
/// let mut module = Module::new("m");
/// let options = PilOptions::new().with_opt_mode(OptimizationMode::ForSpeed);
/// let diagnostics = DiagnosticCollector::default();
/// let mut registry = PassRegistry::with_builtin_passes();
///
/// let report = run_compilation(&mut module, &options, &mut registry, &diagnostics)?;
/// assert!(report.is_success());
/// # Ok::<(), pilopt::Error>(())
/// ```
pub fn run_compilation(
    module: &mut Module,
    options: &PilOptions,
    registry: &mut PassRegistry,
    diagnostics: &dyn DiagnosticEngine,
) -> Result<RunReport> {
    let plan = CompilationPlan::from_options(options)?;
    log::info!(
        "compiling module {} with {} pipeline(s)",
        module.name(),
        plan.pipelines().len()
    );

    let mut manager = PassManager::new(module, registry, options, diagnostics);
    manager.run_plan(module, &plan)?;
    let report = manager.finish();

    log::info!(
        "module {}: {} after {} pass run(s), {}",
        module.name(),
        report.state,
        report.passes_executed,
        report.events.summary()
    );
    Ok(report)
}
