//! The pass trait and the state shared by passes during a run.

use std::{collections::BTreeSet, sync::RwLock};

use dashmap::DashMap;

use crate::{
    analysis::{AnalysisCache, AnalysisKind, CallGraph, InvalidationKind},
    diagnostics::{Diagnostic, DiagnosticEngine},
    options::PilOptions,
    passmgr::{EventLog, PassKind},
    pil::{DeclAttribute, Function, Module},
    Result,
};

/// An IR-to-IR transformation or analysis utility.
///
/// All passes must be thread-safe (`Send + Sync`): with
/// [`PilOptions::parallel`] set, the manager runs one pass over several functions
/// at once, each worker holding the only `&mut Function` for its function.
///
/// Function passes implement [`PilPass::run_on_function`]. Passes that need to
/// see the whole module (removing functions, for example) return `true` from
/// [`PilPass::is_module_pass`] and implement [`PilPass::run_on_module`] instead;
/// module passes always run on the calling thread.
pub trait PilPass: Send + Sync {
    /// Catalog entry this pass implements.
    fn kind(&self) -> PassKind;

    /// Runs the pass on one function.
    ///
    /// Returns `true` if the function changed. Transformations are recorded in
    /// `events`, a log private to this function for the duration of the pass.
    ///
    /// # Arguments
    ///
    /// * `func` - The function to transform
    /// * `analyses` - Cached analyses of `func`, fresh for every kind listed in
    ///   [`PilPass::required_analyses`]
    /// * `ctx` - State shared by the whole run
    /// * `events` - Where to record what changed
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot process the function. The manager
    /// turns it into a fatal diagnostic.
    fn run_on_function(
        &self,
        func: &mut Function,
        analyses: &mut AnalysisCache,
        ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool>;

    /// Runs the pass on the whole module. Only called for module passes.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass cannot process the module.
    fn run_on_module(&self, _module: &mut Module, _ctx: &PassContext<'_>) -> Result<bool> {
        Ok(false)
    }

    /// Does this pass operate on the module instead of single functions?
    fn is_module_pass(&self) -> bool {
        false
    }

    /// Analyses computed before [`PilPass::run_on_function`] is called.
    fn required_analyses(&self) -> &'static [AnalysisKind] {
        &[]
    }

    /// What a change reported by this pass may have touched.
    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::EVERYTHING
    }

    /// Called once before the pass runs in a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &PassContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass ran in a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &PassContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Command-line tag of the pass.
    fn tag(&self) -> &'static str {
        self.kind().tag()
    }
}

/// State shared by every pass of one compilation run.
///
/// Borrowed immutably by passes; everything mutable is behind a lock, a
/// lock-free log or a concurrent map so worker threads can share it.
pub struct PassContext<'a> {
    /// Options of the invocation.
    pub options: &'a PilOptions,
    /// Where passes report source diagnostics.
    pub diagnostics: &'a dyn DiagnosticEngine,
    /// Whole-module `function_ref` graph. Readers proceed concurrently; module
    /// passes and rebuilds take the write lock.
    pub call_graph: RwLock<CallGraph>,
    /// Module-level events, and the merged per-function events after each pass.
    pub events: EventLog,
    /// Number of changing pass runs per function name.
    pub change_counts: DashMap<String, usize>,
    noreturn: BTreeSet<String>,
}

impl<'a> PassContext<'a> {
    /// Creates the context of a run over `module`, building its call graph.
    #[must_use]
    pub fn new(
        module: &Module,
        options: &'a PilOptions,
        diagnostics: &'a dyn DiagnosticEngine,
    ) -> Self {
        Self {
            options,
            diagnostics,
            call_graph: RwLock::new(CallGraph::build(module)),
            events: EventLog::new(),
            change_counts: DashMap::new(),
            noreturn: module
                .functions()
                .iter()
                .filter(|func| {
                    func.declaration()
                        .is_some_and(|decl| decl.has_attribute(DeclAttribute::NoReturn))
                })
                .map(|func| func.name().to_string())
                .collect(),
        }
    }

    /// Returns `true` if the module declares `function` as never returning.
    #[must_use]
    pub fn is_noreturn(&self, function: &str) -> bool {
        self.noreturn.contains(function)
    }

    /// Reports a diagnostic.
    pub fn diagnose(&self, diagnostic: Diagnostic) {
        self.diagnostics.diagnose(diagnostic);
    }

    /// Rebuilds the call graph from the current state of `module`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::LockError`] if the call graph lock is poisoned.
    pub fn rebuild_call_graph(&self, module: &Module) -> Result<()> {
        let mut graph = write_lock!(self.call_graph)?;
        *graph = CallGraph::build(module);
        Ok(())
    }

    /// Counts one changing pass run on `function`.
    pub fn record_change(&self, function: &str) {
        *self.change_counts.entry(function.to_string()).or_insert(0) += 1;
    }

    /// Number of changing pass runs recorded for `function`.
    #[must_use]
    pub fn change_count(&self, function: &str) -> usize {
        self.change_counts.get(function).map_or(0, |count| *count)
    }
}
