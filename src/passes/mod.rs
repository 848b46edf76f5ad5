//! Built-in pass implementations.
//!
//! Each pass implements [`PilPass`] for one catalog entry and records what it
//! changed as events. [`builtin_passes`] returns one instance of each; the
//! [`crate::passmgr::PassRegistry`] is normally built from it.
//!
//! | Tag | Pass | Scope |
//! |-----|------|-------|
//! | `lower-foreign-errors` | [`ForeignErrorLoweringPass`] | function |
//! | `dce` | [`DeadCodeEliminationPass`] | function |
//! | `sil-combine` | [`CombinePass`] | function |
//! | `simplify-cfg` | [`SimplifyCfgPass`] | function |
//! | `diagnose-unreachable` | [`DiagnoseUnreachablePass`] | function |
//! | `guaranteed-arc-opts` | [`GuaranteedArcOptsPass`] | function |
//! | `ownership-model-eliminator` | [`OwnershipModelEliminatorPass`] | function |
//! | `sil-deadfuncelim` | [`DeadFunctionEliminationPass`] | module |
//! | `inst-count` | [`InstCountPass`] | function |
//! | `compute-dominance-info` | [`ComputeDominanceInfoPass`] | function |

mod arc;
mod combine;
mod dce;
mod dead_functions;
mod dominance;
mod foreign_errors;
mod inst_count;
mod ownership;
mod simplify_cfg;
mod unreachable;

pub use arc::GuaranteedArcOptsPass;
pub use combine::CombinePass;
pub use dce::DeadCodeEliminationPass;
pub use dead_functions::DeadFunctionEliminationPass;
pub use dominance::ComputeDominanceInfoPass;
pub use foreign_errors::ForeignErrorLoweringPass;
pub use inst_count::InstCountPass;
pub use ownership::OwnershipModelEliminatorPass;
pub use simplify_cfg::SimplifyCfgPass;
pub use unreachable::DiagnoseUnreachablePass;

use crate::passmgr::PilPass;

/// One instance of every built-in pass.
#[must_use]
pub fn builtin_passes() -> Vec<Box<dyn PilPass>> {
    vec![
        Box::new(ForeignErrorLoweringPass::new()),
        Box::new(DeadCodeEliminationPass::new()),
        Box::new(CombinePass::new()),
        Box::new(SimplifyCfgPass::new()),
        Box::new(DiagnoseUnreachablePass::new()),
        Box::new(GuaranteedArcOptsPass::new()),
        Box::new(OwnershipModelEliminatorPass::new()),
        Box::new(DeadFunctionEliminationPass::new()),
        Box::new(InstCountPass::new()),
        Box::new(ComputeDominanceInfoPass::new()),
    ]
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for running a single pass in unit tests.

    use crate::{
        analysis::AnalysisCache,
        diagnostics::DiagnosticCollector,
        options::PilOptions,
        passmgr::{EventLog, PassContext, PilPass},
        pil::{Function, Module},
        Result,
    };

    /// Runs `pass` once on `func` with fresh analyses and default options.
    pub fn run_on(
        pass: &dyn PilPass,
        func: &mut Function,
        diagnostics: &DiagnosticCollector,
    ) -> Result<(bool, EventLog)> {
        run_in_module(pass, func, &Module::new("test"), diagnostics)
    }

    /// Like [`run_on`], with the pass context built from `module`.
    pub fn run_in_module(
        pass: &dyn PilPass,
        func: &mut Function,
        module: &Module,
        diagnostics: &DiagnosticCollector,
    ) -> Result<(bool, EventLog)> {
        let options = PilOptions::default();
        let ctx = PassContext::new(module, &options, diagnostics);
        let events = EventLog::new();
        let mut analyses = AnalysisCache::new();
        for &analysis in pass.required_analyses() {
            analyses.ensure(analysis, func);
        }
        let changed = pass.run_on_function(func, &mut analyses, &ctx, &events)?;
        Ok((changed, events))
    }
}
