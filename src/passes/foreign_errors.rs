//! Lowering of foreign error conventions to explicit checks.
//!
//! Calls emitted with a [`crate::pil::ForeignErrorConvention`] still rely on the
//! callee's sentinel result or error out-parameter. This pass rewrites every such
//! call into a check against the sentinel that branches to a cold block
//! rethrowing the bridged error natively. See [`crate::lowering::foreign_error`]
//! for the shape of each strategy.

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    lowering::lower_foreign_error_call,
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::{Function, InstKind},
    Result,
};

/// Lowers every call that still carries a foreign error convention.
pub struct ForeignErrorLoweringPass;

impl Default for ForeignErrorLoweringPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ForeignErrorLoweringPass {
    /// Creates a new foreign error lowering pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PilPass for ForeignErrorLoweringPass {
    fn kind(&self) -> PassKind {
        PassKind::ForeignErrorLowering
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let calls: Vec<_> = func
            .instructions()
            .into_iter()
            .filter(|&inst| {
                matches!(
                    func.kind(inst),
                    InstKind::Apply {
                        foreign_error: Some(_),
                        ..
                    }
                )
            })
            .collect();

        let mut changed = false;
        for apply in calls {
            let convention = match func.kind(apply) {
                InstKind::Apply {
                    foreign_error: Some(convention),
                    ..
                } => convention.kind,
                _ => continue,
            };
            if lower_foreign_error_call(func, apply)? {
                events
                    .record(EventKind::ForeignCallLowered)
                    .function(func.name())
                    .pass(self.tag())
                    .message(format!("lowered {convention} call {apply}"));
                changed = true;
            }
        }
        Ok(changed)
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::INSTRUCTIONS | InvalidationKind::BRANCHES
    }
}
