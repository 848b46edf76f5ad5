//! Dominance computation for testing.
//!
//! Makes the pass manager compute the dominator and post-dominator trees of every
//! function, checks that the entry block dominates every reachable block and
//! records a summary of the trees. Never changes the function.

use crate::{
    analysis::{AnalysisCache, AnalysisKind, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::Function,
    Result,
};

/// Computes and checks the dominance trees of each function.
pub struct ComputeDominanceInfoPass;

impl Default for ComputeDominanceInfoPass {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeDominanceInfoPass {
    /// Creates a new dominance computation pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PilPass for ComputeDominanceInfoPass {
    fn kind(&self) -> PassKind {
        PassKind::ComputeDominanceInfo
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let Some(entry) = func.entry_block() else {
            return Ok(false);
        };

        let dominance = analyses.dominance(func);
        let mut reachable = 0usize;
        let mut depth = 0usize;
        for &block in func.layout() {
            if !dominance.is_reachable(block) {
                continue;
            }
            if !dominance.dominates(entry, block) {
                return Err(invariant_error!(
                    "{}: entry {entry} does not dominate reachable {block}",
                    func.name()
                ));
            }
            reachable += 1;
            depth = depth.max(dominance.depth(block).unwrap_or(0));
        }

        let post_dominance = analyses.post_dominance(func);
        let exits = func
            .layout()
            .iter()
            .filter(|&&block| {
                post_dominance.is_reachable(block)
                    && post_dominance.immediate_dominator(block).is_none()
            })
            .count();

        events
            .record(EventKind::AnalysisComputed)
            .function(func.name())
            .pass(self.tag())
            .message(format!(
                "{reachable} of {} block(s) reachable, dominator depth {depth}, {exits} post-dominator root(s)",
                func.block_count()
            ));
        Ok(false)
    }

    fn required_analyses(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::Dominance, AnalysisKind::PostDominance]
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::empty()
    }
}
