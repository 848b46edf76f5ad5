//! Control-flow graph simplification.
//!
//! # Algorithm
//!
//! Repeats three rewrites until none applies:
//!
//! 1. **Branch folding**: a `cond_br` on a constant condition becomes a `br` to the
//!    taken destination with that edge's arguments. A `switch_enum` on a value built
//!    by `enum` in the same function jumps straight to the matching case, passing
//!    the payload to a `some` destination.
//! 2. **Unreachable block removal**: blocks not reachable from the entry block are
//!    erased together with everything they define.
//! 3. **Block merging**: a block whose only predecessor ends in an unconditional
//!    `br` to it is appended to that predecessor; its arguments are replaced by the
//!    incoming branch arguments.
//!
//! Instructions left dead by folding (the constant condition, for example) are
//! removed by the next `dce` run, not here.

use std::collections::HashSet;

use crate::{
    analysis::{constant_int_value, AnalysisCache, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::{BlockId, EnumCase, Function, InsertPoint, InstId, InstKind, PilBuilder, ValueId},
    Result,
};

/// Erases every block not reachable from the entry block.
///
/// Operands of all dead instructions are dropped first, so values flowing between
/// dead blocks never keep each other alive.
///
/// # Returns
///
/// The erased blocks in layout order.
pub(crate) fn remove_unreachable_blocks(func: &mut Function) -> Vec<BlockId> {
    let Some(entry) = func.entry_block() else {
        return Vec::new();
    };

    let mut reachable = HashSet::new();
    let mut worklist = vec![entry];
    while let Some(block) = worklist.pop() {
        if reachable.insert(block) {
            worklist.extend(func.successors(block));
        }
    }

    let dead: Vec<BlockId> = func
        .layout()
        .iter()
        .copied()
        .filter(|block| !reachable.contains(block))
        .collect();
    for &block in &dead {
        for inst in func.block(block).insts().to_vec() {
            func.drop_operands(inst);
        }
    }
    for &block in &dead {
        func.erase_block(block);
    }
    dead
}

/// Simplifies the control-flow graph of each function.
pub struct SimplifyCfgPass;

impl Default for SimplifyCfgPass {
    fn default() -> Self {
        Self::new()
    }
}

impl SimplifyCfgPass {
    /// Creates a new CFG simplification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Destination and arguments a terminator is known to take.
    fn folded_target(func: &Function, term: InstId) -> Option<(BlockId, Vec<ValueId>)> {
        match func.kind(term) {
            InstKind::CondBranch { .. } => {
                let condition = constant_int_value(func, func.operand_value(term, 0))?;
                let mut edges = func.successor_args(term).into_iter();
                let taken = edges.next()?;
                let not_taken = edges.next()?;
                Some(if condition != 0 { taken } else { not_taken })
            }
            InstKind::SwitchEnum { cases, default } => {
                let scrutinee = func.operand_value(term, 0);
                let def = func.value(scrutinee).defining_inst()?;
                let InstKind::Enum { case } = func.kind(def) else {
                    return None;
                };
                match cases.iter().find(|(candidate, _)| candidate == case) {
                    Some((EnumCase::Some, dest)) => {
                        Some((*dest, vec![func.operand_value(def, 0)]))
                    }
                    Some((EnumCase::None, dest)) => Some((*dest, Vec::new())),
                    None => (*default).map(|dest| (dest, Vec::new())),
                }
            }
            _ => None,
        }
    }

    fn fold_branches(&self, func: &mut Function, events: &EventLog) -> bool {
        let terms: Vec<InstId> = func
            .layout()
            .iter()
            .filter_map(|&block| func.terminator(block))
            .collect();

        let mut changed = false;
        for term in terms {
            let Some((dest, args)) = Self::folded_target(func, term) else {
                continue;
            };
            let mnemonic = func.kind(term).mnemonic();
            let block = func.parent_block(term);
            PilBuilder::before(func, term).branch(dest, &args);
            func.erase_inst(term);
            events
                .record(EventKind::BranchFolded)
                .function(func.name())
                .pass(self.tag())
                .message(format!("{mnemonic} in {block} now jumps to {dest}"));
            changed = true;
        }
        changed
    }

    /// A block that can be appended to its single predecessor, with that
    /// predecessor's branch.
    fn merge_candidate(func: &Function) -> Option<(BlockId, BlockId, InstId)> {
        let entry = func.entry_block()?;
        func.layout().iter().copied().find_map(|block| {
            if block == entry {
                return None;
            }
            let [pred] = func.predecessors(block)[..] else {
                return None;
            };
            if pred == block {
                return None;
            }
            let term = func.terminator(pred)?;
            matches!(func.kind(term), InstKind::Branch { dest } if *dest == block)
                .then_some((pred, block, term))
        })
    }

    fn merge_blocks(&self, func: &mut Function, events: &EventLog) -> bool {
        let mut changed = false;
        while let Some((pred, block, branch)) = Self::merge_candidate(func) {
            let incoming = func.operand_values(branch);
            let params = func.block(block).args().to_vec();
            func.erase_inst(branch);
            for (param, arg) in params.into_iter().zip(incoming) {
                func.replace_all_uses_with(param, arg);
            }
            for inst in func.block(block).insts().to_vec() {
                func.move_inst(inst, InsertPoint::End(pred));
            }
            func.erase_block(block);
            events
                .record(EventKind::BlocksMerged)
                .function(func.name())
                .pass(self.tag())
                .message(format!("merged {block} into {pred}"));
            changed = true;
        }
        changed
    }
}

impl PilPass for SimplifyCfgPass {
    fn kind(&self) -> PassKind {
        PassKind::SimplifyCFG
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let mut changed = false;
        loop {
            let mut round = self.fold_branches(func, events);

            let removed = remove_unreachable_blocks(func);
            for block in &removed {
                events
                    .record(EventKind::BlockRemoved)
                    .function(func.name())
                    .pass(self.tag())
                    .message(format!("removed unreachable {block}"));
            }
            round |= !removed.is_empty();

            round |= self.merge_blocks(func, events);
            if !round {
                break;
            }
            changed = true;
        }
        Ok(changed)
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::BRANCHES | InvalidationKind::INSTRUCTIONS | InvalidationKind::CALLS
    }
}
