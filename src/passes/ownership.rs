//! Lowering of ownership SSA to explicit reference counting.
//!
//! # Rewrites
//!
//! | Ownership form | Lowered form |
//! |----------------|--------------|
//! | `%c = copy_value x` | `strong_retain x` / `retain_value x`, uses of `%c` use `x` |
//! | `destroy_value x` | `strong_release x` / `release_value x` |
//! | `load [copy] a` | `load [trivial] a` followed by a retain of the loaded value |
//! | `load [take] a` | `load [trivial] a` |
//! | `store x to [init] a` | `store x to [trivial] a` |
//! | `store x to [assign] a` | load of the old value, `store [trivial]`, release of the old value |
//!
//! Afterwards every non-trivial value has ownership `none` and the function is
//! marked as no longer being in ownership form. Functions already lowered are
//! left alone.

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::{
        Function, InstId, InstKind, LoadQualifier, OwnershipKind, PilBuilder, StoreQualifier,
        ValueId,
    },
    utils::{create_decrement_before, create_increment_before},
    Result,
};

/// Strips ownership annotations, making reference counting explicit.
pub struct OwnershipModelEliminatorPass;

impl Default for OwnershipModelEliminatorPass {
    fn default() -> Self {
        Self::new()
    }
}

impl OwnershipModelEliminatorPass {
    /// Creates a new ownership model eliminator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The instruction following `inst`, which is never a terminator.
    fn next_inst(func: &Function, inst: InstId) -> Option<InstId> {
        let insts = func.block(func.parent_block(inst)).insts();
        let position = insts.iter().position(|&candidate| candidate == inst)?;
        insts.get(position + 1).copied()
    }

    /// Lowers one instruction. Returns `false` if it needed no rewrite.
    fn lower(func: &mut Function, inst: InstId) -> bool {
        match func.kind(inst).clone() {
            InstKind::CopyValue => {
                let source = func.operand_value(inst, 0);
                create_increment_before(func, source, inst);
                if let Some(copy) = func.result(inst) {
                    func.replace_all_uses_with(copy, source);
                }
                func.erase_inst(inst);
            }
            InstKind::DestroyValue => {
                let value = func.operand_value(inst, 0);
                create_decrement_before(func, value, inst);
                func.erase_inst(inst);
            }
            InstKind::Load { qualifier } => {
                if qualifier == LoadQualifier::Trivial {
                    return false;
                }
                *func.kind_mut(inst) = InstKind::Load {
                    qualifier: LoadQualifier::Trivial,
                };
                if qualifier == LoadQualifier::Copy {
                    let loaded = func.result(inst);
                    if let (Some(loaded), Some(next)) = (loaded, Self::next_inst(func, inst)) {
                        create_increment_before(func, loaded, next);
                    }
                }
            }
            InstKind::Store { qualifier } => {
                if qualifier == StoreQualifier::Trivial {
                    return false;
                }
                let source = func.operand_value(inst, 0);
                let addr = func.operand_value(inst, 1);
                let old = (qualifier == StoreQualifier::Assign && !func.ty(source).is_trivial())
                    .then(|| PilBuilder::before(func, inst).load(addr, LoadQualifier::Trivial));
                *func.kind_mut(inst) = InstKind::Store {
                    qualifier: StoreQualifier::Trivial,
                };
                if let (Some(old), Some(next)) = (old, Self::next_inst(func, inst)) {
                    create_decrement_before(func, old, next);
                }
            }
            _ => return false,
        }
        true
    }

    /// Every argument and result of the function.
    fn all_values(func: &Function) -> Vec<ValueId> {
        let mut values: Vec<ValueId> = func
            .layout()
            .iter()
            .flat_map(|&block| func.block(block).args().iter().copied())
            .collect();
        for inst in func.instructions() {
            values.extend_from_slice(func.results(inst));
        }
        values
    }
}

impl PilPass for OwnershipModelEliminatorPass {
    fn kind(&self) -> PassKind {
        PassKind::OwnershipModelEliminator
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        if !func.has_ownership() {
            return Ok(false);
        }

        let mut lowered = 0usize;
        for inst in func.instructions() {
            let mnemonic = func.kind(inst).mnemonic();
            if Self::lower(func, inst) {
                lowered += 1;
                events
                    .record(EventKind::OwnershipLowered)
                    .function(func.name())
                    .pass(self.tag())
                    .message(format!("lowered {mnemonic} {inst}"));
            }
        }

        for value in Self::all_values(func) {
            if func.ownership(value) != OwnershipKind::Trivial {
                func.set_ownership(value, OwnershipKind::None);
            }
        }
        func.set_has_ownership(false);
        log::trace!(
            "lowered {lowered} ownership instruction(s) in {}",
            func.name()
        );
        Ok(true)
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::INSTRUCTIONS
    }
}
