//! Dead code elimination.
//!
//! Every instruction that is trivially dead (see
//! [`is_instruction_trivially_dead`]) seeds the worklist of
//! [`recursively_delete_trivially_dead_instructions`], which then keeps deleting
//! operand definitions as they lose their last use. A single run reaches the
//! fixpoint: no trivially dead instruction remains afterwards.

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::Function,
    utils::{is_instruction_trivially_dead, recursively_delete_trivially_dead_instructions},
    Result,
};

/// Removes trivially dead instructions.
pub struct DeadCodeEliminationPass;

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminationPass {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl PilPass for DeadCodeEliminationPass {
    fn kind(&self) -> PassKind {
        PassKind::DCE
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let seeds: Vec<_> = func
            .instructions()
            .into_iter()
            .filter(|&inst| is_instruction_trivially_dead(func, inst))
            .collect();
        if seeds.is_empty() {
            return Ok(false);
        }

        let tag = self.tag();
        let erased = recursively_delete_trivially_dead_instructions(func, &seeds, false, |f, inst| {
            events
                .record(EventKind::InstructionRemoved)
                .function(f.name())
                .pass(tag)
                .message(format!("removed dead {}", f.kind(inst).mnemonic()));
        });
        log::trace!("dce removed {erased} instruction(s) from {}", func.name());
        Ok(erased > 0)
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::INSTRUCTIONS | InvalidationKind::CALLS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::DiagnosticCollector,
        passes::testing::run_on,
        pil::{BuiltinOp, OwnershipKind, PilBuilder, PilLinkage, PilType, Section},
    };

    #[test]
    fn test_removes_dead_chain() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let arg = b.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
        let one = b.integer_literal(PilType::Int(64), 1);
        let mut last = b.builtin(BuiltinOp::Add, arg, one, PilType::Int(64));
        for _ in 0..5 {
            last = b.builtin(BuiltinOp::Add, last, one, PilType::Int(64));
        }
        b.debug_value(last, "unused");
        b.return_(arg);

        let diagnostics = DiagnosticCollector::default();
        let (changed, events) = run_on(&DeadCodeEliminationPass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        // six adds, the literal and the debug_value
        assert_eq!(events.count_kind(EventKind::InstructionRemoved), 8);
        assert_eq!(f.inst_count(), 1);
        f.verify()?;

        let (changed, _) = run_on(&DeadCodeEliminationPass::new(), &mut f, &diagnostics)?;
        assert!(!changed);
        Ok(())
    }

    #[test]
    fn test_keeps_side_effects() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let addr = b.alloc_stack(PilType::Int(64));
        let value = b.integer_literal(PilType::Int(64), 4);
        b.store(value, addr, crate::pil::StoreQualifier::Trivial);
        b.dealloc_stack(addr);
        b.return_(value);

        let diagnostics = DiagnosticCollector::default();
        let (changed, _) = run_on(&DeadCodeEliminationPass::new(), &mut f, &diagnostics)?;
        assert!(!changed);
        assert_eq!(f.inst_count(), 5);
        Ok(())
    }
}
