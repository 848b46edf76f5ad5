//! Guaranteed reference-count optimizations.
//!
//! Runs at every optimization level, so it only performs rewrites that are always
//! safe and never need an analysis.
//!
//! # Rewrites
//!
//! | Pattern | Result |
//! |---------|--------|
//! | `strong_retain x` ... `strong_release x` | both removed |
//! | `retain_value x` ... `release_value x` | both removed |
//! | `%c = copy_value x`, whose only use is `destroy_value %c` | both removed |
//!
//! A retain is paired with a release of the same value later in the same block
//! only if nothing in between could release an object or run arbitrary code:
//! pure instructions, reads, debug info and other retains.

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::{BlockId, Function, InstId, InstKind, SideEffects},
    Result,
};

/// Removes retain/release pairs that cancel out.
pub struct GuaranteedArcOptsPass;

impl Default for GuaranteedArcOptsPass {
    fn default() -> Self {
        Self::new()
    }
}

impl GuaranteedArcOptsPass {
    /// Creates a new guaranteed ARC optimization pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn can_skip(kind: &InstKind) -> bool {
        kind.is_retain()
            || matches!(
                kind.side_effects(),
                SideEffects::None | SideEffects::ReadsMemory | SideEffects::Debug
            )
    }

    /// The release that cancels `retain`, if one follows in the same block.
    fn matching_release(func: &Function, block: BlockId, retain: InstId) -> Option<InstId> {
        let release_kind = match func.kind(retain) {
            InstKind::StrongRetain => InstKind::StrongRelease,
            InstKind::RetainValue => InstKind::ReleaseValue,
            _ => return None,
        };
        let value = func.operand_value(retain, 0);
        let insts = func.block(block).insts();
        let start = insts.iter().position(|&inst| inst == retain)? + 1;

        for &inst in &insts[start..] {
            let kind = func.kind(inst);
            if *kind == release_kind && func.operand_value(inst, 0) == value {
                return Some(inst);
            }
            if !Self::can_skip(kind) {
                return None;
            }
        }
        None
    }

    /// The `destroy_value` that is the only use of a copy.
    fn sole_destroy(func: &Function, copy: InstId) -> Option<InstId> {
        let result = func.result(copy)?;
        match func.users(result)[..] {
            [user] if func.uses(result).len() == 1
                && matches!(func.kind(user), InstKind::DestroyValue) =>
            {
                Some(user)
            }
            _ => None,
        }
    }

    fn optimize_block(&self, func: &mut Function, block: BlockId, events: &EventLog) -> bool {
        let mut changed = false;
        for inst in func.block(block).insts().to_vec() {
            if !func.contains_inst(inst) {
                continue;
            }
            match func.kind(inst) {
                InstKind::StrongRetain | InstKind::RetainValue => {
                    let Some(release) = Self::matching_release(func, block, inst) else {
                        continue;
                    };
                    let mnemonic = func.kind(inst).mnemonic();
                    let value = func.operand_value(inst, 0);
                    func.erase_inst(release);
                    func.erase_inst(inst);
                    events
                        .record(EventKind::RetainReleasePairRemoved)
                        .function(func.name())
                        .pass(self.tag())
                        .message(format!("removed {mnemonic} pair on {value}"));
                    changed = true;
                }
                InstKind::CopyValue => {
                    let Some(destroy) = Self::sole_destroy(func, inst) else {
                        continue;
                    };
                    let value = func.operand_value(inst, 0);
                    func.erase_inst(destroy);
                    func.erase_inst(inst);
                    events
                        .record(EventKind::RetainReleasePairRemoved)
                        .function(func.name())
                        .pass(self.tag())
                        .message(format!("removed copy_value/destroy_value pair on {value}"));
                    changed = true;
                }
                _ => {}
            }
        }
        changed
    }
}

impl PilPass for GuaranteedArcOptsPass {
    fn kind(&self) -> PassKind {
        PassKind::GuaranteedARCOpts
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let mut changed = false;
        for block in func.layout().to_vec() {
            changed |= self.optimize_block(func, block, events);
        }
        Ok(changed)
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::INSTRUCTIONS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::DiagnosticCollector,
        passes::testing::run_on,
        pil::{LoadQualifier, OwnershipKind, PilBuilder, PilLinkage, PilType, Section},
    };

    fn object() -> PilType {
        PilType::Object("Klass".into())
    }

    #[test]
    fn test_removes_pair_across_reads() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        f.set_has_ownership(false);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let x = b.add_block_arg(entry, object(), OwnershipKind::None);
        let addr = b.add_block_arg(entry, PilType::address(PilType::Int(64)), OwnershipKind::Trivial);
        b.strong_retain(x);
        let loaded = b.load(addr, LoadQualifier::Trivial);
        b.debug_value(loaded, "n");
        b.strong_release(x);
        b.return_(loaded);

        let diagnostics = DiagnosticCollector::default();
        let (changed, events) = run_on(&GuaranteedArcOptsPass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        assert_eq!(events.count_kind(EventKind::RetainReleasePairRemoved), 1);
        assert_eq!(f.inst_count(), 3);
        f.verify()
    }

    #[test]
    fn test_call_blocks_pairing() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        f.set_has_ownership(false);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let x = b.add_block_arg(entry, object(), OwnershipKind::None);
        b.strong_retain(x);
        let callee = b.function_ref("may_release");
        b.apply(callee, &[x], PilType::Empty, None);
        b.strong_release(x);
        let zero = b.integer_literal(PilType::Int(64), 0);
        b.return_(zero);

        let diagnostics = DiagnosticCollector::default();
        let (changed, _) = run_on(&GuaranteedArcOptsPass::new(), &mut f, &diagnostics)?;
        assert!(!changed);
        assert_eq!(f.inst_count(), 6);
        Ok(())
    }

    #[test]
    fn test_removes_copy_destroyed_unused() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let x = b.add_block_arg(entry, object(), OwnershipKind::Guaranteed);
        let copy = b.copy_value(x);
        b.destroy_value(copy);
        let zero = b.integer_literal(PilType::Int(64), 0);
        b.return_(zero);

        let diagnostics = DiagnosticCollector::default();
        let (changed, _) = run_on(&GuaranteedArcOptsPass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        assert_eq!(f.inst_count(), 2);
        f.verify()
    }
}
