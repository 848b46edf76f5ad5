//! Diagnosis and removal of unreachable code.
//!
//! # Algorithm
//!
//! 1. Every call to a function declared `@noreturn` that is followed by more code
//!    gets an `unreachable` right after it. The rest of its block is split off into
//!    a block without predecessors; a warning is reported at the first instruction
//!    of that code and a note at the call.
//! 2. Every other block not reachable from the entry block that no block branches
//!    to starts a region of dead code. A warning is reported at its first
//!    instruction with a source location. Code without locations was produced by
//!    the compiler and is removed silently.
//! 3. All blocks not reachable from the entry block are erased.

use std::collections::HashSet;

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    diagnostics::{Diagnostic, DiagnosticId},
    passes::simplify_cfg::remove_unreachable_blocks,
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::{BlockId, Function, InstId, InstKind, PilBuilder, SourceLoc},
    Result,
};

const NEVER_EXECUTED: &str = "will never be executed";

/// Reports and removes code that can never run.
pub struct DiagnoseUnreachablePass;

impl Default for DiagnoseUnreachablePass {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnoseUnreachablePass {
    /// Creates a new unreachable code diagnosis pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Name of the function `apply` calls, if it is a direct call.
    fn direct_callee(func: &Function, apply: InstId) -> Option<&str> {
        let callee = func.operand_value(apply, 0);
        let def = func.value(callee).defining_inst()?;
        match func.kind(def) {
            InstKind::FunctionRef { name } => Some(name),
            _ => None,
        }
    }

    /// The instruction following `inst` in its block.
    fn next_inst(func: &Function, inst: InstId) -> Option<InstId> {
        let insts = func.block(func.parent_block(inst)).insts();
        let position = insts.iter().position(|&candidate| candidate == inst)?;
        insts.get(position + 1).copied()
    }

    fn first_loc(func: &Function, block: BlockId) -> Option<SourceLoc> {
        func.block(block)
            .insts()
            .iter()
            .find_map(|&inst| func.inst(inst).loc())
    }

    /// Terminates the code after calls that never return.
    ///
    /// # Returns
    ///
    /// The blocks split off, which have already been diagnosed.
    fn cut_after_noreturn_calls(func: &mut Function, ctx: &PassContext<'_>) -> Vec<BlockId> {
        let calls: Vec<InstId> = func
            .instructions()
            .into_iter()
            .filter(|&inst| matches!(func.kind(inst), InstKind::Apply { .. }))
            .filter(|&inst| Self::direct_callee(func, inst).is_some_and(|name| ctx.is_noreturn(name)))
            .collect();

        let mut tails = Vec::new();
        for apply in calls {
            let Some(next) = Self::next_inst(func, apply) else {
                continue;
            };
            if matches!(func.kind(next), InstKind::Unreachable) {
                continue;
            }

            let callee = Self::direct_callee(func, apply)
                .unwrap_or_default()
                .to_string();
            let dead_loc = func.inst(next).loc();
            let call_loc = func.inst(apply).loc();

            let unreachable = PilBuilder::before(func, next).unreachable();
            func.set_loc(unreachable, call_loc);
            tails.push(func.split_block_after(unreachable));

            ctx.diagnose(
                Diagnostic::new(DiagnosticId::UnreachableCode, NEVER_EXECUTED)
                    .at(dead_loc)
                    .in_function(func.name()),
            );
            ctx.diagnose(
                Diagnostic::new(
                    DiagnosticId::CallToNoReturnFunction,
                    format!("a call to never-returning function '{callee}'"),
                )
                .at(call_loc)
                .in_function(func.name()),
            );
        }
        tails
    }

    fn diagnose_dead_regions(func: &Function, ctx: &PassContext<'_>, skip: &HashSet<BlockId>) {
        let Some(entry) = func.entry_block() else {
            return;
        };
        for &block in func.layout() {
            if block == entry || skip.contains(&block) || !func.predecessors(block).is_empty() {
                continue;
            }
            if let Some(loc) = Self::first_loc(func, block) {
                ctx.diagnose(
                    Diagnostic::new(DiagnosticId::UnreachableCode, NEVER_EXECUTED)
                        .at(Some(loc))
                        .in_function(func.name()),
                );
            }
        }
    }
}

impl PilPass for DiagnoseUnreachablePass {
    fn kind(&self) -> PassKind {
        PassKind::DiagnoseUnreachable
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let tails = Self::cut_after_noreturn_calls(func, ctx);
        let cut = !tails.is_empty();
        Self::diagnose_dead_regions(func, ctx, &tails.into_iter().collect());

        let removed = remove_unreachable_blocks(func);
        for block in &removed {
            events
                .record(EventKind::UnreachableCodeRemoved)
                .function(func.name())
                .pass(self.tag())
                .message(format!("removed unreachable {block}"));
        }
        Ok(cut || !removed.is_empty())
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::BRANCHES | InvalidationKind::INSTRUCTIONS | InvalidationKind::CALLS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{DiagnosticCollector, Severity},
        passes::testing::{run_in_module, run_on},
        pil::{
            DeclAttribute, Declaration, FormalLinkage, Module, PilLinkage, PilType, Section,
        },
    };

    fn module_with_fatal() -> Module {
        let mut module = Module::new("m");
        let declaration = Declaration::new("fatal", FormalLinkage::PublicUnique)
            .with_attribute(DeclAttribute::NoReturn);
        module.add_function(Function::for_declaration("fatal", declaration));
        module
    }

    #[test]
    fn test_cuts_after_noreturn_call() -> crate::Result<()> {
        let module = module_with_fatal();
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        b.set_loc(Some(SourceLoc::new(2, 5)));
        let callee = b.function_ref("fatal");
        b.apply(callee, &[], PilType::Empty, None);
        b.set_loc(Some(SourceLoc::new(3, 5)));
        let value = b.integer_literal(PilType::Int(64), 7);
        b.return_(value);

        let diagnostics = DiagnosticCollector::default();
        let (changed, events) =
            run_in_module(&DiagnoseUnreachablePass::new(), &mut f, &module, &diagnostics)?;
        assert!(changed);
        assert_eq!(events.count_kind(EventKind::UnreachableCodeRemoved), 1);
        assert_eq!(f.block_count(), 1);
        let kinds: Vec<&str> = f
            .instructions()
            .into_iter()
            .map(|inst| f.kind(inst).mnemonic())
            .collect();
        assert_eq!(kinds, vec!["function_ref", "apply", "unreachable"]);
        f.verify()?;

        let reported = diagnostics.diagnostics();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].id, DiagnosticId::UnreachableCode);
        assert_eq!(reported[0].loc, Some(SourceLoc::new(3, 5)));
        assert_eq!(reported[1].id, DiagnosticId::CallToNoReturnFunction);
        assert_eq!(reported[1].severity, Severity::Note);
        assert_eq!(reported[1].loc, Some(SourceLoc::new(2, 5)));

        let (changed, _) =
            run_in_module(&DiagnoseUnreachablePass::new(), &mut f, &module, &diagnostics)?;
        assert!(!changed);
        assert_eq!(diagnostics.diagnostics().len(), 2);
        Ok(())
    }

    #[test]
    fn test_warns_once_per_dead_region() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        let dead = b.create_block(Section::Main);
        let dead_tail = b.create_block(Section::Main);
        b.emit_block(entry);
        let zero = b.integer_literal(PilType::Int(64), 0);
        b.return_(zero);
        b.emit_block(dead);
        b.set_loc(Some(SourceLoc::new(10, 1)));
        b.branch(dead_tail, &[]);
        b.emit_block(dead_tail);
        let one = b.integer_literal(PilType::Int(64), 1);
        b.return_(one);

        let diagnostics = DiagnosticCollector::default();
        let (changed, events) = run_on(&DiagnoseUnreachablePass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        assert_eq!(events.count_kind(EventKind::UnreachableCodeRemoved), 2);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(f.block_count(), 1);
        f.verify()
    }

    #[test]
    fn test_generated_dead_code_is_silent() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        let dead = b.create_block(Section::Postmatter);
        b.emit_block(entry);
        let zero = b.integer_literal(PilType::Int(64), 0);
        b.return_(zero);
        b.emit_block(dead);
        b.unreachable();

        let diagnostics = DiagnosticCollector::default();
        let (changed, _) = run_on(&DiagnoseUnreachablePass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        assert!(diagnostics.diagnostics().is_empty());
        assert_eq!(f.block_count(), 1);
        Ok(())
    }
}
