//! Peephole combining.
//!
//! # Rewrites
//!
//! | Pattern | Result |
//! |---------|--------|
//! | `struct_extract (struct a, b, ...), #n` | the `n`th field operand |
//! | `unchecked_enum_data (enum #some, x)` | `x` |
//! | `int_expect (integer_literal n), e` | the literal |
//! | closure only kept alive by ref counting | deleted, captures released |
//!
//! Projections of non-trivial values are only folded once ownership has been
//! lowered: with ownership the projection borrows while the field operand was
//! consumed by the aggregate. Definitions left without uses are deleted right
//! away.

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::{BuiltinOp, EnumCase, Function, InstId, InstKind, ValueId},
    utils::{
        is_instruction_trivially_dead, recursively_delete_trivially_dead_instructions,
        try_delete_dead_closure, InstModCallbacks,
    },
    Result,
};

/// Combines instructions through local rewrites.
pub struct CombinePass;

impl Default for CombinePass {
    fn default() -> Self {
        Self::new()
    }
}

impl CombinePass {
    /// Creates a new combine pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The value `inst` simplifies to, if any.
    fn simplified_value(func: &Function, inst: InstId) -> Option<ValueId> {
        let result = func.result(inst)?;
        let foldable = !func.has_ownership() || func.ty(result).is_trivial();
        let source = func.operand_value(inst, 0);
        let def = func.value(source).defining_inst()?;

        match (func.kind(inst), func.kind(def)) {
            (InstKind::StructExtract { field }, InstKind::Struct) if foldable => {
                Some(func.operand_value(def, *field))
            }
            (
                InstKind::UncheckedEnumData,
                InstKind::Enum {
                    case: EnumCase::Some,
                },
            ) if foldable => Some(func.operand_value(def, 0)),
            (
                InstKind::Builtin {
                    op: BuiltinOp::Expect,
                },
                InstKind::IntegerLiteral { .. },
            ) => Some(source),
            _ => None,
        }
    }

    fn combine(&self, func: &mut Function, inst: InstId, events: &EventLog) -> bool {
        let Some(replacement) = Self::simplified_value(func, inst) else {
            return false;
        };
        let Some(result) = func.result(inst) else {
            return false;
        };
        if func.ty(result) != func.ty(replacement) {
            return false;
        }

        let mnemonic = func.kind(inst).mnemonic();
        let operands = func.operand_values(inst);
        func.replace_all_uses_with(result, replacement);
        func.erase_inst(inst);
        events
            .record(EventKind::InstructionCombined)
            .function(func.name())
            .pass(self.tag())
            .message(format!("folded {mnemonic} {inst}"));

        let seeds: Vec<InstId> = operands
            .into_iter()
            .filter_map(|value| func.value(value).defining_inst())
            .filter(|&def| func.contains_inst(def) && is_instruction_trivially_dead(func, def))
            .collect();
        let tag = self.tag();
        recursively_delete_trivially_dead_instructions(func, &seeds, false, |f, dead| {
            events
                .record(EventKind::InstructionRemoved)
                .function(f.name())
                .pass(tag)
                .message(format!("removed dead {}", f.kind(dead).mnemonic()));
        });
        true
    }

    fn delete_closure(&self, func: &mut Function, closure: InstId, events: &EventLog) -> bool {
        let name = func.name().to_string();
        let tag = self.tag();
        let callbacks = InstModCallbacks::new().on_delete(|f, inst| {
            events
                .record(EventKind::InstructionRemoved)
                .function(f.name())
                .pass(tag)
                .message(format!("removed {} of dead closure", f.kind(inst).mnemonic()));
        });
        if !try_delete_dead_closure(func, closure, callbacks) {
            return false;
        }
        events
            .record(EventKind::ClosureDeleted)
            .function(name)
            .pass(tag)
            .message(format!("deleted dead closure {closure}"));
        true
    }
}

impl PilPass for CombinePass {
    fn kind(&self) -> PassKind {
        PassKind::PILCombine
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let mut changed = false;
        for inst in func.instructions() {
            // Earlier rewrites may have deleted it.
            if !func.contains_inst(inst) {
                continue;
            }
            changed |= match func.kind(inst) {
                InstKind::PartialApply { .. } | InstKind::ThinToThickFunction => {
                    self.delete_closure(func, inst, events)
                }
                InstKind::StructExtract { .. }
                | InstKind::UncheckedEnumData
                | InstKind::Builtin {
                    op: BuiltinOp::Expect,
                } => self.combine(func, inst, events),
                _ => false,
            };
        }
        Ok(changed)
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
        pil::{
            OwnershipKind, ParameterConvention, PilBuilder, PilLinkage, PilType, Section,
        },
    };

    fn status() -> PilType {
        PilType::structure("StatusCode", vec![("raw".into(), PilType::Int(32))])
    }

    #[test]
    fn test_folds_projections() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let arg = b.add_block_arg(entry, PilType::Int(32), OwnershipKind::Trivial);
        let wrapped = b.struct_(status(), &[arg]);
        let raw = b.struct_extract(wrapped, 0);
        let hint = b.integer_literal(PilType::Int(32), 1);
        let hinted = b.expect(raw, hint);
        b.return_(hinted);

        let diagnostics = DiagnosticCollector::default();
        let (changed, events) = run_on(&CombinePass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        assert_eq!(events.count_kind(EventKind::InstructionCombined), 1);
        // struct is dead after the extract folds; the expect is not on a literal
        assert_eq!(events.count_kind(EventKind::InstructionRemoved), 1);
        f.verify()?;
        let ret = f.terminator(entry).map(|term| f.operand_value(term, 0));
        assert_eq!(ret, Some(hinted));
        let expect = f.value(hinted).defining_inst().unwrap();
        assert_eq!(f.operand_value(expect, 0), arg);
        Ok(())
    }

    #[test]
    fn test_expect_of_literal() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let five = b.integer_literal(PilType::Int(8), 5);
        let zero = b.integer_literal(PilType::Int(8), 0);
        let hinted = b.expect(five, zero);
        b.return_(hinted);

        let diagnostics = DiagnosticCollector::default();
        let (changed, _) = run_on(&CombinePass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        assert_eq!(f.inst_count(), 2);
        let ret = f.terminator(entry).map(|term| f.operand_value(term, 0));
        assert_eq!(ret, Some(five));
        f.verify()
    }

    #[test]
    fn test_deletes_dead_closure() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        f.set_has_ownership(false);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let object = b.add_block_arg(entry, PilType::Object("Box".into()), OwnershipKind::None);
        let callee = b.function_ref("closure_body");
        let closure = b.partial_apply(callee, &[object], vec![ParameterConvention::DirectOwned], false);
        b.strong_retain(closure);
        b.strong_release(closure);
        b.strong_release(closure);
        let unit = b.integer_literal(PilType::Int(8), 0);
        b.return_(unit);

        let diagnostics = DiagnosticCollector::default();
        let (changed, events) = run_on(&CombinePass::new(), &mut f, &diagnostics)?;
        assert!(changed);
        assert_eq!(events.count_kind(EventKind::ClosureDeleted), 1);
        let kinds: Vec<&str> = f
            .instructions()
            .into_iter()
            .map(|inst| f.kind(inst).mnemonic())
            .collect();
        assert_eq!(kinds, vec!["strong_release", "integer_literal", "return"]);
        f.verify()
    }
}
