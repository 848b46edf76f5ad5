//! Instruction statistics.
//!
//! Counts the blocks of each function and its instructions per mnemonic and
//! records them as a [`EventKind::StatisticsRecorded`] event. Never changes the
//! function.

use std::collections::BTreeMap;

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::Function,
    Result,
};

/// Records block and instruction counts.
pub struct InstCountPass;

impl Default for InstCountPass {
    fn default() -> Self {
        Self::new()
    }
}

impl InstCountPass {
    /// Creates a new instruction counting pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Instruction count per mnemonic, sorted by mnemonic.
    #[must_use]
    pub fn count(func: &Function) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for inst in func.instructions() {
            *counts.entry(func.kind(inst).mnemonic()).or_insert(0) += 1;
        }
        counts
    }
}

impl PilPass for InstCountPass {
    fn kind(&self) -> PassKind {
        PassKind::InstCount
    }

    fn run_on_function(
        &self,
        func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        events: &EventLog,
    ) -> Result<bool> {
        let counts = Self::count(func);
        let detail = counts
            .iter()
            .map(|(mnemonic, count)| format!("{mnemonic}: {count}"))
            .collect::<Vec<_>>()
            .join(", ");
        let message = format!(
            "{} block(s), {} instruction(s) ({detail})",
            func.block_count(),
            func.inst_count()
        );
        log::debug!("{}: {message}", func.name());
        events
            .record(EventKind::StatisticsRecorded)
            .function(func.name())
            .pass(self.tag())
            .message(message);
        Ok(false)
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::DiagnosticCollector,
        passes::testing::run_on,
        pil::{PilBuilder, PilLinkage, PilType, Section},
    };

    #[test]
    fn test_counts_by_mnemonic() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let one = b.integer_literal(PilType::Int(64), 1);
        let two = b.integer_literal(PilType::Int(64), 2);
        let sum = b.builtin(crate::pil::BuiltinOp::Add, one, two, PilType::Int(64));
        b.return_(sum);

        let counts = InstCountPass::count(&f);
        assert_eq!(counts.get("integer_literal"), Some(&2));
        assert_eq!(counts.get("builtin"), Some(&1));
        assert_eq!(counts.get("return"), Some(&1));

        let diagnostics = DiagnosticCollector::default();
        let (changed, events) = run_on(&InstCountPass::new(), &mut f, &diagnostics)?;
        assert!(!changed);
        let recorded: Vec<_> = events.filter_kind(EventKind::StatisticsRecorded).collect();
        assert_eq!(recorded.len(), 1);
        assert!(recorded[0].message.starts_with("1 block(s), 4 instruction(s)"));
        Ok(())
    }
}
