//! Dead function elimination.
//!
//! # Algorithm
//!
//! 1. Rebuild the call graph from the current module.
//! 2. Roots are the functions code outside the compilation unit may reference
//!    (see [`crate::pil::PilLinkage::is_possibly_used_externally`]) and functions
//!    whose declaration carries `@used`.
//! 3. Every function definition not transitively referenced from a root is
//!    removed. Declarations without a body are kept.

use crate::{
    analysis::{AnalysisCache, InvalidationKind},
    passmgr::{EventKind, EventLog, PassContext, PassKind, PilPass},
    pil::{DeclAttribute, Function, Module},
    Result,
};

/// Removes function definitions nothing can reach.
pub struct DeadFunctionEliminationPass;

impl Default for DeadFunctionEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadFunctionEliminationPass {
    /// Creates a new dead function elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn is_root(function: &Function, whole_module: bool) -> bool {
        function.linkage().is_possibly_used_externally(whole_module)
            || function
                .declaration()
                .is_some_and(|decl| decl.has_attribute(DeclAttribute::Used))
    }
}

impl PilPass for DeadFunctionEliminationPass {
    fn kind(&self) -> PassKind {
        PassKind::DeadFunctionElimination
    }

    fn run_on_function(
        &self,
        _func: &mut Function,
        _analyses: &mut AnalysisCache,
        _ctx: &PassContext<'_>,
        _events: &EventLog,
    ) -> Result<bool> {
        Ok(false)
    }

    fn run_on_module(&self, module: &mut Module, ctx: &PassContext<'_>) -> Result<bool> {
        ctx.rebuild_call_graph(module)?;
        let whole_module = module.is_whole_module();

        let dead: Vec<String> = {
            let graph = read_lock!(ctx.call_graph)?;
            let live = graph.reachable_from(
                module
                    .functions()
                    .iter()
                    .filter(|function| Self::is_root(function, whole_module))
                    .map(Function::name),
            );
            module
                .functions()
                .iter()
                .filter(|function| function.is_definition() && !live.contains(function.name()))
                .map(|function| function.name().to_string())
                .collect()
        };

        for name in &dead {
            if module.remove_function(name).is_some() {
                ctx.events
                    .record(EventKind::FunctionRemoved)
                    .function(name.as_str())
                    .pass(self.tag())
                    .message(format!("removed dead function {name}"));
            }
        }
        Ok(!dead.is_empty())
    }

    fn is_module_pass(&self) -> bool {
        true
    }

    fn invalidates(&self) -> InvalidationKind {
        InvalidationKind::CALLS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::DiagnosticCollector,
        options::PilOptions,
        pil::{Declaration, FormalLinkage, PilBuilder, PilLinkage, PilType, Section},
    };

    fn function(name: &str, linkage: PilLinkage, callees: &[&str]) -> Function {
        let mut f = Function::new(name, linkage);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        for &callee in callees {
            let callee = b.function_ref(callee);
            b.apply(callee, &[], PilType::Empty, None);
        }
        let zero = b.integer_literal(PilType::Int(64), 0);
        b.return_(zero);
        f
    }

    #[test]
    fn test_removes_unreachable_definitions() -> crate::Result<()> {
        let mut module = Module::new("m");
        module.add_function(function("main", PilLinkage::Public, &["helper"]));
        module.add_function(function("helper", PilLinkage::Private, &[]));
        module.add_function(function("orphan", PilLinkage::Private, &["orphan_callee"]));
        module.add_function(function("orphan_callee", PilLinkage::Private, &[]));
        module.add_function(function("hidden", PilLinkage::Hidden, &[]));

        let used = Declaration::new("kept", FormalLinkage::Private).with_attribute(DeclAttribute::Used);
        let mut kept = Function::for_declaration("kept", used);
        let mut b = PilBuilder::new(&mut kept);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let zero = b.integer_literal(PilType::Int(64), 0);
        b.return_(zero);
        module.add_function(kept);
        module.set_whole_module(true);

        let options = PilOptions::default();
        let diagnostics = DiagnosticCollector::default();
        let ctx = PassContext::new(&module, &options, &diagnostics);
        let pass = DeadFunctionEliminationPass::new();
        assert!(pass.run_on_module(&mut module, &ctx)?);

        let names: Vec<&str> = module.functions().iter().map(Function::name).collect();
        assert_eq!(names, vec!["main", "helper", "kept"]);
        assert_eq!(ctx.events.count_kind(EventKind::FunctionRemoved), 3);

        assert!(!pass.run_on_module(&mut module, &ctx)?);
        Ok(())
    }

    #[test]
    fn test_hidden_kept_without_whole_module() -> crate::Result<()> {
        let mut module = Module::new("m");
        module.add_function(function("hidden", PilLinkage::Hidden, &[]));

        let options = PilOptions::default();
        let diagnostics = DiagnosticCollector::default();
        let ctx = PassContext::new(&module, &options, &diagnostics);
        assert!(!DeadFunctionEliminationPass::new().run_on_module(&mut module, &ctx)?);
        assert_eq!(module.len(), 1);
        Ok(())
    }
}
