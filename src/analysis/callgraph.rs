//! Whole-module call graph built from `function_ref` instructions.
//!
//! An edge `caller -> callee` exists whenever `caller` contains a `function_ref`
//! naming `callee`, whether the reference is called, partially applied or escapes.
//! This is the conservative notion of "uses" dead-function elimination needs.
//!
//! The graph is shared between worker threads by the pass manager behind a
//! [`std::sync::RwLock`]: function passes read it, module passes rebuild it.

use std::collections::{BTreeMap, BTreeSet};

use crate::pil::{InstKind, Module};

/// Caller and callee relations between the functions of a module.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    callees: BTreeMap<String, BTreeSet<String>>,
    callers: BTreeMap<String, BTreeSet<String>>,
}

impl CallGraph {
    /// Creates an empty call graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the call graph of `module`.
    #[must_use]
    pub fn build(module: &Module) -> Self {
        let mut graph = Self::new();
        for function in module.functions() {
            graph.callees.entry(function.name().to_string()).or_default();
            for inst in function.instructions() {
                if let InstKind::FunctionRef { name } = function.kind(inst) {
                    graph.add_edge(function.name(), name);
                }
            }
        }
        graph
    }

    fn add_edge(&mut self, caller: &str, callee: &str) {
        self.callees
            .entry(caller.to_string())
            .or_default()
            .insert(callee.to_string());
        self.callers
            .entry(callee.to_string())
            .or_default()
            .insert(caller.to_string());
    }

    /// Functions referenced from `caller`, sorted by name.
    pub fn callees(&self, caller: &str) -> impl Iterator<Item = &str> {
        self.callees
            .get(caller)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Functions referencing `callee`, sorted by name.
    pub fn callers(&self, callee: &str) -> impl Iterator<Item = &str> {
        self.callers
            .get(callee)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// Returns `true` if some function other than `name` itself references `name`.
    #[must_use]
    pub fn is_referenced(&self, name: &str) -> bool {
        self.callers(name).any(|caller| caller != name)
    }

    /// Every function transitively referenced from `roots`, roots included.
    #[must_use]
    pub fn reachable_from<'a>(&self, roots: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let mut worklist: Vec<String> = roots.into_iter().map(str::to_string).collect();
        while let Some(name) = worklist.pop() {
            if !reached.insert(name.clone()) {
                continue;
            }
            for callee in self.callees(&name) {
                if !reached.contains(callee) {
                    worklist.push(callee.to_string());
                }
            }
        }
        reached
    }

    /// Number of functions with outgoing edge sets (every function of the module).
    #[must_use]
    pub fn len(&self) -> usize {
        self.callees.len()
    }

    /// Returns `true` if the graph has no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callees.is_empty()
    }
}
