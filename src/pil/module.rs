//! A module: the set of functions a compilation works on.

use crate::pil::Function;

/// All functions of one compilation unit, in declaration order.
///
/// Function order is significant: passes visit functions in this order and
/// results are reported in this order, which keeps pipeline output
/// deterministic even when functions are processed in parallel.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    functions: Vec<Function>,
    whole_module: bool,
}

impl Module {
    /// Creates an empty module.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            whole_module: false,
        }
    }

    /// Module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the module is compiled as a whole (hidden symbols are not used externally).
    #[must_use]
    pub const fn is_whole_module(&self) -> bool {
        self.whole_module
    }

    /// Sets whole-module mode.
    pub fn set_whole_module(&mut self, whole_module: bool) {
        self.whole_module = whole_module;
    }

    /// Adds a function.
    ///
    /// # Panics
    ///
    /// Panics if a function of the same name already exists.
    pub fn add_function(&mut self, function: Function) {
        assert!(
            self.function(function.name()).is_none(),
            "duplicate function '{}' in module {}",
            function.name(),
            self.name
        );
        self.functions.push(function);
    }

    /// Functions in module order.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Mutable functions in module order.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Looks up a function by name, mutably.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name() == name)
    }

    /// Removes a function, returning it.
    pub fn remove_function(&mut self, name: &str) -> Option<Function> {
        let position = self.functions.iter().position(|f| f.name() == name)?;
        Some(self.functions.remove(position))
    }

    /// Number of functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the module has no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
