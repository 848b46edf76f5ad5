//! Options controlling which pipelines run and how.
//!
//! [`PilOptions`] is built once per compiler invocation and consumed by
//! [`crate::passmgr::CompilationPlan::from_options`]. Nothing in the pass manager
//! reads global state; two invocations with equal options schedule the same passes.
//!
//! # Examples
//!
//! ```rust
//! use pilopt::options::{OptimizationMode, PilOptions};
//!
//! let options = PilOptions::new()
//!     .with_opt_mode(OptimizationMode::ForSpeed)
//!     .with_disabled_pass("cse")
//!     .with_verify_all(true);
//! options.validate()?;
//! assert!(options.is_optimizing());
//! # Ok::<(), pilopt::Error>(())
//! ```

use strum::{Display, EnumIter};

use crate::{passmgr::PassKind, Error, Result};

/// Optimization level requested for the invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumIter)]
pub enum OptimizationMode {
    /// No level given; treated like [`OptimizationMode::NoOptimization`].
    #[default]
    NotSet,
    /// `-Onone`.
    NoOptimization,
    /// `-O`.
    ForSpeed,
    /// `-Osize`.
    ForSize,
}

impl OptimizationMode {
    /// Returns `true` for the optimizing levels.
    #[must_use]
    pub const fn is_optimizing(self) -> bool {
        matches!(self, Self::ForSpeed | Self::ForSize)
    }
}

/// How diagnostics are filtered and upgraded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagnosticOptions {
    /// Report warnings as errors.
    pub warnings_as_errors: bool,
    /// Drop warnings entirely.
    pub suppress_warnings: bool,
    /// Keep reporting after a fatal diagnostic.
    pub show_diagnostics_after_fatal: bool,
}

impl DiagnosticOptions {
    /// Creates the default diagnostic options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether warnings are upgraded to errors.
    #[must_use]
    pub fn with_warnings_as_errors(mut self, enabled: bool) -> Self {
        self.warnings_as_errors = enabled;
        self
    }

    /// Sets whether warnings are dropped.
    #[must_use]
    pub fn with_suppress_warnings(mut self, enabled: bool) -> Self {
        self.suppress_warnings = enabled;
        self
    }

    /// Sets whether diagnostics after a fatal one are kept.
    #[must_use]
    pub fn with_show_diagnostics_after_fatal(mut self, enabled: bool) -> Self {
        self.show_diagnostics_after_fatal = enabled;
        self
    }
}

/// Options of one compiler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PilOptions {
    /// Requested optimization level.
    pub opt_mode: OptimizationMode,
    /// Stop after the diagnostic pipeline.
    pub diagnostics_only: bool,
    /// The module interface is emitted, so the serialization pipeline runs.
    pub emit_module_interface: bool,
    /// Run the ownership-model eliminator before optimizing.
    pub enable_ownership_lowering: bool,
    /// Collect instruction statistics at the end of the run.
    pub collect_statistics: bool,
    /// Tags of passes removed from every pipeline.
    pub disabled_passes: Vec<String>,
    /// Tags replacing the standard compilation plan with a single stage.
    pub custom_pass_list: Option<Vec<String>>,
    /// Verify every function after every pass.
    pub verify_all: bool,
    /// Upper bound on iterations of a fixpoint stage.
    pub max_fixpoint_iterations: usize,
    /// Run function passes across functions on the rayon thread pool.
    pub parallel: bool,
    /// Diagnostic filtering.
    pub diagnostics: DiagnosticOptions,
}

impl Default for PilOptions {
    fn default() -> Self {
        Self {
            opt_mode: OptimizationMode::NotSet,
            diagnostics_only: false,
            emit_module_interface: false,
            enable_ownership_lowering: true,
            collect_statistics: false,
            disabled_passes: Vec::new(),
            custom_pass_list: None,
            verify_all: false,
            max_fixpoint_iterations: 8,
            parallel: false,
            diagnostics: DiagnosticOptions::default(),
        }
    }
}

impl PilOptions {
    /// Creates the default options (`-Onone` behaviour).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the optimization level.
    #[must_use]
    pub fn with_opt_mode(mut self, mode: OptimizationMode) -> Self {
        self.opt_mode = mode;
        self
    }

    /// Stops after the diagnostic pipeline.
    #[must_use]
    pub fn with_diagnostics_only(mut self, enabled: bool) -> Self {
        self.diagnostics_only = enabled;
        self
    }

    /// Schedules module interface serialization.
    #[must_use]
    pub fn with_module_interface(mut self, enabled: bool) -> Self {
        self.emit_module_interface = enabled;
        self
    }

    /// Sets whether ownership is lowered before optimization.
    #[must_use]
    pub fn with_ownership_lowering(mut self, enabled: bool) -> Self {
        self.enable_ownership_lowering = enabled;
        self
    }

    /// Schedules the instruction-count statistics pipeline.
    #[must_use]
    pub fn with_statistics(mut self, enabled: bool) -> Self {
        self.collect_statistics = enabled;
        self
    }

    /// Removes the pass with command-line tag `tag` from every pipeline.
    #[must_use]
    pub fn with_disabled_pass(mut self, tag: impl Into<String>) -> Self {
        self.disabled_passes.push(tag.into());
        self
    }

    /// Replaces the standard plan with the given pass tags.
    #[must_use]
    pub fn with_custom_pass_list<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_pass_list = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Sets whether every function is verified after every pass.
    #[must_use]
    pub fn with_verify_all(mut self, enabled: bool) -> Self {
        self.verify_all = enabled;
        self
    }

    /// Sets the iteration bound of fixpoint stages.
    #[must_use]
    pub fn with_max_fixpoint_iterations(mut self, iterations: usize) -> Self {
        self.max_fixpoint_iterations = iterations;
        self
    }

    /// Sets whether function passes run in parallel.
    #[must_use]
    pub fn with_parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Sets the diagnostic options.
    #[must_use]
    pub fn with_diagnostic_options(mut self, diagnostics: DiagnosticOptions) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Returns `true` if an optimizing level was requested.
    #[must_use]
    pub const fn is_optimizing(&self) -> bool {
        self.opt_mode.is_optimizing()
    }

    /// Checks that the options can be scheduled.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownPass`] if a disabled or custom tag names no pass, and
    /// [`Error::UnsupportedOptions`] for combinations the pass manager cannot
    /// honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_fixpoint_iterations == 0 {
            return Err(Error::UnsupportedOptions(
                "fixpoint stages need at least one iteration".to_string(),
            ));
        }
        if self.is_optimizing() && !self.enable_ownership_lowering {
            return Err(Error::UnsupportedOptions(format!(
                "optimization mode {} requires ownership lowering",
                self.opt_mode
            )));
        }
        if self.diagnostics_only && self.custom_pass_list.is_some() {
            return Err(Error::UnsupportedOptions(
                "a custom pass list cannot be combined with diagnostics-only mode".to_string(),
            ));
        }
        for tag in self
            .disabled_passes
            .iter()
            .chain(self.custom_pass_list.iter().flatten())
        {
            PassKind::from_tag(tag)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let options = PilOptions::default();
        assert!(options.validate().is_ok());
        assert!(!options.is_optimizing());
        assert!(options.enable_ownership_lowering);
    }

    #[test]
    fn test_rejected_combinations() {
        let no_ownership = PilOptions::new()
            .with_opt_mode(OptimizationMode::ForSize)
            .with_ownership_lowering(false);
        assert!(matches!(
            no_ownership.validate(),
            Err(Error::UnsupportedOptions(_))
        ));

        let zero = PilOptions::new().with_max_fixpoint_iterations(0);
        assert!(matches!(zero.validate(), Err(Error::UnsupportedOptions(_))));

        let mixed = PilOptions::new()
            .with_diagnostics_only(true)
            .with_custom_pass_list(["dce"]);
        assert!(matches!(mixed.validate(), Err(Error::UnsupportedOptions(_))));
    }

    #[test]
    fn test_unknown_tags() {
        let disabled = PilOptions::new().with_disabled_pass("not-a-pass");
        assert!(matches!(disabled.validate(), Err(Error::UnknownPass(tag)) if tag == "not-a-pass"));

        let custom = PilOptions::new().with_custom_pass_list(["dce", "bogus"]);
        assert!(matches!(custom.validate(), Err(Error::UnknownPass(tag)) if tag == "bogus"));
    }
}
