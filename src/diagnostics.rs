//! Diagnostic reporting for passes and lowering.
//!
//! Passes report problems in the code they transform through a
//! [`DiagnosticEngine`]. Reporting is fire-and-forget: the only thing the pass
//! manager ever asks the engine afterwards is whether a fatal diagnostic was seen,
//! which aborts the remaining passes of the invocation.
//!
//! [`DiagnosticCollector`] is the default engine. It is shared between the worker
//! threads of a parallel run, so it keeps its list behind a mutex and its fatal
//! flag in an atomic.
//!
//! # Examples
//!
//! ```rust
//! use pilopt::diagnostics::{Diagnostic, DiagnosticCollector, DiagnosticEngine, DiagnosticId};
//! use pilopt::options::DiagnosticOptions;
//!
//! let engine = DiagnosticCollector::new(DiagnosticOptions::default());
//! engine.diagnose(Diagnostic::new(DiagnosticId::UnreachableCode, "will never be executed"));
//! assert_eq!(engine.warning_count(), 1);
//! assert!(!engine.has_fatal());
//! ```

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};

use strum::{Display, EnumIter, IntoStaticStr};

use crate::{options::DiagnosticOptions, pil::SourceLoc};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    /// Additional information attached to another diagnostic.
    Note,
    /// Suspicious code that still compiles.
    Warning,
    /// Invalid code; compilation fails but later diagnostics are still useful.
    Error,
    /// Invalid code; nothing after this point is worth running.
    Fatal,
}

/// Identifier of a diagnostic kind, with its default severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum DiagnosticId {
    /// The pointee type of a foreign error slot has no known stored property.
    CouldNotFindPointerPointeeProperty,
    /// User code can never be executed.
    UnreachableCode,
    /// A call to a function that never returns is followed by more code.
    CallToNoReturnFunction,
    /// A pass failed while transforming a function.
    PassFailed,
}

impl DiagnosticId {
    /// The severity this diagnostic is emitted with before options apply.
    #[must_use]
    pub const fn default_severity(self) -> Severity {
        match self {
            Self::CouldNotFindPointerPointeeProperty => Severity::Error,
            Self::UnreachableCode => Severity::Warning,
            Self::CallToNoReturnFunction => Severity::Note,
            Self::PassFailed => Severity::Fatal,
        }
    }
}

/// One reported diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity after options were applied.
    pub severity: Severity,
    /// Which diagnostic this is.
    pub id: DiagnosticId,
    /// Source location, if the instruction carried one.
    pub loc: Option<SourceLoc>,
    /// Function the diagnostic was reported in.
    pub function: Option<String>,
    /// Rendered message.
    pub message: String,
}

impl Diagnostic {
    /// Creates a diagnostic with the default severity of `id`.
    #[must_use]
    pub fn new(id: DiagnosticId, message: impl Into<String>) -> Self {
        Self {
            severity: id.default_severity(),
            id,
            loc: None,
            function: None,
            message: message.into(),
        }
    }

    /// Attaches a source location.
    #[must_use]
    pub fn at(mut self, loc: Option<SourceLoc>) -> Self {
        self.loc = loc;
        self
    }

    /// Attaches the name of the function being transformed.
    #[must_use]
    pub fn in_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Overrides the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(function) = &self.function {
            write!(f, "{function}:")?;
        }
        if let Some(loc) = &self.loc {
            write!(f, "{loc}:")?;
        }
        if self.function.is_some() || self.loc.is_some() {
            write!(f, " ")?;
        }
        write!(f, "{}: {} [{}]", self.severity, self.message, self.id)
    }
}

/// Sink for diagnostics produced while running passes.
pub trait DiagnosticEngine: Send + Sync {
    /// Reports a diagnostic.
    fn diagnose(&self, diagnostic: Diagnostic);

    /// Returns `true` once a fatal diagnostic was reported.
    fn has_fatal(&self) -> bool;

    /// Returns `true` once an error or fatal diagnostic was reported.
    fn has_errors(&self) -> bool;
}

/// Thread-safe [`DiagnosticEngine`] keeping every diagnostic in report order.
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    options: DiagnosticOptions,
    diagnostics: Mutex<Vec<Diagnostic>>,
    fatal: AtomicBool,
    errors: AtomicUsize,
    warnings: AtomicUsize,
}

impl DiagnosticCollector {
    /// Creates an empty collector applying `options` to every report.
    #[must_use]
    pub fn new(options: DiagnosticOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Snapshot of the diagnostics reported so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match lock!(self.diagnostics) {
            Ok(list) => list.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// Number of error and fatal diagnostics.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::Acquire)
    }

    /// Number of warnings kept.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Acquire)
    }
}

impl DiagnosticEngine for DiagnosticCollector {
    fn diagnose(&self, mut diagnostic: Diagnostic) {
        if self.fatal.load(Ordering::Acquire) && !self.options.show_diagnostics_after_fatal {
            log::trace!("dropping diagnostic after fatal: {diagnostic}");
            return;
        }
        if diagnostic.severity == Severity::Warning {
            if self.options.suppress_warnings {
                return;
            }
            if self.options.warnings_as_errors {
                diagnostic.severity = Severity::Error;
            }
        }

        match diagnostic.severity {
            Severity::Fatal => {
                self.fatal.store(true, Ordering::Release);
                self.errors.fetch_add(1, Ordering::AcqRel);
            }
            Severity::Error => {
                self.errors.fetch_add(1, Ordering::AcqRel);
            }
            Severity::Warning => {
                self.warnings.fetch_add(1, Ordering::AcqRel);
            }
            Severity::Note => {}
        }

        log::debug!("{diagnostic}");
        if let Ok(mut list) = lock!(self.diagnostics) {
            list.push(diagnostic);
        }
    }

    fn has_fatal(&self) -> bool {
        self.fatal.load(Ordering::Acquire)
    }

    fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}
