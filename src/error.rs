use thiserror::Error;

macro_rules! invariant_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Verification {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Verification {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every recoverable failure this library can report.
///
/// Structural misuse of the instruction graph (erasing an instruction whose results are
/// still used, replacing a value with one of a different type, touching an erased handle)
/// is not represented here: those are compiler defects and abort through `panic!`. The
/// variants below are the user-facing and reporting errors.
///
/// # Error Categories
///
/// ## Configuration Errors
/// - [`Error::UnknownPass`] - A command-line pass tag does not name a catalog entry
/// - [`Error::UnsupportedOptions`] - The option combination cannot be scheduled
///
/// ## Pipeline Errors
/// - [`Error::Verification`] - `Function::verify` found a broken structural invariant
/// - [`Error::Pass`] - A pass reported a failure while running
/// - [`Error::LockError`] - Shared module state could not be locked
///
/// # Examples
///
/// ```rust
/// use pilopt::{passmgr::PassKind, Error};
///
/// match PassKind::from_tag("no-such-pass") {
///     Ok(kind) => println!("resolved {kind:?}"),
///     Err(Error::UnknownPass(tag)) => eprintln!("unknown pass '{tag}'"),
///     Err(e) => eprintln!("other error: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// A pass tag given on the command line does not exist in the pass catalog.
    ///
    /// This is a user error, the process should report it and exit with a
    /// non-zero status rather than abort.
    #[error("Unknown pass tag '{0}'")]
    UnknownPass(String),

    /// The compilation options request a combination that cannot be scheduled.
    #[error("Unsupported option combination - {0}")]
    UnsupportedOptions(String),

    /// A structural invariant of a function does not hold.
    ///
    /// Produced by [`crate::pil::Function::verify`]. The error includes the source
    /// location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the broken invariant
    /// * `file` - Source file where the check failed
    /// * `line` - Source line where the check failed
    #[error("Verification failed - {file}:{line}: {message}")]
    Verification {
        /// The message to be printed for the Verification error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A pass failed while transforming a function or module.
    #[error("Pass '{pass}' failed: {message}")]
    Pass {
        /// Command-line tag of the failing pass
        pass: &'static str,
        /// What went wrong
        message: String,
    },

    /// Failed to lock target.
    ///
    /// Occurs when a shared lock (for example the module call graph) was poisoned
    /// by a panicking worker thread.
    #[error("Failed to lock target")]
    LockError,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
