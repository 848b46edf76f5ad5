//! Pass catalog, pipelines and the pass manager.
//!
//! # Architecture
//!
//! - [`catalog`] - every known pass with its identifier, command-line tag and description
//! - [`pipeline`] - named pipelines and the per-invocation [`CompilationPlan`]
//! - [`pass`] - the [`PilPass`] trait and the shared [`PassContext`]
//! - [`registry`] - implementations looked up by [`PassKind`]
//! - [`manager`] - the [`PassManager`] state machine and [`run_compilation`]
//! - [`events`] - structured record of what the passes changed
//!
//! # Flow
//!
//! ```text
//! PilOptions --> CompilationPlan --> PassManager --(PassRegistry)--> PilPass
//!                                        |
//!                                        v
//!                                    RunReport (state, events, change counts)
//! ```
//!
//! # Usage
//!
//! ```rust
//! use pilopt::diagnostics::DiagnosticCollector;
//! use pilopt::options::PilOptions;
//! use pilopt::passmgr::{run_compilation, PassRegistry, RunState};
//! use pilopt::pil::Module;
//!
//! let mut module = Module::new("app");
//! let options = PilOptions::new().with_custom_pass_list(["dce", "simplify-cfg"]);
//! let diagnostics = DiagnosticCollector::default();
//! let mut registry = PassRegistry::with_builtin_passes();
//!
//! let report = run_compilation(&mut module, &options, &mut registry, &diagnostics)?;
//! assert_eq!(report.state, RunState::Completed);
//! # Ok::<(), pilopt::Error>(())
//! ```

pub mod catalog;
pub mod events;
pub mod manager;
pub mod pass;
pub mod pipeline;
pub mod registry;

pub use catalog::{PassInfo, PassKind, PASS_CATALOG};
pub use events::{Event, EventBuilder, EventKind, EventLog, RunStats};
pub use manager::{run_compilation, PassManager, RunReport, RunState};
pub use pass::{PassContext, PilPass};
pub use pipeline::{
    CompilationPlan, PassGroup, PassPipelinePlan, PassStage, PipelineKind, StageItem,
};
pub use registry::PassRegistry;
