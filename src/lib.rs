// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::too_many_arguments)]

//! # pilopt
//!
//! The mid-level optimizer of a compiler: a typed SSA instruction graph with
//! explicit use lists, an ownership model for reference-counted values, utilities
//! for safely editing the graph, the lowering of foreign error conventions to
//! explicit checks, and a pass manager scheduling a catalog of transformations in
//! pipelines.
//!
//! ## Features
//!
//! - **Use-list graph** - every edit keeps def-use and use-def edges in sync, and
//!   [`pil::Function::verify`] re-checks them
//! - **Ownership model** - owned, guaranteed, unowned and trivial values, lowered
//!   to explicit reference counting by the ownership-model eliminator
//! - **Foreign error bridging** - calls to foreign functions reporting failure
//!   through a sentinel result or an error out-parameter become native throws
//! - **Pass pipelines** - the full catalog of passes, standard pipelines, custom
//!   pass lists, fixpoint stages and parallel function passes
//! - **Observability** - every transformation is recorded as a structured event
//!   and traced through the `log` facade
//!
//! ## Quick Start
//!
//! ```rust
//! use pilopt::prelude::*;
//!
//! let mut f = Function::new("answer", PilLinkage::Public);
//! let mut b = PilBuilder::new(&mut f);
//! let entry = b.create_block(Section::Main);
//! b.emit_block(entry);
//! let unused = b.integer_literal(PilType::Int(64), 1);
//! b.debug_value(unused, "x");
//! let answer = b.integer_literal(PilType::Int(64), 42);
//! b.return_(answer);
//!
//! let mut module = Module::new("demo");
//! module.add_function(f);
//!
//! let options = PilOptions::new().with_custom_pass_list(["dce"]);
//! let diagnostics = DiagnosticCollector::default();
//! let mut registry = PassRegistry::with_builtin_passes();
//! let report = run_compilation(&mut module, &options, &mut registry, &diagnostics)?;
//!
//! assert!(report.changed);
//! assert_eq!(module.functions()[0].inst_count(), 2);
//! # Ok::<(), pilopt::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`pil`] - the IR: functions, instructions, types, builder, printer, evaluator
//! - [`analysis`] - dominance, call graph, value tracking and the analysis cache
//! - [`utils`] - dead code deletion, closure deletion, reference-count helpers
//! - [`lowering`] - foreign error convention lowering
//! - [`passmgr`] - pass catalog, pipelines, registry, events and the pass manager
//! - [`passes`] - built-in pass implementations
//! - [`diagnostics`] - diagnostic identifiers and the thread-safe collector
//! - [`options`] - invocation options
//! - [`Error`] and [`Result`] - crate-wide error handling
//!
//! ## Thread Safety
//!
//! Every type is `Send` and `Sync`. With [`options::PilOptions::parallel`] set,
//! function passes run on the rayon thread pool, one worker per function; events
//! are merged in module order so the result does not depend on scheduling.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use pilopt::prelude::*;
///
/// let module = Module::new("m");
/// let registry = PassRegistry::with_builtin_passes();
/// assert!(module.is_empty());
/// assert!(registry.contains(PassKind::DCE));
/// ```
pub mod prelude;

/// The typed SSA IR and its structural editing API.
pub mod pil;

/// Analyses over functions and modules.
///
/// - [`analysis::DominanceInfo`] - dominator and post-dominator trees
/// - [`analysis::CallGraph`] - `function_ref` graph of a module
/// - [`analysis::AnalysisCache`] - lazily computed, selectively invalidated per-function results
/// - [`analysis::constant_int_value`] / [`analysis::is_zero_value`] - constant tracking
pub mod analysis;

/// Instruction deletion and rewriting helpers shared by passes.
pub mod utils;

/// Lowering of foreign conventions to plain IR.
pub mod lowering;

/// The pass catalog, pipelines and the pass manager.
pub mod passmgr;

/// Built-in pass implementations.
pub mod passes;

/// Diagnostic reporting.
pub mod diagnostics;

/// Invocation options.
pub mod options;

/// `pilopt` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust
/// use pilopt::{passmgr::PassKind, Result};
///
/// fn dce() -> Result<PassKind> {
///     PassKind::from_tag("dce")
/// }
/// assert!(dce().is_ok());
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `pilopt` Error type
///
/// The main error type for all fallible operations in this crate: bad options,
/// unknown pass tags, failed verification and passes that could not run.
///
/// # Examples
///
/// ```rust
/// use pilopt::{passmgr::PassKind, Error};
///
/// match PassKind::from_tag("dead-code") {
///     Ok(kind) => println!("found {kind:?}"),
///     Err(Error::UnknownPass(tag)) => println!("no pass named {tag}"),
///     Err(e) => println!("error: {e}"),
/// }
/// ```
pub use error::Error;
