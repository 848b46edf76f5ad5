//! Analyses over the mid-level IR.
//!
//! # Architecture
//!
//! - [`dominance`] - dominator and post-dominator trees of one function
//! - [`cache`] - per-function analysis cache with invalidation by change kind
//! - [`callgraph`] - whole-module `function_ref` graph used by module passes
//! - [`value_tracking`] - constant zero / non-zero knowledge about integers
//!
//! Function analyses are computed on demand through an [`AnalysisCache`] owned by
//! the pass manager, one cache per function. A pass that changes a function
//! reports what it changed as an [`InvalidationKind`] and the cache drops every
//! result sensitive to it.
//!
//! # Usage
//!
//! ```rust
//! use pilopt::analysis::{AnalysisCache, InvalidationKind};
//! use pilopt::pil::{Function, PilBuilder, PilLinkage, PilType, Section};
//!
//! let mut f = Function::new("f", PilLinkage::Private);
//! let mut b = PilBuilder::new(&mut f);
//! let entry = b.create_block(Section::Main);
//! b.emit_block(entry);
//! let zero = b.integer_literal(PilType::Int(8), 0);
//! b.return_(zero);
//!
//! let mut cache = AnalysisCache::new();
//! assert!(cache.dominance(&f).dominates(entry, entry));
//! cache.invalidate(InvalidationKind::BRANCHES);
//! ```

pub mod cache;
pub mod callgraph;
pub mod dominance;
pub mod value_tracking;

pub use cache::{AnalysisCache, AnalysisKind, InvalidationKind};
pub use callgraph::CallGraph;
pub use dominance::DominanceInfo;
pub use value_tracking::{constant_int_value, is_zero_value, IsZeroKind};
