//! # pilopt Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! of the optimizer. Import it to build functions, run passes and inspect the results
//! without naming every submodule.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all pilopt operations
pub use crate::Error;

/// The result type used throughout pilopt
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Functions, modules and their structural editing API
pub use crate::pil::{
    Block, BlockId, DeclAttribute, Declaration, Function, InsertPoint, InstId, Module, Section,
    ValueId,
};

/// Instruction kinds and their qualifiers
pub use crate::pil::{
    BuiltinOp, EnumCase, InstKind, LoadQualifier, SideEffects, SourceLoc, StoreQualifier,
};

/// Types, ownership and linkage
pub use crate::pil::{
    FormalLinkage, OwnershipKind, ParameterConvention, PilLinkage, PilType, PointerKind,
};

/// Instruction construction
pub use crate::pil::PilBuilder;

/// Foreign error conventions
pub use crate::pil::{ForeignErrorConvention, ForeignErrorKind};

// ================================================================================================
// Analysis
// ================================================================================================

/// Analyses and their cache
pub use crate::analysis::{AnalysisCache, AnalysisKind, CallGraph, DominanceInfo, InvalidationKind};

// ================================================================================================
// Pass Management
// ================================================================================================

/// Pass catalog, pipelines and the pass manager
pub use crate::passmgr::{
    run_compilation, CompilationPlan, EventKind, EventLog, PassContext, PassKind, PassManager,
    PassPipelinePlan, PassRegistry, PilPass, RunReport, RunState,
};

// ================================================================================================
// Diagnostics and Options
// ================================================================================================

/// Diagnostic reporting
pub use crate::diagnostics::{
    Diagnostic, DiagnosticCollector, DiagnosticEngine, DiagnosticId, Severity,
};

/// Invocation options
pub use crate::options::{DiagnosticOptions, OptimizationMode, PilOptions};
