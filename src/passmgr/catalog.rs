//! The static pass catalog.
//!
//! Every pass the optimizer knows about has one entry: a stable identifier
//! ([`PassKind`]), a unique command-line tag and a human description. Entries are
//! plain data; whether a pass can actually run is decided by the
//! [`crate::passmgr::PassRegistry`]. Passes flagged `irgen` are implemented by the
//! code generator and registered late.
//!
//! # Examples
//!
//! ```rust
//! use pilopt::passmgr::PassKind;
//!
//! let dce = PassKind::from_tag("dce")?;
//! assert_eq!(dce, PassKind::DCE);
//! assert_eq!(dce.info().description, "Dead Code Elimination");
//! assert!(PassKind::from_tag("dead-code").is_err());
//! # Ok::<(), pilopt::Error>(())
//! ```

use std::fmt;

use strum::{EnumCount, EnumIter};

use crate::{Error, Result};

/// One catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PassInfo {
    /// Identifier of the pass.
    pub kind: PassKind,
    /// Identifier spelled as in the catalog.
    pub id: &'static str,
    /// Command-line tag.
    pub tag: &'static str,
    /// Human description.
    pub description: &'static str,
    /// Implemented by the code generator rather than the optimizer.
    pub irgen: bool,
}

macro_rules! pass_catalog {
    ($($kind:ident => $tag:literal, $description:literal, $irgen:literal;)*) => {
        /// Identifier of a catalog pass.
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
        pub enum PassKind {
            $(
                #[doc = $description]
                $kind,
            )*
        }

        /// Every catalog entry, in declaration order.
        pub static PASS_CATALOG: &[PassInfo] = &[
            $(
                PassInfo {
                    kind: PassKind::$kind,
                    id: stringify!($kind),
                    tag: $tag,
                    description: $description,
                    irgen: $irgen,
                },
            )*
        ];
    };
}

pass_catalog! {
    AADumper => "aa-dump", "Dump Alias Analysis over all Pairs", false;
    ABCOpt => "abcopts", "Array Bounds Check Optimization", false;
    AccessEnforcementDom => "access-enforcement-dom", "Remove dominated access checks with no nested conflict", false;
    AccessEnforcementOpts => "access-enforcement-opts", "Access Enforcement Optimization", false;
    AccessEnforcementReleaseSinking => "access-enforcement-release", "Access Enforcement Release Sinking", false;
    AccessEnforcementSelection => "access-enforcement-selection", "Access Enforcement Selection", false;
    AccessEnforcementWMO => "access-enforcement-wmo", "Access Enforcement Whole Module Optimization", false;
    CrossModuleSerializationSetup => "cross-module-serialization-setup", "Setup serialization flags for cross-module optimization", false;
    AccessSummaryDumper => "access-summary-dump", "Dump Address Parameter Access Summary", false;
    AccessedStorageDumper => "accessed-storage-dump", "Dump Accessed Storage Summary", false;
    AccessMarkerElimination => "access-marker-elim", "Access Marker Elimination.", false;
    AddressLowering => "address-lowering", "PIL Address Lowering", false;
    AllocBoxToStack => "allocbox-to-stack", "Stack Promotion of Box Objects", false;
    AllocStackHoisting => "alloc-stack-hoisting", "PIL alloc_stack Hoisting", true;
    ArrayCountPropagation => "array-count-propagation", "Array Count Propagation", false;
    ArrayElementPropagation => "array-element-propagation", "Array Element Propagation", false;
    AssumeSingleThreaded => "sil-assume-single-threaded", "Assume Single-Threaded Environment", false;
    BasicInstructionPropertyDumper => "basic-instruction-property-dump", "Print PIL Instruction MemBehavior and ReleaseBehavior Information", false;
    BasicCalleePrinter => "basic-callee-printer", "Print Basic Callee Analysis for Testing", false;
    CFGPrinter => "view-cfg", "View Function CFGs", false;
    COWArrayOpts => "cowarray-opt", "COW Array Optimization", false;
    CSE => "cse", "Common Subexpression Elimination", false;
    CallerAnalysisPrinter => "caller-analysis-printer", "Print Caller Analysis for Testing", false;
    CapturePromotion => "capture-promotion", "Capture Promotion to Eliminate Escaping Boxes", false;
    CapturePropagation => "capture-prop", "Captured Constant Propagation", false;
    ClosureSpecializer => "closure-specialize", "Closure Specialization on Constant Function Arguments", false;
    ClosureLifetimeFixup => "closure-lifetime-fixup", "Closure Lifetime Fixup", false;
    CodeSinking => "code-sinking", "Code Sinking", false;
    ComputeDominanceInfo => "compute-dominance-info", "Compute Dominance Information for Testing", false;
    ComputeLoopInfo => "compute-loop-info", "Compute Loop Information for Testing", false;
    ConditionForwarding => "condition-forwarding", "Conditional Branch Forwarding to Fold PIL switch_enum", false;
    ConstantEvaluatorTester => "test-constant-evaluator", "Test constant evaluator", false;
    ConstantEvaluableSubsetChecker => "test-constant-evaluable-subset", "Test polarphp code snippets expected to be constant evaluable", false;
    CopyForwarding => "copy-forwarding", "Copy Forwarding to Remove Redundant Copies", false;
    CopyPropagation => "copy-propagation", "Copy propagation to Remove Redundant SSA Copies", false;
    EpilogueARCMatcherDumper => "sil-epilogue-arc-dumper", "Print Epilogue retains of Returned Values and Argument releases", false;
    EpilogueRetainReleaseMatcherDumper => "sil-epilogue-retain-release-dumper", "Print Epilogue retains of Returned Values and Argument releases", false;
    RedundantOverflowCheckRemoval => "remove-redundant-overflow-checks", "Redundant Overflow Check Removal", false;
    DCE => "dce", "Dead Code Elimination", false;
    DeadArgSignatureOpt => "dead-arg-signature-opt", "Dead Argument Elimination via Function Specialization", false;
    DeadFunctionElimination => "sil-deadfuncelim", "Dead Function Elimination", false;
    DeadObjectElimination => "deadobject-elim", "Dead Object Elimination for Classes with Trivial Destruction", false;
    DefiniteInitialization => "definite-init", "Definite Initialization for Diagnostics", false;
    DestroyHoisting => "destroy-hoisting", "Hoisting of value destroys", false;
    Devirtualizer => "devirtualizer", "Indirect Call Devirtualization", false;
    DiagnoseInfiniteRecursion => "diagnose-infinite-recursion", "Diagnose Infinitely-Recursive Code", false;
    DiagnoseInvalidEscapingCaptures => "diagnose-invalid-escaping-captures", "Diagnose Invalid Escaping Captures", false;
    DiagnoseStaticExclusivity => "diagnose-static-exclusivity", "Static Enforcement of Law of Exclusivity", false;
    DiagnoseUnreachable => "diagnose-unreachable", "Diagnose Unreachable Code", false;
    DiagnosticConstantPropagation => "diagnostic-constant-propagation", "Constants Propagation for Diagnostics", false;
    EagerSpecializer => "eager-specializer", "Eager Specialization via @_specialize", false;
    EarlyCodeMotion => "early-codemotion", "Early Code Motion without Release Hoisting", false;
    EarlyInliner => "early-inline", "Early Inlining Preserving Semantic Functions", false;
    EmitDFDiagnostics => "dataflow-diagnostics", "Emit PIL Diagnostics", false;
    EscapeAnalysisDumper => "escapes-dump", "Dump Escape Analysis Results", false;
    FunctionOrderPrinter => "function-order-printer", "Print Function Order for Testing", false;
    FunctionSignatureOpts => "function-signature-opts", "Function Signature Optimization", false;
    ARCSequenceOpts => "arc-sequence-opts", "ARC Sequence Optimization", false;
    ARCLoopOpts => "arc-loop-opts", "ARC Loop Optimization", false;
    EarlyRedundantLoadElimination => "early-redundant-load-elim", "Early Redundant Load Elimination", false;
    RedundantLoadElimination => "redundant-load-elim", "Redundant Load Elimination", false;
    DeadStoreElimination => "dead-store-elim", "Dead Store Elimination", false;
    GenericSpecializer => "generic-specializer", "Generic Function Specialization on Static Types", false;
    ExistentialSpecializer => "existential-specializer", "Existential Specializer", false;
    GlobalOpt => "global-opt", "PIL Global Optimization", false;
    GlobalPropertyOpt => "global-property-opt", "Global Property Optimization", false;
    GuaranteedARCOpts => "guaranteed-arc-opts", "Guaranteed ARC Optimization", false;
    HighLevelCSE => "high-level-cse", "Common Subexpression Elimination on High-Level PIL", false;
    HighLevelLICM => "high-level-licm", "Loop Invariant Code Motion in High-Level PIL", false;
    IVInfoPrinter => "iv-info-printer", "Print Induction Variable Information for Testing", false;
    InstCount => "inst-count", "Record PIL Instruction, Block, and Function Counts as LLVM Statistics", false;
    JumpThreadSimplifyCFG => "jumpthread-simplify-cfg", "Simplify CFG via Jump Threading", false;
    LetPropertiesOpt => "let-properties-opt", "Let Property Optimization", false;
    LICM => "licm", "Loop Invariant Code Motion", false;
    LateCodeMotion => "late-codemotion", "Late Code Motion with Release Hoisting", false;
    LateInliner => "late-inline", "Late Function Inlining", false;
    LoopCanonicalizer => "loop-canonicalizer", "Loop Canonicalization", false;
    LoopInfoPrinter => "loop-info-printer", "Print Loop Information for Testing", false;
    LoopRegionViewText => "loop-region-view-text", "Print Loop Region Information for Testing", false;
    LoopRegionViewCFG => "loop-region-view-cfg", "View Loop Region CFG", false;
    LoopRotate => "loop-rotate", "Loop Rotation", false;
    LoopUnroll => "loop-unroll", "Loop Unrolling", false;
    LowerAggregateInstrs => "lower-aggregate-instrs", "Lower Aggregate PIL Instructions to Multiple Scalar Operations", false;
    MandatoryInlining => "mandatory-inlining", "Mandatory Inlining of Transparent Functions", false;
    Mem2Reg => "mem2reg", "Memory to SSA Value Conversion to Remove Stack Allocation", false;
    MemBehaviorDumper => "mem-behavior-dump", "Print PIL Instruction MemBehavior from Alias Analysis over all Pairs", false;
    LSLocationPrinter => "lslocation-dump", "Print Load-Store Location Results Covering all Accesses", false;
    MergeCondFails => "merge-cond_fails", "Merge PIL cond_fail to Eliminate Redundant Overflow Checks", false;
    MoveCondFailToPreds => "move-cond-fail-to-preds", "Move PIL cond_fail by Hoisting Checks", false;
    NoReturnFolding => "noreturn-folding", "Prune Control Flow at No-Return Calls Using PIL unreachable", false;
    ObjectOutliner => "object-outliner", "Outlining of Global Objects", false;
    Outliner => "outliner", "Function Outlining Optimization", false;
    OwnershipModelEliminator => "ownership-model-eliminator", "Eliminate Ownership Annotation of PIL", false;
    NonTransparentFunctionOwnershipModelEliminator => "non-transparent-func-ownership-model-eliminator", "Eliminate Ownership Annotations from non-transparent PIL Functions", false;
    RCIdentityDumper => "rc-id-dumper", "Print Reference Count Identities", false;
    PerfInliner => "inline", "Performance Function Inlining", false;
    PerformanceConstantPropagation => "performance-constant-propagation", "Constant Propagation for Performance without Diagnostics", false;
    PredictableMemoryAccessOptimizations => "predictable-memaccess-opts", "Predictable Memory Access Optimizations for Diagnostics", false;
    PredictableDeadAllocationElimination => "predictable-deadalloc-elim", "Eliminate dead temporary allocations after diagnostics", false;
    ReleaseDevirtualizer => "release-devirtualizer", "PIL release Devirtualization", false;
    RetainSinking => "retain-sinking", "PIL retain Sinking", false;
    ReleaseHoisting => "release-hoisting", "PIL release Hoisting", false;
    LateReleaseHoisting => "late-release-hoisting", "Late PIL release Hoisting Preserving Epilogues", false;
    LoadableByAddress => "loadable-address", "PIL Large Loadable type by-address lowering.", true;
    MandatoryPILLinker => "mandatory-linker", "Deserialize all referenced PIL functions that are shared or transparent", false;
    PerformancePILLinker => "performance-linker", "Deserialize all referenced PIL functions", false;
    RawPILInstLowering => "raw-sil-inst-lowering", "Lower all raw PIL instructions to canonical equivalents.", false;
    TempRValueOpt => "temp-rvalue-opt", "Remove short-lived immutable temporary copies", false;
    SideEffectsDumper => "side-effects-dump", "Print Side-Effect Information for all Functions", false;
    IRGenPrepare => "irgen-prepare", "Cleanup PIL in preparation for IRGen", false;
    PILGenCleanup => "silgen-cleanup", "Cleanup PIL in preparation for diagnostics", false;
    PILCombine => "sil-combine", "Combine PIL Instructions via Peephole Optimization", false;
    PILDebugInfoGenerator => "sil-debuginfo-gen", "Generate Debug Information with Source Locations into Textual PIL", false;
    SROA => "sroa", "Scalar Replacement of Aggregate Stack Objects", false;
    SROABBArgs => "sroa-bb-args", "Scalar Replacement of Aggregate PIL Block Arguments", false;
    SimplifyBBArgs => "simplify-bb-args", "PIL Block Argument Simplification", false;
    SimplifyCFG => "simplify-cfg", "PIL CFG Simplification", false;
    SpeculativeDevirtualization => "specdevirt", "Speculative Devirtualization via Guarded Calls", false;
    SplitAllCriticalEdges => "split-critical-edges", "Split all Critical Edges in the PIL CFG", false;
    SplitNonCondBrCriticalEdges => "split-non-cond_br-critical-edges", "Split all Critical Edges not from PIL cond_br", false;
    StackPromotion => "stack-promotion", "Stack Promotion of Class Objects", false;
    StripDebugInfo => "strip-debug-info", "Strip Debug Information", false;
    ArrayPropertyOpt => "array-property-opt", "Loop Specialization for Array Properties", false;
    UnsafeGuaranteedPeephole => "unsafe-guaranteed-peephole", "PIL retain/release Peephole Removal for Builtin.unsafeGuaranteed", false;
    UsePrespecialized => "use-prespecialized", "Use Pre-Specialized Functions", false;
    OwnershipDumper => "ownership-dumper", "Print Ownership information for Testing", false;
    SemanticARCOpts => "semantic-arc-opts", "Semantic ARC Optimization", false;
    MarkUninitializedFixup => "mark-uninitialized-fixup", "Temporary pass for staging in mark_uninitialized changes.", false;
    SimplifyUnreachableContainingBlocks => "simplify-unreachable-containing-blocks", "Utility pass. Removes all non-term insts from blocks with unreachable terms", false;
    SerializePILPass => "serialize-sil", "Utility pass. Serializes the current PILModule", false;
    NonInlinableFunctionSkippingChecker => "check-non-inlinable-function-skipping", "Utility pass to ensure -experimental-skip-non-inlinable-function-bodies skips everything it should", false;
    YieldOnceCheck => "yield-once-check", "Check correct usage of yields in yield-once coroutines", false;
    OSLogOptimization => "os-log-optimization", "Optimize os log calls", false;
    MandatoryCombine => "mandatory-combine", "Perform mandatory peephole combines", false;
    BugReducerTester => "bug-reducer-tester", "sil-bug-reducer Tool Testing by Asserting on a Sentinel Function", false;
    ForeignErrorLowering => "lower-foreign-errors", "Lower Foreign Error Conventions to Explicit Checks", false;
}

impl PassKind {
    /// The catalog entry of this pass.
    #[must_use]
    pub fn info(self) -> &'static PassInfo {
        &PASS_CATALOG[self as usize]
    }

    /// Command-line tag of this pass.
    #[must_use]
    pub fn tag(self) -> &'static str {
        self.info().tag
    }

    /// Resolves a command-line tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownPass`] if no entry has this tag.
    pub fn from_tag(tag: &str) -> Result<Self> {
        PASS_CATALOG
            .iter()
            .find(|info| info.tag == tag)
            .map(|info| info.kind)
            .ok_or_else(|| Error::UnknownPass(tag.to_string()))
    }

    /// Resolves a catalog identifier such as `"SimplifyCFG"`.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        PASS_CATALOG
            .iter()
            .find(|info| info.id == id)
            .map(|info| info.kind)
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn test_catalog_is_indexed_by_kind() {
        assert_eq!(PASS_CATALOG.len(), PassKind::COUNT);
        for kind in PassKind::iter() {
            assert_eq!(kind.info().kind, kind);
        }
    }

    #[test]
    fn test_tags_and_ids_are_unique() {
        let tags: HashSet<_> = PASS_CATALOG.iter().map(|info| info.tag).collect();
        let ids: HashSet<_> = PASS_CATALOG.iter().map(|info| info.id).collect();
        assert_eq!(tags.len(), PASS_CATALOG.len());
        assert_eq!(ids.len(), PASS_CATALOG.len());
    }

    #[test]
    fn test_lookup() {
        assert_eq!(PassKind::from_tag("sil-combine").ok(), Some(PassKind::PILCombine));
        assert_eq!(PassKind::from_id("SimplifyCFG"), Some(PassKind::SimplifyCFG));
        assert_eq!(PassKind::DeadFunctionElimination.to_string(), "sil-deadfuncelim");
        assert!(PassKind::LoadableByAddress.info().irgen);
        assert!(!PassKind::DCE.info().irgen);
        assert!(matches!(
            PassKind::from_tag("nope"),
            Err(Error::UnknownPass(tag)) if tag == "nope"
        ));
    }
}
