//! Named pipelines and the per-invocation compilation plan.
//!
//! A [`PassPipelinePlan`] is one phase of compilation: an ordered list of
//! [`PassStage`]s, each holding passes and named groups of passes. Stages can
//! iterate to a fixpoint and can stop the invocation when an error diagnostic was
//! reported. A [`CompilationPlan`] is the ordered list of pipelines one invocation
//! runs, computed purely from [`PilOptions`].
//!
//! # Pipelines
//!
//! | Pipeline | Runs when |
//! |----------|-----------|
//! | `Diagnostic` | always, first |
//! | `OwnershipEliminator` | optimizing with ownership lowering |
//! | `PILOptPrepare`, `Performance` | optimizing |
//! | `Onone` | not optimizing |
//! | `SerializePIL` | emitting a module interface |
//! | `InstCount` | collecting statistics |
//! | `Lowering`, `IRGenPrepare` | always, last |
//!
//! # Examples
//!
//! ```rust
//! use pilopt::options::{OptimizationMode, PilOptions};
//! use pilopt::passmgr::{CompilationPlan, PipelineKind};
//!
//! let plan = CompilationPlan::from_options(&PilOptions::new().with_opt_mode(OptimizationMode::ForSpeed))?;
//! assert_eq!(plan.pipelines()[0].kind(), Some(PipelineKind::Diagnostic));
//! assert!(plan.kinds().any(|kind| kind == PipelineKind::Performance));
//! # Ok::<(), pilopt::Error>(())
//! ```

use strum::{Display, EnumIter};

use crate::{options::PilOptions, passmgr::PassKind, Result};

/// The named pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum PipelineKind {
    /// Guaranteed passes.
    Diagnostic,
    /// Utility pipeline running only the ownership-model eliminator.
    OwnershipEliminator,
    /// Passes preparing for `-O`.
    PILOptPrepare,
    /// Passes run at `-O`.
    Performance,
    /// Passes run at `-Onone`.
    Onone,
    /// Utility pipeline running only the instruction counter.
    InstCount,
    /// Address lowering.
    Lowering,
    /// Passes run during code generation.
    IRGenPrepare,
    /// Utility pipeline serializing the module.
    SerializePIL,
}

impl PipelineKind {
    /// Human description of the pipeline.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Diagnostic => "Guaranteed Passes",
            Self::OwnershipEliminator => "Utility pass to just run the ownership eliminator pass",
            Self::PILOptPrepare => "Passes that prepare PIL for -O",
            Self::Performance => "Passes run at -O",
            Self::Onone => "Passes run at -Onone",
            Self::InstCount => "Utility pipeline to just run the inst count pass",
            Self::Lowering => "PIL Address Lowering",
            Self::IRGenPrepare => "Pipeline to run during IRGen",
            Self::SerializePIL => "Utility pipeline that just runs SerializePILPass",
        }
    }
}

/// A named group of passes scheduled as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassGroup {
    /// Group name, e.g. `"SimplifyCFG+PILCombine"`.
    pub name: &'static str,
    /// Passes of the group in order.
    pub passes: Vec<PassKind>,
}

/// An entry of a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageItem {
    /// A single pass.
    Pass(PassKind),
    /// A group of passes.
    Group(PassGroup),
}

/// An ordered list of passes run together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassStage {
    /// Stage name, used in logs.
    pub name: String,
    /// Passes and groups in order.
    pub items: Vec<StageItem>,
    /// Repeat the stage until no pass changes anything.
    pub fixpoint: bool,
    /// Stop the invocation after this stage if an error was diagnosed.
    pub stop_on_error: bool,
}

impl PassStage {
    /// Creates a stage running once.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            fixpoint: false,
            stop_on_error: false,
        }
    }

    /// Adds passes.
    #[must_use]
    pub fn passes(mut self, passes: &[PassKind]) -> Self {
        self.items.extend(passes.iter().copied().map(StageItem::Pass));
        self
    }

    /// Adds a named group.
    #[must_use]
    pub fn group(mut self, name: &'static str, passes: &[PassKind]) -> Self {
        self.items.push(StageItem::Group(PassGroup {
            name,
            passes: passes.to_vec(),
        }));
        self
    }

    /// Repeats the stage to a fixpoint.
    #[must_use]
    pub fn iterate_to_fixpoint(mut self) -> Self {
        self.fixpoint = true;
        self
    }

    /// Stops the invocation after this stage on error diagnostics.
    #[must_use]
    pub fn stop_on_error(mut self) -> Self {
        self.stop_on_error = true;
        self
    }

    /// Every pass of the stage in execution order, groups flattened.
    pub fn pass_kinds(&self) -> impl Iterator<Item = PassKind> + '_ {
        self.items.iter().flat_map(|item| match item {
            StageItem::Pass(kind) => std::slice::from_ref(kind).iter().copied(),
            StageItem::Group(group) => group.passes.iter().copied(),
        })
    }

    fn remove(&mut self, disabled: &[PassKind]) {
        self.items.retain_mut(|item| match item {
            StageItem::Pass(kind) => !disabled.contains(kind),
            StageItem::Group(group) => {
                group.passes.retain(|kind| !disabled.contains(kind));
                !group.passes.is_empty()
            }
        });
    }
}

const SIMPLIFY_CFG_PIL_COMBINE: &[PassKind] = &[
    PassKind::SimplifyCFG,
    PassKind::ConditionForwarding,
    PassKind::PILCombine,
    PassKind::SimplifyCFG,
];

/// One pipeline: a named, ordered list of stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassPipelinePlan {
    kind: Option<PipelineKind>,
    name: String,
    stages: Vec<PassStage>,
}

impl PassPipelinePlan {
    fn new(kind: PipelineKind, stages: Vec<PassStage>) -> Self {
        Self {
            kind: Some(kind),
            name: kind.to_string(),
            stages,
        }
    }

    /// Builds the named pipeline for `options`.
    #[must_use]
    pub fn build(kind: PipelineKind, options: &PilOptions) -> Self {
        match kind {
            PipelineKind::Diagnostic => Self::diagnostic(),
            PipelineKind::OwnershipEliminator => Self::new(
                kind,
                vec![PassStage::new("Ownership Model Eliminator")
                    .passes(&[PassKind::OwnershipModelEliminator])],
            ),
            PipelineKind::PILOptPrepare => Self::new(
                kind,
                vec![PassStage::new("PILOpt Prepare Passes")
                    .passes(&[PassKind::AccessMarkerElimination])],
            ),
            PipelineKind::Performance => Self::performance(),
            PipelineKind::Onone => Self::onone(options),
            PipelineKind::InstCount => Self::new(
                kind,
                vec![PassStage::new("Inst Count").passes(&[PassKind::InstCount])],
            ),
            PipelineKind::Lowering => Self::new(
                kind,
                vec![PassStage::new("Address Lowering")
                    .passes(&[PassKind::IRGenPrepare, PassKind::AddressLowering])],
            ),
            PipelineKind::IRGenPrepare => Self::new(
                kind,
                vec![PassStage::new("IRGen Passes")
                    .passes(&[PassKind::AllocStackHoisting, PassKind::LoadableByAddress])],
            ),
            PipelineKind::SerializePIL => Self::new(
                kind,
                vec![PassStage::new("Serialize PIL").passes(&[PassKind::SerializePILPass])],
            ),
        }
    }

    fn diagnostic() -> Self {
        Self::new(
            PipelineKind::Diagnostic,
            vec![
                PassStage::new("Foreign Error Lowering").passes(&[PassKind::ForeignErrorLowering]),
                PassStage::new("Guaranteed Passes")
                    .passes(&[
                        PassKind::PILGenCleanup,
                        PassKind::DiagnoseInvalidEscapingCaptures,
                        PassKind::DiagnoseStaticExclusivity,
                        PassKind::CapturePromotion,
                        PassKind::AllocBoxToStack,
                        PassKind::NoReturnFolding,
                        PassKind::DefiniteInitialization,
                        PassKind::ClosureLifetimeFixup,
                        PassKind::MandatoryInlining,
                        PassKind::MandatoryPILLinker,
                        PassKind::PredictableMemoryAccessOptimizations,
                        PassKind::DiagnosticConstantPropagation,
                        PassKind::GuaranteedARCOpts,
                        PassKind::DiagnoseUnreachable,
                        PassKind::DiagnoseInfiniteRecursion,
                        PassKind::YieldOnceCheck,
                        PassKind::EmitDFDiagnostics,
                    ])
                    .stop_on_error(),
            ],
        )
    }

    fn performance() -> Self {
        Self::new(
            PipelineKind::Performance,
            vec![
                PassStage::new("EarlyModulePasses").passes(&[
                    PassKind::PerformancePILLinker,
                    PassKind::DeadFunctionElimination,
                ]),
                PassStage::new("HighLevel,Function+EarlyLoopOpt")
                    .group("SimplifyCFG+PILCombine", SIMPLIFY_CFG_PIL_COMBINE)
                    .passes(&[
                        PassKind::SROA,
                        PassKind::Mem2Reg,
                        PassKind::PerformanceConstantPropagation,
                        PassKind::DCE,
                        PassKind::CSE,
                    ])
                    .group("SimplifyCFG+PILCombine", SIMPLIFY_CFG_PIL_COMBINE)
                    .passes(&[
                        PassKind::EarlyCodeMotion,
                        PassKind::ReleaseHoisting,
                        PassKind::ARCSequenceOpts,
                        PassKind::RetainSinking,
                    ])
                    .iterate_to_fixpoint(),
                PassStage::new("MidModulePasses").passes(&[
                    PassKind::GlobalPropertyOpt,
                    PassKind::LetPropertiesOpt,
                    PassKind::DeadFunctionElimination,
                ]),
                PassStage::new("LowLevel,Function")
                    .group("SimplifyCFG+PILCombine", SIMPLIFY_CFG_PIL_COMBINE)
                    .passes(&[
                        PassKind::DCE,
                        PassKind::CSE,
                        PassKind::LateCodeMotion,
                        PassKind::ARCSequenceOpts,
                    ])
                    .group("SimplifyCFG+PILCombine", SIMPLIFY_CFG_PIL_COMBINE)
                    .iterate_to_fixpoint(),
                PassStage::new("LateModulePasses").passes(&[PassKind::DeadFunctionElimination]),
            ],
        )
    }

    fn onone(options: &PilOptions) -> Self {
        let mut prepare = vec![PassKind::UsePrespecialized];
        if options.enable_ownership_lowering {
            prepare.insert(0, PassKind::OwnershipModelEliminator);
        }
        Self::new(
            PipelineKind::Onone,
            vec![
                PassStage::new("Mandatory Combines").passes(&[PassKind::MandatoryCombine]),
                PassStage::new("Onone Prepare Passes").passes(&prepare),
                PassStage::new("Rest of Onone").passes(&[PassKind::PILDebugInfoGenerator]),
            ],
        )
    }

    /// Builds a single-stage custom pipeline from command-line tags.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnknownPass`] for the first unknown tag.
    pub fn from_tags<S: AsRef<str>>(tags: &[S]) -> Result<Self> {
        let passes = tags
            .iter()
            .map(|tag| PassKind::from_tag(tag.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            kind: None,
            name: "Custom".to_string(),
            stages: vec![PassStage::new("Custom Passes").passes(&passes)],
        })
    }

    /// The named pipeline this plan was built from, `None` for custom plans.
    #[must_use]
    pub const fn kind(&self) -> Option<PipelineKind> {
        self.kind
    }

    /// Name used in logs and reports.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages in order.
    #[must_use]
    pub fn stages(&self) -> &[PassStage] {
        &self.stages
    }

    /// Every pass of the pipeline in order.
    pub fn pass_kinds(&self) -> impl Iterator<Item = PassKind> + '_ {
        self.stages.iter().flat_map(PassStage::pass_kinds)
    }

    /// Removes `disabled` passes, dropping stages left empty.
    pub fn remove_passes(&mut self, disabled: &[PassKind]) {
        for stage in &mut self.stages {
            stage.remove(disabled);
        }
        self.stages.retain(|stage| !stage.items.is_empty());
    }
}

/// The ordered pipelines of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompilationPlan {
    pipelines: Vec<PassPipelinePlan>,
}

impl CompilationPlan {
    /// Computes the plan for `options`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`PilOptions::validate`].
    pub fn from_options(options: &PilOptions) -> Result<Self> {
        options.validate()?;

        let mut pipelines = Vec::new();
        if let Some(tags) = &options.custom_pass_list {
            pipelines.push(PassPipelinePlan::from_tags(tags.as_slice())?);
        } else {
            let mut kinds = vec![PipelineKind::Diagnostic];
            if !options.diagnostics_only {
                if options.is_optimizing() {
                    if options.enable_ownership_lowering {
                        kinds.push(PipelineKind::OwnershipEliminator);
                    }
                    kinds.push(PipelineKind::PILOptPrepare);
                    kinds.push(PipelineKind::Performance);
                } else {
                    kinds.push(PipelineKind::Onone);
                }
                if options.emit_module_interface {
                    kinds.push(PipelineKind::SerializePIL);
                }
                if options.collect_statistics {
                    kinds.push(PipelineKind::InstCount);
                }
                kinds.push(PipelineKind::Lowering);
                kinds.push(PipelineKind::IRGenPrepare);
            }
            pipelines.extend(kinds.into_iter().map(|kind| PassPipelinePlan::build(kind, options)));
        }

        let disabled = options
            .disabled_passes
            .iter()
            .map(|tag| PassKind::from_tag(tag))
            .collect::<Result<Vec<_>>>()?;
        if !disabled.is_empty() {
            for pipeline in &mut pipelines {
                pipeline.remove_passes(&disabled);
            }
        }

        Ok(Self { pipelines })
    }

    /// Creates a plan from explicit pipelines.
    #[must_use]
    pub fn from_pipelines(pipelines: Vec<PassPipelinePlan>) -> Self {
        Self { pipelines }
    }

    /// Pipelines in execution order.
    #[must_use]
    pub fn pipelines(&self) -> &[PassPipelinePlan] {
        &self.pipelines
    }

    /// Kinds of the named pipelines in order.
    pub fn kinds(&self) -> impl Iterator<Item = PipelineKind> + '_ {
        self.pipelines.iter().filter_map(PassPipelinePlan::kind)
    }

    /// Every pass of the plan in order.
    pub fn pass_kinds(&self) -> impl Iterator<Item = PassKind> + '_ {
        self.pipelines.iter().flat_map(PassPipelinePlan::pass_kinds)
    }
}
