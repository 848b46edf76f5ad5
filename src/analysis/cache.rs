//! Per-function cache of analysis results.
//!
//! Passes declare which parts of a function they may have changed through
//! [`InvalidationKind`]; the pass manager calls [`AnalysisCache::invalidate`] after
//! every mutating pass and the next consumer recomputes lazily.

use bitflags::bitflags;
use strum::{Display, EnumIter};

use crate::{analysis::DominanceInfo, pil::Function};

bitflags! {
    /// What a transformation may have changed in a function.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InvalidationKind: u8 {
        /// Instructions were inserted, erased or rewritten.
        const INSTRUCTIONS = 0x01;
        /// Call sites were added or removed.
        const CALLS = 0x02;
        /// Terminators or blocks changed.
        const BRANCHES = 0x04;
        /// Everything.
        const EVERYTHING = Self::INSTRUCTIONS.bits() | Self::CALLS.bits() | Self::BRANCHES.bits();
    }
}

/// Analyses the cache knows how to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AnalysisKind {
    /// Dominator tree.
    #[strum(serialize = "dominance")]
    Dominance,
    /// Post-dominator tree.
    #[strum(serialize = "post-dominance")]
    PostDominance,
}

impl AnalysisKind {
    /// The invalidation kinds this analysis depends on.
    #[must_use]
    pub const fn sensitivity(self) -> InvalidationKind {
        match self {
            Self::Dominance | Self::PostDominance => InvalidationKind::BRANCHES,
        }
    }
}

/// Lazily computed analyses of one function.
#[derive(Debug, Clone, Default)]
pub struct AnalysisCache {
    dominance: Option<DominanceInfo>,
    post_dominance: Option<DominanceInfo>,
    computations: usize,
}

impl AnalysisCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dominator tree, computing it if stale.
    pub fn dominance(&mut self, func: &Function) -> &DominanceInfo {
        if self.dominance.is_none() {
            log::trace!("computing dominance for {}", func.name());
            self.computations += 1;
        }
        self.dominance
            .get_or_insert_with(|| DominanceInfo::compute(func))
    }

    /// Returns the post-dominator tree, computing it if stale.
    pub fn post_dominance(&mut self, func: &Function) -> &DominanceInfo {
        if self.post_dominance.is_none() {
            log::trace!("computing post-dominance for {}", func.name());
            self.computations += 1;
        }
        self.post_dominance
            .get_or_insert_with(|| DominanceInfo::compute_post(func))
    }

    /// The cached dominator tree, if it is still valid.
    #[must_use]
    pub const fn cached_dominance(&self) -> Option<&DominanceInfo> {
        self.dominance.as_ref()
    }

    /// Makes sure `kind` is computed.
    pub fn ensure(&mut self, kind: AnalysisKind, func: &Function) {
        match kind {
            AnalysisKind::Dominance => {
                self.dominance(func);
            }
            AnalysisKind::PostDominance => {
                self.post_dominance(func);
            }
        }
    }

    /// Returns `true` if `kind` is currently cached.
    #[must_use]
    pub const fn is_valid(&self, kind: AnalysisKind) -> bool {
        match kind {
            AnalysisKind::Dominance => self.dominance.is_some(),
            AnalysisKind::PostDominance => self.post_dominance.is_some(),
        }
    }

    /// Drops every cached analysis sensitive to `changes`.
    pub fn invalidate(&mut self, changes: InvalidationKind) {
        if changes.intersects(AnalysisKind::Dominance.sensitivity()) {
            self.dominance = None;
        }
        if changes.intersects(AnalysisKind::PostDominance.sensitivity()) {
            self.post_dominance = None;
        }
    }

    /// How many analyses this cache has computed so far.
    #[must_use]
    pub const fn computations(&self) -> usize {
        self.computations
    }
}
