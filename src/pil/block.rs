//! Basic blocks.

use crate::pil::{InstId, ValueId};

/// Layout section of a block.
///
/// Postmatter blocks hold cold code (error paths) and are always laid out after
/// every main-section block of the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Section {
    /// Regular, hot-path code.
    #[default]
    Main,
    /// Cold code placed at the end of the function.
    Postmatter,
}

/// A basic block: arguments followed by a straight-line list of instructions,
/// the last of which is the only terminator.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub(crate) args: Vec<ValueId>,
    pub(crate) insts: Vec<InstId>,
    pub(crate) section: Section,
}

impl Block {
    pub(crate) fn new(section: Section) -> Self {
        Self {
            args: Vec::new(),
            insts: Vec::new(),
            section,
        }
    }

    /// Block arguments (phi-equivalent values).
    #[must_use]
    pub fn args(&self) -> &[ValueId] {
        &self.args
    }

    /// Instructions in execution order.
    #[must_use]
    pub fn insts(&self) -> &[InstId] {
        &self.insts
    }

    /// The layout section of the block.
    #[must_use]
    pub const fn section(&self) -> Section {
        self.section
    }

    /// The last instruction, which is the terminator in a well-formed block.
    #[must_use]
    pub fn last_inst(&self) -> Option<InstId> {
        self.insts.last().copied()
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    pub(crate) fn position_of(&self, inst: InstId) -> Option<usize> {
        self.insts.iter().position(|&candidate| candidate == inst)
    }
}
