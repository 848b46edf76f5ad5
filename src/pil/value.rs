//! Values and operands of the instruction graph.
//!
//! A [`Value`] is either an instruction result, a block argument or an `undef`
//! placeholder. Every [`Operand`] is one `(user, value)` edge; the value keeps the
//! handles of all operands that reference it in its use list. Only
//! [`Function`](crate::pil::Function) mutates these records, which is what keeps
//! the two directions of the graph in sync.

use crate::pil::{BlockId, InstId, OperandId, OwnershipKind, PilType, ValueId};

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueDef {
    /// The `index`-th result of an instruction.
    Result {
        /// Defining instruction.
        inst: InstId,
        /// Result position.
        index: usize,
    },
    /// The `index`-th argument of a block.
    BlockArg {
        /// Owning block.
        block: BlockId,
        /// Argument position.
        index: usize,
    },
    /// A placeholder with no definition.
    Undef,
}

/// A typed SSA value.
#[derive(Debug, Clone)]
pub struct Value {
    pub(crate) ty: PilType,
    pub(crate) ownership: OwnershipKind,
    pub(crate) def: ValueDef,
    pub(crate) uses: Vec<OperandId>,
}

impl Value {
    pub(crate) fn new(ty: PilType, ownership: OwnershipKind, def: ValueDef) -> Self {
        Self {
            ty,
            ownership,
            def,
            uses: Vec::new(),
        }
    }

    /// The lowered type of the value.
    #[must_use]
    pub const fn ty(&self) -> &PilType {
        &self.ty
    }

    /// The ownership kind of the value.
    #[must_use]
    pub const fn ownership(&self) -> OwnershipKind {
        self.ownership
    }

    /// How the value is defined.
    #[must_use]
    pub const fn def(&self) -> ValueDef {
        self.def
    }

    /// The defining instruction, if the value is an instruction result.
    #[must_use]
    pub const fn defining_inst(&self) -> Option<InstId> {
        match self.def {
            ValueDef::Result { inst, .. } => Some(inst),
            _ => None,
        }
    }

    /// All operands currently using this value, in insertion order.
    #[must_use]
    pub fn uses(&self) -> &[OperandId] {
        &self.uses
    }

    /// Returns `true` if nothing uses this value.
    #[must_use]
    pub fn has_no_uses(&self) -> bool {
        self.uses.is_empty()
    }
}

/// One use edge: `user` reads `value` at operand position `index`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    pub(crate) user: InstId,
    pub(crate) value: ValueId,
    pub(crate) index: usize,
}

impl Operand {
    /// The instruction owning this operand.
    #[must_use]
    pub const fn user(&self) -> InstId {
        self.user
    }

    /// The value being used.
    #[must_use]
    pub const fn value(&self) -> ValueId {
        self.value
    }

    /// Position of the operand in the user's operand list.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}
