//! The mid-level IR: typed SSA functions with explicit use lists.
//!
//! This module holds the data model every pass operates on:
//!
//! - [`Function`] - blocks, instructions and values stored in generation-checked arenas
//! - [`InstKind`] - the closed set of instruction kinds and their kind-indexed properties
//! - [`PilType`] / [`OwnershipKind`] - lowered types and the per-value ownership model
//! - [`PilBuilder`] - instruction construction at an insertion point
//! - [`Module`] - the functions of one compilation unit
//! - [`eval`] - a reference evaluator used to observe transformed code
//!
//! # Handles
//!
//! Entities are referred to by small `Copy` handles ([`ValueId`], [`InstId`],
//! [`BlockId`], [`OperandId`]). A handle stays valid until its entity is erased;
//! using it afterwards panics instead of silently reading a recycled slot.
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`. A [`Function`] is edited by at
//! most one thread at a time; the pass manager hands out `&mut Function` per worker.

mod block;
mod builder;
mod convention;
pub(crate) mod entity;
pub mod eval;
mod function;
mod instruction;
mod linkage;
mod module;
mod ownership;
mod printer;
mod types;
mod value;
mod verify;

pub use block::{Block, Section};
pub use builder::{PilBuilder, SavedInsertionPoint};
pub use convention::{ForeignErrorConvention, ForeignErrorKind};
pub use function::{DeclAttribute, Declaration, Function, InsertPoint};
pub use instruction::{
    BuiltinOp, EnumCase, InstKind, Instruction, LoadQualifier, SideEffects, SourceLoc,
    StoreQualifier,
};
pub use linkage::{FormalLinkage, PilLinkage};
pub use module::Module;
pub use ownership::{OwnershipKind, ParameterConvention};
pub use types::{PilType, PointerKind, StructLayout};
pub use value::{Operand, Value, ValueDef};

entity_id!(
    /// Handle of a [`Value`].
    ValueId,
    "%"
);
entity_id!(
    /// Handle of an [`Instruction`].
    InstId,
    "inst"
);
entity_id!(
    /// Handle of a [`Block`].
    BlockId,
    "bb"
);
entity_id!(
    /// Handle of an [`Operand`].
    OperandId,
    "op"
);
