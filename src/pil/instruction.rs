//! Instruction kinds and instruction records.
//!
//! [`InstKind`] is a closed sum type over every instruction the optimizer knows
//! about. Properties that depend only on the kind (side effects, terminator status,
//! successor blocks, operand consumption) are answered by explicit match arms here
//! so every pass shares one classification.
//!
//! # Operand Layout
//!
//! | Kind | Operands | Results |
//! |------|----------|---------|
//! | `integer_literal`, `function_ref`, `alloc_stack` | none | 1 |
//! | `struct` | one per stored field | 1 |
//! | `struct_extract`, `unchecked_enum_data`, `copy_value`, `load` | source | 1 |
//! | `enum` | payload for `some`, none for `none` | 1 |
//! | `builtin` | two inputs | 1 |
//! | `store` | source, destination address | 0 |
//! | `apply`, `partial_apply` | callee, then arguments | 1 |
//! | `br` | block arguments for `dest` | 0 |
//! | `cond_br` | condition, true arguments, false arguments | 0 |
//! | `switch_enum`, `return`, `throw` | the scrutinee / returned / thrown value | 0 |
//!
//! The `some` destination of a `switch_enum` receives the payload as its only block
//! argument.

use std::fmt;

use strum::{Display, IntoStaticStr};

use crate::pil::{BlockId, ForeignErrorConvention, OperandId, ParameterConvention, ValueId};

/// A source position used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceLoc {
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
}

impl SourceLoc {
    /// Creates a source location.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A case of the optional enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EnumCase {
    /// `Optional.some(payload)`
    #[strum(serialize = "#Optional.some")]
    Some,
    /// `Optional.none`
    #[strum(serialize = "#Optional.none")]
    None,
}

/// Builtin operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BuiltinOp {
    /// Integer equality, produces `Int1`.
    #[strum(serialize = "cmp_eq")]
    CmpEq,
    /// Integer inequality, produces `Int1`.
    #[strum(serialize = "cmp_ne")]
    CmpNe,
    /// Wrapping addition.
    #[strum(serialize = "add")]
    Add,
    /// Wrapping subtraction.
    #[strum(serialize = "sub")]
    Sub,
    /// Branch-probability hint: `expect(value, expected)` evaluates to `value`.
    #[strum(serialize = "int_expect")]
    Expect,
}

/// Ownership qualifier of a `load`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LoadQualifier {
    /// Moves the value out of memory.
    #[strum(serialize = "take")]
    Take,
    /// Copies the value, leaving memory initialized.
    #[strum(serialize = "copy")]
    Copy,
    /// Loads a trivial value.
    #[strum(serialize = "trivial")]
    Trivial,
}

/// Ownership qualifier of a `store`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum StoreQualifier {
    /// Initializes uninitialized memory.
    #[strum(serialize = "init")]
    Init,
    /// Replaces (and destroys) the previous value.
    #[strum(serialize = "assign")]
    Assign,
    /// Stores a trivial value.
    #[strum(serialize = "trivial")]
    Trivial,
}

/// Side-effect classification of an instruction kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SideEffects {
    /// Pure value computation.
    None,
    /// Reads memory without modifying it.
    ReadsMemory,
    /// Releases (and possibly destroys) its operand.
    Releases,
    /// Writes memory or otherwise changes observable state.
    WritesMemory,
    /// Calls arbitrary code.
    Call,
    /// Debug information only.
    Debug,
    /// Transfers control.
    ControlFlow,
}

/// The closed set of instruction kinds.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum InstKind {
    /// An integer constant.
    IntegerLiteral {
        /// The constant, interpreted at the width of the result type.
        value: i128,
    },
    /// A reference to a function of the module by name.
    FunctionRef {
        /// Referenced function.
        name: String,
    },
    /// Builds a struct from its stored fields.
    Struct,
    /// Projects a stored field out of a struct value.
    StructExtract {
        /// Field position.
        field: usize,
    },
    /// Builds an optional.
    Enum {
        /// Which case.
        case: EnumCase,
    },
    /// Extracts the payload of an optional known to be `some`.
    UncheckedEnumData,
    /// A builtin operation.
    Builtin {
        /// Which builtin.
        op: BuiltinOp,
    },
    /// Allocates stack memory.
    AllocStack,
    /// Frees stack memory.
    DeallocStack,
    /// Reads from an address.
    Load {
        /// Ownership qualifier.
        qualifier: LoadQualifier,
    },
    /// Writes to an address.
    Store {
        /// Ownership qualifier.
        qualifier: StoreQualifier,
    },
    /// Converts a typed pointer into an address.
    PointerToAddress,
    /// +1 on a single reference-counted pointer.
    StrongRetain,
    /// -1 on a single reference-counted pointer.
    StrongRelease,
    /// +1 on an aggregate value.
    RetainValue,
    /// -1 on an aggregate value.
    ReleaseValue,
    /// Ownership-aware copy producing an owned value.
    CopyValue,
    /// Ownership-aware destruction of an owned value.
    DestroyValue,
    /// Destroys the value stored at an address.
    DestroyAddr,
    /// Debug information for a source variable.
    DebugValue {
        /// Source variable name.
        name: String,
    },
    /// A full call.
    Apply {
        /// Unlowered foreign error convention of the callee, if any.
        foreign_error: Option<ForeignErrorConvention>,
        /// The callee is known never to fail, error checks may be suppressed.
        does_not_throw: bool,
    },
    /// Builds a closure by capturing arguments.
    PartialApply {
        /// The closure context lives on the stack.
        on_stack: bool,
        /// Convention of each captured argument.
        captured: Vec<ParameterConvention>,
    },
    /// Converts a thin function into a thick one with an empty context.
    ThinToThickFunction,
    /// Converts a native error into its bridged (foreign) representation.
    NativeToBridgedError,
    /// Converts a bridged (foreign) error into a native error.
    BridgedToNativeError,
    /// Unconditional branch.
    #[strum(serialize = "br")]
    Branch {
        /// Target block.
        dest: BlockId,
    },
    /// Two-way branch on an `Int1` condition.
    #[strum(serialize = "cond_br")]
    CondBranch {
        /// Target when the condition is non-zero.
        true_dest: BlockId,
        /// Target when the condition is zero.
        false_dest: BlockId,
        /// How many operands after the condition belong to `true_dest`.
        true_args: usize,
    },
    /// Multi-way branch on an optional.
    SwitchEnum {
        /// Explicit case destinations.
        cases: Vec<(EnumCase, BlockId)>,
        /// Destination for cases not listed.
        default: Option<BlockId>,
    },
    /// Normal return.
    Return,
    /// Native throw through the function's error edge.
    Throw,
    /// Marks a point control never reaches.
    Unreachable,
}

impl InstKind {
    /// The textual mnemonic.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        self.into()
    }

    /// Returns `true` for block terminators.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Self::Branch { .. }
                | Self::CondBranch { .. }
                | Self::SwitchEnum { .. }
                | Self::Return
                | Self::Throw
                | Self::Unreachable
        )
    }

    /// Successor blocks of a terminator in operand order. Empty for non-terminators.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Self::Branch { dest } => vec![*dest],
            Self::CondBranch {
                true_dest,
                false_dest,
                ..
            } => vec![*true_dest, *false_dest],
            Self::SwitchEnum { cases, default } => cases
                .iter()
                .map(|(_, dest)| *dest)
                .chain(default.iter().copied())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Rewrites every successor equal to `from` into `to`.
    pub fn replace_successor(&mut self, from: BlockId, to: BlockId) {
        let swap = |block: &mut BlockId| {
            if *block == from {
                *block = to;
            }
        };
        match self {
            Self::Branch { dest } => swap(dest),
            Self::CondBranch {
                true_dest,
                false_dest,
                ..
            } => {
                swap(true_dest);
                swap(false_dest);
            }
            Self::SwitchEnum { cases, default } => {
                cases.iter_mut().for_each(|(_, dest)| swap(dest));
                if let Some(dest) = default {
                    swap(dest);
                }
            }
            _ => {}
        }
    }

    /// Side-effect classification used by dead-code elimination and code motion.
    #[must_use]
    pub const fn side_effects(&self) -> SideEffects {
        match self {
            Self::IntegerLiteral { .. }
            | Self::FunctionRef { .. }
            | Self::Struct
            | Self::StructExtract { .. }
            | Self::Enum { .. }
            | Self::UncheckedEnumData
            | Self::Builtin { .. }
            | Self::PointerToAddress
            | Self::ThinToThickFunction
            | Self::NativeToBridgedError
            | Self::BridgedToNativeError => SideEffects::None,
            Self::Load {
                qualifier: LoadQualifier::Copy | LoadQualifier::Trivial,
            } => SideEffects::ReadsMemory,
            Self::StrongRelease | Self::ReleaseValue | Self::DestroyValue => {
                SideEffects::Releases
            }
            Self::Load {
                qualifier: LoadQualifier::Take,
            }
            | Self::AllocStack
            | Self::DeallocStack
            | Self::Store { .. }
            | Self::StrongRetain
            | Self::RetainValue
            | Self::CopyValue
            | Self::DestroyAddr => SideEffects::WritesMemory,
            Self::Apply { .. } | Self::PartialApply { .. } => SideEffects::Call,
            Self::DebugValue { .. } => SideEffects::Debug,
            Self::Branch { .. }
            | Self::CondBranch { .. }
            | Self::SwitchEnum { .. }
            | Self::Return
            | Self::Throw
            | Self::Unreachable => SideEffects::ControlFlow,
        }
    }

    /// Returns `true` for the reference-count adjusting family.
    #[must_use]
    pub const fn is_ref_count_inst(&self) -> bool {
        matches!(
            self,
            Self::StrongRetain
                | Self::StrongRelease
                | Self::RetainValue
                | Self::ReleaseValue
                | Self::CopyValue
                | Self::DestroyValue
        )
    }

    /// Returns `true` for the decrement family.
    #[must_use]
    pub const fn is_release(&self) -> bool {
        matches!(
            self,
            Self::StrongRelease | Self::ReleaseValue | Self::DestroyValue
        )
    }

    /// Returns `true` for the increment family.
    #[must_use]
    pub const fn is_retain(&self) -> bool {
        matches!(self, Self::StrongRetain | Self::RetainValue | Self::CopyValue)
    }

    /// Returns `true` if the operand at `index` is consumed (its ownership ends here).
    #[must_use]
    pub fn consumes_operand(&self, index: usize) -> bool {
        match self {
            Self::StrongRelease | Self::ReleaseValue | Self::DestroyValue => index == 0,
            Self::Store {
                qualifier: StoreQualifier::Init | StoreQualifier::Assign,
            } => index == 0,
            Self::Return | Self::Throw => index == 0,
            Self::Struct | Self::Enum { .. } | Self::NativeToBridgedError => true,
            Self::Branch { .. } => true,
            Self::CondBranch { .. } => index > 0,
            Self::PartialApply { captured, .. } => index > 0
                && captured
                    .get(index - 1)
                    .is_some_and(|convention| convention.is_consumed()),
            _ => false,
        }
    }
}

/// One instruction of a function.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub(crate) kind: InstKind,
    pub(crate) operands: Vec<OperandId>,
    pub(crate) results: Vec<ValueId>,
    pub(crate) block: Option<BlockId>,
    pub(crate) loc: Option<SourceLoc>,
}

impl Instruction {
    /// The kind of the instruction.
    #[must_use]
    pub const fn kind(&self) -> &InstKind {
        &self.kind
    }

    /// Operand edges in positional order.
    #[must_use]
    pub fn operands(&self) -> &[OperandId] {
        &self.operands
    }

    /// Result values in positional order.
    #[must_use]
    pub fn results(&self) -> &[ValueId] {
        &self.results
    }

    /// The block containing the instruction.
    #[must_use]
    pub const fn block(&self) -> Option<BlockId> {
        self.block
    }

    /// The source location used for diagnostics.
    #[must_use]
    pub const fn loc(&self) -> Option<SourceLoc> {
        self.loc
    }
}
