//! Cheap constant knowledge about integer values.

use crate::pil::{BuiltinOp, Function, InstKind, ValueDef, ValueId};

/// Whether a value is known to be zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsZeroKind {
    /// Always zero.
    Zero,
    /// Never zero.
    NotZero,
    /// Not known.
    Unknown,
}

/// Classifies `value` as zero, non-zero or unknown.
///
/// Looks through single-field structs, `struct_extract` of a `struct` and the
/// builtin `expect`.
#[must_use]
pub fn is_zero_value(func: &Function, value: ValueId) -> IsZeroKind {
    let mut current = value;
    // Each step strictly moves to an operand of the current definition.
    loop {
        let ValueDef::Result { inst, .. } = func.value(current).def() else {
            return IsZeroKind::Unknown;
        };
        match func.kind(inst) {
            InstKind::IntegerLiteral { value } => {
                return if *value == 0 {
                    IsZeroKind::Zero
                } else {
                    IsZeroKind::NotZero
                };
            }
            InstKind::Struct if func.inst(inst).operands().len() == 1 => {
                current = func.operand_value(inst, 0);
            }
            InstKind::StructExtract { field } => {
                let aggregate = func.operand_value(inst, 0);
                match func.value(aggregate).defining_inst() {
                    Some(def) if matches!(func.kind(def), InstKind::Struct) => {
                        current = func.operand_value(def, *field);
                    }
                    _ => return IsZeroKind::Unknown,
                }
            }
            InstKind::Builtin {
                op: BuiltinOp::Expect,
            } => current = func.operand_value(inst, 0),
            _ => return IsZeroKind::Unknown,
        }
    }
}

/// The constant integer `value` evaluates to, looking through the same wrappers as
/// [`is_zero_value`].
#[must_use]
pub fn constant_int_value(func: &Function, value: ValueId) -> Option<i128> {
    let mut current = value;
    loop {
        let inst = func.value(current).defining_inst()?;
        match func.kind(inst) {
            InstKind::IntegerLiteral { value } => return Some(*value),
            InstKind::Struct if func.inst(inst).operands().len() == 1 => {
                current = func.operand_value(inst, 0);
            }
            InstKind::Builtin {
                op: BuiltinOp::Expect,
            } => current = func.operand_value(inst, 0),
            _ => return None,
        }
    }
}
