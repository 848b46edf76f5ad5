//! Foreign error conventions attached to call sites.
//!
//! A foreign (non-native) callee reports failure through its return value or
//! through an error out-parameter instead of the native `throw` edge. The
//! [`ForeignErrorConvention`] describes which contract a particular call follows;
//! it is fixed when the call is emitted and only read by the foreign error
//! lowering.

use strum::{Display, EnumIter, EnumString};

use crate::pil::PilType;

/// How a foreign callee signals failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
pub enum ForeignErrorKind {
    /// A zero result means failure; the result carries no other information.
    #[strum(serialize = "zero_result")]
    ZeroResult,
    /// A non-zero result means failure; the result carries no other information.
    #[strum(serialize = "non_zero_result")]
    NonZeroResult,
    /// A zero result means failure; a non-zero result is the real return value.
    #[strum(serialize = "zero_preserved_result")]
    ZeroPreservedResult,
    /// A `nil` result means failure; otherwise the payload is the return value.
    #[strum(serialize = "nil_result")]
    NilResult,
    /// Failure is signalled purely by a non-nil error in the out-parameter.
    #[strum(serialize = "non_nil_error")]
    NonNilError,
}

impl ForeignErrorKind {
    /// Returns `true` if the convention checks the direct result against zero.
    #[must_use]
    pub const fn is_zero_check(self) -> bool {
        matches!(
            self,
            Self::ZeroResult | Self::NonZeroResult | Self::ZeroPreservedResult
        )
    }

    /// Returns `true` if the sentinel result is dropped from the formal results.
    #[must_use]
    pub const fn strips_result(self) -> bool {
        matches!(self, Self::ZeroResult | Self::NonZeroResult)
    }
}

/// The failure contract of one foreign call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ForeignErrorConvention {
    /// Which failure signal the callee uses.
    pub kind: ForeignErrorKind,
    /// Position of the error out-parameter among the call arguments (callee excluded).
    pub error_parameter_index: usize,
    /// Type of the error out-parameter, a pointer (or optional pointer) to an
    /// optional bridged error.
    pub error_parameter_type: PilType,
    /// The bridged (foreign) result type of the call.
    pub result_type: PilType,
}

impl ForeignErrorConvention {
    /// Creates a convention.
    ///
    /// # Arguments
    ///
    /// * `kind` - Failure signal used by the callee
    /// * `error_parameter_index` - Index of the error out-parameter
    /// * `error_parameter_type` - Type of the error out-parameter
    /// * `result_type` - Bridged result type
    #[must_use]
    pub fn new(
        kind: ForeignErrorKind,
        error_parameter_index: usize,
        error_parameter_type: PilType,
        result_type: PilType,
    ) -> Self {
        Self {
            kind,
            error_parameter_index,
            error_parameter_type,
            result_type,
        }
    }
}
