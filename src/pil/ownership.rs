//! Ownership and reference-count model.
//!
//! Every value carries an [`OwnershipKind`] that states who is responsible for its
//! reference count:
//!
//! - **Owned**: the holder must consume the value exactly once on every path
//!   (release it, destroy it, or forward it into a consuming instruction)
//! - **Guaranteed**: the value is kept alive by someone else and must not be released
//! - **Unowned**: an unmanaged reference, no obligation either way
//! - **Trivial**: the type needs no reference counting at all
//! - **None**: ownership has been lowered away (after the ownership eliminator) or the
//!   value is not a real object
//!
//! Captured arguments of closures have a [`ParameterConvention`] which decides what
//! releasing the closure implies for each capture.

use strum::{Display, EnumIter};

use crate::pil::PilType;

/// Per-value ownership discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum OwnershipKind {
    /// No ownership information (lowered or non-object value).
    #[strum(serialize = "none")]
    None,
    /// The value must be consumed exactly once.
    #[strum(serialize = "owned")]
    Owned,
    /// The value is borrowed and must not be consumed.
    #[strum(serialize = "guaranteed")]
    Guaranteed,
    /// An unmanaged reference.
    #[strum(serialize = "unowned")]
    Unowned,
    /// The value's type is trivial.
    #[strum(serialize = "trivial")]
    Trivial,
}

impl OwnershipKind {
    /// The natural ownership kind of a freshly produced value of type `ty`.
    #[must_use]
    pub fn for_type(ty: &PilType, owned: bool) -> Self {
        if ty.is_trivial() {
            Self::Trivial
        } else if owned {
            Self::Owned
        } else {
            Self::Guaranteed
        }
    }

    /// Merges two ownership kinds at a control-flow join.
    ///
    /// Trivial and None values merge with anything; two different non-trivial kinds
    /// cannot be merged and yield `None`.
    #[must_use]
    pub fn merge(self, other: Self) -> Option<Self> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Self::None | Self::Trivial, b) => Some(b),
            (a, Self::None | Self::Trivial) => Some(a),
            _ => None,
        }
    }

    /// Returns `true` if values of this kind must be consumed exactly once.
    #[must_use]
    pub const fn requires_consume(self) -> bool {
        matches!(self, Self::Owned)
    }

    /// Returns `true` if a consuming use of such a value is allowed.
    #[must_use]
    pub const fn may_be_consumed(self) -> bool {
        matches!(self, Self::Owned | Self::None | Self::Trivial)
    }
}

/// Calling convention of a parameter, used for partial-apply captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum ParameterConvention {
    /// Passed at +1, consumed by the callee.
    #[strum(serialize = "@owned")]
    DirectOwned,
    /// Passed at +0, borrowed for the call.
    #[strum(serialize = "@guaranteed")]
    DirectGuaranteed,
    /// Unmanaged.
    #[strum(serialize = "@unowned")]
    DirectUnowned,
    /// Indirect, the callee takes ownership of the pointee.
    #[strum(serialize = "@in")]
    IndirectIn,
    /// Indirect, borrowed pointee.
    #[strum(serialize = "@in_guaranteed")]
    IndirectInGuaranteed,
    /// Indirect, mutable access.
    #[strum(serialize = "@inout")]
    IndirectInout,
}

impl ParameterConvention {
    /// Returns `true` if the argument is consumed when the closure is destroyed.
    #[must_use]
    pub const fn is_consumed(self) -> bool {
        matches!(self, Self::DirectOwned | Self::IndirectIn)
    }

    /// Returns `true` for address-passed conventions.
    #[must_use]
    pub const fn is_indirect(self) -> bool {
        matches!(
            self,
            Self::IndirectIn | Self::IndirectInGuaranteed | Self::IndirectInout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_merge_is_symmetric() {
        for a in OwnershipKind::iter() {
            for b in OwnershipKind::iter() {
                assert_eq!(a.merge(b), b.merge(a), "{a} / {b}");
            }
        }
    }

    #[test]
    fn test_merge_conflict() {
        assert_eq!(
            OwnershipKind::Owned.merge(OwnershipKind::Guaranteed),
            None
        );
        assert_eq!(
            OwnershipKind::Trivial.merge(OwnershipKind::Owned),
            Some(OwnershipKind::Owned)
        );
    }

    #[test]
    fn test_for_type() {
        assert_eq!(
            OwnershipKind::for_type(&PilType::Int(64), true),
            OwnershipKind::Trivial
        );
        assert_eq!(
            OwnershipKind::for_type(&PilType::NativeError, true),
            OwnershipKind::Owned
        );
        assert_eq!(
            OwnershipKind::for_type(&PilType::NativeError, false),
            OwnershipKind::Guaranteed
        );
    }

    #[test]
    fn test_conventions() {
        assert!(ParameterConvention::DirectOwned.is_consumed());
        assert!(!ParameterConvention::DirectGuaranteed.is_consumed());
        assert!(ParameterConvention::IndirectIn.is_indirect());
        assert_eq!(ParameterConvention::IndirectInout.to_string(), "@inout");
    }
}
