//! Symbol linkage of functions.
//!
//! Declarations carry a [`FormalLinkage`] (how widely the source entity is visible
//! and whether a unique defining file is known). Functions carry a [`PilLinkage`]
//! derived from it, which also distinguishes definitions from external
//! declarations.

use strum::{Display, EnumIter};

/// Visibility and uniqueness of a source declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FormalLinkage {
    /// Visible across modules, with a unique defining file.
    PublicUnique,
    /// Visible across modules, without a unique defining file.
    PublicNonUnique,
    /// Visible within one module, with a unique defining file.
    HiddenUnique,
    /// Visible within one file.
    Private,
}

/// Linkage of a function symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter)]
pub enum PilLinkage {
    /// Exported definition.
    #[strum(serialize = "public")]
    Public,
    /// Public but not part of the binary interface, emitted into every client.
    #[strum(serialize = "non_abi")]
    PublicNonAbi,
    /// Definition visible to the whole module.
    #[strum(serialize = "hidden")]
    Hidden,
    /// Definition that may be duplicated and merged by the linker.
    #[strum(serialize = "shared")]
    Shared,
    /// File-private definition.
    #[strum(serialize = "private")]
    Private,
    /// Declaration of a public definition in another module.
    #[strum(serialize = "public_external")]
    PublicExternal,
    /// Declaration of a hidden definition in another file of this module.
    #[strum(serialize = "hidden_external")]
    HiddenExternal,
    /// Declaration of a shared definition.
    #[strum(serialize = "shared_external")]
    SharedExternal,
    /// Declaration of a private definition.
    #[strum(serialize = "private_external")]
    PrivateExternal,
}

impl PilLinkage {
    /// Maps the formal linkage of a declaration to a symbol linkage.
    ///
    /// # Arguments
    ///
    /// * `linkage` - Formal linkage of the declaration
    /// * `for_definition` - Whether the symbol is being defined in this module
    #[must_use]
    pub const fn from_formal(linkage: FormalLinkage, for_definition: bool) -> Self {
        match (linkage, for_definition) {
            (FormalLinkage::PublicUnique, true) => Self::Public,
            (FormalLinkage::PublicNonUnique, true) => Self::Shared,
            (FormalLinkage::PublicUnique | FormalLinkage::PublicNonUnique, false) => {
                Self::PublicExternal
            }
            (FormalLinkage::HiddenUnique, true) => Self::Hidden,
            (FormalLinkage::HiddenUnique, false) => Self::HiddenExternal,
            (FormalLinkage::Private, _) => Self::Private,
        }
    }

    /// Linkage of a specialization of a function with this linkage.
    ///
    /// Specializations are emitted into the using module and may be merged, so they
    /// become shared unless the original was private and not serialized.
    #[must_use]
    pub const fn specialized(self, serialized: bool) -> Self {
        if self.has_private_visibility() && !serialized {
            Self::Private
        } else {
            Self::Shared
        }
    }

    /// Returns `true` for private and private external linkage.
    #[must_use]
    pub const fn has_private_visibility(self) -> bool {
        matches!(self, Self::Private | Self::PrivateExternal)
    }

    /// Returns `true` for the public family.
    #[must_use]
    pub const fn has_public_visibility(self) -> bool {
        matches!(self, Self::Public | Self::PublicNonAbi | Self::PublicExternal)
    }

    /// Returns `true` for declarations of definitions living elsewhere.
    #[must_use]
    pub const fn is_external(self) -> bool {
        matches!(
            self,
            Self::PublicExternal | Self::HiddenExternal | Self::SharedExternal | Self::PrivateExternal
        )
    }

    /// Returns `true` if code outside this compilation unit may reference the symbol.
    ///
    /// With whole-module compilation, hidden symbols are known to be unreferenced
    /// outside the module.
    #[must_use]
    pub const fn is_possibly_used_externally(self, whole_module: bool) -> bool {
        match self {
            Self::Public | Self::PublicNonAbi => true,
            Self::Hidden => !whole_module,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formal_mapping() {
        use FormalLinkage::*;
        assert_eq!(PilLinkage::from_formal(PublicUnique, true), PilLinkage::Public);
        assert_eq!(PilLinkage::from_formal(PublicUnique, false), PilLinkage::PublicExternal);
        assert_eq!(PilLinkage::from_formal(PublicNonUnique, true), PilLinkage::Shared);
        assert_eq!(PilLinkage::from_formal(HiddenUnique, true), PilLinkage::Hidden);
        assert_eq!(PilLinkage::from_formal(HiddenUnique, false), PilLinkage::HiddenExternal);
        assert_eq!(PilLinkage::from_formal(Private, false), PilLinkage::Private);
    }

    #[test]
    fn test_specialized() {
        assert_eq!(PilLinkage::Private.specialized(false), PilLinkage::Private);
        assert_eq!(PilLinkage::Private.specialized(true), PilLinkage::Shared);
        assert_eq!(PilLinkage::Public.specialized(false), PilLinkage::Shared);
    }

    #[test]
    fn test_external_use() {
        assert!(PilLinkage::Public.is_possibly_used_externally(true));
        assert!(PilLinkage::Hidden.is_possibly_used_externally(false));
        assert!(!PilLinkage::Hidden.is_possibly_used_externally(true));
        assert!(!PilLinkage::Private.is_possibly_used_externally(false));
    }
}
