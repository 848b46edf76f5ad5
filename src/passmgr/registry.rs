//! Implementations of catalog passes, looked up by [`PassKind`].

use std::collections::BTreeMap;

use crate::passmgr::{PassKind, PilPass};

/// Maps catalog identifiers to pass implementations.
///
/// Catalog entries without an implementation are legal in pipelines; the
/// manager skips them. Code generation registers its IRGen passes into the
/// same registry after construction.
///
/// # Examples
///
/// ```rust
/// use pilopt::passmgr::{PassKind, PassRegistry};
///
/// let registry = PassRegistry::with_builtin_passes();
/// assert!(registry.contains(PassKind::DCE));
/// assert!(!registry.contains(PassKind::LoadableByAddress));
/// ```
#[derive(Default)]
pub struct PassRegistry {
    passes: BTreeMap<PassKind, Box<dyn PilPass>>,
}

impl PassRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in pass of this crate.
    #[must_use]
    pub fn with_builtin_passes() -> Self {
        let mut registry = Self::new();
        for pass in crate::passes::builtin_passes() {
            registry.register(pass);
        }
        registry
    }

    /// Registers `pass` under its [`PilPass::kind`], replacing a previous
    /// implementation of the same kind.
    ///
    /// # Returns
    ///
    /// The replaced implementation, if any.
    pub fn register(&mut self, pass: Box<dyn PilPass>) -> Option<Box<dyn PilPass>> {
        let kind = pass.kind();
        if kind.info().irgen {
            log::debug!("registering IRGen pass {kind}");
        }
        self.passes.insert(kind, pass)
    }

    /// Returns `true` if `kind` has an implementation.
    #[must_use]
    pub fn contains(&self, kind: PassKind) -> bool {
        self.passes.contains_key(&kind)
    }

    /// The implementation of `kind`.
    #[must_use]
    pub fn get(&self, kind: PassKind) -> Option<&dyn PilPass> {
        self.passes.get(&kind).map(AsRef::as_ref)
    }

    /// The implementation of `kind`, mutably.
    pub fn get_mut(&mut self, kind: PassKind) -> Option<&mut (dyn PilPass + 'static)> {
        self.passes.get_mut(&kind).map(AsMut::as_mut)
    }

    /// Identifiers with an implementation, in catalog order.
    pub fn kinds(&self) -> impl Iterator<Item = PassKind> + '_ {
        self.passes.keys().copied()
    }

    /// Number of registered implementations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}

impl std::fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.passes.keys()).finish()
    }
}
