//! Notifications about instructions a utility deletes or creates.

use std::fmt;

use crate::pil::{Function, InstId};

type Callback<'a> = Box<dyn FnMut(&Function, InstId) + 'a>;

/// Optional observers of instruction deletion and creation.
///
/// The utility always performs the edit itself; the callbacks only observe it.
/// Deletion callbacks run before the instruction is changed, creation callbacks
/// right after the instruction is linked.
#[derive(Default)]
pub struct InstModCallbacks<'a> {
    deleted: Option<Callback<'a>>,
    created: Option<Callback<'a>>,
}

impl<'a> InstModCallbacks<'a> {
    /// Callbacks that observe nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the observer of deleted instructions.
    #[must_use]
    pub fn on_delete(mut self, callback: impl FnMut(&Function, InstId) + 'a) -> Self {
        self.deleted = Some(Box::new(callback));
        self
    }

    /// Sets the observer of created instructions.
    #[must_use]
    pub fn on_create(mut self, callback: impl FnMut(&Function, InstId) + 'a) -> Self {
        self.created = Some(Box::new(callback));
        self
    }

    pub(crate) fn deleted(&mut self, func: &Function, inst: InstId) {
        if let Some(callback) = self.deleted.as_mut() {
            callback(func, inst);
        }
    }

    pub(crate) fn created(&mut self, func: &Function, inst: InstId) {
        if let Some(callback) = self.created.as_mut() {
            callback(func, inst);
        }
    }
}

impl fmt::Debug for InstModCallbacks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstModCallbacks")
            .field("deleted", &self.deleted.is_some())
            .field("created", &self.created.is_some())
            .finish()
    }
}
