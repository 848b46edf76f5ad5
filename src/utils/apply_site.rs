//! Local call sites of a function reference.

use std::collections::{HashSet, VecDeque};

use crate::pil::{Function, InstId, InstKind, ValueId};

/// How a function reference is used inside one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindLocalApplySitesResult {
    /// `apply` instructions calling the reference (directly or through conversions).
    pub full_apply_sites: Vec<InstId>,
    /// `partial_apply` instructions capturing arguments for the reference.
    pub partial_apply_sites: Vec<InstId>,
    /// Some use could not be proven to be a non-escaping call.
    pub escapes: bool,
}

impl FindLocalApplySitesResult {
    /// Returns `true` if some use of the reference escapes.
    #[must_use]
    pub const fn is_escaping(&self) -> bool {
        self.escapes
    }
}

/// Classifies every use of the function reference `value`.
///
/// Uses as the callee of an `apply` are full apply sites; uses as the callee of a
/// `partial_apply` are partial apply sites whose own uses are classified in turn.
/// `thin_to_thick_function` and `copy_value` are looked through, and reference
/// counting, `dealloc_stack` and `debug_value` uses are ignored. Every other use,
/// including passing the reference as an argument, counts as an escape.
///
/// # Returns
///
/// `None` if `value` has no uses at all; there is nothing to learn from it.
#[must_use]
pub fn find_local_apply_sites(func: &Function, value: ValueId) -> Option<FindLocalApplySitesResult> {
    if !func.has_uses(value) {
        return None;
    }

    let mut result = FindLocalApplySitesResult::default();
    let mut visited: HashSet<ValueId> = HashSet::new();
    let mut worklist: VecDeque<ValueId> = VecDeque::from([value]);

    while let Some(current) = worklist.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        for &operand in func.uses(current) {
            let use_ = func.operand(operand);
            let user = use_.user();
            let is_callee = use_.index() == 0;
            match func.kind(user) {
                InstKind::Apply { .. } if is_callee => {
                    if !result.full_apply_sites.contains(&user) {
                        result.full_apply_sites.push(user);
                    }
                }
                InstKind::PartialApply { .. } if is_callee => {
                    if !result.partial_apply_sites.contains(&user) {
                        result.partial_apply_sites.push(user);
                    }
                    worklist.extend(func.results(user));
                }
                InstKind::ThinToThickFunction | InstKind::CopyValue => {
                    worklist.extend(func.results(user));
                }
                InstKind::StrongRetain
                | InstKind::StrongRelease
                | InstKind::RetainValue
                | InstKind::ReleaseValue
                | InstKind::DestroyValue
                | InstKind::DeallocStack
                | InstKind::DebugValue { .. } => {}
                _ => result.escapes = true,
            }
        }
    }
    Some(result)
}
