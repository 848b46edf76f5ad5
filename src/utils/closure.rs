//! Dead closure elimination.
//!
//! A closure (`partial_apply` or `thin_to_thick_function`) whose only uses adjust
//! its reference count is dead: nothing ever calls it. Deleting it must keep the
//! reference counts of its captured arguments balanced, so a release of every
//! consumed capture is inserted at each point where the closure itself would
//! have been released for the last time.
//!
//! # Final Releases
//!
//! [`get_final_releases_for_value`] treats the closure as a liveness problem. Every
//! block using the closure (other than the defining block) is live-in, and
//! liveness is propagated backwards to the definition. A block with a use but no
//! live-in successor ends the lifetime, and its last use must be a release.

use std::collections::HashSet;

use crate::{
    pil::{
        BlockId, Function, InstId, InstKind, ParameterConvention, PilBuilder, ValueDef, ValueId,
    },
    utils::{recursively_delete_trivially_dead_instructions, InstModCallbacks},
};

/// The users of a value and the releases ending its lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseTracker {
    tracked_users: Vec<InstId>,
    final_releases: Vec<InstId>,
}

impl ReleaseTracker {
    /// Every user of the value, copies' users included, in discovery order.
    #[must_use]
    pub fn tracked_users(&self) -> &[InstId] {
        &self.tracked_users
    }

    /// The releases after which the value is dead, in layout order.
    #[must_use]
    pub fn final_releases(&self) -> &[InstId] {
        &self.final_releases
    }
}

fn is_acceptable_user(kind: &InstKind) -> bool {
    kind.is_ref_count_inst() || matches!(kind, InstKind::DebugValue { .. })
}

fn defining_block(func: &Function, value: ValueId) -> Option<BlockId> {
    match func.value(value).def() {
        ValueDef::Result { inst, .. } => func.inst(inst).block(),
        ValueDef::BlockArg { block, .. } => Some(block),
        ValueDef::Undef => None,
    }
}

fn propagate_liveness(func: &Function, live_in: &mut HashSet<BlockId>, def_block: BlockId) {
    let mut worklist: Vec<BlockId> = live_in
        .iter()
        .flat_map(|&block| func.predecessors(block))
        .collect();
    while let Some(block) = worklist.pop() {
        if block == def_block || !live_in.insert(block) {
            continue;
        }
        worklist.extend(func.predecessors(block));
    }
}

/// Finds the final releases of `value`.
///
/// Every use must be a reference-count operation or a `debug_value`; uses of
/// `copy_value` results are followed and count as uses of `value`.
///
/// # Returns
///
/// `None` if some use is of another kind, or if a block ending the lifetime does
/// not end it with a release.
#[must_use]
pub fn get_final_releases_for_value(func: &Function, value: ValueId) -> Option<ReleaseTracker> {
    let def_block = defining_block(func, value)?;
    let mut tracker = ReleaseTracker::default();

    let mut worklist = vec![value];
    let mut head = 0;
    while head < worklist.len() {
        let current = worklist[head];
        head += 1;
        for user in func.users(current) {
            if !is_acceptable_user(func.kind(user)) {
                return None;
            }
            if !tracker.tracked_users.contains(&user) {
                tracker.tracked_users.push(user);
                worklist.extend_from_slice(func.results(user));
            }
        }
    }

    let releases: Vec<InstId> = tracker
        .tracked_users
        .iter()
        .copied()
        .filter(|&user| func.kind(user).is_release())
        .collect();
    if let [only] = releases.as_slice() {
        tracker.final_releases.push(*only);
        return Some(tracker);
    }

    let mut use_blocks: HashSet<BlockId> = HashSet::new();
    let mut live_in: HashSet<BlockId> = HashSet::new();
    for &user in &tracker.tracked_users {
        let block = func.parent_block(user);
        use_blocks.insert(block);
        if block != def_block {
            live_in.insert(block);
        }
    }
    propagate_liveness(func, &mut live_in, def_block);

    for &block in func.layout() {
        if !use_blocks.contains(&block) {
            continue;
        }
        let live_out = func
            .successors(block)
            .iter()
            .any(|succ| live_in.contains(succ));
        if live_out {
            continue;
        }
        let last = func.block(block).insts().iter().rev().copied().find(|inst| {
            tracker.tracked_users.contains(inst)
                && !matches!(func.kind(*inst), InstKind::DebugValue { .. })
        })?;
        if !func.kind(last).is_release() {
            return None;
        }
        tracker.final_releases.push(last);
    }
    Some(tracker)
}

/// Emits the cleanup of one captured argument of a closure being deleted.
///
/// Only consumed conventions need a cleanup: `@in` arguments get a
/// `destroy_addr`, `@owned` ones a release (or `destroy_value` in ownership SSA).
/// Nothing is emitted for trivial types.
pub fn release_partial_apply_captured_arg(
    builder: &mut PilBuilder<'_>,
    arg: ValueId,
    convention: ParameterConvention,
    callbacks: &mut InstModCallbacks<'_>,
) -> Option<InstId> {
    if !convention.is_consumed() {
        return None;
    }
    let ty = builder.function().ty(arg);
    if ty.object_type().is_trivial() {
        return None;
    }
    let inst = if ty.is_address() {
        builder.destroy_addr(arg)
    } else {
        builder.emit_destroy_value_operation(arg)?
    };
    callbacks.created(builder.function(), inst);
    Some(inst)
}

fn delete_users_then(
    func: &mut Function,
    users: &[InstId],
    closure: InstId,
    callbacks: &mut InstModCallbacks<'_>,
) {
    for &user in users.iter().rev() {
        callbacks.deleted(func, user);
        func.drop_operands(user);
    }
    for &user in users.iter().rev() {
        func.erase_inst(user);
    }

    let callee = func.operand_value(closure, 0);
    callbacks.deleted(func, closure);
    func.erase_inst(closure);
    if let Some(def) = func.value(callee).defining_inst() {
        recursively_delete_trivially_dead_instructions(func, &[def], false, |f, inst| {
            callbacks.deleted(f, inst);
        });
    }
}

/// Deletes `closure` if nothing but reference counting uses it.
///
/// A `partial_apply [on_stack]` may only be used by `dealloc_stack` and
/// `debug_value`; its captures are owned elsewhere and need no cleanup. Any other
/// closure needs final releases (see [`get_final_releases_for_value`]), and every
/// consumed capture of a `partial_apply` is released right before each of them.
///
/// # Returns
///
/// `true` if the closure and its uses were deleted, `false` (with the function
/// unchanged) otherwise.
pub fn try_delete_dead_closure(
    func: &mut Function,
    closure: InstId,
    mut callbacks: InstModCallbacks<'_>,
) -> bool {
    let captured = match func.kind(closure) {
        InstKind::PartialApply { on_stack, captured } => Some((*on_stack, captured.clone())),
        InstKind::ThinToThickFunction => None,
        _ => return false,
    };
    let Some(value) = func.result(closure) else {
        return false;
    };

    if let Some((true, _)) = captured {
        let users = func.users(value);
        let removable = users.iter().all(|&user| {
            matches!(
                func.kind(user),
                InstKind::DeallocStack | InstKind::DebugValue { .. }
            )
        });
        if !removable {
            return false;
        }
        delete_users_then(func, &users, closure, &mut callbacks);
        return true;
    }

    let Some(tracker) = get_final_releases_for_value(func, value) else {
        return false;
    };

    if let Some((_, conventions)) = captured {
        let args: Vec<ValueId> = func.operand_values(closure)[1..].to_vec();
        for &release in tracker.final_releases() {
            let mut builder = PilBuilder::before(func, release);
            for (&arg, &convention) in args.iter().zip(&conventions) {
                release_partial_apply_captured_arg(&mut builder, arg, convention, &mut callbacks);
            }
        }
    }

    log::trace!(
        "deleting dead closure {closure} in {} with {} final release(s)",
        func.name(),
        tracker.final_releases().len()
    );
    delete_users_then(func, tracker.tracked_users(), closure, &mut callbacks);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pil::{OwnershipKind, PilLinkage, PilType, Section};

    fn klass() -> PilType {
        PilType::Object("Klass".into())
    }

    #[test]
    fn test_single_release_is_final() {
        let mut f = Function::new("f", PilLinkage::Private);
        f.set_has_ownership(false);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let obj = b.add_block_arg(entry, klass(), OwnershipKind::None);
        let callee = b.function_ref("closure_body");
        let closure = b.partial_apply(callee, &[obj], vec![ParameterConvention::DirectOwned], false);
        b.strong_retain(closure);
        b.strong_release(closure);
        let last = b.strong_release(closure);
        let zero = b.integer_literal(PilType::Int(8), 0);
        b.return_(zero);

        let tracker = get_final_releases_for_value(&f, closure).unwrap();
        assert_eq!(tracker.tracked_users().len(), 3);
        assert_eq!(tracker.final_releases(), &[last]);
    }

    #[test]
    fn test_escaping_use_blocks_deletion() {
        let mut f = Function::new("f", PilLinkage::Private);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let callee = b.function_ref("body");
        let thick = b.thin_to_thick_function(callee);
        b.return_(thick);

        let closure = f.value(thick).defining_inst().unwrap();
        let before = f.to_string();
        assert!(!try_delete_dead_closure(&mut f, closure, InstModCallbacks::new()));
        assert_eq!(f.to_string(), before);
    }

    #[test]
    fn test_on_stack_closure() -> crate::Result<()> {
        let mut f = Function::new("f", PilLinkage::Private);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let obj = b.add_block_arg(entry, klass(), OwnershipKind::Guaranteed);
        let callee = b.function_ref("body");
        let closure =
            b.partial_apply(callee, &[obj], vec![ParameterConvention::DirectGuaranteed], true);
        b.dealloc_stack(closure);
        let zero = b.integer_literal(PilType::Int(8), 0);
        b.return_(zero);

        let pa = f.value(closure).defining_inst().unwrap();
        let mut deleted = 0;
        let callbacks = InstModCallbacks::new().on_delete(|_, _| deleted += 1);
        assert!(try_delete_dead_closure(&mut f, pa, callbacks));
        assert_eq!(deleted, 3);
        assert_eq!(f.block(entry).insts().len(), 2);
        f.verify()
    }

    #[test]
    fn test_release_captured_arg_conventions() {
        let mut f = Function::new("f", PilLinkage::Private);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let obj = b.add_block_arg(entry, klass(), OwnershipKind::Owned);
        let addr = b.add_block_arg(entry, PilType::address(klass()), OwnershipKind::Trivial);
        let int = b.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
        let mut callbacks = InstModCallbacks::new();

        let owned = release_partial_apply_captured_arg(
            &mut b,
            obj,
            ParameterConvention::DirectOwned,
            &mut callbacks,
        );
        let guaranteed = release_partial_apply_captured_arg(
            &mut b,
            obj,
            ParameterConvention::DirectGuaranteed,
            &mut callbacks,
        );
        let indirect =
            release_partial_apply_captured_arg(&mut b, addr, ParameterConvention::IndirectIn, &mut callbacks);
        let inout = release_partial_apply_captured_arg(
            &mut b,
            addr,
            ParameterConvention::IndirectInout,
            &mut callbacks,
        );
        let trivial =
            release_partial_apply_captured_arg(&mut b, int, ParameterConvention::DirectOwned, &mut callbacks);

        let kind = |inst: Option<InstId>| inst.map(|i| b.function().kind(i).clone());
        assert_eq!(kind(owned), Some(InstKind::DestroyValue));
        assert_eq!(kind(guaranteed), None);
        assert_eq!(kind(indirect), Some(InstKind::DestroyAddr));
        assert_eq!(kind(inout), None);
        assert_eq!(kind(trivial), None);
    }
}
