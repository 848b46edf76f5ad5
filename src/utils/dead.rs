//! Trivially dead instructions and transitive use erasure.
//!
//! # Algorithm
//!
//! [`recursively_delete_trivially_dead_instructions`] works in rounds over an
//! explicit worklist. Each round drops the operands of every instruction in the
//! round, collecting operand definitions that became trivially dead into the next
//! round. A set keyed by instruction identity keeps any instruction from being
//! queued twice. Nothing is erased until the worklist is empty; the dead set is
//! then erased in one batch, so dead instructions using each other can be seeded
//! in any order. Recursion depth stays constant however long the dependency chain,
//! and the work is linear in the number of erased instructions and their operands.

use std::collections::HashSet;

use crate::pil::{Function, InstId, InstKind, SideEffects, ValueId};

/// Returns `true` if `inst` can be removed without changing behaviour.
///
/// An instruction is trivially dead when it is not a terminator, every use of its
/// results is a `debug_value`, and its kind neither writes memory nor calls
/// anything. `debug_value` itself is never trivially dead.
#[must_use]
pub fn is_instruction_trivially_dead(func: &Function, inst: InstId) -> bool {
    let kind = func.kind(inst);
    if kind.is_terminator() || matches!(kind, InstKind::DebugValue { .. }) {
        return false;
    }
    if !only_debug_uses(func, inst) {
        return false;
    }
    matches!(
        kind.side_effects(),
        SideEffects::None | SideEffects::ReadsMemory
    )
}

fn only_debug_uses(func: &Function, inst: InstId) -> bool {
    func.results(inst).iter().all(|&result| {
        func.users(result)
            .into_iter()
            .all(|user| matches!(func.kind(user), InstKind::DebugValue { .. }))
    })
}

fn push_if_trivially_dead(
    func: &Function,
    value: ValueId,
    queued: &mut HashSet<InstId>,
    next: &mut Vec<InstId>,
) {
    let Some(def) = func.value(value).defining_inst() else {
        return;
    };
    if func.contains_inst(def)
        && !queued.contains(&def)
        && is_instruction_trivially_dead(func, def)
    {
        queued.insert(def);
        next.push(def);
    }
}

/// Deletes each seed if it is trivially dead (or unconditionally with `force`),
/// then keeps deleting operand definitions that became trivially dead.
///
/// # Arguments
///
/// * `func` - Function being edited
/// * `seeds` - Candidate instructions
/// * `force` - Delete the seeds without checking them; their results may only be
///   used by `debug_value` instructions or by other seeds
/// * `callback` - Invoked with every instruction about to be erased, before it is
///   changed in any way
///
/// # Returns
///
/// The number of erased instructions, `debug_value` uses included.
pub fn recursively_delete_trivially_dead_instructions(
    func: &mut Function,
    seeds: &[InstId],
    force: bool,
    mut callback: impl FnMut(&Function, InstId),
) -> usize {
    // Every instruction ever queued, so none is visited twice.
    let mut queued: HashSet<InstId> = HashSet::with_capacity(seeds.len());
    let mut round: Vec<InstId> = Vec::new();
    for &seed in seeds {
        if !queued.contains(&seed) && (force || is_instruction_trivially_dead(func, seed)) {
            queued.insert(seed);
            round.push(seed);
        }
    }

    let mut doomed: Vec<InstId> = Vec::new();
    while !round.is_empty() {
        let mut next: Vec<InstId> = Vec::new();
        for &inst in &round {
            callback(func, inst);
            for result in func.results(inst).to_vec() {
                for user in func.users(result) {
                    if matches!(func.kind(user), InstKind::DebugValue { .. }) && queued.insert(user) {
                        callback(func, user);
                        func.drop_operands(user);
                        doomed.push(user);
                    }
                }
            }
            let operands = func.operand_values(inst);
            func.drop_operands(inst);
            for value in operands {
                push_if_trivially_dead(func, value, &mut queued, &mut next);
            }
            doomed.push(inst);
        }
        round = next;
    }

    func.erase_insts(&doomed);
    doomed.len()
}

/// Collects every instruction that transitively uses `value` through the results
/// of its users.
///
/// Instructions already in `insts` are not visited again, which also bounds the
/// walk on malformed cyclic input.
pub fn collect_uses_of_value(func: &Function, value: ValueId, insts: &mut HashSet<InstId>) {
    let mut worklist = vec![value];
    while let Some(current) = worklist.pop() {
        for user in func.users(current) {
            if insts.insert(user) {
                worklist.extend_from_slice(func.results(user));
            }
        }
    }
}

/// Transitive users of `roots` in discovery order, skipping `exclude`.
fn transitive_users(func: &Function, roots: &[ValueId], exclude: Option<InstId>) -> Vec<InstId> {
    let mut seen: HashSet<InstId> = exclude.into_iter().collect();
    let mut users = Vec::new();
    let mut worklist: Vec<ValueId> = roots.to_vec();
    let mut head = 0;
    while head < worklist.len() {
        let current = worklist[head];
        head += 1;
        for user in func.users(current) {
            if seen.insert(user) {
                users.push(user);
                worklist.extend_from_slice(func.results(user));
            }
        }
    }
    users
}

fn erase_transitive_users(
    func: &mut Function,
    roots: &[ValueId],
    keep: Option<InstId>,
    mut callback: impl FnMut(&Function, InstId),
) {
    let users = transitive_users(func, roots, keep);
    if users.is_empty() {
        return;
    }

    let erasing: HashSet<InstId> = users.iter().copied().collect();
    let mut seen: HashSet<InstId> = HashSet::new();
    let mut candidates: Vec<InstId> = Vec::new();
    for &user in &users {
        for value in func.operand_values(user) {
            if let Some(def) = func.value(value).defining_inst() {
                if Some(def) != keep && !erasing.contains(&def) && seen.insert(def) {
                    candidates.push(def);
                }
            }
        }
        callback(func, user);
        func.drop_operands(user);
    }
    func.erase_insts(&users);

    let dead: Vec<InstId> = candidates
        .into_iter()
        .filter(|&def| func.contains_inst(def) && is_instruction_trivially_dead(func, def))
        .collect();
    recursively_delete_trivially_dead_instructions(func, &dead, false, callback);
}

/// Erases every transitive user of the results of `inst`, but not `inst` itself.
///
/// Instructions feeding the erased users that become trivially dead are deleted
/// too. `callback` sees each erased instruction before it is changed.
pub fn erase_uses_of_instruction(
    func: &mut Function,
    inst: InstId,
    callback: impl FnMut(&Function, InstId),
) {
    let results = func.results(inst).to_vec();
    erase_transitive_users(func, &results, Some(inst), callback);
}

/// Erases every transitive user of `value`, but not its definition.
pub fn erase_uses_of_value(func: &mut Function, value: ValueId) {
    let keep = func.value(value).defining_inst();
    erase_transitive_users(func, &[value], keep, |_, _| {});
}
