//! Appending block arguments to branch terminators.

use crate::pil::{BlockId, Function, InstId, InstKind, PilBuilder, ValueId};

/// Creates a copy of the branch `branch` passing `value` as an extra argument to
/// `dest`, immediately before `branch`.
///
/// For a `cond_br` the argument is appended to every edge going to `dest`. The
/// original branch is left in place; the caller erases it once it has switched
/// over to the new terminator.
///
/// # Panics
///
/// Panics if `branch` is not a `br` or `cond_br` targeting `dest`, or if `dest`
/// does not already declare exactly one more argument than the branch passes.
pub fn add_argument_to_branch(
    func: &mut Function,
    branch: InstId,
    dest: BlockId,
    value: ValueId,
) -> InstId {
    let expected = func.block(dest).args().len();
    let mut edges = func.successor_args(branch);
    assert!(
        edges.iter().any(|(target, _)| *target == dest),
        "{branch} does not branch to {dest}"
    );
    for (target, args) in &mut edges {
        if *target == dest {
            assert_eq!(
                args.len() + 1,
                expected,
                "{dest} takes {expected} argument(s), branch passes {}",
                args.len()
            );
            args.push(value);
        }
    }

    let kind = func.kind(branch).clone();
    let mut builder = PilBuilder::before(func, branch);
    match (kind, edges.as_slice()) {
        (InstKind::Branch { dest }, [(_, args)]) => builder.branch(dest, args),
        (
            InstKind::CondBranch {
                true_dest,
                false_dest,
                ..
            },
            [(_, true_args), (_, false_args)],
        ) => {
            let cond = builder.function().operand_value(branch, 0);
            builder.cond_branch(cond, true_dest, true_args, false_dest, false_args)
        }
        (kind, _) => panic!("cannot add a block argument to {}", kind.mnemonic()),
    }
}
