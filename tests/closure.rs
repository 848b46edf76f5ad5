//! Dead closure deletion keeps reference counts balanced.
//!
//! A closure that is only retained and released can be deleted, but every
//! argument it consumed must then be released where the closure would have been
//! released for the last time.

use std::collections::HashMap;

use pilopt::prelude::*;
use pilopt::utils::{get_final_releases_for_value, try_delete_dead_closure, InstModCallbacks};

fn object() -> PilType {
    PilType::Object("Klass".into())
}

/// Net reference-count change of `value` along the block path `path`.
fn balance_along(func: &Function, path: &[BlockId], value: ValueId) -> i32 {
    let mut balance = 0;
    for &block in path {
        for &inst in func.block(block).insts() {
            let kind = func.kind(inst);
            if !kind.is_ref_count_inst() || func.operand_value(inst, 0) != value {
                continue;
            }
            if kind.is_release() {
                balance -= 1;
            } else if kind.is_retain() {
                balance += 1;
            }
        }
    }
    balance
}

struct Diamond {
    func: Function,
    closure: InstId,
    owned: ValueId,
    guaranteed: ValueId,
    entry: BlockId,
    left: BlockId,
    right: BlockId,
}

/// ```text
/// entry(x @owned, y @guaranteed, n, flag):
///   %c = partial_apply callee(x, y, n)
///   strong_retain %c
///   cond_br flag, left, right
/// left:  strong_release %c; strong_release %c; return n
/// right: strong_release %c; strong_release %c; return n
/// ```
fn diamond() -> Diamond {
    let mut func = Function::new("diamond", PilLinkage::Public);
    func.set_has_ownership(false);
    let mut b = PilBuilder::new(&mut func);
    let entry = b.create_block(Section::Main);
    let left = b.create_block(Section::Main);
    let right = b.create_block(Section::Main);

    b.emit_block(entry);
    let owned = b.add_block_arg(entry, object(), OwnershipKind::None);
    let guaranteed = b.add_block_arg(entry, object(), OwnershipKind::None);
    let n = b.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
    let flag = b.add_block_arg(entry, PilType::Int(1), OwnershipKind::Trivial);
    let callee = b.function_ref("callee");
    let closure_value = b.partial_apply(
        callee,
        &[owned, guaranteed, n],
        vec![
            ParameterConvention::DirectOwned,
            ParameterConvention::DirectGuaranteed,
            ParameterConvention::DirectOwned,
        ],
        false,
    );
    b.strong_retain(closure_value);
    b.cond_branch(flag, left, &[], right, &[]);

    for block in [left, right] {
        b.emit_block(block);
        b.strong_release(closure_value);
        b.strong_release(closure_value);
        b.return_(n);
    }

    let closure = func
        .value(closure_value)
        .defining_inst()
        .expect("partial_apply defines the closure");
    Diamond {
        func,
        closure,
        owned,
        guaranteed,
        entry,
        left,
        right,
    }
}

#[test]
fn test_final_releases_end_every_path() {
    let d = diamond();
    let value = d.func.results(d.closure)[0];
    let tracker = get_final_releases_for_value(&d.func, value).expect("only ref counting uses");

    assert_eq!(tracker.tracked_users().len(), 5);
    let blocks: Vec<BlockId> = tracker
        .final_releases()
        .iter()
        .map(|&release| d.func.parent_block(release))
        .collect();
    assert_eq!(blocks, vec![d.left, d.right]);
}

#[test]
fn test_deleting_closure_releases_consumed_captures() -> Result<()> {
    let mut d = diamond();
    let before_left = balance_along(&d.func, &[d.entry, d.left], d.owned);

    let mut deleted = 0usize;
    let mut created = 0usize;
    let callbacks = InstModCallbacks::new()
        .on_delete(|_, _| deleted += 1)
        .on_create(|_, _| created += 1);
    assert!(try_delete_dead_closure(&mut d.func, d.closure, callbacks));

    // Five ref-count users, the closure and its function_ref.
    assert_eq!(deleted, 7);
    // One release of the owned capture per final release.
    assert_eq!(created, 2);

    assert_eq!(before_left, 0);
    for path in [[d.entry, d.left], [d.entry, d.right]] {
        assert_eq!(balance_along(&d.func, &path, d.owned), -1);
        assert_eq!(balance_along(&d.func, &path, d.guaranteed), 0);
    }

    let mut kinds: HashMap<&str, usize> = HashMap::new();
    for inst in d.func.instructions() {
        *kinds.entry(d.func.kind(inst).mnemonic()).or_default() += 1;
    }
    assert_eq!(kinds.get("partial_apply"), None);
    assert_eq!(kinds.get("function_ref"), None);
    assert_eq!(kinds.get("strong_retain"), None);
    assert_eq!(kinds.get("strong_release"), Some(&2));
    d.func.verify()
}

#[test]
fn test_ownership_form_uses_destroy_value() -> Result<()> {
    let mut func = Function::new("owned", PilLinkage::Public);
    let mut b = PilBuilder::new(&mut func);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let x = b.add_block_arg(entry, object(), OwnershipKind::Owned);
    let callee = b.function_ref("callee");
    let closure_value =
        b.partial_apply(callee, &[x], vec![ParameterConvention::DirectOwned], false);
    let copy = b.copy_value(closure_value);
    b.destroy_value(copy);
    b.destroy_value(closure_value);
    let zero = b.integer_literal(PilType::Int(64), 0);
    b.return_(zero);

    let closure = func
        .value(closure_value)
        .defining_inst()
        .expect("partial_apply defines the closure");
    assert!(try_delete_dead_closure(&mut func, closure, InstModCallbacks::new()));

    let mnemonics: Vec<&str> = func
        .instructions()
        .into_iter()
        .map(|inst| func.kind(inst).mnemonic())
        .collect();
    assert_eq!(mnemonics, vec!["destroy_value", "integer_literal", "return"]);
    let destroy = func.instructions()[0];
    assert_eq!(func.operand_value(destroy, 0), x);
    func.verify()
}

#[test]
fn test_called_closure_is_kept() {
    let mut func = Function::new("called", PilLinkage::Public);
    func.set_has_ownership(false);
    let mut b = PilBuilder::new(&mut func);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let x = b.add_block_arg(entry, object(), OwnershipKind::None);
    let callee = b.function_ref("callee");
    let closure_value =
        b.partial_apply(callee, &[x], vec![ParameterConvention::DirectOwned], false);
    let result = b.apply(closure_value, &[], PilType::Int(64), None);
    let value = b.function().results(result)[0];
    b.strong_release(closure_value);
    b.return_(value);

    let closure = func
        .value(closure_value)
        .defining_inst()
        .expect("partial_apply defines the closure");
    let before = func.to_string();
    assert!(!try_delete_dead_closure(&mut func, closure, InstModCallbacks::new()));
    assert_eq!(func.to_string(), before);
}

#[test]
fn test_combine_deletes_dead_closures_in_pipeline() -> Result<()> {
    let d = diamond();
    let mut module = Module::new("closures");
    module.add_function(d.func);

    let options = PilOptions::new()
        .with_custom_pass_list(["sil-combine"])
        .with_verify_all(true);
    let diagnostics = DiagnosticCollector::default();
    let mut registry = PassRegistry::with_builtin_passes();
    let report = run_compilation(&mut module, &options, &mut registry, &diagnostics)?;

    assert!(report.changed);
    assert_eq!(report.events.count_kind(EventKind::ClosureDeleted), 1);
    let func = &module.functions()[0];
    for path in [[d.entry, d.left], [d.entry, d.right]] {
        assert_eq!(balance_along(func, &path, d.owned), -1);
    }
    Ok(())
}
