//! Use-list consistency under structural edits.
//!
//! Every operand must appear in the use list of the value it reads, and every
//! use list entry must point back at an operand reading that value. These tests
//! check both directions after each kind of edit the public API offers.

use pilopt::prelude::*;
use pilopt::utils::{erase_uses_of_value, recursively_delete_trivially_dead_instructions};

fn int() -> PilType {
    PilType::Int(64)
}

/// Checks both directions of every def-use edge, then runs the verifier.
fn assert_edges_consistent(func: &Function) {
    let mut values = Vec::new();
    for &block in func.layout() {
        values.extend_from_slice(func.block(block).args());
        for &inst in func.block(block).insts() {
            values.extend_from_slice(func.results(inst));
            for (index, &operand) in func.inst(inst).operands().iter().enumerate() {
                let edge = func.operand(operand);
                assert_eq!(edge.user(), inst);
                assert_eq!(edge.index(), index);
                assert!(
                    func.uses(edge.value()).contains(&operand),
                    "operand {index} of {inst} missing from the use list of {}",
                    edge.value()
                );
            }
        }
    }
    for value in values {
        for &operand in func.uses(value) {
            let edge = func.operand(operand);
            assert_eq!(edge.value(), value);
            assert!(func.contains_inst(edge.user()));
        }
    }
    func.verify().expect("function verifies");
}

/// `f(a, b) { %s = add a, b; %t = add %s, a; return %t }`
fn sum() -> (Function, [ValueId; 4]) {
    let mut f = Function::new("sum", PilLinkage::Public);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let a = b.add_block_arg(entry, int(), OwnershipKind::Trivial);
    let c = b.add_block_arg(entry, int(), OwnershipKind::Trivial);
    let s = b.builtin(BuiltinOp::Add, a, c, int());
    let t = b.builtin(BuiltinOp::Add, s, a, int());
    b.return_(t);
    (f, [a, c, s, t])
}

#[test]
fn test_builder_records_every_use() {
    let (f, [a, c, s, t]) = sum();
    assert_edges_consistent(&f);
    assert_eq!(f.uses(a).len(), 2);
    assert_eq!(f.uses(c).len(), 1);
    assert_eq!(f.uses(s).len(), 1);
    assert_eq!(f.uses(t).len(), 1);

    let s_def = f.value(s).defining_inst().expect("s is a result");
    let t_def = f.value(t).defining_inst().expect("t is a result");
    assert_eq!(f.users(a), vec![s_def, t_def]);
}

#[test]
fn test_replace_and_set_operand() {
    let (mut f, [a, c, s, t]) = sum();

    f.replace_all_uses_with(s, c);
    assert!(!f.has_uses(s));
    assert_eq!(f.uses(c).len(), 2);
    assert_edges_consistent(&f);

    let t_def = f.value(t).defining_inst().expect("t is a result");
    f.set_operand(t_def, 1, c);
    assert_eq!(f.uses(a).len(), 1);
    assert_eq!(f.uses(c).len(), 3);
    assert_eq!(f.operand_values(t_def), vec![c, c]);
    assert_edges_consistent(&f);

    // Setting an operand to its current value changes nothing.
    f.set_operand(t_def, 0, c);
    assert_eq!(f.uses(c).len(), 3);
    assert_edges_consistent(&f);
}

#[test]
fn test_erase_drops_uses() {
    let (mut f, [a, c, s, t]) = sum();
    let s_def = f.value(s).defining_inst().expect("s is a result");
    let t_def = f.value(t).defining_inst().expect("t is a result");

    f.replace_all_uses_with(t, a);
    f.erase_inst(t_def);
    assert!(!f.contains_value(t));
    assert!(!f.has_uses(s));
    f.erase_inst(s_def);

    assert_eq!(f.inst_count(), 1);
    assert_eq!(f.uses(a).len(), 1);
    assert!(!f.has_uses(c));
    assert_edges_consistent(&f);
}

#[test]
#[should_panic(expected = "still has 1 use(s)")]
fn test_erasing_used_result_panics() {
    let (mut f, [_, _, s, _]) = sum();
    let s_def = f.value(s).defining_inst().expect("s is a result");
    f.erase_inst(s_def);
}

#[test]
fn test_split_and_redirect_blocks() {
    let (mut f, [_, _, s, _]) = sum();
    let entry = f.entry_block().expect("sum has a body");
    let s_def = f.value(s).defining_inst().expect("s is a result");

    let tail = f.split_block_after(s_def);
    assert_eq!(f.block(entry).insts().len(), 1);
    PilBuilder::at_end(&mut f, entry).branch(tail, &[]);
    assert_eq!(f.successors(entry), vec![tail]);
    assert_eq!(f.predecessors(tail), vec![entry]);
    assert_edges_consistent(&f);

    let detour = f.create_block_after(entry);
    PilBuilder::at_end(&mut f, detour).branch(tail, &[]);
    f.replace_successor(entry, tail, detour);
    assert_eq!(f.successors(entry), vec![detour]);
    assert_eq!(f.predecessors(tail), vec![detour]);
    assert_eq!(f.layout(), &[entry, detour, tail]);
    assert_edges_consistent(&f);
}

#[test]
fn test_moving_instructions_keeps_edges() {
    let mut f = Function::new("moves", PilLinkage::Public);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let a = b.integer_literal(int(), 1);
    let c = b.integer_literal(int(), 2);
    let s = b.builtin(BuiltinOp::Sub, c, a, int());
    b.return_(s);

    let c_def = f.value(c).defining_inst().expect("literal");
    let a_def = f.value(a).defining_inst().expect("literal");
    f.move_inst(c_def, InsertPoint::Before(a_def));
    assert_eq!(f.block(entry).insts()[0], c_def);
    assert_eq!(f.parent_block(c_def), entry);
    assert_edges_consistent(&f);
}

#[test]
fn test_erase_uses_of_value_is_transitive() {
    let (mut f, [a, c, s, t]) = sum();
    let entry = f.entry_block().expect("sum has a body");
    let ret = f.terminator(entry).expect("terminated");
    f.set_operand(ret, 0, c);

    erase_uses_of_value(&mut f, s);
    assert!(!f.contains_value(t));
    assert!(f.contains_value(s));
    assert_eq!(f.uses(a).len(), 1);
    assert_edges_consistent(&f);
}

#[test]
fn test_long_dead_chain_is_deleted_iteratively() {
    const DEPTH: usize = 10_000;

    let mut f = Function::new("chain", PilLinkage::Public);
    let mut b = PilBuilder::new(&mut f);
    let entry = b.create_block(Section::Main);
    b.emit_block(entry);
    let seed = b.add_block_arg(entry, int(), OwnershipKind::Trivial);
    let first = b.integer_literal(int(), 1);
    let mut last = first;
    for _ in 0..DEPTH {
        last = b.builtin(BuiltinOp::Add, last, last, int());
    }
    b.return_(seed);

    let tip = f.value(last).defining_inst().expect("chain tip");
    let erased = recursively_delete_trivially_dead_instructions(&mut f, &[tip], false, |_, _| {});
    assert_eq!(erased, DEPTH + 1);
    assert_eq!(f.inst_count(), 1);
    assert_eq!(f.uses(seed).len(), 1);
    assert_edges_consistent(&f);
}
