//! Use iteration that looks through the builtin `expect`.

use crate::pil::{BuiltinOp, Function, InstId, InstKind, OperandId, ValueId};

fn is_expect(func: &Function, inst: InstId) -> bool {
    matches!(
        func.kind(inst),
        InstKind::Builtin {
            op: BuiltinOp::Expect
        }
    )
}

/// Uses of `value` as if `expect` builtins using it were not there.
///
/// A use by an `expect` is replaced by the uses of that `expect`'s result, in use
/// order. Only one level is looked through: the uses of an `expect` that is itself
/// fed into another `expect` are not expanded further.
pub fn ignore_expect_uses(func: &Function, value: ValueId) -> impl Iterator<Item = OperandId> + '_ {
    func.uses(value).iter().flat_map(move |&operand| {
        let user = func.operand(operand).user();
        if is_expect(func, user) {
            func.results(user)
                .iter()
                .flat_map(|&result| func.uses(result).iter().copied())
                .collect::<Vec<_>>()
        } else {
            vec![operand]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pil::{OwnershipKind, PilBuilder, PilLinkage, PilType, Section};

    #[test]
    fn test_looks_through_one_expect() {
        let mut f = Function::new("f", PilLinkage::Private);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let cond = b.add_block_arg(entry, PilType::Int(1), OwnershipKind::Trivial);
        let likely = b.integer_literal(PilType::Int(1), 1);
        let hinted = b.expect(cond, likely);
        let rehinted = b.expect(hinted, likely);
        let unused = b.expect(cond, likely);
        let direct = b.debug_value(cond, "c");
        let yes = b.create_block(Section::Main);
        let no = b.create_block(Section::Main);
        let br = b.cond_branch(rehinted, yes, &[], no, &[]);
        b.emit_block(yes);
        b.return_(cond);
        b.emit_block(no);
        b.return_(hinted);

        let users: Vec<InstId> = ignore_expect_uses(&f, cond)
            .map(|operand| f.operand(operand).user())
            .collect();
        let rehinted_inst = f.value(rehinted).defining_inst().unwrap();
        assert_eq!(users[0], rehinted_inst);
        assert!(users.contains(&direct));
        assert!(!users.contains(&br));
        assert!(!users.contains(&f.value(unused).defining_inst().unwrap()));
        assert_eq!(users.len(), 4);
    }
}
