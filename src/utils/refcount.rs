//! Reference-count increments and decrements.

use crate::pil::{Function, InstId, PilBuilder, ValueId};

/// Inserts a retain of `value` immediately before `before`.
///
/// Emits `strong_retain` for single reference-counted pointers and `retain_value`
/// for other non-trivial values.
///
/// # Returns
///
/// The new instruction, or `None` if the type of `value` is trivial.
pub fn create_increment_before(func: &mut Function, value: ValueId, before: InstId) -> Option<InstId> {
    let ty = func.ty(value);
    if ty.is_trivial() {
        return None;
    }
    let reference_counted = ty.is_reference_counted();
    let mut builder = PilBuilder::before(func, before);
    Some(if reference_counted {
        builder.strong_retain(value)
    } else {
        builder.retain_value(value)
    })
}

/// Inserts a release of `value` immediately before `before`.
///
/// # Returns
///
/// The new instruction, or `None` if the type of `value` is trivial.
pub fn create_decrement_before(func: &mut Function, value: ValueId, before: InstId) -> Option<InstId> {
    let ty = func.ty(value);
    if ty.is_trivial() {
        return None;
    }
    let reference_counted = ty.is_reference_counted();
    let mut builder = PilBuilder::before(func, before);
    Some(if reference_counted {
        builder.strong_release(value)
    } else {
        builder.release_value(value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pil::{InstKind, OwnershipKind, PilLinkage, PilType, Section};

    #[test]
    fn test_increment_and_decrement_forms() {
        let mut f = Function::new("f", PilLinkage::Private);
        f.set_has_ownership(false);
        let entry = f.create_block(Section::Main);
        let object = f.add_block_arg(entry, PilType::Object("Klass".into()), OwnershipKind::None);
        let pair = f.add_block_arg(
            entry,
            PilType::structure(
                "Pair",
                vec![
                    ("a".into(), PilType::Object("Klass".into())),
                    ("b".into(), PilType::Int(8)),
                ],
            ),
            OwnershipKind::None,
        );
        let count = f.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
        let ret = PilBuilder::at_end(&mut f, entry).return_(count);

        let retain = create_increment_before(&mut f, object, ret).map(|i| f.kind(i).clone());
        assert_eq!(retain, Some(InstKind::StrongRetain));
        let release = create_decrement_before(&mut f, pair, ret).map(|i| f.kind(i).clone());
        assert_eq!(release, Some(InstKind::ReleaseValue));
        assert_eq!(create_increment_before(&mut f, count, ret), None);
        assert_eq!(f.block(entry).insts().last(), Some(&ret));
    }
}
