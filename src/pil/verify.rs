//! Structural verification of functions.
//!
//! The checks here are the invariants every pass must preserve:
//!
//! 1. **Use lists**: operands and use lists are a bijection
//! 2. **Definitions**: result and argument back-pointers match their owners
//! 3. **Blocks**: each laid-out block ends in exactly one terminator
//! 4. **Layout**: every live block is laid out once, main blocks before postmatter blocks
//! 5. **Edges**: successors are live and receive the right number and types of arguments

use std::collections::HashSet;

use crate::{
    pil::{EnumCase, Function, InstKind, Section, ValueDef},
    Result,
};

impl Function {
    /// Checks the structural invariants of the function.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Verification`] describing the first violated invariant.
    pub fn verify(&self) -> Result<()> {
        self.verify_use_lists()?;
        self.verify_definitions()?;
        self.verify_layout()?;
        for &block in &self.layout {
            self.verify_block(block)?;
        }
        Ok(())
    }

    fn verify_use_lists(&self) -> Result<()> {
        for (operand_id, operand) in self.operands.iter() {
            let Some(user) = self.insts.get(operand.user) else {
                return Err(invariant_error!(
                    "{}: operand {operand_id} belongs to erased instruction {}",
                    self.name(),
                    operand.user
                ));
            };
            if user.operands.get(operand.index) != Some(&operand_id) {
                return Err(invariant_error!(
                    "{}: operand {operand_id} is not at position {} of its user",
                    self.name(),
                    operand.index
                ));
            }
            let Some(value) = self.values.get(operand.value) else {
                return Err(invariant_error!(
                    "{}: operand {operand_id} uses erased value {}",
                    self.name(),
                    operand.value
                ));
            };
            let occurrences = value.uses.iter().filter(|&&u| u == operand_id).count();
            if occurrences != 1 {
                return Err(invariant_error!(
                    "{}: operand {operand_id} appears {occurrences} times in the use list of {}",
                    self.name(),
                    operand.value
                ));
            }
        }

        for (value_id, value) in self.values.iter() {
            for &use_ in &value.uses {
                match self.operands.get(use_) {
                    Some(operand) if operand.value == value_id => {}
                    _ => {
                        return Err(invariant_error!(
                            "{}: use list of {value_id} holds dangling operand {use_}",
                            self.name()
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    fn verify_definitions(&self) -> Result<()> {
        for (inst_id, inst) in self.insts.iter() {
            for (index, &result) in inst.results.iter().enumerate() {
                let def = self.values.get(result).map(|value| value.def);
                if def != Some(ValueDef::Result { inst: inst_id, index }) {
                    return Err(invariant_error!(
                        "{}: result {index} of {inst_id} has a broken definition link",
                        self.name()
                    ));
                }
            }
        }
        for (block_id, block) in self.blocks.iter() {
            for (index, &arg) in block.args.iter().enumerate() {
                let def = self.values.get(arg).map(|value| value.def);
                if def != Some(ValueDef::BlockArg { block: block_id, index }) {
                    return Err(invariant_error!(
                        "{}: argument {index} of {block_id} has a broken definition link",
                        self.name()
                    ));
                }
            }
        }
        Ok(())
    }

    fn verify_layout(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut in_postmatter = false;
        for &block in &self.layout {
            let Some(record) = self.blocks.get(block) else {
                return Err(invariant_error!(
                    "{}: layout refers to erased block {block}",
                    self.name()
                ));
            };
            if !seen.insert(block) {
                return Err(invariant_error!("{}: block {block} laid out twice", self.name()));
            }
            match record.section {
                Section::Postmatter => in_postmatter = true,
                Section::Main if in_postmatter => {
                    return Err(invariant_error!(
                        "{}: main block {block} laid out after postmatter",
                        self.name()
                    ))
                }
                Section::Main => {}
            }
        }
        if seen.len() != self.blocks.len() {
            return Err(invariant_error!(
                "{}: {} live blocks but {} laid out",
                self.name(),
                self.blocks.len(),
                seen.len()
            ));
        }
        Ok(())
    }

    fn verify_block(&self, block: crate::pil::BlockId) -> Result<()> {
        let record = &self.blocks[block];
        let Some(&last) = record.insts.last() else {
            return Err(invariant_error!("{}: block {block} is empty", self.name()));
        };

        for &inst in &record.insts {
            if self.insts.get(inst).and_then(|i| i.block) != Some(block) {
                return Err(invariant_error!(
                    "{}: instruction {inst} listed in {block} has a different parent",
                    self.name()
                ));
            }
            let is_terminator = self.insts[inst].kind.is_terminator();
            if is_terminator != (inst == last) {
                return Err(invariant_error!(
                    "{}: block {block} must end in exactly one terminator ({} at {inst})",
                    self.name(),
                    self.insts[inst].kind.mnemonic()
                ));
            }
        }

        for (dest, args) in self.successor_args(last) {
            let Some(target) = self.blocks.get(dest) else {
                return Err(invariant_error!(
                    "{}: {block} branches to erased block {dest}",
                    self.name()
                ));
            };
            if matches!(self.insts[last].kind, InstKind::SwitchEnum { .. }) {
                continue;
            }
            if target.args.len() != args.len() {
                return Err(invariant_error!(
                    "{}: {block} passes {} argument(s) to {dest} which takes {}",
                    self.name(),
                    args.len(),
                    target.args.len()
                ));
            }
            for (arg, param) in args.iter().zip(&target.args) {
                if self.values[*arg].ty != self.values[*param].ty {
                    return Err(invariant_error!(
                        "{}: {block} passes {arg} : {} to {dest} parameter {param} : {}",
                        self.name(),
                        self.values[*arg].ty,
                        self.values[*param].ty
                    ));
                }
            }
        }

        if let InstKind::SwitchEnum { cases, default } = &self.insts[last].kind {
            for (case, dest) in cases {
                let expected = usize::from(*case == EnumCase::Some);
                if self.blocks[*dest].args.len() != expected {
                    return Err(invariant_error!(
                        "{}: switch_enum case {case} destination {dest} must take {expected} argument(s)",
                        self.name()
                    ));
                }
            }
            if let Some(dest) = default {
                if !self.blocks[*dest].args.is_empty() {
                    return Err(invariant_error!(
                        "{}: switch_enum default {dest} must not take arguments",
                        self.name()
                    ));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        pil::{Function, InsertPoint, InstKind, OwnershipKind, PilLinkage, PilType, Section},
        Error,
    };

    #[test]
    fn test_unterminated_block_fails() {
        let mut f = Function::new("f", PilLinkage::Private);
        let entry = f.create_block(Section::Main);
        f.insert_inst(
            InstKind::IntegerLiteral { value: 0 },
            &[],
            vec![(PilType::Int(8), OwnershipKind::Trivial)],
            InsertPoint::End(entry),
        );
        assert!(matches!(f.verify(), Err(Error::Verification { .. })));
    }

    #[test]
    fn test_branch_arity_mismatch_fails() {
        let mut f = Function::new("f", PilLinkage::Private);
        let entry = f.create_block(Section::Main);
        let exit = f.create_block(Section::Main);
        f.add_block_arg(exit, PilType::Int(8), OwnershipKind::Trivial);
        f.insert_inst(InstKind::Branch { dest: exit }, &[], vec![], InsertPoint::End(entry));
        f.insert_inst(InstKind::Unreachable, &[], vec![], InsertPoint::End(exit));

        let err = f.verify().unwrap_err();
        assert!(err.to_string().contains("passes 0 argument(s)"));
    }
}
