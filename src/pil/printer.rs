//! Deterministic textual form of functions and modules.
//!
//! Values are renumbered in layout order (block arguments first, then instruction
//! results) and blocks are named by layout position, so two structurally equal
//! functions print identically no matter which arena slots they occupy.

use std::{collections::HashMap, fmt};

use crate::pil::{Function, InstId, InstKind, Module, ValueDef, ValueId};

struct Numbering {
    values: HashMap<ValueId, usize>,
    blocks: HashMap<crate::pil::BlockId, usize>,
}

impl Numbering {
    fn new(func: &Function) -> Self {
        let mut values = HashMap::new();
        let mut blocks = HashMap::new();
        for (position, &block) in func.layout().iter().enumerate() {
            blocks.insert(block, position);
            for &arg in func.block(block).args() {
                let next = values.len();
                values.insert(arg, next);
            }
            for &inst in func.block(block).insts() {
                for &result in func.results(inst) {
                    let next = values.len();
                    values.insert(result, next);
                }
            }
        }
        Self { values, blocks }
    }

    fn value(&self, func: &Function, value: ValueId) -> String {
        match self.values.get(&value) {
            Some(n) => format!("%{n}"),
            None if matches!(func.value(value).def(), ValueDef::Undef) => "undef".to_string(),
            None => format!("<dangling {value}>"),
        }
    }

    fn block(&self, block: crate::pil::BlockId) -> String {
        self.blocks
            .get(&block)
            .map_or_else(|| format!("<dangling {block}>"), |n| format!("bb{n}"))
    }
}

fn write_inst(
    f: &mut fmt::Formatter<'_>,
    func: &Function,
    names: &Numbering,
    inst: InstId,
) -> fmt::Result {
    let record = func.inst(inst);
    let operands: Vec<String> = func
        .operand_values(inst)
        .into_iter()
        .map(|value| names.value(func, value))
        .collect();
    let list = |values: &[String]| values.join(", ");

    write!(f, "  ")?;
    if !record.results().is_empty() {
        let results: Vec<String> = record
            .results()
            .iter()
            .map(|&value| names.value(func, value))
            .collect();
        write!(f, "{} = ", list(&results))?;
    }

    let mnemonic = record.kind().mnemonic();
    match record.kind() {
        InstKind::IntegerLiteral { value } => write!(f, "{mnemonic} {value}")?,
        InstKind::FunctionRef { name } => write!(f, "{mnemonic} @{name}")?,
        InstKind::StructExtract { field } => {
            write!(f, "{mnemonic} {}, #{field}", list(&operands))?;
        }
        InstKind::Enum { case } => write!(f, "{mnemonic} {case} {}", list(&operands))?,
        InstKind::Builtin { op } => write!(f, "{mnemonic} \"{op}\"({})", list(&operands))?,
        InstKind::Load { qualifier } => write!(f, "{mnemonic} [{qualifier}] {}", operands[0])?,
        InstKind::Store { qualifier } => write!(
            f,
            "{mnemonic} {} to [{qualifier}] {}",
            operands[0], operands[1]
        )?,
        InstKind::DebugValue { name } => {
            write!(f, "{mnemonic} {}, let, name \"{name}\"", operands[0])?;
        }
        InstKind::Apply {
            foreign_error,
            does_not_throw,
        } => {
            write!(f, "{mnemonic} ")?;
            if *does_not_throw {
                write!(f, "[nothrow] ")?;
            }
            if let Some(convention) = foreign_error {
                write!(f, "[foreign_error {}] ", convention.kind)?;
            }
            write!(f, "{}({})", operands[0], list(&operands[1..]))?;
        }
        InstKind::PartialApply { on_stack, captured } => {
            write!(f, "{mnemonic} ")?;
            if *on_stack {
                write!(f, "[on_stack] ")?;
            }
            let captures: Vec<String> = operands[1..]
                .iter()
                .zip(captured)
                .map(|(value, convention)| format!("{convention} {value}"))
                .collect();
            write!(f, "{}({})", operands[0], list(&captures))?;
        }
        InstKind::Branch { dest } => {
            write!(f, "{mnemonic} {}", names.block(*dest))?;
            if !operands.is_empty() {
                write!(f, "({})", list(&operands))?;
            }
        }
        InstKind::CondBranch {
            true_dest,
            false_dest,
            true_args,
        } => {
            let split = 1 + true_args;
            write!(
                f,
                "{mnemonic} {}, {}({}), {}({})",
                operands[0],
                names.block(*true_dest),
                list(&operands[1..split]),
                names.block(*false_dest),
                list(&operands[split..])
            )?;
        }
        InstKind::SwitchEnum { cases, default } => {
            write!(f, "{mnemonic} {}", operands[0])?;
            for (case, dest) in cases {
                write!(f, ", case {case}: {}", names.block(*dest))?;
            }
            if let Some(dest) = default {
                write!(f, ", default {}", names.block(*dest))?;
            }
        }
        _ if operands.is_empty() => write!(f, "{mnemonic}")?,
        _ => write!(f, "{mnemonic} {}", list(&operands))?,
    }

    if let Some(&result) = record.results().first() {
        write!(f, " : ${}", func.ty(result))?;
    }
    writeln!(f)
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = Numbering::new(self);
        write!(f, "pil [{}] ", self.linkage())?;
        if self.has_ownership() {
            write!(f, "[ossa] ")?;
        }
        if self.throws() {
            write!(f, "[throws] ")?;
        }
        write!(f, "@{}", self.name())?;
        if !self.is_definition() {
            return writeln!(f);
        }
        writeln!(f, " {{")?;

        for (position, &block) in self.layout().iter().enumerate() {
            if position > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", names.block(block))?;
            let args: Vec<String> = self
                .block(block)
                .args()
                .iter()
                .map(|&arg| {
                    format!(
                        "{} : ${} @{}",
                        names.value(self, arg),
                        self.ty(arg),
                        self.ownership(arg)
                    )
                })
                .collect();
            if !args.is_empty() {
                write!(f, "({})", args.join(", "))?;
            }
            writeln!(f, ":")?;
            for &inst in self.block(block).insts() {
                write_inst(f, self, &names, inst)?;
            }
        }
        writeln!(f, "}} // end pil function '{}'", self.name())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pil_stage canonical // module {}", self.name())?;
        for function in self.functions() {
            writeln!(f)?;
            write!(f, "{function}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::pil::{Function, OwnershipKind, PilBuilder, PilLinkage, PilType, Section};

    fn sample(extra_dead_slot: bool) -> Function {
        let mut f = Function::new("sample", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let arg = b.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
        if extra_dead_slot {
            let dead = b.integer_literal(PilType::Int(64), 7);
            let inst = b.function().value(dead).defining_inst();
            if let Some(inst) = inst {
                b.function_mut().erase_inst(inst);
            }
        }
        let zero = b.integer_literal(PilType::Int(64), 0);
        let cond = b.cmp_ne(arg, zero);
        let yes = b.create_block(Section::Main);
        let no = b.create_block(Section::Postmatter);
        b.cond_branch(cond, yes, &[], no, &[]);
        b.emit_block(yes);
        b.return_(arg);
        b.emit_block(no);
        b.unreachable();
        f
    }

    #[test]
    fn test_printing_ignores_arena_slots() {
        let a = sample(false).to_string();
        let b = sample(true).to_string();
        assert_eq!(a, b);
        assert!(a.contains("%2 = builtin \"cmp_ne\"(%0, %1) : $Builtin.Int1"));
        assert!(a.contains("cond_br %2, bb1(), bb2()"));
        assert!(a.ends_with("} // end pil function 'sample'\n"));
    }
}
