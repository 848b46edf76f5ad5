//! A reference evaluator for the mid-level IR.
//!
//! [`Evaluator`] executes functions of a [`Module`] directly on the instruction
//! graph. Calls to functions without a body are routed to registered foreign stubs,
//! which receive the call arguments and the evaluator [`Memory`] so they can write
//! through error out-parameters. It exists to observe the behaviour of transformed
//! code: a lowering is correct if the evaluator reaches the same outcome before and
//! after it runs.
//!
//! Reference counting is not modelled; retains, releases and debug instructions
//! evaluate to nothing.
//!
//! # Examples
//!
//! ```rust
//! use pilopt::pil::{
//!     eval::{EvalValue, Evaluator, Outcome},
//!     Function, Module, OwnershipKind, PilBuilder, PilLinkage, PilType, Section,
//! };
//!
//! let mut f = Function::new("id", PilLinkage::Public);
//! let mut b = PilBuilder::new(&mut f);
//! let entry = b.create_block(Section::Main);
//! b.emit_block(entry);
//! let x = b.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
//! b.return_(x);
//!
//! let mut module = Module::new("m");
//! module.add_function(f);
//! let outcome = Evaluator::new(&module).run("id", vec![EvalValue::Int(5)])?;
//! assert_eq!(outcome, Outcome::Returned(EvalValue::Int(5)));
//! # Ok::<(), pilopt::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    pil::{
        BlockId, BuiltinOp, EnumCase, Function, InstId, InstKind, Module, ValueDef, ValueId,
    },
    Error, Result,
};

/// A runtime value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalValue {
    /// Any builtin integer, including `Int1` booleans.
    Int(i128),
    /// A struct with its fields in order.
    Struct(Vec<EvalValue>),
    /// An optional.
    Optional(Option<Box<EvalValue>>),
    /// A native error carrying a description.
    NativeError(String),
    /// A bridged (foreign) error carrying a description.
    BridgedError(String),
    /// A class instance.
    Object(String),
    /// A typed pointer to a memory cell.
    Pointer(usize),
    /// An address of a memory cell.
    Address(usize),
    /// A function, possibly with captured arguments.
    Function {
        /// Callee name.
        name: String,
        /// Captured arguments appended to every call.
        captures: Vec<EvalValue>,
    },
    /// The empty tuple.
    Unit,
    /// An `undef` value.
    Undef,
}

impl EvalValue {
    /// `Optional.some(value)`
    #[must_use]
    pub fn some(value: EvalValue) -> Self {
        Self::Optional(Some(Box::new(value)))
    }

    /// `Optional.none`
    #[must_use]
    pub const fn none() -> Self {
        Self::Optional(None)
    }
}

/// How a function invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Normal return with a value.
    Returned(EvalValue),
    /// Native throw with an error value.
    Threw(EvalValue),
}

/// Memory cells addressed by pointers and addresses.
#[derive(Debug, Default)]
pub struct Memory {
    cells: Vec<Option<EvalValue>>,
}

impl Memory {
    /// Allocates a cell holding `value` and returns a pointer to it.
    pub fn alloc(&mut self, value: Option<EvalValue>) -> EvalValue {
        EvalValue::Pointer(self.alloc_cell(value))
    }

    fn alloc_cell(&mut self, value: Option<EvalValue>) -> usize {
        self.cells.push(value);
        self.cells.len() - 1
    }

    fn cell_of(location: &EvalValue) -> Result<usize> {
        match location {
            EvalValue::Pointer(cell) | EvalValue::Address(cell) => Ok(*cell),
            other => Err(Error::Error(format!("not a memory location: {other:?}"))),
        }
    }

    /// Reads the cell behind a pointer or address.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` is not a pointer or the cell is uninitialized.
    pub fn load(&self, location: &EvalValue) -> Result<EvalValue> {
        let cell = Self::cell_of(location)?;
        self.cells
            .get(cell)
            .and_then(Clone::clone)
            .ok_or_else(|| Error::Error(format!("load from uninitialized cell {cell}")))
    }

    /// Writes the cell behind a pointer or address.
    ///
    /// # Errors
    ///
    /// Returns an error if `location` is not a valid pointer.
    pub fn store(&mut self, location: &EvalValue, value: EvalValue) -> Result<()> {
        let cell = Self::cell_of(location)?;
        match self.cells.get_mut(cell) {
            Some(slot) => {
                *slot = Some(value);
                Ok(())
            }
            None => Err(Error::Error(format!("store to unknown cell {cell}"))),
        }
    }
}

/// Implementation of a function without a body.
pub type ForeignStub = Box<dyn Fn(&[EvalValue], &mut Memory) -> Result<EvalValue>>;

/// Executes functions of a module.
pub struct Evaluator<'m> {
    module: &'m Module,
    stubs: HashMap<String, ForeignStub>,
    memory: Memory,
    max_steps: usize,
}

impl<'m> Evaluator<'m> {
    /// Creates an evaluator for `module`.
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        Self {
            module,
            stubs: HashMap::new(),
            memory: Memory::default(),
            max_steps: 100_000,
        }
    }

    /// Registers the implementation of a body-less function.
    pub fn stub<F>(&mut self, name: impl Into<String>, stub: F) -> &mut Self
    where
        F: Fn(&[EvalValue], &mut Memory) -> Result<EvalValue> + 'static,
    {
        self.stubs.insert(name.into(), Box::new(stub));
        self
    }

    /// The evaluator memory, for preparing pointer arguments.
    pub fn memory(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Runs `name` with the given arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the function does not exist, reaches `unreachable`,
    /// exceeds the step budget or operates on values of the wrong shape.
    pub fn run(&mut self, name: &str, args: Vec<EvalValue>) -> Result<Outcome> {
        self.call(name, args)
    }

    fn call(&mut self, name: &str, args: Vec<EvalValue>) -> Result<Outcome> {
        let module = self.module;
        match module.function(name) {
            Some(function) if function.is_definition() => self.execute(function, args),
            _ => {
                let Some(stub) = self.stubs.get(name) else {
                    return Err(Error::Error(format!("no body or stub for '{name}'")));
                };
                stub(&args, &mut self.memory).map(Outcome::Returned)
            }
        }
    }

    fn execute(&mut self, func: &Function, args: Vec<EvalValue>) -> Result<Outcome> {
        let Some(mut block) = func.entry_block() else {
            return Err(Error::Error(format!("'{}' has no body", func.name())));
        };
        let mut env: HashMap<ValueId, EvalValue> = HashMap::new();
        bind_args(func, block, args, &mut env)?;

        let mut steps = 0usize;
        loop {
            let mut next: Option<(BlockId, Vec<EvalValue>)> = None;
            for &inst in func.block(block).insts() {
                steps += 1;
                if steps > self.max_steps {
                    return Err(Error::Error(format!(
                        "step budget exhausted in '{}'",
                        func.name()
                    )));
                }

                match self.step(func, inst, &mut env)? {
                    Step::Continue => {}
                    Step::Jump(dest, values) => {
                        next = Some((dest, values));
                        break;
                    }
                    Step::Exit(outcome) => return Ok(outcome),
                }
            }

            let Some((dest, values)) = next else {
                return Err(Error::Error(format!(
                    "fell off the end of {block} in '{}'",
                    func.name()
                )));
            };
            bind_args(func, dest, values, &mut env)?;
            block = dest;
        }
    }

    fn step(
        &mut self,
        func: &Function,
        inst: InstId,
        env: &mut HashMap<ValueId, EvalValue>,
    ) -> Result<Step> {
        let operands: Vec<EvalValue> = func
            .operand_values(inst)
            .into_iter()
            .map(|value| read(func, env, value))
            .collect::<Result<_>>()?;

        let result = match func.kind(inst) {
            InstKind::IntegerLiteral { value } => Some(EvalValue::Int(*value)),
            InstKind::FunctionRef { name } => Some(EvalValue::Function {
                name: name.clone(),
                captures: Vec::new(),
            }),
            InstKind::Struct => Some(EvalValue::Struct(operands)),
            InstKind::StructExtract { field } => match &operands[0] {
                EvalValue::Struct(fields) if *field < fields.len() => Some(fields[*field].clone()),
                _ => return Err(shape_error(func, inst)),
            },
            InstKind::Enum { case } => Some(match case {
                EnumCase::Some => EvalValue::some(operands[0].clone()),
                EnumCase::None => EvalValue::none(),
            }),
            InstKind::UncheckedEnumData => match &operands[0] {
                EvalValue::Optional(Some(payload)) => Some((**payload).clone()),
                _ => return Err(shape_error(func, inst)),
            },
            InstKind::Builtin { op } => Some(builtin(*op, &operands[0], &operands[1])?),
            InstKind::AllocStack => Some(EvalValue::Address(self.memory.alloc_cell(None))),
            InstKind::Load { .. } => Some(self.memory.load(&operands[0])?),
            InstKind::Store { .. } => {
                self.memory.store(&operands[1], operands[0].clone())?;
                None
            }
            InstKind::PointerToAddress => match &operands[0] {
                EvalValue::Pointer(cell) => Some(EvalValue::Address(*cell)),
                _ => return Err(shape_error(func, inst)),
            },
            InstKind::CopyValue => Some(operands[0].clone()),
            InstKind::StrongRetain
            | InstKind::StrongRelease
            | InstKind::RetainValue
            | InstKind::ReleaseValue
            | InstKind::DestroyValue
            | InstKind::DestroyAddr
            | InstKind::DebugValue { .. }
            | InstKind::DeallocStack => None,
            InstKind::Apply { .. } => {
                let EvalValue::Function { name, captures } = &operands[0] else {
                    return Err(shape_error(func, inst));
                };
                let mut args = operands[1..].to_vec();
                args.extend(captures.iter().cloned());
                match self.call(name, args)? {
                    Outcome::Returned(value) => Some(value),
                    Outcome::Threw(error) => return Ok(Step::Exit(Outcome::Threw(error))),
                }
            }
            InstKind::PartialApply { .. } => {
                let EvalValue::Function { name, captures } = &operands[0] else {
                    return Err(shape_error(func, inst));
                };
                let mut captures = captures.clone();
                captures.extend(operands[1..].iter().cloned());
                Some(EvalValue::Function {
                    name: name.clone(),
                    captures,
                })
            }
            InstKind::ThinToThickFunction => Some(operands[0].clone()),
            InstKind::NativeToBridgedError => match &operands[0] {
                EvalValue::NativeError(message) => Some(EvalValue::BridgedError(message.clone())),
                _ => return Err(shape_error(func, inst)),
            },
            InstKind::BridgedToNativeError => match &operands[0] {
                EvalValue::BridgedError(message) => Some(EvalValue::NativeError(message.clone())),
                EvalValue::Optional(Some(inner)) => match inner.as_ref() {
                    EvalValue::BridgedError(message) => {
                        Some(EvalValue::NativeError(message.clone()))
                    }
                    _ => return Err(shape_error(func, inst)),
                },
                EvalValue::Optional(None) => Some(EvalValue::NativeError("<nil>".into())),
                _ => return Err(shape_error(func, inst)),
            },
            InstKind::Branch { dest } => return Ok(Step::Jump(*dest, operands)),
            InstKind::CondBranch {
                true_dest,
                false_dest,
                true_args,
            } => {
                let split = 1 + true_args;
                return match operands[0] {
                    EvalValue::Int(0) => Ok(Step::Jump(*false_dest, operands[split..].to_vec())),
                    EvalValue::Int(_) => Ok(Step::Jump(*true_dest, operands[1..split].to_vec())),
                    _ => Err(shape_error(func, inst)),
                };
            }
            InstKind::SwitchEnum { cases, default } => {
                let (case, payload) = match &operands[0] {
                    EvalValue::Optional(Some(payload)) => (EnumCase::Some, vec![(**payload).clone()]),
                    EvalValue::Optional(None) => (EnumCase::None, Vec::new()),
                    _ => return Err(shape_error(func, inst)),
                };
                if let Some((_, dest)) = cases.iter().find(|(c, _)| *c == case) {
                    return Ok(Step::Jump(*dest, payload));
                }
                return match default {
                    Some(dest) => Ok(Step::Jump(*dest, Vec::new())),
                    None => Err(shape_error(func, inst)),
                };
            }
            InstKind::Return => return Ok(Step::Exit(Outcome::Returned(operands[0].clone()))),
            InstKind::Throw => return Ok(Step::Exit(Outcome::Threw(operands[0].clone()))),
            InstKind::Unreachable => {
                return Err(Error::Error(format!(
                    "reached unreachable in '{}'",
                    func.name()
                )))
            }
        };

        if let (Some(value), Some(&target)) = (result, func.results(inst).first()) {
            env.insert(target, value);
        }
        Ok(Step::Continue)
    }
}

enum Step {
    Continue,
    Jump(BlockId, Vec<EvalValue>),
    Exit(Outcome),
}

fn bind_args(
    func: &Function,
    block: BlockId,
    values: Vec<EvalValue>,
    env: &mut HashMap<ValueId, EvalValue>,
) -> Result<()> {
    let params = func.block(block).args();
    if params.len() != values.len() {
        return Err(Error::Error(format!(
            "{block} of '{}' expects {} argument(s), got {}",
            func.name(),
            params.len(),
            values.len()
        )));
    }
    for (&param, value) in params.iter().zip(values) {
        env.insert(param, value);
    }
    Ok(())
}

fn read(func: &Function, env: &HashMap<ValueId, EvalValue>, value: ValueId) -> Result<EvalValue> {
    if let Some(known) = env.get(&value) {
        return Ok(known.clone());
    }
    match func.value(value).def() {
        ValueDef::Undef => Ok(EvalValue::Undef),
        _ => Err(Error::Error(format!(
            "{value} read before definition in '{}'",
            func.name()
        ))),
    }
}

fn builtin(op: BuiltinOp, lhs: &EvalValue, rhs: &EvalValue) -> Result<EvalValue> {
    let (EvalValue::Int(a), EvalValue::Int(b)) = (lhs, rhs) else {
        return Err(Error::Error(format!(
            "builtin {op} on non-integers {lhs:?}, {rhs:?}"
        )));
    };
    Ok(match op {
        BuiltinOp::CmpEq => EvalValue::Int(i128::from(a == b)),
        BuiltinOp::CmpNe => EvalValue::Int(i128::from(a != b)),
        BuiltinOp::Add => EvalValue::Int(a.wrapping_add(*b)),
        BuiltinOp::Sub => EvalValue::Int(a.wrapping_sub(*b)),
        BuiltinOp::Expect => EvalValue::Int(*a),
    })
}

fn shape_error(func: &Function, inst: InstId) -> Error {
    Error::Error(format!(
        "{} in '{}' applied to a value of the wrong shape",
        func.kind(inst).mnemonic(),
        func.name()
    ))
}
