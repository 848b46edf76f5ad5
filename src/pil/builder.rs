//! Instruction builder with an insertion point.
//!
//! [`PilBuilder`] wraps a mutable [`Function`] and creates instructions at its
//! current insertion point, computing result types and ownership from the
//! operands. It is the only way passes and lowerings create instructions, so the
//! typing rules live in one place.
//!
//! # Examples
//!
//! ```rust
//! use pilopt::pil::{Function, PilBuilder, PilLinkage, PilType, Section};
//!
//! let mut f = Function::new("answer", PilLinkage::Public);
//! let mut b = PilBuilder::new(&mut f);
//! let entry = b.create_block(Section::Main);
//! b.emit_block(entry);
//! let value = b.integer_literal(PilType::Int(64), 42);
//! b.return_(value);
//! assert!(f.verify().is_ok());
//! ```

use crate::pil::{
    BlockId, BuiltinOp, EnumCase, ForeignErrorConvention, Function, InsertPoint, InstId, InstKind,
    LoadQualifier, OwnershipKind, ParameterConvention, PilType, Section, SourceLoc,
    StoreQualifier, ValueId,
};

/// A saved builder position, restored with [`PilBuilder::restore_insertion_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedInsertionPoint(Option<InsertPoint>);

/// Creates instructions at an insertion point inside one function.
pub struct PilBuilder<'f> {
    func: &'f mut Function,
    insertion_point: Option<InsertPoint>,
    loc: Option<SourceLoc>,
}

impl<'f> PilBuilder<'f> {
    /// Creates a builder without an insertion point.
    pub fn new(func: &'f mut Function) -> Self {
        Self {
            func,
            insertion_point: None,
            loc: None,
        }
    }

    /// Creates a builder inserting immediately before `inst`.
    pub fn before(func: &'f mut Function, inst: InstId) -> Self {
        let loc = func.inst(inst).loc();
        Self {
            func,
            insertion_point: Some(InsertPoint::Before(inst)),
            loc,
        }
    }

    /// Creates a builder appending to `block`.
    pub fn at_end(func: &'f mut Function, block: BlockId) -> Self {
        Self {
            func,
            insertion_point: Some(InsertPoint::End(block)),
            loc: None,
        }
    }

    /// The function being built.
    #[must_use]
    pub fn function(&self) -> &Function {
        self.func
    }

    /// Mutable access to the function being built.
    pub fn function_mut(&mut self) -> &mut Function {
        self.func
    }

    /// The current insertion point.
    #[must_use]
    pub const fn insertion_point(&self) -> Option<InsertPoint> {
        self.insertion_point
    }

    /// Moves the insertion point.
    pub fn set_insertion_point(&mut self, point: InsertPoint) {
        self.insertion_point = Some(point);
    }

    /// The block instructions are currently inserted into.
    #[must_use]
    pub fn insertion_block(&self) -> Option<BlockId> {
        match self.insertion_point? {
            InsertPoint::End(block) => Some(block),
            InsertPoint::Before(inst) => Some(self.func.parent_block(inst)),
        }
    }

    /// Remembers the current insertion point.
    #[must_use]
    pub const fn save_insertion_point(&self) -> SavedInsertionPoint {
        SavedInsertionPoint(self.insertion_point)
    }

    /// Restores a saved insertion point.
    pub fn restore_insertion_point(&mut self, saved: SavedInsertionPoint) {
        self.insertion_point = saved.0;
    }

    /// Sets the location attached to new instructions.
    pub fn set_loc(&mut self, loc: Option<SourceLoc>) {
        self.loc = loc;
    }

    /// The location attached to new instructions.
    #[must_use]
    pub const fn loc(&self) -> Option<SourceLoc> {
        self.loc
    }

    /// Creates a block in `section` without moving the insertion point.
    pub fn create_block(&mut self, section: Section) -> BlockId {
        self.func.create_block(section)
    }

    /// Creates a block laid out right after the insertion block, in its section.
    ///
    /// Falls back to the end of the main section without an insertion point.
    pub fn create_block_after_insertion_block(&mut self) -> BlockId {
        match self.insertion_block() {
            Some(current) => self.func.create_block_after(current),
            None => self.func.create_block(Section::Main),
        }
    }

    /// Starts emitting into `block`.
    pub fn emit_block(&mut self, block: BlockId) {
        self.insertion_point = Some(InsertPoint::End(block));
    }

    /// Appends an argument to `block`.
    pub fn add_block_arg(
        &mut self,
        block: BlockId,
        ty: PilType,
        ownership: OwnershipKind,
    ) -> ValueId {
        let ownership = self.adjust(ownership);
        self.func.add_block_arg(block, ty, ownership)
    }

    /// Ownership of a fresh owned value of type `ty` in this function.
    #[must_use]
    pub fn owned(&self, ty: &PilType) -> OwnershipKind {
        self.adjust(OwnershipKind::for_type(ty, true))
    }

    fn guaranteed(&self, ty: &PilType) -> OwnershipKind {
        self.adjust(OwnershipKind::for_type(ty, false))
    }

    fn adjust(&self, ownership: OwnershipKind) -> OwnershipKind {
        if self.func.has_ownership() || ownership == OwnershipKind::Trivial {
            ownership
        } else {
            OwnershipKind::None
        }
    }

    /// Creates an instruction at the insertion point.
    ///
    /// # Panics
    ///
    /// Panics if the builder has no insertion point.
    pub fn insert(
        &mut self,
        kind: InstKind,
        operands: &[ValueId],
        results: Vec<(PilType, OwnershipKind)>,
    ) -> InstId {
        let Some(point) = self.insertion_point else {
            panic!("builder for {} has no insertion point", self.func.name());
        };
        let inst = self.func.insert_inst(kind, operands, results, point);
        self.func.set_loc(inst, self.loc);
        inst
    }

    fn single(
        &mut self,
        kind: InstKind,
        operands: &[ValueId],
        ty: PilType,
        ownership: OwnershipKind,
    ) -> ValueId {
        let inst = self.insert(kind, operands, vec![(ty, ownership)]);
        self.func.results(inst)[0]
    }

    /// `integer_literal $ty, value`
    pub fn integer_literal(&mut self, ty: PilType, value: i128) -> ValueId {
        self.single(
            InstKind::IntegerLiteral { value },
            &[],
            ty,
            OwnershipKind::Trivial,
        )
    }

    /// `function_ref @name`
    pub fn function_ref(&mut self, name: impl Into<String>) -> ValueId {
        self.single(
            InstKind::FunctionRef { name: name.into() },
            &[],
            PilType::Function { thick: false },
            OwnershipKind::Trivial,
        )
    }

    /// `struct $ty (fields...)`
    pub fn struct_(&mut self, ty: PilType, fields: &[ValueId]) -> ValueId {
        let ownership = self.owned(&ty);
        self.single(InstKind::Struct, fields, ty, ownership)
    }

    /// `struct_extract value, #field`
    ///
    /// # Panics
    ///
    /// Panics if `value` is not a struct or has no such field.
    pub fn struct_extract(&mut self, value: ValueId, field: usize) -> ValueId {
        let ty = match self
            .func
            .ty(value)
            .struct_fields()
            .and_then(|fields| fields.get(field))
        {
            Some((_, ty)) => ty.clone(),
            None => panic!(
                "struct_extract of field {field} from non-struct {} : {}",
                value,
                self.func.ty(value)
            ),
        };
        let ownership = self.guaranteed(&ty);
        self.single(InstKind::StructExtract { field }, &[value], ty, ownership)
    }

    /// `enum $Optional<T>, #Optional.some, payload`
    pub fn enum_some(&mut self, payload: ValueId, optional: PilType) -> ValueId {
        let ownership = self.owned(&optional);
        self.single(
            InstKind::Enum {
                case: EnumCase::Some,
            },
            &[payload],
            optional,
            ownership,
        )
    }

    /// `enum $Optional<T>, #Optional.none`
    pub fn enum_none(&mut self, optional: PilType) -> ValueId {
        let ownership = if optional.is_trivial() {
            OwnershipKind::Trivial
        } else {
            OwnershipKind::None
        };
        self.single(
            InstKind::Enum {
                case: EnumCase::None,
            },
            &[],
            optional,
            ownership,
        )
    }

    /// `unchecked_enum_data optional, #Optional.some`
    ///
    /// # Panics
    ///
    /// Panics if `optional` is not of optional type.
    pub fn unchecked_enum_data(&mut self, optional: ValueId) -> ValueId {
        let Some(payload) = self.func.ty(optional).optional_object_type().cloned() else {
            panic!(
                "unchecked_enum_data of non-optional {optional} : {}",
                self.func.ty(optional)
            );
        };
        let ownership = self.owned(&payload);
        self.single(InstKind::UncheckedEnumData, &[optional], payload, ownership)
    }

    /// `builtin "op"(lhs, rhs) : $result`
    pub fn builtin(
        &mut self,
        op: BuiltinOp,
        lhs: ValueId,
        rhs: ValueId,
        result: PilType,
    ) -> ValueId {
        self.single(
            InstKind::Builtin { op },
            &[lhs, rhs],
            result,
            OwnershipKind::Trivial,
        )
    }

    /// `builtin "cmp_ne"(lhs, rhs) : $Builtin.Int1`
    pub fn cmp_ne(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.builtin(BuiltinOp::CmpNe, lhs, rhs, PilType::Int(1))
    }

    /// `builtin "cmp_eq"(lhs, rhs) : $Builtin.Int1`
    pub fn cmp_eq(&mut self, lhs: ValueId, rhs: ValueId) -> ValueId {
        self.builtin(BuiltinOp::CmpEq, lhs, rhs, PilType::Int(1))
    }

    /// `builtin "int_expect"(value, expected)`
    pub fn expect(&mut self, value: ValueId, expected: ValueId) -> ValueId {
        let ty = self.func.ty(value).clone();
        self.builtin(BuiltinOp::Expect, value, expected, ty)
    }

    /// `alloc_stack $ty`
    pub fn alloc_stack(&mut self, ty: PilType) -> ValueId {
        self.single(
            InstKind::AllocStack,
            &[],
            PilType::address(ty),
            OwnershipKind::Trivial,
        )
    }

    /// `dealloc_stack addr`
    pub fn dealloc_stack(&mut self, addr: ValueId) -> InstId {
        self.insert(InstKind::DeallocStack, &[addr], vec![])
    }

    /// `load [qualifier] addr`
    pub fn load(&mut self, addr: ValueId, qualifier: LoadQualifier) -> ValueId {
        let ty = self.func.ty(addr).object_type().clone();
        let ownership = match qualifier {
            LoadQualifier::Trivial => OwnershipKind::Trivial,
            LoadQualifier::Take | LoadQualifier::Copy => self.owned(&ty),
        };
        self.single(InstKind::Load { qualifier }, &[addr], ty, ownership)
    }

    /// Loads with the qualifier appropriate for the stored type.
    pub fn emit_load_value_operation(&mut self, addr: ValueId, qualifier: LoadQualifier) -> ValueId {
        let qualifier = if self.func.ty(addr).object_type().is_trivial() {
            LoadQualifier::Trivial
        } else {
            qualifier
        };
        self.load(addr, qualifier)
    }

    /// `store src to [qualifier] addr`
    pub fn store(&mut self, src: ValueId, addr: ValueId, qualifier: StoreQualifier) -> InstId {
        let qualifier = if self.func.ty(src).is_trivial() {
            StoreQualifier::Trivial
        } else {
            qualifier
        };
        self.insert(InstKind::Store { qualifier }, &[src, addr], vec![])
    }

    /// `pointer_to_address pointer to $*T`
    ///
    /// # Panics
    ///
    /// Panics if `pointer` is not a typed pointer.
    pub fn pointer_to_address(&mut self, pointer: ValueId) -> ValueId {
        let Some((_, pointee)) = self.func.ty(pointer).pointer_element_type() else {
            panic!(
                "pointer_to_address of non-pointer {pointer} : {}",
                self.func.ty(pointer)
            );
        };
        let ty = PilType::address(pointee.clone());
        self.single(InstKind::PointerToAddress, &[pointer], ty, OwnershipKind::Trivial)
    }

    /// `strong_retain value`
    pub fn strong_retain(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::StrongRetain, &[value], vec![])
    }

    /// `strong_release value`
    pub fn strong_release(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::StrongRelease, &[value], vec![])
    }

    /// `retain_value value`
    pub fn retain_value(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::RetainValue, &[value], vec![])
    }

    /// `release_value value`
    pub fn release_value(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::ReleaseValue, &[value], vec![])
    }

    /// `copy_value value`
    pub fn copy_value(&mut self, value: ValueId) -> ValueId {
        let ty = self.func.ty(value).clone();
        let ownership = self.owned(&ty);
        self.single(InstKind::CopyValue, &[value], ty, ownership)
    }

    /// `destroy_value value`
    pub fn destroy_value(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::DestroyValue, &[value], vec![])
    }

    /// `destroy_addr addr`
    pub fn destroy_addr(&mut self, addr: ValueId) -> InstId {
        self.insert(InstKind::DestroyAddr, &[addr], vec![])
    }

    /// Ends the lifetime of `value` in the form the function's ownership mode uses:
    /// `destroy_value` in ownership SSA, otherwise a release. Emits nothing for
    /// trivial values.
    pub fn emit_destroy_value_operation(&mut self, value: ValueId) -> Option<InstId> {
        let ty = self.func.ty(value);
        if ty.is_trivial() {
            return None;
        }
        let reference_counted = ty.is_reference_counted();
        if self.func.has_ownership() {
            Some(self.destroy_value(value))
        } else if reference_counted {
            Some(self.strong_release(value))
        } else {
            Some(self.release_value(value))
        }
    }

    /// `debug_value value, name`
    pub fn debug_value(&mut self, value: ValueId, name: impl Into<String>) -> InstId {
        self.insert(InstKind::DebugValue { name: name.into() }, &[value], vec![])
    }

    /// `apply callee(args...) : $result`
    ///
    /// # Arguments
    ///
    /// * `callee` - Function value being called
    /// * `args` - Call arguments
    /// * `result` - Result type of the call
    /// * `foreign_error` - Foreign error convention of the callee, if any
    pub fn apply(
        &mut self,
        callee: ValueId,
        args: &[ValueId],
        result: PilType,
        foreign_error: Option<ForeignErrorConvention>,
    ) -> InstId {
        let ownership = self.owned(&result);
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(args);
        self.insert(
            InstKind::Apply {
                foreign_error,
                does_not_throw: false,
            },
            &operands,
            vec![(result, ownership)],
        )
    }

    /// `partial_apply [on_stack] callee(captures...)`
    ///
    /// # Panics
    ///
    /// Panics if the number of conventions differs from the number of captures.
    pub fn partial_apply(
        &mut self,
        callee: ValueId,
        captures: &[ValueId],
        conventions: Vec<ParameterConvention>,
        on_stack: bool,
    ) -> ValueId {
        assert_eq!(
            captures.len(),
            conventions.len(),
            "partial_apply needs one convention per capture"
        );
        let ty = PilType::Function { thick: true };
        let ownership = self.owned(&ty);
        let mut operands = Vec::with_capacity(captures.len() + 1);
        operands.push(callee);
        operands.extend_from_slice(captures);
        self.single(
            InstKind::PartialApply {
                on_stack,
                captured: conventions,
            },
            &operands,
            ty,
            ownership,
        )
    }

    /// `thin_to_thick_function f`
    pub fn thin_to_thick_function(&mut self, function: ValueId) -> ValueId {
        self.single(
            InstKind::ThinToThickFunction,
            &[function],
            PilType::Function { thick: true },
            OwnershipKind::None,
        )
    }

    /// Converts a native error into the bridged error type `bridged`.
    pub fn native_to_bridged_error(&mut self, native: ValueId, bridged: PilType) -> ValueId {
        let ownership = self.owned(&bridged);
        self.single(InstKind::NativeToBridgedError, &[native], bridged, ownership)
    }

    /// Converts a bridged error (optionally wrapped) into a native error.
    pub fn bridged_to_native_error(&mut self, bridged: ValueId) -> ValueId {
        let ty = PilType::NativeError;
        let ownership = self.owned(&ty);
        self.single(InstKind::BridgedToNativeError, &[bridged], ty, ownership)
    }

    /// `br dest(args...)`
    pub fn branch(&mut self, dest: BlockId, args: &[ValueId]) -> InstId {
        self.insert(InstKind::Branch { dest }, args, vec![])
    }

    /// `cond_br cond, true_dest(true_args...), false_dest(false_args...)`
    pub fn cond_branch(
        &mut self,
        cond: ValueId,
        true_dest: BlockId,
        true_args: &[ValueId],
        false_dest: BlockId,
        false_args: &[ValueId],
    ) -> InstId {
        let mut operands = Vec::with_capacity(1 + true_args.len() + false_args.len());
        operands.push(cond);
        operands.extend_from_slice(true_args);
        operands.extend_from_slice(false_args);
        self.insert(
            InstKind::CondBranch {
                true_dest,
                false_dest,
                true_args: true_args.len(),
            },
            &operands,
            vec![],
        )
    }

    /// `switch_enum value, case #some: bb, case #none: bb`
    pub fn switch_enum(
        &mut self,
        value: ValueId,
        cases: Vec<(EnumCase, BlockId)>,
        default: Option<BlockId>,
    ) -> InstId {
        self.insert(InstKind::SwitchEnum { cases, default }, &[value], vec![])
    }

    /// `return value`
    pub fn return_(&mut self, value: ValueId) -> InstId {
        self.insert(InstKind::Return, &[value], vec![])
    }

    /// `throw error`
    pub fn throw(&mut self, error: ValueId) -> InstId {
        self.insert(InstKind::Throw, &[error], vec![])
    }

    /// `unreachable`
    pub fn unreachable(&mut self) -> InstId {
        self.insert(InstKind::Unreachable, &[], vec![])
    }
}
