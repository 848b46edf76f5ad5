//! Functions and the structural editing API.
//!
//! A [`Function`] owns four arenas (values, instructions, blocks and operands) and
//! the block layout order. Every structural edit goes through the methods below,
//! each of which updates both directions of the use graph at once:
//!
//! - a value's use list is exactly the set of live operands pointing at it
//! - an instruction's operand list is exactly the set of operands whose user it is
//!
//! Misuse of the API (erasing an instruction whose results are still used,
//! replacing a value with one of a different type, touching an erased handle) is a
//! compiler bug and panics. [`Function::verify`] re-checks the invariants and
//! reports violations as [`crate::Error::Verification`].
//!
//! # Layout
//!
//! Blocks are kept in layout order with every [`Section::Main`] block before every
//! [`Section::Postmatter`] block. The first main block is the entry block and its
//! arguments are the function arguments.

use std::collections::HashSet;

use crate::pil::{
    entity::Arena, Block, BlockId, FormalLinkage, InstId, InstKind, Instruction, OperandId,
    OwnershipKind, Operand, PilLinkage, PilType, Section, SourceLoc, Value, ValueDef, ValueId,
};

/// Attributes of a source declaration that the optimizer consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclAttribute {
    /// `@used`: the symbol must be kept even if nothing references it.
    Used,
    /// `@inlinable`: the body is part of the module interface.
    Inlinable,
    /// `@_transparent`: always inlined, even without optimization.
    Transparent,
    /// `@noreturn`: calls never return to the caller.
    NoReturn,
}

/// The source declaration a function was generated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Declared name.
    pub name: String,
    /// Formal linkage of the declaration.
    pub formal_linkage: FormalLinkage,
    /// Attributes attached to the declaration.
    pub attributes: Vec<DeclAttribute>,
}

impl Declaration {
    /// Creates a declaration without attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, formal_linkage: FormalLinkage) -> Self {
        Self {
            name: name.into(),
            formal_linkage,
            attributes: Vec::new(),
        }
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: DeclAttribute) -> Self {
        if !self.attributes.contains(&attribute) {
            self.attributes.push(attribute);
        }
        self
    }

    /// Returns `true` if the attribute is present.
    #[must_use]
    pub fn has_attribute(&self, attribute: DeclAttribute) -> bool {
        self.attributes.contains(&attribute)
    }
}

/// Where a new instruction goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    /// Append to the end of the block.
    End(BlockId),
    /// Insert immediately before an instruction.
    Before(InstId),
}

/// A function of the mid-level IR.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    linkage: PilLinkage,
    declaration: Option<Declaration>,
    throws: bool,
    has_ownership: bool,
    pub(crate) values: Arena<ValueId, Value>,
    pub(crate) insts: Arena<InstId, Instruction>,
    pub(crate) blocks: Arena<BlockId, Block>,
    pub(crate) operands: Arena<OperandId, Operand>,
    pub(crate) layout: Vec<BlockId>,
}

impl Function {
    /// Creates an empty function.
    ///
    /// # Arguments
    ///
    /// * `name` - Symbol name
    /// * `linkage` - Symbol linkage
    #[must_use]
    pub fn new(name: impl Into<String>, linkage: PilLinkage) -> Self {
        Self {
            name: name.into(),
            linkage,
            declaration: None,
            throws: false,
            has_ownership: true,
            values: Arena::new(),
            insts: Arena::new(),
            blocks: Arena::new(),
            operands: Arena::new(),
            layout: Vec::new(),
        }
    }

    /// Creates an empty function definition for a source declaration, deriving the
    /// linkage from its formal linkage.
    #[must_use]
    pub fn for_declaration(name: impl Into<String>, declaration: Declaration) -> Self {
        let mut function = Self::new(
            name,
            PilLinkage::from_formal(declaration.formal_linkage, true),
        );
        function.declaration = Some(declaration);
        function
    }

    /// Symbol name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Symbol linkage.
    #[must_use]
    pub const fn linkage(&self) -> PilLinkage {
        self.linkage
    }

    /// Changes the symbol linkage.
    pub fn set_linkage(&mut self, linkage: PilLinkage) {
        self.linkage = linkage;
    }

    /// The source declaration, if any.
    #[must_use]
    pub const fn declaration(&self) -> Option<&Declaration> {
        self.declaration.as_ref()
    }

    /// Whether the function may throw a native error.
    #[must_use]
    pub const fn throws(&self) -> bool {
        self.throws
    }

    /// Marks the function as throwing or not.
    pub fn set_throws(&mut self, throws: bool) {
        self.throws = throws;
    }

    /// Whether the function is still in ownership SSA form.
    #[must_use]
    pub const fn has_ownership(&self) -> bool {
        self.has_ownership
    }

    /// Sets the ownership SSA flag.
    pub fn set_has_ownership(&mut self, has_ownership: bool) {
        self.has_ownership = has_ownership;
    }

    /// Returns `true` if the function has a body.
    #[must_use]
    pub fn is_definition(&self) -> bool {
        !self.layout.is_empty()
    }

    /// Blocks in layout order.
    #[must_use]
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// The entry block.
    #[must_use]
    pub fn entry_block(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Function arguments, i.e. the arguments of the entry block.
    #[must_use]
    pub fn arguments(&self) -> &[ValueId] {
        self.entry_block()
            .map_or(&[][..], |entry| self.blocks[entry].args.as_slice())
    }

    /// Looks up a block.
    #[must_use]
    pub fn block(&self, block: BlockId) -> &Block {
        &self.blocks[block]
    }

    /// Looks up an instruction.
    #[must_use]
    pub fn inst(&self, inst: InstId) -> &Instruction {
        &self.insts[inst]
    }

    /// Looks up a value.
    #[must_use]
    pub fn value(&self, value: ValueId) -> &Value {
        &self.values[value]
    }

    /// Looks up an operand.
    #[must_use]
    pub fn operand(&self, operand: OperandId) -> &Operand {
        &self.operands[operand]
    }

    /// Returns `true` if `inst` is live.
    #[must_use]
    pub fn contains_inst(&self, inst: InstId) -> bool {
        self.insts.contains(inst)
    }

    /// Returns `true` if `block` is live.
    #[must_use]
    pub fn contains_block(&self, block: BlockId) -> bool {
        self.blocks.contains(block)
    }

    /// Returns `true` if `value` is live.
    #[must_use]
    pub fn contains_value(&self, value: ValueId) -> bool {
        self.values.contains(value)
    }

    /// The kind of an instruction.
    #[must_use]
    pub fn kind(&self, inst: InstId) -> &InstKind {
        &self.insts[inst].kind
    }

    /// Mutable access to the kind of an instruction.
    ///
    /// Callers may change attributes of the kind (for example clear a foreign
    /// error convention) but must not change its operand layout or successors; use
    /// the structural API for that.
    pub fn kind_mut(&mut self, inst: InstId) -> &mut InstKind {
        &mut self.insts[inst].kind
    }

    /// Type of a value.
    #[must_use]
    pub fn ty(&self, value: ValueId) -> &PilType {
        &self.values[value].ty
    }

    /// Ownership kind of a value.
    #[must_use]
    pub fn ownership(&self, value: ValueId) -> OwnershipKind {
        self.values[value].ownership
    }

    /// Changes the ownership kind of a value.
    pub fn set_ownership(&mut self, value: ValueId, ownership: OwnershipKind) {
        self.values[value].ownership = ownership;
    }

    /// Operands using `value`.
    #[must_use]
    pub fn uses(&self, value: ValueId) -> &[OperandId] {
        &self.values[value].uses
    }

    /// Distinct instructions using `value`, in use order.
    #[must_use]
    pub fn users(&self, value: ValueId) -> Vec<InstId> {
        let mut users = Vec::new();
        for &operand in &self.values[value].uses {
            let user = self.operands[operand].user;
            if !users.contains(&user) {
                users.push(user);
            }
        }
        users
    }

    /// Returns `true` if `value` has at least one use.
    #[must_use]
    pub fn has_uses(&self, value: ValueId) -> bool {
        !self.values[value].uses.is_empty()
    }

    /// The value used at operand position `index` of `inst`.
    #[must_use]
    pub fn operand_value(&self, inst: InstId, index: usize) -> ValueId {
        self.operands[self.insts[inst].operands[index]].value
    }

    /// All values used by `inst`, in operand order.
    #[must_use]
    pub fn operand_values(&self, inst: InstId) -> Vec<ValueId> {
        self.insts[inst]
            .operands
            .iter()
            .map(|&operand| self.operands[operand].value)
            .collect()
    }

    /// Results of `inst`.
    #[must_use]
    pub fn results(&self, inst: InstId) -> &[ValueId] {
        &self.insts[inst].results
    }

    /// The first result of `inst`, if it has any.
    #[must_use]
    pub fn result(&self, inst: InstId) -> Option<ValueId> {
        self.insts[inst].results.first().copied()
    }

    /// The block containing `inst`.
    ///
    /// # Panics
    ///
    /// Panics if the instruction is not linked into a block.
    #[must_use]
    pub fn parent_block(&self, inst: InstId) -> BlockId {
        match self.insts[inst].block {
            Some(block) => block,
            None => panic!("instruction {inst} is not linked into a block"),
        }
    }

    /// The terminator of `block`, if the block is terminated.
    #[must_use]
    pub fn terminator(&self, block: BlockId) -> Option<InstId> {
        self.blocks[block]
            .last_inst()
            .filter(|&inst| self.insts[inst].kind.is_terminator())
    }

    /// All instructions in layout order.
    #[must_use]
    pub fn instructions(&self) -> Vec<InstId> {
        self.layout
            .iter()
            .flat_map(|&block| self.blocks[block].insts.iter().copied())
            .collect()
    }

    /// Number of live instructions.
    #[must_use]
    pub fn inst_count(&self) -> usize {
        self.insts.len()
    }

    /// Number of live blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Successors of `block` in terminator order (duplicates kept).
    #[must_use]
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.terminator(block)
            .map(|term| self.insts[term].kind.successors())
            .unwrap_or_default()
    }

    /// Distinct predecessors of `block` in layout order.
    #[must_use]
    pub fn predecessors(&self, block: BlockId) -> Vec<BlockId> {
        self.layout
            .iter()
            .copied()
            .filter(|&candidate| self.successors(candidate).contains(&block))
            .collect()
    }

    /// The block arguments passed along each outgoing edge of a terminator.
    ///
    /// `switch_enum` edges report no explicit arguments; the `some` destination
    /// receives the payload implicitly.
    #[must_use]
    pub fn successor_args(&self, term: InstId) -> Vec<(BlockId, Vec<ValueId>)> {
        let values = self.operand_values(term);
        match &self.insts[term].kind {
            InstKind::Branch { dest } => vec![(*dest, values)],
            InstKind::CondBranch {
                true_dest,
                false_dest,
                true_args,
            } => {
                let split = 1 + true_args;
                vec![
                    (*true_dest, values[1..split].to_vec()),
                    (*false_dest, values[split..].to_vec()),
                ]
            }
            kind => kind
                .successors()
                .into_iter()
                .map(|dest| (dest, Vec::new()))
                .collect(),
        }
    }

    /// Creates an empty block at the end of its section.
    pub fn create_block(&mut self, section: Section) -> BlockId {
        let block = self.blocks.alloc(Block::new(section));
        match section {
            Section::Main => {
                let at = self
                    .layout
                    .iter()
                    .position(|&b| self.blocks[b].section == Section::Postmatter)
                    .unwrap_or(self.layout.len());
                self.layout.insert(at, block);
            }
            Section::Postmatter => self.layout.push(block),
        }
        block
    }

    /// Creates an empty block laid out immediately after `after`, in the same section.
    pub fn create_block_after(&mut self, after: BlockId) -> BlockId {
        let section = self.blocks[after].section;
        let block = self.blocks.alloc(Block::new(section));
        let at = self
            .layout
            .iter()
            .position(|&b| b == after)
            .map_or(self.layout.len(), |pos| pos + 1);
        self.layout.insert(at, block);
        block
    }

    /// Appends an argument to `block`.
    pub fn add_block_arg(
        &mut self,
        block: BlockId,
        ty: PilType,
        ownership: OwnershipKind,
    ) -> ValueId {
        let index = self.blocks[block].args.len();
        let value = self
            .values
            .alloc(Value::new(ty, ownership, ValueDef::BlockArg { block, index }));
        self.blocks[block].args.push(value);
        value
    }

    /// Creates an `undef` value of type `ty`.
    pub fn undef(&mut self, ty: PilType) -> ValueId {
        self.values
            .alloc(Value::new(ty, OwnershipKind::None, ValueDef::Undef))
    }

    /// Creates an instruction and links it at `at`.
    ///
    /// # Arguments
    ///
    /// * `kind` - Instruction kind
    /// * `operands` - Used values in operand order
    /// * `results` - Type and ownership of each result
    /// * `at` - Insertion point
    ///
    /// # Returns
    ///
    /// The handle of the new instruction. Its results are available through
    /// [`Function::results`].
    pub fn insert_inst(
        &mut self,
        kind: InstKind,
        operands: &[ValueId],
        results: Vec<(PilType, OwnershipKind)>,
        at: InsertPoint,
    ) -> InstId {
        let inst = self.insts.alloc(Instruction {
            kind,
            operands: Vec::with_capacity(operands.len()),
            results: Vec::with_capacity(results.len()),
            block: None,
            loc: None,
        });

        for (index, &value) in operands.iter().enumerate() {
            let operand = self.operands.alloc(Operand {
                user: inst,
                value,
                index,
            });
            self.values[value].uses.push(operand);
            self.insts[inst].operands.push(operand);
        }

        for (index, (ty, ownership)) in results.into_iter().enumerate() {
            let value = self
                .values
                .alloc(Value::new(ty, ownership, ValueDef::Result { inst, index }));
            self.insts[inst].results.push(value);
        }

        self.link(inst, at);
        inst
    }

    /// Attaches a source location to an instruction.
    pub fn set_loc(&mut self, inst: InstId, loc: Option<SourceLoc>) {
        self.insts[inst].loc = loc;
    }

    fn link(&mut self, inst: InstId, at: InsertPoint) {
        let (block, position) = match at {
            InsertPoint::End(block) => (block, self.blocks[block].insts.len()),
            InsertPoint::Before(before) => {
                let block = self.parent_block(before);
                let position = self.blocks[block].position_of(before).unwrap_or_else(|| {
                    panic!("instruction {before} missing from its block {block}")
                });
                (block, position)
            }
        };
        self.blocks[block].insts.insert(position, inst);
        self.insts[inst].block = Some(block);
    }

    fn unlink(&mut self, inst: InstId) {
        if let Some(block) = self.insts[inst].block.take() {
            self.blocks[block].insts.retain(|&candidate| candidate != inst);
        }
    }

    /// Moves an already linked instruction to a new position.
    pub fn move_inst(&mut self, inst: InstId, at: InsertPoint) {
        self.unlink(inst);
        self.link(inst, at);
    }

    /// Removes every operand of `inst` from the use lists it appears in, leaving
    /// the instruction linked with no operands.
    pub(crate) fn drop_operands(&mut self, inst: InstId) {
        let operands = std::mem::take(&mut self.insts[inst].operands);
        for operand in operands {
            if let Some(edge) = self.operands.free(operand) {
                self.values[edge.value].uses.retain(|&use_| use_ != operand);
            }
        }
    }

    /// Erases an instruction whose results have no remaining uses.
    ///
    /// # Panics
    ///
    /// Panics if any result is still used or if `inst` was already erased.
    pub fn erase_inst(&mut self, inst: InstId) {
        let results = self.insts[inst].results.clone();
        for &result in &results {
            assert!(
                self.values[result].uses.is_empty(),
                "erasing {} in {} while its result {result} still has {} use(s)",
                self.insts[inst].kind.mnemonic(),
                self.name,
                self.values[result].uses.len()
            );
        }

        self.drop_operands(inst);
        self.unlink(inst);
        for result in results {
            self.values.free(result);
        }
        self.insts.free(inst);
    }

    /// Erases a set of instructions at once.
    ///
    /// Results of the erased instructions may only be used by other members of
    /// the set. Each affected block is compacted once, however many of its
    /// instructions go.
    ///
    /// # Panics
    ///
    /// Panics if a result is used outside the set or if an instruction was
    /// already erased.
    pub fn erase_insts(&mut self, insts: &[InstId]) {
        for &inst in insts {
            self.drop_operands(inst);
        }
        for &inst in insts {
            for &result in &self.insts[inst].results {
                assert!(
                    self.values[result].uses.is_empty(),
                    "erasing {} in {} while its result {result} still has {} use(s)",
                    self.insts[inst].kind.mnemonic(),
                    self.name,
                    self.values[result].uses.len()
                );
            }
        }

        let doomed: HashSet<InstId> = insts.iter().copied().collect();
        let mut blocks: HashSet<BlockId> = HashSet::new();
        for &inst in insts {
            if let Some(block) = self.insts[inst].block.take() {
                blocks.insert(block);
            }
        }
        for block in blocks {
            self.blocks[block]
                .insts
                .retain(|candidate| !doomed.contains(candidate));
        }

        for &inst in insts {
            let results = std::mem::take(&mut self.insts[inst].results);
            for result in results {
                self.values.free(result);
            }
            self.insts.free(inst);
        }
    }

    /// Erases a block together with all of its instructions and arguments.
    ///
    /// Branches into the block must already be gone.
    ///
    /// # Panics
    ///
    /// Panics if a value defined in the block is still used outside of it.
    pub fn erase_block(&mut self, block: BlockId) {
        let insts = self.blocks[block].insts.clone();
        self.erase_insts(&insts);

        let args = std::mem::take(&mut self.blocks[block].args);
        for arg in args {
            assert!(
                self.values[arg].uses.is_empty(),
                "erasing block {block} in {} while argument {arg} is still used",
                self.name
            );
            self.values.free(arg);
        }

        self.layout.retain(|&candidate| candidate != block);
        self.blocks.free(block);
    }

    /// Rewrites every use of `old` into a use of `new`.
    ///
    /// The defining instruction of `old` is left in place.
    ///
    /// # Panics
    ///
    /// Panics if the two values have different types.
    pub fn replace_all_uses_with(&mut self, old: ValueId, new: ValueId) {
        if old == new {
            return;
        }
        assert!(
            self.values[old].ty == self.values[new].ty,
            "replace_all_uses_with type mismatch in {}: {old} : {} replaced by {new} : {}",
            self.name,
            self.values[old].ty,
            self.values[new].ty
        );

        let uses = std::mem::take(&mut self.values[old].uses);
        for &operand in &uses {
            self.operands[operand].value = new;
        }
        self.values[new].uses.extend(uses);
    }

    /// Points operand `index` of `inst` at `value`.
    pub fn set_operand(&mut self, inst: InstId, index: usize, value: ValueId) {
        let operand = self.insts[inst].operands[index];
        let old = self.operands[operand].value;
        if old == value {
            return;
        }
        self.values[old].uses.retain(|&use_| use_ != operand);
        self.operands[operand].value = value;
        self.values[value].uses.push(operand);
    }

    /// Splits the block of `inst` so that everything after `inst` moves into a new
    /// block laid out right after it. The original block is left unterminated.
    ///
    /// # Returns
    ///
    /// The new block holding the tail.
    pub fn split_block_after(&mut self, inst: InstId) -> BlockId {
        let block = self.parent_block(inst);
        let position = self.blocks[block]
            .position_of(inst)
            .unwrap_or_else(|| panic!("instruction {inst} missing from its block {block}"));

        let tail = self.blocks[block].insts.split_off(position + 1);
        let new_block = self.create_block_after(block);
        for &moved in &tail {
            self.insts[moved].block = Some(new_block);
        }
        self.blocks[new_block].insts = tail;
        new_block
    }

    /// Replaces every reference to `from` in the terminator of `block` by `to`.
    pub fn replace_successor(&mut self, block: BlockId, from: BlockId, to: BlockId) {
        if let Some(term) = self.terminator(block) {
            self.insts[term].kind.replace_successor(from, to);
        }
    }
}
