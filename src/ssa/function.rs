//! Functions of a package graph.
//!
//! A [`Function`] owns the arenas of its blocks, instructions and values, together
//! with the bookkeeping that SSA construction needs while the function is open:
//! the per-block definitions of every variable and the cached undefined markers.
//!
//! A function is finished once its body was built. Finishing records the entry and
//! exit blocks and computes the [`FunctionType`](crate::ssa::FunctionType) from the parameters, the return
//! instructions and the captured variables.

use std::fmt;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    ast::Position,
    ssa::{BasicBlock, BlockId, FuncId, InstrId, Instruction, Type, Value, ValueId},
    Error,
};

/// A variable captured from an enclosing function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    /// The captured variable
    pub name: String,
    /// The free value standing for it
    pub cell: ValueId,
}

/// A function: the main function of a package or a function literal.
#[derive(Debug, Clone)]
pub struct Function {
    id: FuncId,
    name: String,
    parent: Option<FuncId>,
    position: Position,
    variadic: bool,
    blocks: Vec<BasicBlock>,
    instructions: Vec<Instruction>,
    values: Vec<Value>,
    params: Vec<ValueId>,
    captures: Vec<Capture>,
    children: Vec<FuncId>,
    entry: Option<BlockId>,
    exit: Option<BlockId>,
    ty: Option<Type>,
    diagnostics: Vec<Error>,
    current_def: FxHashMap<String, FxHashMap<BlockId, ValueId>>,
    locals: FxHashSet<String>,
    undefined: FxHashMap<String, ValueId>,
}

impl Function {
    pub(crate) fn new(id: FuncId, name: String, parent: Option<FuncId>, position: Position) -> Self {
        Self {
            id,
            name,
            parent,
            position,
            variadic: false,
            blocks: Vec::new(),
            instructions: Vec::new(),
            values: Vec::new(),
            params: Vec::new(),
            captures: Vec::new(),
            children: Vec::new(),
            entry: None,
            exit: None,
            ty: None,
            diagnostics: Vec::new(),
            current_def: FxHashMap::default(),
            locals: FxHashSet::default(),
            undefined: FxHashMap::default(),
        }
    }

    /// The id of the function.
    #[must_use]
    pub fn id(&self) -> FuncId {
        self.id
    }

    /// The name: `main`, the declared name or `parent$index` for anonymous literals.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The enclosing function.
    #[must_use]
    pub fn parent(&self) -> Option<FuncId> {
        self.parent
    }

    /// Where the function literal starts.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Returns true if the last parameter collects the remaining arguments.
    #[must_use]
    pub fn is_variadic(&self) -> bool {
        self.variadic
    }

    /// All blocks, indexed by [`BlockId`].
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Looks up a block.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.index())
    }

    /// All instructions, including removed phis.
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// All values owned by this function.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Parameter values in declaration order.
    #[must_use]
    pub fn params(&self) -> &[ValueId] {
        &self.params
    }

    /// Captured variables in capture order.
    #[must_use]
    pub fn captures(&self) -> &[Capture] {
        &self.captures
    }

    /// The free values of the captured variables.
    #[must_use]
    pub fn free_values(&self) -> Vec<ValueId> {
        self.captures.iter().map(|capture| capture.cell).collect()
    }

    /// The free value of a captured variable.
    #[must_use]
    pub fn free_value(&self, name: &str) -> Option<ValueId> {
        self.captures
            .iter()
            .find(|capture| capture.name == name)
            .map(|capture| capture.cell)
    }

    /// Function literals defined directly in this function.
    #[must_use]
    pub fn children(&self) -> &[FuncId] {
        &self.children
    }

    /// The entry block, set when the function is finished.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.entry
    }

    /// The block that was current when the body ended, set when the function is finished.
    #[must_use]
    pub fn exit(&self) -> Option<BlockId> {
        self.exit
    }

    /// The function type, set when the function is finished.
    #[must_use]
    pub fn ty(&self) -> Option<&Type> {
        self.ty.as_ref()
    }

    /// Returns true once the function was finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ty.is_some()
    }

    /// Diagnostics recorded while building the body.
    #[must_use]
    pub fn diagnostics(&self) -> &[Error] {
        &self.diagnostics
    }

    /// Live phis of all blocks.
    pub fn phis(&self) -> impl Iterator<Item = &Instruction> {
        self.blocks
            .iter()
            .flat_map(|block| block.phis().iter())
            .filter_map(|id| self.instructions.get(id.index()))
            .filter(|instr| instr.is_live_phi())
    }

    /// Live instructions of a block, phis first.
    pub fn block_instructions(&self, id: BlockId) -> impl Iterator<Item = &Instruction> {
        self.blocks
            .get(id.index())
            .into_iter()
            .flat_map(|block| block.phis().iter().chain(block.instructions().iter()))
            .filter_map(|id| self.instructions.get(id.index()))
            .filter(|instr| instr.block().is_some())
    }

    /// Returns true if the function itself assigns `name` somewhere.
    ///
    /// Captured variables and phis that only merge them do not count.
    #[must_use]
    pub fn defines(&self, name: &str) -> bool {
        self.locals.contains(name)
    }

    pub(crate) fn declare(&mut self, name: &str) {
        if !self.locals.contains(name) {
            self.locals.insert(name.to_string());
        }
    }

    pub(crate) fn set_variadic(&mut self, variadic: bool) {
        self.variadic = variadic;
    }

    pub(crate) fn push_block(&mut self, name: &str) -> BlockId {
        let id = BlockId::new(self.blocks.len());
        self.blocks.push(BasicBlock::new(id, name));
        id
    }

    pub(crate) fn block_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.blocks.get_mut(id.index())
    }

    pub(crate) fn push_instruction(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    pub(crate) fn next_instruction_id(&self) -> InstrId {
        InstrId::new(self.id, self.instructions.len())
    }

    /// Looks up an instruction of this function.
    #[must_use]
    pub fn instruction(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions.get(id.index())
    }

    pub(crate) fn instruction_mut(&mut self, id: InstrId) -> Option<&mut Instruction> {
        self.instructions.get_mut(id.index())
    }

    pub(crate) fn push_value(&mut self, value: Value) {
        self.values.push(value);
    }

    pub(crate) fn next_value_id(&self) -> ValueId {
        ValueId::new(self.id, self.values.len())
    }

    /// Looks up a value of this function.
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        self.values.get(id.index())
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> Option<&mut Value> {
        self.values.get_mut(id.index())
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.values.iter_mut()
    }

    pub(crate) fn push_param(&mut self, value: ValueId) {
        self.params.push(value);
    }

    pub(crate) fn add_capture(&mut self, name: &str, cell: ValueId) {
        if self.free_value(name).is_none() {
            self.captures.push(Capture {
                name: name.to_string(),
                cell,
            });
        }
    }

    pub(crate) fn replace_capture(&mut self, from: ValueId, to: ValueId) {
        for capture in &mut self.captures {
            if capture.cell == from {
                capture.cell = to;
            }
        }
    }

    pub(crate) fn add_child(&mut self, child: FuncId) {
        self.children.push(child);
    }

    pub(crate) fn add_diagnostic(&mut self, error: Error) {
        self.diagnostics.push(error);
    }

    pub(crate) fn finish(&mut self, exit: BlockId, ty: Type) {
        self.entry = Some(BlockId::new(0));
        self.exit = Some(exit);
        self.ty = Some(ty);
    }

    pub(crate) fn current_def(&self, name: &str, block: BlockId) -> Option<ValueId> {
        self.current_def.get(name)?.get(&block).copied()
    }

    pub(crate) fn set_current_def(&mut self, name: &str, block: BlockId, value: ValueId) {
        self.current_def
            .entry(name.to_string())
            .or_default()
            .insert(block, value);
    }

    pub(crate) fn remove_current_def(&mut self, name: &str, block: BlockId) {
        if let Some(defs) = self.current_def.get_mut(name) {
            defs.remove(&block);
        }
    }

    pub(crate) fn replace_current_defs(&mut self, from: ValueId, to: ValueId) {
        for defs in self.current_def.values_mut() {
            for value in defs.values_mut() {
                if *value == from {
                    *value = to;
                }
            }
        }
    }

    pub(crate) fn cached_undefined(&self, name: &str) -> Option<ValueId> {
        self.undefined.get(name).copied()
    }

    pub(crate) fn cache_undefined(&mut self, name: &str, value: ValueId) {
        self.undefined.insert(name.to_string(), value);
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}", self.name)?;
        if let Some(ty) = &self.ty {
            write!(f, ": {ty}")?;
        }
        writeln!(f)?;

        for block in &self.blocks {
            let preds: Vec<String> = block.preds().iter().map(ToString::to_string).collect();
            writeln!(f, "  {} ({}): preds [{}]", block.name(), block.id(), preds.join(", "))?;
            for instr in self.block_instructions(block.id()) {
                writeln!(f, "    {instr}")?;
            }
        }
        Ok(())
    }
}
