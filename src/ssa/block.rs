//! Basic blocks of a function.
//!
//! A block keeps its phis apart from the other instructions: phis are created on
//! demand while variables are resolved, possibly long after the rest of the block
//! was emitted, and are conceptually executed on entry.
//!
//! Blocks start out unsealed. Once every predecessor is known the block is sealed;
//! after that no edge may be added to it. Reads in an unsealed block leave behind
//! an incomplete phi per variable, completed when the block is sealed.

use std::collections::BTreeMap;

use crate::ssa::{BlockId, InstrId, ValueId};

/// A basic block.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    id: BlockId,
    name: String,
    preds: Vec<BlockId>,
    succs: Vec<BlockId>,
    phis: Vec<InstrId>,
    instructions: Vec<InstrId>,
    terminator: Option<InstrId>,
    sealed: bool,
    incomplete_phis: BTreeMap<String, ValueId>,
}

impl BasicBlock {
    pub(crate) fn new(id: BlockId, name: &str) -> Self {
        Self {
            id,
            name: format!("{name}{}", id.index()),
            preds: Vec::new(),
            succs: Vec::new(),
            phis: Vec::new(),
            instructions: Vec::new(),
            terminator: None,
            sealed: false,
            incomplete_phis: BTreeMap::new(),
        }
    }

    /// The id of the block.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// The label, the role of the block suffixed with its index (`entry0`, `loop.header3`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Predecessors, in the order the edges were added.
    #[must_use]
    pub fn preds(&self) -> &[BlockId] {
        &self.preds
    }

    /// Successors, in the order the edges were added.
    #[must_use]
    pub fn succs(&self) -> &[BlockId] {
        &self.succs
    }

    /// Phis of the block, live and removed ones are distinguished by
    /// [`Instruction::block`](crate::ssa::Instruction::block).
    #[must_use]
    pub fn phis(&self) -> &[InstrId] {
        &self.phis
    }

    /// Non-phi instructions in execution order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    /// The instruction ending the block.
    #[must_use]
    pub fn terminator(&self) -> Option<InstrId> {
        self.terminator
    }

    /// Returns true once a terminator was emitted.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }

    /// Returns true once all predecessors are known.
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Variables that have an incomplete phi in this block.
    pub fn incomplete_variables(&self) -> impl Iterator<Item = &str> {
        self.incomplete_phis.keys().map(String::as_str)
    }

    pub(crate) fn add_pred(&mut self, pred: BlockId) {
        if !self.preds.contains(&pred) {
            self.preds.push(pred);
        }
    }

    pub(crate) fn add_succ(&mut self, succ: BlockId) {
        if !self.succs.contains(&succ) {
            self.succs.push(succ);
        }
    }

    pub(crate) fn push_phi(&mut self, phi: InstrId) {
        self.phis.push(phi);
    }

    pub(crate) fn remove_phi(&mut self, phi: InstrId) {
        self.phis.retain(|p| *p != phi);
    }

    pub(crate) fn push_instruction(&mut self, instr: InstrId, terminates: bool) {
        self.instructions.push(instr);
        if terminates {
            self.terminator = Some(instr);
        }
    }

    pub(crate) fn insert_front(&mut self, instr: InstrId) {
        self.instructions.insert(0, instr);
    }

    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    pub(crate) fn add_incomplete_phi(&mut self, name: &str, phi: ValueId) {
        self.incomplete_phis.insert(name.to_string(), phi);
    }

    pub(crate) fn take_incomplete_phis(&mut self) -> BTreeMap<String, ValueId> {
        std::mem::take(&mut self.incomplete_phis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::FuncId;

    #[test]
    fn test_block_name_includes_index() {
        let block = BasicBlock::new(BlockId::new(3), "loop.header");
        assert_eq!(block.name(), "loop.header3");
        assert!(!block.is_sealed());
        assert!(!block.is_terminated());
    }

    #[test]
    fn test_edges_are_unique() {
        let mut block = BasicBlock::new(BlockId::new(1), "if.done");
        block.add_pred(BlockId::new(0));
        block.add_pred(BlockId::new(0));
        block.add_pred(BlockId::new(2));
        assert_eq!(block.preds(), &[BlockId::new(0), BlockId::new(2)]);
    }

    #[test]
    fn test_incomplete_phis_taken_once() {
        let func = FuncId::new(0);
        let mut block = BasicBlock::new(BlockId::new(1), "loop.header");
        block.add_incomplete_phi("i", ValueId::new(func, 4));
        block.add_incomplete_phi("j", ValueId::new(func, 5));
        assert_eq!(block.incomplete_variables().collect::<Vec<_>>(), vec!["i", "j"]);

        let phis = block.take_incomplete_phis();
        assert_eq!(phis.len(), 2);
        assert_eq!(block.incomplete_variables().count(), 0);
    }

    #[test]
    fn test_terminator_tracking() {
        let func = FuncId::new(0);
        let mut block = BasicBlock::new(BlockId::new(0), "entry");
        block.push_instruction(InstrId::new(func, 0), false);
        assert!(!block.is_terminated());
        block.push_instruction(InstrId::new(func, 1), true);
        assert_eq!(block.terminator(), Some(InstrId::new(func, 1)));
        block.insert_front(InstrId::new(func, 2));
        assert_eq!(block.instructions()[0], InstrId::new(func, 2));
    }
}
