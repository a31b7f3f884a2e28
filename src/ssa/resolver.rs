//! On-the-fly variable resolution.
//!
//! The [`Resolver`] turns variable reads and writes into SSA values while the
//! function is being built, without a separate dominance computation:
//!
//! - A write records the value as the definition of the variable in the block.
//! - A read looks for a definition in the block and otherwise asks the predecessors.
//!   An unsealed block answers with a fresh, operand-less phi that is completed when
//!   the block is sealed. A sealed block with one predecessor forwards the read, a
//!   block with several predecessors gets a phi with one operand per predecessor.
//! - A phi whose operands are all the same value (or the phi itself) is trivial. It is
//!   replaced by that value, and phis using it are checked again since they may
//!   have become trivial in turn.
//!
//! A walk that reaches the entry block of a nested function without finding a
//! definition captures the variable from the enclosing function at that point, so
//! every path reads its own nearest definition. Paths with no definition anywhere,
//! in this function or an enclosing one, contribute the function's undefined
//! marker for that variable.

use crate::{
    events::{EventKind, EventLog},
    ssa::{BlockId, FuncId, Graph, Type, Value, ValueId},
    Error, Result,
};

/// Resolves variables of the functions of one graph.
pub(crate) struct Resolver<'a> {
    graph: &'a mut Graph,
    trace: Option<&'a EventLog>,
    /// Open functions and their current blocks, outermost first
    scopes: Vec<(FuncId, BlockId)>,
    events: Option<&'a EventLog>,
}

impl<'a> Resolver<'a> {
    /// Creates a resolver. With a trace log, phi and sealing activity is recorded.
    pub(crate) fn new(graph: &'a mut Graph, trace: Option<&'a EventLog>) -> Self {
        Self {
            graph,
            trace,
            scopes: Vec::new(),
            events: None,
        }
    }

    /// Lets reads in the open functions of `scopes` capture from their enclosing
    /// function. Captures are recorded in `events`.
    pub(crate) fn within(mut self, scopes: Vec<(FuncId, BlockId)>, events: &'a EventLog) -> Self {
        self.scopes = scopes;
        self.events = Some(events);
        self
    }

    /// Records `value` as the definition of `name` in `block`.
    pub(crate) fn write_variable(
        &mut self,
        func: FuncId,
        name: &str,
        block: BlockId,
        value: ValueId,
    ) -> Result<()> {
        let value = self.graph.resolve(value);
        self.graph
            .function_mut(func)?
            .set_current_def(name, block, value);
        Ok(())
    }

    /// Returns the value of `name` at the end of `block`.
    ///
    /// `None` means no path from the entry to `block` defines `name`, and no
    /// enclosing function can supply it.
    pub(crate) fn read_variable(
        &mut self,
        func: FuncId,
        name: &str,
        block: BlockId,
    ) -> Result<Option<ValueId>> {
        let function = self
            .graph
            .function(func)
            .ok_or_else(|| Error::SsaError(format!("function {func} does not exist")))?;

        if let Some(value) = function.current_def(name, block) {
            return Ok(Some(self.graph.resolve(value)));
        }
        self.read_variable_recursive(func, name, block)
    }

    /// Marks `block` as having all of its predecessors and completes its incomplete phis.
    pub(crate) fn seal_block(&mut self, func: FuncId, block: BlockId) -> Result<()> {
        let target = self.graph.block_mut(func, block)?;
        if target.is_sealed() {
            return Ok(());
        }

        let incomplete = target.take_incomplete_phis();
        for (name, phi) in incomplete {
            if self.graph.resolve(phi) == phi {
                self.add_phi_operands(func, &name, phi, false)?;
            }
        }
        self.graph.seal_block(func, block)?;

        if self.trace.is_some() {
            let preds = self
                .graph
                .block(func, block)
                .map_or(0, |b| b.preds().len());
            self.trace(
                EventKind::BlockSealed,
                func,
                Some(block),
                format!("sealed with {preds} predecessors"),
            );
        }
        Ok(())
    }

    /// The undefined marker of `name`, created on first use.
    pub(crate) fn undefined(&mut self, func: FuncId, name: &str) -> Result<ValueId> {
        let function = self.graph.function_mut(func)?;
        if let Some(value) = function.cached_undefined(name) {
            return Ok(value);
        }
        let value = self.graph.insert_undefined(func, name)?;
        self.graph.function_mut(func)?.cache_undefined(name, value);
        Ok(value)
    }

    /// Makes `name` of the enclosing function available in `func` as a free value.
    ///
    /// The enclosing function is read at its current block, capturing through the
    /// outer functions in turn. A value that already is a free value (created for a
    /// sibling closure, or the parent's own capture) is shared, so all closures
    /// observe the same cell. Returns `None` if `func` is not nested in an open
    /// function or no enclosing function defines `name`.
    pub(crate) fn capture(&mut self, func: FuncId, name: &str) -> Result<Option<ValueId>> {
        if let Some(cell) = self.graph.function(func).and_then(|f| f.free_value(name)) {
            return Ok(Some(cell));
        }
        let Some(level) = self.scopes.iter().position(|(open, _)| *open == func) else {
            return Ok(None);
        };
        let Some((parent, at)) = level.checked_sub(1).map(|outer| self.scopes[outer]) else {
            return Ok(None);
        };
        let Some(outer) = self.read_variable(parent, name, at)? else {
            return Ok(None);
        };

        let outer = self.graph.resolve(outer);
        let cell = if self.graph.value(outer).is_some_and(Value::is_free_value) {
            outer
        } else {
            let cell = self.graph.new_free_value(func, name, outer)?;
            self.write_variable(parent, name, at, cell)?;
            cell
        };
        self.graph.function_mut(func)?.add_capture(name, cell);
        self.write_variable(func, name, BlockId::new(0), cell)?;

        if let Some(events) = self.events {
            events
                .record(EventKind::ValueCaptured)
                .function(self.function_name(func))
                .message(format!(
                    "`{name}` captured from {} as {cell}",
                    self.function_name(parent)
                ));
        }
        Ok(Some(cell))
    }

    fn read_variable_recursive(
        &mut self,
        func: FuncId,
        name: &str,
        block: BlockId,
    ) -> Result<Option<ValueId>> {
        let (sealed, preds) = {
            let current = self.graph.block(func, block).ok_or_else(|| {
                Error::SsaError(format!("block {block} does not exist in {func}"))
            })?;
            (current.is_sealed(), current.preds().to_vec())
        };

        let value = if !sealed {
            let phi = self.graph.new_phi(func, block, name)?;
            self.graph
                .block_mut(func, block)?
                .add_incomplete_phi(name, phi);
            self.trace(
                EventKind::PhiCreated,
                func,
                Some(block),
                format!("incomplete phi {phi} for `{name}`"),
            );
            Some(phi)
        } else if preds.is_empty() {
            if block == BlockId::new(0) {
                self.capture(func, name)?
            } else {
                Some(self.undefined(func, name)?)
            }
        } else if let [pred] = preds.as_slice() {
            self.read_variable(func, name, *pred)?
        } else {
            let phi = self.graph.new_phi(func, block, name)?;
            self.trace(
                EventKind::PhiCreated,
                func,
                Some(block),
                format!("phi {phi} for `{name}`"),
            );
            self.write_variable(func, name, block, phi)?;
            self.add_phi_operands(func, name, phi, true)?
        };

        match value {
            Some(value) => self.write_variable(func, name, block, value)?,
            None => self.graph.function_mut(func)?.remove_current_def(name, block),
        }
        Ok(value)
    }

    /// Fills a phi with one operand per predecessor of its block.
    ///
    /// If no predecessor has a definition and `discard_empty` is set, the phi is
    /// removed and `None` returned. Otherwise missing operands are the undefined
    /// marker of the variable.
    fn add_phi_operands(
        &mut self,
        func: FuncId,
        name: &str,
        phi: ValueId,
        discard_empty: bool,
    ) -> Result<Option<ValueId>> {
        let block = self
            .graph
            .defining_instruction(phi)
            .and_then(|instr| instr.block())
            .ok_or_else(|| Error::SsaError(format!("phi {phi} is not part of a block")))?;
        let preds = self
            .graph
            .block(func, block)
            .map(|b| b.preds().to_vec())
            .unwrap_or_default();

        let mut incoming = Vec::with_capacity(preds.len());
        for pred in preds {
            let value = self.read_variable(func, name, pred)?;
            incoming.push((pred, value));
        }

        if discard_empty && incoming.iter().all(|(_, value)| value.is_none()) {
            self.graph.detach_phi(phi)?;
            return Ok(None);
        }

        for (pred, value) in incoming {
            let value = match value {
                Some(value) => value,
                None => self.undefined(func, name)?,
            };
            self.graph.add_phi_operand(phi, pred, value)?;
        }
        self.update_phi_type(phi)?;
        self.try_remove_trivial_phi(phi).map(Some)
    }

    /// Replaces `phi` by its single distinct operand, if it has one.
    ///
    /// Returns the value standing for the phi afterwards.
    pub(crate) fn try_remove_trivial_phi(&mut self, phi: ValueId) -> Result<ValueId> {
        let phi = self.graph.resolve(phi);
        if !self.graph.is_phi(phi) {
            return Ok(phi);
        }

        let mut same: Option<ValueId> = None;
        for edge in self.graph.phi_operands(phi) {
            let value = self.graph.resolve(edge.value);
            if Some(value) == same || value == phi {
                continue;
            }
            if same.is_some() {
                return Ok(phi);
            }
            same = Some(value);
        }

        let name = self
            .graph
            .value(phi)
            .and_then(Value::variable)
            .unwrap_or_default()
            .to_string();
        let same = match same {
            Some(value) => value,
            None => self.undefined(phi.func(), &name)?,
        };

        let users: Vec<ValueId> = self
            .graph
            .user_values(phi)
            .into_iter()
            .filter(|user| *user != phi)
            .collect();

        self.graph.detach_phi(phi)?;
        self.graph.replace_all_uses(phi, same)?;
        self.trace(
            EventKind::PhiSimplified,
            phi.func(),
            None,
            format!("phi {phi} for `{name}` replaced by {same}"),
        );

        for user in users {
            if self.graph.is_phi(user) {
                self.try_remove_trivial_phi(user)?;
            }
        }
        Ok(self.graph.resolve(same))
    }

    fn update_phi_type(&mut self, phi: ValueId) -> Result<()> {
        let mut merged: Option<Type> = None;
        for edge in self.graph.phi_operands(phi) {
            if self.graph.resolve(edge.value) == phi {
                continue;
            }
            let ty = self.graph.value_type(edge.value);
            merged = Some(match merged {
                Some(prev) => prev.unify(&ty),
                None => ty,
            });
        }
        self.graph
            .set_type(phi, merged.unwrap_or_else(Type::any))
    }

    fn function_name(&self, func: FuncId) -> String {
        self.graph
            .function(func)
            .map(|f| f.name().to_string())
            .unwrap_or_default()
    }

    fn trace(&self, kind: EventKind, func: FuncId, block: Option<BlockId>, message: String) {
        let Some(events) = self.trace else {
            return;
        };
        let mut event = events
            .record(kind)
            .function(self.function_name(func))
            .message(message);
        if let Some(block) = block {
            event = event.block(block.index());
        }
        drop(event);
    }
}
