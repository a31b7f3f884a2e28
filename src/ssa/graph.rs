//! The SSA graph of a package.
//!
//! A [`Graph`] is an arena of [`Function`]s. All mutation goes through the graph so
//! that the def-use relation stays symmetric: whenever an instruction references a
//! value as operand, the instruction is listed among that value's users, and the two
//! sides are always changed together.
//!
//! # Replacements
//!
//! Removing a trivial phi rewrites every use of it. Ids of removed phis may still be
//! held by code that is in the middle of building an expression, so the graph keeps
//! a forwarding map and [`Graph::resolve`] follows it. Operands are resolved when an
//! instruction is emitted, which keeps removed phis out of newly built instructions.

use rustc_hash::FxHashMap;

use crate::{
    ast::Position,
    ssa::{
        BasicBlock, BlockId, FuncId, Function, FunctionType, InstrId, Instruction, LoopInfo, Op,
        Opcode, PhiOperand, Type, Value, ValueId, ValueKind,
    },
    Error, Result,
};

/// All functions of one package.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    functions: Vec<Function>,
    replacements: FxHashMap<ValueId, ValueId>,
}

impl Graph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All functions, the main function first.
    #[must_use]
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Looks up a function.
    #[must_use]
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.index())
    }

    /// The main function.
    #[must_use]
    pub fn main(&self) -> Option<&Function> {
        self.functions.first()
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|function| function.name() == name)
    }

    /// Looks up a block.
    #[must_use]
    pub fn block(&self, func: FuncId, block: BlockId) -> Option<&BasicBlock> {
        self.function(func)?.block(block)
    }

    /// Looks up a value, following replacements of removed phis.
    #[must_use]
    pub fn value(&self, id: ValueId) -> Option<&Value> {
        let id = self.resolve(id);
        self.function(id.func())?.value(id)
    }

    /// Looks up an instruction.
    #[must_use]
    pub fn instruction(&self, id: InstrId) -> Option<&Instruction> {
        self.function(id.func())?.instruction(id)
    }

    /// The instruction defining a value.
    #[must_use]
    pub fn defining_instruction(&self, value: ValueId) -> Option<&Instruction> {
        self.instruction(self.value(value)?.instruction()?)
    }

    /// The opcode of the instruction defining a value.
    #[must_use]
    pub fn opcode(&self, value: ValueId) -> Option<Opcode> {
        self.defining_instruction(value).map(Instruction::opcode)
    }

    /// Returns true if the value is a phi that is still part of a block.
    #[must_use]
    pub fn is_phi(&self, value: ValueId) -> bool {
        self.defining_instruction(value)
            .is_some_and(Instruction::is_live_phi)
    }

    /// The operands of the instruction defining `value`.
    ///
    /// A free value answers with the captured value of the enclosing function;
    /// parameters and function references have no operands.
    #[must_use]
    pub fn operands(&self, value: ValueId) -> Vec<ValueId> {
        let Some(val) = self.value(value) else {
            return Vec::new();
        };
        match val.kind() {
            ValueKind::Instruction(_) => self
                .defining_instruction(value)
                .map(|instr| instr.op().operands())
                .unwrap_or_default(),
            ValueKind::FreeValue { captured } => captured.into_iter().collect(),
            ValueKind::Parameter { .. } | ValueKind::Function(_) => Vec::new(),
        }
    }

    /// The instructions using `value`.
    #[must_use]
    pub fn users(&self, value: ValueId) -> &[InstrId] {
        self.value(value).map(Value::users).unwrap_or_default()
    }

    /// The results of the instructions using `value`.
    #[must_use]
    pub fn user_values(&self, value: ValueId) -> Vec<ValueId> {
        self.users(value)
            .iter()
            .filter_map(|user| self.instruction(*user)?.result())
            .collect()
    }

    /// The incoming values of a phi.
    #[must_use]
    pub fn phi_operands(&self, phi: ValueId) -> Vec<PhiOperand> {
        match self.defining_instruction(phi).map(Instruction::op) {
            Some(Op::Phi { edges }) => edges.clone(),
            _ => Vec::new(),
        }
    }

    /// Follows the replacement chain of removed phis.
    #[must_use]
    pub fn resolve(&self, mut value: ValueId) -> ValueId {
        while let Some(next) = self.replacements.get(&value) {
            value = *next;
        }
        value
    }

    /// Number of live phis in all functions.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.functions.iter().map(|f| f.phis().count()).sum()
    }

    pub(crate) fn add_function(
        &mut self,
        name: String,
        parent: Option<FuncId>,
        position: Position,
    ) -> Result<FuncId> {
        let id = FuncId::new(self.functions.len());
        let mut function = Function::new(id, name, parent, position);
        function.push_block("entry");
        self.functions.push(function);

        if let Some(parent) = parent {
            self.function_mut(parent)?.add_child(id);
        }
        Ok(id)
    }

    pub(crate) fn function_mut(&mut self, id: FuncId) -> Result<&mut Function> {
        self.functions
            .get_mut(id.index())
            .ok_or_else(|| Error::SsaError(format!("function {id} does not exist")))
    }

    pub(crate) fn block_mut(&mut self, func: FuncId, block: BlockId) -> Result<&mut BasicBlock> {
        self.function_mut(func)?
            .block_mut(block)
            .ok_or_else(|| Error::SsaError(format!("block {block} does not exist in {func}")))
    }

    pub(crate) fn value_mut(&mut self, id: ValueId) -> Result<&mut Value> {
        self.function_mut(id.func())?
            .value_mut(id)
            .ok_or_else(|| Error::SsaError(format!("value {id} does not exist in {}", id.func())))
    }

    fn instruction_mut(&mut self, id: InstrId) -> Result<&mut Instruction> {
        self.function_mut(id.func())?
            .instruction_mut(id)
            .ok_or_else(|| Error::SsaError(format!("instruction {id} does not exist in {}", id.func())))
    }

    pub(crate) fn add_block(&mut self, func: FuncId, name: &str) -> Result<BlockId> {
        Ok(self.function_mut(func)?.push_block(name))
    }

    /// Adds the control-flow edge `from -> to`.
    ///
    /// # Errors
    /// Returns [`Error::SsaError`] if `to` is already sealed.
    pub(crate) fn add_edge(&mut self, func: FuncId, from: BlockId, to: BlockId) -> Result<()> {
        let target = self.block_mut(func, to)?;
        if target.is_sealed() {
            return Err(Error::SsaError(format!(
                "edge {from} -> {to} added to a sealed block in {func}"
            )));
        }
        target.add_pred(from);
        self.block_mut(func, from)?.add_succ(to);
        Ok(())
    }

    pub(crate) fn seal_block(&mut self, func: FuncId, block: BlockId) -> Result<()> {
        self.block_mut(func, block)?.seal();
        Ok(())
    }

    /// Appends an instruction to a block and registers it as user of its operands.
    ///
    /// Terminators also add the edges to their successors.
    pub(crate) fn emit(
        &mut self,
        func: FuncId,
        block: BlockId,
        mut op: Op,
        ty: Type,
        position: Position,
    ) -> Result<InstrId> {
        op.for_each_operand_mut(|operand| *operand = self.resolve(*operand));

        let successors = op.successors();
        for succ in &successors {
            let sealed = self
                .block(func, *succ)
                .ok_or_else(|| Error::SsaError(format!("block {succ} does not exist in {func}")))?
                .is_sealed();
            if sealed {
                return Err(Error::SsaError(format!(
                    "edge {block} -> {succ} added to a sealed block in {func}"
                )));
            }
        }

        let operands = op.operands();
        let is_phi = matches!(op, Op::Phi { .. });
        let terminates = op.is_terminator();
        let produces = op.produces_value();

        let function = self.function_mut(func)?;
        if function.block(block).is_none() {
            return Err(Error::SsaError(format!("block {block} does not exist in {func}")));
        }

        let id = function.next_instruction_id();
        let mut instr = Instruction::new(id, op, block, position);
        if produces {
            let value = function.next_value_id();
            function.push_value(Value::new(value, ValueKind::Instruction(id), ty));
            instr.set_result(value);
        }
        function.push_instruction(instr);

        let target = self.block_mut(func, block)?;
        if is_phi {
            target.push_phi(id);
        } else {
            target.push_instruction(id, terminates);
        }

        for succ in successors {
            self.add_edge(func, block, succ)?;
        }
        for operand in operands {
            self.value_mut(operand)?.add_user(id);
        }
        Ok(id)
    }

    /// Like [`Graph::emit`] for instructions that define a value.
    pub(crate) fn emit_value(
        &mut self,
        func: FuncId,
        block: BlockId,
        op: Op,
        ty: Type,
        position: Position,
    ) -> Result<ValueId> {
        let opcode = op.opcode();
        let id = self.emit(func, block, op, ty, position)?;
        self.instruction(id)
            .and_then(Instruction::result)
            .ok_or_else(|| Error::SsaError(format!("{opcode} does not define a value")))
    }

    /// Creates the undefined marker of `name`, placed first in the entry block.
    pub(crate) fn insert_undefined(&mut self, func: FuncId, name: &str) -> Result<ValueId> {
        let function = self.function_mut(func)?;
        let entry = BlockId::new(0);
        let id = function.next_instruction_id();
        let value = function.next_value_id();

        let mut instr = Instruction::new(
            id,
            Op::Undefined {
                name: name.to_string(),
            },
            entry,
            Position::default(),
        );
        instr.set_result(value);

        let mut undefined = Value::new(value, ValueKind::Instruction(id), Type::undefined());
        undefined.set_variable(name);
        function.push_value(undefined);
        function.push_instruction(instr);
        function
            .block_mut(entry)
            .ok_or_else(|| Error::SsaError(format!("{func} has no entry block")))?
            .insert_front(id);
        Ok(value)
    }

    /// Creates an operand-less phi for `name` in `block`.
    pub(crate) fn new_phi(&mut self, func: FuncId, block: BlockId, name: &str) -> Result<ValueId> {
        let phi = self.emit_value(
            func,
            block,
            Op::Phi { edges: Vec::new() },
            Type::any(),
            Position::default(),
        )?;
        self.value_mut(phi)?.set_variable(name);
        Ok(phi)
    }

    pub(crate) fn add_phi_operand(
        &mut self,
        phi: ValueId,
        predecessor: BlockId,
        value: ValueId,
    ) -> Result<()> {
        let value = self.resolve(value);
        let instr = self.phi_instruction(phi)?;
        if let Op::Phi { edges } = self.instruction_mut(instr)?.op_mut() {
            edges.push(PhiOperand { value, predecessor });
        }
        self.value_mut(value)?.add_user(instr);
        Ok(())
    }

    /// Removes a phi from its block and from the users of its operands.
    pub(crate) fn detach_phi(&mut self, phi: ValueId) -> Result<()> {
        let instr = self.phi_instruction(phi)?;
        let (block, edges) = {
            let instruction = self.instruction_mut(instr)?;
            let block = instruction.block();
            let edges = match instruction.op_mut() {
                Op::Phi { edges } => std::mem::take(edges),
                _ => Vec::new(),
            };
            instruction.detach();
            (block, edges)
        };

        for edge in edges {
            self.value_mut(edge.value)?.remove_user(instr);
        }
        if let Some(block) = block {
            self.block_mut(phi.func(), block)?.remove_phi(instr);
        }
        Ok(())
    }

    /// Rewrites every use of `from` to `to`.
    ///
    /// Operands of user instructions, variable definitions of the owning function and
    /// the captured value of free values all follow the replacement.
    pub(crate) fn replace_all_uses(&mut self, from: ValueId, to: ValueId) -> Result<()> {
        let users = self.value_mut(from)?.take_users();
        for user in users {
            self.instruction_mut(user)?.op_mut().for_each_operand_mut(|operand| {
                if *operand == from {
                    *operand = to;
                }
            });
            self.value_mut(to)?.add_user(user);
        }

        self.function_mut(from.func())?.replace_current_defs(from, to);
        for function in &mut self.functions {
            function.replace_capture(from, to);
            for value in function.values_mut() {
                if let ValueKind::FreeValue {
                    captured: Some(captured),
                } = value.kind()
                {
                    if captured == from {
                        value.set_kind(ValueKind::FreeValue { captured: Some(to) });
                    }
                }
            }
        }

        self.replacements.insert(from, to);
        Ok(())
    }

    pub(crate) fn set_type(&mut self, value: ValueId, ty: Type) -> Result<()> {
        let value = self.resolve(value);
        self.value_mut(value)?.set_type(ty);
        Ok(())
    }

    pub(crate) fn set_variable(&mut self, value: ValueId, name: &str) -> Result<()> {
        let value = self.resolve(value);
        self.value_mut(value)?.set_variable(name);
        Ok(())
    }

    pub(crate) fn new_parameter(
        &mut self,
        func: FuncId,
        index: usize,
        name: &str,
        ty: Type,
    ) -> Result<ValueId> {
        let function = self.function_mut(func)?;
        let id = function.next_value_id();
        let mut value = Value::new(id, ValueKind::Parameter { index }, ty);
        value.set_variable(name);
        function.push_value(value);
        function.push_param(id);
        Ok(id)
    }

    pub(crate) fn new_free_value(
        &mut self,
        func: FuncId,
        name: &str,
        captured: ValueId,
    ) -> Result<ValueId> {
        let captured = self.resolve(captured);
        let ty = self
            .value(captured)
            .map(|value| value.ty().clone())
            .unwrap_or_else(Type::any);

        let function = self.function_mut(func)?;
        let id = function.next_value_id();
        let mut value = Value::new(
            id,
            ValueKind::FreeValue {
                captured: Some(captured),
            },
            ty,
        );
        value.set_variable(name);
        function.push_value(value);
        Ok(id)
    }

    pub(crate) fn new_function_value(
        &mut self,
        func: FuncId,
        child: FuncId,
        name: &str,
    ) -> Result<ValueId> {
        let ty = self
            .function(child)
            .and_then(Function::ty)
            .cloned()
            .unwrap_or_else(Type::any);

        let function = self.function_mut(func)?;
        let id = function.next_value_id();
        let mut value = Value::new(id, ValueKind::Function(child), ty);
        value.set_variable(name);
        function.push_value(value);
        Ok(id)
    }

    /// Fills in the induction information of a loop terminator.
    ///
    /// The key is the phi compared by the condition, tried on the left operand first.
    /// Init and step are the first of the given values that flow into the key.
    pub(crate) fn finish_loop(
        &mut self,
        loop_instr: InstrId,
        init: &[ValueId],
        step: &[ValueId],
    ) -> Result<LoopInfo> {
        let mut info = match self.instruction(loop_instr).map(Instruction::op) {
            Some(Op::Loop(info)) => *info,
            _ => {
                return Err(Error::SsaError(format!(
                    "{loop_instr} is not a loop terminator"
                )))
            }
        };

        let cond = self.resolve(info.cond);
        let key = match self.defining_instruction(cond).map(Instruction::op) {
            Some(Op::BinOp { x, y, .. }) => [*x, *y].into_iter().find(|v| self.is_phi(*v)),
            _ => None,
        };

        if let Some(key) = key {
            let incoming: Vec<ValueId> = self
                .phi_operands(key)
                .iter()
                .map(|edge| edge.value)
                .collect();
            let pick = |candidates: &[ValueId]| {
                candidates
                    .iter()
                    .map(|v| self.resolve(*v))
                    .find(|v| incoming.contains(v))
            };
            info.key = Some(key);
            info.init = pick(init);
            info.step = pick(step);
        }

        if let Op::Loop(slot) = self.instruction_mut(loop_instr)?.op_mut() {
            *slot = info;
        }
        for value in [info.key, info.init, info.step].into_iter().flatten() {
            self.value_mut(value)?.add_user(loop_instr);
        }
        Ok(info)
    }

    /// Records entry and exit of a function and computes its type.
    ///
    /// Return types are unified per position over all return instructions; the
    /// combined result is `null` for no values, the single type for one value and a
    /// combination otherwise.
    pub(crate) fn finish_function(&mut self, func: FuncId, exit: BlockId) -> Result<Type> {
        let function = self
            .function(func)
            .ok_or_else(|| Error::SsaError(format!("function {func} does not exist")))?;

        let returns: Vec<Vec<ValueId>> = function
            .instructions()
            .iter()
            .filter(|instr| instr.block().is_some())
            .filter_map(|instr| match instr.op() {
                Op::Return { results } => Some(results.clone()),
                _ => None,
            })
            .collect();

        let arity = returns.iter().map(Vec::len).max().unwrap_or(0);
        let mut results = Vec::with_capacity(arity);
        for index in 0..arity {
            let mut merged: Option<Type> = None;
            for ty in returns
                .iter()
                .filter_map(|values| values.get(index))
                .map(|value| self.value_type(*value))
            {
                merged = Some(match merged {
                    Some(prev) => prev.unify(&ty),
                    None => ty,
                });
            }
            results.push(merged.unwrap_or_else(Type::any));
        }

        let params = function
            .params()
            .iter()
            .map(|param| self.value_type(*param))
            .collect();
        let captures = function
            .captures()
            .iter()
            .map(|capture| capture.name.clone());
        let ty = Type::function(
            FunctionType::new(params, Type::combine(results), function.is_variadic())
                .with_free_values(captures),
        );

        self.function_mut(func)?.finish(exit, ty.clone());
        Ok(ty)
    }

    pub(crate) fn value_type(&self, value: ValueId) -> Type {
        self.value(value)
            .map(|v| v.ty().clone())
            .unwrap_or_else(Type::any)
    }

    fn phi_instruction(&self, phi: ValueId) -> Result<InstrId> {
        self.function(phi.func())
            .and_then(|function| function.value(phi))
            .and_then(Value::instruction)
            .ok_or_else(|| Error::SsaError(format!("{phi} is not an instruction result")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssa::Const;

    fn graph() -> (Graph, FuncId) {
        let mut graph = Graph::new();
        let main = graph
            .add_function("main".into(), None, Position::default())
            .unwrap();
        (graph, main)
    }

    fn constant(graph: &mut Graph, func: FuncId, block: BlockId, value: i64) -> ValueId {
        graph
            .emit_value(
                func,
                block,
                Op::Const(Const::Int(value)),
                Type::number(),
                Position::default(),
            )
            .unwrap()
    }

    #[test]
    fn test_emit_registers_users() {
        let (mut graph, main) = graph();
        let entry = BlockId::new(0);
        let a = constant(&mut graph, main, entry, 1);
        let b = constant(&mut graph, main, entry, 2);
        let sum = graph
            .emit_value(
                main,
                entry,
                Op::BinOp {
                    op: crate::ast::BinaryOp::Add,
                    x: a,
                    y: b,
                },
                Type::number(),
                Position::default(),
            )
            .unwrap();

        assert_eq!(graph.operands(sum), vec![a, b]);
        assert_eq!(graph.user_values(a), vec![sum]);
        assert_eq!(graph.opcode(sum), Some(Opcode::BinOp));
    }

    #[test]
    fn test_terminator_adds_edges() {
        let (mut graph, main) = graph();
        let entry = BlockId::new(0);
        let next = graph.add_block(main, "if.done").unwrap();
        graph
            .emit(main, entry, Op::Jump { to: next }, Type::null(), Position::default())
            .unwrap();

        assert_eq!(graph.block(main, next).unwrap().preds(), &[entry]);
        assert_eq!(graph.block(main, entry).unwrap().succs(), &[next]);
        assert!(graph.block(main, entry).unwrap().is_terminated());
    }

    #[test]
    fn test_edge_into_sealed_block_fails() {
        let (mut graph, main) = graph();
        let entry = BlockId::new(0);
        let next = graph.add_block(main, "if.done").unwrap();
        graph.seal_block(main, next).unwrap();

        let err = graph.add_edge(main, entry, next).unwrap_err();
        assert!(matches!(err, Error::SsaError(_)));
        let err = graph
            .emit(main, entry, Op::Jump { to: next }, Type::null(), Position::default())
            .unwrap_err();
        assert!(matches!(err, Error::SsaError(_)));
    }

    #[test]
    fn test_replace_all_uses() {
        let (mut graph, main) = graph();
        let entry = BlockId::new(0);
        let phi = graph.new_phi(main, entry, "x").unwrap();
        let one = constant(&mut graph, main, entry, 1);
        let two = constant(&mut graph, main, entry, 2);
        let sum = graph
            .emit_value(
                main,
                entry,
                Op::BinOp {
                    op: crate::ast::BinaryOp::Add,
                    x: phi,
                    y: two,
                },
                Type::number(),
                Position::default(),
            )
            .unwrap();

        graph.detach_phi(phi).unwrap();
        graph.replace_all_uses(phi, one).unwrap();

        assert_eq!(graph.operands(sum), vec![one, two]);
        assert_eq!(graph.user_values(one), vec![sum]);
        assert_eq!(graph.resolve(phi), one);
        assert!(!graph.is_phi(phi));
        assert_eq!(graph.phi_count(), 0);
    }

    #[test]
    fn test_undefined_goes_first_in_entry() {
        let (mut graph, main) = graph();
        let entry = BlockId::new(0);
        constant(&mut graph, main, entry, 1);
        let undefined = graph.insert_undefined(main, "y").unwrap();

        let block = graph.block(main, entry).unwrap();
        let first = graph.instruction(block.instructions()[0]).unwrap();
        assert_eq!(first.result(), Some(undefined));
        assert!(graph.value(undefined).unwrap().ty().ptr_eq(&Type::undefined()));
    }

    #[test]
    fn test_finish_function_combines_returns() {
        let (mut graph, main) = graph();
        let entry = BlockId::new(0);
        let a = constant(&mut graph, main, entry, 1);
        let b = graph
            .emit_value(
                main,
                entry,
                Op::Const(Const::Str("s".into())),
                Type::string(),
                Position::default(),
            )
            .unwrap();
        graph
            .emit(
                main,
                entry,
                Op::Return {
                    results: vec![a, b],
                },
                Type::null(),
                Position::default(),
            )
            .unwrap();

        let ty = graph.finish_function(main, entry).unwrap();
        assert_eq!(ty.to_string(), "fn() -> number, string");
        let function = graph.main().unwrap();
        assert_eq!(function.entry(), Some(entry));
        assert_eq!(function.exit(), Some(entry));
    }
}
