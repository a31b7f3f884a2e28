//! Statement lowering: assignments, structured control flow and control transfer.

use crate::{
    ast::{
        BinaryOp, ElseBranch, Expr, ForStmt, IfStmt, LeftValue, LeftValueKind, Position,
        RangeStmt, Stmt, StmtKind, SwitchStmt, TryStmt,
    },
    events::EventKind,
    ssa::{
        builder::Builder, BlockId, Const, LoopInfo, Op, Opcode, SwitchLabel, Type, ValueId,
    },
    Error, Result,
};

/// An assignable location after its sub-expressions were built.
enum Place {
    /// A variable of the current function
    Variable(String),
    /// A field or a capture cell, written with an update instruction
    Address(ValueId),
}

impl Builder<'_> {
    /// Builds a statement list, reporting failing statements and continuing with the
    /// next one.
    pub(crate) fn build_statements(&mut self, stmts: &[Stmt]) -> Result<()> {
        for stmt in stmts {
            let result = self.build_statement(stmt);
            self.recover(result)?;
        }
        Ok(())
    }

    fn build_statement(&mut self, stmt: &Stmt) -> Result<()> {
        let pos = stmt.pos;
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.build_expr(expr)?;
            }
            StmtKind::Assign {
                targets,
                values,
                define,
            } => {
                self.build_assign(targets, values, *define, pos)?;
            }
            StmtKind::IncDec { target, increment } => {
                let op = if *increment { BinaryOp::Add } else { BinaryOp::Sub };
                let one = Expr::int(1).at(pos.line, pos.column);
                self.build_op_assign(target, op, &one, pos)?;
            }
            StmtKind::OpAssign { target, op, value } => {
                self.build_op_assign(target, *op, value, pos)?;
            }
            StmtKind::VarDecl { names, values } => self.build_var_decl(names, values, pos)?,
            StmtKind::If(stmt) => self.build_if(stmt, None, pos)?,
            StmtKind::For(stmt) => self.build_for(stmt, pos)?,
            StmtKind::Range(stmt) => self.build_range(stmt, pos)?,
            StmtKind::Switch(stmt) => self.build_switch(stmt, pos)?,
            StmtKind::Try(stmt) => self.build_try(stmt, pos)?,
            StmtKind::Block(stmts) => self.build_statements(stmts)?,
            StmtKind::Assert { cond, message } => {
                let cond = self.build_expr(cond)?;
                let message = message
                    .as_ref()
                    .map(|message| self.build_expr(message))
                    .transpose()?;
                self.emit(Op::Assert { cond, message }, Type::null(), pos)?;
            }
            StmtKind::Panic(value) => {
                let value = self.build_expr(value)?;
                self.emit(Op::Panic { value }, Type::null(), pos)?;
            }
            StmtKind::Return(values) => {
                let results = values
                    .iter()
                    .map(|value| self.build_expr(value))
                    .collect::<Result<Vec<_>>>()?;
                self.emit(Op::Return { results }, Type::null(), pos)?;
            }
            StmtKind::Break => {
                let target = self
                    .break_target()
                    .ok_or(Error::MisplacedControlTransfer {
                        keyword: "break",
                        expected: "loop or switch",
                        position: pos,
                    })?;
                self.emit_jump(target, pos)?;
            }
            StmtKind::Continue => {
                let target = self
                    .continue_target()
                    .ok_or(Error::MisplacedControlTransfer {
                        keyword: "continue",
                        expected: "loop",
                        position: pos,
                    })?;
                self.emit_jump(target, pos)?;
            }
            StmtKind::Fallthrough => {
                let target = self
                    .fallthrough_target()
                    .ok_or(Error::MisplacedControlTransfer {
                        keyword: "fallthrough",
                        expected: "switch case with a following case",
                        position: pos,
                    })?;
                self.emit_jump(target, pos)?;
            }
            StmtKind::Defer(_) => return Err(unsupported_error!(pos, "defer")),
            StmtKind::Go(_) => return Err(unsupported_error!(pos, "go")),
            StmtKind::Include(_) => return Err(unsupported_error!(pos, "include")),
            StmtKind::Empty => {}
        }
        Ok(())
    }

    // ==================================================================================
    // Assignment
    // ==================================================================================

    /// Assigns `values` to `targets` and returns the assigned values.
    ///
    /// All right-hand sides are evaluated before any target is written, so
    /// `a, b = b, a` swaps. A single call assigned to several targets is destructured
    /// into its results.
    fn build_assign(
        &mut self,
        targets: &[LeftValue],
        values: &[Expr],
        define: bool,
        pos: Position,
    ) -> Result<Vec<ValueId>> {
        if targets.len() == values.len() {
            let values = values
                .iter()
                .map(|value| self.build_expr(value))
                .collect::<Result<Vec<_>>>()?;
            for (target, value) in targets.iter().zip(&values) {
                let place = self.build_place(target, define)?;
                self.assign(place, *value, target.pos)?;
            }
            return Ok(values);
        }

        if let [value] = values {
            let value = self.build_expr(value)?;
            if self.graph.opcode(value) == Some(Opcode::Call) {
                return self.destructure(targets, value, define, pos);
            }
        }

        Err(malformed_error!(
            pos,
            "assignment of {} values to {} targets",
            values.len(),
            targets.len()
        ))
    }

    /// Binds each target to one result of a call.
    fn destructure(
        &mut self,
        targets: &[LeftValue],
        call: ValueId,
        define: bool,
        pos: Position,
    ) -> Result<Vec<ValueId>> {
        let call_ty = self.value_type(call);
        if let Some(len) = call_ty.as_object().and_then(|object| object.len()) {
            if len != targets.len() {
                self.events.warn(format!(
                    "{pos}: call returns {len} values, {} are assigned",
                    targets.len()
                ));
            }
        }

        let mut results = Vec::with_capacity(targets.len());
        for (index, target) in targets.iter().enumerate() {
            let key = self.constant(Const::Int(index as i64), pos)?;
            let ty = call_ty
                .as_object()
                .and_then(|object| object.get_field(&index.to_string()))
                .unwrap_or_else(Type::any);
            let field = self.emit_value(Op::Field { object: call, key }, ty, pos)?;
            let place = self.build_place(target, define)?;
            self.assign(place, field, target.pos)?;
            results.push(field);
        }
        Ok(results)
    }

    /// `target op= value`, also `target++` and `target--`.
    fn build_op_assign(
        &mut self,
        target: &LeftValue,
        op: BinaryOp,
        value: &Expr,
        pos: Position,
    ) -> Result<Vec<ValueId>> {
        let place = self.build_place(target, false)?;
        let current = match &place {
            Place::Variable(name) => self.read_identifier(name, target.pos)?,
            Place::Address(address) => *address,
        };
        let rhs = self.build_expr(value)?;
        let result = self.binary(op, current, rhs, pos)?;
        self.assign(place, result, pos)?;
        Ok(vec![result])
    }

    fn build_var_decl(&mut self, names: &[String], values: &[Expr], pos: Position) -> Result<()> {
        if values.is_empty() {
            for name in names {
                let undefined = self.emit_value(
                    Op::Undefined { name: name.clone() },
                    Type::undefined(),
                    pos,
                )?;
                self.write_variable(name, undefined)?;
            }
            return Ok(());
        }

        let targets: Vec<LeftValue> = names
            .iter()
            .map(|name| LeftValue {
                kind: LeftValueKind::Ident(name.clone()),
                pos,
            })
            .collect();
        self.build_assign(&targets, values, true, pos)?;
        Ok(())
    }

    /// Builds the sub-expressions of an assignment target.
    ///
    /// A plain assignment to a name the current function does not define, but an
    /// enclosing function does, writes through the capture cell.
    fn build_place(&mut self, target: &LeftValue, define: bool) -> Result<Place> {
        match &target.kind {
            LeftValueKind::Ident(name) => {
                if define {
                    return Ok(Place::Variable(name.clone()));
                }
                if let Some(cell) = self.captured(name) {
                    return Ok(Place::Address(cell));
                }
                if self.is_local(name) {
                    return Ok(Place::Variable(name.clone()));
                }
                match self.capture(name)? {
                    Some(cell) => Ok(Place::Address(cell)),
                    None => Ok(Place::Variable(name.clone())),
                }
            }
            LeftValueKind::Index { object, key } => {
                let object = self.build_expr(object)?;
                let key = self.build_expr(key)?;
                let ty = self.field_type(object, key);
                let field = self.emit_value(Op::Field { object, key }, ty, target.pos)?;
                Ok(Place::Address(field))
            }
            LeftValueKind::Member { object, name } => {
                let object = self.build_expr(object)?;
                let key = self.constant(Const::Str(name.clone()), target.pos)?;
                let ty = self.field_type(object, key);
                let field = self.emit_value(Op::Field { object, key }, ty, target.pos)?;
                Ok(Place::Address(field))
            }
        }
    }

    fn assign(&mut self, place: Place, value: ValueId, pos: Position) -> Result<()> {
        match place {
            Place::Variable(name) => self.write_variable(&name, value),
            Place::Address(address) => {
                self.emit(Op::Update { address, value }, Type::null(), pos)?;
                Ok(())
            }
        }
    }

    /// Builds a simple statement of a loop clause and returns the values it assigned.
    fn build_clause(&mut self, stmt: &Stmt) -> Result<Vec<ValueId>> {
        let pos = stmt.pos;
        match &stmt.kind {
            StmtKind::Assign {
                targets,
                values,
                define,
            } => self.build_assign(targets, values, *define, pos),
            StmtKind::IncDec { target, increment } => {
                let op = if *increment { BinaryOp::Add } else { BinaryOp::Sub };
                let one = Expr::int(1).at(pos.line, pos.column);
                self.build_op_assign(target, op, &one, pos)
            }
            StmtKind::OpAssign { target, op, value } => {
                self.build_op_assign(target, *op, value, pos)
            }
            StmtKind::Expr(expr) => {
                self.build_expr(expr)?;
                Ok(Vec::new())
            }
            StmtKind::Empty => Ok(Vec::new()),
            _ => Err(malformed_error!(
                pos,
                "loop clause must be a simple statement"
            )),
        }
    }

    /// Builds a condition. A failing condition is reported and replaced by an
    /// undefined marker.
    fn build_condition(&mut self, cond: &Expr) -> Result<ValueId> {
        let result = self.build_expr(cond);
        match self.recover(result)? {
            Some(value) => Ok(value),
            None => self.invalid(cond.pos),
        }
    }

    // ==================================================================================
    // Structured control flow
    // ==================================================================================

    /// Builds an if chain. `done` is the join block of an enclosing chain when this
    /// statement is the `else if` of another one.
    fn build_if(&mut self, stmt: &IfStmt, done: Option<BlockId>, pos: Position) -> Result<()> {
        let outermost = done.is_none();
        let done = match done {
            Some(done) => done,
            None => self.new_block("if.done")?,
        };

        let count = stmt.branches.len();
        for (index, branch) in stmt.branches.iter().enumerate() {
            let cond = self.build_condition(&branch.cond)?;
            let then_block = self.new_block("if.true")?;
            let has_more = index + 1 < count || stmt.else_branch.is_some();
            let else_block = if has_more {
                self.new_block("if.false")?
            } else {
                done
            };

            self.emit(
                Op::If {
                    cond,
                    then_block,
                    else_block,
                },
                Type::null(),
                branch.cond.pos,
            )?;
            self.seal(then_block)?;
            if else_block != done {
                self.seal(else_block)?;
            }

            self.switch_to(then_block);
            self.build_statements(&branch.body)?;
            self.emit_jump(done, pos)?;
            self.switch_to(else_block);
        }

        match &stmt.else_branch {
            Some(ElseBranch::Block(body)) => {
                self.build_statements(body)?;
                self.emit_jump(done, pos)?;
            }
            Some(ElseBranch::If(nested)) => self.build_if(nested, Some(done), pos)?,
            None => {}
        }

        if outermost {
            self.seal(done)?;
            self.switch_to(done);
            let rest = self.new_block("if.rest")?;
            self.emit_jump(rest, pos)?;
            self.seal(rest)?;
            self.switch_to(rest);
        }
        Ok(())
    }

    /// Builds a three clause loop:
    ///
    /// ```text
    /// enter -> header -(cond)-> body -> latch -> header
    ///                 \-(!cond)-> exit
    /// ```
    ///
    /// The header stays unsealed until the back edge from the latch exists.
    fn build_for(&mut self, stmt: &ForStmt, pos: Position) -> Result<()> {
        let header = self.new_block("loop.header")?;
        let body = self.new_block("loop.body")?;
        let exit = self.new_block("loop.exit")?;
        let latch = self.new_block("loop.latch")?;

        let init = match &stmt.init {
            Some(init) => {
                let result = self.build_clause(init);
                self.recover(result)?.unwrap_or_default()
            }
            None => Vec::new(),
        };
        self.emit_jump(header, pos)?;

        self.switch_to(header);
        let cond = match &stmt.cond {
            Some(cond) => self.build_condition(cond)?,
            None => self.constant(Const::Bool(true), pos)?,
        };
        let loop_instr = self.emit(Op::Loop(LoopInfo::new(cond, body, exit)), Type::null(), pos)?;
        self.seal(body)?;

        self.push_target(exit, Some(latch), None);
        self.switch_to(body);
        let result = self.build_statements(&stmt.body);
        self.pop_target();
        result?;
        self.emit_jump(latch, pos)?;

        self.seal(latch)?;
        self.switch_to(latch);
        let step = match &stmt.step {
            Some(step) => {
                let result = self.build_clause(step);
                self.recover(result)?.unwrap_or_default()
            }
            None => Vec::new(),
        };
        self.emit_jump(header, pos)?;

        self.seal(header)?;
        self.seal(exit)?;

        let info = self.graph.finish_loop(loop_instr, &init, &step)?;
        if let Some(key) = info.key {
            let describe =
                |value: Option<ValueId>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
            self.events
                .record(EventKind::LoopFinalized)
                .function(self.function_name(self.current.func))
                .block(header.index())
                .message(format!(
                    "key {key} init {} step {}",
                    describe(info.init),
                    describe(info.step)
                ));
        }

        self.switch_to(exit);
        Ok(())
    }

    /// Builds `for key, value = range iterable` and `for value in iterable`.
    ///
    /// The header advances the iterator with a next instruction and loops while its
    /// `ok` field holds.
    fn build_range(&mut self, stmt: &RangeStmt, pos: Position) -> Result<()> {
        let iter = self.build_condition(&stmt.iterable)?;

        let header = self.new_block("loop.header")?;
        let body = self.new_block("loop.body")?;
        let exit = self.new_block("loop.exit")?;
        let latch = self.new_block("loop.latch")?;

        self.emit_jump(header, pos)?;
        self.switch_to(header);
        let next = self.emit_value(
            Op::Next {
                iter,
                in_next: stmt.is_in,
            },
            Type::next_record(),
            pos,
        )?;
        let ok = self.record_field(next, "ok", pos)?;
        self.emit(Op::Loop(LoopInfo::new(ok, body, exit)), Type::null(), pos)?;
        self.seal(body)?;

        self.push_target(exit, Some(latch), None);
        self.switch_to(body);
        let result = self.bind_range_variables(stmt, next, pos);
        let result = match result {
            Ok(()) => self.build_statements(&stmt.body),
            Err(err) => Err(err),
        };
        self.pop_target();
        result?;
        self.emit_jump(latch, pos)?;

        self.seal(latch)?;
        self.switch_to(latch);
        self.emit_jump(header, pos)?;
        self.seal(header)?;
        self.seal(exit)?;
        self.switch_to(exit);
        Ok(())
    }

    fn bind_range_variables(&mut self, stmt: &RangeStmt, next: ValueId, pos: Position) -> Result<()> {
        if let Some(key) = &stmt.key {
            let value = self.record_field(next, "key", pos)?;
            self.write_variable(key, value)?;
        }
        if let Some(name) = &stmt.value {
            let value = self.record_field(next, "field", pos)?;
            self.write_variable(name, value)?;
        }
        Ok(())
    }

    fn record_field(&mut self, object: ValueId, name: &str, pos: Position) -> Result<ValueId> {
        let key = self.constant(Const::Str(name.to_string()), pos)?;
        let ty = self.field_type(object, key);
        self.emit_value(Op::Field { object, key }, ty, pos)
    }

    /// Builds a switch. Case values are evaluated before the switch terminator, every
    /// case gets its own handler block and `fallthrough` jumps to the next handler.
    fn build_switch(&mut self, stmt: &SwitchStmt, pos: Position) -> Result<()> {
        let cond = match &stmt.cond {
            Some(cond) => self.build_condition(cond)?,
            None => self.constant(Const::Bool(true), pos)?,
        };

        let mut labels = Vec::new();
        let mut handlers = Vec::with_capacity(stmt.cases.len());
        for case in &stmt.cases {
            let dest = self.new_block("switch.handler")?;
            for value in &case.values {
                let value = self.build_condition(value)?;
                labels.push(SwitchLabel { value, dest });
            }
            handlers.push(dest);
        }

        let done = self.new_block("switch.done")?;
        let default = match stmt.default {
            Some(_) => self.new_block("switch.default")?,
            None => done,
        };
        self.emit(
            Op::Switch {
                cond,
                default,
                labels,
            },
            Type::null(),
            pos,
        )?;

        for (index, case) in stmt.cases.iter().enumerate() {
            let handler = handlers[index];
            let fallthrough = handlers
                .get(index + 1)
                .copied()
                .or(stmt.default.as_ref().map(|_| default));

            self.seal(handler)?;
            self.switch_to(handler);
            self.push_target(done, None, fallthrough);
            let result = self.build_statements(&case.body);
            self.pop_target();
            result?;
            self.emit_jump(done, pos)?;
        }

        if let Some(body) = &stmt.default {
            self.seal(default)?;
            self.switch_to(default);
            self.push_target(done, None, None);
            let result = self.build_statements(body);
            self.pop_target();
            result?;
            self.emit_jump(done, pos)?;
        }

        self.seal(done)?;
        self.switch_to(done);
        Ok(())
    }

    /// Builds `try { } catch name { } finally { }` around an error handler.
    fn build_try(&mut self, stmt: &TryStmt, pos: Position) -> Result<()> {
        let try_block = self.new_block("error.try")?;
        let catch_block = self.new_block("error.catch")?;
        let final_block = match stmt.finally {
            Some(_) => Some(self.new_block("error.final")?),
            None => None,
        };
        let done = self.new_block("error.done")?;
        let after = final_block.unwrap_or(done);

        self.emit(
            Op::ErrorHandler {
                try_block,
                catch_block,
                final_block,
                done,
            },
            Type::null(),
            pos,
        )?;

        self.seal(try_block)?;
        self.switch_to(try_block);
        self.build_statements(&stmt.body)?;
        self.emit_jump(after, pos)?;

        self.seal(catch_block)?;
        self.switch_to(catch_block);
        if let Some(name) = &stmt.catch_name {
            let err = self.emit_value(Op::Recover, Type::error(), pos)?;
            self.write_variable(name, err)?;
        }
        self.build_statements(&stmt.catch_body)?;
        self.emit_jump(after, pos)?;

        if let (Some(final_block), Some(body)) = (final_block, &stmt.finally) {
            self.seal(final_block)?;
            self.switch_to(final_block);
            self.build_statements(body)?;
            self.emit_jump(done, pos)?;
        }

        self.seal(done)?;
        self.switch_to(done);
        Ok(())
    }
}
