//! Lowering of syntax trees into SSA form.
//!
//! The [`Builder`] walks the statements of a [`SourceFile`] once, emitting
//! instructions into the current block of the current function and resolving
//! variables on the fly with the [`Resolver`].
//!
//! # Architecture
//!
//! The builder keeps one [`Frame`] per open function: the function, its current
//! block and the chain of break/continue/fallthrough targets of the enclosing
//! loops and switches. Function literals push a frame, are built to completion and
//! pop it again, so `parents` mirrors the lexical nesting of the function being
//! built. A read whose path reaches the entry of a nested function without a
//! definition is looked up in the enclosing frames and captured as a free value.
//!
//! A read of a name the function has not assigned yet may still be defined later
//! in a loop body and arrive over the back edge. Such reads are checked again when
//! the function is finished, and reported if they resolved to an undefined marker.
//!
//! # Sealing
//!
//! Every block is created unsealed and sealed as soon as all of its predecessors
//! exist. Loop headers are the only blocks that stay open while statements are
//! built into them (and into the loop body); everything else is sealed right after
//! its incoming edges were wired.
//!
//! # Diagnostics
//!
//! Source errors are reported through [`Builder::report`]. Under
//! [`ErrorPolicy::BestEffort`](crate::ErrorPolicy::BestEffort) the statement is
//! skipped and the diagnostic stored on the function; a failing condition is replaced
//! by an undefined marker so the control flow keeps its shape. Under the strict policy
//! the first diagnostic aborts the build.

mod expression;
mod statement;

use std::mem;

use rustc_hash::FxHashSet;

use crate::{
    ast::{Position, SourceFile},
    config::BuildConfig,
    events::{EventKind, EventLog},
    ssa::{
        resolver::Resolver, BasicBlock, BlockId, Const, FuncId, Graph, InstrId, Op, Type, Value,
        ValueId, ValueKind,
    },
    Error, Result,
};

/// Name of the function holding the top-level statements of a package.
pub const MAIN_FUNCTION: &str = "main";

/// The result of building one package.
#[derive(Debug)]
pub(crate) struct BuildOutput {
    /// The graph, partial if the build failed
    pub graph: Graph,
    /// The error that stopped a strict build
    pub failure: Option<Error>,
}

/// Where `break`, `continue` and `fallthrough` jump to.
#[derive(Debug, Clone)]
struct Target {
    break_to: BlockId,
    continue_to: Option<BlockId>,
    fallthrough_to: Option<BlockId>,
    parent: Option<Box<Target>>,
}

/// An open function.
#[derive(Debug)]
struct Frame {
    func: FuncId,
    block: BlockId,
    target: Option<Box<Target>>,
}

impl Frame {
    fn new(func: FuncId) -> Self {
        Self {
            func,
            block: BlockId::new(0),
            target: None,
        }
    }
}

/// A read of a name that was neither assigned nor captured when it was built.
#[derive(Debug)]
struct PendingRead {
    /// The function containing the read
    func: FuncId,
    /// The function whose completion settles the value
    settled_by: FuncId,
    name: String,
    position: Position,
    value: ValueId,
}

/// Builds the graph of one package.
pub(crate) struct Builder<'a> {
    graph: Graph,
    config: &'a BuildConfig,
    events: &'a EventLog,
    package: String,
    current: Frame,
    parents: Vec<Frame>,
    pending: Vec<PendingRead>,
    aborted: bool,
}

impl<'a> Builder<'a> {
    /// Creates a builder with an open main function.
    pub(crate) fn new(package: &str, config: &'a BuildConfig, events: &'a EventLog) -> Result<Self> {
        let mut graph = Graph::new();
        let main = graph.add_function(MAIN_FUNCTION.to_string(), None, Position::default())?;

        let mut builder = Self {
            graph,
            config,
            events,
            package: package.to_string(),
            current: Frame::new(main),
            parents: Vec::new(),
            pending: Vec::new(),
            aborted: false,
        };
        builder.seal(BlockId::new(0))?;
        builder
            .events
            .record(EventKind::FunctionCreated)
            .function(MAIN_FUNCTION)
            .message(format!("main function of package `{package}`"));
        Ok(builder)
    }

    /// Builds the statements of `source` into the main function.
    pub(crate) fn build(mut self, source: &SourceFile) -> BuildOutput {
        let result = self.build_statements(&source.body);
        let finished = self.finish_function().map(|_| ());

        let failure = result.and(finished).err().map(|err| Error::BuildFailed {
            package: self.package.clone(),
            source: Box::new(err),
        });
        BuildOutput {
            graph: self.graph,
            failure,
        }
    }

    /// Handles a diagnostic according to the error policy.
    ///
    /// Returns `Ok` if building may continue.
    pub(crate) fn report(&mut self, err: Error) -> Result<()> {
        let func = self.current.func;
        self.report_in(func, err)
    }

    /// Handles a diagnostic about `func`, which may be a function finished earlier.
    fn report_in(&mut self, func: FuncId, err: Error) -> Result<()> {
        if self.aborted {
            return Err(err);
        }

        let mut event = self
            .events
            .record(EventKind::Error)
            .function(self.function_name(func))
            .message(err.to_string());
        if func == self.current.func {
            event = event.block(self.current.block.index());
        }
        drop(event);
        if let Ok(function) = self.graph.function_mut(func) {
            function.add_diagnostic(err.clone());
        }

        if self.config.is_strict() {
            self.aborted = true;
            Err(err)
        } else {
            Ok(())
        }
    }

    /// Reports a failed result and turns it into `None` if building may continue.
    pub(crate) fn recover<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.report(err)?;
                Ok(None)
            }
        }
    }

    fn resolver(&mut self) -> Resolver<'_> {
        let scopes = self
            .parents
            .iter()
            .chain(std::iter::once(&self.current))
            .map(|frame| (frame.func, frame.block))
            .collect();
        Resolver::new(&mut self.graph, self.config.trace.then_some(self.events))
            .within(scopes, self.events)
    }

    fn function_name(&self, func: FuncId) -> String {
        self.graph
            .function(func)
            .map(|f| f.name().to_string())
            .unwrap_or_default()
    }

    // ==================================================================================
    // Blocks
    // ==================================================================================

    pub(crate) fn new_block(&mut self, name: &str) -> Result<BlockId> {
        let func = self.current.func;
        let block = self.graph.add_block(func, name)?;
        if self.config.trace {
            let label = self
                .graph
                .block(func, block)
                .map(|b| b.name().to_string())
                .unwrap_or_default();
            self.events
                .record(EventKind::BlockCreated)
                .function(self.function_name(func))
                .block(block.index())
                .message(label);
        }
        Ok(block)
    }

    pub(crate) fn seal(&mut self, block: BlockId) -> Result<()> {
        let func = self.current.func;
        self.resolver().seal_block(func, block)
    }

    pub(crate) fn switch_to(&mut self, block: BlockId) {
        self.current.block = block;
    }

    pub(crate) fn current_block(&self) -> BlockId {
        self.current.block
    }

    fn is_terminated(&self) -> bool {
        self.graph
            .block(self.current.func, self.current.block)
            .is_some_and(BasicBlock::is_terminated)
    }

    /// Moves to a fresh unreachable block if the current one already ended.
    fn ensure_open_block(&mut self) -> Result<()> {
        if self.is_terminated() {
            let dead = self.new_block("unreachable")?;
            self.seal(dead)?;
            self.switch_to(dead);
        }
        Ok(())
    }

    // ==================================================================================
    // Emission
    // ==================================================================================

    pub(crate) fn emit(&mut self, op: Op, ty: Type, pos: Position) -> Result<InstrId> {
        self.ensure_open_block()?;
        self.graph
            .emit(self.current.func, self.current.block, op, ty, pos)
    }

    pub(crate) fn emit_value(&mut self, op: Op, ty: Type, pos: Position) -> Result<ValueId> {
        self.ensure_open_block()?;
        self.graph
            .emit_value(self.current.func, self.current.block, op, ty, pos)
    }

    /// Returns true if the current block is sealed without any predecessor.
    fn is_unreachable(&self) -> bool {
        self.current.block != BlockId::new(0)
            && self
                .graph
                .block(self.current.func, self.current.block)
                .is_some_and(|b| b.is_sealed() && b.preds().is_empty())
    }

    /// Jumps to `to` unless the current block already ended or can not be reached.
    ///
    /// Definitions made in an unreachable block never flow into `to`.
    pub(crate) fn emit_jump(&mut self, to: BlockId, pos: Position) -> Result<()> {
        if self.is_terminated() || self.is_unreachable() {
            return Ok(());
        }
        self.emit(Op::Jump { to }, Type::null(), pos)?;
        Ok(())
    }

    pub(crate) fn constant(&mut self, value: Const, pos: Position) -> Result<ValueId> {
        let ty = value.ty();
        self.emit_value(Op::Const(value), ty, pos)
    }

    /// A fresh undefined value standing in for an expression that failed to build.
    pub(crate) fn invalid(&mut self, pos: Position) -> Result<ValueId> {
        self.emit_value(
            Op::Undefined {
                name: String::new(),
            },
            Type::undefined(),
            pos,
        )
    }

    pub(crate) fn value_type(&self, value: ValueId) -> Type {
        self.graph.value_type(value)
    }

    // ==================================================================================
    // Control transfer targets
    // ==================================================================================

    pub(crate) fn push_target(
        &mut self,
        break_to: BlockId,
        continue_to: Option<BlockId>,
        fallthrough_to: Option<BlockId>,
    ) {
        let parent = self.current.target.take();
        self.current.target = Some(Box::new(Target {
            break_to,
            continue_to,
            fallthrough_to,
            parent,
        }));
    }

    pub(crate) fn pop_target(&mut self) {
        if let Some(target) = self.current.target.take() {
            self.current.target = target.parent;
        }
    }

    fn break_target(&self) -> Option<BlockId> {
        self.current.target.as_ref().map(|target| target.break_to)
    }

    fn continue_target(&self) -> Option<BlockId> {
        let mut target = self.current.target.as_deref();
        while let Some(current) = target {
            if current.continue_to.is_some() {
                return current.continue_to;
            }
            target = current.parent.as_deref();
        }
        None
    }

    fn fallthrough_target(&self) -> Option<BlockId> {
        self.current
            .target
            .as_ref()
            .and_then(|target| target.fallthrough_to)
    }

    // ==================================================================================
    // Variables
    // ==================================================================================

    pub(crate) fn read_variable(&mut self, name: &str) -> Result<Option<ValueId>> {
        let (func, block) = (self.current.func, self.current.block);
        self.resolver().read_variable(func, name, block)
    }

    pub(crate) fn write_variable(&mut self, name: &str, value: ValueId) -> Result<()> {
        let (func, block) = (self.current.func, self.current.block);
        self.resolver().write_variable(func, name, block, value)?;
        self.graph.function_mut(func)?.declare(name);
        self.graph.set_variable(value, name)
    }

    /// Returns true if the current function assigns `name` itself.
    pub(crate) fn is_local(&self, name: &str) -> bool {
        self.graph
            .function(self.current.func)
            .is_some_and(|f| f.defines(name) && f.free_value(name).is_none())
    }

    /// The free value of `name` if the current function already captured it.
    pub(crate) fn captured(&self, name: &str) -> Option<ValueId> {
        self.graph.function(self.current.func)?.free_value(name)
    }

    /// Reads an identifier, capturing it from an enclosing function if needed.
    pub(crate) fn read_identifier(&mut self, name: &str, pos: Position) -> Result<ValueId> {
        let func = self.current.func;
        let known = self.is_local(name) || self.captured(name).is_some();
        let Some(value) = self.read_variable(name)? else {
            return Err(Error::UndefinedReference {
                name: name.to_string(),
                position: pos,
            });
        };

        if !known {
            self.pending.push(PendingRead {
                func,
                settled_by: func,
                name: name.to_string(),
                position: pos,
                value,
            });
        }
        Ok(value)
    }

    /// Captures `name` from the closest enclosing function that defines it.
    pub(crate) fn capture(&mut self, name: &str) -> Result<Option<ValueId>> {
        let func = self.current.func;
        self.resolver().capture(func, name)
    }

    /// Reports the pending reads settled by `func` that no path ended up defining.
    ///
    /// A read that resolved to a capture of a value still being built in an open
    /// enclosing function is checked again when that function is finished.
    fn check_pending_reads(&mut self, func: FuncId) -> Result<()> {
        let (reads, rest): (Vec<_>, Vec<_>) = mem::take(&mut self.pending)
            .into_iter()
            .partition(|read| read.settled_by == func);
        self.pending = rest;

        for mut read in reads {
            let value = self.captured_origin(read.value);
            let owner = value.func();
            if owner != func && self.parents.iter().any(|frame| frame.func == owner) {
                read.settled_by = owner;
                self.pending.push(read);
                continue;
            }

            if self.never_defined(read.value, &read.name, &mut FxHashSet::default()) {
                self.report_in(
                    read.func,
                    Error::UndefinedReference {
                        name: read.name,
                        position: read.position,
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Returns true if every path to `value` ends in the undefined marker of `name`.
    ///
    /// Capture cells are followed to the value they were taken from, and phis to
    /// their operands. Values already on the walk contribute nothing.
    fn never_defined(&self, value: ValueId, name: &str, seen: &mut FxHashSet<ValueId>) -> bool {
        let value = self.graph.resolve(value);
        if !seen.insert(value) {
            return true;
        }
        if let Some(ValueKind::FreeValue {
            captured: Some(captured),
        }) = self.graph.value(value).map(Value::kind)
        {
            return self.never_defined(captured, name, seen);
        }
        if self.graph.is_phi(value) {
            return self
                .graph
                .phi_operands(value)
                .iter()
                .all(|edge| self.never_defined(edge.value, name, seen));
        }
        self.graph
            .function(value.func())
            .and_then(|f| f.cached_undefined(name))
            == Some(value)
    }

    /// Follows capture cells to the value they were taken from.
    fn captured_origin(&self, value: ValueId) -> ValueId {
        let mut value = self.graph.resolve(value);
        while let Some(ValueKind::FreeValue {
            captured: Some(captured),
        }) = self.graph.value(value).map(Value::kind)
        {
            let captured = self.graph.resolve(captured);
            if captured == value {
                break;
            }
            value = captured;
        }
        value
    }

    // ==================================================================================
    // Functions
    // ==================================================================================

    /// Opens a new function nested in the current one and makes it current.
    pub(crate) fn enter_function(&mut self, name: Option<&str>, pos: Position) -> Result<FuncId> {
        if self.parents.len() + 1 > self.config.max_nesting_depth {
            return Err(Error::RecursionLimit(self.config.max_nesting_depth));
        }

        let parent = self.current.func;
        let name = match name {
            Some(name) => name.to_string(),
            None => {
                let index = self
                    .graph
                    .function(parent)
                    .map_or(0, |f| f.children().len());
                format!("{}${index}", self.function_name(parent))
            }
        };

        let func = self.graph.add_function(name.clone(), Some(parent), pos)?;
        let frame = mem::replace(&mut self.current, Frame::new(func));
        self.parents.push(frame);
        self.seal(BlockId::new(0))?;

        self.events
            .record(EventKind::FunctionCreated)
            .function(name)
            .message(format!("nested in {}", self.function_name(parent)));
        Ok(func)
    }

    /// Finishes the current function and returns to its parent.
    pub(crate) fn leave_function(&mut self) -> Result<Type> {
        let finished = self.finish_function();
        let parent = self
            .parents
            .pop()
            .ok_or_else(|| Error::SsaError("no enclosing function to return to".to_string()))?;
        self.current = parent;
        finished
    }

    /// Seals the remaining blocks of the current function and computes its type.
    fn finish_function(&mut self) -> Result<Type> {
        let func = self.current.func;
        let unsealed: Vec<BlockId> = self
            .graph
            .function(func)
            .map(|f| {
                f.blocks()
                    .iter()
                    .filter(|b| !b.is_sealed())
                    .map(BasicBlock::id)
                    .collect()
            })
            .unwrap_or_default();
        for block in unsealed {
            self.seal(block)?;
        }
        self.check_pending_reads(func)?;

        let exit = self.current.block;
        let ty = self.graph.finish_function(func, exit)?;
        self.events
            .record(EventKind::FunctionFinished)
            .function(self.function_name(func))
            .message(format!("type {ty}"));
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{
            BinaryOp, Expr, ForStmt, FunctionLit, IfStmt, LeftValue, RangeStmt, Stmt, StmtKind,
            SwitchCase, SwitchStmt, TryStmt,
        },
        config::BuildConfig,
        events::EventKind,
        ssa::{BlockId, Const, Function, Graph, Op, Opcode, Value, ValueId, ValueKind},
        test::{build, build_with, closures, counting_loop, diamond, graph, main, untouched_branches},
        Error,
    };

    fn exit_value(function: &Function, name: &str) -> ValueId {
        let exit = function.exit().expect("function is finished");
        function.current_def(name, exit).expect("variable is defined")
    }

    fn constant(graph: &Graph, value: ValueId) -> Option<i64> {
        match graph.defining_instruction(value)?.op() {
            Op::Const(Const::Int(v)) => Some(*v),
            _ => None,
        }
    }

    #[test]
    fn test_straight_line() {
        let package = build(vec![
            Stmt::assign("x", Expr::int(1)),
            Stmt::assign("x", Expr::binary(BinaryOp::Add, Expr::ident("x"), Expr::int(2))),
        ]);
        let main = main(&package);
        assert_eq!(main.blocks().len(), 1);
        assert_eq!(main.phis().count(), 0);
        assert!(package.diagnostics().is_empty());

        let x = exit_value(main, "x");
        assert_eq!(graph(&package).opcode(x), Some(Opcode::BinOp));
    }

    #[test]
    fn test_untouched_branches_need_no_phi() {
        let package = build(untouched_branches());
        let main = main(&package);
        assert_eq!(main.phis().count(), 0);

        let y = exit_value(main, "y");
        assert_eq!(constant(graph(&package), y), Some(1));
    }

    #[test]
    fn test_diamond_merges_in_branch_order() {
        let package = build(diamond());
        let graph = graph(&package);
        let main = graph.main().unwrap();
        assert_eq!(main.phis().count(), 1);

        let y = exit_value(main, "y");
        assert!(graph.is_phi(y));
        let operands: Vec<Option<i64>> = graph
            .phi_operands(y)
            .iter()
            .map(|edge| constant(graph, edge.value))
            .collect();
        assert_eq!(operands, vec![Some(2), Some(3)]);
    }

    #[test]
    fn test_elif_chain_shares_done_block() {
        let package = build(vec![
            Stmt::assign("c", Expr::bool(true)),
            IfStmt::new(Expr::ident("c"), vec![Stmt::assign("x", Expr::int(1))])
                .elif(Expr::ident("c"), vec![Stmt::assign("x", Expr::int(2))])
                .otherwise(vec![Stmt::assign("x", Expr::int(3))])
                .into(),
            Stmt::assign("y", Expr::ident("x")),
        ]);
        let graph = graph(&package);
        let main = graph.main().unwrap();

        let y = exit_value(main, "y");
        assert_eq!(graph.phi_operands(y).len(), 3);
        assert!(package.diagnostics().is_empty());
    }

    #[test]
    fn test_loop_shape() {
        let package = build(counting_loop());
        let graph = graph(&package);
        let main = graph.main().unwrap();

        let names: Vec<&str> = main.blocks().iter().map(|b| b.name()).collect();
        assert_eq!(
            names,
            ["entry0", "loop.header1", "loop.body2", "loop.exit3", "loop.latch4"]
        );

        let header = &main.blocks()[1];
        let preds: Vec<usize> = header.preds().iter().map(|b| b.index()).collect();
        assert_eq!(preds, vec![0, 4]);
        assert!(main.blocks().iter().all(|b| b.is_sealed()));

        let info = main
            .instructions()
            .iter()
            .find_map(|instr| match instr.op() {
                Op::Loop(info) => Some(*info),
                _ => None,
            })
            .unwrap();
        let key = info.key.unwrap();
        assert!(graph.is_phi(key));
        assert_eq!(constant(graph, info.init.unwrap()), Some(0));
        assert_eq!(graph.opcode(info.step.unwrap()), Some(Opcode::BinOp));
        assert_eq!(package.events().count_kind(EventKind::LoopFinalized), 1);
    }

    #[test]
    fn test_break_and_continue_targets() {
        let body = vec![
            IfStmt::new(
                Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::int(5)),
                vec![Stmt::brk()],
            )
            .into(),
            IfStmt::new(
                Expr::binary(BinaryOp::Eq, Expr::ident("i"), Expr::int(2)),
                vec![Stmt::cont()],
            )
            .into(),
        ];
        let package = build(vec![ForStmt::new(body)
            .init(Stmt::assign("i", Expr::int(0)))
            .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(10)))
            .step(Stmt::inc("i"))
            .into()]);
        let main = main(&package);
        assert!(package.diagnostics().is_empty());

        let exit = main.blocks().iter().find(|b| b.name() == "loop.exit3").unwrap();
        assert_eq!(exit.preds().len(), 2);
        let latch = main.blocks().iter().find(|b| b.name() == "loop.latch4").unwrap();
        assert_eq!(latch.preds().len(), 2);
    }

    #[test]
    fn test_misplaced_control_transfer() {
        let package = build(vec![
            Stmt::brk().at(1, 1),
            Stmt::cont().at(2, 1),
            Stmt::new(StmtKind::Fallthrough).at(3, 1),
            Stmt::assign("x", Expr::int(1)),
        ]);
        let keywords: Vec<&str> = package
            .diagnostics()
            .iter()
            .filter_map(|err| match err {
                Error::MisplacedControlTransfer { keyword, .. } => Some(*keyword),
                _ => None,
            })
            .collect();
        assert_eq!(keywords, ["break", "continue", "fallthrough"]);
        assert!(main(&package).defines("x"));
        assert_eq!(package.events().errors().count(), 3);
    }

    #[test]
    fn test_unsupported_statements() {
        let package = build(vec![
            Stmt::new(StmtKind::Defer(Expr::call(Expr::ident("f"), vec![]))),
            Stmt::new(StmtKind::Go(Expr::call(Expr::ident("f"), vec![]))),
            Stmt::new(StmtKind::Include("lib.yak".to_string())),
        ]);
        let constructs: Vec<&str> = package
            .diagnostics()
            .iter()
            .filter_map(|err| match err {
                Error::UnsupportedConstruct { construct, .. } => Some(*construct),
                _ => None,
            })
            .collect();
        assert_eq!(constructs, ["defer", "go", "include"]);
    }

    #[test]
    fn test_strict_policy_stops_at_first_diagnostic() {
        let package = build_with(
            BuildConfig::strict(),
            vec![
                Stmt::expr(Expr::ident("missing")),
                Stmt::brk(),
                Stmt::assign("x", Expr::int(1)),
            ],
        );
        assert!(matches!(
            package.build(),
            Err(Error::BuildFailed { ref source, .. })
                if matches!(**source, Error::UndefinedReference { .. })
        ));
        assert_eq!(package.diagnostics().len(), 1);
        assert!(!main(&package).defines("x"));
    }

    #[test]
    fn test_failed_condition_keeps_structure() {
        let package = build(vec![
            Stmt::assign("x", Expr::int(1)),
            IfStmt::new(Expr::ident("nope"), vec![Stmt::assign("x", Expr::int(2))]).into(),
            Stmt::assign("y", Expr::ident("x")),
        ]);
        let graph = graph(&package);
        let main = graph.main().unwrap();

        assert_eq!(package.diagnostics().len(), 1);
        assert!(main
            .instructions()
            .iter()
            .any(|instr| instr.opcode() == Opcode::If));
        assert!(graph.is_phi(exit_value(main, "y")));
    }

    #[test]
    fn test_closures_share_capture_cell() {
        let package = build(closures());
        let graph = graph(&package);

        let f = graph.function_by_name("main$0").unwrap();
        let g = graph.function_by_name("main$1").unwrap();
        let cell = f.free_value("x").unwrap();
        assert_eq!(g.free_value("x"), Some(cell));

        let captured = graph.operands(cell);
        assert_eq!(captured.len(), 1);
        assert_eq!(constant(graph, captured[0]), Some(1));

        assert!(g
            .instructions()
            .iter()
            .any(|instr| matches!(instr.op(), Op::Update { address, .. } if *address == cell)));

        let ty = f.ty().and_then(|ty| ty.as_function()).unwrap();
        assert!(ty.free_values().contains("x"));
        assert_eq!(graph.main().unwrap().children().len(), 2);
    }

    #[test]
    fn test_nested_capture_through_parent() {
        let inner = FunctionLit::new(&[], vec![Stmt::ret(vec![Expr::ident("x")])]);
        let outer = FunctionLit::new(&[], vec![Stmt::expr(Expr::function(inner))]);
        let package = build(vec![
            Stmt::assign("x", Expr::int(1)),
            Stmt::expr(Expr::function(outer)),
        ]);
        let graph = graph(&package);
        assert!(package.diagnostics().is_empty());

        let outer = graph.function_by_name("main$0").unwrap();
        let inner = graph.function_by_name("main$0$0").unwrap();
        let cell = outer.free_value("x").unwrap();
        assert_eq!(inner.free_value("x"), Some(cell));
        assert_eq!(cell.func(), outer.id());

        let captured = graph.operands(cell);
        assert_eq!(captured.len(), 1);
        assert_eq!(constant(graph, captured[0]), Some(1));
    }

    #[test]
    fn test_nesting_depth_limit() {
        let config = BuildConfig {
            max_nesting_depth: 1,
            ..BuildConfig::default()
        };
        let inner = FunctionLit::new(&[], vec![]);
        let outer = FunctionLit::new(&[], vec![Stmt::expr(Expr::function(inner))]);
        let package = build_with(config, vec![Stmt::expr(Expr::function(outer))]);

        assert_eq!(package.diagnostics(), vec![&Error::RecursionLimit(1)]);
    }

    #[test]
    fn test_named_function_captures_outer_binding() {
        // fib = 0; f = func fib() { return fib }
        let lit = FunctionLit::new(&[], vec![Stmt::ret(vec![Expr::ident("fib")])]).named("fib");
        let package = build(vec![
            Stmt::assign("fib", Expr::int(0)),
            Stmt::assign("f", Expr::function(lit)),
        ]);
        let graph = graph(&package);
        assert!(package.diagnostics().is_empty());

        let fib = graph.function_by_name("fib").unwrap();
        let names: Vec<&str> = fib.captures().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["fib"]);
        let cell = fib.free_value("fib").unwrap();
        assert_eq!(constant(graph, graph.operands(cell)[0]), Some(0));

        let returned = fib.instructions().iter().find_map(|instr| match instr.op() {
            Op::Return { results } => results.first().copied(),
            _ => None,
        });
        assert_eq!(returned, Some(cell));

        let bound = exit_value(graph.main().unwrap(), "fib");
        assert_eq!(
            graph.value(bound).map(Value::kind),
            Some(ValueKind::Function(fib.id()))
        );
    }

    #[test]
    fn test_named_function_without_outer_binding() {
        // func fib(n) { return fib(n) }
        let body = vec![Stmt::ret(vec![Expr::call(
            Expr::ident("fib"),
            vec![Expr::ident("n")],
        )])];
        let package = build(vec![Stmt::expr(Expr::function(
            FunctionLit::new(&["n"], body).named("fib"),
        ))]);
        let graph = graph(&package);

        assert!(matches!(
            package.diagnostics()[..],
            [Error::UndefinedReference { name, .. }] if name == "fib"
        ));
        assert!(graph.function_by_name("fib").unwrap().captures().is_empty());
        assert!(graph.main().unwrap().defines("fib"));
    }

    #[test]
    fn test_closure_reads_parent_on_paths_without_local() {
        // c = true; x = 1; f = func() { if c { x := 2 }; return x }
        let lit = FunctionLit::new(
            &[],
            vec![
                IfStmt::new(Expr::ident("c"), vec![Stmt::define("x", Expr::int(2))]).into(),
                Stmt::ret(vec![Expr::ident("x")]),
            ],
        );
        let package = build(vec![
            Stmt::assign("c", Expr::bool(true)),
            Stmt::assign("x", Expr::int(1)),
            Stmt::assign("f", Expr::function(lit)),
        ]);
        let graph = graph(&package);
        assert!(package.diagnostics().is_empty());

        let f = graph.function_by_name("main$0").unwrap();
        assert!(f.free_value("c").is_some());
        let cell = f.free_value("x").unwrap();
        assert_eq!(constant(graph, graph.operands(cell)[0]), Some(1));

        let phi = f.phis().find_map(|instr| instr.result()).unwrap();
        let operands: Vec<ValueId> = graph
            .phi_operands(phi)
            .iter()
            .map(|edge| graph.resolve(edge.value))
            .collect();
        assert_eq!(operands.len(), 2);
        assert_eq!(operands[0], cell);
        assert_eq!(constant(graph, operands[1]), Some(2));
        assert!(operands
            .iter()
            .all(|value| graph.opcode(*value) != Some(Opcode::Undefined)));
    }

    #[test]
    fn test_value_carried_around_loop() {
        // for i = 0; i < 3; i++ { if i > 0 { y = t }; t = i }
        let body = vec![
            IfStmt::new(
                Expr::binary(BinaryOp::Gt, Expr::ident("i"), Expr::int(0)),
                vec![Stmt::assign("y", Expr::ident("t"))],
            )
            .into(),
            Stmt::assign("t", Expr::ident("i")),
        ];
        let package = build(vec![ForStmt::new(body)
            .init(Stmt::assign("i", Expr::int(0)))
            .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(3)))
            .step(Stmt::inc("i"))
            .into()]);
        let graph = graph(&package);
        let main = graph.main().unwrap();
        assert!(package.diagnostics().is_empty());

        let phi = main
            .phis()
            .find(|instr| {
                instr
                    .result()
                    .and_then(|value| graph.value(value))
                    .and_then(Value::variable)
                    == Some("t")
            })
            .unwrap();
        assert_eq!(phi.block(), Some(BlockId::new(1)));
        let t = phi.result().unwrap();
        let opcodes: Vec<Option<Opcode>> = graph
            .phi_operands(t)
            .iter()
            .map(|edge| graph.opcode(edge.value))
            .collect();
        assert_eq!(opcodes, vec![Some(Opcode::Undefined), Some(Opcode::Phi)]);
    }

    #[test]
    fn test_loop_read_never_defined_is_reported() {
        // for { y = q }
        let package = build(vec![ForStmt::new(vec![Stmt::assign(
            "y",
            Expr::ident("q").at(1, 11),
        )])
        .into()]);
        let diagnostics = package.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics[0],
            Error::UndefinedReference { name, position } if name == "q" && position.line == 1
        ));
        assert!(main(&package).blocks().iter().all(|b| b.is_sealed()));
    }

    #[test]
    fn test_closure_in_loop_reads_undefined_outer() {
        // for { f = func() { return q } }
        let lit = FunctionLit::new(&[], vec![Stmt::ret(vec![Expr::ident("q")])]);
        let package = build(vec![ForStmt::new(vec![Stmt::assign("f", Expr::function(lit))]).into()]);
        let graph = graph(&package);

        assert!(matches!(
            package.diagnostics()[..],
            [Error::UndefinedReference { name, .. }] if name == "q"
        ));
        let closure = graph.function_by_name("main$0").unwrap();
        assert_eq!(closure.diagnostics().len(), 1);
    }

    #[test]
    fn test_header_sealed_after_latch() {
        let package = build_with(BuildConfig::traced(), counting_loop());
        let sealed: Vec<usize> = package
            .events()
            .filter_kind(EventKind::BlockSealed)
            .filter_map(|event| event.block)
            .collect();
        assert_eq!(sealed.len(), 5);

        let header = sealed.iter().position(|block| *block == 1).unwrap();
        let latch = sealed.iter().position(|block| *block == 4).unwrap();
        assert!(latch < header, "header sealed before its back edge: {sealed:?}");
    }

    #[test]
    fn test_unreachable_code_does_not_reach_merge() {
        // c = true; if c { x = 1; return; x = 3 } else { x = 2 }; y = x
        let package = build(vec![
            Stmt::assign("c", Expr::bool(true)),
            IfStmt::new(
                Expr::ident("c"),
                vec![
                    Stmt::assign("x", Expr::int(1)),
                    Stmt::ret(vec![]),
                    Stmt::assign("x", Expr::int(3)),
                ],
            )
            .otherwise(vec![Stmt::assign("x", Expr::int(2))])
            .into(),
            Stmt::assign("y", Expr::ident("x")),
        ]);
        let graph = graph(&package);
        let main = graph.main().unwrap();
        assert!(package.diagnostics().is_empty());

        let dead = main.blocks().iter().find(|b| b.name().starts_with("unreachable")).unwrap();
        assert!(dead.succs().is_empty());
        let done = main.blocks().iter().find(|b| b.name().starts_with("if.done")).unwrap();
        assert_eq!(done.preds().len(), 1);

        assert_eq!(main.phis().count(), 0);
        assert_eq!(constant(graph, exit_value(main, "y")), Some(2));
    }

    #[test]
    fn test_destructuring_call() {
        let pair = FunctionLit::new(&[], vec![Stmt::ret(vec![Expr::int(1), Expr::string("s")])]);
        let package = build(vec![
            Stmt::assign("f", Expr::function(pair)),
            Stmt::assign_to(
                vec![LeftValue::ident("a"), LeftValue::ident("b")],
                vec![Expr::call(Expr::ident("f"), vec![])],
            ),
        ]);
        let graph = graph(&package);
        let main = graph.main().unwrap();

        assert!(package.diagnostics().is_empty());
        let a = exit_value(main, "a");
        let b = exit_value(main, "b");
        assert_eq!(graph.opcode(a), Some(Opcode::Field));
        assert_eq!(graph.value(a).unwrap().ty().to_string(), "number");
        assert_eq!(graph.value(b).unwrap().ty().to_string(), "string");
    }

    #[test]
    fn test_assignment_count_mismatch() {
        let package = build(vec![Stmt::assign_to(
            vec![LeftValue::ident("a"), LeftValue::ident("b")],
            vec![Expr::int(1), Expr::int(2), Expr::int(3)],
        )]);
        assert!(matches!(
            package.diagnostics()[..],
            [Error::MalformedConstruct { .. }]
        ));
    }

    #[test]
    fn test_member_assignment_updates_field() {
        let package = build(vec![
            Stmt::assign("o", Expr::map(vec![(Expr::string("a"), Expr::int(1))])),
            Stmt::assign_to(vec![LeftValue::member(Expr::ident("o"), "b")], vec![Expr::int(2)]),
        ]);
        let main = main(&package);
        let updates = main
            .instructions()
            .iter()
            .filter(|instr| instr.opcode() == Opcode::Update)
            .count();
        assert_eq!(updates, 2);
    }

    #[test]
    fn test_switch_with_fallthrough() {
        let switch = SwitchStmt {
            cond: Some(Expr::ident("x")),
            cases: vec![
                SwitchCase {
                    values: vec![Expr::int(1)],
                    body: vec![
                        Stmt::assign("y", Expr::int(1)),
                        Stmt::new(StmtKind::Fallthrough),
                    ],
                },
                SwitchCase {
                    values: vec![Expr::int(2), Expr::int(3)],
                    body: vec![Stmt::assign("y", Expr::int(2))],
                },
            ],
            default: Some(vec![Stmt::assign("y", Expr::int(3))]),
        };
        let package = build(vec![
            Stmt::assign("x", Expr::int(2)),
            switch.into(),
            Stmt::assign("z", Expr::ident("y")),
        ]);
        let graph = graph(&package);
        let main = graph.main().unwrap();
        assert!(package.diagnostics().is_empty());

        let labels = main
            .instructions()
            .iter()
            .find_map(|instr| match instr.op() {
                Op::Switch { labels, .. } => Some(labels.len()),
                _ => None,
            });
        assert_eq!(labels, Some(3));

        let second = main.blocks().iter().find(|b| b.name() == "switch.handler2").unwrap();
        assert_eq!(second.preds().len(), 2);

        let z = exit_value(main, "z");
        let operands: Vec<Option<i64>> = graph
            .phi_operands(z)
            .iter()
            .map(|edge| constant(graph, edge.value))
            .collect();
        assert_eq!(operands, vec![Some(2), Some(3)]);
    }

    #[test]
    fn test_range_loop_binds_key_and_value() {
        let range = RangeStmt {
            key: Some("k".to_string()),
            value: Some("v".to_string()),
            iterable: Expr::slice(vec![Expr::int(1), Expr::int(2)]),
            is_in: false,
            body: vec![Stmt::assign("last", Expr::ident("v"))],
        };
        let package = build(vec![range.into()]);
        let graph = graph(&package);
        let main = graph.main().unwrap();
        assert!(package.diagnostics().is_empty());

        let next = main
            .instructions()
            .iter()
            .find(|instr| instr.opcode() == Opcode::Next)
            .and_then(|instr| instr.result())
            .unwrap();
        assert_eq!(graph.user_values(next).len(), 3);
        assert_eq!(
            main.block(crate::ssa::BlockId::new(1)).map(|b| b.name()),
            Some("loop.header1")
        );
    }

    #[test]
    fn test_try_catch_binds_error() {
        let stmt = TryStmt {
            body: vec![Stmt::assign("x", Expr::int(1))],
            catch_name: Some("e".to_string()),
            catch_body: vec![Stmt::assign("x", Expr::ident("e"))],
            finally: None,
        };
        let package = build(vec![stmt.into(), Stmt::assign("y", Expr::ident("x"))]);
        let graph = graph(&package);
        let main = graph.main().unwrap();
        assert!(package.diagnostics().is_empty());

        let y = exit_value(main, "y");
        let opcodes: Vec<Option<Opcode>> = graph
            .phi_operands(y)
            .iter()
            .map(|edge| graph.opcode(edge.value))
            .collect();
        assert_eq!(opcodes, vec![Some(Opcode::Const), Some(Opcode::Recover)]);
    }

    #[test]
    fn test_mismatched_operands_warn() {
        let package = build(vec![Stmt::assign(
            "x",
            Expr::binary(BinaryOp::Add, Expr::int(1), Expr::string("a")),
        )]);
        assert_eq!(package.events().count_kind(EventKind::Warning), 1);
        assert!(package.diagnostics().is_empty());
    }

    #[test]
    fn test_trace_records_resolver_events() {
        let package = build_with(BuildConfig::traced(), diamond());
        let events = package.events();
        assert!(events.has(EventKind::BlockCreated));
        assert!(events.has(EventKind::BlockSealed));
        assert!(events.has(EventKind::PhiCreated));

        let quiet = build(diamond());
        assert!(!quiet.events().has(EventKind::BlockSealed));
        assert!(quiet.events().has(EventKind::FunctionFinished));
    }
}
