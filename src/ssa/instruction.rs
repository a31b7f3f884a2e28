//! SSA instructions.
//!
//! An [`Instruction`] is one node of a basic block. What it does is described by its
//! [`Op`]; instructions that produce something own a result [`Value`](crate::ssa::Value).
//!
//! # Operand Bookkeeping
//!
//! Every value referenced by an op is an operand. [`Op::operands`] lists them in a
//! fixed order and [`Op::for_each_operand_mut`] visits the same slots mutably, which
//! is how uses are rewritten when a phi is replaced. The graph keeps the inverse
//! relation (the users of each value) in sync with these two functions.
//!
//! # Terminators
//!
//! [`Op::Jump`], [`Op::If`], [`Op::Loop`], [`Op::Switch`], [`Op::Return`],
//! [`Op::Panic`] and [`Op::ErrorHandler`] end a block. Their [`Op::successors`] are
//! wired as control-flow edges when the instruction is emitted.

use std::fmt;

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

use crate::{
    ast::{BinaryOp, Position, UnaryOp},
    ssa::{BlockId, Const, InstrId, ValueId},
};

/// One incoming value of a phi, tagged with the predecessor it arrives from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhiOperand {
    /// The incoming value
    pub value: ValueId,
    /// The predecessor block on whose edge the value arrives
    pub predecessor: BlockId,
}

/// One `case` value of a switch and the block it selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchLabel {
    /// The compared value
    pub value: ValueId,
    /// The handler block
    pub dest: BlockId,
}

/// Operands of a composite construction.
///
/// With a `source` the instruction is a slice of that value, otherwise it allocates
/// a new composite of its result type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MakeArgs {
    /// Sliced value
    pub source: Option<ValueId>,
    /// Slice start
    pub low: Option<ValueId>,
    /// Slice end
    pub high: Option<ValueId>,
    /// Slice step
    pub step: Option<ValueId>,
    /// Length or size hint
    pub len: Option<ValueId>,
    /// Capacity
    pub cap: Option<ValueId>,
}

impl MakeArgs {
    /// `make(T, len, cap)`
    #[must_use]
    pub fn sized(len: Option<ValueId>, cap: Option<ValueId>) -> Self {
        Self {
            len,
            cap,
            ..Self::default()
        }
    }

    /// `source[low:high:step]`
    #[must_use]
    pub fn slice(
        source: ValueId,
        low: Option<ValueId>,
        high: Option<ValueId>,
        step: Option<ValueId>,
    ) -> Self {
        Self {
            source: Some(source),
            low,
            high,
            step,
            ..Self::default()
        }
    }

    fn slots(&self) -> [Option<ValueId>; 6] {
        [
            self.source,
            self.low,
            self.high,
            self.step,
            self.len,
            self.cap,
        ]
    }

    fn slots_mut(&mut self) -> [&mut Option<ValueId>; 6] {
        [
            &mut self.source,
            &mut self.low,
            &mut self.high,
            &mut self.step,
            &mut self.len,
            &mut self.cap,
        ]
    }
}

/// The loop terminator of a loop header.
///
/// `key`, `init` and `step` are filled in once the loop is complete: the key is the
/// header phi compared by the condition, init and step are the key's operands
/// produced by the initialization and step clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopInfo {
    /// Loop condition, evaluated in the header
    pub cond: ValueId,
    /// Entered while the condition holds
    pub body: BlockId,
    /// Entered when the condition fails
    pub exit: BlockId,
    /// The induction phi
    pub key: Option<ValueId>,
    /// Initial value of the key
    pub init: Option<ValueId>,
    /// Value of the key after the step clause
    pub step: Option<ValueId>,
}

impl LoopInfo {
    /// Creates a loop terminator with no induction information.
    #[must_use]
    pub fn new(cond: ValueId, body: BlockId, exit: BlockId) -> Self {
        Self {
            cond,
            body,
            exit,
            key: None,
            init: None,
            step: None,
        }
    }
}

/// The operation of an instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Merges one value per predecessor
    Phi {
        /// Incoming values, in predecessor order
        edges: Vec<PhiOperand>,
    },
    /// A constant
    Const(Const),
    /// The value of `name` on a path with no definition
    Undefined {
        /// The variable
        name: String,
    },
    /// `x op y`
    BinOp {
        /// Operator
        op: BinaryOp,
        /// Left operand
        x: ValueId,
        /// Right operand
        y: ValueId,
    },
    /// `op x`
    UnOp {
        /// Operator
        op: UnaryOp,
        /// Operand
        x: ValueId,
    },
    /// `callee(args)`
    Call {
        /// Called value
        callee: ValueId,
        /// Arguments
        args: Vec<ValueId>,
        /// Last argument is spread
        ellipsis: bool,
        /// The trailing error result is discarded
        drop_error: bool,
    },
    /// Leaves the function
    Return {
        /// Returned values
        results: Vec<ValueId>,
    },
    /// Builds a composite or slices one
    Make(MakeArgs),
    /// `object[key]`, also the address operand of [`Op::Update`]
    Field {
        /// Accessed value
        object: ValueId,
        /// The key
        key: ValueId,
    },
    /// Stores `value` into the location named by `address`
    Update {
        /// A field or capture cell
        address: ValueId,
        /// Stored value
        value: ValueId,
    },
    /// Advances an iterator, producing `{ok, key, field}`
    Next {
        /// Iterated value
        iter: ValueId,
        /// `for x in v` iteration
        in_next: bool,
    },
    /// `assert cond, message`
    Assert {
        /// Asserted condition
        cond: ValueId,
        /// Optional message
        message: Option<ValueId>,
    },
    /// Converts `value` to the result type
    TypeCast {
        /// Converted value
        value: ValueId,
    },
    /// A type used as value, the type is the result type
    TypeValue,
    /// Enters a try/catch region
    ErrorHandler {
        /// Protected block
        try_block: BlockId,
        /// Handler block
        catch_block: BlockId,
        /// Block that always runs
        final_block: Option<BlockId>,
        /// Continuation
        done: BlockId,
    },
    /// Raises `value`
    Panic {
        /// Raised value
        value: ValueId,
    },
    /// Recovers the active panic value
    Recover,
    /// Unconditional branch
    Jump {
        /// Target block
        to: BlockId,
    },
    /// Two way branch
    If {
        /// Branch condition
        cond: ValueId,
        /// Taken when `cond` holds
        then_block: BlockId,
        /// Taken otherwise
        else_block: BlockId,
    },
    /// Loop header branch
    Loop(LoopInfo),
    /// Multi way branch
    Switch {
        /// Compared value
        cond: ValueId,
        /// Taken when no label matches
        default: BlockId,
        /// Case values and handlers
        labels: Vec<SwitchLabel>,
    },
}

/// The tag of an [`Op`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Opcode {
    /// [`Op::Phi`]
    Phi,
    /// [`Op::Const`]
    Const,
    /// [`Op::Undefined`]
    Undefined,
    /// [`Op::BinOp`]
    BinOp,
    /// [`Op::UnOp`]
    UnOp,
    /// [`Op::Call`]
    Call,
    /// [`Op::Return`]
    Return,
    /// [`Op::Make`]
    Make,
    /// [`Op::Field`]
    Field,
    /// [`Op::Update`]
    Update,
    /// [`Op::Next`]
    Next,
    /// [`Op::Assert`]
    Assert,
    /// [`Op::TypeCast`]
    TypeCast,
    /// [`Op::TypeValue`]
    TypeValue,
    /// [`Op::ErrorHandler`]
    ErrorHandler,
    /// [`Op::Panic`]
    Panic,
    /// [`Op::Recover`]
    Recover,
    /// [`Op::Jump`]
    Jump,
    /// [`Op::If`]
    If,
    /// [`Op::Loop`]
    Loop,
    /// [`Op::Switch`]
    Switch,
}

impl Op {
    /// The tag of this op.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        match self {
            Op::Phi { .. } => Opcode::Phi,
            Op::Const(_) => Opcode::Const,
            Op::Undefined { .. } => Opcode::Undefined,
            Op::BinOp { .. } => Opcode::BinOp,
            Op::UnOp { .. } => Opcode::UnOp,
            Op::Call { .. } => Opcode::Call,
            Op::Return { .. } => Opcode::Return,
            Op::Make(_) => Opcode::Make,
            Op::Field { .. } => Opcode::Field,
            Op::Update { .. } => Opcode::Update,
            Op::Next { .. } => Opcode::Next,
            Op::Assert { .. } => Opcode::Assert,
            Op::TypeCast { .. } => Opcode::TypeCast,
            Op::TypeValue => Opcode::TypeValue,
            Op::ErrorHandler { .. } => Opcode::ErrorHandler,
            Op::Panic { .. } => Opcode::Panic,
            Op::Recover => Opcode::Recover,
            Op::Jump { .. } => Opcode::Jump,
            Op::If { .. } => Opcode::If,
            Op::Loop(_) => Opcode::Loop,
            Op::Switch { .. } => Opcode::Switch,
        }
    }

    /// Returns true if the instruction defines a result value.
    #[must_use]
    pub fn produces_value(&self) -> bool {
        matches!(
            self,
            Op::Phi { .. }
                | Op::Const(_)
                | Op::Undefined { .. }
                | Op::BinOp { .. }
                | Op::UnOp { .. }
                | Op::Call { .. }
                | Op::Make(_)
                | Op::Field { .. }
                | Op::Next { .. }
                | Op::TypeCast { .. }
                | Op::TypeValue
                | Op::Recover
        )
    }

    /// Returns true if the instruction ends its block.
    #[must_use]
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Jump { .. }
                | Op::If { .. }
                | Op::Loop(_)
                | Op::Switch { .. }
                | Op::Return { .. }
                | Op::Panic { .. }
                | Op::ErrorHandler { .. }
        )
    }

    /// The value operands, in slot order.
    #[must_use]
    pub fn operands(&self) -> Vec<ValueId> {
        match self {
            Op::Phi { edges } => edges.iter().map(|edge| edge.value).collect(),
            Op::Const(_)
            | Op::Undefined { .. }
            | Op::TypeValue
            | Op::Recover
            | Op::ErrorHandler { .. }
            | Op::Jump { .. } => Vec::new(),
            Op::BinOp { x, y, .. } => vec![*x, *y],
            Op::UnOp { x, .. } => vec![*x],
            Op::Call { callee, args, .. } => {
                let mut operands = Vec::with_capacity(args.len() + 1);
                operands.push(*callee);
                operands.extend(args.iter().copied());
                operands
            }
            Op::Return { results } => results.clone(),
            Op::Make(args) => args.slots().into_iter().flatten().collect(),
            Op::Field { object, key } => vec![*object, *key],
            Op::Update { address, value } => vec![*address, *value],
            Op::Next { iter, .. } => vec![*iter],
            Op::Assert { cond, message } => std::iter::once(*cond).chain(*message).collect(),
            Op::TypeCast { value } => vec![*value],
            Op::Panic { value } => vec![*value],
            Op::If { cond, .. } => vec![*cond],
            Op::Loop(info) => std::iter::once(info.cond)
                .chain(info.key)
                .chain(info.init)
                .chain(info.step)
                .collect(),
            Op::Switch { cond, labels, .. } => std::iter::once(*cond)
                .chain(labels.iter().map(|label| label.value))
                .collect(),
        }
    }

    /// Calls `f` on every operand slot, in the order of [`Op::operands`].
    pub fn for_each_operand_mut(&mut self, mut f: impl FnMut(&mut ValueId)) {
        match self {
            Op::Phi { edges } => edges.iter_mut().for_each(|edge| f(&mut edge.value)),
            Op::Const(_)
            | Op::Undefined { .. }
            | Op::TypeValue
            | Op::Recover
            | Op::ErrorHandler { .. }
            | Op::Jump { .. } => {}
            Op::BinOp { x, y, .. } => {
                f(x);
                f(y);
            }
            Op::UnOp { x, .. } => f(x),
            Op::Call { callee, args, .. } => {
                f(callee);
                args.iter_mut().for_each(f);
            }
            Op::Return { results } => results.iter_mut().for_each(f),
            Op::Make(args) => args.slots_mut().into_iter().flatten().for_each(f),
            Op::Field { object, key } => {
                f(object);
                f(key);
            }
            Op::Update { address, value } => {
                f(address);
                f(value);
            }
            Op::Next { iter, .. } => f(iter),
            Op::Assert { cond, message } => {
                f(cond);
                if let Some(message) = message {
                    f(message);
                }
            }
            Op::TypeCast { value } | Op::Panic { value } => f(value),
            Op::If { cond, .. } => f(cond),
            Op::Loop(info) => {
                f(&mut info.cond);
                for slot in [&mut info.key, &mut info.init, &mut info.step] {
                    if let Some(value) = slot {
                        f(value);
                    }
                }
            }
            Op::Switch { cond, labels, .. } => {
                f(cond);
                labels.iter_mut().for_each(|label| f(&mut label.value));
            }
        }
    }

    /// Control-flow successors of a terminator, without duplicates.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        let targets = match self {
            Op::Jump { to } => vec![*to],
            Op::If {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Op::Loop(info) => vec![info.body, info.exit],
            Op::Switch {
                default, labels, ..
            } => labels
                .iter()
                .map(|label| label.dest)
                .chain(std::iter::once(*default))
                .collect(),
            Op::ErrorHandler {
                try_block,
                catch_block,
                ..
            } => vec![*try_block, *catch_block],
            _ => Vec::new(),
        };

        let mut unique = Vec::with_capacity(targets.len());
        for target in targets {
            if !unique.contains(&target) {
                unique.push(target);
            }
        }
        unique
    }
}

/// An instruction in a basic block.
#[derive(Debug, Clone)]
pub struct Instruction {
    id: InstrId,
    op: Op,
    block: Option<BlockId>,
    result: Option<ValueId>,
    position: Position,
}

impl Instruction {
    pub(crate) fn new(id: InstrId, op: Op, block: BlockId, position: Position) -> Self {
        Self {
            id,
            op,
            block: Some(block),
            result: None,
            position,
        }
    }

    /// The id of this instruction.
    #[must_use]
    pub fn id(&self) -> InstrId {
        self.id
    }

    /// The operation.
    #[must_use]
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Shorthand for `op().opcode()`.
    #[must_use]
    pub fn opcode(&self) -> Opcode {
        self.op.opcode()
    }

    /// The block holding the instruction, `None` once it was removed.
    #[must_use]
    pub fn block(&self) -> Option<BlockId> {
        self.block
    }

    /// The value defined by the instruction.
    #[must_use]
    pub fn result(&self) -> Option<ValueId> {
        self.result
    }

    /// Source position of the node the instruction was built from.
    #[must_use]
    pub fn position(&self) -> Position {
        self.position
    }

    /// Returns true for phis that are still part of a block.
    #[must_use]
    pub fn is_live_phi(&self) -> bool {
        self.block.is_some() && matches!(self.op, Op::Phi { .. })
    }

    pub(crate) fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    pub(crate) fn set_result(&mut self, value: ValueId) {
        self.result = Some(value);
    }

    pub(crate) fn detach(&mut self) {
        self.block = None;
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            write!(f, "{result} = ")?;
        }
        write!(f, "{}", self.op)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Phi { edges } => {
                let edges: Vec<String> = edges
                    .iter()
                    .map(|edge| format!("{} from {}", edge.value, edge.predecessor))
                    .collect();
                write!(f, "phi({})", edges.join(", "))
            }
            Op::Const(value) => write!(f, "const {value}"),
            Op::Undefined { name } => write!(f, "undefined {name}"),
            Op::BinOp { op, x, y } => write!(f, "{x} {op} {y}"),
            Op::UnOp { op, x } => write!(f, "{op}{x}"),
            Op::Call {
                callee,
                args,
                ellipsis,
                drop_error,
            } => {
                write!(f, "call {callee}({}", join(args))?;
                if *ellipsis {
                    f.write_str("...")?;
                }
                f.write_str(")")?;
                if *drop_error {
                    f.write_str("~")?;
                }
                Ok(())
            }
            Op::Return { results } => write!(f, "return {}", join(results)),
            Op::Make(args) => match args.source {
                Some(source) => write!(
                    f,
                    "make {source}[{}:{}:{}]",
                    slot(args.low),
                    slot(args.high),
                    slot(args.step)
                ),
                None => {
                    let sizes: Vec<String> = [("len", args.len), ("cap", args.cap)]
                        .into_iter()
                        .filter_map(|(label, value)| value.map(|v| format!("{label} {v}")))
                        .collect();
                    write!(f, "make({})", sizes.join(", "))
                }
            },
            Op::Field { object, key } => write!(f, "field {object}[{key}]"),
            Op::Update { address, value } => write!(f, "update {address} = {value}"),
            Op::Next { iter, in_next } => {
                write!(f, "next {iter}")?;
                if *in_next {
                    f.write_str(" in")?;
                }
                Ok(())
            }
            Op::Assert { cond, message } => match message {
                Some(message) => write!(f, "assert {cond}, {message}"),
                None => write!(f, "assert {cond}"),
            },
            Op::TypeCast { value } => write!(f, "cast {value}"),
            Op::TypeValue => f.write_str("typevalue"),
            Op::ErrorHandler {
                try_block,
                catch_block,
                final_block,
                done,
            } => {
                write!(f, "try {try_block} catch {catch_block}")?;
                if let Some(final_block) = final_block {
                    write!(f, " finally {final_block}")?;
                }
                write!(f, " done {done}")
            }
            Op::Panic { value } => write!(f, "panic {value}"),
            Op::Recover => f.write_str("recover"),
            Op::Jump { to } => write!(f, "jump {to}"),
            Op::If {
                cond,
                then_block,
                else_block,
            } => write!(f, "if {cond} then {then_block} else {else_block}"),
            Op::Loop(info) => {
                write!(f, "loop {} body {} exit {}", info.cond, info.body, info.exit)?;
                if let Some(key) = info.key {
                    write!(f, " key {key}")?;
                }
                Ok(())
            }
            Op::Switch {
                cond,
                default,
                labels,
            } => {
                let labels: Vec<String> = labels
                    .iter()
                    .map(|label| format!("{}: {}", label.value, label.dest))
                    .collect();
                write!(f, "switch {cond} default {default} [{}]", labels.join(", "))
            }
        }
    }
}

fn join(values: &[ValueId]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn slot(value: Option<ValueId>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}
