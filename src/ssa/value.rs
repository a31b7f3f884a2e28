//! Identifiers and values of the SSA graph.
//!
//! Functions, blocks, instructions and values live in arenas and are addressed by
//! index. Blocks are always local to their function, so a [`BlockId`] is a plain
//! index. Values and instructions are addressed together with the function that
//! owns them: a closure can use a capture cell owned by its parent (or by a
//! sibling closure), so def-use edges may cross function boundaries.
//!
//! # Value Origins
//!
//! A [`Value`] is produced by:
//!
//! - an instruction (constants, operators, calls, phis, ...)
//! - a function parameter
//! - a free value, the capture cell of a variable of an enclosing function
//! - a function literal, referring to the nested function it created

use std::fmt;

use crate::{
    ast::Literal,
    ssa::{BasicKind, Type},
};

/// Identifies a function within a package graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(usize);

impl FuncId {
    /// Creates a function id from an arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Identifies a basic block within its function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    /// Creates a block id from an arena index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

/// Identifies a value: the owning function and the index in its value arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId {
    func: FuncId,
    index: usize,
}

impl ValueId {
    /// Creates a value id.
    #[must_use]
    pub const fn new(func: FuncId, index: usize) -> Self {
        Self { func, index }
    }

    /// The function owning the value.
    #[must_use]
    pub const fn func(self) -> FuncId {
        self.func
    }

    /// The index in the owning function's value arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.index)
    }
}

/// Identifies an instruction: the owning function and the index in its
/// instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId {
    func: FuncId,
    index: usize,
}

impl InstrId {
    /// Creates an instruction id.
    #[must_use]
    pub const fn new(func: FuncId, index: usize) -> Self {
        Self { func, index }
    }

    /// The function owning the instruction.
    #[must_use]
    pub const fn func(self) -> FuncId {
        self.func
    }

    /// The index in the owning function's instruction arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "i{}", self.index)
    }
}

/// A constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Const {
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
    /// Character
    Char(char),
    /// Boolean
    Bool(bool),
    /// `nil`
    Nil,
    /// `undefined`
    Undefined,
}

impl Const {
    /// The type of the constant.
    #[must_use]
    pub fn ty(&self) -> Type {
        Type::basic(match self {
            Const::Int(_) | Const::Float(_) => BasicKind::Number,
            Const::Str(_) | Const::Char(_) => BasicKind::String,
            Const::Bool(_) => BasicKind::Boolean,
            Const::Nil => BasicKind::Null,
            Const::Undefined => BasicKind::Undefined,
        })
    }

    /// The text used when the constant is a field key: strings unquoted, everything
    /// else as printed.
    #[must_use]
    pub fn key_text(&self) -> String {
        match self {
            Const::Str(s) => s.clone(),
            Const::Char(c) => c.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<&Literal> for Const {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int(v) => Const::Int(*v),
            Literal::Float(v) => Const::Float(*v),
            Literal::Str(v) => Const::Str(v.clone()),
            Literal::Char(v) => Const::Char(*v),
            Literal::Bool(v) => Const::Bool(*v),
            Literal::Nil => Const::Nil,
            Literal::Undefined => Const::Undefined,
        }
    }
}

impl fmt::Display for Const {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Const::Int(v) => write!(f, "{v}"),
            Const::Float(v) => write!(f, "{v:?}"),
            Const::Str(v) => write!(f, "{v:?}"),
            Const::Char(v) => write!(f, "{v:?}"),
            Const::Bool(v) => write!(f, "{v}"),
            Const::Nil => f.write_str("nil"),
            Const::Undefined => f.write_str("undefined"),
        }
    }
}

/// Where a value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// The result of an instruction
    Instruction(InstrId),
    /// The parameter at `index`
    Parameter {
        /// Position in the parameter list
        index: usize,
    },
    /// A capture cell shared with the enclosing function
    FreeValue {
        /// The value of the enclosing function at the time of the capture
        captured: Option<ValueId>,
    },
    /// A reference to a nested function
    Function(FuncId),
}

/// A value with its type and users.
#[derive(Debug, Clone)]
pub struct Value {
    id: ValueId,
    kind: ValueKind,
    ty: Type,
    users: Vec<InstrId>,
    variable: Option<String>,
}

impl Value {
    pub(crate) fn new(id: ValueId, kind: ValueKind, ty: Type) -> Self {
        Self {
            id,
            kind,
            ty,
            users: Vec::new(),
            variable: None,
        }
    }

    /// The id of this value.
    #[must_use]
    pub fn id(&self) -> ValueId {
        self.id
    }

    /// Where the value comes from.
    #[must_use]
    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The type of the value.
    #[must_use]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Instructions that use this value as operand.
    #[must_use]
    pub fn users(&self) -> &[InstrId] {
        &self.users
    }

    /// The source variable the value was first assigned to.
    #[must_use]
    pub fn variable(&self) -> Option<&str> {
        self.variable.as_deref()
    }

    /// The defining instruction, for instruction results.
    #[must_use]
    pub fn instruction(&self) -> Option<InstrId> {
        match self.kind {
            ValueKind::Instruction(instr) => Some(instr),
            _ => None,
        }
    }

    /// Returns true for capture cells.
    #[must_use]
    pub fn is_free_value(&self) -> bool {
        matches!(self.kind, ValueKind::FreeValue { .. })
    }

    /// Returns true for parameters.
    #[must_use]
    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, ValueKind::Parameter { .. })
    }

    pub(crate) fn set_type(&mut self, ty: Type) {
        self.ty = ty;
    }

    pub(crate) fn set_variable(&mut self, name: &str) {
        if self.variable.is_none() {
            self.variable = Some(name.to_string());
        }
    }

    pub(crate) fn set_kind(&mut self, kind: ValueKind) {
        self.kind = kind;
    }

    pub(crate) fn add_user(&mut self, user: InstrId) {
        if !self.users.contains(&user) {
            self.users.push(user);
        }
    }

    pub(crate) fn remove_user(&mut self, user: InstrId) {
        self.users.retain(|u| *u != user);
    }

    pub(crate) fn take_users(&mut self) -> Vec<InstrId> {
        std::mem::take(&mut self.users)
    }
}
