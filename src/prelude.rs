//! # yakssa Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from
//! the yakssa library. Import this module to get quick access to the syntax tree
//! constructors, the build entry points and the graph types.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all yakssa operations
pub use crate::Error;

/// The result type used throughout yakssa
pub use crate::Result;

/// Build configuration
pub use crate::{BuildConfig, ErrorPolicy};

/// Build events
pub use crate::{Event, EventKind, EventLog};

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Compilation units
pub use crate::ssa::{BuildState, Package, Program};

// ================================================================================================
// Syntax Tree
// ================================================================================================

/// Statements, expressions and their constructors
pub use crate::ast::{
    BinaryOp, ElseBranch, Expr, ExprKind, ForStmt, FunctionBody, FunctionLit, IfStmt,
    LeftValue, LeftValueKind, Literal, Position, RangeStmt, SourceFile, Stmt, StmtKind,
    SwitchCase, SwitchStmt, TryStmt, TypeExpr, UnaryOp,
};

// ================================================================================================
// SSA Graph
// ================================================================================================

/// Graph structure
pub use crate::ssa::{BasicBlock, Capture, Function, Graph, MAIN_FUNCTION};

/// Instructions and values
pub use crate::ssa::{
    BlockId, Const, FuncId, InstrId, Instruction, LoopInfo, Op, Opcode, Value, ValueId,
    ValueKind,
};

/// Type system
pub use crate::ssa::{FunctionType, ObjectKind, ObjectType, Type, TypeKind};
