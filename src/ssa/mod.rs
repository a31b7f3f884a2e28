//! Static single assignment form for yaklang programs.
//!
//! This module lowers the syntax tree of a package into an SSA graph while walking
//! it once. Variables are resolved on the fly: reads are answered from the current
//! definitions of the enclosing blocks, phis are only placed where definitions merge
//! and trivial phis are removed as soon as they are detected. No dominance frontier
//! is computed at any point.
//!
//! # Architecture
//!
//! - [`Type`] - Structural type descriptors with unification and classification
//! - [`Value`], [`Instruction`], [`BasicBlock`], [`Function`] - The IR nodes, stored in
//!   per-function arenas and addressed by [`ValueId`], [`InstrId`] and [`BlockId`]
//! - [`Graph`] - All functions of a package together with the def-use bookkeeping
//! - The resolver - Current definitions per block, incomplete phis, sealing and
//!   trivial phi removal
//! - The builder - Walks statements and expressions, creates blocks for structured
//!   control flow and captures free variables of closures
//! - [`Package`] / [`Program`] - Compilation units with an idempotent build
//!
//! # Examples
//!
//! ```rust
//! use yakssa::{
//!     ast::{BinaryOp, Expr, ForStmt, SourceFile, Stmt},
//!     ssa::{Opcode, Package},
//! };
//!
//! let file = SourceFile::new(
//!     "count",
//!     vec![ForStmt::new(vec![])
//!         .init(Stmt::assign("i", Expr::int(0)))
//!         .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(10)))
//!         .step(Stmt::inc("i"))
//!         .into()],
//! );
//!
//! let package = Package::new("count", file);
//! let graph = package.build()?;
//! let main = graph.main().expect("main function");
//!
//! // a single phi for `i` in the loop header
//! assert_eq!(main.phis().count(), 1);
//! assert!(main
//!     .instructions()
//!     .iter()
//!     .any(|instr| instr.opcode() == Opcode::Loop));
//! # Ok::<(), yakssa::Error>(())
//! ```

mod block;
pub(crate) mod builder;
mod dot;
mod function;
mod graph;
mod instruction;
mod program;
pub(crate) mod resolver;
mod types;
mod value;

pub use block::BasicBlock;
pub use builder::MAIN_FUNCTION;
pub use function::{Capture, Function};
pub use graph::Graph;
pub use instruction::{Instruction, LoopInfo, MakeArgs, Op, Opcode, PhiOperand, SwitchLabel};
pub use program::{BuildState, Package, Program};
pub use types::{
    AliasType, BasicKind, BasicType, ChanType, FunctionType, InterfaceType, MethodTable,
    ObjectKind, ObjectType, Type, TypeData, TypeKind,
};
pub use value::{BlockId, Const, FuncId, InstrId, Value, ValueId, ValueKind};
