//! Syntax tree consumed by the SSA builder.
//!
//! The tree is produced by an external parser; this crate never tokenizes source text.
//! Every statement and expression carries the [`Position`] it was parsed from so that
//! diagnostics can point back into the source. Children are ordered exactly as they
//! appear in the source, the builder walks them once, depth-first and left-to-right.
//!
//! Besides the plain data types the module offers small constructor helpers, which keep
//! hand-written trees (in tests, or in front-ends that desugar their own syntax) short:
//!
//! ```rust
//! use yakssa::ast::{BinaryOp, Expr, ForStmt, SourceFile, Stmt};
//!
//! // for i = 0; i < 10; i++ { }
//! let file = SourceFile::new(
//!     "loop",
//!     vec![ForStmt::new(vec![])
//!         .init(Stmt::assign("i", Expr::int(0)))
//!         .cond(Expr::binary(BinaryOp::Lt, Expr::ident("i"), Expr::int(10)))
//!         .step(Stmt::inc("i"))
//!         .into()],
//! );
//! assert_eq!(file.body.len(), 1);
//! ```

mod operator;

use std::fmt;

pub use operator::{BinaryOp, UnaryOp};

/// A location in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Position {
    /// 1-based line, 0 when unknown
    pub line: u32,
    /// 1-based column, 0 when unknown
    pub column: u32,
}

impl Position {
    /// Creates a new position.
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One compilation unit: a named list of top-level statements.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    /// Name of the unit, used for diagnostics and as package name default
    pub name: String,
    /// Top-level statements, they make up the body of the package's main function
    pub body: Vec<Stmt>,
}

impl SourceFile {
    /// Creates a new compilation unit.
    pub fn new(name: impl Into<String>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }
}

/// A statement with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    /// What kind of statement this is
    pub kind: StmtKind,
    /// Where it starts
    pub pos: Position,
}

/// All statement kinds of the language.
#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// A bare expression evaluated for its effects
    Expr(Expr),
    /// `a, b = x, y` or, with `define`, `a, b := x, y`
    Assign {
        /// Assignment targets
        targets: Vec<LeftValue>,
        /// Assigned values
        values: Vec<Expr>,
        /// `:=` always binds fresh locals
        define: bool,
    },
    /// `x++` / `x--`
    IncDec {
        /// Modified location
        target: LeftValue,
        /// `++` when true
        increment: bool,
    },
    /// `x op= v`
    OpAssign {
        /// Modified location
        target: LeftValue,
        /// Operator applied to the old value and `value`
        op: BinaryOp,
        /// Right-hand side
        value: Expr,
    },
    /// `var a, b = x, y`
    VarDecl {
        /// Declared names
        names: Vec<String>,
        /// Initial values, may be empty
        values: Vec<Expr>,
    },
    /// `if / elif / else`
    If(IfStmt),
    /// Three clause loop, also covers `for cond { }` and `for { }`
    For(ForStmt),
    /// Loop over the elements of a value
    Range(RangeStmt),
    /// `switch`
    Switch(SwitchStmt),
    /// `try { } catch e { } finally { }`
    Try(TryStmt),
    /// `{ ... }`
    Block(Vec<Stmt>),
    /// `assert cond, message`
    Assert {
        /// Asserted condition
        cond: Expr,
        /// Optional message expression
        message: Option<Expr>,
    },
    /// `panic(value)`
    Panic(Expr),
    /// `return a, b`
    Return(Vec<Expr>),
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `fallthrough`
    Fallthrough,
    /// `defer call()`
    Defer(Expr),
    /// `go call()`
    Go(Expr),
    /// `include "path"`
    Include(String),
    /// `;`
    Empty,
}

/// A location that can be assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct LeftValue {
    /// What kind of location
    pub kind: LeftValueKind,
    /// Where it appears
    pub pos: Position,
}

/// Kinds of assignable locations.
#[derive(Debug, Clone, PartialEq)]
pub enum LeftValueKind {
    /// A variable
    Ident(String),
    /// `object[key]`
    Index {
        /// Indexed value
        object: Expr,
        /// The key
        key: Expr,
    },
    /// `object.name`
    Member {
        /// Accessed value
        object: Expr,
        /// Member name
        name: String,
    },
}

/// One condition and its body.
#[derive(Debug, Clone, PartialEq)]
pub struct IfBranch {
    /// Branch condition
    pub cond: Expr,
    /// Statements executed when `cond` holds
    pub body: Vec<Stmt>,
}

/// What follows the last condition of an if statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    /// `else { ... }`
    Block(Vec<Stmt>),
    /// `else if ...`, a nested if that merges into the same done block
    If(Box<IfStmt>),
}

/// `if c { } elif d { } else { }`
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    /// The `if` branch followed by the `elif` branches, in source order
    pub branches: Vec<IfBranch>,
    /// Optional else part
    pub else_branch: Option<ElseBranch>,
}

/// `for init; cond; step { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    /// Initialization, emitted before the loop
    pub init: Option<Box<Stmt>>,
    /// Condition, `true` when missing
    pub cond: Option<Expr>,
    /// Step, emitted at the end of every iteration
    pub step: Option<Box<Stmt>>,
    /// Loop body
    pub body: Vec<Stmt>,
}

/// `for k, v = range x { }` or `for v in x { }`
#[derive(Debug, Clone, PartialEq)]
pub struct RangeStmt {
    /// Name bound to the key
    pub key: Option<String>,
    /// Name bound to the element
    pub value: Option<String>,
    /// Iterated value
    pub iterable: Expr,
    /// `in` form, the single name receives the element instead of the key
    pub is_in: bool,
    /// Loop body
    pub body: Vec<Stmt>,
}

/// One `case` of a switch.
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    /// Values compared against the switch condition
    pub values: Vec<Expr>,
    /// Case body
    pub body: Vec<Stmt>,
}

/// `switch cond { case ...: default: }`
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchStmt {
    /// Switched value, `true` when missing
    pub cond: Option<Expr>,
    /// Cases in source order
    pub cases: Vec<SwitchCase>,
    /// Body of `default`
    pub default: Option<Vec<Stmt>>,
}

/// `try { } catch name { } finally { }`
#[derive(Debug, Clone, PartialEq)]
pub struct TryStmt {
    /// Guarded statements
    pub body: Vec<Stmt>,
    /// Name bound to the caught error
    pub catch_name: Option<String>,
    /// Handler statements
    pub catch_body: Vec<Stmt>,
    /// Statements that always run
    pub finally: Option<Vec<Stmt>>,
}

/// An expression with its position.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    /// What kind of expression this is
    pub kind: ExprKind,
    /// Where it starts
    pub pos: Position,
}

/// All expression kinds of the language.
#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// A literal constant
    Literal(Literal),
    /// A variable reference
    Ident(String),
    /// `func name(params) { }` or `(params) => expr`
    Function(Box<FunctionLit>),
    /// `callee(args)`
    Call {
        /// Called value
        callee: Box<Expr>,
        /// Arguments
        args: Vec<Expr>,
        /// Last argument is spread with `...`
        ellipsis: bool,
        /// Trailing `~` drops the error result
        drop_error: bool,
    },
    /// `object[k]`, `object[low:high]`, `object[low:high:step]`
    Index {
        /// Indexed value
        object: Box<Expr>,
        /// One to three keys
        keys: Vec<Expr>,
    },
    /// `object.name`
    Member {
        /// Accessed value
        object: Box<Expr>,
        /// Member name
        name: String,
    },
    /// `lhs op rhs`
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// `op operand`
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expr>,
    },
    /// `make(T, args...)`
    Make {
        /// Built type
        ty: TypeExpr,
        /// Length/capacity arguments
        args: Vec<Expr>,
    },
    /// `[a, b, c]` or `[]T{a, b, c}`
    SliceLit {
        /// Declared type
        ty: Option<TypeExpr>,
        /// Elements
        elems: Vec<Expr>,
    },
    /// `{k: v}` or `map[K]V{k: v}`
    MapLit {
        /// Declared type
        ty: Option<TypeExpr>,
        /// Entries in source order
        entries: Vec<(Expr, Expr)>,
    },
    /// `T(value)`
    Cast {
        /// Target type
        ty: TypeExpr,
        /// Converted value
        value: Box<Expr>,
    },
    /// A type used as a value
    Type(TypeExpr),
    /// `recover()`
    Recover,
}

/// Literal constants.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// String literal
    Str(String),
    /// Character literal
    Char(char),
    /// `true` / `false`
    Bool(bool),
    /// `nil`
    Nil,
    /// `undefined`
    Undefined,
}

/// A type as written in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A named type, e.g. `int`, `string`, `var`
    Named(String),
    /// `[]T`
    Slice(Box<TypeExpr>),
    /// `map[K]V`
    Map(Box<TypeExpr>, Box<TypeExpr>),
    /// `chan T`
    Chan(Box<TypeExpr>),
}

impl TypeExpr {
    /// `name`
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// `[]elem`
    #[must_use]
    pub fn slice(elem: TypeExpr) -> Self {
        Self::Slice(Box::new(elem))
    }

    /// `map[key]value`
    #[must_use]
    pub fn map(key: TypeExpr, value: TypeExpr) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    /// `chan elem`
    #[must_use]
    pub fn chan(elem: TypeExpr) -> Self {
        Self::Chan(Box::new(elem))
    }
}

/// A function literal.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLit {
    /// Name bound in the enclosing function after the literal is built
    pub name: Option<String>,
    /// Parameter names
    pub params: Vec<String>,
    /// Last parameter collects the remaining arguments
    pub variadic: bool,
    /// The body
    pub body: FunctionBody,
}

/// Body of a function literal.
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionBody {
    /// `{ statements }`
    Block(Vec<Stmt>),
    /// `=> expr`, returns the expression
    Expr(Box<Expr>),
}

impl FunctionLit {
    /// Creates an anonymous function with a block body.
    #[must_use]
    pub fn new(params: &[&str], body: Vec<Stmt>) -> Self {
        Self {
            name: None,
            params: params.iter().map(|p| (*p).to_string()).collect(),
            variadic: false,
            body: FunctionBody::Block(body),
        }
    }

    /// Creates an arrow function returning `expr`.
    #[must_use]
    pub fn arrow(params: &[&str], expr: Expr) -> Self {
        Self {
            name: None,
            params: params.iter().map(|p| (*p).to_string()).collect(),
            variadic: false,
            body: FunctionBody::Expr(Box::new(expr)),
        }
    }

    /// Sets the name the literal binds in its parent.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Marks the last parameter as variadic.
    #[must_use]
    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }
}

impl Expr {
    /// Creates an expression at an unknown position.
    #[must_use]
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            pos: Position::default(),
        }
    }

    /// Sets the position of this expression.
    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.pos = Position::new(line, column);
        self
    }

    /// A variable reference
    pub fn ident(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Ident(name.into()))
    }

    /// An integer literal
    #[must_use]
    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Literal(Literal::Int(value)))
    }

    /// A float literal
    #[must_use]
    pub fn float(value: f64) -> Self {
        Self::new(ExprKind::Literal(Literal::Float(value)))
    }

    /// A string literal
    pub fn string(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Literal(Literal::Str(value.into())))
    }

    /// A boolean literal
    #[must_use]
    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Literal(Literal::Bool(value)))
    }

    /// `nil`
    #[must_use]
    pub fn nil() -> Self {
        Self::new(ExprKind::Literal(Literal::Nil))
    }

    /// `lhs op rhs`
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// `op operand`
    #[must_use]
    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// `callee(args)`
    #[must_use]
    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(callee),
            args,
            ellipsis: false,
            drop_error: false,
        })
    }

    /// `object[keys]`
    #[must_use]
    pub fn index(object: Expr, keys: Vec<Expr>) -> Self {
        Self::new(ExprKind::Index {
            object: Box::new(object),
            keys,
        })
    }

    /// `object.name`
    pub fn member(object: Expr, name: impl Into<String>) -> Self {
        Self::new(ExprKind::Member {
            object: Box::new(object),
            name: name.into(),
        })
    }

    /// A function literal
    #[must_use]
    pub fn function(lit: FunctionLit) -> Self {
        Self::new(ExprKind::Function(Box::new(lit)))
    }

    /// `[elems]`
    #[must_use]
    pub fn slice(elems: Vec<Expr>) -> Self {
        Self::new(ExprKind::SliceLit { ty: None, elems })
    }

    /// `{k: v, ...}`
    #[must_use]
    pub fn map(entries: Vec<(Expr, Expr)>) -> Self {
        Self::new(ExprKind::MapLit { ty: None, entries })
    }

    /// `make(ty, args)`
    #[must_use]
    pub fn make(ty: TypeExpr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Make { ty, args })
    }

    /// `ty(value)`
    #[must_use]
    pub fn cast(ty: TypeExpr, value: Expr) -> Self {
        Self::new(ExprKind::Cast {
            ty,
            value: Box::new(value),
        })
    }
}

impl LeftValue {
    /// A variable target
    pub fn ident(name: impl Into<String>) -> Self {
        Self {
            kind: LeftValueKind::Ident(name.into()),
            pos: Position::default(),
        }
    }

    /// `object[key]`
    #[must_use]
    pub fn index(object: Expr, key: Expr) -> Self {
        Self {
            kind: LeftValueKind::Index { object, key },
            pos: Position::default(),
        }
    }

    /// `object.name`
    pub fn member(object: Expr, name: impl Into<String>) -> Self {
        Self {
            kind: LeftValueKind::Member {
                object,
                name: name.into(),
            },
            pos: Position::default(),
        }
    }
}

impl Stmt {
    /// Creates a statement at an unknown position.
    #[must_use]
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            pos: Position::default(),
        }
    }

    /// Sets the position of this statement.
    #[must_use]
    pub fn at(mut self, line: u32, column: u32) -> Self {
        self.pos = Position::new(line, column);
        self
    }

    /// A bare expression statement
    #[must_use]
    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    /// `name = value`
    pub fn assign(name: impl Into<String>, value: Expr) -> Self {
        Self::assign_to(vec![LeftValue::ident(name)], vec![value])
    }

    /// `name := value`
    pub fn define(name: impl Into<String>, value: Expr) -> Self {
        Self::new(StmtKind::Assign {
            targets: vec![LeftValue::ident(name)],
            values: vec![value],
            define: true,
        })
    }

    /// `targets = values`
    #[must_use]
    pub fn assign_to(targets: Vec<LeftValue>, values: Vec<Expr>) -> Self {
        Self::new(StmtKind::Assign {
            targets,
            values,
            define: false,
        })
    }

    /// `name++`
    pub fn inc(name: impl Into<String>) -> Self {
        Self::new(StmtKind::IncDec {
            target: LeftValue::ident(name),
            increment: true,
        })
    }

    /// `name--`
    pub fn dec(name: impl Into<String>) -> Self {
        Self::new(StmtKind::IncDec {
            target: LeftValue::ident(name),
            increment: false,
        })
    }

    /// `name op= value`
    pub fn op_assign(name: impl Into<String>, op: BinaryOp, value: Expr) -> Self {
        Self::new(StmtKind::OpAssign {
            target: LeftValue::ident(name),
            op,
            value,
        })
    }

    /// `return values`
    #[must_use]
    pub fn ret(values: Vec<Expr>) -> Self {
        Self::new(StmtKind::Return(values))
    }

    /// `break`
    #[must_use]
    pub fn brk() -> Self {
        Self::new(StmtKind::Break)
    }

    /// `continue`
    #[must_use]
    pub fn cont() -> Self {
        Self::new(StmtKind::Continue)
    }
}

impl IfStmt {
    /// `if cond { body }`
    #[must_use]
    pub fn new(cond: Expr, body: Vec<Stmt>) -> Self {
        Self {
            branches: vec![IfBranch { cond, body }],
            else_branch: None,
        }
    }

    /// Appends `elif cond { body }`.
    #[must_use]
    pub fn elif(mut self, cond: Expr, body: Vec<Stmt>) -> Self {
        self.branches.push(IfBranch { cond, body });
        self
    }

    /// Sets `else { body }`.
    #[must_use]
    pub fn otherwise(mut self, body: Vec<Stmt>) -> Self {
        self.else_branch = Some(ElseBranch::Block(body));
        self
    }

    /// Sets `else if ...`.
    #[must_use]
    pub fn otherwise_if(mut self, nested: IfStmt) -> Self {
        self.else_branch = Some(ElseBranch::If(Box::new(nested)));
        self
    }
}

impl ForStmt {
    /// `for { body }`
    #[must_use]
    pub fn new(body: Vec<Stmt>) -> Self {
        Self {
            init: None,
            cond: None,
            step: None,
            body,
        }
    }

    /// Sets the initialization clause.
    #[must_use]
    pub fn init(mut self, stmt: Stmt) -> Self {
        self.init = Some(Box::new(stmt));
        self
    }

    /// Sets the condition.
    #[must_use]
    pub fn cond(mut self, cond: Expr) -> Self {
        self.cond = Some(cond);
        self
    }

    /// Sets the step clause.
    #[must_use]
    pub fn step(mut self, stmt: Stmt) -> Self {
        self.step = Some(Box::new(stmt));
        self
    }
}

impl From<IfStmt> for Stmt {
    fn from(value: IfStmt) -> Self {
        Stmt::new(StmtKind::If(value))
    }
}

impl From<ForStmt> for Stmt {
    fn from(value: ForStmt) -> Self {
        Stmt::new(StmtKind::For(value))
    }
}

impl From<RangeStmt> for Stmt {
    fn from(value: RangeStmt) -> Self {
        Stmt::new(StmtKind::Range(value))
    }
}

impl From<SwitchStmt> for Stmt {
    fn from(value: SwitchStmt) -> Self {
        Stmt::new(StmtKind::Switch(value))
    }
}

impl From<TryStmt> for Stmt {
    fn from(value: TryStmt) -> Self {
        Stmt::new(StmtKind::Try(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_display() {
        assert_eq!(Position::new(12, 4).to_string(), "12:4");
        assert_eq!(Position::default().to_string(), "0:0");
    }

    #[test]
    fn test_if_builder_collects_branches() {
        let stmt: Stmt = IfStmt::new(Expr::ident("a"), vec![])
            .elif(Expr::ident("b"), vec![Stmt::brk()])
            .otherwise(vec![])
            .into();
        let StmtKind::If(ifs) = stmt.kind else {
            panic!("expected if statement");
        };
        assert_eq!(ifs.branches.len(), 2);
        assert!(matches!(ifs.else_branch, Some(ElseBranch::Block(_))));
    }

    #[test]
    fn test_positions_attach() {
        let expr = Expr::int(3).at(2, 9);
        assert_eq!(expr.pos, Position::new(2, 9));
        let stmt = Stmt::assign("x", expr).at(2, 5);
        assert_eq!(stmt.pos.column, 5);
    }
}
