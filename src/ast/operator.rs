//! Binary and unary operators of the source language.
//!
//! The same operator enums are used by the syntax tree and by the SSA instructions,
//! an operator node in the graph keeps the exact operator the source used.

use strum::{Display, EnumCount, EnumIter, IntoStaticStr};

/// A binary operator
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, IntoStaticStr,
)]
pub enum BinaryOp {
    /// `+`
    #[strum(serialize = "+")]
    Add,
    /// `-`
    #[strum(serialize = "-")]
    Sub,
    /// `*`
    #[strum(serialize = "*")]
    Mul,
    /// `/`
    #[strum(serialize = "/")]
    Div,
    /// `%`
    #[strum(serialize = "%")]
    Mod,
    /// `<<`
    #[strum(serialize = "<<")]
    Shl,
    /// `>>`
    #[strum(serialize = ">>")]
    Shr,
    /// `&`
    #[strum(serialize = "&")]
    And,
    /// `&^`
    #[strum(serialize = "&^")]
    AndNot,
    /// `|`
    #[strum(serialize = "|")]
    Or,
    /// `^`
    #[strum(serialize = "^")]
    Xor,
    /// `&&`
    #[strum(serialize = "&&")]
    LogicAnd,
    /// `||`
    #[strum(serialize = "||")]
    LogicOr,
    /// `>`
    #[strum(serialize = ">")]
    Gt,
    /// `<`
    #[strum(serialize = "<")]
    Lt,
    /// `>=`
    #[strum(serialize = ">=")]
    GtEq,
    /// `<=`
    #[strum(serialize = "<=")]
    LtEq,
    /// `==`
    #[strum(serialize = "==")]
    Eq,
    /// `!=`
    #[strum(serialize = "!=")]
    NotEq,
    /// `in`
    #[strum(serialize = "in")]
    In,
    /// `<-` (channel send)
    #[strum(serialize = "<-")]
    Send,
}

impl BinaryOp {
    /// Returns true for operators that compare their operands.
    #[must_use]
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Gt | Self::Lt | Self::GtEq | Self::LtEq | Self::Eq | Self::NotEq | Self::In
        )
    }

    /// Returns true for `&&` and `||`.
    #[must_use]
    pub fn is_logical(&self) -> bool {
        matches!(self, Self::LogicAnd | Self::LogicOr)
    }

    /// Returns true if the operator always produces a boolean.
    #[must_use]
    pub fn yields_boolean(&self) -> bool {
        self.is_comparison() || self.is_logical()
    }
}

/// A unary operator
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, IntoStaticStr,
)]
pub enum UnaryOp {
    /// `!`
    #[strum(serialize = "!")]
    Not,
    /// `+`
    #[strum(serialize = "+")]
    Plus,
    /// `-`
    #[strum(serialize = "-")]
    Neg,
    /// `^` (bitwise complement)
    #[strum(serialize = "^")]
    BitNot,
    /// `<-` (channel receive)
    #[strum(serialize = "<-")]
    Recv,
}
