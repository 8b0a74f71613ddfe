use crate::span::Spanned;
use crate::typeck::kind::Kind;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone)]
pub struct Module {
    pub imports: Vec<Spanned<String>>,
    pub functions: Vec<Spanned<FunctionDecl>>,
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: Spanned<String>,
    pub is_sync: bool,
    pub is_native: bool,
    pub params: Vec<Param>,
    pub returns: Vec<Spanned<Kind>>,
    /// `None` for native functions.
    pub body: Option<Spanned<Block>>,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Spanned<String>,
    pub kind: Spanned<Kind>,
}

#[derive(Debug, Clone, Default)]
pub struct Block {
    pub stmts: Vec<Spanned<Stmt>>,
}

impl Block {
    /// True if every path through the block ends in `return`.
    pub fn always_returns(&self) -> bool {
        match self.stmts.last().map(|s| &s.node) {
            Some(Stmt::Return { .. }) => true,
            Some(Stmt::If { then_block, else_block, .. }) => {
                then_block.node.always_returns() && else_block.node.always_returns()
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        names: Vec<Spanned<String>>,
        value: Spanned<Expr>,
    },
    Return {
        value: Option<Spanned<Expr>>,
    },
    If {
        cond: Spanned<Expr>,
        then_block: Spanned<Block>,
        /// Empty when the source has no `else`.
        else_block: Spanned<Block>,
    },
    While {
        cond: Spanned<Expr>,
        body: Spanned<Block>,
    },
    Expr(Spanned<Expr>),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident(String),
    BoolLit(bool),
    IntLit(i64),
    StringLit(String),
    Tuple(Vec<Spanned<Expr>>),
    Call {
        callee: Spanned<String>,
        args: Vec<CallArg>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
}

#[derive(Debug, Clone)]
pub enum CallArg {
    /// `&name`: the value is threaded through the callee and re-bound to the
    /// result at the same position.
    Borrow(Spanned<String>),
    Value(Spanned<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
