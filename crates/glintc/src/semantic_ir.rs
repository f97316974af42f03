//! The semantic IR (§4.4): a typed, resolved tree distinct from both the
//! AST and the code IR. Every node carries a resolved [`Type`] and a
//! [`SourceSpan`]; by the time this tree exists, overload resolution and
//! implicit-conversion insertion have already happened — pass 2 (the IR
//! builder) only has to linearize it.
//!
//! Grounded on `original_source/include/qore/comp/sem/Expression.h` and
//! `Statement.h`: a tagged sum type per §9's "visitor hierarchies"
//! redesign note, rather than the original's class hierarchy with
//! `accept(Visitor)`.

use crate::{
    diagnostics::SourceSpan,
    intern::StringId,
    symbols::{FunctionId, GlobalVariableId, LocalId, Symbol},
    types::{BinaryOp, Conversion, Type},
};

/// What an identifier/member reference resolved to, or `Error` if
/// resolution failed and a diagnostic was already emitted (§7).
#[derive(Debug, Clone, Copy)]
pub enum ResolvedSymbol {
    Symbol(Symbol),
    Error,
}

/// An assignable location (§4.4: "`l` to be an *LValue*").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LValue {
    Local(LocalId),
    Global(GlobalVariableId),
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Symbol(ResolvedSymbol),
    ConstInt(i64),
    ConstString(StringId),
    /// Lowered to an int constant of 0 or 1 (§3.2: `Bool` is a primitive
    /// occupying the same tagged-union slot as `Int`); the code IR has no
    /// dedicated `ConstBool` opcode, so this node's [`Type`] is what
    /// distinguishes it from an `Int` literal, not the instruction used
    /// to materialize it.
    ConstBool(bool),
    ConstNothing,
    /// Resolved operator application; operand subtrees already carry any
    /// implicit conversion needed to reach `op`'s declared operand types.
    BinaryOp { op: BinaryOp, left: Box<Expr>, right: Box<Expr> },
    /// `-x`, `!x`: resolved to a runtime intrinsic the same way a binary
    /// operator is, just with one operand.
    UnaryOp { function: crate::types::RuntimeFn, can_throw: bool, operand: Box<Expr> },
    /// An implicit conversion inserted to reach a consuming context's
    /// expected type (assignment target, operator operand, return type).
    Convert { conversion: Conversion, inner: Box<Expr> },
    Assign { target: LValue, value: Box<Expr> },
    /// The structural lowering target of `&&`, `||`, and `?:` (§4.4):
    /// short-circuiting is this node, not a back-end responsibility.
    /// `else_branch` is always present for a value-producing `If` — `&&`
    /// lowers to `if cond { rhs } else { false }`-shaped trees and so on.
    If { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    /// `my x = init` used as an expression; yields the declared local's
    /// value. `declareLocal` has already run by the time this node
    /// exists (§4.4).
    VarDecl { local: LocalId, init: Option<Box<Expr>> },
    Call { function: FunctionId, args: Vec<Expr> },
}

/// One node of the typed expression tree (§4.4).
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>> },
    /// `catch_local` is `None` only if the source `catch` clause binds no
    /// variable; the current exception is still materialized into the
    /// catch block but discarded.
    Try { try_body: Vec<Stmt>, catch_local: Option<LocalId>, catch_body: Vec<Stmt> },
    Return(Option<Expr>),
    Compound(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

/// A fully analyzed function body, ready for pass 2 (§4.4, §4.5).
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub statements: Vec<Stmt>,
}
