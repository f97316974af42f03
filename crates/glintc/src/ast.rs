//! The AST contract (§6.1): "a validated tree whose nodes carry source
//! locations and (for types/names) raw textual identifiers."
//!
//! The lexer/parser that produces this tree is out of scope (§1); these
//! types exist only so the analyzer has something concrete to consume.
//! Names are already interned (`StringId`) since interning happens as the
//! parser/scanner produces identifiers in the teacher's own pipeline
//! (`ouros::intern`); nothing here performs scanning or parsing itself.

use crate::{diagnostics::SourceSpan, intern::StringId, types::BinOpKind};

/// A possibly-qualified type reference as written in source, e.g. `int`,
/// `*Widget`, or `::Shapes::Widget`.
#[derive(Debug, Clone)]
pub struct TypeRef {
    pub root_qualified: bool,
    pub segments: Vec<StringId>,
    pub asterisk: bool,
    pub span: SourceSpan,
}

#[derive(Debug, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
pub enum Literal {
    Int(i64),
    Str(StringId),
    Bool(bool),
    Nothing,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Identifier(StringId),
    Literal(Literal),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinOpKind, left: Box<Expr>, right: Box<Expr> },
    Assign { target: Box<Expr>, value: Box<Expr> },
    LogicalAnd(Box<Expr>, Box<Expr>),
    LogicalOr(Box<Expr>, Box<Expr>),
    Ternary { cond: Box<Expr>, then_branch: Box<Expr>, else_branch: Box<Expr> },
    /// `my x = expr` used as an expression (returns the declared local).
    VarDecl { name: StringId, declared_type: Option<TypeRef>, init: Option<Box<Expr>> },
    /// A call to a named function group; arguments are positional only —
    /// keyword/default arguments are not part of this spec's scope.
    Call { callee: StringId, args: Vec<Expr> },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Expr(Expr),
    If { cond: Expr, then_branch: Vec<Stmt>, else_branch: Option<Vec<Stmt>> },
    Try { try_body: Vec<Stmt>, catch_var: Option<StringId>, catch_body: Vec<Stmt> },
    Return(Option<Expr>),
    Compound(Vec<Stmt>),
}

#[derive(Debug, Clone)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: StringId,
    pub declared_type: TypeRef,
    pub span: SourceSpan,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Namespace { name: StringId, body: Vec<Decl> },
    Class { name: StringId, superclass: Option<TypeRef> },
    GlobalVariable { name: StringId, declared_type: TypeRef, init: Option<Expr> },
    Function { name: StringId, params: Vec<Param>, return_type: TypeRef, body: Vec<Stmt> },
    Constant { name: StringId, init: Expr },
    /// A top-level statement of a script, collected into `qMain` (§4.3).
    TopLevelStatement(Stmt),
}

#[derive(Debug, Clone)]
pub struct Decl {
    pub kind: DeclKind,
    pub span: SourceSpan,
}

/// The whole validated input: one script or module's top-level
/// declarations and statements, in source order.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    pub decls: Vec<Decl>,
}
