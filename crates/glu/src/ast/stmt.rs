//! Statement nodes (spec §3 table, `Stmt` column).

use crate::ast::{DeclIdx, ExprIdx, NodeRef, StmtIdx};
use crate::source::SourceLocation;

#[derive(Debug, Clone)]
pub struct Stmt {
    pub location: SourceLocation,
    pub parent: Option<NodeRef>,
    pub kind: StmtKind,
}

#[derive(Debug, Clone)]
pub enum StmtKind {
    Compound(CompoundStmt),
    If(IfStmt),
    While(WhileStmt),
    For(ForStmt),
    Return(ReturnStmt),
    Assign(AssignStmt),
    Break,
    Continue,
    Expression(ExprIdx),
    /// A local `var`/`let` introduced mid-block; the declaration itself
    /// lives in the decl arena, this just threads it into statement order.
    Decl(DeclIdx),
}

/// Defines a nested scope (spec §3).
#[derive(Debug, Clone, Default)]
pub struct CompoundStmt {
    pub stmts: Vec<StmtIdx>,
}

#[derive(Debug, Clone)]
pub struct IfStmt {
    pub condition: ExprIdx,
    pub then_branch: StmtIdx,
    pub else_branch: Option<StmtIdx>,
}

#[derive(Debug, Clone)]
pub struct WhileStmt {
    pub condition: ExprIdx,
    pub body: StmtIdx,
}

/// `for binding in range { body }`; `binding` is a `ForBinding` decl
/// pushed into the loop's own child scope (spec §3: "plus ... one scope
/// per ... for-statement").
#[derive(Debug, Clone)]
pub struct ForStmt {
    pub binding: DeclIdx,
    pub range: ExprIdx,
    pub body: StmtIdx,
}

#[derive(Debug, Clone)]
pub struct ReturnStmt {
    pub value: Option<ExprIdx>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

#[derive(Debug, Clone)]
pub struct AssignStmt {
    pub lhs: ExprIdx,
    pub op: AssignOp,
    pub rhs: ExprIdx,
}
