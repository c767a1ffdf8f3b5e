//! Expression nodes (spec §3 table, `Expr` column).
//!
//! Every `Expr` carries a result type (spec §3: "Exprs additionally store
//! a result type (possibly a type variable, later resolved)"); see
//! [`crate::ast::Module::alloc_expr`], which seeds it with a fresh type
//! variable.

use ecow::EcoString;
use num_bigint::BigInt;

use crate::ast::{ExprIdx, NodeRef};
use crate::ids::DeclId;
use crate::intern::Interned;
use crate::source::SourceLocation;
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct Expr {
    pub location: SourceLocation,
    pub parent: Option<NodeRef>,
    pub ty: Interned<Type>,
    pub kind: ExprKind,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Literal(LiteralExpr),
    Ref(RefExpr),
    Binary(BinaryOpExpr),
    Unary(UnaryOpExpr),
    Call(CallExpr),
    Cast(CastExpr),
    StructMember(StructMemberExpr),
    StructInitializer(StructInitializerExpr),
    Ternary(TernaryConditionalExpr),
    PointerDeref(ExprIdx),
}

#[derive(Debug, Clone)]
pub enum LiteralExpr {
    Int(BigInt),
    Float(f64),
    String(EcoString),
    Bool(bool),
}

impl LiteralExpr {
    pub fn describe(&self) -> &'static str {
        match self {
            LiteralExpr::Int(_) => "integer literal",
            LiteralExpr::Float(_) => "float literal",
            LiteralExpr::String(_) => "string literal",
            LiteralExpr::Bool(_) => "bool literal",
        }
    }
}

/// A namespace-qualified identifier. `target` is nullable pre-Sema and
/// non-null post-Sema (spec §3, §8 property 2).
#[derive(Debug, Clone)]
pub struct RefExpr {
    pub path: Vec<EcoString>,
    pub target: Option<DeclId>,
    /// Candidate declarations visible at this reference's scope, ordered
    /// as found by lookup; used to build the overload-resolution
    /// disjunction (spec §4.3 phase 2, "BinaryOp/UnaryOp" row).
    pub candidates: Vec<DeclId>,
}

impl RefExpr {
    pub fn unqualified(name: impl Into<EcoString>) -> Self {
        RefExpr { path: vec![name.into()], target: None, candidates: Vec::new() }
    }
}

/// Binary operators resolve "as if called as a function" (spec §4.3): the
/// `operator` field is itself a `RefExpr` node (living in the same expr
/// arena) whose candidates are the visible overloads of the operator name.
#[derive(Debug, Clone)]
pub struct BinaryOpExpr {
    pub operator: ExprIdx,
    pub lhs: ExprIdx,
    pub rhs: ExprIdx,
}

#[derive(Debug, Clone)]
pub struct UnaryOpExpr {
    pub operator: ExprIdx,
    pub operand: ExprIdx,
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub callee: ExprIdx,
    pub args: Vec<ExprIdx>,
    pub template_args: Option<Vec<Interned<Type>>>,
}

/// Explicit conversion (`v as T`); admits a wider conversion set than an
/// implicit one (spec §3, §4.3 `IsValidConversion`).
#[derive(Debug, Clone)]
pub struct CastExpr {
    pub sub_expr: ExprIdx,
    pub destination_type: Interned<Type>,
    /// `false` for casts synthesized by Sema to record an implicit
    /// conversion (spec §4.3 "Result disposition"); `true` for a cast the
    /// user wrote explicitly.
    pub explicit: bool,
}

#[derive(Debug, Clone)]
pub struct StructMemberExpr {
    pub base: ExprIdx,
    pub member: EcoString,
}

/// Ordered field expressions; count constraints are enforced by
/// `sema::checks` and the `StructInitialiser` constraint (spec §3,
/// §8 boundary behavior: "empty initializer valid iff struct has no
/// required fields").
#[derive(Debug, Clone)]
pub struct StructInitializerExpr {
    pub struct_type: Option<Interned<Type>>,
    pub fields: Vec<ExprIdx>,
}

#[derive(Debug, Clone)]
pub struct TernaryConditionalExpr {
    pub condition: ExprIdx,
    pub then_expr: ExprIdx,
    pub else_expr: ExprIdx,
}
