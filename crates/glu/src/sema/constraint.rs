//! Constraint vocabulary emitted by phase 2 and consumed by phase 3 (spec
//! §4.3 "Phase 2: Constraint emission" table and "Phase 3: Constraint
//! solving"). `SyntacticElement`, `Conjunction`, and `BridgingConversion`
//! from the original source's `ConstraintKind` are omitted per spec Design
//! Notes §9 ("A port should either omit them or stub them with
//! `unimplemented`") — nothing in the emission table (below) ever produces
//! them, so there is no emitter path that could construct one.

use ecow::EcoString;

use crate::ast::ExprIdx;
use crate::ids::DeclId;
use crate::intern::Interned;
use crate::source::SourceLocation;
use crate::types::Type;

/// Where a constraint came from, for diagnostics (spec §7: every error
/// kind is "reported at" some node's location).
#[derive(Debug, Clone, Copy)]
pub struct Locator {
    pub location: SourceLocation,
    pub expr: ExprIdx,
}

#[derive(Debug, Clone)]
pub struct Constraint {
    pub locator: Locator,
    pub kind: ConstraintKind,
}

impl Constraint {
    pub fn new(locator: Locator, kind: ConstraintKind) -> Self {
        Constraint { locator, kind }
    }

    /// Every type variable id mentioned anywhere in this constraint, used
    /// to build the color-class partition (spec §4.3 "Solver loop":
    /// "constraints are partitioned into color classes (connected
    /// components of type-variable sharing)").
    pub fn type_variables(&self) -> Vec<u32> {
        let mut out = Vec::new();
        let mut push = |ty: &Interned<Type>, out: &mut Vec<u32>| ty.collect_type_variables(out);
        match &self.kind {
            ConstraintKind::Equal(a, b) | ConstraintKind::CheckedCast { from: a, to: b } => {
                push(a, &mut out);
                push(b, &mut out);
            }
            ConstraintKind::Conversion { from, to, .. } => {
                push(from, &mut out);
                push(to, &mut out);
            }
            ConstraintKind::Defaultable { var, default } => {
                push(var, &mut out);
                push(default, &mut out);
            }
            ConstraintKind::ExpressibleByIntLiteral(t)
            | ConstraintKind::ExpressibleByFloatLiteral(t)
            | ConstraintKind::ExpressibleByStringLiteral(t) => push(t, &mut out),
            ConstraintKind::StructMember { base, result, .. } => {
                push(base, &mut out);
                push(result, &mut out);
            }
            ConstraintKind::StructInitialiser { result, .. } => push(result, &mut out),
            ConstraintKind::Disjunction { result, alternatives, .. } => {
                push(result, &mut out);
                for alt in alternatives {
                    for p in &alt.argument_types {
                        push(p, &mut out);
                    }
                    for p in &alt.param_types {
                        push(p, &mut out);
                    }
                    push(&alt.return_type, &mut out);
                }
            }
        }
        out
    }
}

/// One candidate of an overload-resolution disjunction (spec §4.3: "emit a
/// Disjunction over all candidate function declarations, each alternative
/// being a Conversion from expected-fn-ty to candidate-fn-ty").
#[derive(Debug, Clone)]
pub struct OverloadAlternative {
    pub candidate: DeclId,
    /// The actual operand/argument types at the call site, parallel to
    /// `param_types`; this is "expected-fn-ty" decomposed into per-position
    /// types so each position can be checked with `IsValidConversion`
    /// independently.
    pub argument_types: Vec<Interned<Type>>,
    pub param_types: Vec<Interned<Type>>,
    pub return_type: Interned<Type>,
}

#[derive(Debug, Clone)]
pub enum ConstraintKind {
    Equal(Interned<Type>, Interned<Type>),
    /// `operand_site = true` marks a per-argument conversion emitted by
    /// `emit_overload_site` (spec §4.3 "BinaryOp/UnaryOp" row), whose
    /// `Locator::expr` is the enclosing Binary/Unary/Call node rather than
    /// the operand itself — write-back must resolve the actual operand
    /// slot through the winning overload's signature instead of wrapping
    /// the locator (spec Design Notes §9, operator RefExpr-vs-Call-parent
    /// open question; decision recorded in `DESIGN.md`).
    Conversion { from: Interned<Type>, to: Interned<Type>, explicit: bool, operand_site: bool },
    /// A weak constraint: binds `var` to `default` only if nothing else
    /// pins `var` by the time hard constraints reach a fixpoint.
    Defaultable { var: Interned<Type>, default: Interned<Type> },
    ExpressibleByIntLiteral(Interned<Type>),
    ExpressibleByFloatLiteral(Interned<Type>),
    ExpressibleByStringLiteral(Interned<Type>),
    CheckedCast { from: Interned<Type>, to: Interned<Type> },
    StructMember { base: Interned<Type>, member: EcoString, result: Interned<Type> },
    /// Per-field unification is deferred until this constraint fires,
    /// because `result`'s struct type may itself still be unresolved at
    /// emission time (spec §4.3 table: "per-field unification happens when
    /// that constraint fires").
    StructInitialiser { result: Interned<Type>, node: ExprIdx },
    /// Models overload resolution for `UnaryOp`/`BinaryOp` operators and
    /// for calls through an overloaded `RefExpr` callee. `callee_expr` is
    /// the `RefExpr` whose `target` gets set once an alternative wins.
    Disjunction { callee_expr: ExprIdx, result: Interned<Type>, alternatives: Vec<OverloadAlternative> },
}
