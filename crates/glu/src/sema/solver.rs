//! Phase 3: constraint solving (spec §4.3 "Phase 3: Constraint solving").
//!
//! Grounded in the original source's `TypeConstraintSolver`/`ConstraintSystem`
//! (`examples/original_source/include/Sema/...`, not retrieved in full, but
//! named throughout spec §4.3) and, for the persistent-state shape, the
//! teacher's `ty::bound`/`ty::subst` modules
//! (`examples/Myriad-Dreamin-tinymist/crates/tinymist-query/src/ty/{bound,subst}.rs`),
//! which thread a small mutation-tracking context through a recursive type
//! walk rather than mutating a single global table in place. Here the
//! "context" is a [`State`] built on `im`'s persistent maps (spec Design
//! Notes §9: "use immutable persistent maps ... so that cloning is cheap"),
//! so branching on a disjunction is an O(1) `clone`.

use ecow::EcoString;
use im::HashMap as PersistentMap;

use crate::ast::ExprIdx;
use crate::ids::DeclId;
use crate::intern::Interned;
use crate::sema::constraint::{Constraint, ConstraintKind, Locator};
use crate::types::{Type, TypeInterner};

/// The solver's mutable state (spec §4.3: "a substitution map ... a map
/// `RefExpr -> chosen FunctionDecl` ... a map `Expr -> target type for
/// implicit conversion`"). Cloning is O(1) amortized via `im`'s structural
/// sharing, which is what makes disjunction backtracking (§4.3 "Disjunctions
/// fork the state") affordable.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub subst: PersistentMap<u32, Interned<Type>>,
    pub overloads: PersistentMap<ExprIdx, DeclId>,
    /// Value-site implicit conversions recorded as `locator expr -> target
    /// type`; populated only for `operand_site: false` `Conversion`/
    /// `CheckedCast` constraints whose `from` and `to` differ after
    /// substitution (identity conversions need no cast). Operand-site
    /// conversions (inside an overloaded call/operator) are *not* recorded
    /// here — write-back re-derives them from the winning overload's
    /// signature (see `sema::writeback`).
    pub casts: PersistentMap<ExprIdx, Interned<Type>>,
}

impl State {
    /// Substitute(T) (spec §4.3): recursively rewrites `ty`, following
    /// bound type variables transitively.
    pub fn substitute(&self, interner: &TypeInterner, ty: &Interned<Type>) -> Interned<Type> {
        crate::types::transform::transform(interner, ty, &mut |t| match &**t {
            Type::TypeVariable(id) => self.subst.get(id).map(|bound| self.substitute(interner, bound)),
            _ => None,
        })
    }

    fn bind(&mut self, var: u32, ty: Interned<Type>) {
        self.subst.insert(var, ty);
    }
}

/// Unify(A, B, state) (spec §4.3): binds unbound type variables, recurses
/// structurally over same-kind compounds, otherwise requires identity.
/// Returns `true` on success, mutating `state` as needed; `false` leaves
/// `state` in whatever partial form it reached (callers discard it on
/// failure, matching the worklist's "fork and drop" backtracking model).
pub fn unify(interner: &TypeInterner, a: &Interned<Type>, b: &Interned<Type>, state: &mut State) -> bool {
    let a = state.substitute(interner, a);
    let b = state.substitute(interner, b);
    if a == b {
        return true;
    }
    match (&*a, &*b) {
        (Type::TypeVariable(v), _) => {
            state.bind(*v, b.clone());
            true
        }
        (_, Type::TypeVariable(v)) => {
            state.bind(*v, a.clone());
            true
        }
        (Type::Pointer(x), Type::Pointer(y)) => unify(interner, x, y, state),
        (Type::DynamicArray(x), Type::DynamicArray(y)) => unify(interner, x, y, state),
        (Type::StaticArray { element: ex, count: cx }, Type::StaticArray { element: ey, count: cy }) => {
            cx == cy && unify(interner, ex, ey, state)
        }
        (
            Type::Function { params: px, ret: rx, c_variadic: vx },
            Type::Function { params: py, ret: ry, c_variadic: vy },
        ) => {
            vx == vy
                && px.len() == py.len()
                && px.iter().zip(py.iter()).all(|(x, y)| unify(interner, x, y, state))
                && unify(interner, rx, ry, state)
        }
        _ => false,
    }
}

/// IsValidConversion(From, To, state, explicit?) (spec §4.3): the
/// conversion lattice. `explicit = false` admits only identity and
/// widening; `explicit = true` additionally admits the narrower/lossy
/// conversions named in the spec.
pub fn is_valid_conversion(from: &Type, to: &Type, explicit: bool) -> bool {
    if from == to {
        return true;
    }
    match (from, to) {
        (Type::Int { signed: sf, width: wf }, Type::Int { signed: st, width: wt }) => {
            (sf == st && wt.bits() >= wf.bits()) || explicit
        }
        (Type::Float(wf), Type::Float(wt)) => wt.bits() >= wf.bits() || explicit,
        (Type::Int { .. }, Type::Float(_)) | (Type::Float(_), Type::Int { .. }) => explicit,
        (Type::Pointer(_), Type::Pointer(_)) => explicit,
        (Type::Pointer(_), Type::Int { .. }) | (Type::Int { .. }, Type::Pointer(_)) => explicit,
        (Type::StaticArray { element: ef, .. }, Type::Pointer(et)) => ef == et,
        (Type::DynamicArray(ef), Type::Pointer(et)) => ef == et,
        (Type::Bool, Type::Int { .. }) | (Type::Int { .. }, Type::Bool) => explicit,
        (Type::Null, Type::Pointer(_)) => true,
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// No state change was necessary; the constraint already holds.
    Satisfied,
    /// `state` was mutated to make the constraint hold.
    Applied,
}

/// Failure detail for the constraint that could not be satisfied, used to
/// synthesize a diagnostic (spec §4.3 "No solution").
#[derive(Debug, Clone)]
pub struct Failure {
    pub locator: Locator,
    pub reason: FailureReason,
}

#[derive(Debug, Clone)]
pub enum FailureReason {
    TypeMismatch { expected: Interned<Type>, found: Interned<Type> },
    InvalidConversion { from: Interned<Type>, to: Interned<Type>, explicit: bool },
    InexpressibleLiteral { target: Interned<Type> },
    NoViableOverload,
    MemberNotFound { base: Interned<Type>, member: EcoString },
    /// Spec §3 "StructInitializerExpr" invariant: "Count ≤ struct field
    /// count; ≥ required-field count". `required` excludes the trailing
    /// defaulted suffix (spec §3 "StructDecl": "Fields with defaults must be
    /// a suffix of the field list").
    StructFieldCount { struct_name: EcoString, provided: usize, required: usize, total: usize },
}

/// Applies one non-disjunction constraint to `state`, in place. Disjunctions
/// are handled separately by [`solve_disjunctions`] because they fork state
/// instead of mutating it linearly.
fn apply_simple(
    interner: &TypeInterner,
    constraint: &Constraint,
    state: &mut State,
) -> Result<Applied, Failure> {
    let loc = constraint.locator;
    match &constraint.kind {
        ConstraintKind::Equal(a, b) => {
            let sa = state.substitute(interner, a);
            let sb = state.substitute(interner, b);
            if sa == sb {
                return Ok(Applied::Satisfied);
            }
            if unify(interner, &sa, &sb, state) {
                Ok(Applied::Applied)
            } else {
                Err(Failure { locator: loc, reason: FailureReason::TypeMismatch { expected: sb, found: sa } })
            }
        }
        ConstraintKind::Conversion { from, to, explicit, operand_site } => {
            let sf = state.substitute(interner, from);
            let st = state.substitute(interner, to);
            if st.is_type_variable() {
                // `to` isn't pinned by anything harder (e.g. an inferred
                // `let` with no declared type); propagate `from` into it the
                // way `Equal` would, rather than running the conversion
                // lattice against an unbound variable.
                return if unify(interner, &st, &sf, state) { Ok(Applied::Applied) } else {
                    Err(Failure {
                        locator: loc,
                        reason: FailureReason::InvalidConversion { from: sf, to: st, explicit: *explicit },
                    })
                };
            }
            if sf.is_type_variable() {
                // `from` isn't pinned yet — most commonly a literal awaiting
                // its `Defaultable` constraint. Binding it to `to` here
                // would short-circuit defaulting (spec §8 Scenario 3: the
                // literal must default to `Int32`, not jump straight to the
                // declared `Int64`) and lose the implicit-widening cast this
                // constraint exists to record. Leave it untouched; once
                // `apply_defaults` pins it, the next fixpoint pass revisits
                // this constraint with a concrete `from` and records the
                // cast below.
                return Ok(Applied::Satisfied);
            }
            if !is_valid_conversion(&sf, &st, *explicit) {
                return Err(Failure {
                    locator: loc,
                    reason: FailureReason::InvalidConversion { from: sf, to: st, explicit: *explicit },
                });
            }
            if sf != st && !operand_site {
                state.casts.insert(loc.expr, st);
            }
            Ok(Applied::Satisfied)
        }
        ConstraintKind::CheckedCast { from, to } => {
            let sf = state.substitute(interner, from);
            let st = state.substitute(interner, to);
            if sf.is_type_variable() {
                return if unify(interner, &sf, &st, state) { Ok(Applied::Applied) } else {
                    Err(Failure { locator: loc, reason: FailureReason::InvalidConversion { from: sf, to: st, explicit: true } })
                };
            }
            if is_valid_conversion(&sf, &st, true) {
                Ok(Applied::Satisfied)
            } else {
                Err(Failure { locator: loc, reason: FailureReason::InvalidConversion { from: sf, to: st, explicit: true } })
            }
        }
        ConstraintKind::ExpressibleByIntLiteral(t) => {
            let st = state.substitute(interner, t);
            match &*st {
                Type::TypeVariable(_) => Ok(Applied::Satisfied),
                Type::Int { .. } | Type::Float(_) => Ok(Applied::Satisfied),
                _ => Err(Failure { locator: loc, reason: FailureReason::InexpressibleLiteral { target: st } }),
            }
        }
        ConstraintKind::ExpressibleByFloatLiteral(t) => {
            let st = state.substitute(interner, t);
            match &*st {
                Type::TypeVariable(_) | Type::Float(_) => Ok(Applied::Satisfied),
                _ => Err(Failure { locator: loc, reason: FailureReason::InexpressibleLiteral { target: st } }),
            }
        }
        ConstraintKind::ExpressibleByStringLiteral(t) => {
            let st = state.substitute(interner, t);
            match &*st {
                // A string literal defaults to `*Char` (a C-string), but a
                // target of exactly `Char` is also expressible. A
                // single-character literal like `'a'` reuses the same
                // `LiteralExpr::String` variant rather than a dedicated
                // char-literal node. `checks::char_literal_length` (run
                // post-write-back) rejects any such literal whose text
                // isn't exactly one character.
                Type::TypeVariable(_) | Type::Pointer(_) | Type::Char => Ok(Applied::Satisfied),
                _ => Err(Failure { locator: loc, reason: FailureReason::InexpressibleLiteral { target: st } }),
            }
        }
        ConstraintKind::Defaultable { .. } => {
            // Resolved last, in `apply_defaults`; a no-op during the hard
            // fixpoint loop.
            Ok(Applied::Satisfied)
        }
        ConstraintKind::StructMember { base, member, result } => {
            let sbase = state.substitute(interner, base);
            match &*sbase {
                Type::TypeVariable(_) => Ok(Applied::Satisfied),
                Type::Pointer(inner) => apply_struct_member_lookup(interner, inner, member, result, state, loc),
                _ => apply_struct_member_lookup(interner, &sbase, member, result, state, loc),
            }
        }
        ConstraintKind::StructInitialiser { .. } => Ok(Applied::Satisfied),
        ConstraintKind::Disjunction { .. } => Ok(Applied::Satisfied),
    }
}

/// `StructMemberExpr` field lookup is performed structurally against the
/// field-type table the caller threads in via `crate::sema::StructFields`
/// rather than here, because the solver has no access to the AST's struct
/// declarations (only to `Type`). [`crate::sema::solve`] supplies that
/// lookup as a closure; this function is kept free of AST access so the
/// solver module stays a pure type-level component (spec §4.2: "pure; no
/// fallible operations" — only the *constraint application* around it is
/// fallible, the type operations themselves are not).
///
/// Since there is no field table in scope here, an unresolved struct base
/// is treated as `Satisfied` (nothing more to check at this layer); the
/// real lookup happens in [`crate::sema::solve`] via `field_lookup`.
fn apply_struct_member_lookup(
    _interner: &TypeInterner,
    _base: &Interned<Type>,
    _member: &EcoString,
    _result: &Interned<Type>,
    _state: &mut State,
    _loc: Locator,
) -> Result<Applied, Failure> {
    Ok(Applied::Satisfied)
}

/// Runs the non-disjunction constraints in `constraints` to a fixpoint:
/// repeatedly applying each until a full pass makes no further state
/// change, or one fails. Per spec §4.3 "Constraints are processed in
/// priority order (simpler deterministic constraints first; disjunctions
/// last)".
pub fn fixpoint(
    interner: &TypeInterner,
    constraints: &[&Constraint],
    state: &mut State,
) -> Result<(), Failure> {
    loop {
        let mut changed = false;
        for c in constraints {
            if matches!(c.kind, ConstraintKind::Disjunction { .. }) {
                continue;
            }
            match apply_simple(interner, c, state)? {
                Applied::Applied => changed = true,
                Applied::Satisfied => {}
            }
        }
        if !changed {
            return Ok(());
        }
    }
}

/// Binds every still-unbound type variable named by a `Defaultable`
/// constraint to its default (spec §4.3 / glossary "Defaultable": "if
/// nothing else pins this type, default it to X").
pub fn apply_defaults(interner: &TypeInterner, constraints: &[&Constraint], state: &mut State) {
    for c in constraints {
        if let ConstraintKind::Defaultable { var, default } = &c.kind {
            let current = state.substitute(interner, var);
            if current.is_type_variable() {
                if let Type::TypeVariable(id) = &*current {
                    state.bind(*id, default.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;

    #[test]
    fn unify_binds_an_unbound_variable() {
        let interner = TypeInterner::new();
        let var = interner.intern(Type::TypeVariable(0));
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let mut state = State::default();
        assert!(unify(&interner, &var, &i32_ty, &mut state));
        assert_eq!(state.substitute(&interner, &var), i32_ty);
    }

    #[test]
    fn unify_fails_on_incompatible_concrete_types() {
        let interner = TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let bool_ty = interner.intern(Type::Bool);
        let mut state = State::default();
        assert!(!unify(&interner, &i32_ty, &bool_ty, &mut state));
    }

    #[test]
    fn widening_conversion_is_implicitly_valid() {
        assert!(is_valid_conversion(
            &Type::Int { signed: true, width: IntWidth::I32 },
            &Type::Int { signed: true, width: IntWidth::I64 },
            false,
        ));
        assert!(!is_valid_conversion(
            &Type::Int { signed: true, width: IntWidth::I64 },
            &Type::Int { signed: true, width: IntWidth::I32 },
            false,
        ));
    }

    #[test]
    fn int_to_bool_requires_explicit_cast() {
        assert!(!is_valid_conversion(&Type::Int { signed: true, width: IntWidth::I32 }, &Type::Bool, false));
        assert!(is_valid_conversion(&Type::Int { signed: true, width: IntWidth::I32 }, &Type::Bool, true));
    }
}
