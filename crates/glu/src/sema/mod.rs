//! Sema: the three-phase pipeline from spec §4.3, wired together.
//!
//! `phase 1` is [`scope_builder::build`], `phase 2` is [`emit::emit`], and
//! `phase 3` (this module's [`solve`]) combines the pure type-level solver
//! ([`solver`]) with the AST-aware parts that need struct field tables and
//! overload candidate signatures — those stay here rather than in `solver`
//! so that module stays usable without an `ast::Module` in scope (spec §4.2:
//! type-system operations are "pure").
//!
//! [`checks`] holds the supplemental validation passes from `original_source`
//! that spec.md names in §7/§8 but the original implements as separate
//! walkers (`SPEC_FULL.md` "Supplemental features"). [`writeback`] applies a
//! solved [`solver::State`] back onto the AST.

pub mod checks;
pub mod constraint;
pub mod emit;
pub mod scope_builder;
pub mod solver;
pub mod writeback;

use ecow::EcoString;

use crate::ast::{DeclKind, ExprIdx, Module};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::ids::DeclId;
use crate::intern::Interned;
use crate::sema::constraint::{Constraint, ConstraintKind, Locator, OverloadAlternative};
use crate::sema::solver::{Failure, FailureReason, State};
use crate::types::Type;

/// The end-to-end result of running Sema over one module (spec §6 "Output
/// from the core", item 1): either every constraint solved uniquely and the
/// AST/diagnostics were updated in place, or Sema bailed with diagnostics
/// already emitted into `sink` and GIL generation must be skipped (spec §7
/// "Propagation policy").
pub struct SemaResult {
    pub succeeded: bool,
}

/// Runs phases 1–3 and write-back over `module`, emitting diagnostics into
/// `sink`. `is_root_module` gates the entry-point check, which only makes
/// sense for the module that supplies the program's `main`.
pub fn analyze(module: &mut Module, sink: &mut DiagnosticSink, is_root_module: bool) -> SemaResult {
    checks::enum_values(module, sink);
    checks::duplicate_decls(module, sink);
    checks::attribute_targets(module, sink);

    let scope_info = scope_builder::build(module);
    let constraints = emit::emit(module, &scope_info, sink);

    match solve(module, &constraints) {
        SolveOutcome::Unique(state) => {
            writeback::apply(module, &state, sink);
            checks::immutable_assignment(module, sink);
            checks::unreachable_code(module, sink);
            checks::unreferenced_vars(module, sink);
            checks::copy_drop_overloads(module, sink);
            checks::char_literal_length(module, sink);
            if is_root_module {
                checks::entry_point(module, sink);
            }
        }
        SolveOutcome::NoSolution(failures) => {
            for failure in failures {
                emit_failure_diagnostic(module, sink, &failure);
            }
        }
        SolveOutcome::Ambiguous(sites) => {
            for (callee_expr, candidates) in sites {
                emit_ambiguity_diagnostic(module, sink, callee_expr, &candidates);
            }
        }
    }

    SemaResult { succeeded: !sink.has_errors() }
}

enum SolveOutcome {
    Unique(State),
    NoSolution(Vec<Failure>),
    /// One entry per `RefExpr` whose winning overload could not be narrowed
    /// to exactly one candidate (spec §4.3 "Result disposition: Multiple
    /// solutions").
    Ambiguous(Vec<(ExprIdx, Vec<DeclId>)>),
}

/// Phase 3 (spec §4.3). Partitions constraints into color classes (connected
/// components over shared type variables), solves each independently, and
/// merges. A module-wide failure in any class is reported as a whole; this
/// crate does not attempt to recover partial per-class solutions when
/// another class fails, since GIL-gen is skipped on any error regardless
/// (spec §7).
fn solve(module: &Module, constraints: &[Constraint]) -> SolveOutcome {
    let classes = color_classes(constraints);
    let mut merged = State::default();
    let mut failures = Vec::new();
    let mut ambiguous = Vec::new();

    for class in classes {
        let refs: Vec<&Constraint> = class.iter().map(|&i| &constraints[i]).collect();
        match solve_class(module, &refs) {
            ClassOutcome::Solved(state) => merged = merge_states(merged, state),
            ClassOutcome::Failed(f) => failures.push(f),
            ClassOutcome::Ambiguous(sites) => ambiguous.extend(sites),
        }
    }

    if !ambiguous.is_empty() {
        SolveOutcome::Ambiguous(ambiguous)
    } else if !failures.is_empty() {
        SolveOutcome::NoSolution(failures)
    } else {
        SolveOutcome::Unique(merged)
    }
}

fn merge_states(mut a: State, b: State) -> State {
    for (k, v) in b.subst {
        a.subst.insert(k, v);
    }
    for (k, v) in b.overloads {
        a.overloads.insert(k, v);
    }
    for (k, v) in b.casts {
        a.casts.insert(k, v);
    }
    a
}

/// Union-find over type-variable ids mentioned by each constraint; returns
/// groups of constraint indices whose variables never cross a group
/// boundary (spec §4.3 "Solver loop": "constraints are partitioned into
/// color classes (connected components of type-variable sharing) and
/// solved independently"). A constraint mentioning no type variable at all
/// gets its own singleton class.
fn color_classes(constraints: &[Constraint]) -> Vec<Vec<usize>> {
    let mut parent: Vec<usize> = (0..constraints.len()).collect();
    fn find(parent: &mut [usize], x: usize) -> usize {
        if parent[x] != x {
            parent[x] = find(parent, parent[x]);
        }
        parent[x]
    }
    fn union(parent: &mut [usize], a: usize, b: usize) {
        let (ra, rb) = (find(parent, a), find(parent, b));
        if ra != rb {
            parent[ra] = rb;
        }
    }

    let mut owner: rustc_hash::FxHashMap<u32, usize> = rustc_hash::FxHashMap::default();
    for (i, c) in constraints.iter().enumerate() {
        for var in c.type_variables() {
            match owner.get(&var) {
                Some(&j) => union(&mut parent, i, j),
                None => {
                    owner.insert(var, i);
                }
            }
        }
    }

    let mut groups: rustc_hash::FxHashMap<usize, Vec<usize>> = rustc_hash::FxHashMap::default();
    for i in 0..constraints.len() {
        let root = find(&mut parent, i);
        groups.entry(root).or_default().push(i);
    }
    groups.into_values().collect()
}

enum ClassOutcome {
    Solved(State),
    Failed(Failure),
    Ambiguous(Vec<(ExprIdx, Vec<DeclId>)>),
}

/// Solves one color class: hard constraints to a fixpoint, then disjunctions
/// (each alternative validated by `is_valid_conversion` per argument
/// position, spec §4.3 Disjunction row), then defaults, then a final
/// re-validation pass.
fn solve_class(module: &Module, constraints: &[&Constraint]) -> ClassOutcome {
    let interner = &module.types;
    let mut state = State::default();

    if let Err(f) = solver::fixpoint(interner, constraints, &mut state) {
        return ClassOutcome::Failed(f);
    }
    if let Err(f) = apply_struct_members(module, constraints, &mut state) {
        return ClassOutcome::Failed(f);
    }
    if let Err(f) = apply_struct_initialisers(module, constraints, &mut state) {
        return ClassOutcome::Failed(f);
    }

    let disjunctions: Vec<&Constraint> =
        constraints.iter().filter(|c| matches!(c.kind, ConstraintKind::Disjunction { .. })).copied().collect();

    match resolve_disjunctions(module, constraints, &disjunctions, state) {
        Ok(state) => {
            let mut state = state;
            solver::apply_defaults(interner, constraints, &mut state);
            if let Err(f) = solver::fixpoint(interner, constraints, &mut state) {
                return ClassOutcome::Failed(f);
            }
            if let Err(f) = apply_struct_members(module, constraints, &mut state) {
                return ClassOutcome::Failed(f);
            }
            if let Err(f) = apply_struct_initialisers(module, constraints, &mut state) {
                return ClassOutcome::Failed(f);
            }
            ClassOutcome::Solved(state)
        }
        Err(DisjunctionFailure::NoViable(f)) => ClassOutcome::Failed(f),
        Err(DisjunctionFailure::Ambiguous(sites)) => ClassOutcome::Ambiguous(sites),
    }
}

/// Resolves `StructMember` constraints against the module's actual struct
/// declarations; kept out of `solver::apply_simple` because it needs
/// `ast::Module` access (spec §4.2's type operations stay pure, this is a
/// Sema-level concern).
fn apply_struct_members(module: &Module, constraints: &[&Constraint], state: &mut State) -> Result<(), Failure> {
    let interner = &module.types;
    loop {
        let mut changed = false;
        for c in constraints {
            let ConstraintKind::StructMember { base, member, result } = &c.kind else { continue };
            let sbase = state.substitute(interner, base);
            let struct_decl = match &*sbase {
                Type::TypeVariable(_) => continue,
                Type::Struct(decl) => Some(*decl),
                Type::Pointer(inner) => match &**inner {
                    Type::Struct(decl) => Some(*decl),
                    _ => None,
                },
                _ => None,
            };
            let Some(decl) = struct_decl else {
                return Err(Failure {
                    locator: c.locator,
                    reason: FailureReason::MemberNotFound { base: sbase, member: member.clone() },
                });
            };
            let field_ty = field_type(module, decl, member);
            let Some(field_ty) = field_ty else {
                return Err(Failure {
                    locator: c.locator,
                    reason: FailureReason::MemberNotFound { base: sbase, member: member.clone() },
                });
            };
            let sresult = state.substitute(interner, result);
            if sresult != field_ty {
                if !solver::unify(interner, &sresult, &field_ty, state) {
                    return Err(Failure {
                        locator: c.locator,
                        reason: FailureReason::TypeMismatch { expected: field_ty, found: sresult },
                    });
                }
                changed = true;
            }
        }
        if !changed {
            return Ok(());
        }
    }
}

fn field_type(module: &Module, struct_decl: DeclId, member: &EcoString) -> Option<Interned<Type>> {
    let idx = module.decl_idx_from_id(struct_decl);
    let DeclKind::Struct(s) = &module.decl(idx).kind else { return None };
    for &field_idx in &s.fields {
        if let DeclKind::Field(f) = &module.decl(field_idx).kind {
            if &f.name == member {
                return Some(f.ty.clone());
            }
        }
    }
    None
}

/// Resolves `StructInitialiser` constraints (spec §3 "StructInitializerExpr"
/// row: "Count ≤ struct field count; ≥ required-field count"; spec §4.3
/// "per-field unification happens when that constraint fires"). Kept out of
/// `solver::apply_simple` for the same reason as `apply_struct_members`: it
/// needs `ast::Module` access to the struct's field declarations.
fn apply_struct_initialisers(module: &Module, constraints: &[&Constraint], state: &mut State) -> Result<(), Failure> {
    let interner = &module.types;
    loop {
        let mut changed = false;
        for c in constraints {
            let ConstraintKind::StructInitialiser { result, node } = &c.kind else { continue };
            let sresult = state.substitute(interner, result);
            let struct_decl = match &*sresult {
                Type::TypeVariable(_) => continue,
                Type::Struct(decl) => *decl,
                _ => {
                    return Err(Failure {
                        locator: c.locator,
                        reason: FailureReason::MemberNotFound { base: sresult, member: "<struct initializer>".into() },
                    });
                }
            };

            let idx = module.decl_idx_from_id(struct_decl);
            let DeclKind::Struct(s) = &module.decl(idx).kind else {
                unreachable!("StructInitialiser::result resolved to a Struct type, whose decl must be a StructDecl")
            };

            let crate::ast::ExprKind::StructInitializer(init) = &module.expr(*node).kind else {
                unreachable!("StructInitialiser::node always names a StructInitializerExpr")
            };

            let required = s
                .fields
                .iter()
                .filter(|&&f| matches!(&module.decl(f).kind, DeclKind::Field(fd) if fd.default.is_none()))
                .count();

            if init.fields.len() > s.fields.len() || init.fields.len() < required {
                return Err(Failure {
                    locator: c.locator,
                    reason: FailureReason::StructFieldCount {
                        struct_name: s.name.clone(),
                        provided: init.fields.len(),
                        required,
                        total: s.fields.len(),
                    },
                });
            }

            for (&field_idx, &field_expr) in s.fields.iter().zip(init.fields.iter()) {
                let DeclKind::Field(f) = &module.decl(field_idx).kind else { unreachable!() };
                let field_ty = f.ty.clone();
                let sfield = state.substitute(interner, &module.expr(field_expr).ty);
                if sfield != field_ty {
                    if !solver::unify(interner, &sfield, &field_ty, state) {
                        return Err(Failure {
                            locator: Locator { location: module.expr(field_expr).location, expr: field_expr },
                            reason: FailureReason::TypeMismatch { expected: field_ty, found: sfield },
                        });
                    }
                    changed = true;
                }
            }
        }
        if !changed {
            return Ok(());
        }
    }
}

enum DisjunctionFailure {
    NoViable(Failure),
    Ambiguous(Vec<(ExprIdx, Vec<DeclId>)>),
}

/// Depth-first search over every disjunction's alternatives (spec §4.3
/// "the solver's exploration of disjunction branches is deterministic:
/// alternatives are explored in the order they appear"). Forking is a cheap
/// `State::clone` thanks to `im`'s persistent maps.
fn resolve_disjunctions(
    module: &Module,
    all_constraints: &[&Constraint],
    disjunctions: &[&Constraint],
    state: State,
) -> Result<State, DisjunctionFailure> {
    let Some((first, rest)) = disjunctions.split_first() else {
        return Ok(state);
    };
    let ConstraintKind::Disjunction { callee_expr, result, alternatives } = &first.kind else {
        unreachable!("disjunctions slice only contains Disjunction constraints")
    };

    let interner = &module.types;
    let mut viable_states = Vec::new();
    let mut viable_candidates = Vec::new();

    for alt in alternatives {
        let mut candidate_state = state.clone();
        if !try_alternative(interner, alt, &mut candidate_state) {
            continue;
        }
        candidate_state.overloads.insert(*callee_expr, alt.candidate);
        match resolve_disjunctions(module, all_constraints, rest, candidate_state) {
            Ok(final_state) => {
                viable_states.push(final_state);
                viable_candidates.push(alt.candidate);
            }
            Err(DisjunctionFailure::Ambiguous(sites)) => return Err(DisjunctionFailure::Ambiguous(sites)),
            Err(DisjunctionFailure::NoViable(_)) => {}
        }
    }

    match viable_states.len() {
        0 => Err(DisjunctionFailure::NoViable(Failure {
            locator: first.locator,
            reason: FailureReason::NoViableOverload,
        })),
        1 => Ok(viable_states.into_iter().next().expect("checked len == 1")),
        _ => {
            let _ = result;
            Err(DisjunctionFailure::Ambiguous(vec![(*callee_expr, viable_candidates)]))
        }
    }
}

/// Checks one overload alternative's per-position conversions and binds the
/// result type, without committing to it as *the* answer yet (the caller
/// recurses into the remaining disjunctions first).
fn try_alternative(interner: &crate::types::TypeInterner, alt: &OverloadAlternative, state: &mut State) -> bool {
    if alt.argument_types.len() != alt.param_types.len() {
        return false;
    }
    for (arg, param) in alt.argument_types.iter().zip(alt.param_types.iter()) {
        let sarg = state.substitute(interner, arg);
        let sparam = state.substitute(interner, param);
        if sarg.is_type_variable() {
            if !solver::unify(interner, &sarg, &sparam, state) {
                return false;
            }
        } else if !solver::is_valid_conversion(&sarg, &sparam, false) {
            return false;
        }
    }
    true
}

fn emit_failure_diagnostic(module: &Module, sink: &mut DiagnosticSink, failure: &Failure) {
    let location = failure.locator.location;
    let diag = match &failure.reason {
        FailureReason::TypeMismatch { expected, found } => Diagnostic::new(
            location,
            DiagnosticKind::TypeMismatch { expected: expected.to_string(), found: found.to_string() },
            format!("expected `{expected}`, found `{found}`"),
        ),
        FailureReason::InvalidConversion { from, to, explicit } => Diagnostic::new(
            location,
            DiagnosticKind::InvalidConversion { from: from.to_string(), to: to.to_string(), explicit: *explicit },
            format!("cannot convert `{from}` to `{to}`"),
        ),
        FailureReason::InexpressibleLiteral { target } => Diagnostic::new(
            location,
            DiagnosticKind::InvalidLiteralForTarget { literal: literal_text(module, failure), target: target.to_string() },
            format!("literal cannot express type `{target}`"),
        ),
        FailureReason::NoViableOverload => Diagnostic::new(
            location,
            DiagnosticKind::UndeclaredName { name: String::new() },
            "no viable overload for this call".to_string(),
        ),
        FailureReason::MemberNotFound { base, member } => Diagnostic::new(
            location,
            DiagnosticKind::MemberNotFound { struct_name: base.to_string(), member: member.to_string() },
            format!("no member `{member}` on type `{base}`"),
        ),
        FailureReason::StructFieldCount { struct_name, provided, required, total } => Diagnostic::new(
            location,
            DiagnosticKind::StructFieldCount {
                struct_name: struct_name.to_string(),
                provided: *provided,
                required: *required,
                total: *total,
            },
            format!(
                "struct `{struct_name}` initializer has {provided} field(s), expected between {required} and {total}"
            ),
        ),
    };
    sink.emit(diag);
}

fn literal_text(module: &Module, failure: &Failure) -> String {
    match &module.expr(failure.locator.expr).kind {
        crate::ast::ExprKind::Literal(l) => l.describe().to_string(),
        _ => String::new(),
    }
}

fn emit_ambiguity_diagnostic(module: &Module, sink: &mut DiagnosticSink, callee_expr: ExprIdx, candidates: &[DeclId]) {
    let location = module.expr(callee_expr).location;
    let name = match &module.expr(callee_expr).kind {
        crate::ast::ExprKind::Ref(r) => r.path.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("."),
        _ => String::new(),
    };
    let mut diag = Diagnostic::new(
        location,
        DiagnosticKind::AmbiguousOverload {
            name: name.clone(),
            candidates: candidates.iter().map(|c| format!("{c:?}")).collect(),
        },
        format!("ambiguous call to `{name}`"),
    );
    for &candidate in candidates {
        let idx = module.decl_idx_from_id(candidate);
        if let DeclKind::Function(f) = &module.decl(idx).kind {
            let params: Vec<_> = f.params.iter().map(|&p| format!("{}", decl_param_type(module, p))).collect();
            diag = diag.with_note(crate::diagnostics::Note::new(
                module.decl(idx).location,
                format!("candidate: {name}({}) -> {}", params.join(", "), f.return_type),
            ));
        }
    }
    sink.emit(diag);
}

fn decl_param_type(module: &Module, param: crate::ast::DeclIdx) -> Interned<Type> {
    match &module.decl(param).kind {
        DeclKind::Param(p) => p.ty.clone(),
        _ => module.types.intern(Type::Void),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        AssignOp, AssignStmt, CompoundStmt, ExprKind, FieldDecl, FunctionDecl, LiteralExpr, RefExpr, StmtKind,
        StructDecl, StructInitializerExpr, VarLetDecl,
    };
    use crate::source::SourceLocation;
    use crate::types::IntWidth;
    use num_bigint::BigInt;

    fn int_ty(module: &Module, width: IntWidth) -> Interned<Type> {
        module.types.intern(Type::Int { signed: true, width })
    }

    /// Builds a two-field struct `S { a: Int32, b: Int32 = 0 }` (`b` has a
    /// default, so it is the only optional field) and returns its `DeclId`.
    fn two_field_struct(module: &mut Module) -> DeclId {
        let i32_ty = int_ty(module, IntWidth::I32);
        let default_expr = module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::Literal(LiteralExpr::Int(BigInt::from(0))),
            i32_ty.clone(),
        );
        let a = module.alloc_decl(
            SourceLocation::DETACHED,
            None,
            DeclKind::Field(FieldDecl { name: "a".into(), ty: i32_ty.clone(), default: None, case_value: None }),
        );
        let b = module.alloc_decl(
            SourceLocation::DETACHED,
            None,
            DeclKind::Field(FieldDecl { name: "b".into(), ty: i32_ty, default: Some(default_expr), case_value: None }),
        );
        let s = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Struct(StructDecl { name: "S".into(), fields: vec![a, b] }),
        );
        module.decl_id(s)
    }

    fn struct_initializer(module: &mut Module, struct_id: DeclId, fields: Vec<ExprIdx>) -> ExprIdx {
        let struct_ty = module.types.intern(Type::Struct(struct_id));
        module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::StructInitializer(StructInitializerExpr { struct_type: Some(struct_ty.clone()), fields }),
            struct_ty,
        )
    }

    /// Scenario 1 (spec §8): `let x = 42;` defaults to `Int32` with no
    /// inserted cast.
    #[test]
    fn scenario_integer_defaulting() {
        let mut module = Module::new("test");
        let lit = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(42))));
        let var_ty = module.fresh_type_variable();
        let let_decl = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "x".into(), declared_type: None, resolved_type: var_ty, initializer: Some(lit), mutable: false }),
        );

        let mut sink = DiagnosticSink::new();
        let result = analyze(&mut module, &mut sink, false);
        assert!(result.succeeded, "{:?}", sink.diagnostics());

        let i32_ty = int_ty(&module, IntWidth::I32);
        assert_eq!(module.expr(lit).ty, i32_ty);
        let DeclKind::Let(v) = &module.decl(let_decl).kind else { unreachable!() };
        assert_eq!(v.resolved_type, i32_ty);
        assert!(matches!(module.expr(lit).kind, ExprKind::Literal(_)), "no cast should wrap the literal");
    }

    /// Scenario 3 (spec §8), exercised end-to-end through `analyze` rather
    /// than by pre-seeding `state.casts`/hand-building a `CastExpr`: `let y:
    /// Int64 = 1;` must still default the literal to `Int32` before
    /// widening it, insert an implicit `CastExpr` around the literal, and
    /// leave `y` at its declared `Int64`.
    #[test]
    fn scenario_implicit_widening_through_solver() {
        let mut module = Module::new("test");
        let i64_ty = int_ty(&module, IntWidth::I64);
        let lit = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))));
        let let_decl = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl {
                name: "y".into(),
                declared_type: Some(i64_ty.clone()),
                resolved_type: i64_ty.clone(),
                initializer: Some(lit),
                mutable: false,
            }),
        );

        let mut sink = DiagnosticSink::new();
        let result = analyze(&mut module, &mut sink, false);
        assert!(result.succeeded, "{:?}", sink.diagnostics());

        let DeclKind::Let(v) = &module.decl(let_decl).kind else { unreachable!() };
        assert_eq!(v.resolved_type, i64_ty);
        let new_init = v.initializer.expect("initializer slot still present");
        match &module.expr(new_init).kind {
            ExprKind::Cast(c) => {
                assert_eq!(c.destination_type, i64_ty);
                assert!(!c.explicit, "an inserted widening cast must be implicit");
                assert_eq!(module.expr(c.sub_expr).ty, int_ty(&module, IntWidth::I32), "the literal itself still defaults to Int32");
            }
            other => panic!("expected the literal to be wrapped in an implicit widening cast, found {other:?}"),
        }
    }

    /// spec §3 "StructInitializerExpr" invariant: a field expression whose
    /// type disagrees with the corresponding `FieldDecl.ty` is rejected.
    #[test]
    fn struct_initializer_rejects_field_type_mismatch() {
        let mut module = Module::new("test");
        let struct_id = two_field_struct(&mut module);
        let a = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))));
        let b = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Bool(true)));
        let init = struct_initializer(&mut module, struct_id, vec![a, b]);
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "s".into(), declared_type: None, resolved_type: module.types.intern(Type::Struct(struct_id)), initializer: Some(init), mutable: false }),
        );

        let mut sink = DiagnosticSink::new();
        let result = analyze(&mut module, &mut sink, false);
        assert!(!result.succeeded);
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::TypeMismatch { .. })), "{:?}", sink.diagnostics());
    }

    /// spec §3 "StructInitializerExpr" invariant: "Count ≤ struct field
    /// count"; providing more field expressions than the struct declares is
    /// rejected.
    #[test]
    fn struct_initializer_rejects_too_many_fields() {
        let mut module = Module::new("test");
        let struct_id = two_field_struct(&mut module);
        let a = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))));
        let b = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(2))));
        let c = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(3))));
        let init = struct_initializer(&mut module, struct_id, vec![a, b, c]);
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "s".into(), declared_type: None, resolved_type: module.types.intern(Type::Struct(struct_id)), initializer: Some(init), mutable: false }),
        );

        let mut sink = DiagnosticSink::new();
        let result = analyze(&mut module, &mut sink, false);
        assert!(!result.succeeded);
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::StructFieldCount { provided: 3, required: 1, total: 2, .. })), "{:?}", sink.diagnostics());
    }

    /// spec §3 "StructInitializerExpr" invariant: "≥ required-field count";
    /// an initializer omitting the one field with no default is rejected.
    #[test]
    fn struct_initializer_rejects_too_few_fields() {
        let mut module = Module::new("test");
        let struct_id = two_field_struct(&mut module);
        let init = struct_initializer(&mut module, struct_id, Vec::new());
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "s".into(), declared_type: None, resolved_type: module.types.intern(Type::Struct(struct_id)), initializer: Some(init), mutable: false }),
        );

        let mut sink = DiagnosticSink::new();
        let result = analyze(&mut module, &mut sink, false);
        assert!(!result.succeeded);
        assert!(sink.diagnostics().iter().any(|d| matches!(d.kind, DiagnosticKind::StructFieldCount { provided: 0, required: 1, total: 2, .. })), "{:?}", sink.diagnostics());
    }

    /// spec §8 boundary: "An empty StructInitializerExpr is valid iff the
    /// struct has no required fields" — a struct whose fields are all
    /// defaulted accepts `S {}`.
    #[test]
    fn empty_struct_initializer_valid_with_no_required_fields() {
        let mut module = Module::new("test");
        let i32_ty = int_ty(&module, IntWidth::I32);
        let default_expr = module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::Literal(LiteralExpr::Int(BigInt::from(0))),
            i32_ty.clone(),
        );
        let a = module.alloc_decl(
            SourceLocation::DETACHED,
            None,
            DeclKind::Field(FieldDecl { name: "a".into(), ty: i32_ty, default: Some(default_expr), case_value: None }),
        );
        let s = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Struct(StructDecl { name: "AllDefaulted".into(), fields: vec![a] }),
        );
        let struct_id = module.decl_id(s);
        let init = struct_initializer(&mut module, struct_id, Vec::new());
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "s".into(), declared_type: None, resolved_type: module.types.intern(Type::Struct(struct_id)), initializer: Some(init), mutable: false }),
        );

        let mut sink = DiagnosticSink::new();
        let result = analyze(&mut module, &mut sink, false);
        assert!(result.succeeded, "{:?}", sink.diagnostics());
    }

    /// Scenario 5 (spec §8): two identically-typed overloads of the same
    /// zero-argument function both remain viable after unification, so the
    /// class-level solve must report them as ambiguous rather than picking
    /// one arbitrarily.
    #[test]
    fn scenario_ambiguous_overload() {
        use crate::ast::CallExpr;

        let mut module = Module::new("test");
        let ity = int_ty(&module, IntWidth::I32);
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: ity.clone(), body: None, is_variadic: false }),
        );
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: ity.clone(), body: None, is_variadic: false }),
        );
        let callee = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Ref(RefExpr::unqualified("f")));
        let call = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Call(CallExpr { callee, args: Vec::new(), template_args: None }));
        let stmt = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Expression(call));
        let body = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(CompoundStmt { stmts: vec![stmt] }));
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "g".into(), params: Vec::new(), return_type: ity, body: Some(body), is_variadic: false }),
        );

        let scope_info = scope_builder::build(&module);
        let mut sink = DiagnosticSink::new();
        let constraints = emit::emit(&mut module, &scope_info, &mut sink);
        assert!(!sink.has_errors());

        match solve(&module, &constraints) {
            SolveOutcome::Ambiguous(sites) => {
                assert_eq!(sites.len(), 1);
                assert_eq!(sites[0].1.len(), 2, "both identical overloads must survive as candidates");
            }
            SolveOutcome::Unique(_) => panic!("expected ambiguity, but the class solved uniquely"),
            SolveOutcome::NoSolution(failures) => panic!("expected ambiguity, got no-solution failures instead: {}", failures.len()),
        }
    }

    /// Scenario 4 (spec §8): assigning to a `let` is reported and GIL must
    /// not be attempted (checked by the caller via `succeeded`).
    #[test]
    fn scenario_immutable_assignment() {
        let mut module = Module::new("test");
        let int_ty_v = int_ty(&module, IntWidth::I32);
        let lit1 = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))), int_ty_v.clone());
        let z = module.alloc_decl(
            SourceLocation::DETACHED,
            None,
            DeclKind::Let(VarLetDecl { name: "z".into(), declared_type: None, resolved_type: int_ty_v.clone(), initializer: Some(lit1), mutable: false }),
        );
        let decl_stmt = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Decl(z));

        let lhs = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Ref(RefExpr { path: vec!["z".into()], target: Some(DeclId::from(z)), candidates: vec![DeclId::from(z)] }), int_ty_v.clone());
        let rhs = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(2))), int_ty_v.clone());
        let assign = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Assign(AssignStmt { lhs, op: AssignOp::Assign, rhs }));

        let body = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(CompoundStmt { stmts: vec![decl_stmt, assign] }));
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: module.types.intern(Type::Void), body: Some(body), is_variadic: false }),
        );

        let mut sink = DiagnosticSink::new();
        checks::immutable_assignment(&mut module, &mut sink);
        assert!(sink.has_errors());
        assert!(matches!(sink.diagnostics()[0].kind, DiagnosticKind::ImmutableAssignment { .. }));
    }
}
