//! Write-back (spec §4.3 "Result disposition: Unique solution"): applies a
//! solved [`solver::State`] onto the AST so that afterwards "every
//! `Expr.type` is concrete... every `RefExpr.target` is non-null... implicit
//! conversion casts are present in the tree" (spec §8 property list).
//!
//! Grounded in the child-replacer contract (`ast::visitor::replace_expr_child`,
//! spec §4.4 item 3): each inserted cast reuses the old expression's already-
//! recorded parent pointer rather than re-deriving it by walking the tree.

use crate::arena::Idx;
use crate::ast::{CastExpr, DeclKind, ExprIdx, ExprKind, Module, NodeRef};
use crate::diagnostics::DiagnosticSink;
use crate::intern::Interned;
use crate::sema::solver::State;
use crate::types::Type;

/// Runs every write-back step over `module`. `sink` is currently unused but
/// kept in the signature to match the other `sema` passes' shape and so a
/// future invariant check here (e.g. residual type variables) has somewhere
/// to report without a signature change.
pub fn apply(module: &mut Module, state: &State, sink: &mut DiagnosticSink) {
    let _ = sink;
    substitute_expr_types(module, state);
    resolve_overload_targets(module, state);
    insert_value_site_casts(module, state);
    insert_operand_site_casts(module);
}

fn all_expr_ids(module: &Module) -> Vec<ExprIdx> {
    (0..module.exprs.len() as u32).map(Idx::from_raw).collect()
}

fn substitute_expr_types(module: &mut Module, state: &State) {
    for id in all_expr_ids(module) {
        let ty = module.expr(id).ty.clone();
        let resolved = state.substitute(&module.types, &ty);
        module.expr_mut(id).ty = resolved;
    }
    for decl in all_decl_ids(module) {
        if let DeclKind::Var(v) | DeclKind::Let(v) | DeclKind::ForBinding(v) = &mut module.decl_mut(decl).kind {
            v.resolved_type = state.substitute(&module.types, &v.resolved_type.clone());
        }
    }
}

fn all_decl_ids(module: &Module) -> Vec<crate::ast::DeclIdx> {
    (0..module.decls.len() as u32).map(Idx::from_raw).collect()
}

/// Sets `RefExpr::target` for every operator/callee `RefExpr` whose
/// disjunction was solved (single-candidate references already had their
/// target set directly during emission).
fn resolve_overload_targets(module: &mut Module, state: &State) {
    for id in all_expr_ids(module) {
        if let ExprKind::Ref(r) = &module.expr(id).kind {
            if r.target.is_none() {
                if let Some(&winner) = state.overloads.get(&id) {
                    if let ExprKind::Ref(r) = &mut module.expr_mut(id).kind {
                        r.target = Some(winner);
                    }
                }
            }
        }
    }
}

/// Wraps `old` with a synthesized, non-explicit `CastExpr` targeting `to`,
/// reusing `old`'s recorded parent and reparenting `old` under the new
/// node. No-op if `old` has no parent (a detached root expression has no
/// slot to rewrite into).
fn insert_cast(module: &mut Module, old: ExprIdx, to: Interned<Type>) {
    let Some(parent) = module.expr(old).parent else { return };
    let location = module.expr(old).location;
    let new = module.alloc_expr_typed(
        location,
        Some(parent),
        ExprKind::Cast(CastExpr { sub_expr: old, destination_type: to.clone(), explicit: false }),
        to,
    );
    crate::ast::visitor::replace_expr_child(module, parent, old, new);
    module.expr_mut(old).parent = Some(NodeRef::Expr(new));
}

/// Value-site conversions (assignment, return, var-decl initializer,
/// if/while condition) recorded directly by the solver, keyed by the
/// locator expression itself.
fn insert_value_site_casts(module: &mut Module, state: &State) {
    let casts: Vec<(ExprIdx, Interned<Type>)> = state.casts.iter().map(|(&k, v)| (k, v.clone())).collect();
    for (expr, target) in casts {
        insert_cast(module, expr, target);
    }
}

/// Re-derives per-operand conversions for resolved operator/callee sites
/// (spec Design Notes §9's operator RefExpr-vs-Call-parent open question;
/// `operand_site` conversions are never recorded in `state.casts` — see
/// `sema::constraint::ConstraintKind::Conversion`'s doc comment — so this
/// walk is the only place they get applied).
fn insert_operand_site_casts(module: &mut Module) {
    let mut sites: Vec<(ExprIdx, Vec<ExprIdx>)> = Vec::new();
    for id in all_expr_ids(module) {
        match module.expr(id).kind.clone() {
            ExprKind::Binary(b) => sites.push((b.operator, vec![b.lhs, b.rhs])),
            ExprKind::Unary(u) => sites.push((u.operator, vec![u.operand])),
            ExprKind::Call(c) if matches!(module.expr(c.callee).kind, ExprKind::Ref(_)) => {
                sites.push((c.callee, c.args.clone()));
            }
            _ => {}
        }
    }

    for (callee, operands) in sites {
        let target = match &module.expr(callee).kind {
            ExprKind::Ref(r) => r.target,
            _ => None,
        };
        let Some(target) = target else { continue };
        let idx = module.decl_idx_from_id(target);
        let DeclKind::Function(f) = &module.decl(idx).kind else { continue };
        let params: Vec<Interned<Type>> = f
            .params
            .iter()
            .filter_map(|&p| match &module.decl(p).kind {
                DeclKind::Param(pd) => Some(pd.ty.clone()),
                _ => None,
            })
            .collect();
        for (operand, param_ty) in operands.into_iter().zip(params.into_iter()) {
            let operand_ty = module.expr(operand).ty.clone();
            if operand_ty != param_ty {
                insert_cast(module, operand, param_ty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, FunctionDecl, LiteralExpr, RefExpr, VarLetDecl};
    use crate::ids::DeclId;
    use crate::source::SourceLocation;
    use crate::types::IntWidth;
    use num_bigint::BigInt;

    /// Scenario 3 (spec §8): widening an `Int32` initializer into an
    /// `Int64` variable inserts an implicit cast with `explicit: false`.
    #[test]
    fn value_site_cast_wraps_initializer_in_place() {
        let mut module = Module::new("test");
        let i32_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let i64_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I64 });
        let lit = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))), i32_ty.clone());
        let let_decl = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "x".into(), declared_type: Some(i64_ty.clone()), resolved_type: i64_ty.clone(), initializer: Some(lit), mutable: false }),
        );
        module.expr_mut(lit).parent = Some(NodeRef::Decl(let_decl));

        let mut state = State::default();
        state.casts.insert(lit, i64_ty.clone());
        insert_value_site_casts(&mut module, &state);

        let DeclKind::Let(v) = &module.decl(let_decl).kind else { unreachable!() };
        let new_init = v.initializer.expect("initializer slot still present");
        assert_ne!(new_init, lit, "a cast node should have replaced the literal in the slot");
        match &module.expr(new_init).kind {
            ExprKind::Cast(c) => {
                assert_eq!(c.sub_expr, lit);
                assert_eq!(c.destination_type, i64_ty);
                assert!(!c.explicit);
            }
            other => panic!("expected Cast, found {other:?}"),
        }
    }

    #[test]
    fn operand_site_cast_wraps_the_mismatched_argument_only() {
        let mut module = Module::new("test");
        let i32_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let i64_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I64 });
        let fn_ty_ret = i64_ty.clone();
        let param = module.alloc_decl(SourceLocation::DETACHED, None, DeclKind::Param(crate::ast::ParamDecl { name: "a".into(), ty: i64_ty.clone() }));
        let callee_fn = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: vec![param], return_type: fn_ty_ret, body: None, is_variadic: false }),
        );

        let arg = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))), i32_ty);
        let callee = module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::Ref(RefExpr { path: vec!["f".into()], target: Some(DeclId::from(callee_fn)), candidates: vec![DeclId::from(callee_fn)] }),
            i64_ty.clone(),
        );
        let call = module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::Call(crate::ast::CallExpr { callee, args: vec![arg], template_args: None }),
            i64_ty,
        );
        module.expr_mut(callee).parent = Some(NodeRef::Expr(call));
        module.expr_mut(arg).parent = Some(NodeRef::Expr(call));

        insert_operand_site_casts(&mut module);

        match &module.expr(call).kind {
            ExprKind::Call(c) => {
                assert_ne!(c.args[0], arg, "argument slot should now hold the cast");
                match &module.expr(c.args[0]).kind {
                    ExprKind::Cast(cast) => assert_eq!(cast.sub_expr, arg),
                    other => panic!("expected Cast, found {other:?}"),
                }
            }
            other => panic!("expected Call, found {other:?}"),
        }
    }
}
