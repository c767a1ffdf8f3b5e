//! Phase 2: constraint emission (spec §4.3 "Phase 2: Constraint emission").
//!
//! Walks every expression once, assigning `RefExpr` candidates from the
//! scope tree built in phase 1 and pushing one `Constraint` per table row.
//! `RefExpr`s with exactly one candidate bind immediately (spec §8 boundary
//! behavior: "exactly one viable candidate must bind without creating a
//! disjunction"); overloaded references go through `ConstraintKind::Disjunction`
//! and are resolved later by the solver.

use crate::ast::{CallExpr, DeclIdx, DeclKind, ExprIdx, ExprKind, LiteralExpr, Module, RefExpr, StmtIdx, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::ids::{DeclId, ScopeId};
use crate::intern::Interned;
use crate::sema::constraint::{Constraint, ConstraintKind, Locator, OverloadAlternative};
use crate::sema::scope_builder::ScopeInfo;
use crate::types::{FloatWidth, IntWidth, Type};

pub fn emit(module: &mut Module, scope_info: &ScopeInfo, sink: &mut DiagnosticSink) -> Vec<Constraint> {
    let mut emitter = Emitter {
        module,
        scopes: &scope_info.scopes,
        expr_scope: &scope_info.expr_scope,
        constraints: Vec::new(),
        return_type_stack: Vec::new(),
        sink,
    };
    let top_level = emitter.module.top_level.clone();
    for decl in top_level {
        emitter.emit_decl(decl);
    }
    emitter.constraints
}

struct Emitter<'a> {
    module: &'a mut Module,
    scopes: &'a crate::scope::ScopeTree,
    expr_scope: &'a rustc_hash::FxHashMap<ExprIdx, ScopeId>,
    constraints: Vec<Constraint>,
    return_type_stack: Vec<Interned<Type>>,
    sink: &'a mut DiagnosticSink,
}

impl Emitter<'_> {
    fn push(&mut self, expr: ExprIdx, kind: ConstraintKind) {
        let location = self.module.expr(expr).location;
        self.constraints.push(Constraint::new(Locator { location, expr }, kind));
    }

    /// The declared/solved type of any referenceable declaration. Functions
    /// get their `Function` type built on demand; there is no cached slot
    /// for it since params can themselves still be template parameters.
    fn decl_type(&self, id: DeclId) -> Interned<Type> {
        let idx = self.module.decl_idx_from_id(id);
        match &self.module.decl(idx).kind {
            DeclKind::Function(f) => {
                let params = f.params.iter().map(|&p| self.decl_type(DeclId::from(p))).collect();
                self.module.types.function(params, f.return_type.clone(), f.is_variadic)
            }
            DeclKind::Var(v) | DeclKind::Let(v) | DeclKind::ForBinding(v) => v.resolved_type.clone(),
            DeclKind::Param(p) => p.ty.clone(),
            DeclKind::Field(f) => f.ty.clone(),
            DeclKind::TemplateParam(_) => self.module.types.intern(Type::TemplateParam(id)),
            DeclKind::Struct(_) => self.module.types.intern(Type::Struct(id)),
            DeclKind::Enum(_) => self.module.types.intern(Type::Enum(id)),
            DeclKind::Import(_) => self.module.types.intern(Type::UnresolvedName("<import>".into())),
        }
    }

    fn function_signature(&self, id: DeclId) -> Option<(Vec<Interned<Type>>, Interned<Type>)> {
        let idx = self.module.decl_idx_from_id(id);
        match &self.module.decl(idx).kind {
            DeclKind::Function(f) => {
                let params = f.params.iter().map(|&p| self.decl_type(DeclId::from(p))).collect();
                Some((params, f.return_type.clone()))
            }
            _ => None,
        }
    }

    fn ref_name(&self, id: ExprIdx) -> String {
        match &self.module.expr(id).kind {
            ExprKind::Ref(r) => r.path.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("."),
            _ => String::new(),
        }
    }

    fn set_ref_target(&mut self, id: ExprIdx, target: DeclId) {
        if let ExprKind::Ref(r) = &mut self.module.expr_mut(id).kind {
            r.target = Some(target);
        }
    }

    /// Resolves `id`'s candidates from the scope it was evaluated in, and
    /// records them on the `RefExpr` node. A pre-existing `target` (set by
    /// a caller building synthetic ASTs, e.g. tests) short-circuits lookup.
    fn resolve_candidates(&mut self, id: ExprIdx) -> Vec<DeclId> {
        let (path, existing_target) = match &self.module.expr(id).kind {
            ExprKind::Ref(r) => (r.path.clone(), r.target),
            _ => return Vec::new(),
        };
        if let Some(target) = existing_target {
            return vec![target];
        }
        let scope = self.expr_scope.get(&id).copied().unwrap_or_else(|| self.scopes.root());
        let name = path.last().cloned().unwrap_or_default();
        let candidates = self.scopes.lookup(scope, &name);
        if let ExprKind::Ref(RefExpr { candidates: slot, .. }) = &mut self.module.expr_mut(id).kind {
            *slot = candidates.clone();
        }
        candidates
    }

    /// Resolution for a `RefExpr` used as a plain value (not an operator or
    /// callee): exactly one candidate binds directly; zero is undeclared;
    /// more than one is ambiguous (spec §7 "Undeclared name" / "Ambiguous
    /// overload" — the latter usually fires through a `Disjunction`
    /// instead, but a bare overloaded name used as a value has no
    /// call-site argument types to disambiguate with, so it is reported
    /// immediately here).
    fn emit_plain_ref(&mut self, id: ExprIdx, result_ty: Interned<Type>) {
        let candidates = self.resolve_candidates(id);
        let location = self.module.expr(id).location;
        match candidates.len() {
            0 => {
                let name = self.ref_name(id);
                self.sink.emit(Diagnostic::new(
                    location,
                    DiagnosticKind::UndeclaredName { name: name.clone() },
                    format!("undeclared name `{name}`"),
                ));
            }
            1 => {
                self.set_ref_target(id, candidates[0]);
                let ty = self.decl_type(candidates[0]);
                self.push(id, ConstraintKind::Equal(result_ty, ty));
            }
            _ => {
                let name = self.ref_name(id);
                let notes = candidates
                    .iter()
                    .map(|&c| {
                        let ty = self.decl_type(c);
                        crate::diagnostics::Note::new(location, format!("candidate: {name} : {ty}"))
                    })
                    .collect::<Vec<_>>();
                let mut diag = Diagnostic::new(
                    location,
                    DiagnosticKind::AmbiguousOverload {
                        name: name.clone(),
                        candidates: candidates.iter().map(|&c| format!("{}", self.decl_type(c))).collect(),
                    },
                    format!("ambiguous reference to `{name}`"),
                );
                for note in notes {
                    diag = diag.with_note(note);
                }
                self.sink.emit(diag);
            }
        }
    }

    /// Operator/callee resolution (spec §4.3 "BinaryOp/UnaryOp" row): builds
    /// a `Disjunction` over every candidate's signature, decomposed into
    /// per-position `Conversion` checks instead of a single whole-function
    /// `Conversion` (the conversion lattice in spec §4.3 has no rule for
    /// `Function` types, only primitives/pointers/arrays).
    fn emit_overload_site(&mut self, callee: ExprIdx, operands: &[ExprIdx], result_ty: Interned<Type>, locator: ExprIdx) {
        let candidates = self.resolve_candidates(callee);
        let location = self.module.expr(callee).location;
        if candidates.is_empty() {
            let name = self.ref_name(callee);
            self.sink.emit(Diagnostic::new(
                location,
                DiagnosticKind::UndeclaredName { name: name.clone() },
                format!("undeclared name `{name}`"),
            ));
            return;
        }
        let argument_types: Vec<_> = operands.iter().map(|&e| self.module.expr(e).ty.clone()).collect();
        if candidates.len() == 1 {
            self.set_ref_target(callee, candidates[0]);
            if let Some((params, ret)) = self.function_signature(candidates[0]) {
                for (arg_ty, param_ty) in argument_types.iter().zip(params.iter()) {
                    self.push(
                        locator,
                        ConstraintKind::Conversion { from: arg_ty.clone(), to: param_ty.clone(), explicit: false, operand_site: true },
                    );
                }
                self.push(locator, ConstraintKind::Equal(result_ty, ret));
            }
            return;
        }
        let mut alternatives = Vec::new();
        for &candidate in &candidates {
            if let Some((params, return_type)) = self.function_signature(candidate) {
                alternatives.push(OverloadAlternative {
                    candidate,
                    argument_types: argument_types.clone(),
                    param_types: params,
                    return_type,
                });
            }
        }
        self.push(locator, ConstraintKind::Disjunction { callee_expr: callee, result: result_ty, alternatives });
    }

    fn emit_decl(&mut self, id: DeclIdx) {
        let kind = self.module.decl(id).kind.clone();
        match kind {
            DeclKind::Function(f) => {
                if let Some(body) = f.body {
                    self.return_type_stack.push(f.return_type.clone());
                    self.emit_stmt(body);
                    self.return_type_stack.pop();
                }
            }
            DeclKind::Struct(s) => {
                for field in s.fields {
                    self.emit_decl(field);
                }
            }
            DeclKind::Enum(e) => {
                for case in e.cases {
                    self.emit_decl(case);
                }
            }
            DeclKind::Var(v) | DeclKind::Let(v) | DeclKind::ForBinding(v) => {
                if let Some(init) = v.initializer {
                    self.emit_expr(init);
                    let init_ty = self.module.expr(init).ty.clone();
                    self.push(
                        init,
                        ConstraintKind::Conversion { from: init_ty, to: v.resolved_type.clone(), explicit: false, operand_site: false },
                    );
                }
            }
            DeclKind::Field(f) => {
                if let Some(default) = f.default {
                    self.emit_expr(default);
                }
            }
            DeclKind::Param(_) | DeclKind::TemplateParam(_) | DeclKind::Import(_) => {}
        }
    }

    fn emit_stmt(&mut self, id: StmtIdx) {
        let kind = self.module.stmt(id).kind.clone();
        match kind {
            StmtKind::Compound(c) => {
                for s in c.stmts {
                    self.emit_stmt(s);
                }
            }
            StmtKind::If(s) => {
                self.emit_condition(s.condition);
                self.emit_stmt(s.then_branch);
                if let Some(else_branch) = s.else_branch {
                    self.emit_stmt(else_branch);
                }
            }
            StmtKind::While(s) => {
                self.emit_condition(s.condition);
                self.emit_stmt(s.body);
            }
            StmtKind::For(s) => {
                self.emit_expr(s.range);
                self.emit_decl(s.binding);
                self.emit_stmt(s.body);
            }
            StmtKind::Return(s) => {
                if let Some(value) = s.value {
                    self.emit_expr(value);
                    if let Some(ret) = self.return_type_stack.last().cloned() {
                        let value_ty = self.module.expr(value).ty.clone();
                        self.push(value, ConstraintKind::Conversion { from: value_ty, to: ret, explicit: false, operand_site: false });
                    }
                }
            }
            StmtKind::Assign(s) => {
                self.emit_expr(s.lhs);
                self.emit_expr(s.rhs);
                let lhs_ty = self.module.expr(s.lhs).ty.clone();
                let rhs_ty = self.module.expr(s.rhs).ty.clone();
                // Compound ops (`+=` and friends) lower to a load/op/store
                // triple during GIL generation, not a separate overload
                // resolution here; the table only asks for the plain
                // right-to-left `Conversion` check at this phase.
                self.push(s.rhs, ConstraintKind::Conversion { from: rhs_ty, to: lhs_ty, explicit: false, operand_site: false });
            }
            StmtKind::Break | StmtKind::Continue => {}
            StmtKind::Expression(e) => self.emit_expr(e),
            StmtKind::Decl(d) => self.emit_decl(d),
        }
    }

    fn emit_condition(&mut self, cond: ExprIdx) {
        self.emit_expr(cond);
        let cond_ty = self.module.expr(cond).ty.clone();
        let bool_ty = self.module.types.intern(Type::Bool);
        self.push(cond, ConstraintKind::Conversion { from: cond_ty, to: bool_ty, explicit: false, operand_site: false });
    }

    fn emit_expr(&mut self, id: ExprIdx) {
        let kind = self.module.expr(id).kind.clone();
        let result_ty = self.module.expr(id).ty.clone();
        match kind {
            ExprKind::Literal(lit) => self.emit_literal(id, &lit, result_ty),
            ExprKind::Ref(_) => self.emit_plain_ref(id, result_ty),
            ExprKind::Binary(b) => {
                self.emit_expr(b.lhs);
                self.emit_expr(b.rhs);
                self.emit_overload_site(b.operator, &[b.lhs, b.rhs], result_ty, id);
            }
            ExprKind::Unary(u) => {
                self.emit_expr(u.operand);
                self.emit_overload_site(u.operator, &[u.operand], result_ty, id);
            }
            ExprKind::Call(c) => self.emit_call(id, &c, result_ty),
            ExprKind::Cast(c) => {
                self.emit_expr(c.sub_expr);
                let sub_ty = self.module.expr(c.sub_expr).ty.clone();
                self.push(id, ConstraintKind::CheckedCast { from: sub_ty, to: c.destination_type.clone() });
                self.push(id, ConstraintKind::Equal(result_ty, c.destination_type));
            }
            ExprKind::StructMember(m) => {
                self.emit_expr(m.base);
                let base_ty = self.module.expr(m.base).ty.clone();
                self.push(id, ConstraintKind::StructMember { base: base_ty, member: m.member, result: result_ty });
            }
            ExprKind::StructInitializer(s) => {
                for &field in &s.fields {
                    self.emit_expr(field);
                }
                if let Some(ty) = s.struct_type {
                    self.push(id, ConstraintKind::Equal(result_ty.clone(), ty));
                }
                self.push(id, ConstraintKind::StructInitialiser { result: result_ty, node: id });
            }
            ExprKind::Ternary(t) => {
                self.emit_condition(t.condition);
                self.emit_expr(t.then_expr);
                self.emit_expr(t.else_expr);
                let then_ty = self.module.expr(t.then_expr).ty.clone();
                let else_ty = self.module.expr(t.else_expr).ty.clone();
                self.push(id, ConstraintKind::Equal(then_ty, result_ty.clone()));
                self.push(id, ConstraintKind::Equal(else_ty, result_ty));
            }
            ExprKind::PointerDeref(inner) => {
                self.emit_expr(inner);
                let inner_ty = self.module.expr(inner).ty.clone();
                let expected = self.module.types.pointer(result_ty.clone());
                self.push(id, ConstraintKind::Equal(inner_ty, expected));
            }
        }
    }

    fn emit_literal(&mut self, id: ExprIdx, lit: &LiteralExpr, result_ty: Interned<Type>) {
        match lit {
            LiteralExpr::Int(_) => {
                let default = self.module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
                self.push(id, ConstraintKind::Defaultable { var: result_ty.clone(), default });
                self.push(id, ConstraintKind::ExpressibleByIntLiteral(result_ty));
            }
            LiteralExpr::Float(_) => {
                let default = self.module.types.intern(Type::Float(FloatWidth::F64));
                self.push(id, ConstraintKind::Defaultable { var: result_ty.clone(), default });
                self.push(id, ConstraintKind::ExpressibleByFloatLiteral(result_ty));
            }
            LiteralExpr::Bool(_) => {
                let default = self.module.types.intern(Type::Bool);
                self.push(id, ConstraintKind::Defaultable { var: result_ty, default });
            }
            LiteralExpr::String(_) => {
                let char_ty = self.module.types.intern(Type::Char);
                let ptr_char = self.module.types.pointer(char_ty);
                self.push(id, ConstraintKind::Defaultable { var: result_ty.clone(), default: ptr_char });
                self.push(id, ConstraintKind::ExpressibleByStringLiteral(result_ty));
            }
        }
    }

    fn emit_call(&mut self, id: ExprIdx, c: &CallExpr, result_ty: Interned<Type>) {
        for &arg in &c.args {
            self.emit_expr(arg);
        }
        let callee_is_ref = matches!(&self.module.expr(c.callee).kind, ExprKind::Ref(_));
        if callee_is_ref {
            self.emit_overload_site(c.callee, &c.args, result_ty, id);
            return;
        }
        // Calling through a function-typed value rather than a name: fall
        // back to a single structural `Equal` against the shape implied by
        // the call site. Weaker than per-candidate overload checking, but
        // there is no declaration to resolve against.
        self.emit_expr(c.callee);
        let callee_ty = self.module.expr(c.callee).ty.clone();
        let arg_types: Vec<_> = c.args.iter().map(|&a| self.module.expr(a).ty.clone()).collect();
        let expected = self.module.types.function(arg_types, result_ty, false);
        self.push(id, ConstraintKind::Equal(callee_ty, expected));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{FunctionDecl, RefExpr};
    use crate::sema::scope_builder;
    use crate::source::SourceLocation;
    use crate::types::IntWidth;
    use num_bigint::BigInt;

    fn int_ty(module: &Module) -> Interned<Type> {
        module.types.intern(Type::Int { signed: true, width: IntWidth::I32 })
    }

    #[test]
    fn integer_literal_gets_defaultable_and_expressible_constraints() {
        let mut module = Module::new("test");
        let lit = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(7))));
        let resolved_type = module.fresh_type_variable();
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(crate::ast::VarLetDecl {
                name: "x".into(),
                declared_type: None,
                resolved_type,
                initializer: Some(lit),
                mutable: false,
            }),
        );
        let scope_info = scope_builder::build(&module);
        let mut sink = DiagnosticSink::new();
        let constraints = emit(&mut module, &scope_info, &mut sink);
        assert!(!sink.has_errors());
        let has_defaultable = constraints.iter().any(|c| matches!(c.kind, ConstraintKind::Defaultable { .. }));
        let has_expressible = constraints.iter().any(|c| matches!(c.kind, ConstraintKind::ExpressibleByIntLiteral(_)));
        assert!(has_defaultable && has_expressible);
    }

    #[test]
    fn undeclared_name_is_reported() {
        let mut module = Module::new("test");
        let r = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Ref(RefExpr::unqualified("missing")));
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl {
                name: "f".into(),
                params: Vec::new(),
                return_type: int_ty(&module),
                body: Some({
                    let stmt = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Expression(r));
                    module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(crate::ast::CompoundStmt { stmts: vec![stmt] }))
                }),
                is_variadic: false,
            }),
        );
        let scope_info = scope_builder::build(&module);
        let mut sink = DiagnosticSink::new();
        let _ = emit(&mut module, &scope_info, &mut sink);
        assert!(sink.has_errors());
        assert!(matches!(sink.diagnostics()[0].kind, DiagnosticKind::UndeclaredName { .. }));
    }

    #[test]
    fn two_candidates_for_a_callee_emit_a_disjunction() {
        let mut module = Module::new("test");
        let ity = int_ty(&module);
        let f1 = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: ity.clone(), body: None, is_variadic: false }),
        );
        let f2 = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: ity.clone(), body: None, is_variadic: false }),
        );
        let callee = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Ref(RefExpr::unqualified("f")));
        let call = module.alloc_expr(
            SourceLocation::DETACHED,
            None,
            ExprKind::Call(CallExpr { callee, args: Vec::new(), template_args: None }),
        );
        let stmt = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Expression(call));
        let body = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(crate::ast::CompoundStmt { stmts: vec![stmt] }));
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "g".into(), params: Vec::new(), return_type: ity, body: Some(body), is_variadic: false }),
        );
        let _ = (f1, f2);

        let scope_info = scope_builder::build(&module);
        let mut sink = DiagnosticSink::new();
        let constraints = emit(&mut module, &scope_info, &mut sink);
        assert!(!sink.has_errors());
        let disjunction = constraints.iter().find(|c| matches!(c.kind, ConstraintKind::Disjunction { .. }));
        match &disjunction.expect("expected a disjunction constraint").kind {
            ConstraintKind::Disjunction { alternatives, .. } => assert_eq!(alternatives.len(), 2),
            _ => unreachable!(),
        }
    }
}
