//! Phase 1: scope construction (spec §4.3 "Phase 1: Scope construction").
//!
//! A two-pass walk per scope level: declarations are registered into the
//! scope's name map before any child is recursed into, so sibling
//! declarations can forward-reference each other within the same scope,
//! matching "declarations are inserted into the current scope's name map
//! in source order" without constraining lookup to only-already-seen
//! names.

use rustc_hash::FxHashMap;

use crate::ast::{DeclIdx, DeclKind, ExprIdx, Module, StmtIdx, StmtKind};
use crate::ids::DeclId;
use crate::scope::{ScopeKind, ScopeTree};
use crate::source::SourceLocation;

pub struct ScopeInfo {
    pub scopes: ScopeTree,
    /// The scope each expression is evaluated in, used by constraint
    /// emission to resolve `RefExpr`s.
    pub expr_scope: FxHashMap<ExprIdx, crate::ids::ScopeId>,
}

pub fn build(module: &Module) -> ScopeInfo {
    let mut scopes = ScopeTree::new();
    let root = scopes.root();
    let mut info = ScopeInfo { scopes, expr_scope: FxHashMap::default() };

    for &decl in &module.top_level {
        declare(module, &mut info.scopes, root, decl);
    }
    for &decl in &module.top_level {
        build_decl(module, &mut info, root, decl);
    }
    info
}

fn decl_location(module: &Module, id: DeclIdx) -> SourceLocation {
    module.decl(id).location
}

/// Registers `decl`'s name (if it has one) in `scope`. Struct fields,
/// enum cases, and template parameters are looked up structurally (via
/// their owning type), not through scope lookup, so they are not
/// registered here even though they have names.
fn declare(module: &Module, scopes: &mut ScopeTree, scope: crate::ids::ScopeId, decl: DeclIdx) {
    let name = match &module.decl(decl).kind {
        DeclKind::Function(d) => Some(d.name.clone()),
        DeclKind::Struct(d) => Some(d.name.clone()),
        DeclKind::Enum(d) => Some(d.name.clone()),
        DeclKind::Var(d) | DeclKind::Let(d) | DeclKind::ForBinding(d) => Some(d.name.clone()),
        DeclKind::Param(_) | DeclKind::Field(_) | DeclKind::TemplateParam(_) | DeclKind::Import(_) => None,
    };
    if let Some(name) = name {
        scopes.declare(scope, name, DeclId::from(decl));
    }
}

fn build_decl(module: &Module, info: &mut ScopeInfo, scope: crate::ids::ScopeId, id: DeclIdx) {
    match &module.decl(id).kind {
        DeclKind::Function(f) => {
            let fn_scope = info.scopes.push_child(scope, ScopeKind::Function);
            for &param in &f.params {
                declare(module, &mut info.scopes, fn_scope, param);
            }
            if let Some(body) = f.body {
                build_stmt(module, info, fn_scope, body);
            }
        }
        DeclKind::Var(v) | DeclKind::Let(v) | DeclKind::ForBinding(v) => {
            if let Some(init) = v.initializer {
                build_expr(module, info, scope, init);
            }
        }
        DeclKind::Field(f) => {
            if let Some(default) = f.default {
                build_expr(module, info, scope, default);
            }
        }
        DeclKind::Struct(_) | DeclKind::Enum(_) | DeclKind::Import(_) | DeclKind::Param(_) | DeclKind::TemplateParam(_) => {}
    }
}

fn build_stmt(module: &Module, info: &mut ScopeInfo, scope: crate::ids::ScopeId, id: StmtIdx) {
    match &module.stmt(id).kind {
        StmtKind::Compound(c) => {
            let child = info.scopes.push_child(scope, ScopeKind::Block);
            for &s in &c.stmts {
                if let StmtKind::Decl(d) = &module.stmt(s).kind {
                    declare(module, &mut info.scopes, child, *d);
                }
            }
            for &s in &c.stmts {
                build_stmt(module, info, child, s);
            }
        }
        StmtKind::If(s) => {
            build_expr(module, info, scope, s.condition);
            build_stmt(module, info, scope, s.then_branch);
            if let Some(else_branch) = s.else_branch {
                build_stmt(module, info, scope, else_branch);
            }
        }
        StmtKind::While(s) => {
            build_expr(module, info, scope, s.condition);
            build_stmt(module, info, scope, s.body);
        }
        StmtKind::For(s) => {
            let child = info.scopes.push_child(scope, ScopeKind::Block);
            build_expr(module, info, scope, s.range);
            declare(module, &mut info.scopes, child, s.binding);
            build_decl(module, info, child, s.binding);
            build_stmt(module, info, child, s.body);
        }
        StmtKind::Return(s) => {
            if let Some(value) = s.value {
                build_expr(module, info, scope, value);
            }
        }
        StmtKind::Assign(s) => {
            build_expr(module, info, scope, s.lhs);
            build_expr(module, info, scope, s.rhs);
        }
        StmtKind::Break | StmtKind::Continue => {}
        StmtKind::Expression(e) => build_expr(module, info, scope, *e),
        StmtKind::Decl(d) => build_decl(module, info, scope, *d),
    }
}

fn build_expr(module: &Module, info: &mut ScopeInfo, scope: crate::ids::ScopeId, id: ExprIdx) {
    info.expr_scope.insert(id, scope);
    use crate::ast::ExprKind;
    match &module.expr(id).kind {
        ExprKind::Literal(_) | ExprKind::Ref(_) => {}
        ExprKind::Binary(b) => {
            build_expr(module, info, scope, b.operator);
            build_expr(module, info, scope, b.lhs);
            build_expr(module, info, scope, b.rhs);
        }
        ExprKind::Unary(u) => {
            build_expr(module, info, scope, u.operator);
            build_expr(module, info, scope, u.operand);
        }
        ExprKind::Call(c) => {
            build_expr(module, info, scope, c.callee);
            for &arg in &c.args {
                build_expr(module, info, scope, arg);
            }
        }
        ExprKind::Cast(c) => build_expr(module, info, scope, c.sub_expr),
        ExprKind::StructMember(m) => build_expr(module, info, scope, m.base),
        ExprKind::StructInitializer(s) => {
            for &field in &s.fields {
                build_expr(module, info, scope, field);
            }
        }
        ExprKind::Ternary(t) => {
            build_expr(module, info, scope, t.condition);
            build_expr(module, info, scope, t.then_expr);
            build_expr(module, info, scope, t.else_expr);
        }
        ExprKind::PointerDeref(inner) => build_expr(module, info, scope, *inner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, LiteralExpr, Module, VarLetDecl};
    use crate::types::{IntWidth, Type};
    use num_bigint::BigInt;

    #[test]
    fn sibling_top_level_functions_forward_reference_each_other() {
        let mut module = Module::new("test");
        let int_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let f1 = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(crate::ast::FunctionDecl {
                name: "a".into(),
                params: Vec::new(),
                return_type: int_ty.clone(),
                body: None,
                is_variadic: false,
            }),
        );
        let _f2 = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(crate::ast::FunctionDecl {
                name: "b".into(),
                params: Vec::new(),
                return_type: int_ty,
                body: None,
                is_variadic: false,
            }),
        );
        let info = build(&module);
        let root = info.scopes.root();
        assert_eq!(info.scopes.lookup(root, "a"), vec![DeclId::from(f1)]);
        assert_eq!(info.scopes.lookup(root, "b").len(), 1);
    }

    #[test]
    fn block_locals_shadow_but_do_not_leak_out() {
        let mut module = Module::new("test");
        let bool_ty = module.types.intern(Type::Bool);
        let lit = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Bool(true)), bool_ty.clone());
        let inner_let = module.alloc_decl(
            SourceLocation::DETACHED,
            None,
            DeclKind::Let(VarLetDecl { name: "x".into(), declared_type: None, resolved_type: bool_ty, initializer: Some(lit), mutable: false }),
        );
        let inner_stmt = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Decl(inner_let));
        let block = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(crate::ast::CompoundStmt { stmts: vec![inner_stmt] }));
        let int_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(crate::ast::FunctionDecl { name: "f".into(), params: Vec::new(), return_type: int_ty, body: Some(block), is_variadic: false }),
        );

        let info = build(&module);
        assert!(info.scopes.lookup(info.scopes.root(), "x").is_empty());
    }
}
