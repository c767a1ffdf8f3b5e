//! Supplemental validation passes ported from the original's dedicated
//! `SemanticPass/*Checker` walkers, run around the constraint-based core.
//!
//! Each function is a standalone post-order or pre-order walk rather than a
//! constraint, matching the source's own separation: these are structural
//! checks that never need unification.

use itertools::Itertools;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{DeclIdx, DeclKind, ExprKind, Module, StmtKind};
use crate::diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink};
use crate::ids::DeclId;
use crate::source::SourceLocation;

/// Assigns sequential values to enum cases that don't specify one, then
/// checks uniqueness (spec.md §3 EnumDecl invariant: "cases have unique
/// integer values"). Run before constraint emission since later phases
/// need concrete case values.
pub fn enum_values(module: &mut Module, sink: &mut DiagnosticSink) {
    let enums: Vec<DeclIdx> = module
        .top_level
        .iter()
        .copied()
        .filter(|&d| matches!(module.decl(d).kind, DeclKind::Enum(_)))
        .collect();

    for enum_idx in enums {
        let DeclKind::Enum(e) = &module.decl(enum_idx).kind else { continue };
        let cases = e.cases.clone();

        let mut next = 0i64;
        let mut seen = FxHashMap::default();
        for &case in &cases {
            let explicit = match &module.decl(case).kind {
                DeclKind::Field(f) => f.case_value,
                _ => None,
            };
            let value = explicit.unwrap_or(next);
            next = value + 1;
            if let DeclKind::Field(f) = &mut module.decl_mut(case).kind {
                f.case_value = Some(value);
            }
            if seen.contains_key(&value) {
                sink.emit(Diagnostic::new(
                    module.decl(case).location,
                    DiagnosticKind::DuplicateDeclaration { name: module.decl_name(case).map_or_else(String::new, ToString::to_string) },
                    "enum case value is not unique within this enum",
                ));
            } else {
                seen.insert(value, case);
            }
        }
    }
}

/// Two declarations sharing the same name + signature at the same scope
/// (spec §7 "Duplicate declaration"). Signature here means: same kind, and
/// for functions the same parameter count (full structural-type comparison
/// happens once params carry resolved types; at this pre-solve point arity
/// is what the original's `DuplicateFunctionChecker` actually gates on
/// before falling back to full mangled-name comparison).
pub fn duplicate_decls(module: &mut Module, sink: &mut DiagnosticSink) {
    let by_name: std::collections::HashMap<&str, Vec<DeclIdx>> = module
        .top_level
        .iter()
        .filter_map(|&decl| module.decl_name(decl).map(|name| (name.as_str(), decl)))
        .into_group_map();

    for decls in by_name.into_values() {
        if decls.len() < 2 {
            continue;
        }
        let by_arity: std::collections::HashMap<Option<usize>, Vec<DeclIdx>> = decls
            .into_iter()
            .map(|decl| {
                let arity = match &module.decl(decl).kind {
                    DeclKind::Function(f) => Some(f.params.len()),
                    _ => None,
                };
                (arity, decl)
            })
            .into_group_map();

        for group in by_arity.into_values() {
            for &dup in &group[1..] {
                sink.emit(Diagnostic::new(
                    module.decl(dup).location,
                    DiagnosticKind::DuplicateDeclaration { name: module.decl_name(dup).map_or_else(String::new, ToString::to_string) },
                    format!("`{}` is already declared in this scope", module.decl_name(dup).map_or("", |n| n.as_str())),
                ));
            }
        }
    }
}

/// Attribute names recognized by the core and the declaration kinds they
/// may attach to. Unlisted attribute names are accepted on any kind (an
/// unknown-attribute diagnostic is outside this spec's scope).
fn allowed_targets(attribute: &str) -> Option<&'static [&'static str]> {
    match attribute {
        "entry" => Some(&["Function"]),
        "packed" => Some(&["Struct"]),
        "no_mangle" => Some(&["Function"]),
        "lazy" => Some(&["VarLet"]),
        _ => None,
    }
}

fn decl_kind_name(kind: &DeclKind) -> &'static str {
    match kind {
        DeclKind::Function(_) => "Function",
        DeclKind::Struct(_) => "Struct",
        DeclKind::Enum(_) => "Enum",
        DeclKind::Var(_) | DeclKind::Let(_) | DeclKind::ForBinding(_) => "VarLet",
        DeclKind::Import(_) => "Import",
        DeclKind::Param(_) => "Param",
        DeclKind::Field(_) => "Field",
        DeclKind::TemplateParam(_) => "TemplateParam",
    }
}

/// Each `Attribute` on a `Decl` checked against its allowed-target set
/// (spec §7 "Invalid attribute target").
pub fn attribute_targets(module: &mut Module, sink: &mut DiagnosticSink) {
    let all: Vec<DeclIdx> = (0..module.decls.len() as u32).map(crate::arena::Idx::from_raw).collect();
    for decl in all {
        let kind_name = decl_kind_name(&module.decl(decl).kind);
        let attributes = module.decl(decl).attributes.clone();
        for attr in attributes {
            if let Some(targets) = allowed_targets(&attr.name) {
                if !targets.contains(&kind_name) {
                    sink.emit(Diagnostic::new(
                        attr.location,
                        DiagnosticKind::InvalidAttributeTarget { attribute: attr.name.to_string() },
                        format!("attribute `{}` cannot be attached to a {kind_name} declaration", attr.name),
                    ));
                }
            }
        }
    }
}

/// LHS of an assignment resolving to a `let`, parameter, or for-binding
/// (spec §7 "Immutable assignment"). Run after write-back, so `RefExpr`
/// targets are resolved.
pub fn immutable_assignment(module: &mut Module, sink: &mut DiagnosticSink) {
    let assigns: Vec<(SourceLocation, crate::ast::ExprIdx)> = collect_assign_lhs(module);
    for (location, lhs) in assigns {
        let target = match &module.expr(lhs).kind {
            ExprKind::Ref(r) => r.target,
            _ => None,
        };
        let Some(target) = target else { continue };
        let idx = module.decl_idx_from_id(target);
        if module.decl(idx).kind.is_immutable_place() {
            sink.emit(Diagnostic::new(
                location,
                DiagnosticKind::ImmutableAssignment { name: module.decl_name(idx).map_or_else(String::new, ToString::to_string) },
                format!("cannot assign to immutable binding `{}`", module.decl_name(idx).map_or("", |n| n.as_str())),
            ));
        }
    }
}

fn collect_assign_lhs(module: &Module) -> Vec<(SourceLocation, crate::ast::ExprIdx)> {
    struct Collector(Vec<(SourceLocation, crate::ast::ExprIdx)>);
    impl crate::ast::visitor::Walker for Collector {
        fn before_visit_stmt(&mut self, module: &Module, id: crate::ast::StmtIdx) {
            if let StmtKind::Assign(a) = &module.stmt(id).kind {
                self.0.push((module.stmt(id).location, a.lhs));
            }
        }
    }
    let mut collector = Collector(Vec::new());
    crate::ast::visitor::walk_module(&mut collector, module);
    collector.0
}

/// A string literal resolved (post-write-back) to exactly `Char` must be a
/// single character, ported from the original's `ValidLiteralChecker`. Run
/// after write-back so `Expr.ty` is concrete; reuses `InvalidLiteralForTarget`
/// rather than a new `DiagnosticKind` variant, since this is the same
/// "literal shape doesn't match its target type" family as the other
/// `ExpressibleBy*` failures.
pub fn char_literal_length(module: &mut Module, sink: &mut DiagnosticSink) {
    struct Collector(Vec<crate::ast::ExprIdx>);
    impl crate::ast::visitor::Walker for Collector {
        fn before_visit_expr(&mut self, module: &Module, id: crate::ast::ExprIdx) {
            if matches!(module.expr(id).kind, ExprKind::Literal(crate::ast::LiteralExpr::String(_))) {
                self.0.push(id);
            }
        }
    }
    let mut collector = Collector(Vec::new());
    crate::ast::visitor::walk_module(&mut collector, module);

    for id in collector.0 {
        let expr = module.expr(id);
        if !matches!(&*expr.ty, crate::types::Type::Char) {
            continue;
        }
        let ExprKind::Literal(crate::ast::LiteralExpr::String(text)) = &expr.kind else { unreachable!() };
        if text.chars().count() != 1 {
            sink.emit(Diagnostic::new(
                expr.location,
                DiagnosticKind::InvalidLiteralForTarget { literal: text.to_string(), target: "Char".to_string() },
                "character literal must be a single character",
            ));
        }
    }
}

/// A variable or `let` declared and never read (spec §7 "Unreferenced
/// variable", warning severity). Does not flag function parameters (the
/// original only checks local `var`/`let` bindings, not parameters, since
/// unused parameters are common and idiomatic).
pub fn unreferenced_vars(module: &mut Module, sink: &mut DiagnosticSink) {
    let mut referenced: FxHashSet<DeclId> = FxHashSet::default();

    struct RefCollector<'a>(&'a mut FxHashSet<DeclId>);
    impl crate::ast::visitor::Walker for RefCollector<'_> {
        fn before_visit_expr(&mut self, module: &Module, id: crate::ast::ExprIdx) {
            if let ExprKind::Ref(r) = &module.expr(id).kind {
                if let Some(target) = r.target {
                    self.0.insert(target);
                }
            }
        }
    }
    let mut collector = RefCollector(&mut referenced);
    crate::ast::visitor::walk_module(&mut collector, module);

    struct DeclCollector(Vec<DeclIdx>);
    impl crate::ast::visitor::Walker for DeclCollector {
        fn before_visit_decl(&mut self, module: &Module, id: DeclIdx) {
            if matches!(module.decl(id).kind, DeclKind::Var(_) | DeclKind::Let(_)) {
                self.0.push(id);
            }
        }
    }
    let mut decls = DeclCollector(Vec::new());
    crate::ast::visitor::walk_module(&mut decls, module);

    for decl in decls.0 {
        let id = DeclId::from(decl);
        if !referenced.contains(&id) {
            sink.emit(Diagnostic::new(
                module.decl(decl).location,
                DiagnosticKind::UnreferencedVariable { name: module.decl_name(decl).map_or_else(String::new, ToString::to_string) },
                format!("variable `{}` is never read", module.decl_name(decl).map_or("", |n| n.as_str())),
            ));
        }
    }
}

/// A statement following an unconditional terminator (`return`, `break`,
/// `continue`) in the same block (spec §7 "Unreachable code", warning).
pub fn unreachable_code(module: &mut Module, sink: &mut DiagnosticSink) {
    let bodies = function_bodies(module);
    for body in bodies {
        check_compound(module, sink, body);
    }
}

fn function_bodies(module: &Module) -> Vec<crate::ast::StmtIdx> {
    module
        .top_level
        .iter()
        .filter_map(|&d| match &module.decl(d).kind {
            DeclKind::Function(f) => f.body,
            _ => None,
        })
        .collect()
}

fn check_compound(module: &Module, sink: &mut DiagnosticSink, id: crate::ast::StmtIdx) {
    let StmtKind::Compound(c) = module.stmt(id).kind.clone() else { return };
    let mut terminated_at: Option<usize> = None;
    for (i, &stmt) in c.stmts.iter().enumerate() {
        if terminated_at.is_some() {
            sink.emit(Diagnostic::new(
                module.stmt(stmt).location,
                DiagnosticKind::UnreachableCode,
                "unreachable code",
            ));
            break;
        }
        match &module.stmt(stmt).kind {
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => terminated_at = Some(i),
            StmtKind::Compound(_) => check_compound(module, sink, stmt),
            StmtKind::If(s) => {
                check_compound(module, sink, s.then_branch);
                if let Some(else_branch) = s.else_branch {
                    check_compound(module, sink, else_branch);
                }
            }
            StmtKind::While(s) => check_compound(module, sink, s.body),
            StmtKind::For(s) => check_compound(module, sink, s.body),
            _ => {}
        }
    }
}

/// Validates that user-defined `copy`/`drop` top-level functions have the
/// ownership model's expected shape: `copy(*Self) -> Self`, `drop(*Self) ->
/// Void` (spec §4.5 "a user-defined `copy` function"). There is no
/// method/impl-block concept in this AST, so `copy`/`drop` are matched by
/// name among top-level functions whose single parameter is a pointer to a
/// struct type, mirroring the original's per-type overload table lookup.
pub fn copy_drop_overloads(module: &mut Module, sink: &mut DiagnosticSink) {
    let functions: Vec<DeclIdx> = module
        .top_level
        .iter()
        .copied()
        .filter(|&d| matches!(module.decl(d).kind, DeclKind::Function(_)))
        .collect();

    for decl in functions {
        let DeclKind::Function(f) = &module.decl(decl).kind else { continue };
        let name = f.name.clone();
        if name.as_str() != "copy" && name.as_str() != "drop" {
            continue;
        }
        let params = f.params.clone();
        let return_type = f.return_type.clone();
        let location = module.decl(decl).location;

        if params.len() != 1 {
            sink.emit(Diagnostic::new(
                location,
                DiagnosticKind::ReturnTypeMismatch { expected: "(*Self)".into(), found: format!("{} params", params.len()) },
                format!("`{name}` must take exactly one pointer-to-self parameter"),
            ));
            continue;
        }
        let DeclKind::Param(p) = &module.decl(params[0]).kind else { continue };
        if !p.ty.is_pointer() {
            sink.emit(Diagnostic::new(
                location,
                DiagnosticKind::TypeMismatch { expected: "*Self".into(), found: p.ty.to_string() },
                format!("`{name}`'s parameter must be a pointer to the enclosing struct"),
            ));
            continue;
        }
        let self_ty = match &*p.ty {
            crate::types::Type::Pointer(inner) => (**inner).clone(),
            _ => continue,
        };
        let expected_return = if name.as_str() == "copy" { self_ty } else { module.types.intern(crate::types::Type::Void) };
        if return_type != expected_return {
            sink.emit(Diagnostic::new(
                location,
                DiagnosticKind::ReturnTypeMismatch { expected: expected_return.to_string(), found: return_type.to_string() },
                format!("`{name}` must return `{expected_return}`"),
            ));
        }
    }
}

/// Validates a single `main` function's signature at the root module (spec
/// `SPEC_FULL.md` supplemental feature list: "gated so it only runs for the
/// root module"). The original requires `main` to take no parameters and
/// return an integer type.
pub fn entry_point(module: &mut Module, sink: &mut DiagnosticSink) {
    let mains: Vec<DeclIdx> = module
        .top_level
        .iter()
        .copied()
        .filter(|&d| match &module.decl(d).kind {
            DeclKind::Function(f) => f.name.as_str() == "main",
            _ => false,
        })
        .collect();

    let Some(&main_decl) = mains.first() else { return };
    let DeclKind::Function(f) = &module.decl(main_decl).kind else { return };
    let location = module.decl(main_decl).location;

    if !f.params.is_empty() {
        sink.emit(Diagnostic::new(
            location,
            DiagnosticKind::ReturnTypeMismatch { expected: "()".into(), found: format!("{} params", f.params.len()) },
            "`main` must take no parameters",
        ));
    }
    if !f.return_type.is_integer() {
        sink.emit(Diagnostic::new(
            location,
            DiagnosticKind::ReturnTypeMismatch { expected: "an integer type".into(), found: f.return_type.to_string() },
            "`main` must return an integer type",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{EnumDecl, FieldDecl, FunctionDecl};
    use crate::types::{IntWidth, Type};

    #[test]
    fn enum_cases_without_explicit_values_get_sequential_ones() {
        let mut module = Module::new("test");
        let a = module.alloc_decl(SourceLocation::DETACHED, None, DeclKind::Field(FieldDecl { name: "A".into(), ty: module.types.intern(Type::Int { signed: true, width: IntWidth::I32 }), default: None, case_value: None }));
        let b = module.alloc_decl(SourceLocation::DETACHED, None, DeclKind::Field(FieldDecl { name: "B".into(), ty: module.types.intern(Type::Int { signed: true, width: IntWidth::I32 }), default: None, case_value: None }));
        module.add_top_level_decl(SourceLocation::DETACHED, DeclKind::Enum(EnumDecl { name: "E".into(), cases: vec![a, b], representable_type: None }));

        let mut sink = DiagnosticSink::new();
        enum_values(&mut module, &mut sink);
        assert!(!sink.has_errors());
        let DeclKind::Field(fa) = &module.decl(a).kind else { unreachable!() };
        let DeclKind::Field(fb) = &module.decl(b).kind else { unreachable!() };
        assert_eq!(fa.case_value, Some(0));
        assert_eq!(fb.case_value, Some(1));
    }

    #[test]
    fn duplicate_top_level_functions_are_reported() {
        let mut module = Module::new("test");
        let void_ty = module.types.intern(Type::Void);
        module.add_top_level_decl(SourceLocation::DETACHED, DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: void_ty.clone(), body: None, is_variadic: false }));
        module.add_top_level_decl(SourceLocation::DETACHED, DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: void_ty, body: None, is_variadic: false }));

        let mut sink = DiagnosticSink::new();
        duplicate_decls(&mut module, &mut sink);
        assert!(sink.has_errors());
        assert!(matches!(sink.diagnostics()[0].kind, DiagnosticKind::DuplicateDeclaration { .. }));
    }

    #[test]
    fn statement_after_return_is_flagged_unreachable() {
        let mut module = Module::new("test");
        let void_ty = module.types.intern(Type::Void);
        let ret = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Return(crate::ast::ReturnStmt { value: None }));
        let int_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let lit = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(crate::ast::LiteralExpr::Int(0.into())), int_ty);
        let stray = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Expression(lit));
        let body = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(crate::ast::CompoundStmt { stmts: vec![ret, stray] }));
        module.add_top_level_decl(SourceLocation::DETACHED, DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: void_ty, body: Some(body), is_variadic: false }));

        let mut sink = DiagnosticSink::new();
        unreachable_code(&mut module, &mut sink);
        assert!(!sink.has_errors(), "unreachable code is a warning, not an error");
        assert!(matches!(sink.diagnostics()[0].kind, DiagnosticKind::UnreachableCode));
    }

    #[test]
    fn multi_character_literal_targeting_char_is_rejected() {
        let mut module = Module::new("test");
        let char_ty = module.types.intern(Type::Char);
        module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::Literal(crate::ast::LiteralExpr::String("ab".into())),
            char_ty,
        );

        let mut sink = DiagnosticSink::new();
        char_literal_length(&mut module, &mut sink);
        assert!(sink.has_errors());
        assert!(matches!(sink.diagnostics()[0].kind, DiagnosticKind::InvalidLiteralForTarget { .. }));
    }

    #[test]
    fn single_character_literal_targeting_char_is_accepted() {
        let mut module = Module::new("test");
        let char_ty = module.types.intern(Type::Char);
        module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::Literal(crate::ast::LiteralExpr::String("a".into())),
            char_ty,
        );

        let mut sink = DiagnosticSink::new();
        char_literal_length(&mut module, &mut sink);
        assert!(!sink.has_errors());
    }

    #[test]
    fn entry_checker_rejects_main_with_parameters() {
        let mut module = Module::new("test");
        let int_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let param = module.alloc_decl(SourceLocation::DETACHED, None, DeclKind::Param(crate::ast::ParamDecl { name: "argc".into(), ty: int_ty.clone() }));
        module.add_top_level_decl(SourceLocation::DETACHED, DeclKind::Function(FunctionDecl { name: "main".into(), params: vec![param], return_type: int_ty, body: None, is_variadic: false }));

        let mut sink = DiagnosticSink::new();
        entry_point(&mut module, &mut sink);
        assert!(sink.has_errors());
    }
}
