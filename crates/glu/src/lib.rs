//! The semantic core of the Glu compiler: arena-allocated AST, a
//! constraint-based Sema pass, and the GIL intermediate representation
//! (spec §1 "Purpose & Scope").
//!
//! ```text
//! parsed AST -> Sema (scopes, constraints, unification) -> GIL-gen -> Pass Manager
//! ```
//!
//! Everything upstream of "parsed AST" (lexing, parsing, Clang-based header
//! import) and everything downstream of "lowered GIL" (LLVM emission,
//! linking, CLI/build orchestration) is an external collaborator; this
//! crate only states their contracts (`source`, `diagnostics`, `scope`'s
//! `ImportManager`/`CHeaderImporter` traits).

pub mod arena;
pub mod ast;
pub mod diagnostics;
pub mod gil;
pub mod ids;
pub mod intern;
pub mod scope;
pub mod sema;
pub mod source;
pub mod types;
pub mod verify;

pub use ast::Module;
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use gil::GilModule;
pub use source::{SourceLocation, SourceManager};

/// Runs the full pipeline described in spec §2 over one already-parsed
/// module: Sema (phases 1–3 plus write-back and the supplemental checks),
/// then GIL generation — skipped if Sema reported any error (spec §7
/// "Propagation policy": "if any errors were emitted, GIL generation is
/// skipped").
///
/// `is_root_module` gates the entry-point check (`sema::checks::entry_point`)
/// the same way `sema::analyze` does; pass `true` for the module that owns
/// `main`, `false` for every module reached only through an import.
pub fn compile(module: &mut Module, is_root_module: bool) -> CompileResult {
    let mut sink = DiagnosticSink::new();
    let sema_result = sema::analyze(module, &mut sink, is_root_module);
    let gil = if sema_result.succeeded { Some(gil::gen::generate(module)) } else { None };
    CompileResult { gil, diagnostics: sink.into_diagnostics() }
}

/// The outcome of [`compile`]: a lowered [`GilModule`] when Sema succeeded,
/// plus every diagnostic (errors and warnings alike) accumulated along the
/// way (spec §6 "Output from the core").
pub struct CompileResult {
    pub gil: Option<GilModule>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclKind, ExprKind, FunctionDecl, LiteralExpr, ReturnStmt, StmtKind, VarLetDecl};
    use crate::types::{IntWidth, Type};
    use num_bigint::BigInt;

    /// Scenario 1 end-to-end (spec §8): `let x = 42;` at module scope
    /// compiles cleanly and needs no GIL body (it's not inside a function),
    /// but the pipeline itself must report success with zero diagnostics.
    #[test]
    fn top_level_let_compiles_without_diagnostics() {
        let mut module = Module::new("demo");
        let lit = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(42))));
        let var_ty = module.fresh_type_variable();
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "x".into(), declared_type: None, resolved_type: var_ty, initializer: Some(lit), mutable: false }),
        );

        let result = compile(&mut module, false);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        assert!(result.gil.is_some());
    }

    /// Scenario 4 end-to-end (spec §8): an immutable-assignment error must
    /// suppress GIL generation entirely.
    #[test]
    fn immutable_assignment_error_skips_gil_generation() {
        use crate::ast::{AssignOp, AssignStmt, CompoundStmt, RefExpr};
        use crate::ids::DeclId;

        let mut module = Module::new("demo");
        let int_ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let lit1 = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))), int_ty.clone());
        let z = module.alloc_decl(
            SourceLocation::DETACHED,
            None,
            DeclKind::Let(VarLetDecl { name: "z".into(), declared_type: None, resolved_type: int_ty.clone(), initializer: Some(lit1), mutable: false }),
        );
        let decl_stmt = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Decl(z));

        let lhs = module.alloc_expr_typed(
            SourceLocation::DETACHED,
            None,
            ExprKind::Ref(RefExpr { path: vec!["z".into()], target: Some(DeclId::from(z)), candidates: vec![DeclId::from(z)] }),
            int_ty.clone(),
        );
        let rhs = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(2))), int_ty.clone());
        let assign = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Assign(AssignStmt { lhs, op: AssignOp::Assign, rhs }));

        let ret = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Return(ReturnStmt { value: None }));
        let body = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(CompoundStmt { stmts: vec![decl_stmt, assign, ret] }));
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: module.types.intern(Type::Void), body: Some(body), is_variadic: false }),
        );

        let result = compile(&mut module, false);
        assert!(result.has_errors());
        assert!(result.gil.is_none(), "GIL generation must be skipped once Sema reports an error");
    }
}
