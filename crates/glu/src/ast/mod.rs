//! The AST node hierarchy (spec §3 "AST").
//!
//! Ported from the original source's `ASTNode`/`DeclBase`/`ASTContext`
//! (`examples/original_source/include/AST/ASTNode.hpp`,
//! `ASTContext`-equivalent arena ownership) per spec Design Notes §9: a
//! closed sum type per node category (`Decl`, `Stmt`, `Expr`), stored in a
//! per-category [`crate::arena::Arena`] owned by [`Module`], with parent
//! back-pointers represented as non-owning [`NodeRef`] indices instead of
//! raw pointers.

pub mod decl;
pub mod expr;
pub mod printer;
pub mod stmt;
pub mod visitor;

use ecow::EcoString;

use crate::arena::{Arena, Idx};
use crate::ids::DeclId;
use crate::intern::Interned;
use crate::source::SourceLocation;
use crate::types::{Type, TypeInterner};

pub use decl::{Attribute, Decl, DeclKind, EnumDecl, FieldDecl, FunctionDecl, ImportDecl, ParamDecl, StructDecl, TemplateParameterDecl, VarLetDecl};
pub use expr::{
    BinaryOpExpr, CallExpr, CastExpr, Expr, ExprKind, LiteralExpr, RefExpr, StructInitializerExpr,
    StructMemberExpr, TernaryConditionalExpr, UnaryOpExpr,
};
pub use stmt::{AssignOp, AssignStmt, CompoundStmt, ForStmt, IfStmt, ReturnStmt, Stmt, StmtKind, WhileStmt};

pub type DeclIdx = Idx<Decl>;
pub type StmtIdx = Idx<Stmt>;
pub type ExprIdx = Idx<Expr>;

/// A non-owning reference to any node in the tree, used for parent
/// back-pointers and as the "slot owner" argument to the child replacer
/// (spec §4.4 item 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Decl(DeclIdx),
    Stmt(StmtIdx),
    Expr(ExprIdx),
}

/// The root of a compilation unit (spec §3 "Module"): an ordered sequence
/// of top-level decls, owning every AST node and the structural-type
/// interner for this compilation unit.
pub struct Module {
    pub name: String,
    pub decls: Arena<Decl>,
    pub stmts: Arena<Stmt>,
    pub exprs: Arena<Expr>,
    pub top_level: Vec<DeclIdx>,
    pub types: TypeInterner,
    type_var_counter: u32,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            decls: Arena::new(),
            stmts: Arena::new(),
            exprs: Arena::new(),
            top_level: Vec::new(),
            types: TypeInterner::new(),
            type_var_counter: 0,
        }
    }

    pub fn fresh_type_variable(&mut self) -> Interned<Type> {
        self.types.fresh_type_variable(&mut self.type_var_counter)
    }

    /// Allocates a declaration, registers it as top-level, and returns its
    /// index. Top-level decls have no AST parent (spec §3: "Root of a
    /// compilation unit; no parent").
    pub fn add_top_level_decl(&mut self, location: SourceLocation, kind: DeclKind) -> DeclIdx {
        let id = self.alloc_decl(location, None, kind);
        self.top_level.push(id);
        id
    }

    pub fn alloc_decl(&mut self, location: SourceLocation, parent: Option<NodeRef>, kind: DeclKind) -> DeclIdx {
        self.decls.alloc(Decl { location, parent, kind, attributes: Vec::new() })
    }

    pub fn alloc_stmt(&mut self, location: SourceLocation, parent: Option<NodeRef>, kind: StmtKind) -> StmtIdx {
        self.stmts.alloc(Stmt { location, parent, kind })
    }

    /// Allocates an expression with a fresh type variable as its initial
    /// result type (spec §4.3 phase 2: "assigns an initial result type (a
    /// fresh type variable if unknown)").
    pub fn alloc_expr(&mut self, location: SourceLocation, parent: Option<NodeRef>, kind: ExprKind) -> ExprIdx {
        let ty = self.fresh_type_variable();
        self.exprs.alloc(Expr { location, parent, ty, kind })
    }

    pub fn alloc_expr_typed(
        &mut self,
        location: SourceLocation,
        parent: Option<NodeRef>,
        kind: ExprKind,
        ty: Interned<Type>,
    ) -> ExprIdx {
        self.exprs.alloc(Expr { location, parent, ty, kind })
    }

    pub fn decl_id(&self, idx: DeclIdx) -> DeclId {
        DeclId::from(idx)
    }

    /// Recovers the arena index behind an opaque [`DeclId`] (see
    /// `crate::ids`: an id's integer value is exactly the `Idx` it was
    /// minted from). Valid only for ids this module actually produced.
    pub fn decl_idx_from_id(&self, id: DeclId) -> DeclIdx {
        Idx::from_raw(id.0)
    }

    pub fn decl(&self, idx: DeclIdx) -> &Decl {
        &self.decls[idx]
    }
    pub fn decl_mut(&mut self, idx: DeclIdx) -> &mut Decl {
        &mut self.decls[idx]
    }
    pub fn stmt(&self, idx: StmtIdx) -> &Stmt {
        &self.stmts[idx]
    }
    pub fn stmt_mut(&mut self, idx: StmtIdx) -> &mut Stmt {
        &mut self.stmts[idx]
    }
    pub fn expr(&self, idx: ExprIdx) -> &Expr {
        &self.exprs[idx]
    }
    pub fn expr_mut(&mut self, idx: ExprIdx) -> &mut Expr {
        &mut self.exprs[idx]
    }

    /// Finds a declaration's identifier, for diagnostics/printing.
    pub fn decl_name(&self, idx: DeclIdx) -> Option<&EcoString> {
        self.decls[idx].kind.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;

    #[test]
    fn top_level_decls_have_no_parent() {
        let mut module = Module::new("test");
        let decl = module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl {
                name: "x".into(),
                declared_type: None,
                resolved_type: module.types.intern(Type::Int { signed: true, width: IntWidth::I32 }),
                initializer: None,
                mutable: false,
            }),
        );
        assert!(module.decl(decl).parent.is_none());
    }

    #[test]
    fn fresh_type_variables_are_distinct() {
        let mut module = Module::new("test");
        let a = module.fresh_type_variable();
        let b = module.fresh_type_variable();
        assert_ne!(a, b);
    }
}
