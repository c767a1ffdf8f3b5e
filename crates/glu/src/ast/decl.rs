//! Declaration nodes (spec §3 table, `Decl` column).
//!
//! Grounded in `examples/original_source/include/AST/Decl/*.hpp`: one
//! payload struct per concrete declaration kind, gathered here under a
//! closed `DeclKind` sum instead of the original's `classof`-based
//! hierarchy (spec Design Notes §9 "Closed hierarchies & dispatch").

use ecow::EcoString;

use crate::ast::{ExprIdx, NodeRef, StmtIdx};
use crate::intern::Interned;
use crate::source::SourceLocation;
use crate::types::Type;

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: EcoString,
    pub args: Vec<ExprIdx>,
    pub location: SourceLocation,
}

/// A single declaration node: source location, non-owning parent pointer,
/// and a kind-specific payload (spec §3: "Every node stores a source
/// location, a parent back-pointer, and a kind tag").
#[derive(Debug, Clone)]
pub struct Decl {
    pub location: SourceLocation,
    pub parent: Option<NodeRef>,
    pub kind: DeclKind,
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Function(FunctionDecl),
    Struct(StructDecl),
    Enum(EnumDecl),
    /// Covers both `VarDecl` (mutable = true) and `LetDecl` (mutable =
    /// false); spec §3 groups them as `VarLetDecl` for exactly this reason.
    Var(VarLetDecl),
    Let(VarLetDecl),
    Import(ImportDecl),
    Param(ParamDecl),
    /// Doubles as a struct field and an enum case, per the original
    /// source's shared `FieldDecl` (spec §3: "Ordered FieldDecl*" for both
    /// `StructDecl` and `EnumDecl`).
    Field(FieldDecl),
    TemplateParam(TemplateParameterDecl),
    /// A `for x in range` loop-binding; mutability follows the original's
    /// `ForBindingDecl` (always immutable, like a `let`).
    ForBinding(VarLetDecl),
}

impl DeclKind {
    pub fn name(&self) -> Option<&EcoString> {
        match self {
            DeclKind::Function(d) => Some(&d.name),
            DeclKind::Struct(d) => Some(&d.name),
            DeclKind::Enum(d) => Some(&d.name),
            DeclKind::Var(d) | DeclKind::Let(d) | DeclKind::ForBinding(d) => Some(&d.name),
            DeclKind::Param(d) => Some(&d.name),
            DeclKind::Field(d) => Some(&d.name),
            DeclKind::TemplateParam(d) => Some(&d.name),
            DeclKind::Import(_) => None,
        }
    }

    /// True for `let`, function parameters, and for-loop bindings — the
    /// three "immutable place" categories spec §7's "Immutable assignment"
    /// error references.
    pub fn is_immutable_place(&self) -> bool {
        matches!(self, DeclKind::Let(_) | DeclKind::Param(_) | DeclKind::ForBinding(_))
    }
}

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub name: EcoString,
    pub params: Vec<crate::ast::DeclIdx>,
    pub return_type: Interned<Type>,
    /// `None` means this is a prototype (spec §3: "if body absent,
    /// declaration is a prototype").
    pub body: Option<StmtIdx>,
    pub is_variadic: bool,
}

impl FunctionDecl {
    pub fn is_prototype(&self) -> bool {
        self.body.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: EcoString,
    pub fields: Vec<crate::ast::DeclIdx>,
}

#[derive(Debug, Clone)]
pub struct EnumDecl {
    pub name: EcoString,
    pub cases: Vec<crate::ast::DeclIdx>,
    pub representable_type: Option<Interned<Type>>,
}

#[derive(Debug, Clone)]
pub struct VarLetDecl {
    pub name: EcoString,
    pub declared_type: Option<Interned<Type>>,
    /// Starts as a fresh type variable if `declared_type` is absent, and is
    /// overwritten with the solved concrete type during write-back (spec
    /// §4.3 "Result disposition").
    pub resolved_type: Interned<Type>,
    pub initializer: Option<ExprIdx>,
    pub mutable: bool,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    pub path: Vec<EcoString>,
    pub selectors: Option<Vec<EcoString>>,
}

#[derive(Debug, Clone)]
pub struct ParamDecl {
    pub name: EcoString,
    pub ty: Interned<Type>,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: EcoString,
    pub ty: Interned<Type>,
    /// Struct fields only; must be a suffix of the field list (spec §3).
    pub default: Option<ExprIdx>,
    /// Enum cases only; resolved by `sema::checks::enum_values`.
    pub case_value: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct TemplateParameterDecl {
    pub name: EcoString,
}
