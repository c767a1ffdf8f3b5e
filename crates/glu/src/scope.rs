//! The scope tree Sema's phase 1 builds over a module (spec §4.3 "Phase 1:
//! Scope construction"), plus the import-resolution collaborator contracts
//! from spec §6.
//!
//! Grounded in the original source's scope handling
//! (`examples/original_source/include/GILGen/Scope.hpp` models the GIL-gen
//! side; Sema's own scope table is implicit there in `TypeConstraintSolver`
//! and friends). The arena-of-scopes shape mirrors this crate's AST arenas:
//! a scope is identified by a stable [`ScopeId`], children point back to
//! their parent, and nothing is ever freed until the whole tree is dropped
//! (spec §5: "Scope arena: owned by the import manager; lives for the
//! duration of semantic analysis").

use ecow::EcoString;
use indexmap::IndexMap;

use crate::arena::{Arena, Idx};
use crate::ids::{DeclId, ScopeId};

/// What kind of AST construct introduced a scope (spec §4.3 phase 1: "at
/// each compound statement, function, and for-statement, a child scope is
/// pushed"). GIL-gen's own break/continue-destination bookkeeping is a
/// separate, unrelated notion of "scope" tracked in `gil::gen`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Module,
    Function,
    /// A `{ ... }` compound statement, or the binding scope introduced by a
    /// `for` loop.
    Block,
}

/// One scope table: an ordered name -> declarations map (ordered because
/// overload sets preserve declaration order, spec §3: "maps names to
/// ordered lists of declarations (for overloading)"), plus a parent link.
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub kind: ScopeKind,
    names: IndexMap<EcoString, Vec<DeclId>>,
}

impl Scope {
    pub fn declarations(&self, name: &str) -> Option<&[DeclId]> {
        self.names.get(name).map(Vec::as_slice)
    }
}

/// Owns every [`Scope`] created while analyzing one module.
pub struct ScopeTree {
    scopes: Arena<Scope>,
    root: ScopeId,
}

impl ScopeTree {
    pub fn new() -> Self {
        let mut scopes = Arena::new();
        let root = scopes.alloc(Scope { parent: None, kind: ScopeKind::Module, names: IndexMap::new() });
        ScopeTree { scopes, root: ScopeId::from(root) }
    }

    pub fn root(&self) -> ScopeId {
        self.root
    }

    fn idx(id: ScopeId) -> Idx<Scope> {
        Idx::from_raw(id.0)
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[Self::idx(id)]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[Self::idx(id)]
    }

    /// Pushes a child scope under `parent` (spec §4.3 "at each compound
    /// statement, function, and for-statement, a child scope is pushed").
    pub fn push_child(&mut self, parent: ScopeId, kind: ScopeKind) -> ScopeId {
        let idx = self.scopes.alloc(Scope { parent: Some(parent), kind, names: IndexMap::new() });
        ScopeId::from(idx)
    }

    /// Registers `decl` under `name` in `scope`, appending to any existing
    /// overload set for that name (spec §4.3 "declarations are inserted
    /// into the current scope's name map in source order").
    pub fn declare(&mut self, scope: ScopeId, name: EcoString, decl: DeclId) {
        self.get_mut(scope).names.entry(name).or_default().push(decl);
    }

    /// Walks outward from `scope` toward the root, returning the first
    /// overload set found for `name` (spec §3: "Lookup walks outward").
    /// Imports are expected to already be registered as ordinary entries in
    /// the module (root) scope by the caller, via [`ImportManager`].
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Vec<DeclId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.get(id);
            if let Some(candidates) = s.declarations(name) {
                if !candidates.is_empty() {
                    return candidates.to_vec();
                }
            }
            current = s.parent;
        }
        Vec::new()
    }

}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Collaborator contract (spec §6 "Import manager"): given an import path,
/// returns the externally-defined declarations to register in the
/// importing module's scope. Caching and cycle prevention are the
/// collaborator's responsibility, not this crate's.
pub trait ImportManager {
    fn resolve_import(&self, components: &[EcoString], selectors: Option<&[EcoString]>) -> Vec<DeclId>;
}

/// Collaborator contract (spec §6 "C-header importer"): returns a
/// pre-constructed module populated with function prototypes, struct/enum
/// declarations, and type aliases. Parsing and Clang invocation are
/// explicitly out of scope for this crate (spec §1).
pub trait CHeaderImporter {
    fn import_header(&self, path: &str) -> crate::ast::Module;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward_and_finds_shadowed_names() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let outer_decl = DeclId(0);
        tree.declare(root, "x".into(), outer_decl);

        let child = tree.push_child(root, ScopeKind::Block);
        let inner_decl = DeclId(1);
        tree.declare(child, "x".into(), inner_decl);

        assert_eq!(tree.lookup(child, "x"), vec![inner_decl]);
        assert_eq!(tree.lookup(root, "x"), vec![outer_decl]);
    }

    #[test]
    fn lookup_falls_back_to_parent_when_name_is_absent_locally() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let decl = DeclId(5);
        tree.declare(root, "helper".into(), decl);

        let fn_scope = tree.push_child(root, ScopeKind::Function);
        let block_scope = tree.push_child(fn_scope, ScopeKind::Block);

        assert_eq!(tree.lookup(block_scope, "helper"), vec![decl]);
        assert!(tree.lookup(block_scope, "nonexistent").is_empty());
    }

    #[test]
    fn overload_sets_preserve_declaration_order() {
        let mut tree = ScopeTree::new();
        let root = tree.root();
        let first = DeclId(0);
        let second = DeclId(1);
        tree.declare(root, "plus".into(), first);
        tree.declare(root, "plus".into(), second);
        assert_eq!(tree.lookup(root, "plus"), vec![first, second]);
    }
}
