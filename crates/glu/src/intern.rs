//! Content-addressed interning for structural types.
//!
//! Grounded in the teacher's `adt::interner` module
//! (`examples/Myriad-Dreamin-tinymist/crates/tinymist-query/src/adt/interner.rs`):
//! an `Arc`-keyed `DashMap` so that pointer equality implies structural
//! equality (spec §8, testable property 4). We swap `std::sync::Arc` for
//! `triomphe::Arc` (smaller, no weak count) and `fxhash` for `rustc-hash`,
//! matching this crate's workspace dependency choices.
//!
//! Per spec §5 ("Shared-resource policy"): the type arena is owned by the
//! AST context for the lifetime of a module and is read-only once Sema
//! concludes, so a single non-static [`Interner`] instance per
//! [`crate::ast::Module`] plays the role the teacher's process-global map
//! plays for typst values.

use std::fmt;
use std::hash::{BuildHasherDefault, Hash};

use dashmap::DashMap;
use rustc_hash::FxHasher;
use triomphe::Arc;

type Fx = BuildHasherDefault<FxHasher>;

/// A structurally interned, cheaply cloneable pointer.
///
/// `Interned<T> == Interned<T>` is implemented as pointer equality, which
/// is sound only because every instance is produced by [`Interner::intern`]
/// (spec §8, testable property 4: "interned structural types t1, t2:
/// t1 == t2 iff ptr(t1) == ptr(t2)").
pub struct Interned<T: ?Sized> {
    arc: Arc<T>,
}

impl<T: ?Sized> Interned<T> {
    pub fn as_ptr(&self) -> *const T {
        Arc::as_ptr(&self.arc)
    }
}

impl<T: ?Sized> Clone for Interned<T> {
    fn clone(&self) -> Self {
        Interned { arc: self.arc.clone() }
    }
}

impl<T: ?Sized> std::ops::Deref for Interned<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.arc
    }
}

impl<T: ?Sized> PartialEq for Interned<T> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.arc, &other.arc)
    }
}
impl<T: ?Sized> Eq for Interned<T> {}

impl<T: ?Sized> Hash for Interned<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::ptr::hash(self.as_ptr(), state);
    }
}

impl<T: fmt::Debug + ?Sized> fmt::Debug for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.arc, f)
    }
}

impl<T: fmt::Display + ?Sized> fmt::Display for Interned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.arc, f)
    }
}

/// A content-addressed set of `T`s, deduplicating by `Hash + Eq`.
///
/// Used exclusively for structural types (pointer, function, static array,
/// integer/float width, alias) per spec §3 — nominal struct/enum types are
/// identified by declaration site and never go through the interner.
pub struct Interner<T: Hash + Eq + Clone> {
    map: DashMap<T, Interned<T>, Fx>,
}

impl<T: Hash + Eq + Clone> Interner<T> {
    pub fn new() -> Self {
        Interner { map: DashMap::with_hasher(Fx::default()) }
    }

    /// "Find-as" lookup (spec §4.1): `key` is a caller-supplied, possibly
    /// throwaway value; on a hit the existing interned pointer is cloned
    /// and returned, on a miss `key` is promoted into an `Arc` and
    /// inserted.
    pub fn intern(&self, key: T) -> Interned<T> {
        if let Some(existing) = self.map.get(&key) {
            return existing.clone();
        }
        self.map
            .entry(key.clone())
            .or_insert_with(|| Interned { arc: Arc::new(key) })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl<T: Hash + Eq + Clone> Default for Interner<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    struct Pair(i32, i32);

    #[test]
    fn pointer_equality_matches_structural_equality() {
        let interner = Interner::new();
        let a = interner.intern(Pair(1, 2));
        let b = interner.intern(Pair(1, 2));
        let c = interner.intern(Pair(3, 4));
        assert_eq!(a, b);
        assert_eq!(a.as_ptr(), b.as_ptr());
        assert_ne!(a, c);
        assert_eq!(interner.len(), 2);
    }
}
