//! Canonicalization: collapsing `TypeAlias` wrappers (spec §4.2 item 2).

use crate::intern::Interned;
use crate::types::{Type, TypeInterner};

/// Replaces every `TypeAlias(wrapped, ..)` in `ty` with `canonical(wrapped)`,
/// visiting other variants compositionally, and returns the cached
/// canonical pointer via `interner`.
///
/// Idempotent (spec §8, property 5): canonicalizing an already-canonical
/// type reaches the `_ => ty` arm immediately for every variant except
/// `TypeAlias`, and a canonical type never contains a `TypeAlias` node by
/// construction.
pub fn canonicalize(interner: &TypeInterner, ty: &Interned<Type>) -> Interned<Type> {
    match &**ty {
        Type::TypeAlias { wrapped, .. } => canonicalize(interner, wrapped),
        Type::Pointer(inner) => {
            let canon_inner = canonicalize(interner, inner);
            if &canon_inner == inner { ty.clone() } else { interner.pointer(canon_inner) }
        }
        Type::StaticArray { element, count } => {
            let canon_element = canonicalize(interner, element);
            if &canon_element == element {
                ty.clone()
            } else {
                interner.static_array(canon_element, *count)
            }
        }
        Type::DynamicArray(element) => {
            let canon_element = canonicalize(interner, element);
            if &canon_element == element { ty.clone() } else { interner.dynamic_array(canon_element) }
        }
        Type::Function { params, ret, c_variadic } => {
            let canon_params: Vec<_> = params.iter().map(|p| canonicalize(interner, p)).collect();
            let canon_ret = canonicalize(interner, ret);
            if canon_params == *params && canon_ret == *ret {
                ty.clone()
            } else {
                interner.function(canon_params, canon_ret, *c_variadic)
            }
        }
        _ => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceLocation;
    use crate::types::IntWidth;

    #[test]
    fn canonicalization_collapses_aliases() {
        let interner = TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let alias = interner.intern(Type::TypeAlias {
            wrapped: i32_ty.clone(),
            name: "MyInt".into(),
            location: SourceLocation::DETACHED,
        });
        assert_eq!(canonicalize(&interner, &alias), i32_ty);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let interner = TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let ptr = interner.pointer(i32_ty);
        let once = canonicalize(&interner, &ptr);
        let twice = canonicalize(&interner, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn canonicalization_collapses_nested_aliases() {
        let interner = TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let alias = interner.intern(Type::TypeAlias {
            wrapped: i32_ty.clone(),
            name: "MyInt".into(),
            location: SourceLocation::DETACHED,
        });
        let ptr_to_alias = interner.pointer(alias);
        let ptr_to_i32 = interner.pointer(i32_ty);
        assert_eq!(canonicalize(&interner, &ptr_to_alias), ptr_to_i32);
    }
}
