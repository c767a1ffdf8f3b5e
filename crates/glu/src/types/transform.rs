//! A generic type transformer (spec §4.2 item 3), used by the solver to
//! apply a substitution map to a type (spec §4.3 "Substitute(T)").

use crate::intern::Interned;
use crate::types::{Type, TypeInterner};

/// Rebuilds `ty` by visiting every child through `f`, re-interning any
/// structural node whose children actually changed and leaving everything
/// else untouched (cheap `Interned` clone). `f` is applied to every
/// node, including `ty` itself, *before* recursing into children — so a
/// substitution that rewrites `TypeVariable(n)` to some concrete type can
/// short-circuit without visiting (non-existent) children of a variable.
pub fn transform(
    interner: &TypeInterner,
    ty: &Interned<Type>,
    f: &mut dyn FnMut(&Interned<Type>) -> Option<Interned<Type>>,
) -> Interned<Type> {
    if let Some(replaced) = f(ty) {
        return replaced;
    }
    match &**ty {
        Type::Pointer(inner) => {
            let new_inner = transform(interner, inner, f);
            if &new_inner == inner { ty.clone() } else { interner.pointer(new_inner) }
        }
        Type::StaticArray { element, count } => {
            let new_element = transform(interner, element, f);
            if &new_element == element {
                ty.clone()
            } else {
                interner.static_array(new_element, *count)
            }
        }
        Type::DynamicArray(element) => {
            let new_element = transform(interner, element, f);
            if &new_element == element { ty.clone() } else { interner.dynamic_array(new_element) }
        }
        Type::Function { params, ret, c_variadic } => {
            let new_params: Vec<_> = params.iter().map(|p| transform(interner, p, f)).collect();
            let new_ret = transform(interner, ret, f);
            if new_params == *params && new_ret == *ret {
                ty.clone()
            } else {
                interner.function(new_params, new_ret, *c_variadic)
            }
        }
        Type::TypeAlias { wrapped, name, location } => {
            let new_wrapped = transform(interner, wrapped, f);
            if &new_wrapped == wrapped {
                ty.clone()
            } else {
                interner.intern(Type::TypeAlias { wrapped: new_wrapped, name: name.clone(), location: *location })
            }
        }
        _ => ty.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntWidth;

    #[test]
    fn transform_rewrites_matching_variable() {
        let interner = TypeInterner::new();
        let var = interner.intern(Type::TypeVariable(0));
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let ptr_of_var = interner.pointer(var);

        let result = transform(&interner, &ptr_of_var, &mut |t| match &**t {
            Type::TypeVariable(0) => Some(i32_ty.clone()),
            _ => None,
        });
        assert_eq!(result, interner.pointer(i32_ty));
    }

    #[test]
    fn transform_is_identity_with_no_match() {
        let interner = TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let ptr = interner.pointer(i32_ty);
        let result = transform(&interner, &ptr, &mut |_| None);
        assert_eq!(result, ptr);
    }
}
