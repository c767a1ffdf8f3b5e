//! The closed type sum (spec §3 "Types").
//!
//! Modeled on the teacher's `ty::def::Ty` (`tinymist-query/src/ty/def.rs`):
//! a single enum covering primitives, structural compounds, nominal types,
//! and inference-only placeholders, with structural children stored behind
//! [`Interned`] so that recursive equality/hash stays cheap and pointer
//! equality of a structural type implies structural equality (spec §8,
//! property 4). Nominal types (`Struct`, `Enum`) are identified by
//! declaration site and are deliberately *not* interned (spec §3: "NOT for
//! nominal structs/enums which are identified by their declaration site").

pub mod canon;
pub mod transform;

use std::fmt;

use ecow::EcoString;

use crate::ids::DeclId;
use crate::intern::{Interned, Interner};
use crate::source::SourceLocation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntWidth {
    I8,
    I16,
    I32,
    I64,
    I128,
}

impl IntWidth {
    pub fn bits(self) -> u32 {
        match self {
            IntWidth::I8 => 8,
            IntWidth::I16 => 16,
            IntWidth::I32 => 32,
            IntWidth::I64 => 64,
            IntWidth::I128 => 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FloatWidth {
    F16,
    F32,
    F64,
    F80,
    F128,
}

impl FloatWidth {
    pub fn bits(self) -> u32 {
        match self {
            FloatWidth::F16 => 16,
            FloatWidth::F32 => 32,
            FloatWidth::F64 => 64,
            FloatWidth::F80 => 80,
            FloatWidth::F128 => 128,
        }
    }
}

/// The closed type sum from spec §3. `Type` is what gets interned (via
/// [`TypeInterner`]) for structural variants; equality/hash are therefore
/// derived directly, because:
/// - primitive variants compare by their own derived fields (kind + width),
/// - structural variants compare by recursive `Interned` children, which
///   already carry pointer-equality-implies-structural-equality,
/// - nominal variants compare by `DeclId`, which is exactly "declaration
///   site identity",
/// - `TypeAlias` compares by `(wrapped, name, location)` as spec §3
///   prescribes,
/// - `UnresolvedName` compares by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Char,
    Int { signed: bool, width: IntWidth },
    Float(FloatWidth),
    Null,

    Pointer(Interned<Type>),
    StaticArray { element: Interned<Type>, count: u64 },
    DynamicArray(Interned<Type>),
    Function { params: Vec<Interned<Type>>, ret: Interned<Type>, c_variadic: bool },

    Struct(DeclId),
    Enum(DeclId),
    TypeAlias { wrapped: Interned<Type>, name: EcoString, location: SourceLocation },

    TypeVariable(u32),
    TemplateParam(DeclId),
    UnresolvedName(EcoString),
}

impl Type {
    pub fn is_type_variable(&self) -> bool {
        matches!(self, Type::TypeVariable(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }

    /// Every `TypeVariable` appearing anywhere in this type, including
    /// nested structural children. Used by the solver's color-class
    /// partition (spec §4.3 "Solver loop") and by the universal invariant
    /// check (spec §8, property 1).
    pub fn collect_type_variables(&self, out: &mut Vec<u32>) {
        match self {
            Type::TypeVariable(id) => out.push(*id),
            Type::Pointer(inner) | Type::DynamicArray(inner) => inner.collect_type_variables(out),
            Type::StaticArray { element, .. } => element.collect_type_variables(out),
            Type::Function { params, ret, .. } => {
                for p in params {
                    p.collect_type_variables(out);
                }
                ret.collect_type_variables(out);
            }
            Type::TypeAlias { wrapped, .. } => wrapped.collect_type_variables(out),
            _ => {}
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "Void"),
            Type::Bool => write!(f, "Bool"),
            Type::Char => write!(f, "Char"),
            Type::Int { signed, width } => {
                write!(f, "{}{}", if *signed { "Int" } else { "UInt" }, width.bits())
            }
            Type::Float(w) => write!(f, "Float{}", w.bits()),
            Type::Null => write!(f, "Null"),
            Type::Pointer(inner) => write!(f, "*{inner}"),
            Type::StaticArray { element, count } => write!(f, "[{element}; {count}]"),
            Type::DynamicArray(element) => write!(f, "[{element}]"),
            Type::Function { params, ret, c_variadic } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                if *c_variadic {
                    write!(f, ", ...")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Struct(decl) => write!(f, "struct#{decl:?}"),
            Type::Enum(decl) => write!(f, "enum#{decl:?}"),
            Type::TypeAlias { name, .. } => write!(f, "{name}"),
            Type::TypeVariable(id) => write!(f, "$T{id}"),
            Type::TemplateParam(decl) => write!(f, "templateparam#{decl:?}"),
            Type::UnresolvedName(name) => write!(f, "?{name}"),
        }
    }
}

/// Owns the structural-type interning table. One instance per module's
/// AST context (spec §5: "Type arena: owned by the AST context; shared
/// read-only by Sema and GIL-gen").
#[derive(Default)]
pub struct TypeInterner {
    types: Interner<Type>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&self, ty: Type) -> Interned<Type> {
        self.types.intern(ty)
    }

    pub fn pointer(&self, pointee: Interned<Type>) -> Interned<Type> {
        self.intern(Type::Pointer(pointee))
    }

    pub fn static_array(&self, element: Interned<Type>, count: u64) -> Interned<Type> {
        self.intern(Type::StaticArray { element, count })
    }

    pub fn dynamic_array(&self, element: Interned<Type>) -> Interned<Type> {
        self.intern(Type::DynamicArray(element))
    }

    pub fn function(&self, params: Vec<Interned<Type>>, ret: Interned<Type>, c_variadic: bool) -> Interned<Type> {
        self.intern(Type::Function { params, ret, c_variadic })
    }

    pub fn fresh_type_variable(&self, counter: &mut u32) -> Interned<Type> {
        let id = *counter;
        *counter += 1;
        self.intern(Type::TypeVariable(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interned_structural_types_compare_by_pointer() {
        let interner = TypeInterner::new();
        let i32_a = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let i32_b = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let ptr_a = interner.pointer(i32_a.clone());
        let ptr_b = interner.pointer(i32_b);
        assert_eq!(ptr_a, ptr_b);
        assert_eq!(ptr_a.as_ptr(), ptr_b.as_ptr());
    }

    #[test]
    fn distinct_structural_types_are_not_equal() {
        let interner = TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let i64_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I64 });
        assert_ne!(i32_ty, i64_ty);
    }
}
