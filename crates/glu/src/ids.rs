//! Plain identity newtypes shared across modules.
//!
//! `types::Type` needs to name a declaration site (for nominal `Struct`/
//! `Enum`/`TemplateParam` types, spec §3) without depending on the `ast`
//! crate module, and `ast` needs to name a type variable without depending
//! on `sema`. Rather than have those modules depend on each other's arena
//! index types directly (which would cycle: `ast` already depends on
//! `types` for `Expr::ty`), each arena hands out one of these opaque u32
//! identities alongside its real [`crate::arena::Idx`], and every module
//! that only needs identity (not access) stores the newtype.

use std::fmt;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl<T> From<crate::arena::Idx<T>> for $name {
            fn from(idx: crate::arena::Idx<T>) -> Self {
                $name(idx.into_raw())
            }
        }
    };
}

id_newtype!(DeclId);
id_newtype!(StmtId);
id_newtype!(ExprId);
id_newtype!(ScopeId);
id_newtype!(TypeVarId);
id_newtype!(BlockId);
id_newtype!(ValueId);
