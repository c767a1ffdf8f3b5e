//! Instruction kinds and operands (spec §4.5 "Instruction families", the
//! family table reproduced in `gil::mod`'s module doc comment).
//!
//! Grounded in the original source's per-instruction-class headers
//! (`examples/original_source/include/GIL/Instructions/*.hpp`: one class per
//! mnemonic, e.g. `IntegerLiteralInst`, `StructExtractInst`, `CopyInst`),
//! collapsed here into one closed [`InstKind`] sum per spec Design Notes §9
//! "Closed hierarchies & dispatch" rather than a class per mnemonic.
//!
//! A result's type is *not* duplicated on every variant: [`super::Instruction::result_ty`]
//! already carries it (spec §4.5 family table's "Result" column), so a
//! variant only carries an extra type field where the mnemonic's own syntax
//! shows one that isn't simply the result type (e.g. `integer_literal T, n`
//! writes `T` even though it equals the result type, matching the textual
//! grammar in spec §6; `int_trunc`'s destination width, by contrast, *is*
//! exactly the result type, so it isn't repeated).

use ecow::EcoString;
use num_bigint::BigInt;
use smallvec::{smallvec, SmallVec};

use super::{BlockIdx, FuncIdx, GlobalIdx, Symbol, ValueId};
use crate::intern::Interned;
use crate::types::Type;

/// Almost every instruction family has 0-4 operands (spec §4.5's family
/// table); `Call`/`Br`/`CondBr` with a long argument list are the rare
/// exception, and `SmallVec` spills to the heap for those same as a `Vec`
/// would, so there's no correctness cost to picking an inline capacity
/// sized for the common case.
pub type Operands = SmallVec<[Operand; 4]>;

/// Arithmetic family opcodes (spec §4.5 table row "Arithmetic").
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    #[strum(serialize = "fadd")]
    FAdd,
    #[strum(serialize = "fsub")]
    FSub,
    #[strum(serialize = "fmul")]
    FMul,
    #[strum(serialize = "fdiv")]
    FDiv,
    #[strum(serialize = "frem")]
    FRem,
}

/// Conversion family opcodes (spec §4.5 table row "Conversion"). The
/// destination type is always the instruction's `result_ty`; these carry no
/// type of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ConversionOp {
    Bitcast,
    #[strum(serialize = "int_trunc")]
    IntTrunc,
    #[strum(serialize = "int_sext")]
    IntSExt,
    #[strum(serialize = "int_zext")]
    IntZExt,
    #[strum(serialize = "int_to_float")]
    IntToFloat,
    #[strum(serialize = "float_to_int")]
    FloatToInt,
    #[strum(serialize = "float_ext")]
    FloatExt,
    #[strum(serialize = "float_trunc")]
    FloatTrunc,
    #[strum(serialize = "cast_ptr_to_int")]
    PtrToInt,
    #[strum(serialize = "cast_int_to_ptr")]
    IntToPtr,
}

/// `store`'s ownership annotation (spec §4.5 table row "Memory": "`store v,
/// *T` with ownership mode {None, Init, Set, Trivial}"). Distinguishes a
/// plain bitwise store (`Trivial`, no OSSA obligation), a store into
/// previously-uninitialized memory (`Init`, no old value to drop), a store
/// that replaces a live value (`Set`, the old value must be dropped first),
/// and a store the OSSA checker hasn't classified yet (`None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipMode {
    None,
    Init,
    Set,
    Trivial,
}

/// The callee of a `call` instruction: a statically known symbol, or a
/// first-class function-pointer value (spec §4.5 table row "Call": "callee
/// is symbol or function-pointer value").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Symbol(Symbol),
    Value(ValueId),
}

/// One instruction's opcode and its operands, minus the shared fields
/// ([`super::Instruction::result_ty`], `location`) already hoisted onto
/// `Instruction` itself.
#[derive(Debug, Clone)]
pub enum InstKind {
    // --- Terminator (spec §4.5 table row "Terminator") ---
    Br {
        target: BlockIdx,
        args: Vec<ValueId>,
    },
    CondBr {
        cond: ValueId,
        then_block: BlockIdx,
        then_args: Vec<ValueId>,
        else_block: BlockIdx,
        else_args: Vec<ValueId>,
    },
    Return {
        value: Option<ValueId>,
    },
    Unreachable,

    // --- Constant ---
    IntegerLiteral {
        ty: Interned<Type>,
        value: BigInt,
    },
    FloatLiteral {
        ty: Interned<Type>,
        value: f64,
    },
    StringLiteral {
        ty: Interned<Type>,
        value: EcoString,
    },
    FunctionPtr {
        func: FuncIdx,
    },
    GlobalPtr {
        global: GlobalIdx,
    },
    EnumVariant {
        ty: Interned<Type>,
        case: EcoString,
    },

    // --- Arithmetic ---
    Arithmetic {
        op: ArithOp,
        lhs: ValueId,
        rhs: ValueId,
    },

    // --- Conversion ---
    Convert {
        op: ConversionOp,
        value: ValueId,
    },

    // --- Memory ---
    /// `alloca T -> *T`; the pointee type `T` is `result_ty`'s `Pointer`
    /// payload, so this carries no field of its own.
    Alloca,
    Load {
        ptr: ValueId,
    },
    Store {
        value: ValueId,
        ptr: ValueId,
        ownership: OwnershipMode,
    },

    // --- Aggregate ---
    ArrayCreate {
        element_ty: Interned<Type>,
        elements: Vec<ValueId>,
    },
    StructCreate {
        fields: Vec<ValueId>,
    },
    StructExtract {
        value: ValueId,
        field: EcoString,
    },
    /// `struct_field_ptr *S, #F -> *F`; the field-pointer result type is
    /// `result_ty`.
    StructFieldPtr {
        ptr: ValueId,
        field: EcoString,
    },
    PtrOffset {
        ptr: ValueId,
        index: ValueId,
    },

    // --- Call ---
    Call {
        callee: Callee,
        args: Vec<ValueId>,
    },

    // --- Debug ---
    Debug {
        value: ValueId,
        kind: EcoString,
        name: EcoString,
    },

    // --- OSSA (spec §4.5 "Ownership (OSSA)") ---
    Drop {
        value: ValueId,
    },
    Copy {
        value: ValueId,
    },
    Move {
        value: ValueId,
    },
    ImmutableBorrow {
        value: ValueId,
    },
    MutableBorrow {
        value: ValueId,
    },
    EndBorrow {
        borrow: ValueId,
    },
}

/// A single operand, generically typed (spec §4.5 "Operands": "tagged
/// union over ... SSA value, integer literal, ..., member reference
/// (parent-type + name), basic-block label"). [`InstKind`]'s variants carry
/// strongly typed fields for normal construction and pattern matching; this
/// exists for passes that need to walk *any* instruction's operands
/// uniformly (spec §4.6's pass contract), grounded in the original's
/// `InstBase::getOperandCount`/`getOperand` used by
/// `EraseCopyOnStructExtractPass` to build a generic use-map
/// (`examples/original_source/lib/Optimizer/GILPasses/
/// EraseCopyOnStructExtractPass.cpp`).
#[derive(Debug, Clone)]
pub enum Operand {
    Value(ValueId),
    Block(BlockIdx),
    Function(FuncIdx),
    Global(GlobalIdx),
    Type(Interned<Type>),
    Member(EcoString),
    Int(BigInt),
    Float(f64),
    Str(EcoString),
}

impl InstKind {
    /// Every operand this instruction reads, in the tagged-union shape
    /// passes consume generically (spec §4.5 "Operands"). Result type and
    /// source location are not operands; they live on `Instruction`.
    pub fn operands(&self) -> Operands {
        match self {
            InstKind::Br { target, args } => {
                let mut ops: Operands = smallvec![Operand::Block(*target)];
                ops.extend(args.iter().copied().map(Operand::Value));
                ops
            }
            InstKind::CondBr { cond, then_block, then_args, else_block, else_args } => {
                let mut ops: Operands = smallvec![Operand::Value(*cond), Operand::Block(*then_block)];
                ops.extend(then_args.iter().copied().map(Operand::Value));
                ops.push(Operand::Block(*else_block));
                ops.extend(else_args.iter().copied().map(Operand::Value));
                ops
            }
            InstKind::Return { value } => value.iter().copied().map(Operand::Value).collect(),
            InstKind::Unreachable => Operands::new(),

            InstKind::IntegerLiteral { ty, .. } | InstKind::FloatLiteral { ty, .. } | InstKind::StringLiteral { ty, .. } => {
                smallvec![Operand::Type(ty.clone())]
            }
            InstKind::FunctionPtr { func } => smallvec![Operand::Function(*func)],
            InstKind::GlobalPtr { global } => smallvec![Operand::Global(*global)],
            InstKind::EnumVariant { ty, case } => smallvec![Operand::Type(ty.clone()), Operand::Member(case.clone())],

            InstKind::Arithmetic { lhs, rhs, .. } => smallvec![Operand::Value(*lhs), Operand::Value(*rhs)],
            InstKind::Convert { value, .. } => smallvec![Operand::Value(*value)],

            InstKind::Alloca => Operands::new(),
            InstKind::Load { ptr } => smallvec![Operand::Value(*ptr)],
            InstKind::Store { value, ptr, .. } => smallvec![Operand::Value(*value), Operand::Value(*ptr)],

            InstKind::ArrayCreate { element_ty, elements } => {
                let mut ops: Operands = smallvec![Operand::Type(element_ty.clone())];
                ops.extend(elements.iter().copied().map(Operand::Value));
                ops
            }
            InstKind::StructCreate { fields } => fields.iter().copied().map(Operand::Value).collect(),
            InstKind::StructExtract { value, field } => smallvec![Operand::Value(*value), Operand::Member(field.clone())],
            InstKind::StructFieldPtr { ptr, field } => smallvec![Operand::Value(*ptr), Operand::Member(field.clone())],
            InstKind::PtrOffset { ptr, index } => smallvec![Operand::Value(*ptr), Operand::Value(*index)],

            InstKind::Call { callee, args } => {
                let mut ops: Operands = match callee {
                    Callee::Symbol(Symbol::Function(f)) => smallvec![Operand::Function(*f)],
                    Callee::Symbol(Symbol::Global(g)) => smallvec![Operand::Global(*g)],
                    Callee::Value(v) => smallvec![Operand::Value(*v)],
                };
                ops.extend(args.iter().copied().map(Operand::Value));
                ops
            }

            InstKind::Debug { value, kind, name } => {
                smallvec![Operand::Value(*value), Operand::Str(kind.clone()), Operand::Str(name.clone())]
            }

            InstKind::Drop { value }
            | InstKind::Copy { value }
            | InstKind::Move { value }
            | InstKind::ImmutableBorrow { value }
            | InstKind::MutableBorrow { value } => smallvec![Operand::Value(*value)],
            InstKind::EndBorrow { borrow } => smallvec![Operand::Value(*borrow)],
        }
    }

    /// Just the `ValueId` operands, in order; the common case for passes
    /// that only care about SSA use-def edges (e.g. dead-copy elimination).
    pub fn value_operands(&self) -> impl Iterator<Item = ValueId> + '_ {
        self.operands().into_iter().filter_map(|op| match op {
            Operand::Value(v) => Some(v),
            _ => None,
        })
    }

    /// The mnemonic this kind prints as (spec §6 grammar: `%n = op
    /// operands, ...`).
    pub fn mnemonic(&self) -> String {
        match self {
            InstKind::Br { .. } => "br".to_string(),
            InstKind::CondBr { .. } => "cond_br".to_string(),
            InstKind::Return { .. } => "return".to_string(),
            InstKind::Unreachable => "unreachable".to_string(),
            InstKind::IntegerLiteral { .. } => "integer_literal".to_string(),
            InstKind::FloatLiteral { .. } => "float_literal".to_string(),
            InstKind::StringLiteral { .. } => "string_literal".to_string(),
            InstKind::FunctionPtr { .. } => "function_ptr".to_string(),
            InstKind::GlobalPtr { .. } => "global_ptr".to_string(),
            InstKind::EnumVariant { .. } => "enum_variant".to_string(),
            InstKind::Arithmetic { op, .. } => op.to_string().to_lowercase(),
            InstKind::Convert { op, .. } => op.to_string(),
            InstKind::Alloca => "alloca".to_string(),
            InstKind::Load { .. } => "load".to_string(),
            InstKind::Store { .. } => "store".to_string(),
            InstKind::ArrayCreate { .. } => "array_create".to_string(),
            InstKind::StructCreate { .. } => "struct_create".to_string(),
            InstKind::StructExtract { .. } => "struct_extract".to_string(),
            InstKind::StructFieldPtr { .. } => "struct_field_ptr".to_string(),
            InstKind::PtrOffset { .. } => "ptr_offset".to_string(),
            InstKind::Call { .. } => "call".to_string(),
            InstKind::Debug { .. } => "debug".to_string(),
            InstKind::Drop { .. } => "drop".to_string(),
            InstKind::Copy { .. } => "copy".to_string(),
            InstKind::Move { .. } => "move".to_string(),
            InstKind::ImmutableBorrow { .. } => "immutable_borrow".to_string(),
            InstKind::MutableBorrow { .. } => "mutable_borrow".to_string(),
            InstKind::EndBorrow { .. } => "end_borrow".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gil::InstIdx;
    use crate::arena::Idx;

    #[test]
    fn operands_of_a_copy_is_exactly_its_source_value() {
        let src = ValueId::Inst(Idx::from_raw(0));
        let kind = InstKind::Copy { value: src };
        let ops: Vec<ValueId> = kind.value_operands().collect();
        assert_eq!(ops, vec![src]);
    }

    #[test]
    fn struct_extract_operands_are_value_then_member() {
        let src = ValueId::Inst(Idx::from_raw(0));
        let kind = InstKind::StructExtract { value: src, field: "x".into() };
        match &kind.operands()[..] {
            [Operand::Value(v), Operand::Member(name)] => {
                assert_eq!(*v, src);
                assert_eq!(name.as_str(), "x");
            }
            other => panic!("unexpected operand shape: {other:?}"),
        }
    }

    #[test]
    fn mnemonics_match_the_textual_grammar() {
        assert_eq!(InstKind::Unreachable.mnemonic(), "unreachable");
        assert_eq!(InstKind::Arithmetic { op: ArithOp::FAdd, lhs: ValueId::Inst(InstIdx::from_raw(0)), rhs: ValueId::Inst(InstIdx::from_raw(0)) }.mnemonic(), "fadd");
        assert_eq!(InstKind::Convert { op: ConversionOp::IntTrunc, value: ValueId::Inst(InstIdx::from_raw(0)) }.mnemonic(), "int_trunc");
    }
}
