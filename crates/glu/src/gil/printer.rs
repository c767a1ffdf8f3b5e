//! Textual GIL printer (spec §6 "Persisted artifacts": "a textual GIL
//! printer with a stable grammar ... reserved for debugging/testing; not
//! required to round-trip").
//!
//! Grounded in the original's `GILPrinter`
//! (`examples/original_source/include/GIL/GILPrinter.hpp`), which also
//! numbers values by first appearance and resolves `loc` through the same
//! source-manager collaborator this crate's [`crate::source::SourceManager`]
//! models; rendering here goes straight to a `String` rather than an
//! `llvm::raw_ostream`.

use std::fmt::Write as _;

use crate::gil::inst::Operand;
use crate::gil::{BlockIdx, FuncIdx, GilModule, GlobalIdx, InitMode, InstIdx, ValueId};
use crate::intern::Interned;
use crate::source::{SourceManager, SourceLocation};
use crate::types::Type;
use rustc_hash::FxHashMap;

/// Assigns each [`ValueId`] a stable `%n` by first appearance within one
/// function (spec §6: `%n = op operands`), in the same order the original
/// printer numbers its `Value`s: block arguments first, then each block's
/// instructions, in block order.
struct Namer {
    numbers: FxHashMap<ValueId, u32>,
    next: u32,
}

impl Namer {
    fn new() -> Self {
        Namer { numbers: FxHashMap::default(), next: 0 }
    }

    fn name(&mut self, value: ValueId) -> u32 {
        *self.numbers.entry(value).or_insert_with(|| {
            let n = self.next;
            self.next += 1;
            n
        })
    }
}

/// Renders every function and global in `module` (spec §6 grammar: function
/// headers `gil @name : $type { ... }`; block headers `label(args):`;
/// instructions `%n = op operands, loc "file":line:col"`).
pub fn print_module(module: &GilModule, source: Option<&dyn SourceManager>) -> String {
    let mut out = String::new();
    for &global in &module.global_order {
        print_global(&mut out, module, global);
    }
    if !module.global_order.is_empty() {
        out.push('\n');
    }
    for (i, &func) in module.function_order.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        print_function(&mut out, module, func, source);
    }
    out
}

fn print_global(out: &mut String, module: &GilModule, id: GlobalIdx) {
    let g = module.globals.get(id);
    let mode = match g.init_mode {
        InitMode::Eager => "eager",
        InitMode::Lazy => "lazy",
    };
    let _ = writeln!(out, "global @{} : ${} {mode}", g.name, g.ty);
}

fn print_function(out: &mut String, module: &GilModule, id: FuncIdx, source: Option<&dyn SourceManager>) {
    let f = module.functions.get(id);
    let _ = write!(out, "gil @{} : ${}", f.name, f.ty);
    if f.is_prototype {
        let _ = writeln!(out, " // prototype");
        return;
    }
    let _ = writeln!(out, " {{");

    let mut namer = Namer::new();
    for &block in &f.blocks {
        for i in 0..module.blocks.get(block).arg_types.len() {
            namer.name(ValueId::BlockArg(block, i as u32));
        }
        for inst in module.blocks.get(block).iter(&module.insts) {
            if module.insts.get(inst).result_ty.is_some() {
                namer.name(ValueId::Inst(inst));
            }
        }
    }

    for (i, &block) in f.blocks.iter().enumerate() {
        print_block(out, module, block, i, &mut namer, source);
    }
    let _ = writeln!(out, "}}");
}

fn print_block(out: &mut String, module: &GilModule, id: BlockIdx, index: usize, namer: &mut Namer, source: Option<&dyn SourceManager>) {
    let block = module.blocks.get(id);
    let _ = write!(out, "bb{index}(");
    for (i, ty) in block.arg_types.iter().enumerate() {
        if i > 0 {
            let _ = write!(out, ", ");
        }
        let n = namer.name(ValueId::BlockArg(id, i as u32));
        let _ = write!(out, "%{n}: ${ty}");
    }
    let _ = writeln!(out, "):");

    for inst in block.iter(&module.insts) {
        print_inst(out, module, inst, namer, source);
    }
}

fn print_inst(out: &mut String, module: &GilModule, id: InstIdx, namer: &mut Namer, source: Option<&dyn SourceManager>) {
    let inst = module.insts.get(id);
    let mnemonic = inst.kind.mnemonic();

    let _ = write!(out, "  ");
    if inst.result_ty.is_some() {
        let n = namer.name(ValueId::Inst(id));
        let _ = write!(out, "%{n} = ");
    }
    let _ = write!(out, "{mnemonic}");

    match &inst.kind {
        // `br`/`cond_br` group each target's arguments under its own label
        // (spec §6 grammar: `br bb(args)`, `cond_br cond, thenBB(args),
        // elseBB(args)`), which the generic flattened operand list below
        // doesn't express.
        crate::gil::InstKind::Br { target, args } => {
            let _ = write!(out, " {}", format_target(module, *target, args, namer));
        }
        crate::gil::InstKind::CondBr { cond, then_block, then_args, else_block, else_args } => {
            let _ = write!(
                out,
                " %{}, {}, {}",
                namer.name(*cond),
                format_target(module, *then_block, then_args, namer),
                format_target(module, *else_block, else_args, namer)
            );
        }
        kind => {
            if let Some(extra) = extra_operand_text(kind) {
                let _ = write!(out, " {extra}");
            }
            for (i, op) in kind.operands().iter().enumerate() {
                let _ = write!(out, "{}{}", if i == 0 { " " } else { ", " }, format_operand(module, op, namer));
            }
        }
    }
    let _ = writeln!(out, ", loc {}", format_location(inst.location, source));
}

fn format_target(module: &GilModule, block: BlockIdx, args: &[ValueId], namer: &mut Namer) -> String {
    let index = module
        .functions
        .iter()
        .flat_map(|(_, f)| f.blocks.iter().copied().enumerate())
        .find(|(_, bb)| *bb == block)
        .map(|(i, _)| i)
        .unwrap_or(0);
    if args.is_empty() {
        format!("bb{index}")
    } else {
        let rendered: Vec<String> = args.iter().map(|&v| format!("%{}", namer.name(v))).collect();
        format!("bb{index}({})", rendered.join(", "))
    }
}

/// `store`'s ownership mode doesn't fit [`Operand`]'s tagged union (it
/// isn't a value/type/symbol), so it prints as a bare keyword ahead of the
/// operand list instead.
fn extra_operand_text(kind: &crate::gil::InstKind) -> Option<String> {
    match kind {
        crate::gil::InstKind::Store { ownership, .. } => Some(
            match ownership {
                crate::gil::inst::OwnershipMode::None => "none",
                crate::gil::inst::OwnershipMode::Init => "init",
                crate::gil::inst::OwnershipMode::Set => "set",
                crate::gil::inst::OwnershipMode::Trivial => "trivial",
            }
            .to_string(),
        ),
        _ => None,
    }
}

fn format_operand(module: &GilModule, op: &Operand, namer: &mut Namer) -> String {
    match op {
        Operand::Value(v) => format!("%{}", namer.name(*v)),
        Operand::Block(b) => {
            let index = module
                .functions
                .iter()
                .flat_map(|(_, f)| f.blocks.iter().copied().enumerate())
                .find(|(_, bb)| *bb == *b)
                .map(|(i, _)| i)
                .unwrap_or(0);
            format!("bb{index}")
        }
        Operand::Function(f) => format!("@{}", module.functions.get(*f).name),
        Operand::Global(g) => format!("@{}", module.globals.get(*g).name),
        Operand::Type(ty) => format_type(ty),
        Operand::Member(name) => format!("#{name}"),
        Operand::Int(n) => n.to_string(),
        Operand::Float(n) => n.to_string(),
        Operand::Str(s) => format!("{s:?}"),
    }
}

fn format_type(ty: &Interned<Type>) -> String {
    format!("${ty}")
}

fn format_location(location: SourceLocation, source: Option<&dyn SourceManager>) -> String {
    match source.and_then(|s| s.resolve(location)) {
        Some(pos) => format!("\"{}\":{}:{}", pos.buffer_name, pos.line, pos.column),
        None if location.is_detached() => "\"<synthesized>\":0:0".to_string(),
        None => format!("\"<unknown>\":0:0 /* {location} */"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gil::{Function, Global, Instruction, InstKind};
    use crate::types::IntWidth;

    #[test]
    fn prototype_function_prints_as_a_single_line() {
        let interner = crate::types::TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let mut module = GilModule::new("test");
        module.add_function(Function { name: "extern_fn".into(), ty: i32_ty, decl: None, blocks: Vec::new(), is_prototype: true });

        let text = print_module(&module, None);
        assert!(text.contains("gil @extern_fn"));
        assert!(text.contains("prototype"));
    }

    #[test]
    fn an_integer_literal_prints_with_its_synthesized_location() {
        let interner = crate::types::TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let mut module = GilModule::new("test");
        let f = module.add_function(Function { name: "f".into(), ty: i32_ty.clone(), decl: None, blocks: Vec::new(), is_prototype: false });
        let entry = module.add_block(f, Vec::new());
        module.push_inst(entry, Instruction::new(InstKind::IntegerLiteral { ty: i32_ty.clone(), value: 1.into() }, Some(i32_ty), SourceLocation::DETACHED));

        let text = print_module(&module, None);
        assert!(text.contains("%0 = integer_literal"));
        assert!(text.contains("<synthesized>"));
    }

    #[test]
    fn a_global_prints_its_init_mode() {
        let interner = crate::types::TypeInterner::new();
        let i32_ty = interner.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let mut module = GilModule::new("test");
        module.add_global(Global { name: "g".into(), ty: i32_ty, decl: crate::ids::DeclId(0), init_mode: InitMode::Lazy, lazy_accessor: None });

        let text = print_module(&module, None);
        assert!(text.contains("global @g"));
        assert!(text.contains("lazy"));
    }
}
