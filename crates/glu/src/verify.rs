//! Runtime verification of the universal invariants spec §8 requires "a
//! test suite must verify, for every module it processes" — exposed here as
//! a callable pass rather than left only inside `#[cfg(test)]` blocks, so an
//! embedder can run it as an assertion step between Sema and GIL-gen (or
//! after a pass manager run) the way the teacher's own crates validate
//! invariants with `anyhow::Context`-annotated checks at pipeline
//! boundaries rather than `debug_assert!` sprinkled through the
//! implementation.
//!
//! This is the one genuinely fallible surface in the crate: everything else
//! in the pipeline is diagnostic-driven (spec §7, `DESIGN.md` "Errors"), but
//! an invariant violation caught here means the compiler itself is broken,
//! not that the user's program has an error — `anyhow::Result` with
//! `.context(...)` naming the violated property is the right shape for
//! that, matching the teacher's crate-boundary error convention.

use anyhow::{bail, Context, Result};

use crate::ast::{ExprKind, Module};
use crate::gil::GilModule;

/// Property 1 + 2 (spec §8): every post-Sema `Expr.type` is concrete (no
/// `TypeVariable`), and every `RefExpr.target` is resolved.
pub fn verify_ast_invariants(module: &Module) -> Result<()> {
    for (idx, expr) in module.exprs.iter() {
        if expr.ty.is_type_variable() {
            bail!("property 1 violated: expr #{idx:?} still has type variable `{}`", expr.ty);
        }
        if let ExprKind::Ref(r) = &expr.kind {
            if r.target.is_none() {
                bail!("property 2 violated: RefExpr #{idx:?} (`{}`) has no resolved target", r.path.join("."));
            }
        }
    }
    Ok(())
}

/// Property 6 (spec §8): every GIL basic block contains exactly one
/// terminator, and it is the block's last instruction. [`crate::gil::BasicBlock::iter`]
/// already skips tombstoned instructions, so a dangling tombstoned
/// terminator at the true tail does not count.
pub fn verify_gil_invariants(gil: &GilModule) -> Result<()> {
    for (func_idx, func) in gil.functions.iter() {
        for &block_idx in &func.blocks {
            let block = gil.blocks.get(block_idx);
            let insts: Vec<_> = block.iter(&gil.insts).collect();
            let Some((last, rest)) = insts.split_last() else {
                bail!("property 6 violated: function #{func_idx:?} block #{block_idx:?} has no instructions at all");
            };
            if !gil.insts.get(*last).is_terminator() {
                bail!("property 6 violated: function #{func_idx:?} block #{block_idx:?}'s last instruction is not a terminator");
            }
            if let Some(mid) = rest.iter().find(|&&id| gil.insts.get(id).is_terminator()) {
                bail!("property 6 violated: function #{func_idx:?} block #{block_idx:?} has a terminator (#{mid:?}) before its last instruction");
            }
        }
    }
    Ok(())
}

/// Property 7 (spec §8), restricted to intra-block def-before-use: every
/// value used within a block is either a block argument of that block or
/// defined by an earlier instruction in the same block. Cross-block
/// dominance (a value defined in a predecessor used in a successor) is not
/// checked here — it requires a full dominator-tree computation this crate
/// does not otherwise need, so this only catches the cheap, common case
/// (see `DESIGN.md`).
pub fn verify_intra_block_def_before_use(gil: &GilModule) -> Result<()> {
    use crate::gil::ValueId;

    for (func_idx, func) in gil.functions.iter() {
        for &block_idx in &func.blocks {
            let block = gil.blocks.get(block_idx);
            let own_insts: rustc_hash::FxHashSet<_> = block.iter(&gil.insts).collect();

            let mut defined: rustc_hash::FxHashSet<ValueId> = (0..block.arg_types.len())
                .map(|i| ValueId::BlockArg(block_idx, u32::try_from(i).expect("far fewer than u32::MAX block args")))
                .collect();
            for inst in block.iter(&gil.insts) {
                for used in gil.insts.get(inst).kind.value_operands() {
                    let ValueId::Inst(used_inst) = used else { continue };
                    // Only a same-block reference can be judged here: a
                    // reference to another block's instruction might still
                    // be valid if that block dominates this one, which
                    // would require a dominator tree this check doesn't
                    // build (see the function doc comment).
                    if own_insts.contains(&used_inst) && !defined.contains(&used) {
                        bail!(
                            "property 7 violated: function #{func_idx:?} instruction #{inst:?} uses #{used_inst:?} before it is defined in block #{block_idx:?}"
                        );
                    }
                }
                defined.insert(ValueId::Inst(inst));
            }
        }
    }
    Ok(())
}

/// Runs every invariant check this module provides, in the order the spec
/// lists them, stopping at the first violation (`.context` names which
/// module/function produced it so the caller doesn't need to re-derive
/// that from the bare property message).
pub fn verify_all(module: &Module, gil: Option<&GilModule>) -> Result<()> {
    verify_ast_invariants(module).with_context(|| format!("verifying AST invariants for module `{}`", module.name))?;
    if let Some(gil) = gil {
        verify_gil_invariants(gil).with_context(|| format!("verifying GIL invariants for module `{}`", module.name))?;
        verify_intra_block_def_before_use(gil)
            .with_context(|| format!("verifying intra-block def-before-use for module `{}`", module.name))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{DeclKind, ExprKind, FunctionDecl, LiteralExpr, ReturnStmt, StmtKind, VarLetDecl};
    use crate::source::SourceLocation;
    use crate::types::IntWidth;
    use num_bigint::BigInt;

    #[test]
    fn fresh_module_fails_property_one_until_sema_runs() {
        let mut module = Module::new("demo");
        let lit = module.alloc_expr(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))));
        let var_ty = module.fresh_type_variable();
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(VarLetDecl { name: "x".into(), declared_type: None, resolved_type: var_ty, initializer: Some(lit), mutable: false }),
        );
        assert!(verify_ast_invariants(&module).is_err(), "a fresh type variable must fail property 1");
    }

    #[test]
    fn compiled_module_satisfies_all_invariants() {
        let mut module = Module::new("demo");
        let int_ty = module.types.intern(crate::types::Type::Int { signed: true, width: IntWidth::I32 });
        let lit = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(1))), int_ty.clone());
        let ret = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Return(ReturnStmt { value: Some(lit) }));
        let body = module.alloc_stmt(SourceLocation::DETACHED, None, StmtKind::Compound(crate::ast::CompoundStmt { stmts: vec![ret] }));
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Function(FunctionDecl { name: "f".into(), params: Vec::new(), return_type: int_ty, body: Some(body), is_variadic: false }),
        );

        let result = crate::compile(&mut module, false);
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
        let gil = result.gil.expect("sema succeeded so GIL must have been generated");
        verify_all(&module, Some(&gil)).expect("a freshly compiled module must satisfy every universal invariant");
    }
}
