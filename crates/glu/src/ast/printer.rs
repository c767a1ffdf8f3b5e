//! Two AST printers (spec §6): a verbose indented node dump for debugging,
//! grounded in `examples/original_source/lib/ASTPrinter/ASTPrinter.cpp`'s
//! `beforeVisitNode`/`afterVisitNode` indentation scheme, and a terse
//! source-like re-emitter grounded in
//! `examples/original_source/lib/ASTPrinter/CodePrinter.cpp`.

use std::fmt::Write as _;

use crate::ast::visitor::{walk_module, Walker};
use crate::ast::{DeclIdx, DeclKind, ExprIdx, ExprKind, Module, StmtIdx, StmtKind};

/// Verbose tree dump: one indented line per node, tagging each with its
/// arena index and a short kind-specific summary.
pub fn dump(module: &Module) -> String {
    let mut printer = TreePrinter { out: String::new(), indent: 0 };
    walk_module(&mut printer, module);
    printer.out
}

struct TreePrinter {
    out: String,
    indent: usize,
}

impl TreePrinter {
    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

impl Walker for TreePrinter {
    fn before_visit_decl(&mut self, module: &Module, id: DeclIdx) {
        let text = format!("{:?} {}", id, describe_decl(module, id));
        self.line(&text);
        self.indent += 1;
    }
    fn after_visit_decl(&mut self, _module: &Module, _id: DeclIdx) {
        self.indent -= 1;
    }

    fn before_visit_stmt(&mut self, module: &Module, id: StmtIdx) {
        let text = format!("{:?} {}", id, stmt_label(module, id));
        self.line(&text);
        self.indent += 1;
    }
    fn after_visit_stmt(&mut self, _module: &Module, _id: StmtIdx) {
        self.indent -= 1;
    }

    fn before_visit_expr(&mut self, module: &Module, id: ExprIdx) {
        let text = format!("{:?} {} : {}", id, expr_label(module, id), module.expr(id).ty);
        self.line(&text);
        self.indent += 1;
    }
    fn after_visit_expr(&mut self, _module: &Module, _id: ExprIdx) {
        self.indent -= 1;
    }
}

fn describe_decl(module: &Module, id: DeclIdx) -> String {
    match &module.decl(id).kind {
        DeclKind::Function(f) => format!("FunctionDecl '{}'", f.name),
        DeclKind::Struct(s) => format!("StructDecl '{}'", s.name),
        DeclKind::Enum(e) => format!("EnumDecl '{}'", e.name),
        DeclKind::Var(v) => format!("VarDecl '{}'", v.name),
        DeclKind::Let(v) => format!("LetDecl '{}'", v.name),
        DeclKind::ForBinding(v) => format!("ForBindingDecl '{}'", v.name),
        DeclKind::Import(i) => format!("ImportDecl '{}'", i.path.join(".")),
        DeclKind::Param(p) => format!("ParamDecl '{}' : {}", p.name, p.ty),
        DeclKind::Field(f) => format!("FieldDecl '{}' : {}", f.name, f.ty),
        DeclKind::TemplateParam(t) => format!("TemplateParameterDecl '{}'", t.name),
    }
}

fn stmt_label(module: &Module, id: StmtIdx) -> String {
    match &module.stmt(id).kind {
        StmtKind::Compound(c) => format!("CompoundStmt ({} stmts)", c.stmts.len()),
        StmtKind::If(_) => "IfStmt".to_string(),
        StmtKind::While(_) => "WhileStmt".to_string(),
        StmtKind::For(_) => "ForStmt".to_string(),
        StmtKind::Return(_) => "ReturnStmt".to_string(),
        StmtKind::Assign(a) => format!("AssignStmt {:?}", a.op),
        StmtKind::Break => "BreakStmt".to_string(),
        StmtKind::Continue => "ContinueStmt".to_string(),
        StmtKind::Expression(_) => "ExpressionStmt".to_string(),
        StmtKind::Decl(_) => "DeclStmt".to_string(),
    }
}

fn expr_label(module: &Module, id: ExprIdx) -> String {
    match &module.expr(id).kind {
        ExprKind::Literal(l) => l.describe().to_string(),
        ExprKind::Ref(r) => format!("RefExpr '{}'", r.path.join(".")),
        ExprKind::Binary(_) => "BinaryOpExpr".to_string(),
        ExprKind::Unary(_) => "UnaryOpExpr".to_string(),
        ExprKind::Call(c) => format!("CallExpr ({} args)", c.args.len()),
        ExprKind::Cast(c) => format!("CastExpr{}", if c.explicit { " (explicit)" } else { " (implicit)" }),
        ExprKind::StructMember(m) => format!("StructMemberExpr '{}'", m.member),
        ExprKind::StructInitializer(_) => "StructInitializerExpr".to_string(),
        ExprKind::Ternary(_) => "TernaryConditionalExpr".to_string(),
        ExprKind::PointerDeref(_) => "PointerDerefExpr".to_string(),
    }
}

/// Terse, source-like re-emission for interface export (spec §6). Not
/// guaranteed to round-trip through a parser (none is in scope here); it
/// exists so a reader can eyeball a lowered/typed AST without a debugger.
pub fn reprint(module: &Module) -> String {
    let mut out = String::new();
    for &decl in &module.top_level {
        print_decl(module, decl, 0, &mut out);
        out.push('\n');
    }
    out
}

fn indent_str(level: usize) -> String {
    "    ".repeat(level)
}

fn print_decl(module: &Module, id: DeclIdx, level: usize, out: &mut String) {
    let pad = indent_str(level);
    match &module.decl(id).kind {
        DeclKind::Function(f) => {
            let _ = write!(out, "{pad}func {}(", f.name);
            for (i, &param) in f.params.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_decl(module, param, 0, out);
            }
            let _ = write!(out, ") -> {}", f.return_type);
            match f.body {
                Some(body) => {
                    out.push(' ');
                    print_stmt(module, body, level, out);
                }
                None => out.push(';'),
            }
        }
        DeclKind::Struct(s) => {
            let _ = writeln!(out, "{pad}struct {} {{", s.name);
            for &field in &s.fields {
                print_decl(module, field, level + 1, out);
                out.push('\n');
            }
            let _ = write!(out, "{pad}}}");
        }
        DeclKind::Enum(e) => {
            let _ = writeln!(out, "{pad}enum {} {{", e.name);
            for &case in &e.cases {
                print_decl(module, case, level + 1, out);
                out.push('\n');
            }
            let _ = write!(out, "{pad}}}");
        }
        DeclKind::Var(v) => print_var_let(module, "var", v, &pad, out),
        DeclKind::Let(v) => print_var_let(module, "let", v, &pad, out),
        DeclKind::ForBinding(v) => out.push_str(&v.name),
        DeclKind::Import(i) => {
            let _ = write!(out, "{pad}import {}", i.path.join("."));
            if let Some(selectors) = &i.selectors {
                let _ = write!(out, ".{{{}}}", selectors.join(", "));
            }
        }
        DeclKind::Param(p) => {
            let _ = write!(out, "{}: {}", p.name, p.ty);
        }
        DeclKind::Field(f) => {
            let _ = write!(out, "{pad}{}: {}", f.name, f.ty);
            if let Some(default) = f.default {
                out.push_str(" = ");
                print_expr(module, default, out);
            }
            out.push(',');
        }
        DeclKind::TemplateParam(t) => out.push_str(&t.name),
    }
}

fn print_var_let(module: &Module, keyword: &str, v: &crate::ast::VarLetDecl, pad: &str, out: &mut String) {
    let _ = write!(out, "{pad}{keyword} {}: {}", v.name, v.resolved_type);
    if let Some(init) = v.initializer {
        out.push_str(" = ");
        print_expr(module, init, out);
    }
    out.push(';');
}

fn print_stmt(module: &Module, id: StmtIdx, level: usize, out: &mut String) {
    let pad = indent_str(level);
    match &module.stmt(id).kind {
        StmtKind::Compound(c) => {
            out.push_str("{\n");
            for &s in &c.stmts {
                let _ = write!(out, "{}", indent_str(level + 1));
                print_stmt(module, s, level + 1, out);
                out.push('\n');
            }
            let _ = write!(out, "{pad}}}");
        }
        StmtKind::If(s) => {
            out.push_str("if ");
            print_expr(module, s.condition, out);
            out.push(' ');
            print_stmt(module, s.then_branch, level, out);
            if let Some(else_branch) = s.else_branch {
                out.push_str(" else ");
                print_stmt(module, else_branch, level, out);
            }
        }
        StmtKind::While(s) => {
            out.push_str("while ");
            print_expr(module, s.condition, out);
            out.push(' ');
            print_stmt(module, s.body, level, out);
        }
        StmtKind::For(s) => {
            out.push_str("for ");
            print_decl(module, s.binding, 0, out);
            out.push_str(" in ");
            print_expr(module, s.range, out);
            out.push(' ');
            print_stmt(module, s.body, level, out);
        }
        StmtKind::Return(s) => {
            out.push_str("return");
            if let Some(value) = s.value {
                out.push(' ');
                print_expr(module, value, out);
            }
            out.push(';');
        }
        StmtKind::Assign(s) => {
            print_expr(module, s.lhs, out);
            let op = match s.op {
                crate::ast::AssignOp::Assign => "=",
                crate::ast::AssignOp::AddAssign => "+=",
                crate::ast::AssignOp::SubAssign => "-=",
                crate::ast::AssignOp::MulAssign => "*=",
                crate::ast::AssignOp::DivAssign => "/=",
            };
            let _ = write!(out, " {op} ");
            print_expr(module, s.rhs, out);
            out.push(';');
        }
        StmtKind::Break => out.push_str("break;"),
        StmtKind::Continue => out.push_str("continue;"),
        StmtKind::Expression(e) => {
            print_expr(module, *e, out);
            out.push(';');
        }
        StmtKind::Decl(d) => print_decl(module, *d, level, out),
    }
}

fn print_expr(module: &Module, id: ExprIdx, out: &mut String) {
    match &module.expr(id).kind {
        ExprKind::Literal(l) => print_literal(l, out),
        ExprKind::Ref(r) => out.push_str(&r.path.join(".")),
        ExprKind::Binary(b) => {
            print_expr(module, b.lhs, out);
            let _ = write!(out, " {} ", operator_name(module, b.operator));
            print_expr(module, b.rhs, out);
        }
        ExprKind::Unary(u) => {
            out.push_str(&operator_name(module, u.operator));
            print_expr(module, u.operand, out);
        }
        ExprKind::Call(c) => {
            print_expr(module, c.callee, out);
            out.push('(');
            for (i, &arg) in c.args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_expr(module, arg, out);
            }
            out.push(')');
        }
        ExprKind::Cast(c) => {
            print_expr(module, c.sub_expr, out);
            let _ = write!(out, " as {}", c.destination_type);
        }
        ExprKind::StructMember(m) => {
            print_expr(module, m.base, out);
            let _ = write!(out, ".{}", m.member);
        }
        ExprKind::StructInitializer(s) => {
            if let Some(ty) = &s.struct_type {
                let _ = write!(out, "{ty}");
            }
            out.push_str(" { ");
            for (i, &field) in s.fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                print_expr(module, field, out);
            }
            out.push_str(" }");
        }
        ExprKind::Ternary(t) => {
            print_expr(module, t.condition, out);
            out.push_str(" ? ");
            print_expr(module, t.then_expr, out);
            out.push_str(" : ");
            print_expr(module, t.else_expr, out);
        }
        ExprKind::PointerDeref(inner) => {
            out.push('*');
            print_expr(module, *inner, out);
        }
    }
}

fn operator_name(module: &Module, operator: ExprIdx) -> String {
    match &module.expr(operator).kind {
        ExprKind::Ref(r) => r.path.last().cloned().unwrap_or_default().to_string(),
        _ => "?".to_string(),
    }
}

fn print_literal(lit: &crate::ast::LiteralExpr, out: &mut String) {
    match lit {
        crate::ast::LiteralExpr::Int(i) => {
            let _ = write!(out, "{i}");
        }
        crate::ast::LiteralExpr::Float(f) => {
            let _ = write!(out, "{f}");
        }
        crate::ast::LiteralExpr::String(s) => {
            let _ = write!(out, "{s:?}");
        }
        crate::ast::LiteralExpr::Bool(b) => {
            let _ = write!(out, "{b}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, LiteralExpr, Module};
    use crate::source::SourceLocation;
    use crate::types::{IntWidth, Type};
    use num_bigint::BigInt;

    #[test]
    fn source_like_printer_emits_a_let_statement() {
        let mut module = Module::new("test");
        let ty = module.types.intern(Type::Int { signed: true, width: IntWidth::I32 });
        let init = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Int(BigInt::from(7))), ty.clone());
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(crate::ast::VarLetDecl {
                name: "x".into(),
                declared_type: None,
                resolved_type: ty,
                initializer: Some(init),
                mutable: false,
            }),
        );
        let printed = reprint(&module);
        assert_eq!(printed.trim(), "let x: Int32 = 7;");
    }

    #[test]
    fn tree_printer_indents_nested_nodes() {
        let mut module = Module::new("test");
        let ty = module.types.intern(Type::Bool);
        let lit = module.alloc_expr_typed(SourceLocation::DETACHED, None, ExprKind::Literal(LiteralExpr::Bool(true)), ty.clone());
        module.add_top_level_decl(
            SourceLocation::DETACHED,
            DeclKind::Let(crate::ast::VarLetDecl {
                name: "flag".into(),
                declared_type: None,
                resolved_type: ty,
                initializer: Some(lit),
                mutable: false,
            }),
        );
        let dump = dump(&module);
        assert!(dump.contains("LetDecl 'flag'"));
    }
}
