//! Read-only rendering of a parsed [`Program`] back into source-like form.
//!
//! Expressions are rebuilt from their postfix instruction lists, fully
//! parenthesised, so the output shows how precedence was resolved.

use std::fmt::{self, Display};

use crate::program::{Block, Dim, Function, Op, PathOp, Program, Statement, Type};

const INDENT: &str = "  ";

struct Formatter {
    buffer: String,
    indent_level: usize,
}

impl Formatter {
    fn new() -> Self {
        Self {
            buffer: String::new(),
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent_level {
            self.buffer.push_str(INDENT);
        }
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    fn finish(self) -> String {
        self.buffer
    }
}

/// Renders one program; `function` scopes local variable lookups
struct Printer<'p> {
    program: &'p Program,
    function: Option<&'p Function>,
}

impl Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = Formatter::new();
        let mut printer = Printer {
            program: self,
            function: None,
        };
        printer.program_text(&mut out);
        write!(f, "{}", out.finish())
    }
}

impl<'p> Printer<'p> {
    fn program_text(&mut self, out: &mut Formatter) {
        let program = self.program;

        if let Some(module) = &program.module {
            out.line(&format!("module {}", module));
        }

        for record in &program.types {
            out.line(&format!("type {}", record.name));
            out.indent();
            for member in &record.members {
                out.line(&format!("dim {} {}", member.name, program.type_name(&member.ty)));
            }
            out.dedent();
            out.line("end type");
        }

        for dim in &program.globals {
            out.line(&format!("dim {}", self.dim_text(dim)));
        }

        for function in &program.functions {
            self.function = Some(function);
            let args: Vec<String> = function
                .args
                .iter()
                .map(|a| format!("{} {}", a.name, program.type_name(&a.ty)))
                .collect();
            out.line(&format!("function {}({})", function.name, args.join(", ")));
            out.indent();
            for local in &function.locals {
                out.line(&format!("dim {}", self.dim_text(local)));
            }
            self.block_text(&program.blocks[function.block], out);
            out.dedent();
            out.line("end function");
            self.function = None;
        }
    }

    fn dim_text(&self, dim: &Dim) -> String {
        let mut text = format!("{} {}", dim.name, self.program.type_name(&dim.ty));
        if let Some(init) = dim.init {
            text.push_str(" = ");
            text.push_str(&self.expr_text(init));
        }
        text
    }

    fn block_text(&self, block: &Block, out: &mut Formatter) {
        let program = self.program;

        for statement in &block.statements {
            match *statement {
                Statement::Let(idx) => {
                    let l = &program.lets[idx];
                    out.line(&format!(
                        "let {} = {}",
                        self.varpath_text(l.dest),
                        self.expr_text(l.src)
                    ));
                }
                Statement::Print(idx) => {
                    let items: Vec<String> = program.prints[idx]
                        .exprs
                        .iter()
                        .map(|&e| self.expr_text(e))
                        .collect();
                    if items.is_empty() {
                        out.line("print");
                    } else {
                        out.line(&format!("print {}", items.join(", ")));
                    }
                }
                Statement::Input(idx) => {
                    let input = &program.inputs[idx];
                    let dest = self.varpath_text(input.dest);
                    match input.prompt {
                        Some(prompt) => out.line(&format!(
                            "input {:?}, {}",
                            program.literals.resolve(prompt),
                            dest
                        )),
                        None => out.line(&format!("input {}", dest)),
                    }
                }
                Statement::If(idx) => {
                    for (i, cond) in program.ifs[idx].conds.iter().enumerate() {
                        let head = match (i, cond.expr) {
                            (0, Some(e)) => format!("if {}", self.expr_text(e)),
                            (_, Some(e)) => format!("else if {}", self.expr_text(e)),
                            (_, None) => "else".to_string(),
                        };
                        out.line(&head);
                        self.nested(cond.block, out);
                    }
                    out.line("end if");
                }
                Statement::While(idx) => {
                    let w = &program.whiles[idx];
                    out.line(&format!("while {}", self.expr_text(w.expr)));
                    self.nested(w.block, out);
                    out.line("end while");
                }
                Statement::For(idx) => {
                    let f = &program.fors[idx];
                    out.line(&format!(
                        "for {} = {} to {} step {}",
                        self.varpath_text(f.var),
                        self.expr_text(f.start),
                        self.expr_text(f.end),
                        f.step
                    ));
                    self.nested(f.block, out);
                    out.line("end for");
                }
                Statement::Return(Some(e)) => out.line(&format!("return {}", self.expr_text(e))),
                Statement::Return(None) => out.line("return"),
                Statement::Break(level) => out.line(&format!("break {}", level)),
                Statement::Continue(level) => out.line(&format!("continue {}", level)),
                Statement::Call(idx) => out.line(&format!("call {}", self.call_text(idx))),
            }
        }
    }

    fn nested(&self, block: usize, out: &mut Formatter) {
        out.indent();
        crate::grow(|| self.block_text(&self.program.blocks[block], out));
        out.dedent();
    }

    fn call_text(&self, idx: usize) -> String {
        let call = &self.program.calls[idx];
        let args: Vec<String> = call.args.iter().map(|a| self.expr_text(a.expr)).collect();
        format!("{}({})", call.name, args.join(", "))
    }

    // Rebuild infix text from the postfix instruction list
    fn expr_text(&self, idx: usize) -> String {
        let program = self.program;
        let mut stack: Vec<String> = Vec::new();

        for op in &program.exprs[idx].ops {
            let text = match *op {
                Op::Int(v) => v.to_string(),
                Op::Lit(id) => format!("{:?}", program.literals.resolve(id)),
                Op::VarPath(p) | Op::VarPathStr(p) | Op::VarPathPtr(p) => self.varpath_text(p),
                Op::Call(c) => self.call_text(c),
                binary => {
                    let b = stack.pop().unwrap_or_default();
                    let a = stack.pop().unwrap_or_default();
                    format!("({} {} {})", a, symbol(binary), b)
                }
            };
            stack.push(text);
        }
        stack.join(" ")
    }

    fn varpath_text(&self, idx: usize) -> String {
        let program = self.program;
        let mut text = String::new();
        let mut ty: Option<Type> = None;

        for op in &program.varpaths[idx].ops {
            match op {
                PathOp::Local(name) => {
                    ty = self
                        .function
                        .and_then(|f| f.variable(name))
                        .map(|d| d.ty.clone());
                    text.push_str(name);
                }
                PathOp::Global(name) => {
                    ty = program.find_global(name).map(|d| d.ty.clone());
                    text.push_str(name);
                }
                PathOp::Index(expr) => {
                    ty = ty.and_then(|t| t.element().cloned());
                    text.push_str(&format!("[{}]", self.expr_text(*expr)));
                }
                PathOp::Member(offset) => {
                    let member = match ty {
                        Some(Type::Record(id)) => program.record(id).members.get(*offset),
                        _ => None,
                    };
                    match member {
                        Some(m) => {
                            text.push('.');
                            text.push_str(&m.name);
                            ty = Some(m.ty.clone());
                        }
                        None => {
                            text.push_str(&format!(".#{}", offset));
                            ty = None;
                        }
                    }
                }
            }
        }
        text
    }
}

fn symbol(op: Op) -> &'static str {
    match op {
        Op::Add | Op::StrCat => "+",
        Op::Sub => "-",
        Op::Mul => "*",
        Op::Div => "/",
        Op::And => "and",
        Op::Or => "or",
        Op::Eq | Op::StrEq => "==",
        Op::Neq | Op::StrNeq => "!=",
        Op::Lt => "lt",
        Op::Gt => "gt",
        Op::Lte => "lte",
        Op::Gte => "gte",
        _ => "?",
    }
}
