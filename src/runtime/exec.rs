use std::io::{BufRead, Write};

use super::eval::Value;
use super::{Frame, Runtime, RuntimeError, Variable};
use crate::program::{Argument, Builtin, Statement, Type};

/// How a block finished. Loops and calls absorb the signals meant for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Normal,
    Return(i32),
    Break(u32),
    Continue(u32),
}

impl<'p, R: BufRead, W: Write> Runtime<'p, R, W> {
    pub(super) fn block(&mut self, idx: usize) -> Result<Flow, RuntimeError> {
        crate::grow(|| self.statements(idx))
    }

    fn statements(&mut self, idx: usize) -> Result<Flow, RuntimeError> {
        let program = self.program;
        for statement in &program.blocks[idx].statements {
            let flow = self.statement(*statement)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn statement(&mut self, statement: Statement) -> Result<Flow, RuntimeError> {
        self.tick()?;
        let program = self.program;

        match statement {
            Statement::Let(idx) => {
                let l = &program.lets[idx];
                let value = self.eval_value(l.src)?;
                let loc = self.varpath(l.dest)?;
                self.store(loc, value)?;
            }
            Statement::Print(idx) => self.print(idx)?,
            Statement::Input(idx) => self.input(idx)?,
            Statement::If(idx) => {
                for cond in &program.ifs[idx].conds {
                    let taken = match cond.expr {
                        Some(expr) => self.eval_int(expr)? != 0,
                        None => true,
                    };
                    if taken {
                        return self.block(cond.block);
                    }
                }
            }
            Statement::While(idx) => {
                let w = &program.whiles[idx];
                while self.eval_int(w.expr)? != 0 {
                    match self.block(w.block)? {
                        Flow::Normal | Flow::Continue(1) => {}
                        Flow::Break(1) => break,
                        flow => return Ok(outer(flow)),
                    }
                }
            }
            Statement::For(idx) => return self.for_loop(idx),
            Statement::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_int(expr)?,
                    None => 0,
                };
                return Ok(Flow::Return(value));
            }
            Statement::Break(level) => return Ok(Flow::Break(level)),
            Statement::Continue(level) => return Ok(Flow::Continue(level)),
            Statement::Call(idx) => {
                self.call(idx)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn for_loop(&mut self, idx: usize) -> Result<Flow, RuntimeError> {
        let program = self.program;
        let f = &program.fors[idx];
        let start = self.eval_int(f.start)?;
        let end = self.eval_int(f.end)?;
        let loc = self.varpath(f.var)?;
        self.write(loc, start)?;

        loop {
            let loc = self.varpath(f.var)?;
            let current = self.read(loc)?;
            let done = if f.step >= 0 {
                current > end
            } else {
                current < end
            };
            if done {
                break;
            }

            match self.block(f.block)? {
                Flow::Normal | Flow::Continue(1) => {}
                Flow::Break(1) => break,
                flow => return Ok(outer(flow)),
            }

            let loc = self.varpath(f.var)?;
            let current = self.read(loc)?;
            match current.checked_add(f.step) {
                Some(next) => self.write(loc, next)?,
                None => break,
            }
        }
        Ok(Flow::Normal)
    }

    fn print(&mut self, idx: usize) -> Result<(), RuntimeError> {
        let program = self.program;
        let mut items = Vec::new();
        for &expr in &program.prints[idx].exprs {
            items.push(match self.eval_value(expr)? {
                Value::Int(v) => v.to_string(),
                Value::Str(s) => s,
                Value::Cell(ptr) => ptr.to_string(),
            });
        }
        writeln!(self.output, "{}", items.join(" "))?;
        Ok(())
    }

    fn input(&mut self, idx: usize) -> Result<(), RuntimeError> {
        let program = self.program;
        let input = &program.inputs[idx];
        if let Some(prompt) = input.prompt {
            write!(self.output, "{}", program.literals.resolve(prompt))?;
        }
        self.output.flush()?;

        let mut line = String::new();
        self.input.read_line(&mut line)?;
        let line = line.strip_suffix('\n').unwrap_or(&line);
        let line = line.strip_suffix('\r').unwrap_or(line).to_string();

        let value = match program.varpaths[input.dest].ty {
            Type::Int => Value::Int(line.trim().parse().unwrap_or(0)),
            _ => Value::Str(line),
        };
        let loc = self.varpath(input.dest)?;
        self.store(loc, value)
    }

    /// Call a builtin or user function by call-site index
    pub(super) fn call(&mut self, idx: usize) -> Result<i32, RuntimeError> {
        let program = self.program;
        let call = &program.calls[idx];

        if let Some(builtin) = Builtin::from_name(&call.name) {
            return self.call_builtin(builtin, &call.args);
        }
        let function = program
            .find_function(&call.name)
            .ok_or_else(|| RuntimeError::MissingFunction(call.name.clone()))?;
        self.call_function(function, &call.args)
    }

    /// Bind arguments evaluated in the caller's frame, run the body in a
    /// fresh frame and release the frame's owned cells on every exit path
    pub(super) fn call_function(
        &mut self,
        idx: usize,
        args: &[Argument],
    ) -> Result<i32, RuntimeError> {
        crate::grow(|| self.enter_function(idx, args))
    }

    fn enter_function(&mut self, idx: usize, args: &[Argument]) -> Result<i32, RuntimeError> {
        let program = self.program;
        let function = &program.functions[idx];

        if self.frames.len() >= self.limits.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded(self.limits.max_call_depth));
        }
        log::trace!("call {} (depth {})", function.name, self.frames.len() + 1);

        let mut frame = Frame::new();
        for (param, arg) in function.args.iter().zip(args) {
            let value = match self.bind_argument(&param.ty, arg.expr) {
                Ok(value) => value,
                Err(e) => {
                    let _ = self.release_frame(idx, &frame);
                    return Err(e);
                }
            };
            frame.insert(
                param.name.clone(),
                Variable {
                    ty: param.ty.clone(),
                    value,
                },
            );
        }

        self.frames.push(frame);
        let result = self.run_body(idx);
        let frame = self.frames.pop().unwrap_or_default();
        let cleanup = self.release_frame(idx, &frame);

        let value = result?;
        cleanup?;
        Ok(value)
    }

    // Strings are passed by value, records and arrays by handle
    fn bind_argument(&mut self, ty: &Type, expr: usize) -> Result<i32, RuntimeError> {
        match ty {
            Type::String => {
                let s = self.eval_str(expr)?;
                self.heap.make_str(s)
            }
            _ => self.eval_int(expr),
        }
    }

    fn run_body(&mut self, idx: usize) -> Result<i32, RuntimeError> {
        let program = self.program;
        let function = &program.functions[idx];

        for dim in &function.locals {
            let value = self.heap.make(&dim.ty)?;
            if let Some(frame) = self.frames.last_mut() {
                frame.insert(
                    dim.name.clone(),
                    Variable {
                        ty: dim.ty.clone(),
                        value,
                    },
                );
            }
        }

        Ok(match self.block(function.block)? {
            Flow::Return(value) => value,
            _ => 0,
        })
    }

    /// Destroy the locals and string arguments a frame owns
    fn release_frame(&mut self, idx: usize, frame: &Frame) -> Result<(), RuntimeError> {
        let program = self.program;
        let function = &program.functions[idx];
        let owned = function
            .locals
            .iter()
            .filter(|d| d.ty.is_heap())
            .chain(function.args.iter().filter(|d| d.ty == Type::String));

        for dim in owned {
            if let Some(var) = frame.get(&dim.name) {
                self.heap.destroy(var.value)?;
            }
        }
        Ok(())
    }
}

// A signal aimed at an enclosing loop, one level closer to its target
fn outer(flow: Flow) -> Flow {
    match flow {
        Flow::Break(level) => Flow::Break(level - 1),
        Flow::Continue(level) => Flow::Continue(level - 1),
        other => other,
    }
}
