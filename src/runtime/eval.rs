use std::io::{BufRead, Write};

use super::heap::{NULL, Ptr};
use super::{Runtime, RuntimeError};
use crate::program::{Op, PathOp, Type};

/// Resolved target of a variable path, usable for reads and writes
#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) enum Location<'p> {
    Local(&'p str),
    Global(&'p str),
    Cell { ptr: Ptr, offset: usize },
}

/// Result of a typed expression
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Value {
    Int(i32),
    Str(String),
    Cell(Ptr), // record or array handle, owned by someone else
}

impl<'p, R: BufRead, W: Write> Runtime<'p, R, W> {
    pub(super) fn read(&self, loc: Location<'p>) -> Result<i32, RuntimeError> {
        match loc {
            Location::Local(name) => self
                .frames
                .last()
                .and_then(|frame| frame.get(name))
                .map(|var| var.value)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string())),
            Location::Global(name) => self
                .globals
                .get(name)
                .map(|var| var.value)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string())),
            Location::Cell { ptr, offset } => {
                let slots = self.heap.slots(ptr)?;
                slots.get(offset).copied().ok_or(RuntimeError::OutOfRange {
                    ptr,
                    index: offset as i32,
                    len: slots.len(),
                })
            }
        }
    }

    pub(super) fn write(&mut self, loc: Location<'p>, value: i32) -> Result<(), RuntimeError> {
        let slot = match loc {
            Location::Local(name) => self
                .frames
                .last_mut()
                .and_then(|frame| frame.get_mut(name))
                .map(|var| &mut var.value)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?,
            Location::Global(name) => self
                .globals
                .get_mut(name)
                .map(|var| &mut var.value)
                .ok_or_else(|| RuntimeError::UndefinedVariable(name.to_string()))?,
            Location::Cell { ptr, offset } => {
                let slots = self.heap.slots_mut(ptr)?;
                let len = slots.len();
                slots.get_mut(offset).ok_or(RuntimeError::OutOfRange {
                    ptr,
                    index: offset as i32,
                    len,
                })?
            }
        };
        *slot = value;
        Ok(())
    }

    /// Walk a variable path from its base variable down to the final slot
    pub(super) fn varpath(&mut self, idx: usize) -> Result<Location<'p>, RuntimeError> {
        let program = self.program;
        let mut loc = None;

        for op in &program.varpaths[idx].ops {
            loc = Some(match op {
                PathOp::Local(name) => Location::Local(name),
                PathOp::Global(name) => Location::Global(name),
                PathOp::Index(expr) => {
                    let ptr = self.current_ptr(loc, "index")?;
                    let index = self.eval_int(*expr)?;
                    let len = self.heap.slots(ptr)?.len();
                    if index < 0 || index as usize >= len {
                        return Err(RuntimeError::OutOfRange { ptr, index, len });
                    }
                    Location::Cell {
                        ptr,
                        offset: index as usize,
                    }
                }
                PathOp::Member(offset) => {
                    let ptr = self.current_ptr(loc, "member")?;
                    Location::Cell {
                        ptr,
                        offset: *offset,
                    }
                }
            });
        }
        loc.ok_or(RuntimeError::NullPointer { op: "varpath" })
    }

    // Handle stored at the path walked so far
    fn current_ptr(
        &self,
        loc: Option<Location<'p>>,
        op: &'static str,
    ) -> Result<Ptr, RuntimeError> {
        let loc = loc.ok_or(RuntimeError::NullPointer { op })?;
        match self.read(loc)? {
            NULL => Err(RuntimeError::NullPointer { op }),
            ptr => Ok(ptr),
        }
    }

    /// Evaluate an int (or handle) expression
    pub(super) fn eval_int(&mut self, idx: usize) -> Result<i32, RuntimeError> {
        let base = (self.istack.len(), self.sstack.len());
        self.run_ops(idx)?;
        self.check_balance(base, (1, 0))?;
        self.ipop()
    }

    pub(super) fn eval_str(&mut self, idx: usize) -> Result<String, RuntimeError> {
        let base = (self.istack.len(), self.sstack.len());
        self.run_ops(idx)?;
        self.check_balance(base, (0, 1))?;
        self.spop()
    }

    pub(super) fn eval_value(&mut self, idx: usize) -> Result<Value, RuntimeError> {
        let program = self.program;
        Ok(match program.exprs[idx].ty {
            Type::Int => Value::Int(self.eval_int(idx)?),
            Type::String => Value::Str(self.eval_str(idx)?),
            Type::Array(_) | Type::Record(_) => Value::Cell(self.eval_int(idx)?),
        })
    }

    /// Assign with value semantics: ints by value, strings by replacing the
    /// destination's bytes, records and arrays by deep copy into the
    /// destination cell
    pub(super) fn store(&mut self, loc: Location<'p>, value: Value) -> Result<(), RuntimeError> {
        match value {
            Value::Int(v) => self.write(loc, v),
            Value::Str(s) => {
                let dst = self.read(loc)?;
                self.heap.clonestr(s, dst)
            }
            Value::Cell(src) => {
                let dst = self.read(loc)?;
                self.heap.cloneto(src, dst)
            }
        }
    }

    // Each expression must leave exactly its result on the stacks
    fn check_balance(
        &self,
        base: (usize, usize),
        expected: (isize, isize),
    ) -> Result<(), RuntimeError> {
        let ints = self.istack.len() as isize - base.0 as isize;
        let strings = self.sstack.len() as isize - base.1 as isize;
        if (ints, strings) != expected {
            return Err(RuntimeError::StackImbalance { ints, strings });
        }
        Ok(())
    }

    fn run_ops(&mut self, idx: usize) -> Result<(), RuntimeError> {
        let program = self.program;

        for op in &program.exprs[idx].ops {
            match *op {
                // integers
                Op::Int(v) => self.istack.push(v),
                Op::VarPath(path) | Op::VarPathPtr(path) => {
                    let loc = self.varpath(path)?;
                    let v = self.read(loc)?;
                    self.istack.push(v);
                }
                Op::Add => self.binary(i32::wrapping_add)?,
                Op::Sub => self.binary(i32::wrapping_sub)?,
                Op::Mul => self.binary(i32::wrapping_mul)?,
                Op::Div => {
                    let b = self.ipop()?;
                    let a = self.ipop()?;
                    if b == 0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    self.istack.push(a.wrapping_div(b));
                }
                Op::And => self.binary(|a, b| (a != 0 && b != 0) as i32)?,
                Op::Or => self.binary(|a, b| (a != 0 || b != 0) as i32)?,
                Op::Eq => self.binary(|a, b| (a == b) as i32)?,
                Op::Neq => self.binary(|a, b| (a != b) as i32)?,
                Op::Lt => self.binary(|a, b| (a < b) as i32)?,
                Op::Gt => self.binary(|a, b| (a > b) as i32)?,
                Op::Lte => self.binary(|a, b| (a <= b) as i32)?,
                Op::Gte => self.binary(|a, b| (a >= b) as i32)?,

                // strings
                Op::Lit(id) => self.sstack.push(program.literals.resolve(id).to_string()),
                Op::VarPathStr(path) => {
                    let loc = self.varpath(path)?;
                    let ptr = self.read(loc)?;
                    let s = self.heap.text(ptr)?.to_string();
                    self.sstack.push(s);
                }
                Op::StrCat => {
                    let b = self.spop()?;
                    let mut a = self.spop()?;
                    a.push_str(&b);
                    self.sstack.push(a);
                }
                Op::StrEq => {
                    let b = self.spop()?;
                    let a = self.spop()?;
                    self.istack.push((a == b) as i32);
                }
                Op::StrNeq => {
                    let b = self.spop()?;
                    let a = self.spop()?;
                    self.istack.push((a != b) as i32);
                }

                Op::Call(call) => {
                    let v = self.call(call)?;
                    self.istack.push(v);
                }
            }
        }
        Ok(())
    }

    fn binary(&mut self, f: impl Fn(i32, i32) -> i32) -> Result<(), RuntimeError> {
        let b = self.ipop()?;
        let a = self.ipop()?;
        self.istack.push(f(a, b));
        Ok(())
    }

    fn ipop(&mut self) -> Result<i32, RuntimeError> {
        self.istack.pop().ok_or(RuntimeError::StackUnderflow)
    }

    fn spop(&mut self) -> Result<String, RuntimeError> {
        self.sstack.pop().ok_or(RuntimeError::StackUnderflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{Expr, Program};

    fn runtime(program: &Program) -> Runtime<'_, &'static [u8], Vec<u8>> {
        Runtime::with_io(program, &b""[..], Vec::new())
    }

    #[test]
    fn test_malformed_sequence_is_rejected() {
        let mut program = Program::new();
        // one operand short for Add
        program.add_expr(Expr {
            ty: Type::Int,
            ops: vec![Op::Int(1), Op::Add],
        });
        // leaves two values behind
        program.add_expr(Expr {
            ty: Type::Int,
            ops: vec![Op::Int(1), Op::Int(2)],
        });
        let mut rt = runtime(&program);

        assert!(matches!(rt.eval_int(0), Err(RuntimeError::StackUnderflow)));
        rt.istack.clear();
        assert!(matches!(
            rt.eval_int(1),
            Err(RuntimeError::StackImbalance {
                ints: 2,
                strings: 0
            })
        ));
    }

    #[test]
    fn test_nested_evaluation_keeps_outer_values() {
        let mut program = Program::new();
        let id = program.literals.intern("ab");
        program.add_expr(Expr {
            ty: Type::String,
            ops: vec![Op::Lit(id), Op::Lit(id), Op::StrCat],
        });
        let mut rt = runtime(&program);

        // values already on the stacks belong to an enclosing expression
        rt.istack.push(99);
        rt.sstack.push("outer".into());
        assert_eq!(rt.eval_str(0).unwrap(), "abab");
        assert_eq!(rt.istack, vec![99]);
        assert_eq!(rt.sstack, vec!["outer".to_string()]);
    }

    #[test]
    fn test_comparison_opcodes() {
        let mut program = Program::new();
        for op in [Op::Lt, Op::Gt, Op::Lte, Op::Gte] {
            program.add_expr(Expr {
                ty: Type::Int,
                ops: vec![Op::Int(2), Op::Int(3), op],
            });
        }
        let mut rt = runtime(&program);
        let results: Vec<i32> = (0..4).map(|i| rt.eval_int(i).unwrap()).collect();
        assert_eq!(results, vec![1, 0, 1, 0]);
    }

    #[test]
    fn test_overflowing_division_wraps() {
        let mut program = Program::new();
        program.add_expr(Expr {
            ty: Type::Int,
            ops: vec![Op::Int(i32::MIN), Op::Int(-1), Op::Div],
        });
        let mut rt = runtime(&program);
        assert_eq!(rt.eval_int(0).unwrap(), i32::MIN);
    }
}
