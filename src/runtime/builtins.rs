use std::io::{BufRead, Write};

use super::{Runtime, RuntimeError};
use crate::program::{Argument, Builtin, Type};

impl<'p, R: BufRead, W: Write> Runtime<'p, R, W> {
    /// Intrinsics operating directly on heap cells. Signatures were checked
    /// when the program was parsed.
    pub(super) fn call_builtin(
        &mut self,
        builtin: Builtin,
        args: &[Argument],
    ) -> Result<i32, RuntimeError> {
        let [first, rest @ ..] = args else {
            return Err(RuntimeError::StackUnderflow);
        };

        match builtin {
            Builtin::Push => {
                let value = rest.first().ok_or(RuntimeError::StackUnderflow)?;
                let array = self.eval_int(first.expr)?;
                let slot = match &value.ty {
                    Type::Int => self.eval_int(value.expr)?,
                    Type::String => {
                        let s = self.eval_str(value.expr)?;
                        self.heap.make_str(s)?
                    }
                    Type::Array(_) | Type::Record(_) => {
                        let src = self.eval_int(value.expr)?;
                        self.heap.clone(src)?
                    }
                };
                self.heap.slots_mut(array)?.push(slot);
                Ok(0)
            }
            Builtin::Pop => {
                let array = self.eval_int(first.expr)?;
                let value = self
                    .heap
                    .slots_mut(array)?
                    .pop()
                    .ok_or(RuntimeError::ArrayUnderflow { ptr: array })?;
                match first.ty.element() {
                    Some(elem) if elem.is_heap() => {
                        self.heap.destroy(value)?;
                        Ok(0)
                    }
                    _ => Ok(value),
                }
            }
            Builtin::Len => {
                let len = match first.ty {
                    Type::String => self.eval_str(first.expr)?.len(),
                    _ => {
                        let array = self.eval_int(first.expr)?;
                        self.heap.slots(array)?.len()
                    }
                };
                Ok(len as i32)
            }
            Builtin::Default => {
                let ptr = self.eval_int(first.expr)?;
                self.heap.unmake_default(ptr)?;
                Ok(0)
            }
        }
    }
}
