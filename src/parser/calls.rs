use super::{ParseError, Parser};
use crate::lexer::TokenKind;
use crate::program::{Argument, Builtin, Call, Expr, Op, Type};

impl<'a> Parser<'a> {
    /// `NAME '(' [expr (',' expr)*] ')'`, recorded without checking the
    /// callee so functions may be called before they are declared.
    pub(super) fn parse_call(&mut self, depth: usize) -> Result<usize, ParseError> {
        let token = self.current_token();
        let (line, column) = (token.line, token.column);
        let name = self.expect_identifier("function name")?;
        self.consume(TokenKind::LParen, "'('")?;

        let mut args = Vec::new();
        if self.peek_kind() != TokenKind::RParen {
            loop {
                // default() resets a location in place, so it takes the path itself
                let expr = if args.is_empty() && Builtin::from_name(&name) == Some(Builtin::Default)
                {
                    self.check_depth(depth + 1)?;
                    let path = self.parse_varpath(depth + 1)?;
                    let ty = self.program.varpaths[path].ty.clone();
                    self.program.add_expr(Expr {
                        ty,
                        ops: vec![Op::VarPathPtr(path)],
                    })
                } else {
                    self.parse_expression(depth + 1)?
                };
                args.push(Argument {
                    ty: self.program.exprs[expr].ty.clone(),
                    expr,
                });
                if !self.accept(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RParen, "')'")?;

        Ok(self.program.add_call(Call {
            name,
            args,
            line,
            column,
        }))
    }

    /// Check every recorded call against its builtin or user signature
    pub(super) fn validate_calls(&self) -> Result<(), ParseError> {
        for call in &self.program.calls {
            match Builtin::from_name(&call.name) {
                Some(builtin) => self.validate_builtin(builtin, call)?,
                None => self.validate_user_call(call)?,
            }
        }
        Ok(())
    }

    fn validate_builtin(&self, builtin: Builtin, call: &Call) -> Result<(), ParseError> {
        let types: Vec<&Type> = call.args.iter().map(|a| &a.ty).collect();
        let (valid, signature) = match builtin {
            Builtin::Push => (
                matches!(types.as_slice(), [Type::Array(elem), value] if elem.as_ref() == *value),
                "(T[], T)",
            ),
            Builtin::Pop => (matches!(types.as_slice(), [Type::Array(_)]), "(T[])"),
            Builtin::Len => (
                matches!(types.as_slice(), [Type::Array(_)] | [Type::String]),
                "(T[] | string)",
            ),
            Builtin::Default => (
                matches!(types.as_slice(), [ty] if !ty.is_int()),
                "(string | T[] | record)",
            ),
        };

        if !valid {
            let found: Vec<String> = types.iter().map(|t| self.program.type_name(t)).collect();
            return Err(ParseError::at(
                format!(
                    "Call to '{}': expected {}, found ({})",
                    call.name,
                    signature,
                    found.join(", ")
                ),
                &call.name,
                call.line,
                call.column,
            ));
        }
        Ok(())
    }

    fn validate_user_call(&self, call: &Call) -> Result<(), ParseError> {
        let fail = |message: String| ParseError::at(message, &call.name, call.line, call.column);

        let function = match self.program.find_function(&call.name) {
            Some(f) => &self.program.functions[f],
            None => return Err(fail(format!("Undefined function '{}'", call.name))),
        };

        if function.args.len() != call.args.len() {
            return Err(fail(format!(
                "Call to '{}': expected {} arguments, found {}",
                call.name,
                function.args.len(),
                call.args.len()
            )));
        }

        for (i, (param, arg)) in function.args.iter().zip(&call.args).enumerate() {
            if param.ty != arg.ty {
                return Err(fail(format!(
                    "Call to '{}': argument {} expects {}, found {}",
                    call.name,
                    i + 1,
                    self.program.type_name(&param.ty),
                    self.program.type_name(&arg.ty)
                )));
            }
        }
        Ok(())
    }
}
