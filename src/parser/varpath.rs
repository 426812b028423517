use super::{ParseError, Parser};
use crate::lexer::TokenKind;
use crate::program::{PathOp, Type, VarPath};

impl<'a> Parser<'a> {
    /// Resolve `NAME ('[' expr ']' | '.' MEMBER)*`, narrowing the tracked
    /// type at every step. Returns the varpath index.
    pub(super) fn parse_varpath(&mut self, depth: usize) -> Result<usize, ParseError> {
        let name_idx = self.current;
        let name = self.expect_identifier("variable name")?;

        let local = self
            .function
            .and_then(|f| self.program.functions[f].variable(&name))
            .map(|dim| dim.ty.clone());

        let (mut ty, mut ops) = match local {
            Some(ty) => (ty, vec![PathOp::Local(name)]),
            None => match self.program.find_global(&name) {
                Some(dim) => (dim.ty.clone(), vec![PathOp::Global(name)]),
                None => {
                    return Err(self.error_at(name_idx, format!("Undefined variable '{}'", name)));
                }
            },
        };

        loop {
            match self.peek_kind() {
                TokenKind::LBracket => {
                    let elem = match ty.element() {
                        Some(elem) => elem.clone(),
                        None => {
                            return Err(self.error(format!(
                                "Type {} is not an array",
                                self.program.type_name(&ty)
                            )));
                        }
                    };
                    self.advance();

                    self.check_depth(depth + 1)?;
                    let index = self.parse_expression(depth + 1)?;
                    if !self.program.exprs[index].ty.is_int() {
                        return Err(self.error("Array index must be int"));
                    }
                    self.consume(TokenKind::RBracket, "']'")?;

                    ops.push(PathOp::Index(index));
                    ty = elem;
                }
                TokenKind::Dot => {
                    let record = match ty {
                        Type::Record(id) => id,
                        _ => {
                            return Err(self.error(format!(
                                "Type {} is not a record",
                                self.program.type_name(&ty)
                            )));
                        }
                    };
                    self.advance();

                    let member_idx = self.current;
                    let member = self.expect_identifier("member name")?;
                    let def = self.program.record(record);
                    let offset = match def.member_offset(&member) {
                        Some(offset) => offset,
                        None => {
                            return Err(self.error_at(
                                member_idx,
                                format!("Undefined member '{}' in {}", member, def.name),
                            ));
                        }
                    };

                    ty = def.members[offset].ty.clone();
                    ops.push(PathOp::Member(offset));
                }
                _ => break,
            }
        }

        Ok(self.program.add_varpath(VarPath { ty, ops }))
    }
}
