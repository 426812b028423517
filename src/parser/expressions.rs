use super::helpers::{BinaryOp, Operands, Precedence};
use super::{ParseError, Parser};
use crate::lexer::TokenKind;
use crate::program::{Expr, Op, Type};

impl<'a> Parser<'a> {
    /// Parse a full expression into its own instruction list.
    /// Returns the expression index.
    pub(super) fn parse_expression(&mut self, depth: usize) -> Result<usize, ParseError> {
        self.check_depth(depth)?;
        let mut ops = Vec::new();
        let ty = crate::grow(|| self.parse_level(Precedence::Logic, &mut ops, depth))?;
        Ok(self.program.add_expr(Expr { ty, ops }))
    }

    // One precedence level, left associative. Operands are emitted before
    // the operator (postfix order).
    fn parse_level(
        &mut self,
        level: Precedence,
        ops: &mut Vec<Op>,
        depth: usize,
    ) -> Result<Type, ParseError> {
        let mut left = self.parse_operand(level, ops, depth)?;

        while let Some(op) = BinaryOp::from_token(self.peek_kind(), level) {
            let op_idx = self.current;
            self.advance();
            let right = self.parse_operand(level, ops, depth)?;
            left = self.emit_binary(op, op_idx, &left, &right, ops)?;
        }
        Ok(left)
    }

    fn parse_operand(
        &mut self,
        level: Precedence,
        ops: &mut Vec<Op>,
        depth: usize,
    ) -> Result<Type, ParseError> {
        match level.tighter() {
            Some(next) => self.parse_level(next, ops, depth),
            None => self.parse_atom(ops, depth),
        }
    }

    fn emit_binary(
        &self,
        op: BinaryOp,
        op_idx: usize,
        left: &Type,
        right: &Type,
        ops: &mut Vec<Op>,
    ) -> Result<Type, ParseError> {
        if left != right {
            return Err(self.error_at(
                op_idx,
                format!(
                    "Operand type mismatch for '{}': {} and {}",
                    op.symbol(),
                    self.program.type_name(left),
                    self.program.type_name(right)
                ),
            ));
        }

        let domain = Operands::of(left);
        if domain.is_empty() || !op.operands().contains(domain) {
            return Err(self.error_at(
                op_idx,
                format!(
                    "Invalid operand type {} for '{}'",
                    self.program.type_name(left),
                    op.symbol()
                ),
            ));
        }

        ops.push(op.opcode(domain));
        Ok(op.result_type(left))
    }

    fn parse_atom(&mut self, ops: &mut Vec<Op>, depth: usize) -> Result<Type, ParseError> {
        match self.peek_kind() {
            TokenKind::Integer | TokenKind::Minus | TokenKind::Plus => {
                let value = self.parse_integer()?;
                ops.push(Op::Int(value));
                Ok(Type::Int)
            }
            TokenKind::True => {
                self.advance();
                ops.push(Op::Int(1));
                Ok(Type::Int)
            }
            TokenKind::False => {
                self.advance();
                ops.push(Op::Int(0));
                Ok(Type::Int)
            }
            TokenKind::String => {
                let text = self.current_text().to_string();
                self.advance();
                let id = self.program.literals.intern(&text);
                ops.push(Op::Lit(id));
                Ok(Type::String)
            }
            TokenKind::LParen => {
                self.advance();
                self.check_depth(depth + 1)?;
                let ty = crate::grow(|| self.parse_level(Precedence::Logic, ops, depth + 1))?;
                self.consume(TokenKind::RParen, "')'")?;
                Ok(ty)
            }
            TokenKind::Identifier if self.peek_next_kind(1) == TokenKind::LParen => {
                let call = self.parse_call(depth)?;
                ops.push(Op::Call(call));
                Ok(Type::Int)
            }
            TokenKind::Identifier => {
                let path = self.parse_varpath(depth)?;
                let ty = self.program.varpaths[path].ty.clone();
                ops.push(match ty {
                    Type::Int => Op::VarPath(path),
                    Type::String => Op::VarPathStr(path),
                    Type::Array(_) | Type::Record(_) => Op::VarPathPtr(path),
                });
                Ok(ty)
            }
            _ => Err(self.error("Expected expression")),
        }
    }

    /// Integer literal with an optional sign, range checked to 32 bits
    pub(super) fn parse_integer(&mut self) -> Result<i32, ParseError> {
        let negative = match self.peek_kind() {
            TokenKind::Minus => {
                self.advance();
                true
            }
            TokenKind::Plus => {
                self.advance();
                false
            }
            _ => false,
        };

        if self.peek_kind() != TokenKind::Integer {
            return Err(self.error("Expected integer"));
        }
        let magnitude: i64 = self
            .current_text()
            .parse()
            .map_err(|_| self.error("Integer literal out of range"))?;
        let value = if negative { -magnitude } else { magnitude };
        let value =
            i32::try_from(value).map_err(|_| self.error("Integer literal out of range"))?;
        self.advance();
        Ok(value)
    }
}
