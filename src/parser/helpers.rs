use bitflags::bitflags;

use super::error::ParseError;
use crate::lexer::{Token, TokenKind};
use crate::program::{Op, Type};

bitflags! {
    /// Operand types a binary operator accepts
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(super) struct Operands: u8 {
        const INT = 0b01;
        const STRING = 0b10;
    }
}

impl Operands {
    pub(super) fn of(ty: &Type) -> Operands {
        match ty {
            Type::Int => Operands::INT,
            Type::String => Operands::STRING,
            Type::Array(_) | Type::Record(_) => Operands::empty(),
        }
    }
}

// Operator precedence levels, loosest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Precedence {
    Logic,
    Compare,
    Additive,
    Multiplicative,
}

impl Precedence {
    /// The next tighter level, `None` below multiplication (atoms)
    pub(super) fn tighter(self) -> Option<Precedence> {
        match self {
            Precedence::Logic => Some(Precedence::Compare),
            Precedence::Compare => Some(Precedence::Additive),
            Precedence::Additive => Some(Precedence::Multiplicative),
            Precedence::Multiplicative => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum BinaryOp {
    And,
    Or,
    Eq,
    Neq,
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub(super) fn from_token(kind: TokenKind, level: Precedence) -> Option<BinaryOp> {
        let op = match (level, kind) {
            (Precedence::Logic, TokenKind::And) => BinaryOp::And,
            (Precedence::Logic, TokenKind::Or) => BinaryOp::Or,
            (Precedence::Compare, TokenKind::EqEq) => BinaryOp::Eq,
            (Precedence::Compare, TokenKind::BangEq) => BinaryOp::Neq,
            (Precedence::Additive, TokenKind::Plus) => BinaryOp::Add,
            (Precedence::Additive, TokenKind::Minus) => BinaryOp::Sub,
            (Precedence::Multiplicative, TokenKind::Star) => BinaryOp::Mul,
            (Precedence::Multiplicative, TokenKind::Slash) => BinaryOp::Div,
            _ => return None,
        };
        Some(op)
    }

    pub(super) fn operands(self) -> Operands {
        match self {
            BinaryOp::Eq | BinaryOp::Neq | BinaryOp::Add => Operands::INT | Operands::STRING,
            BinaryOp::And | BinaryOp::Or | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                Operands::INT
            }
        }
    }

    /// Opcode for operands of the given (already validated) domain
    pub(super) fn opcode(self, domain: Operands) -> Op {
        let strings = domain == Operands::STRING;
        match self {
            BinaryOp::And => Op::And,
            BinaryOp::Or => Op::Or,
            BinaryOp::Eq if strings => Op::StrEq,
            BinaryOp::Eq => Op::Eq,
            BinaryOp::Neq if strings => Op::StrNeq,
            BinaryOp::Neq => Op::Neq,
            BinaryOp::Add if strings => Op::StrCat,
            BinaryOp::Add => Op::Add,
            BinaryOp::Sub => Op::Sub,
            BinaryOp::Mul => Op::Mul,
            BinaryOp::Div => Op::Div,
        }
    }

    /// Concatenation stays a string, everything else yields an int
    pub(super) fn result_type(self, operand: &Type) -> Type {
        match (self, operand) {
            (BinaryOp::Add, Type::String) => Type::String,
            _ => Type::Int,
        }
    }

    pub(super) fn symbol(self) -> &'static str {
        match self {
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Eq => "==",
            BinaryOp::Neq => "!=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

// Parser helper methods
impl<'a> super::Parser<'a> {
    pub(super) fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::from_token(message.into(), self.current_token(), self.tokens)
    }

    /// Error pointing at an earlier token, e.g. an already consumed name
    pub(super) fn error_at(&self, token_idx: usize, message: impl Into<String>) -> ParseError {
        ParseError::from_token(message.into(), self.tokens.get(token_idx), self.tokens)
    }

    pub(super) fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth >= self.limits.max_expr_depth {
            return Err(self.error(format!(
                "Expression nesting too deep: {} levels (max {})",
                depth, self.limits.max_expr_depth
            )));
        }
        Ok(())
    }

    pub(super) fn check_block_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth >= self.limits.max_block_depth {
            return Err(self.error(format!(
                "Block nesting too deep: {} levels (max {})",
                depth, self.limits.max_block_depth
            )));
        }
        Ok(())
    }

    /// Consume a specific token kind or error
    pub(super) fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<(), ParseError> {
        if self.peek_kind() != kind {
            return Err(ParseError::unexpected_token(
                expected,
                self.current_token(),
                self.tokens,
            ));
        }
        self.advance();
        Ok(())
    }

    /// Consume the token if it matches
    pub(super) fn accept(&mut self, kind: TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            return true;
        }
        false
    }

    pub(super) fn expect_identifier(&mut self, expected: &str) -> Result<String, ParseError> {
        let token = self.current_token();
        if token.kind != TokenKind::Identifier {
            return Err(ParseError::unexpected_token(expected, token, self.tokens));
        }
        let text = token
            .text(&self.tokens.string_storage)
            .unwrap_or_default()
            .to_string();
        self.advance();
        Ok(text)
    }

    /// Statement terminator: newline or end of file
    pub(super) fn expect_endl(&mut self) -> Result<(), ParseError> {
        match self.peek_kind() {
            TokenKind::Newline => {
                self.advance();
                Ok(())
            }
            TokenKind::Eof => Ok(()),
            _ => Err(self.error("Expected end of line")),
        }
    }

    pub(super) fn at_endl(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Newline | TokenKind::Eof)
    }

    pub(super) fn advance(&mut self) {
        self.current = (self.current + 1).min(self.tokens.len());
    }

    pub(super) fn peek_kind(&self) -> TokenKind {
        self.tokens.peek_kind(self.current)
    }

    pub(super) fn peek_next_kind(&self, n: usize) -> TokenKind {
        self.tokens.peek_kind(self.current + n)
    }

    pub(super) fn current_token(&self) -> &Token {
        self.tokens.get(self.current)
    }

    pub(super) fn current_text(&self) -> &str {
        self.current_token()
            .text(&self.tokens.string_storage)
            .unwrap_or_default()
    }

    pub(super) fn skip_newlines(&mut self) {
        while self.peek_kind() == TokenKind::Newline {
            self.advance();
        }
    }
}
