use crate::lexer::{Token, Tokens};

// Parse error
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub token: String, // offending token or name
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub(super) fn from_token(message: String, token: &Token, tokens: &Tokens) -> Self {
        Self {
            message,
            token: tokens.describe(token),
            line: token.line,
            column: token.column,
        }
    }

    pub(super) fn unexpected_token(expected: &str, token: &Token, tokens: &Tokens) -> Self {
        Self::from_token(format!("Expected {}", expected), token, tokens)
    }

    pub(super) fn at(message: String, token: &str, line: usize, column: usize) -> Self {
        Self {
            message,
            token: token.to_string(),
            line,
            column,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Parse error at {}:{}: {} [{}]",
            self.line, self.column, self.message, self.token
        )
    }
}

impl std::error::Error for ParseError {}
