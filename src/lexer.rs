use std::iter::Peekable;
use std::str::CharIndices;

use crate::limits::Limits;
use crate::string_storage::{StringId, StringStorage};

// Token types

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords
    Module,
    Type,
    Dim,
    Function,
    End,
    If,
    Else,
    While,
    For,
    To,
    Step,
    Break,
    Continue,
    Return,
    Let,
    Call,
    Print,
    Input,
    True,
    False,
    And,
    Or,

    // Identifiers and Literals
    Identifier,
    Integer,
    String,

    // Punctuation
    Comma,    // ,
    Dot,      // .
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Assign,   // =
    EqEq,     // ==
    BangEq,   // !=

    // Special
    Newline,
    Eof,
}

impl TokenKind {
    /// Source spelling for keywords and punctuation
    pub fn spelling(self) -> Option<&'static str> {
        let s = match self {
            TokenKind::Module => "module",
            TokenKind::Type => "type",
            TokenKind::Dim => "dim",
            TokenKind::Function => "function",
            TokenKind::End => "end",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::For => "for",
            TokenKind::To => "to",
            TokenKind::Step => "step",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Let => "let",
            TokenKind::Call => "call",
            TokenKind::Print => "print",
            TokenKind::Input => "input",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Assign => "=",
            TokenKind::EqEq => "==",
            TokenKind::BangEq => "!=",
            TokenKind::Identifier
            | TokenKind::Integer
            | TokenKind::String
            | TokenKind::Newline
            | TokenKind::Eof => return None,
        };
        Some(s)
    }
}

#[derive(Debug, Clone)]
pub struct Tokens {
    pub list: Vec<Token>,
    pub string_storage: StringStorage,
}

impl Tokens {
    pub fn new(tokens: Vec<Token>, storage: StringStorage) -> Self {
        Self {
            list: tokens,
            string_storage: storage,
        }
    }

    pub fn peek_kind(&self, index: usize) -> TokenKind {
        match self.list.get(index) {
            Some(token) => token.kind,
            None => TokenKind::Eof,
        }
    }

    /// Token at `index`, clamped to the trailing `Eof`
    pub fn get(&self, index: usize) -> &Token {
        let last = self.list.len().saturating_sub(1);
        &self.list[index.min(last)]
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Human readable token text for diagnostics
    pub fn describe(&self, token: &Token) -> String {
        match token.kind {
            TokenKind::Eof => "<EOF>".to_string(),
            TokenKind::Newline => "<EOL>".to_string(),
            TokenKind::String => format!("\"{}\"", token.text(&self.string_storage).unwrap_or("")),
            kind => match token.text(&self.string_storage) {
                Some(text) => text.to_string(),
                None => kind.spelling().unwrap_or("?").to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,                 // 1-indexed
    pub column: usize,               // 1-indexed
    pub string_id: Option<StringId>, // For identifiers, integers and string literals
}

impl Token {
    pub fn text<'a>(&self, storage: &'a StringStorage) -> Option<&'a str> {
        self.string_id.map(|id| storage.resolve(id))
    }
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for LexError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Lexical error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

// Lexer

pub struct Lexer<'a> {
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
    line: usize,
    column: usize,
    limits: &'a Limits,
    token_count: usize,
    string_storage: StringStorage,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, limits: &'a Limits) -> Result<Self, LexError> {
        if source.len() > limits.max_input_size {
            return Err(LexError {
                message: format!(
                    "Input too large: {} bytes (max: {} bytes)",
                    source.len(),
                    limits.max_input_size
                ),
                line: 1,
                column: 1,
            });
        }

        Ok(Self {
            chars: source.char_indices().peekable(),
            pos: 0,
            line: 1,
            column: 1,
            limits,
            token_count: 0,
            string_storage: StringStorage::new(),
        })
    }

    // Character navigation methods

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn consume_char(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.pos = pos + ch.len_utf8();

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.consume_char();
            } else {
                break;
            }
        }
    }

    fn error(&self, message: String) -> LexError {
        LexError {
            message,
            line: self.line,
            column: self.column,
        }
    }

    // Main tokenization method

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if self.token_count >= self.limits.max_token_count {
            return Err(self.error(format!(
                "Token limit exceeded: {} tokens (max: {})",
                self.token_count, self.limits.max_token_count
            )));
        }

        self.skip_whitespace();
        if self.peek_char() == Some('#') {
            self.skip_comment()?;
        }

        let start_line = self.line;
        let start_column = self.column;

        let (kind, string_id) = match self.peek_char() {
            None => (TokenKind::Eof, None),
            Some('\n') => {
                self.consume_char();
                (TokenKind::Newline, None)
            }
            Some(c) if c.is_ascii_digit() => self.lex_integer(),
            Some(c) if is_ident_start(c) => self.lex_ident_or_keyword()?,
            Some('"') => self.lex_string()?,
            Some('=') => {
                self.consume_char();
                if self.peek_char() == Some('=') {
                    self.consume_char();
                    (TokenKind::EqEq, None)
                } else {
                    (TokenKind::Assign, None)
                }
            }
            Some('!') => {
                self.consume_char();
                if self.peek_char() != Some('=') {
                    return Err(self.error("Expected '=' after '!'".into()));
                }
                self.consume_char();
                (TokenKind::BangEq, None)
            }
            Some(c) => {
                let kind = match c {
                    ',' => TokenKind::Comma,
                    '.' => TokenKind::Dot,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '[' => TokenKind::LBracket,
                    ']' => TokenKind::RBracket,
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    _ => return Err(self.error(format!("Unexpected character: '{}'", c))),
                };
                self.consume_char();
                (kind, None)
            }
        };

        self.token_count += 1;

        Ok(Token {
            kind,
            line: start_line,
            column: start_column,
            string_id,
        })
    }

    // Comment handling: '#' up to (not including) the end of line

    fn skip_comment(&mut self) -> Result<(), LexError> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.consume_char();
            if self.pos - start > self.limits.max_comment_length {
                return Err(self.error(format!(
                    "Comment too long: {} bytes (max: {} bytes)",
                    self.pos - start,
                    self.limits.max_comment_length
                )));
            }
        }
        Ok(())
    }

    // Identifier and keyword lexing

    fn lex_ident_or_keyword(&mut self) -> Result<(TokenKind, Option<StringId>), LexError> {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if !is_ident_continue(c) {
                break;
            }
            text.push(c);
            self.consume_char();
        }

        if text.len() > self.limits.max_identifier_length {
            return Err(self.error(format!(
                "Identifier too long: {} bytes (max: {} bytes)",
                text.len(),
                self.limits.max_identifier_length
            )));
        }

        let kind = match text.as_str() {
            "module" => TokenKind::Module,
            "type" => TokenKind::Type,
            "dim" => TokenKind::Dim,
            "function" => TokenKind::Function,
            "end" => TokenKind::End,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "to" => TokenKind::To,
            "step" => TokenKind::Step,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "let" => TokenKind::Let,
            "call" => TokenKind::Call,
            "print" => TokenKind::Print,
            "input" => TokenKind::Input,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            _ => {
                let string_id = self.string_storage.intern(&text);
                return Ok((TokenKind::Identifier, Some(string_id)));
            }
        };

        // Keywords don't get interned
        Ok((kind, None))
    }

    // Integers are kept as text; the parser range-checks them

    fn lex_integer(&mut self) -> (TokenKind, Option<StringId>) {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.consume_char();
        }
        (TokenKind::Integer, Some(self.string_storage.intern(&text)))
    }

    // String lexing: double quoted, `\"` is the only escape

    fn lex_string(&mut self) -> Result<(TokenKind, Option<StringId>), LexError> {
        self.consume_char(); // opening quote
        let mut content = String::new();

        loop {
            match self.peek_char() {
                None | Some('\n') => {
                    return Err(self.error("Unterminated string".into()));
                }
                Some('\\') => {
                    self.consume_char();
                    if self.peek_char() != Some('"') {
                        return Err(self.error("Bad string escape sequence".into()));
                    }
                    self.consume_char();
                    content.push('"');
                }
                Some('"') => {
                    self.consume_char();
                    break;
                }
                Some(c) => {
                    self.consume_char();
                    content.push(c);
                }
            }

            if content.len() > self.limits.max_string_length {
                return Err(self.error(format!(
                    "String literal too long: {} bytes (max: {} bytes)",
                    content.len(),
                    self.limits.max_string_length
                )));
            }
        }

        let string_id = self.string_storage.intern(&content);
        Ok((TokenKind::String, Some(string_id)))
    }
}

// Helper functions

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

// Public API

pub fn lex(source: &str) -> Result<Tokens, LexError> {
    lex_with_limits(source, &Limits::default())
}

pub fn lex_with_limits(source: &str, limits: &Limits) -> Result<Tokens, LexError> {
    let mut lexer = Lexer::new(source, limits)?;
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }

    log::trace!("lexed {} tokens", tokens.len());
    Ok(Tokens::new(tokens, lexer.string_storage))
}

// Tests

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().list.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_keywords() {
        assert_eq!(kinds("module")[0], TokenKind::Module);
        assert_eq!(kinds("dim")[0], TokenKind::Dim);
        assert_eq!(kinds("function")[0], TokenKind::Function);
        assert_eq!(kinds("continue")[0], TokenKind::Continue);
        assert_eq!(kinds("true")[0], TokenKind::True);

        // Type names are plain identifiers
        assert_eq!(kinds("int")[0], TokenKind::Identifier);
        assert_eq!(kinds("string")[0], TokenKind::Identifier);
        assert_eq!(kinds("Dim")[0], TokenKind::Identifier);
    }

    #[test]
    fn test_statement_tokens() {
        assert_eq!(
            kinds("let a.b[1] = 2\n"),
            vec![
                TokenKind::Let,
                TokenKind::Identifier,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::LBracket,
                TokenKind::Integer,
                TokenKind::RBracket,
                TokenKind::Assign,
                TokenKind::Integer,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            kinds("a == b != c"),
            vec![
                TokenKind::Identifier,
                TokenKind::EqEq,
                TokenKind::Identifier,
                TokenKind::BangEq,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("print 1 # trailing \"text\"\n# whole line\n"),
            vec![
                TokenKind::Print,
                TokenKind::Integer,
                TokenKind::Newline,
                TokenKind::Newline,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_content_and_escape() {
        let tokens = lex(r#"print "say \"hi\"""#).unwrap();
        let tok = &tokens.list[1];
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.text(&tokens.string_storage), Some("say \"hi\""));
    }

    #[test]
    fn test_errors() {
        assert!(lex("\"open").is_err());
        assert!(lex(r#""bad \n escape""#).is_err());
        assert!(lex("a ! b").is_err());
        assert!(lex("a ; b").is_err());
    }

    #[test]
    fn test_position_tracking() {
        let tokens = lex("dim a\n  print a").unwrap();
        let print = &tokens.list[3];
        assert_eq!(print.kind, TokenKind::Print);
        assert_eq!(print.line, 2);
        assert_eq!(print.column, 3);
    }

    #[test]
    fn test_describe_tokens() {
        let tokens = lex("foo \"x\" 12 ==").unwrap();
        assert_eq!(tokens.describe(&tokens.list[0]), "foo");
        assert_eq!(tokens.describe(&tokens.list[1]), "\"x\"");
        assert_eq!(tokens.describe(&tokens.list[2]), "12");
        assert_eq!(tokens.describe(&tokens.list[3]), "==");
        assert_eq!(tokens.describe(&tokens.list[4]), "<EOF>");
    }

    #[test]
    fn test_identifier_limit() {
        let mut limits = Limits::default();
        limits.max_identifier_length = 3;
        assert!(lex_with_limits("abcd", &limits).is_err());
        assert!(lex_with_limits("abc", &limits).is_ok());
    }
}
