pub mod cli;
pub mod dump;
pub mod lexer;
pub mod limits;
pub mod parser;
pub mod program;
pub mod runtime;
pub mod string_storage;

use lexer::LexError;
use limits::{LimitError, Limits};
use parser::ParseError;
use program::Program;
use runtime::RuntimeError;

/// Any failure between reading source text and finishing a run
#[derive(Debug)]
pub enum Error {
    Limits(LimitError),
    Lex(LexError),
    Parse(ParseError),
    Runtime(RuntimeError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::Limits(e) => write!(f, "{}", e),
            Error::Lex(e) => write!(f, "{}", e),
            Error::Parse(e) => write!(f, "{}", e),
            Error::Runtime(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        // Display already renders the wrapped error
        match self {
            Error::Limits(e) => std::error::Error::source(e),
            Error::Lex(e) => std::error::Error::source(e),
            Error::Parse(e) => std::error::Error::source(e),
            Error::Runtime(e) => std::error::Error::source(e),
        }
    }
}

impl From<LimitError> for Error {
    fn from(e: LimitError) -> Self {
        Error::Limits(e)
    }
}

impl From<LexError> for Error {
    fn from(e: LexError) -> Self {
        Error::Lex(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

impl From<RuntimeError> for Error {
    fn from(e: RuntimeError) -> Self {
        Error::Runtime(e)
    }
}

// Native stack left before recursion moves onto a fresh segment
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024;

/// Run a recursive step, growing the native stack first when it runs low.
/// Depth limits bound the work; this keeps deep but legal input from
/// overflowing whatever thread the caller happens to be on.
pub(crate) fn grow<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, f)
}

/// Lex and parse source text into a validated program
pub fn compile(source: &str, limits: &Limits) -> Result<Program, Error> {
    let tokens = lexer::lex_with_limits(source, limits)?;
    log::debug!("lexed {} tokens", tokens.len());
    let program = parser::parse_with_limits(&tokens, limits.clone())?;
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_reports_stage() {
        let limits = Limits::default();
        assert!(matches!(compile("dim s = \"\\q\"\n", &limits), Err(Error::Lex(_))));
        assert!(matches!(compile("print 1\n", &limits), Err(Error::Parse(_))));
        assert!(compile("function main()\nend function\n", &limits).is_ok());
    }

    #[test]
    fn test_source_is_not_repeated() {
        use std::error::Error as _;

        let err = compile("dim s = \"\\q\"\n", &Limits::default()).unwrap_err();
        assert!(err.to_string().contains("Lexical error"), "{}", err);
        assert!(err.source().is_none());
    }

    fn nested_parens(depth: usize) -> String {
        format!("dim a = {}1{}\n", "(".repeat(depth), ")".repeat(depth))
    }

    #[test]
    fn test_deep_nesting_at_the_limit_parses() {
        let limits = Limits::default();
        let depth = limits.max_expr_depth - 2;
        assert!(compile(&nested_parens(depth), &limits).is_ok());

        let deeper = limits.max_expr_depth + 1;
        assert!(matches!(compile(&nested_parens(deeper), &limits), Err(Error::Parse(_))));
    }

    #[test]
    fn test_largest_expr_depth_parses() {
        let mut limits = Limits::default();
        limits.max_expr_depth = 10_000;
        assert!(limits.validate().is_ok());

        let program = compile(&nested_parens(9_000), &limits).unwrap();
        assert_eq!(program.exprs[0].ops.len(), 1);
    }
}
