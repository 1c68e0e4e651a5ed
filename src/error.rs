// ABOUTME: Error taxonomy for lexing, parsing, resolving, and evaluation failures

use crate::token::{Token, TokenKind};
use crate::value::Value;
use thiserror::Error;

/// A lexical error: unterminated string, unterminated block comment, or an
/// unrecognized character. Reported via callback; the lexer keeps scanning.
#[derive(Debug, Clone, Error)]
#[error("[line {line}] Error: {message}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

/// A parse error: reported via callback, then the parser synchronizes and
/// keeps going so multiple errors can surface from one pass.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub token: Token,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.token.kind == TokenKind::Eof {
            write!(f, "[line {}] Error at end: {}", self.token.line, self.message)
        } else {
            write!(
                f,
                "[line {}] Error at '{}': {}",
                self.token.line, self.token.lexeme, self.message
            )
        }
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    pub fn new(message: impl Into<String>, token: Token) -> Self {
        ParseError {
            message: message.into(),
            token,
        }
    }
}

/// A static error raised by the resolver: read-in-own-initializer, duplicate
/// local, `return` outside a function, `this` outside a class, unused local.
#[derive(Debug, Clone, Error)]
#[error("[line {}] Error at '{}': {message}", token.line, token.lexeme)]
pub struct ResolveError {
    pub message: String,
    pub token: Token,
}

impl ResolveError {
    pub fn new(message: impl Into<String>, token: Token) -> Self {
        ResolveError {
            message: message.into(),
            token,
        }
    }
}

/// A runtime error: surfaces via the `runtime_error(token, message)` sink and
/// aborts the current top-level invocation.
#[derive(Debug, Clone, Error)]
#[error("{message}\n[line {}]", token.line)]
pub struct RuntimeError {
    pub token: Token,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn type_error(token: &Token, expected: &str) -> Self {
        RuntimeError::new(token, format!("Operand must be {expected}."))
    }
}

/// The three independent unwinding channels the interpreter needs: a runtime
/// error aborting the whole invocation, a `return` unwinding to the nearest
/// function call, and a `break` unwinding to the nearest loop. None of these
/// ever escape `Interpreter::run` observably.
#[derive(Debug, Clone)]
pub enum Unwind {
    Error(RuntimeError),
    Return(Value),
    Break,
}

impl From<RuntimeError> for Unwind {
    fn from(err: RuntimeError) -> Self {
        Unwind::Error(err)
    }
}

pub type EvalResult<T> = Result<T, Unwind>;
