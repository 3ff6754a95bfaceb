//! Centralised error hierarchy for the **typed Lox interpreter**.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here.  This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The `Display` output of every variant is the exact text reported to the
//! user, so drivers can simply `eprintln!("{}", err)`.
//!
//! The module **does not** print diagnostics itself

use std::fmt;
use std::io;
use thiserror::Error;

use log::info;

use crate::token::{Token, TokenType};

/// The three language-level runtime failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// An operand or callee had the wrong dynamic type.
    TypeError,

    /// A name or property could not be found.
    DefError,

    /// Arithmetic failure (division by zero).
    MathError,
}

impl fmt::Display for RuntimeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeErrorKind::TypeError => "TypeError",
            RuntimeErrorKind::DefError => "DefError",
            RuntimeErrorKind::MathError => "MathError",
        };

        f.write_str(name)
    }
}

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source position.
    #[error("[line {line}, column {column}] Error : {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,

        /// Column counter, reset at every newline.
        column: usize,
    },

    /// Syntactic (parser) error.
    #[error("[line {line}, column {column}] Error {location}: {message}")]
    Parse {
        message: String,
        /// `at end` or `at '<lexeme>'`.
        location: String,
        line: usize,
        column: usize,
    },

    /// Static‑analysis failure (scoping or type consistency).
    #[error("[line {line}, column {column}] Error {location}: {message}")]
    Resolve {
        message: String,
        location: String,
        line: usize,
        column: usize,
    },

    /// Runtime evaluation error.
    #[error("{kind}: {message}\n[line {line}]")]
    Runtime {
        kind: RuntimeErrorKind,
        message: String,
        line: usize,
    },

    /// Call depth exhausted.  Ends the current run; the interpreter drops
    /// back to its global frame.
    #[error("Stack overflow: maximum call depth exceeded.\n[line {line}]")]
    StackOverflow { line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Render the `<where>` part of a diagnostic for `token`.
fn location_of(token: &Token) -> String {
    if token.token_type == TokenType::EOF {
        "at end".to_string()
    } else {
        format!("at '{}'", token.lexeme)
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, column: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Lex error: line={}, column={}, msg={}",
            line, column, message
        );

        LoxError::Lex {
            message,
            line,
            column,
        }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            location: location_of(token),
            line: token.line,
            column: token.column,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            location: location_of(token),
            line: token.line,
            column: token.column,
        }
    }

    /// Helper constructor for the **interpreter**.
    pub fn runtime<S: Into<String>>(kind: RuntimeErrorKind, line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!(
            "Creating Runtime error: kind={}, line={}, msg={}",
            kind, line, message
        );

        LoxError::Runtime {
            kind,
            message,
            line,
        }
    }

    /// `true` for errors raised while executing (as opposed to front-end
    /// diagnostics).  Drivers map these to exit code 70.
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            LoxError::Runtime { .. } | LoxError::StackOverflow { .. }
        )
    }

    /// The runtime category, if this is a language-level runtime error.
    pub fn runtime_kind(&self) -> Option<RuntimeErrorKind> {
        match self {
            LoxError::Runtime { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;
