//! Source text → scanner → parser → resolver → interpreter.
//!
//! A `Session` owns one [`Interpreter`] and the resolver's [`GlobalTypes`],
//! so globals defined by one call to [`Session::run`] or
//! [`Session::run_repl_line`] are visible to the next, types included.
//! Diagnostics go to the session's error sink (stderr by default); the
//! `had_error` / `had_runtime_error` flags let a driver pick an exit code.

use std::io::{self, Write};

use log::{debug, info};

use crate::ast::{Expr, Stmt};
use crate::error::LoxError;
use crate::interpreter::{Interpreter, InterpreterConfig};
use crate::parser::Parser;
use crate::resolver::{GlobalTypes, Resolver};
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Exit code for syntax and resolution diagnostics.
pub const EXIT_DIAGNOSTIC: i32 = 65;

/// Exit code for runtime errors, stack overflow included.
pub const EXIT_RUNTIME: i32 = 70;

pub struct Session {
    interpreter: Interpreter,
    /// Static types of globals from every successful resolve so far.
    global_types: GlobalTypes,
    diagnostics: Box<dyn Write>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        info!("Session created");

        Session {
            interpreter: Interpreter::with_config(config),
            global_types: GlobalTypes::default(),
            diagnostics: Box::new(io::stderr()),
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Redirect program output (`print`).
    pub fn with_output<W: Write + 'static>(self, output: W) -> Self {
        Session {
            interpreter: self.interpreter.with_output(output),
            ..self
        }
    }

    /// Redirect diagnostics and runtime error reports.
    pub fn with_diagnostics<W: Write + 'static>(mut self, diagnostics: W) -> Self {
        self.diagnostics = Box::new(diagnostics);
        self
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Clear the diagnostic flag between REPL lines.  Interpreter state is
    /// kept.
    pub fn reset_errors(&mut self) {
        self.had_error = false;
    }

    /// `65` after diagnostics, `70` after a runtime error, `None` otherwise.
    pub fn exit_code(&self) -> Option<i32> {
        if self.had_error {
            Some(EXIT_DIAGNOSTIC)
        } else if self.had_runtime_error {
            Some(EXIT_RUNTIME)
        } else {
            None
        }
    }

    /// Run a whole program.
    pub fn run(&mut self, source: &str) {
        let tokens: Vec<Token> = self.scan(source);

        let statements: Vec<Stmt> = match Parser::new(&tokens).parse() {
            Ok(statements) => statements,
            Err(errors) => {
                self.report_all(errors);
                return;
            }
        };

        self.execute(&statements);
    }

    /// Run one REPL line.  A line with no `;` and no `}` is taken as a bare
    /// expression and its value is printed.
    pub fn run_repl_line(&mut self, line: &str) {
        let tokens: Vec<Token> = self.scan(line);

        if tokens.iter().all(|t| t.token_type == TokenType::EOF) {
            return;
        }

        let bare_expression: bool = !tokens.iter().any(|t| {
            t.token_type == TokenType::SEMICOLON || t.token_type == TokenType::RIGHT_BRACE
        });

        if !bare_expression {
            debug!("REPL line parsed as statements");
            let statements: Vec<Stmt> = match Parser::new(&tokens).parse() {
                Ok(statements) => statements,
                Err(errors) => {
                    self.report_all(errors);
                    return;
                }
            };

            self.execute(&statements);
            return;
        }

        debug!("REPL line parsed as a bare expression");
        let expr: Expr = match Parser::new(&tokens).parse_expression() {
            Ok(expr) => expr,
            Err(errors) => {
                self.report_all(errors);
                return;
            }
        };

        let line_number: usize = expr.line().max(1);
        let print_call = Expr::Call {
            callee: Box::new(Expr::variable(Token::synthetic("print", line_number))),
            paren: Token::new(TokenType::RIGHT_PAREN, ")", line_number, 0),
            arguments: vec![expr],
        };

        self.execute(&[Stmt::Expression(print_call)]);
    }

    /// Parse a single expression, reporting any diagnostics.
    pub fn parse_expression(&mut self, source: &str) -> Option<Expr> {
        let tokens: Vec<Token> = self.scan(source);

        match Parser::new(&tokens).parse_expression() {
            Ok(expr) if !self.had_error => Some(expr),
            Ok(_) => None,
            Err(errors) => {
                self.report_all(errors);
                None
            }
        }
    }

    /// Parse, resolve and evaluate a single expression.
    pub fn evaluate(&mut self, source: &str) -> Option<Value> {
        let expr: Expr = self.parse_expression(source)?;

        let resolver = Resolver::with_globals(&mut self.interpreter, self.global_types.clone());
        if let Err(errors) = resolver.resolve_expression(&expr) {
            self.report_all(errors);
            return None;
        }

        match self.interpreter.evaluate(&expr) {
            Ok(value) => Some(value),
            Err(e) => {
                self.report(&e);
                None
            }
        }
    }

    fn scan(&mut self, source: &str) -> Vec<Token> {
        let (tokens, errors) = Scanner::new(source).scan_all();
        debug!("Scanned {} token(s), {} error(s)", tokens.len(), errors.len());

        self.report_all(errors);
        tokens
    }

    /// Resolve then interpret, unless an earlier stage already failed.
    fn execute(&mut self, statements: &[Stmt]) {
        if self.had_error {
            return;
        }

        let resolver = Resolver::with_globals(&mut self.interpreter, self.global_types.clone());
        match resolver.resolve_program(statements) {
            Ok(global_types) => self.global_types = global_types,
            Err(errors) => {
                self.report_all(errors);
                return;
            }
        }

        if let Err(e) = self.interpreter.interpret(statements) {
            self.report(&e);
        }
    }

    fn report_all(&mut self, errors: Vec<LoxError>) {
        for e in &errors {
            self.report(e);
        }
    }

    fn report(&mut self, error: &LoxError) {
        if error.is_runtime() {
            self.had_runtime_error = true;
        } else {
            self.had_error = true;
        }

        if let Err(e) = writeln!(self.diagnostics, "{}", error) {
            debug!("Failed to write diagnostic: {}", e);
        }
    }
}
