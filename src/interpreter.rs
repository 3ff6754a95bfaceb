//! Tree‑walking evaluator.
//!
//! Statements return a [`ControlFlow`] so that `break` and `return` travel
//! back up the Rust call stack as ordinary values: loops intercept
//! `Break`, function calls intercept `Return`.  Runtime errors travel as
//! `Err(LoxError)` and abort the current `interpret` call.

use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{ClassDecl, Expr, ExprId, LiteralValue, Stmt};
use crate::environment::{self, EnvRef, Environment};
use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};
use crate::types::LoxType;
use crate::value::{Class, Function, Instance, NativeFunction, Value, INITIALIZER};

/// Default bound on nested calls before the fatal stack‑overflow error.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 512;

/// How a statement finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Normal,
    Break,
    Return(Value),
}

/// Library‑side interpreter settings.
#[derive(Debug, Clone)]
pub struct InterpreterConfig {
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

pub struct Interpreter {
    globals: EnvRef,
    environment: EnvRef,
    /// Resolver side‑table: scope distance per variable‑like node.  Nodes
    /// without an entry are globals.
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
    config: InterpreterConfig,
    call_depth: usize,
}

fn type_error<S: Into<String>>(line: usize, msg: S) -> LoxError {
    LoxError::runtime(RuntimeErrorKind::TypeError, line, msg)
}

fn native_print(interpreter: &mut Interpreter, args: &[Value]) -> Result<Value> {
    if let Some(value) = args.first() {
        writeln!(interpreter.output, "{}", value)?;
    }

    Ok(Value::Nil)
}

fn native_clock(_interpreter: &mut Interpreter, _args: &[Value]) -> Result<Value> {
    let micros: i64 = chrono::Utc::now().timestamp_micros();

    Ok(Value::Number(micros as f64 / 1_000_000.0))
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates a new Interpreter writing to stdout, with `print` and `clock`
    /// bound in its global frame.
    pub fn new() -> Self {
        Self::with_config(InterpreterConfig::default())
    }

    pub fn with_config(config: InterpreterConfig) -> Self {
        info!("Initializing Interpreter with {:?}", config);

        let globals: EnvRef = Environment::new().into_ref();

        for native in [
            NativeFunction {
                name: "print",
                arity: 1,
                func: native_print,
            },
            NativeFunction {
                name: "clock",
                arity: 0,
                func: native_clock,
            },
        ] {
            debug!("Defining native function '{}'", native.name);
            globals
                .borrow_mut()
                .define(native.name, Value::NativeFunction(Rc::new(native)));
        }

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output: Box::new(io::stdout()),
            config,
            call_depth: 0,
        }
    }

    /// Redirect `print` output.
    pub fn with_output<W: Write + 'static>(mut self, output: W) -> Self {
        self.output = Box::new(output);
        self
    }

    /// Record that the node `id` refers to a binding `depth` frames out.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        debug!("Noting local {:?} at depth {}", id, depth);
        self.locals.insert(id, depth);
    }

    /// Interprets a list of statements (a "program").  The first runtime
    /// error aborts the remaining statements.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<()> {
        debug!("Interpreting {} statements", statements.len());

        for stmt in statements {
            if let Err(e) = self.execute(stmt) {
                debug!("Runtime error, aborting: {}", e);
                self.environment = Rc::clone(&self.globals);
                self.call_depth = 0;
                return Err(e);
            }
        }

        info!("Interpretation completed successfully");
        Ok(())
    }

    /// Run `statements` inside `environment`, restoring the previous frame
    /// afterwards whatever the outcome.
    pub fn execute_block(&mut self, statements: &[Stmt], environment: EnvRef) -> Result<ControlFlow> {
        let previous: EnvRef = std::mem::replace(&mut self.environment, environment);

        let mut result: Result<ControlFlow> = Ok(ControlFlow::Normal);

        for stmt in statements {
            match self.execute(stmt) {
                Ok(ControlFlow::Normal) => {}
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<ControlFlow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(ControlFlow::Normal)
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                debug!("Defining variable '{}' = {}", name.lexeme, value);
                self.environment.borrow_mut().define(&name.lexeme, value);
                Ok(ControlFlow::Normal)
            }

            Stmt::Block(statements) => {
                let frame = Environment::with_enclosing(Rc::clone(&self.environment));
                self.execute_block(statements, frame.into_ref())
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_stmt) = else_branch {
                    self.execute(else_stmt)
                } else {
                    Ok(ControlFlow::Normal)
                }
            }

            Stmt::While {
                condition, body, ..
            } => {
                debug!("Entering while loop");

                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        ControlFlow::Normal => {}
                        ControlFlow::Break => break,
                        ret @ ControlFlow::Return(_) => return Ok(ret),
                    }
                }

                debug!("Exited while loop");
                Ok(ControlFlow::Normal)
            }

            Stmt::Break { .. } => Ok(ControlFlow::Break),

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };

                debug!("Returning value: {}", value);
                Ok(ControlFlow::Return(value))
            }

            Stmt::Function(decl) => {
                let function = Function::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                let name: &str = decl.blame().lexeme.as_str();

                info!("Function '{}' defined with {} parameters", name, decl.params.len());
                self.environment
                    .borrow_mut()
                    .define(name, Value::Function(Rc::new(function)));
                Ok(ControlFlow::Normal)
            }

            Stmt::Class(decl) => {
                let class: Rc<Class> = self.build_class(decl)?;
                let name: &str = decl.blame().lexeme.as_str();

                self.environment
                    .borrow_mut()
                    .define(name, Value::Class(class));
                Ok(ControlFlow::Normal)
            }
        }
    }

    /// Evaluate the superclass, then close every method over a frame that
    /// binds `super` when there is one.
    fn build_class(&mut self, decl: &ClassDecl) -> Result<Rc<Class>> {
        let superclass: Option<Rc<Class>> = match &decl.superclass {
            Some(expr) => match self.evaluate(expr)? {
                Value::Class(class) => Some(class),
                other => {
                    return Err(type_error(
                        expr.line(),
                        format!("Superclass must be a class, but was {} instead.", other),
                    ))
                }
            },
            None => None,
        };

        let method_env: EnvRef = match &superclass {
            Some(sup) => {
                let mut frame = Environment::with_enclosing(Rc::clone(&self.environment));
                frame.define("super", Value::Class(Rc::clone(sup)));
                frame.into_ref()
            }
            None => Rc::clone(&self.environment),
        };

        let methods: HashMap<String, Rc<Function>> = decl
            .methods
            .iter()
            .map(|method| {
                let name: String = method.blame().lexeme.clone();
                let is_initializer: bool = name == INITIALIZER;
                let function = Function::new(Rc::clone(method), Rc::clone(&method_env), is_initializer);

                (name, Rc::new(function))
            })
            .collect();

        let class = Class {
            name: decl.name.as_ref().map(|n| n.lexeme.clone()),
            superclass,
            methods,
        };

        info!("Class {} built with {} method(s)", class, class.methods.len());

        Ok(Rc::new(class))
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        let value: Value = match expr {
            Expr::Literal(literal) => match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            },

            Expr::Grouping(inner) => self.evaluate(inner)?,

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right)?,

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right)?,

            Expr::Logical {
                left,
                operator,
                right,
            } => self.evaluate_logical(left, operator, right)?,

            Expr::Ternary {
                question,
                condition,
                positive,
                negative,
            } => match self.evaluate(condition)? {
                Value::Bool(true) => self.evaluate(positive)?,
                Value::Bool(false) => self.evaluate(negative)?,
                other => {
                    return Err(type_error(
                        question.line,
                        format!(
                            "Operand in ternary must be a boolean, but was {} instead.",
                            other
                        ),
                    ))
                }
            },

            Expr::Variable { id, name } => self.look_up_variable(name, *id)?,

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(distance) => {
                        environment::assign_at(&self.environment, *distance, name, value.clone())?
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                value
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: Value = self.evaluate(callee)?;

                let mut args: Vec<Value> = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.call_value(&callee, paren, args)?
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name)?,
                other => {
                    return Err(type_error(
                        name.line,
                        format!(
                            "Only instances have properties, but tried to read '{}' on {}.",
                            name.lexeme, other
                        ),
                    ))
                }
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value: Value = self.evaluate(value)?;
                    instance.borrow_mut().set(name, value.clone());
                    value
                }
                other => {
                    return Err(type_error(
                        name.line,
                        format!(
                            "Only instances have fields, but tried to set '{}' on {}.",
                            name.lexeme, other
                        ),
                    ))
                }
            },

            Expr::This { id, keyword } => self.look_up_variable(keyword, *id)?,

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method)?,

            Expr::Function(decl) => Value::Function(Rc::new(Function::new(
                Rc::clone(decl),
                Rc::clone(&self.environment),
                false,
            ))),

            Expr::Class(decl) => Value::Class(self.build_class(decl)?),
        };

        debug!("Expression evaluated to: {}", value);
        Ok(value)
    }

    /// Evaluates a unary expression.
    fn evaluate_unary(&mut self, op: &Token, expr: &Expr) -> Result<Value> {
        let right: Value = self.evaluate(expr)?;

        match (&op.token_type, right) {
            (TokenType::BANG, Value::Bool(b)) => Ok(Value::Bool(!b)),
            (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
            (TokenType::BANG, other) => Err(type_error(
                op.line,
                format!("Operand for '!' must be a boolean, but was {} instead.", other),
            )),
            (TokenType::MINUS, other) => Err(type_error(
                op.line,
                format!("Operand for '-' must be a number, but was {} instead.", other),
            )),
            (_, _) => Err(type_error(
                op.line,
                format!("Invalid unary operator '{}'.", op.lexeme),
            )),
        }
    }

    /// Evaluates a binary expression.
    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let left_val: Value = self.evaluate(left)?;
        let right_val: Value = self.evaluate(right)?;

        debug!("Binary '{}' on {} and {}", op.lexeme, left_val, right_val);

        match op.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left_val != right_val)),
            TokenType::PLUS => {
                return match (left_val, right_val) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                    (l @ Value::String(_), r) | (l, r @ Value::String(_)) => {
                        Ok(Value::String(format!("{}{}", l, r)))
                    }
                    (l, r) => Err(type_error(
                        op.line,
                        format!(
                            "Operands for '+' must be two numbers or contain a string, but were {} and {} instead.",
                            l, r
                        ),
                    )),
                }
            }
            _ => {}
        }

        let (a, b) = match (&left_val, &right_val) {
            (Value::Number(a), Value::Number(b)) => (*a, *b),
            _ => {
                let culprit: &Value = if matches!(left_val, Value::Number(_)) {
                    &right_val
                } else {
                    &left_val
                };

                return Err(type_error(
                    op.line,
                    format!(
                        "Operand for '{}' must be a number, but was {} instead.",
                        op.lexeme, culprit
                    ),
                ));
            }
        };

        match op.token_type {
            TokenType::MINUS => Ok(Value::Number(a - b)),
            TokenType::STAR => Ok(Value::Number(a * b)),
            TokenType::SLASH => {
                if b == 0.0 {
                    Err(LoxError::runtime(
                        RuntimeErrorKind::MathError,
                        op.line,
                        "Cannot divide by zero.",
                    ))
                } else {
                    Ok(Value::Number(a / b))
                }
            }
            TokenType::LESS => Ok(Value::Bool(a < b)),
            TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
            TokenType::GREATER => Ok(Value::Bool(a > b)),
            TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
            _ => Err(type_error(
                op.line,
                format!("Invalid binary operator '{}'.", op.lexeme),
            )),
        }
    }

    /// `and` / `or`: short‑circuit, but every operand actually evaluated
    /// must be a boolean.
    fn evaluate_logical(&mut self, left: &Expr, op: &Token, right: &Expr) -> Result<Value> {
        let check = |value: Value| -> Result<bool> {
            match value {
                Value::Bool(b) => Ok(b),
                other => Err(type_error(
                    op.line,
                    format!(
                        "Operand for '{}' must be a boolean, but was {} instead.",
                        op.lexeme, other
                    ),
                )),
            }
        };

        let left_val: bool = check(self.evaluate(left)?)?;

        match op.token_type {
            TokenType::OR if left_val => return Ok(Value::Bool(true)),
            TokenType::AND if !left_val => return Ok(Value::Bool(false)),
            _ => {}
        }

        let right_val: bool = check(self.evaluate(right)?)?;
        Ok(Value::Bool(right_val))
    }

    fn look_up_variable(&self, name: &Token, id: ExprId) -> Result<Value> {
        match self.locals.get(&id) {
            Some(distance) => environment::get_at(&self.environment, *distance, name),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: the superclass lives `distance` frames out and the
    /// instance one frame inside that.
    fn evaluate_super(&mut self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance: usize = self.locals.get(&id).copied().ok_or_else(|| {
            LoxError::runtime(
                RuntimeErrorKind::DefError,
                keyword.line,
                "'super' is not bound here.",
            )
        })?;

        let superclass = environment::get_at(&self.environment, distance, keyword)?;
        let this_token = Token::synthetic("this", keyword.line);
        let object = environment::get_at(&self.environment, distance.saturating_sub(1), &this_token)?;

        match (superclass, object) {
            (Value::Class(superclass), Value::Instance(instance)) => {
                match superclass.find_method(&method.lexeme) {
                    Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
                    None => Err(LoxError::runtime(
                        RuntimeErrorKind::DefError,
                        method.line,
                        format!("Undefined property '{}'.", method.lexeme),
                    )),
                }
            }
            _ => Err(type_error(keyword.line, "'super' must refer to a class.")),
        }
    }

    /// Check callability, arity and declared parameter types, then invoke.
    fn call_value(&mut self, callee: &Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        let callable = callee.as_callable().ok_or_else(|| {
            type_error(
                paren.line,
                format!(
                    "Can only call functions and classes, but tried to call {}.",
                    callee
                ),
            )
        })?;

        if args.len() != callable.arity() {
            return Err(type_error(
                paren.line,
                format!(
                    "Expected {} arguments but got {}.",
                    callable.arity(),
                    args.len()
                ),
            ));
        }

        self.check_argument_types(callee, paren, &args)?;

        if self.call_depth >= self.config.max_call_depth {
            return Err(LoxError::StackOverflow { line: paren.line });
        }

        debug!("Calling {} with {} argument(s)", callee, args.len());

        self.call_depth += 1;
        let result = ensure_sufficient_stack(|| callable.call(self, args));
        self.call_depth -= 1;

        result
    }

    /// Dynamic counterpart of the resolver's argument check, for callees
    /// whose static type was not known.
    fn check_argument_types(&self, callee: &Value, paren: &Token, args: &[Value]) -> Result<()> {
        let declared: Vec<(String, LoxType)> = match callee {
            Value::Function(function) => function
                .declaration
                .params
                .iter()
                .map(|p| (p.name.lexeme.clone(), p.declared_type.clone()))
                .collect(),
            Value::Class(class) => match class.find_method(INITIALIZER) {
                Some(init) => init
                    .declaration
                    .params
                    .iter()
                    .map(|p| (p.name.lexeme.clone(), p.declared_type.clone()))
                    .collect(),
                None => Vec::new(),
            },
            _ => Vec::new(),
        };

        for ((param, ty), arg) in declared.iter().zip(args) {
            if !arg.matches_type(ty) {
                return Err(type_error(
                    paren.line,
                    format!(
                        "Expected an argument of type '{}' for parameter '{}', but was given {} instead.",
                        ty, param, arg
                    ),
                ));
            }
        }

        Ok(())
    }
}
