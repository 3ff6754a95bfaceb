//! Runtime values and the callable objects behind them.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::interpreter::{ControlFlow, Interpreter};
use crate::token::Token;
use crate::types::LoxType;

/// Name of the constructor method.
pub const INITIALIZER: &str = "init";

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    NativeFunction(Rc<NativeFunction>),
    Function(Rc<Function>),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
}

/// Anything that can appear in callee position.
pub trait Callable {
    fn arity(&self) -> usize;

    /// Invoke with already-evaluated, arity-checked arguments.
    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value>;
}

impl Value {
    /// Borrow the callable behind this value, if it is one.
    pub fn as_callable(&self) -> Option<&dyn Callable> {
        match self {
            Value::NativeFunction(f) => Some(f.as_ref()),
            Value::Function(f) => Some(f.as_ref()),
            Value::Class(c) => Some(c),
            _ => None,
        }
    }

    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Whether this runtime value inhabits the declared type `ty`.
    pub fn matches_type(&self, ty: &LoxType) -> bool {
        match (ty, self) {
            (LoxType::Unknown | LoxType::Any, _) => true,
            (LoxType::Number, Value::Number(_))
            | (LoxType::Boolean, Value::Bool(_))
            | (LoxType::String, Value::String(_))
            | (LoxType::None, Value::Nil) => true,
            (LoxType::Function(func), value) => value
                .as_callable()
                .map_or(false, |c| c.arity() == func.params.len()),
            (LoxType::Class(class), Value::Class(actual)) => actual.is_or_inherits(&class.name),
            (LoxType::Instance(inst), Value::Instance(actual)) => {
                actual.borrow().class.is_or_inherits(&inst.name)
            }
            _ => false,
        }
    }
}

impl PartialEq for Value {
    /// Value equality for primitives, identity for heap objects.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::NativeFunction(a), Value::NativeFunction(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Magnitude from which numbers print as `<mantissa>E<exponent>`.
const EXPONENT_THRESHOLD: f64 = 1e21;

/// `1e23` as `1.0E23`, `-1.5e30` as `-1.5E30`.
fn write_exponent(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    let rendered: String = format!("{:e}", n);
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((rendered.as_str(), "0"));

    if mantissa.contains('.') {
        write!(f, "{}E{}", mantissa, exponent)
    } else {
        write!(f, "{}.0E{}", mantissa, exponent)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Number(n) => {
                if n.abs() >= EXPONENT_THRESHOLD && n.is_finite() {
                    write_exponent(f, *n)
                } else if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::NativeFunction(native) => write!(f, "<native fn {}>", native.name),

            Value::Function(function) => write!(f, "{}", function),

            Value::Class(class) => write!(f, "{}", class),

            Value::Instance(instance) => write!(f, "{}", instance.borrow()),
        }
    }
}

// ───────────────────────────── native functions ─────────────────────────────

/// A callable implemented by the host.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: fn(&mut Interpreter, &[Value]) -> Result<Value>,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

impl Callable for NativeFunction {
    fn arity(&self) -> usize {
        self.arity
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        debug!("Calling native function '{}'", self.name);
        (self.func)(interpreter, &arguments)
    }
}

// ──────────────────────────── user functions ───────────────────────────────

/// A user function closed over the frame active at its definition.
#[derive(Debug)]
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: EnvRef,
    pub is_initializer: bool,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvRef, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    /// A copy of this method whose closure is a new frame defining `this`.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> Function {
        let mut frame = Environment::with_enclosing(Rc::clone(&self.closure));
        frame.define("this", Value::Instance(instance));

        Function {
            declaration: Rc::clone(&self.declaration),
            closure: frame.into_ref(),
            is_initializer: self.is_initializer,
        }
    }

    /// The bound instance, read from the closure frame of an initializer.
    fn bound_this(&self) -> Value {
        self.closure.borrow().get_here("this").unwrap_or(Value::Nil)
    }
}

impl Callable for Function {
    fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        let mut frame = Environment::with_enclosing(Rc::clone(&self.closure));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            frame.define(&param.name.lexeme, argument);
        }

        let flow = interpreter.execute_block(&self.declaration.body, frame.into_ref())?;

        if self.is_initializer {
            return Ok(self.bound_this());
        }

        match flow {
            ControlFlow::Return(value) => Ok(value),
            ControlFlow::Normal | ControlFlow::Break => Ok(Value::Nil),
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.declaration.name {
            Some(name) => write!(f, "<fn {}>", name.lexeme),
            None => write!(f, "<anonymous fn>"),
        }
    }
}

// ─────────────────────────────── classes ───────────────────────────────────

#[derive(Debug)]
pub struct Class {
    /// `None` for anonymous class expressions.
    pub name: Option<String>,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<Function>>,
}

impl Class {
    /// Look a method up on this class, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass.as_ref().and_then(|sup| sup.find_method(name))
    }

    /// Nominal subtype check against a class name.
    pub fn is_or_inherits(&self, name: &str) -> bool {
        self.name.as_deref() == Some(name)
            || self
                .superclass
                .as_ref()
                .map_or(false, |sup| sup.is_or_inherits(name))
    }
}

impl Callable for Rc<Class> {
    fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map(|init| init.arity())
            .unwrap_or(0)
    }

    fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(self))));
        info!("Instantiated {}", self);

        if let Some(init) = self.find_method(INITIALIZER) {
            init.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<class {}>", name),
            None => write!(f, "<anonymous class>"),
        }
    }
}

// ────────────────────────────── instances ──────────────────────────────────

pub struct Instance {
    pub class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    /// Field first, then a method bound to `this`.
    pub fn get(this: &Rc<RefCell<Instance>>, name: &Token) -> Result<Value> {
        if let Some(value) = this.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let method = this.borrow().class.find_method(&name.lexeme);

        match method {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(this))))),
            None => Err(LoxError::runtime(
                RuntimeErrorKind::DefError,
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    /// Create or overwrite a field.
    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<instance of {}>", self.class)
    }
}
