//! Static resolver pass.
//!
//! One walk over the tree does three things:
//! 1. Build lexical scopes (a stack of name → [`Binding`] maps) mirroring the
//!    frames the interpreter will create, and tell the interpreter the
//!    distance of every local reference.  Unmatched names are globals.
//! 2. Report static errors (redeclaration, forward read in an initializer,
//!    misplaced `return` / `break` / `this` / `super`, bad superclasses).
//! 3. Propagate a best‑effort [`LoxType`] per expression and report type
//!    mismatches.  `Unknown` / `Any` match everything so one unknown
//!    expression does not cascade.
//!
//! Diagnostics are accumulated; the walk never stops early.

use std::collections::HashMap;

use log::{debug, info};

use crate::ast::{ClassDecl, Expr, ExprId, FunctionDecl, Stmt};
use crate::error::LoxError;
use crate::interpreter::Interpreter;
use crate::token::{Token, TokenType};
use crate::types::{ClassType, FunctionType, LoxType};
use crate::value::INITIALIZER;

/// What kind of function body we are in.  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
    Initializer,
    Method,
}

/// What kind of class body we are in.  Used to validate `this` / `super`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassKind {
    None,
    Class,
    Subclass,
}

/// A name in a local scope.
#[derive(Debug, Clone)]
struct Binding {
    /// `false` between `var x` and the end of its initializer.
    defined: bool,
    /// `None` until the slot has been given a type.
    ty: Option<LoxType>,
}

/// `nil` and wildcard initializers leave the slot untyped.
fn slot_type(ty: LoxType) -> Option<LoxType> {
    match ty {
        LoxType::None | LoxType::Unknown => None,
        other => Some(other),
    }
}

/// Static facts about the global frame: slot types and the method tables
/// of named classes.  A [`crate::session::Session`] carries this from one
/// resolve pass to the next so REPL lines see each other's declarations.
#[derive(Debug, Clone)]
pub struct GlobalTypes {
    names: HashMap<String, Option<LoxType>>,
    /// Method signatures per named class, inherited entries included.
    classes: HashMap<String, HashMap<String, FunctionType>>,
}

impl Default for GlobalTypes {
    /// Only the natives are known.
    fn default() -> Self {
        let mut names: HashMap<String, Option<LoxType>> = HashMap::new();
        names.insert(
            "print".to_string(),
            Some(LoxType::Function(FunctionType::new(
                vec![LoxType::Unknown],
                LoxType::None,
            ))),
        );
        names.insert(
            "clock".to_string(),
            Some(LoxType::Function(FunctionType::new(
                Vec::new(),
                LoxType::Number,
            ))),
        );

        GlobalTypes {
            names,
            classes: HashMap::new(),
        }
    }
}

impl GlobalTypes {
    /// Static type of a global, `None` when unknown or untyped.
    pub fn type_of(&self, name: &str) -> Option<&LoxType> {
        self.names.get(name).and_then(Option::as_ref)
    }
}

pub struct Resolver<'i> {
    interpreter: &'i mut Interpreter,
    scopes: Vec<HashMap<String, Binding>>,
    globals: GlobalTypes,
    current_function: FunctionKind,
    current_class: ClassKind,
    current_return: LoxType,
    in_loop: bool,
    errors: Vec<LoxError>,
}

impl<'i> Resolver<'i> {
    /// Create a new resolver bound to the given interpreter, with the native
    /// globals pre‑typed.
    pub fn new(interpreter: &'i mut Interpreter) -> Self {
        Self::with_globals(interpreter, GlobalTypes::default())
    }

    /// Start from the global facts left by an earlier pass.
    pub fn with_globals(interpreter: &'i mut Interpreter, globals: GlobalTypes) -> Self {
        info!("Resolver instantiated");

        Resolver {
            interpreter,
            scopes: Vec::new(),
            globals,
            current_function: FunctionKind::None,
            current_class: ClassKind::None,
            current_return: LoxType::Unknown,
            in_loop: false,
            errors: Vec::new(),
        }
    }

    /// Walk all top‑level statements.
    pub fn resolve(self, statements: &[Stmt]) -> Result<(), Vec<LoxError>> {
        self.resolve_program(statements).map(|_| ())
    }

    /// Walk all top‑level statements and hand back the global facts for the
    /// next pass.
    pub fn resolve_program(mut self, statements: &[Stmt]) -> Result<GlobalTypes, Vec<LoxError>> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );

        for stmt in statements {
            self.resolve_stmt(stmt);
        }

        let globals: GlobalTypes = std::mem::take(&mut self.globals);
        self.finish(globals)
    }

    /// Resolve a lone expression and report its static type.
    pub fn resolve_expression(mut self, expr: &Expr) -> Result<LoxType, Vec<LoxError>> {
        let ty: LoxType = self.resolve_expr(expr);
        self.finish(ty)
    }

    fn finish<T>(self, value: T) -> Result<T, Vec<LoxError>> {
        if self.errors.is_empty() {
            info!("Resolve pass finished cleanly");
            Ok(value)
        } else {
            info!("Resolve pass finished with {} error(s)", self.errors.len());
            Err(self.errors)
        }
    }

    fn error<S: Into<String>>(&mut self, token: &Token, message: S) {
        self.errors.push(LoxError::resolve(token, message));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        debug!("Resolving stmt: {:?}", stmt);

        match stmt {
            Stmt::Expression(expr) => {
                self.resolve_expr(expr);
            }

            Stmt::Var { name, initializer } => {
                // declare → resolve initializer → define
                self.declare(name);
                let ty: LoxType = match initializer {
                    Some(expr) => self.resolve_expr(expr),
                    None => LoxType::None,
                };
                self.define(name, slot_type(ty));
            }

            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s);
                }
                self.end_scope();
            }

            Stmt::If {
                keyword,
                condition,
                then_branch,
                else_branch,
            } => {
                let ty: LoxType = self.resolve_expr(condition);
                if !ty.matches(&LoxType::Boolean) {
                    self.error(
                        keyword,
                        format!(
                            "Condition for if statement must be a boolean, but was {} instead.",
                            ty
                        ),
                    );
                }

                self.resolve_stmt(then_branch);
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb);
                }
            }

            Stmt::While {
                keyword,
                condition,
                body,
            } => {
                let ty: LoxType = self.resolve_expr(condition);
                if !ty.matches(&LoxType::Boolean) {
                    self.error(
                        keyword,
                        format!(
                            "Condition for while statement must be a boolean, but was {} instead.",
                            ty
                        ),
                    );
                }

                let enclosing: bool = std::mem::replace(&mut self.in_loop, true);
                self.resolve_stmt(body);
                self.in_loop = enclosing;
            }

            Stmt::Break { keyword } => {
                if !self.in_loop {
                    self.error(keyword, "Cannot break from outside a loop.");
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.error(keyword, "Cannot return from outside a function or method.");
                }

                if let Some(expr) = value {
                    if self.current_function == FunctionKind::Initializer {
                        self.error(keyword, "Cannot return a value from an initializer.");
                    }

                    let ty: LoxType = self.resolve_expr(expr);
                    let expected: LoxType = self.current_return.clone();
                    if !ty.matches(&expected) {
                        self.error(
                            keyword,
                            format!(
                                "Function expected a return value of type {} but returned {} instead.",
                                expected, ty
                            ),
                        );
                    }
                }
            }

            Stmt::Function(decl) => {
                // The name is visible inside its own body.
                let name: &Token = decl.blame();
                self.declare(name);
                self.define(
                    name,
                    Some(LoxType::Function(FunctionType::new(
                        decl.param_types(),
                        decl.return_type.clone(),
                    ))),
                );
                self.resolve_function(decl, FunctionKind::Function);
            }

            Stmt::Class(decl) => {
                self.resolve_class(decl, true);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> LoxType {
        debug!("Resolving expr: {:?}", expr);

        match expr {
            Expr::Literal(literal) => literal.ty(),

            Expr::Grouping(inner) => self.resolve_expr(inner),

            Expr::Unary { operator, right } => {
                let ty: LoxType = self.resolve_expr(right);
                let expected: LoxType = match operator.token_type {
                    TokenType::BANG => LoxType::Boolean,
                    _ => LoxType::Number,
                };

                if !ty.matches(&expected) {
                    self.error(
                        operator,
                        format!(
                            "Operand for '{}' must be a {}, but was {} instead.",
                            operator.lexeme, expected, ty
                        ),
                    );
                }

                expected
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left: LoxType = self.resolve_expr(left);
                let right: LoxType = self.resolve_expr(right);
                self.binary_type(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left: LoxType = self.resolve_expr(left);
                let right: LoxType = self.resolve_expr(right);

                if !left.matches(&LoxType::Boolean) || !right.matches(&LoxType::Boolean) {
                    self.error(
                        operator,
                        format!(
                            "Operands for '{}' must be two booleans, but were {} and {} instead.",
                            operator.lexeme, left, right
                        ),
                    );
                }

                LoxType::Boolean
            }

            Expr::Ternary {
                question,
                condition,
                positive,
                negative,
            } => {
                let condition: LoxType = self.resolve_expr(condition);
                let positive: LoxType = self.resolve_expr(positive);
                let negative: LoxType = self.resolve_expr(negative);

                if !condition.matches(&LoxType::Boolean) {
                    self.error(
                        question,
                        format!(
                            "Condition for ternary must be a boolean, but was {} instead.",
                            condition
                        ),
                    );
                    return LoxType::Unknown;
                }

                if !positive.matches(&negative) {
                    self.error(
                        question,
                        format!(
                            "Results for ternary must both be the same type, but were {} and {} instead.",
                            positive, negative
                        ),
                    );
                    return LoxType::Unknown;
                }

                positive
            }

            Expr::Variable { id, name } => {
                let in_initializer: bool = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    .map_or(false, |binding| !binding.defined);

                if in_initializer {
                    self.error(name, "Cannot read local variable in its own initializer.");
                    return LoxType::Unknown;
                }

                self.read_variable(*id, name)
            }

            Expr::Assign { id, name, value } => {
                let ty: LoxType = self.resolve_expr(value);
                self.assign_variable(*id, name, ty)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee: LoxType = self.resolve_expr(callee);
                let args: Vec<LoxType> = arguments.iter().map(|a| self.resolve_expr(a)).collect();
                self.call_type(paren, callee, &args)
            }

            Expr::Get { object, name } => {
                let ty: LoxType = self.resolve_expr(object);

                match &ty {
                    LoxType::Instance(instance) => self
                        .globals
                        .classes
                        .get(&instance.name)
                        .and_then(|methods| methods.get(&name.lexeme))
                        .map_or(LoxType::Unknown, |m| LoxType::Function(m.clone())),
                    t if t.is_wildcard() => LoxType::Unknown,
                    other => {
                        self.error(
                            name,
                            format!(
                                "Only instances can have properties, but attempted to get a property on {} instead.",
                                other
                            ),
                        );
                        LoxType::Unknown
                    }
                }
            }

            Expr::Set {
                object,
                name,
                value,
            } => {
                let value: LoxType = self.resolve_expr(value);
                let ty: LoxType = self.resolve_expr(object);

                if !matches!(ty, LoxType::Instance(_)) && !ty.is_wildcard() {
                    self.error(
                        name,
                        format!(
                            "Only instances can have fields, but attempted to set a field on {} instead.",
                            ty
                        ),
                    );
                }

                value
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassKind::None {
                    self.error(keyword, "Cannot use 'this' outside of a class.");
                    return LoxType::Unknown;
                }

                self.read_variable(*id, keyword)
            }

            Expr::Super {
                id,
                keyword,
                method,
            } => {
                match self.current_class {
                    ClassKind::None => {
                        self.error(keyword, "Cannot use 'super' outside of a class.");
                        return LoxType::Unknown;
                    }
                    ClassKind::Class => {
                        self.error(keyword, "Cannot use 'super' in a class with no superclass.");
                        return LoxType::Unknown;
                    }
                    ClassKind::Subclass => {}
                }

                let superclass: String = match self.read_variable(*id, keyword) {
                    LoxType::Instance(instance) => instance.name,
                    _ => return LoxType::Unknown,
                };

                let found: Option<Option<FunctionType>> = self
                    .globals
                    .classes
                    .get(&superclass)
                    .map(|methods| methods.get(&method.lexeme).cloned());

                match found {
                    Some(Some(signature)) => LoxType::Function(signature),
                    Some(None) => {
                        self.error(
                            method,
                            format!(
                                "Superclass {} has no method '{}'.",
                                superclass, method.lexeme
                            ),
                        );
                        LoxType::Unknown
                    }
                    None => LoxType::Unknown,
                }
            }

            Expr::Function(decl) => LoxType::Function(self.resolve_function(decl, FunctionKind::Function)),

            Expr::Class(decl) => self.resolve_class(decl, false),
        }
    }

    fn binary_type(&mut self, operator: &Token, left: LoxType, right: LoxType) -> LoxType {
        match operator.token_type {
            TokenType::EQUAL_EQUAL | TokenType::BANG_EQUAL => LoxType::Boolean,

            TokenType::PLUS => {
                if left == LoxType::String || right == LoxType::String {
                    LoxType::String
                } else if left.is_wildcard() || right.is_wildcard() {
                    LoxType::Unknown
                } else if left == LoxType::Number && right == LoxType::Number {
                    LoxType::Number
                } else {
                    self.error(
                        operator,
                        format!(
                            "Operands for '+' must be two numbers or contain one string, but were {} and {} instead.",
                            left, right
                        ),
                    );
                    LoxType::Unknown
                }
            }

            _ => {
                if !left.matches(&LoxType::Number) || !right.matches(&LoxType::Number) {
                    self.error(
                        operator,
                        format!(
                            "Operands for '{}' must be two numbers, but were {} and {} instead.",
                            operator.lexeme, left, right
                        ),
                    );
                    return LoxType::Unknown;
                }

                match operator.token_type {
                    TokenType::MINUS | TokenType::STAR | TokenType::SLASH => LoxType::Number,
                    _ => LoxType::Boolean,
                }
            }
        }
    }

    /// Check a call against a known signature; wildcards pass through.
    fn call_type(&mut self, paren: &Token, callee: LoxType, args: &[LoxType]) -> LoxType {
        if !callee.is_callable() {
            self.error(
                paren,
                format!(
                    "Only classes, functions, and methods can be called, but attempted to call {} instead.",
                    callee
                ),
            );
            return LoxType::Unknown;
        }

        let (params, result): (Vec<LoxType>, LoxType) = match callee {
            LoxType::Function(function) => (function.params, *function.ret),
            LoxType::Class(class) => {
                let instance: LoxType = class.instance();
                (class.constructor.unwrap_or_default(), instance)
            }
            _ => return LoxType::Unknown,
        };

        if params.len() != args.len() {
            self.error(
                paren,
                format!(
                    "Called function expected {} arguments, but was given {} instead.",
                    params.len(),
                    args.len()
                ),
            );
            return result;
        }

        for (param, arg) in params.iter().zip(args) {
            if !arg.matches(param) {
                self.error(
                    paren,
                    format!(
                        "Called function expected an arg of type '{}' but was given an arg of type '{}' instead.",
                        param, arg
                    ),
                );
            }
        }

        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function / class helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Enter a fresh scope for a function's parameters + body.  Loop context
    /// does not carry into a nested function.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionKind) -> FunctionType {
        let enclosing_function = std::mem::replace(&mut self.current_function, kind);
        let enclosing_loop = std::mem::replace(&mut self.in_loop, false);
        let enclosing_return = std::mem::replace(&mut self.current_return, decl.return_type.clone());

        self.begin_scope();
        for param in &decl.params {
            self.declare(&param.name);
            self.define(&param.name, Some(param.declared_type.clone()));
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();

        self.current_function = enclosing_function;
        self.in_loop = enclosing_loop;
        self.current_return = enclosing_return;

        FunctionType::new(decl.param_types(), decl.return_type.clone())
    }

    /// Scopes pushed here match the frames the interpreter builds: the
    /// optional `super` frame, then the `this` frame added by binding.
    fn resolve_class(&mut self, decl: &ClassDecl, bind_name: bool) -> LoxType {
        let enclosing_class = std::mem::replace(&mut self.current_class, ClassKind::Class);

        let mut supertype: Option<ClassType> = None;

        if let Some(superclass) = &decl.superclass {
            self.current_class = ClassKind::Subclass;

            if let (Some(name), Expr::Variable { name: sup_name, .. }) = (&decl.name, superclass) {
                if name.lexeme == sup_name.lexeme {
                    self.error(sup_name, "A class cannot extend itself.");
                }
            }

            match self.resolve_expr(superclass) {
                LoxType::Class(class) => supertype = Some(class),
                t if t.is_wildcard() => {}
                _ => {
                    let blame: Token = match superclass {
                        Expr::Variable { name, .. } => name.clone(),
                        _ => decl.keyword.clone(),
                    };
                    self.error(&blame, "A class cannot extend a non-class.");
                }
            }
        }

        let display_name: String = decl
            .name
            .as_ref()
            .map_or_else(|| "<anonymous class>".to_string(), |n| n.lexeme.clone());

        let constructor: Option<Vec<LoxType>> = decl
            .methods
            .iter()
            .find(|m| m.blame().lexeme == INITIALIZER)
            .map(|init| init.param_types())
            .or_else(|| supertype.as_ref().and_then(|s| s.constructor.clone()));

        let class_type = ClassType {
            name: display_name,
            supertype: supertype.clone().map(Box::new),
            constructor,
        };

        if bind_name {
            let name: &Token = decl.blame();
            self.declare(name);
            self.define(name, Some(LoxType::Class(class_type.clone())));
        }

        // Signatures are registered before any body so methods can call
        // each other through `this`.
        let mut methods: HashMap<String, FunctionType> = supertype
            .as_ref()
            .and_then(|s| self.globals.classes.get(&s.name).cloned())
            .unwrap_or_default();

        for method in &decl.methods {
            let name: &str = method.blame().lexeme.as_str();
            let ret: LoxType = if name == INITIALIZER {
                class_type.instance()
            } else {
                method.return_type.clone()
            };
            methods.insert(name.to_string(), FunctionType::new(method.param_types(), ret));
        }

        if decl.name.is_some() {
            self.globals.classes.insert(class_type.name.clone(), methods);
        }

        if decl.superclass.is_some() {
            self.begin_scope();
            self.insert_binding("super", supertype.as_ref().map(|s| s.instance()));
        }

        self.begin_scope();
        let this_type: Option<LoxType> = decl.name.as_ref().map(|_| class_type.instance());
        self.insert_binding("this", this_type);

        for method in &decl.methods {
            let kind: FunctionKind = if method.blame().lexeme == INITIALIZER {
                FunctionKind::Initializer
            } else {
                FunctionKind::Method
            };
            self.resolve_function(method, kind);
        }

        self.end_scope();
        if decl.superclass.is_some() {
            self.end_scope();
        }

        self.current_class = enclosing_class;

        debug!("Resolved class {}", class_type.name);
        LoxType::Class(class_type)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn insert_binding(&mut self, name: &str, ty: Option<LoxType>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), Binding { defined: true, ty });
        }
    }

    fn declare(&mut self, name: &Token) {
        let duplicate: bool = match self.scopes.last_mut() {
            Some(scope) => {
                let duplicate = scope.contains_key(&name.lexeme);
                scope.insert(
                    name.lexeme.clone(),
                    Binding {
                        defined: false,
                        ty: None,
                    },
                );
                duplicate
            }
            None => false,
        };

        if duplicate {
            self.error(name, "Variable with this name already declared in this scope.");
        }
    }

    fn define(&mut self, name: &Token, ty: Option<LoxType>) {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.lexeme.clone(), Binding { defined: true, ty });
            }
            None => {
                self.globals.names.insert(name.lexeme.clone(), ty);
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Innermost → outermost; on a match tell the interpreter the distance.
    fn locate(&mut self, id: ExprId, name: &Token) -> Option<usize> {
        let depth: Option<usize> = self
            .scopes
            .iter()
            .rev()
            .position(|scope| scope.contains_key(&name.lexeme));

        match depth {
            Some(depth) => {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                Some(self.scopes.len() - 1 - depth)
            }
            None => {
                debug!("Resolved '{}' as global", name.lexeme);
                None
            }
        }
    }

    fn read_variable(&mut self, id: ExprId, name: &Token) -> LoxType {
        let ty: Option<LoxType> = match self.locate(id, name) {
            Some(index) => self.scopes[index]
                .get(&name.lexeme)
                .and_then(|binding| binding.ty.clone()),
            None => self.globals.names.get(&name.lexeme).cloned().flatten(),
        };

        ty.unwrap_or(LoxType::Unknown)
    }

    /// The first typed assignment fixes an untyped slot; later ones must
    /// match it.
    fn assign_variable(&mut self, id: ExprId, name: &Token, value: LoxType) -> LoxType {
        let slot: Option<&mut Option<LoxType>> = match self.locate(id, name) {
            Some(index) => self.scopes[index]
                .get_mut(&name.lexeme)
                .map(|binding| &mut binding.ty),
            None => Some(self.globals.names.entry(name.lexeme.clone()).or_insert(None)),
        };

        let established: Option<LoxType> = match slot {
            Some(slot) => match slot {
                Some(ty) => Some(ty.clone()),
                None => {
                    *slot = slot_type(value.clone());
                    None
                }
            },
            None => None,
        };

        if let Some(established) = established {
            if !value.matches(&established) {
                self.error(
                    name,
                    format!(
                        "Variable '{}' has an established type of {} but a value of type {} was assigned instead.",
                        name.lexeme, established, value
                    ),
                );
            }
        }

        value
    }
}
