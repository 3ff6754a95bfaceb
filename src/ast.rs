//! Abstract syntax tree produced by the [`Parser`](crate::parser::Parser).
//!
//! Two closed node families, [`Expr`] and [`Stmt`].  Every node owns its
//! children; the only shared pieces are function declarations, held behind an
//! `Rc` so that runtime function values can point back at their body without
//! copying it.
//!
//! Nodes whose meaning depends on lexical scope (variable reads, assignments,
//! `this`, `super`) carry an [`ExprId`].  The resolver keys its distance
//! side‑table on it, so the tree itself never has to be mutated after
//! parsing.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;
use crate::types::LoxType;

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

/// Identity of a scope‑sensitive expression node.  Unique for the lifetime
/// of the process, so trees from separate parses (REPL lines) never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

impl ExprId {
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A **literal constant** that appears directly in the source code.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal ‑ stored as IEEE‑754 `f64`.
    Number(f64),

    /// String literal without surrounding quotes.
    Str(String),

    /// `true` / `false`.
    Bool(bool),

    /// The `nil` literal.
    Nil,
}

impl LiteralValue {
    /// Static type of the literal.
    pub fn ty(&self) -> LoxType {
        match self {
            LiteralValue::Number(_) => LoxType::Number,
            LiteralValue::Str(_) => LoxType::String,
            LiteralValue::Bool(_) => LoxType::Boolean,
            LiteralValue::Nil => LoxType::None,
        }
    }
}

/// A declared function parameter: `name: type`.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: Token,
    pub declared_type: LoxType,
}

/// A function or method: shared between the tree and the runtime closures
/// created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    /// `None` for anonymous function expressions.
    pub name: Option<Token>,

    /// The `fun` keyword, or the method name for methods.  Used for
    /// diagnostics when there is no name.
    pub keyword: Token,

    pub params: Vec<Parameter>,

    pub body: Vec<Stmt>,

    /// `Unknown` when no `-> type` annotation was written.
    pub return_type: LoxType,
}

impl FunctionDecl {
    /// Token to blame in diagnostics about this function.
    pub fn blame(&self) -> &Token {
        self.name.as_ref().unwrap_or(&self.keyword)
    }

    pub fn param_types(&self) -> Vec<LoxType> {
        self.params.iter().map(|p| p.declared_type.clone()).collect()
    }
}

/// A class body with an optional superclass.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDecl {
    /// `None` for anonymous class expressions.
    pub name: Option<Token>,

    /// The `class` keyword.
    pub keyword: Token,

    /// Always an [`Expr::Variable`] when present.
    pub superclass: Option<Expr>,

    pub methods: Vec<Rc<FunctionDecl>>,
}

impl ClassDecl {
    pub fn blame(&self) -> &Token {
        self.name.as_ref().unwrap_or(&self.keyword)
    }
}

/// **Abstract‑Syntax‑Tree node** for every kind of *expression*.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Assignment expression: `identifier "=" expression`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// `cond ? positive : negative`
    Ternary {
        question: Token,
        condition: Box<Expr>,
        positive: Box<Expr>,
        negative: Box<Expr>,
    },

    /// Short‑circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token, // `AND` or `OR`
        right: Box<Expr>,
    },

    /// Infix binary operator expression
    /// *Example:* `a + b`, `x <= y`
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Prefix unary operator expression
    /// *Example:* `!isReady` or `-42`
    Unary { operator: Token, right: Box<Expr> },

    /// Function‑, method‑ or constructor‑call expression.
    Call {
        callee: Box<Expr>,
        /// The closing `)` token ‑ retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// `super.method`
    Super {
        id: ExprId,
        keyword: Token,
        method: Token,
    },

    /// The `this` keyword inside a method.
    This { id: ExprId, keyword: Token },

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// Parenthesised sub‑expression.
    Grouping(Box<Expr>),

    /// Inline class expression.
    Class(Box<ClassDecl>),

    /// Inline function expression.
    Function(Rc<FunctionDecl>),
}

impl Expr {
    /// Build a variable reference with a fresh identity.
    pub fn variable(name: Token) -> Self {
        Expr::Variable {
            id: ExprId::fresh(),
            name,
        }
    }

    /// Line used when a runtime error has no better token to blame.
    pub fn line(&self) -> usize {
        match self {
            Expr::Assign { name, .. } => name.line,
            Expr::Ternary { question, .. } => question.line,
            Expr::Logical { operator, .. } => operator.line,
            Expr::Binary { operator, .. } => operator.line,
            Expr::Unary { operator, .. } => operator.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Get { name, .. } => name.line,
            Expr::Set { name, .. } => name.line,
            Expr::Literal(_) => 0,
            Expr::Super { keyword, .. } => keyword.line,
            Expr::This { keyword, .. } => keyword.line,
            Expr::Variable { name, .. } => name.line,
            Expr::Grouping(inner) => inner.line(),
            Expr::Class(decl) => decl.keyword.line,
            Expr::Function(decl) => decl.keyword.line,
        }
    }
}

/// **Abstract‑Syntax‑Tree node** for *statements*.  A program is a sequence
/// of these nodes returned by [`Parser::parse`](crate::parser::Parser::parse).
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `if` / `else` conditional.
    If {
        keyword: Token,
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `return` statement; `value.is_some()` is the has-value flag.
    Return {
        keyword: Token,
        value: Option<Expr>,
    },

    /// `while` loop.  `for` loops are desugared into this.
    While {
        keyword: Token,
        condition: Expr,
        body: Box<Stmt>,
    },

    /// `break;`
    Break { keyword: Token },

    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    /// Named class declaration.
    Class(ClassDecl),

    /// Named function declaration.
    Function(Rc<FunctionDecl>),

    /// Variable declaration: `"var" IDENT ("=" initializer)? ";"`.
    Var {
        name: Token,
        initializer: Option<Expr>,
    },

    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),
}
