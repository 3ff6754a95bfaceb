//! Structural type descriptors used by the resolver's soft type layer.
//!
//! The layer is advisory: `Unknown` and `Any` are wildcards that match every
//! other descriptor so that one unresolvable expression does not cascade into
//! a wall of diagnostics.

use std::fmt;

/// A best‑effort static type.
#[derive(Debug, Clone, PartialEq)]
pub enum LoxType {
    Number,
    Boolean,
    String,
    /// `nil`, and the type of a slot that has not been assigned a type yet.
    None,
    /// Wildcard: the resolver could not tell.
    Unknown,
    /// Wildcard: explicitly accepts anything.
    Any,
    Function(FunctionType),
    Class(ClassType),
    Instance(InstanceType),
}

/// `(params…) -> ret`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<LoxType>,
    pub ret: Box<LoxType>,
}

/// A class, nominally identified by `name`.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    pub name: String,
    pub supertype: Option<Box<ClassType>>,
    /// Parameter types of `init`, when the class (or an ancestor) has one.
    pub constructor: Option<Vec<LoxType>>,
}

/// An instance of `class`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceType {
    pub name: String,
    pub class: ClassType,
}

impl FunctionType {
    pub fn new(params: Vec<LoxType>, ret: LoxType) -> Self {
        Self {
            params,
            ret: Box::new(ret),
        }
    }
}

impl ClassType {
    /// A class known only by name, as produced by a type annotation.
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            constructor: None,
        }
    }

    /// Same nominal name, or a match somewhere up the supertype chain.
    pub fn matches(&self, other: &ClassType) -> bool {
        if self.name == other.name {
            return true;
        }

        match &self.supertype {
            Some(sup) => sup.matches(other),
            None => false,
        }
    }

    /// The type of a fresh instance of this class.
    pub fn instance(&self) -> LoxType {
        LoxType::Instance(InstanceType {
            name: self.name.clone(),
            class: self.clone(),
        })
    }
}

impl LoxType {
    /// `Unknown` or `Any`.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, LoxType::Unknown | LoxType::Any)
    }

    /// Structural compatibility.  Wildcards match anything; the remaining
    /// rules are per-variant.
    pub fn matches(&self, other: &LoxType) -> bool {
        if self.is_wildcard() || other.is_wildcard() {
            return true;
        }

        match (self, other) {
            (LoxType::Number, LoxType::Number)
            | (LoxType::Boolean, LoxType::Boolean)
            | (LoxType::String, LoxType::String)
            | (LoxType::None, LoxType::None) => true,

            (LoxType::Function(a), LoxType::Function(b)) => {
                a.params.len() == b.params.len() && a.ret.matches(&b.ret)
            }

            (LoxType::Class(a), LoxType::Class(b)) => a.matches(b),

            (LoxType::Instance(a), LoxType::Instance(b)) => a.class.matches(&b.class),

            _ => false,
        }
    }

    /// Whether a value of this type may appear in callee position.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            LoxType::Function(_) | LoxType::Class(_) | LoxType::Unknown | LoxType::Any
        )
    }
}

impl fmt::Display for LoxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoxType::Number => f.write_str("number"),
            LoxType::Boolean => f.write_str("boolean"),
            LoxType::String => f.write_str("string"),
            LoxType::None => f.write_str("none"),
            LoxType::Unknown => f.write_str("unknown"),
            LoxType::Any => f.write_str("any"),
            LoxType::Function(func) => {
                f.write_str("(")?;
                for (i, p) in func.params.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", func.ret)
            }
            LoxType::Class(class) => write!(f, "class {}", class.name),
            LoxType::Instance(instance) => f.write_str(&instance.name),
        }
    }
}
