//! Chained scope frames.
//!
//! A frame is shared (`Rc<RefCell<_>>`) by every closure created while it was
//! active, so an assignment through one alias is seen by all of them.

use crate::error::{LoxError, Result, RuntimeErrorKind};
use crate::token::Token;
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a frame.
pub type EnvRef = Rc<RefCell<Environment>>;

#[derive(Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<EnvRef>,
}

fn undefined(name: &Token) -> LoxError {
    LoxError::runtime(
        RuntimeErrorKind::DefError,
        name.line,
        format!("Undefined variable '{}'.", name.lexeme),
    )
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap into a fresh shared handle.
    pub fn into_ref(self) -> EnvRef {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<EnvRef> {
        self.enclosing.clone()
    }

    /// Bind `name` in this frame, replacing any previous binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Binding in this frame only.
    pub fn get_here(&self, name: &str) -> Option<Value> {
        self.values.get(name).cloned()
    }

    /// Look `name` up, walking outward through enclosing frames.
    pub fn get(&self, name: &Token) -> Result<Value> {
        if let Some(value) = self.values.get(&name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Overwrite an existing binding, walking outward through enclosing frames.
    pub fn assign(&mut self, name: &Token, value: Value) -> Result<()> {
        if let Some(slot) = self.values.get_mut(&name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }
}

// Frames can be reachable from the values they hold (a bound method's frame
// holds its instance), so only names are printed.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.values.keys().collect::<Vec<_>>())
            .field("has_enclosing", &self.enclosing.is_some())
            .finish()
    }
}

/// The frame `distance` links out from `env`.
pub fn ancestor(env: &EnvRef, distance: usize) -> Option<EnvRef> {
    let mut current: EnvRef = Rc::clone(env);

    for _ in 0..distance {
        let next: EnvRef = current.borrow().enclosing()?;
        current = next;
    }

    Some(current)
}

/// Read `name` from exactly the frame `distance` hops out.
pub fn get_at(env: &EnvRef, distance: usize, name: &Token) -> Result<Value> {
    debug!("get_at '{}' distance={}", name.lexeme, distance);

    let frame: EnvRef = ancestor(env, distance).ok_or_else(|| undefined(name))?;
    let value = frame.borrow().values.get(&name.lexeme).cloned();

    value.ok_or_else(|| undefined(name))
}

/// Assign `name` in exactly the frame `distance` hops out.
pub fn assign_at(env: &EnvRef, distance: usize, name: &Token, value: Value) -> Result<()> {
    debug!("assign_at '{}' distance={}", name.lexeme, distance);

    let frame: EnvRef = ancestor(env, distance).ok_or_else(|| undefined(name))?;
    frame.borrow_mut().define(&name.lexeme, value);

    Ok(())
}
