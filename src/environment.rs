// ABOUTME: Lexical environments forming the scope chain used by the interpreter

use crate::error::RuntimeError;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A binding's value plus whether it has been given one yet. `var x;`
/// creates an uninitialized slot; reading it before assignment is a runtime
/// error (spec §4.4 "Uninitialized variables").
struct Slot {
    value: Value,
    initialized: bool,
}

/// One level of the scope chain. Globals are the root environment with no
/// parent; every block, function call, and `this`-binding pushes a child.
pub struct Environment {
    values: RefCell<HashMap<String, Slot>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new_global() -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    pub fn new_enclosed(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// `var` declarations always define in the current scope, shadowing an
    /// outer binding of the same name if one exists.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.values.borrow_mut().insert(
            name.into(),
            Slot {
                value,
                initialized: true,
            },
        );
    }

    /// Declares a name with no value yet (`var x;`). Reading it before a
    /// later assignment is a runtime error.
    pub fn declare(&self, name: impl Into<String>) {
        self.values.borrow_mut().insert(
            name.into(),
            Slot {
                value: Value::Nil,
                initialized: false,
            },
        );
    }

    pub fn get(&self, name: &Token) -> Result<Value, RuntimeError> {
        if let Some(slot) = self.values.borrow().get(&name.lexeme) {
            return if slot.initialized {
                Ok(slot.value.clone())
            } else {
                Err(RuntimeError::new(
                    name,
                    format!("Variable '{}' used before initialization.", name.lexeme),
                ))
            };
        }
        if let Some(parent) = &self.parent {
            return parent.get(name);
        }
        Err(RuntimeError::new(
            name,
            format!("Undefined variable '{}'.", name.lexeme),
        ))
    }

    pub fn assign(&self, name: &Token, value: Value) -> Result<(), RuntimeError> {
        if let Some(slot) = self.values.borrow_mut().get_mut(&name.lexeme) {
            slot.value = value;
            slot.initialized = true;
            return Ok(());
        }
        if let Some(parent) = &self.parent {
            return parent.assign(name, value);
        }
        Err(RuntimeError::new(
            name,
            format!("Undefined variable '{}'.", name.lexeme),
        ))
    }

    /// Resolver-indexed access: walk exactly `distance` parent links rather
    /// than searching, since the resolver has already proven the binding
    /// lives there (spec §4.5 "Resolver-indexed access").
    pub fn get_at(&self, distance: usize, name: &Token) -> Result<Value, RuntimeError> {
        self.ancestor(distance).get(name)
    }

    pub fn assign_at(&self, distance: usize, name: &Token, value: Value) -> Result<(), RuntimeError> {
        self.ancestor(distance).assign(name, value)
    }

    /// Like `get_at` but by raw name, used for binding `this` in bound
    /// methods where no `Token` is at hand.
    pub fn get_at_str(&self, distance: usize, name: &str) -> Value {
        let env = self.ancestor(distance);
        env.values
            .borrow()
            .get(name)
            .map(|slot| slot.value.clone())
            .expect("resolver guaranteed this binding exists")
    }

    fn ancestor(&self, distance: usize) -> &Environment {
        let mut env: &Environment = self;
        for _ in 0..distance {
            env = env
                .parent
                .as_deref()
                .expect("resolver-computed distance exceeds scope chain depth");
        }
        env
    }
}
