// ABOUTME: Callable values - user functions, native functions, classes, and instances

use crate::ast::FunctionDecl;
use crate::environment::Environment;
use crate::error::{EvalResult, RuntimeError, Unwind};
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A user-defined function, method, or lambda, closed over the environment
/// in which it was declared (spec §4.6 "Closures").
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<Environment>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(declaration: Rc<FunctionDecl>, closure: Rc<Environment>, is_initializer: bool) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    pub fn name(&self) -> Option<&str> {
        self.declaration.name.as_ref().map(|t| t.lexeme.as_str())
    }

    /// Returns a copy of `func` whose closure additionally binds `this` to
    /// `instance` one scope out (spec §4.6 "Bound methods").
    pub fn bind(func: &Rc<LoxFunction>, instance: &Rc<RefCell<LoxInstance>>) -> Rc<LoxFunction> {
        let env = Environment::new_enclosed(&func.closure);
        env.define("this", Value::Instance(Rc::clone(instance)));
        Rc::new(LoxFunction {
            declaration: Rc::clone(&func.declaration),
            closure: env,
            is_initializer: func.is_initializer,
        })
    }

    pub fn call(&self, interpreter: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
        let env = Environment::new_enclosed(&self.closure);
        for (param, arg) in self.declaration.params.iter().zip(args) {
            env.define(param.lexeme.clone(), arg.clone());
        }
        match interpreter.execute_block(&self.declaration.body, env) {
            Ok(()) => {
                if self.is_initializer {
                    Ok(self.closure.get_at_str(0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }
            Err(Unwind::Return(value)) => {
                if self.is_initializer {
                    Ok(self.closure.get_at_str(0, "this"))
                } else {
                    Ok(value)
                }
            }
            Err(other) => Err(other),
        }
    }
}

impl fmt::Display for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "<fn {name}>"),
            None => write!(f, "<fn lambda>"),
        }
    }
}

/// A host-provided builtin (spec §6: `clock`).
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub func: Box<dyn Fn(&[Value]) -> Result<Value, RuntimeError>>,
}

impl NativeFunction {
    pub fn call(&self, args: &[Value]) -> EvalResult<Value> {
        Ok((self.func)(args)?)
    }
}

/// A class is itself "callable" (spec §3: "a Class is itself callable") but
/// instantiation goes through `instantiate`, not a shared `call` path, since
/// classes need `find_method` and instance-construction beyond plain arity
/// checking and argument binding.
pub struct LoxClass {
    pub name: String,
    pub methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(name: impl Into<String>, methods: HashMap<String, Rc<LoxFunction>>) -> Self {
        LoxClass {
            name: name.into(),
            methods,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<Rc<LoxFunction>> {
        self.methods.get(name).cloned()
    }

    pub fn arity(&self) -> usize {
        self.find_method("init").map(|m| m.arity()).unwrap_or(0)
    }

    pub fn instantiate(class: &Rc<LoxClass>, interpreter: &mut Interpreter, args: &[Value]) -> EvalResult<Value> {
        let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(class))));
        if let Some(initializer) = class.find_method("init") {
            LoxFunction::bind(&initializer, &instance).call(interpreter, args)?;
        }
        Ok(Value::Instance(instance))
    }
}

/// A class instance: a class reference plus its own field table (spec §4.6
/// "Instances and fields"). Fields shadow methods of the same name when read.
pub struct LoxInstance {
    pub class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl LoxInstance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        LoxInstance {
            class,
            fields: HashMap::new(),
        }
    }

    pub fn get(self_rc: &Rc<RefCell<LoxInstance>>, name: &Token) -> Result<Value, RuntimeError> {
        let this = self_rc.borrow();
        if let Some(value) = this.fields.get(&name.lexeme) {
            return Ok(value.clone());
        }
        if let Some(method) = this.class.find_method(&name.lexeme) {
            drop(this);
            return Ok(Value::Function(LoxFunction::bind(&method, self_rc)));
        }
        Err(RuntimeError::new(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}
