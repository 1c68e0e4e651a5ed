// ABOUTME: Built-in global functions available before any user code runs

use crate::callable::NativeFunction;
use crate::environment::Environment;
use crate::value::Value;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Populates the global environment with the language's built-ins (spec §6:
/// "Built-in globals defined before any user code runs").
pub fn install(globals: &Rc<Environment>) {
    define_native(globals, "clock", 0, |_args| {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is after the Unix epoch")
            .as_secs_f64();
        Ok(Value::Number(seconds))
    });
}

fn define_native(
    globals: &Rc<Environment>,
    name: &str,
    arity: usize,
    func: impl Fn(&[Value]) -> Result<Value, crate::error::RuntimeError> + 'static,
) {
    let native = NativeFunction {
        name: name.to_string(),
        arity,
        func: Box::new(func),
    };
    globals.define(name, Value::Native(Rc::new(native)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenKind};

    #[test]
    fn clock_is_registered_with_zero_arity() {
        let globals = Environment::new_global();
        install(&globals);
        let value = globals.get(&Token::new(TokenKind::Identifier, "clock", None, 1)).unwrap();
        match value {
            Value::Native(native) => assert_eq!(native.arity, 0),
            _ => panic!("expected native function"),
        }
    }
}
