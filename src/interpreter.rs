// ABOUTME: Tree-walking evaluator: walks the AST using resolver-annotated lookups

use crate::ast::{Expr, ExprKind, LiteralValue, NodeId, Stmt};
use crate::builtins;
use crate::callable::{LoxClass, LoxFunction, LoxInstance, NativeFunction};
use crate::environment::Environment;
use crate::error::{EvalResult, RuntimeError, Unwind};
use crate::token::{Token, TokenKind};
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// Walks statements with a mutable "current environment" that moves as
/// blocks and calls are entered and exited, consulting the resolver's
/// distance table for locals and falling back to globals otherwise (spec
/// §4.4). Implemented as plain `match`-based dispatch over the AST's tagged
/// sum types, not a visitor interface (spec §9 design notes).
pub struct Interpreter {
    pub globals: Rc<Environment>,
    environment: Rc<Environment>,
    locals: HashMap<NodeId, usize>,
    is_repl: bool,
    print_sink: Box<dyn FnMut(&str)>,
}

impl Interpreter {
    /// Globals and the environment chain are created once; a REPL session
    /// reuses the same `Interpreter` across lines so top-level bindings
    /// persist (spec §7: "REPL: reset error flags for next line" implies
    /// everything else survives).
    pub fn new(print_sink: Box<dyn FnMut(&str)>) -> Self {
        let globals = Environment::new_global();
        builtins::install(&globals);
        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            is_repl: false,
            print_sink,
        }
    }

    pub fn set_repl_mode(&mut self, is_repl: bool) {
        self.is_repl = is_repl;
    }

    /// Merges in a fresh resolver pass's distance table. Node ids are never
    /// reused, so entries from earlier `run` calls (reachable through
    /// closures still alive in the environment chain) stay valid.
    pub fn extend_locals(&mut self, locals: HashMap<NodeId, usize>) {
        self.locals.extend(locals);
    }

    /// Registers a host-provided native function in the global scope,
    /// before the first `run` (spec §6 `register_native`).
    pub fn register_native(
        &self,
        name: &str,
        arity: usize,
        func: impl Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    ) {
        let native = NativeFunction {
            name: name.to_string(),
            arity,
            func: Box::new(func),
        };
        self.globals.define(name, Value::Native(Rc::new(native)));
    }

    /// Runs a whole program. Returns the first runtime error encountered;
    /// the caller maps that to exit code 70 (spec §7 "Runtime errors abort
    /// the current top-level invocation").
    pub fn interpret(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeError> {
        for stmt in stmts {
            match self.execute(stmt) {
                Ok(()) => {}
                Err(Unwind::Error(err)) => return Err(err),
                Err(Unwind::Return(_)) | Err(Unwind::Break) => {}
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> EvalResult<()> {
        match stmt {
            Stmt::Expression(expr) => {
                let value = self.evaluate(expr)?;
                if self.is_repl {
                    self.write_out(&format!("{value}\n"));
                }
                Ok(())
            }
            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                self.write_out(&format!("{value}\n"));
                Ok(())
            }
            Stmt::Var { name, initializer } => {
                match initializer {
                    Some(init) => {
                        let value = self.evaluate(init)?;
                        self.environment.define(name.lexeme.clone(), value);
                    }
                    None => self.environment.declare(name.lexeme.clone()),
                }
                Ok(())
            }
            Stmt::Block(stmts) => {
                let env = Environment::new_enclosed(&self.environment);
                self.execute_block(stmts, env)
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(cond)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(())
                }
            }
            Stmt::While { cond, body } => {
                while self.evaluate(cond)?.is_truthy() {
                    match self.execute(body) {
                        Ok(()) => {}
                        Err(Unwind::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }
            Stmt::Break(_) => Err(Unwind::Break),
            Stmt::Function(decl) => {
                let name = decl.name.as_ref().expect("declared functions are named");
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                self.environment.define(name.lexeme.clone(), Value::Function(Rc::new(function)));
                Ok(())
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                Err(Unwind::Return(value))
            }
            Stmt::Class { name, methods } => {
                self.environment.declare(name.lexeme.clone());

                let mut method_map = HashMap::new();
                for method in methods {
                    let method_name = method.name.as_ref().expect("methods are named").lexeme.clone();
                    let is_initializer = method_name == "init";
                    let function = LoxFunction::new(Rc::clone(method), Rc::clone(&self.environment), is_initializer);
                    method_map.insert(method_name, Rc::new(function));
                }

                let class = Rc::new(LoxClass::new(name.lexeme.clone(), method_map));
                self.environment.define(name.lexeme.clone(), Value::Class(class));
                Ok(())
            }
        }
    }

    /// Executes `stmts` in `env`, restoring the previous environment on
    /// every exit path, error included (spec §8 invariant: block exit
    /// environment equals block entry environment).
    pub fn execute_block(&mut self, stmts: &[Stmt], env: Rc<Environment>) -> EvalResult<()> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = (|| {
            for stmt in stmts {
                self.execute(stmt)?;
            }
            Ok(())
        })();
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr) -> EvalResult<Value> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(match lit {
                LiteralValue::Nil => Value::Nil,
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::String(s) => Value::string(s.clone()),
            }),
            ExprKind::Grouping(inner) => self.evaluate(inner),
            ExprKind::Unary { op, right } => {
                let right = self.evaluate(right)?;
                match op.kind {
                    TokenKind::Minus => Ok(Value::Number(-self.as_number(op, &right)?)),
                    TokenKind::Bang => Ok(Value::Bool(!right.is_truthy())),
                    _ => unreachable!("lexer/parser only produce unary ! and -"),
                }
            }
            ExprKind::Binary { left, op, right } => self.evaluate_binary(left, op, right),
            ExprKind::Logical { left, op, right } => {
                let left_val = self.evaluate(left)?;
                match op.kind {
                    TokenKind::Or => {
                        if left_val.is_truthy() {
                            Ok(left_val)
                        } else {
                            self.evaluate(right)
                        }
                    }
                    TokenKind::And => {
                        if !left_val.is_truthy() {
                            Ok(left_val)
                        } else {
                            self.evaluate(right)
                        }
                    }
                    _ => unreachable!("lexer/parser only produce logical and/or"),
                }
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(cond)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            ExprKind::Variable(name) => Ok(self.lookup_variable(name, expr.id)?),
            ExprKind::Assign { name, value } => {
                let value = self.evaluate(value)?;
                match self.locals.get(&expr.id) {
                    Some(&distance) => self.environment.assign_at(distance, name, value.clone())?,
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            ExprKind::Call { callee, paren, args } => self.evaluate_call(callee, paren, args),
            ExprKind::Get { object, name } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),
                    _ => Err(RuntimeError::new(name, "Only instances have properties.").into()),
                }
            }
            ExprKind::Set { object, name, value } => {
                let object = self.evaluate(object)?;
                match object {
                    Value::Instance(instance) => {
                        let value = self.evaluate(value)?;
                        instance.borrow_mut().set(name, value.clone());
                        Ok(value)
                    }
                    _ => Err(RuntimeError::new(name, "Only instances have fields.").into()),
                }
            }
            ExprKind::This(keyword) => Ok(self.lookup_variable(keyword, expr.id)?),
            ExprKind::Lambda(decl) => {
                let function = LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                Ok(Value::Function(Rc::new(function)))
            }
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, op: &Token, right: &Expr) -> EvalResult<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        match op.kind {
            TokenKind::Minus => Ok(Value::Number(self.as_number(op, &left)? - self.as_number(op, &right)?)),
            TokenKind::Slash => Ok(Value::Number(self.as_number(op, &left)? / self.as_number(op, &right)?)),
            TokenKind::Star => Ok(Value::Number(self.as_number(op, &left)? * self.as_number(op, &right)?)),
            TokenKind::Percent => Ok(Value::Number(self.as_number(op, &left)? % self.as_number(op, &right)?)),
            TokenKind::Plus => self.add(op, left, right),
            TokenKind::Greater => Ok(Value::Bool(self.as_number(op, &left)? > self.as_number(op, &right)?)),
            TokenKind::GreaterEqual => Ok(Value::Bool(self.as_number(op, &left)? >= self.as_number(op, &right)?)),
            TokenKind::Less => Ok(Value::Bool(self.as_number(op, &left)? < self.as_number(op, &right)?)),
            TokenKind::LessEqual => Ok(Value::Bool(self.as_number(op, &left)? <= self.as_number(op, &right)?)),
            TokenKind::BangEqual => Ok(Value::Bool(!left.lox_eq(&right))),
            TokenKind::EqualEqual => Ok(Value::Bool(left.lox_eq(&right))),
            _ => unreachable!("lexer/parser only produce binary operators handled above"),
        }
    }

    /// `+` concatenates two strings and adds two numbers; this crate also
    /// permits string+number coercion, stringifying the non-string operand
    /// (documented variant, spec §4.4 — see DESIGN.md for the grounding).
    fn add(&self, op: &Token, left: Value, right: Value) -> EvalResult<Value> {
        match (&left, &right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(_), Value::String(_)) => Ok(Value::string(format!("{left}{right}"))),
            (Value::String(_), Value::Number(_)) | (Value::Number(_), Value::String(_)) => {
                Ok(Value::string(format!("{left}{right}")))
            }
            _ => Err(RuntimeError::new(op, "Operands must be two numbers or two strings.").into()),
        }
    }

    fn as_number(&self, op: &Token, value: &Value) -> Result<f64, RuntimeError> {
        match value {
            Value::Number(n) => Ok(*n),
            _ => Err(RuntimeError::type_error(op, "a number")),
        }
    }

    fn lookup_variable(&self, name: &Token, id: NodeId) -> Result<Value, RuntimeError> {
        match self.locals.get(&id) {
            Some(&distance) => self.environment.get_at(distance, name),
            None => self.globals.get(name),
        }
    }

    fn evaluate_call(&mut self, callee: &Expr, paren: &Token, args: &[Expr]) -> EvalResult<Value> {
        let callee_val = self.evaluate(callee)?;
        let mut arg_vals = Vec::with_capacity(args.len());
        for arg in args {
            arg_vals.push(self.evaluate(arg)?);
        }

        match callee_val {
            Value::Function(f) => {
                self.check_arity(paren, f.arity(), arg_vals.len())?;
                f.call(self, &arg_vals)
            }
            Value::Native(f) => {
                self.check_arity(paren, f.arity, arg_vals.len())?;
                f.call(&arg_vals)
            }
            Value::Class(class) => {
                self.check_arity(paren, class.arity(), arg_vals.len())?;
                LoxClass::instantiate(&class, self, &arg_vals)
            }
            _ => Err(RuntimeError::new(paren, "Can only call functions and classes.").into()),
        }
    }

    fn check_arity(&self, paren: &Token, expected: usize, got: usize) -> Result<(), RuntimeError> {
        if expected != got {
            Err(RuntimeError::new(paren, format!("Expected {expected} arguments but got {got}.")))
        } else {
            Ok(())
        }
    }

    fn write_out(&mut self, text: &str) {
        (self.print_sink)(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use std::cell::RefCell as StdRefCell;

    fn run(source: &str) -> (String, Option<RuntimeError>) {
        let tokens = Lexer::new(source).scan_tokens(|_| {});
        let (stmts, parse_errors) = Parser::new(tokens).parse();
        assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");
        let (locals, resolve_errors) = Resolver::new().resolve(&stmts);
        assert!(resolve_errors.is_empty(), "unexpected resolve errors: {resolve_errors:?}");

        let output = Rc::new(StdRefCell::new(String::new()));
        let sink_output = Rc::clone(&output);
        let mut interpreter = Interpreter::new(Box::new(move |text: &str| sink_output.borrow_mut().push_str(text)));
        interpreter.extend_locals(locals);
        let err = interpreter.interpret(&stmts).err();
        let collected = output.borrow().clone();
        (collected, err)
    }

    #[test]
    fn closures_share_captured_state() {
        let (out, err) = run(
            "fun make(){var i=0; fun inc(){i=i+1; return i;} return inc;} \
             var c=make(); print c(); print c(); print c();",
        );
        assert!(err.is_none());
        assert_eq!(out, "1\n2\n3\n");
    }

    #[test]
    fn fibonacci_recursion() {
        let (out, err) = run("fun fib(n){if(n<2) return n; return fib(n-1)+fib(n-2);} print fib(10);");
        assert!(err.is_none());
        assert_eq!(out, "55\n");
    }

    #[test]
    fn for_loop_desugars_and_break_exits_loop() {
        let (out, err) = run("for(var i=0;i<5;i=i+1){ if(i==3) break; print i;}");
        assert!(err.is_none());
        assert_eq!(out, "0\n1\n2\n");
    }

    #[test]
    fn class_init_and_method() {
        let (out, err) = run("class P{init(x,y){this.x=x;this.y=y;} sum(){return this.x+this.y;}} var p=P(3,4); print p.sum();");
        assert!(err.is_none());
        assert_eq!(out, "7\n");
    }

    #[test]
    fn short_circuit_or_skips_rhs_side_effect() {
        let (out, err) = run("var x=0; fun bump(){x=x+1; return true;} print (true or bump()); print x;");
        assert!(err.is_none());
        assert_eq!(out, "true\n0\n");
    }

    #[test]
    fn uninitialized_variable_is_a_runtime_error() {
        let (_, err) = run("var a; print a;");
        assert!(err.is_some());
    }

    #[test]
    fn string_plus_number_coercion() {
        let (out, err) = run(r#"print "n=" + 3;"#);
        assert!(err.is_none());
        assert_eq!(out, "n=3\n");
    }

    #[test]
    fn division_by_zero_is_not_an_error() {
        let (out, err) = run("print 1 / 0;");
        assert!(err.is_none());
        assert_eq!(out, "inf\n");
    }

    #[test]
    fn calling_wrong_arity_is_a_runtime_error() {
        let (_, err) = run("fun f(a, b) { return a + b; } f(1);");
        assert!(err.is_some());
    }

    #[test]
    fn instance_identity_is_shared_by_reference() {
        let (out, err) = run(
            "class Box{} var a = Box(); var b = a; a.value = 1; b.value = 2; print a.value;",
        );
        assert!(err.is_none());
        assert_eq!(out, "2\n");
    }
}
