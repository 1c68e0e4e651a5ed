// ABOUTME: Library entry point wiring the lexer, parser, resolver, and interpreter

pub mod ast;
pub mod builtins;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod value;

use crate::error::{LexError, ParseError, ResolveError, RuntimeError};
use crate::interpreter::Interpreter;
use crate::lexer::Lexer;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::value::Value;

/// The outcome of one `Lox::run` call (spec §6 core entry point). The host
/// maps this to a process exit code; the core has no opinion about exit
/// codes itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunResult {
    pub had_error: bool,
    pub had_runtime_error: bool,
}

/// The host-injected diagnostic sinks (spec §6: "Sinks (callbacks) injected
/// by the host"). `print_sink` lives on the `Interpreter` itself since it is
/// invoked mid-evaluation; these four are invoked by `Lox::run` after each
/// pipeline stage.
pub struct DiagnosticSinks {
    pub lexical_error: Box<dyn FnMut(&LexError)>,
    pub parse_error: Box<dyn FnMut(&ParseError)>,
    pub resolver_error: Box<dyn FnMut(&ResolveError)>,
    pub runtime_error: Box<dyn FnMut(&RuntimeError)>,
}

impl Default for DiagnosticSinks {
    fn default() -> Self {
        DiagnosticSinks {
            lexical_error: Box::new(|e| eprintln!("{e}")),
            parse_error: Box::new(|e| eprintln!("{e}")),
            resolver_error: Box::new(|e| eprintln!("{e}")),
            runtime_error: Box::new(|e| eprintln!("{e}")),
        }
    }
}

/// The engine: lexer -> parser -> resolver -> interpreter, with no I/O
/// opinions of its own (spec §1: "it does not own I/O"). A REPL drives one
/// `Lox` across many `run` calls; a one-shot script drives it across one.
pub struct Lox {
    sinks: DiagnosticSinks,
    interpreter: Interpreter,
}

impl Lox {
    pub fn new(print_sink: Box<dyn FnMut(&str)>) -> Self {
        Lox {
            sinks: DiagnosticSinks::default(),
            interpreter: Interpreter::new(print_sink),
        }
    }

    pub fn with_sinks(print_sink: Box<dyn FnMut(&str)>, sinks: DiagnosticSinks) -> Self {
        Lox {
            sinks,
            interpreter: Interpreter::new(print_sink),
        }
    }

    /// Registers a host-provided native function in the global scope;
    /// intended to be called before the first `run` (spec §6
    /// `register_native`), though nothing prevents calling it later.
    pub fn register_native(
        &mut self,
        name: impl AsRef<str>,
        arity: usize,
        func: impl Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    ) {
        self.interpreter.register_native(name.as_ref(), arity, func);
    }

    /// Runs one unit of source (a whole file, or one REPL line). Lexical,
    /// parse, and resolver errors are accumulated and reported without
    /// running the interpreter at all; a runtime error aborts this call but
    /// leaves the engine (globals, REPL bindings) intact for the next one
    /// (spec §7 "Propagation").
    pub fn run(&mut self, source: &str, is_repl: bool) -> RunResult {
        let mut result = RunResult::default();
        self.interpreter.set_repl_mode(is_repl);

        let mut lex_errors = Vec::new();
        let tokens = Lexer::new(source).scan_tokens(|err| lex_errors.push(err));
        for err in &lex_errors {
            (self.sinks.lexical_error)(err);
        }
        result.had_error |= !lex_errors.is_empty();

        let (stmts, parse_errors) = Parser::new(tokens).parse();
        for err in &parse_errors {
            (self.sinks.parse_error)(err);
        }
        result.had_error |= !parse_errors.is_empty();

        let (locals, resolve_errors) = Resolver::new().resolve(&stmts);
        for err in &resolve_errors {
            (self.sinks.resolver_error)(err);
        }
        result.had_error |= !resolve_errors.is_empty();

        if result.had_error {
            return result;
        }

        self.interpreter.extend_locals(locals);
        if let Err(err) = self.interpreter.interpret(&stmts) {
            (self.sinks.runtime_error)(&err);
            result.had_runtime_error = true;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn new_lox() -> (Lox, Rc<RefCell<String>>) {
        let output = Rc::new(RefCell::new(String::new()));
        let sink_output = Rc::clone(&output);
        let lox = Lox::new(Box::new(move |text: &str| sink_output.borrow_mut().push_str(text)));
        (lox, output)
    }

    #[test]
    fn empty_program_has_no_output_and_no_error() {
        let (mut lox, output) = new_lox();
        let result = lox.run("", false);
        assert_eq!(result, RunResult::default());
        assert_eq!(output.borrow().as_str(), "");
    }

    #[test]
    fn lexical_error_skips_interpretation() {
        let (mut lox, output) = new_lox();
        let result = lox.run("print 1 @ 2;", false);
        assert!(result.had_error);
        assert!(!result.had_runtime_error);
        assert_eq!(output.borrow().as_str(), "");
    }

    #[test]
    fn runtime_error_leaves_engine_usable_for_next_call() {
        let (mut lox, output) = new_lox();
        let first = lox.run("var a; print a;", true);
        assert!(first.had_runtime_error);
        let second = lox.run("print 1 + 1;", true);
        assert!(!second.had_runtime_error);
        assert!(output.borrow().contains("2"));
    }

    #[test]
    fn repl_bindings_persist_across_run_calls() {
        let (mut lox, output) = new_lox();
        assert!(!lox.run("var x = 1;", true).had_error);
        assert!(!lox.run("x = x + 41;", true).had_error);
        assert!(!lox.run("print x;", true).had_error);
        assert_eq!(output.borrow().as_str(), "42\n");
    }

    #[test]
    fn deeply_nested_blocks_do_not_blow_the_stack() {
        let mut source = String::new();
        for _ in 0..200 {
            source.push_str("{ ");
        }
        source.push_str("var a = 1; print a;");
        for _ in 0..200 {
            source.push_str(" }");
        }
        let (mut lox, _) = new_lox();
        let result = lox.run(&source, false);
        assert!(!result.had_error);
        assert!(!result.had_runtime_error);
    }
}
