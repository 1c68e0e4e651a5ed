// ABOUTME: black-box integration tests driving the public Lox::run API end to end

use lox_sandbox::Lox;
use std::cell::RefCell;
use std::rc::Rc;

fn captured() -> (Lox, Rc<RefCell<String>>) {
    let output = Rc::new(RefCell::new(String::new()));
    let sink_output = Rc::clone(&output);
    let lox = Lox::new(Box::new(move |text: &str| sink_output.borrow_mut().push_str(text)));
    (lox, output)
}

#[test]
fn hello_world() {
    let (mut lox, output) = captured();
    let result = lox.run(r#"print "hello, world";"#, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "hello, world\n");
}

#[test]
fn arithmetic_and_precedence() {
    let (mut lox, output) = captured();
    let result = lox.run("print 2 + 3 * 4 - (1 + 1);", false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "12\n");
}

#[test]
fn closures_capture_their_defining_environment() {
    let (mut lox, output) = captured();
    let source = r#"
        fun make_counter() {
            var count = 0;
            fun counter() {
                count = count + 1;
                return count;
            }
            return counter;
        }
        var c1 = make_counter();
        var c2 = make_counter();
        print c1();
        print c1();
        print c2();
    "#;
    let result = lox.run(source, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "1\n2\n1\n");
}

#[test]
fn classes_fields_methods_and_this() {
    let (mut lox, output) = captured();
    let source = r#"
        class Counter {
            init(start) {
                this.value = start;
            }
            bump() {
                this.value = this.value + 1;
                return this.value;
            }
        }
        var c = Counter(10);
        print c.bump();
        print c.bump();
        print c.value;
    "#;
    let result = lox.run(source, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "11\n12\n12\n");
}

#[test]
fn inherited_state_is_shared_by_reference_not_value() {
    let (mut lox, output) = captured();
    let source = r#"
        class Box {
            init(v) { this.v = v; }
        }
        fun mutate(b) { b.v = b.v + 1; }
        var b = Box(1);
        mutate(b);
        mutate(b);
        print b.v;
    "#;
    let result = lox.run(source, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "3\n");
}

#[test]
fn ternary_and_lambda_expressions() {
    let (mut lox, output) = captured();
    let source = r#"
        var abs = fun(n) { return n < 0 ? -n : n; };
        print abs(-5);
        print abs(5);
    "#;
    let result = lox.run(source, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "5\n5\n");
}

#[test]
fn for_loop_desugars_and_break_exits_it() {
    let (mut lox, output) = captured();
    let source = r#"
        var total = 0;
        for (var i = 0; i < 10; i = i + 1) {
            if (i == 5) break;
            total = total + i;
        }
        print total;
    "#;
    let result = lox.run(source, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "10\n");
}

#[test]
fn dangling_else_binds_to_nearest_if() {
    let (mut lox, output) = captured();
    let source = r#"
        if (true) if (false) print "inner"; else print "else";
    "#;
    let result = lox.run(source, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "else\n");
}

#[test]
fn lexical_errors_are_reported_and_interpretation_is_skipped() {
    let (mut lox, output) = captured();
    let result = lox.run("print 1 @ 2;", false);
    assert!(result.had_error);
    assert!(!result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "");
}

#[test]
fn parse_errors_are_reported_without_interpreting() {
    let (mut lox, output) = captured();
    let result = lox.run("print;", false);
    assert!(result.had_error);
    assert!(!result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "");
}

#[test]
fn resolver_catches_self_referential_initializer() {
    let (mut lox, _) = captured();
    let result = lox.run("{ var a = a; }", false);
    assert!(result.had_error);
    assert!(!result.had_runtime_error);
}

#[test]
fn runtime_error_on_undefined_variable_does_not_crash_the_process() {
    let (mut lox, _) = captured();
    let result = lox.run("print undefined_name;", false);
    assert!(result.had_runtime_error);
    assert!(!result.had_error);
}

#[test]
fn division_by_zero_yields_infinity_not_a_crash() {
    let (mut lox, output) = captured();
    let result = lox.run("print 1 / 0;", false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "inf\n");
}

#[test]
fn clock_is_callable_and_returns_a_number() {
    let (mut lox, output) = captured();
    let result = lox.run("print clock() > 0;", false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "true\n");
}

#[test]
fn host_can_register_additional_native_functions() {
    use lox_sandbox::error::RuntimeError;
    use lox_sandbox::token::{Token, TokenKind};
    use lox_sandbox::value::Value;

    let (mut lox, output) = captured();
    lox.register_native("double", 1, |args| match &args[0] {
        Value::Number(n) => Ok(Value::Number(n * 2.0)),
        other => {
            let token = Token::new(TokenKind::Identifier, "double", None, 0);
            Err(RuntimeError::new(
                &token,
                format!("double expects a number, got {}", other.type_name()),
            ))
        }
    });
    let result = lox.run("print double(21);", false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "42\n");
}

#[test]
fn repl_lines_share_state_across_calls() {
    let (mut lox, output) = captured();
    assert!(!lox.run("var total = 0;", true).had_error);
    assert!(!lox.run("total = total + 10;", true).had_error);
    assert!(!lox.run("total = total + 32;", true).had_error);
    assert!(!lox.run("print total;", true).had_error);
    assert_eq!(output.borrow().as_str(), "42\n");
}

#[test]
fn a_runtime_error_mid_repl_session_does_not_poison_later_lines() {
    let (mut lox, output) = captured();
    assert!(!lox.run("var x = 10;", true).had_error);
    let bad = lox.run("print x / nil;", true);
    assert!(bad.had_runtime_error);
    let after = lox.run("print x;", true);
    assert!(!after.had_error && !after.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "10\n");
}

#[test]
fn nested_classes_and_multiple_instances_do_not_share_fields() {
    let (mut lox, output) = captured();
    let source = r#"
        class Account {
            init(balance) { this.balance = balance; }
            deposit(amount) { this.balance = this.balance + amount; }
        }
        var a = Account(100);
        var b = Account(0);
        a.deposit(50);
        print a.balance;
        print b.balance;
    "#;
    let result = lox.run(source, false);
    assert!(!result.had_error && !result.had_runtime_error);
    assert_eq!(output.borrow().as_str(), "150\n0\n");
}
