// ABOUTME: rustyline Helper that keeps the REPL prompt open across unbalanced braces

use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::Helper;

/// Unlike the teacher's `LispHelper` (syntax-color highlighting over
/// s-expressions), this language's REPL only needs multi-line input: a line
/// ending mid-block shouldn't submit yet.
#[derive(Default)]
pub struct LoxHelper;

impl Helper for LoxHelper {}

impl Completer for LoxHelper {
    type Candidate = String;
}

impl Hinter for LoxHelper {
    type Hint = String;
}

impl Highlighter for LoxHelper {}

impl Validator for LoxHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        if brace_depth(ctx.input()) > 0 {
            Ok(ValidationResult::Incomplete)
        } else {
            Ok(ValidationResult::Valid(None))
        }
    }
}

/// Counts `{`/`}` outside of strings and comments well enough to decide
/// whether a REPL line should keep accepting input. Not a full lexer pass -
/// just enough to not cut off a block definition mid-line.
fn brace_depth(input: &str) -> i32 {
    let mut depth = 0;
    let mut chars = input.chars().peekable();
    let mut in_string = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => depth -= 1,
            '/' if !in_string && chars.peek() == Some(&'/') => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            _ => {}
        }
    }
    depth.max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_braces_are_zero_depth() {
        assert_eq!(brace_depth("fun f() { print 1; }"), 0);
    }

    #[test]
    fn unbalanced_open_brace_is_positive_depth() {
        assert_eq!(brace_depth("fun f() {"), 1);
    }

    #[test]
    fn brace_inside_string_is_ignored() {
        assert_eq!(brace_depth(r#"print "{";"#), 0);
    }
}
