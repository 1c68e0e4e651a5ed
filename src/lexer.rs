// ABOUTME: Scans source text into a flat token stream

use crate::error::LexError;
use crate::token::{keyword_kind, Literal, Token, TokenKind};

/// Scans a whole source string into tokens in one pass. Lexical errors are
/// reported through a callback and do not stop the scan (spec §4.1
/// "Error recovery": one bad character shouldn't hide the next ten).
pub struct Lexer<'a> {
    source: &'a [u8],
    start: usize,
    current: usize,
    line: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Lexer {
            source: source.as_bytes(),
            start: 0,
            current: 0,
            line: 1,
            tokens: Vec::new(),
        }
    }

    pub fn scan_tokens(mut self, mut on_error: impl FnMut(LexError)) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token(&mut on_error);
        }
        self.tokens.push(Token::eof(self.line));
        self.tokens
    }

    fn scan_token(&mut self, on_error: &mut impl FnMut(LexError)) {
        let c = self.advance();
        match c {
            b'(' => self.add(TokenKind::LeftParen),
            b')' => self.add(TokenKind::RightParen),
            b'{' => self.add(TokenKind::LeftBrace),
            b'}' => self.add(TokenKind::RightBrace),
            b',' => self.add(TokenKind::Comma),
            b'.' => self.add(TokenKind::Dot),
            b'-' => self.add(TokenKind::Minus),
            b'+' => self.add(TokenKind::Plus),
            b';' => self.add(TokenKind::Semicolon),
            b'*' => self.add(TokenKind::Star),
            b'%' => self.add(TokenKind::Percent),
            b'?' => self.add(TokenKind::Question),
            b':' => self.add(TokenKind::Colon),
            b'!' => {
                let kind = if self.matches(b'=') { TokenKind::BangEqual } else { TokenKind::Bang };
                self.add(kind);
            }
            b'=' => {
                let kind = if self.matches(b'=') { TokenKind::EqualEqual } else { TokenKind::Equal };
                self.add(kind);
            }
            b'<' => {
                let kind = if self.matches(b'=') { TokenKind::LessEqual } else { TokenKind::Less };
                self.add(kind);
            }
            b'>' => {
                let kind = if self.matches(b'=') { TokenKind::GreaterEqual } else { TokenKind::Greater };
                self.add(kind);
            }
            b'/' => {
                if self.matches(b'/') {
                    while self.peek() != b'\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else if self.matches(b'*') {
                    self.block_comment(on_error);
                } else {
                    self.add(TokenKind::Slash);
                }
            }
            b' ' | b'\r' | b'\t' => {}
            b'\n' => self.line += 1,
            b'"' => self.string(on_error),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == b'_' => self.identifier(),
            _ => on_error(LexError {
                message: format!("Unexpected character '{}'.", c as char),
                line: self.line,
            }),
        }
    }

    /// Block comments nest: `/* /* */ */` is one comment, not two (spec
    /// §4.1, grounded in the original scanner's depth-counted variant).
    fn block_comment(&mut self, on_error: &mut impl FnMut(LexError)) {
        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                on_error(LexError {
                    message: "Unterminated block comment.".to_string(),
                    line: self.line,
                });
                return;
            }
            if self.peek() == b'/' && self.peek_next() == b'*' {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.peek() == b'*' && self.peek_next() == b'/' {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                if self.peek() == b'\n' {
                    self.line += 1;
                }
                self.advance();
            }
        }
    }

    fn string(&mut self, on_error: &mut impl FnMut(LexError)) {
        while self.peek() != b'"' && !self.is_at_end() {
            if self.peek() == b'\n' {
                self.line += 1;
            }
            self.advance();
        }
        if self.is_at_end() {
            on_error(LexError {
                message: "Unterminated string.".to_string(),
                line: self.line,
            });
            return;
        }
        self.advance(); // closing quote
        let value = std::str::from_utf8(&self.source[self.start + 1..self.current - 1])
            .expect("source is valid utf8")
            .to_string();
        self.add_literal(TokenKind::String, Some(Literal::String(value)));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text = std::str::from_utf8(&self.source[self.start..self.current]).expect("ascii digits");
        let value: f64 = text.parse().expect("lexer only admits well-formed numeric text");
        self.add_literal(TokenKind::Number, Some(Literal::Number(value)));
    }

    fn identifier(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == b'_' {
            self.advance();
        }
        let text = std::str::from_utf8(&self.source[self.start..self.current]).expect("ascii identifier");
        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        self.add(kind);
    }

    fn add(&mut self, kind: TokenKind) {
        self.add_literal(kind, None);
    }

    fn add_literal(&mut self, kind: TokenKind, literal: Option<Literal>) {
        let lexeme = std::str::from_utf8(&self.source[self.start..self.current])
            .expect("source is valid utf8")
            .to_string();
        self.tokens.push(Token::new(kind, lexeme, literal, self.line));
    }

    fn advance(&mut self) -> u8 {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }

    fn peek(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source[self.current]
        }
    }

    fn peek_next(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            0
        } else {
            self.source[self.current + 1]
        }
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> Vec<Token> {
        let mut errors = Vec::new();
        let tokens = Lexer::new(source).scan_tokens(|e| errors.push(e));
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens
    }

    #[test]
    fn punctuators_and_operators() {
        let tokens = scan("(){}==!=<=>=");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LeftParen,
                TokenKind::RightParen,
                TokenKind::LeftBrace,
                TokenKind::RightBrace,
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_comment_consumes_to_newline() {
        let tokens = scan("1 // two\n2");
        assert_eq!(tokens.len(), 3); // 1, 2, eof
    }

    #[test]
    fn nested_block_comments() {
        let tokens = scan("/* outer /* inner */ still-comment */ 1");
        assert_eq!(tokens.len(), 2); // 1, eof
    }

    #[test]
    fn string_tracks_embedded_newlines() {
        let tokens = scan("\"a\nb\" 1");
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(tokens[1].line, 2);
    }

    #[test]
    fn unterminated_string_reports_error() {
        let mut errors = Vec::new();
        Lexer::new("\"abc").scan_tokens(|e| errors.push(e));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn keywords_vs_identifiers() {
        let tokens = scan("var x = nil while");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Var,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::Nil,
                TokenKind::While,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unexpected_character_reports_but_continues() {
        let mut errors = Vec::new();
        let tokens = Lexer::new("1 @ 2").scan_tokens(|e| errors.push(e));
        assert_eq!(errors.len(), 1);
        assert_eq!(tokens.len(), 3); // 1, 2, eof
    }
}
