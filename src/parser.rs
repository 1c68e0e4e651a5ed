// ABOUTME: Recursive-descent parser turning a token stream into a statement list

use crate::ast::{Expr, ExprKind, FunctionDecl, LiteralValue, Stmt};
use crate::error::ParseError;
use crate::token::{Literal, Token, TokenKind};
use std::rc::Rc;

type PResult<T> = Result<T, ParseError>;

const MAX_ARGS: usize = 255;

/// Parses the whole token stream, collecting (not throwing) parse errors and
/// synchronizing after each one so a single pass can surface several (spec
/// §4.2 "Error handling").
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    loop_depth: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            current: 0,
            loop_depth: 0,
            errors: Vec::new(),
        }
    }

    pub fn parse(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut stmts = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(_) => self.synchronize(),
            }
        }
        (stmts, self.errors)
    }

    // ---- declarations ----

    fn declaration(&mut self) -> PResult<Stmt> {
        if self.check(TokenKind::Class) {
            self.advance();
            return self.class_decl();
        }
        if self.check(TokenKind::Fun) && self.check_next(TokenKind::Identifier) {
            self.advance();
            return self.function("function").map(|decl| Stmt::Function(Rc::new(decl)));
        }
        self.statement()
    }

    fn class_decl(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect class name.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before class body.")?;
        let mut methods = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            methods.push(Rc::new(self.function("method")?));
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after class body.")?;
        Ok(Stmt::Class { name, methods })
    }

    /// Parses `IDENT "(" params? ")" block`, shared by named function
    /// declarations and class methods (spec §4.2 `function`).
    fn function(&mut self, kind: &str) -> PResult<FunctionDecl> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {kind} name."))?;
        self.consume(TokenKind::LeftParen, &format!("Expect '(' after {kind} name."))?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, &format!("Expect '{{' before {kind} body."))?;
        let body = self.block()?;
        Ok(FunctionDecl {
            name: Some(name),
            params,
            body,
        })
    }

    fn parse_params(&mut self) -> PResult<Vec<Token>> {
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    self.report(self.peek().clone(), "Can't have more than 255 parameters.");
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);
                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        Ok(params)
    }

    fn var_decl(&mut self) -> PResult<Stmt> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;
        let initializer = if self.match_token(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    // ---- statements ----

    fn statement(&mut self) -> PResult<Stmt> {
        if self.match_token(&[TokenKind::For]) {
            return self.for_stmt();
        }
        if self.match_token(&[TokenKind::If]) {
            return self.if_stmt();
        }
        if self.match_token(&[TokenKind::Print]) {
            return self.print_stmt();
        }
        if self.match_token(&[TokenKind::Return]) {
            return self.return_stmt();
        }
        if self.match_token(&[TokenKind::While]) {
            return self.while_stmt();
        }
        if self.match_token(&[TokenKind::Break]) {
            return self.break_stmt();
        }
        if self.match_token(&[TokenKind::Var]) {
            return self.var_decl();
        }
        if self.match_token(&[TokenKind::LeftBrace]) {
            return Ok(Stmt::Block(self.block()?));
        }
        self.expr_stmt()
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => stmts.push(stmt),
                Err(_) => self.synchronize(),
            }
        }
        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(stmts)
    }

    fn for_stmt(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(&[TokenKind::Semicolon]) {
            None
        } else if self.match_token(&[TokenKind::Var]) {
            Some(self.var_decl()?)
        } else {
            Some(self.expr_stmt()?)
        };

        let condition = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if !self.check(TokenKind::RightParen) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        let mut body = body?;

        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }

        let condition = condition.unwrap_or_else(|| Expr::new(ExprKind::Literal(LiteralValue::Bool(true))));
        body = Stmt::While {
            cond: condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Stmt::Block(vec![initializer, body]);
        }

        Ok(body)
    }

    fn if_stmt(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then_branch,
            else_branch,
        })
    }

    fn print_stmt(&mut self) -> PResult<Stmt> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print(value))
    }

    fn return_stmt(&mut self) -> PResult<Stmt> {
        let keyword = self.previous().clone();
        let value = if !self.check(TokenKind::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Stmt::Return { keyword, value })
    }

    fn while_stmt(&mut self) -> PResult<Stmt> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let cond = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        Ok(Stmt::While {
            cond,
            body: Box::new(body?),
        })
    }

    fn break_stmt(&mut self) -> PResult<Stmt> {
        let keyword = self.previous().clone();
        if self.loop_depth == 0 {
            self.report(keyword.clone(), "Can't use 'break' outside of a loop.");
        }
        self.consume(TokenKind::Semicolon, "Expect ';' after 'break'.")?;
        Ok(Stmt::Break(keyword))
    }

    fn expr_stmt(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Stmt::Expression(expr))
    }

    // ---- expressions ----

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        let expr = self.logic_or()?;

        if self.match_token(&[TokenKind::Equal]) {
            let equals = self.previous().clone();
            let value = self.assignment()?;
            return match expr.kind {
                ExprKind::Variable(name) => Ok(Expr::new(ExprKind::Assign {
                    name,
                    value: Box::new(value),
                })),
                ExprKind::Get { object, name } => Ok(Expr::new(ExprKind::Set {
                    object,
                    name,
                    value: Box::new(value),
                })),
                _ => {
                    self.report(equals, "Invalid assignment target.");
                    Ok(expr)
                }
            };
        }
        Ok(expr)
    }

    fn logic_or(&mut self) -> PResult<Expr> {
        let mut expr = self.logic_and()?;
        while self.match_token(&[TokenKind::Or]) {
            let op = self.previous().clone();
            let right = self.logic_and()?;
            expr = Expr::new(ExprKind::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn logic_and(&mut self) -> PResult<Expr> {
        let mut expr = self.ternary()?;
        while self.match_token(&[TokenKind::And]) {
            let op = self.previous().clone();
            let right = self.ternary()?;
            expr = Expr::new(ExprKind::Logical {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn ternary(&mut self) -> PResult<Expr> {
        let cond = self.equality()?;
        if self.match_token(&[TokenKind::Question]) {
            let then_branch = self.equality()?;
            self.consume(TokenKind::Colon, "Expect ':' in ternary expression.")?;
            let else_branch = self.ternary()?;
            return Ok(Expr::new(ExprKind::Ternary {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            }));
        }
        Ok(cond)
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.left_assoc_binary(Self::comparison, &[TokenKind::BangEqual, TokenKind::EqualEqual])
    }

    fn comparison(&mut self) -> PResult<Expr> {
        self.left_assoc_binary(
            Self::term,
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
        )
    }

    fn term(&mut self) -> PResult<Expr> {
        self.left_assoc_binary(Self::factor, &[TokenKind::Minus, TokenKind::Plus])
    }

    fn factor(&mut self) -> PResult<Expr> {
        self.left_assoc_binary(Self::unary, &[TokenKind::Slash, TokenKind::Star, TokenKind::Percent])
    }

    /// Shared left-associative binary-operator loop (spec §4.2 "Precedence
    /// and associativity": "a shared helper that folds a loop of `op
    /// operand` repetitions into a left-leaning tree").
    fn left_assoc_binary(
        &mut self,
        mut operand: impl FnMut(&mut Self) -> PResult<Expr>,
        kinds: &[TokenKind],
    ) -> PResult<Expr> {
        let mut expr = operand(self)?;
        while self.match_token(kinds) {
            let op = self.previous().clone();
            let right = operand(self)?;
            expr = Expr::new(ExprKind::Binary {
                left: Box::new(expr),
                op,
                right: Box::new(right),
            });
        }
        Ok(expr)
    }

    fn unary(&mut self) -> PResult<Expr> {
        if self.match_token(&[TokenKind::Bang, TokenKind::Minus]) {
            let op = self.previous().clone();
            let right = self.unary()?;
            return Ok(Expr::new(ExprKind::Unary {
                op,
                right: Box::new(right),
            }));
        }
        self.call()
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.match_token(&[TokenKind::LeftParen]) {
                expr = self.finish_call(expr)?;
            } else if self.match_token(&[TokenKind::Dot]) {
                let name = self.consume(TokenKind::Identifier, "Expect property name after '.'.")?;
                expr = Expr::new(ExprKind::Get {
                    object: Box::new(expr),
                    name,
                });
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> PResult<Expr> {
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if args.len() >= MAX_ARGS {
                    self.report(self.peek().clone(), "Can't have more than 255 arguments.");
                }
                args.push(self.expression()?);
                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;
        Ok(Expr::new(ExprKind::Call {
            callee: Box::new(callee),
            paren,
            args,
        }))
    }

    fn primary(&mut self) -> PResult<Expr> {
        if self.match_token(&[TokenKind::False]) {
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::Bool(false))));
        }
        if self.match_token(&[TokenKind::True]) {
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::Bool(true))));
        }
        if self.match_token(&[TokenKind::Nil]) {
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::Nil)));
        }
        if self.match_token(&[TokenKind::Number]) {
            let value = match self.previous().literal {
                Some(Literal::Number(n)) => n,
                _ => unreachable!("NUMBER token always carries a numeric literal"),
            };
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::Number(value))));
        }
        if self.match_token(&[TokenKind::String]) {
            let value = match &self.previous().literal {
                Some(Literal::String(s)) => s.clone(),
                _ => unreachable!("STRING token always carries a string literal"),
            };
            return Ok(Expr::new(ExprKind::Literal(LiteralValue::String(value))));
        }
        if self.match_token(&[TokenKind::This]) {
            return Ok(Expr::new(ExprKind::This(self.previous().clone())));
        }
        if self.match_token(&[TokenKind::Identifier]) {
            return Ok(Expr::new(ExprKind::Variable(self.previous().clone())));
        }
        if self.match_token(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::new(ExprKind::Grouping(Box::new(expr))));
        }
        if self.match_token(&[TokenKind::Fun]) {
            return self.lambda();
        }
        Err(self.error(self.peek().clone(), "Expect expression."))
    }

    fn lambda(&mut self) -> PResult<Expr> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'fun'.")?;
        let params = self.parse_params()?;
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;
        self.consume(TokenKind::LeftBrace, "Expect '{' before lambda body.")?;
        let body = self.block()?;
        Ok(Expr::new(ExprKind::Lambda(Rc::new(FunctionDecl {
            name: None,
            params,
            body,
        }))))
    }

    // ---- token-stream plumbing ----

    fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        if kinds.iter().any(|k| self.check(*k)) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<Token> {
        if self.check(kind) {
            Ok(self.advance().clone())
        } else {
            Err(self.error(self.peek().clone(), message))
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn check_next(&self, kind: TokenKind) -> bool {
        self.tokens
            .get(self.current + 1)
            .map(|t| t.kind == kind)
            .unwrap_or(false)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    /// Records an error and returns a sentinel for `?` to propagate up to
    /// `declaration`, which synchronizes (spec §4.2 "Error handling").
    fn error(&mut self, token: Token, message: impl Into<String>) -> ParseError {
        let err = ParseError::new(message, token);
        self.errors.push(err.clone());
        err
    }

    /// Records a non-fatal error: parsing continues past it (arity caps,
    /// invalid assignment target, break outside a loop).
    fn report(&mut self, token: Token, message: impl Into<String>) {
        self.errors.push(ParseError::new(message, token));
    }

    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if self.previous().kind == TokenKind::Semicolon {
                return;
            }
            if matches!(
                self.peek().kind,
                TokenKind::Class
                    | TokenKind::Fun
                    | TokenKind::Var
                    | TokenKind::For
                    | TokenKind::If
                    | TokenKind::While
                    | TokenKind::Print
                    | TokenKind::Return
            ) {
                return;
            }
            self.advance();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(source: &str) -> (Vec<Stmt>, Vec<ParseError>) {
        let tokens = Lexer::new(source).scan_tokens(|_| {});
        Parser::new(tokens).parse()
    }

    #[test]
    fn var_decl_without_initializer() {
        let (stmts, errors) = parse("var x;");
        assert!(errors.is_empty());
        assert!(matches!(stmts[0], Stmt::Var { initializer: None, .. }));
    }

    #[test]
    fn precedence_nests_as_expected() {
        let (stmts, errors) = parse("1 + 2 * 3;");
        assert!(errors.is_empty());
        match &stmts[0] {
            Stmt::Expression(expr) => match &expr.kind {
                ExprKind::Binary { op, right, .. } => {
                    assert_eq!(op.kind, TokenKind::Plus);
                    assert!(matches!(right.kind, ExprKind::Binary { .. }));
                }
                _ => panic!("expected binary"),
            },
            _ => panic!("expected expression statement"),
        }
    }

    #[test]
    fn for_loop_desugars_to_while_in_block() {
        let (stmts, errors) = parse("for (var i = 0; i < 3; i = i + 1) print i;");
        assert!(errors.is_empty());
        match &stmts[0] {
            Stmt::Block(inner) => {
                assert_eq!(inner.len(), 2);
                assert!(matches!(inner[0], Stmt::Var { .. }));
                assert!(matches!(inner[1], Stmt::While { .. }));
            }
            _ => panic!("expected desugared block"),
        }
    }

    #[test]
    fn break_outside_loop_is_reported() {
        let (_, errors) = parse("break;");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn too_many_params_reported_but_parses() {
        let params: Vec<String> = (0..300).map(|i| format!("p{i}")).collect();
        let source = format!("fun f({}) {{}}", params.join(", "));
        let (stmts, errors) = parse(&source);
        assert_eq!(stmts.len(), 1);
        assert!(!errors.is_empty());
    }

    #[test]
    fn invalid_assignment_target_reported_but_continues() {
        let (stmts, errors) = parse("1 = 2;");
        assert_eq!(stmts.len(), 1);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn dangling_else_binds_to_nearest_if() {
        let (stmts, errors) = parse("if (true) if (false) print 1; else print 2;");
        assert!(errors.is_empty());
        match &stmts[0] {
            Stmt::If { then_branch, .. } => match then_branch.as_ref() {
                Stmt::If { else_branch, .. } => assert!(else_branch.is_some()),
                _ => panic!("expected nested if"),
            },
            _ => panic!("expected if"),
        }
    }
}
