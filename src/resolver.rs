// ABOUTME: Static pass computing lexical scope distances ahead of interpretation

use crate::ast::{Expr, ExprKind, FunctionDecl, NodeId, Stmt};
use crate::error::ResolveError;
use crate::token::Token;
use std::collections::HashMap;

#[derive(Clone, Copy, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
}

/// A local's resolution state within one scope: whether it has been
/// declared, whether its initializer has finished (so later reads are
/// legal), and whether anything has read it.
struct LocalRecord {
    declared: Token,
    defined: bool,
    used: bool,
}

/// Walks the same statement/expression shape as the interpreter but performs
/// no evaluation, producing a `node id -> scope distance` side table (spec
/// §4.3). Mirrors the interpreter's match-based dispatch rather than a
/// visitor interface (spec §9 design notes).
pub struct Resolver {
    scopes: Vec<HashMap<String, LocalRecord>>,
    distances: HashMap<NodeId, usize>,
    current_function: FunctionType,
    current_class: ClassType,
    errors: Vec<ResolveError>,
}

impl Resolver {
    pub fn new() -> Self {
        Resolver {
            scopes: Vec::new(),
            distances: HashMap::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
            errors: Vec::new(),
        }
    }

    pub fn resolve(mut self, stmts: &[Stmt]) -> (HashMap<NodeId, usize>, Vec<ResolveError>) {
        self.resolve_stmts(stmts);
        (self.distances, self.errors)
    }

    fn resolve_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.resolve_stmt(stmt);
        }
    }

    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expression(expr) | Stmt::Print(expr) => self.resolve_expr(expr),
            Stmt::Var { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Stmt::Block(stmts) => {
                self.begin_scope();
                self.resolve_stmts(stmts);
                self.end_block_scope();
            }
            Stmt::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(cond);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { cond, body } => {
                self.resolve_expr(cond);
                self.resolve_stmt(body);
            }
            Stmt::Break(_) => {}
            Stmt::Function(decl) => {
                let name = decl.name.as_ref().expect("declared functions are named");
                self.declare(name);
                self.define(name);
                self.resolve_function(decl, FunctionType::Function);
            }
            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    self.errors.push(ResolveError::new("Can't return from top-level code.", keyword.clone()));
                }
                if let Some(value) = value {
                    if self.current_function == FunctionType::Initializer {
                        self.errors.push(ResolveError::new(
                            "Can't return a value from an initializer.",
                            keyword.clone(),
                        ));
                    }
                    self.resolve_expr(value);
                }
            }
            Stmt::Class { name, methods } => {
                let enclosing_class = self.current_class;
                self.current_class = ClassType::Class;

                self.declare(name);
                self.define(name);

                self.begin_scope();
                self.scopes.last_mut().unwrap().insert(
                    "this".to_string(),
                    LocalRecord {
                        declared: name.clone(),
                        defined: true,
                        used: true,
                    },
                );

                for method in methods {
                    let fn_type = if method.name.as_ref().map(|t| t.lexeme.as_str()) == Some("init") {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_function(method, fn_type);
                }

                self.end_scope();
                self.current_class = enclosing_class;
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, fn_type: FunctionType) {
        let enclosing_function = self.current_function;
        self.current_function = fn_type;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_stmts(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Literal(_) => {}
            ExprKind::Grouping(inner) => self.resolve_expr(inner),
            ExprKind::Unary { right, .. } => self.resolve_expr(right),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            ExprKind::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(cond);
                self.resolve_expr(then_branch);
                self.resolve_expr(else_branch);
            }
            ExprKind::Variable(name) => {
                if let Some(scope) = self.scopes.last() {
                    if let Some(record) = scope.get(&name.lexeme) {
                        if !record.defined {
                            self.errors.push(ResolveError::new(
                                "Can't read local variable in its own initializer.",
                                name.clone(),
                            ));
                        }
                    }
                }
                self.resolve_local(expr.id, name);
            }
            ExprKind::Assign { name, value } => {
                self.resolve_expr(value);
                self.resolve_local(expr.id, name);
            }
            ExprKind::Call { callee, args, .. } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Get { object, .. } => self.resolve_expr(object),
            ExprKind::Set { object, value, .. } => {
                self.resolve_expr(value);
                self.resolve_expr(object);
            }
            ExprKind::This(keyword) => {
                if self.current_class == ClassType::None {
                    self.errors
                        .push(ResolveError::new("Can't use 'this' outside of a class.", keyword.clone()));
                    return;
                }
                self.resolve_local(expr.id, keyword);
            }
            ExprKind::Lambda(decl) => self.resolve_function(decl, FunctionType::Function),
        }
    }

    /// Walks the scope stack innermost-to-outermost; the first hit records
    /// `stack_size - 1 - index` as the distance and marks the local used. No
    /// hit means the binding is global (spec §4.3 `resolve-local`).
    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        let depth = self.scopes.len();
        for (index, scope) in self.scopes.iter_mut().enumerate().rev() {
            if let Some(record) = scope.get_mut(&name.lexeme) {
                record.used = true;
                self.distances.insert(id, depth - 1 - index);
                return;
            }
        }
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };
        if scope.contains_key(&name.lexeme) {
            self.errors.push(ResolveError::new(
                format!("Already a variable named '{}' in this scope.", name.lexeme),
                name.clone(),
            ));
        }
        scope.insert(
            name.lexeme.clone(),
            LocalRecord {
                declared: name.clone(),
                defined: false,
                used: false,
            },
        );
    }

    fn define(&mut self, name: &Token) {
        if let Some(record) = self.scopes.last_mut().and_then(|s| s.get_mut(&name.lexeme)) {
            record.defined = true;
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    /// Only `Block` scopes check for unused locals (spec §4.3: the
    /// unused-local check is specified per-`Block`, not per-function-param
    /// or per-class `this` scope).
    fn end_block_scope(&mut self) {
        if let Some(scope) = self.scopes.pop() {
            for (lexeme, record) in scope {
                if !record.used {
                    self.errors
                        .push(ResolveError::new(format!("Unused local variable '{lexeme}'."), record.declared));
                }
            }
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}
