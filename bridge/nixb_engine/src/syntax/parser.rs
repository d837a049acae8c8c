//! Recursive descent parser.
//!
//! One function per precedence level, loosest first:
//!
//! | level | operators | associativity |
//! |---|---|---|
//! | implication | `->` | right |
//! | or | `\|\|` | left |
//! | and | `&&` | left |
//! | equality | `==` `!=` | none |
//! | comparison | `<` `<=` `>` `>=` | none |
//! | update | `//` | right |
//! | not | `!` | prefix |
//! | additive | `+` `-` | left |
//! | multiplicative | `*` `/` | left |
//! | concat | `++` | right |
//! | has-attr | `?` | postfix |
//! | negation | `-` | prefix |
//! | application | juxtaposition | left |
//! | select | `.` / `or` | postfix |
//!
//! `let`, `with`, `assert`, `if` and lambdas sit above the whole chain and
//! extend as far right as possible.

use std::ops::Range;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use super::ast::{BinaryOp, Binding, ExprArena, ExprId, ExprKind, Formal, Param};
use super::lexer::{SpannedToken, Token};
use crate::errors::{syntax_error, NativeError, NativeResult};
use crate::stack::ensure_sufficient_stack;

pub(crate) struct Parser<'a> {
    tokens: Vec<SpannedToken>,
    pos: usize,
    source: &'a str,
    origin: &'a str,
    base_dir: &'a Path,
    arena: ExprArena,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(
        tokens: Vec<SpannedToken>,
        source: &'a str,
        origin: &'a str,
        base_dir: &'a Path,
    ) -> Self {
        Parser {
            tokens,
            pos: 0,
            source,
            origin,
            base_dir,
            arena: ExprArena::new(Rc::from(source)),
        }
    }

    /// Parse the whole token stream as one expression.
    pub(crate) fn parse_root(mut self) -> NativeResult<(ExprArena, ExprId)> {
        let root = self.parse_expr()?;
        if self.pos < self.tokens.len() {
            return Err(self.unexpected());
        }
        Ok((self.arena, root))
    }

    // ── Token cursor ────────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|t| &t.value)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> NativeResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|t| t.value.clone());
        self.pos += 1;
        token
    }

    /// Byte offset where the current token starts.
    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map_or(self.source.len(), |t| t.span.start)
    }

    /// Byte offset where the previous token ends.
    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.span.end)
    }

    fn span_from(&self, start: usize) -> Range<usize> {
        start..self.prev_end().max(start)
    }

    fn unexpected(&self) -> NativeError {
        match self.tokens.get(self.pos) {
            Some(token) => {
                let text = &self.source[token.span.clone()];
                let (line, column) = line_col(self.source, token.span.start);
                syntax_error(&format!("'{text}'"), self.origin, line, column)
            }
            None => {
                let (line, column) = line_col(self.source, self.source.len());
                syntax_error("end of file", self.origin, line, column)
            }
        }
    }

    fn alloc(&mut self, kind: ExprKind, start: usize) -> ExprId {
        let span = self.span_from(start);
        self.arena.alloc(kind, span)
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn parse_expr(&mut self) -> NativeResult<ExprId> {
        ensure_sufficient_stack(|| self.parse_expr_inner())
    }

    fn parse_expr_inner(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some(Token::Ident(_)), Some(Token::Colon), _) => {
                let name = self.ident()?;
                self.expect(&Token::Colon)?;
                let body = self.parse_expr()?;
                Ok(self.alloc(
                    ExprKind::Lambda {
                        param: Param::Ident(name),
                        body,
                    },
                    start,
                ))
            }
            (Some(Token::Ident(_)), Some(Token::At), Some(Token::LBrace)) => {
                let bind = self.ident()?;
                self.expect(&Token::At)?;
                self.parse_formals_lambda(Some(bind), start)
            }
            (Some(Token::LBrace), _, _) if self.at_formals() => {
                self.parse_formals_lambda(None, start)
            }
            (Some(Token::Let), _, _) => {
                self.advance();
                let bindings = self.parse_bindings(&Token::In)?;
                self.expect(&Token::In)?;
                let body = self.parse_expr()?;
                Ok(self.alloc(ExprKind::Let { bindings, body }, start))
            }
            (Some(Token::With), _, _) => {
                self.advance();
                let scope = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                let body = self.parse_expr()?;
                Ok(self.alloc(ExprKind::With { scope, body }, start))
            }
            (Some(Token::Assert), _, _) => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(&Token::Semi)?;
                let body = self.parse_expr()?;
                Ok(self.alloc(ExprKind::Assert { cond, body }, start))
            }
            (Some(Token::If), _, _) => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(&Token::Then)?;
                let then_branch = self.parse_expr()?;
                self.expect(&Token::Else)?;
                let else_branch = self.parse_expr()?;
                Ok(self.alloc(
                    ExprKind::If {
                        cond,
                        then_branch,
                        else_branch,
                    },
                    start,
                ))
            }
            _ => self.parse_implies(),
        }
    }

    /// Whether the `{` at the cursor opens a formals pattern rather than an
    /// attribute set.
    fn at_formals(&self) -> bool {
        match (self.peek_at(1), self.peek_at(2), self.peek_at(3)) {
            (Some(Token::RBrace), Some(Token::Colon | Token::At), _)
            | (Some(Token::Ellipsis), _, _)
            | (Some(Token::Ident(_)), Some(Token::Comma | Token::Question), _)
            | (Some(Token::Ident(_)), Some(Token::RBrace), Some(Token::Colon | Token::At)) => true,
            _ => false,
        }
    }

    fn parse_formals_lambda(&mut self, bind: Option<Rc<str>>, start: usize) -> NativeResult<ExprId> {
        self.expect(&Token::LBrace)?;
        let mut formals = Vec::new();
        let mut ellipsis = false;
        loop {
            if self.eat(&Token::RBrace) {
                break;
            }
            if self.eat(&Token::Ellipsis) {
                ellipsis = true;
                self.expect(&Token::RBrace)?;
                break;
            }
            let name = self.ident()?;
            let default = if self.eat(&Token::Question) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            formals.push(Formal { name, default });
            if !self.eat(&Token::Comma) {
                self.expect(&Token::RBrace)?;
                break;
            }
        }
        let bind = match bind {
            Some(bind) => Some(bind),
            None if self.eat(&Token::At) => Some(self.ident()?),
            None => None,
        };
        self.expect(&Token::Colon)?;
        let body = self.parse_expr()?;
        Ok(self.alloc(
            ExprKind::Lambda {
                param: Param::Formals {
                    formals,
                    ellipsis,
                    bind,
                },
                body,
            },
            start,
        ))
    }

    fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId, start: usize) -> ExprId {
        self.alloc(ExprKind::Binary { op, left, right }, start)
    }

    fn parse_implies(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let left = self.parse_or()?;
        if self.eat(&Token::Implies) {
            let right = ensure_sufficient_stack(|| self.parse_implies())?;
            return Ok(self.binary(BinaryOp::Implies, left, right, start));
        }
        Ok(left)
    }

    fn parse_or(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = self.binary(BinaryOp::Or, left, right, start);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let mut left = self.parse_equality()?;
        while self.eat(&Token::And) {
            let right = self.parse_equality()?;
            left = self.binary(BinaryOp::And, left, right, start);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let left = self.parse_comparison()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::NotEq) => BinaryOp::NotEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_comparison()?;
        Ok(self.binary(op, left, right, start))
    }

    fn parse_comparison(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let left = self.parse_update()?;
        let op = match self.peek() {
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::LtEq) => BinaryOp::LtEq,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::GtEq) => BinaryOp::GtEq,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_update()?;
        Ok(self.binary(op, left, right, start))
    }

    fn parse_update(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let left = self.parse_not()?;
        if self.eat(&Token::Update) {
            let right = ensure_sufficient_stack(|| self.parse_update())?;
            return Ok(self.binary(BinaryOp::Update, left, right, start));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        if self.eat(&Token::Bang) {
            let operand = ensure_sufficient_stack(|| self.parse_not())?;
            return Ok(self.alloc(ExprKind::Not(operand), start));
        }
        self.parse_additive()
    }

    fn parse_additive(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary(op, left, right, start);
        }
    }

    fn parse_multiplicative(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let mut left = self.parse_concat()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.parse_concat()?;
            left = self.binary(op, left, right, start);
        }
    }

    fn parse_concat(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let left = self.parse_has_attr()?;
        if self.eat(&Token::Concat) {
            let right = ensure_sufficient_stack(|| self.parse_concat())?;
            return Ok(self.binary(BinaryOp::Concat, left, right, start));
        }
        Ok(left)
    }

    fn parse_has_attr(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let mut target = self.parse_negate()?;
        while self.eat(&Token::Question) {
            let path = self.parse_attr_path()?;
            target = self.alloc(ExprKind::HasAttr { target, path }, start);
        }
        Ok(target)
    }

    fn parse_negate(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        if self.eat(&Token::Minus) {
            let operand = ensure_sufficient_stack(|| self.parse_negate())?;
            return Ok(self.alloc(ExprKind::Negate(operand), start));
        }
        self.parse_application()
    }

    fn parse_application(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let mut func = self.parse_select()?;
        while self.starts_operand() {
            let arg = self.parse_select()?;
            func = self.alloc(ExprKind::Apply { func, arg }, start);
        }
        Ok(func)
    }

    /// Whether the current token can begin an application argument.
    fn starts_operand(&self) -> bool {
        match self.peek() {
            Some(Token::Ident(name)) => name != "or",
            Some(
                Token::Int(_)
                | Token::Float(_)
                | Token::Str(_)
                | Token::Path(_)
                | Token::HomePath(_)
                | Token::SearchPath(_)
                | Token::LParen
                | Token::LBracket
                | Token::LBrace
                | Token::Rec,
            ) => true,
            _ => false,
        }
    }

    fn parse_select(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let target = self.parse_primary()?;
        if !self.eat(&Token::Dot) {
            return Ok(target);
        }
        let path = self.parse_attr_path()?;
        let default = if matches!(self.peek(), Some(Token::Ident(name)) if name == "or") {
            self.advance();
            Some(self.parse_select()?)
        } else {
            None
        };
        Ok(self.alloc(
            ExprKind::Select {
                target,
                path,
                default,
            },
            start,
        ))
    }

    fn parse_primary(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        let kind = match self.advance() {
            Some(Token::Int(n)) => ExprKind::Int(n),
            Some(Token::Float(f)) => ExprKind::Float(f),
            Some(Token::Str(s)) => ExprKind::Str(Rc::from(s)),
            Some(Token::Path(p)) => ExprKind::Path(Rc::from(self.resolve_path(&p))),
            Some(Token::HomePath(p)) => {
                let home = std::env::var("HOME").unwrap_or_default();
                let relative = p.trim_start_matches("~/");
                ExprKind::Path(Rc::from(normalize(&Path::new(&home).join(relative))))
            }
            Some(Token::SearchPath(name)) => ExprKind::SearchPath(Rc::from(name)),
            Some(Token::Ident(name)) => ExprKind::Var(Rc::from(name)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                return Ok(inner);
            }
            Some(Token::LBracket) => {
                let mut items = Vec::new();
                while !self.eat(&Token::RBracket) {
                    if self.peek().is_none() {
                        return Err(self.unexpected());
                    }
                    items.push(self.parse_list_item()?);
                }
                ExprKind::List(items)
            }
            Some(Token::LBrace) => {
                let bindings = self.parse_bindings(&Token::RBrace)?;
                self.expect(&Token::RBrace)?;
                ExprKind::Attrs {
                    recursive: false,
                    bindings,
                }
            }
            Some(Token::Rec) => {
                self.expect(&Token::LBrace)?;
                let bindings = self.parse_bindings(&Token::RBrace)?;
                self.expect(&Token::RBrace)?;
                ExprKind::Attrs {
                    recursive: true,
                    bindings,
                }
            }
            _ => {
                self.pos -= 1;
                return Err(self.unexpected());
            }
        };
        Ok(self.alloc(kind, start))
    }

    /// A list element: a select expression, or a negative number literal.
    fn parse_list_item(&mut self) -> NativeResult<ExprId> {
        let start = self.offset();
        match (self.peek(), self.peek_at(1)) {
            (Some(Token::Minus), Some(Token::Int(n))) => {
                let n = n.wrapping_neg();
                self.pos += 2;
                Ok(self.alloc(ExprKind::Int(n), start))
            }
            (Some(Token::Minus), Some(Token::Float(f))) => {
                let f = -f;
                self.pos += 2;
                Ok(self.alloc(ExprKind::Float(f), start))
            }
            _ => self.parse_select(),
        }
    }

    // ── Bindings ────────────────────────────────────────────────────────

    /// Bindings up to (not including) `end`.
    fn parse_bindings(&mut self, end: &Token) -> NativeResult<Vec<Binding>> {
        let mut bindings = Vec::new();
        while !self.check(end) {
            if self.peek().is_none() {
                return Err(self.unexpected());
            }
            if self.eat(&Token::Inherit) {
                self.parse_inherit(&mut bindings)?;
                continue;
            }
            let path = self.parse_attr_path()?;
            self.expect(&Token::Assign)?;
            let value = self.parse_expr()?;
            self.expect(&Token::Semi)?;
            bindings.push(Binding {
                path,
                value,
                inherited: false,
            });
        }
        Ok(bindings)
    }

    /// `inherit a b;` or `inherit (e) a b;`, after the keyword.
    fn parse_inherit(&mut self, bindings: &mut Vec<Binding>) -> NativeResult<()> {
        let from = if self.eat(&Token::LParen) {
            let from = self.parse_expr()?;
            self.expect(&Token::RParen)?;
            Some(from)
        } else {
            None
        };
        while !self.eat(&Token::Semi) {
            let start = self.offset();
            let name = self.attr_name()?;
            let (kind, inherited) = match from {
                Some(target) => (
                    ExprKind::Select {
                        target,
                        path: vec![name.clone()],
                        default: None,
                    },
                    false,
                ),
                None => (ExprKind::Var(name.clone()), true),
            };
            let value = self.alloc(kind, start);
            bindings.push(Binding {
                path: vec![name],
                value,
                inherited,
            });
        }
        Ok(())
    }

    fn parse_attr_path(&mut self) -> NativeResult<Vec<Rc<str>>> {
        let mut path = vec![self.attr_name()?];
        while self.eat(&Token::Dot) {
            path.push(self.attr_name()?);
        }
        Ok(path)
    }

    fn attr_name(&mut self) -> NativeResult<Rc<str>> {
        match self.peek() {
            Some(Token::Ident(name) | Token::Str(name)) => {
                let name = Rc::from(name.as_str());
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn ident(&mut self) -> NativeResult<Rc<str>> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = Rc::from(name.as_str());
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn resolve_path(&self, path: &str) -> String {
        if path.starts_with('/') {
            normalize(Path::new(path))
        } else {
            normalize(&self.base_dir.join(path))
        }
    }
}

/// Remove `.` and `..` components without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> String {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out.to_string_lossy().into_owned()
}

/// One-based line and column of a byte offset.
pub(crate) fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let before = &source[..offset.min(source.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
        + 1;
    (line, column)
}
