//! Lazy evaluator.
//!
//! Expressions evaluate to weak head normal form ([`Val`]); everything
//! below the head stays in [`Thunk`]s until something forces it. A thunk
//! being forced is black-holed, so re-entering it reports infinite recursion
//! instead of overflowing. A failed force restores the thunk, so the same
//! error is reported again on the next attempt.
//!
//! Recursion through `eval`, `force` and `apply` goes through
//! [`ensure_sufficient_stack`].

mod builtins;
mod env;
mod operators;
mod value;


use std::cell::RefCell;
use std::cmp::Ordering;
use std::path::Path;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

pub(crate) use value::{Attrs, Thunk, Val};

use self::env::Env;
use self::value::{Closure, ThunkState};
use crate::errors::{
    assertion_failed, attribute_not_found, cannot_coerce, cannot_read, duplicate_attribute,
    infinite_recursion, integer_overflow, missing_argument, not_callable, not_in_search_path,
    type_mismatch, undefined_variable, unexpected_argument, uninitialized_value, NativeResult,
};
use crate::stack::ensure_sufficient_stack;
use crate::store::StoreDb;
use crate::syntax::{self, BinaryOp, Binding, ExprArena, ExprId, ExprKind, Param};

/// Origin reported for expressions evaluated from a string.
const STRING_ORIGIN: &str = "«string»";

/// One `-I` style search path entry: `prefix=path` or a bare `path`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SearchPathEntry {
    prefix: String,
    path: String,
}

impl SearchPathEntry {
    pub(crate) fn parse(entry: &str) -> Self {
        match entry.split_once('=') {
            Some((prefix, path)) => SearchPathEntry {
                prefix: prefix.to_owned(),
                path: path.to_owned(),
            },
            None => SearchPathEntry {
                prefix: String::new(),
                path: entry.to_owned(),
            },
        }
    }

    /// Candidate location of `<name>` under this entry.
    fn candidate(&self, name: &str) -> Option<String> {
        if self.prefix.is_empty() {
            return Some(format!("{}/{name}", self.path));
        }
        if name == self.prefix {
            return Some(self.path.clone());
        }
        name.strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix('/'))
            .map(|rest| format!("{}/{rest}", self.path))
    }
}

/// Evaluation state: the store derivations go to, the search path and the
/// base environment with `builtins`.
pub(crate) struct Evaluator {
    store: Rc<RefCell<StoreDb>>,
    search_path: Vec<SearchPathEntry>,
    base: Env,
    imports: RefCell<FxHashMap<String, Val>>,
}

impl Evaluator {
    pub(crate) fn new(store: Rc<RefCell<StoreDb>>, search_path: Vec<SearchPathEntry>) -> Self {
        let nix_path = search_path
            .iter()
            .map(|entry| {
                let mut attrs = Attrs::new();
                attrs.insert(Rc::from("prefix"), Thunk::done(Val::str(&entry.prefix)));
                attrs.insert(Rc::from("path"), Thunk::done(Val::str(&entry.path)));
                Thunk::done(Val::Attrs(Rc::new(attrs)))
            })
            .collect();
        let store_dir = store.borrow().store_dir().to_owned();
        let base = builtins::base_env(&store_dir, Val::List(Rc::new(nix_path)));
        Evaluator {
            store,
            search_path,
            base,
            imports: RefCell::new(FxHashMap::default()),
        }
    }

    pub(crate) fn store(&self) -> &Rc<RefCell<StoreDb>> {
        &self.store
    }

    /// Parse and evaluate `source`; relative paths resolve against
    /// `base_dir` (the working directory when empty).
    pub(crate) fn eval_source(&self, source: &str, base_dir: &str) -> NativeResult<Val> {
        let base_dir = if base_dir.is_empty() {
            std::env::current_dir()
                .map(|dir| dir.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "/".to_owned())
        } else {
            base_dir.to_owned()
        };
        tracing::trace!(base_dir = %base_dir, len = source.len(), "evaluating string");
        let (arena, root) = syntax::parse(source, STRING_ORIGIN, Path::new(&base_dir))?;
        self.eval(&Rc::new(arena), root, &self.base)
    }

    /// `import path`: evaluate a file (or `default.nix` of a directory) in the
    /// base environment. Results are cached per file.
    pub(crate) fn import(&self, path: &str) -> NativeResult<Val> {
        let mut file = Path::new(path).to_path_buf();
        if file.is_dir() {
            file.push("default.nix");
        }
        let file = file.to_string_lossy().into_owned();
        if let Some(cached) = self.imports.borrow().get(&file) {
            return Ok(cached.clone());
        }
        let source =
            std::fs::read_to_string(&file).map_err(|e| cannot_read(&file, &e.to_string()))?;
        tracing::debug!(file = %file, "importing");
        let dir = Path::new(&file).parent().unwrap_or(Path::new("/"));
        let (arena, root) = syntax::parse(&source, &file, dir)?;
        let value = self.eval(&Rc::new(arena), root, &self.base)?;
        self.imports.borrow_mut().insert(file, value.clone());
        Ok(value)
    }

    fn find_file(&self, name: &str) -> NativeResult<String> {
        self.search_path
            .iter()
            .filter_map(|entry| entry.candidate(name))
            .find(|candidate| Path::new(candidate).exists())
            .map(|found| syntax::normalize(Path::new(&found)))
            .ok_or_else(|| not_in_search_path(name))
    }

    // ── Forcing ─────────────────────────────────────────────────────────

    pub(crate) fn force(&self, thunk: &Thunk) -> NativeResult<Val> {
        if let Some(value) = thunk.value() {
            return Ok(value);
        }
        let state = thunk.replace(ThunkState::Blackhole);
        let result = ensure_sufficient_stack(|| match &state {
            ThunkState::Done(value) => Ok(value.clone()),
            ThunkState::Uninit => Err(uninitialized_value()),
            ThunkState::Blackhole => Err(infinite_recursion()),
            ThunkState::Pending { arena, expr, env } => self.eval(arena, *expr, env),
            ThunkState::Apply { func, arg } => {
                let func = self.force(func)?;
                self.apply(&func, arg.clone())
            }
            ThunkState::Alias(target) => self.force(target),
        });
        match result {
            Ok(value) => {
                thunk.set(value.clone());
                Ok(value)
            }
            Err(err) => {
                thunk.replace(state);
                Err(err)
            }
        }
    }

    /// Force `thunk` and everything reachable from it, except function
    /// bodies. Shared attribute sets and lists are visited once.
    pub(crate) fn force_deep(&self, thunk: &Thunk) -> NativeResult<()> {
        let value = self.force(thunk)?;
        let mut seen = FxHashSet::default();
        self.force_deep_value(&value, &mut seen)
    }

    fn force_deep_value(&self, value: &Val, seen: &mut FxHashSet<usize>) -> NativeResult<()> {
        let children: Vec<Thunk> = match value {
            Val::Attrs(attrs) => {
                if !seen.insert(Rc::as_ptr(attrs).cast::<()>() as usize) {
                    return Ok(());
                }
                attrs.values().cloned().collect()
            }
            Val::List(items) => {
                if !seen.insert(Rc::as_ptr(items).cast::<()>() as usize) {
                    return Ok(());
                }
                items.iter().cloned().collect()
            }
            _ => return Ok(()),
        };
        for child in &children {
            let child = self.force(child)?;
            ensure_sufficient_stack(|| self.force_deep_value(&child, seen))?;
        }
        Ok(())
    }

    pub(crate) fn force_attrs(&self, thunk: &Thunk) -> NativeResult<Rc<Attrs>> {
        match self.force(thunk)? {
            Val::Attrs(attrs) => Ok(attrs),
            other => Err(type_mismatch("a set", other.show_type())),
        }
    }

    pub(crate) fn force_list(&self, thunk: &Thunk) -> NativeResult<Rc<Vec<Thunk>>> {
        match self.force(thunk)? {
            Val::List(items) => Ok(items),
            other => Err(type_mismatch("a list", other.show_type())),
        }
    }

    pub(crate) fn force_str(&self, thunk: &Thunk) -> NativeResult<Rc<str>> {
        match self.force(thunk)? {
            Val::Str(s) => Ok(s),
            other => Err(type_mismatch("a string", other.show_type())),
        }
    }

    pub(crate) fn force_int(&self, thunk: &Thunk) -> NativeResult<i64> {
        match self.force(thunk)? {
            Val::Int(n) => Ok(n),
            other => Err(type_mismatch("an integer", other.show_type())),
        }
    }

    pub(crate) fn force_coerced(&self, thunk: &Thunk, coerce_more: bool) -> NativeResult<String> {
        let value = self.force(thunk)?;
        self.coerce_to_string(&value, coerce_more)
    }

    pub(crate) fn expect_bool(&self, value: Val) -> NativeResult<bool> {
        match value {
            Val::Bool(b) => Ok(b),
            other => Err(type_mismatch("a Boolean", other.show_type())),
        }
    }

    /// String coercion. Strings, paths and sets with `__toString` or
    /// `outPath` always coerce; `coerce_more` (`toString`) adds numbers,
    /// Booleans, null and lists.
    pub(crate) fn coerce_to_string(&self, value: &Val, coerce_more: bool) -> NativeResult<String> {
        match value {
            Val::Str(s) | Val::Path(s) => Ok(s.to_string()),
            Val::Attrs(attrs) => {
                if let Some(func) = attrs.get("__toString") {
                    let func = self.force(func)?;
                    let result = self.apply(&func, Thunk::done(value.clone()))?;
                    return self.coerce_to_string(&result, coerce_more);
                }
                if let Some(out) = attrs.get("outPath") {
                    let out = self.force(out)?;
                    return self.coerce_to_string(&out, coerce_more);
                }
                Err(cannot_coerce("a set"))
            }
            Val::Int(n) if coerce_more => Ok(n.to_string()),
            Val::Float(f) if coerce_more => Ok(format!("{f:.6}")),
            Val::Bool(b) if coerce_more => Ok(if *b { "1" } else { "" }.to_owned()),
            Val::Null if coerce_more => Ok(String::new()),
            Val::List(items) if coerce_more => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items.iter() {
                    parts.push(self.force_coerced(item, coerce_more)?);
                }
                Ok(parts.join(" "))
            }
            other => Err(cannot_coerce(other.show_type())),
        }
    }

    // ── Application ─────────────────────────────────────────────────────

    pub(crate) fn apply(&self, func: &Val, arg: Thunk) -> NativeResult<Val> {
        match func {
            Val::Lambda(closure) => ensure_sufficient_stack(|| self.call_closure(closure, arg)),
            Val::PrimOp(app) => {
                let mut args = app.args.clone();
                args.push(arg);
                if args.len() < app.op.arity() {
                    return Ok(Val::PrimOp(Rc::new(value::PrimOpApp { op: app.op, args })));
                }
                builtins::call(self, app.op, &args)
            }
            Val::Attrs(attrs) => match attrs.get("__functor") {
                Some(functor) => {
                    let functor = self.force(functor)?;
                    let bound = self.apply(&functor, Thunk::done(func.clone()))?;
                    self.apply(&bound, arg)
                }
                None => Err(not_callable("a set")),
            },
            other => Err(not_callable(other.show_type())),
        }
    }

    fn call_closure(&self, closure: &Closure, arg: Thunk) -> NativeResult<Val> {
        let arena = &closure.arena;
        let ExprKind::Lambda { param, body } = &arena.get(closure.expr).kind else {
            return Err(not_callable("a function"));
        };
        let scope = closure.env.child();
        match param {
            Param::Ident(name) => scope.define(name.clone(), arg),
            Param::Formals {
                formals,
                ellipsis,
                bind,
            } => {
                let attrs = self.force_attrs(&arg)?;
                if !ellipsis {
                    if let Some(extra) = attrs
                        .keys()
                        .find(|name| !formals.iter().any(|f| f.name == **name))
                    {
                        return Err(unexpected_argument(extra));
                    }
                }
                for formal in formals {
                    let value = match (attrs.get(&formal.name), formal.default) {
                        (Some(value), _) => value.clone(),
                        (None, Some(default)) => Thunk::pending(arena.clone(), default, scope.clone()),
                        (None, None) => return Err(missing_argument(&formal.name)),
                    };
                    scope.define(formal.name.clone(), value);
                }
                if let Some(bind) = bind {
                    scope.define(bind.clone(), arg.clone());
                }
            }
        }
        self.eval(arena, *body, &scope)
    }

    // ── Comparison ──────────────────────────────────────────────────────

    /// Deep equality. Functions never compare equal; derivations compare by
    /// `outPath`.
    pub(crate) fn values_equal(&self, left: &Val, right: &Val) -> NativeResult<bool> {
        if let Some(equal) = operators::scalars_equal(left, right) {
            return Ok(equal);
        }
        ensure_sufficient_stack(|| match (left, right) {
            (Val::List(a), Val::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                if a.len() != b.len() {
                    return Ok(false);
                }
                for (x, y) in a.iter().zip(b.iter()) {
                    if !self.values_equal(&self.force(x)?, &self.force(y)?)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            (Val::Attrs(a), Val::Attrs(b)) => {
                if Rc::ptr_eq(a, b) {
                    return Ok(true);
                }
                if self.is_derivation(a)? && self.is_derivation(b)? {
                    if let (Some(x), Some(y)) = (a.get("outPath"), b.get("outPath")) {
                        return self.values_equal(&self.force(x)?, &self.force(y)?);
                    }
                }
                if a.len() != b.len() {
                    return Ok(false);
                }
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    if ka != kb || !self.values_equal(&self.force(va)?, &self.force(vb)?)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    fn is_derivation(&self, attrs: &Attrs) -> NativeResult<bool> {
        match attrs.get("type") {
            Some(kind) => Ok(matches!(self.force(kind)?, Val::Str(s) if &*s == "derivation")),
            None => Ok(false),
        }
    }

    /// `<` on numbers, strings, paths, and lexicographically on lists.
    pub(crate) fn less_than(&self, left: &Val, right: &Val) -> NativeResult<bool> {
        match (left, right) {
            (Val::List(a), Val::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let x = self.force(x)?;
                    let y = self.force(y)?;
                    if !self.values_equal(&x, &y)? {
                        return ensure_sufficient_stack(|| self.less_than(&x, &y));
                    }
                }
                Ok(a.len() < b.len())
            }
            _ => Ok(operators::compare_scalars(left, right)? == Some(Ordering::Less)),
        }
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn eval(&self, arena: &Rc<ExprArena>, id: ExprId, env: &Env) -> NativeResult<Val> {
        ensure_sufficient_stack(|| self.eval_inner(arena, id, env))
    }

    fn eval_inner(&self, arena: &Rc<ExprArena>, id: ExprId, env: &Env) -> NativeResult<Val> {
        match &arena.get(id).kind {
            ExprKind::Int(n) => Ok(Val::Int(*n)),
            ExprKind::Float(f) => Ok(Val::Float(*f)),
            ExprKind::Str(s) => Ok(Val::Str(s.clone())),
            ExprKind::Path(p) => Ok(Val::Path(p.clone())),
            ExprKind::SearchPath(name) => Ok(Val::Path(Rc::from(self.find_file(name)?))),
            ExprKind::Var(name) => {
                let thunk = self.lookup(env, name)?;
                self.force(&thunk)
            }
            ExprKind::List(items) => Ok(Val::List(Rc::new(
                items.iter().map(|&item| self.delay(arena, item, env)).collect(),
            ))),
            ExprKind::Attrs {
                recursive: false,
                bindings,
            } => Ok(Val::Attrs(Rc::new(
                self.build_bindings(arena, bindings, env, env)?,
            ))),
            ExprKind::Attrs {
                recursive: true,
                bindings,
            } => {
                let scope = self.recursive_scope(arena, bindings, env)?;
                Ok(Val::Attrs(Rc::new(scope.1)))
            }
            ExprKind::Let { bindings, body } => {
                let (scope, _) = self.recursive_scope(arena, bindings, env)?;
                self.eval(arena, *body, &scope)
            }
            ExprKind::Lambda { .. } => Ok(self.closure(arena, id, env)),
            ExprKind::Apply { func, arg } => {
                let func = self.eval(arena, *func, env)?;
                let arg = self.delay(arena, *arg, env);
                self.apply(&func, arg)
            }
            ExprKind::Select {
                target,
                path,
                default,
            } => {
                let mut current = self.eval(arena, *target, env)?;
                for name in path {
                    let next = match &current {
                        Val::Attrs(attrs) => attrs.get(name).cloned(),
                        _ => None,
                    };
                    current = match (next, default) {
                        (Some(next), _) => self.force(&next)?,
                        (None, Some(default)) => return self.eval(arena, *default, env),
                        (None, None) => {
                            return Err(match &current {
                                Val::Attrs(_) => attribute_not_found(name),
                                other => type_mismatch("a set", other.show_type()),
                            })
                        }
                    };
                }
                Ok(current)
            }
            ExprKind::HasAttr { target, path } => {
                let mut current = self.eval(arena, *target, env)?;
                for (i, name) in path.iter().enumerate() {
                    let next = match &current {
                        Val::Attrs(attrs) => attrs.get(name).cloned(),
                        _ => None,
                    };
                    match next {
                        // The last attribute only needs to exist.
                        Some(_) if i + 1 == path.len() => break,
                        Some(next) => current = self.force(&next)?,
                        None => return Ok(Val::Bool(false)),
                    }
                }
                Ok(Val::Bool(true))
            }
            ExprKind::Binary { op, left, right } => self.binary(arena, *op, *left, *right, env),
            ExprKind::Not(operand) => Ok(Val::Bool(!self.eval_bool(arena, *operand, env)?)),
            ExprKind::Negate(operand) => match self.eval(arena, *operand, env)? {
                Val::Int(n) => n
                    .checked_neg()
                    .map(Val::Int)
                    .ok_or_else(|| integer_overflow("negation")),
                Val::Float(f) => Ok(Val::Float(-f)),
                other => Err(type_mismatch("an integer or a float", other.show_type())),
            },
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let branch = if self.eval_bool(arena, *cond, env)? {
                    then_branch
                } else {
                    else_branch
                };
                self.eval(arena, *branch, env)
            }
            ExprKind::Assert { cond, body } => {
                if !self.eval_bool(arena, *cond, env)? {
                    return Err(assertion_failed(arena.text(*cond)));
                }
                self.eval(arena, *body, env)
            }
            ExprKind::With { scope, body } => {
                let scope = self.delay(arena, *scope, env);
                self.eval(arena, *body, &env.with_scope(scope))
            }
        }
    }

    fn eval_bool(&self, arena: &Rc<ExprArena>, id: ExprId, env: &Env) -> NativeResult<bool> {
        let value = self.eval(arena, id, env)?;
        self.expect_bool(value)
    }

    fn binary(
        &self,
        arena: &Rc<ExprArena>,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        env: &Env,
    ) -> NativeResult<Val> {
        match op {
            BinaryOp::And => {
                let result = self.eval_bool(arena, left, env)? && self.eval_bool(arena, right, env)?;
                return Ok(Val::Bool(result));
            }
            BinaryOp::Or => {
                let result = self.eval_bool(arena, left, env)? || self.eval_bool(arena, right, env)?;
                return Ok(Val::Bool(result));
            }
            BinaryOp::Implies => {
                let result = !self.eval_bool(arena, left, env)? || self.eval_bool(arena, right, env)?;
                return Ok(Val::Bool(result));
            }
            _ => {}
        }
        let l = self.eval(arena, left, env)?;
        let r = self.eval(arena, right, env)?;
        match op {
            BinaryOp::Eq => Ok(Val::Bool(self.values_equal(&l, &r)?)),
            BinaryOp::NotEq => Ok(Val::Bool(!self.values_equal(&l, &r)?)),
            BinaryOp::Lt => Ok(Val::Bool(self.less_than(&l, &r)?)),
            BinaryOp::Gt => Ok(Val::Bool(self.less_than(&r, &l)?)),
            BinaryOp::LtEq => Ok(Val::Bool(!self.less_than(&r, &l)?)),
            BinaryOp::GtEq => Ok(Val::Bool(!self.less_than(&l, &r)?)),
            BinaryOp::Concat => operators::concat_lists(&l, &r),
            BinaryOp::Update => operators::update(&l, &r),
            _ => operators::arithmetic(op, &l, &r),
        }
    }

    fn closure(&self, arena: &Rc<ExprArena>, id: ExprId, env: &Env) -> Val {
        Val::Lambda(Rc::new(Closure {
            arena: arena.clone(),
            expr: id,
            env: env.clone(),
        }))
    }

    /// Defer `id`. Literals and lambdas are built directly.
    fn delay(&self, arena: &Rc<ExprArena>, id: ExprId, env: &Env) -> Thunk {
        match &arena.get(id).kind {
            ExprKind::Int(n) => Thunk::done(Val::Int(*n)),
            ExprKind::Float(f) => Thunk::done(Val::Float(*f)),
            ExprKind::Str(s) => Thunk::done(Val::Str(s.clone())),
            ExprKind::Path(p) => Thunk::done(Val::Path(p.clone())),
            ExprKind::Lambda { .. } => Thunk::done(self.closure(arena, id, env)),
            _ => Thunk::pending(arena.clone(), id, env.clone()),
        }
    }

    /// Lexical scopes first, then `with` scopes innermost first.
    fn lookup(&self, env: &Env, name: &str) -> NativeResult<Thunk> {
        match env.lookup(name) {
            Ok(found) => Ok(found),
            Err(withs) => {
                for with in &withs {
                    let attrs = self.force_attrs(with)?;
                    if let Some(found) = attrs.get(name) {
                        return Ok(found.clone());
                    }
                }
                Err(undefined_variable(name))
            }
        }
    }

    /// Scope of a `rec` set or `let`: every binding sees every other.
    fn recursive_scope(
        &self,
        arena: &Rc<ExprArena>,
        bindings: &[Binding],
        env: &Env,
    ) -> NativeResult<(Env, Attrs)> {
        let scope = env.child();
        let attrs = self.build_bindings(arena, bindings, &scope, env)?;
        for (name, value) in &attrs {
            scope.define(name.clone(), value.clone());
        }
        Ok((scope, attrs))
    }

    /// Turn bindings into attributes. Values evaluate in `scope`, plain
    /// `inherit`s in `outer`. Nested paths (`a.b = 1; a.c = 2;`) merge.
    fn build_bindings(
        &self,
        arena: &Rc<ExprArena>,
        bindings: &[Binding],
        scope: &Env,
        outer: &Env,
    ) -> NativeResult<Attrs> {
        let mut tree = Tree::new();
        for binding in bindings {
            let env = if binding.inherited { outer } else { scope };
            let value = self.delay(arena, binding.value, env);
            insert_path(&mut tree, &binding.path, value)?;
        }
        Ok(into_attrs(tree))
    }
}

enum Node {
    Leaf(Thunk),
    Nested(Tree),
}

type Tree = std::collections::BTreeMap<Rc<str>, Node>;

fn insert_path(tree: &mut Tree, path: &[Rc<str>], value: Thunk) -> NativeResult<()> {
    let Some((first, rest)) = path.split_first() else {
        return Ok(());
    };
    if rest.is_empty() {
        if tree.contains_key(first) {
            return Err(duplicate_attribute(first));
        }
        tree.insert(first.clone(), Node::Leaf(value));
        return Ok(());
    }
    match tree
        .entry(first.clone())
        .or_insert_with(|| Node::Nested(Tree::new()))
    {
        Node::Nested(inner) => insert_path(inner, rest, value),
        Node::Leaf(_) => Err(duplicate_attribute(first)),
    }
}

fn into_attrs(tree: Tree) -> Attrs {
    tree.into_iter()
        .map(|(name, node)| {
            let value = match node {
                Node::Leaf(value) => value,
                Node::Nested(inner) => Thunk::done(Val::Attrs(Rc::new(into_attrs(inner)))),
            };
            (name, value)
        })
        .collect()
}
