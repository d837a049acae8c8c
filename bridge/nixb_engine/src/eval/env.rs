//! Lexical scopes.
//!
//! A scope maps names to thunks and points at its parent. `with` pushes a
//! scope that holds no names of its own, only the (unforced) attribute set
//! to search once every lexical scope has missed.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::value::Thunk;

struct Scope {
    vars: RefCell<FxHashMap<Rc<str>, Thunk>>,
    parent: Option<Env>,
    with: Option<Thunk>,
}

#[derive(Clone)]
#[repr(transparent)]
pub(crate) struct Env(Rc<Scope>);

impl Env {
    pub(crate) fn root() -> Self {
        Env(Rc::new(Scope {
            vars: RefCell::new(FxHashMap::default()),
            parent: None,
            with: None,
        }))
    }

    pub(crate) fn child(&self) -> Self {
        Env(Rc::new(Scope {
            vars: RefCell::new(FxHashMap::default()),
            parent: Some(self.clone()),
            with: None,
        }))
    }

    pub(crate) fn with_scope(&self, attrs: Thunk) -> Self {
        Env(Rc::new(Scope {
            vars: RefCell::new(FxHashMap::default()),
            parent: Some(self.clone()),
            with: Some(attrs),
        }))
    }

    pub(crate) fn define(&self, name: Rc<str>, value: Thunk) {
        self.0.vars.borrow_mut().insert(name, value);
    }

    /// Look `name` up in the lexical chain. On a miss, the `with` scopes
    /// passed on the way are returned, innermost first.
    pub(crate) fn lookup(&self, name: &str) -> Result<Thunk, Vec<Thunk>> {
        let mut withs = Vec::new();
        let mut scope = Some(self);
        while let Some(env) = scope {
            if let Some(found) = env.0.vars.borrow().get(name) {
                return Ok(found.clone());
            }
            if let Some(with) = &env.0.with {
                withs.push(with.clone());
            }
            scope = env.0.parent.as_ref();
        }
        Err(withs)
    }
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.0.vars.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Env")
            .field("names", &names)
            .field("with", &self.0.with.is_some())
            .finish_non_exhaustive()
    }
}
