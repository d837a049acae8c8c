//! Evaluation states.

use std::ffi::{CStr, CString};
use std::fmt;
use std::rc::Rc;

use nixb_sys::NixApi;

use crate::error::{Error, Result};
use crate::handle::{NativeHandle, StateRef};
use crate::session::Session;
use crate::store::{missing_handle, Store};
use crate::value::{Host, Value};

/// Configuration for a new [`State`].
#[derive(Debug)]
pub struct StateBuilder<'a, A: NixApi> {
    store: &'a Store<A>,
    search_path: Vec<String>,
}

impl<'a, A: NixApi> StateBuilder<'a, A> {
    pub fn new(store: &'a Store<A>) -> Self {
        StateBuilder {
            store,
            search_path: Vec::new(),
        }
    }

    /// Add a search path entry, `prefix=path` or a bare `path`.
    #[must_use]
    pub fn search_path(mut self, entry: impl Into<String>) -> Self {
        self.search_path.push(entry.into());
        self
    }

    pub fn build(self) -> Result<State<A>> {
        let entries = self
            .search_path
            .iter()
            .map(|entry| CString::new(entry.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::interior_nul("search path entry"))?;
        let borrowed: Vec<&CStr> = entries.iter().map(CString::as_c_str).collect();
        let session = self.store.session();
        let raw = session
            .call(|api, ctx| api.nix_state_create(ctx, &borrowed, self.store.raw()))?
            .ok_or_else(|| missing_handle("nix_state_create"))?;
        tracing::debug!(search_path = ?self.search_path, "created evaluation state");
        Ok(State {
            inner: Rc::new(StateInner {
                handle: NativeHandle::new(Rc::clone(session), raw),
                store: self.store.clone(),
            }),
        })
    }
}

/// An evaluation state over one store. Clones share the native state, which
/// every value allocated through it keeps alive.
pub struct State<A: NixApi> {
    inner: Rc<StateInner<A>>,
}

// Field order matters: the state is freed before the store is released.
struct StateInner<A: NixApi> {
    handle: NativeHandle<A, StateRef>,
    store: Store<A>,
}

impl<A: NixApi> Clone for State<A> {
    fn clone(&self) -> Self {
        State {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: NixApi> State<A> {
    /// A state with no search path.
    pub fn new(store: &Store<A>) -> Result<Self> {
        StateBuilder::new(store).build()
    }

    pub(crate) fn raw(&self) -> A::State {
        self.inner.handle.raw()
    }

    pub fn store(&self) -> &Store<A> {
        &self.inner.store
    }

    pub fn session(&self) -> &Rc<Session<A>> {
        self.inner.handle.session()
    }

    /// A fresh, unassigned value slot.
    pub fn alloc_value(&self) -> Result<Value<A>> {
        let raw = self
            .session()
            .call(|api, ctx| api.nix_alloc_value(ctx, self.raw()))?
            .ok_or_else(|| missing_handle("nix_alloc_value"))?;
        Ok(Value::from_raw(self.clone(), raw, false))
    }

    /// Allocate a slot and write `host` into it.
    pub fn make_value(&self, host: impl Into<Host<A>>) -> Result<Value<A>> {
        let value = self.alloc_value()?;
        value.set(&host.into())?;
        Ok(value)
    }

    /// Evaluate `source` with relative paths resolved against the working
    /// directory.
    pub fn eval(&self, source: &str) -> Result<Value<A>> {
        self.eval_at(source, "")
    }

    /// Evaluate `source` with relative paths resolved against `origin`, and
    /// force the result.
    pub fn eval_at(&self, source: &str, origin: &str) -> Result<Value<A>> {
        let c_source = CString::new(source).map_err(|_| Error::interior_nul("expression"))?;
        let c_origin = CString::new(origin).map_err(|_| Error::interior_nul("origin path"))?;
        let value = self.alloc_value()?;
        tracing::trace!(len = source.len(), origin, "evaluating");
        self.session().status(|api, ctx| {
            api.nix_expr_eval_from_string(ctx, self.raw(), &c_source, &c_origin, value.raw())
        })?;
        value.force()?;
        Ok(value)
    }

    /// Drop this reference now. The native state is freed here unless a
    /// value or clone still holds it.
    pub fn free(self) {
        if let Ok(inner) = Rc::try_unwrap(self.inner) {
            let StateInner { handle, store } = inner;
            handle.release();
            drop(store);
        }
    }
}

impl<A: NixApi> fmt::Debug for State<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("handle", &self.inner.handle)
            .field("store", &self.inner.store)
            .finish()
    }
}
