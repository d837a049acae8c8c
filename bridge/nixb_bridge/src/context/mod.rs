//! Error context pool and the call dispatcher.
//!
//! Every fallible native call takes a `nix_c_context *` to report into.
//! Allocating one per call would be wasteful, and sharing one is wrong as
//! soon as calls nest: a build callback may issue its own native calls
//! before the outer call has returned and been checked. The pool keeps one
//! context per nesting depth. A call takes the slot at the current depth
//! and bumps the depth while it runs, so anything it triggers lands in a
//! deeper slot.


use std::cell::{Cell, RefCell};

use nixb_sys::{NixApi, NIX_ERR_UNKNOWN, NIX_OK};

use crate::error::{Error, Result};

/// Stack of reusable error contexts, indexed by nesting depth.
pub(crate) struct ContextPool<A: NixApi> {
    slots: RefCell<Vec<A::Context>>,
    depth: Cell<usize>,
}

/// Restores the depth on every exit path, unwinding included.
struct DepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl<'a> DepthGuard<'a> {
    fn enter(depth: &'a Cell<usize>) -> Self {
        depth.set(depth.get() + 1);
        DepthGuard { depth }
    }
}

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

impl<A: NixApi> ContextPool<A> {
    pub(crate) fn new() -> Self {
        ContextPool {
            slots: RefCell::new(Vec::new()),
            depth: Cell::new(0),
        }
    }

    /// Number of contexts created so far (the deepest nesting reached).
    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub(crate) fn depth(&self) -> usize {
        self.depth.get()
    }

    /// The context for the current depth, created on first use.
    fn acquire(&self, api: &A) -> Result<A::Context> {
        let depth = self.depth.get();
        if let Some(&ctx) = self.slots.borrow().get(depth) {
            return Ok(ctx);
        }
        let ctx = api.nix_c_context_create().ok_or_else(|| Error::Unknown {
            code: NIX_ERR_UNKNOWN,
            message: "could not allocate an error context".to_owned(),
        })?;
        tracing::debug!(depth, "created error context");
        self.slots.borrow_mut().push(ctx);
        Ok(ctx)
    }

    /// Run `f` with the context of the current depth and turn a failing code
    /// into an [`Error`].
    ///
    /// No borrow of the pool is held while `f` runs, so `f` (or a callback
    /// it hands to the native library) may dispatch again.
    pub(crate) fn dispatch<R>(&self, api: &A, f: impl FnOnce(&A, A::Context) -> R) -> Result<R> {
        let ctx = self.acquire(api)?;
        let _guard = DepthGuard::enter(&self.depth);
        let result = f(api, ctx);
        let code = api.nix_err_code(ctx);
        if code == NIX_OK {
            return Ok(result);
        }
        let message = self.message(api, ctx);
        tracing::trace!(code, message = %message, "native call failed");
        Err(Error::from_native(code, message))
    }

    /// Message recorded in `failed`, read through a deeper slot so that
    /// `failed` itself is left as it is.
    fn message(&self, api: &A, failed: A::Context) -> String {
        let fallback = || "unknown error (no message available)".to_owned();
        let Ok(reader) = self.acquire(api) else {
            return fallback();
        };
        api.nix_err_msg(reader, failed, None)
            .unwrap_or_else(fallback)
    }

    /// Free every context. Called once, when the owning session drops.
    pub(crate) fn free_all(&self, api: &A) {
        for ctx in self.slots.borrow_mut().drain(..) {
            api.nix_c_context_free(ctx);
        }
    }
}
