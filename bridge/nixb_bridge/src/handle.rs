//! Ownership of opaque native handles.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use nixb_sys::NixApi;

use crate::session::Session;

/// How one kind of native handle is released.
pub(crate) trait Release<A: NixApi> {
    type Raw: Copy + fmt::Debug;

    /// Name used in logs.
    const KIND: &'static str;

    fn release(session: &Session<A>, raw: Self::Raw);
}

/// Exclusive owner of one native handle of kind `K`.
///
/// The handle is released once: by [`NativeHandle::release`] when the owner
/// wants it gone now, otherwise by `Drop`.
pub(crate) struct NativeHandle<A: NixApi, K: Release<A>> {
    session: Rc<Session<A>>,
    raw: K::Raw,
    released: bool,
    kind: PhantomData<K>,
}

impl<A: NixApi, K: Release<A>> NativeHandle<A, K> {
    pub(crate) fn new(session: Rc<Session<A>>, raw: K::Raw) -> Self {
        NativeHandle {
            session,
            raw,
            released: false,
            kind: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> K::Raw {
        self.raw
    }

    pub(crate) fn session(&self) -> &Rc<Session<A>> {
        &self.session
    }

    /// Release the native handle now.
    pub(crate) fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        tracing::trace!(kind = K::KIND, raw = ?self.raw, "releasing handle");
        K::release(&self.session, self.raw);
    }
}

impl<A: NixApi, K: Release<A>> Drop for NativeHandle<A, K> {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl<A: NixApi, K: Release<A>> fmt::Debug for NativeHandle<A, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", K::KIND, self.raw)
    }
}

// ── Handle kinds ────────────────────────────────────────────────────────

pub(crate) enum StoreRef {}
pub(crate) enum StorePathRef {}
pub(crate) enum StateRef {}
pub(crate) enum ValueRef {}
pub(crate) enum BuilderRef {}

impl<A: NixApi> Release<A> for StoreRef {
    type Raw = A::Store;
    const KIND: &'static str = "store";

    fn release(session: &Session<A>, raw: Self::Raw) {
        session.api().nix_store_unref(raw);
    }
}

impl<A: NixApi> Release<A> for StorePathRef {
    type Raw = A::StorePath;
    const KIND: &'static str = "store path";

    fn release(session: &Session<A>, raw: Self::Raw) {
        session.api().nix_store_path_free(raw);
    }
}

impl<A: NixApi> Release<A> for StateRef {
    type Raw = A::State;
    const KIND: &'static str = "state";

    fn release(session: &Session<A>, raw: Self::Raw) {
        session.api().nix_state_free(raw);
    }
}

impl<A: NixApi> Release<A> for ValueRef {
    type Raw = A::Value;
    const KIND: &'static str = "value";

    fn release(session: &Session<A>, raw: Self::Raw) {
        // Drop cannot propagate the error.
        if let Err(err) = session.status(|api, ctx| api.nix_gc_decref(ctx, raw)) {
            tracing::warn!(error = %err, "nix_gc_decref failed");
        }
    }
}

impl<A: NixApi> Release<A> for BuilderRef {
    type Raw = A::BindingsBuilder;
    const KIND: &'static str = "bindings builder";

    fn release(session: &Session<A>, raw: Self::Raw) {
        session.api().nix_bindings_builder_free(raw);
    }
}
