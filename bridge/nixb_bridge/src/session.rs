//! The session: one native library, one context pool.

use std::ffi::CString;
use std::fmt;
use std::rc::Rc;

use nixb_sys::NixApi;

use crate::context::ContextPool;
use crate::error::{Error, Result};
use crate::handle::NativeHandle;
use crate::store::Store;

/// Owner of the native call table and of the error contexts used to call
/// it. Everything created through a session keeps it alive through an
/// `Rc`, so the contexts outlive every handle that may still need them.
pub struct Session<A: NixApi> {
    api: A,
    pool: ContextPool<A>,
}

impl<A: NixApi> Session<A> {
    /// Wrap `api` and initialize `libnixutil`, `libnixstore` and
    /// `libnixexpr`.
    pub fn new(api: A) -> Result<Rc<Self>> {
        let session = Rc::new(Session {
            api,
            pool: ContextPool::new(),
        });
        session.status(|api, ctx| api.nix_libutil_init(ctx))?;
        session.status(|api, ctx| api.nix_libstore_init(ctx))?;
        session.status(|api, ctx| api.nix_libexpr_init(ctx))?;
        tracing::debug!(version = %session.version(), "session initialized");
        Ok(session)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// `nix_version_get`
    pub fn version(&self) -> String {
        self.api.nix_version_get()
    }

    /// Ask the collector to run now.
    pub fn gc_now(&self) {
        self.api.nix_gc_now();
    }

    /// Open the store at `uri` (`""` for the default store).
    pub fn open_store(self: &Rc<Self>, uri: &str) -> Result<Store<A>> {
        self.open_store_with(uri, &[])
    }

    /// Open a store with extra key/value parameters.
    pub fn open_store_with(self: &Rc<Self>, uri: &str, params: &[(&str, &str)]) -> Result<Store<A>> {
        let open_error = |source: Error| Error::StoreOpen {
            uri: uri.to_owned(),
            source: Box::new(source),
        };
        let c_uri = CString::new(uri).map_err(|_| open_error(Error::interior_nul("store URI")))?;
        let c_params = params
            .iter()
            .map(|(k, v)| Ok((CString::new(*k)?, CString::new(*v)?)))
            .collect::<Result<Vec<_>, std::ffi::NulError>>()
            .map_err(|_| open_error(Error::interior_nul("store parameter")))?;
        let borrowed: Vec<_> = c_params
            .iter()
            .map(|(k, v)| (k.as_c_str(), v.as_c_str()))
            .collect();
        let raw = self
            .call(|api, ctx| api.nix_store_open(ctx, &c_uri, &borrowed))
            .map_err(open_error)?;
        let raw = raw.ok_or_else(|| open_error(Error::Unknown {
            code: nixb_sys::NIX_ERR_UNKNOWN,
            message: "store open returned no handle".to_owned(),
        }))?;
        tracing::debug!(uri, "opened store");
        Ok(Store::new(NativeHandle::new(self.clone(), raw)))
    }

    /// Dispatch a fallible native call through the context pool.
    pub(crate) fn call<R>(&self, f: impl FnOnce(&A, A::Context) -> R) -> Result<R> {
        self.pool.dispatch(&self.api, f)
    }

    /// [`Session::call`] for functions whose result is only a status code.
    pub(crate) fn status(&self, f: impl FnOnce(&A, A::Context) -> nixb_sys::NixErr) -> Result<()> {
        self.call(f).map(drop)
    }

    /// Contexts created so far. Grows only with nesting depth.
    pub fn contexts_in_pool(&self) -> usize {
        self.pool.len()
    }
}

impl<A: NixApi> fmt::Debug for Session<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("contexts", &self.pool.len())
            .field("depth", &self.pool.depth())
            .finish_non_exhaustive()
    }
}

impl<A: NixApi> Drop for Session<A> {
    fn drop(&mut self) {
        self.pool.free_all(&self.api);
    }
}
