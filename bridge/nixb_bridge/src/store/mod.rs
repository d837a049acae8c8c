//! Stores and store paths.

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::fmt;
use std::rc::Rc;

use nixb_sys::NixApi;

use crate::error::{Error, Result};
use crate::handle::{NativeHandle, StorePathRef, StoreRef};
use crate::session::Session;
use crate::state::StateBuilder;

/// Size of the buffer `Store::uri` reads into.
pub const URI_BUFFER_LEN: usize = 128;
/// Size of the buffer `Store::version` reads into.
pub const VERSION_BUFFER_LEN: usize = 64;

/// An open store. Clones share one native handle, which is unref'd when
/// the last clone (including those held by states and paths) is dropped.
pub struct Store<A: NixApi> {
    handle: Rc<NativeHandle<A, StoreRef>>,
}

impl<A: NixApi> Clone for Store<A> {
    fn clone(&self) -> Self {
        Store {
            handle: Rc::clone(&self.handle),
        }
    }
}

impl<A: NixApi> Store<A> {
    pub(crate) fn new(handle: NativeHandle<A, StoreRef>) -> Self {
        Store {
            handle: Rc::new(handle),
        }
    }

    pub(crate) fn raw(&self) -> A::Store {
        self.handle.raw()
    }

    pub fn session(&self) -> &Rc<Session<A>> {
        self.handle.session()
    }

    /// The URI the store reports for itself.
    pub fn uri(&self) -> Result<String> {
        let mut buf = [0u8; URI_BUFFER_LEN];
        self.session()
            .status(|api, ctx| api.nix_store_get_uri(ctx, self.raw(), &mut buf))?;
        read_c_buffer(&buf, "store URI")
    }

    /// Version of the store implementation.
    pub fn version(&self) -> Result<String> {
        let mut buf = [0u8; VERSION_BUFFER_LEN];
        self.session()
            .status(|api, ctx| api.nix_store_get_version(ctx, self.raw(), &mut buf))?;
        read_c_buffer(&buf, "store version")
    }

    /// Parse `path`, which must be a syntactically valid store path.
    pub fn parse_path(&self, path: &str) -> Result<StorePath<A>> {
        let c_path = CString::new(path).map_err(|_| Error::interior_nul("store path"))?;
        let raw = self
            .session()
            .call(|api, ctx| api.nix_store_parse_path(ctx, self.raw(), &c_path))?
            .ok_or_else(|| missing_handle("nix_store_parse_path"))?;
        Ok(StorePath {
            handle: NativeHandle::new(Rc::clone(self.session()), raw),
            store: self.clone(),
            path: path.to_owned(),
        })
    }

    /// Start configuring an evaluation state over this store.
    pub fn state(&self) -> StateBuilder<'_, A> {
        StateBuilder::new(self)
    }

    /// Drop this reference now. The native store is unref'd here unless a
    /// state, path or clone still holds it.
    pub fn unref(self) {
        if let Ok(handle) = Rc::try_unwrap(self.handle) {
            handle.release();
        }
    }
}

impl<A: NixApi> fmt::Debug for Store<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Store").field(&self.handle).finish()
    }
}

/// A parsed store path. Keeps its store alive.
pub struct StorePath<A: NixApi> {
    handle: NativeHandle<A, StorePathRef>,
    store: Store<A>,
    path: String,
}

impl<A: NixApi> StorePath<A> {
    /// The text this path was parsed from.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn store(&self) -> &Store<A> {
        &self.store
    }

    /// Whether the path exists in the store.
    pub fn is_valid(&self) -> Result<bool> {
        let store = self.store.raw();
        self.store
            .session()
            .call(|api, ctx| api.nix_store_is_valid_path(ctx, store, self.handle.raw()))
    }

    /// Build the path and collect `output name -> output path`.
    pub fn build(&self) -> Result<BTreeMap<String, String>> {
        let mut outputs = BTreeMap::new();
        self.build_with(|name, out| {
            outputs.insert(name.to_owned(), out.to_owned());
        })?;
        Ok(outputs)
    }

    /// Build the path, calling `on_output(name, path)` for each output as
    /// the native library reports it. The callback runs before this
    /// returns and may itself use the session.
    pub fn build_with(&self, mut on_output: impl FnMut(&str, &str)) -> Result<()> {
        let store = self.store.raw();
        let mut bad_output = None;
        let mut callback = |name: &CStr, out: &CStr| match (name.to_str(), out.to_str()) {
            (Ok(name), Ok(out)) => on_output(name, out),
            _ => {
                bad_output.get_or_insert_with(|| Error::conversion("build output", "not valid UTF-8"));
            }
        };
        self.store
            .session()
            .status(|api, ctx| api.nix_store_build(ctx, store, self.handle.raw(), &mut callback))?;
        match bad_output {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Free the native path now.
    pub fn free(self) {
        self.handle.release();
    }
}

impl<A: NixApi> fmt::Debug for StorePath<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorePath").field("path", &self.path).finish_non_exhaustive()
    }
}

/// Text up to the first NUL of a buffer filled by the native library.
fn read_c_buffer(buf: &[u8], what: &'static str) -> Result<String> {
    let text = CStr::from_bytes_until_nul(buf)
        .map_err(|_| Error::conversion(what, "not NUL-terminated"))?;
    text.to_str()
        .map(str::to_owned)
        .map_err(|_| Error::conversion(what, "not valid UTF-8"))
}

/// A native constructor reported success but returned no handle.
pub(crate) fn missing_handle(function: &str) -> Error {
    Error::Unknown {
        code: nixb_sys::NIX_ERR_UNKNOWN,
        message: format!("{function} returned no handle"),
    }
}
