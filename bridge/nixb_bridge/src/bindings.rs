//! Staging area for new attribute sets.

use std::ffi::CString;
use std::fmt;
use std::rc::Rc;

use nixb_sys::NixApi;

use crate::error::{Error, Result};
use crate::handle::{BuilderRef, NativeHandle};
use crate::state::State;
use crate::store::missing_handle;
use crate::value::Value;

/// Pre-sized, write-once builder for an attribute set. Turned into a value
/// by [`Value::make_attrs`], which consumes it.
pub struct BindingsBuilder<A: NixApi> {
    handle: NativeHandle<A, BuilderRef>,
    state: State<A>,
}

impl<A: NixApi> BindingsBuilder<A> {
    pub fn new(state: &State<A>, capacity: usize) -> Result<Self> {
        let capacity = u32::try_from(capacity)
            .map_err(|_| Error::conversion("attribute set", "more than 2^32 attributes"))?;
        let raw = state
            .session()
            .call(|api, ctx| api.nix_make_bindings_builder(ctx, state.raw(), capacity))?
            .ok_or_else(|| missing_handle("nix_make_bindings_builder"))?;
        Ok(BindingsBuilder {
            handle: NativeHandle::new(Rc::clone(state.session()), raw),
            state: state.clone(),
        })
    }

    /// Stage `name = value`. A later insert of the same name wins.
    pub fn insert(&mut self, name: &str, value: &Value<A>) -> Result<()> {
        let c_name = CString::new(name).map_err(|_| Error::interior_nul("attribute name"))?;
        let raw = self.handle.raw();
        self.state
            .session()
            .status(|api, ctx| api.nix_bindings_builder_insert(ctx, raw, &c_name, value.raw()))
    }

    pub(crate) fn raw(&self) -> A::BindingsBuilder {
        self.handle.raw()
    }
}

impl<A: NixApi> fmt::Debug for BindingsBuilder<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BindingsBuilder").field(&self.handle).finish()
    }
}
