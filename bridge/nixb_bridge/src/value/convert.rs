//! Reading values into [`Host`] data and writing host data into values.

use std::collections::BTreeMap;
use std::ffi::CString;

use nixb_sys::NixApi;

use super::{External, Function, Host, Key, Value, ValueKind};
use crate::bindings::BindingsBuilder;
use crate::error::{Error, Result};
use crate::store::missing_handle;

impl<A: NixApi> Value<A> {
    /// Read one level. Children of lists and sets come back as forced
    /// `Host::Value` handles.
    pub fn get(&self) -> Result<Host<A>> {
        let session = self.state().session();
        let raw = self.raw();
        let host = match self.kind()? {
            ValueKind::Thunk => return Err(Error::UnforcedThunk),
            ValueKind::Int => Host::Int(session.call(|api, ctx| api.nix_get_int(ctx, raw))?),
            ValueKind::Float => Host::Float(session.call(|api, ctx| api.nix_get_float(ctx, raw))?),
            ValueKind::Bool => Host::Bool(session.call(|api, ctx| api.nix_get_bool(ctx, raw))?),
            ValueKind::Null => Host::Null,
            ValueKind::String => Host::String(
                session
                    .call(|api, ctx| api.nix_get_string(ctx, raw))?
                    .ok_or_else(|| missing_handle("nix_get_string"))?,
            ),
            ValueKind::Path => Host::Path(
                session
                    .call(|api, ctx| api.nix_get_path_string(ctx, raw))?
                    .ok_or_else(|| missing_handle("nix_get_path_string"))?,
            ),
            ValueKind::List => {
                let len = self.len()?;
                let mut items = Vec::with_capacity(len);
                for index in 0..len {
                    if let Some(item) = self.lookup(Key::from(index))? {
                        items.push(Host::Value(item));
                    }
                }
                Host::List(items)
            }
            ValueKind::Attrs => {
                let mut attrs = BTreeMap::new();
                for key in self.keys()? {
                    let name = key?.to_name();
                    if let Some(item) = self.lookup(name.as_str())? {
                        attrs.insert(name, Host::Value(item));
                    }
                }
                Host::Attrs(attrs)
            }
            ValueKind::Function => Host::Function(Function(self.clone())),
            ValueKind::External => Host::External(External::from_raw(
                session
                    .call(|api, ctx| api.nix_get_external(ctx, raw))?
                    .ok_or_else(|| missing_handle("nix_get_external"))?,
            )),
        };
        Ok(host)
    }

    /// Read everything reachable through lists and sets. Functions and
    /// externals stay handles.
    pub fn get_deep(&self) -> Result<Host<A>> {
        match self.get()? {
            Host::List(items) => items
                .into_iter()
                .map(deep)
                .collect::<Result<_>>()
                .map(Host::List),
            Host::Attrs(attrs) => attrs
                .into_iter()
                .map(|(name, item)| Ok((name, deep(item)?)))
                .collect::<Result<_>>()
                .map(Host::Attrs),
            scalar => Ok(scalar),
        }
    }

    /// Overwrite this slot with `host`. The slot counts as forced afterwards.
    ///
    /// `Value` and `Function` hosts are copied by reference to their
    /// content: the slot aliases the source, and is forced exactly when the
    /// source is.
    pub fn set(&self, host: &Host<A>) -> Result<()> {
        let state = self.state();
        let session = state.session();
        let raw = self.raw();
        match host {
            Host::Value(source) | Host::Function(Function(source)) => {
                session.status(|api, ctx| api.nix_copy_value(ctx, raw, source.raw()))?;
                self.0.forced.set(source.is_forced());
                return Ok(());
            }
            Host::Null => session.status(|api, ctx| api.nix_set_null(ctx, raw))?,
            Host::Bool(b) => session.status(|api, ctx| api.nix_set_bool(ctx, raw, *b))?,
            Host::Int(n) => session.status(|api, ctx| api.nix_set_int(ctx, raw, *n))?,
            Host::BigInt(n) => {
                let n = i64::try_from(n)
                    .map_err(|_| Error::conversion("integer", format!("{n} does not fit in 64 bits")))?;
                session.status(|api, ctx| api.nix_set_int(ctx, raw, n))?;
            }
            Host::Float(x) => session.status(|api, ctx| api.nix_set_float(ctx, raw, *x))?,
            Host::String(s) => {
                let s = CString::new(s.as_str()).map_err(|_| Error::interior_nul("string"))?;
                session.status(|api, ctx| api.nix_set_string(ctx, raw, &s))?;
            }
            Host::Path(p) => {
                let p = CString::new(p.as_str()).map_err(|_| Error::interior_nul("path"))?;
                session.status(|api, ctx| api.nix_set_path_string(ctx, raw, &p))?;
            }
            Host::External(ext) => {
                session.status(|api, ctx| api.nix_set_external(ctx, raw, ext.raw()))?;
            }
            Host::List(items) => {
                let size = u32::try_from(items.len())
                    .map_err(|_| Error::conversion("list", "more than 2^32 elements"))?;
                session.status(|api, ctx| api.nix_make_list(ctx, state.raw(), raw, size))?;
                for (ix, item) in (0..size).zip(items) {
                    let elem = state.alloc_value()?;
                    elem.set(item)?;
                    session.status(|api, ctx| api.nix_set_list_byidx(ctx, raw, ix, elem.raw()))?;
                }
            }
            Host::Attrs(attrs) => {
                let mut builder = BindingsBuilder::new(state, attrs.len())?;
                for (name, item) in attrs {
                    let elem = state.alloc_value()?;
                    elem.set(item)?;
                    builder.insert(name, &elem)?;
                }
                return self.make_attrs(builder);
            }
        }
        self.mark_forced();
        Ok(())
    }
}

fn deep<A: NixApi>(host: Host<A>) -> Result<Host<A>> {
    match host {
        Host::Value(value) => value.get_deep(),
        other => Ok(other),
    }
}
