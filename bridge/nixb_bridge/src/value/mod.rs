//! Evaluator values.
//!
//! A [`Value`] is a handle to one evaluator value slot. Reading it goes
//! through [`ValueKind`] dispatch: `kind()` forces the value, then maps the
//! native type tag. Containers are read shallowly by [`Value::get`] (their
//! children come back as handles) or fully by [`Value::get_deep`].
//!
//! Attribute sets and lists are accessed explicitly through
//! [`Value::lookup`], [`Value::has_attr`], [`Value::keys`] and
//! [`Value::len`]. A missing attribute is `Ok(None)`, which is distinct
//! from a present attribute whose value is `null`.

mod convert;
mod host;
mod key;
mod kind;

#[cfg(test)]
mod tests;

use std::cell::Cell;
use std::ffi::CString;
use std::fmt;
use std::rc::Rc;

use nixb_sys::NixApi;

pub use host::{External, Function, Host};
pub use key::{Key, Keys};
pub use kind::ValueKind;

use crate::bindings::BindingsBuilder;
use crate::error::{Error, Result};
use crate::handle::{NativeHandle, ValueRef};
use crate::state::State;
use crate::store::missing_handle;
use key::index_of;

/// A handle to one evaluator value. Clones share the handle; the native
/// reference is dropped with the last clone.
pub struct Value<A: NixApi>(Rc<ValueInner<A>>);

// Field order matters: the value is released before its state.
struct ValueInner<A: NixApi> {
    handle: NativeHandle<A, ValueRef>,
    state: State<A>,
    forced: Cell<bool>,
}

impl<A: NixApi> Clone for Value<A> {
    fn clone(&self) -> Self {
        Value(Rc::clone(&self.0))
    }
}

impl<A: NixApi> Value<A> {
    pub(crate) fn from_raw(state: State<A>, raw: A::Value, forced: bool) -> Self {
        Value(Rc::new(ValueInner {
            handle: NativeHandle::new(Rc::clone(state.session()), raw),
            state,
            forced: Cell::new(forced),
        }))
    }

    pub(crate) fn raw(&self) -> A::Value {
        self.0.handle.raw()
    }

    pub fn state(&self) -> &State<A> {
        &self.0.state
    }

    /// Whether this handle has been forced. Only cleared when `set` copies
    /// an unforced value into the slot.
    pub fn is_forced(&self) -> bool {
        self.0.forced.get()
    }

    pub(crate) fn same_handle(&self, other: &Value<A>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn mark_forced(&self) {
        self.0.forced.set(true);
    }

    /// Evaluate to weak head normal form. A no-op on a forced value.
    pub fn force(&self) -> Result<()> {
        if self.is_forced() {
            return Ok(());
        }
        let state = self.state();
        state
            .session()
            .status(|api, ctx| api.nix_value_force(ctx, state.raw(), self.raw()))?;
        self.mark_forced();
        Ok(())
    }

    /// Evaluate recursively, including every list element and attribute.
    pub fn force_deep(&self) -> Result<()> {
        let state = self.state();
        state
            .session()
            .status(|api, ctx| api.nix_value_force_deep(ctx, state.raw(), self.raw()))?;
        self.mark_forced();
        Ok(())
    }

    /// Force, then classify.
    pub fn kind(&self) -> Result<ValueKind> {
        self.force()?;
        let tag = self
            .state()
            .session()
            .call(|api, ctx| api.nix_get_type(ctx, self.raw()))?;
        ValueKind::from_tag(tag).ok_or(Error::UnknownType(tag))
    }

    /// Force, then test the kind against `kinds`.
    pub fn is_kind(&self, kinds: &[ValueKind]) -> Result<bool> {
        let kind = self.kind()?;
        Ok(kinds.contains(&kind))
    }

    /// The evaluator's own name for the type, as used in its messages.
    pub fn type_name(&self) -> Result<String> {
        self.force()?;
        self.state()
            .session()
            .call(|api, ctx| api.nix_get_typename(ctx, self.raw()))?
            .ok_or_else(|| missing_handle("nix_get_typename"))
    }

    /// Look up a list element or an attribute. The result is forced.
    ///
    /// Lists take integer keys in `0..len`. Sets return `None` for a missing
    /// name. Any other kind is a type error.
    pub fn lookup(&self, key: impl Into<Key>) -> Result<Option<Value<A>>> {
        let key = key.into();
        let state = self.state();
        match self.kind()? {
            ValueKind::List => {
                let index = index_of(&key)?;
                let len = self.len()?;
                let ix = checked_index(index, len)?;
                let raw = state
                    .session()
                    .call(|api, ctx| api.nix_get_list_byidx(ctx, self.raw(), state.raw(), ix))?
                    .ok_or_else(|| missing_handle("nix_get_list_byidx"))?;
                let item = Value::from_raw(state.clone(), raw, false);
                item.force()?;
                Ok(Some(item))
            }
            ValueKind::Attrs => {
                let name = attr_name(&key)?;
                if !self.has_native_attr(&name)? {
                    return Ok(None);
                }
                let raw = state
                    .session()
                    .call(|api, ctx| api.nix_get_attr_byname(ctx, self.raw(), state.raw(), &name))?
                    .ok_or_else(|| missing_handle("nix_get_attr_byname"))?;
                let item = Value::from_raw(state.clone(), raw, false);
                item.force()?;
                Ok(Some(item))
            }
            kind => Err(Error::Type {
                operation: "lookup",
                kind,
            }),
        }
    }

    /// Whether `key` is a valid list index or a present attribute. False for
    /// every other kind.
    pub fn has_attr(&self, key: impl Into<Key>) -> Result<bool> {
        let key = key.into();
        match self.kind()? {
            ValueKind::List => {
                let len = self.len()?;
                Ok(key
                    .as_index()
                    .is_some_and(|index| checked_index(index, len).is_ok()))
            }
            ValueKind::Attrs => self.has_native_attr(&attr_name(&key)?),
            _ => Ok(false),
        }
    }

    fn has_native_attr(&self, name: &CString) -> Result<bool> {
        let state = self.state();
        state
            .session()
            .call(|api, ctx| api.nix_has_attr_byname(ctx, self.raw(), state.raw(), name))
    }

    /// Keys of a list (`0..len`) or an attribute set (names in the set's
    /// order).
    pub fn keys(&self) -> Result<Keys<A>> {
        match self.kind()? {
            ValueKind::List => Ok(Keys::Indices(0..self.len()?)),
            ValueKind::Attrs => {
                let size = self
                    .state()
                    .session()
                    .call(|api, ctx| api.nix_get_attrs_size(ctx, self.raw()))?;
                Ok(Keys::Names {
                    value: self.clone(),
                    next: 0,
                    size,
                })
            }
            kind => Err(Error::Type {
                operation: "keys",
                kind,
            }),
        }
    }

    /// Number of list elements or attributes.
    pub fn len(&self) -> Result<usize> {
        let session = self.state().session();
        let size = match self.kind()? {
            ValueKind::List => session.call(|api, ctx| api.nix_get_list_size(ctx, self.raw()))?,
            ValueKind::Attrs => session.call(|api, ctx| api.nix_get_attrs_size(ctx, self.raw()))?,
            kind => {
                return Err(Error::Type {
                    operation: "len",
                    kind,
                })
            }
        };
        usize::try_from(size).map_err(|_| Error::conversion("size", "does not fit in usize"))
    }

    /// Whether a list or set has no entries.
    pub fn is_empty(&self) -> Result<bool> {
        self.len().map(|len| len == 0)
    }

    /// Attribute at position `index`, unforced.
    pub(crate) fn attr_at(&self, index: u32) -> Result<(String, Value<A>)> {
        let state = self.state();
        let mut name = None;
        let raw = state
            .session()
            .call(|api, ctx| api.nix_get_attr_byidx(ctx, self.raw(), state.raw(), index, &mut name))?
            .ok_or_else(|| missing_handle("nix_get_attr_byidx"))?;
        let value = Value::from_raw(state.clone(), raw, false);
        let name = name.ok_or_else(|| missing_handle("nix_get_attr_byidx"))?;
        Ok((name, value))
    }

    /// Apply this function (or functor set) to `arg` and force the result.
    pub fn call(&self, arg: impl Into<Host<A>>) -> Result<Value<A>> {
        let kind = self.kind()?;
        if !matches!(kind, ValueKind::Function | ValueKind::Attrs) {
            return Err(Error::Type {
                operation: "call",
                kind,
            });
        }
        let state = self.state();
        let arg = match arg.into() {
            Host::Value(value) | Host::Function(Function(value)) => value,
            other => state.make_value(other)?,
        };
        let result = state.alloc_value()?;
        state.session().status(|api, ctx| {
            api.nix_value_call(ctx, state.raw(), self.raw(), arg.raw(), result.raw())
        })?;
        result.force()?;
        Ok(result)
    }

    /// Apply a curried function to each argument in turn. With no
    /// arguments, the function itself.
    pub fn call_many<I>(&self, args: I) -> Result<Value<A>>
    where
        I: IntoIterator,
        I::Item: Into<Host<A>>,
    {
        args.into_iter()
            .try_fold(self.clone(), |func, arg| func.call(arg))
    }

    /// Turn `self` into an attribute set holding the builder's entries.
    pub fn make_attrs(&self, builder: BindingsBuilder<A>) -> Result<()> {
        self.state()
            .session()
            .status(|api, ctx| api.nix_make_attrs(ctx, self.raw(), builder.raw()))?;
        self.mark_forced();
        Ok(())
    }
}

impl<A: NixApi> fmt::Debug for Value<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("handle", &self.0.handle)
            .field("forced", &self.is_forced())
            .finish()
    }
}

fn checked_index(index: i64, len: usize) -> Result<u32> {
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or(Error::Range { index, len })
}

fn attr_name(key: &Key) -> Result<CString> {
    CString::new(key.to_name()).map_err(|_| Error::interior_nul("attribute name"))
}
