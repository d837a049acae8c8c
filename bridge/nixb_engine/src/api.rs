//! `NixApi` over the engine's handle tables.

use std::cell::{Cell, RefCell};
use std::ffi::{CStr, CString};
use std::fmt;
use std::rc::Rc;

use nixb_sys::{NixApi, NixErr, ValueType, NIX_OK, NIX_TYPE_THUNK};

use crate::errors::{
    buffer_too_small, builder_consumed, index_out_of_bounds, interior_nul, invalid_handle,
    invalid_utf8, missing_attribute, no_error_message, not_forced, not_initialized,
    size_overflow, type_mismatch, uninitialized_value, NativeError, NativeResult,
};
use crate::eval::{Attrs, Evaluator, SearchPathEntry, Thunk, Val};
use crate::store::{StoreDb, STORE_VERSION};
use crate::table::Table;
use crate::{BuilderId, ContextId, ExternalId, StateId, StoreId, StorePathId, ValueId, NIX_VERSION};

struct ErrorSlot {
    code: NixErr,
    last_err: Option<String>,
}

struct ValueSlot {
    thunk: Thunk,
    refs: u32,
}

struct Builder {
    entries: Vec<(Rc<str>, Thunk)>,
    sealed: bool,
}

/// Number of live handles per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveHandles {
    pub contexts: usize,
    pub stores: usize,
    pub store_paths: usize,
    pub states: usize,
    pub values: usize,
    pub builders: usize,
}

/// The reference engine. One instance is one "loaded library".
pub struct Engine {
    contexts: RefCell<Table<ErrorSlot>>,
    stores: RefCell<Table<Rc<RefCell<StoreDb>>>>,
    paths: RefCell<Table<String>>,
    states: RefCell<Table<Rc<Evaluator>>>,
    values: RefCell<Table<ValueSlot>>,
    builders: RefCell<Table<Builder>>,
    util_ready: Cell<bool>,
    store_ready: Cell<bool>,
    expr_ready: Cell<bool>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("live", &self.live())
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine {
            contexts: RefCell::new(Table::new()),
            stores: RefCell::new(Table::new()),
            paths: RefCell::new(Table::new()),
            states: RefCell::new(Table::new()),
            values: RefCell::new(Table::new()),
            builders: RefCell::new(Table::new()),
            util_ready: Cell::new(false),
            store_ready: Cell::new(false),
            expr_ready: Cell::new(false),
        }
    }

    /// Live handle counts, for leak checks.
    pub fn live(&self) -> LiveHandles {
        LiveHandles {
            contexts: self.contexts.borrow().len(),
            stores: self.stores.borrow().len(),
            store_paths: self.paths.borrow().len(),
            states: self.states.borrow().len(),
            values: self.values.borrow().len(),
            builders: self.builders.borrow().len(),
        }
    }

    // ── Context plumbing ────────────────────────────────────────────────

    fn reset(&self, ctx: ContextId) {
        if let Some(slot) = self.contexts.borrow_mut().get_mut(ctx.0) {
            slot.code = NIX_OK;
        }
    }

    fn record(&self, ctx: ContextId, err: NativeError) {
        tracing::trace!(code = err.code, message = %err.message, "call failed");
        if let Some(slot) = self.contexts.borrow_mut().get_mut(ctx.0) {
            slot.code = err.code;
            slot.last_err = Some(err.message);
        }
    }

    /// Run a fallible call: reset `ctx`, run `f`, record its error.
    /// No table borrow is held while `f` runs.
    fn call<R>(&self, ctx: ContextId, fallback: R, f: impl FnOnce() -> NativeResult<R>) -> R {
        self.reset(ctx);
        match f() {
            Ok(result) => result,
            Err(err) => {
                self.record(ctx, err);
                fallback
            }
        }
    }

    fn status(&self, ctx: ContextId, f: impl FnOnce() -> NativeResult<()>) -> NixErr {
        self.reset(ctx);
        match f() {
            Ok(()) => NIX_OK,
            Err(err) => {
                let code = err.code;
                self.record(ctx, err);
                code
            }
        }
    }

    // ── Handle resolution ───────────────────────────────────────────────

    fn store_db(&self, store: StoreId) -> NativeResult<Rc<RefCell<StoreDb>>> {
        self.stores
            .borrow()
            .get(store.0)
            .cloned()
            .ok_or_else(|| invalid_handle("store"))
    }

    fn store_path(&self, path: StorePathId) -> NativeResult<String> {
        self.paths
            .borrow()
            .get(path.0)
            .cloned()
            .ok_or_else(|| invalid_handle("store path"))
    }

    fn evaluator(&self, state: StateId) -> NativeResult<Rc<Evaluator>> {
        self.states
            .borrow()
            .get(state.0)
            .cloned()
            .ok_or_else(|| invalid_handle("state"))
    }

    fn thunk(&self, value: ValueId) -> NativeResult<Thunk> {
        self.values
            .borrow()
            .get(value.0)
            .map(|slot| slot.thunk.clone())
            .ok_or_else(|| invalid_handle("value"))
    }

    fn new_value(&self, thunk: Thunk) -> ValueId {
        ValueId(self.values.borrow_mut().insert(ValueSlot { thunk, refs: 1 }))
    }

    /// The forced contents of a slot; getters never force.
    fn forced(&self, value: ValueId) -> NativeResult<Val> {
        let thunk = self.thunk(value)?;
        thunk.value().ok_or_else(|| {
            if thunk.is_uninit() {
                uninitialized_value()
            } else {
                not_forced()
            }
        })
    }

    fn attrs(&self, value: ValueId) -> NativeResult<Rc<Attrs>> {
        match self.forced(value)? {
            Val::Attrs(attrs) => Ok(attrs),
            other => Err(type_mismatch("a set", other.show_type())),
        }
    }

    fn set(&self, value: ValueId, contents: Val) -> NativeResult<()> {
        self.thunk(value)?.set(contents);
        Ok(())
    }
}

fn text<'a>(s: &'a CStr, what: &str) -> NativeResult<&'a str> {
    s.to_str().map_err(|_| invalid_utf8(what))
}

fn to_u32(n: usize, what: &str) -> NativeResult<u32> {
    u32::try_from(n).map_err(|_| size_overflow(what))
}

/// Copy `s` and a terminating NUL into `dest`.
fn write_c_string(dest: &mut [u8], s: &str) -> NativeResult<()> {
    let needed = s.len() + 1;
    if needed > dest.len() {
        return Err(buffer_too_small(needed, dest.len()));
    }
    dest[..s.len()].copy_from_slice(s.as_bytes());
    dest[s.len()] = 0;
    Ok(())
}

impl NixApi for Engine {
    type Context = ContextId;
    type Store = StoreId;
    type StorePath = StorePathId;
    type State = StateId;
    type Value = ValueId;
    type BindingsBuilder = BuilderId;
    type External = ExternalId;

    // ── libutil ─────────────────────────────────────────────────────────

    fn nix_version_get(&self) -> String {
        NIX_VERSION.to_owned()
    }

    fn nix_libutil_init(&self, ctx: ContextId) -> NixErr {
        self.status(ctx, || {
            self.util_ready.set(true);
            Ok(())
        })
    }

    fn nix_c_context_create(&self) -> Option<ContextId> {
        let slot = ErrorSlot {
            code: NIX_OK,
            last_err: None,
        };
        Some(ContextId(self.contexts.borrow_mut().insert(slot)))
    }

    fn nix_c_context_free(&self, ctx: ContextId) {
        self.contexts.borrow_mut().remove(ctx.0);
    }

    fn nix_err_code(&self, ctx: ContextId) -> NixErr {
        self.contexts
            .borrow()
            .get(ctx.0)
            .map_or(nixb_sys::NIX_ERR_UNKNOWN, |slot| slot.code)
    }

    fn nix_err_msg(&self, ctx: ContextId, read_ctx: ContextId, n: Option<&mut u32>) -> Option<String> {
        self.call(ctx, None, || {
            let message = self
                .contexts
                .borrow()
                .get(read_ctx.0)
                .ok_or_else(|| invalid_handle("context"))?
                .last_err
                .clone()
                .ok_or_else(no_error_message)?;
            if let Some(n) = n {
                *n = to_u32(message.len(), "error message")?;
            }
            Ok(Some(message))
        })
    }

    // ── libstore ────────────────────────────────────────────────────────

    fn nix_libstore_init(&self, ctx: ContextId) -> NixErr {
        self.status(ctx, || {
            self.store_ready.set(true);
            Ok(())
        })
    }

    fn nix_store_open(&self, ctx: ContextId, uri: &CStr, params: &[(&CStr, &CStr)]) -> Option<StoreId> {
        self.call(ctx, None, || {
            if !self.store_ready.get() {
                return Err(not_initialized("libstore"));
            }
            let uri = text(uri, "store URI")?;
            let params = params
                .iter()
                .map(|(k, v)| Ok((text(k, "store parameter")?.to_owned(), text(v, "store parameter")?.to_owned())))
                .collect::<NativeResult<Vec<_>>>()?;
            let db = StoreDb::open(uri, &params)?;
            let id = self.stores.borrow_mut().insert(Rc::new(RefCell::new(db)));
            Ok(Some(StoreId(id)))
        })
    }

    fn nix_store_unref(&self, store: StoreId) {
        self.stores.borrow_mut().remove(store.0);
    }

    fn nix_store_get_uri(&self, ctx: ContextId, store: StoreId, dest: &mut [u8]) -> NixErr {
        self.status(ctx, || {
            let uri = self.store_db(store)?.borrow().uri();
            write_c_string(dest, &uri)
        })
    }

    fn nix_store_parse_path(&self, ctx: ContextId, store: StoreId, path: &CStr) -> Option<StorePathId> {
        self.call(ctx, None, || {
            let path = text(path, "store path")?;
            let parsed = self.store_db(store)?.borrow().parse_path(path)?;
            Ok(Some(StorePathId(self.paths.borrow_mut().insert(parsed))))
        })
    }

    fn nix_store_path_free(&self, path: StorePathId) {
        self.paths.borrow_mut().remove(path.0);
    }

    fn nix_store_is_valid_path(&self, ctx: ContextId, store: StoreId, path: StorePathId) -> bool {
        self.call(ctx, false, || {
            let path = self.store_path(path)?;
            let valid = self.store_db(store)?.borrow().is_valid(&path);
            Ok(valid)
        })
    }

    fn nix_store_build(
        &self,
        ctx: ContextId,
        store: StoreId,
        path: StorePathId,
        callback: &mut dyn FnMut(&CStr, &CStr),
    ) -> NixErr {
        self.status(ctx, || {
            let path = self.store_path(path)?;
            let db = self.store_db(store)?;
            let outputs = db.borrow_mut().realise(&path)?;
            for (name, out) in outputs {
                let name = CString::new(name).map_err(|_| interior_nul("output name"))?;
                let out = CString::new(out).map_err(|_| interior_nul("output path"))?;
                callback(&name, &out);
            }
            Ok(())
        })
    }

    fn nix_store_get_version(&self, ctx: ContextId, store: StoreId, dest: &mut [u8]) -> NixErr {
        self.status(ctx, || {
            self.store_db(store)?;
            write_c_string(dest, STORE_VERSION)
        })
    }

    // ── libexpr: lifecycle and evaluation ───────────────────────────────

    fn nix_libexpr_init(&self, ctx: ContextId) -> NixErr {
        self.status(ctx, || {
            self.expr_ready.set(true);
            Ok(())
        })
    }

    fn nix_state_create(&self, ctx: ContextId, search_path: &[&CStr], store: StoreId) -> Option<StateId> {
        self.call(ctx, None, || {
            if !self.expr_ready.get() {
                return Err(not_initialized("libexpr"));
            }
            let db = self.store_db(store)?;
            let entries = search_path
                .iter()
                .map(|entry| text(entry, "search path entry").map(SearchPathEntry::parse))
                .collect::<NativeResult<Vec<_>>>()?;
            let evaluator = Rc::new(Evaluator::new(db, entries));
            Ok(Some(StateId(self.states.borrow_mut().insert(evaluator))))
        })
    }

    fn nix_state_free(&self, state: StateId) {
        self.states.borrow_mut().remove(state.0);
    }

    fn nix_alloc_value(&self, ctx: ContextId, state: StateId) -> Option<ValueId> {
        self.call(ctx, None, || {
            self.evaluator(state)?;
            Ok(Some(self.new_value(Thunk::uninit())))
        })
    }

    fn nix_expr_eval_from_string(
        &self,
        ctx: ContextId,
        state: StateId,
        expr: &CStr,
        path: &CStr,
        value: ValueId,
    ) -> NixErr {
        self.status(ctx, || {
            let evaluator = self.evaluator(state)?;
            let slot = self.thunk(value)?;
            let result = evaluator.eval_source(text(expr, "expression")?, text(path, "base path")?)?;
            slot.set(result);
            Ok(())
        })
    }

    fn nix_value_call(
        &self,
        ctx: ContextId,
        state: StateId,
        func: ValueId,
        arg: ValueId,
        value: ValueId,
    ) -> NixErr {
        self.status(ctx, || {
            let evaluator = self.evaluator(state)?;
            let func = evaluator.force(&self.thunk(func)?)?;
            let arg = self.thunk(arg)?;
            let slot = self.thunk(value)?;
            let result = evaluator.apply(&func, arg)?;
            slot.set(result);
            Ok(())
        })
    }

    fn nix_value_force(&self, ctx: ContextId, state: StateId, value: ValueId) -> NixErr {
        self.status(ctx, || {
            let evaluator = self.evaluator(state)?;
            evaluator.force(&self.thunk(value)?).map(drop)
        })
    }

    fn nix_value_force_deep(&self, ctx: ContextId, state: StateId, value: ValueId) -> NixErr {
        self.status(ctx, || {
            let evaluator = self.evaluator(state)?;
            evaluator.force_deep(&self.thunk(value)?)
        })
    }

    // ── libexpr: garbage collector ──────────────────────────────────────

    fn nix_gc_incref(&self, ctx: ContextId, value: ValueId) -> NixErr {
        self.status(ctx, || {
            let mut values = self.values.borrow_mut();
            let slot = values.get_mut(value.0).ok_or_else(|| invalid_handle("value"))?;
            slot.refs += 1;
            Ok(())
        })
    }

    fn nix_gc_decref(&self, ctx: ContextId, value: ValueId) -> NixErr {
        self.status(ctx, || {
            let removed = {
                let mut values = self.values.borrow_mut();
                let slot = values.get_mut(value.0).ok_or_else(|| invalid_handle("value"))?;
                slot.refs -= 1;
                if slot.refs == 0 {
                    values.remove(value.0)
                } else {
                    None
                }
            };
            // Dropping the thunk may drop other thunks; do it outside the borrow.
            drop(removed);
            Ok(())
        })
    }

    fn nix_gc_now(&self) {
        tracing::debug!(live = ?self.live(), "gc requested");
    }

    // ── libexpr: reading values ─────────────────────────────────────────

    fn nix_get_type(&self, ctx: ContextId, value: ValueId) -> ValueType {
        self.call(ctx, NIX_TYPE_THUNK, || {
            let thunk = self.thunk(value)?;
            Ok(thunk.value().map_or(NIX_TYPE_THUNK, |v| v.type_tag()))
        })
    }

    fn nix_get_typename(&self, ctx: ContextId, value: ValueId) -> Option<String> {
        self.call(ctx, None, || {
            let thunk = self.thunk(value)?;
            Ok(Some(
                thunk.value().map_or("a thunk", |v| v.show_type()).to_owned(),
            ))
        })
    }

    fn nix_get_bool(&self, ctx: ContextId, value: ValueId) -> bool {
        self.call(ctx, false, || match self.forced(value)? {
            Val::Bool(b) => Ok(b),
            other => Err(type_mismatch("a Boolean", other.show_type())),
        })
    }

    fn nix_get_string(&self, ctx: ContextId, value: ValueId) -> Option<String> {
        self.call(ctx, None, || match self.forced(value)? {
            Val::Str(s) => Ok(Some(s.to_string())),
            other => Err(type_mismatch("a string", other.show_type())),
        })
    }

    fn nix_get_path_string(&self, ctx: ContextId, value: ValueId) -> Option<String> {
        self.call(ctx, None, || match self.forced(value)? {
            Val::Path(p) => Ok(Some(p.to_string())),
            other => Err(type_mismatch("a path", other.show_type())),
        })
    }

    fn nix_get_list_size(&self, ctx: ContextId, value: ValueId) -> u32 {
        self.call(ctx, 0, || match self.forced(value)? {
            Val::List(items) => to_u32(items.len(), "list size"),
            other => Err(type_mismatch("a list", other.show_type())),
        })
    }

    fn nix_get_attrs_size(&self, ctx: ContextId, value: ValueId) -> u32 {
        self.call(ctx, 0, || to_u32(self.attrs(value)?.len(), "attribute count"))
    }

    fn nix_get_float(&self, ctx: ContextId, value: ValueId) -> f64 {
        self.call(ctx, 0.0, || match self.forced(value)? {
            Val::Float(f) => Ok(f),
            other => Err(type_mismatch("a float", other.show_type())),
        })
    }

    fn nix_get_int(&self, ctx: ContextId, value: ValueId) -> i64 {
        self.call(ctx, 0, || match self.forced(value)? {
            Val::Int(n) => Ok(n),
            other => Err(type_mismatch("an integer", other.show_type())),
        })
    }

    fn nix_get_external(&self, ctx: ContextId, value: ValueId) -> Option<ExternalId> {
        self.call(ctx, None, || match self.forced(value)? {
            Val::External(id) => Ok(Some(id)),
            other => Err(type_mismatch("an external value", other.show_type())),
        })
    }

    fn nix_get_list_byidx(&self, ctx: ContextId, value: ValueId, state: StateId, ix: u32) -> Option<ValueId> {
        self.call(ctx, None, || {
            self.evaluator(state)?;
            let items = match self.forced(value)? {
                Val::List(items) => items,
                other => return Err(type_mismatch("a list", other.show_type())),
            };
            let item = items
                .get(ix as usize)
                .ok_or_else(|| index_out_of_bounds(i64::from(ix), items.len()))?;
            Ok(Some(self.new_value(item.clone())))
        })
    }

    fn nix_get_attr_byname(
        &self,
        ctx: ContextId,
        value: ValueId,
        state: StateId,
        name: &CStr,
    ) -> Option<ValueId> {
        self.call(ctx, None, || {
            self.evaluator(state)?;
            let name = text(name, "attribute name")?;
            let attrs = self.attrs(value)?;
            let found = attrs.get(name).ok_or_else(|| missing_attribute(name))?;
            Ok(Some(self.new_value(found.clone())))
        })
    }

    fn nix_has_attr_byname(&self, ctx: ContextId, value: ValueId, state: StateId, name: &CStr) -> bool {
        self.call(ctx, false, || {
            self.evaluator(state)?;
            let name = text(name, "attribute name")?;
            Ok(self.attrs(value)?.contains_key(name))
        })
    }

    fn nix_get_attr_byidx(
        &self,
        ctx: ContextId,
        value: ValueId,
        state: StateId,
        i: u32,
        name: &mut Option<String>,
    ) -> Option<ValueId> {
        self.call(ctx, None, || {
            self.evaluator(state)?;
            let attrs = self.attrs(value)?;
            let (key, found) = attrs
                .iter()
                .nth(i as usize)
                .ok_or_else(|| index_out_of_bounds(i64::from(i), attrs.len()))?;
            *name = Some(key.to_string());
            Ok(Some(self.new_value(found.clone())))
        })
    }

    // ── libexpr: writing values ─────────────────────────────────────────

    fn nix_set_bool(&self, ctx: ContextId, value: ValueId, b: bool) -> NixErr {
        self.status(ctx, || self.set(value, Val::Bool(b)))
    }

    fn nix_set_string(&self, ctx: ContextId, value: ValueId, s: &CStr) -> NixErr {
        self.status(ctx, || self.set(value, Val::str(text(s, "string")?)))
    }

    fn nix_set_path_string(&self, ctx: ContextId, value: ValueId, s: &CStr) -> NixErr {
        self.status(ctx, || self.set(value, Val::Path(Rc::from(text(s, "path")?))))
    }

    fn nix_set_float(&self, ctx: ContextId, value: ValueId, d: f64) -> NixErr {
        self.status(ctx, || self.set(value, Val::Float(d)))
    }

    fn nix_set_int(&self, ctx: ContextId, value: ValueId, i: i64) -> NixErr {
        self.status(ctx, || self.set(value, Val::Int(i)))
    }

    fn nix_set_null(&self, ctx: ContextId, value: ValueId) -> NixErr {
        self.status(ctx, || self.set(value, Val::Null))
    }

    fn nix_set_external(&self, ctx: ContextId, value: ValueId, val: ExternalId) -> NixErr {
        self.status(ctx, || self.set(value, Val::External(val)))
    }

    fn nix_make_list(&self, ctx: ContextId, state: StateId, value: ValueId, size: u32) -> NixErr {
        self.status(ctx, || {
            self.evaluator(state)?;
            let items = (0..size).map(|_| Thunk::uninit()).collect();
            self.set(value, Val::List(Rc::new(items)))
        })
    }

    fn nix_set_list_byidx(&self, ctx: ContextId, value: ValueId, ix: u32, elem: ValueId) -> NixErr {
        self.status(ctx, || {
            let list = self.thunk(value)?;
            let elem = self.thunk(elem)?;
            list.set_list_item(ix as usize, elem).map_err(|len| match len {
                Some(len) => index_out_of_bounds(i64::from(ix), len),
                None => type_mismatch("a list", list.value().map_or("a thunk", |v| v.show_type())),
            })
        })
    }

    fn nix_make_attrs(&self, ctx: ContextId, value: ValueId, b: BuilderId) -> NixErr {
        self.status(ctx, || {
            let entries = {
                let mut builders = self.builders.borrow_mut();
                let builder = builders.get_mut(b.0).ok_or_else(|| invalid_handle("bindings builder"))?;
                if builder.sealed {
                    return Err(builder_consumed());
                }
                builder.sealed = true;
                std::mem::take(&mut builder.entries)
            };
            let mut attrs = Attrs::new();
            for (name, thunk) in entries {
                // Later inserts of a name win.
                attrs.insert(name, thunk);
            }
            self.set(value, Val::Attrs(Rc::new(attrs)))
        })
    }

    fn nix_copy_value(&self, ctx: ContextId, value: ValueId, source: ValueId) -> NixErr {
        self.status(ctx, || {
            let target = self.thunk(value)?;
            let source = self.thunk(source)?;
            target.copy_from(&source);
            Ok(())
        })
    }

    // ── libexpr: bindings builder ───────────────────────────────────────

    fn nix_make_bindings_builder(&self, ctx: ContextId, state: StateId, capacity: u32) -> Option<BuilderId> {
        self.call(ctx, None, || {
            self.evaluator(state)?;
            let builder = Builder {
                entries: Vec::with_capacity(capacity as usize),
                sealed: false,
            };
            Ok(Some(BuilderId(self.builders.borrow_mut().insert(builder))))
        })
    }

    fn nix_bindings_builder_insert(&self, ctx: ContextId, builder: BuilderId, name: &CStr, value: ValueId) -> NixErr {
        self.status(ctx, || {
            let name: Rc<str> = Rc::from(text(name, "attribute name")?);
            let value = self.thunk(value)?;
            let mut builders = self.builders.borrow_mut();
            let builder = builders
                .get_mut(builder.0)
                .ok_or_else(|| invalid_handle("bindings builder"))?;
            if builder.sealed {
                return Err(builder_consumed());
            }
            builder.entries.push((name, value));
            Ok(())
        })
    }

    fn nix_bindings_builder_free(&self, builder: BuilderId) {
        self.builders.borrow_mut().remove(builder.0);
    }
}
