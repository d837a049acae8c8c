//! `extern "C"` declarations for the Nix C API and the [`NativeLib`] backend.
//!
//! The declarations reproduce the C signatures exactly (function names,
//! parameter order and kinds). [`NativeLib`] adapts them to [`NixApi`]:
//! `&CStr` arguments become `const char *`, out-buffers become
//! pointer/length pairs, and the build callback is bridged through a
//! trampoline that receives the Rust closure as `userdata`.
//!
//! # Safety
//!
//! Handles passed to `NativeLib` methods must have been produced by the same
//! library and must not have been released. The bridge guarantees this by
//! owning every handle in exactly one wrapper.

#![allow(
    non_camel_case_types,
    reason = "opaque types keep their C names so the table reads like the headers"
)]

use std::ffi::{c_void, CStr};
use std::os::raw::{c_char, c_uint};
use std::ptr::{self, NonNull};

use crate::{NixApi, NixErr, ValueType};

// ── Opaque types ────────────────────────────────────────────────────────

macro_rules! opaque {
    ($($name:ident),* $(,)?) => {
        $(
            #[repr(C)]
            pub struct $name {
                _private: [u8; 0],
            }
        )*
    };
}

opaque!(
    nix_c_context,
    Store,
    StorePath,
    EvalState,
    nix_value,
    BindingsBuilder,
    ExternalValue,
    PrimOp,
);

/// Output callback of `nix_store_build`.
pub type BuildCallback =
    Option<unsafe extern "C" fn(userdata: *mut c_void, outname: *const c_char, out: *const c_char)>;

/// Finalizer callback of `nix_gc_register_finalizer`.
pub type GcFinalizer = Option<unsafe extern "C" fn(obj: *mut c_void, cd: *mut c_void)>;

// ── libnixutil ──────────────────────────────────────────────────────────

#[link(name = "nixutilc")]
extern "C" {
    pub fn nix_version_get() -> *const c_char;
    pub fn nix_libutil_init(context: *mut nix_c_context) -> NixErr;
    pub fn nix_c_context_create() -> *mut nix_c_context;
    pub fn nix_c_context_free(context: *mut nix_c_context);
    pub fn nix_err_code(read_context: *const nix_c_context) -> NixErr;
    pub fn nix_err_msg(
        context: *mut nix_c_context,
        read_context: *const nix_c_context,
        n: *mut c_uint,
    ) -> *const c_char;
}

// ── libnixstore ─────────────────────────────────────────────────────────

#[link(name = "nixstorec")]
extern "C" {
    pub fn nix_libstore_init(context: *mut nix_c_context) -> NixErr;
    pub fn nix_store_open(
        context: *mut nix_c_context,
        uri: *const c_char,
        params: *mut *mut *const c_char,
    ) -> *mut Store;
    pub fn nix_store_unref(store: *mut Store);
    pub fn nix_store_get_uri(
        context: *mut nix_c_context,
        store: *mut Store,
        dest: *mut c_char,
        n: c_uint,
    ) -> NixErr;
    pub fn nix_store_parse_path(
        context: *mut nix_c_context,
        store: *mut Store,
        path: *const c_char,
    ) -> *mut StorePath;
    pub fn nix_store_path_free(p: *mut StorePath);
    pub fn nix_store_is_valid_path(
        context: *mut nix_c_context,
        store: *mut Store,
        path: *mut StorePath,
    ) -> bool;
    pub fn nix_store_build(
        context: *mut nix_c_context,
        store: *mut Store,
        path: *mut StorePath,
        userdata: *mut c_void,
        callback: BuildCallback,
    ) -> NixErr;
    pub fn nix_store_get_version(
        context: *mut nix_c_context,
        store: *mut Store,
        dest: *mut c_char,
        n: c_uint,
    ) -> NixErr;
}

// ── libnixexpr ──────────────────────────────────────────────────────────

#[link(name = "nixexprc")]
extern "C" {
    pub fn nix_libexpr_init(context: *mut nix_c_context) -> NixErr;
    pub fn nix_state_create(
        context: *mut nix_c_context,
        search_path: *mut *const c_char,
        store: *mut Store,
    ) -> *mut EvalState;
    pub fn nix_state_free(state: *mut EvalState);
    pub fn nix_alloc_value(context: *mut nix_c_context, state: *mut EvalState) -> *mut nix_value;
    pub fn nix_expr_eval_from_string(
        context: *mut nix_c_context,
        state: *mut EvalState,
        expr: *const c_char,
        path: *const c_char,
        value: *mut nix_value,
    ) -> NixErr;
    pub fn nix_value_call(
        context: *mut nix_c_context,
        state: *mut EvalState,
        func: *mut nix_value,
        arg: *mut nix_value,
        value: *mut nix_value,
    ) -> NixErr;
    pub fn nix_value_force(
        context: *mut nix_c_context,
        state: *mut EvalState,
        value: *mut nix_value,
    ) -> NixErr;
    pub fn nix_value_force_deep(
        context: *mut nix_c_context,
        state: *mut EvalState,
        value: *mut nix_value,
    ) -> NixErr;
    pub fn nix_gc_incref(context: *mut nix_c_context, object: *const c_void) -> NixErr;
    pub fn nix_gc_decref(context: *mut nix_c_context, object: *const c_void) -> NixErr;
    pub fn nix_gc_now();
    pub fn nix_gc_register_finalizer(obj: *mut c_void, cd: *mut c_void, finalizer: GcFinalizer);
    pub fn nix_get_type(context: *mut nix_c_context, value: *const nix_value) -> ValueType;
    pub fn nix_get_typename(context: *mut nix_c_context, value: *const nix_value) -> *const c_char;
    pub fn nix_get_bool(context: *mut nix_c_context, value: *const nix_value) -> bool;
    pub fn nix_get_string(context: *mut nix_c_context, value: *const nix_value) -> *const c_char;
    pub fn nix_get_path_string(
        context: *mut nix_c_context,
        value: *const nix_value,
    ) -> *const c_char;
    pub fn nix_get_list_size(context: *mut nix_c_context, value: *const nix_value) -> c_uint;
    pub fn nix_get_attrs_size(context: *mut nix_c_context, value: *const nix_value) -> c_uint;
    pub fn nix_get_float(context: *mut nix_c_context, value: *const nix_value) -> f64;
    pub fn nix_get_int(context: *mut nix_c_context, value: *const nix_value) -> i64;
    pub fn nix_get_external(
        context: *mut nix_c_context,
        value: *mut nix_value,
    ) -> *mut ExternalValue;
    pub fn nix_get_list_byidx(
        context: *mut nix_c_context,
        value: *const nix_value,
        state: *mut EvalState,
        ix: c_uint,
    ) -> *mut nix_value;
    pub fn nix_get_attr_byname(
        context: *mut nix_c_context,
        value: *const nix_value,
        state: *mut EvalState,
        name: *const c_char,
    ) -> *mut nix_value;
    pub fn nix_has_attr_byname(
        context: *mut nix_c_context,
        value: *const nix_value,
        state: *mut EvalState,
        name: *const c_char,
    ) -> bool;
    pub fn nix_get_attr_byidx(
        context: *mut nix_c_context,
        value: *const nix_value,
        state: *mut EvalState,
        i: c_uint,
        name: *mut *const c_char,
    ) -> *mut nix_value;
    pub fn nix_set_bool(context: *mut nix_c_context, value: *mut nix_value, b: bool) -> NixErr;
    pub fn nix_set_string(
        context: *mut nix_c_context,
        value: *mut nix_value,
        s: *const c_char,
    ) -> NixErr;
    pub fn nix_set_path_string(
        context: *mut nix_c_context,
        value: *mut nix_value,
        s: *const c_char,
    ) -> NixErr;
    pub fn nix_set_float(context: *mut nix_c_context, value: *mut nix_value, d: f64) -> NixErr;
    pub fn nix_set_int(context: *mut nix_c_context, value: *mut nix_value, i: i64) -> NixErr;
    pub fn nix_set_null(context: *mut nix_c_context, value: *mut nix_value) -> NixErr;
    pub fn nix_set_external(
        context: *mut nix_c_context,
        value: *mut nix_value,
        val: *mut ExternalValue,
    ) -> NixErr;
    pub fn nix_make_list(
        context: *mut nix_c_context,
        state: *mut EvalState,
        value: *mut nix_value,
        size: c_uint,
    ) -> NixErr;
    pub fn nix_set_list_byidx(
        context: *mut nix_c_context,
        value: *mut nix_value,
        ix: c_uint,
        elem: *mut nix_value,
    ) -> NixErr;
    pub fn nix_make_attrs(
        context: *mut nix_c_context,
        value: *mut nix_value,
        b: *mut BindingsBuilder,
    ) -> NixErr;
    pub fn nix_set_primop(
        context: *mut nix_c_context,
        value: *mut nix_value,
        op: *mut PrimOp,
    ) -> NixErr;
    pub fn nix_copy_value(
        context: *mut nix_c_context,
        value: *mut nix_value,
        source: *mut nix_value,
    ) -> NixErr;
    pub fn nix_make_bindings_builder(
        context: *mut nix_c_context,
        state: *mut EvalState,
        capacity: c_uint,
    ) -> *mut BindingsBuilder;
    pub fn nix_bindings_builder_insert(
        context: *mut nix_c_context,
        builder: *mut BindingsBuilder,
        name: *const c_char,
        value: *mut nix_value,
    ) -> NixErr;
    pub fn nix_bindings_builder_free(builder: *mut BindingsBuilder);
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Copy a library-owned C string into an owned `String`.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that stays alive
/// for the duration of this call.
unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

fn buffer_len(dest: &[u8]) -> c_uint {
    c_uint::try_from(dest.len()).unwrap_or(c_uint::MAX)
}

/// Receives each built output and forwards it to the Rust closure stored
/// behind `userdata`.
unsafe extern "C" fn build_trampoline(
    userdata: *mut c_void,
    outname: *const c_char,
    out: *const c_char,
) {
    if userdata.is_null() || outname.is_null() || out.is_null() {
        return;
    }
    // SAFETY: `nix_store_build` below passes a pointer to a live
    // `&mut dyn FnMut` that outlives the native call.
    let callback = &mut *userdata.cast::<&mut dyn FnMut(&CStr, &CStr)>();
    callback(CStr::from_ptr(outname), CStr::from_ptr(out));
}

// ── NativeLib ───────────────────────────────────────────────────────────

/// [`NixApi`] backed by the linked Nix C API libraries.
#[derive(Debug, Default)]
pub struct NativeLib {
    _private: (),
}

impl NativeLib {
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl NixApi for NativeLib {
    type Context = NonNull<nix_c_context>;
    type Store = NonNull<Store>;
    type StorePath = NonNull<StorePath>;
    type State = NonNull<EvalState>;
    type Value = NonNull<nix_value>;
    type BindingsBuilder = NonNull<BindingsBuilder>;
    type External = NonNull<ExternalValue>;

    fn nix_version_get(&self) -> String {
        // SAFETY: returns a static string owned by the library.
        unsafe { owned_string(nix_version_get()) }.unwrap_or_default()
    }

    fn nix_libutil_init(&self, ctx: Self::Context) -> NixErr {
        unsafe { nix_libutil_init(ctx.as_ptr()) }
    }

    fn nix_c_context_create(&self) -> Option<Self::Context> {
        NonNull::new(unsafe { nix_c_context_create() })
    }

    fn nix_c_context_free(&self, ctx: Self::Context) {
        unsafe { nix_c_context_free(ctx.as_ptr()) }
    }

    fn nix_err_code(&self, ctx: Self::Context) -> NixErr {
        unsafe { nix_err_code(ctx.as_ptr()) }
    }

    fn nix_err_msg(
        &self,
        ctx: Self::Context,
        read_ctx: Self::Context,
        n: Option<&mut u32>,
    ) -> Option<String> {
        let n = n.map_or(ptr::null_mut(), |n| ptr::from_mut(n));
        // SAFETY: the message is owned by `read_ctx`, copied before returning.
        unsafe { owned_string(nix_err_msg(ctx.as_ptr(), read_ctx.as_ptr(), n)) }
    }

    fn nix_libstore_init(&self, ctx: Self::Context) -> NixErr {
        unsafe { nix_libstore_init(ctx.as_ptr()) }
    }

    fn nix_store_open(
        &self,
        ctx: Self::Context,
        uri: &CStr,
        params: &[(&CStr, &CStr)],
    ) -> Option<Self::Store> {
        let mut pairs: Vec<[*const c_char; 2]> =
            params.iter().map(|(k, v)| [k.as_ptr(), v.as_ptr()]).collect();
        let mut rows: Vec<*mut *const c_char> =
            pairs.iter_mut().map(|pair| pair.as_mut_ptr()).collect();
        rows.push(ptr::null_mut());
        let params = if params.is_empty() {
            ptr::null_mut()
        } else {
            rows.as_mut_ptr()
        };
        // SAFETY: `pairs` and `rows` outlive the call; the array is
        // NULL-terminated as the header requires.
        NonNull::new(unsafe { nix_store_open(ctx.as_ptr(), uri.as_ptr(), params) })
    }

    fn nix_store_unref(&self, store: Self::Store) {
        unsafe { nix_store_unref(store.as_ptr()) }
    }

    fn nix_store_get_uri(&self, ctx: Self::Context, store: Self::Store, dest: &mut [u8]) -> NixErr {
        let n = buffer_len(dest);
        unsafe { nix_store_get_uri(ctx.as_ptr(), store.as_ptr(), dest.as_mut_ptr().cast(), n) }
    }

    fn nix_store_parse_path(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        path: &CStr,
    ) -> Option<Self::StorePath> {
        NonNull::new(unsafe { nix_store_parse_path(ctx.as_ptr(), store.as_ptr(), path.as_ptr()) })
    }

    fn nix_store_path_free(&self, path: Self::StorePath) {
        unsafe { nix_store_path_free(path.as_ptr()) }
    }

    fn nix_store_is_valid_path(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        path: Self::StorePath,
    ) -> bool {
        unsafe { nix_store_is_valid_path(ctx.as_ptr(), store.as_ptr(), path.as_ptr()) }
    }

    fn nix_store_build(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        path: Self::StorePath,
        callback: &mut dyn FnMut(&CStr, &CStr),
    ) -> NixErr {
        let mut callback = callback;
        let userdata = ptr::from_mut(&mut callback).cast::<c_void>();
        // SAFETY: `callback` lives on this stack frame until the native call
        // returns; output callbacks never fire after that.
        unsafe {
            nix_store_build(
                ctx.as_ptr(),
                store.as_ptr(),
                path.as_ptr(),
                userdata,
                Some(build_trampoline),
            )
        }
    }

    fn nix_store_get_version(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        dest: &mut [u8],
    ) -> NixErr {
        let n = buffer_len(dest);
        unsafe { nix_store_get_version(ctx.as_ptr(), store.as_ptr(), dest.as_mut_ptr().cast(), n) }
    }

    fn nix_libexpr_init(&self, ctx: Self::Context) -> NixErr {
        unsafe { nix_libexpr_init(ctx.as_ptr()) }
    }

    fn nix_state_create(
        &self,
        ctx: Self::Context,
        search_path: &[&CStr],
        store: Self::Store,
    ) -> Option<Self::State> {
        let mut entries: Vec<*const c_char> = search_path.iter().map(|s| s.as_ptr()).collect();
        entries.push(ptr::null());
        let search_path = if search_path.is_empty() {
            ptr::null_mut()
        } else {
            entries.as_mut_ptr()
        };
        NonNull::new(unsafe { nix_state_create(ctx.as_ptr(), search_path, store.as_ptr()) })
    }

    fn nix_state_free(&self, state: Self::State) {
        unsafe { nix_state_free(state.as_ptr()) }
    }

    fn nix_alloc_value(&self, ctx: Self::Context, state: Self::State) -> Option<Self::Value> {
        NonNull::new(unsafe { nix_alloc_value(ctx.as_ptr(), state.as_ptr()) })
    }

    fn nix_expr_eval_from_string(
        &self,
        ctx: Self::Context,
        state: Self::State,
        expr: &CStr,
        path: &CStr,
        value: Self::Value,
    ) -> NixErr {
        unsafe {
            nix_expr_eval_from_string(
                ctx.as_ptr(),
                state.as_ptr(),
                expr.as_ptr(),
                path.as_ptr(),
                value.as_ptr(),
            )
        }
    }

    fn nix_value_call(
        &self,
        ctx: Self::Context,
        state: Self::State,
        func: Self::Value,
        arg: Self::Value,
        value: Self::Value,
    ) -> NixErr {
        unsafe {
            nix_value_call(
                ctx.as_ptr(),
                state.as_ptr(),
                func.as_ptr(),
                arg.as_ptr(),
                value.as_ptr(),
            )
        }
    }

    fn nix_value_force(&self, ctx: Self::Context, state: Self::State, value: Self::Value) -> NixErr {
        unsafe { nix_value_force(ctx.as_ptr(), state.as_ptr(), value.as_ptr()) }
    }

    fn nix_value_force_deep(
        &self,
        ctx: Self::Context,
        state: Self::State,
        value: Self::Value,
    ) -> NixErr {
        unsafe { nix_value_force_deep(ctx.as_ptr(), state.as_ptr(), value.as_ptr()) }
    }

    fn nix_gc_incref(&self, ctx: Self::Context, value: Self::Value) -> NixErr {
        unsafe { nix_gc_incref(ctx.as_ptr(), value.as_ptr().cast_const().cast()) }
    }

    fn nix_gc_decref(&self, ctx: Self::Context, value: Self::Value) -> NixErr {
        unsafe { nix_gc_decref(ctx.as_ptr(), value.as_ptr().cast_const().cast()) }
    }

    fn nix_gc_now(&self) {
        unsafe { nix_gc_now() }
    }

    fn nix_get_type(&self, ctx: Self::Context, value: Self::Value) -> ValueType {
        unsafe { nix_get_type(ctx.as_ptr(), value.as_ptr()) }
    }

    fn nix_get_typename(&self, ctx: Self::Context, value: Self::Value) -> Option<String> {
        unsafe { owned_string(nix_get_typename(ctx.as_ptr(), value.as_ptr())) }
    }

    fn nix_get_bool(&self, ctx: Self::Context, value: Self::Value) -> bool {
        unsafe { nix_get_bool(ctx.as_ptr(), value.as_ptr()) }
    }

    fn nix_get_string(&self, ctx: Self::Context, value: Self::Value) -> Option<String> {
        unsafe { owned_string(nix_get_string(ctx.as_ptr(), value.as_ptr())) }
    }

    fn nix_get_path_string(&self, ctx: Self::Context, value: Self::Value) -> Option<String> {
        unsafe { owned_string(nix_get_path_string(ctx.as_ptr(), value.as_ptr())) }
    }

    fn nix_get_list_size(&self, ctx: Self::Context, value: Self::Value) -> u32 {
        unsafe { nix_get_list_size(ctx.as_ptr(), value.as_ptr()) }
    }

    fn nix_get_attrs_size(&self, ctx: Self::Context, value: Self::Value) -> u32 {
        unsafe { nix_get_attrs_size(ctx.as_ptr(), value.as_ptr()) }
    }

    fn nix_get_float(&self, ctx: Self::Context, value: Self::Value) -> f64 {
        unsafe { nix_get_float(ctx.as_ptr(), value.as_ptr()) }
    }

    fn nix_get_int(&self, ctx: Self::Context, value: Self::Value) -> i64 {
        unsafe { nix_get_int(ctx.as_ptr(), value.as_ptr()) }
    }

    fn nix_get_external(&self, ctx: Self::Context, value: Self::Value) -> Option<Self::External> {
        NonNull::new(unsafe { nix_get_external(ctx.as_ptr(), value.as_ptr()) })
    }

    fn nix_get_list_byidx(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        ix: u32,
    ) -> Option<Self::Value> {
        NonNull::new(unsafe { nix_get_list_byidx(ctx.as_ptr(), value.as_ptr(), state.as_ptr(), ix) })
    }

    fn nix_get_attr_byname(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        name: &CStr,
    ) -> Option<Self::Value> {
        NonNull::new(unsafe {
            nix_get_attr_byname(ctx.as_ptr(), value.as_ptr(), state.as_ptr(), name.as_ptr())
        })
    }

    fn nix_has_attr_byname(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        name: &CStr,
    ) -> bool {
        unsafe { nix_has_attr_byname(ctx.as_ptr(), value.as_ptr(), state.as_ptr(), name.as_ptr()) }
    }

    fn nix_get_attr_byidx(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        i: u32,
        name: &mut Option<String>,
    ) -> Option<Self::Value> {
        let mut raw_name: *const c_char = ptr::null();
        let result = unsafe {
            nix_get_attr_byidx(ctx.as_ptr(), value.as_ptr(), state.as_ptr(), i, &mut raw_name)
        };
        // SAFETY: attribute names are interned symbols owned by the state.
        *name = unsafe { owned_string(raw_name) };
        NonNull::new(result)
    }

    fn nix_set_bool(&self, ctx: Self::Context, value: Self::Value, b: bool) -> NixErr {
        unsafe { nix_set_bool(ctx.as_ptr(), value.as_ptr(), b) }
    }

    fn nix_set_string(&self, ctx: Self::Context, value: Self::Value, s: &CStr) -> NixErr {
        unsafe { nix_set_string(ctx.as_ptr(), value.as_ptr(), s.as_ptr()) }
    }

    fn nix_set_path_string(&self, ctx: Self::Context, value: Self::Value, s: &CStr) -> NixErr {
        unsafe { nix_set_path_string(ctx.as_ptr(), value.as_ptr(), s.as_ptr()) }
    }

    fn nix_set_float(&self, ctx: Self::Context, value: Self::Value, d: f64) -> NixErr {
        unsafe { nix_set_float(ctx.as_ptr(), value.as_ptr(), d) }
    }

    fn nix_set_int(&self, ctx: Self::Context, value: Self::Value, i: i64) -> NixErr {
        unsafe { nix_set_int(ctx.as_ptr(), value.as_ptr(), i) }
    }

    fn nix_set_null(&self, ctx: Self::Context, value: Self::Value) -> NixErr {
        unsafe { nix_set_null(ctx.as_ptr(), value.as_ptr()) }
    }

    fn nix_set_external(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        val: Self::External,
    ) -> NixErr {
        unsafe { nix_set_external(ctx.as_ptr(), value.as_ptr(), val.as_ptr()) }
    }

    fn nix_make_list(
        &self,
        ctx: Self::Context,
        state: Self::State,
        value: Self::Value,
        size: u32,
    ) -> NixErr {
        unsafe { nix_make_list(ctx.as_ptr(), state.as_ptr(), value.as_ptr(), size) }
    }

    fn nix_set_list_byidx(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        ix: u32,
        elem: Self::Value,
    ) -> NixErr {
        unsafe { nix_set_list_byidx(ctx.as_ptr(), value.as_ptr(), ix, elem.as_ptr()) }
    }

    fn nix_make_attrs(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        b: Self::BindingsBuilder,
    ) -> NixErr {
        unsafe { nix_make_attrs(ctx.as_ptr(), value.as_ptr(), b.as_ptr()) }
    }

    fn nix_copy_value(&self, ctx: Self::Context, value: Self::Value, source: Self::Value) -> NixErr {
        unsafe { nix_copy_value(ctx.as_ptr(), value.as_ptr(), source.as_ptr()) }
    }

    fn nix_make_bindings_builder(
        &self,
        ctx: Self::Context,
        state: Self::State,
        capacity: u32,
    ) -> Option<Self::BindingsBuilder> {
        NonNull::new(unsafe { nix_make_bindings_builder(ctx.as_ptr(), state.as_ptr(), capacity) })
    }

    fn nix_bindings_builder_insert(
        &self,
        ctx: Self::Context,
        builder: Self::BindingsBuilder,
        name: &CStr,
        value: Self::Value,
    ) -> NixErr {
        unsafe {
            nix_bindings_builder_insert(ctx.as_ptr(), builder.as_ptr(), name.as_ptr(), value.as_ptr())
        }
    }

    fn nix_bindings_builder_free(&self, builder: Self::BindingsBuilder) {
        unsafe { nix_bindings_builder_free(builder.as_ptr()) }
    }
}
