//! The `NixApi` trait: the native call table as Rust methods.

use std::ffi::CStr;
use std::fmt;

use crate::{NixErr, ValueType};

/// One method per function of the Nix C API.
///
/// Handle types are associated types so that an implementation can use raw
/// pointers (the real library) or table indices (an in-process engine).
/// Handles are plain copyable tokens; ownership and release discipline is
/// the caller's business.
///
/// Methods returning `Option<handle>` return `None` where the C function
/// returns `NULL`, which happens exactly when the context reports an error.
pub trait NixApi {
    /// `nix_c_context *`
    type Context: Copy + fmt::Debug;
    /// `Store *`
    type Store: Copy + fmt::Debug;
    /// `StorePath *`
    type StorePath: Copy + fmt::Debug;
    /// `EvalState *`
    type State: Copy + fmt::Debug;
    /// `Value *`
    type Value: Copy + fmt::Debug;
    /// `BindingsBuilder *`
    type BindingsBuilder: Copy + fmt::Debug;
    /// `ExternalValue *`
    type External: Copy + fmt::Debug;

    // ── libutil ─────────────────────────────────────────────────────────

    fn nix_version_get(&self) -> String;
    fn nix_libutil_init(&self, ctx: Self::Context) -> NixErr;
    fn nix_c_context_create(&self) -> Option<Self::Context>;
    fn nix_c_context_free(&self, ctx: Self::Context);
    /// Code of the last call made with `ctx`.
    fn nix_err_code(&self, ctx: Self::Context) -> NixErr;
    /// Message of the last error recorded in `read_ctx`. `ctx` receives
    /// errors of this call itself. `n` receives the message length.
    fn nix_err_msg(
        &self,
        ctx: Self::Context,
        read_ctx: Self::Context,
        n: Option<&mut u32>,
    ) -> Option<String>;

    // ── libstore ────────────────────────────────────────────────────────

    fn nix_libstore_init(&self, ctx: Self::Context) -> NixErr;
    /// Open a store. `params` are key/value pairs (`const char ***params`).
    fn nix_store_open(
        &self,
        ctx: Self::Context,
        uri: &CStr,
        params: &[(&CStr, &CStr)],
    ) -> Option<Self::Store>;
    fn nix_store_unref(&self, store: Self::Store);
    /// Write the store URI, NUL-terminated, into `dest`.
    /// Reports `NIX_ERR_OVERFLOW` if it does not fit.
    fn nix_store_get_uri(&self, ctx: Self::Context, store: Self::Store, dest: &mut [u8]) -> NixErr;
    fn nix_store_parse_path(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        path: &CStr,
    ) -> Option<Self::StorePath>;
    fn nix_store_path_free(&self, path: Self::StorePath);
    fn nix_store_is_valid_path(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        path: Self::StorePath,
    ) -> bool;
    /// Build `path`. `callback(outname, out)` runs synchronously once per
    /// built output, before this call returns.
    fn nix_store_build(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        path: Self::StorePath,
        callback: &mut dyn FnMut(&CStr, &CStr),
    ) -> NixErr;
    /// Write the store version, NUL-terminated, into `dest`.
    fn nix_store_get_version(
        &self,
        ctx: Self::Context,
        store: Self::Store,
        dest: &mut [u8],
    ) -> NixErr;

    // ── libexpr: lifecycle and evaluation ───────────────────────────────

    fn nix_libexpr_init(&self, ctx: Self::Context) -> NixErr;
    fn nix_state_create(
        &self,
        ctx: Self::Context,
        search_path: &[&CStr],
        store: Self::Store,
    ) -> Option<Self::State>;
    fn nix_state_free(&self, state: Self::State);
    fn nix_alloc_value(&self, ctx: Self::Context, state: Self::State) -> Option<Self::Value>;
    fn nix_expr_eval_from_string(
        &self,
        ctx: Self::Context,
        state: Self::State,
        expr: &CStr,
        path: &CStr,
        value: Self::Value,
    ) -> NixErr;
    fn nix_value_call(
        &self,
        ctx: Self::Context,
        state: Self::State,
        func: Self::Value,
        arg: Self::Value,
        value: Self::Value,
    ) -> NixErr;
    fn nix_value_force(&self, ctx: Self::Context, state: Self::State, value: Self::Value) -> NixErr;
    fn nix_value_force_deep(
        &self,
        ctx: Self::Context,
        state: Self::State,
        value: Self::Value,
    ) -> NixErr;

    // ── libexpr: garbage collector ──────────────────────────────────────

    fn nix_gc_incref(&self, ctx: Self::Context, value: Self::Value) -> NixErr;
    fn nix_gc_decref(&self, ctx: Self::Context, value: Self::Value) -> NixErr;
    fn nix_gc_now(&self);

    // ── libexpr: reading values ─────────────────────────────────────────

    fn nix_get_type(&self, ctx: Self::Context, value: Self::Value) -> ValueType;
    fn nix_get_typename(&self, ctx: Self::Context, value: Self::Value) -> Option<String>;
    fn nix_get_bool(&self, ctx: Self::Context, value: Self::Value) -> bool;
    fn nix_get_string(&self, ctx: Self::Context, value: Self::Value) -> Option<String>;
    fn nix_get_path_string(&self, ctx: Self::Context, value: Self::Value) -> Option<String>;
    fn nix_get_list_size(&self, ctx: Self::Context, value: Self::Value) -> u32;
    fn nix_get_attrs_size(&self, ctx: Self::Context, value: Self::Value) -> u32;
    fn nix_get_float(&self, ctx: Self::Context, value: Self::Value) -> f64;
    fn nix_get_int(&self, ctx: Self::Context, value: Self::Value) -> i64;
    fn nix_get_external(&self, ctx: Self::Context, value: Self::Value) -> Option<Self::External>;
    fn nix_get_list_byidx(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        ix: u32,
    ) -> Option<Self::Value>;
    fn nix_get_attr_byname(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        name: &CStr,
    ) -> Option<Self::Value>;
    fn nix_has_attr_byname(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        name: &CStr,
    ) -> bool;
    /// Attribute at position `i`; its name is written to `name`.
    fn nix_get_attr_byidx(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        state: Self::State,
        i: u32,
        name: &mut Option<String>,
    ) -> Option<Self::Value>;

    // ── libexpr: writing values ─────────────────────────────────────────

    fn nix_set_bool(&self, ctx: Self::Context, value: Self::Value, b: bool) -> NixErr;
    fn nix_set_string(&self, ctx: Self::Context, value: Self::Value, s: &CStr) -> NixErr;
    fn nix_set_path_string(&self, ctx: Self::Context, value: Self::Value, s: &CStr) -> NixErr;
    fn nix_set_float(&self, ctx: Self::Context, value: Self::Value, d: f64) -> NixErr;
    fn nix_set_int(&self, ctx: Self::Context, value: Self::Value, i: i64) -> NixErr;
    fn nix_set_null(&self, ctx: Self::Context, value: Self::Value) -> NixErr;
    fn nix_set_external(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        val: Self::External,
    ) -> NixErr;
    fn nix_make_list(
        &self,
        ctx: Self::Context,
        state: Self::State,
        value: Self::Value,
        size: u32,
    ) -> NixErr;
    fn nix_set_list_byidx(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        ix: u32,
        elem: Self::Value,
    ) -> NixErr;
    fn nix_make_attrs(
        &self,
        ctx: Self::Context,
        value: Self::Value,
        b: Self::BindingsBuilder,
    ) -> NixErr;
    fn nix_copy_value(&self, ctx: Self::Context, value: Self::Value, source: Self::Value) -> NixErr;

    // ── libexpr: bindings builder ───────────────────────────────────────

    fn nix_make_bindings_builder(
        &self,
        ctx: Self::Context,
        state: Self::State,
        capacity: u32,
    ) -> Option<Self::BindingsBuilder>;
    fn nix_bindings_builder_insert(
        &self,
        ctx: Self::Context,
        builder: Self::BindingsBuilder,
        name: &CStr,
        value: Self::Value,
    ) -> NixErr;
    fn nix_bindings_builder_free(&self, builder: Self::BindingsBuilder);
}
