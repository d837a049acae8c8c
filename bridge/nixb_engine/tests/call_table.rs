//! The engine driven purely through `NixApi`, the way a caller of the C
//! library would: contexts, codes, buffers and reference counts.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::ffi::CStr;

use nixb_engine::{Engine, ExternalId, LiveHandles};
use nixb_sys::{
    NixApi, NIX_ERR_KEY, NIX_ERR_NIX_ERROR, NIX_ERR_OVERFLOW, NIX_ERR_UNKNOWN, NIX_OK,
    NIX_TYPE_ATTRS, NIX_TYPE_FUNCTION, NIX_TYPE_INT, NIX_TYPE_LIST, NIX_TYPE_THUNK,
};
use pretty_assertions::assert_eq;

type Ctx = <Engine as NixApi>::Context;
type State = <Engine as NixApi>::State;
type Value = <Engine as NixApi>::Value;

struct Setup {
    api: Engine,
    ctx: Ctx,
    store: <Engine as NixApi>::Store,
    state: State,
}

fn setup() -> Setup {
    let api = Engine::new();
    let ctx = api.nix_c_context_create().unwrap();
    assert_eq!(api.nix_libutil_init(ctx), NIX_OK);
    assert_eq!(api.nix_libstore_init(ctx), NIX_OK);
    assert_eq!(api.nix_libexpr_init(ctx), NIX_OK);
    let store = api.nix_store_open(ctx, c"dummy://", &[]).unwrap();
    let state = api.nix_state_create(ctx, &[], store).unwrap();
    Setup {
        api,
        ctx,
        store,
        state,
    }
}

impl Setup {
    fn eval(&self, source: &CStr) -> Value {
        let value = self.api.nix_alloc_value(self.ctx, self.state).unwrap();
        let code = self
            .api
            .nix_expr_eval_from_string(self.ctx, self.state, source, c"/", value);
        assert_eq!(code, NIX_OK, "{:?}", self.message());
        value
    }

    fn message(&self) -> Option<String> {
        let reader = self.api.nix_c_context_create().unwrap();
        let message = self.api.nix_err_msg(reader, self.ctx, None);
        self.api.nix_c_context_free(reader);
        message
    }
}

#[test]
fn version_and_initialization() {
    let api = Engine::new();
    let ctx = api.nix_c_context_create().unwrap();
    assert_eq!(api.nix_version_get(), nixb_engine::NIX_VERSION);

    // libstore must be initialized before a store can be opened.
    assert!(api.nix_store_open(ctx, c"dummy://", &[]).is_none());
    assert_eq!(api.nix_err_code(ctx), NIX_ERR_UNKNOWN);
    assert_eq!(api.nix_libstore_init(ctx), NIX_OK);
    let store = api.nix_store_open(ctx, c"dummy://", &[]).unwrap();

    assert!(api.nix_state_create(ctx, &[], store).is_none());
    assert_eq!(api.nix_libexpr_init(ctx), NIX_OK);
    assert!(api.nix_state_create(ctx, &[], store).is_some());
}

#[test]
fn evaluation_and_scalar_getters() {
    let s = setup();
    let v = s.eval(c"1 + 2");
    assert_eq!(s.api.nix_get_type(s.ctx, v), NIX_TYPE_INT);
    assert_eq!(s.api.nix_get_int(s.ctx, v), 3);
    assert_eq!(s.api.nix_get_typename(s.ctx, v).as_deref(), Some("an integer"));

    let v = s.eval(c"\"text\"");
    assert_eq!(s.api.nix_get_string(s.ctx, v).as_deref(), Some("text"));
    assert_eq!(s.api.nix_get_int(s.ctx, v), 0);
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_NIX_ERROR);
    assert_eq!(
        s.message().as_deref(),
        Some("value is a string while an integer was expected")
    );
}

#[test]
fn evaluation_errors_are_recorded_in_the_context() {
    let s = setup();
    let v = s.api.nix_alloc_value(s.ctx, s.state).unwrap();
    let code = s
        .api
        .nix_expr_eval_from_string(s.ctx, s.state, c"throw \"nope\"", c"/", v);
    assert_eq!(code, NIX_ERR_NIX_ERROR);
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_NIX_ERROR);
    assert_eq!(s.message().as_deref(), Some("nope"));

    // The next successful call resets the code.
    assert_eq!(s.api.nix_set_int(s.ctx, v, 1), NIX_OK);
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_OK);
}

#[test]
fn err_msg_on_a_clean_context_fails() {
    let s = setup();
    let fresh = s.api.nix_c_context_create().unwrap();
    assert_eq!(s.api.nix_err_msg(s.ctx, fresh, None), None);
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_UNKNOWN);
}

#[test]
fn err_msg_reports_length() {
    let s = setup();
    let v = s.api.nix_alloc_value(s.ctx, s.state).unwrap();
    s.api
        .nix_expr_eval_from_string(s.ctx, s.state, c"throw \"abc\"", c"/", v);
    let reader = s.api.nix_c_context_create().unwrap();
    let mut n = 0;
    let message = s.api.nix_err_msg(reader, s.ctx, Some(&mut n));
    assert_eq!(message.as_deref(), Some("abc"));
    assert_eq!(n, 3);
}

#[test]
fn getters_do_not_force() {
    let s = setup();
    let v = s.eval(c"{ a = 1 + 1; }");
    let a = s.api.nix_get_attr_byname(s.ctx, v, s.state, c"a").unwrap();
    assert_eq!(s.api.nix_get_type(s.ctx, a), NIX_TYPE_THUNK);
    assert_eq!(s.api.nix_get_int(s.ctx, a), 0);
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_UNKNOWN);

    assert_eq!(s.api.nix_value_force(s.ctx, s.state, a), NIX_OK);
    assert_eq!(s.api.nix_get_int(s.ctx, a), 2);
}

#[test]
fn attribute_access() {
    let s = setup();
    let v = s.eval(c"{ b = 2; a = 1; }");
    assert_eq!(s.api.nix_get_type(s.ctx, v), NIX_TYPE_ATTRS);
    assert_eq!(s.api.nix_get_attrs_size(s.ctx, v), 2);
    assert!(s.api.nix_has_attr_byname(s.ctx, v, s.state, c"a"));
    assert!(!s.api.nix_has_attr_byname(s.ctx, v, s.state, c"z"));

    let mut name = None;
    let first = s.api.nix_get_attr_byidx(s.ctx, v, s.state, 0, &mut name).unwrap();
    assert_eq!(name.as_deref(), Some("a"));
    assert_eq!(s.api.nix_get_int(s.ctx, first), 1);

    assert!(s.api.nix_get_attr_byname(s.ctx, v, s.state, c"z").is_none());
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_KEY);
    assert!(s.api.nix_get_attr_byidx(s.ctx, v, s.state, 2, &mut name).is_none());
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_KEY);
}

#[test]
fn list_access() {
    let s = setup();
    let v = s.eval(c"[ 10 20 ]");
    assert_eq!(s.api.nix_get_type(s.ctx, v), NIX_TYPE_LIST);
    assert_eq!(s.api.nix_get_list_size(s.ctx, v), 2);
    let second = s.api.nix_get_list_byidx(s.ctx, v, s.state, 1).unwrap();
    assert_eq!(s.api.nix_get_int(s.ctx, second), 20);
    assert!(s.api.nix_get_list_byidx(s.ctx, v, s.state, 2).is_none());
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_KEY);
}

#[test]
fn building_lists_and_sets() {
    let s = setup();
    let api = &s.api;
    let one = api.nix_alloc_value(s.ctx, s.state).unwrap();
    api.nix_set_int(s.ctx, one, 1);

    let list = api.nix_alloc_value(s.ctx, s.state).unwrap();
    assert_eq!(api.nix_make_list(s.ctx, s.state, list, 2), NIX_OK);
    assert_eq!(api.nix_set_list_byidx(s.ctx, list, 0, one), NIX_OK);
    assert_eq!(api.nix_set_list_byidx(s.ctx, list, 1, one), NIX_OK);
    assert_eq!(api.nix_set_list_byidx(s.ctx, list, 2, one), NIX_ERR_KEY);

    let builder = api.nix_make_bindings_builder(s.ctx, s.state, 1).unwrap();
    assert_eq!(api.nix_bindings_builder_insert(s.ctx, builder, c"xs", list), NIX_OK);
    let set = api.nix_alloc_value(s.ctx, s.state).unwrap();
    assert_eq!(api.nix_make_attrs(s.ctx, set, builder), NIX_OK);
    assert_eq!(
        api.nix_bindings_builder_insert(s.ctx, builder, c"late", one),
        NIX_ERR_UNKNOWN
    );
    api.nix_bindings_builder_free(builder);

    let func = s.eval(c"s: builtins.length s.xs + builtins.head s.xs");
    assert_eq!(api.nix_get_type(s.ctx, func), NIX_TYPE_FUNCTION);
    let result = api.nix_alloc_value(s.ctx, s.state).unwrap();
    assert_eq!(api.nix_value_call(s.ctx, s.state, func, set, result), NIX_OK);
    assert_eq!(api.nix_get_int(s.ctx, result), 3);
}

#[test]
fn copy_value_shares_contents() {
    let s = setup();
    let source = s.eval(c"\"shared\"");
    let target = s.api.nix_alloc_value(s.ctx, s.state).unwrap();
    assert_eq!(s.api.nix_copy_value(s.ctx, target, source), NIX_OK);
    assert_eq!(s.api.nix_get_string(s.ctx, target).as_deref(), Some("shared"));
}

#[test]
fn uninitialized_values_are_reported() {
    let s = setup();
    let v = s.api.nix_alloc_value(s.ctx, s.state).unwrap();
    assert_eq!(s.api.nix_value_force(s.ctx, s.state, v), NIX_ERR_UNKNOWN);
    assert_eq!(s.message().as_deref(), Some("value is not initialized"));
}

#[test]
fn externals_round_trip_their_tag() {
    let s = setup();
    let v = s.api.nix_alloc_value(s.ctx, s.state).unwrap();
    s.api.nix_set_external(s.ctx, v, ExternalId::new(42));
    assert_eq!(s.api.nix_get_external(s.ctx, v).map(ExternalId::tag), Some(42));
}

#[test]
fn store_uri_and_version_buffers() {
    let s = setup();
    let mut buf = [0u8; 64];
    assert_eq!(s.api.nix_store_get_uri(s.ctx, s.store, &mut buf), NIX_OK);
    let uri = CStr::from_bytes_until_nul(&buf).unwrap();
    assert_eq!(uri.to_str().unwrap(), "dummy://");

    let mut tiny = [0u8; 4];
    assert_eq!(s.api.nix_store_get_uri(s.ctx, s.store, &mut tiny), NIX_ERR_OVERFLOW);

    assert_eq!(s.api.nix_store_get_version(s.ctx, s.store, &mut buf), NIX_OK);
    assert!(!CStr::from_bytes_until_nul(&buf).unwrap().is_empty());
}

#[test]
fn build_reports_outputs_through_the_callback() {
    let s = setup();
    let drv = s.eval(c"(derivation { name = \"t\"; system = \"s\"; builder = \"b\"; }).drvPath");
    let drv_path = s.api.nix_get_string(s.ctx, drv).unwrap();
    let drv_path = std::ffi::CString::new(drv_path).unwrap();
    let path = s.api.nix_store_parse_path(s.ctx, s.store, &drv_path).unwrap();
    assert!(s.api.nix_store_is_valid_path(s.ctx, s.store, path));

    let mut seen = Vec::new();
    let code = s.api.nix_store_build(s.ctx, s.store, path, &mut |name, out| {
        seen.push((name.to_str().unwrap().to_owned(), out.to_str().unwrap().to_owned()));
    });
    assert_eq!(code, NIX_OK);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "out");
    assert!(seen[0].1.ends_with("-t"));
    s.api.nix_store_path_free(path);
}

#[test]
fn refcounts_release_slots() {
    let s = setup();
    let before = s.api.live();
    let v = s.eval(c"[ 1 2 ]");
    assert_eq!(s.api.live().values, before.values + 1);
    assert_eq!(s.api.nix_gc_incref(s.ctx, v), NIX_OK);
    assert_eq!(s.api.nix_gc_decref(s.ctx, v), NIX_OK);
    assert_eq!(s.api.live().values, before.values + 1);
    assert_eq!(s.api.nix_gc_decref(s.ctx, v), NIX_OK);
    assert_eq!(s.api.live(), before);

    // Stale handle.
    assert_eq!(s.api.nix_gc_decref(s.ctx, v), NIX_ERR_UNKNOWN);
    assert_eq!(s.api.nix_get_int(s.ctx, v), 0);
    assert_eq!(s.api.nix_err_code(s.ctx), NIX_ERR_UNKNOWN);
}

#[test]
fn releasing_everything_leaves_no_handles() {
    let s = setup();
    s.api.nix_state_free(s.state);
    s.api.nix_store_unref(s.store);
    s.api.nix_c_context_free(s.ctx);
    assert_eq!(s.api.live(), LiveHandles::default());
    // Double release is ignored.
    s.api.nix_state_free(s.state);
}
