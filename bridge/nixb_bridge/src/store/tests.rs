#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::rc::Rc;

use nixb_engine::Engine;
use pretty_assertions::assert_eq;

use super::{read_c_buffer, Store, URI_BUFFER_LEN};
use crate::error::{Error, ErrorKind};
use crate::session::Session;

fn session() -> Rc<Session<Engine>> {
    Session::new(Engine::new()).unwrap()
}

fn dummy_store(session: &Rc<Session<Engine>>) -> Store<Engine> {
    session.open_store("dummy://").unwrap()
}

/// A store path that is syntactically valid but was never added.
const ABSENT: &str = "/nix/store/00000000000000000000000000000000-absent";

#[test]
fn uri_and_version_are_read_back() {
    let session = session();
    let store = session.open_store_with("dummy://", &[("store", "/tmp/s")]).unwrap();

    assert_eq!(store.uri().unwrap(), "dummy://?store=/tmp/s");
    assert_eq!(store.version().unwrap(), "2.24.0-nixb");
}

#[test]
fn uri_longer_than_the_buffer_overflows() {
    let session = session();
    let long_dir = format!("/{}", "d".repeat(URI_BUFFER_LEN));
    let store = session.open_store_with("dummy://", &[("store", &long_dir)]).unwrap();

    let err = store.uri().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Overflow);
}

#[test]
fn unknown_uri_is_a_store_open_error_with_the_native_message() {
    let session = session();

    let err = session.open_store("ftp://nowhere").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreOpen);
    assert_eq!(
        err.to_string(),
        "cannot open store 'ftp://nowhere': don't know how to open Nix store with URI 'ftp://nowhere'"
    );
    let Error::StoreOpen { source, .. } = err else {
        panic!("expected a store open error");
    };
    assert_eq!(source.kind(), ErrorKind::Evaluator);
}

#[test]
fn parse_path_checks_syntax() {
    let session = session();
    let store = dummy_store(&session);

    let path = store.parse_path(ABSENT).unwrap();
    assert_eq!(path.path(), ABSENT);
    assert!(!path.is_valid().unwrap());

    let err = store.parse_path("/tmp/not-a-store-path").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Evaluator);
    assert!(err.to_string().contains("is not a valid store path"), "{err}");
}

#[test]
fn building_a_derivation_reports_its_outputs() {
    let session = session();
    let store = dummy_store(&session);
    let state = store.state().build().unwrap();
    let drv = state
        .eval(r#"(derivation { name = "hello"; system = "x86_64-linux"; builder = "/bin/sh"; outputs = [ "out" "dev" ]; }).drvPath"#)
        .unwrap();
    let crate::value::Host::String(drv_path) = drv.get().unwrap() else {
        panic!("drvPath is not a string");
    };
    let path = store.parse_path(&drv_path).unwrap();
    assert!(path.is_valid().unwrap());

    let outputs = path.build().unwrap();

    assert_eq!(outputs.keys().collect::<Vec<_>>(), ["dev", "out"]);
    assert!(outputs["out"].ends_with("-hello"));
    assert!(outputs["dev"].ends_with("-hello-dev"));
    for out in outputs.values() {
        assert!(store.parse_path(out).unwrap().is_valid().unwrap());
    }
}

#[test]
fn building_an_invalid_path_fails() {
    let session = session();
    let store = dummy_store(&session);
    let path = store.parse_path(ABSENT).unwrap();

    let err = path.build().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Evaluator);
}

#[test]
fn build_callback_may_call_back_into_the_session() {
    let session = session();
    let store = dummy_store(&session);
    let state = store.state().build().unwrap();
    let drv = state
        .eval(r#"(derivation { name = "nested"; system = "s"; builder = "b"; }).drvPath"#)
        .unwrap();
    let crate::value::Host::String(drv_path) = drv.get().unwrap() else {
        panic!("drvPath is not a string");
    };
    let path = store.parse_path(&drv_path).unwrap();

    let mut inner_errors = Vec::new();
    path.build_with(|_, _| {
        let err = store.parse_path("not a store path").unwrap_err();
        inner_errors.push(err.kind());
    })
    .unwrap();

    assert_eq!(inner_errors, [ErrorKind::Evaluator]);
    assert!(session.contexts_in_pool() >= 2);
}

#[test]
fn handles_are_released_in_dependency_order() {
    let session = session();
    let store = dummy_store(&session);
    let state = store.state().build().unwrap();
    let path = store.parse_path(ABSENT).unwrap();

    // The state and path keep the store alive past `unref`.
    store.unref();
    assert_eq!(session.api().live().stores, 1);
    path.free();
    assert_eq!(session.api().live().store_paths, 0);
    assert_eq!(session.api().live().stores, 1);
    state.free();

    assert_eq!(session.api().live().states, 0);
    assert_eq!(session.api().live().stores, 0);
}

#[test]
fn c_buffers_stop_at_the_first_nul() {
    assert_eq!(read_c_buffer(b"abc\0def", "text").unwrap(), "abc");
    assert_eq!(
        read_c_buffer(b"abc", "text").unwrap_err().kind(),
        ErrorKind::Conversion
    );
}
