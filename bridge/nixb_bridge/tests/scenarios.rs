//! End-to-end scenarios through the public API, against the reference
//! engine.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::collections::BTreeMap;
use std::rc::Rc;

use nixb_bridge::{ErrorKind, Host, Session, State, Store, Value};
use nixb_engine::{Engine, LiveHandles};
use pretty_assertions::assert_eq;

struct World {
    session: Rc<Session<Engine>>,
    store: Store<Engine>,
    state: State<Engine>,
}

fn world() -> World {
    let session = Session::new(Engine::new()).expect("session");
    let store = session.open_store("dummy://").expect("store");
    let state = store.state().build().expect("state");
    World {
        session,
        store,
        state,
    }
}

fn deep(value: &Value<Engine>) -> Host<Engine> {
    value.get_deep().unwrap()
}

#[test]
fn one_plus_one() {
    let w = world();

    let value = w.state.eval("1 + 1").unwrap();

    assert_eq!(deep(&value), Host::Int(2));
}

#[test]
fn attribute_set_reads_deeply() {
    let w = world();

    let value = w.state.eval(r#"{ a = 1; b = "x"; }"#).unwrap();

    let expected: BTreeMap<String, Host<Engine>> = [
        ("a".to_owned(), Host::Int(1)),
        ("b".to_owned(), Host::String("x".to_owned())),
    ]
    .into_iter()
    .collect();
    assert_eq!(deep(&value), Host::Attrs(expected));
}

#[test]
fn selection_and_negative_literals_evaluate() {
    let w = world();

    let cases = [
        ("let s = { a = 1; }; in s.a", Host::Int(1)),
        ("builtins.length [ 1 2 ]", Host::Int(2)),
        ("[ -1 ]", Host::List(vec![Host::Int(-1)])),
        ("({ y = 3; }).y", Host::Int(3)),
    ];
    for (source, expected) in cases {
        let value = w.state.eval(source).unwrap();
        assert_eq!(deep(&value), expected, "{source}");
    }
}

#[test]
fn list_of_three() {
    let w = world();

    let value = w.state.eval("[1 2 3]").unwrap();

    assert_eq!(value.len().unwrap(), 3);
    assert_eq!(value.lookup(3).unwrap_err().kind(), ErrorKind::Range);
}

#[test]
fn increment_function() {
    let w = world();

    let value = w.state.eval("x: x + 1").unwrap();

    assert_eq!(deep(&value.call(41).unwrap()), Host::Int(42));
}

#[test]
fn invalid_store_uri() {
    let session = Session::new(Engine::new()).unwrap();

    let err = session.open_store("bogus://x").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::StoreOpen);
    assert!(
        err.to_string()
            .contains("don't know how to open Nix store with URI 'bogus://x'"),
        "{err}"
    );
}

#[test]
fn search_path_entries_reach_the_evaluator() {
    let dir = std::env::temp_dir().join(format!("nixb-scenario-{}", std::process::id()));
    std::fs::create_dir_all(dir.join("lib")).unwrap();
    std::fs::write(dir.join("lib/default.nix"), "{ answer = 42; }").unwrap();
    let session = Session::new(Engine::new()).unwrap();
    let store = session.open_store("").unwrap();
    let state = store
        .state()
        .search_path(format!("lib={}", dir.join("lib").display()))
        .build()
        .unwrap();

    let value = state.eval("(import <lib>).answer").unwrap();

    assert_eq!(deep(&value), Host::Int(42));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn reentrant_errors_stay_isolated() {
    let w = world();
    let drv = w
        .state
        .eval(r#"(derivation { name = "reentrant"; system = "s"; builder = "b"; }).drvPath"#)
        .unwrap();
    let Host::String(drv_path) = drv.get().unwrap() else {
        panic!("drvPath is not a string");
    };
    let path = w.store.parse_path(&drv_path).unwrap();

    let mut seen = Vec::new();
    path.build_with(|name, out| {
        // A failing native call made while the build is still running.
        let inner = w.state.eval("throw \"inner failure\"").unwrap_err();
        assert_eq!(inner.to_string(), "inner failure");
        seen.push((name.to_owned(), out.to_owned()));
    })
    .unwrap();

    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "out");
    assert!(w.store.parse_path(&seen[0].1).unwrap().is_valid().unwrap());
}

#[test]
fn pool_grows_only_with_nesting_depth() {
    let w = world();
    let before = w.session.contexts_in_pool();

    for i in 0..50 {
        let value = w.state.eval(&format!("{i} * 2")).unwrap();
        assert_eq!(deep(&value), Host::Int(i * 2));
    }
    w.state.eval("throw \"x\"").unwrap_err();

    // One slot for the calls, one more for reading a failure's message.
    assert!(w.session.contexts_in_pool() <= before.max(2));
}

#[test]
fn everything_is_released_when_the_last_handle_goes() {
    let w = world();
    let value = w.state.eval("{ xs = [ 1 2 ]; f = x: x; }").unwrap();
    let _ = deep(&value);
    let path = w
        .store
        .parse_path("/nix/store/00000000000000000000000000000000-x")
        .unwrap();

    drop(path);
    drop(value);
    drop(w.state);
    drop(w.store);

    assert_eq!(
        w.session.api().live(),
        LiveHandles {
            contexts: w.session.contexts_in_pool(),
            ..LiveHandles::default()
        }
    );
}

#[test]
fn explicit_release_is_idempotent_with_drop() {
    let w = world();
    let value = w.state.eval("1").unwrap();
    let state = w.state.clone();

    w.state.free();
    w.store.unref();
    assert_eq!(w.session.api().live().states, 1);

    drop(value);
    state.free();

    let live = w.session.api().live();
    assert_eq!(live.values, 0);
    assert_eq!(live.states, 0);
    assert_eq!(live.stores, 0);
}
