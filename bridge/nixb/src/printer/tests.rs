#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use nixb_bridge::{Session, State};
use nixb_engine::Engine;
use pretty_assertions::assert_eq;

use super::render;

fn state() -> State<Engine> {
    let session = Session::new(Engine::new()).unwrap();
    let store = session.open_store("dummy://").unwrap();
    State::new(&store).unwrap()
}

fn show(source: &str, depth: usize) -> String {
    let state = state();
    let value = state.eval_at(source, "/").unwrap();
    render(&value, depth).unwrap()
}

#[test]
fn scalars() {
    assert_eq!(show("1 + 1", 2), "2");
    assert_eq!(show("0.5", 2), "0.5");
    assert_eq!(show("true", 2), "true");
    assert_eq!(show("null", 2), "null");
    assert_eq!(show("/a/b", 2), "/a/b");
    assert_eq!(show(r#""a\"b\n""#, 2), r#""a\"b\n""#);
}

#[test]
fn containers() {
    assert_eq!(show("[ 1 [ 2 ] ]", 5), "[ 1 [ 2 ] ]");
    assert_eq!(show(r#"{ b = "x"; a = [ ]; }"#, 5), r#"{ a = [ ]; b = "x"; }"#);
    assert_eq!(show("{ }", 0), "{ }");
    assert_eq!(show(r#"{ "a b" = 1; }"#, 5), r#"{ "a b" = 1; }"#);
}

#[test]
fn nesting_beyond_the_depth_is_elided() {
    assert_eq!(show("{ a = { b = { c = 1; }; }; }", 1), "{ a = { … }; }");
    assert_eq!(show("[ [ 1 ] ]", 0), "[ … ]");
}

#[test]
fn functions_are_opaque() {
    assert_eq!(show("{ f = x: x; g = builtins.map; }", 2), "{ f = «lambda»; g = «lambda»; }");
}

#[test]
fn failing_children_are_shown_in_place() {
    assert_eq!(
        show(r#"{ ok = 1; bad = throw "nope"; }"#, 2),
        "{ bad = «error: nope»; ok = 1; }"
    );
}

#[test]
fn strings_escape_interpolation_markers() {
    assert_eq!(show(r#""\${x} $y""#, 1), r#""\${x} $y""#);
}
