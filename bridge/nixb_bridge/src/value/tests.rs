#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::collections::BTreeMap;
use std::rc::Rc;

use nixb_engine::{Engine, ExternalId};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;

use super::{External, Function, Host, Key, Value, ValueKind};
use crate::error::ErrorKind;
use crate::session::Session;
use crate::state::State;

type H = Host<Engine>;

fn state() -> State<Engine> {
    let session = Session::new(Engine::new()).unwrap();
    let store = session.open_store("dummy://").unwrap();
    State::new(&store).unwrap()
}

fn eval(state: &State<Engine>, source: &str) -> Value<Engine> {
    state.eval_at(source, "/").unwrap()
}

fn int(value: &Value<Engine>) -> i64 {
    match value.get().unwrap() {
        Host::Int(n) => n,
        other => panic!("expected an int, got {other:?}"),
    }
}

fn attrs<const N: usize>(entries: [(&str, H); N]) -> H {
    Host::Attrs(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect::<BTreeMap<_, _>>(),
    )
}

// ── Reading ─────────────────────────────────────────────────────────────

#[test]
fn scalars_are_read_with_their_kind() {
    let state = state();
    let cases: [(&str, ValueKind, H); 6] = [
        ("1 + 1", ValueKind::Int, Host::Int(2)),
        ("1.5", ValueKind::Float, Host::Float(1.5)),
        ("!false", ValueKind::Bool, Host::Bool(true)),
        ("null", ValueKind::Null, Host::Null),
        (r#""x""#, ValueKind::String, Host::String("x".into())),
        ("/a/b", ValueKind::Path, Host::Path("/a/b".into())),
    ];
    for (source, kind, expected) in cases {
        let value = eval(&state, source);
        assert_eq!(value.kind().unwrap(), kind, "{source}");
        assert_eq!(value.get().unwrap(), expected, "{source}");
    }
}

#[test]
fn type_name_is_the_evaluator_name() {
    let state = state();
    assert_eq!(eval(&state, "1").type_name().unwrap(), "an integer");
    assert_eq!(eval(&state, "{ }").type_name().unwrap(), "a set");
    assert_eq!(eval(&state, "x: x").type_name().unwrap(), "a function");
}

#[test]
fn is_kind_checks_against_a_set_of_kinds() {
    let state = state();
    let value = eval(&state, "[ 1 ]");

    assert!(value.is_kind(&[ValueKind::List]).unwrap());
    assert!(value.is_kind(&[ValueKind::Attrs, ValueKind::List]).unwrap());
    assert!(!value.is_kind(&[ValueKind::Int, ValueKind::Function]).unwrap());
    assert!(!value.is_kind(&[]).unwrap());

    let slot = state.alloc_value().unwrap();
    assert_eq!(slot.is_kind(&[ValueKind::Thunk]).unwrap_err().kind(), ErrorKind::Unknown);
}

#[test]
fn forcing_twice_is_forcing_once() {
    let state = state();
    let value = eval(&state, "let x = 20; in x + 22");
    assert!(value.is_forced());

    value.force().unwrap();
    value.force().unwrap();

    assert!(value.is_forced());
    assert_eq!(int(&value), 42);
}

#[test]
fn evaluation_errors_surface_as_evaluator_errors() {
    let state = state();

    let err = state.eval(r#"throw "nope""#).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Evaluator);
    assert_eq!(err.to_string(), "nope");
}

#[test]
fn force_deep_reaches_nested_errors() {
    let state = state();
    let value = eval(&state, r#"[ 1 [ (throw "deep") ] ]"#);

    let err = value.force_deep().unwrap_err();

    assert_eq!(err.to_string(), "deep");
}

#[test]
fn uninitialized_values_cannot_be_forced() {
    let state = state();
    let value = state.alloc_value().unwrap();

    assert!(!value.is_forced());
    assert_eq!(value.kind().unwrap_err().kind(), ErrorKind::Unknown);
}

#[test]
fn shallow_get_returns_forced_child_handles() {
    let state = state();
    let value = eval(&state, "{ a = 1 + 1; b = [ 2 ]; }");

    let Host::Attrs(children) = value.get().unwrap() else {
        panic!("expected attrs");
    };

    assert_eq!(children.keys().collect::<Vec<_>>(), ["a", "b"]);
    for child in children.values() {
        let Host::Value(handle) = child else {
            panic!("expected a handle, got {child:?}");
        };
        assert!(handle.is_forced());
    }
}

#[test]
fn deep_get_materializes_containers() {
    let state = state();
    let value = eval(&state, r#"{ a = 1; b = "x"; c = [ true null ]; }"#);

    let expected = attrs([
        ("a", Host::Int(1)),
        ("b", Host::String("x".into())),
        ("c", Host::List(vec![Host::Bool(true), Host::Null])),
    ]);
    assert_eq!(value.get_deep().unwrap(), expected);
}

#[test]
fn deep_get_keeps_functions_callable() {
    let state = state();
    let value = eval(&state, "{ inc = x: x + 1; }");

    let Host::Attrs(mut entries) = value.get_deep().unwrap() else {
        panic!("expected attrs");
    };
    let Some(Host::Function(inc)) = entries.remove("inc") else {
        panic!("expected a function");
    };

    assert_eq!(int(&inc.call(1).unwrap()), 2);
}

// ── Lookup ──────────────────────────────────────────────────────────────

#[test]
fn list_lookup_checks_bounds() {
    let state = state();
    let list = eval(&state, "[ 1 2 3 ]");

    assert_eq!(list.len().unwrap(), 3);
    assert_eq!(int(&list.lookup(0).unwrap().unwrap()), 1);
    assert_eq!(int(&list.lookup(2).unwrap().unwrap()), 3);
    assert_eq!(list.lookup(3).unwrap_err().kind(), ErrorKind::Range);
    assert_eq!(list.lookup(-1).unwrap_err().kind(), ErrorKind::Range);
}

#[test]
fn list_lookup_takes_integer_names_only() {
    let state = state();
    let list = eval(&state, "[ 10 20 ]");

    assert_eq!(int(&list.lookup("1").unwrap().unwrap()), 20);
    assert_eq!(list.lookup("x").unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn missing_attribute_is_distinct_from_null() {
    let state = state();
    let set = eval(&state, "{ present = null; }");

    assert!(set.lookup("missing").unwrap().is_none());
    let present = set.lookup("present").unwrap().unwrap();
    assert_eq!(present.get().unwrap(), Host::Null);
}

#[test]
fn lookup_forces_only_the_requested_attribute() {
    let state = state();
    let set = eval(&state, r#"{ ok = 1; bad = throw "lazy"; }"#);

    assert_eq!(int(&set.lookup("ok").unwrap().unwrap()), 1);
    assert!(set.has_attr("bad").unwrap());
    assert_eq!(set.lookup("bad").unwrap_err().to_string(), "lazy");
}

#[test]
fn lookup_on_a_scalar_is_a_type_error() {
    let state = state();
    let err = eval(&state, "42").lookup("a").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.to_string(), "lookup is not supported on a value of type int");
}

#[test]
fn has_attr_by_kind() {
    let state = state();
    let list = eval(&state, "[ 1 2 ]");
    let set = eval(&state, "{ a = 1; }");
    let scalar = eval(&state, "1");

    assert!(list.has_attr(1).unwrap());
    assert!(!list.has_attr(2).unwrap());
    assert!(!list.has_attr("a").unwrap());
    assert!(set.has_attr("a").unwrap());
    assert!(!set.has_attr("b").unwrap());
    assert!(!scalar.has_attr("a").unwrap());
}

#[test]
fn keys_of_lists_and_sets() {
    let state = state();
    let list = eval(&state, "[ 1 2 3 ]");
    let set = eval(&state, "{ b = 1; a = 2; }");

    let indices = list.keys().unwrap();
    let again = indices.clone();
    assert_eq!(indices.count(), 3);
    assert_eq!(
        again.map(Result::unwrap).collect::<Vec<_>>(),
        [Key::Index(0), Key::Index(1), Key::Index(2)]
    );

    let names = set.keys().unwrap();
    assert_eq!(names.size_hint(), (2, Some(2)));
    assert_eq!(
        names.map(Result::unwrap).collect::<Vec<_>>(),
        [Key::from("a"), Key::from("b")]
    );

    assert_eq!(eval(&state, "1").keys().unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn attribute_key_iteration_releases_transient_handles() {
    let state = state();
    let set = eval(&state, "{ a = 1; b = 2; c = 3; }");
    let before = state.session().api().live().values;

    let count = set.keys().unwrap().count();

    assert_eq!(count, 3);
    assert_eq!(state.session().api().live().values, before);
}

// ── Calls ───────────────────────────────────────────────────────────────

#[test]
fn calling_a_function() {
    let state = state();
    let inc = eval(&state, "x: x + 1");

    assert_eq!(int(&inc.call(41).unwrap()), 42);
}

#[test]
fn curried_calls_fold_over_arguments() {
    let state = state();
    let mul = eval(&state, "a: b: a * b");

    assert_eq!(int(&mul.call_many([6, 7]).unwrap()), 42);

    let same = mul.call_many(Vec::<i64>::new()).unwrap();
    assert_eq!(Host::Value(same), Host::Value(mul));
}

#[test]
fn functor_sets_are_callable() {
    let state = state();
    let double = eval(&state, "{ factor = 2; __functor = self: x: x * self.factor; }");

    assert_eq!(int(&double.call(21).unwrap()), 42);
}

#[test]
fn calling_a_non_function_is_a_type_error() {
    let state = state();
    let err = eval(&state, r#""text""#).call(1).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Type);
}

#[test]
fn functions_and_host_data_are_accepted_as_arguments() {
    let state = state();
    let apply = eval(&state, "f: f 1");
    let inc = eval(&state, "x: x + 1");
    let sum = eval(&state, "s: s.a + builtins.length s.xs");

    let result = apply.call(Host::Function(Function(inc))).unwrap();
    assert_eq!(int(&result), 2);

    let arg = attrs([
        ("a", Host::Int(40)),
        ("xs", Host::List(vec![Host::Null, Host::Bool(false)])),
    ]);
    assert_eq!(int(&sum.call(arg).unwrap()), 42);
}

#[test]
fn call_errors_come_from_the_evaluator() {
    let state = state();
    let strict = eval(&state, "{ a }: a");

    let err = strict.call(attrs([])).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Evaluator);
    assert!(err.to_string().contains("'a'"), "{err}");
}

// ── Writing ─────────────────────────────────────────────────────────────

#[test]
fn containers_written_from_host_data_read_back() {
    let state = state();
    let host = attrs([
        ("list", Host::from(vec![1i64, 2, 3])),
        ("name", Host::from("n")),
        ("nested", attrs([("flag", Host::Bool(true))])),
    ]);

    let value = state.make_value(host.clone()).unwrap();

    assert!(value.is_forced());
    assert_eq!(value.kind().unwrap(), ValueKind::Attrs);
    assert_eq!(value.get_deep().unwrap(), host);
}

#[test]
fn big_integers_within_64_bits_are_ints() {
    let state = state();

    let fits = state.make_value(BigInt::from(i64::MIN)).unwrap();
    assert_eq!(fits.get().unwrap(), Host::Int(i64::MIN));

    let too_big = BigInt::from(i64::MAX) + 1;
    let err = state.make_value(too_big).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);
}

#[test]
fn interior_nul_is_a_conversion_error() {
    let state = state();

    let err = state.make_value("a\0b").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conversion);
}

#[test]
fn copying_a_value_shares_its_content() {
    let state = state();
    let source = eval(&state, r#"{ a = "shared"; }"#);

    let copy = state.make_value(&source).unwrap();

    assert!(copy.is_forced());
    assert_eq!(copy.get_deep().unwrap(), source.get_deep().unwrap());
}

#[test]
fn copying_an_unforced_value_stays_unforced() {
    let state = state();
    let list = eval(&state, "[ (1 + 1) ]");
    let Host::List(items) = list.get().unwrap() else {
        panic!("expected a list");
    };
    let unforced = state.alloc_value().unwrap();
    let copy = state.make_value(&unforced).unwrap();
    assert!(!copy.is_forced());

    copy.set(&items[0]).unwrap();
    assert!(copy.is_forced());
    assert_eq!(int(&copy), 2);
}

#[test]
fn copying_an_unforced_value_over_a_forced_one_unforces_it() {
    let state = state();
    let value = state.make_value(1).unwrap();
    assert!(value.is_forced());

    let slot = state.alloc_value().unwrap();
    value.set(&Host::Value(slot)).unwrap();

    assert!(!value.is_forced());
    assert_eq!(value.get().unwrap_err().kind(), ErrorKind::Unknown);
}

#[test]
fn externals_keep_their_identity() {
    let state = state();
    let tag = ExternalId::new(7);

    let value = state.make_value(External::from_raw(tag)).unwrap();

    assert_eq!(value.kind().unwrap(), ValueKind::External);
    let Host::External(ext) = value.get().unwrap() else {
        panic!("expected an external");
    };
    assert_eq!(ext.raw().tag(), 7);
}

#[test]
fn dropping_values_releases_their_handles() {
    let state = state();
    let baseline = state.session().api().live().values;

    let value = eval(&state, "[ 1 2 3 ]");
    let shallow = value.get().unwrap();
    let clone = value.clone();
    assert!(state.session().api().live().values > baseline);

    drop(shallow);
    drop(value);
    drop(clone);

    assert_eq!(state.session().api().live().values, baseline);
}

#[test]
fn values_keep_the_state_alive() {
    let state = state();
    let session = Rc::clone(state.session());
    let value = eval(&state, "1");

    state.free();
    assert_eq!(session.api().live().states, 1);
    assert_eq!(int(&value), 1);

    drop(value);
    assert_eq!(session.api().live().states, 0);
    assert_eq!(session.api().live().stores, 0);
}

// ── Keys and kinds ──────────────────────────────────────────────────────

#[test]
fn keys_convert_between_indices_and_names() {
    assert_eq!(Key::from("12").as_index(), Some(12));
    assert_eq!(Key::from("x").as_index(), None);
    assert_eq!(Key::from(3usize).to_name(), "3");
    assert_eq!(Key::from(-1).to_string(), "-1");
}

#[test]
fn type_tags_map_through_the_fixed_table() {
    assert_eq!(ValueKind::from_tag(nixb_sys::NIX_TYPE_THUNK), Some(ValueKind::Thunk));
    assert_eq!(ValueKind::from_tag(nixb_sys::NIX_TYPE_ATTRS), Some(ValueKind::Attrs));
    assert_eq!(ValueKind::from_tag(nixb_sys::NIX_TYPE_EXTERNAL), Some(ValueKind::External));
    assert_eq!(ValueKind::from_tag(11), None);
    assert_eq!(ValueKind::from_tag(-1), None);
}
