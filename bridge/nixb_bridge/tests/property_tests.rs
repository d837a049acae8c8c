//! Property-based tests for value conversion.
//!
//! Host data written into a value reads back unchanged, both directly and
//! after a trip through an identity function in the evaluator. List lookups
//! succeed exactly on in-range indices.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::redundant_closure_for_method_calls,
    reason = "Proptest macros generate code with these patterns"
)]

use nixb_bridge::{ErrorKind, Host, State};
use nixb_engine::Engine;
use num_bigint::BigInt;
use proptest::prelude::*;

fn state() -> State<Engine> {
    let session = nixb_bridge::Session::new(Engine::new()).expect("session");
    let store = session.open_store("dummy://").expect("store");
    State::new(&store).expect("state")
}

/// Host scalars that compare equal to themselves.
#[derive(Clone, Debug)]
enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Path(String),
}

impl Scalar {
    fn to_host(&self) -> Host<Engine> {
        match self {
            Scalar::Null => Host::Null,
            Scalar::Bool(b) => Host::Bool(*b),
            Scalar::Int(n) => Host::Int(*n),
            Scalar::Float(x) => Host::Float(*x),
            Scalar::String(s) => Host::String(s.clone()),
            Scalar::Path(p) => Host::Path(p.clone()),
        }
    }
}

fn scalar_strategy() -> impl Strategy<Value = Scalar> {
    prop_oneof![
        Just(Scalar::Null),
        any::<bool>().prop_map(Scalar::Bool),
        any::<i64>().prop_map(Scalar::Int),
        (-1.0e12..1.0e12f64).prop_map(Scalar::Float),
        "\\PC{0,24}".prop_map(Scalar::String),
        "(/[a-z0-9._-]{1,8}){1,4}".prop_map(Scalar::Path),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn scalars_round_trip(scalar in scalar_strategy()) {
        let state = state();
        let host = scalar.to_host();

        let value = state.make_value(host.clone()).unwrap();

        prop_assert_eq!(value.get().unwrap(), host);
    }

    #[test]
    fn scalars_survive_the_identity_function(scalar in scalar_strategy()) {
        let state = state();
        let identity = state.eval("x: x").unwrap();
        let host = scalar.to_host();

        let result = identity.call(host.clone()).unwrap();

        prop_assert_eq!(result.get().unwrap(), host);
    }

    #[test]
    fn big_integers_in_range_become_ints(n in any::<i64>()) {
        let state = state();

        let value = state.make_value(BigInt::from(n)).unwrap();

        prop_assert_eq!(value.get().unwrap(), Host::Int(n));
    }

    #[test]
    fn big_integers_out_of_range_are_rejected(excess in 1u64..u64::MAX) {
        let state = state();
        let above = BigInt::from(i64::MAX) + BigInt::from(excess);
        let below = BigInt::from(i64::MIN) - BigInt::from(excess);

        for n in [above, below] {
            let err = state.make_value(n).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::Conversion);
        }
    }

    #[test]
    fn int_lists_round_trip_deeply(items in prop::collection::vec(any::<i64>(), 0..16)) {
        let state = state();
        let host: Host<Engine> = Host::from(items.clone());

        let value = state.make_value(host).unwrap();

        prop_assert_eq!(value.len().unwrap(), items.len());
        let expected = Host::List(items.into_iter().map(Host::Int).collect());
        prop_assert_eq!(value.get_deep().unwrap(), expected);
    }

    #[test]
    fn list_lookup_succeeds_exactly_in_range(len in 0usize..8, index in -4i64..12) {
        let state = state();
        let source = format!("builtins.genList (i: i * 10) {len}");
        let list = state.eval(&source).unwrap();

        let in_range = usize::try_from(index).is_ok_and(|i| i < len);
        match list.lookup(index) {
            Ok(Some(item)) => {
                prop_assert!(in_range);
                prop_assert_eq!(item.get().unwrap(), Host::Int(index * 10));
            }
            Ok(None) => prop_assert!(false, "lists never report absence"),
            Err(err) => {
                prop_assert!(!in_range);
                prop_assert_eq!(err.kind(), ErrorKind::Range);
            }
        }
        prop_assert_eq!(list.has_attr(index).unwrap(), in_range);
    }

    #[test]
    fn forcing_is_idempotent(n in any::<i32>()) {
        let state = state();
        let value = state.eval(&format!("let x = {n}; in [ x x ]")).unwrap();

        value.force().unwrap();
        let once = value.get_deep().unwrap();
        value.force().unwrap();
        value.force_deep().unwrap();

        prop_assert_eq!(value.get_deep().unwrap(), once);
    }
}
