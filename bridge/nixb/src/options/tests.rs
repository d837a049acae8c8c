#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use pretty_assertions::assert_eq;

use super::{parse_args, Invocation, Options, DEFAULT_DEPTH};

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_string()).collect()
}

fn run(list: &[&str]) -> Options {
    match parse_args(&args(list), None).unwrap() {
        Invocation::Run(options) => options,
        other => panic!("expected a run, got {other:?}"),
    }
}

#[test]
fn defaults() {
    let options = run(&[]);

    assert_eq!(options, Options::new(String::new()));
    assert_eq!(options.depth, DEFAULT_DEPTH);
}

#[test]
fn all_flags() {
    let options = run(&[
        "--store=dummy://",
        "--origin=/src",
        "-I",
        "nixpkgs=/p",
        "--include=/q",
        "--depth=5",
        "1 + 1",
    ]);

    assert_eq!(options.store, "dummy://");
    assert_eq!(options.origin.as_deref(), Some("/src"));
    assert_eq!(options.search_path, ["nixpkgs=/p", "/q"]);
    assert_eq!(options.depth, 5);
    assert!(!options.deep);
    assert_eq!(options.expr.as_deref(), Some("1 + 1"));
}

#[test]
fn store_falls_back_to_the_environment() {
    let from_env = parse_args(&[], Some("memory://".to_string())).unwrap();
    let flag_wins = parse_args(&args(&["--store=dummy://"]), Some("memory://".to_string())).unwrap();

    assert_eq!(from_env, Invocation::Run(Options::new("memory://".to_string())));
    let Invocation::Run(options) = flag_wins else {
        panic!("expected a run");
    };
    assert_eq!(options.store, "dummy://");
}

#[test]
fn deep_lifts_the_depth_limit_unless_given() {
    assert_eq!(run(&["--deep"]).depth, usize::MAX);
    assert_eq!(run(&["--depth=3", "--deep"]).depth, 3);
}

#[test]
fn help_and_version() {
    assert_eq!(parse_args(&args(&["--help"]), None).unwrap(), Invocation::Help);
    assert_eq!(parse_args(&args(&["-V"]), None).unwrap(), Invocation::Version);
}

#[test]
fn malformed_arguments_are_rejected() {
    assert_eq!(
        parse_args(&args(&["--frobnicate"]), None).unwrap_err(),
        "unknown option '--frobnicate'"
    );
    assert_eq!(
        parse_args(&args(&["--depth=many"]), None).unwrap_err(),
        "invalid depth 'many'"
    );
    assert_eq!(
        parse_args(&args(&["-I"]), None).unwrap_err(),
        "-I needs a search path entry"
    );
    assert_eq!(
        parse_args(&args(&["1", "2"]), None).unwrap_err(),
        "unexpected argument '2'"
    );
}
