//! The front end driven in-process against the reference engine.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::io::Cursor;

use nixb::{run, CliError, Options};
use nixb_bridge::ErrorKind;
use nixb_engine::Engine;
use pretty_assertions::assert_eq;

struct Output {
    out: String,
    err: String,
}

fn options(expr: Option<&str>) -> Options {
    let mut options = Options::new("dummy://".to_string());
    options.origin = Some("/".to_string());
    options.expr = expr.map(str::to_string);
    options
}

fn invoke(options: &Options, input: &str) -> (Result<(), CliError>, Output) {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let result = run(
        Engine::new(),
        options,
        &mut Cursor::new(input.as_bytes()),
        &mut out,
        &mut err,
        false,
    );
    let output = Output {
        out: String::from_utf8(out).unwrap(),
        err: String::from_utf8(err).unwrap(),
    };
    (result, output)
}

#[test]
fn evaluates_an_expression_argument() {
    let (result, output) = invoke(&options(Some(r#"{ a = 1; b = "x"; }"#)), "");

    result.unwrap();
    assert_eq!(output.out, "{ a = 1; b = \"x\"; }\n");
    assert_eq!(output.err, "");
}

#[test]
fn evaluation_failure_is_an_error() {
    let (result, output) = invoke(&options(Some("1 + true")), "");

    let Err(CliError::Bridge(err)) = result else {
        panic!("expected a bridge error");
    };
    assert_eq!(err.kind(), ErrorKind::Evaluator);
    assert_eq!(output.out, "");
}

#[test]
fn bad_store_is_reported() {
    let mut options = options(Some("1"));
    options.store = "bogus://".to_string();

    let (result, _) = invoke(&options, "");

    assert!(result
        .unwrap_err()
        .to_string()
        .starts_with("cannot open store 'bogus://'"));
}

#[test]
fn deep_printing_forces_everything() {
    let mut lazy = options(Some(r#"{ a = [ 1 { b = throw "hidden"; } ]; }"#));
    lazy.depth = 1;
    let (result, output) = invoke(&lazy, "");
    result.unwrap();
    assert_eq!(output.out, "{ a = [ … ]; }\n");

    lazy.deep = true;
    lazy.depth = usize::MAX;
    let (result, _) = invoke(&lazy, "");
    assert_eq!(result.unwrap_err().to_string(), "hidden");
}

#[test]
fn repl_keeps_going_after_errors() {
    let input = "1 + 1\n\nthrow \"boom\"\n:t [ ]\n:nope\n[ 1 2 ]\n:q\n99\n";

    let (result, output) = invoke(&options(None), input);

    result.unwrap();
    assert_eq!(output.out, "2\na list\n[ 1 2 ]\n");
    assert_eq!(output.err, "error: boom\nerror: unknown command ':nope'\n");
}

#[test]
fn repl_stops_at_end_of_input() {
    let (result, output) = invoke(&options(None), "\"last\"");

    result.unwrap();
    assert_eq!(output.out, "\"last\"\n");
}

#[test]
fn search_path_reaches_imports() {
    let dir = std::env::temp_dir().join(format!("nixb-cli-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("two.nix"), "1 + 1").unwrap();
    let mut options = options(Some("import <here/two.nix>"));
    options.search_path.push(format!("here={}", dir.display()));

    let (result, output) = invoke(&options, "");

    result.unwrap();
    assert_eq!(output.out, "2\n");
    std::fs::remove_dir_all(&dir).ok();
}
