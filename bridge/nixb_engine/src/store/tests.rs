#![expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;

use super::path::{check_store_path, compress_hash, to_base32, HASH_LEN};
use super::{DerivationSpec, StoreDb, StoreUri, DEFAULT_STORE_DIR};

fn hello() -> DerivationSpec {
    DerivationSpec {
        name: "hello".to_owned(),
        system: "x86_64-linux".to_owned(),
        builder: "/bin/sh".to_owned(),
        args: vec!["-c".to_owned(), "echo hi > $out".to_owned()],
        env: BTreeMap::from([("name".to_owned(), "hello".to_owned())]),
        outputs: vec!["out".to_owned()],
    }
}

#[test]
fn base32_uses_nix_alphabet() {
    assert_eq!(to_base32(&[0u8; 20]), "0".repeat(32));
    assert_eq!(to_base32(&[0xff]), "7z");
    assert_eq!(to_base32(&[]), "");
    assert!(!to_base32(&[0xab; 20]).contains(['e', 'o', 'u', 't']));
}

#[test]
fn compress_hash_folds_by_xor() {
    assert_eq!(compress_hash(&[1, 2, 4, 8], 2), vec![1 ^ 4, 2 ^ 8]);
}

#[test]
fn uri_parsing_and_rendering() {
    for (input, rendered) in [
        ("", "auto"),
        ("auto", "auto"),
        ("local", "local"),
        ("daemon", "daemon"),
        ("dummy://", "dummy://"),
        ("memory://?store=/tmp/s&x=1", "memory://?store=/tmp/s&x=1"),
    ] {
        assert_eq!(StoreUri::parse(input).unwrap().render(), rendered, "{input}");
    }
    let err = StoreUri::parse("ssh://host").unwrap_err();
    assert_eq!(
        err.message,
        "don't know how to open Nix store with URI 'ssh://host'"
    );
    assert!(StoreUri::parse("dummy://junk").is_err());
}

#[test]
fn params_override_the_query() {
    let params = [("store".to_owned(), "/alt/store/".to_owned())];
    let db = StoreDb::open("dummy://?store=/ignored", &params).unwrap();
    assert_eq!(db.store_dir(), "/alt/store");
    assert_eq!(db.uri(), "dummy://?store=/alt/store/");
}

#[test]
fn default_store_dir() {
    let db = StoreDb::open("dummy://", &[]).unwrap();
    assert_eq!(db.store_dir(), DEFAULT_STORE_DIR);
}

#[test]
fn store_path_syntax() {
    let hash = "0".repeat(HASH_LEN);
    let good = format!("/nix/store/{hash}-hello-1.0");
    assert_eq!(check_store_path("/nix/store", &good), Ok(()));
    assert_eq!(
        check_store_path("/nix/store", "/tmp/x"),
        Err("not in the store directory")
    );
    assert_eq!(
        check_store_path("/nix/store", &format!("{good}/bin")),
        Err("not a top-level store entry")
    );
    assert_eq!(
        check_store_path("/nix/store", "/nix/store/abc-hello"),
        Err("missing hash part")
    );
    assert_eq!(
        check_store_path("/nix/store", &format!("/nix/store/{}-x", "e".repeat(HASH_LEN))),
        Err("hash part is not base-32")
    );
    assert_eq!(
        check_store_path("/nix/store", &format!("/nix/store/{hash}-.hidden")),
        Err("name must not start with a period")
    );
    assert_eq!(
        check_store_path("/nix/store", &format!("/nix/store/{hash}-a b")),
        Err("name contains a forbidden character")
    );
}

#[test]
fn parse_path_reports_invalid_paths() {
    let db = StoreDb::open("dummy://", &[]).unwrap();
    let err = db.parse_path("/tmp/x").unwrap_err();
    assert_eq!(
        err.message,
        "path '/tmp/x' is not a valid store path: not in the store directory"
    );
}

#[test]
fn derivation_paths_are_stable_and_distinct() {
    let mut db = StoreDb::open("dummy://", &[]).unwrap();
    let first = db.add_derivation(&hello()).unwrap();
    let again = db.add_derivation(&hello()).unwrap();
    assert_eq!(first, again);

    let mut other = hello();
    other.args.push("extra".to_owned());
    let second = db.add_derivation(&other).unwrap();
    assert_ne!(first.drv_path, second.drv_path);
    assert_ne!(first.outputs["out"], second.outputs["out"]);

    assert!(first.drv_path.ends_with("-hello.drv"));
    assert!(db.parse_path(&first.drv_path).is_ok());
    assert!(db.parse_path(&first.outputs["out"]).is_ok());
}

#[test]
fn store_dir_changes_paths() {
    let params = [("store".to_owned(), "/other".to_owned())];
    let mut db = StoreDb::open("dummy://", &params).unwrap();
    let drv = db.add_derivation(&hello()).unwrap();
    assert!(drv.drv_path.starts_with("/other/"));
}

#[test]
fn realise_marks_outputs_valid() {
    let mut db = StoreDb::open("dummy://", &[]).unwrap();
    let mut spec = hello();
    spec.outputs = vec!["out".to_owned(), "dev".to_owned()];
    let drv = db.add_derivation(&spec).unwrap();
    assert!(db.is_valid(&drv.drv_path));
    assert!(!db.is_valid(&drv.outputs["dev"]));

    let built = db.realise(&drv.drv_path).unwrap();
    let names: Vec<&str> = built.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, ["dev", "out"]);
    assert!(db.is_valid(&drv.outputs["dev"]));
    assert!(drv.outputs["dev"].ends_with("-hello-dev"));

    // Already valid, not a derivation: nothing to build.
    assert_eq!(db.realise(&drv.outputs["out"]).unwrap(), Vec::<(String, String)>::new());
}

#[test]
fn realise_rejects_unknown_paths() {
    let mut db = StoreDb::open("dummy://", &[]).unwrap();
    let path = format!("/nix/store/{}-missing", "0".repeat(HASH_LEN));
    let err = db.realise(&path).unwrap_err();
    assert_eq!(err.message, format!("path '{path}' is not valid"));
}

#[test]
fn invalid_derivation_names_are_rejected() {
    let mut db = StoreDb::open("dummy://", &[]).unwrap();
    let mut spec = hello();
    spec.name = "bad name".to_owned();
    assert!(db.add_derivation(&spec).is_err());
}
