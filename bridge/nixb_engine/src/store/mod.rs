//! In-memory store.
//!
//! Holds the set of valid paths and the derivations instantiated by the
//! evaluator. "Building" a derivation registers its outputs as valid.

mod path;

#[cfg(test)]
mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

pub(crate) use path::{check_name, make_store_path, sha256_hex};

use crate::errors::{invalid_store_path, path_not_valid, unknown_store_uri, NativeResult};

pub(crate) const DEFAULT_STORE_DIR: &str = "/nix/store";

/// Version reported by `nix_store_get_version`.
pub(crate) const STORE_VERSION: &str = "2.24.0-nixb";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Scheme {
    Auto,
    Local,
    Daemon,
    Dummy,
    Memory,
}

/// A parsed store URI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StoreUri {
    scheme: Scheme,
    query: Vec<(String, String)>,
}

impl StoreUri {
    pub(crate) fn parse(uri: &str) -> NativeResult<Self> {
        let (scheme, query) = match uri {
            "" | "auto" => (Scheme::Auto, ""),
            "local" => (Scheme::Local, ""),
            "daemon" => (Scheme::Daemon, ""),
            _ => {
                let (scheme, rest) = if let Some(rest) = uri.strip_prefix("dummy://") {
                    (Scheme::Dummy, rest)
                } else if let Some(rest) = uri.strip_prefix("memory://") {
                    (Scheme::Memory, rest)
                } else {
                    return Err(unknown_store_uri(uri));
                };
                match rest.strip_prefix('?') {
                    Some(query) => (scheme, query),
                    None if rest.is_empty() => (scheme, ""),
                    None => return Err(unknown_store_uri(uri)),
                }
            }
        };
        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_owned(), v.to_owned()),
                None => (pair.to_owned(), String::new()),
            })
            .collect();
        Ok(StoreUri { scheme, query })
    }

    fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Canonical rendering, as reported by `nix_store_get_uri`.
    pub(crate) fn render(&self) -> String {
        let mut out = match self.scheme {
            Scheme::Auto => return "auto".to_owned(),
            Scheme::Local => return "local".to_owned(),
            Scheme::Daemon => return "daemon".to_owned(),
            Scheme::Dummy => String::from("dummy://"),
            Scheme::Memory => String::from("memory://"),
        };
        for (i, (k, v)) in self.query.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            let _ = write!(out, "{k}={v}");
        }
        out
    }
}

/// Inputs of a derivation, as collected by `builtins.derivation`.
#[derive(Clone, Debug, Default)]
pub(crate) struct DerivationSpec {
    pub name: String,
    pub system: String,
    pub builder: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub outputs: Vec<String>,
}

/// An instantiated derivation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Derivation {
    pub drv_path: String,
    /// Output name to output path.
    pub outputs: BTreeMap<String, String>,
}

pub(crate) struct StoreDb {
    uri: StoreUri,
    store_dir: String,
    valid: BTreeSet<String>,
    derivations: BTreeMap<String, Derivation>,
}

impl StoreDb {
    /// Open a store. `params` override query parameters of the same name.
    pub(crate) fn open(uri: &str, params: &[(String, String)]) -> NativeResult<Self> {
        let mut parsed = StoreUri::parse(uri)?;
        for (key, value) in params {
            parsed.query.retain(|(k, _)| k != key);
            parsed.query.push((key.clone(), value.clone()));
        }
        let store_dir = parsed
            .param("store")
            .map_or_else(|| DEFAULT_STORE_DIR.to_owned(), |dir| dir.trim_end_matches('/').to_owned());
        tracing::debug!(uri = %parsed.render(), store_dir = %store_dir, "opened store");
        Ok(StoreDb {
            uri: parsed,
            store_dir,
            valid: BTreeSet::new(),
            derivations: BTreeMap::new(),
        })
    }

    pub(crate) fn uri(&self) -> String {
        self.uri.render()
    }

    pub(crate) fn store_dir(&self) -> &str {
        &self.store_dir
    }

    /// Validate the syntax of a store path.
    pub(crate) fn parse_path(&self, path: &str) -> NativeResult<String> {
        path::check_store_path(&self.store_dir, path)
            .map_err(|reason| invalid_store_path(path, reason))?;
        Ok(path.to_owned())
    }

    pub(crate) fn is_valid(&self, path: &str) -> bool {
        self.valid.contains(path)
    }

    /// Compute the output and `.drv` paths of `spec` and register the
    /// `.drv` as valid.
    pub(crate) fn add_derivation(&mut self, spec: &DerivationSpec) -> NativeResult<Derivation> {
        check_name(&spec.name).map_err(|reason| invalid_store_path(&spec.name, reason))?;
        let digest = sha256_hex(describe(spec, &BTreeMap::new()).as_bytes());
        let outputs: BTreeMap<String, String> = spec
            .outputs
            .iter()
            .map(|output| {
                let name = if output == "out" {
                    spec.name.clone()
                } else {
                    format!("{}-{output}", spec.name)
                };
                let path = make_store_path(&format!("output:{output}"), &digest, &self.store_dir, &name);
                (output.clone(), path)
            })
            .collect();
        let drv_digest = sha256_hex(describe(spec, &outputs).as_bytes());
        let drv_path = make_store_path(
            "text",
            &drv_digest,
            &self.store_dir,
            &format!("{}.drv", spec.name),
        );
        let derivation = Derivation {
            drv_path: drv_path.clone(),
            outputs,
        };
        tracing::debug!(drv = %drv_path, "instantiated derivation");
        self.valid.insert(drv_path.clone());
        self.derivations.insert(drv_path, derivation.clone());
        Ok(derivation)
    }

    /// Realise `path`: for a derivation, mark its outputs valid and return
    /// them in output-name order; for any other valid path, nothing.
    pub(crate) fn realise(&mut self, path: &str) -> NativeResult<Vec<(String, String)>> {
        if let Some(derivation) = self.derivations.get(path) {
            let outputs: Vec<(String, String)> = derivation
                .outputs
                .iter()
                .map(|(name, out)| (name.clone(), out.clone()))
                .collect();
            for (_, out) in &outputs {
                self.valid.insert(out.clone());
            }
            tracing::debug!(drv = path, outputs = outputs.len(), "built derivation");
            return Ok(outputs);
        }
        if self.is_valid(path) {
            return Ok(Vec::new());
        }
        Err(path_not_valid(path))
    }
}

/// ATerm-like rendering of a derivation, the input of its digests.
fn describe(spec: &DerivationSpec, outputs: &BTreeMap<String, String>) -> String {
    let mut out = String::from("Derive([");
    for (i, name) in spec.outputs.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let path = outputs.get(name).map_or("", String::as_str);
        let _ = write!(out, "({name:?},{path:?})");
    }
    let _ = write!(out, "],{:?},{:?},{:?},[", spec.system, spec.builder, spec.args);
    for (i, (k, v)) in spec.env.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let v = outputs.get(k).map_or(v.as_str(), String::as_str);
        let _ = write!(out, "({k:?},{v:?})");
    }
    out.push_str("])");
    out
}
