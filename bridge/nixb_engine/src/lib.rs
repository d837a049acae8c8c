//! In-process reference implementation of the Nix C API call table.
//!
//! [`Engine`] implements [`nixb_sys::NixApi`] without linking the native
//! libraries: a small lazy evaluator for a subset of the Nix language and an
//! in-memory store stand behind the same functions, error contexts and
//! reference counts the C API exposes. It exists so that everything built on
//! the call table can be exercised end to end on machines without Nix.
//!
//! # Handles
//!
//! Every handle is an index plus a generation into a per-kind table, so a
//! stale handle (used after free, freed twice) is reported as
//! `NIX_ERR_UNKNOWN` on fallible calls and ignored by release calls, where
//! the real library would have undefined behavior.
//!
//! # Language subset
//!
//! Literals (integers, floats, strings, paths, `<search-path>` lookups),
//! attribute sets (with `rec`, nested paths, `inherit`), lists, `let`,
//! `with`, `if`, `assert`, lambdas with plain and pattern parameters,
//! application, selection with `or`, `?`, the arithmetic, comparison, list,
//! update and Boolean operators, and a core set of `builtins` including
//! `derivation` and `import`. String interpolation is not supported.

mod api;
mod errors;
mod eval;
mod stack;
mod store;
mod syntax;
mod table;

pub use api::{Engine, LiveHandles};
pub use errors::NativeError;

use table::RawId;

/// Version reported by `nix_version_get`.
pub const NIX_VERSION: &str = "2.24.0-nixb";

macro_rules! handles {
    ($($(#[$doc:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$doc])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
            pub struct $name(RawId);
        )*
    };
}

handles! {
    /// Error context (`nix_c_context *`).
    ContextId,
    /// Open store (`Store *`).
    StoreId,
    /// Parsed store path (`StorePath *`).
    StorePathId,
    /// Evaluation state (`EvalState *`).
    StateId,
    /// Value slot (`Value *`).
    ValueId,
    /// Bindings builder (`BindingsBuilder *`).
    BuilderId,
}

/// Opaque host object stored in an external value. The engine never looks
/// inside; it only hands the tag back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ExternalId(u64);

impl ExternalId {
    pub fn new(tag: u64) -> Self {
        ExternalId(tag)
    }

    pub fn tag(self) -> u64 {
        self.0
    }
}
