//! Nix C API call table.
//!
//! This crate is the complete contract between the value bridge and the
//! native evaluator/store library. It has three parts:
//!
//! - **Raw codes**: the `nix_err` return codes and the `ValueType` tags,
//!   exactly as the C headers number them.
//! - **[`NixApi`]**: one trait method per C function, same names, same
//!   parameter order. Pointer parameters become associated handle types and
//!   C strings become `&CStr`, so the same table can be served by the real
//!   library or by an in-process implementation.
//! - **`ffi`** (feature `native`): the `extern "C"` declarations and
//!   [`ffi::NativeLib`], the `NixApi` implementation that calls them.
//!
//! # Error Contexts
//!
//! Every method whose first parameter is a context is fallible: the callee
//! resets the context on entry and records a code and message on failure.
//! The returned value is only meaningful when [`NixApi::nix_err_code`]
//! reports [`NIX_OK`] afterwards. Methods without a context never fail.

mod api;

#[cfg(feature = "native")]
#[allow(unsafe_code, reason = "extern \"C\" declarations and calls into libnix*")]
pub mod ffi;

use std::os::raw::c_int;

pub use api::NixApi;

// ── Error codes ─────────────────────────────────────────────────────────

/// Return code of every fallible native call (`nix_err`).
pub type NixErr = c_int;

/// The call succeeded.
pub const NIX_OK: NixErr = 0;
/// An unknown error occurred.
pub const NIX_ERR_UNKNOWN: NixErr = -1;
/// A caller-supplied buffer was too small for the result.
pub const NIX_ERR_OVERFLOW: NixErr = -2;
/// A key (attribute name, list index) was not found.
pub const NIX_ERR_KEY: NixErr = -3;
/// The evaluator raised an error (parse error, failed assertion, `throw`, ...).
pub const NIX_ERR_NIX_ERROR: NixErr = -4;

// ── Value type tags ─────────────────────────────────────────────────────

/// Type tag returned by `nix_get_type` (`ValueType` in the C headers).
pub type ValueType = c_int;

pub const NIX_TYPE_THUNK: ValueType = 0;
pub const NIX_TYPE_INT: ValueType = 1;
pub const NIX_TYPE_FLOAT: ValueType = 2;
pub const NIX_TYPE_BOOL: ValueType = 3;
pub const NIX_TYPE_STRING: ValueType = 4;
pub const NIX_TYPE_PATH: ValueType = 5;
pub const NIX_TYPE_NULL: ValueType = 6;
pub const NIX_TYPE_ATTRS: ValueType = 7;
pub const NIX_TYPE_LIST: ValueType = 8;
pub const NIX_TYPE_FUNCTION: ValueType = 9;
pub const NIX_TYPE_EXTERNAL: ValueType = 10;
