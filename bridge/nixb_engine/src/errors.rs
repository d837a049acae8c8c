//! Errors raised inside the engine.
//!
//! Every failure is a [`NativeError`]: a native return code plus the message
//! that `nix_err_msg` later hands out. Factory functions are the public way
//! to build them, so messages stay consistent across the parser, evaluator,
//! store and call table.

use std::fmt;

use nixb_sys::{NixErr, NIX_ERR_KEY, NIX_ERR_NIX_ERROR, NIX_ERR_OVERFLOW, NIX_ERR_UNKNOWN};

/// An error recorded into a context by a failing call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeError {
    pub code: NixErr,
    pub message: String,
}

pub type NativeResult<T> = Result<T, NativeError>;

impl NativeError {
    pub fn new(code: NixErr, message: impl Into<String>) -> Self {
        NativeError {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for NativeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for NativeError {}

// ── Evaluation ──────────────────────────────────────────────────────────

pub fn eval_error(message: impl Into<String>) -> NativeError {
    NativeError::new(NIX_ERR_NIX_ERROR, message)
}

pub fn syntax_error(unexpected: &str, origin: &str, line: usize, column: usize) -> NativeError {
    eval_error(format!(
        "syntax error, unexpected {unexpected}, at {origin}:{line}:{column}"
    ))
}

pub fn undefined_variable(name: &str) -> NativeError {
    eval_error(format!("undefined variable '{name}'"))
}

pub fn type_mismatch(expected: &str, got: &str) -> NativeError {
    eval_error(format!("value is {got} while {expected} was expected"))
}

pub fn cannot_compare(left: &str, right: &str) -> NativeError {
    eval_error(format!("cannot compare {left} with {right}"))
}

pub fn cannot_coerce(what: &str) -> NativeError {
    eval_error(format!("cannot coerce {what} to a string"))
}

pub fn not_callable(got: &str) -> NativeError {
    eval_error(format!(
        "attempt to call something which is not a function but {got}"
    ))
}

pub fn infinite_recursion() -> NativeError {
    eval_error("infinite recursion encountered")
}

pub fn missing_argument(name: &str) -> NativeError {
    eval_error(format!(
        "function called without required argument '{name}'"
    ))
}

pub fn unexpected_argument(name: &str) -> NativeError {
    eval_error(format!(
        "function called with unexpected argument '{name}'"
    ))
}

pub fn duplicate_attribute(path: &str) -> NativeError {
    eval_error(format!("attribute '{path}' already defined"))
}

pub fn integer_overflow(operation: &str) -> NativeError {
    eval_error(format!("integer overflow in {operation}"))
}

pub fn division_by_zero() -> NativeError {
    eval_error("division by zero")
}

pub fn assertion_failed(condition: &str) -> NativeError {
    eval_error(format!("assertion '{condition}' failed"))
}

pub fn thrown(message: &str) -> NativeError {
    eval_error(message)
}

pub fn aborted(message: &str) -> NativeError {
    eval_error(format!(
        "evaluation aborted with the following error message: '{message}'"
    ))
}

pub fn attribute_not_found(name: &str) -> NativeError {
    eval_error(format!("attribute '{name}' missing"))
}

pub fn list_index_out_of_bounds(index: i64) -> NativeError {
    eval_error(format!("list index {index} is out of bounds"))
}

pub fn not_in_search_path(name: &str) -> NativeError {
    eval_error(format!(
        "file '{name}' was not found in the Nix search path"
    ))
}

pub fn uninitialized_value() -> NativeError {
    NativeError::new(NIX_ERR_UNKNOWN, "value is not initialized")
}

pub fn not_forced() -> NativeError {
    NativeError::new(NIX_ERR_UNKNOWN, "value has not been forced")
}

// ── Access ──────────────────────────────────────────────────────────────

pub fn missing_attribute(name: &str) -> NativeError {
    NativeError::new(NIX_ERR_KEY, format!("attribute '{name}' missing"))
}

pub fn index_out_of_bounds(index: i64, len: usize) -> NativeError {
    NativeError::new(
        NIX_ERR_KEY,
        format!("list index {index} is out of bounds (list has {len} elements)"),
    )
}

// ── Call table misuse ───────────────────────────────────────────────────

pub fn invalid_handle(kind: &str) -> NativeError {
    NativeError::new(NIX_ERR_UNKNOWN, format!("invalid {kind} handle"))
}

pub fn not_initialized(library: &str) -> NativeError {
    NativeError::new(
        NIX_ERR_UNKNOWN,
        format!("{library} has not been initialized"),
    )
}

pub fn invalid_utf8(what: &str) -> NativeError {
    NativeError::new(NIX_ERR_UNKNOWN, format!("{what} is not valid UTF-8"))
}

pub fn interior_nul(what: &str) -> NativeError {
    NativeError::new(NIX_ERR_UNKNOWN, format!("{what} contains a NUL byte"))
}

pub fn buffer_too_small(needed: usize, available: usize) -> NativeError {
    NativeError::new(
        NIX_ERR_OVERFLOW,
        format!("provided buffer too short: need {needed} bytes, have {available}"),
    )
}

pub fn size_overflow(what: &str) -> NativeError {
    NativeError::new(NIX_ERR_OVERFLOW, format!("{what} does not fit in 32 bits"))
}

pub fn builder_consumed() -> NativeError {
    NativeError::new(
        NIX_ERR_UNKNOWN,
        "bindings builder has already been turned into an attribute set",
    )
}

pub fn no_error_message() -> NativeError {
    NativeError::new(NIX_ERR_UNKNOWN, "no error message")
}

// ── Store ───────────────────────────────────────────────────────────────

pub fn unknown_store_uri(uri: &str) -> NativeError {
    eval_error(format!("don't know how to open Nix store with URI '{uri}'"))
}

pub fn invalid_store_path(path: &str, reason: &str) -> NativeError {
    eval_error(format!("path '{path}' is not a valid store path: {reason}"))
}

pub fn path_not_valid(path: &str) -> NativeError {
    eval_error(format!("path '{path}' is not valid"))
}

pub fn cannot_read(path: &str, reason: &str) -> NativeError {
    eval_error(format!("cannot read '{path}': {reason}"))
}
