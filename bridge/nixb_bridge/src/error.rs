//! Bridge errors.
//!
//! Native failures arrive as a `nix_err` code plus the message read back
//! from the failing context; [`Error::from_native`] maps the code. Errors the
//! bridge detects itself (wrong value kind, bad index, unconvertible host
//! data) never touch the native library.

use nixb_sys::{NixErr, ValueType, NIX_ERR_KEY, NIX_ERR_NIX_ERROR, NIX_ERR_OVERFLOW};
use thiserror::Error;

use crate::value::ValueKind;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// `NIX_ERR_UNKNOWN`, or a code the bridge does not know.
    #[error("{message}")]
    Unknown { code: NixErr, message: String },

    /// `NIX_ERR_OVERFLOW`: a fixed-size buffer was too small.
    #[error("{message}")]
    Overflow { message: String },

    /// `NIX_ERR_KEY`
    #[error("{message}")]
    KeyNotFound { message: String },

    /// `NIX_ERR_NIX_ERROR`: the evaluator or store raised an error.
    #[error("{message}")]
    Evaluator { message: String },

    #[error("cannot open store '{uri}': {source}")]
    StoreOpen {
        uri: String,
        #[source]
        source: Box<Error>,
    },

    /// The operation does not apply to a value of this kind.
    #[error("{operation} is not supported on a value of type {kind}")]
    Type {
        operation: &'static str,
        kind: ValueKind,
    },

    /// A list lookup with a key that is not an integer.
    #[error("list index must be an integer, got '{key}'")]
    NonIntegerIndex { key: String },

    #[error("list index {index} out of range (length {len})")]
    Range { index: i64, len: usize },

    /// Host data with no native representation.
    #[error("cannot convert {what}: {reason}")]
    Conversion { what: &'static str, reason: String },

    /// A shallow read observed a value that is still a thunk.
    #[error("value is an unforced thunk")]
    UnforcedThunk,

    #[error("unknown value type tag {0}")]
    UnknownType(ValueType),
}

/// Coarse classification of [`Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unknown,
    Overflow,
    KeyNotFound,
    Evaluator,
    StoreOpen,
    Type,
    Range,
    Conversion,
    Internal,
}

impl Error {
    /// Map a failing native code and its message.
    pub fn from_native(code: NixErr, message: String) -> Self {
        match code {
            NIX_ERR_OVERFLOW => Error::Overflow { message },
            NIX_ERR_KEY => Error::KeyNotFound { message },
            NIX_ERR_NIX_ERROR => Error::Evaluator { message },
            _ => Error::Unknown { code, message },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unknown { .. } => ErrorKind::Unknown,
            Error::Overflow { .. } => ErrorKind::Overflow,
            Error::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Error::Evaluator { .. } => ErrorKind::Evaluator,
            Error::StoreOpen { .. } => ErrorKind::StoreOpen,
            Error::Type { .. } | Error::NonIntegerIndex { .. } => ErrorKind::Type,
            Error::Range { .. } => ErrorKind::Range,
            Error::Conversion { .. } => ErrorKind::Conversion,
            Error::UnforcedThunk | Error::UnknownType(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn conversion(what: &'static str, reason: impl Into<String>) -> Self {
        Error::Conversion {
            what,
            reason: reason.into(),
        }
    }

    pub(crate) fn interior_nul(what: &'static str) -> Self {
        Error::conversion(what, "contains a NUL byte")
    }
}
