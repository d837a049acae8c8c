//! Value type tags.

use std::fmt;

use nixb_sys::ValueType;

/// The type of an evaluator value, as reported by `nix_get_type`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Thunk,
    Int,
    Float,
    Bool,
    String,
    Path,
    Null,
    Attrs,
    List,
    Function,
    External,
}

impl ValueKind {
    /// Indexed by the native tag.
    const BY_TAG: [ValueKind; 11] = [
        ValueKind::Thunk,
        ValueKind::Int,
        ValueKind::Float,
        ValueKind::Bool,
        ValueKind::String,
        ValueKind::Path,
        ValueKind::Null,
        ValueKind::Attrs,
        ValueKind::List,
        ValueKind::Function,
        ValueKind::External,
    ];

    pub fn from_tag(tag: ValueType) -> Option<Self> {
        usize::try_from(tag)
            .ok()
            .and_then(|i| Self::BY_TAG.get(i).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Thunk => "thunk",
            ValueKind::Int => "int",
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::String => "string",
            ValueKind::Path => "path",
            ValueKind::Null => "null",
            ValueKind::Attrs => "attrs",
            ValueKind::List => "list",
            ValueKind::Function => "function",
            ValueKind::External => "external",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
