//! Lookup keys and key iteration.

use std::fmt;
use std::ops::Range;

use nixb_sys::NixApi;

use super::Value;
use crate::error::{Error, Result};

/// A list index or an attribute name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Index(i64),
    Name(String),
}

impl Key {
    /// The key as a list index. Names that spell an integer count.
    pub fn as_index(&self) -> Option<i64> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(name) => name.parse().ok(),
        }
    }

    /// The key as an attribute name. Indices are spelled in decimal.
    pub fn to_name(&self) -> String {
        match self {
            Key::Index(i) => i.to_string(),
            Key::Name(name) => name.clone(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for Key {
    fn from(i: i64) -> Self {
        Key::Index(i)
    }
}

impl From<i32> for Key {
    fn from(i: i32) -> Self {
        Key::Index(i64::from(i))
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i64::try_from(i).unwrap_or(i64::MAX))
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_owned())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

/// Keys of a list or attribute set, from [`Value::keys`].
///
/// List indices can be iterated again by cloning before use. Attribute
/// names are fetched from the native side one by one, so that iteration is
/// single-pass and each step can fail.
pub enum Keys<A: NixApi> {
    Indices(Range<usize>),
    Names {
        value: Value<A>,
        next: u32,
        size: u32,
    },
}

impl<A: NixApi> Clone for Keys<A> {
    fn clone(&self) -> Self {
        match self {
            Keys::Indices(range) => Keys::Indices(range.clone()),
            Keys::Names { value, next, size } => Keys::Names {
                value: value.clone(),
                next: *next,
                size: *size,
            },
        }
    }
}

impl<A: NixApi> Iterator for Keys<A> {
    type Item = Result<Key>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Keys::Indices(range) => range.next().map(|i| Ok(Key::from(i))),
            Keys::Names { value, next, size } => {
                if *next >= *size {
                    return None;
                }
                let index = *next;
                *next += 1;
                Some(value.attr_at(index).map(|(name, _)| Key::Name(name)))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self {
            Keys::Indices(range) => range.size_hint(),
            Keys::Names { next, size, .. } => {
                let left = usize::try_from(size.saturating_sub(*next)).unwrap_or(usize::MAX);
                (left, Some(left))
            }
        }
    }
}

impl<A: NixApi> fmt::Debug for Keys<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Keys::Indices(range) => f.debug_tuple("Indices").field(range).finish(),
            Keys::Names { next, size, .. } => f
                .debug_struct("Names")
                .field("next", next)
                .field("size", size)
                .finish_non_exhaustive(),
        }
    }
}

/// The list index `key` stands for.
pub(crate) fn index_of(key: &Key) -> Result<i64> {
    key.as_index().ok_or_else(|| Error::NonIntegerIndex {
        key: key.to_string(),
    })
}
