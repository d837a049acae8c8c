//! Host-side data.

use std::collections::BTreeMap;
use std::fmt;

use nixb_sys::NixApi;
use num_bigint::BigInt;

use super::Value;
use crate::error::Result;

/// Rust-native data exchanged with the evaluator.
///
/// Reads produce `Value` entries for the children of shallowly read lists
/// and sets; writes accept any variant. `BigInt` exists for callers holding
/// wider integers: it is written as an int when it fits in 64 bits.
pub enum Host<A: NixApi> {
    Null,
    Bool(bool),
    Int(i64),
    BigInt(BigInt),
    Float(f64),
    String(String),
    Path(String),
    List(Vec<Host<A>>),
    Attrs(BTreeMap<String, Host<A>>),
    /// A handle to an evaluator value, not yet materialized.
    Value(Value<A>),
    Function(Function<A>),
    External(External<A>),
}

impl<A: NixApi> Host<A> {
    /// The handle inside `Value` or `Function`, if any.
    pub fn as_value(&self) -> Option<&Value<A>> {
        match self {
            Host::Value(value) | Host::Function(Function(value)) => Some(value),
            _ => None,
        }
    }

    /// Look through `Host::Value` to its shallow contents.
    pub fn resolve(self) -> Result<Host<A>> {
        match self {
            Host::Value(value) => value.get(),
            other => Ok(other),
        }
    }
}

/// A callable evaluator value (a function or a set with `__functor`).
pub struct Function<A: NixApi>(pub(crate) Value<A>);

impl<A: NixApi> Function<A> {
    pub fn value(&self) -> &Value<A> {
        &self.0
    }

    pub fn call(&self, arg: impl Into<Host<A>>) -> Result<Value<A>> {
        self.0.call(arg)
    }

    pub fn call_many<I>(&self, args: I) -> Result<Value<A>>
    where
        I: IntoIterator,
        I::Item: Into<Host<A>>,
    {
        self.0.call_many(args)
    }
}

/// An opaque value created outside the evaluator.
pub struct External<A: NixApi> {
    raw: A::External,
}

impl<A: NixApi> External<A> {
    pub fn from_raw(raw: A::External) -> Self {
        External { raw }
    }

    pub fn raw(&self) -> A::External {
        self.raw
    }
}

// ── Trait impls ─────────────────────────────────────────────────────────

impl<A: NixApi> Clone for Host<A> {
    fn clone(&self) -> Self {
        match self {
            Host::Null => Host::Null,
            Host::Bool(b) => Host::Bool(*b),
            Host::Int(n) => Host::Int(*n),
            Host::BigInt(n) => Host::BigInt(n.clone()),
            Host::Float(f) => Host::Float(*f),
            Host::String(s) => Host::String(s.clone()),
            Host::Path(p) => Host::Path(p.clone()),
            Host::List(items) => Host::List(items.clone()),
            Host::Attrs(attrs) => Host::Attrs(attrs.clone()),
            Host::Value(value) => Host::Value(value.clone()),
            Host::Function(func) => Host::Function(func.clone()),
            Host::External(ext) => Host::External(ext.clone()),
        }
    }
}

impl<A: NixApi> Clone for Function<A> {
    fn clone(&self) -> Self {
        Function(self.0.clone())
    }
}

impl<A: NixApi> Clone for External<A> {
    fn clone(&self) -> Self {
        External { raw: self.raw }
    }
}

/// Handles compare by identity; data compares structurally.
impl<A: NixApi> PartialEq for Host<A>
where
    A::External: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Host::Null, Host::Null) => true,
            (Host::Bool(a), Host::Bool(b)) => a == b,
            (Host::Int(a), Host::Int(b)) => a == b,
            (Host::BigInt(a), Host::BigInt(b)) => a == b,
            (Host::Float(a), Host::Float(b)) => a == b,
            (Host::String(a), Host::String(b)) | (Host::Path(a), Host::Path(b)) => a == b,
            (Host::List(a), Host::List(b)) => a == b,
            (Host::Attrs(a), Host::Attrs(b)) => a == b,
            (Host::Value(a), Host::Value(b)) | (Host::Function(Function(a)), Host::Function(Function(b))) => {
                a.same_handle(b)
            }
            (Host::External(a), Host::External(b)) => a.raw == b.raw,
            _ => false,
        }
    }
}

impl<A: NixApi> fmt::Debug for Host<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Null => f.write_str("Null"),
            Host::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Host::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Host::BigInt(n) => f.debug_tuple("BigInt").field(n).finish(),
            Host::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Host::String(s) => f.debug_tuple("String").field(s).finish(),
            Host::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Host::List(items) => f.debug_tuple("List").field(items).finish(),
            Host::Attrs(attrs) => f.debug_tuple("Attrs").field(attrs).finish(),
            Host::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Host::Function(func) => f.debug_tuple("Function").field(&func.0).finish(),
            Host::External(ext) => f.debug_tuple("External").field(&ext.raw).finish(),
        }
    }
}

impl<A: NixApi> fmt::Debug for Function<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Function").field(&self.0).finish()
    }
}

impl<A: NixApi> fmt::Debug for External<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("External").field(&self.raw).finish()
    }
}

// ── Conversions into Host ───────────────────────────────────────────────

impl<A: NixApi> From<bool> for Host<A> {
    fn from(b: bool) -> Self {
        Host::Bool(b)
    }
}

impl<A: NixApi> From<i64> for Host<A> {
    fn from(n: i64) -> Self {
        Host::Int(n)
    }
}

impl<A: NixApi> From<i32> for Host<A> {
    fn from(n: i32) -> Self {
        Host::Int(i64::from(n))
    }
}

impl<A: NixApi> From<BigInt> for Host<A> {
    fn from(n: BigInt) -> Self {
        Host::BigInt(n)
    }
}

impl<A: NixApi> From<f64> for Host<A> {
    fn from(x: f64) -> Self {
        Host::Float(x)
    }
}

impl<A: NixApi> From<&str> for Host<A> {
    fn from(s: &str) -> Self {
        Host::String(s.to_owned())
    }
}

impl<A: NixApi> From<String> for Host<A> {
    fn from(s: String) -> Self {
        Host::String(s)
    }
}

impl<A: NixApi, T: Into<Host<A>>> From<Vec<T>> for Host<A> {
    fn from(items: Vec<T>) -> Self {
        Host::List(items.into_iter().map(Into::into).collect())
    }
}

impl<A: NixApi, T: Into<Host<A>>> From<Option<T>> for Host<A> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Host::Null, Into::into)
    }
}

impl<A: NixApi> From<Value<A>> for Host<A> {
    fn from(value: Value<A>) -> Self {
        Host::Value(value)
    }
}

impl<A: NixApi> From<&Value<A>> for Host<A> {
    fn from(value: &Value<A>) -> Self {
        Host::Value(value.clone())
    }
}

impl<A: NixApi> From<Function<A>> for Host<A> {
    fn from(func: Function<A>) -> Self {
        Host::Function(func)
    }
}

impl<A: NixApi> From<External<A>> for Host<A> {
    fn from(ext: External<A>) -> Self {
        Host::External(ext)
    }
}
