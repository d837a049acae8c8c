//! Rendering values as Nix-like text.
//!
//! Containers are walked through `lookup`, one child at a time, so a child
//! whose evaluation fails is shown in place as `«error: ...»` instead of
//! failing the whole print. Containers nested deeper than the depth limit
//! are elided.

#[cfg(test)]
mod tests;

use std::fmt::Write as _;

use nixb_bridge::{ErrorKind, Host, Result, Value, ValueKind};
use nixb_sys::NixApi;

/// Render `value`, showing `depth` levels of nesting.
pub fn render<A: NixApi>(value: &Value<A>, depth: usize) -> Result<String> {
    let mut out = String::new();
    Printer { out: &mut out }.value(value, depth)?;
    Ok(out)
}

struct Printer<'a> {
    out: &'a mut String,
}

impl Printer<'_> {
    fn value<A: NixApi>(&mut self, value: &Value<A>, depth: usize) -> Result<()> {
        match value.kind()? {
            ValueKind::List => self.list(value, depth),
            ValueKind::Attrs => self.attrs(value, depth),
            ValueKind::Function => {
                self.out.push_str("«lambda»");
                Ok(())
            }
            ValueKind::External => {
                self.out.push_str("«external»");
                Ok(())
            }
            ValueKind::Thunk => {
                self.out.push_str("«thunk»");
                Ok(())
            }
            _ => {
                let host = value.get()?;
                self.scalar(&host);
                Ok(())
            }
        }
    }

    fn scalar<A: NixApi>(&mut self, host: &Host<A>) {
        match host {
            Host::Null => self.out.push_str("null"),
            Host::Bool(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Host::Int(n) => {
                let _ = write!(self.out, "{n}");
            }
            Host::BigInt(n) => {
                let _ = write!(self.out, "{n}");
            }
            Host::Float(x) => {
                let _ = write!(self.out, "{x}");
            }
            Host::String(s) => quote(self.out, s),
            Host::Path(p) => self.out.push_str(p),
            _ => self.out.push_str("«value»"),
        }
    }

    fn list<A: NixApi>(&mut self, list: &Value<A>, depth: usize) -> Result<()> {
        let len = list.len()?;
        if len == 0 {
            self.out.push_str("[ ]");
            return Ok(());
        }
        if depth == 0 {
            self.out.push_str("[ … ]");
            return Ok(());
        }
        self.out.push('[');
        for index in 0..len {
            self.out.push(' ');
            self.child(list.lookup(index), depth - 1)?;
        }
        self.out.push_str(" ]");
        Ok(())
    }

    fn attrs<A: NixApi>(&mut self, set: &Value<A>, depth: usize) -> Result<()> {
        if set.is_empty()? {
            self.out.push_str("{ }");
            return Ok(());
        }
        if depth == 0 {
            self.out.push_str("{ … }");
            return Ok(());
        }
        self.out.push('{');
        for key in set.keys()? {
            let name = key?.to_name();
            self.out.push(' ');
            attr_name(self.out, &name);
            self.out.push_str(" = ");
            self.child(set.lookup(name.as_str()), depth - 1)?;
            self.out.push(';');
        }
        self.out.push_str(" }");
        Ok(())
    }

    /// A container element: evaluation failures are shown, anything else
    /// aborts the print.
    fn child<A: NixApi>(&mut self, child: Result<Option<Value<A>>>, depth: usize) -> Result<()> {
        match child {
            Ok(Some(value)) => match self.value(&value, depth) {
                Err(err) if err.kind() == ErrorKind::Evaluator => {
                    let _ = write!(self.out, "«error: {err}»");
                    Ok(())
                }
                other => other,
            },
            Ok(None) => {
                self.out.push_str("«missing»");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::Evaluator => {
                let _ = write!(self.out, "«error: {err}»");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Write `s` as a double-quoted Nix string.
fn quote(out: &mut String, s: &str) {
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Attribute names that are not plain identifiers are quoted.
fn attr_name(out: &mut String, name: &str) {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '\'' | '-'));
    if plain {
        out.push_str(name);
    } else {
        quote(out, name);
    }
}
