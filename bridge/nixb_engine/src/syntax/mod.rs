//! Source text to expression arena.

mod ast;
mod lexer;
mod parser;


use std::path::Path;

pub(crate) use ast::{BinaryOp, Binding, ExprArena, ExprId, ExprKind, Param};
pub(crate) use parser::normalize;

use crate::errors::{syntax_error, NativeResult};

/// Parse `source`. `origin` names the source in messages; relative path
/// literals resolve against `base_dir`.
pub(crate) fn parse(source: &str, origin: &str, base_dir: &Path) -> NativeResult<(ExprArena, ExprId)> {
    let tokens = lexer::tokenize(source).map_err(|span| {
        let (line, column) = parser::line_col(source, span.start);
        let text = source.get(span).unwrap_or_default();
        syntax_error(&format!("'{text}'"), origin, line, column)
    })?;
    tracing::trace!(origin, tokens = tokens.len(), "tokenized");
    parser::Parser::new(tokens, source, origin, base_dir).parse_root()
}
