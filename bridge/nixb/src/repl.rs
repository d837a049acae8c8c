//! Line-oriented read-eval-print loop.

use std::io::{BufRead, Write};

use nixb_sys::NixApi;

use crate::{CliError, Evaluator};

const PROMPT: &str = "nixb> ";

/// Evaluate each input line and print the result. Evaluation errors are
/// reported on `err` and the loop goes on; only I/O failures end it early.
pub fn run<A: NixApi>(
    evaluator: &Evaluator<A>,
    input: &mut impl BufRead,
    out: &mut impl Write,
    err: &mut impl Write,
    prompt: bool,
) -> Result<(), CliError> {
    let mut buf = String::new();
    loop {
        if prompt {
            write!(out, "{PROMPT}")?;
            out.flush()?;
        }
        buf.clear();
        if input.read_line(&mut buf)? == 0 {
            break;
        }
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        if line == ":q" || line == ":quit" {
            break;
        }
        let outcome = if let Some(expr) = line.strip_prefix(":t ") {
            evaluator.type_of(expr)
        } else if line.starts_with(':') {
            writeln!(err, "error: unknown command '{line}'")?;
            continue;
        } else {
            evaluator.show(line)
        };
        match outcome {
            Ok(text) => writeln!(out, "{text}")?,
            Err(e) => {
                tracing::debug!(error = ?e, "evaluation failed");
                writeln!(err, "error: {e}")?;
            }
        }
    }
    Ok(())
}
