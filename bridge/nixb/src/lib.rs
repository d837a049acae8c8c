//! The `nixb` command line front end.
//!
//! Evaluates one expression given on the command line, or runs a REPL over
//! standard input. Generic over the call table so the binary can run on the
//! native libraries (feature `native`) or on the reference engine.

pub mod options;
pub mod printer;
pub mod repl;

use std::io::{BufRead, Write};
use std::sync::Once;

use nixb_bridge::{Session, State};
use nixb_sys::NixApi;

pub use options::{parse_args, usage, Invocation, Options, STORE_ENV};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Bridge(#[from] nixb_bridge::Error),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// An evaluation state plus the options that shape what gets printed.
pub struct Evaluator<A: NixApi> {
    state: State<A>,
    origin: String,
    depth: usize,
    deep: bool,
}

impl<A: NixApi> Evaluator<A> {
    /// Start a session on `api` and set up a state as `options` describe.
    pub fn open(api: A, options: &Options) -> Result<Self, CliError> {
        let origin = match &options.origin {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?.display().to_string(),
        };
        let session = Session::new(api)?;
        let store = session.open_store(&options.store)?;
        let state = options
            .search_path
            .iter()
            .fold(store.state(), |builder, entry| builder.search_path(entry.as_str()))
            .build()?;
        tracing::debug!(store = %options.store, origin = %origin, "evaluator ready");
        Ok(Evaluator {
            state,
            origin,
            depth: options.depth,
            deep: options.deep,
        })
    }

    pub fn state(&self) -> &State<A> {
        &self.state
    }

    /// Evaluate `source` and render the result.
    pub fn show(&self, source: &str) -> nixb_bridge::Result<String> {
        let value = self.state.eval_at(source, &self.origin)?;
        if self.deep {
            value.force_deep()?;
        }
        printer::render(&value, self.depth)
    }

    /// Evaluate `source` and name its type.
    pub fn type_of(&self, source: &str) -> nixb_bridge::Result<String> {
        self.state.eval_at(source, &self.origin)?.type_name()
    }
}

/// Run one invocation: print `options.expr` if given, else the REPL.
pub fn run<A: NixApi>(
    api: A,
    options: &Options,
    input: &mut impl BufRead,
    out: &mut impl Write,
    err: &mut impl Write,
    prompt: bool,
) -> Result<(), CliError> {
    let evaluator = Evaluator::open(api, options)?;
    match &options.expr {
        Some(expr) => {
            let text = evaluator.show(expr)?;
            writeln!(out, "{text}")?;
            Ok(())
        }
        None => repl::run(&evaluator, input, out, err, prompt),
    }
}

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`, if it is set.
/// Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(EnvFilter::from_default_env())
                .init();
        }
    });
}
