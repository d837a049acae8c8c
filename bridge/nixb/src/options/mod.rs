//! Command line options.

#[cfg(test)]
mod tests;

/// Environment variable consulted when `--store` is not given.
pub const STORE_ENV: &str = "NIXB_STORE";

/// Default nesting shown when printing without `--deep`.
pub const DEFAULT_DEPTH: usize = 2;

/// What the command line asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invocation {
    Help,
    Version,
    Run(Options),
}

/// Options of an evaluation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Store URI (--store=URI, else `NIXB_STORE`, else the default store)
    pub store: String,
    /// Directory relative paths resolve against (--origin=DIR)
    pub origin: Option<String>,
    /// Search path entries, in order (-I ENTRY, --include=ENTRY)
    pub search_path: Vec<String>,
    /// Force the whole value before printing (--deep)
    pub deep: bool,
    /// Nesting printed before containers are elided (--depth=N)
    pub depth: usize,
    /// Expression to evaluate; none starts the REPL
    pub expr: Option<String>,
}

impl Options {
    pub fn new(store: String) -> Self {
        Options {
            store,
            origin: None,
            search_path: Vec::new(),
            deep: false,
            depth: DEFAULT_DEPTH,
            expr: None,
        }
    }
}

/// Parse the arguments after the program name. `env_store` is the value of
/// [`STORE_ENV`], if set.
pub fn parse_args(args: &[String], env_store: Option<String>) -> Result<Invocation, String> {
    let mut options = Options::new(env_store.unwrap_or_default());
    let mut depth_given = false;
    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        if arg == "-h" || arg == "--help" {
            return Ok(Invocation::Help);
        } else if arg == "-V" || arg == "--version" {
            return Ok(Invocation::Version);
        } else if let Some(uri) = arg.strip_prefix("--store=") {
            options.store = uri.to_string();
        } else if let Some(dir) = arg.strip_prefix("--origin=") {
            options.origin = Some(dir.to_string());
        } else if let Some(entry) = arg.strip_prefix("--include=") {
            options.search_path.push(entry.to_string());
        } else if arg == "-I" {
            let Some(entry) = args.get(i + 1) else {
                return Err("-I needs a search path entry".to_string());
            };
            options.search_path.push(entry.clone());
            i += 1;
        } else if arg == "--deep" {
            options.deep = true;
        } else if let Some(depth) = arg.strip_prefix("--depth=") {
            options.depth = depth
                .parse()
                .map_err(|_| format!("invalid depth '{depth}'"))?;
            depth_given = true;
        } else if arg.starts_with('-') {
            return Err(format!("unknown option '{arg}'"));
        } else if options.expr.is_none() {
            options.expr = Some(arg.clone());
        } else {
            return Err(format!("unexpected argument '{arg}'"));
        }
        i += 1;
    }
    if options.deep && !depth_given {
        options.depth = usize::MAX;
    }
    Ok(Invocation::Run(options))
}

pub fn usage() -> &'static str {
    "\
Usage: nixb [options] [EXPR]

Evaluate EXPR and print the result, or start a REPL when no expression is
given.

Options:
  --store=URI        Store to open (default: $NIXB_STORE, else the default store)
  --origin=DIR       Directory relative paths resolve against (default: cwd)
  -I ENTRY           Add a search path entry, `prefix=path` or `path`
  --include=ENTRY    Same as -I
  --deep             Force the whole value and print it without elision
  --depth=N          Print N levels of nesting (default: 2)
  -h, --help         Show this message
  -V, --version      Show versions

REPL commands:
  :t EXPR            Show the type of EXPR
  :q                 Quit
"
}
