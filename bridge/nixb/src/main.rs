//! nixb command line.

use std::io::IsTerminal;
use std::process::ExitCode;

use nixb::{parse_args, usage, Invocation, STORE_ENV};
use nixb_sys::NixApi;

#[cfg(feature = "native")]
fn backend() -> nixb_sys::ffi::NativeLib {
    nixb_sys::ffi::NativeLib::new()
}

#[cfg(not(feature = "native"))]
fn backend() -> nixb_engine::Engine {
    nixb_engine::Engine::new()
}

fn main() -> ExitCode {
    nixb::init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match parse_args(&args, std::env::var(STORE_ENV).ok()) {
        Ok(invocation) => invocation,
        Err(message) => {
            eprintln!("error: {message}");
            eprintln!();
            eprint!("{}", usage());
            return ExitCode::FAILURE;
        }
    };

    match invocation {
        Invocation::Help => {
            print!("{}", usage());
            ExitCode::SUCCESS
        }
        Invocation::Version => {
            println!(
                "nixb {} (nix {})",
                env!("CARGO_PKG_VERSION"),
                backend().nix_version_get()
            );
            ExitCode::SUCCESS
        }
        Invocation::Run(options) => {
            let stdin = std::io::stdin();
            let prompt = stdin.is_terminal();
            let result = nixb::run(
                backend(),
                &options,
                &mut stdin.lock(),
                &mut std::io::stdout().lock(),
                &mut std::io::stderr().lock(),
                prompt,
            );
            match result {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
