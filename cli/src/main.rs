//! `fetch <host>`: print the raw response to `GET /` from `host`.
//!
//! Exit status is 0 on success, 1 when the fetch itself failed (lookup,
//! connect, send, cancel) and 2 for anything else that went wrong in the
//! process.

mod cli;

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use fetch_core::{Fetcher, Outcome};
use tracing::debug;

use crate::cli::Cli;

const EXIT_SUCCESS: u8 = 0;
const EXIT_FETCH_FAILED: u8 = 1;
const EXIT_OTHER_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("failed to start runtime: {err}");
            return ExitCode::from(EXIT_OTHER_FAILURE);
        }
    };

    let fetcher = Fetcher::new(runtime.handle().clone()).with_config(cli.fetch_config());
    let handle = fetcher.fetch(&cli.host);
    debug!(id = %handle.id(), "waiting for response");

    let code = report(handle.wait(), &mut std::io::stdout().lock());
    ExitCode::from(code)
}

/// Write a successful response to `out` and pick the exit status.
fn report(outcome: Outcome, out: &mut impl Write) -> u8 {
    match outcome {
        Ok(bytes) => match out.write_all(&bytes).and_then(|()| out.flush()) {
            Ok(()) => EXIT_SUCCESS,
            Err(err) => {
                eprintln!("failed to write response: {err}");
                EXIT_OTHER_FAILURE
            }
        },
        Err(err) => {
            eprintln!("fetch failed: {err}");
            EXIT_FETCH_FAILED
        }
    }
}
