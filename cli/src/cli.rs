//! Command-line arguments.

use clap::Parser;
use tracing::Level;

use fetch_core::FetchConfig;

/// Fetch `/` from a host over plain HTTP and print the raw response,
/// headers included.
#[derive(Debug, Parser)]
#[command(name = "fetch", version)]
pub struct Cli {
    /// Host name to fetch from
    pub host: String,

    /// TCP port to connect to
    #[arg(short, long, default_value_t = fetch_core::http::DEFAULT_PORT)]
    pub port: u16,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn log_level(&self) -> Level {
        match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            port: self.port,
            ..FetchConfig::default()
        }
    }
}
