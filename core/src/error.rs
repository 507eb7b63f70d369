//! Error taxonomy for a single fetch.
//!
//! # Design
//! Every variant is terminal for the fetch that produced it. Only connect
//! failures are retried (against the next candidate endpoint) and that retry
//! happens inside the pipeline, so by the time a `FetchError` reaches the
//! caller there is nothing left to try.

use std::io;

use thiserror::Error;

/// Failure reasons delivered through a `FetchHandle`.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Name lookup failed before producing any endpoint.
    #[error("failed to resolve host {host}: {source}")]
    Resolution {
        host: String,
        #[source]
        source: io::Error,
    },

    /// Name lookup succeeded but returned no endpoints.
    #[error("no addresses found for host {host}")]
    NoAddresses { host: String },

    /// Every candidate endpoint refused the connection.
    #[error("unable to connect to any address of {host} ({attempts} tried)")]
    AllConnectionsFailed { host: String, attempts: usize },

    /// The request could not be written to an established connection.
    #[error("failed to send request: {0}")]
    Send(#[source] io::Error),

    /// The fetch was cancelled through its handle before completing.
    #[error("fetch cancelled")]
    Cancelled,

    /// The pipeline went away without committing an outcome, e.g. because
    /// the runtime driving it was shut down.
    #[error("fetch abandoned before completion")]
    Abandoned,
}

impl FetchError {
    /// True for both resolution-phase failures (`Resolution`, `NoAddresses`).
    pub fn is_resolution(&self) -> bool {
        matches!(self, FetchError::Resolution { .. } | FetchError::NoAddresses { .. })
    }
}
