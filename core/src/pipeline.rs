//! The fetch pipeline: resolve, connect with fallback, send, receive.
//!
//! # Design
//! One pipeline instance is one tokio task. It owns everything it touches
//! (host, endpoint cursor, connection, accumulator) and shares only the
//! result cell with its caller. The phases run strictly in order:
//!
//! ```text
//! Resolving -> Connecting(i) -> Sending -> Receiving -> Done
//!      \             \              \
//!       +-------------+--------------+--> Failed
//! ```
//!
//! Suspension points are the resolve call, each connect attempt, the write,
//! and each read. A cancel request is raced against the whole pipeline, so
//! it takes effect at whichever of those the task is parked on.
//!
//! Only connect failures fall through to the next candidate. A failed write
//! ends the fetch; a failed read ends the receive loop and the bytes read so
//! far are the response, because the request asked the server to close.
//!
//! On success the connection outlives the receive loop: it is handed back to
//! `run` and released only after the outcome is committed.

use std::fmt;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Instrument};

use crate::cell::Completer;
use crate::client::FetchConfig;
use crate::connect::Connect;
use crate::error::FetchError;
use crate::http::{HostSpec, HttpRequest};
use crate::resolve::{Endpoints, Resolve};
use crate::types::{FetchId, Outcome};

/// Where a pipeline currently is. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Resolving,
    Connecting(usize),
    Sending,
    Receiving,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Resolving => f.write_str("resolving"),
            Phase::Connecting(i) => write!(f, "connecting({i})"),
            Phase::Sending => f.write_str("sending"),
            Phase::Receiving => f.write_str("receiving"),
            Phase::Done => f.write_str("done"),
        }
    }
}

/// State record of one in-flight fetch.
pub struct FetchPipeline<R, C> {
    id: FetchId,
    spec: HostSpec,
    resolver: Arc<R>,
    connector: Arc<C>,
    config: FetchConfig,
    phase: Phase,
}

impl<R: Resolve, C: Connect> FetchPipeline<R, C> {
    pub fn new(
        id: FetchId,
        spec: HostSpec,
        resolver: Arc<R>,
        connector: Arc<C>,
        config: FetchConfig,
    ) -> Self {
        Self {
            id,
            spec,
            resolver,
            connector,
            config,
            phase: Phase::Resolving,
        }
    }

    /// Drive the pipeline to its single outcome and commit it.
    pub async fn run(self, completer: Completer) {
        let span = tracing::info_span!("fetch", id = %self.id, host = %self.spec);
        let cancel = completer.cancellation();
        let (outcome, connection) = self.run_until_cancelled(cancel).instrument(span).await;
        completer.commit(outcome);
        drop(connection);
    }

    async fn run_until_cancelled(self, cancel: CancellationToken) -> (Outcome, Option<C::Stream>) {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("fetch cancelled");
                (Err(FetchError::Cancelled), None)
            }
            result = self.drive() => match result {
                Ok((response, stream)) => (Ok(response), Some(stream)),
                Err(err) => (Err(err), None),
            },
        }
    }

    async fn drive(mut self) -> Result<(Vec<u8>, C::Stream), FetchError> {
        let mut endpoints = self.resolve().await?;
        let mut stream = self.connect_any(&mut endpoints).await?;
        self.send(&mut stream).await?;
        let response = self.receive(&mut stream).await;
        self.enter(Phase::Done);
        info!(bytes = response.len(), "fetch complete");
        Ok((response, stream))
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "phase transition");
        self.phase = phase;
    }

    async fn resolve(&mut self) -> Result<Endpoints, FetchError> {
        let endpoints = self
            .resolver
            .resolve(&self.spec)
            .await
            .map_err(|source| FetchError::Resolution {
                host: self.spec.host().to_string(),
                source,
            })?;
        if endpoints.is_empty() {
            return Err(FetchError::NoAddresses {
                host: self.spec.host().to_string(),
            });
        }
        debug!(candidates = endpoints.len(), "resolved");
        Ok(endpoints)
    }

    /// Try candidates strictly in order; the first success wins and the
    /// remaining candidates are abandoned.
    async fn connect_any(&mut self, endpoints: &mut Endpoints) -> Result<C::Stream, FetchError> {
        let mut attempts = 0;
        for addr in endpoints {
            self.enter(Phase::Connecting(attempts));
            attempts += 1;
            match self.connector.connect(addr).await {
                Ok(stream) => {
                    debug!(%addr, "connected");
                    return Ok(stream);
                }
                Err(err) => warn!(%addr, error = %err, "failed to connect"),
            }
        }
        Err(FetchError::AllConnectionsFailed {
            host: self.spec.host().to_string(),
            attempts,
        })
    }

    async fn send(&mut self, stream: &mut C::Stream) -> Result<(), FetchError> {
        self.enter(Phase::Sending);
        let request = HttpRequest::root(&self.spec).to_bytes();
        stream.write_all(&request).await.map_err(FetchError::Send)?;
        stream.flush().await.map_err(FetchError::Send)?;
        debug!(bytes = request.len(), "request sent");
        Ok(())
    }

    async fn receive(&mut self, stream: &mut C::Stream) -> Vec<u8> {
        self.enter(Phase::Receiving);
        let mut response = Vec::new();
        let mut buf = vec![0u8; self.config.read_buffer_size.max(1)];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    trace!(n, "read");
                    response.extend_from_slice(&buf[..n]);
                }
                Err(err) => {
                    debug!(error = %err, "read ended with error, treating as end of response");
                    break;
                }
            }
        }
        response
    }
}
