//! Entry point for starting fetches.
//!
//! # Design
//! `Fetcher` holds only shared, immutable pieces: the resolver, the
//! connector, a `FetchConfig` and a handle to the tokio runtime that will
//! drive the pipelines. Each call to `fetch` builds a fresh `FetchPipeline`
//! with its own state, spawns it, and hands back the read side of its result
//! cell. Nothing mutable is shared between fetches, so any number of them
//! can run concurrently on the same runtime.

use std::sync::Arc;

use tokio::runtime::Handle;

use crate::cell::{result_cell, FetchHandle};
use crate::connect::{Connect, TcpConnector};
use crate::http::{HostSpec, DEFAULT_PORT};
use crate::pipeline::FetchPipeline;
use crate::resolve::{Resolve, SystemResolver};
use crate::types::FetchId;

/// Read size of the original blocking client.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Tunables applied to every fetch started by a `Fetcher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchConfig {
    /// Port paired with the host name when resolving.
    pub port: u16,
    /// Bytes requested from the connection per read.
    pub read_buffer_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

/// Starts fetches on a tokio runtime.
#[derive(Debug)]
pub struct Fetcher<R = SystemResolver, C = TcpConnector> {
    resolver: Arc<R>,
    connector: Arc<C>,
    config: FetchConfig,
    runtime: Handle,
}

impl<R, C> Clone for Fetcher<R, C> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            connector: Arc::clone(&self.connector),
            config: self.config,
            runtime: self.runtime.clone(),
        }
    }
}

impl Fetcher {
    /// System resolver, plain TCP, default config.
    pub fn new(runtime: Handle) -> Self {
        Self::with_parts(SystemResolver, TcpConnector, FetchConfig::default(), runtime)
    }
}

impl<R: Resolve, C: Connect> Fetcher<R, C> {
    pub fn with_parts(resolver: R, connector: C, config: FetchConfig, runtime: Handle) -> Self {
        Self {
            resolver: Arc::new(resolver),
            connector: Arc::new(connector),
            config,
            runtime,
        }
    }

    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Start fetching `/` from `host`. Returns immediately; the outcome is
    /// delivered through the handle.
    pub fn fetch(&self, host: &str) -> FetchHandle {
        let id = FetchId::new();
        let spec = HostSpec::with_port(host, self.config.port);
        let (completer, handle) = result_cell(id, self.runtime.clone());
        let pipeline = FetchPipeline::new(
            id,
            spec,
            Arc::clone(&self.resolver),
            Arc::clone(&self.connector),
            self.config,
        );
        tracing::debug!(%id, host, "spawning fetch");
        self.runtime.spawn(pipeline.run(completer));
        handle
    }
}
