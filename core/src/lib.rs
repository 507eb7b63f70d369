//! Asynchronous single-resource HTTP fetch.
//!
//! # Overview
//! Fetches `/` from a named host and returns the raw response bytes,
//! headers included and unparsed. DNS resolution, connection attempts and
//! transfer all suspend on tokio instead of blocking a thread, so many
//! fetches can be in flight on a small runtime.
//!
//! # Design
//! - `Fetcher::fetch` spawns one `FetchPipeline` task and returns a
//!   `FetchHandle` immediately.
//! - The pipeline tries resolved endpoints strictly in order until one
//!   accepts, writes a fixed `GET /` request and reads until the server
//!   closes the connection.
//! - Exactly one `Outcome` is delivered per fetch. The handle can be
//!   awaited, blocked on from a plain thread, polled, or given a callback.
//! - Resolution and connection are traits (`Resolve`, `Connect`) so callers
//!   and tests can swap in their own implementations.

pub mod cell;
pub mod client;
pub mod connect;
pub mod error;
pub mod http;
pub mod pipeline;
pub mod resolve;
pub mod types;

pub use cell::{result_cell, Completer, FetchHandle};
pub use client::{FetchConfig, Fetcher};
pub use connect::{Connect, TcpConnector};
pub use error::FetchError;
pub use http::{HostSpec, HttpRequest};
pub use pipeline::{FetchPipeline, Phase};
pub use resolve::{Endpoints, Resolve, StaticResolver, SystemResolver};
pub use types::{FetchId, Outcome};
