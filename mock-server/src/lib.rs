//! Stub HTTP endpoints for exercising the fetch pipeline over real TCP.
//!
//! `app`/`run` serve a real HTTP/1.1 server (axum) that answers `GET /`.
//! `ScriptedServer` is a raw TCP peer that records the request bytes it
//! receives verbatim and replies with whatever bytes the test scripted.

pub mod scripted;

use std::net::SocketAddr;

use axum::{routing::get, Router};
use tokio::net::TcpListener;

pub use scripted::ScriptedServer;

/// Body served at `/`.
pub const GREETING: &str = "hello";

pub fn app() -> Router {
    Router::new().route("/", get(root))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn root() -> &'static str {
    GREETING
}

/// An address on the loopback interface with nothing listening behind it,
/// so connecting to it is refused.
pub fn refused_addr() -> std::io::Result<SocketAddr> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(addr)
}
