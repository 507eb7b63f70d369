//! Single-connection raw TCP server with a scripted reply.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const END_OF_HEADERS: &[u8] = b"\r\n\r\n";

/// Accepts one connection, reads the request up to the blank line, writes
/// the scripted reply and closes.
pub struct ScriptedServer {
    addr: SocketAddr,
    task: JoinHandle<std::io::Result<Vec<u8>>>,
}

impl ScriptedServer {
    /// Bind on an ephemeral loopback port and start serving in the
    /// background. Must be called from inside a tokio runtime.
    pub async fn start(reply: impl Into<Vec<u8>>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let reply = reply.into();
        let task = tokio::spawn(async move {
            let (mut socket, peer) = listener.accept().await?;
            tracing::debug!(%peer, "scripted server accepted");
            let request = read_request(&mut socket).await?;
            socket.write_all(&reply).await?;
            socket.shutdown().await?;
            Ok(request)
        });
        Ok(Self { addr, task })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the connection to finish and return the request bytes the
    /// server received.
    pub async fn received(self) -> std::io::Result<Vec<u8>> {
        self.task.await.map_err(std::io::Error::other)?
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> std::io::Result<Vec<u8>> {
    let mut request = Vec::new();
    let mut buf = [0u8; 512];
    while !request.windows(END_OF_HEADERS.len()).any(|w| w == END_OF_HEADERS) {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        request.extend_from_slice(&buf[..n]);
    }
    Ok(request)
}
