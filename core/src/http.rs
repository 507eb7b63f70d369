//! Request encoding for the root-path fetch.
//!
//! # Design
//! The request is fixed: `GET /`, a `Host` header carrying the name the
//! caller asked for, and `Connection: close` so the server ends the response
//! by closing the stream. No response parsing happens anywhere in this crate;
//! the bytes read back are handed to the caller verbatim.
//!
//! The `Host` line carries a space before its CRLF. Keep it: the request
//! bytes are compared verbatim against `test-vectors/request.json`.

use std::fmt;

/// Port used when the caller does not pick one.
pub const DEFAULT_PORT: u16 = 80;

/// The host being fetched. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    host: String,
    port: u16,
}

impl HostSpec {
    pub fn new(host: &str) -> Self {
        Self::with_port(host, DEFAULT_PORT)
    }

    pub fn with_port(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The request sent over an established connection, as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    /// `GET /` for `spec`, asking the server to close when done.
    pub fn root(spec: &HostSpec) -> Self {
        Self {
            path: "/".to_string(),
            headers: vec![
                ("Host".to_string(), format!("{} ", spec.host())),
                ("Connection".to_string(), "close".to_string()),
            ],
        }
    }

    /// Wire form of the request. There is never a body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("GET {} HTTP/1.1\r\n", self.path);
        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str("\r\n");
        }
        out.push_str("\r\n");
        out.into_bytes()
    }
}
