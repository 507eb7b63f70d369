//! Host name resolution.
//!
//! # Design
//! A resolver turns a `HostSpec` into `Endpoints`, a forward-only sequence
//! of socket addresses in the order the underlying mechanism produced them.
//! No reordering happens here: the first address returned is the first one
//! the pipeline tries. An empty sequence is a valid result; deciding that it
//! is a failure belongs to the pipeline.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::vec;

use crate::http::HostSpec;

/// Suspend-capable name resolution.
pub trait Resolve: Send + Sync + 'static {
    fn resolve(&self, spec: &HostSpec) -> impl Future<Output = io::Result<Endpoints>> + Send;
}

/// Ordered, finite candidate endpoints. Consumed one element at a time and
/// never rewound.
#[derive(Debug)]
pub struct Endpoints {
    inner: vec::IntoIter<SocketAddr>,
}

impl Endpoints {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self {
            inner: addrs.into_iter(),
        }
    }

    /// Candidates not yet consumed.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

impl Iterator for Endpoints {
    type Item = SocketAddr;

    fn next(&mut self) -> Option<SocketAddr> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Endpoints {}

impl From<Vec<SocketAddr>> for Endpoints {
    fn from(addrs: Vec<SocketAddr>) -> Self {
        Self::new(addrs)
    }
}

/// Resolves through the platform resolver (getaddrinfo) on tokio's
/// blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, spec: &HostSpec) -> impl Future<Output = io::Result<Endpoints>> + Send {
        let target = (spec.host().to_string(), spec.port());
        async move {
            let addrs = tokio::net::lookup_host(target).await?;
            Ok(Endpoints::new(addrs.collect()))
        }
    }
}

/// Always answers with the same candidates, whatever the host.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addrs: Vec<SocketAddr>,
}

impl StaticResolver {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self { addrs }
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, _spec: &HostSpec) -> impl Future<Output = io::Result<Endpoints>> + Send {
        let addrs = self.addrs.clone();
        async move { Ok(Endpoints::new(addrs)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn endpoints_are_consumed_in_order() {
        let mut endpoints = Endpoints::new(vec![
            addr("10.0.0.1:80"),
            addr("10.0.0.2:80"),
            addr("[::1]:80"),
        ]);
        assert_eq!(endpoints.len(), 3);
        assert_eq!(endpoints.next(), Some(addr("10.0.0.1:80")));
        assert_eq!(endpoints.next(), Some(addr("10.0.0.2:80")));
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints.next(), Some(addr("[::1]:80")));
        assert!(endpoints.is_empty());
        assert_eq!(endpoints.next(), None);
    }

    #[tokio::test]
    async fn static_resolver_ignores_host() {
        let resolver = StaticResolver::new(vec![addr("192.0.2.7:8080")]);
        let endpoints = resolver.resolve(&HostSpec::new("anything")).await.unwrap();
        assert_eq!(endpoints.collect::<Vec<_>>(), vec![addr("192.0.2.7:8080")]);
    }

    #[tokio::test]
    async fn system_resolver_passes_ip_literals_through() {
        let endpoints = SystemResolver
            .resolve(&HostSpec::with_port("127.0.0.1", 8081))
            .await
            .unwrap();
        assert_eq!(endpoints.collect::<Vec<_>>(), vec![addr("127.0.0.1:8081")]);
    }

    #[tokio::test]
    async fn system_resolver_reports_malformed_names() {
        let result = SystemResolver
            .resolve(&HostSpec::new("bad host name with spaces.invalid"))
            .await;
        assert!(result.is_err());
    }
}
