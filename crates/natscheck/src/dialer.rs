//! Pluggable transport for opening the broker connection.

use async_trait::async_trait;
use std::io;
use tokio::net::TcpStream;

/// Capability for opening the TCP connection to the server.
///
/// The connection logic takes this as a parameter instead of calling
/// [`TcpStream::connect`] directly, so tests can substitute a dialer that
/// refuses, counts, or redirects dials. The returned stream is used
/// unchanged; observing it (e.g. its local address) is the caller's job.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, addr: &str) -> io::Result<TcpStream>;
}

/// The production dialer: a plain TCP connect.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, addr: &str) -> io::Result<TcpStream> {
        TcpStream::connect(addr).await
    }
}
