use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

/// Datagram transport used by the SSDP search.
///
/// The search takes ownership of the socket for the duration of one call and
/// drops it on every exit path, so closing the socket is tied to `Drop`.
#[async_trait]
pub trait SsdpSocket: Send + Sync {
    /// Send one datagram to `target`
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Wait for the next inbound datagram
    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;
}
