//! SSDP search for the camera's media server
//!
//! The search repeats an M-SEARCH datagram on a fixed period and waits for the
//! first reply carrying the camera's marker string, or for the deadline. The
//! socket, the repeating send and the deadline all live inside one
//! `tokio::select!` loop, so whichever exit wins tears all three down together.

use alphasync_core::{DeviceAddress, Error, Result, SsdpSocket};
use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Well-known SSDP multicast group
pub const SSDP_MULTICAST_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 1900));

/// Discovery datagram sent on every tick
pub const M_SEARCH: &str = "M-SEARCH * HTTP/1.1\r\n\
HOST:239.255.255.250:1900\r\n\
ST:upnp:rootdevice\r\n\
MX:2\r\n\
MAN:\"ssdp:discover\"\r\n\
\r\n";

const MAX_DATAGRAM: usize = 2048;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchState {
    Idle,
    Listening,
    Found,
    TimedOut,
}

/// A reply that matched the camera marker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SsdpResponse {
    /// Service directory URL from the `LOCATION` header
    pub location: String,
    pub address: DeviceAddress,
    pub from: SocketAddr,
    pub raw: String,
}

/// One SSDP search run
pub struct SsdpSearch {
    wait_for: Duration,
    send_every: Duration,
    marker: String,
    target: SocketAddr,
    state: SearchState,
}

impl SsdpSearch {
    pub fn new(wait_for: Duration, send_every: Duration, marker: impl Into<String>) -> Self {
        Self {
            wait_for,
            send_every,
            marker: marker.into(),
            target: SSDP_MULTICAST_ADDR,
            state: SearchState::Idle,
        }
    }

    /// Send M-SEARCH somewhere other than the multicast group
    pub fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    pub fn state(&self) -> SearchState {
        self.state
    }

    /// Run the search to completion.
    ///
    /// Takes ownership of `socket` and drops it before returning, whichever of
    /// match, deadline or socket error ends the search. Datagrams without the
    /// marker are ignored and do not extend the deadline.
    pub async fn run<S: SsdpSocket>(&mut self, socket: S) -> Result<SsdpResponse> {
        self.transition(SearchState::Listening);
        info!(
            "Searching for camera via SSDP ({}ms timeout, M-SEARCH every {}ms)",
            self.wait_for.as_millis(),
            self.send_every.as_millis()
        );

        let deadline = tokio::time::sleep(self.wait_for);
        tokio::pin!(deadline);

        let mut ticker = tokio::time::interval(self.send_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut buf = vec![0u8; MAX_DATAGRAM];

        let outcome = loop {
            tokio::select! {
                _ = &mut deadline => {
                    break Err(Error::DiscoveryTimeout(self.wait_for));
                }
                _ = ticker.tick() => {
                    match socket.send_to(M_SEARCH.as_bytes(), self.target).await {
                        Ok(sent) => debug!("Sent M-SEARCH ({} bytes to {})", sent, self.target),
                        Err(e) => {
                            warn!("Failed to send M-SEARCH: {}", e);
                            break Err(Error::Io(e));
                        }
                    }
                }
                received = socket.recv_from(&mut buf) => {
                    let (len, from) = match received {
                        Ok(received) => received,
                        Err(e) => {
                            warn!("Socket error during SSDP search: {}", e);
                            break Err(Error::Io(e));
                        }
                    };

                    let payload = String::from_utf8_lossy(&buf[..len]);
                    if !payload.contains(&self.marker) {
                        debug!("Ignoring SSDP datagram from {} without camera marker", from);
                        continue;
                    }

                    match response_from(&payload, from) {
                        Some(response) => break Ok(response),
                        None => warn!("Camera reply from {} has no usable LOCATION header", from),
                    }
                }
            }
        };

        drop(socket);

        match &outcome {
            Ok(response) => {
                self.transition(SearchState::Found);
                info!("Found camera at {} (LOCATION {})", response.address, response.location);
            }
            Err(e) => {
                self.transition(SearchState::TimedOut);
                warn!("SSDP search ended without a camera: {}", e);
            }
        }

        outcome
    }

    fn transition(&mut self, next: SearchState) {
        debug!("SSDP state {:?} -> {:?}", self.state, next);
        self.state = next;
    }
}

fn response_from(payload: &str, from: SocketAddr) -> Option<SsdpResponse> {
    let location = parse_location(payload)?;
    let address = DeviceAddress::from_url(&location).ok()?;
    Some(SsdpResponse {
        location,
        address,
        from,
        raw: payload.to_string(),
    })
}

/// Value of the `LOCATION` header, matched case-insensitively
pub fn parse_location(payload: &str) -> Option<String> {
    payload
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("location"))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// UDP socket joined to the SSDP multicast group
pub struct UdpSsdpSocket {
    socket: UdpSocket,
}

impl UdpSsdpSocket {
    /// Bind an ephemeral port and join 239.255.255.250
    pub fn bind() -> Result<Self> {
        let socket = socket2::Socket::new(
            socket2::Domain::IPV4,
            socket2::Type::DGRAM,
            Some(socket2::Protocol::UDP),
        )?;

        // Coexist with other UPnP software on this host
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;

        let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        socket.bind(&addr.into())?;
        socket.set_nonblocking(true)?;

        let socket: std::net::UdpSocket = socket.into();
        info!("SSDP socket bound to: {}", socket.local_addr()?);

        // Replies to M-SEARCH are unicast, so a failed join only costs us NOTIFYs
        match socket.join_multicast_v4(&Ipv4Addr::new(239, 255, 255, 250), &Ipv4Addr::UNSPECIFIED) {
            Ok(()) => debug!("Joined SSDP multicast group 239.255.255.250"),
            Err(e) => warn!("Failed to join multicast group: {}. Relying on unicast replies.", e),
        }
        socket.set_multicast_ttl_v4(2)?;

        Ok(Self {
            socket: UdpSocket::from_std(socket)?,
        })
    }
}

#[async_trait]
impl SsdpSocket for UdpSsdpSocket {
    async fn send_to(&self, payload: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(payload, target).await
    }

    async fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}
