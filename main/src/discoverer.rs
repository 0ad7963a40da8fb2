use crate::socket::AddressFamily;
use crate::socket::BroadcastError;
use crate::socket::DiscovererTransport;
use crate::socket::DiscoverySocket;
use crate::socket::SocketSetupError;
use crate::tracker::ServiceTracker;
use aloha_protocol::build_query;
use aloha_protocol::decode_response;
use aloha_protocol::QueryError;
use aloha_protocol::MAX_RESPONSE_SIZE;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;
use thiserror::Error;

/// A service appearing on or disappearing from the local network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    Added {
        address: ServiceAddress,
        /// Opaque payload the responder attached to its announcement.
        extra: Vec<u8>,
    },
    Removed {
        address: ServiceAddress,
    },
}

/// Where a discovered service can be contacted: the responder's numeric
/// host and the port it advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub ip: String,
    pub port: u16,
}

/// Polls the local network for responders advertising `service_identifier`.
///
/// Broadcasts one query per `broadcast_period` (starting immediately) and
/// folds the answers into a live set, invoking `on_event` on this thread
/// for every service that comes online or goes offline. A service is only
/// reported offline after leaving two consecutive broadcasts unanswered,
/// so discovery stays stable under moderate datagram loss. The callback
/// must not block for long; it stalls the loop.
///
/// Returns `Ok(())` once `stop` is observed `true`, which is checked at
/// least every 200 ms. All per-datagram problems are swallowed; only
/// setup and send failures are fatal.
pub fn discover(
    service_identifier: &str,
    broadcast_port: u16,
    family: AddressFamily,
    broadcast_period: Duration,
    on_event: impl FnMut(DiscoveryEvent),
    stop: &AtomicBool,
) -> Result<(), DiscoverError> {
    let query = build_query(service_identifier)?;
    let socket = DiscoverySocket::new_broadcast(family)?;
    discover_internal(&socket, &query, broadcast_port, broadcast_period, on_event, stop)
}

fn discover_internal(
    transport: &impl DiscovererTransport,
    query: &[u8],
    broadcast_port: u16,
    broadcast_period: Duration,
    mut on_event: impl FnMut(DiscoveryEvent),
    stop: &AtomicBool,
) -> Result<(), DiscoverError> {
    let mut tracker = ServiceTracker::default();
    let mut buffer = vec![0; MAX_RESPONSE_SIZE];
    let mut last_broadcast: Option<Instant> = None;
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        if last_broadcast.map_or(true, |at| at.elapsed() >= broadcast_period) {
            log::debug!("Broadcasting a discovery query to port {}", broadcast_port);
            transport.broadcast(query, broadcast_port)?;
            last_broadcast = Some(Instant::now());
            for event in tracker.sweep() {
                on_event(event);
            }
        }

        match transport.receive(&mut buffer) {
            Ok(Some((size, peer))) => match decode_response(&buffer[..size]) {
                Ok(response) => {
                    if let Some(event) =
                        tracker.observe(peer, response.advertised_port, response.extra)
                    {
                        on_event(event);
                    }
                }
                Err(e) => log::debug!("Dropping a malformed datagram from {}: {}", peer, e),
            },
            Ok(None) => {}
            Err(e) => log::debug!("Ignoring a receive error: {}", e),
        }
    }
}

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("Invalid service identifier")]
    InvalidServiceIdentifier(#[from] QueryError),

    #[error("Failed to set up the broadcast socket")]
    SocketSetup(#[from] SocketSetupError),

    #[error("IPv6 broadcast is not supported, discovery requires an IPv4 endpoint")]
    Ipv6BroadcastUnsupported,

    #[error("Failed to send a discovery broadcast")]
    Broadcast(#[source] std::io::Error),
}

impl From<BroadcastError> for DiscoverError {
    fn from(error: BroadcastError) -> Self {
        match error {
            BroadcastError::Ipv6Unsupported => Self::Ipv6BroadcastUnsupported,
            BroadcastError::Io(e) => Self::Broadcast(e),
        }
    }
}
