use mockall::automock;
use socket2::Domain;
use socket2::SockRef;
use socket2::Socket;
use socket2::Type;
use std::fmt;
use std::io::ErrorKind;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::Ipv6Addr;
use std::net::Shutdown;
use std::net::SocketAddr;
use std::net::UdpSocket;
use std::time::Duration;
use thiserror::Error;

/// How long a single receive may block.
///
/// Bounds the loop latency of both endpoints: the stop flag and the
/// broadcast timer are serviced at least five times per second even on a
/// silent network.
const RECEIVE_TIMEOUT: Duration = Duration::from_millis(200);

/// Address family fixed at socket construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    fn domain(self) -> Domain {
        match self {
            Self::Ipv4 => Domain::IPV4,
            Self::Ipv6 => Domain::IPV6,
        }
    }

    fn unspecified_ip(self) -> IpAddr {
        match self {
            Self::Ipv4 => Ipv4Addr::UNSPECIFIED.into(),
            Self::Ipv6 => Ipv6Addr::UNSPECIFIED.into(),
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipv4 => write!(f, "IPv4"),
            Self::Ipv6 => write!(f, "IPv6"),
        }
    }
}

enum SocketRole {
    Listen,
    Broadcast,
}

/// A UDP socket configured for one discovery role.
///
/// The socket is owned by exactly one endpoint loop. Dropping the owner
/// shuts down both directions and then releases the descriptor, on any
/// exit path.
#[derive(Debug)]
pub struct DiscoverySocket {
    socket: UdpSocket,
    family: AddressFamily,
}

impl DiscoverySocket {
    /// Opens a responder-side socket on a well-known port. Address and
    /// port reuse are enabled so a restarted responder can rebind while
    /// stale sockets linger.
    pub fn new_listen(
        family: AddressFamily,
        interface_address: Option<&str>,
        port: u16,
    ) -> Result<Self, SocketSetupError> {
        Self::open(SocketRole::Listen, family, interface_address, port)
    }

    /// Opens a discoverer-side socket on an ephemeral port, permitted to
    /// send to the broadcast address.
    pub fn new_broadcast(family: AddressFamily) -> Result<Self, SocketSetupError> {
        Self::open(SocketRole::Broadcast, family, None, 0)
    }

    fn open(
        role: SocketRole,
        family: AddressFamily,
        interface_address: Option<&str>,
        port: u16,
    ) -> Result<Self, SocketSetupError> {
        let socket = Socket::new(family.domain(), Type::DGRAM, None)?;
        match role {
            SocketRole::Listen => {
                socket.set_reuse_address(true)?;
                #[cfg(unix)]
                socket.set_reuse_port(true)?;
            }
            SocketRole::Broadcast => {
                socket.set_broadcast(true)?;
            }
        }
        socket.set_read_timeout(Some(RECEIVE_TIMEOUT))?;

        let ip = match interface_address {
            None => family.unspecified_ip(),
            Some(address) => parse_interface_address(address, family)?,
        };
        socket.bind(&SocketAddr::new(ip, port).into())?;

        let socket: UdpSocket = socket.into();
        log::info!("Discovery socket bound at {}", socket.local_addr()?);
        Ok(Self { socket, family })
    }

    pub fn local_port(&self) -> std::io::Result<u16> {
        Ok(self.socket.local_addr()?.port())
    }
}

impl Drop for DiscoverySocket {
    fn drop(&mut self) {
        let _ = SockRef::from(&self.socket).shutdown(Shutdown::Both);
    }
}

fn parse_interface_address(
    address: &str,
    family: AddressFamily,
) -> Result<IpAddr, SocketSetupError> {
    let parsed = match family {
        AddressFamily::Ipv4 => address.parse::<Ipv4Addr>().map(IpAddr::V4),
        AddressFamily::Ipv6 => address.parse::<Ipv6Addr>().map(IpAddr::V6),
    };
    parsed.map_err(|_| SocketSetupError::InvalidInterfaceAddress {
        address: address.to_owned(),
        family,
    })
}

/// Renders a peer address as numeric text plus its transport port. IPv6
/// zone identifiers are not part of the rendering.
pub fn describe_peer(peer: SocketAddr) -> (String, u16) {
    (peer.ip().to_string(), peer.port())
}

/// Socket surface the discoverer loop runs against.
#[automock]
pub trait DiscovererTransport {
    /// Sends `payload` to the family's broadcast address at `port`.
    fn broadcast(&self, payload: &[u8], port: u16) -> Result<(), BroadcastError>;

    /// Reads one datagram into `buffer`, or `None` once the receive
    /// timeout lapses. Bytes beyond `buffer` are discarded by the OS, so
    /// oversized datagrams arrive truncated.
    fn receive(&self, buffer: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>>;
}

/// Socket surface the responder loop runs against.
#[automock]
pub trait ResponderTransport {
    fn receive(&self, buffer: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>>;
    fn send_to(&self, payload: &[u8], peer: SocketAddr) -> std::io::Result<()>;
}

impl DiscovererTransport for DiscoverySocket {
    fn broadcast(&self, payload: &[u8], port: u16) -> Result<(), BroadcastError> {
        let destination = match self.family {
            AddressFamily::Ipv4 => SocketAddr::new(Ipv4Addr::BROADCAST.into(), port),
            AddressFamily::Ipv6 => return Err(BroadcastError::Ipv6Unsupported),
        };
        self.socket.send_to(payload, destination)?;
        Ok(())
    }

    fn receive(&self, buffer: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>> {
        receive_into(&self.socket, buffer)
    }
}

impl ResponderTransport for DiscoverySocket {
    fn receive(&self, buffer: &mut [u8]) -> std::io::Result<Option<(usize, SocketAddr)>> {
        receive_into(&self.socket, buffer)
    }

    fn send_to(&self, payload: &[u8], peer: SocketAddr) -> std::io::Result<()> {
        self.socket.send_to(payload, peer)?;
        Ok(())
    }
}

fn receive_into(
    socket: &UdpSocket,
    buffer: &mut [u8],
) -> std::io::Result<Option<(usize, SocketAddr)>> {
    match socket.recv_from(buffer) {
        Ok((size, peer)) => Ok(Some((size, peer))),
        // SO_RCVTIMEO expiry surfaces as either of these depending on the platform.
        Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Error, Debug)]
pub enum SocketSetupError {
    #[error("Interface address '{address}' is not a valid {family} address")]
    InvalidInterfaceAddress {
        address: String,
        family: AddressFamily,
    },

    #[error("Error from socket I/O")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum BroadcastError {
    #[error("IPv6 broadcast is not supported, discovery requires an IPv4 socket")]
    Ipv6Unsupported,

    #[error("Error from socket I/O")]
    Io(#[from] std::io::Error),
}
