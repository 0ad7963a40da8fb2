use crate::socket::AddressFamily;
use crate::socket::DiscoverySocket;
use crate::socket::ResponderTransport;
use crate::socket::SocketSetupError;
use aloha_protocol::build_query;
use aloha_protocol::encode_response;
use aloha_protocol::EncodeError;
use aloha_protocol::QueryError;
use aloha_protocol::MAX_QUERY_SIZE;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use thiserror::Error;

/// Advertises `service_identifier` on `listen_port`, answering every
/// matching query with `advertised_port` and the opaque `extra` payload.
///
/// The response is encoded once up front, so every answer is
/// byte-identical for the lifetime of the call and the loop itself never
/// allocates. Queries for other services and stray datagrams are dropped
/// without a reply.
///
/// Blocks the calling thread until `stop` is observed `true` (checked at
/// least every 200 ms, returning `Ok(())`) or an I/O failure ends the
/// loop.
pub fn respond(
    interface_address: Option<&str>,
    family: AddressFamily,
    listen_port: u16,
    service_identifier: &str,
    advertised_port: u16,
    extra: &[u8],
    stop: &AtomicBool,
) -> Result<(), RespondError> {
    let expected_query = build_query(service_identifier)?;
    let response = encode_response(advertised_port, extra)?;
    let socket = DiscoverySocket::new_listen(family, interface_address, listen_port)?;
    log::info!(
        "Answering '{}' discovery queries on port {} with advertised port {}",
        service_identifier,
        socket.local_port().map_err(SocketSetupError::Io)?,
        advertised_port
    );
    respond_internal(&socket, &expected_query, &response, stop)
}

pub(crate) fn respond_internal(
    transport: &impl ResponderTransport,
    expected_query: &[u8],
    response: &[u8],
    stop: &AtomicBool,
) -> Result<(), RespondError> {
    let mut buffer = [0; MAX_QUERY_SIZE];
    loop {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        match transport.receive(&mut buffer) {
            Ok(Some((size, peer))) => {
                if &buffer[..size] == expected_query {
                    log::debug!("Answering a discovery query from {}", peer);
                    transport
                        .send_to(response, peer)
                        .map_err(RespondError::Send)?;
                } else {
                    log::debug!("Dropping an unrecognized datagram from {}", peer);
                }
            }
            Ok(None) => {}
            Err(e) => return Err(RespondError::Receive(e)),
        }
    }
}

#[derive(Error, Debug)]
pub enum RespondError {
    #[error("Invalid service identifier")]
    InvalidServiceIdentifier(#[from] QueryError),

    #[error("Cannot encode the advertised response")]
    InvalidResponse(#[from] EncodeError),

    #[error("Failed to set up the listen socket")]
    SocketSetup(#[from] SocketSetupError),

    #[error("Failed to receive a discovery query")]
    Receive(#[source] std::io::Error),

    #[error("Failed to answer a discovery query")]
    Send(#[source] std::io::Error),
}
