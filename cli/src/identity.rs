use uuid::Uuid;

/// First byte of the announcement payload, ahead of the server identity.
const ANNOUNCEMENT_PROTOCOL_ID: u8 = 0x01;

/// Builds the opaque payload a server attaches to its discovery
/// responses: one protocol-id byte followed by the 16-byte server
/// identity.
pub fn announcement_payload(server_id: Uuid) -> Vec<u8> {
    let mut payload = Vec::with_capacity(1 + 16);
    payload.push(ANNOUNCEMENT_PROTOCOL_ID);
    payload.extend_from_slice(server_id.as_bytes());
    payload
}
