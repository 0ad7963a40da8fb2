//! Wire format of the aloha LAN discovery protocol.
//!
//! Discoverers broadcast a plain-text query naming a service; responders
//! answer with a small binary packet carrying the port to contact and an
//! opaque application payload. Everything on the wire is big-endian.

mod query;
mod response;

pub use query::build_query;
pub use query::QueryError;
pub use query::MAX_QUERY_SIZE;
pub use response::checksum16;
pub use response::decode_response;
pub use response::encode_response;
pub use response::DecodeError;
pub use response::EncodeError;
pub use response::Response;
pub use response::MAX_RESPONSE_SIZE;

/// The only protocol version in existence.
///
/// A response carrying any other version byte is dropped by the receiver
/// without further inspection.
pub const PROTOCOL_VERSION: u8 = 0x01;
