//! LAN service discovery over UDP broadcast.
//!
//! A lightweight alternative to mDNS/DNS-SD: a [respond]er advertises a
//! named service and answers matching queries with the port to contact
//! plus an opaque payload, while a [discover]er periodically broadcasts
//! queries and reports services coming online and going offline.
//!
//! Both endpoints are blocking loops intended to own their calling
//! thread; run each on a dedicated thread and signal them through their
//! stop flag.

mod discoverer;
mod responder;
mod socket;
mod tracker;

pub use discoverer::discover;
pub use discoverer::DiscoverError;
pub use discoverer::DiscoveryEvent;
pub use discoverer::ServiceAddress;
pub use responder::respond;
pub use responder::RespondError;
pub use socket::AddressFamily;
pub use socket::BroadcastError;
pub use socket::SocketSetupError;
