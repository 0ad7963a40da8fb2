use crate::discoverer::DiscoveryEvent;
use crate::discoverer::ServiceAddress;
use crate::socket;
use std::collections::HashSet;
use std::net::SocketAddr;

/// How many consecutive broadcasts a service may leave unanswered before
/// it is reported gone. Two means a single lost datagram never evicts
/// anybody.
const GENERATION_COUNT: usize = 2;

/// Tracks which services are online across broadcast sweeps.
///
/// Membership is keyed by the peer's full socket address; the textual
/// address reported at `Added` time is cached so the matching `Removed`
/// replays the identical identity.
#[derive(Default)]
pub struct ServiceTracker {
    /// `generations[0]` collects the peers heard from since the latest
    /// sweep; older slots age toward eviction.
    generations: [HashSet<SocketAddr>; GENERATION_COUNT],
    online: Vec<OnlineService>,
}

struct OnlineService {
    peer: SocketAddr,
    address: ServiceAddress,
}

impl ServiceTracker {
    /// Records a response from `peer`. Returns an `Added` event the first
    /// time the peer enters the online set, `None` for repeats.
    pub fn observe(
        &mut self,
        peer: SocketAddr,
        advertised_port: u16,
        extra: Vec<u8>,
    ) -> Option<DiscoveryEvent> {
        self.generations[0].insert(peer);
        if self.online.iter().any(|service| service.peer == peer) {
            return None;
        }
        let (ip, _) = socket::describe_peer(peer);
        let address = ServiceAddress {
            ip,
            port: advertised_port,
        };
        self.online.push(OnlineService {
            peer,
            address: address.clone(),
        });
        Some(DiscoveryEvent::Added { address, extra })
    }

    /// Closes a broadcast period: evicts every online service absent from
    /// all generations, then ages the window so a fresh generation starts
    /// collecting.
    pub fn sweep(&mut self) -> Vec<DiscoveryEvent> {
        let mut events = Vec::new();
        let generations = &self.generations;
        self.online.retain(|service| {
            let alive = generations
                .iter()
                .any(|generation| generation.contains(&service.peer));
            if !alive {
                events.push(DiscoveryEvent::Removed {
                    address: service.address.clone(),
                });
            }
            alive
        });
        self.generations.rotate_left(1);
        self.generations[0].clear();
        events
    }
}
