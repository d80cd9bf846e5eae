//! Scheduler (§4.5): matches idle peers to unowned scratch tasks, and the pending-request
//! bookkeeping shared with the revert protocol (§4.7).

use crate::header::SkeletonHeader;
use crate::peer::{MessageKind, PeerId, PeerSet};
use crate::scratch::ScratchWindow;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

/// A request the scheduler has just handed to a fetcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledRequest {
    pub task: u64,
    pub peer: PeerId,
    pub request_id: u64,
    pub target_head: u64,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub peer: PeerId,
    pub task: u64,
    pub target_head: u64,
}

/// Tracks in-flight requests by ID (§3 "unique non-zero 64-bit request ID", §8 "pairwise
/// distinct and nonzero").
#[derive(Default)]
pub struct RequestTable {
    pending: HashMap<u64, PendingRequest>,
}

impl RequestTable {
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn insert(&mut self, id: u64, req: PendingRequest) {
        debug_assert!(id != 0, "request ids must be nonzero");
        debug_assert!(!self.pending.contains_key(&id), "request ids must be unique while pending");
        self.pending.insert(id, req);
    }

    pub fn remove(&mut self, id: u64) -> Option<PendingRequest> {
        self.pending.remove(&id)
    }

    pub fn get(&self, id: u64) -> Option<&PendingRequest> {
        self.pending.get(&id)
    }

    /// All pending requests owned by `peer`, for peer-departure handling (§4.7).
    pub fn by_peer(&self, peer: PeerId) -> Vec<u64> {
        self.pending.iter().filter(|(_, req)| req.peer == peer).map(|(id, _)| *id).collect()
    }

    fn fresh_id(&self, rng: &mut impl Rng) -> u64 {
        loop {
            let candidate = rng.gen::<u64>();
            if candidate != 0 && !self.pending.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

/// One controller-iteration scheduling pass (§4.5):
/// 1. idle peers sorted descending by capacity,
/// 2. ascending task scan, skipping owned tasks and stopping below genesis,
/// 3. assign the highest-capacity idle peer to each unowned task in turn.
pub fn schedule<H: SkeletonHeader>(
    scratch: &mut ScratchWindow<H>,
    peers: &dyn PeerSet,
    idle: &mut Vec<PeerId>,
    pending: &mut RequestTable,
    rng: &mut impl Rng,
) -> Vec<ScheduledRequest> {
    let target_timeout = peers.target_timeout();
    idle.sort_by_key(|&peer| std::cmp::Reverse(peers.capacity(peer, MessageKind::HeadersByNumber, target_timeout)));

    let mut scheduled = Vec::new();
    let tasks: Vec<u64> = scratch.unowned_tasks().collect();
    for task in tasks {
        let Some(peer) = idle.pop() else { break };
        let target_head = scratch.task_target(task);
        let request_id = pending.fresh_id(rng);
        pending.insert(request_id, PendingRequest { peer, task, target_head });
        scratch.assign(task, peer);
        scheduled.push(ScheduledRequest { task, peer, request_id, target_head, timeout: target_timeout });
    }
    scheduled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PlainHeader;
    use std::sync::Mutex;

    struct FakePeers {
        capacities: Mutex<HashMap<PeerId, i64>>,
    }

    impl PeerSet for FakePeers {
        fn all_peers(&self) -> Vec<PeerId> {
            self.capacities.lock().unwrap().keys().copied().collect()
        }

        fn capacity(&self, peer: PeerId, _kind: MessageKind, _ttl: Duration) -> i64 {
            *self.capacities.lock().unwrap().get(&peer).unwrap_or(&0)
        }

        fn target_timeout(&self) -> Duration {
            Duration::from_secs(5)
        }

        fn report_zero_capacity(&self, peer: PeerId, _kind: MessageKind) {
            self.capacities.lock().unwrap().insert(peer, 0);
        }

        fn subscribe_events(&self) -> tokio::sync::mpsc::UnboundedReceiver<crate::peer::PeerEvent> {
            let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
            rx
        }
    }

    #[test]
    fn assigns_highest_capacity_peer_first() {
        let peers = FakePeers { capacities: Mutex::new(HashMap::from([(1, 10), (2, 50)])) };
        let mut scratch: ScratchWindow<PlainHeader> = ScratchWindow::new(4, 4, 16);
        let mut idle = vec![1, 2];
        let mut pending = RequestTable::default();
        let mut rng = rand::thread_rng();

        let scheduled = schedule(&mut scratch, &peers, &mut idle, &mut pending, &mut rng);
        assert_eq!(scheduled[0].peer, 2);
        assert_eq!(scheduled[0].task, 0);
        assert!(idle.is_empty());
        assert_eq!(pending.len(), 4);
    }

    #[test]
    fn request_ids_are_unique_and_nonzero() {
        let peers = FakePeers { capacities: Mutex::new(HashMap::from([(1, 1), (2, 1), (3, 1), (4, 1)])) };
        let mut scratch: ScratchWindow<PlainHeader> = ScratchWindow::new(4, 4, 16);
        let mut idle = vec![1, 2, 3, 4];
        let mut pending = RequestTable::default();
        let mut rng = rand::thread_rng();

        let scheduled = schedule(&mut scratch, &peers, &mut idle, &mut pending, &mut rng);
        let mut ids: Vec<u64> = scheduled.iter().map(|r| r.request_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), scheduled.len());
        assert!(ids.iter().all(|&id| id != 0));
    }

    #[test]
    fn stops_when_no_idle_peers_remain() {
        let peers = FakePeers { capacities: Mutex::new(HashMap::from([(1, 1)])) };
        let mut scratch: ScratchWindow<PlainHeader> = ScratchWindow::new(4, 4, 16);
        let mut idle = vec![1];
        let mut pending = RequestTable::default();
        let mut rng = rand::thread_rng();

        let scheduled = schedule(&mut scratch, &peers, &mut idle, &mut pending, &mut rng);
        assert_eq!(scheduled.len(), 1);
    }
}
