//! End-to-end coverage of the six scenarios a reverse header-chain sync must handle: a fresh link
//! to genesis, extending an already-linked head, a deep reorg, two subchains merging, a peer
//! dropped for an unlinked batch, and a fetcher that times out before a retry succeeds.

use async_trait::async_trait;
use kaspa_hashes::Hash;
use kaspa_skeleton_sync::controller::Controller;
use kaspa_skeleton_sync::fetcher::{self, FetchDelivery, FetchRequest};
use kaspa_skeleton_sync::header::{PlainHeader, SkeletonHeader};
use kaspa_skeleton_sync::peer::{HeaderBatch, MessageKind, PeerConnection, PeerEvent, PeerId, PeerSet, RequestFailure};
use kaspa_skeleton_sync::progress_store::{InMemoryProgressStore, ProgressBatch, ProgressStore};
use kaspa_skeleton_sync::subchain::{ProgressBlob, Subchain};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

const B: u64 = 4;
const TASK_COUNT: u64 = 4; // W = 16

fn hash_of(n: u64) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[24..32].copy_from_slice(&n.to_be_bytes());
    Hash::from_bytes(bytes)
}

fn header_at(n: u64) -> PlainHeader {
    PlainHeader { number: n, parent_hash: hash_of(n.wrapping_sub(1)), hash: hash_of(n) }
}

/// `count` headers descending from `start`, internally linked and consistent with [`header_at`]
/// at every number — so a batch built here lines up with headers committed by another call.
fn batch_from(start: u64, count: u64) -> Vec<PlainHeader> {
    (0..count).map(|k| header_at(start - k)).collect()
}

fn commit_headers(store: &InMemoryProgressStore, headers: &[PlainHeader]) {
    let mut batch = store.new_batch();
    for h in headers {
        batch.put_header(h);
    }
    store.commit(batch);
}

#[test]
fn fresh_sync_links_to_genesis() {
    let store = InMemoryProgressStore::default();
    let mut controller: Controller<_, PlainHeader> = Controller::new(store, B, TASK_COUNT);

    controller.init_sync(&header_at(12));
    assert_eq!(controller.subchains().to_vec(), vec![Subchain::new(12, 12, hash_of(11))]);

    let outcome = controller.process_response(11, batch_from(11, 4));
    assert!(outcome.progressed && !outcome.linked);
    assert_eq!(controller.subchains()[0], Subchain::new(12, 8, hash_of(7)));

    let outcome = controller.process_response(7, batch_from(7, 4));
    assert!(outcome.progressed && !outcome.linked);
    assert_eq!(controller.subchains()[0], Subchain::new(12, 4, hash_of(3)));

    // Genesis is 3 headers away, not 4 (§4.3: never request block 0).
    let outcome = controller.process_response(3, batch_from(3, 3));
    assert!(outcome.progressed && outcome.linked);
    assert_eq!(controller.subchains()[0], Subchain::new(12, 1, hash_of(0)));
}

#[test]
fn new_head_extends_primary_subchain_in_place() {
    let store = InMemoryProgressStore::default();
    let mut controller: Controller<_, PlainHeader> = Controller::new(store, B, TASK_COUNT);

    controller.init_sync(&header_at(5));
    assert!(!controller.process_new_head(&header_at(6)));
    assert_eq!(controller.subchains()[0].head, 6);
    assert_eq!(controller.store().get_header::<PlainHeader>(6), Some(header_at(6)));
}

#[test]
fn new_head_at_or_below_primary_tail_forces_a_reorg() {
    let store = InMemoryProgressStore::default();
    let mut controller: Controller<_, PlainHeader> = Controller::new(store, B, TASK_COUNT);

    controller.init_sync(&header_at(5));
    assert!(controller.process_new_head(&header_at(3)));
    // No in-place mutation happened.
    assert_eq!(controller.subchains()[0].head, 5);
}

#[test]
fn new_head_forking_from_the_stored_chain_forces_a_reorg() {
    let store = InMemoryProgressStore::default();
    let mut controller: Controller<_, PlainHeader> = Controller::new(store, B, TASK_COUNT);

    controller.init_sync(&header_at(5));
    let forked = PlainHeader { number: 6, parent_hash: Hash::from_bytes([0xee; 32]), hash: hash_of(6) };
    assert!(controller.process_new_head(&forked));
}

#[test]
fn two_disjoint_subchains_merge_when_the_gap_closes() {
    let store = InMemoryProgressStore::default();
    // Headers 6..=10 are already known, as if a previous cycle fetched that range into a
    // secondary subchain before the process restarted.
    commit_headers(&store, &(6..=10).map(header_at).collect::<Vec<_>>());
    commit_headers(&store, &[header_at(19)]);
    let mut batch = store.new_batch();
    batch.put_progress(&ProgressBlob { subchains: vec![Subchain::new(19, 16, hash_of(15)), Subchain::new(10, 6, hash_of(5))] });
    store.commit(batch);

    let mut controller: Controller<_, PlainHeader> = Controller::new(store, B, TASK_COUNT);
    controller.init_sync(&header_at(20));
    assert_eq!(controller.subchains().to_vec(), vec![Subchain::new(20, 16, hash_of(15)), Subchain::new(10, 6, hash_of(5))]);

    let outcome = controller.process_response(15, batch_from(15, 4));
    assert!(outcome.progressed && !outcome.merged);
    assert_eq!(controller.subchains()[0], Subchain::new(20, 12, hash_of(11)));

    let outcome = controller.process_response(11, batch_from(11, 4));
    assert!(outcome.progressed && outcome.merged);
    assert_eq!(controller.subchains().to_vec(), vec![Subchain::new(20, 6, hash_of(5))]);
}

#[test]
fn removing_a_fully_consumed_secondary_does_not_spuriously_merge_a_third() {
    let store = InMemoryProgressStore::default();
    // A third, unrelated subchain sits at 6..=10. Its head header's stored hash happens to
    // collide with what the primary will expect as `next` once the drain below swallows the
    // secondary subchain whole — modeling the narrow case the merge check must not trust blindly
    // unless the position actually lines up.
    let mut colliding = header_at(10);
    colliding.hash = hash_of(15);
    commit_headers(&store, &[colliding]);
    commit_headers(&store, &[header_at(23)]);

    let mut batch = store.new_batch();
    batch.put_progress(&ProgressBlob {
        subchains: vec![Subchain::new(23, 20, hash_of(19)), Subchain::new(18, 16, hash_of(15)), Subchain::new(10, 6, hash_of(5))],
    });
    store.commit(batch);

    let mut controller: Controller<_, PlainHeader> = Controller::new(store, B, TASK_COUNT);
    controller.init_sync(&header_at(24));
    assert_eq!(
        controller.subchains().to_vec(),
        vec![Subchain::new(24, 20, hash_of(19)), Subchain::new(18, 16, hash_of(15)), Subchain::new(10, 6, hash_of(5))]
    );

    // Draining 19..=16 fully swallows the secondary subchain (16..=18, the "remove" branch) while
    // the third subchain (6..=10) is still far below and must not be folded in along with it.
    let outcome = controller.process_response(19, batch_from(19, 4));
    assert!(outcome.progressed && !outcome.merged);
    assert_eq!(
        controller.subchains().to_vec(),
        vec![Subchain::new(24, 16, hash_of(15)), Subchain::new(10, 6, hash_of(5))]
    );
}

#[test]
fn unlinked_head_batch_identifies_its_owning_peer_for_drop() {
    let store = InMemoryProgressStore::default();
    let mut controller: Controller<_, PlainHeader> = Controller::new(store, B, TASK_COUNT);
    controller.init_sync(&header_at(8));

    let culprit: PeerId = 77;
    controller.scratch_mut().assign(0, culprit);

    let mut junk = batch_from(7, 4);
    junk[0].hash = Hash::from_bytes([0xaa; 32]); // doesn't match subchains[0].next

    let outcome = controller.process_response(7, junk);
    assert!(!outcome.progressed);
    assert_eq!(outcome.unlinked_peer, Some(culprit));
    assert_eq!(controller.scratch().owner(0), kaspa_skeleton_sync::scratch::Owner::Empty);
}

struct SlowConnection;

#[async_trait]
impl PeerConnection<PlainHeader> for SlowConnection {
    async fn request_headers_by_number(&self, _start: u64, _count: u64) -> Result<HeaderBatch<PlainHeader>, RequestFailure> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        unreachable!("the test times out well before this fires")
    }

    fn ack(&self, _error: Option<String>) {}
}

struct InstantConnection {
    headers: Vec<PlainHeader>,
}

#[async_trait]
impl PeerConnection<PlainHeader> for InstantConnection {
    async fn request_headers_by_number(&self, _start: u64, _count: u64) -> Result<HeaderBatch<PlainHeader>, RequestFailure> {
        Ok(HeaderBatch { headers: self.headers.clone() })
    }

    fn ack(&self, _error: Option<String>) {}
}

struct OneShotPeers {
    zero_capacity_reported: AtomicBool,
}

#[async_trait]
impl PeerSet for OneShotPeers {
    fn all_peers(&self) -> Vec<PeerId> {
        vec![1]
    }

    fn capacity(&self, _peer: PeerId, _kind: MessageKind, _ttl: Duration) -> i64 {
        1
    }

    fn target_timeout(&self) -> Duration {
        Duration::from_millis(20)
    }

    fn report_zero_capacity(&self, _peer: PeerId, _kind: MessageKind) {
        self.zero_capacity_reported.store(true, Ordering::SeqCst);
    }

    fn subscribe_events(&self) -> mpsc::UnboundedReceiver<PeerEvent> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }
}

#[tokio::test]
async fn fetcher_reverts_on_timeout_then_a_retry_succeeds() {
    let peers: Arc<dyn PeerSet> = Arc::new(OneShotPeers { zero_capacity_reported: AtomicBool::new(false) });
    let (deliver_tx, mut deliver_rx) = mpsc::unbounded_channel::<FetchDelivery<PlainHeader>>();
    let (revert_tx, mut revert_rx) = mpsc::unbounded_channel();
    let (_cancel_trigger, cancel_listener) = triggered::trigger();
    let (_stale_trigger, stale_listener) = triggered::trigger();

    fetcher::run_fetcher(
        FetchRequest { request_id: 1, peer: 1, task: 0, target_head: 11 },
        4,
        Arc::new(SlowConnection),
        peers.clone(),
        Duration::from_millis(20),
        deliver_tx,
        revert_tx,
        cancel_listener,
        stale_listener,
    )
    .await;

    let revert = revert_rx.recv().await.expect("timed-out request reverts");
    assert_eq!(revert.request_id, 1);
    assert_eq!(revert.task, 0);
    assert!(deliver_rx.try_recv().is_err());

    // A retry against a responsive connection for the same task succeeds.
    let (deliver_tx, mut deliver_rx) = mpsc::unbounded_channel();
    let (revert_tx, _revert_rx) = mpsc::unbounded_channel();
    let (_cancel_trigger, cancel_listener) = triggered::trigger();
    let (_stale_trigger, stale_listener) = triggered::trigger();

    fetcher::run_fetcher(
        FetchRequest { request_id: 2, peer: 1, task: 0, target_head: 11 },
        4,
        Arc::new(InstantConnection { headers: batch_from(11, 4) }),
        peers,
        Duration::from_millis(20),
        deliver_tx,
        revert_tx,
        cancel_listener,
        stale_listener,
    )
    .await;

    let delivery = deliver_rx.recv().await.expect("retry delivers the batch");
    assert_eq!(delivery.request_id, 2);
    assert_eq!(delivery.headers.len(), 4);
}
