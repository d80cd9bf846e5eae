//! Outer sync loop (§4.6): wires the controller, scheduler, and fetchers together behind a single
//! writer task, and exposes the public [`SkeletonHandle`] surface (`sync`, `head`, `header`,
//! `terminate`).
//!
//! One long-lived task owns all mutable scheduling state and is driven by a biased
//! `tokio::select!`, while readers that only need the durable store (`head`, `header`) go
//! straight to it instead of round-tripping through the loop.

use crate::config::SkeletonConfig;
use crate::controller::Controller;
use crate::errors::SkeletonError;
use crate::fetcher::{self, FetchDelivery, FetchRequest, FetchRevert, RevertReason};
use crate::header::SkeletonHeader;
use crate::metrics::SkeletonCounters;
use crate::peer::{Backfiller, ConnectionProvider, DropPeer, PeerEvent, PeerId, PeerSet};
use crate::progress_store::ProgressStore;
use crate::scheduler::{self, RequestTable};
use kaspa_core::{debug, info, warn};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

enum Command<H> {
    NewHead(H),
    Terminate(oneshot::Sender<()>),
}

/// Outcome of running a single cycle to completion (§4.4, §9's "restart sentinels").
enum CycleResult<H> {
    Linked,
    Merged,
    Reorged(H),
    Terminated(oneshot::Sender<()>),
}

/// Handle to a running sync loop. Cloning is cheap; all clones share the same background task and
/// the same durable store.
#[derive(Clone)]
pub struct SkeletonHandle<S, H> {
    commands: mpsc::UnboundedSender<Command<H>>,
    store: S,
}

impl<S: ProgressStore + Clone, H: SkeletonHeader> SkeletonHandle<S, H> {
    /// Announces a new chain head (§4.1 entry point). Fire-and-forget: the loop absorbs it on its
    /// next iteration, either in place via `processNewHead` or by restarting the cycle around it.
    pub fn sync(&self, head: H) -> Result<(), SkeletonError> {
        self.commands.send(Command::NewHead(head)).map_err(|_| SkeletonError::StaleSync)
    }

    /// The currently synced head, read straight from the durable store rather than round-tripping
    /// through the loop — commits are atomic, so this is always a consistent snapshot. Per §6/§7,
    /// sync is only finished once the primary subchain's tail has reached block 1; until then this
    /// returns `NotFinished` rather than a head that may still move under a reorg.
    pub fn head(&self) -> Result<H, SkeletonError> {
        let blob = self.store.get_progress().ok_or(SkeletonError::NotStarted)?;
        let primary = blob.subchains.first().ok_or(SkeletonError::NotStarted)?;
        if primary.tail != 1 {
            return Err(SkeletonError::NotFinished);
        }
        self.store.get_header(primary.head).ok_or_else(|| SkeletonError::Internal("primary head header missing from store".into()))
    }

    /// A previously committed header by number, or `None` if it was never synced.
    pub fn header(&self, number: u64) -> Option<H> {
        self.store.get_header(number)
    }

    /// Requests a graceful shutdown and waits for the loop task to acknowledge it.
    pub async fn terminate(&self) -> Result<(), SkeletonError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands.send(Command::Terminate(ack_tx)).map_err(|_| SkeletonError::StaleSync)?;
        ack_rx.await.map_err(|_| SkeletonError::StaleSync)
    }
}

/// Spawns the sync loop as a background task and returns a handle to it.
///
/// `config` carries `batch_size`/`scratch_capacity` (§8 — a validated [`SkeletonConfig`] is the
/// only way to obtain these, so `W mod B == 0` is enforced here rather than left to whatever
/// happened to construct the raw numbers). `connections` resolves peer IDs to request channels;
/// `peers` is the capacity/timeout oracle; `drop_peer` is invoked whenever a batch fails to
/// validate against `S[0].next` (§4.4.3 step 5.a); `backfiller` is suspended while genesis is not
/// yet linked and resumed once it is (§6.4).
pub fn spawn<S, H>(
    store: S,
    config: SkeletonConfig,
    peers: Arc<dyn PeerSet>,
    connections: Arc<dyn ConnectionProvider<H>>,
    drop_peer: Arc<dyn DropPeer>,
    backfiller: Arc<dyn Backfiller>,
    counters: Arc<SkeletonCounters>,
) -> SkeletonHandle<S, H>
where
    S: ProgressStore + Clone + Send + 'static,
    H: SkeletonHeader,
{
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let handle = SkeletonHandle { commands: commands_tx, store: store.clone() };

    let peer_events = peers.subscribe_events();
    tokio::spawn(run_loop(
        store,
        config.batch_size,
        config.task_count(),
        peers,
        connections,
        drop_peer,
        backfiller,
        counters,
        commands_rx,
        peer_events,
    ));

    handle
}

async fn run_loop<S, H>(
    store: S,
    batch_size: u64,
    task_count: u64,
    peers: Arc<dyn PeerSet>,
    connections: Arc<dyn ConnectionProvider<H>>,
    drop_peer: Arc<dyn DropPeer>,
    backfiller: Arc<dyn Backfiller>,
    counters: Arc<SkeletonCounters>,
    mut commands_rx: mpsc::UnboundedReceiver<Command<H>>,
    mut peer_events: mpsc::UnboundedReceiver<PeerEvent>,
) where
    S: ProgressStore + Send + 'static,
    H: SkeletonHeader,
{
    let mut idle: Vec<PeerId> = peers.all_peers();

    // No head has been announced yet; wait for the first `sync()` call (or an early shutdown).
    let mut head = loop {
        tokio::select! {
            biased;

            cmd = commands_rx.recv() => match cmd {
                Some(Command::NewHead(head)) => break head,
                Some(Command::Terminate(ack)) => {
                    let _ = ack.send(());
                    return;
                }
                None => return,
            },
            event = peer_events.recv() => match event {
                Some(PeerEvent::Joined(p)) => idle.push(p),
                Some(PeerEvent::Left(p)) => idle.retain(|&x| x != p),
                None => {}
            },
        }
    };

    let mut controller = Controller::new(store, batch_size, task_count);

    loop {
        match run_cycle(
            &mut controller,
            &head,
            &peers,
            &connections,
            &drop_peer,
            &backfiller,
            &counters,
            &mut idle,
            &mut commands_rx,
            &mut peer_events,
        )
        .await
        {
            CycleResult::Linked => {
                info!("skeleton: genesis linked, idling until the next head announcement");
                counters.cycles_linked.fetch_add(1, Ordering::Relaxed);
                backfiller.resume();
                head = loop {
                    tokio::select! {
                        biased;

                        cmd = commands_rx.recv() => match cmd {
                            Some(Command::NewHead(next)) => break next,
                            Some(Command::Terminate(ack)) => {
                                let _ = ack.send(());
                                return;
                            }
                            None => return,
                        },
                        event = peer_events.recv() => match event {
                            Some(PeerEvent::Joined(p)) => idle.push(p),
                            Some(PeerEvent::Left(p)) => idle.retain(|&x| x != p),
                            None => {}
                        },
                    }
                };
            }
            CycleResult::Merged => {
                debug!("skeleton: subchains merged, restarting cycle from the same head");
                counters.cycles_merged.fetch_add(1, Ordering::Relaxed);
            }
            CycleResult::Reorged(next) => {
                debug!("skeleton: head could not be absorbed in place, restarting cycle");
                counters.cycles_reorged.fetch_add(1, Ordering::Relaxed);
                head = next;
            }
            CycleResult::Terminated(ack) => {
                let _ = ack.send(());
                return;
            }
        }
    }
}

/// Runs one cycle (§4.4) to completion: establishes the subchain list for `head`, then schedules
/// and drains fetches until the cycle is linked, merges, reorgs, or is asked to terminate.
async fn run_cycle<S, H>(
    controller: &mut Controller<S, H>,
    head: &H,
    peers: &Arc<dyn PeerSet>,
    connections: &Arc<dyn ConnectionProvider<H>>,
    drop_peer: &Arc<dyn DropPeer>,
    backfiller: &Arc<dyn Backfiller>,
    counters: &Arc<SkeletonCounters>,
    idle: &mut Vec<PeerId>,
    commands_rx: &mut mpsc::UnboundedReceiver<Command<H>>,
    peer_events: &mut mpsc::UnboundedReceiver<PeerEvent>,
) -> CycleResult<H>
where
    S: ProgressStore,
    H: SkeletonHeader,
{
    controller.init_sync(head);

    if controller.scratch().scratch_head() == 0 {
        return CycleResult::Linked;
    }
    backfiller.suspend();

    let (cancel_trigger, cancel_listener) = triggered::trigger();
    let mut pending = RequestTable::default();
    let mut stale_triggers: HashMap<u64, triggered::Trigger> = HashMap::new();
    let mut rng = rand::thread_rng();
    let (deliver_tx, mut deliver_rx) = mpsc::unbounded_channel::<FetchDelivery<H>>();
    let (revert_tx, mut revert_rx) = mpsc::unbounded_channel::<FetchRevert>();

    let result = loop {
        let scheduled = scheduler::schedule(controller.scratch_mut(), peers.as_ref(), idle, &mut pending, &mut rng);
        for req in scheduled {
            let Some(connection) = connections.connection(req.peer) else {
                // Connection vanished between scheduling and dispatch; treat like an instant revert.
                pending.remove(req.request_id);
                controller.scratch_mut().release(req.task);
                continue;
            };
            let (stale_trigger, stale_listener) = triggered::trigger();
            stale_triggers.insert(req.request_id, stale_trigger);
            tokio::spawn(fetcher::run_fetcher(
                FetchRequest { request_id: req.request_id, peer: req.peer, task: req.task, target_head: req.target_head },
                controller.scratch().batch_size(),
                connection,
                peers.clone(),
                req.timeout,
                deliver_tx.clone(),
                revert_tx.clone(),
                cancel_listener.clone(),
                stale_listener,
            ));
        }

        tokio::select! {
            biased;

            cmd = commands_rx.recv() => match cmd {
                Some(Command::NewHead(new_head)) => {
                    if controller.process_new_head(&new_head) {
                        break CycleResult::Reorged(new_head);
                    }
                }
                Some(Command::Terminate(ack)) => break CycleResult::Terminated(ack),
                None => break CycleResult::Terminated(oneshot::channel().0),
            },

            event = peer_events.recv() => match event {
                Some(PeerEvent::Joined(p)) => idle.push(p),
                Some(PeerEvent::Left(p)) => {
                    idle.retain(|&x| x != p);
                    for request_id in pending.by_peer(p) {
                        if let Some(trigger) = stale_triggers.remove(&request_id) {
                            trigger.trigger();
                        }
                        if let Some(req) = pending.remove(request_id) {
                            controller.scratch_mut().release(req.task);
                        }
                    }
                }
                None => {}
            },

            Some(delivery) = deliver_rx.recv() => {
                stale_triggers.remove(&delivery.request_id);
                let Some(responder) = pending.remove(delivery.request_id) else {
                    // Already reverted or superseded; the headers are stale, drop them.
                    continue;
                };
                // §4.4.3 step 1: the responding peer goes back to idle regardless of validity;
                // it is pulled back out below if this batch gets it dropped instead.
                idle.push(responder.peer);
                let outcome = controller.process_response(delivery.batch_start_number, delivery.headers);
                counters.headers_committed.fetch_add(outcome.headers_committed, Ordering::Relaxed);
                if let Some(peer) = outcome.unlinked_peer {
                    warn!("skeleton: dropping peer {peer} for an unlinked batch");
                    counters.peers_dropped.fetch_add(1, Ordering::Relaxed);
                    drop_peer.drop(peer);
                    idle.retain(|&x| x != peer);
                }
                if outcome.merged {
                    break CycleResult::Merged;
                }
                if outcome.linked {
                    break CycleResult::Linked;
                }
            }

            Some(revert) = revert_rx.recv() => {
                stale_triggers.remove(&revert.request_id);
                if revert.reason == RevertReason::Timeout {
                    counters.requests_timed_out.fetch_add(1, Ordering::Relaxed);
                }
                if pending.remove(revert.request_id).is_some() {
                    controller.scratch_mut().release(revert.task);
                    // A peer that timed out already had its capacity zeroed; the scheduler will
                    // simply stop picking it until the oracle reports otherwise (§4.3 step 4).
                    idle.push(revert.peer);
                }
            }
        }
    };

    cancel_trigger.trigger();
    result
}
