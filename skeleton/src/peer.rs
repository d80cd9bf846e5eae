//! Collaborator interfaces consumed by the core (§6): peer set, peer connection, backfiller, and
//! the drop callback. All four are out of scope for this crate's implementation — only the
//! traits and the in-memory fakes used by tests live here.

use crate::header::SkeletonHeader;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

pub type PeerId = u64;

/// A peer/join-leave event from the peer set's event stream (§6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    Joined(PeerId),
    Left(PeerId),
}

/// Message kind passed to the capacity oracle; header batches are the only kind this crate asks
/// about, but the oracle interface (§6.1) is shared with other request kinds in the host node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    HeadersByNumber,
}

/// Peer set + capacity-and-timeout oracle (§6.1, §5 "assumed thread-safe collaborators").
#[async_trait]
pub trait PeerSet: Send + Sync {
    fn all_peers(&self) -> Vec<PeerId>;
    fn capacity(&self, peer: PeerId, kind: MessageKind, ttl: Duration) -> i64;
    fn target_timeout(&self) -> Duration;
    /// Reports a peer as having zero capacity, e.g. after a timeout (§4.3 step 4).
    fn report_zero_capacity(&self, peer: PeerId, kind: MessageKind);
    /// Subscribes to this peer set's join/leave event stream (§6.1). The sync loop calls this
    /// once, at startup, and selects on the returned receiver directly rather than requiring the
    /// host to forward events in by hand.
    fn subscribe_events(&self) -> mpsc::UnboundedReceiver<PeerEvent>;
}

/// A batch of headers returned by a peer, in strictly descending block-number order.
#[derive(Debug, Clone)]
pub struct HeaderBatch<H: SkeletonHeader> {
    pub headers: Vec<H>,
}

/// Per-request acknowledgment channel (§6.2): the client reports a nullable error back to the
/// connection so it can affect peer reputation. This crate only needs to send the ack; how the
/// connection uses it is out of scope.
#[async_trait]
pub trait PeerConnection<H: SkeletonHeader>: Send + Sync {
    async fn request_headers_by_number(&self, start: u64, count: u64) -> Result<HeaderBatch<H>, RequestFailure>;

    /// Acknowledges a response, carrying a `None` error on success.
    fn ack(&self, error: Option<String>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestFailure;

/// External component controlling forward body/state sync (§6.4). Both calls are idempotent and
/// re-entrant per the collaborator contract (§8's idempotence property).
pub trait Backfiller: Send + Sync {
    fn suspend(&self);
    fn resume(&self);
}

/// Invoked when a peer's batch fails to link at the drain boundary (§6.5, §4.4.3 step 5.a).
pub trait DropPeer: Send + Sync {
    fn drop(&self, peer: PeerId);
}

/// Resolves a [`PeerId`] to the connection the supervisor should issue requests through.
/// Separate from [`PeerSet`] because capacity accounting and connection lookup are owned by
/// different parts of the host node in practice.
pub trait ConnectionProvider<H: SkeletonHeader>: Send + Sync {
    fn connection(&self, peer: PeerId) -> Option<std::sync::Arc<dyn PeerConnection<H>>>;
}
