//! Request fetcher (§4.3): one task per in-flight request, issuing a header-by-number request,
//! validating the batch's shape and internal hash chain, and delivering the result (or a revert)
//! back to the controller.
//!
//! Holds no shared mutable state beyond its own per-request signals, matching §4.3's closing
//! note.

use crate::errors::FetchError;
use crate::header::SkeletonHeader;
use crate::peer::{MessageKind, PeerConnection, PeerId, PeerSet};
use kaspa_core::{debug, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Delivered on success: the batch plus the request ID it answers, so the controller can match
/// it against the pending-request table (§4.4.3 step 2).
pub struct FetchDelivery<H> {
    pub request_id: u64,
    pub batch_start_number: u64,
    pub headers: Vec<H>,
}

/// Why a request was reverted, carried only so the supervisor can drive metrics (§7); the
/// scheduling decision itself (release the task, free the peer) is the same for every reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertReason {
    Timeout,
    Cancelled,
    BadBatch,
    ConnectionFailure,
}

/// Delivered on any non-fatal failure (§7: `BadBatchShape` / `PeerTimeout`, both revert-locally).
pub struct FetchRevert {
    pub request_id: u64,
    pub peer: PeerId,
    pub task: u64,
    pub reason: RevertReason,
}

pub struct FetchRequest {
    pub request_id: u64,
    pub peer: PeerId,
    pub task: u64,
    pub target_head: u64,
}

/// Runs one fetch to completion. Never panics on peer misbehavior — every validation failure
/// becomes a revert, per §4.3 step 6 ("the peer is not dropped here").
pub async fn run_fetcher<H, C>(
    request: FetchRequest,
    batch_size: u64,
    connection: Arc<C>,
    peers: Arc<dyn PeerSet>,
    timeout: Duration,
    deliver: mpsc::UnboundedSender<FetchDelivery<H>>,
    revert: mpsc::UnboundedSender<FetchRevert>,
    cancel: triggered::Listener,
    stale: triggered::Listener,
) where
    H: SkeletonHeader,
    C: PeerConnection<H> + ?Sized,
{
    let FetchRequest { request_id, peer, task, target_head } = request;
    // §4.3 step 1: never request block 0; the parent hash at block 1 is sufficient.
    let count = batch_size.min(target_head);
    let start = target_head;

    debug!("skeleton: fetcher requesting {count} headers down from {start} from peer {peer} (req {request_id})");

    let send_revert = |reason: RevertReason, detail: &str| {
        warn!("skeleton: reverting request {request_id} to peer {peer}: {detail}");
        let _ = revert.send(FetchRevert { request_id, peer, task, reason });
    };

    tokio::select! {
        biased;
        _ = cancel.clone() => {
            send_revert(RevertReason::Cancelled, "cycle cancelled");
        }
        _ = stale.clone() => {
            send_revert(RevertReason::Cancelled, "request marked stale");
        }
        result = tokio::time::timeout(timeout, connection.request_headers_by_number(start, count)) => {
            match result {
                Err(_elapsed) => {
                    peers.report_zero_capacity(peer, MessageKind::HeadersByNumber);
                    send_revert(RevertReason::Timeout, "timed out");
                }
                Ok(Err(_request_failure)) => {
                    send_revert(RevertReason::ConnectionFailure, "connection reported a request failure");
                }
                Ok(Ok(batch)) => match validate_batch(&batch.headers, start, count) {
                    Err(err) => {
                        connection.ack(Some(err.to_string()));
                        send_revert(RevertReason::BadBatch, &err.to_string());
                    }
                    Ok(()) => {
                        connection.ack(None);
                        let _ = deliver.send(FetchDelivery { request_id, batch_start_number: start, headers: batch.headers });
                    }
                },
            }
        }
    }
}

/// §4.3 step 6: non-empty, correctly anchored, correctly sized, and internally hash-chained.
fn validate_batch<H: SkeletonHeader>(headers: &[H], requested_head: u64, expected_count: u64) -> Result<(), FetchError> {
    let Some(first) = headers.first() else {
        return Err(FetchError::EmptyBatch);
    };
    if first.number() != requested_head {
        return Err(FetchError::BadAnchor { requested: requested_head, got: first.number() });
    }
    if headers.len() as u64 != expected_count {
        return Err(FetchError::BadSize { expected: expected_count, got: headers.len() as u64 });
    }
    for i in 0..headers.len().saturating_sub(1) {
        if headers[i].parent_hash() != headers[i + 1].hash() {
            return Err(FetchError::UnlinkedInsideBatch { index: i });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::PlainHeader;
    use kaspa_hashes::Hash;

    fn chain(from: u64, count: u64) -> Vec<PlainHeader> {
        // Build a descending, internally linked chain: header[i].parent_hash == header[i+1].hash
        let mut headers = Vec::new();
        let mut prev_hash = Hash::from_bytes([0; 32]);
        for n in (from.saturating_sub(count - 1)..=from).rev() {
            let hash = if n == from { Hash::from_bytes([from as u8; 32]) } else { prev_hash };
            headers.push(PlainHeader { number: n, parent_hash: Hash::from_bytes([(n as u8).wrapping_sub(1); 32]), hash });
            prev_hash = Hash::from_bytes([(n as u8).wrapping_sub(1); 32]);
        }
        headers
    }

    #[test]
    fn validates_well_formed_batch() {
        let headers = chain(8, 4);
        assert!(validate_batch(&headers, 8, 4).is_ok());
    }

    #[test]
    fn rejects_empty_batch() {
        assert_eq!(validate_batch::<PlainHeader>(&[], 8, 4), Err(FetchError::EmptyBatch));
    }

    #[test]
    fn rejects_wrong_anchor() {
        let headers = chain(8, 4);
        assert_eq!(validate_batch(&headers, 9, 4), Err(FetchError::BadAnchor { requested: 9, got: 8 }));
    }

    #[test]
    fn rejects_wrong_size() {
        let headers = chain(8, 4);
        assert_eq!(validate_batch(&headers, 8, 5), Err(FetchError::BadSize { expected: 5, got: 4 }));
    }

    #[test]
    fn rejects_unlinked_headers() {
        let mut headers = chain(8, 4);
        headers[1].parent_hash = Hash::from_bytes([99; 32]);
        assert_eq!(validate_batch(&headers, 8, 4), Err(FetchError::UnlinkedInsideBatch { index: 0 }));
    }
}
