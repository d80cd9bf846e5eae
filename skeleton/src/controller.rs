//! Cycle controller (§4.4): `initSync`, `processNewHead`, `processResponse`, and the drain
//! algorithm that keeps the subchain list and scratch window in lock-step.

use crate::header::SkeletonHeader;
use crate::peer::PeerId;
use crate::progress_store::{ProgressBatch, ProgressStore};
use crate::scratch::ScratchWindow;
use crate::subchain::{ProgressBlob, Subchain};
use kaspa_core::{debug, info, warn};

/// Internal control signal returned from a cycle (§9 "enum-encoded cycle exit"). Never surfaced
/// to callers of the public API — see [`crate::errors::SkeletonError`] for that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// `scratchHead` reached 0: genesis is linked.
    Linked,
    /// `processResponse` merged two subchains; restart with a clean scratch window.
    Merged,
    /// A new head announcement could not be absorbed in-place; restart with it as input.
    Reorged,
    /// External shutdown request.
    Terminated,
}

/// Outcome of a single `processResponse` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// Whether any headers were actually drained into the store (false on a head-of-scratch gap).
    pub progressed: bool,
    pub merged: bool,
    pub linked: bool,
    /// Total headers written to the store across every drain iteration of this call.
    pub headers_committed: u64,
    /// Set when the delivered head batch didn't link to `S[0].next`; the caller must drop this
    /// peer and release scratch task 0 (§4.4.3 step 5.a, §7 `BatchUnlinked`).
    pub unlinked_peer: Option<PeerId>,
}

pub struct Controller<S: ProgressStore, H: SkeletonHeader> {
    store: S,
    subchains: Vec<Subchain>,
    scratch: ScratchWindow<H>,
}

impl<S: ProgressStore, H: SkeletonHeader> Controller<S, H> {
    pub fn new(store: S, batch_size: u64, task_count: u64) -> Self {
        Self { store, subchains: Vec::new(), scratch: ScratchWindow::new(batch_size, task_count, 0) }
    }

    pub fn scratch(&self) -> &ScratchWindow<H> {
        &self.scratch
    }

    pub fn scratch_mut(&mut self) -> &mut ScratchWindow<H> {
        &mut self.scratch
    }

    pub fn subchains(&self) -> &[Subchain] {
        &self.subchains
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// §4.4.1: establishes the subchain list for a new cycle from the current progress blob and
    /// the newly announced head, then resets the scratch window below the new primary's tail.
    pub fn init_sync(&mut self, head: &H) {
        let n = head.number();
        let p = head.parent_hash();

        let blob = self.store.get_progress();
        self.subchains = match blob {
            None => {
                info!("skeleton: no prior progress, starting fresh from head {n}");
                vec![Subchain::new(n, n, p)]
            }
            Some(ProgressBlob { subchains }) if subchains.is_empty() => {
                vec![Subchain::new(n, n, p)]
            }
            Some(ProgressBlob { mut subchains }) => {
                // Step 1: drop every subchain now obsolete because the new head is at or below
                // its tail.
                while let Some(first) = subchains.first() {
                    if first.tail >= n {
                        subchains.remove(0);
                    } else {
                        break;
                    }
                }
                if subchains.is_empty() {
                    vec![Subchain::new(n, n, p)]
                } else {
                    // Step 2: truncate an overlapping remaining subchain down to N-1.
                    if subchains[0].head >= n {
                        subchains[0].head = n - 1;
                    }
                    // Step 3: extend if contiguous and linking, else prepend.
                    let extends = subchains[0].head == n - 1
                        && self.store.get_header::<H>(subchains[0].head).map(|h| h.hash() == p).unwrap_or(false);
                    if extends {
                        subchains[0].head = n;
                        subchains
                    } else {
                        let mut next = vec![Subchain::new(n, n, p)];
                        next.extend(subchains);
                        next
                    }
                }
            }
        };

        let mut batch = self.store.new_batch();
        batch.put_header(head);
        batch.put_progress(&ProgressBlob { subchains: self.subchains.clone() });
        self.store.commit(batch);

        let scratch_head = self.subchains[0].tail.saturating_sub(1);
        let task_count = self.scratch.task_count();
        let batch_size = self.scratch.batch_size();
        self.scratch = ScratchWindow::new(batch_size, task_count, scratch_head);
    }

    /// §4.4.2: absorbs a new head announced mid-cycle, or signals that the cycle must restart.
    pub fn process_new_head(&mut self, head: &H) -> bool {
        let n = head.number();
        let primary = self.subchains[0];

        if n <= primary.tail {
            debug!("skeleton: new head {n} at or below primary tail {}, reorg", primary.tail);
            return true;
        }
        if n > primary.head + 1 {
            debug!("skeleton: new head {n} leaves a gap above primary head {}, reorg", primary.head);
            return true;
        }
        let expected_parent = match self.store.get_header::<H>(n - 1) {
            Some(prev) => prev.hash(),
            None => {
                debug!("skeleton: missing header {} while validating new head {n}, reorg", n - 1);
                return true;
            }
        };
        if expected_parent != head.parent_hash() {
            debug!("skeleton: new head {n} forks from stored chain, reorg");
            return true;
        }

        let mut batch = self.store.new_batch();
        batch.put_header(head);
        self.subchains[0].head = n;
        batch.put_progress(&ProgressBlob { subchains: self.subchains.clone() });
        self.store.commit(batch);
        false
    }

    /// §4.4.3: deposits a response and drains the scratch window head-first into the store.
    pub fn process_response(&mut self, batch_start_number: u64, headers: Vec<H>) -> ResponseOutcome {
        self.scratch.deposit(batch_start_number, headers);

        if self.scratch.head_slot().is_none() {
            return ResponseOutcome { progressed: false, merged: false, linked: false, headers_committed: 0, unlinked_peer: None };
        }

        let mut merged = false;
        let mut unlinked_peer = None;
        let mut progressed = false;
        let mut headers_committed = 0u64;

        while let Some(head_header) = self.scratch.head_slot() {
            if head_header.hash() != self.subchains[0].next {
                warn!("skeleton: unlinked headers inside batch at head of scratch space, dropping peer");
                unlinked_peer = self.scratch.owner(0).into();
                self.scratch.clear_head_batch();
                self.scratch.release(0);
                break;
            }

            let mut batch = self.store.new_batch();
            let mut consumed = 0u64;
            let mut new_tail = self.subchains[0].tail;
            let mut new_next = self.subchains[0].next;
            for slot in self.scratch.head_batch() {
                let Some(header) = slot else { break };
                batch.put_header(header);
                new_tail -= 1;
                new_next = header.parent_hash();
                consumed += 1;
            }
            self.subchains[0].tail = new_tail;
            self.subchains[0].next = new_next;
            progressed = true;
            headers_committed += consumed;

            self.scratch.shift(consumed);

            // §4.4.3 step 5.e: subchain overlap resolution / merge. The merge check only follows
            // the truncate branch, where `subchains[1].head` was just set to `subchains[0].tail -
            // 1` — exactly the position `subchains[0].next` names. After the remove branch,
            // `subchains[1]` (if any) is a different, not-yet-overlapping subchain; the `while`
            // condition re-checks it on the next iteration instead.
            while self.subchains.len() > 1 && self.subchains[1].head >= self.subchains[0].tail {
                if self.subchains[1].tail >= self.subchains[0].tail {
                    self.subchains.remove(1);
                } else {
                    self.subchains[1].head = self.subchains[0].tail - 1;
                    let links = self.store.get_header::<H>(self.subchains[1].head).map(|h| h.hash() == self.subchains[0].next);
                    if links == Some(true) {
                        let removed = self.subchains.remove(1);
                        self.subchains[0].tail = removed.tail;
                        self.subchains[0].next = removed.next;
                        merged = true;
                    }
                }
            }

            batch.put_progress(&ProgressBlob { subchains: self.subchains.clone() });
            self.store.commit(batch);

            if consumed < self.scratch.batch_size() {
                // Only possible at genesis (§9 "preserve this coupling").
                break;
            }
        }

        let linked = self.scratch.scratch_head() == 0;
        ResponseOutcome { progressed, merged, linked, headers_committed, unlinked_peer }
    }
}

impl From<crate::scratch::Owner> for Option<PeerId> {
    fn from(owner: crate::scratch::Owner) -> Self {
        match owner {
            crate::scratch::Owner::Empty => None,
            crate::scratch::Owner::Peer(p) => Some(p),
        }
    }
}
