//! Scratch window (§3, §4.2): the bounded in-memory ring of reserved header slots.

use crate::header::SkeletonHeader;

/// Owner of a scratch task slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Empty,
    Peer(u64),
}

impl Owner {
    pub fn is_empty(&self) -> bool {
        matches!(self, Owner::Empty)
    }
}

/// Fixed-capacity staging area for concurrently downloaded batches (§3 "Scratch window").
///
/// `buffer[0]` corresponds to block number `scratch_head`; slot `i` corresponds to
/// `scratch_head - i`. `owners[t]` tracks the peer (if any) assigned to task `t`, where task `t`
/// owns slots `[t*B, (t+1)*B)`.
pub struct ScratchWindow<H: SkeletonHeader> {
    batch_size: u64,
    buffer: Vec<Option<H>>,
    owners: Vec<Owner>,
    scratch_head: u64,
}

impl<H: SkeletonHeader> ScratchWindow<H> {
    pub fn new(batch_size: u64, task_count: u64, scratch_head: u64) -> Self {
        let capacity = (batch_size * task_count) as usize;
        Self { batch_size, buffer: (0..capacity).map(|_| None).collect(), owners: vec![Owner::Empty; task_count as usize], scratch_head }
    }

    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }

    pub fn task_count(&self) -> u64 {
        self.owners.len() as u64
    }

    pub fn scratch_head(&self) -> u64 {
        self.scratch_head
    }

    /// Clears both arrays and re-anchors the window at `scratch_head` (§4.2 `reset`).
    pub fn reset(&mut self, scratch_head: u64) {
        self.buffer.iter_mut().for_each(|slot| *slot = None);
        self.owners.iter_mut().for_each(|owner| *owner = Owner::Empty);
        self.scratch_head = scratch_head;
    }

    /// Tasks with no owner whose target head is still above genesis (§4.2 `unowned_tasks`).
    pub fn unowned_tasks(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.task_count()).filter(move |&t| self.owners[t as usize].is_empty() && t * self.batch_size < self.scratch_head)
    }

    /// The block number a request for task `t` should target.
    pub fn task_target(&self, task: u64) -> u64 {
        self.scratch_head - task * self.batch_size
    }

    pub fn owner(&self, task: u64) -> Owner {
        self.owners[task as usize]
    }

    /// Assigns `peer` to `task`. Panics if the task was already owned — callers must check first
    /// (§4.2 "callers must ensure previously empty").
    pub fn assign(&mut self, task: u64, peer: u64) {
        assert!(self.owners[task as usize].is_empty(), "task {task} already owned");
        self.owners[task as usize] = Owner::Peer(peer);
    }

    /// Releases `task`'s ownership, e.g. on revert (§4.2 `release`).
    pub fn release(&mut self, task: u64) {
        self.owners[task as usize] = Owner::Empty;
    }

    /// Writes `headers[k]` into the slot for `batch_start_number - k` (§4.2 `deposit`).
    ///
    /// `headers` must be in strictly decreasing block-number order starting at
    /// `batch_start_number`, as validated by the fetcher (§4.3). Indices outside the window are a
    /// caller bug (an assert, not a recoverable error) — §4.2 calls this out explicitly.
    pub fn deposit(&mut self, batch_start_number: u64, headers: Vec<H>) {
        for (k, header) in headers.into_iter().enumerate() {
            let slot_index = self.scratch_head as i128 - (batch_start_number as i128 - k as i128);
            assert!(slot_index >= 0 && (slot_index as usize) < self.buffer.len(), "deposit index {slot_index} out of scratch bounds");
            self.buffer[slot_index as usize] = Some(header);
        }
    }

    pub fn head_slot(&self) -> Option<&H> {
        self.buffer[0].as_ref()
    }

    /// First `B` slots of the buffer, for head-batch validation/consumption (§4.4.3 step 5).
    pub fn head_batch(&self) -> &[Option<H>] {
        let end = self.batch_size.min(self.buffer.len() as u64) as usize;
        &self.buffer[..end]
    }

    /// Clears the first `B` slots (used both when a head batch is unlinked and after it is
    /// consumed — §4.4.3 step 5.a / 5.c).
    pub fn clear_head_batch(&mut self) {
        let end = self.batch_size.min(self.buffer.len() as u64) as usize;
        self.buffer[..end].iter_mut().for_each(|slot| *slot = None);
    }

    /// Shifts the buffer left by `B` slots and the owners left by one, decrements
    /// `scratch_head` by `consumed`, and marks task 0's old owner slot vacated by the shift
    /// (§4.4.3 steps 5.c/5.d).
    pub fn shift(&mut self, consumed: u64) {
        let b = self.batch_size as usize;
        self.buffer.drain(0..b);
        self.buffer.resize_with(self.buffer.len() + b, || None);
        self.owners.remove(0);
        self.owners.push(Owner::Empty);
        self.scratch_head -= consumed;
    }
}
