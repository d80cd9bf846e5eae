//! Progress store (§4.1): the durable record of subchains and skeleton headers.
//!
//! Modeled as a trait so tests can swap in an in-memory fake; [`DbProgressStore`] is the
//! production implementation, built directly on `kaspa_database`'s rocksdb abstraction.

use crate::header::SkeletonHeader;
use crate::subchain::ProgressBlob;
use kaspa_database::prelude::{BatchDbWriter, DbWriter, DB};
use parking_lot::RwLock;
use rocksdb::WriteBatch;
use std::collections::HashMap;
use std::sync::Arc;

const HEADER_PREFIX: u8 = 1;
const PROGRESS_KEY: &[u8] = b"\x02skeleton-sync-status";

fn header_key(number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.push(HEADER_PREFIX);
    key.extend_from_slice(&number.to_be_bytes());
    key
}

/// A batched group of writes that must land atomically (§4.1 `commit`).
pub trait ProgressBatch {
    fn put_header<H: SkeletonHeader>(&mut self, header: &H);
    fn put_progress(&mut self, blob: &ProgressBlob);
}

/// The durable record of subchains and skeleton headers (§4.1).
///
/// `commit` failing is fatal to the process (§4.1, §7 `StoreFailure`): progress without the
/// referenced headers, or vice versa, violates §3's invariants, so there is no recovery path
/// short of restarting sync from scratch.
pub trait ProgressStore: Send + Sync {
    type Batch: ProgressBatch;

    fn new_batch(&self) -> Self::Batch;
    fn commit(&self, batch: Self::Batch);

    fn get_header<H: SkeletonHeader>(&self, number: u64) -> Option<H>;
    fn get_progress(&self) -> Option<ProgressBlob>;
}

impl<T: ProgressStore> ProgressStore for Arc<T> {
    type Batch = T::Batch;

    fn new_batch(&self) -> Self::Batch {
        (**self).new_batch()
    }

    fn commit(&self, batch: Self::Batch) {
        (**self).commit(batch)
    }

    fn get_header<H: SkeletonHeader>(&self, number: u64) -> Option<H> {
        (**self).get_header(number)
    }

    fn get_progress(&self) -> Option<ProgressBlob> {
        (**self).get_progress()
    }
}

/// Production implementation backed by a dedicated rocksdb handle.
pub struct DbProgressStore {
    db: Arc<DB>,
}

impl DbProgressStore {
    pub fn new(db: Arc<DB>) -> Self {
        Self { db }
    }
}

pub struct DbProgressBatch {
    batch: WriteBatch,
}

impl ProgressBatch for DbProgressBatch {
    fn put_header<H: SkeletonHeader>(&mut self, header: &H) {
        let mut writer = BatchDbWriter::new(&mut self.batch);
        writer.put(header_key(header.number()), header.serialized()).expect("batch writes to an in-memory WriteBatch never fail");
    }

    fn put_progress(&mut self, blob: &ProgressBlob) {
        let mut writer = BatchDbWriter::new(&mut self.batch);
        writer.put(PROGRESS_KEY, blob.encode()).expect("batch writes to an in-memory WriteBatch never fail");
    }
}

impl ProgressStore for DbProgressStore {
    type Batch = DbProgressBatch;

    fn new_batch(&self) -> Self::Batch {
        DbProgressBatch { batch: WriteBatch::default() }
    }

    fn commit(&self, batch: Self::Batch) {
        // §4.1 / §7 StoreFailure: a commit failure is unrecoverable — abort rather than risk a
        // progress blob that has outrun (or lagged) the headers it references.
        self.db.write(batch.batch).expect("progress store commit must succeed or the process aborts");
    }

    fn get_header<H: SkeletonHeader>(&self, number: u64) -> Option<H> {
        match self.db.get_pinned(header_key(number)) {
            Ok(Some(slice)) => H::deserialize(&slice),
            Ok(None) => None,
            Err(err) => panic!("unexpected store error reading header {number}: {err:?}"),
        }
    }

    fn get_progress(&self) -> Option<ProgressBlob> {
        match self.db.get_pinned(PROGRESS_KEY) {
            Ok(Some(slice)) => ProgressBlob::decode(&slice),
            Ok(None) => None,
            Err(err) => panic!("unexpected store error reading sync progress: {err:?}"),
        }
    }
}

/// In-memory fake used by tests (§8).
#[derive(Default)]
pub struct InMemoryProgressStore {
    headers: RwLock<HashMap<u64, Vec<u8>>>,
    progress: RwLock<Option<Vec<u8>>>,
}

pub struct MemoryBatch {
    headers: Vec<(u64, Vec<u8>)>,
    progress: Option<Vec<u8>>,
}

impl ProgressBatch for MemoryBatch {
    fn put_header<H: SkeletonHeader>(&mut self, header: &H) {
        self.headers.push((header.number(), header.serialized()));
    }

    fn put_progress(&mut self, blob: &ProgressBlob) {
        self.progress = Some(blob.encode());
    }
}

impl ProgressStore for InMemoryProgressStore {
    type Batch = MemoryBatch;

    fn new_batch(&self) -> Self::Batch {
        MemoryBatch { headers: Vec::new(), progress: None }
    }

    fn commit(&self, batch: Self::Batch) {
        let mut headers = self.headers.write();
        for (number, bytes) in batch.headers {
            headers.insert(number, bytes);
        }
        if let Some(blob) = batch.progress {
            *self.progress.write() = Some(blob);
        }
    }

    fn get_header<H: SkeletonHeader>(&self, number: u64) -> Option<H> {
        self.headers.read().get(&number).and_then(|bytes| H::deserialize(bytes))
    }

    fn get_progress(&self) -> Option<ProgressBlob> {
        self.progress.read().as_ref().and_then(|bytes| ProgressBlob::decode(bytes))
    }
}
