use rocksdb::{DBWithThreadMode, MultiThreaded};
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

pub use conn_builder::ConnBuilder;
use kaspa_utils::fd_budget::FDGuard;

mod conn_builder;

/// The DB type used for Kaspad stores
pub struct DB {
    inner: DBWithThreadMode<MultiThreaded>,
    _fd_guard: FDGuard,
}

impl DB {
    pub fn new(inner: DBWithThreadMode<MultiThreaded>, fd_guard: FDGuard) -> Self {
        Self { inner, _fd_guard: fd_guard }
    }

    /// Opens (or creates) a DB at `path`, reserving `files_limit` file descriptors from the
    /// process-wide budget before touching rocksdb.
    pub fn open(opts: &rocksdb::Options, path: &str, files_limit: i32) -> Result<Self, rocksdb::Error> {
        let fd_guard = kaspa_utils::fd_budget::acquire_guard(files_limit as u64)
            .map_err(|e| rocksdb::Error::new(format!("failed to reserve {files_limit} file descriptors: {e}")))?;
        let inner = DBWithThreadMode::<MultiThreaded>::open(opts, path)?;
        Ok(Self::new(inner, fd_guard))
    }
}

impl DerefMut for DB {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Deref for DB {
    type Target = DBWithThreadMode<MultiThreaded>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Deletes an existing DB if it exists
pub fn delete_db(db_dir: PathBuf) {
    if !db_dir.exists() {
        return;
    }
    let options = rocksdb::Options::default();
    let path = db_dir.to_str().unwrap();
    <DBWithThreadMode<MultiThreaded>>::destroy(&options, path).expect("DB is expected to be deletable");
}
