//! Upload engine: chunked session management and the embedded object store

use chunkgate_core::*;
use fjall::{Config, Keyspace, PersistMode};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub mod assembler;
pub mod bucket;
pub mod chunk_store;
pub mod direct;
pub mod naming;
pub mod orchestrator;
pub mod session;
pub mod storage;
pub mod sweeper;

pub use assembler::Assembler;
pub use bucket::Bucket;
pub use chunk_store::ChunkStore;
pub use direct::DirectUploader;
pub use naming::resolve_object_key;
pub use orchestrator::UploadOrchestrator;
pub use session::{InMemorySessionStore, SessionHandle, SessionStore, UploadSession};
pub use storage::{FjallObjectStorage, ObjectStorage};
pub use sweeper::{spawn_idle_sweeper, SweepConfig};

/// Object store wrapping a fjall keyspace
#[derive(Clone)]
pub struct StorageEngine {
    keyspace: Arc<Keyspace>,
    part_size: usize,
    // Serializes metadata swaps so each superseded version is collected exactly once
    commit_lock: Arc<Mutex<()>>,
}

impl StorageEngine {
    /// Open (or create) the store at the given path
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let keyspace = Arc::new(
            Config::new(path)
                .open()
                .map_err(|e| GateError::Storage(e.to_string()))?,
        );

        Ok(StorageEngine {
            keyspace,
            part_size: 4 * 1024 * 1024,
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Create temporary storage engine for testing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp() -> Result<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::tempdir()?;
        let engine = Self::new(temp_dir.path())?;
        Ok((engine, temp_dir))
    }

    /// Override the on-disk part size (tests use tiny parts to exercise splitting)
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    pub fn bucket(&self, bucket_id: &BucketId) -> Result<Bucket> {
        Bucket::new(self.clone(), bucket_id.clone())
    }

    pub(crate) fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    pub fn part_size(&self) -> usize {
        self.part_size
    }

    pub(crate) fn commit_guard(&self) -> MutexGuard<'_, ()> {
        // The guarded section holds no data, so a poisoned lock is still usable
        self.commit_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Persist all changes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| GateError::Storage(e.to_string()))
    }
}
