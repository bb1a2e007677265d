//! Upload sessions and the table that tracks them

use chunkgate_core::*;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;
use tracing::{error, info};

/// Server-side state of one in-progress chunked upload.
///
/// The session owns its scratch directory through a [`TempDir`] guard. The
/// directory is removed by [`UploadSession::release`], or on drop if the
/// session is discarded without being released.
#[derive(Debug)]
pub struct UploadSession {
    upload_id: UploadId,
    temp_dir: Option<TempDir>,
    dir: PathBuf,
    chunks: BTreeMap<u32, PathBuf>,
    total_chunks: u32,
    metadata: UploadMetadata,
    created_at: SystemTime,
    last_touched: Instant,
}

impl UploadSession {
    /// Create a session with a fresh, exclusively owned directory under `temp_root`
    pub fn create(
        upload_id: UploadId,
        total_chunks: u32,
        metadata: UploadMetadata,
        temp_root: &Path,
    ) -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("upload_{}_", upload_id))
            .tempdir_in(temp_root)?;
        let dir = temp_dir.path().to_path_buf();

        Ok(UploadSession {
            upload_id,
            temp_dir: Some(temp_dir),
            dir,
            chunks: BTreeMap::new(),
            total_chunks,
            metadata,
            created_at: SystemTime::now(),
            last_touched: Instant::now(),
        })
    }

    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn metadata(&self) -> &UploadMetadata {
        &self.metadata
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn record_chunk(&mut self, index: u32, path: PathBuf) {
        self.chunks.insert(index, path);
        self.touch();
    }

    pub fn has_chunk(&self, index: u32) -> bool {
        self.chunks.contains_key(&index)
    }

    /// Number of distinct chunk indices received so far
    pub fn chunks_received(&self) -> usize {
        self.chunks.len()
    }

    /// Indices in `[1, total_chunks]` that have not arrived, ascending
    pub fn missing_chunks(&self) -> Vec<u32> {
        (1..=self.total_chunks)
            .filter(|index| !self.chunks.contains_key(index))
            .collect()
    }

    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_touched.elapsed()
    }

    pub fn is_released(&self) -> bool {
        self.temp_dir.is_none()
    }

    /// Delete the scratch directory. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(temp_dir) = self.temp_dir.take() {
            match temp_dir.close() {
                Ok(()) => info!("Cleaned up temp directory: {}", self.dir.display()),
                Err(e) => error!(
                    "Failed to cleanup temp directory {}: {}",
                    self.dir.display(),
                    e
                ),
            }
            self.chunks.clear();
        }
    }
}

/// Shared handle to a session; the mutex serializes every request for one upload id
pub type SessionHandle = Arc<tokio::sync::Mutex<UploadSession>>;

/// Keyed storage of live sessions, injected into the orchestrator.
///
/// Implementations hold at most one entry per upload id.
pub trait SessionStore: Send + Sync {
    fn get(&self, upload_id: &UploadId) -> Option<SessionHandle>;

    /// Insert `session`, returning the entry it replaced
    fn insert(&self, upload_id: UploadId, session: SessionHandle) -> Option<SessionHandle>;

    fn remove(&self, upload_id: &UploadId) -> Option<SessionHandle>;

    /// Remove the entry only if it is still `session`; returns whether it was removed
    fn remove_if_same(&self, upload_id: &UploadId, session: &SessionHandle) -> bool;

    fn snapshot(&self) -> Vec<(UploadId, SessionHandle)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `session` is the live entry for `upload_id`
    fn is_current(&self, upload_id: &UploadId, session: &SessionHandle) -> bool {
        self.get(upload_id)
            .map_or(false, |current| Arc::ptr_eq(&current, session))
    }
}

/// Process-local session table on a sharded concurrent map
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<UploadId, SessionHandle>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, upload_id: &UploadId) -> Option<SessionHandle> {
        self.sessions.get(upload_id).map(|entry| entry.value().clone())
    }

    fn insert(&self, upload_id: UploadId, session: SessionHandle) -> Option<SessionHandle> {
        self.sessions.insert(upload_id, session)
    }

    fn remove(&self, upload_id: &UploadId) -> Option<SessionHandle> {
        self.sessions.remove(upload_id).map(|(_, session)| session)
    }

    fn remove_if_same(&self, upload_id: &UploadId, session: &SessionHandle) -> bool {
        self.sessions
            .remove_if(upload_id, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    fn snapshot(&self) -> Vec<(UploadId, SessionHandle)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
