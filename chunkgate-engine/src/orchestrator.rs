//! Chunked upload state machine

use chunkgate_core::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    resolve_object_key, Assembler, ChunkStore, ObjectStorage, SessionHandle, SessionStore,
    UploadSession,
};

/// Drives chunked uploads from the first chunk to completion, abort or failure.
///
/// Every request for one upload id is serialized on that session's mutex.
/// A session leaves the table and loses its directory at exactly one place,
/// [`UploadOrchestrator::retire`], whatever the terminal outcome.
pub struct UploadOrchestrator {
    sessions: Arc<dyn SessionStore>,
    chunks: ChunkStore,
    assembler: Assembler,
    storage: Arc<dyn ObjectStorage>,
    resolver: Option<Arc<dyn PathResolver>>,
    bucket: BucketId,
    temp_root: PathBuf,
}

impl UploadOrchestrator {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        storage: Arc<dyn ObjectStorage>,
        bucket: BucketId,
        temp_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let temp_root = temp_root.into();
        std::fs::create_dir_all(&temp_root)?;

        let chunks = ChunkStore::new();
        Ok(UploadOrchestrator {
            sessions,
            chunks,
            assembler: Assembler::new(chunks),
            storage,
            resolver: None,
            bucket,
            temp_root,
        })
    }

    pub fn with_path_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn bucket(&self) -> &BucketId {
        &self.bucket
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Accept one chunk of a chunked upload.
    ///
    /// Chunk 1 always opens a fresh session, discarding any previous one under
    /// the same id. The terminal chunk (`is_last_chunk`) triggers the
    /// completeness check, assembly and upload, and ends the session whatever
    /// the result.
    pub async fn submit_chunk(&self, request: ChunkRequest, bytes: &[u8]) -> Result<ChunkOutcome> {
        if request.chunk_number == 0 {
            return Err(GateError::InvalidChunkRequest(
                "chunk numbers start at 1".to_string(),
            ));
        }
        if request.total_chunks == 0 {
            return Err(GateError::InvalidChunkRequest(
                "total_chunks must be at least 1".to_string(),
            ));
        }

        let upload_id = request.upload_id.clone();
        debug!(
            "Multipart upload: {}, chunk {}/{} ({} bytes)",
            upload_id,
            request.chunk_number,
            request.total_chunks,
            bytes.len()
        );

        let handle = if request.chunk_number == 1 {
            self.open_session(&request).await?
        } else {
            self.sessions
                .get(&upload_id)
                .ok_or_else(|| session_not_found(&upload_id))?
        };

        let mut session = handle.lock().await;

        // Replaced, aborted or expired while this request waited for the lock
        if session.is_released() || !self.sessions.is_current(&upload_id, &handle) {
            return Err(session_not_found(&upload_id));
        }

        if request.chunk_number > session.total_chunks() {
            return Err(GateError::InvalidChunkRequest(format!(
                "chunk {} is outside 1..={}",
                request.chunk_number,
                session.total_chunks()
            )));
        }
        if request.total_chunks != session.total_chunks() {
            warn!(
                "Upload {} declared {} total chunks, session was opened with {}",
                upload_id,
                request.total_chunks,
                session.total_chunks()
            );
        }

        if !request.is_last_chunk {
            if session.has_chunk(request.chunk_number) {
                debug!(
                    "Chunk {} of upload {} sent again, replacing it",
                    request.chunk_number, upload_id
                );
            }
            let path = self
                .chunks
                .save(session.dir(), request.chunk_number, bytes)
                .await?;
            session.record_chunk(request.chunk_number, path);

            return Ok(ChunkOutcome::Progress(ChunkProgress {
                message: format!(
                    "Chunk {}/{} uploaded successfully",
                    request.chunk_number,
                    session.total_chunks()
                ),
                upload_id: upload_id.to_string(),
                chunk_number: request.chunk_number,
                total_chunks: session.total_chunks(),
                chunks_received: session.chunks_received(),
            }));
        }

        let outcome = self.finish(&mut session, request.chunk_number, bytes).await;
        self.retire(&upload_id, &handle, &mut session);

        match outcome {
            Ok(receipt) => Ok(ChunkOutcome::Complete(receipt)),
            Err(e) => {
                warn!("Multipart upload {} failed: {}", upload_id, e);
                Err(e)
            }
        }
    }

    /// Abort an upload. Unknown or already finished ids are accepted silently.
    pub async fn abort(&self, upload_id: &UploadId) -> AbortReceipt {
        match self.sessions.remove(upload_id) {
            Some(handle) => {
                let mut session = handle.lock().await;
                session.release();
                info!("Aborted upload session: {}", upload_id);
            }
            None => debug!("Abort requested for unknown upload {}", upload_id),
        }

        AbortReceipt::new(upload_id.as_str())
    }

    /// Expire sessions untouched for at least `max_idle`.
    ///
    /// Sessions locked by an in-flight request are skipped until the next sweep.
    pub fn sweep_idle(&self, max_idle: Duration) -> usize {
        let mut expired = 0;

        for (upload_id, handle) in self.sessions.snapshot() {
            let Ok(mut session) = handle.try_lock() else {
                continue;
            };
            if session.is_released() || session.idle_for() < max_idle {
                continue;
            }

            if self.sessions.remove_if_same(&upload_id, &handle) {
                warn!(
                    "Expiring upload session {} idle for {}s with {}/{} chunks",
                    upload_id,
                    session.idle_for().as_secs(),
                    session.chunks_received(),
                    session.total_chunks()
                );
                session.release();
                expired += 1;
            }
        }

        expired
    }

    async fn open_session(&self, request: &ChunkRequest) -> Result<SessionHandle> {
        if request.metadata.original_filename.trim().is_empty() {
            return Err(GateError::InvalidChunkRequest(
                "original_filename is required on chunk 1".to_string(),
            ));
        }

        let session = UploadSession::create(
            request.upload_id.clone(),
            request.total_chunks,
            request.metadata.clone(),
            &self.temp_root,
        )?;
        info!(
            "Initialized multipart upload session: {} at {}",
            request.upload_id,
            session.dir().display()
        );

        let handle: SessionHandle = Arc::new(tokio::sync::Mutex::new(session));
        if let Some(previous) = self.sessions.insert(request.upload_id.clone(), handle.clone()) {
            info!("Restarting upload {}, discarding previous session", request.upload_id);
            previous.lock().await.release();
        }

        Ok(handle)
    }

    /// Terminal chunk: store it, verify completeness, assemble and upload
    async fn finish(
        &self,
        session: &mut UploadSession,
        chunk_number: u32,
        bytes: &[u8],
    ) -> Result<UploadReceipt> {
        let path = self.chunks.save(session.dir(), chunk_number, bytes).await?;
        session.record_chunk(chunk_number, path);

        let upload_id = session.upload_id().clone();
        let total_chunks = session.total_chunks();
        info!("Last chunk received, assembling file for upload {}", upload_id);

        let missing = session.missing_chunks();
        if !missing.is_empty() {
            return Err(GateError::IncompleteUpload {
                missing,
                received: session.chunks_received(),
                total: total_chunks,
            });
        }

        let artifact = self.assembler.assemble(session.dir(), total_chunks).await?;

        let metadata = session.metadata().clone();
        let key = resolve_object_key(
            self.resolver.as_deref(),
            metadata.path_payload.as_ref(),
            metadata.object_name.as_deref(),
            &metadata.original_filename,
        )
        .await?;

        let elapsed = session.created_at().elapsed().unwrap_or_default();
        info!(
            "Uploading assembled file to bucket {} as {} ({}s after chunk 1)",
            self.bucket,
            key,
            elapsed.as_secs()
        );
        let locator = self.storage.upload(&self.bucket, &artifact, &key).await?;

        Ok(UploadReceipt {
            message: format!(
                "File '{}' uploaded successfully via multipart upload.",
                metadata.original_filename
            ),
            storage_locator_url: locator,
            resolved_object_name: key.to_string(),
            source: UploadSource::MultipartUpload,
            original_filename: metadata.original_filename,
            safe_filename: None,
            upload_id: Some(upload_id.to_string()),
            total_chunks: Some(total_chunks),
        })
    }

    fn retire(&self, upload_id: &UploadId, handle: &SessionHandle, session: &mut UploadSession) {
        self.sessions.remove_if_same(upload_id, handle);
        session.release();
        info!("Removed upload session: {}", upload_id);
    }
}

fn session_not_found(upload_id: &UploadId) -> GateError {
    GateError::SessionNotFound {
        upload_id: upload_id.to_string(),
    }
}
