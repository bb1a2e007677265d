//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chunkgate_core::*;
use chunkgate_engine::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Object storage that keeps uploaded bodies in memory
#[derive(Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    failure: Mutex<Option<String>>,
    uploads: AtomicUsize,
}

impl MemoryObjectStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(
        &self,
        bucket: &BucketId,
        local_path: &Path,
        key: &ObjectKey,
    ) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(GateError::StorageUploadFailed(message));
        }

        let bytes = tokio::fs::read(local_path).await?;
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), bytes);
        Ok(format!("memory://{}/{}", bucket, key))
    }
}

/// How the scripted path service answers
#[derive(Clone, Debug)]
pub enum PathAnswer {
    Prefix(String),
    Unreachable,
    Status(u16),
    Malformed,
}

pub struct ScriptedPathResolver {
    answer: PathAnswer,
    calls: Mutex<Vec<PathPayload>>,
}

impl ScriptedPathResolver {
    pub fn new(answer: PathAnswer) -> Arc<Self> {
        Arc::new(ScriptedPathResolver {
            answer,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<PathPayload> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PathResolver for ScriptedPathResolver {
    async fn resolve(&self, payload: &PathPayload) -> Result<String> {
        self.calls.lock().unwrap().push(payload.clone());
        match &self.answer {
            PathAnswer::Prefix(prefix) => Ok(prefix.clone()),
            PathAnswer::Unreachable => Err(GateError::PathServiceUnreachable(
                "connection refused".to_string(),
            )),
            PathAnswer::Status(status) => Err(GateError::PathServiceError {
                status: *status,
                body: "upstream said no".to_string(),
            }),
            PathAnswer::Malformed => Err(GateError::PathServiceMalformed(
                "response missing 'path' field".to_string(),
            )),
        }
    }
}

/// Source fetcher that serves one canned body, or writes a partial body then fails
pub struct ScriptedFetcher {
    body: Vec<u8>,
    failure: Option<String>,
    staged: Mutex<Vec<PathBuf>>,
}

impl ScriptedFetcher {
    pub fn serving(body: &[u8]) -> Arc<Self> {
        Arc::new(ScriptedFetcher {
            body: body.to_vec(),
            failure: None,
            staged: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(partial: &[u8], message: &str) -> Arc<Self> {
        Arc::new(ScriptedFetcher {
            body: partial.to_vec(),
            failure: Some(message.to_string()),
            staged: Mutex::new(Vec::new()),
        })
    }

    /// Destination files the uploader asked for
    pub fn staged(&self) -> Vec<PathBuf> {
        self.staged.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for ScriptedFetcher {
    async fn fetch_to(&self, _url: &str, dest: &Path) -> Result<u64> {
        self.staged.lock().unwrap().push(dest.to_path_buf());
        tokio::fs::write(dest, &self.body).await?;

        match &self.failure {
            Some(message) => Err(GateError::DownloadFailed(message.clone())),
            None => Ok(self.body.len() as u64),
        }
    }
}

pub struct Harness {
    pub orchestrator: Arc<UploadOrchestrator>,
    pub storage: Arc<MemoryObjectStorage>,
    pub temp_root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_resolver(resolver: Arc<dyn PathResolver>) -> Self {
        Self::build(Some(resolver))
    }

    fn build(resolver: Option<Arc<dyn PathResolver>>) -> Self {
        let temp_root = tempfile::tempdir().unwrap();
        let storage = MemoryObjectStorage::new();

        let mut orchestrator = UploadOrchestrator::new(
            Arc::new(InMemorySessionStore::new()),
            storage.clone(),
            BucketId::new("uploads").unwrap(),
            temp_root.path(),
        )
        .unwrap();
        if let Some(resolver) = resolver {
            orchestrator = orchestrator.with_path_resolver(resolver);
        }

        Harness {
            orchestrator: Arc::new(orchestrator),
            storage,
            temp_root,
        }
    }

    /// Number of entries (session directories) under the temp root
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(self.temp_root.path()).unwrap().count()
    }

    pub async fn send(
        &self,
        upload_id: &str,
        chunk_number: u32,
        total_chunks: u32,
        is_last_chunk: bool,
        bytes: &[u8],
    ) -> Result<ChunkOutcome> {
        self.orchestrator
            .submit_chunk(
                chunk(upload_id, chunk_number, total_chunks, is_last_chunk),
                bytes,
            )
            .await
    }
}

pub fn chunk(upload_id: &str, chunk_number: u32, total_chunks: u32, is_last_chunk: bool) -> ChunkRequest {
    ChunkRequest {
        upload_id: UploadId::new(upload_id).unwrap(),
        chunk_number,
        total_chunks,
        is_last_chunk,
        metadata: UploadMetadata {
            original_filename: "movie.mkv".to_string(),
            object_name: None,
            path_payload: None,
        },
    }
}

pub fn expect_progress(outcome: ChunkOutcome) -> ChunkProgress {
    match outcome {
        ChunkOutcome::Progress(progress) => progress,
        other => panic!("expected progress, got {:?}", other),
    }
}

pub fn expect_complete(outcome: ChunkOutcome) -> UploadReceipt {
    match outcome {
        ChunkOutcome::Complete(receipt) => receipt,
        other => panic!("expected completion, got {:?}", other),
    }
}
