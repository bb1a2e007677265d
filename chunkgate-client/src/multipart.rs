//! Multipart upload support

use bytes::Bytes;
use chunkgate_core::*;
use std::path::Path;
use tracing::{debug, warn};

use crate::{Client, ClientError, Result};

/// Default size of each chunk sent to the gateway
pub const DEFAULT_CHUNK_SIZE: usize = 5 * 1024 * 1024;

/// Uploads a payload as a sequence of chunks under one upload id
pub struct MultipartUpload {
    client: Client,
    upload_id: UploadId,
    chunk_size: usize,
    metadata: UploadMetadata,
}

impl MultipartUpload {
    pub fn new(client: Client, upload_id: UploadId, original_filename: impl Into<String>) -> Self {
        MultipartUpload {
            client,
            upload_id,
            chunk_size: DEFAULT_CHUNK_SIZE,
            metadata: UploadMetadata {
                original_filename: original_filename.into(),
                ..UploadMetadata::default()
            },
        }
    }

    /// Bytes per chunk; zero is treated as one
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn object_name(mut self, object_name: impl Into<String>) -> Self {
        self.metadata.object_name = Some(object_name.into());
        self
    }

    pub fn path_payload(mut self, payload: PathPayload) -> Self {
        self.metadata.path_payload = Some(payload);
        self
    }

    pub fn upload_id(&self) -> &UploadId {
        &self.upload_id
    }

    /// Number of chunks `len` bytes are split into
    pub fn chunk_count(&self, len: usize) -> u32 {
        plan(len, self.chunk_size).len() as u32
    }

    /// Upload a file from disk
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadReceipt> {
        let data = tokio::fs::read(path.as_ref()).await?;
        self.upload(&data).await
    }

    /// Send every chunk in order and return the completion receipt.
    ///
    /// If a chunk before the last fails the session is aborted, best effort,
    /// before the error is returned. A failing last chunk needs no abort since
    /// the gateway ends the session itself.
    pub async fn upload(&self, data: &[u8]) -> Result<UploadReceipt> {
        let data = Bytes::copy_from_slice(data);
        let ranges = plan(data.len(), self.chunk_size);
        let total_chunks = ranges.len() as u32;

        for (position, (start, end)) in ranges.into_iter().enumerate() {
            let chunk_number = position as u32 + 1;
            let is_last_chunk = chunk_number == total_chunks;

            let request = ChunkRequest {
                upload_id: self.upload_id.clone(),
                chunk_number,
                total_chunks,
                is_last_chunk,
                metadata: if chunk_number == 1 {
                    self.metadata.clone()
                } else {
                    UploadMetadata::default()
                },
            };

            let outcome = match self.client.send_chunk(&request, data.slice(start..end)).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    if !is_last_chunk {
                        self.abort_quietly().await;
                    }
                    return Err(err);
                }
            };

            match outcome {
                ChunkOutcome::Complete(receipt) if is_last_chunk => return Ok(receipt),
                ChunkOutcome::Progress(progress) if !is_last_chunk => {
                    debug!("{}", progress.message);
                }
                other => {
                    if !is_last_chunk {
                        self.abort_quietly().await;
                    }
                    return Err(ClientError::InvalidResponse(format!(
                        "unexpected reply to chunk {}/{}: {:?}",
                        chunk_number, total_chunks, other
                    )));
                }
            }
        }

        Err(ClientError::InvalidResponse(
            "upload finished without a completion receipt".to_string(),
        ))
    }

    async fn abort_quietly(&self) {
        if let Err(err) = self.client.abort(&self.upload_id).await {
            warn!("Failed to abort upload {}: {}", self.upload_id, err);
        }
    }
}

/// Byte ranges of each chunk. Empty input still produces one empty chunk.
fn plan(len: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    if len == 0 {
        return vec![(0, 0)];
    }

    (0..len)
        .step_by(chunk_size)
        .map(|start| (start, (start + chunk_size).min(len)))
        .collect()
}
