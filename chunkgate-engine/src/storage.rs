//! Storage client contract and its embedded fjall implementation

use async_trait::async_trait;
use chunkgate_core::wire;
use chunkgate_core::*;
use std::path::Path;
use tracing::{error, info};

use crate::StorageEngine;

/// Uploads a local file into object storage.
///
/// Returns the caller-facing locator URL of the stored object. Failures are
/// reported as [`GateError::StorageUploadFailed`] and are never swallowed.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: &BucketId, local_path: &Path, key: &ObjectKey)
        -> Result<String>;
}

/// [`ObjectStorage`] backed by the embedded [`StorageEngine`]
#[derive(Clone)]
pub struct FjallObjectStorage {
    engine: StorageEngine,
    public_base_url: String,
}

impl FjallObjectStorage {
    pub fn new(engine: StorageEngine, public_base_url: impl Into<String>) -> Self {
        FjallObjectStorage {
            engine,
            public_base_url: public_base_url.into(),
        }
    }

    /// URL under which the server hands the object back, with the key escaped
    pub fn locator_url(&self, bucket: &BucketId, key: &ObjectKey) -> String {
        format!(
            "{}{}",
            self.public_base_url.trim_end_matches('/'),
            wire::object_path(bucket, key)
        )
    }

    pub async fn get_object(&self, bucket: &BucketId, key: &ObjectKey) -> Result<Option<Vec<u8>>> {
        let engine = self.engine.clone();
        let bucket = bucket.clone();
        let key = key.clone();

        tokio::task::spawn_blocking(move || engine.bucket(&bucket)?.get(&key))
            .await
            .map_err(|e| GateError::Internal(format!("storage task failed: {}", e)))?
    }

    pub async fn get_metadata(
        &self,
        bucket: &BucketId,
        key: &ObjectKey,
    ) -> Result<Option<ObjectMetadata>> {
        let engine = self.engine.clone();
        let bucket = bucket.clone();
        let key = key.clone();

        tokio::task::spawn_blocking(move || engine.bucket(&bucket)?.get_metadata(&key))
            .await
            .map_err(|e| GateError::Internal(format!("storage task failed: {}", e)))?
    }
}

#[async_trait]
impl ObjectStorage for FjallObjectStorage {
    async fn upload(
        &self,
        bucket: &BucketId,
        local_path: &Path,
        key: &ObjectKey,
    ) -> Result<String> {
        let engine = self.engine.clone();
        let bucket_id = bucket.clone();
        let object_key = key.clone();
        let path = local_path.to_path_buf();

        let stored = tokio::task::spawn_blocking(move || {
            engine.bucket(&bucket_id)?.put_file(&object_key, &path)
        })
        .await
        .map_err(|e| GateError::StorageUploadFailed(format!("storage task failed: {}", e)))?;

        match stored {
            Ok(metadata) => {
                info!(
                    "Stored {} bytes in bucket {} as {} (version {})",
                    metadata.size, bucket, key, metadata.version
                );
                Ok(self.locator_url(bucket, key))
            }
            Err(e) => {
                error!("Failed to store {} in bucket {}: {}", key, bucket, e);
                Err(GateError::StorageUploadFailed(e.to_string()))
            }
        }
    }
}
