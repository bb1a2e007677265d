//! Single-shot uploads, from a request body or from a public URL

use chunkgate_core::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::{resolve_object_key, ObjectStorage};

/// Uploads a whole file in one request, sharing key resolution and
/// storage with the chunked path.
pub struct DirectUploader {
    storage: Arc<dyn ObjectStorage>,
    resolver: Option<Arc<dyn PathResolver>>,
    fetcher: Option<Arc<dyn SourceFetcher>>,
    bucket: BucketId,
    temp_root: PathBuf,
}

impl DirectUploader {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        bucket: BucketId,
        temp_root: impl Into<PathBuf>,
    ) -> Result<Self> {
        let temp_root = temp_root.into();
        std::fs::create_dir_all(&temp_root)?;

        Ok(DirectUploader {
            storage,
            resolver: None,
            fetcher: None,
            bucket,
            temp_root,
        })
    }

    pub fn with_path_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn with_source_fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub async fn upload(&self, metadata: UploadMetadata, bytes: &[u8]) -> Result<UploadReceipt> {
        if metadata.original_filename.trim().is_empty() {
            return Err(GateError::InvalidObjectName(
                "original_filename is required".to_string(),
            ));
        }

        // Removed on drop, so every exit path below cleans up
        let staged = tempfile::Builder::new()
            .prefix("direct_")
            .tempfile_in(&self.temp_root)?;
        tokio::fs::write(staged.path(), bytes).await?;

        let key = self.resolve_key(&metadata).await?;
        info!(
            "Uploading {} ({} bytes) to bucket {} as {}",
            metadata.original_filename,
            bytes.len(),
            self.bucket,
            key
        );
        let locator = self.storage.upload(&self.bucket, staged.path(), &key).await?;

        Ok(UploadReceipt {
            message: format!("File '{}' uploaded successfully.", metadata.original_filename),
            storage_locator_url: locator,
            resolved_object_name: key.to_string(),
            source: UploadSource::FileUpload,
            safe_filename: Some(metadata.original_filename.clone()),
            original_filename: metadata.original_filename,
            upload_id: None,
            total_chunks: None,
        })
    }

    /// Download `public_url` to a staging file, then store it like a direct upload.
    ///
    /// The filename comes from the URL's last path segment unless `metadata`
    /// carries one. Object name hints and path payloads apply as usual.
    pub async fn upload_from_url(
        &self,
        public_url: &str,
        mut metadata: UploadMetadata,
    ) -> Result<UploadReceipt> {
        let fetcher = self.fetcher.as_deref().ok_or_else(|| {
            GateError::Internal("downloading from public URLs is not enabled".to_string())
        })?;

        let from_url = UrlFilename::from_url(public_url)?;
        let safe = if metadata.original_filename.trim().is_empty() {
            metadata.original_filename = from_url.original;
            from_url.safe
        } else {
            safe_filename(&metadata.original_filename)
        };
        info!("Downloading file from public URL: {} (safe filename {})", public_url, safe);

        let staged = tempfile::Builder::new()
            .prefix("url_")
            .suffix(&format!("_{}", safe))
            .tempfile_in(&self.temp_root)?;

        let size = match fetcher.fetch_to(public_url, staged.path()).await {
            Ok(size) => size,
            Err(e) => {
                error!("Failed to download file from {}: {}", public_url, e);
                return Err(e);
            }
        };
        info!("Downloaded {} bytes from {} to {}", size, public_url, staged.path().display());

        let key = self.resolve_key(&metadata).await?;
        info!("Uploading {} to bucket {} as {}", safe, self.bucket, key);
        let locator = self.storage.upload(&self.bucket, staged.path(), &key).await?;

        Ok(UploadReceipt {
            message: format!("File '{}' uploaded successfully.", metadata.original_filename),
            storage_locator_url: locator,
            resolved_object_name: key.to_string(),
            source: UploadSource::PublicUrl,
            original_filename: metadata.original_filename,
            safe_filename: Some(safe),
            upload_id: None,
            total_chunks: None,
        })
    }

    async fn resolve_key(&self, metadata: &UploadMetadata) -> Result<ObjectKey> {
        resolve_object_key(
            self.resolver.as_deref(),
            metadata.path_payload.as_ref(),
            metadata.object_name.as_deref(),
            &metadata.original_filename,
        )
        .await
    }
}
