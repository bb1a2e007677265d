//! Error types for chunkgate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("Invalid chunk request: {0}")]
    InvalidChunkRequest(String),

    #[error("Upload session {upload_id} not found. Please start from chunk 1.")]
    SessionNotFound { upload_id: String },

    #[error("Missing chunks: {missing:?}. Received {received}/{total}")]
    IncompleteUpload {
        missing: Vec<u32>,
        received: usize,
        total: u32,
    },

    #[error("Invalid path payload: {0}")]
    PathPayloadInvalid(String),

    #[error("Path service URL is not configured")]
    PathServiceNotConfigured,

    #[error("Could not reach path service: {0}")]
    PathServiceUnreachable(String),

    #[error("Path service failed with {status}: {body}")]
    PathServiceError { status: u16, body: String },

    #[error("Path service returned an unusable response: {0}")]
    PathServiceMalformed(String),

    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),

    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid public URL: {0}")]
    InvalidSourceUrl(String),

    #[error("Failed to download file from URL: {0}")]
    DownloadFailed(String),

    #[error("Storage upload failed: {0}")]
    StorageUploadFailed(String),

    #[error("Object not found: {key}")]
    ObjectNotFound { key: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Stable machine-readable code for API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUploadId(_) => "invalid_upload_id",
            Self::InvalidChunkRequest(_) => "invalid_chunk_request",
            Self::SessionNotFound { .. } => "session_not_found",
            Self::IncompleteUpload { .. } => "incomplete_upload",
            Self::PathPayloadInvalid(_) => "path_payload_invalid",
            Self::PathServiceNotConfigured => "path_service_not_configured",
            Self::PathServiceUnreachable(_) => "path_service_unreachable",
            Self::PathServiceError { .. } => "path_service_error",
            Self::PathServiceMalformed(_) => "path_service_malformed",
            Self::InvalidObjectName(_) => "invalid_object_name",
            Self::InvalidBucketName(_) => "invalid_bucket_name",
            Self::InvalidSourceUrl(_) => "invalid_source_url",
            Self::DownloadFailed(_) => "download_failed",
            Self::StorageUploadFailed(_) => "storage_upload_failed",
            Self::ObjectNotFound { .. } => "object_not_found",
            Self::Storage(_) => "storage_error",
            Self::Serialization(_) => "serialization_error",
            Self::Io(_) => "internal_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller supplied something wrong and can fix it by changing the request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidUploadId(_)
                | Self::InvalidChunkRequest(_)
                | Self::SessionNotFound { .. }
                | Self::IncompleteUpload { .. }
                | Self::PathPayloadInvalid(_)
                | Self::InvalidObjectName(_)
                | Self::InvalidBucketName(_)
                | Self::InvalidSourceUrl(_)
                | Self::DownloadFailed(_)
        )
    }

    /// Failures of the path resolution service, which callers may retry
    pub fn is_path_service_failure(&self) -> bool {
        matches!(
            self,
            Self::PathServiceUnreachable(_)
                | Self::PathServiceError { .. }
                | Self::PathServiceMalformed(_)
        )
    }
}
