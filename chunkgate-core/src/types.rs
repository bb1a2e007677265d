//! Core data types for chunkgate

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

use crate::GateError;

/// Storage bucket identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketId(String);

impl BucketId {
    /// Create a new bucket ID with validation
    pub fn new(name: &str) -> crate::Result<Self> {
        if name.is_empty() {
            return Err(GateError::InvalidBucketName("empty name".to_string()));
        }

        if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(GateError::InvalidBucketName(format!(
                "invalid characters in '{}'",
                name
            )));
        }

        Ok(BucketId(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object key within a bucket
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create a new key with validation
    pub fn new(key: &str) -> crate::Result<Self> {
        if key.is_empty() {
            return Err(GateError::InvalidObjectName("empty key".to_string()));
        }

        if key.chars().any(|c| c.is_control()) {
            return Err(GateError::InvalidObjectName(
                "control characters not allowed".to_string(),
            ));
        }

        Ok(ObjectKey(key.to_string()))
    }

    /// Join a directory prefix and a filename with forward-slash semantics.
    ///
    /// `("a/b/", "/c.txt")` becomes `a/b/c.txt`; an empty prefix yields the filename.
    pub fn join_posix(prefix: &str, filename: &str) -> crate::Result<Self> {
        let prefix = prefix.trim_end_matches('/');
        let filename = filename.trim_start_matches('/');

        if prefix.is_empty() {
            return Self::new(filename);
        }
        if filename.is_empty() {
            return Self::new(prefix);
        }

        Self::new(&format!("{}/{}", prefix, filename))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied identifier of a chunked upload.
///
/// The id ends up in the session's scratch directory name, so only
/// `[A-Za-z0-9._-]` is accepted and `.`/`..` are refused.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UploadId(String);

impl UploadId {
    pub const MAX_LEN: usize = 128;

    pub fn new(id: &str) -> crate::Result<Self> {
        if id.is_empty() {
            return Err(GateError::InvalidUploadId("empty upload id".to_string()));
        }
        if id.len() > Self::MAX_LEN {
            return Err(GateError::InvalidUploadId(format!(
                "upload id longer than {} characters",
                Self::MAX_LEN
            )));
        }
        if id == "." || id == ".." {
            return Err(GateError::InvalidUploadId(format!("'{}' is reserved", id)));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(GateError::InvalidUploadId(format!(
                "invalid characters in '{}'",
                id
            )));
        }

        Ok(UploadId(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UploadId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version identifier using ULID for time-ordering
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(ulid::Ulid);

impl Version {
    pub fn new() -> Self {
        Version(ulid::Ulid::new())
    }

    pub fn timestamp(&self) -> u64 {
        self.0.timestamp_ms()
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BLAKE3 digest of a stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn new(data: &[u8]) -> Self {
        ContentHash(blake3::hash(data).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        ContentHash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Metadata recorded for every object in the embedded store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub size: u64,
    pub version: Version,
    pub content_hash: ContentHash,
    pub created_at: SystemTime,
    /// Number of fixed-size parts the object body is split into on disk
    pub part_count: u32,
}

/// Structured payload forwarded to the path resolution service.
///
/// `path_key` is mandatory; every other field is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathPayload {
    pub path_key: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl PathPayload {
    pub fn new(path_key: impl Into<String>) -> Self {
        PathPayload {
            path_key: path_key.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Parse the raw JSON form sent by callers. Null-valued fields are dropped.
    pub fn parse(raw: &str) -> crate::Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
            GateError::PathPayloadInvalid(format!("not valid JSON: {}", e))
        })?;

        let serde_json::Value::Object(mut fields) = value else {
            return Err(GateError::PathPayloadInvalid(
                "expected a JSON object".to_string(),
            ));
        };

        let path_key = match fields.remove("path_key") {
            Some(serde_json::Value::String(key)) if !key.trim().is_empty() => key,
            Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => {
                return Err(GateError::PathPayloadInvalid(
                    "path_key is mandatory when path_payload is provided".to_string(),
                ))
            }
            Some(other) => {
                return Err(GateError::PathPayloadInvalid(format!(
                    "path_key must be a string, got {}",
                    other
                )))
            }
        };

        let extra = fields
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .collect();

        Ok(PathPayload { path_key, extra })
    }
}

/// Metadata carried from the first chunk of a session to assembly time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadMetadata {
    pub original_filename: String,
    pub object_name: Option<String>,
    pub path_payload: Option<PathPayload>,
}

/// One chunk submission, minus the chunk bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRequest {
    pub upload_id: UploadId,
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub is_last_chunk: bool,
    pub metadata: UploadMetadata,
}

/// Where an uploaded object came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadSource {
    MultipartUpload,
    FileUpload,
    PublicUrl,
}

/// Response for an accepted non-terminal chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProgress {
    pub message: String,
    pub upload_id: String,
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub chunks_received: usize,
}

/// Response for a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub message: String,
    pub storage_locator_url: String,
    pub resolved_object_name: String,
    pub source: UploadSource,
    pub original_filename: String,
    /// Local-file-safe form of the filename, for single-shot uploads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
}

/// Response for an abort request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbortReceipt {
    pub message: String,
    pub upload_id: String,
}

impl AbortReceipt {
    pub fn new(upload_id: &str) -> Self {
        AbortReceipt {
            message: "Upload aborted".to_string(),
            upload_id: upload_id.to_string(),
        }
    }
}

/// Result of submitting one chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChunkOutcome {
    Progress(ChunkProgress),
    Complete(UploadReceipt),
}

impl ChunkOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, ChunkOutcome::Complete(_))
    }
}
