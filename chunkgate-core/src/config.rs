//! Service configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{BucketId, GateError};

/// Settings shared by the server binary and the upload engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Bucket every upload lands in
    pub bucket: String,
    /// Directory of the embedded object store
    pub data_dir: PathBuf,
    /// Parent directory for per-session scratch directories
    pub temp_root: PathBuf,
    /// Base URL used to build storage locator URLs
    pub public_base_url: String,
    /// Endpoint of the path resolution service, if any
    pub path_service_url: Option<String>,
    pub path_service_timeout_secs: u64,
    /// Bound on waiting for a public URL download to respond or make progress
    pub download_timeout_secs: u64,
    /// Sessions untouched for this long are expired by the sweeper
    pub session_idle_timeout_secs: u64,
    /// Zero disables the sweeper
    pub sweep_interval_secs: u64,
    /// Largest accepted request body (one chunk or one direct upload)
    pub max_body_bytes: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            bucket: "uploads".to_string(),
            data_dir: PathBuf::from("./data"),
            temp_root: std::env::temp_dir(),
            public_base_url: "http://127.0.0.1:8080".to_string(),
            path_service_url: None,
            path_service_timeout_secs: 15,
            download_timeout_secs: 30,
            session_idle_timeout_secs: 60 * 60,
            sweep_interval_secs: 60,
            max_body_bytes: 64 * 1024 * 1024,
        }
    }
}

impl GateConfig {
    pub fn validate(&self) -> crate::Result<()> {
        BucketId::new(&self.bucket)?;

        if self.public_base_url.is_empty() {
            return Err(GateError::Internal(
                "public_base_url must not be empty".to_string(),
            ));
        }
        if let Some(url) = &self.path_service_url {
            if url.trim().is_empty() {
                return Err(GateError::Internal(
                    "path_service_url must not be blank when set".to_string(),
                ));
            }
        }
        if self.path_service_timeout_secs == 0 {
            return Err(GateError::Internal(
                "path_service_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.download_timeout_secs == 0 {
            return Err(GateError::Internal(
                "download_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.session_idle_timeout_secs == 0 {
            return Err(GateError::Internal(
                "session_idle_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.max_body_bytes == 0 {
            return Err(GateError::Internal(
                "max_body_bytes must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    pub fn bucket_id(&self) -> crate::Result<BucketId> {
        BucketId::new(&self.bucket)
    }

    pub fn path_service_timeout(&self) -> Duration {
        Duration::from_secs(self.path_service_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}
