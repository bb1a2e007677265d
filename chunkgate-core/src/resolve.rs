//! Contract of the external path resolution service

use async_trait::async_trait;

use crate::PathPayload;

/// Maps a structured payload to a storage key prefix.
///
/// Implementations report transport failures as
/// [`GateError::PathServiceUnreachable`](crate::GateError::PathServiceUnreachable),
/// non-success statuses as
/// [`GateError::PathServiceError`](crate::GateError::PathServiceError) and
/// unusable bodies as
/// [`GateError::PathServiceMalformed`](crate::GateError::PathServiceMalformed).
#[async_trait]
pub trait PathResolver: Send + Sync {
    async fn resolve(&self, payload: &PathPayload) -> crate::Result<String>;
}
