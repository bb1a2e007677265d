//! Final object key resolution

use chunkgate_core::*;
use tracing::debug;

/// Work out the storage key for an upload.
///
/// A path payload wins and is sent to the path service, whose prefix is
/// joined with `original_filename`. Otherwise the caller's object name hint is
/// used, falling back to the original filename.
pub async fn resolve_object_key(
    resolver: Option<&dyn PathResolver>,
    payload: Option<&PathPayload>,
    object_name: Option<&str>,
    original_filename: &str,
) -> Result<ObjectKey> {
    if let Some(payload) = payload {
        let resolver = resolver.ok_or(GateError::PathServiceNotConfigured)?;
        let prefix = resolver.resolve(payload).await?;
        debug!("Path service resolved '{}' to prefix '{}'", payload.path_key, prefix);
        return ObjectKey::join_posix(&prefix, original_filename);
    }

    match object_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => ObjectKey::new(name),
        None => ObjectKey::new(original_filename),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedPrefix(&'static str);

    #[async_trait]
    impl PathResolver for FixedPrefix {
        async fn resolve(&self, _payload: &PathPayload) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[tokio::test]
    async fn test_payload_prefix_is_joined_with_filename() {
        let resolver: &dyn PathResolver = &FixedPrefix("tenants/acme/");
        let payload = PathPayload::new("contracts");

        let key = resolve_object_key(Some(resolver), Some(&payload), Some("ignored"), "nda.pdf")
            .await
            .unwrap();
        assert_eq!(key.as_str(), "tenants/acme/nda.pdf");
    }

    #[tokio::test]
    async fn test_hint_then_filename() {
        let key = resolve_object_key(None, None, Some("archive/nda-v2.pdf"), "nda.pdf")
            .await
            .unwrap();
        assert_eq!(key.as_str(), "archive/nda-v2.pdf");

        let key = resolve_object_key(None, None, Some("  "), "nda.pdf").await.unwrap();
        assert_eq!(key.as_str(), "nda.pdf");

        let key = resolve_object_key(None, None, None, "nda.pdf").await.unwrap();
        assert_eq!(key.as_str(), "nda.pdf");
    }

    #[tokio::test]
    async fn test_payload_without_resolver() {
        let payload = PathPayload::new("contracts");
        let err = resolve_object_key(None, Some(&payload), None, "nda.pdf")
            .await
            .unwrap_err();
        assert!(matches!(err, GateError::PathServiceNotConfigured));
    }

    #[tokio::test]
    async fn test_no_usable_name() {
        let err = resolve_object_key(None, None, None, "").await.unwrap_err();
        assert!(matches!(err, GateError::InvalidObjectName(_)));
    }
}
