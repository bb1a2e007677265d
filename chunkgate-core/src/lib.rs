//! Core data models and types for chunkgate

pub mod config;
pub mod error;
pub mod fetch;
pub mod resolve;
pub mod types;
pub mod wire;

pub use config::*;
pub use error::*;
pub use fetch::*;
pub use resolve::*;
pub use types::*;

/// Result type alias for chunkgate operations
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_id_validation() {
        assert!(BucketId::new("uploads").is_ok());
        assert!(BucketId::new("bucket-123").is_ok());
        assert!(BucketId::new("bucket_123").is_ok());

        assert!(BucketId::new("").is_err());
        assert!(BucketId::new("bucket with spaces").is_err());
        assert!(BucketId::new("bucket/with/slashes").is_err());
    }

    #[test]
    fn test_upload_id_validation() {
        assert_eq!(UploadId::new("abc-123_x.y").unwrap().as_str(), "abc-123_x.y");
        assert!(UploadId::new("3f2b8c1e-7d4a-4c5e-9a2b-0c1d2e3f4a5b").is_ok());

        assert!(matches!(UploadId::new(""), Err(GateError::InvalidUploadId(_))));
        assert!(UploadId::new(".").is_err());
        assert!(UploadId::new("..").is_err());
        assert!(UploadId::new("../etc").is_err());
        assert!(UploadId::new("a/b").is_err());
        assert!(UploadId::new("with space").is_err());
        assert!(UploadId::new(&"x".repeat(UploadId::MAX_LEN + 1)).is_err());
        assert!(UploadId::new(&"x".repeat(UploadId::MAX_LEN)).is_ok());
    }

    #[test]
    fn test_object_key_join_posix() {
        let key = ObjectKey::join_posix("tenants/42/docs", "report.pdf").unwrap();
        assert_eq!(key.as_str(), "tenants/42/docs/report.pdf");

        let key = ObjectKey::join_posix("tenants/42/docs/", "/report.pdf").unwrap();
        assert_eq!(key.as_str(), "tenants/42/docs/report.pdf");

        let key = ObjectKey::join_posix("", "report.pdf").unwrap();
        assert_eq!(key.as_str(), "report.pdf");

        assert!(ObjectKey::join_posix("", "").is_err());
        assert!(ObjectKey::new("bad\nkey").is_err());
    }

    #[test]
    fn test_path_payload_parse() {
        let payload =
            PathPayload::parse(r#"{"path_key":"invoices","tenant":"acme","year":null}"#).unwrap();
        assert_eq!(payload.path_key, "invoices");
        assert_eq!(payload.extra.get("tenant"), Some(&serde_json::json!("acme")));
        assert!(!payload.extra.contains_key("year"));

        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body, serde_json::json!({"path_key": "invoices", "tenant": "acme"}));
    }

    #[test]
    fn test_path_payload_rejections() {
        for raw in [
            "not json",
            "[1,2,3]",
            r#"{"tenant":"acme"}"#,
            r#"{"path_key":""}"#,
            r#"{"path_key":null}"#,
            r#"{"path_key":7}"#,
        ] {
            let err = PathPayload::parse(raw).unwrap_err();
            assert!(
                matches!(err, GateError::PathPayloadInvalid(_)),
                "{} should be rejected, got {:?}",
                raw,
                err
            );
        }

        let message = PathPayload::parse("not json").unwrap_err().to_string();
        assert!(message.starts_with("Invalid path payload: not valid JSON"), "{}", message);
        assert_eq!(message.matches("path payload").count(), 1);
    }

    #[test]
    fn test_incomplete_upload_message_lists_missing_chunks() {
        let err = GateError::IncompleteUpload {
            missing: vec![2, 4],
            received: 2,
            total: 4,
        };
        assert_eq!(err.to_string(), "Missing chunks: [2, 4]. Received 2/4");
        assert_eq!(err.code(), "incomplete_upload");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_error_classification() {
        assert!(GateError::PathServiceUnreachable("refused".into()).is_path_service_failure());
        assert!(!GateError::PathServiceNotConfigured.is_path_service_failure());
        assert!(!GateError::StorageUploadFailed("boom".into()).is_client_error());
    }

    #[test]
    fn test_chunk_outcome_json_shapes() {
        let progress = ChunkOutcome::Progress(ChunkProgress {
            message: "Chunk 1/3 uploaded successfully".into(),
            upload_id: "u1".into(),
            chunk_number: 1,
            total_chunks: 3,
            chunks_received: 1,
        });
        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"chunks_received\":1"));
        assert_eq!(serde_json::from_str::<ChunkOutcome>(&json).unwrap(), progress);

        let complete = ChunkOutcome::Complete(UploadReceipt {
            message: "done".into(),
            storage_locator_url: "http://localhost/v1/uploads/a.bin".into(),
            resolved_object_name: "a.bin".into(),
            source: UploadSource::MultipartUpload,
            original_filename: "a.bin".into(),
            safe_filename: None,
            upload_id: Some("u1".into()),
            total_chunks: Some(3),
        });
        let json = serde_json::to_string(&complete).unwrap();
        assert!(json.contains("\"source\":\"multipart_upload\""));
        assert!(!json.contains("safe_filename"));
        assert!(serde_json::from_str::<ChunkOutcome>(&json).unwrap().is_complete());

        assert_eq!(
            serde_json::to_value(UploadSource::PublicUrl).unwrap(),
            serde_json::json!("public_url")
        );
    }

    #[test]
    fn test_config_defaults_validate() {
        let config = GateConfig::default();
        config.validate().unwrap();
        assert_eq!(config.bucket_id().unwrap().as_str(), "uploads");

        let broken = GateConfig {
            session_idle_timeout_secs: 0,
            ..GateConfig::default()
        };
        assert!(broken.validate().is_err());
    }
}
