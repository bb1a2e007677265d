//! HTTP client for the path resolution service

use async_trait::async_trait;
use bytes::Bytes;
use chunkgate_core::*;
use http_body_util::{BodyExt, Full};
use hyper::header::{ACCEPT, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode, Uri};
use std::time::Duration;
use tracing::{debug, warn};

use crate::connector::{https_client, is_supported_scheme, HttpsClient};

/// Default bound on one path service round trip
pub const DEFAULT_PATH_SERVICE_TIMEOUT: Duration = Duration::from_secs(15);

/// Resolves path payloads by POSTing them as JSON and reading `{"path": ...}` back.
///
/// The endpoint may be `http` or `https`.
pub struct HttpPathResolver {
    endpoint: Uri,
    timeout: Duration,
    http: HttpsClient,
}

impl HttpPathResolver {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint: Uri = endpoint
            .parse()
            .map_err(|e| GateError::Internal(format!("invalid path service URL {}: {}", endpoint, e)))?;
        if !is_supported_scheme(endpoint.scheme_str()) || endpoint.host().is_none() {
            return Err(GateError::Internal(format!(
                "path service URL {} must be an absolute http or https URL",
                endpoint
            )));
        }

        Ok(HttpPathResolver {
            endpoint,
            timeout: DEFAULT_PATH_SERVICE_TIMEOUT,
            http: https_client(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn call(&self, body: Vec<u8>) -> Result<(StatusCode, Bytes)> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| GateError::Internal(format!("building path service request: {}", e)))?;

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| GateError::PathServiceUnreachable(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| GateError::PathServiceUnreachable(e.to_string()))?
            .to_bytes();

        Ok((status, body))
    }
}

#[async_trait]
impl PathResolver for HttpPathResolver {
    async fn resolve(&self, payload: &PathPayload) -> Result<String> {
        let body = serde_json::to_vec(payload)?;
        debug!("Calling path service {} for '{}'", self.endpoint, payload.path_key);

        let (status, body) = match tokio::time::timeout(self.timeout, self.call(body)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Path service {} timed out after {:?}", self.endpoint, self.timeout);
                return Err(GateError::PathServiceUnreachable(format!(
                    "no response within {}s",
                    self.timeout.as_secs_f64()
                )));
            }
        };

        if status != StatusCode::OK {
            let text = String::from_utf8_lossy(&body).into_owned();
            warn!("Path service returned {}: {}", status, text);
            return Err(GateError::PathServiceError {
                status: status.as_u16(),
                body: text,
            });
        }

        parse_path(&body)
    }
}

fn parse_path(body: &[u8]) -> Result<String> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| GateError::PathServiceMalformed(format!("response is not JSON: {}", e)))?;

    match value.get("path") {
        Some(serde_json::Value::String(path)) if !path.is_empty() => Ok(path.clone()),
        Some(serde_json::Value::String(_)) => Err(GateError::PathServiceMalformed(
            "path service returned an empty path".to_string(),
        )),
        Some(other) => Err(GateError::PathServiceMalformed(format!(
            "'path' must be a string, got {}",
            other
        ))),
        None => Err(GateError::PathServiceMalformed(
            "response missing 'path' field".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path(br#"{"path":"a/b"}"#).unwrap(), "a/b");
        assert_eq!(
            parse_path(br#"{"path":"a/b","ttl":30}"#).unwrap(),
            "a/b"
        );

        for body in [
            &br#"{"path":""}"#[..],
            br#"{"path":7}"#,
            br#"{"prefix":"a"}"#,
            b"<html>",
        ] {
            let err = parse_path(body).unwrap_err();
            assert!(matches!(err, GateError::PathServiceMalformed(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_endpoint_validation() {
        assert!(HttpPathResolver::new("http://paths.local/resolve").is_ok());
        assert!(HttpPathResolver::new("https://paths.example.com/v1/resolve").is_ok());
        assert!(HttpPathResolver::new("http://bad host/").is_err());
        assert!(HttpPathResolver::new("ftp://paths.local/resolve").is_err());
        assert!(HttpPathResolver::new("/resolve").is_err());
    }
}
