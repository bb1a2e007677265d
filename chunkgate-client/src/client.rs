//! Main client implementation

use bytes::Bytes;
use chunkgate_core::wire::*;
use chunkgate_core::*;
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderValue;
use hyper::{Method, Request, Uri};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::connector::{https_client, is_supported_scheme, HttpsClient};
use crate::{ClientError, Result};

/// Error body produced by the gateway
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    detail: String,
    #[serde(default)]
    missing_chunks: Option<Vec<u32>>,
}

/// chunkgate HTTP client
#[derive(Clone)]
pub struct Client {
    base_url: String,
    http: HttpsClient,
}

impl Client {
    /// Create new client for a gateway at `base_url`, e.g. `http://127.0.0.1:8080`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let uri: Uri = base_url
            .parse()
            .map_err(|e| ClientError::Connection(format!("Invalid URL: {}", e)))?;
        if !is_supported_scheme(uri.scheme_str()) {
            return Err(ClientError::Connection(format!(
                "Unsupported URL scheme in {}",
                base_url
            )));
        }

        Ok(Client {
            base_url,
            http: https_client(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submit one chunk. Metadata headers are only sent when present.
    pub async fn send_chunk(
        &self,
        request: &ChunkRequest,
        bytes: impl Into<Bytes>,
    ) -> Result<ChunkOutcome> {
        let uri = self.url(&chunk_path(
            request.upload_id.as_str(),
            request.chunk_number,
        ));
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(HEADER_TOTAL_CHUNKS, request.total_chunks)
            .header(HEADER_LAST_CHUNK, if request.is_last_chunk { "true" } else { "false" });
        builder = with_metadata(builder, &request.metadata)?;

        let http_request = builder
            .body(Full::new(bytes.into()))
            .map_err(|e| ClientError::Request(e.to_string()))?;
        self.execute(http_request).await
    }

    /// Abort an upload session. Succeeds for unknown ids.
    pub async fn abort(&self, upload_id: &UploadId) -> Result<AbortReceipt> {
        let http_request = Request::builder()
            .method(Method::DELETE)
            .uri(self.url(&upload_path(upload_id.as_str())))
            .body(Full::new(Bytes::new()))
            .map_err(|e| ClientError::Request(e.to_string()))?;
        self.execute(http_request).await
    }

    /// Upload a whole file in a single request
    pub async fn upload_direct(
        &self,
        metadata: &UploadMetadata,
        bytes: impl Into<Bytes>,
    ) -> Result<UploadReceipt> {
        let builder = Request::builder()
            .method(Method::PUT)
            .uri(self.url(DIRECT_UPLOAD_PATH));
        let http_request = with_metadata(builder, metadata)?
            .body(Full::new(bytes.into()))
            .map_err(|e| ClientError::Request(e.to_string()))?;
        self.execute(http_request).await
    }

    /// Have the gateway download `public_url` and store it.
    ///
    /// An empty `metadata.original_filename` lets the gateway take the name from the URL.
    pub async fn upload_from_url(
        &self,
        public_url: &str,
        metadata: &UploadMetadata,
    ) -> Result<UploadReceipt> {
        let builder = Request::builder()
            .method(Method::POST)
            .uri(self.url(URL_UPLOAD_PATH))
            .header(HEADER_PUBLIC_URL, header_value(public_url)?);
        let http_request = with_metadata(builder, metadata)?
            .body(Full::new(Bytes::new()))
            .map_err(|e| ClientError::Request(e.to_string()))?;
        self.execute(http_request).await
    }

    /// Download an object through the locator URL from an upload receipt
    pub async fn fetch(&self, locator_url: &str) -> Result<Vec<u8>> {
        let http_request = Request::builder()
            .method(Method::GET)
            .uri(locator_url)
            .body(Full::new(Bytes::new()))
            .map_err(|e| ClientError::Request(e.to_string()))?;
        let (status, body) = self.roundtrip(http_request).await?;

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }
        Ok(body.to_vec())
    }

    /// Gateway health report
    pub async fn health(&self) -> Result<serde_json::Value> {
        let http_request = Request::builder()
            .method(Method::GET)
            .uri(self.url("/health"))
            .body(Full::new(Bytes::new()))
            .map_err(|e| ClientError::Request(e.to_string()))?;
        self.execute(http_request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute<T: DeserializeOwned>(&self, request: Request<Full<Bytes>>) -> Result<T> {
        let (status, body) = self.roundtrip(request).await?;

        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }
        serde_json::from_slice(&body).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    async fn roundtrip(&self, request: Request<Full<Bytes>>) -> Result<(hyper::StatusCode, Bytes)> {
        let method = request.method().clone();
        let uri = request.uri().clone();

        let response = self
            .http
            .request(request)
            .await
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?
            .to_bytes();

        debug!("{} {} -> {} ({} bytes)", method, uri, status, body.len());
        Ok((status, body))
    }
}

fn with_metadata(
    mut builder: hyper::http::request::Builder,
    metadata: &UploadMetadata,
) -> Result<hyper::http::request::Builder> {
    if !metadata.original_filename.is_empty() {
        builder = builder.header(
            HEADER_ORIGINAL_FILENAME,
            header_value(&metadata.original_filename)?,
        );
    }
    if let Some(name) = &metadata.object_name {
        builder = builder.header(HEADER_OBJECT_NAME, header_value(name)?);
    }
    if let Some(payload) = &metadata.path_payload {
        let raw = serde_json::to_string(payload).map_err(GateError::from)?;
        builder = builder.header(HEADER_PATH_PAYLOAD, header_value(&raw)?);
    }
    Ok(builder)
}

/// Filenames may be UTF-8, which travels as opaque header bytes
fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_bytes(value.as_bytes())
        .map_err(|_| ClientError::Request(format!("value not allowed in a header: {:?}", value)))
}

fn error_from_body(status: u16, body: &[u8]) -> ClientError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => ClientError::Api {
            status,
            code: parsed.error,
            detail: parsed.detail,
            missing_chunks: parsed.missing_chunks,
        },
        Err(_) => ClientError::Http {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        },
    }
}
