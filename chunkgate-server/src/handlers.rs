//! HTTP request handlers for the chunkgate gateway

use bytes::Bytes;
use chunkgate_core::wire::*;
use chunkgate_core::*;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::CONTENT_LENGTH;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::server::{error_response, json_response, octet_response, plain_error, Body};
use crate::AppState;

/// Why a request did not produce a normal response
#[derive(Debug)]
enum Rejection {
    Gate(GateError),
    TooLarge { limit: usize },
    NotFound,
}

impl From<GateError> for Rejection {
    fn from(err: GateError) -> Self {
        Rejection::Gate(err)
    }
}

type HandlerResult = std::result::Result<Response<Body>, Rejection>;

/// HTTP status for each error kind
pub fn status_for(err: &GateError) -> StatusCode {
    match err {
        GateError::ObjectNotFound { .. } => StatusCode::NOT_FOUND,
        e if e.is_path_service_failure() => StatusCode::BAD_GATEWAY,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Main request handler
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> std::result::Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    debug!("Handling {} {}", method, path);

    let response = match route(req, &state, &method, &path).await {
        Ok(response) => response,
        Err(Rejection::Gate(err)) => {
            if status_for(&err).is_server_error() {
                error!("{} {} failed: {}", method, path, err);
            } else {
                warn!("{} {} rejected: {}", method, path, err);
            }
            error_response(&err)
        }
        Err(Rejection::TooLarge { limit }) => plain_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            format!("Request body exceeds {} bytes", limit),
        ),
        Err(Rejection::NotFound) => plain_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No route for {} {}", method, path),
        ),
    };

    info!("{} {} -> {}", method, path, response.status());
    Ok(response)
}

async fn route(
    req: Request<Incoming>,
    state: &AppState,
    method: &Method,
    path: &str,
) -> HandlerResult {
    if path == "/health" && method == Method::GET {
        return Ok(handle_health(state));
    }

    let Some(rest) = path.strip_prefix("/v1/") else {
        return Err(Rejection::NotFound);
    };
    let segments: Vec<&str> = rest.split('/').collect();

    match (method, segments.as_slice()) {
        (&Method::POST, ["uploads", upload_id, "chunks", chunk_number]) => {
            let request = parse_chunk_request(upload_id, chunk_number, req.headers())?;
            let body = read_body(req, state.max_body_bytes).await?;
            handle_chunk(state, request, body).await
        }
        (&Method::DELETE, ["uploads", upload_id]) => {
            let upload_id = UploadId::new(upload_id)?;
            let receipt = state.orchestrator.abort(&upload_id).await;
            Ok(json_response(StatusCode::OK, &receipt))
        }
        (&Method::PUT, ["objects"]) => {
            let metadata = parse_metadata(req.headers())?;
            let body = read_body(req, state.max_body_bytes).await?;
            let receipt = state.direct.upload(metadata, &body).await?;
            Ok(json_response(StatusCode::OK, &receipt))
        }
        (&Method::POST, ["objects", "from-url"]) => {
            let public_url = header_text(req.headers(), HEADER_PUBLIC_URL)
                .filter(|url| !url.is_empty())
                .ok_or_else(|| {
                    GateError::InvalidSourceUrl(format!("{} header is required", HEADER_PUBLIC_URL))
                })?;
            let metadata = parse_metadata(req.headers())?;
            let body = read_body(req, state.max_body_bytes).await?;
            if !body.is_empty() {
                return Err(GateError::InvalidSourceUrl(
                    "cannot provide both a file body and a public URL, choose one".to_string(),
                )
                .into());
            }
            let receipt = state.direct.upload_from_url(&public_url, metadata).await?;
            Ok(json_response(StatusCode::OK, &receipt))
        }
        (&Method::GET, _) => {
            let (bucket, key) = parse_object_path(rest)?;
            handle_get_object(state, &bucket, &key).await
        }
        _ => Err(Rejection::NotFound),
    }
}

fn handle_health(state: &AppState) -> Response<Body> {
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "service": "chunkgate",
            "version": env!("CARGO_PKG_VERSION"),
            "bucket": state.orchestrator.bucket().as_str(),
            "active_sessions": state.orchestrator.active_sessions(),
            "started_at": state.started_at.to_rfc3339(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
    )
}

async fn handle_chunk(state: &AppState, request: ChunkRequest, body: Bytes) -> HandlerResult {
    let outcome = state.orchestrator.submit_chunk(request, &body).await?;
    if let ChunkOutcome::Complete(receipt) = &outcome {
        info!(
            "Upload complete: {} -> {}",
            receipt.original_filename, receipt.storage_locator_url
        );
    }
    Ok(json_response(StatusCode::OK, &outcome))
}

async fn handle_get_object(state: &AppState, bucket: &BucketId, key: &ObjectKey) -> HandlerResult {
    match state.objects.get_object(bucket, key).await? {
        Some(data) => {
            debug!("Serving {}/{} ({} bytes)", bucket, key, data.len());
            Ok(octet_response(data))
        }
        None => Err(GateError::ObjectNotFound {
            key: key.to_string(),
        }
        .into()),
    }
}

/// Collect the body, refusing anything above `limit` bytes
async fn read_body(req: Request<Incoming>, limit: usize) -> std::result::Result<Bytes, Rejection> {
    let declared = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if declared.is_some_and(|len| len > limit as u64) {
        return Err(Rejection::TooLarge { limit });
    }

    match Limited::new(req.into_body(), limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => {
            Err(Rejection::TooLarge { limit })
        }
        Err(err) => Err(GateError::Internal(format!("reading request body: {}", err)).into()),
    }
}

/// Header value as text. Non-UTF-8 bytes are replaced rather than rejected.
fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).trim().to_string())
}

fn parse_metadata(headers: &HeaderMap) -> Result<UploadMetadata> {
    let path_payload = header_text(headers, HEADER_PATH_PAYLOAD)
        .filter(|raw| !raw.is_empty())
        .map(|raw| PathPayload::parse(&raw))
        .transpose()?;

    Ok(UploadMetadata {
        original_filename: header_text(headers, HEADER_ORIGINAL_FILENAME).unwrap_or_default(),
        object_name: header_text(headers, HEADER_OBJECT_NAME).filter(|name| !name.is_empty()),
        path_payload,
    })
}

fn parse_chunk_request(upload_id: &str, chunk_number: &str, headers: &HeaderMap) -> Result<ChunkRequest> {
    let upload_id = UploadId::new(upload_id)?;

    let chunk_number = chunk_number.parse::<u32>().map_err(|_| {
        GateError::InvalidChunkRequest(format!("chunk number '{}' is not a positive integer", chunk_number))
    })?;

    let total_chunks = header_text(headers, HEADER_TOTAL_CHUNKS)
        .ok_or_else(|| GateError::InvalidChunkRequest(format!("{} header is required", HEADER_TOTAL_CHUNKS)))?;
    let total_chunks = total_chunks.parse::<u32>().map_err(|_| {
        GateError::InvalidChunkRequest(format!("{} '{}' is not a positive integer", HEADER_TOTAL_CHUNKS, total_chunks))
    })?;

    let is_last_chunk = match header_text(headers, HEADER_LAST_CHUNK) {
        None => false,
        Some(raw) => parse_flag(&raw).ok_or_else(|| {
            GateError::InvalidChunkRequest(format!("{} '{}' must be true or false", HEADER_LAST_CHUNK, raw))
        })?,
    };

    Ok(ChunkRequest {
        upload_id,
        chunk_number,
        total_chunks,
        is_last_chunk,
        metadata: parse_metadata(headers)?,
    })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" | "" => Some(false),
        _ => None,
    }
}

/// Split `{bucket}/{key...}` (the part after `/v1/`), decoding the escaped key
fn parse_object_path(rest: &str) -> Result<(BucketId, ObjectKey)> {
    let (bucket, key) = rest.split_once('/').ok_or_else(|| {
        GateError::InvalidObjectName("expected /v1/{bucket}/{key}".to_string())
    })?;
    if key.is_empty() || key.ends_with('/') {
        return Err(GateError::InvalidObjectName(format!("invalid key '{}'", key)));
    }

    Ok((BucketId::new(bucket)?, decode_object_key(key)?))
}
