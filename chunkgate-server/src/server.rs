//! HTTP server implementation

use bytes::Bytes;
use chunkgate_core::GateError;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE, SERVER};
use hyper::service::service_fn;
use hyper::{Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::handlers::{handle_request, status_for};
use crate::AppState;

pub type Body = Full<Bytes>;

const SERVER_NAME: &str = concat!("chunkgate/", env!("CARGO_PKG_VERSION"));

pub struct GateServer {
    state: Arc<AppState>,
}

impl GateServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Accept connections forever. HTTP/1.1 and cleartext HTTP/2 are both served.
    pub async fn serve_listener(self, listener: TcpListener) -> anyhow::Result<()> {
        info!("chunkgate listening on {}", listener.local_addr()?);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            debug!("New connection from {}", remote_addr);

            let state = self.state.clone();
            tokio::spawn(async move {
                Self::handle_connection(stream, remote_addr, state).await;
            });
        }
    }

    async fn handle_connection(stream: TcpStream, remote_addr: SocketAddr, state: Arc<AppState>) {
        let io = TokioIo::new(stream);

        let service = service_fn(move |req| {
            let state = state.clone();
            async move { handle_request(req, state).await }
        });

        if let Err(err) = auto::Builder::new(TokioExecutor::new())
            .serve_connection(io, service)
            .await
        {
            debug!("Connection from {} ended with error: {}", remote_addr, err);
        }
    }
}

fn response(status: StatusCode, content_type: &'static str, body: Bytes) -> Response<Body> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    response
}

/// JSON response for any serializable value
pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Body> {
    match serde_json::to_vec(value) {
        Ok(body) => response(status, "application/json", Bytes::from(body)),
        Err(e) => error_response(&GateError::from(e)),
    }
}

/// Raw object bytes
pub fn octet_response(data: Vec<u8>) -> Response<Body> {
    response(StatusCode::OK, "application/octet-stream", Bytes::from(data))
}

/// Error body: `{"error": code, "detail": message}` plus kind-specific fields
pub fn error_response(err: &GateError) -> Response<Body> {
    let mut body = json!({
        "error": err.code(),
        "detail": err.to_string(),
    });

    match err {
        GateError::IncompleteUpload { missing, .. } => {
            body["missing_chunks"] = json!(missing);
        }
        GateError::PathServiceError { status, .. } => {
            body["upstream_status"] = json!(status);
        }
        _ => {}
    }

    response(
        status_for(err),
        "application/json",
        Bytes::from(body.to_string()),
    )
}

/// Error body for failures outside the upload domain, such as routing
pub fn plain_error(status: StatusCode, code: &str, detail: impl Into<String>) -> Response<Body> {
    let body = json!({ "error": code, "detail": detail.into() });
    response(status, "application/json", Bytes::from(body.to_string()))
}
