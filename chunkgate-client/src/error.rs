//! Client error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Structured error body returned by the gateway
    #[error("Server rejected request with {status} ({code}): {detail}")]
    Api {
        status: u16,
        code: String,
        detail: String,
        missing_chunks: Option<Vec<u32>>,
    },

    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Core error: {0}")]
    Core(#[from] chunkgate_core::GateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Stable error code when the server sent one
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } | ClientError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
