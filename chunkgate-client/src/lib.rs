//! chunkgate Rust client SDK

pub mod client;
mod connector;
pub mod error;
pub mod fetcher;
pub mod multipart;
pub mod path_service;

pub use client::Client;
pub use error::ClientError;
pub use fetcher::{HttpSourceFetcher, DEFAULT_DOWNLOAD_TIMEOUT};
pub use multipart::{MultipartUpload, DEFAULT_CHUNK_SIZE};
pub use path_service::{HttpPathResolver, DEFAULT_PATH_SERVICE_TIMEOUT};

pub type Result<T> = std::result::Result<T, ClientError>;
