//! Chunk persistence inside a session's scratch directory

use chunkgate_core::Result;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Stores one file per chunk index, named `chunk_{index}`.
///
/// There is no partial-write recovery: a crash mid-write leaves a short
/// chunk file that only shows up as a short assembled artifact.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkStore;

impl ChunkStore {
    pub fn new() -> Self {
        ChunkStore
    }

    pub fn chunk_path(&self, dir: &Path, index: u32) -> PathBuf {
        dir.join(format!("chunk_{}", index))
    }

    /// Write `bytes` as chunk `index`, truncating whatever was there before
    pub async fn save(&self, dir: &Path, index: u32, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.chunk_path(dir, index);

        let mut file = tokio::fs::File::create(&path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!("Saved chunk {} to {}, size: {} bytes", index, path.display(), bytes.len());
        Ok(path)
    }

    pub async fn read(&self, dir: &Path, index: u32) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.chunk_path(dir, index)).await?)
    }
}
