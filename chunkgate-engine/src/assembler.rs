//! Concatenation of a session's chunks into one artifact

use chunkgate_core::Result;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::ChunkStore;

pub const ASSEMBLED_FILE_NAME: &str = "assembled_file";

#[derive(Debug, Clone, Copy, Default)]
pub struct Assembler {
    chunks: ChunkStore,
}

impl Assembler {
    pub fn new(chunks: ChunkStore) -> Self {
        Assembler { chunks }
    }

    /// Append chunks `1..=total_chunks` in ascending index order into
    /// `assembled_file` inside `dir`.
    ///
    /// Index order is the only thing that reconstructs byte order, since
    /// chunks may have arrived in any order. The caller has already checked
    /// that every index is present.
    pub async fn assemble(&self, dir: &Path, total_chunks: u32) -> Result<PathBuf> {
        let output_path = dir.join(ASSEMBLED_FILE_NAME);
        let mut output = tokio::fs::File::create(&output_path).await?;
        let mut written = 0u64;

        for index in 1..=total_chunks {
            let bytes = self.chunks.read(dir, index).await?;
            output.write_all(&bytes).await?;
            written += bytes.len() as u64;
        }

        output.flush().await?;
        output.sync_all().await?;

        info!(
            "Assembled {} chunks into {} ({} bytes)",
            total_chunks,
            output_path.display(),
            written
        );
        Ok(output_path)
    }
}
