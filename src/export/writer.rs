//! JSON Lines writer for export operations
//!
//! Each document is serialized as compact JSON followed by `\n`. The file is
//! created or truncated on open.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::{Result, TransferError};
use crate::store::Document;

/// Write buffer size
const BUFFER_CAPACITY: usize = 1024 * 1024;

/// Writer for JSON Lines format
pub struct JsonLWriter {
    /// Buffered file writer
    writer: BufWriter<File>,
    /// Path to the output file
    path: PathBuf,
    /// Number of documents written
    written: u64,
    /// Reused serialization buffer
    line: Vec<u8>,
}

impl JsonLWriter {
    /// Create (or truncate) the output file
    ///
    /// # Arguments
    /// * `path` - Output file path
    ///
    /// # Returns
    /// * `Result<Self>` - New writer instance or error
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).await.map_err(|source| TransferError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("Created JSON Lines writer for: {}", path.display());

        Ok(Self {
            writer: BufWriter::with_capacity(BUFFER_CAPACITY, file),
            path,
            written: 0,
            line: Vec::new(),
        })
    }

    /// Append one line per document
    ///
    /// # Returns
    /// * `Result<usize>` - Number of documents written
    pub async fn write_page(&mut self, docs: &[Document]) -> Result<usize> {
        for doc in docs {
            self.line.clear();
            serde_json::to_writer(&mut self.line, doc)
                .map_err(|e| self.write_error(e.into()))?;
            self.line.push(b'\n');

            self.writer
                .write_all(&self.line)
                .await
                .map_err(|e| self.write_error(e))?;
        }

        self.written += docs.len() as u64;
        Ok(docs.len())
    }

    /// Flush buffered lines to disk
    pub async fn finalize(&mut self) -> Result<()> {
        self.writer.flush().await.map_err(|e| self.write_error(e))?;
        debug!(
            "Finalized JSON Lines file: {} ({} documents)",
            self.path.display(),
            self.written
        );
        Ok(())
    }

    /// Current file size in bytes
    pub async fn file_size(&self) -> Result<u64> {
        Ok(tokio::fs::metadata(&self.path).await?.len())
    }

    /// Documents written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    fn write_error(&self, source: std::io::Error) -> TransferError {
        TransferError::Write {
            path: self.path.clone(),
            source,
        }
    }
}
