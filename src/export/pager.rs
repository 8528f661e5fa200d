//! Paginated export of a whole collection

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Result, TransferError};
use crate::progress::ProgressTracker;
use crate::store::{DocumentStore, ScanOptions};

use super::writer::JsonLWriter;

/// Settings for one export run
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Directory receiving `<collection>.json`
    pub output_dir: PathBuf,
    /// Maximum documents buffered per page
    pub page_size: u32,
    /// Draw a progress bar
    pub progress_bar: bool,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            page_size: ScanOptions::default().page_size,
            progress_bar: false,
        }
    }
}

/// Result of an export operation
#[derive(Debug, Clone)]
pub struct ExportSummary {
    /// Exported collection
    pub collection: String,
    /// File written
    pub path: PathBuf,
    /// Count reported by the store before streaming
    pub expected: u64,
    /// Documents actually written
    pub exported: u64,
    /// Pages fetched
    pub pages: u64,
    /// Whether an existing file was replaced
    pub overwritten: bool,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
}

/// Streams every document of a collection into a JSON Lines file
pub struct ExportPager<'a> {
    store: &'a dyn DocumentStore,
    options: ExportOptions,
}

impl<'a> ExportPager<'a> {
    pub fn new(store: &'a dyn DocumentStore, options: ExportOptions) -> Self {
        Self { store, options }
    }

    /// File the export of `collection` is written to
    pub fn output_path(&self, collection: &str) -> PathBuf {
        output_path(&self.options.output_dir, collection)
    }

    /// Export `collection` to `<output_dir>/<collection>.json`.
    ///
    /// An existing file is overwritten. The expected count and the exported
    /// count are independent reads and may differ under concurrent writes.
    pub async fn export(&self, collection: &str) -> Result<ExportSummary> {
        if !self.options.output_dir.is_dir() {
            return Err(TransferError::OutputDirectoryNotFound(self.options.output_dir.clone()).into());
        }

        let scan = ScanOptions {
            page_size: self.options.page_size,
            cross_partition: true,
        };
        let mut cursor = self.store.scan(collection, scan).await?;
        let expected = self.store.count(collection).await?;

        let path = self.output_path(collection);
        let overwritten = path.exists();
        if overwritten {
            warn!("Overwriting file {}", path.display());
        }
        info!(
            "Writing {} items from {} to {}...",
            expected,
            collection,
            path.display()
        );

        let mut writer = JsonLWriter::create(&path).await?;
        let tracker = ProgressTracker::new(Some(expected), self.options.progress_bar);
        let mut pages = 0u64;

        while cursor.has_more_results() {
            let page = cursor.next_page().await?;
            writer.write_page(&page).await?;
            pages += 1;

            let exported = writer.written();
            tracker.update(exported);
            debug!("Page {}: {} documents", pages, page.len());
            info!("Exported {} documents", exported);
        }

        writer.finalize().await?;
        tracker.finish();
        let exported = writer.written();

        if exported != expected {
            info!(
                "Collection count changed during export: expected {}, exported {}",
                expected, exported
            );
        }

        let summary = ExportSummary {
            collection: collection.to_string(),
            file_size_bytes: writer.file_size().await?,
            path,
            expected,
            exported,
            pages,
            overwritten,
            elapsed_ms: tracker.elapsed_ms(),
        };

        info!("Finished exporting {}", collection);
        Ok(summary)
    }
}

fn output_path(dir: &Path, collection: &str) -> PathBuf {
    dir.join(format!("{collection}.json"))
}
