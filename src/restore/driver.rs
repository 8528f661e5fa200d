//! Restore driver: input file → batches → bulk upserts

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ParseError, Result, TransferError};
use crate::estimator::estimate_lines;
use crate::progress::ProgressTracker;
use crate::store::{BulkOutcome, BulkUpserter, Document, DocumentStore, RetryPolicy};

use super::batch::{BatchAccumulator, DEFAULT_BATCH_SIZE};

/// Settings for one restore run
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Documents per bulk-upsert call
    pub batch_size: usize,
    /// Retry bounds while the bulk upserter warms up
    pub init_retry: RetryPolicy,
    /// Retry bounds for every batch submission
    pub transfer_retry: RetryPolicy,
    /// Draw a progress bar
    pub progress_bar: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            init_retry: RetryPolicy::initialization(),
            transfer_retry: RetryPolicy::none(),
            progress_bar: false,
        }
    }
}

/// Result of a restore operation
#[derive(Debug, Clone)]
pub struct RestoreSummary {
    /// Target collection
    pub collection: String,
    /// File read
    pub path: PathBuf,
    /// Line estimate taken before the transfer
    pub estimated: u64,
    /// Documents submitted (not necessarily all accepted)
    pub submitted: u64,
    /// Bulk-upsert calls issued
    pub batches: u64,
    /// Aggregate of every bulk-upsert outcome
    pub outcome: BulkOutcome,
    /// Time taken for restore
    pub elapsed_ms: u64,
}

/// Upserts every record of a JSON Lines file into a collection
pub struct RestoreDriver<'a> {
    store: &'a dyn DocumentStore,
    options: RestoreOptions,
}

/// Running totals of a restore
struct Totals<'t> {
    tracker: &'t ProgressTracker,
    batches: u64,
    outcome: BulkOutcome,
}

impl<'a> RestoreDriver<'a> {
    pub fn new(store: &'a dyn DocumentStore, options: RestoreOptions) -> Self {
        Self { store, options }
    }

    /// Restore `input` into `collection`.
    ///
    /// Fails before any store traffic when the input file is missing, and
    /// before reading the input when the collection does not exist.
    pub async fn restore(&self, collection: &str, input: &Path) -> Result<RestoreSummary> {
        if !input.is_file() {
            return Err(TransferError::InputNotFound(input.to_path_buf()).into());
        }

        let handle = self
            .store
            .resolve_collection(collection)
            .await?
            .ok_or_else(|| ConfigError::CollectionNotFound(collection.to_string()))?;

        let mut upserter = self
            .store
            .initialize_bulk(&handle, self.options.init_retry, self.options.transfer_retry)
            .await?;
        debug!(
            "Bulk upserter initialized, transfer retry policy {:?}",
            upserter.retry_policy()
        );

        let estimated = {
            let mut file = File::open(input).await?;
            estimate_lines(&mut file).await?
        };
        info!(
            "Attempting to import {} records from {}.",
            estimated,
            input.display()
        );

        let tracker = ProgressTracker::new(Some(estimated), self.options.progress_bar);
        let mut totals = Totals {
            tracker: &tracker,
            batches: 0,
            outcome: BulkOutcome::default(),
        };
        let mut accumulator = BatchAccumulator::new(self.options.batch_size);
        debug!("Submitting batches of {} documents", accumulator.capacity());

        let mut lines = BufReader::new(File::open(input).await?).lines();
        let mut line_number = 0u64;
        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let document: Document =
                serde_json::from_str(&line).map_err(|source| ParseError::InvalidDocument {
                    path: input.to_path_buf(),
                    line: line_number,
                    source,
                })?;

            if let Some(batch) = accumulator.push(document) {
                submit(upserter.as_mut(), &batch, &mut totals).await?;
            }
        }

        if let Some(batch) = accumulator.flush() {
            submit(upserter.as_mut(), &batch, &mut totals).await?;
        }

        tracker.finish();

        if totals.outcome.failed > 0 {
            warn!(
                "{} of {} documents were rejected by the store",
                totals.outcome.failed, totals.outcome.submitted
            );
        }
        info!("Done!");

        Ok(RestoreSummary {
            collection: handle.name,
            path: input.to_path_buf(),
            estimated,
            submitted: totals.outcome.submitted,
            batches: totals.batches,
            outcome: totals.outcome,
            elapsed_ms: tracker.elapsed_ms(),
        })
    }
}

async fn submit(
    upserter: &mut dyn BulkUpserter,
    batch: &[Document],
    totals: &mut Totals<'_>,
) -> Result<()> {
    let outcome = upserter.upsert(batch).await?;
    totals.outcome.absorb(outcome);
    totals.batches += 1;
    totals.tracker.update(totals.outcome.submitted);

    debug!("Batch {}: {} documents", totals.batches, batch.len());
    info!("Imported {} documents", totals.outcome.submitted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocdumpError;
    use crate::export::{ExportOptions, ExportPager};
    use crate::store::memory::MemoryStore;
    use serde_json::{Value, json};
    use std::time::Duration;

    fn docs(range: std::ops::Range<u32>) -> Vec<Value> {
        range.map(|i| json!({ "_id": i, "name": format!("item {i}") })).collect()
    }

    fn write_input(dir: &Path, docs: &[Value]) -> PathBuf {
        let path = dir.join("input.json");
        let content: String = docs.iter().map(|d| format!("{d}\n")).collect();
        std::fs::write(&path, content).unwrap();
        path
    }

    fn sorted(mut docs: Vec<Value>) -> Vec<Value> {
        docs.sort_by_key(|d| d.to_string());
        docs
    }

    #[tokio::test]
    async fn test_batches_are_ceiling_of_records() {
        for (records, expected) in [
            (0u32, Vec::<usize>::new()),
            (1, vec![1]),
            (9, vec![9]),
            (10, vec![10]),
            (11, vec![10, 1]),
            (20, vec![10, 10]),
            (25, vec![10, 10, 5]),
        ] {
            let dir = tempfile::tempdir().unwrap();
            let input = write_input(dir.path(), &docs(0..records));
            let store = MemoryStore::new().with_collection("items", Vec::new());

            let summary = RestoreDriver::new(&store, RestoreOptions::default())
                .restore("items", &input)
                .await
                .unwrap();

            assert_eq!(store.batch_sizes(), expected, "{records} records");
            assert_eq!(summary.batches, expected.len() as u64);
            assert_eq!(summary.submitted, u64::from(records));
            assert_eq!(summary.estimated, u64::from(records));
        }
    }

    #[tokio::test]
    async fn test_retry_policy_is_relaxed_only_for_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &docs(0..3));
        let store = MemoryStore::new().with_collection("items", Vec::new());

        RestoreDriver::new(&store, RestoreOptions::default())
            .restore("items", &input)
            .await
            .unwrap();

        let init = store.init_policies();
        assert_eq!(init, vec![RetryPolicy::initialization()]);
        assert!(init[0].max_attempts > 0 && !init[0].max_wait.is_zero());
        assert_eq!(store.first_upsert_policy(), Some(RetryPolicy::none()));
    }

    #[tokio::test]
    async fn test_configured_retry_policies_are_passed_through() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &docs(0..1));
        let store = MemoryStore::new().with_collection("items", Vec::new());
        let options = RestoreOptions {
            init_retry: RetryPolicy::new(4, Duration::from_secs(5)),
            ..RestoreOptions::default()
        };

        RestoreDriver::new(&store, options)
            .restore("items", &input)
            .await
            .unwrap();

        assert_eq!(store.init_policies(), vec![RetryPolicy::new(4, Duration::from_secs(5))]);
        assert_eq!(store.first_upsert_policy(), Some(RetryPolicy::none()));
    }

    #[tokio::test]
    async fn test_missing_collection_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &docs(0..3));
        let store = MemoryStore::new();

        let err = RestoreDriver::new(&store, RestoreOptions::default())
            .restore("absent", &input)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DocdumpError::Config(ConfigError::CollectionNotFound(_))
        ));
        assert!(store.init_policies().is_empty());
        assert!(store.documents("absent").is_empty());
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_store_calls() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::new().with_collection("items", Vec::new());

        let err = RestoreDriver::new(&store, RestoreOptions::default())
            .restore("items", &dir.path().join("nope.json"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DocdumpError::Transfer(TransferError::InputNotFound(_))
        ));
        assert!(store.init_policies().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_line_aborts_with_line_number() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.json");
        std::fs::write(&input, "{\"_id\":1}\n{\"_id\":2}\n{\"_id\":\n{\"_id\":4}\n").unwrap();
        let store = MemoryStore::new().with_collection("items", Vec::new());

        let err = RestoreDriver::new(&store, RestoreOptions::default())
            .restore("items", &input)
            .await
            .unwrap_err();

        match err {
            DocdumpError::Parse(ParseError::InvalidDocument { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.batch_sizes().is_empty());
    }

    #[tokio::test]
    async fn test_blank_lines_and_crlf_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.json");
        std::fs::write(&input, "{\"_id\":1}\r\n\r\n{\"_id\":2}\r\n   \r\n{\"_id\":3}").unwrap();
        let store = MemoryStore::new().with_collection("items", Vec::new());

        let summary = RestoreDriver::new(&store, RestoreOptions::default())
            .restore("items", &input)
            .await
            .unwrap();

        assert_eq!(summary.submitted, 3);
        assert_eq!(
            store.documents("items"),
            vec![json!({ "_id": 1 }), json!({ "_id": 2 }), json!({ "_id": 3 })]
        );
    }

    #[tokio::test]
    async fn test_custom_batch_size() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &docs(0..7));
        let store = MemoryStore::new().with_collection("items", Vec::new());
        let options = RestoreOptions {
            batch_size: 3,
            ..RestoreOptions::default()
        };

        RestoreDriver::new(&store, options)
            .restore("items", &input)
            .await
            .unwrap();

        assert_eq!(store.batch_sizes(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_restore_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_input(dir.path(), &docs(0..15));
        let store = MemoryStore::new().with_collection("items", Vec::new());
        let driver = RestoreDriver::new(&store, RestoreOptions::default());

        let first = driver.restore("items", &input).await.unwrap();
        let after_first = store.documents("items");
        let second = driver.restore("items", &input).await.unwrap();

        assert_eq!(first.outcome.upserted, 15);
        assert_eq!(second.outcome.upserted, 0);
        assert_eq!(second.outcome.modified, 0);
        assert_eq!(store.documents("items"), after_first);
    }

    #[tokio::test]
    async fn test_export_then_restore_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let original = vec![
            json!({ "_id": "A", "qty": 1, "tags": ["x"] }),
            json!({ "_id": "B", "nested": { "deep": true } }),
            json!({ "_id": "C", "price": 9.5, "note": "line\nbreak" }),
        ];
        let source = MemoryStore::new().with_collection("stock", original.clone());
        let target = MemoryStore::new().with_collection("stock", Vec::new());

        let exported = ExportPager::new(&source, ExportOptions::new(dir.path()))
            .export("stock")
            .await
            .unwrap();
        let restored = RestoreDriver::new(&target, RestoreOptions::default())
            .restore("stock", &exported.path)
            .await
            .unwrap();

        assert_eq!(restored.submitted, 3);
        assert_eq!(sorted(target.documents("stock")), sorted(original));
    }
}
