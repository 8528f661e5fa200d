//! MongoDB wire-protocol implementation of the store traits
//!
//! Works against Cosmos DB's API for MongoDB as well as plain MongoDB
//! deployments. Documents cross the boundary as relaxed extended JSON with
//! `Int64` values written as `$numberLong`, so that an exported file
//! restores to the same BSON types.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson};
use mongodb::{Client, Collection, Cursor, Database};
use tracing::{debug, info, warn};

use crate::error::mongo::TOO_MANY_REQUESTS;
use crate::error::{Result, StoreError, extract_error_info, is_throttled};

use super::{
    BulkOutcome, BulkUpserter, CollectionHandle, Document, DocumentStore, PageCursor, RetryPolicy,
    ScanOptions,
};

/// Base delay of the throttling backoff; doubled on each attempt
const BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Document store backed by a `mongodb::Client`
#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    database: String,
}

impl MongoStore {
    /// Create a store bound to one database
    ///
    /// # Arguments
    /// * `client` - Connected MongoDB client
    /// * `database` - Database holding the collections to transfer
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self {
            client,
            database: database.into(),
        }
    }

    fn db(&self) -> Database {
        self.client.database(&self.database)
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.db().collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn count(&self, collection: &str) -> Result<u64> {
        let count = self.collection(collection).count_documents(doc! {}).await?;
        debug!("Collection '{}' reports {} documents", collection, count);
        Ok(count)
    }

    async fn scan(&self, collection: &str, options: ScanOptions) -> Result<Box<dyn PageCursor>> {
        // Sharded deployments fan a filterless find out to every shard, so
        // cross_partition needs no extra option here.
        debug!(
            "Scanning '{}' (page size {}, cross-partition {})",
            collection, options.page_size, options.cross_partition
        );
        let cursor = self
            .collection(collection)
            .find(doc! {})
            .batch_size(options.page_size)
            .await?;
        Ok(Box::new(MongoPageCursor::new(cursor, options.page_size)))
    }

    async fn resolve_collection(&self, name: &str) -> Result<Option<CollectionHandle>> {
        let names = self
            .db()
            .list_collection_names()
            .filter(doc! { "name": name })
            .await?;

        Ok(names
            .iter()
            .any(|n| n == name)
            .then(|| CollectionHandle {
                database: self.database.clone(),
                name: name.to_string(),
            }))
    }

    async fn initialize_bulk(
        &self,
        handle: &CollectionHandle,
        init: RetryPolicy,
        transfer: RetryPolicy,
    ) -> Result<Box<dyn BulkUpserter>> {
        let db = self.client.database(&handle.database);
        let coll: Collection<bson::Document> = db.collection(&handle.name);

        debug!(
            "Initializing bulk upserter for '{}.{}' (up to {} retries, {:?} max wait)",
            handle.database, handle.name, init.max_attempts, init.max_wait
        );

        let db_ref = &db;
        with_retry(init, "ping", move || async move {
            db_ref.run_command(doc! { "ping": 1 }).await
        })
        .await?;

        let coll_ref = &coll;
        let estimated = with_retry(init, "estimated document count", move || async move {
            coll_ref.estimated_document_count().await
        })
        .await?;

        info!(
            "Bulk upserter ready for '{}' (~{} existing documents)",
            handle.name, estimated
        );

        Ok(Box::new(MongoBulkUpserter {
            db,
            collection: handle.name.clone(),
            policy: transfer,
        }))
    }
}

/// Page-at-a-time view over a driver cursor
pub struct MongoPageCursor {
    cursor: Option<Cursor<bson::Document>>,
    page_size: u32,
    total_fetched: u64,
}

impl MongoPageCursor {
    fn new(cursor: Cursor<bson::Document>, page_size: u32) -> Self {
        Self {
            cursor: Some(cursor),
            page_size,
            total_fetched: 0,
        }
    }
}

#[async_trait]
impl PageCursor for MongoPageCursor {
    fn has_more_results(&self) -> bool {
        self.cursor.is_some()
    }

    async fn next_page(&mut self) -> Result<Vec<Document>> {
        let cursor = match self.cursor.as_mut() {
            Some(c) => c,
            None => return Ok(Vec::new()),
        };

        let mut page = Vec::with_capacity(self.page_size as usize);
        while page.len() < self.page_size as usize {
            match cursor.try_next().await {
                Ok(Some(doc)) => page.push(to_document(doc)),
                Ok(None) => {
                    debug!("Cursor exhausted after {} documents", self.total_fetched + page.len() as u64);
                    self.cursor = None;
                    break;
                }
                Err(e) => {
                    // Release the server-side cursor before surfacing the error
                    self.cursor = None;
                    return Err(e.into());
                }
            }
        }

        self.total_fetched += page.len() as u64;
        Ok(page)
    }
}

/// Resubmission budget for statements throttled inside one bulk call
///
/// Applied by the upserter itself, on top of whatever client-level policy
/// the call runs under.
const STATEMENT_RETRY: RetryPolicy = RetryPolicy::new(10, Duration::from_secs(60));

/// Bulk upserter issuing one unordered `update` command per batch
pub struct MongoBulkUpserter {
    db: Database,
    collection: String,
    policy: RetryPolicy,
}

#[async_trait]
impl BulkUpserter for MongoBulkUpserter {
    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn upsert(&mut self, batch: &[Document]) -> Result<BulkOutcome> {
        if batch.is_empty() {
            return Ok(BulkOutcome::default());
        }

        let mut statements = Vec::with_capacity(batch.len());
        for value in batch {
            statements.push(upsert_statement(value)?);
        }

        let db = &self.db;
        let collection = self.collection.as_str();
        let policy = self.policy;
        submit_statements(statements, STATEMENT_RETRY, move |updates| async move {
            let command = doc! {
                "update": collection,
                "updates": updates,
                "ordered": false,
            };
            let command_ref = &command;
            with_retry(policy, "bulk upsert", move || async move {
                db.run_command(command_ref.clone()).await
            })
            .await
        })
        .await
    }
}

/// Send `statements` through `send`, resubmitting the ones the server
/// throttled until none are left or `budget` runs out.
async fn submit_statements<F, Fut>(
    mut statements: Vec<bson::Document>,
    budget: RetryPolicy,
    mut send: F,
) -> Result<BulkOutcome>
where
    F: FnMut(Vec<Bson>) -> Fut,
    Fut: Future<Output = Result<bson::Document>>,
{
    let mut outcome = BulkOutcome {
        submitted: statements.len() as u64,
        ..Default::default()
    };
    let mut attempts = 0u32;
    let mut waited = Duration::ZERO;

    loop {
        let updates = statements.iter().cloned().map(Bson::Document).collect();
        let reply = send(updates).await?;
        let summary = summarize_reply(&reply)?;

        outcome.upserted += summary.upserted;
        outcome.modified += summary.modified;
        outcome.failed += summary.failed;
        if summary.throttled.is_empty() {
            return Ok(outcome);
        }

        let remaining = budget.max_wait.saturating_sub(waited);
        if attempts >= budget.max_attempts || remaining.is_zero() {
            return Err(StoreError::Throttled {
                attempts: attempts + 1,
                message: format!(
                    "{} of {} statement(s) still throttled",
                    summary.throttled.len(),
                    statements.len()
                ),
            }
            .into());
        }

        statements = summary
            .throttled
            .iter()
            .filter_map(|&index| statements.get(index).cloned())
            .collect();

        let delay = backoff_delay(attempts).min(remaining);
        attempts += 1;
        waited += delay;
        warn!(
            "{} statement(s) throttled, resubmitting ({}/{}) in {:?}",
            statements.len(),
            attempts,
            budget.max_attempts,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

/// Convert a stored document to its file representation.
///
/// Relaxed extended JSON, except that `Int64` values keep their type as
/// `{"$numberLong": ...}`; relaxed output would restore small ones as `Int32`.
fn to_document(document: bson::Document) -> Document {
    to_extjson(Bson::Document(document))
}

fn to_extjson(value: Bson) -> Document {
    match value {
        Bson::Int64(n) => serde_json::json!({ "$numberLong": n.to_string() }),
        Bson::Document(document) => Document::Object(
            document
                .into_iter()
                .map(|(key, value)| (key, to_extjson(value)))
                .collect(),
        ),
        Bson::Array(values) => Document::Array(values.into_iter().map(to_extjson).collect()),
        other => other.into_relaxed_extjson(),
    }
}

/// Parse a file document back into BSON; it must be a JSON object.
fn from_document(value: &Document) -> Result<bson::Document> {
    match Bson::try_from(value.clone()) {
        Ok(Bson::Document(d)) => Ok(d),
        Ok(other) => Err(StoreError::InvalidDocument(format!(
            "expected a JSON object, found {:?}",
            other.element_type()
        ))
        .into()),
        Err(e) => Err(StoreError::InvalidDocument(e.to_string()).into()),
    }
}

/// Build the `{q, u, upsert}` statement replacing a document by `_id`.
///
/// Documents without an `_id` get a fresh `ObjectId`.
fn upsert_statement(value: &Document) -> Result<bson::Document> {
    let mut document = from_document(value)?;

    let id = match document.get("_id") {
        Some(id) => id.clone(),
        None => {
            let id = Bson::ObjectId(ObjectId::new());
            document.insert("_id", id.clone());
            id
        }
    };

    Ok(doc! {
        "q": { "_id": id },
        "u": document,
        "upsert": true,
    })
}

/// Counts read from one `update` reply
#[derive(Debug, Default, PartialEq, Eq)]
struct ReplySummary {
    upserted: u64,
    modified: u64,
    /// Statements rejected for good
    failed: u64,
    /// Indexes, within the submitted statements, of throttled statements
    throttled: Vec<usize>,
}

/// Summarize an `update` command reply
fn summarize_reply(reply: &bson::Document) -> Result<ReplySummary> {
    if let Ok(wc_error) = reply.get_document("writeConcernError") {
        let message = wc_error.get_str("errmsg").unwrap_or("write concern error");
        return Err(StoreError::CommandFailed(message.to_string()).into());
    }

    let mut summary = ReplySummary {
        upserted: reply.get_array("upserted").map(|a| a.len() as u64).unwrap_or(0),
        modified: read_count(reply, "nModified"),
        ..Default::default()
    };

    let errors = reply.get_array("writeErrors").map(Vec::as_slice).unwrap_or(&[]);
    let mut first_rejection = None;
    for error in errors.iter().filter_map(Bson::as_document) {
        if is_throttled_write_error(error) {
            summary.throttled.push(read_count(error, "index") as usize);
        } else {
            summary.failed += 1;
            first_rejection.get_or_insert(error);
        }
    }

    if let Some(first) = first_rejection {
        warn!(
            "{} document(s) rejected, first: {}",
            summary.failed,
            first.get_str("errmsg").unwrap_or("unknown error")
        );
    }
    Ok(summary)
}

fn is_throttled_write_error(error: &bson::Document) -> bool {
    read_count(error, "code") == TOO_MANY_REQUESTS as u64
        || error
            .get_str("errmsg")
            .is_ok_and(|m| m.contains("TooManyRequests") || m.contains("Request rate is large"))
}

/// Run `call`, retrying throttled failures within `policy`.
///
/// Delays double from [`BACKOFF_BASE`] and are clipped so the cumulative
/// wait never exceeds `policy.max_wait`. Other errors return immediately.
async fn with_retry<T, F, Fut>(policy: RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = mongodb::error::Result<T>>,
{
    let mut attempts = 0u32;
    let mut waited = Duration::ZERO;

    loop {
        let err = match call().await {
            Ok(value) => return Ok(value),
            Err(e) if is_throttled(&e) => e,
            Err(e) => return Err(e.into()),
        };

        if policy.is_none() {
            return Err(err.into());
        }

        let remaining = policy.max_wait.saturating_sub(waited);
        if attempts >= policy.max_attempts || remaining.is_zero() {
            return Err(StoreError::Throttled {
                attempts: attempts + 1,
                message: extract_error_info(&err).to_string(),
            }
            .into());
        }

        let delay = backoff_delay(attempts).min(remaining);
        attempts += 1;
        waited += delay;
        warn!(
            "{} throttled, retry {}/{} in {:?}",
            operation, attempts, policy.max_attempts, delay
        );
        tokio::time::sleep(delay).await;
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    BACKOFF_BASE * 2u32.pow(attempt.min(8))
}
