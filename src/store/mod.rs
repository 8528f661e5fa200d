//! Document store capability used by the export and restore pipelines
//!
//! The pipelines never talk to a driver directly. They depend on three
//! traits:
//!
//! 1. **DocumentStore**: count, paginated scan, collection lookup and bulk
//!    upserter initialization
//! 2. **PageCursor**: the "has more" / "fetch next" view of a scan
//! 3. **BulkUpserter**: submits one batch with upsert semantics
//!
//! [`mongo::MongoStore`] implements them over the MongoDB wire protocol,
//! which also covers Cosmos DB's API for MongoDB.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub mod mongo;

#[cfg(test)]
pub(crate) mod memory;

pub use mongo::MongoStore;

/// An opaque document. Fields are passed through untouched.
pub type Document = serde_json::Value;

/// Throttling retry bounds for a store client phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum retry attempts on throttled requests
    pub max_attempts: u32,
    /// Maximum cumulative wait across all retries
    pub max_wait: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given bounds
    pub const fn new(max_attempts: u32, max_wait: Duration) -> Self {
        Self {
            max_attempts,
            max_wait,
        }
    }

    /// Generous bounds used while the bulk upserter warms up
    pub const fn initialization() -> Self {
        Self::new(9, Duration::from_secs(30))
    }

    /// No client-level retries
    pub const fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// True when neither retries nor waiting are allowed
    pub fn is_none(&self) -> bool {
        self.max_attempts == 0 && self.max_wait.is_zero()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Options for a collection-wide scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Upper bound on documents buffered for one page
    pub page_size: u32,
    /// Fan the scan out across every partition of the collection
    pub cross_partition: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            page_size: 10,
            cross_partition: true,
        }
    }
}

/// A collection that was confirmed to exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionHandle {
    pub database: String,
    pub name: String,
}

/// Aggregate result of one bulk-upsert call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    /// Documents sent in the call
    pub submitted: u64,
    /// Documents inserted because no match existed
    pub upserted: u64,
    /// Existing documents replaced with different content
    pub modified: u64,
    /// Documents the server rejected
    pub failed: u64,
}

impl BulkOutcome {
    /// Fold another outcome into this one
    pub fn absorb(&mut self, other: BulkOutcome) {
        self.submitted += other.submitted;
        self.upserted += other.upserted;
        self.modified += other.modified;
        self.failed += other.failed;
    }
}

/// Cursor over the pages of a scan
#[async_trait]
pub trait PageCursor: Send {
    /// Whether another `next_page` call may yield documents
    fn has_more_results(&self) -> bool;

    /// Fetch the next page. The final page may be empty.
    async fn next_page(&mut self) -> Result<Vec<Document>>;
}

/// Bulk upsert client bound to one collection
#[async_trait]
pub trait BulkUpserter: Send {
    /// Retry policy this upserter applies to its calls
    fn retry_policy(&self) -> RetryPolicy;

    /// Insert or replace every document of the batch
    async fn upsert(&mut self, batch: &[Document]) -> Result<BulkOutcome>;
}

/// Capabilities the pipelines need from a document store
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Count the documents of a collection
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Start a scan over every document of a collection
    async fn scan(&self, collection: &str, options: ScanOptions) -> Result<Box<dyn PageCursor>>;

    /// Look up a collection by name
    async fn resolve_collection(&self, name: &str) -> Result<Option<CollectionHandle>>;

    /// Create and warm up a bulk upserter.
    ///
    /// `init` bounds retries during warm-up only. The returned upserter runs
    /// every later call under `transfer`.
    async fn initialize_bulk(
        &self,
        handle: &CollectionHandle,
        init: RetryPolicy,
        transfer: RetryPolicy,
    ) -> Result<Box<dyn BulkUpserter>>;
}
