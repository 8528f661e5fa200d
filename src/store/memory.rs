//! In-memory document store for pipeline tests
//!
//! Upserts match on the `_id` field. The store records every batch size
//! and the retry policies it was handed so tests can assert on them.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{Result, StoreError};

use super::{
    BulkOutcome, BulkUpserter, CollectionHandle, Document, DocumentStore, PageCursor, RetryPolicy,
    ScanOptions,
};

const DATABASE: &str = "memory";

#[derive(Default)]
struct Inner {
    collections: BTreeMap<String, Vec<Document>>,
    batch_sizes: Vec<usize>,
    scan_options: Vec<ScanOptions>,
    init_policies: Vec<RetryPolicy>,
    first_upsert_policy: Option<RetryPolicy>,
    count_override: Option<u64>,
    fail_on_page: Option<usize>,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    /// Create (or replace) a collection with the given contents
    pub(crate) fn with_collection(self, name: &str, docs: Vec<Document>) -> Self {
        self.lock().collections.insert(name.to_string(), docs);
        self
    }

    /// Report this count regardless of the real contents
    pub(crate) fn with_count_override(self, count: u64) -> Self {
        self.lock().count_override = Some(count);
        self
    }

    /// Fail the n-th page fetch (0-based) of any scan
    pub(crate) fn with_failing_page(self, page: usize) -> Self {
        self.lock().fail_on_page = Some(page);
        self
    }

    pub(crate) fn documents(&self, name: &str) -> Vec<Document> {
        self.lock().collections.get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.lock().batch_sizes.clone()
    }

    pub(crate) fn scan_options(&self) -> Vec<ScanOptions> {
        self.lock().scan_options.clone()
    }

    pub(crate) fn init_policies(&self) -> Vec<RetryPolicy> {
        self.lock().init_policies.clone()
    }

    pub(crate) fn first_upsert_policy(&self) -> Option<RetryPolicy> {
        self.lock().first_upsert_policy
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn count(&self, collection: &str) -> Result<u64> {
        let inner = self.lock();
        if let Some(count) = inner.count_override {
            return Ok(count);
        }
        Ok(inner.collections.get(collection).map_or(0, |d| d.len() as u64))
    }

    async fn scan(&self, collection: &str, options: ScanOptions) -> Result<Box<dyn PageCursor>> {
        let mut inner = self.lock();
        inner.scan_options.push(options);
        let docs = inner.collections.get(collection).cloned().unwrap_or_default();
        Ok(Box::new(MemoryCursor {
            docs,
            position: 0,
            page_size: options.page_size.max(1) as usize,
            pages_served: 0,
            fail_on_page: inner.fail_on_page,
        }))
    }

    async fn resolve_collection(&self, name: &str) -> Result<Option<CollectionHandle>> {
        Ok(self
            .lock()
            .collections
            .contains_key(name)
            .then(|| CollectionHandle {
                database: DATABASE.to_string(),
                name: name.to_string(),
            }))
    }

    async fn initialize_bulk(
        &self,
        handle: &CollectionHandle,
        init: RetryPolicy,
        transfer: RetryPolicy,
    ) -> Result<Box<dyn BulkUpserter>> {
        self.lock().init_policies.push(init);
        Ok(Box::new(MemoryUpserter {
            store: self.clone(),
            collection: handle.name.clone(),
            policy: transfer,
        }))
    }
}

struct MemoryCursor {
    docs: Vec<Document>,
    position: usize,
    page_size: usize,
    pages_served: usize,
    fail_on_page: Option<usize>,
}

#[async_trait]
impl PageCursor for MemoryCursor {
    fn has_more_results(&self) -> bool {
        self.position < self.docs.len()
    }

    async fn next_page(&mut self) -> Result<Vec<Document>> {
        if self.fail_on_page == Some(self.pages_served) {
            return Err(StoreError::CommandFailed("cursor lost".to_string()).into());
        }
        let end = (self.position + self.page_size).min(self.docs.len());
        let page = self.docs[self.position..end].to_vec();
        self.position = end;
        self.pages_served += 1;
        Ok(page)
    }
}

struct MemoryUpserter {
    store: MemoryStore,
    collection: String,
    policy: RetryPolicy,
}

#[async_trait]
impl BulkUpserter for MemoryUpserter {
    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn upsert(&mut self, batch: &[Document]) -> Result<BulkOutcome> {
        let mut inner = self.store.lock();
        inner.batch_sizes.push(batch.len());
        inner.first_upsert_policy.get_or_insert(self.policy);

        let docs = inner.collections.entry(self.collection.clone()).or_default();
        let mut outcome = BulkOutcome {
            submitted: batch.len() as u64,
            ..Default::default()
        };
        for value in batch {
            let existing = value
                .get("_id")
                .and_then(|id| docs.iter().position(|d| d.get("_id") == Some(id)));
            match existing {
                Some(index) if docs[index] == *value => {}
                Some(index) => {
                    docs[index] = value.clone();
                    outcome.modified += 1;
                }
                None => {
                    docs.push(value.clone());
                    outcome.upserted += 1;
                }
            }
        }
        Ok(outcome)
    }
}
