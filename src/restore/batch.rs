use crate::store::Document;

/// Default number of documents per bulk-upsert call
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Buffers documents until a batch of `capacity` is ready
///
/// Never yields an empty batch.
#[derive(Debug)]
pub struct BatchAccumulator {
    capacity: usize,
    buffer: Vec<Document>,
}

impl BatchAccumulator {
    /// Create an accumulator; a zero capacity is treated as one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Documents waiting for the next batch
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Add a document, returning the batch when it reaches capacity
    pub fn push(&mut self, doc: Document) -> Option<Vec<Document>> {
        self.buffer.push(doc);
        if self.buffer.len() >= self.capacity {
            Some(self.take())
        } else {
            None
        }
    }

    /// Hand out the partial batch left at end of input, if any
    pub fn flush(&mut self) -> Option<Vec<Document>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<Document> {
        std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity))
    }
}
