//! Restore pipeline: JSON Lines file → collection
//!
//! 1. **BatchAccumulator**: groups parsed documents into fixed-size batches
//! 2. **RestoreDriver**: estimates the record count, reads and parses the
//!    input, and submits each batch as a bulk upsert
//!
//! The bulk upserter is initialized with a generous retry policy and runs
//! the transfer itself with no client-level retries.

pub mod batch;
pub mod driver;

pub use batch::BatchAccumulator;
pub use driver::{RestoreDriver, RestoreOptions, RestoreSummary};
