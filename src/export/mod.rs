//! Export pipeline: collection → JSON Lines file
//!
//! The export is built from two components:
//!
//! 1. **ExportPager**: counts the collection, drives the paginated scan and
//!    reports progress
//! 2. **JsonLWriter**: writes one compact JSON document per line
//!
//! # Example
//!
//! ```no_run
//! use docdump::export::{ExportOptions, ExportPager};
//! use docdump::store::MongoStore;
//!
//! # async fn run(store: MongoStore) -> docdump::Result<()> {
//! let pager = ExportPager::new(&store, ExportOptions::new("."));
//! let summary = pager.export("orders").await?;
//! println!("{} documents written to {}", summary.exported, summary.path.display());
//! # Ok(())
//! # }
//! ```

pub mod pager;
pub mod writer;

pub use pager::{ExportOptions, ExportPager, ExportSummary};
pub use writer::JsonLWriter;
