//! docdump Library
//!
//! This library provides the export and restore pipelines behind the
//! `docdump` command. It can be used on its own to move collections between
//! a document store and JSON Lines files.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `config`: Configuration management
//! - `connection`: Client construction from endpoint and key
//! - `error`: Error types and handling
//! - `estimator`: Fast line counting for progress estimates
//! - `export`: Collection → JSON Lines file
//! - `progress`: Progress reporting
//! - `restore`: JSON Lines file → collection
//! - `store`: Document store abstraction and its MongoDB implementation
//!
//! # Example
//!
//! ```no_run
//! use docdump::config::Config;
//! use docdump::connection::{ConnectionSettings, connect};
//! use docdump::{MongoStore, RestoreDriver};
//! use docdump::restore::RestoreOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = ConnectionSettings {
//!         endpoint_uri: "https://shop.documents.azure.com:443/".to_string(),
//!         api_key: "<key>".to_string(),
//!         username: None,
//!         database: "shop".to_string(),
//!     };
//!     let client = connect(&settings, &Config::default().connection).await?;
//!     let store = MongoStore::new(client, "shop");
//!
//!     let driver = RestoreDriver::new(&store, RestoreOptions::default());
//!     let summary = driver.restore("orders", "orders.json".as_ref()).await?;
//!     println!("{} documents upserted", summary.submitted);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod estimator;
pub mod export;
pub mod progress;
pub mod restore;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{DocdumpError, Result};
pub use export::ExportPager;
pub use restore::RestoreDriver;
pub use store::MongoStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
