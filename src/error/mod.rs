//! Error handling for export and restore operations.
//!
//! This module provides:
//! - A crate-wide [`DocdumpError`] wrapping every failure kind
//! - Kind-specific enums for configuration, connection, file, parse and store errors
//! - Structured extraction of MongoDB driver errors (see [`mongo`])
//!
//! # Example
//!
//! ```rust,no_run
//! use docdump::error::{Result, TransferError};
//!
//! fn check_input(path: &std::path::Path) -> Result<()> {
//!     if !path.exists() {
//!         return Err(TransferError::InputNotFound(path.to_path_buf()).into());
//!     }
//!     Ok(())
//! }
//! ```

pub mod kinds;
pub mod mongo;

pub use kinds::{
    ConfigError, ConnectionError, DocdumpError, ParseError, Result, StoreError, TransferError,
};
pub use mongo::{ErrorInfo, extract_error_info, is_throttled};
