use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::error::mongo::extract_error_info;

/// Crate-wide `Result` type using [`DocdumpError`] as the error.
pub type Result<T> = std::result::Result<T, DocdumpError>;

/// Top-level error type for docdump operations.
///
/// Every failure aborts the current export or restore and surfaces here;
/// the binary prints the `Display` form and exits non-zero.
#[derive(Debug, Error)]
pub enum DocdumpError {
    /// Configuration errors, including a missing target collection.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connection setup errors.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Input/output file errors detected before or during a transfer.
    #[error("{0}")]
    Transfer(#[from] TransferError),

    /// Malformed JSON Lines input.
    #[error("{0}")]
    Parse(#[from] ParseError),

    /// Store-level failures not raised by the driver itself.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// MongoDB driver errors.
    #[error("{}", extract_error_info(.0))]
    MongoDb(#[from] mongodb::error::Error),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    /// Invalid config format.
    #[error("Invalid config format: {0}")]
    InvalidFormat(String),

    /// Invalid field value.
    #[error("Invalid value '{value}' for field '{field}'")]
    InvalidValue { field: String, value: String },

    /// The named collection does not exist in the target database.
    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),
}

/// Connection-specific errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Invalid endpoint URI.
    #[error("Invalid endpoint URI: {0}")]
    InvalidUri(String),

    /// No user name could be derived for the API key.
    #[error("Cannot determine a user name for endpoint {0}; pass --username")]
    MissingUsername(String),
}

/// Errors about the files a transfer reads or writes.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Restore input file does not exist.
    #[error("File {} not found.", .0.display())]
    InputNotFound(PathBuf),

    /// Export output directory does not exist.
    #[error("Output directory does not exist: {}", .0.display())]
    OutputDirectoryNotFound(PathBuf),

    /// Writing the export file failed.
    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Parsing-specific errors.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A line of the input file is not valid JSON.
    #[error("Invalid JSON document at {}:{line}: {source}", .path.display())]
    InvalidDocument {
        path: PathBuf,
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}

/// Store-specific errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document cannot be represented in the store (e.g. not a JSON object).
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The server reported a command failure in its response body.
    #[error("Command failed: {0}")]
    CommandFailed(String),

    /// Throttled calls exhausted the retry policy.
    #[error("Request throttled after {attempts} attempt(s): {message}")]
    Throttled { attempts: u32, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_not_found_display() {
        let err: DocdumpError = ConfigError::CollectionNotFound("orders".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: Collection 'orders' not found"
        );
    }

    #[test]
    fn test_input_not_found_display() {
        let err: DocdumpError = TransferError::InputNotFound(PathBuf::from("/tmp/x.json")).into();
        assert_eq!(err.to_string(), "File /tmp/x.json not found.");
    }

    #[test]
    fn test_parse_error_carries_line() {
        let source = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = ParseError::InvalidDocument {
            path: PathBuf::from("in.json"),
            line: 7,
            source,
        };
        assert!(err.to_string().starts_with("Invalid JSON document at in.json:7:"));
    }

    #[test]
    fn test_io_conversion() {
        let err: DocdumpError = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, DocdumpError::Io(_)));
    }
}
