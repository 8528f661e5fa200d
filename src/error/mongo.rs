use std::fmt;

/// Server code returned by Cosmos DB's MongoDB API when the request rate
/// exceeds the provisioned throughput.
pub const TOO_MANY_REQUESTS: i32 = 16500;

/// Code, name and message pulled out of a driver error
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Driver error category, e.g. `mongo.command_error`
    pub kind: Option<String>,
    pub code: Option<i32>,
    pub name: Option<String>,
    pub message: Option<String>,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message.as_deref().unwrap_or("unknown error");
        match (self.code, self.name.as_deref()) {
            (Some(code), Some(name)) => write!(f, "{message} ({name}, code {code})"),
            (Some(code), None) => write!(f, "{message} (code {code})"),
            _ => write!(f, "{message}"),
        }
    }
}

/// Extract structured information from a MongoDB error using the driver API.
pub fn extract_error_info(error: &mongodb::error::Error) -> ErrorInfo {
    use mongodb::error::{ErrorKind, WriteFailure};

    let mut info = ErrorInfo::default();

    match error.kind.as_ref() {
        ErrorKind::Write(write_failure) => {
            info.kind = Some("mongo.write_error".to_string());

            match write_failure {
                WriteFailure::WriteError(write_error) => {
                    info.code = Some(write_error.code);
                    info.message = Some(write_error.message.clone());
                }
                WriteFailure::WriteConcernError(wc_error) => {
                    info.code = Some(wc_error.code);
                    info.message = Some(wc_error.message.clone());
                }
                _ => {}
            }
        }
        ErrorKind::Command(command_error) => {
            info.kind = Some("mongo.command_error".to_string());
            info.code = Some(command_error.code);
            info.message = Some(command_error.message.clone());
        }
        ErrorKind::Authentication { message, .. } => {
            info.kind = Some("mongo.authentication_error".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::InvalidArgument { message, .. } => {
            info.kind = Some("mongo.invalid_argument".to_string());
            info.message = Some(message.clone());
        }
        ErrorKind::ServerSelection { message, .. } => {
            info.kind = Some("mongo.server_selection_error".to_string());
            info.message = Some(message.clone());
        }
        _ => {
            info.message = Some(error.to_string());
        }
    }

    info.name = info.code.and_then(error_name);
    info
}

/// Whether the error is a rate-limiting rejection worth retrying.
pub fn is_throttled(error: &mongodb::error::Error) -> bool {
    let info = extract_error_info(error);
    if info.code == Some(TOO_MANY_REQUESTS) {
        return true;
    }
    info.message
        .as_deref()
        .is_some_and(|m| m.contains("TooManyRequests") || m.contains("Request rate is large"))
}

/// Get a human-readable error name from a MongoDB error code.
pub(crate) fn error_name(code: i32) -> Option<String> {
    let name = match code {
        11000 | 11001 => "DuplicateKey",
        13 => "Unauthorized",
        18 => "AuthenticationFailed",
        26 => "NamespaceNotFound",
        50 => "MaxTimeMSExpired",
        121 => "DocumentValidationFailure",
        TOO_MANY_REQUESTS => "TooManyRequests",
        _ => return None,
    };

    Some(name.to_string())
}

/// Driver error for a failed server command, as the driver would raise it
#[cfg(test)]
pub(crate) fn command_error(code: i32, message: &str) -> mongodb::error::Error {
    use mongodb::bson::{doc, from_document};
    use mongodb::error::{CommandError, ErrorKind};

    let code_name = error_name(code).unwrap_or_default();
    let reply = doc! { "code": code, "codeName": code_name, "errmsg": message };
    let command: CommandError = from_document(reply).unwrap();
    ErrorKind::Command(command).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(error_name(16500).as_deref(), Some("TooManyRequests"));
        assert_eq!(error_name(26).as_deref(), Some("NamespaceNotFound"));
        assert_eq!(error_name(424242), None);
    }

    #[test]
    fn test_display_with_code() {
        let info = ErrorInfo {
            kind: Some("mongo.command_error".to_string()),
            code: Some(16500),
            name: error_name(16500),
            message: Some("Request rate is large".to_string()),
        };
        assert_eq!(
            info.to_string(),
            "Request rate is large (TooManyRequests, code 16500)"
        );
    }

    #[test]
    fn test_display_without_code() {
        let info = ErrorInfo {
            message: Some("boom".to_string()),
            ..Default::default()
        };
        assert_eq!(info.to_string(), "boom");
    }

    #[test]
    fn test_custom_error_is_not_throttled() {
        let err = mongodb::error::Error::custom("unrelated failure");
        assert!(!is_throttled(&err));
    }

    #[test]
    fn test_too_many_requests_is_throttled() {
        let err = command_error(TOO_MANY_REQUESTS, "Request rate is large");
        assert!(is_throttled(&err));

        let info = extract_error_info(&err);
        assert_eq!(info.code, Some(16500));
        assert_eq!(info.name.as_deref(), Some("TooManyRequests"));
    }

    #[test]
    fn test_other_command_errors_are_not_throttled() {
        assert!(!is_throttled(&command_error(11000, "E11000 duplicate key")));
    }
}
