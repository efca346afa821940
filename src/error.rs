//! Error types for the Google Sheets provider.

use thiserror::Error;

use crate::rows::CellError;
use crate::sheets::SheetsError;

/// Errors reported by provider operations.
///
/// Every failure, including upstream API failures, is returned as one of these
/// values and surfaced to the host as an error diagnostic. Nothing on an
/// operation path aborts the process.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The spreadsheet or range was not found upstream.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The configuration does not match the schema.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Provider configuration failed (credentials, authentication, TLS).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is not served by this provider.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A state or config payload could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Authentication or authorization failed upstream.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The Sheets API quota or rate limit was exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The Sheets API could not be reached or returned a server error.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A Sheets API call exceeded its timeout on every attempt.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation needs a configured provider.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The request itself was malformed (bad range, bad import id).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A fetched cell could not be represented as a string.
    #[error("Invalid cell value: {0}")]
    InvalidCell(#[from] CellError),

    /// The scanned range contains rows but none of them is empty.
    #[error("No empty row found in range {0}")]
    NoEmptyRow(String),

    /// The operation was abandoned because the provider is stopping.
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl From<SheetsError> for ProviderError {
    fn from(err: SheetsError) -> Self {
        match err {
            SheetsError::Api { status, message } => match status {
                404 => Self::NotFound(message),
                401 | 403 => Self::PermissionDenied(message),
                429 => Self::ResourceExhausted(message),
                400 => Self::InvalidRequest(message),
                s if s >= 500 => Self::Unavailable(format!("HTTP {}: {}", s, message)),
                s => Self::InvalidRequest(format!("HTTP {}: {}", s, message)),
            },
            SheetsError::Auth(msg) => Self::PermissionDenied(msg),
            SheetsError::Transport(msg) => Self::Unavailable(msg),
            SheetsError::Timeout(after) => {
                Self::DeadlineExceeded(format!("Sheets API call timed out after {:?}", after))
            }
            SheetsError::Cancelled => Self::Cancelled("provider is stopping".to_string()),
            SheetsError::Other(msg) => Self::Unavailable(msg),
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        let message = err.to_string();
        match err {
            ProviderError::NotFound(_) | ProviderError::UnknownResource(_) => {
                tonic::Status::not_found(message)
            }
            ProviderError::Validation(_)
            | ProviderError::Serialization(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::InvalidCell(_) => tonic::Status::invalid_argument(message),
            ProviderError::Configuration(_)
            | ProviderError::FailedPrecondition(_)
            | ProviderError::NoEmptyRow(_) => tonic::Status::failed_precondition(message),
            ProviderError::PermissionDenied(_) => tonic::Status::permission_denied(message),
            ProviderError::ResourceExhausted(_) => tonic::Status::resource_exhausted(message),
            ProviderError::Unavailable(_) => tonic::Status::unavailable(message),
            ProviderError::DeadlineExceeded(_) => tonic::Status::deadline_exceeded(message),
            ProviderError::Cancelled(_) => tonic::Status::cancelled(message),
        }
    }
}
