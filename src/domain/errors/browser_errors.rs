use serde::{Deserialize, Serialize};

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{BucketId, ObjectId, TypeFamilyId, UploadId};

/// Machine-readable classification of a [`BrowserError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PolicyViolation,
    TransportFailure,
    ExportFailed,
    AlreadyTerminal,
    ConfirmationRequired,
    InvalidInput,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::PolicyViolation => "policy_violation",
            ErrorKind::TransportFailure => "transport_failure",
            ErrorKind::ExportFailed => "export_failed",
            ErrorKind::AlreadyTerminal => "already_terminal",
            ErrorKind::ConfirmationRequired => "confirmation_required",
            ErrorKind::InvalidInput => "invalid_input",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an upload was refused by the owning bucket's policy
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyViolation {
    /// The file extension does not resolve to a family the bucket accepts
    TypeNotAllowed { extension: Option<String> },

    /// The object is larger than the family or bucket ceiling
    SizeExceeded { size: u64, limit: u64 },

    /// Zero-byte uploads are refused
    EmptyObject,
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyViolation::TypeNotAllowed {
                extension: Some(ext),
            } => write!(f, "file type '.{}' is not allowed", ext),
            PolicyViolation::TypeNotAllowed { extension: None } => {
                write!(f, "files without an extension are not allowed")
            }
            PolicyViolation::SizeExceeded { size, limit } => {
                write!(f, "{} bytes exceeds the limit of {} bytes", size, limit)
            }
            PolicyViolation::EmptyObject => write!(f, "empty files are not allowed"),
        }
    }
}

/// Errors surfaced by the browser core
#[derive(Debug, Clone)]
pub enum BrowserError {
    /// Bucket id not present in the catalog
    BucketNotFound { bucket: BucketId },

    /// Type family referenced by a bucket or object is unknown
    TypeFamilyNotFound { family: TypeFamilyId },

    /// Object id not present in the store
    ObjectNotFound { id: ObjectId },

    /// Upload id unknown to the coordinator
    UploadNotFound { id: UploadId },

    /// Export format key not registered
    UnknownFormat { key: String },

    /// Export section key not registered
    UnknownSection { key: String },

    /// Object rejected by the bucket policy before anything was stored
    PolicyViolation {
        bucket: BucketId,
        name: String,
        violation: PolicyViolation,
    },

    /// I/O failure talking to the backing storage or export service
    TransportFailure { operation: String, message: String },

    /// Both remote and local export paths failed
    ExportFailed { reason: String },

    /// Operation attempted on a task that already reached a terminal state
    AlreadyTerminal { id: UploadId, state: String },

    /// Bulk delete needs an explicit confirmation
    ConfirmationRequired { count: usize, threshold: usize },

    /// Invalid value object or request field
    Validation(ValidationError),

    /// Static configuration could not be loaded
    InvalidConfiguration { message: String },
}

impl BrowserError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrowserError::BucketNotFound { .. }
            | BrowserError::TypeFamilyNotFound { .. }
            | BrowserError::ObjectNotFound { .. }
            | BrowserError::UploadNotFound { .. }
            | BrowserError::UnknownFormat { .. }
            | BrowserError::UnknownSection { .. } => ErrorKind::NotFound,
            BrowserError::PolicyViolation { .. } => ErrorKind::PolicyViolation,
            BrowserError::TransportFailure { .. } => ErrorKind::TransportFailure,
            BrowserError::ExportFailed { .. } => ErrorKind::ExportFailed,
            BrowserError::AlreadyTerminal { .. } => ErrorKind::AlreadyTerminal,
            BrowserError::ConfirmationRequired { .. } => ErrorKind::ConfirmationRequired,
            BrowserError::Validation(_) | BrowserError::InvalidConfiguration { .. } => {
                ErrorKind::InvalidInput
            }
        }
    }

    pub fn transport(operation: &str, message: impl std::fmt::Display) -> Self {
        BrowserError::TransportFailure {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for BrowserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserError::BucketNotFound { bucket } => write!(f, "Bucket not found: {}", bucket),
            BrowserError::TypeFamilyNotFound { family } => {
                write!(f, "Type family not found: {}", family)
            }
            BrowserError::ObjectNotFound { id } => write!(f, "Object not found: {}", id),
            BrowserError::UploadNotFound { id } => write!(f, "Upload not found: {}", id),
            BrowserError::UnknownFormat { key } => write!(f, "Unknown export format: {}", key),
            BrowserError::UnknownSection { key } => write!(f, "Unknown export section: {}", key),
            BrowserError::PolicyViolation {
                bucket,
                name,
                violation,
            } => {
                write!(
                    f,
                    "Upload of '{}' rejected by bucket '{}': {}",
                    name, bucket, violation
                )
            }
            BrowserError::TransportFailure { operation, message } => {
                write!(f, "Transport failure during {}: {}", operation, message)
            }
            BrowserError::ExportFailed { reason } => write!(f, "Export failed: {}", reason),
            BrowserError::AlreadyTerminal { id, state } => {
                write!(f, "Upload {} is already {}", id, state)
            }
            BrowserError::ConfirmationRequired { count, threshold } => {
                write!(
                    f,
                    "Deleting {} objects requires confirmation (threshold: {})",
                    count, threshold
                )
            }
            BrowserError::Validation(err) => write!(f, "Validation error: {}", err),
            BrowserError::InvalidConfiguration { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
        }
    }
}

impl std::error::Error for BrowserError {}

impl From<ValidationError> for BrowserError {
    fn from(err: ValidationError) -> Self {
        BrowserError::Validation(err)
    }
}

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;
