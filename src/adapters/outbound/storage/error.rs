use std::io;
use thiserror::Error as ThisError;

use crate::domain::errors::BrowserError;

#[derive(ThisError, Debug)]
pub enum StoreError {
    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("HTTP error: {status} - {message}")]
    Http {
        status: http::StatusCode,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Wrap as a domain transport failure for `operation`
    pub fn into_browser_error(self, operation: &str) -> BrowserError {
        BrowserError::transport(operation, self)
    }
}

impl From<StoreError> for http::StatusCode {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ObjectStore(object_store::Error::NotFound { .. }) => {
                http::StatusCode::NOT_FOUND
            }
            StoreError::InvalidPath(_) => http::StatusCode::BAD_REQUEST,
            StoreError::Http { status, .. } => status,
            _ => http::StatusCode::BAD_GATEWAY,
        }
    }
}

impl From<StoreError> for BrowserError {
    fn from(err: StoreError) -> Self {
        err.into_browser_error("storage")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;

    #[test]
    fn test_store_errors_are_transport_failures() {
        let err: BrowserError = StoreError::Other("disk full".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
        assert!(err.to_string().contains("disk full"));

        let status: http::StatusCode = StoreError::Http {
            status: http::StatusCode::SERVICE_UNAVAILABLE,
            message: "down".to_string(),
        }
        .into();
        assert_eq!(status, http::StatusCode::SERVICE_UNAVAILABLE);
    }
}
