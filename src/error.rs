use std::fmt;

use thiserror::Error;

/// Status hint carried by store failures, so the transport layer can pick a
/// response code without inspecting messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    InternalError,
    NotFound,
}
impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StoreStatus::InternalError => write!(f, "internal error"),
            StoreStatus::NotFound => write!(f, "not found"),
        }
    }
}

#[derive(Error, Debug)]
pub enum OlogError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("Backing store error ({status}): {message}")]
    BackingStore { status: StoreStatus, message: String },
    #[error("Query cancelled: {0}")]
    Cancelled(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

impl OlogError {
    pub fn store(message: impl Into<String>) -> Self {
        Self::BackingStore { status: StoreStatus::InternalError, message: message.into() }
    }
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::BackingStore { status: StoreStatus::NotFound, message: message.into() }
    }
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidParameter(_))
    }
}

pub type Result<T> = std::result::Result<T, OlogError>;

// Helper conversions
impl From<rusqlite::Error> for OlogError {
    fn from(e: rusqlite::Error) -> Self { Self::store(format!("SQLite exception: {e}")) }
}
impl From<config::ConfigError> for OlogError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_carry_status() {
        let err = OlogError::not_found("log 7 does not exist");
        assert_eq!(err.to_string(), "Backing store error (not found): log 7 does not exist");
        let err: OlogError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, OlogError::BackingStore { status: StoreStatus::InternalError, .. }));
    }

    #[test]
    fn only_invalid_parameters_are_client_errors() {
        assert!(OlogError::InvalidParameter("limit".into()).is_client_error());
        assert!(!OlogError::store("disk gone").is_client_error());
        assert!(!OlogError::Cancelled("deadline".into()).is_client_error());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OlogError>();
    }
}
