//! Unified error types for the transition engine.
//!
//! Error codes:
//! - NOTFOUND_001-003: Missing project, session, or event identity
//! - STORE_001-002: Storage read/write failures
//! - TIMEOUT_001: Recompute deadline exceeded

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Not-found error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundCode {
    /// NOTFOUND_001: Project does not exist
    Project,
    /// NOTFOUND_002: Session does not exist
    Session,
    /// NOTFOUND_003: Event identity does not exist
    EventIdentity,
}

impl NotFoundCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Project => "NOTFOUND_001",
            Self::Session => "NOTFOUND_002",
            Self::EventIdentity => "NOTFOUND_003",
        }
    }
}

/// Storage error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// STORE_001: Failed to read from the store
    ReadFailed,
    /// STORE_002: Failed to write to the store
    WriteFailed,
}

impl StorageErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ReadFailed => "STORE_001",
            Self::WriteFailed => "STORE_002",
        }
    }
}

/// Unified error type for the transition engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced entity does not exist.
    #[error("[{code}] {message}")]
    NotFound { code: &'static str, message: String },

    /// Storage collaborator failed.
    #[error("[{code}] {message}")]
    Storage { code: &'static str, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("[TIMEOUT_001] {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not-found error.
    pub fn not_found(code: NotFoundCode, msg: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.code(),
            message: msg.into(),
        }
    }

    /// Create a storage error.
    pub fn storage(code: StorageErrorCode, msg: impl Into<String>) -> Self {
        Self::Storage {
            code: code.code(),
            message: msg.into(),
        }
    }

    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::storage(StorageErrorCode::ReadFailed, msg)
    }

    pub fn write_failed(msg: impl Into<String>) -> Self {
        Self::storage(StorageErrorCode::WriteFailed, msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { code, .. } => Some(code),
            Self::Storage { code, .. } => Some(code),
            Self::Timeout(_) => Some("TIMEOUT_001"),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}
