/// Error types of the network layer.
///
/// Backend failures carry a stable code, a human-readable message and optional details,
/// and are wrapped with the name of the operation that failed so logs and failure
/// continuations always say where it happened.
use log::{error, warn};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes raised by backends.
pub mod codes {
    pub const ACCOUNT_NOT_FOUND: &str = "ACCOUNT_NOT_FOUND";
    pub const USERNAME_NOT_AVAILABLE: &str = "USERNAME_NOT_AVAILABLE";
    pub const INVALID_USERNAME_OR_PASSWORD: &str = "INVALID_USERNAME_OR_PASSWORD";
    pub const INVALID_PARAMS: &str = "INVALID_PARAMS";
    pub const LINKED_ID_ALREADY_CLAIMED: &str = "LINKED_ID_ALREADY_CLAIMED";
    pub const CUSTOM_ID_NOT_LINKED: &str = "CUSTOM_ID_NOT_LINKED";
    pub const USERS_ALREADY_FRIENDS: &str = "USERS_ALREADY_FRIENDS";
    pub const SHARED_GROUP_ID_IN_USE: &str = "SHARED_GROUP_ID_IN_USE";
    pub const SHARED_GROUP_NOT_FOUND: &str = "SHARED_GROUP_NOT_FOUND";
    pub const NOT_A_GROUP_MEMBER: &str = "NOT_A_GROUP_MEMBER";
    pub const SERVICE_UNAVAILABLE: &str = "SERVICE_UNAVAILABLE";
}

/// Failure reported by a backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl BackendError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(details) = &self.details {
            write!(f, " (details: {})", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for BackendError {}

pub type BackendResult<T> = Result<T, BackendError>;

/// Failure of one logical network operation, as delivered to failure continuations.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("{operation} failed: {source}")]
    Backend {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
    #[error("no user is logged in")]
    NotLoggedIn,
    #[error("user id {user_id:?} contains the group id separator")]
    InvalidUserId { user_id: String },
    #[error("user {user_id} is not a participant of match {group_id}")]
    NotParticipant { user_id: String, group_id: String },
    #[error("stored match in group {group_id} is malformed: {reason}")]
    MalformedMatch { group_id: String, reason: String },
    #[error("match in group {group_id} changed remotely (expected version {expected}, found {found})")]
    Conflict { group_id: String, expected: u64, found: u64 },
    #[error("could not serialize match: {0}")]
    Serialize(String),
    #[error(transparent)]
    DeviceId(#[from] DeviceIdError),
}

impl NetworkError {
    pub fn backend(operation: &'static str, source: BackendError) -> Self {
        NetworkError::Backend { operation, source }
    }

    /// Log a backend failure with its operation name, then wrap it.
    pub fn logged(operation: &'static str, source: BackendError) -> Self {
        if source.is(codes::SERVICE_UNAVAILABLE) {
            warn!("[Network] {} failed: {}", operation, source);
        } else {
            error!("[Network] {} failed: {}", operation, source);
        }
        Self::backend(operation, source)
    }

    /// Backend error code, if this failure came from the backend.
    pub fn backend_code(&self) -> Option<&str> {
        match self {
            NetworkError::Backend { source, .. } => Some(&source.code),
            _ => None,
        }
    }
}

/// Failure reading or writing the persisted device id.
#[derive(Debug, Clone, Error)]
pub enum DeviceIdError {
    #[error("cannot access device id file {path}: {reason}")]
    Io { path: PathBuf, reason: String },
    #[error("device id file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("invalid device id {value:?}: {reason}")]
    InvalidId { value: String, reason: String },
}
