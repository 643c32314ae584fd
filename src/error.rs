use crate::workflow::ApprovalStatus;
use sled::transaction::TransactionError;

/// Errors surfaced to callers of [`crate::service::ApprovalService`].
///
/// Everything here aborts the surrounding transaction; notification failures
/// are deliberately absent because they never reach the caller.
#[derive(thiserror::Error, Debug)]
pub enum ApprovalError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },
    #[error("{actor} is not the approver for {status:?}")]
    Unauthorized {
        actor: String,
        status: ApprovalStatus,
    },
    #[error("Request {request_id} has already moved on (status {status:?})")]
    Conflict {
        request_id: String,
        status: ApprovalStatus,
    },
    #[error("Storage failure: {0}")]
    Storage(#[from] sled::Error),
    #[error("Encoding failure: {0}")]
    Encoding(String),
}

impl ApprovalError {
    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        ApprovalError::NotFound {
            what,
            id: id.into(),
        }
    }
}

impl From<TransactionError<ApprovalError>> for ApprovalError {
    fn from(value: TransactionError<ApprovalError>) -> Self {
        match value {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => ApprovalError::Storage(e),
        }
    }
}

impl From<minicbor::decode::Error> for ApprovalError {
    fn from(value: minicbor::decode::Error) -> Self {
        ApprovalError::Encoding(value.to_string())
    }
}

impl<E: std::fmt::Display> From<minicbor::encode::Error<E>> for ApprovalError {
    fn from(value: minicbor::encode::Error<E>) -> Self {
        ApprovalError::Encoding(value.to_string())
    }
}

/// Rejections produced by the pure state machine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("{actor} is not the approver for {status:?}")]
    Unauthorized {
        actor: String,
        status: ApprovalStatus,
    },
    #[error("Decision arrived after status reached {status:?}")]
    Conflict { status: ApprovalStatus },
}

impl TransitionError {
    pub fn into_approval_error(self, request_id: &str) -> ApprovalError {
        match self {
            TransitionError::Unauthorized { actor, status } => {
                ApprovalError::Unauthorized { actor, status }
            }
            TransitionError::Conflict { status } => ApprovalError::Conflict {
                request_id: request_id.to_string(),
                status,
            },
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("No directory entry for {0}")]
    NotFound(String),
}

/// A single failed delivery attempt. Logged and reported, never escalated.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("No contact address for {0}")]
    NoContact(String),
    #[error("Email to {recipient} failed: {reason}")]
    Email { recipient: String, reason: String },
    #[error("In-app notice for {recipient} failed: {reason}")]
    Notice { recipient: String, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file `{path}`: {source}")]
    ReadFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
    #[error("Could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}
