use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Routing error: {0}")]
    Routing(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal contract violation: {0}")]
    InternalContract(String),

    #[error("Malformed error metadata: {0}")]
    MalformedMetadata(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error(transparent)]
    Update(UpdateFailure),

    #[error(transparent)]
    DistributedUpdates(DistributedUpdatesError),
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl<T> From<std::sync::PoisonError<T>> for IndexError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<UpdateFailure> for IndexError {
    fn from(failure: UpdateFailure) -> Self {
        Self::Update(failure)
    }
}

impl From<DistributedUpdatesError> for IndexError {
    fn from(err: DistributedUpdatesError) -> Self {
        Self::DistributedUpdates(err)
    }
}

impl IndexError {
    /// Classifies the error for the client-facing status.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::BadRequest(_) | Self::Schema(_) => ErrorCode::BadRequest,
            Self::Routing(_) | Self::Transport(_) => ErrorCode::ServiceUnavailable,
            Self::Update(failure) => failure.code,
            Self::DistributedUpdates(err) => err.code(),
            Self::ExecutionError(_)
            | Self::InternalContract(_)
            | Self::MalformedMetadata(_)
            | Self::LockError(_) => ErrorCode::ServerError,
        }
    }

    /// Returns the structured failure if this error already is one.
    pub fn as_update_failure(&self) -> Option<&UpdateFailure> {
        match self {
            Self::Update(failure) => Some(failure),
            _ => None,
        }
    }
}

/// Client-visible error classes, mirroring HTTP status families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    BadRequest,
    Conflict,
    ServerError,
    ServiceUnavailable,
}

impl ErrorCode {
    pub fn http_status(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Conflict => 409,
            Self::ServerError => 500,
            Self::ServiceUnavailable => 503,
        }
    }
}

/// Ordered key/value annotations attached to a structured failure.
///
/// Keys may repeat; order is preserved so that remote nodes decode entries
/// in the order they were written.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureMetadata {
    entries: Vec<(String, String)>,
}

impl FailureMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), value.into()));
    }

    /// Returns the first value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.entries.retain(|(key, value)| keep(key, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A structured failure that can cross a node boundary with its metadata intact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateFailure {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default)]
    pub metadata: FailureMetadata,
}

impl UpdateFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            metadata: FailureMetadata::new(),
        }
    }

    /// Wraps an arbitrary error, keeping it as-is when it already is structured.
    pub fn wrap(err: IndexError) -> Self {
        match err {
            IndexError::Update(failure) => failure,
            other => Self::new(
                other.code(),
                format!("Tolerantly caught error: {}", other),
            ),
        }
    }

    pub fn with_metadata(mut self, metadata: FailureMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl fmt::Display for UpdateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UpdateFailure {}

/// One failed sub-batch delivered to a remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUpdateError {
    pub node_id: String,
    pub error: IndexError,
}

/// Aggregate of deferred failures raised by remote nodes once a batch is flushed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistributedUpdatesError {
    pub errors: Vec<RemoteUpdateError>,
}

impl DistributedUpdatesError {
    pub fn new(errors: Vec<RemoteUpdateError>) -> Self {
        Self { errors }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The most severe code among the remote failures.
    pub fn code(&self) -> ErrorCode {
        self.errors
            .iter()
            .map(|remote| remote.error.code())
            .max_by_key(|code| code.http_status())
            .unwrap_or(ErrorCode::ServerError)
    }
}

impl fmt::Display for DistributedUpdatesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} asynchronous distributed update(s) failed",
            self.errors.len()
        )?;
        for remote in &self.errors {
            write!(f, "; {}: {}", remote.node_id, remote.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for DistributedUpdatesError {}
