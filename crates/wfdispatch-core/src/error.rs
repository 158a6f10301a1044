use thiserror::Error;

/// Error type returned by every dispatcher operation
///
/// Per-node log failures are not errors: they are carried as sentinel
/// entries inside a successful [`crate::LogBundle`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Workflow absent from the caller's namespace
    #[error("Workflow not found: {0}")]
    NotFound(String),

    /// The identity cannot be resolved to a namespace
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or backend fault, surfaced as-is
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl DispatchError {
    /// Whether the error is a not-found outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, DispatchError::NotFound(_))
    }

    /// Whether the error originates from the backend
    pub fn is_backend_error(&self) -> bool {
        matches!(self, DispatchError::BackendUnavailable(_))
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(err: serde_json::Error) -> Self {
        DispatchError::BackendUnavailable(format!("Malformed backend payload: {}", err))
    }
}

/// Result type for dispatcher operations
pub type DispatchResult<T> = Result<T, DispatchError>;
