use thiserror::Error;

/// User-facing backend failure, rendered verbatim in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendFailure {
    /// The backend could not be reached at all.
    #[error("Could not connect to backend.")]
    Unreachable,
    /// The backend replied but did not produce an answer.
    #[error("{0}")]
    Rejected(String),
}

impl BackendFailure {
    /// A reply without an answer, using the server-provided detail when
    /// present.
    pub fn rejected(detail: Option<String>) -> Self {
        Self::Rejected(detail.unwrap_or_else(|| "Unknown error".to_string()))
    }
}
