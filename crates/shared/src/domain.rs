use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlates a dispatched request with the outcome record it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    Loading,
    Complete,
    Error,
}

impl InteractionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    pub fn from_str_name(name: &str) -> Option<Self> {
        match name {
            "loading" => Some(Self::Loading),
            "complete" => Some(Self::Complete),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// The single shared entity both processes read and write. Idle is the
/// absence of a record, matching an empty store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub request_id: RequestId,
    pub status: InteractionStatus,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl InteractionRecord {
    /// `answer` is only ever set by [`complete`](Self::complete) and `error`
    /// only by [`error`](Self::error); the constructors are the invariant.
    pub fn loading(request_id: RequestId, query: impl Into<String>) -> Self {
        Self {
            request_id,
            status: InteractionStatus::Loading,
            query: query.into(),
            answer: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn complete(
        request_id: RequestId,
        query: impl Into<String>,
        answer: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            status: InteractionStatus::Complete,
            query: query.into(),
            answer: Some(answer.into()),
            error: None,
            updated_at: Utc::now(),
        }
    }

    pub fn error(
        request_id: RequestId,
        query: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            request_id,
            status: InteractionStatus::Error,
            query: query.into(),
            answer: None,
            error: Some(error.into()),
            updated_at: Utc::now(),
        }
    }
}
