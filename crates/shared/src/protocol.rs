use serde::{Deserialize, Serialize};

/// What the presentation controller hands to the dispatcher: the active page
/// and the user's question about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AskIntent {
    pub url: String,
    pub query: String,
}

/// Wire body of `POST /ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub url: String,
    pub query: String,
}

impl From<&AskIntent> for AskRequest {
    fn from(intent: &AskIntent) -> Self {
        Self {
            url: intent.url.clone(),
            query: intent.query.clone(),
        }
    }
}

/// Wire body of the backend's reply. A successful answer carries `answer`;
/// a semantic failure carries `detail`. Anything else deserializes to the
/// default and is treated as a response without an answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AskResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
