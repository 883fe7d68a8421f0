//! Request and response bodies for the REST endpoints.
//!
//! Every payload the backend sends is narrowed into one of these records at
//! the HTTP boundary; nothing above `lectern-api` handles raw JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{Category, SessionId, VideoId};
use crate::progress::ProgressMap;

/// `POST /api/chat/` body.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a SessionId,
}

/// `POST /api/chat/` success body.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub session_id: Option<SessionId>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub provider_used: Option<String>,
}

/// Body of a 429 from `POST /api/chat/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RateLimitBody {
    #[serde(default)]
    pub retry_after: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of any other non-2xx response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One stored exchange from `GET /api/chat/history/`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryEntry>,
}

/// `GET /api/provider_info/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderInfo {
    #[serde(default)]
    pub all: Vec<String>,
    #[serde(default)]
    pub current: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeProviderRequest<'a> {
    pub provider: &'a str,
}

/// `POST /api/change_provider/` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeProviderAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub current_provider: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressRequest<'a> {
    pub watched_videos: &'a [VideoId],
}

/// `POST /api/user/progress/`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressReport {
    #[serde(default)]
    pub progress: ProgressMap,
    #[serde(default)]
    pub total_videos: BTreeMap<Category, u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkWatchedRequest<'a> {
    pub video_id: &'a VideoId,
}
