//! Chat transcript entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry. Created once, never mutated.
///
/// Rate-limit and failure notices are assistant messages with `notice` set;
/// they are shown to the user but are not part of the server-side history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    id: MessageId,
    role: Role,
    text: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    notice: bool,
}

impl ChatMessage {
    #[must_use]
    pub fn user(id: MessageId, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::User,
            text: text.into(),
            timestamp,
            notice: false,
        }
    }

    #[must_use]
    pub fn assistant(id: MessageId, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            text: text.into(),
            timestamp,
            notice: false,
        }
    }

    #[must_use]
    pub fn notice(id: MessageId, text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            text: text.into(),
            timestamp,
            notice: true,
        }
    }

    #[must_use]
    pub fn id(&self) -> MessageId {
        self.id
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    #[must_use]
    pub fn is_notice(&self) -> bool {
        self.notice
    }
}
