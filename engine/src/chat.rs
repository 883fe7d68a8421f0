//! Chat session protocol.
//!
//! A send moves through `Idle → Sending → {Delivered | RateLimited | Failed}`
//! and always ends back in `Idle`. A rate limit rotates the backend to the
//! next provider and retries the same message, up to twice around the
//! provider ring. Transport and application errors end the turn with a
//! single notice.
//!
//! Sends are single-flight: while one is in progress, further sends are
//! rejected without touching the network or the transcript.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lectern_api::{ApiClient, ApiError};
use lectern_types::wire::HistoryEntry;
use lectern_types::{ChatMessage, MessageId, NonEmptyStaticStr, NonEmptyString};
use tokio::sync::Mutex as AsyncMutex;

use crate::providers::ProviderDirectory;
use crate::state::ClientState;
use crate::view::{NoticeLevel, View};

pub(crate) const RATE_LIMIT_NOTICE: NonEmptyStaticStr =
    NonEmptyStaticStr::new("Provider rate limit reached. Switching to another provider...");
pub(crate) const EXHAUSTED_NOTICE: NonEmptyStaticStr =
    NonEmptyStaticStr::new("All providers are temporarily unavailable. Please try again later.");
pub(crate) const GENERIC_ERROR_NOTICE: NonEmptyStaticStr = NonEmptyStaticStr::new(
    "Sorry, something went wrong while processing your request. Please try again.",
);
pub(crate) const CONNECTION_ERROR_NOTICE: NonEmptyStaticStr =
    NonEmptyStaticStr::new("Connection error. Check your network connection.");

/// Rounds through the provider ring before giving up.
const PROVIDER_ROUNDS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    InFlight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every attempt in the budget was rate limited.
    Exhausted { attempts: usize },
    /// The backend answered with a non-429 error.
    Application,
    /// No response: connect failure, timeout, unreadable body.
    Transport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Rejected(RejectReason),
    Delivered { attempts: usize },
    Failed(FailureKind),
}

/// Clears the in-flight flag and the busy indicator however the send ends.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
    view: &'a dyn View,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        self.view.set_chat_busy(false);
    }
}

fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map_or_else(Utc::now, |ts| ts.with_timezone(&Utc))
}

pub struct ChatSession {
    api: ApiClient,
    state: Arc<ClientState>,
    view: Arc<dyn View>,
    providers: AsyncMutex<ProviderDirectory>,
    messages: Mutex<Vec<ChatMessage>>,
    next_id: AtomicU64,
    in_flight: AtomicBool,
    cooldown: Duration,
}

impl ChatSession {
    pub fn new(
        api: ApiClient,
        state: Arc<ClientState>,
        view: Arc<dyn View>,
        cooldown: Duration,
    ) -> Self {
        Self {
            api,
            state,
            view,
            providers: AsyncMutex::new(ProviderDirectory::new()),
            messages: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            in_flight: AtomicBool::new(false),
            cooldown,
        }
    }

    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Snapshot of the provider directory.
    pub async fn providers(&self) -> ProviderDirectory {
        self.providers.lock().await.clone()
    }

    fn next_message_id(&self) -> MessageId {
        MessageId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn append(&self, message: ChatMessage) {
        self.view.render_message(&message);
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }

    fn append_notice(&self, text: &str) {
        let id = self.next_message_id();
        self.append(ChatMessage::notice(id, text, Utc::now()));
    }

    /// Send `input` as the next user turn.
    pub async fn send(&self, input: &str) -> SendOutcome {
        let Ok(text) = NonEmptyString::new(input) else {
            return SendOutcome::Rejected(RejectReason::Empty);
        };
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Chat send rejected: another send is in flight");
            return SendOutcome::Rejected(RejectReason::InFlight);
        }
        let _guard = InFlightGuard {
            flag: &self.in_flight,
            view: self.view.as_ref(),
        };

        let id = self.next_message_id();
        self.append(ChatMessage::user(id, text.as_str(), Utc::now()));
        self.view.set_chat_busy(true);

        let budget = {
            let mut providers = self.providers.lock().await;
            if providers.is_empty() {
                providers.refresh(&self.api).await;
            }
            (providers.len() * PROVIDER_ROUNDS).max(1)
        };

        let session = self.state.session_id();
        let mut attempts = 0;
        while attempts < budget {
            attempts += 1;
            tracing::debug!(attempt = attempts, budget, "Sending chat message");

            match self.api.send_chat(text.as_str(), &session).await {
                Ok(reply) => {
                    let id = self.next_message_id();
                    let timestamp = parse_timestamp(reply.created_at.as_deref());
                    self.append(ChatMessage::assistant(id, reply.response, timestamp));
                    if let Some(issued) = reply.session_id {
                        self.state.adopt_session(issued);
                    }
                    return SendOutcome::Delivered { attempts };
                }
                Err(ApiError::RateLimited { retry_after, .. }) => {
                    tracing::info!(
                        attempt = attempts,
                        budget,
                        retry_after_secs = retry_after.map(|d| d.as_secs()),
                        "Chat rate limited; rotating provider"
                    );
                    self.append_notice(RATE_LIMIT_NOTICE.as_str());
                    self.providers.lock().await.advance(&self.api).await;
                    self.view.cooldown_send(self.cooldown);
                }
                Err(e) if e.is_transport() => {
                    tracing::warn!("Chat request failed: {e}");
                    self.append_notice(CONNECTION_ERROR_NOTICE.as_str());
                    return SendOutcome::Failed(FailureKind::Transport);
                }
                Err(e) => {
                    tracing::warn!("Chat request rejected: {e}");
                    let text = e
                        .backend_message()
                        .unwrap_or(GENERIC_ERROR_NOTICE.as_str())
                        .to_string();
                    self.append_notice(&text);
                    return SendOutcome::Failed(FailureKind::Application);
                }
            }
        }

        tracing::warn!(attempts, "Chat send exhausted provider budget");
        self.append_notice(EXHAUSTED_NOTICE.as_str());
        SendOutcome::Failed(FailureKind::Exhausted { attempts })
    }

    /// Replace the transcript with the server's history for this session.
    /// Returns the number of messages now held.
    pub async fn load_history(&self) -> Result<usize, ApiError> {
        let session = self.state.session_id();
        let entries = match self.api.chat_history(&session).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to load chat history: {e}");
                self.view.show_chat_empty();
                return Err(e);
            }
        };

        let messages = self.expand_history(&entries);
        self.view.clear_messages();
        if messages.is_empty() {
            self.view.show_chat_empty();
        }
        for message in &messages {
            self.view.render_message(message);
        }
        let count = messages.len();
        *self.messages.lock().unwrap_or_else(PoisonError::into_inner) = messages;
        Ok(count)
    }

    fn expand_history(&self, entries: &[HistoryEntry]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(entries.len() * 2);
        for entry in entries {
            let timestamp = parse_timestamp(entry.created_at.as_deref());
            if !entry.message.is_empty() {
                messages.push(ChatMessage::user(
                    self.next_message_id(),
                    entry.message.clone(),
                    timestamp,
                ));
            }
            if !entry.response.is_empty() {
                messages.push(ChatMessage::assistant(
                    self.next_message_id(),
                    entry.response.clone(),
                    timestamp,
                ));
            }
        }
        messages
    }

    /// Clear the server-side history for this session. The transcript is
    /// emptied only when the server confirms; the session id is kept.
    pub async fn clear(&self) -> Result<(), ApiError> {
        let session = self.state.session_id();
        match self.api.clear_chat(&session).await {
            Ok(()) => {
                self.messages
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear();
                self.view.clear_messages();
                self.view.show_chat_empty();
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Failed to clear chat: {e}");
                self.view
                    .notify(NoticeLevel::Error, "Could not clear the chat. Please try again.");
                Err(e)
            }
        }
    }
}
