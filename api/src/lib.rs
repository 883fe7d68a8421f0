//! Typed request/response client for the Lectern backend.
//!
//! Every endpoint the client uses is a method on [`ApiClient`]. Responses are
//! decoded into the records in [`lectern_types::wire`] at this boundary;
//! failures are classified into [`ApiError`] so callers can tell a rate limit
//! from a transport failure from an application error without looking at
//! status codes.
//!
//! All `POST`/`DELETE` requests carry the configured anti-forgery token in
//! the `X-CSRFToken` header.

pub mod error;

use std::time::Duration;

use futures_util::StreamExt;
use lectern_config::ClientSettings;
use lectern_types::wire::{
    ChangeProviderAck, ChangeProviderRequest, ChatReply, ChatRequest, ErrorBody, HistoryEntry,
    HistoryResponse, MarkWatchedRequest, ProgressReport, ProgressRequest, ProviderInfo,
    RateLimitBody,
};
use lectern_types::{Category, SessionId, Video, VideoId};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

pub use error::{ApiError, parse_retry_after};

pub const CSRF_HEADER: &str = "X-CSRFToken";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

const CHAT: &str = "api/chat/";
const CHAT_HISTORY: &str = "api/chat/history/";
const CHAT_CLEAR: &str = "api/chat/clear/";
const PROVIDER_INFO: &str = "api/provider_info/";
const CHANGE_PROVIDER: &str = "api/change_provider/";
const RECENT_VIDEOS: &str = "api/videos/recent/";
const USER_PROGRESS: &str = "api/user/progress/";
const MARK_WATCHED: &str = "api/videos/mark-watched/";

fn base_client_builder(timeout: Duration) -> reqwest::ClientBuilder {
    use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};

    let mut default_headers = HeaderMap::new();
    default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    reqwest::Client::builder()
        .user_agent(concat!("lectern/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
        .default_headers(default_headers)
}

/// Read at most `MAX_ERROR_BODY_BYTES` of an error response.
async fn read_capped_error_body(response: Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            break;
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Ensure joins append to the configured path instead of replacing its last
/// segment.
fn normalize_base(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    csrf_token: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[REDACTED]"))
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        csrf_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let http = base_client_builder(timeout)
            .build()
            .map_err(ApiError::Client)?;
        Ok(Self {
            http,
            base_url: normalize_base(base_url),
            csrf_token,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ApiError> {
        Self::new(
            settings.base_url.clone(),
            settings.csrf_token.clone(),
            settings.request_timeout,
        )
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    fn url_with_session(&self, path: &str, session: &SessionId) -> Result<Url, ApiError> {
        let mut url = self.url(path)?;
        url.query_pairs_mut()
            .append_pair("session_id", session.as_str());
        Ok(url)
    }

    fn with_csrf(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }

    /// Send and classify. 2xx responses are returned for decoding; every
    /// other outcome becomes an [`ApiError`].
    async fn execute(
        &self,
        endpoint: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        let response = request.send().await.map_err(|source| {
            tracing::debug!(endpoint, error = %source, "Request failed before a response");
            ApiError::Transport { endpoint, source }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let header_delay = parse_retry_after(response.headers());
        let body = read_capped_error_body(response).await;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let parsed: RateLimitBody = serde_json::from_str(&body).unwrap_or_default();
            let retry_after = header_delay.or(parsed.retry_after.map(Duration::from_secs));
            tracing::debug!(endpoint, ?retry_after, "Rate limited");
            return Err(ApiError::RateLimited {
                endpoint,
                retry_after,
                message: parsed.message,
            });
        }

        let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
        tracing::debug!(endpoint, %status, "Request returned error status");
        Err(ApiError::Status {
            endpoint,
            status,
            message: parsed.message.or(parsed.error),
        })
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &'static str,
        response: Response,
    ) -> Result<T, ApiError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { endpoint, source })?;
        serde_json::from_slice(&bytes).map_err(|source| ApiError::Decode { endpoint, source })
    }

    pub async fn chat_history(&self, session: &SessionId) -> Result<Vec<HistoryEntry>, ApiError> {
        let url = self.url_with_session(CHAT_HISTORY, session)?;
        let response = self.execute("chat_history", self.http.get(url)).await?;
        let history: HistoryResponse = Self::decode("chat_history", response).await?;
        Ok(history.messages)
    }

    pub async fn send_chat(
        &self,
        message: &str,
        session: &SessionId,
    ) -> Result<ChatReply, ApiError> {
        let body = ChatRequest {
            message,
            session_id: session,
        };
        let request = self.with_csrf(self.http.post(self.url(CHAT)?).json(&body));
        let response = self.execute("chat", request).await?;
        Self::decode("chat", response).await
    }

    pub async fn clear_chat(&self, session: &SessionId) -> Result<(), ApiError> {
        let url = self.url_with_session(CHAT_CLEAR, session)?;
        let request = self.with_csrf(self.http.delete(url));
        self.execute("chat_clear", request).await?;
        Ok(())
    }

    pub async fn provider_info(&self) -> Result<ProviderInfo, ApiError> {
        let response = self
            .execute("provider_info", self.http.get(self.url(PROVIDER_INFO)?))
            .await?;
        Self::decode("provider_info", response).await
    }

    pub async fn change_provider(&self, provider: &str) -> Result<ChangeProviderAck, ApiError> {
        let body = ChangeProviderRequest { provider };
        let request = self.with_csrf(self.http.post(self.url(CHANGE_PROVIDER)?).json(&body));
        let response = self.execute("change_provider", request).await?;
        Self::decode("change_provider", response).await
    }

    pub async fn category_videos(&self, category: &Category) -> Result<Vec<Video>, ApiError> {
        let mut url = self.url("api/videos/category/")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push(category.as_str())
            .push("");
        let response = self.execute("category_videos", self.http.get(url)).await?;
        Self::decode("category_videos", response).await
    }

    pub async fn recent_videos(&self) -> Result<Vec<Video>, ApiError> {
        let response = self
            .execute("recent_videos", self.http.get(self.url(RECENT_VIDEOS)?))
            .await?;
        Self::decode("recent_videos", response).await
    }

    pub async fn user_progress(&self, watched: &[VideoId]) -> Result<ProgressReport, ApiError> {
        let body = ProgressRequest {
            watched_videos: watched,
        };
        let request = self.with_csrf(self.http.post(self.url(USER_PROGRESS)?).json(&body));
        let response = self.execute("user_progress", request).await?;
        Self::decode("user_progress", response).await
    }

    pub async fn mark_watched(&self, video: &VideoId) -> Result<(), ApiError> {
        let body = MarkWatchedRequest { video_id: video };
        let request = self.with_csrf(self.http.post(self.url(MARK_WATCHED)?).json(&body));
        self.execute("mark_watched", request).await?;
        Ok(())
    }
}
