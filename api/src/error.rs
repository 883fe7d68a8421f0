//! Error taxonomy for backend calls.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response: connect failure, timeout, or a
    /// body that could not be read.
    #[error("{endpoint}: transport failure: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// HTTP 429.
    #[error("{endpoint}: rate limited")]
    RateLimited {
        endpoint: &'static str,
        retry_after: Option<Duration>,
        message: Option<String>,
    },
    /// Any other non-2xx status. `message` is the backend's own text when the
    /// body carried one.
    #[error("{endpoint}: HTTP {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
        message: Option<String>,
    },
    #[error("{endpoint}: malformed response body: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl ApiError {
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Message supplied by the backend, if the error carried one.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            Self::RateLimited { message, .. } | Self::Status { message, .. } => {
                message.as_deref().filter(|m| !m.trim().is_empty())
            }
            _ => None,
        }
    }
}

/// Parse `Retry-After-Ms` or `Retry-After` headers.
///
/// Only values in `(0, 120s]` are accepted; anything else is treated as
/// absent so a hostile header cannot stall the client.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    const MAX: Duration = Duration::from_secs(120);

    if let Some(val) = headers.get("retry-after-ms")
        && let Ok(s) = val.to_str()
        && let Ok(ms) = s.trim().parse::<f64>()
        && ms.is_finite()
        && ms > 0.0
    {
        let duration = Duration::from_secs_f64(ms / 1000.0);
        if duration <= MAX {
            return Some(duration);
        }
    }

    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        let duration = Duration::from_secs(secs);
        if duration > Duration::ZERO && duration <= MAX {
            return Some(duration);
        }
    }

    None
}
