//! Server push channel.
//!
//! Two independent websocket streams carry live updates: `/ws/videos/` for
//! catalog changes and `/ws/progress/` for the user's progress. Each stream
//! runs in its own tokio task with its own reconnect loop (see
//! [`backoff::ReconnectPolicy`]) and publishes its [`StreamState`] through a
//! watch channel. Decoded frames and connect/disconnect transitions arrive on
//! the single [`SyncEvent`] receiver returned by [`SyncChannel::start`].
//!
//! Everything the channel delivers can also be fetched over REST, so callers
//! treat it as optional: a stream that never connects costs nothing but
//! latency.

pub mod backoff;
mod stream;

use std::fmt;

use lectern_types::{Category, ClientFrame, ProgressPush, VideoId, VideoPush};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

pub use backoff::ReconnectPolicy;

use crate::stream::{Control, StreamTask};

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Videos,
    Progress,
}

impl StreamKind {
    pub const ALL: [Self; 2] = [Self::Videos, Self::Progress];

    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Videos => "ws/videos/",
            Self::Progress => "ws/progress/",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Videos => "videos",
            Self::Progress => "progress",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Connecting,
    Open,
    /// Waiting before reconnect attempt `attempt`.
    Backoff {
        attempt: u32,
    },
    /// Reconnect budget spent; idle until [`SyncChannel::reconnect`].
    Exhausted,
    Closed,
}

impl StreamState {
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Connected(StreamKind),
    Disconnected(StreamKind),
    Video(VideoPush),
    Progress(ProgressPush),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("server url {0} cannot be mapped to a websocket url")]
    Scheme(Url),
    #[error("invalid push url: {0}")]
    Url(#[from] url::ParseError),
}

/// Websocket URL for `kind` under `base` (`http` → `ws`, `https` → `wss`).
pub fn push_url(base: &Url, kind: StreamKind) -> Result<Url, SyncError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        _ => return Err(SyncError::Scheme(base.clone())),
    };
    url.set_scheme(scheme)
        .map_err(|()| SyncError::Scheme(base.clone()))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.join(kind.path())?)
}

struct StreamHandle {
    state: watch::Receiver<StreamState>,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    control: mpsc::UnboundedSender<Control>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    fn spawn(
        kind: StreamKind,
        url: Url,
        policy: ReconnectPolicy,
        events: mpsc::Sender<SyncEvent>,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(StreamState::Connecting);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(
            StreamTask {
                kind,
                url,
                policy,
                state: state_tx,
                events,
                outbound: outbound_rx,
                control: control_rx,
            }
            .run(),
        );

        Self {
            state: state_rx,
            outbound: outbound_tx,
            control: control_tx,
            task,
        }
    }

    fn is_open(&self) -> bool {
        self.state.borrow().is_open()
    }

    /// Queue `frames` only while the stream is open.
    fn send_if_open(&self, frames: impl IntoIterator<Item = ClientFrame>) -> bool {
        if !self.is_open() {
            return false;
        }
        frames
            .into_iter()
            .all(|frame| self.outbound.send(frame).is_ok())
    }
}

/// Handle to both push streams.
///
/// Dropping the handle stops the stream tasks at their next wakeup;
/// [`SyncChannel::shutdown`] stops them and waits.
pub struct SyncChannel {
    videos: StreamHandle,
    progress: StreamHandle,
}

impl SyncChannel {
    /// Spawn both stream tasks. Must be called from within a tokio runtime.
    pub fn start(
        base_url: &Url,
        policy: ReconnectPolicy,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>), SyncError> {
        let videos_url = push_url(base_url, StreamKind::Videos)?;
        let progress_url = push_url(base_url, StreamKind::Progress)?;
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let channel = Self {
            videos: StreamHandle::spawn(StreamKind::Videos, videos_url, policy, events_tx.clone()),
            progress: StreamHandle::spawn(StreamKind::Progress, progress_url, policy, events_tx),
        };
        Ok((channel, events_rx))
    }

    fn handle(&self, kind: StreamKind) -> &StreamHandle {
        match kind {
            StreamKind::Videos => &self.videos,
            StreamKind::Progress => &self.progress,
        }
    }

    #[must_use]
    pub fn state(&self, kind: StreamKind) -> StreamState {
        *self.handle(kind).state.borrow()
    }

    /// Receiver that wakes on the next state change after this call.
    #[must_use]
    pub fn subscribe(&self, kind: StreamKind) -> watch::Receiver<StreamState> {
        let mut rx = self.handle(kind).state.clone();
        rx.borrow_and_update();
        rx
    }

    /// Reconnect every stream that is not currently open, resetting its
    /// attempt counter. Open streams are left alone.
    pub fn reconnect(&self) {
        for kind in StreamKind::ALL {
            let handle = self.handle(kind);
            if handle.is_open() {
                continue;
            }
            tracing::info!(stream = %kind, "Reconnect requested");
            let _ = handle.control.send(Control::Reconnect);
        }
    }

    /// Tell other viewers that `video` was watched. Dropped unless the
    /// progress stream is open.
    pub fn notify_video_watched(&self, video: &VideoId) -> bool {
        let sent = self.progress.send_if_open([ClientFrame::MarkWatched {
            video_id: video.clone(),
        }]);
        if !sent {
            tracing::debug!(video_id = %video, "Progress stream not open; watch hint dropped");
        }
        sent
    }

    /// Ask the video stream for the recent list and each category's list.
    /// Returns `false` when the stream is not open and nothing was sent.
    pub fn request_catalog_refresh(&self, categories: &[Category]) -> bool {
        let frames = std::iter::once(ClientFrame::RequestRecent).chain(
            categories
                .iter()
                .cloned()
                .map(|category| ClientFrame::RequestVideos { category }),
        );
        self.videos.send_if_open(frames)
    }

    /// Close both streams and wait for their tasks to finish.
    pub async fn shutdown(self) {
        for handle in [&self.videos, &self.progress] {
            let _ = handle.control.send(Control::Shutdown);
        }
        for (kind, handle) in [
            (StreamKind::Videos, self.videos),
            (StreamKind::Progress, self.progress),
        ] {
            if let Err(e) = handle.task.await {
                tracing::warn!(stream = %kind, "Push stream task ended abnormally: {e}");
            }
        }
    }
}
