//! One push stream: a tokio task owning a websocket and its reconnect loop.

use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use lectern_types::{ClientFrame, ProgressPush, VideoPush};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use url::Url;

use crate::backoff::ReconnectPolicy;
use crate::{StreamKind, StreamState, SyncEvent};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type SocketSink = SplitSink<Socket, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Reconnect,
    Shutdown,
}

enum SessionEnd {
    /// Remote close, read error, or write error.
    Dropped,
    /// Shutdown requested or the owner went away.
    Stop,
}

pub(crate) struct StreamTask {
    pub kind: StreamKind,
    pub url: Url,
    pub policy: ReconnectPolicy,
    pub state: watch::Sender<StreamState>,
    pub events: mpsc::Sender<SyncEvent>,
    pub outbound: mpsc::UnboundedReceiver<ClientFrame>,
    pub control: mpsc::UnboundedReceiver<Control>,
}

impl StreamTask {
    pub(crate) async fn run(mut self) {
        let kind = self.kind;
        let mut attempt: u32 = 0;

        'outer: loop {
            self.state.send_replace(StreamState::Connecting);
            tracing::debug!(stream = %kind, url = %self.url, attempt, "Connecting push stream");

            let connected = tokio::select! {
                result = tokio::time::timeout(CONNECT_TIMEOUT, connect_async(self.url.as_str())) => result,
                ctrl = self.control.recv() => match ctrl {
                    Some(Control::Reconnect) => {
                        attempt = 0;
                        continue 'outer;
                    }
                    Some(Control::Shutdown) | None => break 'outer,
                },
            };

            match connected {
                Ok(Ok((socket, _response))) => {
                    attempt = 0;
                    match self.session(socket).await {
                        SessionEnd::Stop => break 'outer,
                        SessionEnd::Dropped => {
                            if self.events.send(SyncEvent::Disconnected(kind)).await.is_err() {
                                break 'outer;
                            }
                        }
                    }
                }
                Ok(Err(e)) => tracing::warn!(stream = %kind, "Push stream connect failed: {e}"),
                Err(_) => tracing::warn!(stream = %kind, "Push stream connect timed out"),
            }

            attempt = attempt.saturating_add(1);
            if let Some(delay) = self.policy.delay_for(attempt) {
                self.state.send_replace(StreamState::Backoff { attempt });
                tracing::info!(
                    stream = %kind,
                    attempt,
                    max_attempts = self.policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting push stream after delay"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    ctrl = self.control.recv() => match ctrl {
                        Some(Control::Reconnect) => attempt = 0,
                        Some(Control::Shutdown) | None => break 'outer,
                    },
                }
            } else {
                self.state.send_replace(StreamState::Exhausted);
                tracing::warn!(
                    stream = %kind,
                    attempts = self.policy.max_attempts,
                    "Push stream gave up reconnecting; waiting for reconnect trigger"
                );
                match self.control.recv().await {
                    Some(Control::Reconnect) => attempt = 0,
                    Some(Control::Shutdown) | None => break 'outer,
                }
            }
        }

        self.state.send_replace(StreamState::Closed);
        tracing::debug!(stream = %kind, "Push stream task stopped");
    }

    async fn session(&mut self, socket: Socket) -> SessionEnd {
        let kind = self.kind;
        let (mut sink, mut source) = socket.split();

        // Frames queued while disconnected are stale hints; drop them.
        while self.outbound.try_recv().is_ok() {}

        self.state.send_replace(StreamState::Open);
        tracing::info!(stream = %kind, "Push stream open");
        if self.events.send(SyncEvent::Connected(kind)).await.is_err() {
            let _ = sink.close().await;
            return SessionEnd::Stop;
        }

        if kind == StreamKind::Progress
            && let Err(e) = send_frame(&mut sink, &ClientFrame::RequestProgress).await
        {
            tracing::warn!(stream = %kind, "Failed to request progress snapshot: {e}");
            return SessionEnd::Dropped;
        }

        loop {
            tokio::select! {
                incoming = source.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = decode_event(kind, &text)
                            && self.events.send(event).await.is_err()
                        {
                            let _ = sink.close().await;
                            return SessionEnd::Stop;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(stream = %kind, ?frame, "Push stream closed by server");
                        return SessionEnd::Dropped;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(stream = %kind, "Push stream read error: {e}");
                        return SessionEnd::Dropped;
                    }
                    None => return SessionEnd::Dropped,
                },
                frame = self.outbound.recv() => match frame {
                    Some(frame) => {
                        if let Err(e) = send_frame(&mut sink, &frame).await {
                            tracing::warn!(stream = %kind, "Push stream write error: {e}");
                            return SessionEnd::Dropped;
                        }
                    }
                    None => {
                        let _ = sink.close().await;
                        return SessionEnd::Stop;
                    }
                },
                ctrl = self.control.recv() => match ctrl {
                    // Already connected; nothing to do.
                    Some(Control::Reconnect) => {}
                    Some(Control::Shutdown) | None => {
                        let _ = sink.close().await;
                        return SessionEnd::Stop;
                    }
                },
            }
        }
    }
}

async fn send_frame(sink: &mut SocketSink, frame: &ClientFrame) -> Result<(), String> {
    let text = serde_json::to_string(frame).map_err(|e| e.to_string())?;
    sink.send(Message::Text(text)).await.map_err(|e| e.to_string())
}

/// Decode an inbound frame for `kind`. Unknown types and malformed frames
/// yield `None`.
pub(crate) fn decode_event(kind: StreamKind, text: &str) -> Option<SyncEvent> {
    match kind {
        StreamKind::Videos => match serde_json::from_str::<VideoPush>(text) {
            Ok(VideoPush::Unknown) => {
                tracing::debug!(stream = %kind, "Ignoring unknown push frame type");
                None
            }
            Ok(push) => Some(SyncEvent::Video(push)),
            Err(e) => {
                tracing::warn!(stream = %kind, "Ignoring malformed push frame: {e}");
                None
            }
        },
        StreamKind::Progress => match serde_json::from_str::<ProgressPush>(text) {
            Ok(ProgressPush::Unknown) => {
                tracing::debug!(stream = %kind, "Ignoring unknown push frame type");
                None
            }
            Ok(push) => Some(SyncEvent::Progress(push)),
            Err(e) => {
                tracing::warn!(stream = %kind, "Ignoring malformed push frame: {e}");
                None
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_routes_by_stream() {
        let event = decode_event(
            StreamKind::Progress,
            r#"{"type": "progress_updated", "progress": {"js": 40}}"#,
        );
        assert!(matches!(
            event,
            Some(SyncEvent::Progress(ProgressPush::ProgressUpdated { .. }))
        ));

        // A progress frame on the video stream is not a video frame.
        let event = decode_event(
            StreamKind::Videos,
            r#"{"type": "progress_updated", "progress": {"js": 40}}"#,
        );
        assert!(event.is_none());
    }

    #[test]
    fn decode_drops_malformed() {
        assert!(decode_event(StreamKind::Videos, "not json").is_none());
        assert!(decode_event(StreamKind::Videos, r#"{"no_type": 1}"#).is_none());
        assert!(
            decode_event(StreamKind::Videos, r#"{"type": "video_added"}"#).is_none(),
            "video_added without a video is malformed"
        );
    }
}
