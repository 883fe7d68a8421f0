//! Shared test utilities and fixtures
//!
//! Common infrastructure for integration tests: settings pointed at a mock
//! backend, catalog fixtures, and an in-process push server.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use lectern_config::{ClientSettings, SyncSettings};
use lectern_engine::{Client, FileStore, LocalStore, MemoryStore, RecordingView, StreamKind};
use lectern_sync::{ReconnectPolicy, SyncChannel, SyncEvent};
use lectern_types::Category;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn settings(server: &MockServer) -> ClientSettings {
    ClientSettings {
        base_url: Url::parse(&server.uri()).unwrap(),
        csrf_token: Some("test-csrf".to_string()),
        request_timeout: Duration::from_secs(5),
        rate_limit_cooldown: Duration::from_millis(5),
        sync: SyncSettings {
            enabled: false,
            reconnect_interval: Duration::from_millis(20),
            max_reconnect_attempts: 2,
        },
        categories: vec![Category::from("html"), Category::from("js")],
        storage_path: None,
    }
}

pub fn memory_client(server: &MockServer) -> (Client, Arc<RecordingView>) {
    client_with_store(server, Arc::new(MemoryStore::new()))
}

pub fn file_client(server: &MockServer, state_file: &Path) -> (Client, Arc<RecordingView>) {
    let (store, error) = FileStore::open(state_file);
    assert!(error.is_none(), "unexpected store error: {error:?}");
    client_with_store(server, Arc::new(store))
}

pub fn client_with_store(
    server: &MockServer,
    store: Arc<dyn LocalStore>,
) -> (Client, Arc<RecordingView>) {
    let view = Arc::new(RecordingView::new());
    let client = Client::new(&settings(server), store, view.clone()).unwrap();
    (client, view)
}

/// Mount the recent list and both categories: html has videos 1 and 2, js
/// has video 3.
pub async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/videos/recent/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 3, "title": "Closures"},
            {"id": 1, "title": "Tags"}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos/category/html/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "title": "Tags"},
            {"id": 2, "title": "Forms"}
        ])))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/videos/category/js/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 3, "title": "Closures"}])),
        )
        .mount(server)
        .await;
}

pub async fn mount_providers(server: &MockServer, all: &[&str], current: &str) {
    Mock::given(method("GET"))
        .and(path("/api/provider_info/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"all": all, "current": current})),
        )
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/change_provider/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .mount(server)
        .await;
}

/// Last rendered percent for `category`.
pub fn last_progress(view: &RecordingView, category: &str) -> Option<u8> {
    view.progress()
        .into_iter()
        .rev()
        .find(|(c, _, _)| c.as_str() == category)
        .map(|(_, p, _)| p)
}

/// Frames received from clients as `(path, text)`.
pub type Received = Arc<Mutex<Vec<(String, String)>>>;

/// In-process push server speaking the `/ws/videos/` and `/ws/progress/`
/// protocol. Frames passed to [`PushServer::push`] go to every client
/// connected on that stream.
pub struct PushServer {
    pub addr: SocketAddr,
    received: Received,
    videos: broadcast::Sender<String>,
    progress: broadcast::Sender<String>,
}

impl PushServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received: Received = Arc::default();
        let (videos, _) = broadcast::channel(64);
        let (progress, _) = broadcast::channel(64);

        let server = Self {
            addr,
            received: received.clone(),
            videos: videos.clone(),
            progress: progress.clone(),
        };

        tokio::spawn(async move {
            while let Ok((tcp, _)) = listener.accept().await {
                // Subscribe before the handshake so nothing pushed after the
                // client sees the stream open is missed.
                let videos_rx = videos.subscribe();
                let progress_rx = progress.subscribe();
                let received = received.clone();
                tokio::spawn(async move {
                    let path = Arc::new(Mutex::new(String::new()));
                    let path_slot = path.clone();
                    let callback = move |req: &Request, resp: Response| {
                        *path_slot.lock().unwrap() = req.uri().path().to_string();
                        Ok::<_, ErrorResponse>(resp)
                    };
                    let Ok(ws) = tokio_tungstenite::accept_hdr_async(tcp, callback).await else {
                        return;
                    };
                    let path = path.lock().unwrap().clone();
                    let mut outbound = if path == "/ws/videos/" {
                        videos_rx
                    } else {
                        progress_rx
                    };
                    let (mut sink, mut stream) = ws.split();
                    loop {
                        tokio::select! {
                            frame = outbound.recv() => match frame {
                                Ok(text) => {
                                    if sink.send(Message::Text(text)).await.is_err() {
                                        break;
                                    }
                                }
                                Err(_) => break,
                            },
                            incoming = stream.next() => match incoming {
                                Some(Ok(Message::Text(text))) => {
                                    received.lock().unwrap().push((path.clone(), text));
                                }
                                Some(Ok(_)) => {}
                                _ => break,
                            },
                        }
                    }
                });
            }
        });

        server
    }

    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn push(&self, kind: StreamKind, frame: serde_json::Value) {
        let sender = match kind {
            StreamKind::Videos => &self.videos,
            StreamKind::Progress => &self.progress,
        };
        sender.send(frame.to_string()).unwrap();
    }

    pub fn received(&self) -> Vec<(String, String)> {
        self.received.lock().unwrap().clone()
    }

    /// Wait until a frame matching `pred` has been received.
    pub async fn wait_for_frame(&self, pred: impl Fn(&str, &serde_json::Value) -> bool) {
        tokio::time::timeout(WAIT, async {
            loop {
                let found = self.received().iter().any(|(path, text)| {
                    serde_json::from_str::<serde_json::Value>(text)
                        .is_ok_and(|value| pred(path, &value))
                });
                if found {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for client frame");
    }
}

/// Start a push channel against `push` and attach it to `client`, waiting
/// until both streams are open.
pub async fn attach_push(client: &mut Client, push: &PushServer) -> mpsc::Receiver<SyncEvent> {
    let policy = ReconnectPolicy {
        base_interval: Duration::from_millis(20),
        max_attempts: 2,
    };
    let (channel, events) = SyncChannel::start(&push.base_url(), policy).unwrap();
    for kind in StreamKind::ALL {
        let mut state = channel.subscribe(kind);
        tokio::time::timeout(WAIT, state.wait_for(|s| s.is_open()))
            .await
            .expect("timed out waiting for push stream")
            .unwrap();
    }
    client.attach_sync(channel);
    events
}

/// Receive the next data event, skipping connect/disconnect transitions.
pub async fn next_data_event(events: &mut mpsc::Receiver<SyncEvent>) -> SyncEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            match events.recv().await {
                Some(SyncEvent::Connected(_) | SyncEvent::Disconnected(_)) => {}
                Some(event) => return event,
                None => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for push event")
}
