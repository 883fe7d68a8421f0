//! Client facade.
//!
//! [`Client`] is the entry point for UI events (open a view, mark a video
//! watched, toggle a favorite, send a chat message) and for push events from
//! the sync channel. Both paths fold into the same [`ClientState`] and render
//! through the same [`View`].

use std::sync::Arc;

use lectern_api::{ApiClient, ApiError};
use lectern_config::ClientSettings;
use lectern_sync::{ReconnectPolicy, StreamKind, SyncChannel, SyncError, SyncEvent};
use lectern_types::{Category, CurrentView, ProgressPush, Video, VideoId, VideoPush};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::chat::{ChatSession, SendOutcome};
use crate::progress::ProgressReconciler;
use crate::state::ClientState;
use crate::store::LocalStore;
use crate::view::{NoticeLevel, View};

/// Title shown for a video that is not in the loaded catalog.
const PLACEHOLDER_TITLE: &str = "Video";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

pub struct Client {
    api: ApiClient,
    state: Arc<ClientState>,
    view: Arc<dyn View>,
    reconciler: ProgressReconciler,
    chat: ChatSession,
    sync: Option<SyncChannel>,
}

impl Client {
    pub fn new(
        settings: &ClientSettings,
        store: Arc<dyn LocalStore>,
        view: Arc<dyn View>,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::from_settings(settings)?;
        let state = Arc::new(ClientState::load(store));
        let chat = ChatSession::new(
            api.clone(),
            Arc::clone(&state),
            Arc::clone(&view),
            settings.rate_limit_cooldown,
        );
        Ok(Self {
            api,
            state,
            view,
            reconciler: ProgressReconciler::new(settings.categories.clone()),
            chat,
            sync: None,
        })
    }

    /// Start the push channel when enabled in `settings`. The returned
    /// receiver carries events for [`Client::handle_sync_event`].
    pub fn start_sync(
        &mut self,
        settings: &ClientSettings,
    ) -> Result<Option<mpsc::Receiver<SyncEvent>>, ClientError> {
        if !settings.sync.enabled {
            tracing::info!("Push channel disabled; using REST only");
            return Ok(None);
        }
        let policy = ReconnectPolicy::from_settings(&settings.sync);
        let (channel, events) = SyncChannel::start(&settings.base_url, policy)?;
        self.attach_sync(channel);
        Ok(Some(events))
    }

    pub fn attach_sync(&mut self, channel: SyncChannel) {
        self.sync = Some(channel);
    }

    #[must_use]
    pub fn state(&self) -> &Arc<ClientState> {
        &self.state
    }

    #[must_use]
    pub fn chat(&self) -> &ChatSession {
        &self.chat
    }

    #[must_use]
    pub fn sync(&self) -> Option<&SyncChannel> {
        self.sync.as_ref()
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        self.reconciler.categories()
    }

    fn render_local_progress(&self) {
        let local = self.state.local_progress(self.reconciler.categories());
        self.reconciler.render_local(&local, self.view.as_ref());
    }

    /// Initial load: catalog over REST, then server progress.
    pub async fn bootstrap(&self) {
        self.refresh_catalog_rest().await;
        self.refresh_progress().await;
    }

    /// Reload the recent list and every category over REST. A failed load
    /// keeps whatever was cached.
    pub async fn refresh_catalog_rest(&self) {
        match self.api.recent_videos().await {
            Ok(videos) => self.state.replace_recent(videos),
            Err(e) => tracing::warn!("Failed to load recent videos: {e}"),
        }
        for category in self.reconciler.categories() {
            match self.api.category_videos(category).await {
                Ok(videos) => self.state.replace_category(category.clone(), videos),
                Err(e) => tracing::warn!(category = %category, "Failed to load category: {e}"),
            }
        }
        self.rerender_lists();
        self.render_local_progress();
    }

    /// Ask the server for progress and render it merged with local progress.
    /// Falls back to local progress when the request fails.
    pub async fn refresh_progress(&self) {
        let watched = self.state.watched();
        match self.api.user_progress(&watched).await {
            Ok(report) => {
                let local = self.state.local_progress(self.reconciler.categories());
                self.reconciler
                    .render_server(&report.progress, &local, self.view.as_ref());
            }
            Err(e) => {
                tracing::warn!("Failed to load server progress: {e}");
                self.render_local_progress();
            }
        }
    }

    /// Re-render whichever list is on screen.
    fn rerender_lists(&self) {
        match self.state.current_view() {
            CurrentView::Main => self.view.render_recent(&self.state.recent()),
            CurrentView::Category(category) => self
                .view
                .render_category(&category, &self.state.category(&category)),
            CurrentView::Favorites => self.view.render_favorites(&self.state.favorite_videos()),
            CurrentView::Video(id) => self.render_video(&id),
            CurrentView::Chats | CurrentView::Community => {}
        }
    }

    fn render_video(&self, id: &VideoId) {
        let video = self
            .state
            .find_video(id)
            .unwrap_or_else(|| Video::new(id.clone(), PLACEHOLDER_TITLE));
        self.view
            .render_video(&video, self.state.is_watched(id), self.state.is_favorite(id));
    }

    /// Fold one push event into state and the view.
    pub async fn handle_sync_event(&self, event: SyncEvent) {
        match event {
            SyncEvent::Connected(kind) => tracing::info!(stream = %kind, "Push stream connected"),
            SyncEvent::Disconnected(kind) => {
                tracing::info!(stream = %kind, "Push stream disconnected");
            }
            SyncEvent::Video(push) => self.handle_video_push(push).await,
            SyncEvent::Progress(push) => self.handle_progress_push(&push),
        }
    }

    async fn handle_video_push(&self, push: VideoPush) {
        match push {
            VideoPush::RecentVideos { videos } => {
                let loaded = !videos.is_empty();
                self.state.replace_recent(videos);
                if self.state.current_view() == CurrentView::Main {
                    self.view.render_recent(&self.state.recent());
                }
                if loaded {
                    self.view.notify(NoticeLevel::Success, "New videos loaded");
                }
            }
            VideoPush::CategoryVideos { category, videos } => {
                self.state.replace_category(category.clone(), videos);
                if self.state.current_view() == CurrentView::Category(category.clone()) {
                    self.view
                        .render_category(&category, &self.state.category(&category));
                }
                self.render_local_progress();
            }
            VideoPush::VideoAdded { video } => {
                self.view
                    .notify(NoticeLevel::Info, &format!("New video: {}", video.title));
                self.refresh_catalog().await;
            }
            VideoPush::VideoUpdated { video } => {
                tracing::debug!(video_id = %video.id, "Video updated");
                self.refresh_catalog().await;
            }
            VideoPush::VideoDeleted { video_id } => {
                tracing::debug!(video_id = %video_id, "Video deleted");
                self.view.notify(NoticeLevel::Warning, "Video removed");
                self.refresh_catalog().await;
            }
            VideoPush::Unknown => {}
        }
    }

    fn handle_progress_push(&self, push: &ProgressPush) {
        let Some(server) = push.progress() else {
            return;
        };
        let local = self.state.local_progress(self.reconciler.categories());
        self.reconciler
            .render_server(server, &local, self.view.as_ref());
    }

    /// Refresh the catalog over the video stream when it is open, otherwise
    /// over REST.
    async fn refresh_catalog(&self) {
        if let Some(sync) = &self.sync
            && sync.request_catalog_refresh(self.reconciler.categories())
        {
            return;
        }
        self.refresh_catalog_rest().await;
    }

    /// Mark `id` watched. Returns `false` when it already was.
    ///
    /// Local state and progress update first; the push hint and the REST
    /// write follow. A failed REST write is logged and not rolled back.
    pub async fn mark_watched(&self, id: &VideoId) -> bool {
        if !self.state.mark_watched(id) {
            tracing::debug!(video_id = %id, "Video already watched");
            return false;
        }
        self.render_local_progress();
        if self.state.current_view() == CurrentView::Video(id.clone()) {
            self.render_video(id);
        }
        if let Some(sync) = &self.sync {
            sync.notify_video_watched(id);
        }
        if let Err(e) = self.api.mark_watched(id).await {
            tracing::warn!(video_id = %id, "Server did not record watched video: {e}");
        }
        true
    }

    /// Toggle favorite membership. Returns the new membership.
    pub fn toggle_favorite(&self, id: &VideoId) -> bool {
        let favorite = self.state.toggle_favorite(id);
        match self.state.current_view() {
            CurrentView::Favorites => self.view.render_favorites(&self.state.favorite_videos()),
            CurrentView::Video(current) if &current == id => self.render_video(id),
            _ => {}
        }
        favorite
    }

    /// Switch to `target` and render it.
    pub async fn open_view(&self, target: CurrentView) {
        self.state.set_view(target.clone());
        self.view.show_view(&target);
        match &target {
            CurrentView::Main => self.view.render_recent(&self.state.recent()),
            CurrentView::Category(category) => {
                match self.api.category_videos(category).await {
                    Ok(videos) => self.state.replace_category(category.clone(), videos),
                    Err(e) => {
                        tracing::warn!(category = %category, "Using cached category: {e}");
                    }
                }
                self.view
                    .render_category(category, &self.state.category(category));
            }
            CurrentView::Favorites => self.view.render_favorites(&self.state.favorite_videos()),
            CurrentView::Chats => {
                // Failures already render the empty state.
                let _ = self.chat.load_history().await;
            }
            CurrentView::Video(id) => self.render_video(id),
            CurrentView::Community => {}
        }
    }

    pub async fn send_chat(&self, text: &str) -> SendOutcome {
        self.chat.send(text).await
    }

    /// The reconnect trigger: reconnect every push stream that is not open.
    pub fn reconnect(&self) {
        match &self.sync {
            Some(sync) => sync.reconnect(),
            None => tracing::debug!("Reconnect ignored; push channel not running"),
        }
    }

    #[must_use]
    pub fn is_stream_open(&self, kind: StreamKind) -> bool {
        self.sync.as_ref().is_some_and(|s| s.state(kind).is_open())
    }

    pub async fn shutdown(self) {
        if let Some(sync) = self.sync {
            sync.shutdown().await;
        }
    }
}
