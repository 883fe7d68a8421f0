//! Shared client state.
//!
//! [`ClientState`] is the single owner of everything the client persists
//! (session id, watched set, favorite set) plus the in-memory catalog and the
//! current view. It is shared as `Arc<ClientState>` between the chat session,
//! the client facade, and the push-event loop.
//!
//! Every mutation takes the inner `std::sync::Mutex`, updates memory, and
//! persists before releasing it. The lock is never held across an `.await`,
//! so two async operations can interleave but never observe a half-applied
//! mutation.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use lectern_types::{
    Catalog, Category, CurrentView, ProgressMap, SessionId, Video, VideoId, calculate_progress,
};

use crate::store::{FAVORITES_KEY, LocalStore, SESSION_KEY, WATCHED_KEY};

/// Insertion-ordered set of video ids.
///
/// A removed id keeps its slot, so removing and re-inserting it restores
/// the original order.
#[derive(Debug, Clone, Default)]
pub struct IdSet {
    slots: Vec<VideoId>,
    members: HashSet<VideoId>,
}

impl IdSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the persisted JSON array. Numbers are accepted and stringified;
    /// duplicates collapse to their first occurrence.
    fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let ids: Vec<VideoId> = serde_json::from_str(raw)?;
        Ok(ids.into_iter().collect())
    }

    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.iter().collect::<Vec<_>>())
    }

    /// Returns `false` when `id` was already present.
    pub fn insert(&mut self, id: VideoId) -> bool {
        if self.members.contains(&id) {
            return false;
        }
        if !self.slots.contains(&id) {
            self.slots.push(id.clone());
        }
        self.members.insert(id);
        true
    }

    pub fn remove(&mut self, id: &VideoId) -> bool {
        self.members.remove(id)
    }

    #[must_use]
    pub fn contains(&self, id: &VideoId) -> bool {
        self.members.contains(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VideoId> {
        self.slots.iter().filter(|id| self.members.contains(*id))
    }
}

impl PartialEq for IdSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for IdSet {}

impl FromIterator<VideoId> for IdSet {
    fn from_iter<I: IntoIterator<Item = VideoId>>(iter: I) -> Self {
        let mut set = Self::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// `session_<unix millis>_<9 base36 chars>`.
fn generate_session_id() -> SessionId {
    const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let mut bits = rand::random::<u64>();
    let mut suffix = String::with_capacity(9);
    for _ in 0..9 {
        suffix.push(ALPHABET[(bits % 36) as usize] as char);
        bits /= 36;
    }
    SessionId::new(format!("session_{millis}_{suffix}"))
}

#[derive(Debug, Default)]
struct Inner {
    session: Option<SessionId>,
    watched: IdSet,
    favorites: IdSet,
    catalog: Catalog,
    view: CurrentView,
}

pub struct ClientState {
    store: Arc<dyn LocalStore>,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("inner", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl ClientState {
    /// Load persisted state from `store`. Unparseable sets are logged and
    /// start empty.
    pub fn load(store: Arc<dyn LocalStore>) -> Self {
        let session = store
            .get(SESSION_KEY)
            .filter(|raw| !raw.trim().is_empty())
            .map(SessionId::new);
        let watched = Self::load_set(store.as_ref(), WATCHED_KEY);
        let favorites = Self::load_set(store.as_ref(), FAVORITES_KEY);

        tracing::debug!(
            watched = watched.len(),
            favorites = favorites.len(),
            has_session = session.is_some(),
            "Loaded client state"
        );

        Self {
            store,
            inner: Mutex::new(Inner {
                session,
                watched,
                favorites,
                ..Inner::default()
            }),
        }
    }

    fn load_set(store: &dyn LocalStore, key: &str) -> IdSet {
        let Some(raw) = store.get(key) else {
            return IdSet::new();
        };
        IdSet::from_json(&raw).unwrap_or_else(|e| {
            tracing::warn!(key, "Ignoring unreadable stored id set: {e}");
            IdSet::new()
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, key: &str, value: Result<String, serde_json::Error>) {
        let result = match value {
            Ok(value) => self.store.set(key, value),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = result {
            tracing::warn!(key, "Local state not persisted: {e}");
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// The current session id, creating and persisting one if absent.
    pub fn session_id(&self) -> SessionId {
        let mut inner = self.lock();
        if let Some(session) = &inner.session {
            return session.clone();
        }
        let session = generate_session_id();
        tracing::info!(session_id = %session, "Created chat session");
        self.persist(SESSION_KEY, Ok(session.as_str().to_string()));
        inner.session = Some(session.clone());
        session
    }

    #[must_use]
    pub fn current_session(&self) -> Option<SessionId> {
        self.lock().session.clone()
    }

    /// Adopt a server-issued session id. Returns `true` when it replaced a
    /// different value.
    pub fn adopt_session(&self, session: SessionId) -> bool {
        if session.as_str().trim().is_empty() {
            return false;
        }
        let mut inner = self.lock();
        if inner.session.as_ref() == Some(&session) {
            return false;
        }
        tracing::info!(session_id = %session, "Adopting server session id");
        self.persist(SESSION_KEY, Ok(session.as_str().to_string()));
        inner.session = Some(session);
        true
    }

    // ------------------------------------------------------------------
    // Watched / favorites
    // ------------------------------------------------------------------

    /// Add `id` to the watched set. Returns `false` (and does nothing) when
    /// it was already there.
    pub fn mark_watched(&self, id: &VideoId) -> bool {
        let mut inner = self.lock();
        if !inner.watched.insert(id.clone()) {
            return false;
        }
        self.persist(WATCHED_KEY, inner.watched.to_json());
        true
    }

    #[must_use]
    pub fn is_watched(&self, id: &VideoId) -> bool {
        self.lock().watched.contains(id)
    }

    #[must_use]
    pub fn watched(&self) -> Vec<VideoId> {
        self.lock().watched.iter().cloned().collect()
    }

    /// Flip favorite membership. Returns the new membership.
    pub fn toggle_favorite(&self, id: &VideoId) -> bool {
        let mut inner = self.lock();
        let now_favorite = if inner.favorites.remove(id) {
            false
        } else {
            inner.favorites.insert(id.clone());
            true
        };
        self.persist(FAVORITES_KEY, inner.favorites.to_json());
        now_favorite
    }

    #[must_use]
    pub fn is_favorite(&self, id: &VideoId) -> bool {
        self.lock().favorites.contains(id)
    }

    #[must_use]
    pub fn favorites(&self) -> Vec<VideoId> {
        self.lock().favorites.iter().cloned().collect()
    }

    // ------------------------------------------------------------------
    // Catalog
    // ------------------------------------------------------------------

    pub fn replace_category(&self, category: Category, videos: Vec<Video>) {
        self.lock().catalog.replace_category(category, videos);
    }

    pub fn replace_recent(&self, videos: Vec<Video>) {
        self.lock().catalog.replace_recent(videos);
    }

    #[must_use]
    pub fn recent(&self) -> Vec<Video> {
        self.lock().catalog.recent().to_vec()
    }

    #[must_use]
    pub fn category(&self, category: &Category) -> Vec<Video> {
        self.lock().catalog.category(category).to_vec()
    }

    #[must_use]
    pub fn find_video(&self, id: &VideoId) -> Option<Video> {
        self.lock().catalog.find(id).cloned()
    }

    /// Favorite videos that are present in the loaded catalog, in favorite
    /// order.
    #[must_use]
    pub fn favorite_videos(&self) -> Vec<Video> {
        let inner = self.lock();
        inner
            .favorites
            .iter()
            .filter_map(|id| inner.catalog.find(id).cloned())
            .collect()
    }

    /// Watched-set-derived progress for each of `categories`.
    #[must_use]
    pub fn local_progress(&self, categories: &[Category]) -> ProgressMap {
        let inner = self.lock();
        categories
            .iter()
            .map(|category| {
                let percent = calculate_progress(inner.catalog.category(category), |id| {
                    inner.watched.contains(id)
                });
                (category.clone(), percent)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // View
    // ------------------------------------------------------------------

    #[must_use]
    pub fn current_view(&self) -> CurrentView {
        self.lock().view.clone()
    }

    pub fn set_view(&self, view: CurrentView) {
        self.lock().view = view;
    }
}
