//! Rendering seam between the engine and whatever displays it.
//!
//! The engine decides *what* changed; a [`View`] decides how it looks. The
//! terminal binary prints; tests use `RecordingView` (behind the
//! `test-util` feature) to assert on the sequence of calls.

use std::time::Duration;

use lectern_types::{Category, ChatMessage, CurrentView, Percent, Video};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

pub trait View: Send + Sync {
    fn render_message(&self, message: &ChatMessage);
    /// Drop every rendered chat message.
    fn clear_messages(&self);
    fn show_chat_empty(&self);
    fn set_chat_busy(&self, busy: bool);
    /// Disable sending for `duration`.
    fn cooldown_send(&self, duration: Duration);

    /// `changed` is true when `percent` differs from what was last shown for
    /// `category`.
    fn render_progress(&self, category: &Category, percent: Percent, changed: bool);
    fn render_recent(&self, videos: &[Video]);
    fn render_category(&self, category: &Category, videos: &[Video]);
    fn render_favorites(&self, videos: &[Video]);
    fn render_video(&self, video: &Video, watched: bool, favorite: bool);
    fn show_view(&self, view: &CurrentView);

    fn notify(&self, level: NoticeLevel, text: &str);
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::{RecordingView, ViewCall};

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    use lectern_types::{Category, ChatMessage, CurrentView, Percent, Video};

    use super::{NoticeLevel, View};

    /// One call made against a [`RecordingView`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum ViewCall {
        Message(ChatMessage),
        ClearMessages,
        ChatEmpty,
        ChatBusy(bool),
        Cooldown(Duration),
        Progress {
            category: Category,
            percent: Percent,
            changed: bool,
        },
        Recent(Vec<Video>),
        Category(Category, Vec<Video>),
        Favorites(Vec<Video>),
        Video {
            video: Video,
            watched: bool,
            favorite: bool,
        },
        ShowView(CurrentView),
        Notify(NoticeLevel, String),
    }

    /// A [`View`] that records every call.
    #[derive(Debug, Default)]
    pub struct RecordingView {
        calls: Mutex<Vec<ViewCall>>,
    }

    impl RecordingView {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        fn push(&self, call: ViewCall) {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(call);
        }

        #[must_use]
        pub fn calls(&self) -> Vec<ViewCall> {
            self.calls
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Drain recorded calls.
        pub fn take(&self) -> Vec<ViewCall> {
            std::mem::take(&mut *self.calls.lock().unwrap_or_else(PoisonError::into_inner))
        }

        #[must_use]
        pub fn messages(&self) -> Vec<ChatMessage> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    ViewCall::Message(message) => Some(message),
                    _ => None,
                })
                .collect()
        }

        /// `(category, percent, changed)` for every progress render, in order.
        #[must_use]
        pub fn progress(&self) -> Vec<(Category, u8, bool)> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    ViewCall::Progress {
                        category,
                        percent,
                        changed,
                    } => Some((category, percent.value(), changed)),
                    _ => None,
                })
                .collect()
        }

        #[must_use]
        pub fn notices(&self) -> Vec<(NoticeLevel, String)> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    ViewCall::Notify(level, text) => Some((level, text)),
                    _ => None,
                })
                .collect()
        }
    }

    impl View for RecordingView {
        fn render_message(&self, message: &ChatMessage) {
            self.push(ViewCall::Message(message.clone()));
        }

        fn clear_messages(&self) {
            self.push(ViewCall::ClearMessages);
        }

        fn show_chat_empty(&self) {
            self.push(ViewCall::ChatEmpty);
        }

        fn set_chat_busy(&self, busy: bool) {
            self.push(ViewCall::ChatBusy(busy));
        }

        fn cooldown_send(&self, duration: Duration) {
            self.push(ViewCall::Cooldown(duration));
        }

        fn render_progress(&self, category: &Category, percent: Percent, changed: bool) {
            self.push(ViewCall::Progress {
                category: category.clone(),
                percent,
                changed,
            });
        }

        fn render_recent(&self, videos: &[Video]) {
            self.push(ViewCall::Recent(videos.to_vec()));
        }

        fn render_category(&self, category: &Category, videos: &[Video]) {
            self.push(ViewCall::Category(category.clone(), videos.to_vec()));
        }

        fn render_favorites(&self, videos: &[Video]) {
            self.push(ViewCall::Favorites(videos.to_vec()));
        }

        fn render_video(&self, video: &Video, watched: bool, favorite: bool) {
            self.push(ViewCall::Video {
                video: video.clone(),
                watched,
                favorite,
            });
        }

        fn show_view(&self, view: &CurrentView) {
            self.push(ViewCall::ShowView(view.clone()));
        }

        fn notify(&self, level: NoticeLevel, text: &str) {
            self.push(ViewCall::Notify(level, text.to_string()));
        }
    }
}
