//! Line-oriented terminal renderer.

use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lectern_engine::{NoticeLevel, View};
use lectern_types::{Category, ChatMessage, CurrentView, Percent, Role, Video};

const BAR_WIDTH: usize = 20;

pub struct TerminalView<W: Write + Send> {
    out: Mutex<W>,
    /// Chat input stays closed until this instant after a rate limit.
    cooldown_until: Mutex<Option<Instant>>,
}

impl TerminalView<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalView<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
            cooldown_until: Mutex::new(None),
        }
    }

    /// Time left before chat input reopens, if a cooldown is running.
    pub fn send_cooldown_remaining(&self) -> Option<Duration> {
        let until = *self
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        until
            .and_then(|until| until.checked_duration_since(Instant::now()))
            .filter(|remaining| !remaining.is_zero())
    }

    fn line(&self, text: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // A closed stdout is not worth crashing over.
        let _ = writeln!(out, "{text}");
        let _ = out.flush();
    }

    fn list(&self, heading: &str, videos: &[Video]) {
        if videos.is_empty() {
            self.line(&format!("{heading}: (no videos)"));
            return;
        }
        self.line(&format!("{heading}:"));
        for video in videos {
            self.line(&format_video(video));
        }
    }
}

pub fn format_message(message: &ChatMessage) -> String {
    let who = match (message.role(), message.is_notice()) {
        (_, true) => "!",
        (Role::User, false) => "you",
        (Role::Assistant, false) => "ai",
    };
    format!(
        "[{}] {who}> {}",
        message.timestamp().format("%H:%M"),
        message.text()
    )
}

pub fn format_video(video: &Video) -> String {
    let mut line = format!("  #{:<5} {}", video.id.as_str(), video.title);
    if let Some(duration) = &video.duration {
        line.push_str(&format!(" ({duration})"));
    }
    line
}

pub fn progress_bar(percent: Percent) -> String {
    let filled = usize::from(percent.value()) * BAR_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        percent.value()
    )
}

#[cfg(test)]
impl TerminalView<Vec<u8>> {
    pub fn output(&self) -> String {
        let out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&out).into_owned()
    }
}

impl<W: Write + Send> View for TerminalView<W> {
    fn render_message(&self, message: &ChatMessage) {
        self.line(&format_message(message));
    }

    fn clear_messages(&self) {
        self.line("-- chat --");
    }

    fn show_chat_empty(&self) {
        self.line("No messages yet. Ask a question to start.");
    }

    fn set_chat_busy(&self, busy: bool) {
        if busy {
            self.line("... waiting for reply");
        }
    }

    fn cooldown_send(&self, duration: Duration) {
        tracing::debug!(cooldown_ms = duration.as_millis() as u64, "Send cooldown");
        let until = Instant::now() + duration;
        let mut slot = self
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_none_or(|current| current < until) {
            *slot = Some(until);
        }
    }

    fn render_progress(&self, category: &Category, percent: Percent, changed: bool) {
        if changed {
            self.line(&format!("{:<10} {}", category.as_str(), progress_bar(percent)));
        }
    }

    fn render_recent(&self, videos: &[Video]) {
        self.list("Recent videos", videos);
    }

    fn render_category(&self, category: &Category, videos: &[Video]) {
        self.list(&format!("Category {category}"), videos);
    }

    fn render_favorites(&self, videos: &[Video]) {
        self.list("Favorites", videos);
    }

    fn render_video(&self, video: &Video, watched: bool, favorite: bool) {
        self.line(&format!(
            "{} [{}{}]",
            video.title,
            if watched { "watched" } else { "unwatched" },
            if favorite { ", favorite" } else { "" }
        ));
        if let Some(description) = &video.description {
            self.line(description);
        }
        if let Some(url) = &video.video_url {
            self.line(url);
        }
    }

    fn show_view(&self, view: &CurrentView) {
        self.line(&format!("== {view} =="));
    }

    fn notify(&self, level: NoticeLevel, text: &str) {
        let tag = match level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        self.line(&format!("({tag}) {text}"));
    }
}
