use std::fmt;

use crate::ids::{Category, VideoId};

/// Which screen the user is looking at.
///
/// Push updates for a category only re-render its list when that category
/// is on screen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CurrentView {
    #[default]
    Main,
    Category(Category),
    Favorites,
    Chats,
    Community,
    Video(VideoId),
}

impl CurrentView {
    /// Parse `/open` arguments: `main`, `favorites`, `chats`, `community`,
    /// `category <key>`, `video <id>`.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let mut parts = input.split_whitespace();
        let head = parts.next()?;
        let arg = parts.next();
        if parts.next().is_some() {
            return None;
        }
        match (head.to_ascii_lowercase().as_str(), arg) {
            ("main", None) => Some(Self::Main),
            ("favorites", None) => Some(Self::Favorites),
            ("chats", None) => Some(Self::Chats),
            ("community", None) => Some(Self::Community),
            ("category", Some(key)) => Some(Self::Category(Category::from(key))),
            ("video", Some(id)) => Some(Self::Video(VideoId::from(id))),
            _ => None,
        }
    }
}

impl fmt::Display for CurrentView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => f.write_str("main"),
            Self::Category(c) => write!(f, "category {c}"),
            Self::Favorites => f.write_str("favorites"),
            Self::Chats => f.write_str("chats"),
            Self::Community => f.write_str("community"),
            Self::Video(id) => write!(f, "video {id}"),
        }
    }
}
