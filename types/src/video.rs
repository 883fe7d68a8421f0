//! Video records and the per-category catalog.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::ids::{Category, VideoId};

/// A published video as returned by the backend serializer.
///
/// Only `id` and `title` are required; every other field is display data the
/// core passes through to the view untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub preview_image: Option<String>,
    #[serde(default)]
    pub category_name: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub views: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Video {
    #[must_use]
    pub fn new(id: impl Into<VideoId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            video_url: None,
            preview_image: None,
            category_name: None,
            duration: None,
            views: None,
            created_at: None,
        }
    }
}

/// Client-side copy of the server catalog.
///
/// Each category list and the recent list are replaced wholesale; the
/// catalog never merges individual videos.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: BTreeMap<Category, Vec<Video>>,
    recent: Vec<Video>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace_category(&mut self, category: Category, videos: Vec<Video>) {
        self.categories.insert(category, videos);
    }

    pub fn replace_recent(&mut self, videos: Vec<Video>) {
        self.recent = videos;
    }

    /// Videos in `category`; empty when the category was never loaded.
    #[must_use]
    pub fn category(&self, category: &Category) -> &[Video] {
        self.categories.get(category).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn recent(&self) -> &[Video] {
        &self.recent
    }

    /// Look a video up across every loaded list.
    #[must_use]
    pub fn find(&self, id: &VideoId) -> Option<&Video> {
        self.categories
            .values()
            .flatten()
            .chain(self.recent.iter())
            .find(|video| &video.id == id)
    }

    /// Distinct ids in `category`, the denominator for local progress.
    #[must_use]
    pub fn category_ids(&self, category: &Category) -> HashSet<&VideoId> {
        self.category(category).iter().map(|v| &v.id).collect()
    }
}
