//! Push-channel frames.
//!
//! Inbound frames are `{"type": ..., ...payload}` objects. Types this client
//! does not know about decode to `Unknown` and are dropped by the caller, so a
//! newer server can add message types without breaking older clients.

use serde::{Deserialize, Serialize};

use crate::ids::{Category, VideoId};
use crate::progress::ProgressMap;
use crate::video::Video;

/// Frames received on the video stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoPush {
    RecentVideos {
        #[serde(default)]
        videos: Vec<Video>,
    },
    CategoryVideos {
        category: Category,
        #[serde(default)]
        videos: Vec<Video>,
    },
    VideoAdded {
        video: Video,
    },
    VideoUpdated {
        video: Video,
    },
    VideoDeleted {
        video_id: VideoId,
    },
    #[serde(other)]
    Unknown,
}

/// Frames received on the progress stream.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressPush {
    UserProgress {
        #[serde(default)]
        progress: ProgressMap,
    },
    ProgressUpdated {
        #[serde(default)]
        progress: ProgressMap,
    },
    #[serde(other)]
    Unknown,
}

impl ProgressPush {
    /// The progress snapshot carried by this frame, if any.
    #[must_use]
    pub fn progress(&self) -> Option<&ProgressMap> {
        match self {
            Self::UserProgress { progress } | Self::ProgressUpdated { progress } => Some(progress),
            Self::Unknown => None,
        }
    }
}

/// Frames this client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    RequestProgress,
    RequestRecent,
    RequestVideos { category: Category },
    MarkWatched { video_id: VideoId },
}
