//! Per-category completion percentages.
//!
//! Local progress is derived from the watched set and the catalog; server
//! progress arrives over REST or the push channel. [`merge_progress`] decides
//! which one is shown.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{Category, VideoId};
use crate::video::Video;

/// Integer percent in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// Clamp any integer into range.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl<'de> Deserialize<'de> for Percent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Ints normally; floats and numeric strings are rounded. Anything
        // else (null, bool, junk) reads as 0, which defers to local progress.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
            Other(IgnoredAny),
        }

        let raw = match Raw::deserialize(deserializer)? {
            Raw::Number(n) => n,
            Raw::Text(text) => text.trim().parse().unwrap_or(0.0),
            Raw::Other(_) => 0.0,
        };
        if raw.is_nan() {
            return Ok(Self::ZERO);
        }
        Ok(Self::clamped(raw.round() as i64))
    }
}

pub type ProgressMap = BTreeMap<Category, Percent>;

/// `round(100 * watched / total)` over one category's videos.
///
/// The numerator counts distinct watched ids present in `videos`; the
/// denominator is the list length. An empty list is 0%. Rounding is half-up,
/// which is what the web client's `Math.round` does for non-negative input.
#[must_use]
pub fn calculate_progress(videos: &[Video], mut is_watched: impl FnMut(&VideoId) -> bool) -> Percent {
    if videos.is_empty() {
        return Percent::ZERO;
    }

    let distinct: HashSet<&VideoId> = videos.iter().map(|v| &v.id).collect();
    let watched = distinct.into_iter().filter(|&id| is_watched(id)).count() as u64;
    let total = videos.len() as u64;

    // Integer half-up: floor((200w + n) / 2n)
    let percent = (200 * watched + total) / (2 * total);
    Percent::clamped(percent as i64)
}

/// Asymmetric merge of one category's server and local values.
///
/// A nonzero server value wins. A zero server value never hides local
/// progress: the server may not have recorded a watch that was just submitted.
#[must_use]
pub fn merge_progress(server: Percent, local: Percent) -> Percent {
    if !server.is_zero() {
        server
    } else if local.is_zero() {
        Percent::ZERO
    } else {
        local
    }
}
