//! Core domain types for Lectern.
//!
//! This crate contains pure domain and wire types with no IO, no async, and
//! minimal dependencies. Everything here can be used from any layer of the
//! client.
//!
//! - [`ids`]: string-normalized identifiers (videos, sessions, categories, messages)
//! - [`chat`]: chat transcript entries
//! - [`video`]: video records and the per-category catalog
//! - [`progress`]: percent values, local progress calculation, and the merge rule
//! - [`wire`]: request/response bodies for the REST endpoints
//! - [`push`]: push-channel frames in both directions
//! - [`view`]: the client's current view

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

pub mod chat;
pub mod ids;
pub mod progress;
pub mod push;
pub mod video;
pub mod view;
pub mod wire;

pub use chat::{ChatMessage, Role};
pub use ids::{Category, MessageId, SessionId, VideoId};
pub use progress::{Percent, ProgressMap, calculate_progress, merge_progress};
pub use push::{ClientFrame, ProgressPush, VideoPush};
pub use video::{Catalog, Video};
pub use view::CurrentView;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// NonEmpty String Types
// ============================================================================

/// A string guaranteed to be non-empty after trimming, stored trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyString(String);

#[derive(Debug, Error)]
#[error("value must not be empty")]
pub struct EmptyStringError;

impl NonEmptyString {
    pub fn new(value: impl AsRef<str>) -> Result<Self, EmptyStringError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            Err(EmptyStringError)
        } else {
            Ok(Self(trimmed.to_string()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for NonEmptyString {
    type Error = EmptyStringError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::ops::Deref for NonEmptyString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.as_str()
    }
}

impl AsRef<str> for NonEmptyString {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// A compile-time checked non-empty static string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NonEmptyStaticStr(&'static str);

impl NonEmptyStaticStr {
    #[must_use]
    pub const fn new(value: &'static str) -> Self {
        assert!(!value.is_empty(), "NonEmptyStaticStr must not be empty");
        Self(value)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_string_trims() {
        let value = NonEmptyString::new("  hello \n").unwrap();
        assert_eq!(value.as_str(), "hello");
    }

    #[test]
    fn non_empty_string_rejects_whitespace() {
        assert!(NonEmptyString::new("").is_err());
        assert!(NonEmptyString::new(" \t\n ").is_err());
    }

    #[test]
    fn non_empty_string_serde_rejects_empty() {
        let parsed: Result<NonEmptyString, _> = serde_json::from_str("\"   \"");
        assert!(parsed.is_err());
    }
}
