//! Configuration for the Lectern client.
//!
//! `~/.lectern/config.toml` is deserialized into [`LecternConfig`], whose
//! fields are all optional, then resolved into [`ClientSettings`] at the parse
//! boundary. Everything downstream takes `ClientSettings` and never sees a
//! missing value.
//!
//! ```toml
//! [server]
//! base_url = "http://127.0.0.1:8000"
//! csrf_token = "${LECTERN_CSRF_TOKEN}"
//! request_timeout_secs = 60
//!
//! [chat]
//! rate_limit_cooldown_ms = 2000
//!
//! [sync]
//! enabled = true
//! reconnect_interval_ms = 1000
//! max_reconnect_attempts = 5
//!
//! [catalog]
//! categories = ["html", "js", "php", "wordpress"]
//!
//! [storage]
//! path = "~/.lectern/state.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use lectern_types::Category;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
/// No server-side limit exists; this keeps a hung chat call from holding the
/// single-flight slot forever.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RATE_LIMIT_COOLDOWN_MS: u64 = 2_000;
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_CATEGORIES: [&str; 4] = ["html", "js", "php", "wordpress"];

pub const BASE_URL_ENV: &str = "LECTERN_BASE_URL";
pub const CSRF_TOKEN_ENV: &str = "LECTERN_CSRF_TOKEN";

#[derive(Debug, Default, Deserialize)]
pub struct LecternConfig {
    pub server: Option<ServerConfig>,
    pub chat: Option<ChatConfig>,
    pub sync: Option<SyncConfig>,
    pub catalog: Option<CatalogConfig>,
    pub storage: Option<StorageConfig>,
}

#[derive(Default, Deserialize)]
pub struct ServerConfig {
    pub base_url: Option<String>,
    pub csrf_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

// Manual Debug impl to keep the anti-forgery token out of logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("base_url", &self.base_url)
            .field(
                "csrf_token",
                &self.csrf_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatConfig {
    pub rate_limit_cooldown_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SyncConfig {
    pub enabled: Option<bool>,
    pub reconnect_interval_ms: Option<u64>,
    pub max_reconnect_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CatalogConfig {
    pub categories: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    pub path: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid base_url {value:?}: {source}")]
    BaseUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("base_url must use http or https (got {0})")]
    BaseUrlScheme(String),
    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("catalog.categories must contain at least one non-empty category")]
    NoCategories,
}

/// Push-channel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub enabled: bool,
    pub reconnect_interval: Duration,
    pub max_reconnect_attempts: u32,
}

/// Fully resolved client configuration.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: Url,
    pub csrf_token: Option<String>,
    pub request_timeout: Duration,
    pub rate_limit_cooldown: Duration,
    pub sync: SyncSettings,
    pub categories: Vec<Category>,
    /// `None` when no home directory can be found and none was configured.
    pub storage_path: Option<PathBuf>,
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("base_url", &self.base_url.as_str())
            .field("csrf_token", &self.csrf_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout", &self.request_timeout)
            .field("rate_limit_cooldown", &self.rate_limit_cooldown)
            .field("sync", &self.sync)
            .field("categories", &self.categories)
            .field("storage_path", &self.storage_path)
            .finish()
    }
}

/// Replace `${VAR}` references through `lookup` (missing → empty).
fn expand_with(value: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(end_rel) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let name = &rest[start + 2..start + 2 + end_rel];
        if !name.is_empty() {
            out.push_str(&lookup(name).unwrap_or_default());
        }
        rest = &rest[start + 2 + end_rel + 1..];
    }

    out.push_str(rest);
    out
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl LecternConfig {
    /// Load `~/.lectern/config.toml`. `Ok(None)` when the file doesn't exist.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!("Failed to read config at {}: {source}", path.display());
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!("Failed to parse config at {}: {source}", path.display());
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ClientSettings, ConfigError> {
        self.resolve_with(|name| env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup.
    ///
    /// `LECTERN_BASE_URL` and `LECTERN_CSRF_TOKEN` override the file; string
    /// values in the file get `${VAR}` expansion through the same lookup.
    pub fn resolve_with(
        self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ClientSettings, ConfigError> {
        let server = self.server.unwrap_or_default();
        let chat = self.chat.unwrap_or_default();
        let sync = self.sync.unwrap_or_default();
        let catalog = self.catalog.unwrap_or_default();
        let storage = self.storage.unwrap_or_default();

        let raw_url = non_empty(lookup(BASE_URL_ENV))
            .or_else(|| server.base_url.map(|v| expand_with(&v, &lookup)))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(raw_url.trim()).map_err(|source| ConfigError::BaseUrl {
            value: raw_url.clone(),
            source,
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ConfigError::BaseUrlScheme(base_url.scheme().to_string()));
        }

        let csrf_token = non_empty(lookup(CSRF_TOKEN_ENV))
            .or_else(|| non_empty(server.csrf_token.map(|v| expand_with(&v, &lookup))));

        let timeout_secs = server
            .request_timeout_secs
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }

        let categories: Vec<Category> = match catalog.categories {
            Some(list) => list
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .map(Category::from)
                .collect(),
            None => DEFAULT_CATEGORIES.iter().copied().map(Category::from).collect(),
        };
        if categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }

        let storage_path = match storage.path {
            Some(raw) => Some(expand_home(&expand_with(&raw, &lookup))),
            None => default_state_path(),
        };

        Ok(ClientSettings {
            base_url,
            csrf_token,
            request_timeout: Duration::from_secs(timeout_secs),
            rate_limit_cooldown: Duration::from_millis(
                chat.rate_limit_cooldown_ms
                    .unwrap_or(DEFAULT_RATE_LIMIT_COOLDOWN_MS),
            ),
            sync: SyncSettings {
                enabled: sync.enabled.unwrap_or(true),
                reconnect_interval: Duration::from_millis(
                    sync.reconnect_interval_ms
                        .unwrap_or(DEFAULT_RECONNECT_INTERVAL_MS),
                ),
                max_reconnect_attempts: sync
                    .max_reconnect_attempts
                    .unwrap_or(DEFAULT_MAX_RECONNECT_ATTEMPTS),
            },
            categories,
            storage_path,
        })
    }
}

pub fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".lectern"))
}

pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

pub fn default_state_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("state.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn expand_no_vars() {
        assert_eq!(expand_with("hello world", no_env), "hello world");
    }

    #[test]
    fn expand_replaces_and_blanks_missing() {
        let lookup = |name: &str| (name == "TOKEN").then(|| "abc".to_string());
        assert_eq!(expand_with("x-${TOKEN}-${MISSING}-y", lookup), "x-abc--y");
    }

    #[test]
    fn expand_unclosed_brace_preserved() {
        assert_eq!(expand_with("test ${UNCLOSED", no_env), "test ${UNCLOSED");
    }

    #[test]
    fn expand_adjacent_vars() {
        let lookup = |name: &str| Some(name.to_lowercase());
        assert_eq!(expand_with("${A}${B}", lookup), "ab");
    }

    #[test]
    fn empty_config_resolves_to_defaults() {
        let settings = LecternConfig::default().resolve_with(no_env).unwrap();
        assert_eq!(settings.base_url.as_str(), "http://127.0.0.1:8000/");
        assert_eq!(settings.request_timeout, Duration::from_secs(60));
        assert_eq!(settings.rate_limit_cooldown, Duration::from_secs(2));
        assert!(settings.sync.enabled);
        assert_eq!(settings.sync.reconnect_interval, Duration::from_secs(1));
        assert_eq!(settings.sync.max_reconnect_attempts, 5);
        assert_eq!(settings.categories.len(), 4);
        assert!(settings.csrf_token.is_none());
    }

    #[test]
    fn parses_full_file() {
        let raw: LecternConfig = toml::from_str(
            r#"
            [server]
            base_url = "https://learn.example.test"
            csrf_token = "${CSRF}"
            request_timeout_secs = 15

            [chat]
            rate_limit_cooldown_ms = 500

            [sync]
            enabled = false
            reconnect_interval_ms = 250
            max_reconnect_attempts = 2

            [catalog]
            categories = ["html", " ", "js"]

            [storage]
            path = "/tmp/lectern-state.json"
            "#,
        )
        .unwrap();

        let lookup = |name: &str| (name == "CSRF").then(|| "tok".to_string());
        let settings = raw.resolve_with(lookup).unwrap();
        assert_eq!(settings.base_url.host_str(), Some("learn.example.test"));
        assert_eq!(settings.csrf_token.as_deref(), Some("tok"));
        assert_eq!(settings.request_timeout, Duration::from_secs(15));
        assert_eq!(settings.rate_limit_cooldown, Duration::from_millis(500));
        assert!(!settings.sync.enabled);
        assert_eq!(settings.sync.max_reconnect_attempts, 2);
        assert_eq!(
            settings.categories,
            vec![Category::from("html"), Category::from("js")]
        );
        assert_eq!(
            settings.storage_path,
            Some(PathBuf::from("/tmp/lectern-state.json"))
        );
    }

    #[test]
    fn env_overrides_file() {
        let raw: LecternConfig = toml::from_str(
            r#"
            [server]
            base_url = "http://file.example.test"
            csrf_token = "from-file"
            "#,
        )
        .unwrap();
        let lookup = |name: &str| match name {
            BASE_URL_ENV => Some("http://env.example.test:9000".to_string()),
            CSRF_TOKEN_ENV => Some("from-env".to_string()),
            _ => None,
        };
        let settings = raw.resolve_with(lookup).unwrap();
        assert_eq!(settings.base_url.port(), Some(9000));
        assert_eq!(settings.csrf_token.as_deref(), Some("from-env"));
    }

    #[test]
    fn rejects_bad_values() {
        let raw: LecternConfig = toml::from_str("[server]\nbase_url = \"ftp://x\"").unwrap();
        assert!(matches!(
            raw.resolve_with(no_env),
            Err(ConfigError::BaseUrlScheme(_))
        ));

        let raw: LecternConfig = toml::from_str("[server]\nrequest_timeout_secs = 0").unwrap();
        assert!(matches!(raw.resolve_with(no_env), Err(ConfigError::ZeroTimeout)));

        let raw: LecternConfig = toml::from_str("[catalog]\ncategories = []").unwrap();
        assert!(matches!(raw.resolve_with(no_env), Err(ConfigError::NoCategories)));
    }

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = LecternConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[server\nbase_url = 1").unwrap();
        match LecternConfig::load_from(&path) {
            Err(ConfigError::Parse { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn debug_redacts_token() {
        let settings = LecternConfig::default()
            .resolve_with(|name| (name == CSRF_TOKEN_ENV).then(|| "secret".to_string()))
            .unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
