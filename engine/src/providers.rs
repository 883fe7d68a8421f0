//! Cached view of the backend's AI providers.
//!
//! The backend owns which provider answers chat requests; the client only
//! asks it to switch. `try_index` is the client's round-robin cursor into
//! `all` and is never persisted.

use lectern_api::ApiClient;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderDirectory {
    all: Vec<String>,
    current: Option<String>,
    try_index: usize,
}

impl ProviderDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn all(&self) -> &[String] {
        &self.all
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    #[must_use]
    pub fn try_index(&self) -> usize {
        self.try_index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Reload from the backend. On failure the directory is emptied.
    pub async fn refresh(&mut self, api: &ApiClient) {
        match api.provider_info().await {
            Ok(info) => {
                self.all = info.all;
                self.current = info.current;
            }
            Err(e) => {
                tracing::warn!("Failed to load provider list: {e}");
                self.all.clear();
                self.current = None;
            }
        }
        self.try_index = self
            .current
            .as_ref()
            .and_then(|current| self.all.iter().position(|p| p == current))
            .unwrap_or(0);
        tracing::debug!(
            providers = self.all.len(),
            current = ?self.current,
            try_index = self.try_index,
            "Provider directory refreshed"
        );
    }

    /// Move the cursor to the next provider and ask the backend to switch to
    /// it. Returns the requested provider, or `None` when there are no
    /// providers to rotate through.
    ///
    /// The cursor advances even if the switch request fails; `current` only
    /// changes when the backend acknowledges.
    pub async fn advance(&mut self, api: &ApiClient) -> Option<String> {
        if self.all.is_empty() {
            self.refresh(api).await;
        }
        if self.all.is_empty() {
            return None;
        }

        self.try_index = (self.try_index + 1) % self.all.len();
        let next = self.all[self.try_index].clone();

        match api.change_provider(&next).await {
            Ok(ack) if ack.success => {
                let confirmed = ack.current_provider.unwrap_or_else(|| next.clone());
                tracing::info!(provider = %confirmed, "Switched provider");
                self.current = Some(confirmed);
            }
            Ok(_) => tracing::warn!(provider = %next, "Backend declined provider switch"),
            Err(e) => tracing::warn!(provider = %next, "Provider switch failed: {e}"),
        }

        Some(next)
    }
}
