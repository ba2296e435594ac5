//! Optional text enrichment for the finder flow.
//!
//! A suggester may be slow, down, or absent. Callers always get an answer:
//! the template message, or an empty list of item names.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::contact::default_finder_message;

pub const DEFAULT_SUGGESTION_TIMEOUT_MS: u64 = 3_000;
pub const MIN_CATEGORY_LEN: usize = 3;
pub const MAX_ITEM_NAME_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SuggestError {
    #[error("suggestion service unavailable: {0}")]
    Unavailable(String),
    #[error("suggestion service returned an empty answer")]
    Empty,
}

#[async_trait]
pub trait MessageSuggester: Send + Sync {
    async fn finder_message(&self, item_name: &str) -> Result<String, SuggestError>;

    async fn item_names(&self, category: &str) -> Result<Vec<String>, SuggestError>;
}

/// Bounds a [`MessageSuggester`] in time and falls back when it fails.
#[derive(Clone)]
pub struct Suggestions {
    suggester: Option<Arc<dyn MessageSuggester>>,
    timeout: Duration,
}

impl Default for Suggestions {
    fn default() -> Self {
        Self::template_only()
    }
}

impl Suggestions {
    #[must_use]
    pub fn template_only() -> Self {
        Self {
            suggester: None,
            timeout: Duration::from_millis(DEFAULT_SUGGESTION_TIMEOUT_MS),
        }
    }

    #[must_use]
    pub fn with_suggester(suggester: Arc<dyn MessageSuggester>) -> Self {
        Self {
            suggester: Some(suggester),
            ..Self::template_only()
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn finder_message(&self, item_name: Option<&str>) -> String {
        let fallback = default_finder_message(item_name);
        let (Some(suggester), Some(item_name)) = (self.suggester.as_ref(), item_name) else {
            return fallback;
        };
        match tokio::time::timeout(self.timeout, suggester.finder_message(item_name)).await {
            Ok(Ok(message)) if !message.trim().is_empty() => message.trim().to_string(),
            Ok(Ok(_)) => fallback,
            Ok(Err(error)) => {
                tracing::debug!(%error, "Finder message suggestion failed; using template");
                fallback
            }
            Err(_) => {
                tracing::debug!("Finder message suggestion timed out; using template");
                fallback
            }
        }
    }

    pub async fn item_names(&self, category: &str) -> Vec<String> {
        let category = category.trim();
        let Some(suggester) = self.suggester.as_ref() else {
            return Vec::new();
        };
        if category.chars().count() < MIN_CATEGORY_LEN {
            return Vec::new();
        }
        match tokio::time::timeout(self.timeout, suggester.item_names(category)).await {
            Ok(Ok(names)) => names
                .into_iter()
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .take(MAX_ITEM_NAME_SUGGESTIONS)
                .collect(),
            Ok(Err(error)) => {
                tracing::debug!(%error, "Item name suggestion failed");
                Vec::new()
            }
            Err(_) => Vec::new(),
        }
    }
}
