use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::activation::DEFAULT_LOCAL_LATENCY_MS;
use crate::cache::DEFAULT_SEED_COUNT;
use crate::contact::DEFAULT_MESSAGING_BASE_URL;
use crate::gateway::{DEFAULT_LOOKUP_TIMEOUT_MS, RemoteEndpoint};
use crate::lifecycle::DEFAULT_REENTRY_DELAY_MS;
use crate::medium::{KeyValueMedium, MediumError, default_data_dir};

pub const DEFAULT_ENDPOINT: &str = "https://script.google.com/macros/s/AKfycbwDvbsM6B3GoqqAsGCXR-vkhBhve5dT3ExSF0ukrWqQcZP0LKQRf_tguIcRkXZ5mLq5/exec";
pub const ENDPOINT_KEY: &str = "scanreturn.endpoint";

pub const ENV_DATA_DIR: &str = "SCANRETURN_DATA_DIR";
pub const ENV_ENDPOINT: &str = "SCANRETURN_ENDPOINT";
pub const ENV_LOOKUP_TIMEOUT_MS: &str = "SCANRETURN_LOOKUP_TIMEOUT_MS";
pub const ENV_REENTRY_DELAY_MS: &str = "SCANRETURN_REENTRY_DELAY_MS";
pub const ENV_LOCAL_LATENCY_MS: &str = "SCANRETURN_LOCAL_LATENCY_MS";
pub const ENV_MESSAGING_BASE_URL: &str = "SCANRETURN_MESSAGING_BASE_URL";
pub const ENV_SEED_COUNT: &str = "SCANRETURN_SEED_COUNT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReturnConfig {
    pub data_dir: PathBuf,
    pub endpoint_override: Option<String>,
    pub lookup_timeout_ms: u64,
    pub reentry_delay_ms: u64,
    pub local_latency_ms: u64,
    pub messaging_base_url: String,
    pub seed_count: u32,
}

impl Default for ScanReturnConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            endpoint_override: None,
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            reentry_delay_ms: DEFAULT_REENTRY_DELAY_MS,
            local_latency_ms: DEFAULT_LOCAL_LATENCY_MS,
            messaging_base_url: DEFAULT_MESSAGING_BASE_URL.to_string(),
            seed_count: DEFAULT_SEED_COUNT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid SCANRETURN_LOOKUP_TIMEOUT_MS: {0}")]
    InvalidLookupTimeoutMs(String),
    #[error("invalid SCANRETURN_REENTRY_DELAY_MS: {0}")]
    InvalidReentryDelayMs(String),
    #[error("invalid SCANRETURN_LOCAL_LATENCY_MS: {0}")]
    InvalidLocalLatencyMs(String),
    #[error("invalid SCANRETURN_SEED_COUNT: {0}")]
    InvalidSeedCount(String),
}

impl ScanReturnConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let data_dir = non_empty(ENV_DATA_DIR)
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);
        // Present-but-empty is a deliberate offline override.
        let endpoint_override = lookup(ENV_ENDPOINT).map(|value| value.trim().to_string());
        let lookup_timeout_ms = non_empty(ENV_LOOKUP_TIMEOUT_MS)
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .map_err(|error| ConfigError::InvalidLookupTimeoutMs(error.to_string()))?
            .unwrap_or(defaults.lookup_timeout_ms)
            .max(1);
        let reentry_delay_ms = non_empty(ENV_REENTRY_DELAY_MS)
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .map_err(|error| ConfigError::InvalidReentryDelayMs(error.to_string()))?
            .unwrap_or(defaults.reentry_delay_ms);
        let local_latency_ms = non_empty(ENV_LOCAL_LATENCY_MS)
            .map(|raw| raw.parse::<u64>())
            .transpose()
            .map_err(|error| ConfigError::InvalidLocalLatencyMs(error.to_string()))?
            .unwrap_or(defaults.local_latency_ms);
        let messaging_base_url =
            non_empty(ENV_MESSAGING_BASE_URL).unwrap_or(defaults.messaging_base_url);
        let seed_count = non_empty(ENV_SEED_COUNT)
            .map(|raw| raw.parse::<u32>())
            .transpose()
            .map_err(|error| ConfigError::InvalidSeedCount(error.to_string()))?
            .unwrap_or(defaults.seed_count);

        Ok(Self {
            data_dir,
            endpoint_override,
            lookup_timeout_ms,
            reentry_delay_ms,
            local_latency_ms,
            messaging_base_url,
            seed_count,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointSource {
    Environment,
    Stored,
    Default,
}

impl EndpointSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Environment => ENV_ENDPOINT,
            Self::Stored => "stored_setting",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub raw: String,
    pub source: EndpointSource,
}

impl ResolvedEndpoint {
    /// `None` means offline mode: the local cache is canonical.
    #[must_use]
    pub fn remote(&self) -> Option<RemoteEndpoint> {
        RemoteEndpoint::parse(&self.raw)
    }

    #[must_use]
    pub fn locked_by_env(&self) -> bool {
        self.source == EndpointSource::Environment
    }
}

/// User-overridable remote endpoint persisted next to the record cache.
pub struct EndpointSettings {
    medium: Arc<dyn KeyValueMedium>,
}

impl EndpointSettings {
    #[must_use]
    pub fn new(medium: Arc<dyn KeyValueMedium>) -> Self {
        Self { medium }
    }

    #[must_use]
    pub fn stored(&self) -> Option<String> {
        match self.medium.get_item(ENDPOINT_KEY) {
            Ok(value) => value.map(|value| value.trim().to_string()),
            Err(error) => {
                tracing::warn!(%error, "Endpoint setting unreadable");
                None
            }
        }
    }

    /// Stores `raw` verbatim (trimmed); an empty value selects offline mode.
    pub fn store(&self, raw: &str) -> Result<(), MediumError> {
        self.medium.set_item(ENDPOINT_KEY, raw.trim())
    }

    pub fn reset(&self) -> Result<(), MediumError> {
        self.medium.remove_item(ENDPOINT_KEY)
    }

    /// Environment override, then the stored setting, then the built-in
    /// default, which is persisted on first use.
    #[must_use]
    pub fn resolve(&self, env_override: Option<&str>) -> ResolvedEndpoint {
        if let Some(raw) = env_override {
            return ResolvedEndpoint {
                raw: raw.trim().to_string(),
                source: EndpointSource::Environment,
            };
        }
        if let Some(raw) = self.stored() {
            return ResolvedEndpoint {
                raw,
                source: EndpointSource::Stored,
            };
        }
        if let Err(error) = self.store(DEFAULT_ENDPOINT) {
            tracing::warn!(%error, "Could not persist default endpoint");
        }
        ResolvedEndpoint {
            raw: DEFAULT_ENDPOINT.to_string(),
            source: EndpointSource::Default,
        }
    }
}
