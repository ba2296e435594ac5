//! Wiring of the cache, gateway and engines for one client process.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::activation::ActivationEngine;
use crate::cache::LocalRecordCache;
use crate::config::{EndpointSettings, ResolvedEndpoint, ScanReturnConfig};
use crate::contact::MessagingService;
use crate::gateway::{GatewayError, HttpRecordGateway, HttpRecordGatewayConfig, RecordGateway};
use crate::lifecycle::TagSession;
use crate::medium::{FileMedium, KeyValueMedium};
use crate::resolution::ResolutionEngine;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

pub struct ScanReturnContext {
    config: ScanReturnConfig,
    cache: Arc<LocalRecordCache>,
    endpoint_settings: EndpointSettings,
    resolution: ResolutionEngine,
    activation: ActivationEngine,
}

impl ScanReturnContext {
    /// File-backed cache under `config.data_dir` and the HTTP gateway.
    pub fn from_config(config: ScanReturnConfig) -> Result<Self, ContextError> {
        let medium: Arc<dyn KeyValueMedium> = Arc::new(FileMedium::new(config.data_dir.clone()));
        let gateway = Arc::new(HttpRecordGateway::new(HttpRecordGatewayConfig {
            lookup_timeout_ms: config.lookup_timeout_ms,
            messaging: MessagingService::new(&config.messaging_base_url),
        })?);
        Ok(Self::with_parts(config, medium, gateway))
    }

    #[must_use]
    pub fn with_parts(
        config: ScanReturnConfig,
        medium: Arc<dyn KeyValueMedium>,
        gateway: Arc<dyn RecordGateway>,
    ) -> Self {
        let messaging = MessagingService::new(&config.messaging_base_url);
        let cache = Arc::new(
            LocalRecordCache::new(medium.clone(), messaging).with_seed_count(config.seed_count),
        );
        let resolution = ResolutionEngine::new(gateway.clone(), cache.clone());
        let activation = ActivationEngine::new(gateway, cache.clone())
            .with_local_latency(Duration::from_millis(config.local_latency_ms));
        Self {
            config,
            cache,
            endpoint_settings: EndpointSettings::new(medium),
            resolution,
            activation,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ScanReturnConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &LocalRecordCache {
        &self.cache
    }

    #[must_use]
    pub fn endpoint_settings(&self) -> &EndpointSettings {
        &self.endpoint_settings
    }

    #[must_use]
    pub fn resolution(&self) -> &ResolutionEngine {
        &self.resolution
    }

    #[must_use]
    pub fn activation(&self) -> &ActivationEngine {
        &self.activation
    }

    #[must_use]
    pub fn endpoint(&self) -> ResolvedEndpoint {
        self.endpoint_settings
            .resolve(self.config.endpoint_override.as_deref())
    }

    /// Fresh lifecycle session against the currently configured endpoint.
    #[must_use]
    pub fn session(&self) -> TagSession<'_> {
        let endpoint = self.endpoint();
        tracing::debug!(
            endpoint = endpoint.raw.as_str(),
            source = endpoint.source.as_str(),
            "Opening tag session"
        );
        TagSession::new(&self.resolution, &self.activation, endpoint.remote())
            .with_reentry_delay(Duration::from_millis(self.config.reentry_delay_ms))
    }
}
