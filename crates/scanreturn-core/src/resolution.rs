use std::sync::Arc;

use thiserror::Error;

use crate::cache::LocalRecordCache;
use crate::gateway::{LookupOutcome, RecordGateway, RemoteEndpoint};
use crate::record::TagRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Remote,
    LocalCache,
}

impl ResolutionSource {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::LocalCache => "local_cache",
        }
    }
}

/// A tag's binding state and where it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub record: TagRecord,
    pub source: ResolutionSource,
}

/// The only resolution failure that reaches the caller. Every other remote
/// anomaly degrades to the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("connection timed out while resolving {tag_id}")]
    TimedOut { tag_id: String },
}

/// First step of a resolution: what the remote service said, if anything
/// usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAttempt {
    Authoritative(TagRecord),
    TimedOut,
    Degraded { reason: String },
}

pub struct ResolutionEngine {
    gateway: Arc<dyn RecordGateway>,
    cache: Arc<LocalRecordCache>,
}

impl ResolutionEngine {
    #[must_use]
    pub fn new(gateway: Arc<dyn RecordGateway>, cache: Arc<LocalRecordCache>) -> Self {
        Self { gateway, cache }
    }

    /// Remote when configured and answering, else the local cache.
    pub async fn resolve(
        &self,
        tag_id: &str,
        endpoint: Option<&RemoteEndpoint>,
    ) -> Result<Resolution, ResolveError> {
        if let Some(endpoint) = endpoint {
            match self.attempt_remote(tag_id, endpoint).await {
                RemoteAttempt::Authoritative(record) => {
                    return Ok(Resolution {
                        record,
                        source: ResolutionSource::Remote,
                    });
                }
                RemoteAttempt::TimedOut => {
                    return Err(ResolveError::TimedOut {
                        tag_id: tag_id.to_string(),
                    });
                }
                RemoteAttempt::Degraded { reason } => {
                    tracing::info!(tag_id, %reason, "Remote unavailable; resolving from local cache");
                }
            }
        }
        Ok(self.resolve_locally(tag_id))
    }

    pub async fn attempt_remote(&self, tag_id: &str, endpoint: &RemoteEndpoint) -> RemoteAttempt {
        let outcome = self.gateway.lookup(endpoint, tag_id).await;
        tracing::debug!(tag_id, outcome = outcome.as_str(), "Remote lookup finished");
        match outcome {
            LookupOutcome::Found(record) => RemoteAttempt::Authoritative(record),
            LookupOutcome::NotFound => RemoteAttempt::Authoritative(TagRecord::unbound(tag_id)),
            LookupOutcome::TimedOut => RemoteAttempt::TimedOut,
            LookupOutcome::Unreachable { message } => RemoteAttempt::Degraded {
                reason: format!("unreachable:{message}"),
            },
            LookupOutcome::Malformed { message } => RemoteAttempt::Degraded {
                reason: format!("malformed:{message}"),
            },
        }
    }

    #[must_use]
    pub fn resolve_locally(&self, tag_id: &str) -> Resolution {
        self.cache.ensure_seeded();
        Resolution {
            record: self.cache.get(tag_id),
            source: ResolutionSource::LocalCache,
        }
    }
}
