use std::sync::Arc;
use std::time::Duration;

use crate::cache::LocalRecordCache;
use crate::gateway::{RecordGateway, RemoteEndpoint, WriteOutcome};
use crate::record::{ActivationInputError, ActivationRequest, TagRecord};

pub const DEFAULT_LOCAL_LATENCY_MS: u64 = 1_000;

/// How an activation ended.
///
/// `RemoteSubmitted` is optimistic: the write transport cannot read the
/// service's answer, so the local mirror may briefly claim a binding the
/// remote store never recorded. The next remote resolution corrects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    RemoteSubmitted { record: TagRecord },
    LocalOnly { record: TagRecord },
    Failed { message: String },
}

impl ActivationOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    #[must_use]
    pub fn record(&self) -> Option<&TagRecord> {
        match self {
            Self::RemoteSubmitted { record } | Self::LocalOnly { record } => Some(record),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RemoteSubmitted { .. } => "remote_submitted",
            Self::LocalOnly { .. } => "local_only",
            Self::Failed { .. } => "failed",
        }
    }
}

pub struct ActivationEngine {
    gateway: Arc<dyn RecordGateway>,
    cache: Arc<LocalRecordCache>,
    local_latency: Duration,
}

impl ActivationEngine {
    #[must_use]
    pub fn new(gateway: Arc<dyn RecordGateway>, cache: Arc<LocalRecordCache>) -> Self {
        Self {
            gateway,
            cache,
            local_latency: Duration::from_millis(DEFAULT_LOCAL_LATENCY_MS),
        }
    }

    /// Latency simulated by offline activations.
    #[must_use]
    pub fn with_local_latency(mut self, local_latency: Duration) -> Self {
        self.local_latency = local_latency;
        self
    }

    /// Validates, then writes remotely (mirroring into the cache on
    /// submission) or, without an endpoint, writes only to the cache.
    ///
    /// Invalid input is rejected before any network attempt.
    pub async fn activate(
        &self,
        request: &ActivationRequest,
        endpoint: Option<&RemoteEndpoint>,
    ) -> Result<ActivationOutcome, ActivationInputError> {
        let request = request.normalized()?;

        let Some(endpoint) = endpoint else {
            if !self.local_latency.is_zero() {
                tokio::time::sleep(self.local_latency).await;
            }
            let record = self.mirror(&request);
            tracing::info!(tag_id = request.tag_id.as_str(), "Activated in local cache");
            return Ok(ActivationOutcome::LocalOnly { record });
        };

        match self.gateway.write(endpoint, &request).await {
            WriteOutcome::Submitted => {
                let record = self.mirror(&request);
                tracing::info!(
                    tag_id = request.tag_id.as_str(),
                    "Activation submitted; mirrored locally"
                );
                Ok(ActivationOutcome::RemoteSubmitted { record })
            }
            // Nothing is mirrored so a failed write never looks locally successful.
            WriteOutcome::Unreachable { message } => Ok(ActivationOutcome::Failed { message }),
        }
    }

    fn mirror(&self, request: &ActivationRequest) -> TagRecord {
        let record = TagRecord::active(
            request.tag_id.as_str(),
            request.item_name.as_str(),
            &request.owner_contact,
            self.cache.messaging(),
        );
        self.cache.put(record.clone());
        record
    }
}
