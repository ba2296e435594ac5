//! Scan lifecycle consumed by the presentation layer.
//!
//! `Landing -> Resolving -> {Activating | Found}`, then after a successful
//! activation `ActivationSubmitted -> Resolving` once the re-entry delay
//! elapses. A surfaced resolution failure parks the flow in `Error`, whose
//! only way out is `ReturnHome`.

use std::time::Duration;

use thiserror::Error;

use crate::activation::{ActivationEngine, ActivationOutcome};
use crate::gateway::RemoteEndpoint;
use crate::record::{ActivationInputError, ActivationRequest, TagRecord};
use crate::resolution::{Resolution, ResolutionEngine, ResolveError};

pub const DEFAULT_REENTRY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagView {
    Landing,
    Resolving {
        tag_id: String,
    },
    Activating {
        record: TagRecord,
        last_error: Option<String>,
    },
    Found {
        record: TagRecord,
    },
    ActivationSubmitted {
        tag_id: String,
    },
    Error {
        tag_id: String,
        message: String,
    },
}

impl TagView {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Resolving { .. } => "resolving",
            Self::Activating { .. } => "activating",
            Self::Found { .. } => "found",
            Self::ActivationSubmitted { .. } => "success",
            Self::Error { .. } => "error",
        }
    }

    #[must_use]
    pub fn tag_id(&self) -> Option<&str> {
        match self {
            Self::Landing => None,
            Self::Resolving { tag_id }
            | Self::ActivationSubmitted { tag_id }
            | Self::Error { tag_id, .. } => Some(tag_id),
            Self::Activating { record, .. } | Self::Found { record } => Some(record.tag_id()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent {
    TagIdPresent(String),
    Resolved(Resolution),
    ResolutionFailed(ResolveError),
    ActivationRejected { message: String },
    ActivationSubmitted,
    ReentryElapsed,
    ReturnHome,
}

impl TagEvent {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::TagIdPresent(_) => "tag_id_present",
            Self::Resolved(_) => "resolved",
            Self::ResolutionFailed(_) => "resolution_failed",
            Self::ActivationRejected { .. } => "activation_rejected",
            Self::ActivationSubmitted => "activation_submitted",
            Self::ReentryElapsed => "reentry_elapsed",
            Self::ReturnHome => "return_home",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("event {event} is not valid in state {state}")]
    Illegal {
        state: &'static str,
        event: &'static str,
    },
    #[error("resolution for {received} does not match pending tag {expected}")]
    TagMismatch { expected: String, received: String },
    #[error("tag id must not be empty")]
    EmptyTagId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagLifecycle {
    view: TagView,
}

impl Default for TagLifecycle {
    fn default() -> Self {
        Self {
            view: TagView::Landing,
        }
    }
}

impl TagLifecycle {
    #[must_use]
    pub fn view(&self) -> &TagView {
        &self.view
    }

    pub fn apply(&mut self, event: TagEvent) -> Result<&TagView, TransitionError> {
        let illegal = TransitionError::Illegal {
            state: self.view.label(),
            event: event.label(),
        };
        let next = match (&self.view, event) {
            (_, TagEvent::ReturnHome) => TagView::Landing,
            (TagView::Landing, TagEvent::TagIdPresent(tag_id)) => {
                let tag_id = tag_id.trim();
                if tag_id.is_empty() {
                    return Err(TransitionError::EmptyTagId);
                }
                TagView::Resolving {
                    tag_id: tag_id.to_string(),
                }
            }
            (TagView::Resolving { tag_id }, TagEvent::Resolved(resolution)) => {
                if resolution.record.tag_id() != tag_id.as_str() {
                    return Err(TransitionError::TagMismatch {
                        expected: tag_id.clone(),
                        received: resolution.record.tag_id().to_string(),
                    });
                }
                if resolution.record.is_active() {
                    TagView::Found {
                        record: resolution.record,
                    }
                } else {
                    TagView::Activating {
                        record: resolution.record,
                        last_error: None,
                    }
                }
            }
            (TagView::Resolving { tag_id }, TagEvent::ResolutionFailed(error)) => TagView::Error {
                tag_id: tag_id.clone(),
                message: error.to_string(),
            },
            (TagView::Activating { record, .. }, TagEvent::ActivationRejected { message }) => {
                TagView::Activating {
                    record: record.clone(),
                    last_error: Some(message),
                }
            }
            (TagView::Activating { record, .. }, TagEvent::ActivationSubmitted) => {
                TagView::ActivationSubmitted {
                    tag_id: record.tag_id().to_string(),
                }
            }
            (TagView::ActivationSubmitted { tag_id }, TagEvent::ReentryElapsed) => {
                TagView::Resolving {
                    tag_id: tag_id.clone(),
                }
            }
            _ => return Err(illegal),
        };
        tracing::debug!(from = self.view.label(), to = next.label(), "Tag view transition");
        self.view = next;
        Ok(&self.view)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Drives a [`TagLifecycle`] with the resolution and activation engines.
pub struct TagSession<'a> {
    resolution: &'a ResolutionEngine,
    activation: &'a ActivationEngine,
    endpoint: Option<RemoteEndpoint>,
    reentry_delay: Duration,
    lifecycle: TagLifecycle,
}

impl<'a> TagSession<'a> {
    #[must_use]
    pub fn new(
        resolution: &'a ResolutionEngine,
        activation: &'a ActivationEngine,
        endpoint: Option<RemoteEndpoint>,
    ) -> Self {
        Self {
            resolution,
            activation,
            endpoint,
            reentry_delay: Duration::from_millis(DEFAULT_REENTRY_DELAY_MS),
            lifecycle: TagLifecycle::default(),
        }
    }

    #[must_use]
    pub fn with_reentry_delay(mut self, reentry_delay: Duration) -> Self {
        self.reentry_delay = reentry_delay;
        self
    }

    #[must_use]
    pub fn view(&self) -> &TagView {
        self.lifecycle.view()
    }

    /// Enters the flow for a scanned tag id and resolves it.
    pub async fn open(&mut self, tag_id: &str) -> Result<&TagView, SessionError> {
        self.lifecycle
            .apply(TagEvent::TagIdPresent(tag_id.to_string()))?;
        self.resolve_pending().await
    }

    /// Submits an activation from the `Activating` view. Rejections and
    /// transport failures stay in `Activating` with `last_error` set.
    pub async fn submit_activation(
        &mut self,
        item_name: &str,
        owner_contact: &str,
    ) -> Result<&TagView, SessionError> {
        let TagView::Activating { record, .. } = self.lifecycle.view() else {
            return Err(TransitionError::Illegal {
                state: self.lifecycle.view().label(),
                event: TagEvent::ActivationSubmitted.label(),
            }
            .into());
        };
        let request = ActivationRequest::new(record.tag_id(), item_name, owner_contact);

        let event = match self
            .activation
            .activate(&request, self.endpoint.as_ref())
            .await
        {
            Ok(ActivationOutcome::Failed { message }) => TagEvent::ActivationRejected {
                message: format!("activation failed, check your connection: {message}"),
            },
            Ok(_) => TagEvent::ActivationSubmitted,
            Err(error) => TagEvent::ActivationRejected {
                message: rejection_message(&error),
            },
        };
        Ok(self.lifecycle.apply(event)?)
    }

    /// Waits out the re-entry delay and resolves again against the
    /// authoritative source.
    pub async fn confirm_activation(&mut self) -> Result<&TagView, SessionError> {
        if !matches!(self.lifecycle.view(), TagView::ActivationSubmitted { .. }) {
            return Err(TransitionError::Illegal {
                state: self.lifecycle.view().label(),
                event: TagEvent::ReentryElapsed.label(),
            }
            .into());
        }
        if !self.reentry_delay.is_zero() {
            tokio::time::sleep(self.reentry_delay).await;
        }
        self.lifecycle.apply(TagEvent::ReentryElapsed)?;
        self.resolve_pending().await
    }

    pub fn return_home(&mut self) -> &TagView {
        self.lifecycle = TagLifecycle::default();
        self.lifecycle.view()
    }

    async fn resolve_pending(&mut self) -> Result<&TagView, SessionError> {
        let TagView::Resolving { tag_id } = self.lifecycle.view() else {
            return Ok(self.lifecycle.view());
        };
        let tag_id = tag_id.clone();
        let event = match self
            .resolution
            .resolve(&tag_id, self.endpoint.as_ref())
            .await
        {
            Ok(resolution) => TagEvent::Resolved(resolution),
            Err(error) => TagEvent::ResolutionFailed(error),
        };
        Ok(self.lifecycle.apply(event)?)
    }
}

fn rejection_message(error: &ActivationInputError) -> String {
    match error {
        ActivationInputError::EmptyItemName => "Enter a name for the item".to_string(),
        ActivationInputError::EmptyOwnerContact => {
            "Enter a phone number the finder can reach".to_string()
        }
        ActivationInputError::EmptyTagId => error.to_string(),
    }
}
