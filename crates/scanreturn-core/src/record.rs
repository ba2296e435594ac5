use serde::{Deserialize, Serialize};

use crate::contact::{MessagingService, normalize_contact_digits};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagStatus {
    /// Never activated; the scan should offer the activation flow.
    New,
    /// Bound to an item and an owner contact.
    #[serde(alias = "found")]
    Active,
}

impl TagStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Active => "active",
        }
    }
}

/// Binding state of one physical tag.
///
/// An `Active` record always carries an item name and at least one of the
/// raw owner contact or a contact link. Deserialized entries that claim to
/// be active without those fields are read back as `New`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "TagRecordWire")]
pub struct TagRecord {
    tag_id: String,
    status: TagStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    contact_uri: Option<String>,
}

impl TagRecord {
    #[must_use]
    pub fn unbound(tag_id: impl Into<String>) -> Self {
        Self {
            tag_id: tag_id.into(),
            status: TagStatus::New,
            item_name: None,
            owner_contact: None,
            contact_uri: None,
        }
    }

    /// Active record whose contact link is derived from the raw contact.
    #[must_use]
    pub fn active(
        tag_id: impl Into<String>,
        item_name: impl Into<String>,
        owner_contact: &str,
        messaging: &MessagingService,
    ) -> Self {
        let digits = normalize_contact_digits(owner_contact);
        Self {
            tag_id: tag_id.into(),
            status: TagStatus::Active,
            item_name: Some(item_name.into()),
            contact_uri: Some(messaging.uri_for(&digits)),
            owner_contact: Some(digits),
        }
    }

    /// Builds a record from loosely-typed parts, falling back to `New`
    /// whenever the parts cannot form a valid active binding.
    #[must_use]
    pub fn from_parts(
        tag_id: impl Into<String>,
        item_name: Option<String>,
        owner_contact: Option<String>,
        contact_uri: Option<String>,
    ) -> Self {
        let tag_id = tag_id.into();
        let item_name = item_name.and_then(non_empty);
        let owner_contact = owner_contact.and_then(non_empty);
        let contact_uri = contact_uri.and_then(non_empty);

        match item_name {
            Some(item_name) if owner_contact.is_some() || contact_uri.is_some() => Self {
                tag_id,
                status: TagStatus::Active,
                item_name: Some(item_name),
                owner_contact,
                contact_uri,
            },
            _ => Self::unbound(tag_id),
        }
    }

    #[must_use]
    pub fn tag_id(&self) -> &str {
        &self.tag_id
    }

    #[must_use]
    pub fn status(&self) -> TagStatus {
        self.status
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == TagStatus::Active
    }

    #[must_use]
    pub fn item_name(&self) -> Option<&str> {
        self.item_name.as_deref()
    }

    #[must_use]
    pub fn owner_contact(&self) -> Option<&str> {
        self.owner_contact.as_deref()
    }

    #[must_use]
    pub fn contact_uri(&self) -> Option<&str> {
        self.contact_uri.as_deref()
    }
}

/// Permissive shape accepted from the cache document.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TagRecordWire {
    tag_id: String,
    status: TagStatus,
    #[serde(default)]
    item_name: Option<String>,
    #[serde(default, alias = "ownerPhone")]
    owner_contact: Option<String>,
    #[serde(default, alias = "redirectUrl")]
    contact_uri: Option<String>,
}

impl From<TagRecordWire> for TagRecord {
    fn from(wire: TagRecordWire) -> Self {
        match wire.status {
            TagStatus::New => Self::unbound(wire.tag_id),
            TagStatus::Active => Self::from_parts(
                wire.tag_id,
                wire.item_name,
                wire.owner_contact,
                wire.contact_uri,
            ),
        }
    }
}

/// Request to bind an item and owner contact to a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRequest {
    pub tag_id: String,
    pub item_name: String,
    pub owner_contact: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActivationInputError {
    #[error("tag id must not be empty")]
    EmptyTagId,
    #[error("item name must not be empty")]
    EmptyItemName,
    #[error("owner contact must contain digits")]
    EmptyOwnerContact,
}

impl ActivationRequest {
    #[must_use]
    pub fn new(
        tag_id: impl Into<String>,
        item_name: impl Into<String>,
        owner_contact: impl Into<String>,
    ) -> Self {
        Self {
            tag_id: tag_id.into(),
            item_name: item_name.into(),
            owner_contact: owner_contact.into(),
        }
    }

    /// Trims the text fields and reduces the contact to digits only.
    pub fn normalized(&self) -> Result<Self, ActivationInputError> {
        let tag_id = self.tag_id.trim();
        if tag_id.is_empty() {
            return Err(ActivationInputError::EmptyTagId);
        }
        let item_name = self.item_name.trim();
        if item_name.is_empty() {
            return Err(ActivationInputError::EmptyItemName);
        }
        let owner_contact = normalize_contact_digits(&self.owner_contact);
        if owner_contact.is_empty() {
            return Err(ActivationInputError::EmptyOwnerContact);
        }
        Ok(Self {
            tag_id: tag_id.to_string(),
            item_name: item_name.to_string(),
            owner_contact,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
