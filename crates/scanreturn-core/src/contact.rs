//! Owner contact normalization and messaging deep links.

use crate::record::TagRecord;

pub const DEFAULT_MESSAGING_BASE_URL: &str = "https://wa.me";

/// Strips everything except ASCII digits. Idempotent.
#[must_use]
pub fn normalize_contact_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

#[must_use]
pub fn default_finder_message(item_name: Option<&str>) -> String {
    let item = item_name
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("item");
    format!("Hi, I found your {item}. How can I return it?")
}

/// Messaging service that owner contact links point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingService {
    base_url: String,
}

impl Default for MessagingService {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGING_BASE_URL)
    }
}

impl MessagingService {
    #[must_use]
    pub fn new(base_url: impl AsRef<str>) -> Self {
        let trimmed = base_url.as_ref().trim().trim_end_matches('/');
        let base_url = if trimmed.is_empty() {
            DEFAULT_MESSAGING_BASE_URL
        } else {
            trimmed
        };
        Self {
            base_url: base_url.to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn uri_for(&self, digits: &str) -> String {
        format!("{}/{}", self.base_url, digits)
    }

    /// Ready-to-open link for an active record with `message` prefilled.
    ///
    /// A gateway-supplied contact link wins over the raw contact, so masked
    /// numbers stay masked.
    #[must_use]
    pub fn contact_link(&self, record: &TagRecord, message: &str) -> Option<String> {
        if !record.is_active() {
            return None;
        }
        let base = match (record.contact_uri(), record.owner_contact()) {
            (Some(uri), _) => uri.to_string(),
            (None, Some(contact)) => self.uri_for(&normalize_contact_digits(contact)),
            (None, None) => return None,
        };
        let separator = if base.contains('?') { '&' } else { '?' };
        Some(format!(
            "{base}{separator}text={}",
            urlencoding::encode(message)
        ))
    }
}
