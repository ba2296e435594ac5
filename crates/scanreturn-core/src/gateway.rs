use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

use crate::contact::{MessagingService, normalize_contact_digits};
use crate::record::{ActivationRequest, TagRecord};

pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 8_000;
pub const LOOKUP_TAG_PARAM: &str = "tag";
pub const FORM_TAG_ID: &str = "tag_id";
pub const FORM_ITEM_NAME: &str = "item_name";
pub const FORM_PHONE: &str = "phone";

const FOUND_STATUS: &str = "found";

/// A well-formed `http(s)://host...` locator of the remote record service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    url: url::Url,
}

impl RemoteEndpoint {
    /// `None` for anything that is not an absolute http(s) URL with a host,
    /// which callers treat as offline mode.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return None;
        }
        let url = url::Url::parse(trimmed).ok()?;
        if url.host_str().is_none_or(str::is_empty) {
            return None;
        }
        Some(Self { url })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    #[must_use]
    pub fn lookup_url(&self, tag_id: &str) -> url::Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair(LOOKUP_TAG_PARAM, tag_id);
        url
    }
}

/// Result of one bounded lookup. Only `Found` and `NotFound` describe the
/// tag; the rest describe the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Found(TagRecord),
    NotFound,
    TimedOut,
    Unreachable { message: String },
    Malformed { message: String },
}

impl LookupOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Found(_) => "found",
            Self::NotFound => "not_found",
            Self::TimedOut => "timed_out",
            Self::Unreachable { .. } => "unreachable",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// `Submitted` only means the request left without a transport error; the
/// service's answer is never read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Submitted,
    Unreachable { message: String },
}

/// Stateless transport to the remote record service. Implementations never
/// retry.
#[async_trait]
pub trait RecordGateway: Send + Sync {
    async fn lookup(&self, endpoint: &RemoteEndpoint, tag_id: &str) -> LookupOutcome;
    async fn write(&self, endpoint: &RemoteEndpoint, request: &ActivationRequest) -> WriteOutcome;
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway_client_build_failed:{message}")]
    ClientBuild { message: String },
}

#[derive(Debug, Clone)]
pub struct HttpRecordGatewayConfig {
    pub lookup_timeout_ms: u64,
    pub messaging: MessagingService,
}

impl Default for HttpRecordGatewayConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: DEFAULT_LOOKUP_TIMEOUT_MS,
            messaging: MessagingService::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpRecordGateway {
    http: reqwest::Client,
    lookup_timeout: Duration,
    messaging: MessagingService,
}

impl HttpRecordGateway {
    pub fn new(config: HttpRecordGatewayConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|error| GatewayError::ClientBuild {
                message: error.to_string(),
            })?;
        Ok(Self {
            http,
            lookup_timeout: Duration::from_millis(config.lookup_timeout_ms.max(1)),
            messaging: config.messaging,
        })
    }

    #[must_use]
    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    async fn fetch_lookup(&self, url: url::Url, tag_id: &str) -> LookupOutcome {
        // Plain GET without custom headers; some deployments reject preflighted requests.
        let response = match self.http.get(url).send().await {
            Ok(response) => response,
            Err(error) => return transport_failure(&error),
        };
        let status = response.status();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(error) => return transport_failure(&error),
        };
        classify_lookup_body(status, &bytes, tag_id, &self.messaging)
    }
}

#[async_trait]
impl RecordGateway for HttpRecordGateway {
    async fn lookup(&self, endpoint: &RemoteEndpoint, tag_id: &str) -> LookupOutcome {
        let url = endpoint.lookup_url(tag_id);
        // Dropping the request future on expiry aborts the transfer and its timer.
        match tokio::time::timeout(self.lookup_timeout, self.fetch_lookup(url, tag_id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    tag_id,
                    timeout_ms = u64::try_from(self.lookup_timeout.as_millis()).unwrap_or(u64::MAX),
                    "Remote lookup timed out"
                );
                LookupOutcome::TimedOut
            }
        }
    }

    async fn write(&self, endpoint: &RemoteEndpoint, request: &ActivationRequest) -> WriteOutcome {
        let form = [
            (FORM_TAG_ID, request.tag_id.as_str()),
            (FORM_ITEM_NAME, request.item_name.as_str()),
            (FORM_PHONE, request.owner_contact.as_str()),
        ];
        match self
            .http
            .post(endpoint.as_str())
            .form(&form[..])
            .send()
            .await
        {
            Ok(response) => {
                tracing::debug!(
                    tag_id = request.tag_id.as_str(),
                    status = response.status().as_u16(),
                    "Activation submitted; response body ignored"
                );
                WriteOutcome::Submitted
            }
            Err(error) => {
                tracing::warn!(tag_id = request.tag_id.as_str(), %error, "Activation write failed");
                WriteOutcome::Unreachable {
                    message: error.to_string(),
                }
            }
        }
    }
}

fn transport_failure(error: &reqwest::Error) -> LookupOutcome {
    if error.is_timeout() {
        return LookupOutcome::TimedOut;
    }
    tracing::warn!(%error, "Remote lookup transport failure");
    LookupOutcome::Unreachable {
        message: error.to_string(),
    }
}

/// Interprets a lookup response body.
///
/// Markup is `Malformed`, never `NotFound`. Any parseable JSON that is not an
/// explicit, complete `found` answer is `NotFound`.
#[must_use]
pub fn classify_lookup_body(
    status: StatusCode,
    body: &[u8],
    tag_id: &str,
    messaging: &MessagingService,
) -> LookupOutcome {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim_start();
    if trimmed.starts_with('<') {
        tracing::warn!(tag_id, status = status.as_u16(), "Lookup returned markup");
        return LookupOutcome::Malformed {
            message: format!("markup_body_http_{}", status.as_u16()),
        };
    }
    if !status.is_success() {
        return LookupOutcome::Unreachable {
            message: format!("lookup_http_{}", status.as_u16()),
        };
    }

    let payload = match serde_json::from_str::<Value>(trimmed) {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(tag_id, %error, "Lookup body is not JSON");
            return LookupOutcome::Malformed {
                message: format!("lookup_json_decode_failed:{error}"),
            };
        }
    };
    let Some(fields) = payload.as_object() else {
        return LookupOutcome::NotFound;
    };
    let found = fields
        .get("status")
        .and_then(Value::as_str)
        .is_some_and(|status| status.trim().eq_ignore_ascii_case(FOUND_STATUS));
    if !found {
        return LookupOutcome::NotFound;
    }

    let item_name = fields.get("item").and_then(scalar_text);
    // The raw phone is kept as sent; only the derived link uses its digits.
    let phone = fields
        .get("phone")
        .and_then(scalar_text)
        .map(|phone| phone.trim().to_string())
        .filter(|phone| !normalize_contact_digits(phone).is_empty());
    let masked_uri = ["redirectUrl", "contactUri", "contact_uri"]
        .iter()
        .find_map(|key| fields.get(*key).and_then(scalar_text));
    let contact_uri = masked_uri.or_else(|| {
        phone
            .as_deref()
            .map(|phone| messaging.uri_for(&normalize_contact_digits(phone)))
    });

    let record = TagRecord::from_parts(tag_id, item_name, phone, contact_uri);
    if record.is_active() {
        LookupOutcome::Found(record)
    } else {
        tracing::warn!(tag_id, "Found response missing item or contact; treating as new");
        LookupOutcome::NotFound
    }
}

// Spreadsheet-backed services return numeric cells as JSON numbers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
