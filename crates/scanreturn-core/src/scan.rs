use url::Url;

use crate::cache::sequential_tag_id;
use crate::gateway::LOOKUP_TAG_PARAM;

/// Link a printed tag encodes: `<base>?tag=<id>`.
#[must_use]
pub fn scan_url(base: &str, tag_id: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{base}{separator}{LOOKUP_TAG_PARAM}={}",
        urlencoding::encode(tag_id.trim())
    )
}

#[must_use]
pub fn batch_tag_ids(start: u32, count: u32) -> Vec<String> {
    (0..count)
        .map_while(|offset| start.checked_add(offset))
        .map(sequential_tag_id)
        .collect()
}

/// `(tag_id, scan_url)` pairs for a print batch.
#[must_use]
pub fn batch_scan_urls(base: &str, start: u32, count: u32) -> Vec<(String, String)> {
    batch_tag_ids(start, count)
        .into_iter()
        .map(|tag_id| {
            let url = scan_url(base, &tag_id);
            (tag_id, url)
        })
        .collect()
}

/// Tag id selected by a scanned link or typed as a bare id.
///
/// Returns `None` for blank input and for links without a `tag` parameter,
/// which route to the landing view.
#[must_use]
pub fn tag_id_from_scan(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url
            .query_pairs()
            .find(|(key, _)| key == LOOKUP_TAG_PARAM)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        _ => Some(input.to_string()),
    }
}
