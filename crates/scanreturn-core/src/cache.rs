use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::contact::MessagingService;
use crate::medium::{KeyValueMedium, MediumError};
use crate::record::TagRecord;

pub const RECORDS_KEY: &str = "scanreturn.records.v1";
pub const DEFAULT_SEED_COUNT: u32 = 10;
pub const SAMPLE_ACTIVE_TAG_ID: &str = "ID_0001";
pub const SAMPLE_ACTIVE_ITEM_NAME: &str = "Vintage Leather Wallet";
pub const SAMPLE_ACTIVE_CONTACT: &str = "15551234567";

const RECORDS_SCHEMA_VERSION: u32 = 1;

/// Sequential tag id in the manufacturing format, e.g. `ID_0007`.
#[must_use]
pub fn sequential_tag_id(index: u32) -> String {
    format!("ID_{index:04}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecordsDocument {
    version: u32,
    records: BTreeMap<String, TagRecord>,
}

/// Durable local mirror of tag records.
///
/// Never fails: medium errors are logged and the cache behaves as if the
/// entry were absent (reads) or the write never happened (writes).
/// Entries never expire and writes are last-write-wins.
pub struct LocalRecordCache {
    medium: Arc<dyn KeyValueMedium>,
    messaging: MessagingService,
    seed_count: u32,
    seeded: AtomicBool,
}

impl LocalRecordCache {
    #[must_use]
    pub fn new(medium: Arc<dyn KeyValueMedium>, messaging: MessagingService) -> Self {
        Self {
            medium,
            messaging,
            seed_count: DEFAULT_SEED_COUNT,
            seeded: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn with_seed_count(mut self, seed_count: u32) -> Self {
        self.seed_count = seed_count;
        self
    }

    #[must_use]
    pub fn messaging(&self) -> &MessagingService {
        &self.messaging
    }

    /// Writes the demo set if, and only if, the store is empty. Runs at most
    /// once per cache instance.
    pub fn ensure_seeded(&self) {
        if self.seeded.swap(true, Ordering::SeqCst) {
            return;
        }
        let records = match self.load_records() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, "Skipping cache seed; medium unreadable");
                return;
            }
        };
        if !records.is_empty() {
            return;
        }

        let mut seed = BTreeMap::new();
        for index in 1..=self.seed_count {
            let tag_id = sequential_tag_id(index);
            seed.insert(tag_id.clone(), TagRecord::unbound(tag_id));
        }
        seed.insert(
            SAMPLE_ACTIVE_TAG_ID.to_string(),
            TagRecord::active(
                SAMPLE_ACTIVE_TAG_ID,
                SAMPLE_ACTIVE_ITEM_NAME,
                SAMPLE_ACTIVE_CONTACT,
                &self.messaging,
            ),
        );
        tracing::debug!(entries = seed.len(), "Seeding local record cache");
        self.store_records(&seed);
    }

    /// Cached record for `tag_id`, or a synthesized unbound record that is
    /// not persisted.
    #[must_use]
    pub fn get(&self, tag_id: &str) -> TagRecord {
        self.load_records()
            .unwrap_or_else(|error| {
                tracing::warn!(%error, tag_id, "Cache read failed; treating entry as absent");
                BTreeMap::new()
            })
            .remove(tag_id)
            .unwrap_or_else(|| TagRecord::unbound(tag_id))
    }

    /// Upserts `record` under its tag id.
    pub fn put(&self, record: TagRecord) {
        // An unreadable medium or foreign schema version must not be overwritten.
        // Unparseable garbage reads as empty and is replaced.
        let mut records = match self.load_records() {
            Ok(records) => records,
            Err(error) => {
                tracing::warn!(%error, tag_id = record.tag_id(), "Cache write skipped");
                return;
            }
        };
        records.insert(record.tag_id().to_string(), record);
        self.store_records(&records);
    }

    /// All cached records ordered by tag id, seeding first.
    #[must_use]
    pub fn list(&self) -> Vec<TagRecord> {
        self.ensure_seeded();
        self.load_records()
            .unwrap_or_default()
            .into_values()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.load_records().map(|records| records.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load_records(&self) -> Result<BTreeMap<String, TagRecord>, MediumError> {
        let Some(raw) = self.medium.get_item(RECORDS_KEY)? else {
            return Ok(BTreeMap::new());
        };
        let mut records = match serde_json::from_str::<RecordsDocument>(&raw) {
            Ok(document) if document.version == RECORDS_SCHEMA_VERSION => document.records,
            // Another schema version belongs to a different build; leave it untouched.
            Ok(document) => {
                return Err(MediumError::Read {
                    key: RECORDS_KEY.to_string(),
                    message: format!("unsupported_document_version:{}", document.version),
                });
            }
            Err(error) => {
                tracing::warn!(%error, "Ignoring unparseable cache document");
                return Ok(BTreeMap::new());
            }
        };
        records.retain(|tag_id, record| {
            let consistent = record.tag_id() == tag_id;
            if !consistent {
                tracing::warn!(
                    tag_id = tag_id.as_str(),
                    stored_tag_id = record.tag_id(),
                    "Dropping cache entry filed under another tag id"
                );
            }
            consistent
        });
        Ok(records)
    }

    fn store_records(&self, records: &BTreeMap<String, TagRecord>) {
        let document = RecordsDocument {
            version: RECORDS_SCHEMA_VERSION,
            records: records.clone(),
        };
        let encoded = match serde_json::to_string(&document) {
            Ok(encoded) => encoded,
            Err(error) => {
                tracing::warn!(%error, "Cache encode failed");
                return;
            }
        };
        if let Err(error) = self.medium.set_item(RECORDS_KEY, &encoded) {
            tracing::warn!(%error, "Cache write failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::medium::MemoryMedium;
    use crate::record::TagStatus;

    /// Medium standing in for storage the process is not allowed to touch.
    pub(crate) struct DeniedMedium;

    impl KeyValueMedium for DeniedMedium {
        fn get_item(&self, _key: &str) -> Result<Option<String>, MediumError> {
            Err(MediumError::Unavailable("storage denied".to_string()))
        }

        fn set_item(&self, _key: &str, _value: &str) -> Result<(), MediumError> {
            Err(MediumError::Unavailable("storage denied".to_string()))
        }

        fn remove_item(&self, _key: &str) -> Result<(), MediumError> {
            Err(MediumError::Unavailable("storage denied".to_string()))
        }
    }

    fn memory_cache() -> (Arc<MemoryMedium>, LocalRecordCache) {
        let medium = Arc::new(MemoryMedium::default());
        let cache = LocalRecordCache::new(medium.clone(), MessagingService::default());
        (medium, cache)
    }

    #[test]
    fn seeding_creates_sequential_ids_and_one_active_sample() {
        let (_medium, cache) = memory_cache();
        cache.ensure_seeded();

        let records = cache.list();
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].tag_id(), "ID_0001");
        assert_eq!(records[9].tag_id(), "ID_0010");
        assert_eq!(
            records.iter().filter(|record| record.is_active()).count(),
            1
        );

        let sample = cache.get(SAMPLE_ACTIVE_TAG_ID);
        assert_eq!(sample.item_name(), Some(SAMPLE_ACTIVE_ITEM_NAME));
        assert_eq!(sample.contact_uri(), Some("https://wa.me/15551234567"));
    }

    #[test]
    fn seeding_is_idempotent_and_never_touches_non_empty_store() {
        let (medium, cache) = memory_cache();
        cache.put(TagRecord::unbound("CUSTOM_1"));
        cache.ensure_seeded();
        cache.ensure_seeded();
        assert_eq!(cache.len(), 1);

        // A second process lifetime over the same medium still leaves it alone.
        let restarted = LocalRecordCache::new(medium, MessagingService::default());
        restarted.ensure_seeded();
        assert_eq!(restarted.len(), 1);
        assert_eq!(restarted.get("ID_0001").status(), TagStatus::New);
    }

    #[test]
    fn seed_count_is_configurable() {
        let medium = Arc::new(MemoryMedium::default());
        let cache = LocalRecordCache::new(medium, MessagingService::default()).with_seed_count(3);
        cache.ensure_seeded();
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn get_synthesizes_unbound_record_without_persisting() {
        let (_medium, cache) = memory_cache();
        let record = cache.get("ID_0099");
        assert_eq!(record, TagRecord::unbound("ID_0099"));
        assert!(cache.is_empty());
    }

    #[test]
    fn put_overwrites_unconditionally() {
        let (_medium, cache) = memory_cache();
        let messaging = MessagingService::default();
        cache.put(TagRecord::active("ID_5", "Keys", "111", &messaging));
        cache.put(TagRecord::active("ID_5", "Umbrella", "222", &messaging));
        let record = cache.get("ID_5");
        assert_eq!(record.item_name(), Some("Umbrella"));
        assert_eq!(record.owner_contact(), Some("222"));

        cache.put(TagRecord::unbound("ID_5"));
        assert_eq!(cache.get("ID_5").status(), TagStatus::New);
    }

    #[test]
    fn corrupt_document_reads_as_empty_and_is_replaced_on_write() {
        let (medium, cache) = memory_cache();
        medium
            .set_item(RECORDS_KEY, "<html>quota exceeded</html>")
            .expect("write corrupt");
        assert_eq!(cache.get("ID_0001"), TagRecord::unbound("ID_0001"));

        cache.put(TagRecord::unbound("ID_0002"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn newer_document_version_is_left_untouched() {
        let (medium, cache) = memory_cache();
        let newer = r#"{"version":2,"records":{"ID_0001":{"tagId":"ID_0001","status":"new"}}}"#;
        medium.set_item(RECORDS_KEY, newer).expect("write newer");

        cache.ensure_seeded();
        cache.put(TagRecord::unbound("ID_0002"));
        assert_eq!(cache.get("ID_0002"), TagRecord::unbound("ID_0002"));
        assert_eq!(
            medium.get_item(RECORDS_KEY).expect("read"),
            Some(newer.to_string())
        );
    }

    #[test]
    fn entry_filed_under_another_key_is_dropped() {
        let (medium, cache) = memory_cache();
        medium
            .set_item(
                RECORDS_KEY,
                r#"{"version":1,"records":{
                    "ID_0003":{"tagId":"ID_0009","status":"active","itemName":"Keys","ownerContact":"123"},
                    "ID_0004":{"tagId":"ID_0004","status":"active","itemName":"Bag","ownerContact":"456"}
                }}"#,
            )
            .expect("write document");

        let record = cache.get("ID_0003");
        assert_eq!(record, TagRecord::unbound("ID_0003"));
        assert_eq!(cache.get("ID_0004").item_name(), Some("Bag"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn denied_medium_degrades_to_no_ops() {
        let cache = LocalRecordCache::new(Arc::new(DeniedMedium), MessagingService::default());
        cache.ensure_seeded();
        cache.put(TagRecord::active(
            "ID_1",
            "Keys",
            "123",
            &MessagingService::default(),
        ));
        assert_eq!(cache.get("ID_1"), TagRecord::unbound("ID_1"));
        assert!(cache.list().is_empty());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn records_persist_across_file_backed_instances() {
        let temp = tempfile::tempdir().expect("temp dir");
        let messaging = MessagingService::default();
        let first = LocalRecordCache::new(
            Arc::new(crate::medium::FileMedium::new(temp.path())),
            messaging.clone(),
        );
        first.ensure_seeded();
        first.put(TagRecord::active("ID_0004", "Laptop", "+1 555 222", &messaging));

        let second = LocalRecordCache::new(
            Arc::new(crate::medium::FileMedium::new(temp.path())),
            messaging,
        );
        assert_eq!(second.get("ID_0004").item_name(), Some("Laptop"));
        assert_eq!(second.len(), 10);
    }
}
