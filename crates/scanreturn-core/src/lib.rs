pub mod activation;
pub mod cache;
pub mod config;
pub mod contact;
pub mod context;
pub mod dashboard;
pub mod gateway;
pub mod lifecycle;
pub mod medium;
pub mod record;
pub mod resolution;
pub mod scan;
pub mod suggest;

pub use activation::{ActivationEngine, ActivationOutcome};
pub use cache::LocalRecordCache;
pub use config::{
    ConfigError, EndpointSettings, EndpointSource, ResolvedEndpoint, ScanReturnConfig,
};
pub use contact::{MessagingService, default_finder_message, normalize_contact_digits};
pub use context::{ContextError, ScanReturnContext};
pub use dashboard::DashboardStats;
pub use gateway::{
    HttpRecordGateway, HttpRecordGatewayConfig, LookupOutcome, RecordGateway, RemoteEndpoint,
    WriteOutcome,
};
pub use lifecycle::{SessionError, TagEvent, TagLifecycle, TagSession, TagView, TransitionError};
pub use medium::{FileMedium, KeyValueMedium, MediumError, MemoryMedium};
pub use record::{ActivationInputError, ActivationRequest, TagRecord, TagStatus};
pub use resolution::{Resolution, ResolutionEngine, ResolutionSource, ResolveError};
pub use scan::{batch_scan_urls, batch_tag_ids, scan_url, tag_id_from_scan};
pub use suggest::{MessageSuggester, SuggestError, Suggestions};
