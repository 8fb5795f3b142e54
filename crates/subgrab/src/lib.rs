// Subtitle extraction from HLS and DASH manifests
pub mod config;
pub mod error;
pub mod events;
pub mod extractor;
pub mod fetcher;
pub mod language;
pub mod manifest;
pub mod merge;
pub mod naming;
pub mod plan;
pub mod proxy;
pub mod retry;
pub mod transport;

// Export common types for ease of use
pub use config::{DownloaderConfig, ExtractorConfig, FetchConfig};
pub use error::SubgrabError;
pub use events::{ProgressCallback, ProgressEvent};
pub use extractor::{
    DiscoveredManifest, ExportSink, ExtractedTrack, ExtractionReport, SubtitleExtractor,
    TrackFilter, TrackOutcome,
};
pub use fetcher::{FetchResult, ManifestLoader, SegmentFetcher};
pub use manifest::{
    DashPolicy, Dialect, Role, SegmentTemplate, TrackDescriptor, TrackSource, parse_manifest,
};
pub use merge::{Cue, MergedDocument, merge_fragments};
pub use naming::{OutputName, TitleContext, build_name, sanitize_filename};
pub use plan::{SegmentPlan, resolve_segments};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};
pub use retry::RetryPolicy;
pub use transport::{ReqwestTransport, RetrieveRequest, RetrievedResponse, Transport};
