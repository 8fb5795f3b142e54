use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::proxy::ProxyConfig;
use crate::retry::RetryPolicy;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/142.0.0.0 Safari/537.36";

/// HTTP client options for one retrieval path.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout applied by the client (zero disables it)
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    pub follow_redirects: bool,

    pub user_agent: String,

    /// Headers sent with every request
    pub headers: HeaderMap,

    /// Query parameters appended to every request
    pub params: Vec<(String, String)>,

    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if no explicit proxy is set
    pub use_system_proxy: bool,

    /// Maximum idle connections to keep per host
    pub pool_max_idle_per_host: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            connect_timeout: Duration::from_secs(10),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            params: Vec::new(),
            proxy: None,
            use_system_proxy: true,
            pool_max_idle_per_host: 32,
        }
    }
}

impl DownloaderConfig {
    /// Returns `config` with its custom headers layered over the defaults.
    pub fn with_config(config: DownloaderConfig) -> Self {
        let mut headers = DownloaderConfig::get_default_headers();
        merge_headers(&mut headers, &config.headers);

        Self { headers, ..config }
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate"),
        );
        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        default_headers
    }
}

/// Layer `overrides` over `base`. A name present in `overrides` replaces every
/// value `base` had for it; repeated values within `overrides` are all kept.
pub fn merge_headers(base: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        base.remove(name);
    }
    for (name, value) in overrides.iter() {
        base.append(name.clone(), value.clone());
    }
}

/// Bounded-batch segment retrieval settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum segment retrievals in flight at once; also the batch size.
    pub concurrency: usize,
    /// Per-attempt timeout for a single segment retrieval.
    pub segment_timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1000,
            segment_timeout: Duration::from_secs(20),
        }
    }
}

impl FetchConfig {
    /// Batch size actually used; a zero cap would never make progress.
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Top-level configuration for a [`crate::SubtitleExtractor`].
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Primary retrieval path
    pub downloader: DownloaderConfig,
    /// Fallback retrieval path, attempted when the primary path fails a segment
    pub fallback: Option<DownloaderConfig>,
    pub fetch: FetchConfig,
    /// Retry policy for manifest and sub-playlist fetches
    pub manifest_retry: RetryPolicy,
    /// Per-attempt timeout for manifest and sub-playlist fetches
    pub manifest_timeout: Duration,
    /// Delay inserted between successive track downloads
    pub track_pacing: Duration,
    /// Display tag substituted for the undetermined language in output names
    pub undetermined_language: Option<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            downloader: DownloaderConfig::default(),
            fallback: None,
            fetch: FetchConfig::default(),
            manifest_retry: RetryPolicy::default(),
            manifest_timeout: Duration::from_secs(15),
            track_pacing: Duration::from_millis(300),
            undetermined_language: None,
        }
    }
}

impl ExtractorConfig {
    pub fn with_downloader(mut self, downloader: DownloaderConfig) -> Self {
        self.downloader = downloader;
        self
    }

    pub fn with_fallback(mut self, fallback: DownloaderConfig) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch.concurrency = concurrency;
        self
    }

    pub fn with_segment_timeout(mut self, timeout: Duration) -> Self {
        self.fetch.segment_timeout = timeout;
        self
    }

    pub fn with_manifest_retry(mut self, policy: RetryPolicy) -> Self {
        self.manifest_retry = policy;
        self
    }

    pub fn with_track_pacing(mut self, pacing: Duration) -> Self {
        self.track_pacing = pacing;
        self
    }

    pub fn with_undetermined_language(mut self, tag: impl Into<String>) -> Self {
        self.undetermined_language = Some(tag.into());
        self
    }
}
