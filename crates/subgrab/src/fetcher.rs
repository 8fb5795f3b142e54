// Network retrieval for manifests (retried) and segments (fail fast, bounded batches).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::join_all;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::config::FetchConfig;
use crate::events::{ProgressCallback, ProgressEvent, emit};
use crate::plan::SegmentPlan;
use crate::retry::{RetryAction, RetryPolicy, retry_with_backoff};
use crate::transport::{RetrieveRequest, RetrievedResponse, Transport};
use crate::SubgrabError;

/// Fetches manifests and sub-playlists, retrying transient failures.
///
/// A 404 is reported as [`SubgrabError::NotFound`] and never retried.
#[derive(Clone)]
pub struct ManifestLoader {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
    timeout: Duration,
    token: CancellationToken,
}

impl ManifestLoader {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            policy,
            timeout,
            token: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub async fn fetch_text(&self, url: &Url) -> Result<String, SubgrabError> {
        let request = RetrieveRequest::get(self.timeout);
        debug!(url = %url, "Fetching manifest");

        retry_with_backoff(&self.policy, &self.token, |attempt| {
            let request = &request;
            async move {
                if attempt > 0 {
                    trace!(url = %url, attempt, "Manifest retry attempt");
                }
                let result = bounded(self.timeout, url, self.transport.retrieve(url, request)).await;
                match result {
                    Ok(response) if response.status == StatusCode::NOT_FOUND => {
                        RetryAction::Fail(SubgrabError::NotFound {
                            resource: url.to_string(),
                        })
                    }
                    Ok(response) if response.status.is_success() => {
                        RetryAction::Success(response.text())
                    }
                    Ok(response) => RetryAction::from(Err::<String, _>(SubgrabError::http_status(
                        response.status,
                        url.as_str(),
                    ))),
                    Err(e) => RetryAction::from(Err::<String, _>(e)),
                }
            }
        })
        .await
    }

    /// Fetch a track delivered as one document.
    ///
    /// The primary path is retried under the policy; the fallback path, when
    /// present, gets its own retried attempt only after the primary gives up.
    /// A 404 on either path is an empty result. The last error surfaces as is.
    pub async fn fetch_document(
        &self,
        url: &Url,
        fallback: Option<&Arc<dyn Transport>>,
    ) -> Result<FetchResult, SubgrabError> {
        let primary_error = match self.fetch_text(url).await {
            Ok(text) => return Ok(FetchResult::Success(text)),
            Err(SubgrabError::NotFound { .. }) => return Ok(FetchResult::Empty),
            Err(e @ SubgrabError::Cancelled) => return Err(e),
            Err(e) => e,
        };

        let Some(fallback) = fallback else {
            return Err(primary_error);
        };
        warn!(url = %url, error = %primary_error, "Primary path failed, trying fallback");
        let loader = Self {
            transport: fallback.clone(),
            ..self.clone()
        };
        match loader.fetch_text(url).await {
            Ok(text) => Ok(FetchResult::Success(text)),
            Err(SubgrabError::NotFound { .. }) => Ok(FetchResult::Empty),
            Err(e) => Err(e),
        }
    }
}

/// Outcome of one segment retrieval, aligned with its plan position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Success(String),
    /// The origin answered 404; the segment is legitimately absent.
    Empty,
    Error(String),
}

impl FetchResult {
    pub fn is_error(&self) -> bool {
        matches!(self, FetchResult::Error(_))
    }

    /// Fragment text handed to the merge engine. Failed segments become a
    /// `NOTE` block so the merged document marks the gap.
    pub fn into_fragment(self, index: usize) -> String {
        match self {
            FetchResult::Success(text) => text,
            FetchResult::Empty => String::new(),
            FetchResult::Error(reason) => {
                let reason = reason.replace(['\r', '\n'], " ");
                format!("NOTE segment {} fetch error: {reason}\n", index + 1)
            }
        }
    }
}

/// Retrieves a [`SegmentPlan`] in contiguous batches of at most
/// `concurrency` requests, each batch awaited in full before the next.
pub struct SegmentFetcher {
    primary: Arc<dyn Transport>,
    fallback: Option<Arc<dyn Transport>>,
    config: FetchConfig,
    progress: Option<ProgressCallback>,
    token: Option<CancellationToken>,
}

impl SegmentFetcher {
    pub fn new(primary: Arc<dyn Transport>, config: FetchConfig) -> Self {
        Self {
            primary,
            fallback: None,
            config,
            progress: None,
            token: None,
        }
    }

    /// Path attempted once when the primary path fails a segment.
    pub fn with_fallback(mut self, fallback: Arc<dyn Transport>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Checked between batches; in-flight batches always run to completion.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Returns one [`FetchResult`] per plan entry, in plan order.
    ///
    /// Only cancellation fails the call; per-segment failures land in their slot.
    pub async fn fetch(&self, plan: &SegmentPlan) -> Result<Vec<FetchResult>, SubgrabError> {
        let total = plan.len();
        let batch_size = self.config.effective_concurrency();
        let completed = AtomicUsize::new(0);
        let mut results = Vec::with_capacity(total);

        debug!(segments = total, batch_size, "Fetching segments");

        for (batch_index, batch) in plan.urls().chunks(batch_size).enumerate() {
            if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(SubgrabError::Cancelled);
            }
            trace!(batch = batch_index, len = batch.len(), "Starting batch");

            let outcomes = join_all(batch.iter().map(|url| {
                let completed = &completed;
                async move {
                    let outcome = self.fetch_one(url).await;
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    emit(
                        self.progress.as_ref(),
                        ProgressEvent::SegmentCompleted {
                            completed: done,
                            total,
                            url: url.clone(),
                        },
                    );
                    outcome
                }
            }))
            .await;
            results.extend(outcomes);
        }

        let failed = results.iter().filter(|r| r.is_error()).count();
        if failed > 0 {
            warn!(failed, total, "Some segments could not be fetched");
        }
        Ok(results)
    }

    async fn fetch_one(&self, url: &Url) -> FetchResult {
        let primary_error = match self.attempt(self.primary.as_ref(), url).await {
            Ok(result) => return result,
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            debug!(url = %url, error = %primary_error, "Segment fetch failed");
            return FetchResult::Error(primary_error.to_string());
        };

        debug!(url = %url, error = %primary_error, "Primary path failed, trying fallback");
        match self.attempt(fallback.as_ref(), url).await {
            Ok(result) => result,
            Err(e) => {
                debug!(url = %url, error = %e, "Fallback path failed");
                FetchResult::Error(e.to_string())
            }
        }
    }

    /// One retrieval. `Ok` covers success and 404; everything else is an error.
    async fn attempt(&self, transport: &dyn Transport, url: &Url) -> Result<FetchResult, SubgrabError> {
        let timeout = self.config.segment_timeout;
        let request = RetrieveRequest::get(timeout);
        let response = bounded(timeout, url, transport.retrieve(url, &request)).await?;

        if response.status == StatusCode::NOT_FOUND {
            trace!(url = %url, "Segment not found, treating as empty");
            return Ok(FetchResult::Empty);
        }
        if !response.status.is_success() {
            return Err(SubgrabError::http_status(response.status, url.as_str()));
        }
        Ok(FetchResult::Success(response.text()))
    }
}

async fn bounded<F>(timeout: Duration, url: &Url, fut: F) -> Result<RetrievedResponse, SubgrabError>
where
    F: Future<Output = Result<RetrievedResponse, SubgrabError>>,
{
    if timeout.is_zero() {
        return fut.await;
    }
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(SubgrabError::timeout(url.as_str(), timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{MockTransport, Reply};
    use std::sync::Mutex;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn plan_of(urls: &[&str]) -> SegmentPlan {
        SegmentPlan::segmented("test", urls.iter().map(|u| url(u)).collect()).unwrap()
    }

    fn config(concurrency: usize) -> FetchConfig {
        FetchConfig {
            concurrency,
            segment_timeout: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn results_follow_plan_order_not_completion_order() {
        let transport = MockTransport::new()
            .route_delayed(
                "https://s/0.vtt",
                vec![Reply::Status(StatusCode::OK, "zero".into())],
                Duration::from_millis(30),
            )
            .route_delayed(
                "https://s/1.vtt",
                vec![Reply::Status(StatusCode::OK, "one".into())],
                Duration::from_millis(1),
            )
            .ok("https://s/2.vtt", "two");
        let fetcher = SegmentFetcher::new(Arc::new(transport), config(10));

        let results = fetcher
            .fetch(&plan_of(&["https://s/0.vtt", "https://s/1.vtt", "https://s/2.vtt"]))
            .await
            .unwrap();
        assert_eq!(
            results,
            vec![
                FetchResult::Success("zero".into()),
                FetchResult::Success("one".into()),
                FetchResult::Success("two".into()),
            ]
        );
    }

    #[tokio::test]
    async fn not_found_is_empty_and_attempted_once() {
        let transport = Arc::new(MockTransport::new().route(
            "https://s/missing.vtt",
            vec![Reply::Status(StatusCode::NOT_FOUND, String::new())],
        ));
        let fallback = Arc::new(MockTransport::new());
        let fetcher = SegmentFetcher::new(transport.clone(), config(4)).with_fallback(fallback.clone());

        let results = fetcher.fetch(&plan_of(&["https://s/missing.vtt"])).await.unwrap();
        assert_eq!(results, vec![FetchResult::Empty]);
        assert_eq!(transport.attempts("https://s/missing.vtt"), 1);
        assert_eq!(fallback.attempts("https://s/missing.vtt"), 0);
    }

    #[tokio::test]
    async fn fallback_recovers_failed_segment() {
        let primary = Arc::new(MockTransport::new().route(
            "https://s/0.vtt",
            vec![Reply::Status(StatusCode::FORBIDDEN, String::new())],
        ));
        let fallback = Arc::new(MockTransport::new().ok("https://s/0.vtt", "from fallback"));
        let fetcher = SegmentFetcher::new(primary.clone(), config(4)).with_fallback(fallback.clone());

        let results = fetcher.fetch(&plan_of(&["https://s/0.vtt"])).await.unwrap();
        assert_eq!(results, vec![FetchResult::Success("from fallback".into())]);
        assert_eq!(primary.attempts("https://s/0.vtt"), 1);
        assert_eq!(fallback.attempts("https://s/0.vtt"), 1);
    }

    #[tokio::test]
    async fn failures_stay_in_their_slot() {
        let transport = MockTransport::new()
            .ok("https://s/0.vtt", "a")
            .route("https://s/1.vtt", vec![Reply::ConnectionError])
            .route(
                "https://s/2.vtt",
                vec![Reply::Status(StatusCode::BAD_GATEWAY, String::new())],
            )
            .ok("https://s/3.vtt", "d");
        let fetcher = SegmentFetcher::new(Arc::new(transport), config(2));

        let results = fetcher
            .fetch(&plan_of(&[
                "https://s/0.vtt",
                "https://s/1.vtt",
                "https://s/2.vtt",
                "https://s/3.vtt",
            ]))
            .await
            .unwrap();
        assert_eq!(results.len(), 4);
        assert_eq!(results[0], FetchResult::Success("a".into()));
        assert!(results[1].is_error());
        assert!(results[2].is_error());
        assert_eq!(results[3], FetchResult::Success("d".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_segment_times_out() {
        let transport = MockTransport::new().route("https://s/slow.vtt", vec![Reply::Hang]);
        let fetcher = SegmentFetcher::new(Arc::new(transport), config(1));

        let results = fetcher.fetch(&plan_of(&["https://s/slow.vtt"])).await.unwrap();
        match &results[0] {
            FetchResult::Error(reason) => assert!(reason.contains("timed out")),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrency_cap_is_respected() {
        let urls: Vec<String> = (0..10_000).map(|i| format!("https://s/{i}.vtt")).collect();
        let transport = Arc::new(MockTransport::new());
        let fetcher = SegmentFetcher::new(transport.clone(), config(1000));

        let plan = SegmentPlan::segmented("big", urls.iter().map(|u| url(u)).collect()).unwrap();
        let results = fetcher.fetch(&plan).await.unwrap();

        assert_eq!(results.len(), 10_000);
        assert!(results.iter().all(|r| *r == FetchResult::Empty));
        assert!(transport.max_in_flight() <= 1000);
        assert!(transport.max_in_flight() > 1);
    }

    #[tokio::test]
    async fn progress_is_monotonic() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |event| {
            if let ProgressEvent::SegmentCompleted { completed, total, .. } = event {
                sink.lock().unwrap().push((completed, total));
            }
        });
        let fetcher = SegmentFetcher::new(Arc::new(MockTransport::new()), config(2)).with_progress(callback);

        fetcher
            .fetch(&plan_of(&["https://s/a", "https://s/b", "https://s/c"]))
            .await
            .unwrap();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(1, 3), (2, 3), (3, 3)]);
    }

    #[tokio::test]
    async fn cancelled_before_first_batch() {
        let token = CancellationToken::new();
        token.cancel();
        let fetcher =
            SegmentFetcher::new(Arc::new(MockTransport::new()), config(2)).with_cancellation(token);
        let result = fetcher.fetch(&plan_of(&["https://s/a"])).await;
        assert!(matches!(result, Err(SubgrabError::Cancelled)));
    }

    #[test]
    fn error_slot_renders_note() {
        let note = FetchResult::Error("boom\nagain".into()).into_fragment(2);
        assert_eq!(note, "NOTE segment 3 fetch error: boom again\n");
        assert_eq!(FetchResult::Empty.into_fragment(0), "");
    }

    #[tokio::test]
    async fn manifest_loader_retries_transient_errors() {
        let transport = Arc::new(MockTransport::new().route(
            "https://m/master.m3u8",
            vec![
                Reply::Status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
                Reply::ConnectionError,
                Reply::Status(StatusCode::OK, "#EXTM3U".into()),
            ],
        ));
        let loader = ManifestLoader::new(
            transport.clone(),
            RetryPolicy::fixed(Duration::from_millis(1), 5),
            Duration::from_secs(1),
        );
        let text = loader.fetch_text(&url("https://m/master.m3u8")).await.unwrap();
        assert_eq!(text, "#EXTM3U");
        assert_eq!(transport.attempts("https://m/master.m3u8"), 3);
    }

    #[tokio::test]
    async fn manifest_loader_gives_up_after_policy() {
        let transport = Arc::new(MockTransport::new().route(
            "https://m/master.m3u8",
            vec![Reply::Status(StatusCode::INTERNAL_SERVER_ERROR, String::new())],
        ));
        let loader = ManifestLoader::new(
            transport.clone(),
            RetryPolicy::fixed(Duration::from_millis(1), 2),
            Duration::from_secs(1),
        );
        let err = loader.fetch_text(&url("https://m/master.m3u8")).await.unwrap_err();
        assert!(matches!(err, SubgrabError::HttpStatus { .. }));
        assert_eq!(transport.attempts("https://m/master.m3u8"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn primary_timeout_falls_back() {
        let primary = Arc::new(MockTransport::new().route("https://s/0.vtt", vec![Reply::Hang]));
        let fallback = Arc::new(MockTransport::new().ok("https://s/0.vtt", "late but here"));
        let fetcher = SegmentFetcher::new(primary.clone(), config(1)).with_fallback(fallback.clone());

        let results = fetcher.fetch(&plan_of(&["https://s/0.vtt"])).await.unwrap();
        assert_eq!(results, vec![FetchResult::Success("late but here".into())]);
        assert_eq!(primary.attempts("https://s/0.vtt"), 1);
        assert_eq!(fallback.attempts("https://s/0.vtt"), 1);
    }

    #[tokio::test]
    async fn document_fetch_retries_transient_errors() {
        let transport = Arc::new(MockTransport::new().route(
            "https://x/de_sub.vtt",
            vec![
                Reply::Status(StatusCode::SERVICE_UNAVAILABLE, String::new()),
                Reply::Status(StatusCode::OK, "WEBVTT\n".into()),
            ],
        ));
        let loader = ManifestLoader::new(
            transport.clone(),
            RetryPolicy::fixed(Duration::from_millis(1), 3),
            Duration::from_secs(1),
        );

        let result = loader.fetch_document(&url("https://x/de_sub.vtt"), None).await.unwrap();
        assert_eq!(result, FetchResult::Success("WEBVTT\n".into()));
        assert_eq!(transport.attempts("https://x/de_sub.vtt"), 2);
    }

    #[tokio::test]
    async fn document_fetch_uses_fallback_after_retries() {
        let primary = Arc::new(MockTransport::new().route(
            "https://x/doc.vtt",
            vec![Reply::Status(StatusCode::FORBIDDEN, String::new())],
        ));
        let fallback: Arc<dyn Transport> =
            Arc::new(MockTransport::new().ok("https://x/doc.vtt", "from fallback"));
        let loader = ManifestLoader::new(
            primary.clone(),
            RetryPolicy::fixed(Duration::from_millis(1), 2),
            Duration::from_secs(1),
        );

        let result = loader
            .fetch_document(&url("https://x/doc.vtt"), Some(&fallback))
            .await
            .unwrap();
        assert_eq!(result, FetchResult::Success("from fallback".into()));
        assert_eq!(primary.attempts("https://x/doc.vtt"), 1);
    }

    #[tokio::test]
    async fn document_fetch_surfaces_last_error_and_maps_not_found() {
        let transport = Arc::new(MockTransport::new().route(
            "https://x/down.vtt",
            vec![Reply::Status(StatusCode::SERVICE_UNAVAILABLE, String::new())],
        ));
        let loader = ManifestLoader::new(
            transport.clone(),
            RetryPolicy::fixed(Duration::from_millis(1), 2),
            Duration::from_secs(1),
        );

        let err = loader
            .fetch_document(&url("https://x/down.vtt"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SubgrabError::HttpStatus { .. }));
        assert_eq!(transport.attempts("https://x/down.vtt"), 3);

        let missing = loader
            .fetch_document(&url("https://x/missing.vtt"), None)
            .await
            .unwrap();
        assert_eq!(missing, FetchResult::Empty);
        assert_eq!(transport.attempts("https://x/missing.vtt"), 1);
    }

    #[tokio::test]
    async fn manifest_loader_does_not_retry_not_found() {
        let transport = Arc::new(MockTransport::new());
        let loader = ManifestLoader::new(
            transport.clone(),
            RetryPolicy::fixed(Duration::from_millis(1), 5),
            Duration::from_secs(1),
        );
        let err = loader.fetch_text(&url("https://m/gone.m3u8")).await.unwrap_err();
        assert!(matches!(err, SubgrabError::NotFound { .. }));
        assert_eq!(transport.attempts("https://m/gone.m3u8"), 1);
    }
}
