//! Extraction orchestration: manifest discovery, per-track pipeline, export.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::config::ExtractorConfig;
use crate::events::{ProgressCallback, ProgressEvent, emit};
use crate::fetcher::{FetchResult, ManifestLoader, SegmentFetcher};
use crate::language::{display_language, language_matches, resolve_language};
use crate::manifest::{Dialect, DashPolicy, Role, TrackDescriptor, dash, hls};
use crate::merge::{MergedDocument, merge_fragments};
use crate::naming::{OutputName, TitleContext};
use crate::plan::{SegmentPlan, resolve_segments};
use crate::transport::{ReqwestTransport, Transport};
use crate::SubgrabError;

/// Destination for finished documents: a directory, an archive, memory.
#[async_trait]
pub trait ExportSink: Send + Sync {
    async fn export(&self, name: &OutputName, document: Bytes) -> Result<(), SubgrabError>;
}

/// Which tracks of a manifest to extract.
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    /// Tags or English names; empty keeps every language.
    pub languages: Vec<String>,
    pub skip_sdh: bool,
    /// When non-empty, forced tracks are kept only for these languages and
    /// are not subject to `languages`.
    pub forced_languages: Vec<String>,
}

impl TrackFilter {
    pub fn accepts(&self, track: &TrackDescriptor) -> bool {
        match track.role {
            Role::Sdh if self.skip_sdh => false,
            Role::Forced if !self.forced_languages.is_empty() => {
                matches_any(track.language(), &self.forced_languages)
            }
            _ => self.languages.is_empty() || matches_any(track.language(), &self.languages),
        }
    }
}

fn matches_any(language: &str, wanted: &[String]) -> bool {
    wanted
        .iter()
        .any(|w| language_matches(language, resolve_language(w)))
}

/// A parsed manifest and where it came from.
#[derive(Debug, Clone)]
pub struct DiscoveredManifest {
    pub url: Url,
    pub dialect: Dialect,
    pub tracks: Vec<TrackDescriptor>,
}

/// One track carried through the whole pipeline.
#[derive(Debug, Clone)]
pub struct ExtractedTrack {
    pub name: OutputName,
    pub document: MergedDocument,
    /// Segments that failed on every path and appear as `NOTE` markers.
    pub failed_segments: usize,
}

#[derive(Debug)]
pub enum TrackOutcome {
    Exported {
        label: String,
        name: OutputName,
        cues: usize,
        failed_segments: usize,
    },
    Failed {
        label: String,
        error: SubgrabError,
    },
}

#[derive(Debug, Default)]
pub struct ExtractionReport {
    pub outcomes: Vec<TrackOutcome>,
    /// Selected tracks never started because the run was cancelled.
    pub skipped: usize,
}

impl ExtractionReport {
    pub fn exported(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TrackOutcome::Exported { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, TrackOutcome::Failed { .. }))
            .count()
    }

    pub fn is_cancelled(&self) -> bool {
        self.skipped > 0
    }
}

/// Runs manifests through parse, resolve, fetch, merge, name and export.
///
/// ```no_run
/// # use subgrab_engine::{ExtractorConfig, SubtitleExtractor, TitleContext, TrackFilter, ExportSink};
/// # async fn demo(sink: &dyn ExportSink) -> Result<(), subgrab_engine::SubgrabError> {
/// let extractor = SubtitleExtractor::new(ExtractorConfig::default())?;
/// let url = url::Url::parse("https://cdn.example.com/master.m3u8").unwrap();
/// let manifest = extractor.discover(&url, None).await?;
/// let context = TitleContext::new("Some Show", "WEB").with_year("2021");
/// let report = extractor.run(&manifest, &TrackFilter::default(), &context, sink).await;
/// println!("{} exported, {} failed", report.exported(), report.failed());
/// # Ok(())
/// # }
/// ```
pub struct SubtitleExtractor {
    config: ExtractorConfig,
    primary: Arc<dyn Transport>,
    fallback: Option<Arc<dyn Transport>>,
    progress: Option<ProgressCallback>,
    token: CancellationToken,
    dash_policy: DashPolicy,
}

impl SubtitleExtractor {
    /// Build with `reqwest` transports for the primary and optional fallback paths.
    pub fn new(config: ExtractorConfig) -> Result<Self, SubgrabError> {
        let primary: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(&config.downloader)?);
        let fallback = match &config.fallback {
            Some(fallback) => Some(Arc::new(ReqwestTransport::new(fallback)?) as Arc<dyn Transport>),
            None => None,
        };
        Ok(Self::with_transports(config, primary, fallback))
    }

    pub fn with_transports(
        config: ExtractorConfig,
        primary: Arc<dyn Transport>,
        fallback: Option<Arc<dyn Transport>>,
    ) -> Self {
        Self {
            config,
            primary,
            fallback,
            progress: None,
            token: CancellationToken::new(),
            dash_policy: DashPolicy::default(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Override the DASH period/representation tie-breaks for one origin.
    pub fn with_dash_policy(mut self, policy: DashPolicy) -> Self {
        self.dash_policy = policy;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn loader(&self) -> ManifestLoader {
        ManifestLoader::new(
            self.primary.clone(),
            self.config.manifest_retry.clone(),
            self.config.manifest_timeout,
        )
        .with_cancellation(self.token.clone())
    }

    /// Fetch and parse the manifest at `url`.
    pub async fn discover(
        &self,
        url: &Url,
        dialect: Option<Dialect>,
    ) -> Result<DiscoveredManifest, SubgrabError> {
        info!(url = %url, "Discovering subtitle tracks");
        let text = self.loader().fetch_text(url).await?;
        self.parse(url, &text, dialect)
    }

    /// Parse manifest text obtained elsewhere. Without an explicit dialect it
    /// is detected from the body and the URL.
    pub fn parse(
        &self,
        url: &Url,
        text: &str,
        dialect: Option<Dialect>,
    ) -> Result<DiscoveredManifest, SubgrabError> {
        let dialect = match dialect.or_else(|| Dialect::detect(url, text)) {
            Some(dialect) => dialect,
            None => {
                return Err(SubgrabError::parse(
                    Dialect::Hls,
                    format!("{url} is neither an HLS playlist nor a DASH manifest"),
                ));
            }
        };

        let tracks = match dialect {
            Dialect::Hls => hls::parse(text, url)?,
            Dialect::Dash => dash::parse(text, url, &self.dash_policy)?,
        };
        info!(%dialect, tracks = tracks.len(), "Manifest parsed");
        Ok(DiscoveredManifest {
            url: url.clone(),
            dialect,
            tracks,
        })
    }

    /// Resolve, fetch and merge one track. Nothing is exported.
    #[instrument(skip_all, fields(track = %track.label()), level = "debug")]
    pub async fn extract_track(
        &self,
        track: &TrackDescriptor,
        context: &TitleContext,
    ) -> Result<ExtractedTrack, SubgrabError> {
        let loader = self.loader();
        let plan = resolve_segments(track, &loader).await?;

        let results = if plan.is_flat() {
            self.fetch_flat(&plan, &loader).await?
        } else {
            self.fetch_segments(&plan).await?
        };
        let failed_segments = results.iter().filter(|r| r.is_error()).count();
        let document = merge_fragments(
            results
                .into_iter()
                .enumerate()
                .map(|(index, result)| result.into_fragment(index)),
        )?;

        let language = display_language(
            track.language(),
            self.config.undetermined_language.as_deref(),
        );
        let name = context.output_name(language, track.role);
        debug!(name = %name, cues = document.cue_count(), failed_segments, "Track merged");

        Ok(ExtractedTrack {
            name,
            document,
            failed_segments,
        })
    }

    /// Single-document tracks are a page fetch: retried, and fatal when every
    /// path gives up.
    async fn fetch_flat(
        &self,
        plan: &SegmentPlan,
        loader: &ManifestLoader,
    ) -> Result<Vec<FetchResult>, SubgrabError> {
        let mut results = Vec::with_capacity(plan.len());
        for url in plan.urls() {
            results.push(loader.fetch_document(url, self.fallback.as_ref()).await?);
            emit(
                self.progress.as_ref(),
                ProgressEvent::SegmentCompleted {
                    completed: results.len(),
                    total: plan.len(),
                    url: url.clone(),
                },
            );
        }
        Ok(results)
    }

    async fn fetch_segments(&self, plan: &SegmentPlan) -> Result<Vec<FetchResult>, SubgrabError> {
        let mut fetcher = SegmentFetcher::new(self.primary.clone(), self.config.fetch.clone())
            .with_cancellation(self.token.clone());
        if let Some(fallback) = &self.fallback {
            fetcher = fetcher.with_fallback(fallback.clone());
        }
        if let Some(progress) = &self.progress {
            fetcher = fetcher.with_progress(progress.clone());
        }

        fetcher.fetch(plan).await
    }

    /// Extract every accepted track in manifest order and hand each document
    /// to `sink`. A failing track never stops its siblings.
    pub async fn run(
        &self,
        manifest: &DiscoveredManifest,
        filter: &TrackFilter,
        context: &TitleContext,
        sink: &dyn ExportSink,
    ) -> ExtractionReport {
        let selected: Vec<&TrackDescriptor> =
            manifest.tracks.iter().filter(|t| filter.accepts(t)).collect();
        let total = selected.len();
        info!(
            selected = total,
            available = manifest.tracks.len(),
            "Extracting subtitle tracks"
        );

        let mut report = ExtractionReport::default();
        let mut used_names: HashMap<OutputName, usize> = HashMap::new();

        for (position, track) in selected.iter().enumerate() {
            if position > 0 && !self.config.track_pacing.is_zero() {
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep(self.config.track_pacing) => {}
                }
            }
            if self.token.is_cancelled() {
                report.skipped = total - position;
                warn!(skipped = report.skipped, "Extraction cancelled");
                break;
            }

            let label = track.label();
            emit(
                self.progress.as_ref(),
                ProgressEvent::TrackStarted {
                    index: position + 1,
                    total,
                    label: label.clone(),
                },
            );

            let outcome = match self.export_track(track, context, sink, &mut used_names).await {
                Ok(exported) => {
                    info!(track = %label, name = %exported.name, cues = exported.document.cue_count(), "Track exported");
                    emit(
                        self.progress.as_ref(),
                        ProgressEvent::TrackExported {
                            label: label.clone(),
                            name: exported.name.to_string(),
                            cues: exported.document.cue_count(),
                        },
                    );
                    TrackOutcome::Exported {
                        label,
                        cues: exported.document.cue_count(),
                        name: exported.name,
                        failed_segments: exported.failed_segments,
                    }
                }
                Err(SubgrabError::Cancelled) => {
                    report.skipped = total - position;
                    warn!(track = %label, "Extraction cancelled");
                    break;
                }
                Err(e) => {
                    error!(track = %label, error = %e, "Track failed");
                    emit(
                        self.progress.as_ref(),
                        ProgressEvent::TrackFailed {
                            label: label.clone(),
                            reason: e.to_string(),
                        },
                    );
                    TrackOutcome::Failed { label, error: e }
                }
            };
            report.outcomes.push(outcome);
        }

        report
    }

    async fn export_track(
        &self,
        track: &TrackDescriptor,
        context: &TitleContext,
        sink: &dyn ExportSink,
        used_names: &mut HashMap<OutputName, usize>,
    ) -> Result<ExtractedTrack, SubgrabError> {
        let mut extracted = self.extract_track(track, context).await?;

        let seen = used_names.entry(extracted.name.clone()).or_insert(0);
        *seen += 1;
        if *seen > 1 {
            let numbered = extracted.name.numbered(*seen);
            debug!(name = %extracted.name, renamed = %numbered, "Output name already used in this run");
            extracted.name = numbered;
        }

        sink.export(&extracted.name, Bytes::from(extracted.document.to_bytes()))
            .await?;
        Ok(extracted)
    }
}
