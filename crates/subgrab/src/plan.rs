//! Segment resolution: turning a [`TrackDescriptor`] into an ordered [`SegmentPlan`].

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;
use url::Url;

use crate::fetcher::ManifestLoader;
use crate::manifest::{Dialect, SegmentTemplate, TrackDescriptor, TrackSource, hls};
use crate::SubgrabError;

/// `$Number$`, `$Number%05d$`, `$RepresentationID$` and the `$$` escape.
static TEMPLATE_IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(?:(Number|RepresentationID)(?:%0(\d+)d)?)?\$").unwrap());

/// Ordered, non-empty list of absolute segment URLs in playback order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    urls: Vec<Url>,
    flat: bool,
}

impl SegmentPlan {
    /// Fails with [`SubgrabError::EmptyPlan`] when `urls` is empty.
    pub fn segmented(track: &str, urls: Vec<Url>) -> Result<Self, SubgrabError> {
        if urls.is_empty() {
            return Err(SubgrabError::empty_plan(track));
        }
        Ok(Self { urls, flat: false })
    }

    /// Plan for a track delivered as one document.
    pub fn flat(url: Url) -> Self {
        Self {
            urls: vec![url],
            flat: true,
        }
    }

    pub fn urls(&self) -> &[Url] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn is_flat(&self) -> bool {
        self.flat
    }
}

impl SegmentTemplate {
    /// Segment numbers covered by the template, ascending.
    ///
    /// With a `SegmentTimeline` the range is `startNumber..startNumber+count-1`;
    /// without one the origin numbers segments `1..=startNumber`.
    pub fn segment_numbers(&self) -> RangeInclusive<u64> {
        match self.segment_count {
            Some(count) if count > 0 => {
                self.start_number..=self.start_number.saturating_add(count - 1)
            }
            _ => 1..=self.start_number.max(1),
        }
    }

    /// `media` with every identifier substituted for segment `number`.
    pub fn expand(&self, number: u64) -> String {
        TEMPLATE_IDENTIFIER
            .replace_all(&self.media, |caps: &Captures| {
                let width = caps
                    .get(2)
                    .and_then(|w| w.as_str().parse::<usize>().ok())
                    .unwrap_or(0);
                match caps.get(1).map(|m| m.as_str()) {
                    Some("Number") => format!("{number:0width$}"),
                    Some("RepresentationID") => self.representation_id.clone().unwrap_or_default(),
                    _ => "$".to_string(),
                }
            })
            .into_owned()
    }

    /// Absolute URLs for every segment, in ascending number order.
    pub fn resolve(&self) -> Result<Vec<Url>, SubgrabError> {
        self.segment_numbers()
            .map(|number| {
                let relative = self.expand(number);
                self.base.join(&relative).map_err(|e| {
                    SubgrabError::parse(Dialect::Dash, format!("bad segment URL `{relative}`: {e}"))
                })
            })
            .collect()
    }
}

/// Expand `track` into its segment plan.
///
/// Playlist-backed tracks cost one manifest-class fetch of the sub-playlist.
pub async fn resolve_segments(
    track: &TrackDescriptor,
    loader: &ManifestLoader,
) -> Result<SegmentPlan, SubgrabError> {
    let label = track.label();
    let plan = match &track.source {
        TrackSource::Direct(url) => SegmentPlan::flat(url.clone()),
        TrackSource::SegmentList(urls) => SegmentPlan::segmented(&label, urls.clone())?,
        TrackSource::Template(template) => SegmentPlan::segmented(&label, template.resolve()?)?,
        TrackSource::Playlist(playlist_url) => {
            let text = loader.fetch_text(playlist_url).await?;
            SegmentPlan::segmented(&label, hls::segment_urls(&text, playlist_url))?
        }
    };
    debug!(track = %label, segments = plan.len(), flat = plan.is_flat(), "Resolved segment plan");
    Ok(plan)
}
