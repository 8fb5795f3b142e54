//! Manifest parsing: HLS master playlists and DASH MPDs into [`TrackDescriptor`]s.

mod attributes;
pub mod dash;
pub mod hls;

use std::fmt;

use url::Url;

use crate::SubgrabError;

pub use dash::{DashPolicy, PeriodSelection, RepresentationSelection};

/// Language tag used when a manifest does not declare one.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// Manifest dialect. Selects the parser in [`parse_manifest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum Dialect {
    Hls,
    Dash,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Hls => f.write_str("HLS"),
            Dialect::Dash => f.write_str("DASH"),
        }
    }
}

impl Dialect {
    /// Sniff the dialect from the manifest body, falling back to the URL extension.
    pub fn detect(url: &Url, body: &str) -> Option<Dialect> {
        let head = body.trim_start_matches('\u{feff}').trim_start();
        if head.starts_with("#EXTM3U") {
            return Some(Dialect::Hls);
        }
        if head.starts_with('<') && head.contains("<MPD") {
            return Some(Dialect::Dash);
        }

        let path = url.path().to_ascii_lowercase();
        if path.ends_with(".m3u8") || path.ends_with(".m3u") {
            Some(Dialect::Hls)
        } else if path.ends_with(".mpd") {
            Some(Dialect::Dash)
        } else {
            None
        }
    }
}

/// Subtitle variant. Exactly one per track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    Subtitle,
    Forced,
    /// Captions / subtitles for the deaf and hard of hearing.
    Sdh,
}

impl Role {
    /// Suffix appended to the language tag in output names.
    pub fn name_suffix(self) -> &'static str {
        match self {
            Role::Subtitle => "",
            Role::Forced => "[forced]",
            Role::Sdh => "[sdh]",
        }
    }

    /// Map a DASH `Role@value`. Unrecognized values are plain subtitles.
    pub fn from_dash_value(value: &str) -> Role {
        match value {
            "caption" => Role::Sdh,
            "forced-subtitle" => Role::Forced,
            _ => Role::Subtitle,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Subtitle => f.write_str("subtitle"),
            Role::Forced => f.write_str("forced"),
            Role::Sdh => f.write_str("sdh"),
        }
    }
}

/// DASH numbered segment template, already anchored to its base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTemplate {
    pub base: Url,
    /// `media` attribute, identifiers unexpanded.
    pub media: String,
    pub start_number: u64,
    pub representation_id: Option<String>,
    /// Explicit segment count from a `SegmentTimeline`, when present.
    pub segment_count: Option<u64>,
}

/// Where a track's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Secondary playlist listing the segments (HLS).
    Playlist(Url),
    /// A single, non-segmented document.
    Direct(Url),
    /// Numbered segments (DASH).
    Template(SegmentTemplate),
    /// Segment URLs already known from the manifest itself.
    SegmentList(Vec<Url>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackDescriptor {
    language: String,
    pub display_name: String,
    pub role: Role,
    pub source: TrackSource,
}

impl TrackDescriptor {
    /// An empty or missing language becomes [`UNDETERMINED_LANGUAGE`].
    pub fn new(
        language: Option<&str>,
        display_name: impl Into<String>,
        role: Role,
        source: TrackSource,
    ) -> Self {
        let language = language
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(UNDETERMINED_LANGUAGE)
            .to_string();
        let display_name = display_name.into();
        let display_name = if display_name.trim().is_empty() {
            language.clone()
        } else {
            display_name
        };
        Self {
            language,
            display_name,
            role,
            source,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn is_undetermined(&self) -> bool {
        self.language == UNDETERMINED_LANGUAGE
    }

    /// Short label for logs and errors, e.g. `en-US[forced]`.
    pub fn label(&self) -> String {
        format!("{}{}", self.language, self.role.name_suffix())
    }
}

/// Parse a manifest into its subtitle tracks.
///
/// Syntax errors are [`SubgrabError::Parse`]; a well-formed manifest without
/// subtitle tracks yields an empty list.
pub fn parse_manifest(
    text: &str,
    base_url: &Url,
    dialect: Dialect,
) -> Result<Vec<TrackDescriptor>, SubgrabError> {
    match dialect {
        Dialect::Hls => hls::parse(text, base_url),
        Dialect::Dash => dash::parse(text, base_url, &DashPolicy::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn detect_by_body_then_extension() {
        let u = url("https://cdn.example.com/stream/master");
        assert_eq!(Dialect::detect(&u, "\u{feff}#EXTM3U\n"), Some(Dialect::Hls));
        assert_eq!(
            Dialect::detect(&u, "<?xml version=\"1.0\"?>\n<MPD xmlns=\"urn:mpeg:dash:schema:mpd:2011\">"),
            Some(Dialect::Dash)
        );
        assert_eq!(Dialect::detect(&u, ""), None);
        assert_eq!(
            Dialect::detect(&url("https://x/y/manifest.mpd?token=1"), ""),
            Some(Dialect::Dash)
        );
        assert_eq!(
            Dialect::detect(&url("https://x/y/index.M3U8"), ""),
            Some(Dialect::Hls)
        );
    }

    #[test]
    fn empty_language_defaults_to_undetermined() {
        let track = TrackDescriptor::new(
            Some("  "),
            "",
            Role::Subtitle,
            TrackSource::Direct(url("https://x/a.vtt")),
        );
        assert_eq!(track.language(), UNDETERMINED_LANGUAGE);
        assert_eq!(track.display_name, UNDETERMINED_LANGUAGE);
        assert!(track.is_undetermined());
    }

    #[test]
    fn dash_role_mapping() {
        assert_eq!(Role::from_dash_value("caption"), Role::Sdh);
        assert_eq!(Role::from_dash_value("subtitle"), Role::Subtitle);
        assert_eq!(Role::from_dash_value("forced-subtitle"), Role::Forced);
        assert_eq!(Role::from_dash_value("commentary"), Role::Subtitle);
    }

    #[test]
    fn label_carries_role_suffix() {
        let track = TrackDescriptor::new(
            Some("de"),
            "Deutsch",
            Role::Forced,
            TrackSource::Direct(url("https://x/a.vtt")),
        );
        assert_eq!(track.label(), "de[forced]");
    }
}
