//! DASH MPD parsing for text adaptation sets.
//!
//! Observed origins put the canonical subtitle set in the trailing `Period` and
//! carry identical templates on every `Representation` of a text set, so the
//! default [`DashPolicy`] picks the last period and the first representation.
//! Both choices are heuristics and can be overridden per origin.

use roxmltree::{Document, Node};
use tracing::{debug, trace, warn};
use url::Url;

use super::{Dialect, Role, SegmentTemplate, TrackDescriptor, TrackSource};
use crate::SubgrabError;

const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodSelection {
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepresentationSelection {
    First,
    Last,
}

/// Tie-break rules applied when an MPD offers more than one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DashPolicy {
    pub period: PeriodSelection,
    pub representation: RepresentationSelection,
}

/// Last `Period`, first `Representation`.
pub const DEFAULT_DASH_POLICY: DashPolicy = DashPolicy {
    period: PeriodSelection::Last,
    representation: RepresentationSelection::First,
};

impl Default for DashPolicy {
    fn default() -> Self {
        DEFAULT_DASH_POLICY
    }
}

pub fn parse(
    text: &str,
    manifest_url: &Url,
    policy: &DashPolicy,
) -> Result<Vec<TrackDescriptor>, SubgrabError> {
    let doc = Document::parse(text.trim_start_matches('\u{feff}'))
        .map_err(|e| SubgrabError::parse(Dialect::Dash, e.to_string()))?;

    let mpd = doc.root_element();
    if mpd.tag_name().name() != "MPD" {
        return Err(SubgrabError::parse(
            Dialect::Dash,
            format!("root element is <{}>, expected <MPD>", mpd.tag_name().name()),
        ));
    }

    let periods: Vec<Node> = children_named(mpd, "Period").collect();
    let period = match policy.period {
        PeriodSelection::First => periods.first(),
        PeriodSelection::Last => periods.last(),
    };
    let Some(period) = period.copied() else {
        debug!("MPD has no Period");
        return Ok(Vec::new());
    };
    trace!(periods = periods.len(), id = ?period.attribute("id"), "Selected period");

    let period_base = with_base_url(with_base_url(manifest_url.clone(), mpd), period);

    let mut tracks = Vec::new();
    for set in children_named(period, "AdaptationSet").filter(|set| is_text_set(*set)) {
        let representations: Vec<Node> = children_named(set, "Representation").collect();
        let representation = match policy.representation {
            RepresentationSelection::First => representations.first(),
            RepresentationSelection::Last => representations.last(),
        }
        .copied();

        let set_base = with_base_url(period_base.clone(), set);
        let base = match representation {
            Some(rep) => with_base_url(set_base, rep),
            None => set_base,
        };

        let template = representation
            .and_then(|rep| first_child(rep, "SegmentTemplate"))
            .or_else(|| first_child(set, "SegmentTemplate"));

        let language = set
            .attribute("lang")
            .or_else(|| set.attribute((XML_NAMESPACE, "lang")));
        let role = first_child(set, "Role")
            .and_then(|r| r.attribute("value"))
            .map(Role::from_dash_value)
            .unwrap_or_default();
        let label = first_child(set, "Label")
            .and_then(|l| l.text())
            .map(str::trim)
            .unwrap_or_default()
            .to_string();

        let source = match template {
            Some(template) => source_from_template(template, representation, base, language, role)?,
            None => match representation.and_then(|rep| first_child(rep, "BaseURL")) {
                // A representation whose BaseURL is the whole document.
                Some(_) => TrackSource::Direct(base),
                None => {
                    warn!(language = ?language, "Text AdaptationSet without SegmentTemplate or BaseURL, skipping");
                    continue;
                }
            },
        };

        tracks.push(TrackDescriptor::new(language, label, role, source));
    }

    debug!(tracks = tracks.len(), "Parsed DASH manifest");
    Ok(tracks)
}

fn source_from_template(
    template: Node,
    representation: Option<Node>,
    base: Url,
    language: Option<&str>,
    role: Role,
) -> Result<TrackSource, SubgrabError> {
    let media = template.attribute("media").unwrap_or_default().to_string();

    if !media.contains("$Number") {
        return flat_url(&base, &media, language.unwrap_or(super::UNDETERMINED_LANGUAGE), role)
            .map(TrackSource::Direct);
    }

    let start_number = template
        .attribute("startNumber")
        .and_then(|n| n.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(1);

    Ok(TrackSource::Template(SegmentTemplate {
        base,
        media,
        start_number,
        representation_id: representation
            .and_then(|rep| rep.attribute("id"))
            .map(str::to_string),
        segment_count: timeline_count(template),
    }))
}

/// Flat subtitle URL for a template without a segment number:
/// `<base>/<first two template path segments>/<lang><suffix>`. The segments are
/// kept verbatim, so a short template contributes its file name too.
fn flat_url(base: &Url, media: &str, language: &str, role: Role) -> Result<Url, SubgrabError> {
    let suffix = match role {
        Role::Sdh => "_sdh.vtt",
        Role::Forced => "_forced.vtt",
        Role::Subtitle => "_sub.vtt",
    };
    let mut relative = media
        .split('/')
        .take(2)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{s}/"))
        .collect::<String>();
    relative.push_str(language);
    relative.push_str(suffix);

    base.join(&relative)
        .map_err(|e| SubgrabError::parse(Dialect::Dash, format!("bad flat URL `{relative}`: {e}")))
}

/// Number of segments declared by a `SegmentTimeline`, if any.
fn timeline_count(template: Node) -> Option<u64> {
    let timeline = first_child(template, "SegmentTimeline")?;
    let count = children_named(timeline, "S")
        .map(|s| {
            let repeat = s
                .attribute("r")
                .and_then(|r| r.trim().parse::<i64>().ok())
                .unwrap_or(0);
            if repeat < 0 {
                warn!(repeat, "Open-ended SegmentTimeline repeat treated as a single segment");
            }
            1 + repeat.max(0) as u64
        })
        .sum::<u64>();
    (count > 0).then_some(count)
}

fn is_text_set(set: Node) -> bool {
    let content_type = set.attribute("contentType").unwrap_or_default();
    let mime_type = set
        .attribute("mimeType")
        .or_else(|| {
            first_child(set, "Representation").and_then(|rep| rep.attribute("mimeType"))
        })
        .unwrap_or_default();
    content_type.contains("text") || mime_type.eq_ignore_ascii_case("text/vtt")
}

/// Apply a `BaseURL` child of `node`, if present, on top of `base`.
fn with_base_url(base: Url, node: Node) -> Url {
    let Some(text) = first_child(node, "BaseURL").and_then(|b| b.text()) else {
        return base;
    };
    match base.join(text.trim()) {
        Ok(url) => url,
        Err(e) => {
            warn!(base_url = %text, error = %e, "Ignoring unusable BaseURL");
            base
        }
    }
}

fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn first_child<'a, 'input: 'a>(node: Node<'a, 'input>, name: &'static str) -> Option<Node<'a, 'input>> {
    children_named(node, name).next()
}
