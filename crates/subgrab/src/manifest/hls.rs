//! HLS master playlists: subtitle groups signalled by `#EXT-X-MEDIA:TYPE=SUBTITLES`.

use m3u8_rs::{AlternativeMediaType, MasterPlaylist, Playlist, parse_playlist_res};
use tracing::{debug, trace, warn};
use url::Url;

use super::attributes::parse_attribute_list;
use super::{Dialect, Role, TrackDescriptor, TrackSource};
use crate::SubgrabError;

const MEDIA_TAG: &str = "#EXT-X-MEDIA:";
const SDH_CHARACTERISTIC: &str = "public.accessibility.describes-music-and-sound";

pub(crate) fn parse(text: &str, base_url: &Url) -> Result<Vec<TrackDescriptor>, SubgrabError> {
    let body = text.trim_start_matches('\u{feff}');
    let has_header = body
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .is_some_and(|first| first.starts_with("#EXTM3U"));
    if !has_header {
        return Err(SubgrabError::parse(Dialect::Hls, "missing #EXTM3U header"));
    }

    let tracks = match parse_playlist_res(body.as_bytes()) {
        Ok(Playlist::MasterPlaylist(master)) if !has_malformed_media(&master) => {
            from_master(master, base_url)?
        }
        Ok(Playlist::MediaPlaylist(media)) if !body.contains(MEDIA_TAG) => {
            let uris: Vec<&str> = media.segments.iter().map(|s| s.uri.as_str()).collect();
            media_playlist_track(&uris, base_url).into_iter().collect()
        }
        other => {
            match other {
                Err(e) => debug!(error = %e, "Manifest rejected by m3u8 parser, scanning lines"),
                Ok(_) => debug!("Manifest has renditions the m3u8 parser dropped, scanning lines"),
            }
            scan_lines(body, base_url)?
        }
    };

    debug!(tracks = tracks.len(), "Parsed HLS manifest");
    Ok(tracks)
}

/// `m3u8-rs` keeps an `EXT-X-MEDIA` it cannot validate (no `GROUP-ID`, unquoted
/// `URI`) as an unknown tag instead of failing the whole playlist.
fn has_malformed_media(master: &MasterPlaylist) -> bool {
    master.unknown_tags.iter().any(|t| t.tag == "X-MEDIA")
}

fn from_master(
    master: MasterPlaylist,
    base_url: &Url,
) -> Result<Vec<TrackDescriptor>, SubgrabError> {
    let mut tracks = Vec::new();
    for media in master.alternatives {
        if media.media_type != AlternativeMediaType::Subtitles {
            continue;
        }
        let Some(uri) = media.uri.as_deref().filter(|u| !u.is_empty()) else {
            warn!(name = %media.name, "Subtitle rendition without URI, skipping");
            continue;
        };
        let playlist_url = join_rendition(base_url, uri)?;
        let role = role_from_attributes(
            media.forced,
            media.characteristics.as_deref(),
            Some(media.name.as_str()),
        );
        trace!(language = ?media.language, %role, url = %playlist_url, "Subtitle rendition");

        tracks.push(TrackDescriptor::new(
            media.language.as_deref(),
            media.name,
            role,
            TrackSource::Playlist(playlist_url),
        ));
    }
    Ok(tracks)
}

/// Attribute-by-attribute scan for masters the strict parser refuses.
fn scan_lines(body: &str, base_url: &Url) -> Result<Vec<TrackDescriptor>, SubgrabError> {
    let mut tracks = Vec::new();
    let mut saw_media_tag = false;
    let mut plain_lines = Vec::new();

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(attribute_list) = line.strip_prefix(MEDIA_TAG) {
            saw_media_tag = true;
            let attrs = parse_attribute_list(attribute_list);
            let is_subtitle = attrs
                .get("TYPE")
                .is_some_and(|t| t.eq_ignore_ascii_case("SUBTITLES"));
            if !is_subtitle {
                continue;
            }

            let Some(uri) = attrs.get("URI").filter(|u| !u.is_empty()) else {
                warn!(name = ?attrs.get("NAME"), "Subtitle rendition without URI, skipping");
                continue;
            };
            let playlist_url = join_rendition(base_url, uri)?;

            let forced = attrs
                .get("FORCED")
                .is_some_and(|f| f.eq_ignore_ascii_case("YES"));
            let role = role_from_attributes(
                forced,
                attrs.get("CHARACTERISTICS").map(String::as_str),
                attrs.get("NAME").map(String::as_str),
            );
            let name = attrs.get("NAME").cloned().unwrap_or_default();
            trace!(language = ?attrs.get("LANGUAGE"), %role, url = %playlist_url, "Subtitle rendition");

            tracks.push(TrackDescriptor::new(
                attrs.get("LANGUAGE").map(String::as_str),
                name,
                role,
                TrackSource::Playlist(playlist_url),
            ));
        } else if !line.starts_with('#') {
            plain_lines.push(line);
        }
    }

    if tracks.is_empty() && !saw_media_tag {
        tracks.extend(media_playlist_track(&plain_lines, base_url));
    }
    Ok(tracks)
}

/// A manifest that is itself a WebVTT media playlist becomes one track.
fn media_playlist_track(uris: &[&str], base_url: &Url) -> Option<TrackDescriptor> {
    if !is_text_media_playlist(uris) {
        return None;
    }
    let segments = uris
        .iter()
        .filter_map(|uri| base_url.join(uri.trim()).ok())
        .collect::<Vec<_>>();
    debug!(segments = segments.len(), "Manifest is a WebVTT media playlist");
    Some(TrackDescriptor::new(
        None,
        "",
        Role::Subtitle,
        TrackSource::SegmentList(segments),
    ))
}

fn join_rendition(base_url: &Url, uri: &str) -> Result<Url, SubgrabError> {
    base_url
        .join(uri)
        .map_err(|e| SubgrabError::parse(Dialect::Hls, format!("bad URI `{uri}`: {e}")))
}

fn role_from_attributes(forced: bool, characteristics: Option<&str>, name: Option<&str>) -> Role {
    if forced {
        return Role::Forced;
    }
    let describes_sound = characteristics.is_some_and(|c| c.contains(SDH_CHARACTERISTIC));
    let named_sdh = name.is_some_and(|n| {
        let upper = n.to_ascii_uppercase();
        upper.contains("[CC]") || upper.contains("SDH")
    });
    if describes_sound || named_sdh {
        Role::Sdh
    } else {
        Role::Subtitle
    }
}

fn is_text_media_playlist(uris: &[&str]) -> bool {
    !uris.is_empty()
        && uris.iter().all(|uri| {
            let path = uri.split(['?', '#']).next().unwrap_or_default();
            let path = path.to_ascii_lowercase();
            path.ends_with(".vtt") || path.ends_with(".webvtt")
        })
}

/// Segment URLs listed by a subtitle media playlist, resolved against its own URL.
///
/// Well-formed playlists go through `m3u8-rs`; anything it rejects falls back
/// to taking every non-comment line.
pub fn segment_urls(text: &str, playlist_url: &Url) -> Vec<Url> {
    let body = text.trim_start_matches('\u{feff}');

    let uris: Vec<String> = match parse_playlist_res(body.as_bytes()) {
        Ok(Playlist::MediaPlaylist(playlist)) if !playlist.segments.is_empty() => {
            playlist.segments.into_iter().map(|s| s.uri).collect()
        }
        other => {
            if let Err(e) = other {
                debug!(url = %playlist_url, error = %e, "Sub-playlist rejected by m3u8 parser, scanning lines");
            }
            body.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(str::to_string)
                .collect()
        }
    };

    uris.iter()
        .filter_map(|uri| match playlist_url.join(uri.trim()) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(uri = %uri, error = %e, "Unresolvable segment URI, skipping");
                None
            }
        })
        .collect()
}
