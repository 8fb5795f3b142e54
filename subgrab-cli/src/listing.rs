use std::fmt::Write;

use subgrab_engine::{DiscoveredManifest, TrackFilter, TrackSource};

fn source_kind(source: &TrackSource) -> String {
    match source {
        TrackSource::Playlist(_) => "playlist".to_string(),
        TrackSource::Direct(_) => "direct".to_string(),
        TrackSource::Template(template) => match template.segment_count {
            Some(count) => format!("template ({count} segments)"),
            None => "template".to_string(),
        },
        TrackSource::SegmentList(urls) => format!("segments ({})", urls.len()),
    }
}

/// Render the track table printed by `--list`. Tracks the filter would skip
/// are marked with `-`.
pub fn render_tracks(manifest: &DiscoveredManifest, filter: &TrackFilter) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} manifest {} ({} subtitle tracks)",
        manifest.dialect,
        manifest.url,
        manifest.tracks.len()
    );
    for (index, track) in manifest.tracks.iter().enumerate() {
        let mark = if filter.accepts(track) { '+' } else { '-' };
        let _ = writeln!(
            out,
            "{mark} {:>3}  {:<12} {:<9} {:<24} {}",
            index + 1,
            track.language(),
            track.role.to_string(),
            track.display_name,
            source_kind(&track.source)
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use subgrab_engine::{Dialect, Role, TrackDescriptor};
    use url::Url;

    #[test]
    fn marks_filtered_tracks() {
        let url = Url::parse("https://cdn.example.com/master.m3u8").unwrap();
        let manifest = DiscoveredManifest {
            url: url.clone(),
            dialect: Dialect::Hls,
            tracks: vec![
                TrackDescriptor::new(
                    Some("sv"),
                    "Svenska",
                    Role::Subtitle,
                    TrackSource::Playlist(url.join("sv.m3u8").unwrap()),
                ),
                TrackDescriptor::new(
                    Some("en"),
                    "English [CC]",
                    Role::Sdh,
                    TrackSource::Direct(url.join("en.vtt").unwrap()),
                ),
            ],
        };
        let filter = TrackFilter {
            skip_sdh: true,
            ..TrackFilter::default()
        };

        let table = render_tracks(&manifest, &filter);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("HLS manifest"));
        assert!(lines[1].starts_with("+   1  sv"));
        assert!(lines[1].ends_with("playlist"));
        assert!(lines[2].starts_with("-   2  en"));
        assert!(lines[2].contains("sdh"));
    }
}
