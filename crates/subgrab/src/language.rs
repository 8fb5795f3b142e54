// Language tag normalization and English-name lookup.

use crate::manifest::UNDETERMINED_LANGUAGE;

/// Regional or legacy tags collapsed to the short form players expect.
const TAG_REMAP: &[(&str, &str)] = &[
    ("nb", "no"),
    ("sr-Latn", "sr"),
    ("ms-MY", "ms"),
    ("ca-ES", "ca"),
    ("zh-Hans-CN", "zh-Hans"),
    ("zh-Hant-TW", "zh-Hant"),
    ("khk-Cyrl", "khk"),
];

/// English language names as shown in audio track pickers.
const NAME_TO_TAG: &[(&str, &str)] = &[
    ("English", "en-US"),
    ("Bulgarian", "bg"),
    ("Chinese", "zh"),
    ("Croatian", "hr"),
    ("Czech", "cs"),
    ("Danish", "da"),
    ("Dutch", "nl"),
    ("Estonian", "et"),
    ("Finnish", "fi"),
    ("French", "fr-FR"),
    ("French Canadian", "fr-CA"),
    ("Galician", "gl"),
    ("Georgian", "ka"),
    ("German", "de"),
    ("Hindi", "hi"),
    ("Hebrew", "he"),
    ("Hungarian", "hu"),
    ("Icelandic", "is"),
    ("Italian", "it"),
    ("Japanese", "ja"),
    ("Korean", "ko"),
    ("Latvian", "lv"),
    ("Lithuanian", "lt"),
    ("Macedonian", "mk"),
    ("Norwegian", "no"),
    ("Norwegian Bokmal", "nb"),
    ("Portuguese", "pt-PT"),
    ("Portuguese (Brazilian)", "pt-BR"),
    ("Polish", "pl"),
    ("Romanian (Moldova)", "ro"),
    ("Serbian", "sr"),
    ("Serbian Latin", "sr-Latn"),
    ("Slovenian", "sl"),
    ("Spanish (Spain)", "es-ES"),
    ("Swedish", "sv"),
    ("Turkish", "tr"),
    ("Ukrainian", "uk"),
];

/// Canonical output tag for `tag`. Unlisted tags pass through unchanged.
pub fn remap_language(tag: &str) -> &str {
    TAG_REMAP
        .iter()
        .find(|(from, _)| *from == tag)
        .map_or(tag, |&(_, to)| to)
}

/// Tag for an English language name, case-insensitive.
pub fn tag_for_name(name: &str) -> Option<&'static str> {
    let name = name.trim();
    NAME_TO_TAG
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, tag)| *tag)
}

/// Accepts either a tag (`sv`, `en-US`) or an English name (`Swedish`).
pub fn resolve_language(input: &str) -> &str {
    tag_for_name(input).unwrap_or(input.trim())
}

/// Whether a track tag satisfies a requested tag.
///
/// Matching ignores case; a bare primary tag (`en`) also matches its regional
/// variants (`en-US`, `en-GB`).
pub fn language_matches(track: &str, wanted: &str) -> bool {
    if track.eq_ignore_ascii_case(wanted) {
        return true;
    }
    !wanted.contains('-')
        && track
            .split('-')
            .next()
            .is_some_and(|primary| primary.eq_ignore_ascii_case(wanted))
}

/// Tag shown in output names: the undetermined sentinel is replaced by the
/// caller's display tag when one is configured, everything else is remapped.
pub fn display_language<'a>(tag: &'a str, undetermined: Option<&'a str>) -> &'a str {
    match undetermined {
        Some(display) if tag == UNDETERMINED_LANGUAGE => display,
        _ => remap_language(tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("nb", "no")]
    #[case("sr-Latn", "sr")]
    #[case("zh-Hant-TW", "zh-Hant")]
    #[case("en-US", "en-US")]
    #[case("und", "und")]
    fn remaps_known_tags(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(remap_language(input), expected);
    }

    #[test]
    fn names_resolve_to_tags() {
        assert_eq!(tag_for_name("swedish"), Some("sv"));
        assert_eq!(tag_for_name(" French Canadian "), Some("fr-CA"));
        assert_eq!(tag_for_name("Klingon"), None);
        assert_eq!(resolve_language("English"), "en-US");
        assert_eq!(resolve_language("pt-BR"), "pt-BR");
    }

    #[test]
    fn primary_tag_matches_regions() {
        assert!(language_matches("en-US", "en"));
        assert!(language_matches("EN-us", "en-US"));
        assert!(!language_matches("en-US", "en-GB"));
        assert!(!language_matches("eng", "en"));
    }

    #[test]
    fn undetermined_uses_caller_tag() {
        assert_eq!(display_language("und", Some("et-sdh")), "et-sdh");
        assert_eq!(display_language("und", None), "und");
        assert_eq!(display_language("nb", Some("et-sdh")), "no");
    }
}
