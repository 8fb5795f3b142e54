//! Output file names: `<title>.<year>.<source>.<lang><role>.vtt`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::language::remap_language;
use crate::manifest::Role;

/// Characters rejected by common filesystems.
const RESERVED_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

static SEPARATOR_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s_]+").unwrap());
static DOT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,}").unwrap());

/// Sanitize a name component for use in a dotted file name.
///
/// Reserved characters and controls become separators, commas are dropped,
/// separator runs collapse to a single `.`, and outer dots are trimmed.
pub fn sanitize_filename(input: &str) -> String {
    let replaced: String = input
        .chars()
        .filter(|c| *c != ',')
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let dotted = SEPARATOR_RUN.replace_all(&replaced, ".");
    let collapsed = DOT_RUN.replace_all(&dotted, ".");
    collapsed.trim_matches('.').to_string()
}

/// Sanitized output file name for one track.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputName(String);

impl OutputName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Same name with `.{ordinal}` inserted before the extension.
    pub fn numbered(&self, ordinal: usize) -> OutputName {
        let stem = self.0.strip_suffix(".vtt").unwrap_or(&self.0);
        OutputName(format!("{stem}.{ordinal}.vtt"))
    }
}

impl fmt::Display for OutputName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OutputName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Build the output name. An empty or missing year is left out entirely.
pub fn build_name(
    title: &str,
    year: Option<&str>,
    source_tag: &str,
    language: &str,
    role: Role,
) -> OutputName {
    let language = remap_language(language.trim());
    let parts = [
        sanitize_filename(title),
        year.map(sanitize_filename).unwrap_or_default(),
        sanitize_filename(source_tag),
        format!("{}{}", sanitize_filename(language), role.name_suffix()),
    ];

    let stem = parts
        .iter()
        .filter(|p| !p.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(".");
    OutputName(format!("{}.vtt", DOT_RUN.replace_all(&stem, ".")))
}

/// Title metadata supplied by the caller, threaded through an extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleContext {
    pub title: String,
    pub year: Option<String>,
    /// Platform tag placed after the year, e.g. `DSNP.WEB`.
    pub source_tag: String,
}

impl TitleContext {
    pub fn new(title: impl Into<String>, source_tag: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            year: None,
            source_tag: source_tag.into(),
        }
    }

    pub fn with_year(mut self, year: impl Into<String>) -> Self {
        let year = year.into();
        self.year = (!year.trim().is_empty()).then_some(year);
        self
    }

    pub fn output_name(&self, language: &str, role: Role) -> OutputName {
        build_name(
            &self.title,
            self.year.as_deref(),
            &self.source_tag,
            language,
            role,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn deterministic_name_with_forced_role() {
        let name = build_name("My: Show/Title", Some("2021"), "SRC", "en-US", Role::Forced);
        assert_eq!(name.as_str(), "My.Show.Title.2021.SRC.en-US[forced].vtt");
    }

    #[test]
    fn missing_year_leaves_no_separator() {
        let name = build_name("Show", None, "HMAX.WEB", "nb", Role::Sdh);
        assert_eq!(name.as_str(), "Show.HMAX.WEB.no[sdh].vtt");
        let name = build_name("Show", Some(""), "HMAX.WEB", "sv", Role::Subtitle);
        assert_eq!(name.as_str(), "Show.HMAX.WEB.sv.vtt");
    }

    #[test]
    fn numbered_inserts_before_extension() {
        let name = build_name("Show", None, "WEB", "fr", Role::Subtitle);
        assert_eq!(name.numbered(2).as_str(), "Show.WEB.fr.2.vtt");
    }

    #[test]
    fn sanitize_collapses_and_trims() {
        assert_eq!(sanitize_filename("  Hello,  World__Again... "), "Hello.World.Again");
        assert_eq!(sanitize_filename("a?*b"), "a.b");
        assert_eq!(sanitize_filename("My: Show/Title"), "My.Show.Title");
        assert_eq!(sanitize_filename("Ep. 1: Pilot"), "Ep.1.Pilot");
        assert_eq!(sanitize_filename(":::"), "");
    }

    #[test]
    fn title_context_year_is_optional() {
        let ctx = TitleContext::new("The Film", "DSNP.WEB").with_year(" ");
        assert_eq!(ctx.year, None);
        let ctx = ctx.with_year("1999");
        assert_eq!(
            ctx.output_name("en", Role::Subtitle).as_str(),
            "The.Film.1999.DSNP.WEB.en.vtt"
        );
    }

    proptest! {
        #[test]
        fn sanitized_names_are_filesystem_safe(input in "\\PC{0,40}") {
            let out = sanitize_filename(&input);
            prop_assert!(!out.contains(RESERVED_CHARS));
            prop_assert!(!out.contains(','));
            prop_assert!(!out.contains(".."));
            prop_assert!(!out.starts_with('.') && !out.ends_with('.'));
            prop_assert!(!out.chars().any(char::is_whitespace));
        }

        #[test]
        fn build_name_always_ends_with_vtt(
            title in "\\PC{0,20}",
            year in proptest::option::of("[0-9]{4}"),
            lang in "[a-z]{2}(-[A-Z]{2})?",
        ) {
            let name = build_name(&title, year.as_deref(), "WEB", &lang, Role::Subtitle);
            prop_assert!(name.as_str().ends_with(".vtt"));
            prop_assert!(!name.as_str().starts_with('.'));
            prop_assert!(!name.as_str().contains(".."));
        }
    }
}
