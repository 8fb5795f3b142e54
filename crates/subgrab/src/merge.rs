//! WebVTT fragment merging.
//!
//! Segmented delivery repeats cues at fragment boundaries. Fragments are
//! normalized, split into blocks, and every cue is keyed on its timing line
//! plus whitespace-collapsed text; a key seen anywhere earlier in the merge is
//! dropped. Survivors are renumbered from 1 in encounter order.

use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::SubgrabError;

pub const WEBVTT_HEADER: &str = "WEBVTT";

const TIMING_ARROW: &str = "-->";

/// `STYLE` block that only resets `::cue()`; every source fragment carries one.
static BOILERPLATE_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^STYLE\s*::cue\(\)\s*\{[^{}]*\}\s*$").unwrap());

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    /// Timing line verbatim, including any cue settings.
    pub timing: String,
    /// Payload lines joined with `\n`; may be empty.
    pub text: String,
}

impl Cue {
    fn dedup_key(&self) -> String {
        let text = WHITESPACE_RUN.replace_all(self.text.trim(), " ");
        format!("{}|{}", self.timing, text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Block {
    Cue(Cue),
    Note(String),
}

/// Deduplicated, renumbered WebVTT document. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedDocument {
    styles: Vec<String>,
    blocks: Vec<Block>,
}

impl MergedDocument {
    pub fn cues(&self) -> impl Iterator<Item = &Cue> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Cue(cue) => Some(cue),
            Block::Note(_) => None,
        })
    }

    pub fn cue_count(&self) -> usize {
        self.cues().count()
    }

    /// `NOTE` blocks kept from the fragments, including fetch diagnostics.
    pub fn notes(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().filter_map(|block| match block {
            Block::Note(note) => Some(note.as_str()),
            Block::Cue(_) => None,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string().into_bytes()
    }
}

impl fmt::Display for MergedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{WEBVTT_HEADER}")?;
        for style in &self.styles {
            write!(f, "\n{style}\n")?;
        }

        let mut sequence = 0;
        for block in &self.blocks {
            match block {
                Block::Note(note) => write!(f, "\n{note}\n")?,
                Block::Cue(cue) => {
                    sequence += 1;
                    write!(f, "\n{sequence}\n{}\n", cue.timing)?;
                    if !cue.text.is_empty() {
                        writeln!(f, "{}", cue.text)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Merge fragments, in plan order, into one document.
///
/// Fails with [`SubgrabError::EmptyResult`] when no cue survives.
pub fn merge_fragments<I, S>(fragments: I) -> Result<MergedDocument, SubgrabError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen_cues = HashSet::new();
    let mut seen_notes = HashSet::new();
    let mut seen_styles = HashSet::new();
    let mut document = MergedDocument {
        styles: Vec::new(),
        blocks: Vec::new(),
    };
    let mut fragment_count = 0;
    let mut duplicates = 0;
    let mut discarded = 0;

    for (index, fragment) in fragments.into_iter().enumerate() {
        fragment_count += 1;
        let body = normalize_fragment(fragment.as_ref());

        for block in body.split("\n\n") {
            let lines: Vec<&str> = block
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.trim().is_empty())
                .collect();
            let Some(first) = lines.first() else {
                continue;
            };

            if is_keyword(first, "NOTE") {
                let note = lines.join("\n");
                if seen_notes.insert(note.clone()) {
                    document.blocks.push(Block::Note(note));
                }
                continue;
            }

            if is_keyword(first, "STYLE") {
                let style = lines.join("\n");
                if BOILERPLATE_STYLE.is_match(&style) {
                    trace!(fragment = index, "Dropping boilerplate cue style");
                } else if seen_styles.insert(style.clone()) {
                    document.styles.push(style);
                }
                continue;
            }

            let Some(timing_index) = lines.iter().position(|l| l.contains(TIMING_ARROW)) else {
                discarded += 1;
                trace!(fragment = index, block = %first, "Discarding block without timing line");
                continue;
            };

            let cue = Cue {
                timing: lines[timing_index].trim().to_string(),
                text: lines[timing_index + 1..].join("\n"),
            };
            if seen_cues.insert(cue.dedup_key()) {
                document.blocks.push(Block::Cue(cue));
            } else {
                duplicates += 1;
            }
        }
    }

    let cues = document.cue_count();
    debug!(
        fragments = fragment_count,
        cues, duplicates, discarded, "Merged subtitle fragments"
    );

    if cues == 0 {
        return Err(SubgrabError::EmptyResult {
            fragments: fragment_count,
        });
    }
    Ok(document)
}

/// Strip a BOM, normalize line endings, and drop a leading `WEBVTT` header
/// line plus the blank lines after it.
fn normalize_fragment(raw: &str) -> String {
    let text = raw.trim_start_matches('\u{feff}');
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed = text.trim_start_matches(['\n', ' ', '\t']);

    let Some(first_line) = trimmed.lines().next() else {
        return String::new();
    };
    let is_header = first_line
        .get(..WEBVTT_HEADER.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(WEBVTT_HEADER))
        && first_line[WEBVTT_HEADER.len()..]
            .chars()
            .next()
            .is_none_or(|c| c == ' ' || c == '\t' || c == '-');
    if !is_header {
        return trimmed.to_string();
    }

    trimmed[first_line.len()..]
        .trim_start_matches(['\n', ' ', '\t'])
        .to_string()
}

fn is_keyword(line: &str, keyword: &str) -> bool {
    line.strip_prefix(keyword)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}
