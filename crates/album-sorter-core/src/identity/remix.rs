use once_cell::sync::Lazy;
use regex::Regex;

use super::normalize::collapse_whitespace;

static RE_REMIX_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(remix(es|ed)?|rmx|re-?edit|rework)\b").unwrap()
});

/// `Track (Remixer Remix)`
static RE_REMIXER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(([^()]+?)\s+(?:remix|rmx|mix|edit|rework)\)").unwrap()
});

/// Remix information detected for an album
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemixInfo {
    pub remixer: Option<String>,
}

pub fn has_remix_marker(s: &str) -> bool {
    RE_REMIX_MARKER.is_match(s)
}

/// Remixer named in `Artist (Remixer remix)`, if any
pub fn extract_remixer(s: &str) -> Option<String> {
    RE_REMIXER
        .captures(s)
        .map(|caps| collapse_whitespace(&caps[1]))
        .filter(|r| !r.is_empty())
}

/// An album counts as a remix release when its title carries a remix marker or
/// more than half of its tracks do.
pub fn detect(album_title: &str, track_titles: &[String]) -> Option<RemixInfo> {
    if has_remix_marker(album_title) {
        let remixer = extract_remixer(album_title).or_else(|| shared_remixer(track_titles));
        return Some(RemixInfo { remixer });
    }

    let marked = track_titles.iter().filter(|t| has_remix_marker(t)).count();
    if marked > 0 && marked * 2 > track_titles.len() {
        return Some(RemixInfo {
            remixer: shared_remixer(track_titles),
        });
    }

    None
}

/// Remixer shared by every remix track
fn shared_remixer(track_titles: &[String]) -> Option<String> {
    let mut remixers = track_titles.iter().filter_map(|t| extract_remixer(t));
    let first = remixers.next()?;
    if remixers.all(|r| r.eq_ignore_ascii_case(&first)) {
        Some(first)
    } else {
        None
    }
}
