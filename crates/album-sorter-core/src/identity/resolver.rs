//! Tag-based album identity resolution.
//!
//! # Rules
//! - album artist: unanimous AlbumArtist tag, else unanimous Artist tag, else
//!   "Various Artists" (marks a compilation)
//! - album title: most frequent Album tag, ties broken by first occurrence,
//!   falling back to the sanitized directory name
//! - year: earliest parseable year across all tracks
//!
//! Empty tag values are ignored when checking for unanimity.

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::alias::AliasResolver;
use super::normalize::{collapse_whitespace, sanitize_segment};
use super::remix;
use crate::error::{Error, Result};
use crate::types::{AlbumIdentity, IdentitySource, TrackMetadata, VARIOUS_ARTISTS};

static RE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(1[89]\d{2}|20\d{2})\b").unwrap());

/// Agreement of one tag across a track set
#[derive(Debug, PartialEq, Eq)]
enum Consensus {
    Missing,
    Unanimous(String),
    Mixed,
}

fn consensus<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Consensus {
    let mut result = Consensus::Missing;
    for value in values.flatten() {
        let value = collapse_whitespace(value);
        if value.is_empty() {
            continue;
        }
        match &result {
            Consensus::Missing => result = Consensus::Unanimous(value),
            Consensus::Unanimous(existing) if *existing == value => {}
            _ => return Consensus::Mixed,
        }
    }
    result
}

/// Most frequent non-empty value, ties broken by first occurrence
fn most_frequent<'a>(values: impl Iterator<Item = Option<&'a String>>) -> Option<String> {
    // (value, count) in order of first occurrence
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values.flatten() {
        let value = collapse_whitespace(value);
        if value.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((value, 1)),
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (value, count) in counts {
        if best.as_ref().map_or(true, |(_, best_count)| count > *best_count) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value)
}

/// First plausible four-digit year in a tag value
pub fn parse_year(value: &str) -> Option<u16> {
    RE_YEAR
        .captures(value)
        .and_then(|caps| caps[1].parse::<u16>().ok())
}

fn is_various_artists(name: &str) -> bool {
    let folded = name.to_lowercase();
    folded == "various artists" || folded == "various" || folded == "va"
}

/// Derive an album identity from the tags of its tracks.
///
/// Fails with [`Error::EssentialMetadataMissing`] when no artist can be
/// determined; the caller then falls back to reconstruction.
pub fn resolve_identity(
    tracks: &[TrackMetadata],
    album_dir: &Path,
    aliases: &AliasResolver,
) -> Result<AlbumIdentity> {
    if tracks.is_empty() {
        return Err(Error::EssentialMetadataMissing(album_dir.to_path_buf()));
    }

    let album_artist_tags = consensus(tracks.iter().map(|t| t.album_artist.as_ref()));
    let artist_tags = consensus(tracks.iter().map(|t| t.artist.as_ref()));

    let (album_artist, mut is_compilation) = match (album_artist_tags, artist_tags) {
        (Consensus::Unanimous(artist), _) => (artist, false),
        (_, Consensus::Unanimous(artist)) => (artist, false),
        (Consensus::Missing, Consensus::Missing) => (String::new(), false),
        _ => (VARIOUS_ARTISTS.to_string(), true),
    };

    if album_artist.is_empty() {
        debug!("No artist tags in {}", album_dir.display());
        return Err(Error::EssentialMetadataMissing(album_dir.to_path_buf()));
    }

    let album_artist = if is_various_artists(&album_artist) {
        is_compilation = true;
        VARIOUS_ARTISTS.to_string()
    } else {
        aliases.resolve(&album_artist)
    };

    let album_title = match most_frequent(tracks.iter().map(|t| t.album.as_ref())) {
        Some(title) => title,
        None => {
            let dir_name = album_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let fallback = sanitize_segment(&dir_name);
            info!(
                "No album tags in {}, using directory name '{}' as title",
                album_dir.display(),
                fallback
            );
            fallback
        }
    };

    let year = tracks
        .iter()
        .filter_map(|t| t.year.as_deref().and_then(parse_year))
        .min();

    let track_titles: Vec<String> = tracks.iter().filter_map(|t| t.title.clone()).collect();
    let remix = remix::detect(&album_title, &track_titles);

    let identity = AlbumIdentity {
        album_artist,
        album_title,
        year,
        label: most_frequent(tracks.iter().map(|t| t.label.as_ref())),
        catalog_number: most_frequent(tracks.iter().map(|t| t.catalog_number.as_ref())),
        is_compilation,
        is_remix: remix.is_some(),
        remixer: remix.and_then(|r| r.remixer),
        source: IdentitySource::Tags,
    };

    if !identity.is_complete() {
        return Err(Error::EssentialMetadataMissing(album_dir.to_path_buf()));
    }

    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn track(artist: &str, album_artist: &str, album: &str, year: &str) -> TrackMetadata {
        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        TrackMetadata {
            artist: opt(artist),
            album_artist: opt(album_artist),
            album: opt(album),
            year: opt(year),
            path: PathBuf::from("/music/in/track.flac"),
            ..Default::default()
        }
    }

    fn dir() -> PathBuf {
        PathBuf::from("/music/in/Some_Dir")
    }

    #[test]
    fn test_unanimous_album_artist_verbatim() {
        let tracks = vec![
            track("Moodymann feat. X", "Moodymann", "Silentintroduction", "1997"),
            track("Moodymann", "Moodymann", "Silentintroduction", "1997"),
        ];
        let identity = resolve_identity(&tracks, &dir(), &AliasResolver::default()).unwrap();
        assert_eq!(identity.album_artist, "Moodymann");
        assert_eq!(identity.album_title, "Silentintroduction");
        assert_eq!(identity.year, Some(1997));
        assert!(!identity.is_compilation);
    }

    #[test]
    fn test_falls_back_to_unanimous_artist() {
        let tracks = vec![
            track("Burial", "", "Untrue", ""),
            track("Burial", "", "Untrue", ""),
        ];
        let identity = resolve_identity(&tracks, &dir(), &AliasResolver::default()).unwrap();
        assert_eq!(identity.album_artist, "Burial");
        assert_eq!(identity.year, None);
    }

    #[test]
    fn test_mixed_artists_become_various() {
        let tracks = vec![
            track("A", "A", "Comp", "2001"),
            track("B", "B", "Comp", "2001"),
        ];
        let identity = resolve_identity(&tracks, &dir(), &AliasResolver::default()).unwrap();
        assert_eq!(identity.album_artist, VARIOUS_ARTISTS);
        assert!(identity.is_compilation);
    }

    #[test]
    fn test_title_majority_and_tie_break() {
        let tracks = vec![
            track("X", "", "Second", ""),
            track("X", "", "First", ""),
            track("X", "", "First", ""),
        ];
        let identity = resolve_identity(&tracks, &dir(), &AliasResolver::default()).unwrap();
        assert_eq!(identity.album_title, "First");

        let tied = vec![track("X", "", "Alpha", ""), track("X", "", "Beta", "")];
        let identity = resolve_identity(&tied, &dir(), &AliasResolver::default()).unwrap();
        assert_eq!(identity.album_title, "Alpha");
    }

    #[test]
    fn test_title_falls_back_to_directory_name() {
        let tracks = vec![track("X", "", "", "")];
        let identity = resolve_identity(&tracks, &dir(), &AliasResolver::default()).unwrap();
        assert_eq!(identity.album_title, "Some_Dir");
    }

    #[test]
    fn test_earliest_year() {
        let tracks = vec![
            track("X", "", "T", "2009-03-01"),
            track("X", "", "T", "garbage"),
            track("X", "", "T", "2004"),
        ];
        let identity = resolve_identity(&tracks, &dir(), &AliasResolver::default()).unwrap();
        assert_eq!(identity.year, Some(2004));
    }

    #[test]
    fn test_missing_artist_fails() {
        let tracks = vec![track("", "", "Untitled", "")];
        let result = resolve_identity(&tracks, &dir(), &AliasResolver::default());
        assert!(matches!(result, Err(Error::EssentialMetadataMissing(_))));
    }

    #[test]
    fn test_alias_canonicalization() {
        let aliases = AliasResolver::new(&[vec!["Aphex Twin".into(), "AFX".into()]]);
        let tracks = vec![track("AFX", "", "Analord", "2005")];
        let identity = resolve_identity(&tracks, &dir(), &aliases).unwrap();
        assert_eq!(identity.album_artist, "Aphex Twin");
    }

    #[test]
    fn test_parse_year() {
        assert_eq!(parse_year("2004-05-01"), Some(2004));
        assert_eq!(parse_year("1987"), Some(1987));
        assert_eq!(parse_year("12"), None);
    }
}
