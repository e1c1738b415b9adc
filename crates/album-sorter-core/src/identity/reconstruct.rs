//! Reconstruction of an album identity from a directory name.
//!
//! Used only when tag resolution fails. Matchers are tried in order and the
//! first one that recognises the name wins. The whole module is pure: the same
//! name always yields the same result.

use once_cell::sync::Lazy;
use regex::Regex;

use super::alias::AliasResolver;
use super::normalize::collapse_whitespace;
use super::remix;
use crate::types::{AlbumIdentity, IdentitySource};

/// Minimum confidence for a reconstruction to be trusted
pub const ACCEPT_THRESHOLD: u32 = 70;

pub const BASE_CONFIDENCE: u32 = 50;
const ARTIST_WEIGHT: u32 = 30;
const TITLE_WEIGHT: u32 = 20;
const YEAR_WEIGHT: u32 = 10;

/// Reason recorded when a directory is diverted to the holding area
pub const REJECTION_REASON: &str = "insufficient reconstructed metadata";

/// `artist-title-catalog-year-group`, catalog optional
static RE_SCENE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([^-\s]+)-([^\s]+?)(?:-([A-Za-z]*\d+[A-Za-z0-9]*))?-((?:19|20)\d{2})-([A-Za-z0-9_]+)$",
    )
    .unwrap()
});

/// `[CATALOG] Artist - Title (Year)`
static RE_BRACKETED_CATALOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[([^\]]+)\]\s*(.+?)\s+-\s+(.+?)(?:\s*\(((?:19|20)\d{2})\))?\s*$").unwrap()
});

/// `Artist - Title (Year) [Label]`, label optional
static RE_STANDARD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(.+?)\s+-\s+(.+?)\s*\(((?:19|20)\d{2})\)(?:\s*\[([^\]]+)\])?\s*$").unwrap()
});

/// `(Year) Title`
static RE_YEAR_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(((?:19|20)\d{2})\)\s*(.+)$").unwrap());

/// Trailing `(Year)` or `[Year]`
static RE_TRAILING_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*[\(\[]((?:19|20)\d{2})[\)\]]\s*$").unwrap());

const SEPARATOR: &str = " - ";

/// Fields recognised in a directory name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconstruction {
    pub artist: Option<String>,
    pub title: Option<String>,
    pub year: Option<u16>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    /// Name of the matcher that fired
    pub matcher: &'static str,
}

/// Name-pattern strategies, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    Scene,
    BracketedCatalog,
    Standard,
    YearPrefix,
    GenericSplit,
}

pub const MATCHERS: [Matcher; 5] = [
    Matcher::Scene,
    Matcher::BracketedCatalog,
    Matcher::Standard,
    Matcher::YearPrefix,
    Matcher::GenericSplit,
];

fn non_empty(s: &str) -> Option<String> {
    let s = collapse_whitespace(s);
    (!s.is_empty()).then_some(s)
}

fn scene_token(s: &str) -> Option<String> {
    non_empty(&s.replace('_', " "))
}

fn year(s: &str) -> Option<u16> {
    s.parse().ok()
}

/// Split `Artist - Title` when the separator occurs exactly once
fn split_once_exactly(s: &str) -> Option<(String, String)> {
    if s.matches(SEPARATOR).count() != 1 {
        return None;
    }
    let (artist, title) = s.split_once(SEPARATOR)?;
    Some((collapse_whitespace(artist), collapse_whitespace(title)))
}

impl Matcher {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Scene => "scene",
            Self::BracketedCatalog => "bracketed-catalog",
            Self::Standard => "standard",
            Self::YearPrefix => "year-prefix",
            Self::GenericSplit => "generic-split",
        }
    }

    pub fn apply(&self, name: &str) -> Option<Reconstruction> {
        let name = name.trim();
        match self {
            Self::Scene => {
                let caps = RE_SCENE.captures(name)?;
                Some(Reconstruction {
                    artist: scene_token(&caps[1]),
                    title: scene_token(&caps[2].replace('-', " ")),
                    year: year(&caps[4]),
                    catalog_number: caps.get(3).map(|m| m.as_str().to_uppercase()),
                    matcher: self.name(),
                    ..Default::default()
                })
            }
            Self::BracketedCatalog => {
                let caps = RE_BRACKETED_CATALOG.captures(name)?;
                Some(Reconstruction {
                    catalog_number: non_empty(&caps[1]),
                    artist: non_empty(&caps[2]),
                    title: non_empty(&caps[3]),
                    year: caps.get(4).and_then(|m| year(m.as_str())),
                    matcher: self.name(),
                    ..Default::default()
                })
            }
            Self::Standard => {
                let caps = RE_STANDARD.captures(name)?;
                Some(Reconstruction {
                    artist: non_empty(&caps[1]),
                    title: non_empty(&caps[2]),
                    year: year(&caps[3]),
                    label: caps.get(4).and_then(|m| non_empty(m.as_str())),
                    matcher: self.name(),
                    ..Default::default()
                })
            }
            Self::YearPrefix => {
                let caps = RE_YEAR_PREFIX.captures(name)?;
                let rest = &caps[2];
                let (artist, title) = match split_once_exactly(rest) {
                    Some((artist, title)) => (non_empty(&artist), non_empty(&title)),
                    None => (None, non_empty(rest)),
                };
                Some(Reconstruction {
                    artist,
                    title,
                    year: year(&caps[1]),
                    matcher: self.name(),
                    ..Default::default()
                })
            }
            Self::GenericSplit => {
                let (artist, rest) = split_once_exactly(name)?;
                let (title, year) = match RE_TRAILING_YEAR.captures(&rest) {
                    Some(caps) => {
                        let whole = caps.get(0).map_or(0, |m| m.start());
                        (rest[..whole].to_string(), year(&caps[1]))
                    }
                    None => (rest, None),
                };
                Some(Reconstruction {
                    artist: non_empty(&artist),
                    title: non_empty(&title),
                    year,
                    matcher: self.name(),
                    ..Default::default()
                })
            }
        }
    }
}

/// Outcome of reconstructing one directory name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructionResult {
    /// Raw directory name the result was derived from
    pub raw_name: String,
    pub reconstruction: Option<Reconstruction>,
    /// Raw confidence, may exceed 100
    pub confidence: u32,
}

impl ReconstructionResult {
    /// Confidence clamped to 0-100 for display
    pub fn display_confidence(&self) -> u32 {
        self.confidence.min(100)
    }

    pub fn is_accepted(&self) -> bool {
        self.confidence >= ACCEPT_THRESHOLD
            && self
                .reconstruction
                .as_ref()
                .and_then(|r| r.artist.as_ref())
                .is_some()
    }

    /// Build an identity from an accepted reconstruction. The artist goes
    /// through the alias table; a missing title becomes the raw directory name.
    pub fn into_identity(self, aliases: &AliasResolver) -> Option<AlbumIdentity> {
        if !self.is_accepted() {
            return None;
        }
        let rec = self.reconstruction?;
        let artist = aliases.resolve(&rec.artist?);
        let title = rec.title.unwrap_or_else(|| self.raw_name.clone());
        let remix = remix::detect(&title, &[]);

        Some(AlbumIdentity {
            album_artist: artist,
            album_title: title,
            year: rec.year,
            label: rec.label,
            catalog_number: rec.catalog_number,
            is_compilation: false,
            is_remix: remix.is_some(),
            remixer: remix.and_then(|r| r.remixer),
            source: IdentitySource::Reconstructed,
        })
    }
}

/// Confidence score for a set of recognised fields
pub fn confidence(reconstruction: Option<&Reconstruction>) -> u32 {
    let Some(rec) = reconstruction else {
        return BASE_CONFIDENCE;
    };
    let mut score = BASE_CONFIDENCE;
    if rec.artist.is_some() {
        score += ARTIST_WEIGHT;
    }
    if rec.title.is_some() {
        score += TITLE_WEIGHT;
    }
    if rec.year.is_some() {
        score += YEAR_WEIGHT;
    }
    score
}

/// Reconstruct an identity from a directory basename
pub fn reconstruct(dir_name: &str) -> ReconstructionResult {
    let reconstruction = MATCHERS.iter().find_map(|m| m.apply(dir_name));
    ReconstructionResult {
        raw_name: dir_name.to_string(),
        confidence: confidence(reconstruction.as_ref()),
        reconstruction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_release() {
        let result = reconstruct("theo_parrish-the_twin_cities_ep-hp007-2004-sweet");
        let rec = result.reconstruction.clone().unwrap();

        assert_eq!(rec.matcher, "scene");
        assert_eq!(rec.artist.as_deref(), Some("theo parrish"));
        assert_eq!(rec.title.as_deref(), Some("the twin cities ep"));
        assert_eq!(rec.year, Some(2004));
        assert_eq!(rec.catalog_number.as_deref(), Some("HP007"));
        assert!(result.confidence >= 100);
        assert_eq!(result.display_confidence(), 100);
        assert!(result.is_accepted());
    }

    #[test]
    fn test_scene_release_without_catalog() {
        let rec = reconstruct("burial-untrue-2007-grp").reconstruction.unwrap();
        assert_eq!(rec.artist.as_deref(), Some("burial"));
        assert_eq!(rec.title.as_deref(), Some("untrue"));
        assert_eq!(rec.catalog_number, None);
    }

    #[test]
    fn test_unrecognised_name_rejected() {
        let result = reconstruct("101_digital_sound_efects");
        assert!(result.reconstruction.is_none());
        assert_eq!(result.confidence, 50);
        assert!(!result.is_accepted());
        assert!(result.into_identity(&AliasResolver::default()).is_none());
    }

    #[test]
    fn test_bracketed_catalog() {
        let rec = reconstruct("[WARP123] Autechre - Amber (1994)")
            .reconstruction
            .unwrap();
        assert_eq!(rec.matcher, "bracketed-catalog");
        assert_eq!(rec.catalog_number.as_deref(), Some("WARP123"));
        assert_eq!(rec.artist.as_deref(), Some("Autechre"));
        assert_eq!(rec.title.as_deref(), Some("Amber"));
        assert_eq!(rec.year, Some(1994));
    }

    #[test]
    fn test_standard_with_label() {
        let rec = reconstruct("Basic Channel - BCD (1995) [Basic Channel]")
            .reconstruction
            .unwrap();
        assert_eq!(rec.matcher, "standard");
        assert_eq!(rec.artist.as_deref(), Some("Basic Channel"));
        assert_eq!(rec.title.as_deref(), Some("BCD"));
        assert_eq!(rec.label.as_deref(), Some("Basic Channel"));
    }

    #[test]
    fn test_year_prefix_without_artist_rejected() {
        let result = reconstruct("(1999) Selected Works");
        let rec = result.reconstruction.clone().unwrap();
        assert_eq!(rec.matcher, "year-prefix");
        assert_eq!(rec.artist, None);
        assert_eq!(result.confidence, 80);
        assert!(!result.is_accepted());
    }

    #[test]
    fn test_generic_split() {
        let result = reconstruct("Boards of Canada - Geogaddi");
        assert_eq!(result.confidence, 100);
        let identity = result.into_identity(&AliasResolver::default()).unwrap();
        assert_eq!(identity.album_artist, "Boards of Canada");
        assert_eq!(identity.album_title, "Geogaddi");
        assert_eq!(identity.source, IdentitySource::Reconstructed);

        // Two separators are ambiguous
        assert!(reconstruct("A - B - C").reconstruction.is_none());
    }

    #[test]
    fn test_confidence_monotonic() {
        let mut rec = Reconstruction::default();
        let mut last = confidence(None);
        assert_eq!(last, BASE_CONFIDENCE);

        for step in 0..3 {
            match step {
                0 => rec.title = Some("t".into()),
                1 => rec.artist = Some("a".into()),
                _ => rec.year = Some(2000),
            }
            let next = confidence(Some(&rec));
            assert!(next >= last);
            last = next;
        }
        assert_eq!(last, 110);
    }

    #[test]
    fn test_deterministic() {
        let name = "[HP007] Theo Parrish - Twin Cities (2004)";
        assert_eq!(reconstruct(name), reconstruct(name));
    }
}
