//! Destination path planning.
//!
//! Layout: `<dest>/<Quality>/<mode path>/<Title> (<Year>) [<Catalog>]`

use log::debug;
use std::path::{Path, PathBuf};

use crate::config::{Config, LayoutPolicy};
use crate::identity::normalize::sanitize_segment;
use crate::persistence::LabelStats;
use crate::types::{AlbumIdentity, OrganizationMode, QualityClass, VARIOUS_ARTISTS};

/// Layout options consumed by the planner
#[derive(Debug, Clone, Copy)]
pub struct LayoutSettings {
    pub policy: LayoutPolicy,
    pub min_label_releases: usize,
    pub enable_electronic: bool,
}

impl From<&Config> for LayoutSettings {
    fn from(config: &Config) -> Self {
        Self {
            policy: config.layout,
            min_label_releases: config.min_label_releases,
            enable_electronic: config.enable_electronic,
        }
    }
}

impl Default for LayoutSettings {
    fn default() -> Self {
        Self {
            policy: LayoutPolicy::Artist,
            min_label_releases: 3,
            enable_electronic: false,
        }
    }
}

/// Outcome of planning one album
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedPath {
    Planned {
        path: PathBuf,
        mode: OrganizationMode,
    },
    /// Destination exists already
    AlreadyOrganized(PathBuf),
}

impl PlannedPath {
    pub fn path(&self) -> &Path {
        match self {
            Self::Planned { path, .. } => path,
            Self::AlreadyOrganized(path) => path,
        }
    }
}

/// Leading alphabetic run of a catalog number: "WARP123" -> "WARP"
pub fn catalog_prefix(catalog: &str) -> Option<String> {
    let prefix: String = catalog
        .trim()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect();
    (!prefix.is_empty()).then(|| prefix.to_uppercase())
}

fn known(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Pick the layout branch for an album
pub fn choose_mode(
    identity: &AlbumIdentity,
    settings: &LayoutSettings,
    stats: &dyn LabelStats,
) -> OrganizationMode {
    if identity.is_compilation {
        return OrganizationMode::Compilation;
    }
    if settings.enable_electronic && identity.is_remix {
        return OrganizationMode::RemixSeparated;
    }

    let label = known(&identity.label);
    match settings.policy {
        LayoutPolicy::Artist => OrganizationMode::Artist,
        LayoutPolicy::Label if label.is_some() => OrganizationMode::Label,
        LayoutPolicy::Label => OrganizationMode::Artist,
        LayoutPolicy::Series => {
            if known(&identity.catalog_number)
                .and_then(catalog_prefix)
                .is_some()
            {
                OrganizationMode::Series
            } else if label.is_some() {
                OrganizationMode::Label
            } else {
                OrganizationMode::Artist
            }
        }
        LayoutPolicy::Hybrid => match label {
            // The album being planned counts towards its label
            Some(label)
                if stats.label_release_count(label) + 1 >= settings.min_label_releases =>
            {
                OrganizationMode::Label
            }
            _ => OrganizationMode::Artist,
        },
    }
}

fn mode_segments(identity: &AlbumIdentity, mode: OrganizationMode) -> Vec<String> {
    let artist = identity.album_artist.as_str();
    let label = known(&identity.label);

    let segments: Vec<&str> = match mode {
        OrganizationMode::Artist => vec![artist],
        OrganizationMode::Label => vec!["Labels", label.unwrap_or(artist), artist],
        OrganizationMode::Compilation => vec![VARIOUS_ARTISTS],
        OrganizationMode::RemixSeparated => {
            vec!["Remixes", known(&identity.remixer).unwrap_or(artist)]
        }
        OrganizationMode::Series => {
            let prefix = known(&identity.catalog_number).and_then(catalog_prefix);
            let series = match &prefix {
                Some(prefix) => prefix.as_str(),
                None => label.unwrap_or(artist),
            };
            return ["Series", label.unwrap_or(artist), series]
                .iter()
                .map(|s| sanitize_segment(s))
                .collect();
        }
    };

    segments.into_iter().map(sanitize_segment).collect()
}

/// Release folder name: `Title (Year) [Catalog]`
pub fn leaf_name(identity: &AlbumIdentity) -> String {
    let mut leaf = identity.album_title.trim().to_string();
    if let Some(year) = identity.year {
        leaf.push_str(&format!(" ({})", year));
    }
    if let Some(catalog) = known(&identity.catalog_number) {
        leaf.push_str(&format!(" [{}]", catalog));
    }
    sanitize_segment(&leaf)
}

/// Compute where an album belongs under `dest_root`.
pub fn plan(
    identity: &AlbumIdentity,
    quality: QualityClass,
    dest_root: &Path,
    settings: &LayoutSettings,
    stats: &dyn LabelStats,
) -> PlannedPath {
    let mode = choose_mode(identity, settings, stats);

    let mut path = dest_root.join(quality.dir_name());
    for segment in mode_segments(identity, mode) {
        path.push(segment);
    }
    path.push(leaf_name(identity));

    if path.exists() {
        debug!("{} already exists", path.display());
        return PlannedPath::AlreadyOrganized(path);
    }

    PlannedPath::Planned { path, mode }
}
