use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::log_file_error;
use crate::types::{AlbumDirectory, AudioFile, AudioFormat};

/// `CD1`, `Disc 2`, `disk03`
static RE_DISC_DIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(cd|disc|disk)\s*[-_]?\s*\d{1,2}$").unwrap());

/// Get audio format from file extension
fn get_audio_format(path: &Path) -> Option<AudioFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(AudioFormat::from_extension)
}

/// Returns if the given path has an audio extension
pub fn is_audio_path(path: &Path) -> bool {
    match get_audio_format(path) {
        Some(format) => format.is_supported(),
        None => false,
    }
}

/// Returns if a directory name marks one disc of a multi-disc release
pub fn is_disc_dir_name(name: &str) -> bool {
    RE_DISC_DIR.is_match(name.trim())
}

/// Audio files directly inside `dir`
fn direct_audio_files(dir: &Path) -> Result<Vec<AudioFile>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(format) = get_audio_format(&path).filter(|f| f.is_supported()) else {
            continue;
        };
        match entry.metadata() {
            Ok(metadata) => files.push(AudioFile {
                path,
                size: metadata.len(),
                format,
            }),
            Err(e) => log_file_error!(path, "metadata", e),
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Disc sub-directories of `dir`
fn disc_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_disc = path
            .file_name()
            .map(|n| is_disc_dir_name(&n.to_string_lossy()))
            .unwrap_or(false);
        if path.is_dir() && is_disc {
            subdirs.push(path);
        }
    }
    subdirs.sort();
    Ok(subdirs)
}

/// All audio files of an album directory, including disc sub-directories
pub fn list_audio_files(dir: &Path) -> Result<Vec<AudioFile>> {
    if !dir.is_dir() {
        return Err(Error::DirectoryNotFound(dir.to_path_buf()));
    }
    let mut files = direct_audio_files(dir)?;
    for disc in disc_subdirs(dir)? {
        files.extend(direct_audio_files(&disc)?);
    }
    Ok(files)
}

/// Discover album directories below `root`.
///
/// A directory is an album when it holds audio files directly or in disc
/// sub-directories; disc sub-directories are folded into their parent. The
/// configured destination, holding and backup roots are never descended into.
/// Results are ordered deepest first so nested albums move before their parents.
pub fn discover_albums(root: &Path, config: &Config) -> Result<Vec<AlbumDirectory>> {
    discover_albums_excluding(
        root,
        &[
            config.destination_dir.as_path(),
            config.holding_dir.as_path(),
            config.backup_dir.as_path(),
        ],
        config.max_depth,
    )
}

/// Album discovery skipping the given roots (paths that do not exist are ignored)
pub fn discover_albums_excluding(
    root: &Path,
    exclude: &[&Path],
    max_depth: Option<usize>,
) -> Result<Vec<AlbumDirectory>> {
    if !root.exists() {
        return Err(Error::DirectoryNotFound(root.to_path_buf()));
    }

    let excluded: Vec<PathBuf> = exclude
        .iter()
        .filter_map(|p| p.canonicalize().ok())
        .collect();

    let max_depth = max_depth.unwrap_or(usize::MAX);
    let mut albums = Vec::new();
    let mut folded_discs: HashSet<PathBuf> = HashSet::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| {
            let canonical = e.path().canonicalize().unwrap_or_else(|_| e.path().into());
            !excluded.iter().any(|x| canonical.starts_with(x))
        });

    for entry in walker.filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() || folded_discs.contains(entry.path()) {
            continue;
        }
        let dir = entry.path();

        let audio_files = match list_audio_files(dir) {
            Ok(files) => files,
            Err(e) => {
                log_file_error!(dir, "list_audio_files", e);
                continue;
            }
        };
        if audio_files.is_empty() {
            continue;
        }

        if let Ok(discs) = disc_subdirs(dir) {
            folded_discs.extend(discs);
        }
        albums.push((entry.depth(), AlbumDirectory {
            path: dir.to_path_buf(),
            audio_files,
        }));
    }

    albums.sort_by(|(depth_a, a), (depth_b, b)| depth_b.cmp(depth_a).then(a.path.cmp(&b.path)));
    Ok(albums.into_iter().map(|(_, album)| album).collect())
}

// -- Tests --
