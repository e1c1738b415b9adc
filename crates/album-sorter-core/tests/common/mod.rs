#![allow(dead_code)]

use album_sorter_core::metadata::{untagged, TagReader};
use album_sorter_core::{AudioFile, Config, Result, RunMode, TrackMetadata};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Tag reader for fixture files whose contents are
/// `artist|album|title|track|year|bitrate`. Empty files are untagged.
pub struct FixtureReader;

impl TagReader for FixtureReader {
    fn read_track(&self, file: &AudioFile) -> Result<TrackMetadata> {
        let contents = fs::read_to_string(&file.path).unwrap_or_default();
        let mut track = untagged(file);
        let fields: Vec<&str> = contents.trim().split('|').collect();
        if fields.len() < 6 {
            return Ok(track);
        }

        let opt = |s: &str| (!s.is_empty()).then(|| s.to_string());
        track.artist = opt(fields[0]);
        track.album = opt(fields[1]);
        track.title = opt(fields[2]);
        track.track_number = fields[3].parse().ok();
        track.year = opt(fields[4]);
        track.bitrate = fields[5].parse().ok();
        Ok(track)
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Source, destination, holding, backup and state roots in one temp dir
pub struct Library {
    pub root: TempDir,
}

impl Library {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    pub fn source(&self) -> PathBuf {
        self.root.path().join("incoming")
    }

    pub fn destination(&self) -> PathBuf {
        self.root.path().join("library")
    }

    pub fn holding(&self) -> PathBuf {
        self.root.path().join("holding")
    }

    pub fn config(&self, run_mode: RunMode) -> Config {
        Config {
            run_mode,
            destination_dir: self.destination(),
            holding_dir: self.holding(),
            backup_dir: self.root.path().join("backup"),
            state_dir: Some(self.root.path().join("state")),
            ..Default::default()
        }
    }

    /// Write a tagged album of `tracks` files under `dir`
    pub fn tagged_album(
        &self,
        dir: &Path,
        artist: &str,
        album: &str,
        year: &str,
        ext: &str,
        bitrate: u32,
        tracks: usize,
    ) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        for n in 1..=tracks {
            fs::write(
                dir.join(format!("{:02}.{}", n, ext)),
                format!("{}|{}|Track {}|{}|{}|{}", artist, album, n, n, year, bitrate),
            )
            .unwrap();
        }
        dir.to_path_buf()
    }

    /// Album without any tags
    pub fn untagged_album(&self, dir: &Path, tracks: usize) -> PathBuf {
        fs::create_dir_all(dir).unwrap();
        for n in 1..=tracks {
            fs::write(dir.join(format!("{:02}.flac", n)), b"").unwrap();
        }
        dir.to_path_buf()
    }
}

/// Every file below `root`, relative and sorted
pub fn snapshot(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.path().strip_prefix(root).unwrap().to_path_buf())
        .collect();
    files.sort();
    files
}
