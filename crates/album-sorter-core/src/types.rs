use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Artist name used for compilations
pub const VARIOUS_ARTISTS: &str = "Various Artists";

/// Supported audio formats
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AudioFormat {
    Flac,
    Wav,
    Aiff,
    Alac,
    Mp3,
    Aac,
    M4a,
    Ogg,
    Other(String),
}

impl AudioFormat {
    /// Determine format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "flac" => Self::Flac,
            "wav" => Self::Wav,
            "aif" | "aiff" => Self::Aiff,
            "alac" => Self::Alac,
            "mp3" => Self::Mp3,
            "aac" => Self::Aac,
            "m4a" => Self::M4a,
            "ogg" => Self::Ogg,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav | Self::Aiff | Self::Alac)
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Aac | Self::M4a | Self::Ogg)
    }

    /// Check if format is a recognised audio format
    pub fn is_supported(&self) -> bool {
        self.is_lossless() || self.is_lossy()
    }

    /// Lower-case name as used in file extensions and the database
    pub fn as_str(&self) -> &str {
        match self {
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Aiff => "aiff",
            Self::Alac => "alac",
            Self::Mp3 => "mp3",
            Self::Aac => "aac",
            Self::M4a => "m4a",
            Self::Ogg => "ogg",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Representation of an audio file found on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFile {
    /// Full path to the audio file
    pub path: PathBuf,

    /// File size in bytes
    pub size: u64,

    /// Audio format
    pub format: AudioFormat,
}

/// A directory holding one release
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumDirectory {
    pub path: PathBuf,

    /// Audio files, including those in disc sub-directories
    pub audio_files: Vec<AudioFile>,
}

impl AlbumDirectory {
    pub fn total_size(&self) -> u64 {
        self.audio_files.iter().map(|f| f.size).sum()
    }

    pub fn formats(&self) -> Vec<AudioFormat> {
        let mut formats: Vec<AudioFormat> =
            self.audio_files.iter().map(|f| f.format.clone()).collect();
        formats.sort();
        formats.dedup();
        formats
    }

    /// Directory basename
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Per-track tag values read from one audio file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub artist: Option<String>,
    pub album_artist: Option<String>,
    pub album: Option<String>,
    pub title: Option<String>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    /// Raw year/date tag, e.g. "2004" or "2004-05-01"
    pub year: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub file_type: Option<AudioFormat>,
    /// Audio bitrate in kbps
    pub bitrate: Option<u32>,
    /// Duration in seconds
    pub duration: Option<f64>,
    pub size: u64,
    pub path: PathBuf,
}

/// Where an album identity came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IdentitySource {
    Tags,
    Reconstructed,
}

/// Canonical identity of one release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumIdentity {
    pub album_artist: String,
    pub album_title: String,
    pub year: Option<u16>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub is_compilation: bool,
    pub is_remix: bool,
    pub remixer: Option<String>,
    pub source: IdentitySource,
}

impl AlbumIdentity {
    pub fn new(album_artist: impl Into<String>, album_title: impl Into<String>) -> Self {
        Self {
            album_artist: album_artist.into(),
            album_title: album_title.into(),
            year: None,
            label: None,
            catalog_number: None,
            is_compilation: false,
            is_remix: false,
            remixer: None,
            source: IdentitySource::Tags,
        }
    }

    /// Artist and title are both present
    pub fn is_complete(&self) -> bool {
        !self.album_artist.trim().is_empty() && !self.album_title.trim().is_empty()
    }
}

/// Audio quality of an album's file set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityClass {
    Lossless,
    Lossy,
    Mixed,
    Unknown,
}

impl QualityClass {
    /// Directory name used under the destination root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Lossless => "Lossless",
            Self::Lossy => "Lossy",
            Self::Mixed => "Mixed",
            Self::Unknown => "Unknown",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Lossless" => Self::Lossless,
            "Lossy" => Self::Lossy,
            "Mixed" => Self::Mixed,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for QualityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Layout branch chosen for one album
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizationMode {
    Artist,
    Label,
    Series,
    Compilation,
    RemixSeparated,
}

impl OrganizationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Label => "label",
            Self::Series => "series",
            Self::Compilation => "compilation",
            Self::RemixSeparated => "remix",
        }
    }
}

/// Whether filesystem changes are made or only logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    #[default]
    DryRun,
    Live,
}

impl RunMode {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, Self::DryRun)
    }
}

/// Outcome stored for a processed source directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingStatus {
    Success,
    AlreadyOrganized,
    Held,
    Skipped,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::AlreadyOrganized => "already_organized",
            Self::Held => "held",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => Self::Success,
            "already_organized" => Self::AlreadyOrganized,
            "held" => Self::Held,
            "skipped" => Self::Skipped,
            _ => Self::Failed,
        }
    }
}

/// Result of running the pipeline on one album directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlbumOutcome {
    /// Moved (or, in a dry run, would be moved) to the destination
    Organized { destination: PathBuf, renamed: bool },
    /// The planned destination already exists
    AlreadyOrganized(PathBuf),
    /// Diverted to the holding area
    Held { reason: String },
    /// Left alone (unchanged since last run, or no audio)
    Skipped { reason: String },
}

/// Counts reported at the end of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub already_organized: usize,
    pub held: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &AlbumOutcome) {
        match outcome {
            AlbumOutcome::Organized { .. } => self.processed += 1,
            AlbumOutcome::AlreadyOrganized(_) => self.already_organized += 1,
            AlbumOutcome::Held { .. } => self.held += 1,
            AlbumOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Sum counters from independent workers
    pub fn merge(&mut self, other: &RunSummary) {
        self.processed += other.processed;
        self.skipped += other.skipped;
        self.already_organized += other.already_organized;
        self.held += other.held;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.processed + self.skipped + self.already_organized + self.held + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed: {}, skipped: {}, already organized: {}, held: {}, failed: {}",
            self.processed, self.skipped, self.already_organized, self.held, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_from_extension() {
        assert_eq!(AudioFormat::from_extension("FLAC"), AudioFormat::Flac);
        assert_eq!(AudioFormat::from_extension("aif"), AudioFormat::Aiff);
        assert!(AudioFormat::from_extension("m4a").is_lossy());
        assert!(!AudioFormat::from_extension("jpg").is_supported());
    }

    #[test]
    fn test_summary_merge() {
        let mut a = RunSummary {
            processed: 2,
            failed: 1,
            ..Default::default()
        };
        let b = RunSummary {
            processed: 3,
            held: 4,
            ..Default::default()
        };
        a.merge(&b);
        assert_eq!(a.processed, 5);
        assert_eq!(a.held, 4);
        assert_eq!(a.total(), 10);
    }
}
