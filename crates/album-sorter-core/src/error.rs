use std::path::PathBuf;
use thiserror::Error;

use crate::persistence::PersistenceError;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the album-sorter library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence layer error
    #[error("{0}")]
    Persistence(#[from] PersistenceError),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A required external tool is not installed
    #[error("Missing dependency: {0}")]
    DependencyMissing(String),

    /// Directory holds no recognised audio files
    #[error("No audio files in {0}")]
    NoAudioFiles(PathBuf),

    /// Tag extraction failed or timed out
    #[error("Metadata extraction failed for {path}: {reason}")]
    MetadataExtraction { path: PathBuf, reason: String },

    /// Artist or title could not be determined
    #[error("Essential metadata missing for {0}")]
    EssentialMetadataMissing(PathBuf),

    /// Destination already holds an album
    #[error("Destination already exists: {0}")]
    DestinationConflict(PathBuf),

    /// Directory move failed; the source is untouched
    #[error("Failed to move {source_path} to {dest_path}: {error}")]
    MoveIo {
        source_path: PathBuf,
        dest_path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Directory not found error
    #[error("Directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    /// Operation interrupted by a termination signal
    #[error("Operation interrupted")]
    Interrupted,
}

impl Error {
    /// Fatal errors halt the whole run; everything else is isolated per album.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Configuration(_) | Error::DependencyMissing(_) => true,
            Error::Persistence(e) => e.is_fatal(),
            _ => false,
        }
    }
}
