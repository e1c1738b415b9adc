//! Per-track tag extraction for album directories.
//!
//! A [`TagReader`] reads one file; [`extract_album`] reads a whole album under
//! a timeout. Files whose tags cannot be read still yield a [`TrackMetadata`]
//! carrying format and size so quality classification keeps working.

mod ffprobe;
mod lofty_reader;
mod timeout;

use log::{debug, warn};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, TagBackend};
use crate::error::{Error, Result};
use crate::types::{AlbumDirectory, AudioFile, TrackMetadata};

pub use ffprobe::FfprobeReader;
pub use lofty_reader::LoftyReader;
pub use timeout::execute_with_timeout;

/// Reads the tags of a single audio file
pub trait TagReader: Send + Sync {
    fn read_track(&self, file: &AudioFile) -> Result<TrackMetadata>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}

/// Build the reader selected in the configuration
pub fn create_reader(config: &Config) -> Result<Arc<dyn TagReader>> {
    match config.tag_backend {
        TagBackend::Lofty => Ok(Arc::new(LoftyReader)),
        TagBackend::Ffprobe => Ok(Arc::new(FfprobeReader::locate("ffprobe")?)),
    }
}

/// Metadata for a file whose tags could not be read
pub fn untagged(file: &AudioFile) -> TrackMetadata {
    TrackMetadata {
        file_type: Some(file.format.clone()),
        size: file.size,
        path: file.path.clone(),
        ..Default::default()
    }
}

fn read_all(reader: &dyn TagReader, files: &[AudioFile]) -> Vec<TrackMetadata> {
    files
        .iter()
        .map(|file| match reader.read_track(file) {
            Ok(track) => track,
            Err(e) => {
                warn!("{} could not read {}: {}", reader.name(), file.path.display(), e);
                untagged(file)
            }
        })
        .collect()
}

/// Read the tags of every track of an album, giving up after `timeout`.
///
/// A timeout is reported as [`Error::MetadataExtraction`]; the caller falls
/// through to reconstruction.
pub fn extract_album(
    reader: Arc<dyn TagReader>,
    album: &AlbumDirectory,
    timeout: Duration,
) -> Result<Vec<TrackMetadata>> {
    if album.audio_files.is_empty() {
        return Err(Error::NoAudioFiles(album.path.clone()));
    }

    debug!(
        "Reading {} tracks in {} with {}",
        album.audio_files.len(),
        album.path.display(),
        reader.name()
    );

    let files = album.audio_files.clone();
    execute_with_timeout(&album.path, "Tag extraction", timeout, move || {
        read_all(reader.as_ref(), &files)
    })
    .map_err(|e| Error::MetadataExtraction {
        path: album.path.clone(),
        reason: e.to_string(),
    })
}
