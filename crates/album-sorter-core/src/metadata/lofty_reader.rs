use lofty::file::{AudioFile as _, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};

use super::TagReader;
use crate::error::{Error, Result};
use crate::types::{AudioFile, TrackMetadata};

/// Built-in tag reader
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyReader;

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl TagReader for LoftyReader {
    fn read_track(&self, file: &AudioFile) -> Result<TrackMetadata> {
        let extraction_error = |e: lofty::error::LoftyError| Error::MetadataExtraction {
            path: file.path.clone(),
            reason: e.to_string(),
        };

        let tagged_file = Probe::open(&file.path)
            .map_err(extraction_error)?
            .read()
            .map_err(extraction_error)?;

        let properties = tagged_file.properties();
        let mut track = TrackMetadata {
            file_type: Some(file.format.clone()),
            bitrate: properties.audio_bitrate(),
            duration: Some(properties.duration().as_secs_f64()),
            size: file.size,
            path: file.path.clone(),
            ..Default::default()
        };

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            return Ok(track);
        };

        track.artist = non_empty(tag.artist().as_deref());
        track.album_artist = non_empty(tag.get_string(&ItemKey::AlbumArtist));
        track.album = non_empty(tag.album().as_deref());
        track.title = non_empty(tag.title().as_deref());
        track.track_number = tag.track();
        track.disc_number = tag.disk();
        track.year = non_empty(tag.get_string(&ItemKey::RecordingDate))
            .or_else(|| tag.year().map(|y| y.to_string()));
        track.label = non_empty(tag.get_string(&ItemKey::Label))
            .or_else(|| non_empty(tag.get_string(&ItemKey::Publisher)));
        track.catalog_number = non_empty(tag.get_string(&ItemKey::CatalogNumber));

        Ok(track)
    }

    fn name(&self) -> &'static str {
        "lofty"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AudioFormat;
    use tempfile::tempdir;

    #[test]
    fn test_garbage_file_is_an_extraction_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("01.flac");
        std::fs::write(&path, b"DUMMY AUDIO DATA").unwrap();

        let file = AudioFile {
            path,
            size: 16,
            format: AudioFormat::Flac,
        };
        let result = LoftyReader.read_track(&file);
        assert!(matches!(result, Err(Error::MetadataExtraction { .. })));
    }
}
