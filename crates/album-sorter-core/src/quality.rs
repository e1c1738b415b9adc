use crate::types::{AlbumDirectory, AudioFormat, QualityClass, TrackMetadata};

/// Classify a set of audio formats.
///
/// Mixed when both lossless and lossy formats are present, Unknown when
/// neither is.
pub fn classify<'a>(formats: impl IntoIterator<Item = &'a AudioFormat>) -> QualityClass {
    let mut has_lossless = false;
    let mut has_lossy = false;

    for format in formats {
        has_lossless |= format.is_lossless();
        has_lossy |= format.is_lossy();
    }

    match (has_lossless, has_lossy) {
        (true, true) => QualityClass::Mixed,
        (true, false) => QualityClass::Lossless,
        (false, true) => QualityClass::Lossy,
        (false, false) => QualityClass::Unknown,
    }
}

/// Classify from file extensions
pub fn classify_extensions<S: AsRef<str>>(extensions: &[S]) -> QualityClass {
    let formats: Vec<AudioFormat> = extensions
        .iter()
        .map(|ext| AudioFormat::from_extension(ext.as_ref()))
        .collect();
    classify(&formats)
}

/// Distinct formats of an album, preferring the type a tag reader reported
/// over the extension (ffprobe tells ALAC from AAC inside `.m4a`)
pub fn album_formats(album: &AlbumDirectory, tracks: &[TrackMetadata]) -> Vec<AudioFormat> {
    let mut formats: Vec<AudioFormat> = album
        .audio_files
        .iter()
        .map(|file| {
            tracks
                .iter()
                .find(|t| t.path == file.path)
                .and_then(|t| t.file_type.clone())
                .unwrap_or_else(|| file.format.clone())
        })
        .collect();
    formats.sort();
    formats.dedup();
    formats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(classify_extensions(&["flac"]), QualityClass::Lossless);
        assert_eq!(classify_extensions(&["mp3"]), QualityClass::Lossy);
        assert_eq!(classify_extensions(&["flac", "mp3"]), QualityClass::Mixed);
        assert_eq!(classify_extensions::<&str>(&[]), QualityClass::Unknown);
    }

    #[test]
    fn test_case_and_unrelated_extensions() {
        assert_eq!(classify_extensions(&["WAV", "jpg", "cue"]), QualityClass::Lossless);
        assert_eq!(classify_extensions(&["M4A", "log"]), QualityClass::Lossy);
        assert_eq!(classify_extensions(&["txt"]), QualityClass::Unknown);
    }
}
