use log::debug;
use serde::Deserialize;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;

use super::TagReader;
use crate::error::{Error, Result};
use crate::types::{AudioFile, AudioFormat, TrackMetadata};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeOutput {
    format: ProbeFormat,
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
    tags: HashMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProbeStream {
    codec_name: Option<String>,
    bit_rate: Option<String>,
    tags: HashMap<String, String>,
}

/// Tag reader backed by the external `ffprobe` tool
#[derive(Debug, Clone)]
pub struct FfprobeReader {
    binary: PathBuf,
}

impl FfprobeReader {
    /// Check that the binary can be run
    pub fn locate(binary: impl Into<PathBuf>) -> Result<Self> {
        let binary = binary.into();
        match Command::new(&binary).arg("-version").output() {
            Ok(output) if output.status.success() => Ok(Self { binary }),
            Ok(output) => Err(Error::DependencyMissing(format!(
                "{} -version exited with {}",
                binary.display(),
                output.status
            ))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::DependencyMissing(format!(
                "{} is not installed",
                binary.display()
            ))),
            Err(e) => Err(Error::DependencyMissing(format!(
                "{} could not be run: {}",
                binary.display(),
                e
            ))),
        }
    }
}

/// Leading number of `3/12` style values
fn leading_number(value: &str) -> Option<u32> {
    value.split('/').next()?.trim().parse().ok()
}

/// Parse ffprobe JSON output into track metadata
fn parse_probe_output(json: &[u8], file: &AudioFile) -> Result<TrackMetadata> {
    let output: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| Error::MetadataExtraction {
            path: file.path.clone(),
            reason: format!("invalid ffprobe output: {}", e),
        })?;

    // Vorbis comments come upper-case, ID3 lower-case; stream tags fill gaps
    let mut tags: HashMap<String, String> = HashMap::new();
    for stream in &output.streams {
        for (key, value) in &stream.tags {
            tags.insert(key.to_lowercase(), value.clone());
        }
    }
    for (key, value) in &output.format.tags {
        tags.insert(key.to_lowercase(), value.clone());
    }

    let get = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| tags.get(*k))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let stream = output.streams.first();
    let file_type = match stream.and_then(|s| s.codec_name.as_deref()) {
        Some("alac") => AudioFormat::Alac,
        _ => file.format.clone(),
    };
    let bit_rate = stream
        .and_then(|s| s.bit_rate.as_deref())
        .or(output.format.bit_rate.as_deref())
        .and_then(|b| b.parse::<u64>().ok())
        .map(|bps| (bps / 1000) as u32);

    Ok(TrackMetadata {
        artist: get(&["artist"]),
        album_artist: get(&["album_artist", "albumartist", "album artist"]),
        album: get(&["album"]),
        title: get(&["title"]),
        track_number: get(&["track", "tracknumber"]).and_then(|v| leading_number(&v)),
        disc_number: get(&["disc", "discnumber"]).and_then(|v| leading_number(&v)),
        year: get(&["date", "year", "originaldate"]),
        label: get(&["label", "publisher", "organization"]),
        catalog_number: get(&["catalognumber", "catalog number", "catalog"]),
        file_type: Some(file_type),
        bitrate: bit_rate,
        duration: output.format.duration.and_then(|d| d.parse().ok()),
        size: file.size,
        path: file.path.clone(),
    })
}

impl TagReader for FfprobeReader {
    fn read_track(&self, file: &AudioFile) -> Result<TrackMetadata> {
        debug!("ffprobe {}", file.path.display());
        let output = Command::new(&self.binary)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .args(["-show_streams", "-select_streams", "a:0"])
            .arg(&file.path)
            .output()?;

        if !output.status.success() {
            return Err(Error::MetadataExtraction {
                path: file.path.clone(),
                reason: format!("ffprobe exited with {}", output.status),
            });
        }

        parse_probe_output(&output.stdout, file)
    }

    fn name(&self) -> &'static str {
        "ffprobe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(ext: &str) -> AudioFile {
        AudioFile {
            path: PathBuf::from(format!("/music/in/01.{}", ext)),
            size: 2048,
            format: AudioFormat::from_extension(ext),
        }
    }

    #[test]
    fn test_parse_vorbis_style_tags() {
        let json = br#"{
            "streams": [{ "codec_name": "flac" }],
            "format": {
                "duration": "312.5",
                "bit_rate": "912000",
                "tags": {
                    "ARTIST": "Theo Parrish",
                    "ALBUMARTIST": "Theo Parrish",
                    "ALBUM": "The Twin Cities EP",
                    "TITLE": "Twin Cities",
                    "TRACK": "2/4",
                    "DATE": "2004",
                    "LABEL": "Sound Signature",
                    "CATALOGNUMBER": "SS007"
                }
            }
        }"#;
        let track = parse_probe_output(json, &file("flac")).unwrap();
        assert_eq!(track.album_artist.as_deref(), Some("Theo Parrish"));
        assert_eq!(track.track_number, Some(2));
        assert_eq!(track.year.as_deref(), Some("2004"));
        assert_eq!(track.label.as_deref(), Some("Sound Signature"));
        assert_eq!(track.catalog_number.as_deref(), Some("SS007"));
        assert_eq!(track.bitrate, Some(912));
        assert_eq!(track.duration, Some(312.5));
    }

    #[test]
    fn test_alac_detected_from_codec() {
        let json = br#"{ "streams": [{ "codec_name": "alac", "bit_rate": "256000" }], "format": {} }"#;
        let track = parse_probe_output(json, &file("m4a")).unwrap();
        assert_eq!(track.file_type, Some(AudioFormat::Alac));
        assert_eq!(track.bitrate, Some(256));
    }

    #[test]
    fn test_missing_binary() {
        let result = FfprobeReader::locate("/nonexistent/ffprobe-binary");
        assert!(matches!(result, Err(Error::DependencyMissing(_))));
    }
}
