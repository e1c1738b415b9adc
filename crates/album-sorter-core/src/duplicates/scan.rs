use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::{identity_hash, DuplicateCandidate};
use crate::discovery::discover_albums_excluding;
use crate::error::Result;
use crate::identity::normalize::normalize_for_identity;
use crate::identity::{reconstruct, resolve_identity, AliasResolver};
use crate::metadata::{extract_album, untagged, TagReader};
use crate::quality::{album_formats, classify};
use crate::types::{AlbumDirectory, AlbumIdentity, TrackMetadata};

/// Describe one organized album for duplicate detection
pub fn build_candidate(
    album: &AlbumDirectory,
    tracks: &[TrackMetadata],
    identity: &AlbumIdentity,
) -> DuplicateCandidate {
    let formats = album_formats(album, tracks);

    let bitrates: Vec<u64> = tracks
        .iter()
        .filter_map(|t| t.bitrate)
        .map(u64::from)
        .collect();
    let avg_bitrate = if bitrates.is_empty() {
        None
    } else {
        Some((bitrates.iter().sum::<u64>() / bitrates.len() as u64) as u32)
    };

    let track_count = album.audio_files.len();
    DuplicateCandidate {
        id: 0,
        path: album.path.clone(),
        artist: identity.album_artist.clone(),
        title: identity.album_title.clone(),
        normalized_artist: normalize_for_identity(&identity.album_artist),
        normalized_title: normalize_for_identity(&identity.album_title),
        year: identity.year,
        track_count,
        total_size: album.total_size(),
        quality: classify(&formats),
        avg_bitrate,
        format_mix: formats.iter().map(|f| f.as_str().to_string()).collect(),
        identity_hash: identity_hash(
            &identity.album_artist,
            &identity.album_title,
            identity.year,
            track_count,
        ),
    }
}

/// Identity of an organized album whose tags are unusable.
///
/// The organized layout puts the artist (or label/series) in the parent
/// folder, so `"<parent> - <leaf>"` is tried before the leaf alone.
fn identity_from_layout(album: &AlbumDirectory, aliases: &AliasResolver) -> Option<AlbumIdentity> {
    let leaf = album.name();
    let parent = album
        .path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned());

    if let Some(parent) = parent {
        let joined = format!("{} - {}", parent, leaf);
        if let Some(identity) = reconstruct(&joined).into_identity(aliases) {
            return Some(identity);
        }
    }
    reconstruct(&leaf).into_identity(aliases)
}

/// Scan an organized tree and describe every album found in it.
///
/// Albums whose identity can be neither read nor reconstructed are skipped.
pub fn scan_candidates(
    root: &Path,
    exclude: &[&Path],
    reader: Arc<dyn TagReader>,
    aliases: &AliasResolver,
    timeout: Duration,
) -> Result<Vec<DuplicateCandidate>> {
    let albums = discover_albums_excluding(root, exclude, None)?;
    info!("Scanning {} albums under {} for duplicates", albums.len(), root.display());

    let mut candidates = Vec::with_capacity(albums.len());
    for album in &albums {
        let tracks = match extract_album(reader.clone(), album, timeout) {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!("{}", e);
                album.audio_files.iter().map(untagged).collect()
            }
        };

        let identity = match resolve_identity(&tracks, &album.path, aliases) {
            Ok(identity) => identity,
            Err(_) => match identity_from_layout(album, aliases) {
                Some(identity) => identity,
                None => {
                    debug!("No identity for {}, not a duplicate candidate", album.path.display());
                    continue;
                }
            },
        };

        candidates.push(build_candidate(album, &tracks, &identity));
    }

    Ok(candidates)
}
