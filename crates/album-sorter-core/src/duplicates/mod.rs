//! Duplicate release detection over the organized tree.

mod report;
mod resolve;
mod scan;

pub use report::{DuplicateReport, GroupReport, MemberReport};
pub use resolve::{resolve_groups, ResolveSummary};
pub use scan::{build_candidate, scan_candidates};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::identity::normalize::normalize_for_identity;
use crate::types::QualityClass;

const MB: u64 = 1_048_576;

/// One organized album considered for duplicate detection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    /// Store id, 0 until persisted
    pub id: i64,
    pub path: PathBuf,
    pub artist: String,
    pub title: String,
    pub normalized_artist: String,
    pub normalized_title: String,
    pub year: Option<u16>,
    pub track_count: usize,
    pub total_size: u64,
    pub quality: QualityClass,
    /// Mean bitrate in kbps over tracks that report one
    pub avg_bitrate: Option<u32>,
    /// Distinct formats, sorted
    pub format_mix: Vec<String>,
    pub identity_hash: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupStatus {
    Pending,
    Resolved,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "resolved" => Self::Resolved,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub candidate_id: i64,
    pub score: i64,
}

/// Candidates sharing one identity hash; members are ranked best first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub id: i64,
    pub identity_hash: String,
    pub members: Vec<GroupMember>,
    pub keeper_id: i64,
    pub status: GroupStatus,
}

/// BLAKE3 over normalized artist, title, year and track count
pub fn identity_hash(artist: &str, title: &str, year: Option<u16>, track_count: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    let year = year.map(|y| y.to_string()).unwrap_or_default();
    let track_count = track_count.to_string();
    let fields = [
        normalize_for_identity(artist),
        normalize_for_identity(title),
        year,
        track_count,
    ];
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update(&[0x1f]);
        }
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Quality score used to pick which copy to keep
pub fn quality_score(candidate: &DuplicateCandidate) -> i64 {
    let mut score = match candidate.quality {
        QualityClass::Lossless => 1000,
        QualityClass::Lossy => 500,
        QualityClass::Mixed => 300,
        QualityClass::Unknown => 100,
    };

    if candidate.quality == QualityClass::Lossy {
        score += match candidate.avg_bitrate.unwrap_or(0) {
            b if b >= 320 => 200,
            b if b >= 256 => 150,
            b if b >= 192 => 100,
            b if b >= 128 => 50,
            _ => 0,
        };
    }

    score += match candidate.total_size {
        s if s > 500 * MB => 100,
        s if s > 200 * MB => 50,
        s if s > 100 * MB => 25,
        _ => 0,
    };

    if candidate.format_mix.len() > 1 {
        score -= 100;
    }

    score
}

/// Group candidates by identity hash; only groups of two or more are returned.
///
/// The keeper is the highest score, ties going to the lexicographically
/// smallest path.
pub fn detect(candidates: &[DuplicateCandidate]) -> Vec<DuplicateGroup> {
    let mut by_hash: BTreeMap<&str, Vec<&DuplicateCandidate>> = BTreeMap::new();
    for candidate in candidates {
        by_hash
            .entry(candidate.identity_hash.as_str())
            .or_default()
            .push(candidate);
    }

    by_hash
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(hash, members)| {
            let mut ranked: Vec<(&DuplicateCandidate, i64)> =
                members.into_iter().map(|c| (c, quality_score(c))).collect();
            ranked.sort_by(|(a, sa), (b, sb)| sb.cmp(sa).then_with(|| a.path.cmp(&b.path)));

            let keeper_id = ranked[0].0.id;
            DuplicateGroup {
                id: 0,
                identity_hash: hash.to_string(),
                members: ranked
                    .into_iter()
                    .map(|(c, score)| GroupMember {
                        candidate_id: c.id,
                        score,
                    })
                    .collect(),
                keeper_id,
                status: GroupStatus::Pending,
            }
        })
        .collect()
}
