use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use super::{DuplicateCandidate, DuplicateGroup, GroupStatus};
use crate::types::QualityClass;

#[derive(Debug, Clone, Serialize)]
pub struct MemberReport {
    pub path: PathBuf,
    pub score: i64,
    pub quality: QualityClass,
    pub total_size: u64,
    pub avg_bitrate: Option<u32>,
    pub formats: Vec<String>,
    pub keep: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group_id: i64,
    pub artist: String,
    pub title: String,
    pub year: Option<u16>,
    pub status: GroupStatus,
    /// Ranked best first; the first member is the keeper
    pub members: Vec<MemberReport>,
    pub reclaimable_bytes: u64,
}

/// Ranked duplicate groups with keep/remove recommendations
#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateReport {
    pub groups: Vec<GroupReport>,
    pub reclaimable_bytes: u64,
}

impl DuplicateReport {
    pub fn build(groups: &[DuplicateGroup], candidates: &[DuplicateCandidate]) -> Self {
        let by_id: HashMap<i64, &DuplicateCandidate> =
            candidates.iter().map(|c| (c.id, c)).collect();

        let mut report = DuplicateReport::default();
        for group in groups {
            let members: Vec<MemberReport> = group
                .members
                .iter()
                .filter_map(|m| {
                    let candidate = by_id.get(&m.candidate_id)?;
                    Some(MemberReport {
                        path: candidate.path.clone(),
                        score: m.score,
                        quality: candidate.quality,
                        total_size: candidate.total_size,
                        avg_bitrate: candidate.avg_bitrate,
                        formats: candidate.format_mix.clone(),
                        keep: m.candidate_id == group.keeper_id,
                    })
                })
                .collect();

            let Some(keeper) = by_id.get(&group.keeper_id) else {
                continue;
            };
            let reclaimable_bytes = members
                .iter()
                .filter(|m| !m.keep)
                .map(|m| m.total_size)
                .sum();
            if group.status == GroupStatus::Pending {
                report.reclaimable_bytes += reclaimable_bytes;
            }

            report.groups.push(GroupReport {
                group_id: group.id,
                artist: keeper.artist.clone(),
                title: keeper.title.clone(),
                year: keeper.year,
                status: group.status,
                members,
                reclaimable_bytes,
            });
        }
        report
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Human readable size: 1.5 GB, 320.0 MB
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

impl fmt::Display for DuplicateReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.groups.is_empty() {
            return writeln!(f, "No duplicate albums found");
        }

        for group in &self.groups {
            match group.year {
                Some(year) => writeln!(f, "{} - {} ({})", group.artist, group.title, year)?,
                None => writeln!(f, "{} - {}", group.artist, group.title)?,
            }
            for member in &group.members {
                writeln!(
                    f,
                    "  [{}] {:>5}  {:<8} {:>10}  {}",
                    if member.keep { "KEEP" } else { "DROP" },
                    member.score,
                    member.quality.dir_name(),
                    format_size(member.total_size),
                    member.path.display()
                )?;
            }
            if group.status == GroupStatus::Resolved {
                writeln!(f, "  (resolved)")?;
            }
        }

        writeln!(
            f,
            "{} duplicate groups, {} reclaimable",
            self.groups.len(),
            format_size(self.reclaimable_bytes)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplicates::detect;
    use crate::duplicates::tests::candidate;

    const MB: u64 = 1_048_576;

    #[test]
    fn test_report_ranks_and_sums() {
        let candidates = vec![
            candidate(1, "/lib/mp3", QualityClass::Lossy, Some(320), 150 * MB, &["mp3"]),
            candidate(2, "/lib/flac", QualityClass::Lossless, None, 600 * MB, &["flac"]),
        ];
        let groups = detect(&candidates);
        let report = DuplicateReport::build(&groups, &candidates);

        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert!(group.members[0].keep);
        assert_eq!(group.members[0].path, PathBuf::from("/lib/flac"));
        assert!(!group.members[1].keep);
        assert_eq!(report.reclaimable_bytes, 150 * MB);

        let text = report.to_string();
        assert!(text.contains("[KEEP]"));
        assert!(text.contains("150.0 MB reclaimable"));

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["groups"][0]["members"][0]["score"], 1100);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * MB), "3.0 GB");
    }
}
