use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::types::ProcessingStatus;

/// Processing outcome stored for one source directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedDirectoryRecord {
    pub path: PathBuf,
    pub content_signature: String,
    pub status: ProcessingStatus,
    pub reason: Option<String>,
    pub timestamp: String,
}

/// Journal state of a directory move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveStatus {
    Planned,
    InProgress,
    Committed,
    RolledBack,
}

impl MoveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in_progress",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "planned" => Self::Planned,
            "in_progress" => Self::InProgress,
            "committed" => Self::Committed,
            _ => Self::RolledBack,
        }
    }

    /// Planned or InProgress entries need recovery after a crash
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Planned | Self::InProgress)
    }
}

impl fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a directory was moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveKind {
    Organize,
    Hold,
    Duplicate,
    Undo,
}

impl MoveKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Organize => "organize",
            Self::Hold => "hold",
            Self::Duplicate => "duplicate",
            Self::Undo => "undo",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "hold" => Self::Hold,
            "duplicate" => Self::Duplicate,
            "undo" => Self::Undo,
            _ => Self::Organize,
        }
    }
}

/// One journaled directory move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOperation {
    pub id: i64,
    pub kind: MoveKind,
    pub source_path: PathBuf,
    pub dest_path: PathBuf,
    pub status: MoveStatus,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Album row in the library store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAlbum {
    pub id: i64,
    pub path: PathBuf,
    pub source_path: PathBuf,
    pub artist: String,
    pub title: String,
    pub year: Option<u16>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub quality: String,
    pub mode: String,
    pub track_count: usize,
    pub organized_at: String,
}
