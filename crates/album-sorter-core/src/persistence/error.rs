use std::fmt;
use std::path::PathBuf;

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Failures of the state, library and duplicate stores
#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),

    /// Another organizer process has the store open
    Locked(PathBuf),

    /// The state directory could not be created
    StoreDir { dir: PathBuf, reason: String },

    /// No journal entry or group with that id
    MissingRecord(String),

    /// Opening the store or applying its schema failed
    Schema(String),
}

impl PersistenceError {
    /// A store that cannot be opened halts the run; a failed write later on does not
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Locked(_) | Self::Schema(_) | Self::StoreDir { .. }
        )
    }
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Sqlite(err)
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "SQLite: {}", err),
            Self::Locked(path) => write!(
                f,
                "{} is locked by another organizer run",
                path.display()
            ),
            Self::StoreDir { dir, reason } => {
                write!(f, "Cannot create state directory {}: {}", dir.display(), reason)
            }
            Self::MissingRecord(what) => write!(f, "No such {}", what),
            Self::Schema(msg) => write!(f, "Store setup failed: {}", msg),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}
