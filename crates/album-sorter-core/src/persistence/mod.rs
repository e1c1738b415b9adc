//! SQLite-backed stores.
//!
//! Each store lives in its own file under the state directory and is held
//! exclusively by the process that opened it.

pub mod db;
pub mod duplicates;
pub mod error;
pub mod library;
pub mod models;
pub mod state;

pub use duplicates::DuplicateStore;
pub use error::{PersistenceError, PersistenceResult};
pub use library::{LabelStats, LibraryStore, StoredTrack};
pub use models::{MoveKind, MoveOperation, MoveStatus, ProcessedDirectoryRecord, StoredAlbum};
pub use state::{content_signature, StateTracker};
