use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::identity::alias::{validate_alias_groups, AliasWarning};
use crate::types::RunMode;

/// Layout policy for the organized tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPolicy {
    /// `<Artist>/<Title>`
    Artist,

    /// `Labels/<Label>/<Artist>/<Title>` whenever a label is known
    Label,

    /// `Series/<Label>/<Catalog prefix>/<Title>`
    Series,

    /// Label layout only for labels with enough releases, artist otherwise
    Hybrid,
}

/// Which tag reader backs the metadata extractor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagBackend {
    /// Built-in reader
    Lofty,

    /// External `ffprobe` binary
    Ffprobe,
}

/// Log level for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Configuration for an organize or duplicate run.
///
/// Built once at start-up and passed by reference to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether filesystem changes are made
    pub run_mode: RunMode,

    /// Root of the organized tree
    pub destination_dir: PathBuf,

    /// Where albums without a trustworthy identity are diverted
    pub holding_dir: PathBuf,

    /// Where non-keeper duplicates are relocated
    pub backup_dir: PathBuf,

    /// Directory holding the state, library and duplicates databases
    pub state_dir: Option<PathBuf>,

    /// Layout policy for the organized tree
    pub layout: LayoutPolicy,

    /// Minimum projected releases before hybrid layout routes by label
    pub min_label_releases: usize,

    /// Enable remix separation and label heuristics
    pub enable_electronic: bool,

    /// Rename tracks to `NN - Title.ext` after moving
    pub rename_tracks: bool,

    /// Skip directories unchanged since a successful run
    pub incremental: bool,

    /// Number of workers (1 = sequential, 0 = one per CPU)
    pub workers: usize,

    /// Timeout for reading the tags of one album
    pub extraction_timeout_secs: u64,

    /// Tag reader backend
    pub tag_backend: TagBackend,

    /// Artist alias groups, first entry of each group is the canonical name
    pub alias_groups: Vec<Vec<String>>,

    /// Treat alias table problems as fatal
    pub strict_aliases: bool,

    /// Maximum directory depth for scanning
    pub max_depth: Option<usize>,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_mode: RunMode::DryRun,
            destination_dir: PathBuf::from("organized"),
            holding_dir: PathBuf::from("unsorted"),
            backup_dir: PathBuf::from("duplicates-backup"),
            state_dir: None,
            layout: LayoutPolicy::Artist,
            min_label_releases: 3,
            enable_electronic: false,
            rename_tracks: false,
            incremental: false,
            workers: 1,
            extraction_timeout_secs: 30,
            tag_backend: TagBackend::Lofty,
            alias_groups: Vec::new(),
            strict_aliases: false,
            max_depth: None,
            log_level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Configuration(format!("Failed to open config file: {}", e)))?;

        let config: Config = serde_json::from_reader(file)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| Error::Configuration(format!("Failed to create config file: {}", e)))?;

        serde_json::to_writer_pretty(file, self)
            .map_err(|e| Error::Configuration(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Validate the configuration, returning alias warnings that are not fatal
    pub fn validate(&self) -> Result<Vec<AliasWarning>> {
        if self.destination_dir == self.holding_dir {
            return Err(Error::Configuration(
                "Destination and holding directories must differ".to_string(),
            ));
        }

        if self.min_label_releases == 0 {
            return Err(Error::Configuration(
                "Minimum label releases must be at least 1".to_string(),
            ));
        }

        if self.extraction_timeout_secs == 0 {
            return Err(Error::Configuration(
                "Extraction timeout must be greater than zero".to_string(),
            ));
        }

        let warnings = validate_alias_groups(&self.alias_groups);
        if self.strict_aliases && !warnings.is_empty() {
            let joined: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();
            return Err(Error::Configuration(format!(
                "Alias table rejected: {}",
                joined.join("; ")
            )));
        }

        Ok(warnings)
    }

    /// Directory for the databases, defaulting to the user's local data directory
    pub fn resolve_state_dir(&self) -> PathBuf {
        match &self.state_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("album-sorter"),
        }
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_secs(self.extraction_timeout_secs)
    }

    /// Effective number of workers
    pub fn worker_count(&self) -> usize {
        if self.workers == 0 {
            num_cpus::get()
        } else {
            self.workers
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_is_dry_run() {
        let config = Config::default();
        assert!(config.run_mode.is_dry_run());
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("album-sorter.json");

        let mut config = Config::default();
        config.layout = LayoutPolicy::Hybrid;
        config.alias_groups = vec![vec!["Aphex Twin".into(), "AFX".into()]];
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.layout, LayoutPolicy::Hybrid);
        assert_eq!(loaded.alias_groups, config.alias_groups);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{ "layout": "series", "min_label_releases": 5 }"#).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.layout, LayoutPolicy::Series);
        assert_eq!(loaded.min_label_releases, 5);
        assert_eq!(loaded.extraction_timeout_secs, 30);
    }

    #[test]
    fn test_strict_aliases_reject_conflicts() {
        let mut config = Config::default();
        config.alias_groups = vec![
            vec!["Aphex Twin".into(), "AFX".into()],
            vec!["Richard D. James".into(), "AFX".into()],
        ];
        assert_eq!(config.validate().unwrap().len(), 1);

        config.strict_aliases = true;
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_same_destination_and_holding_rejected() {
        let mut config = Config::default();
        config.holding_dir = config.destination_dir.clone();
        assert!(config.validate().is_err());
    }
}
