use album_sorter_core::{Config, LayoutPolicy, LogLevel, Organizer, RunMode, TagBackend};
use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use std::path::PathBuf;

#[derive(Clone, Copy, ValueEnum)]
enum OrganizationMode {
    Artist,
    Label,
    Series,
    Hybrid,
}

impl From<OrganizationMode> for LayoutPolicy {
    fn from(mode: OrganizationMode) -> Self {
        match mode {
            OrganizationMode::Artist => LayoutPolicy::Artist,
            OrganizationMode::Label => LayoutPolicy::Label,
            OrganizationMode::Series => LayoutPolicy::Series,
            OrganizationMode::Hybrid => LayoutPolicy::Hybrid,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Lofty,
    Ffprobe,
}

impl From<Backend> for TagBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Lofty => TagBackend::Lofty,
            Backend::Ffprobe => TagBackend::Ffprobe,
        }
    }
}

#[derive(Parser)]
#[command(name = "album-sorter")]
#[command(about = "Organize music releases into a quality-sorted library")]
#[command(version)]
struct Cli {
    /// Directory holding the releases to organize
    source: Option<PathBuf>,

    /// Root of the organized library
    #[arg(short, long)]
    destination: Option<PathBuf>,

    /// Where releases that cannot be identified are moved
    #[arg(long)]
    holding: Option<PathBuf>,

    /// Actually move directories (the default is a dry run)
    #[arg(long = "move")]
    apply: bool,

    /// Skip directories unchanged since they were last organized
    #[arg(long)]
    incremental: bool,

    /// Report duplicate releases in the organized library
    #[arg(long)]
    find_duplicates: bool,

    /// Move lower-quality duplicates into the backup directory
    #[arg(long)]
    resolve_duplicates: bool,

    /// Layout of the organized library
    #[arg(long, value_enum)]
    organization_mode: Option<OrganizationMode>,

    /// Route remix releases into their own subtree
    #[arg(long)]
    enable_electronic: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write a default configuration file and exit
    #[arg(long, value_name = "PATH")]
    generate_config: Option<PathBuf>,

    /// Directory for the state, library and duplicates databases
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Where resolved duplicates are moved
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// Number of parallel workers (0 = one per CPU)
    #[arg(long)]
    workers: Option<usize>,

    /// Rename tracks to "NN - Title" after moving
    #[arg(long)]
    rename_tracks: bool,

    /// Releases a label needs before the hybrid layout files by label
    #[arg(long)]
    min_label_releases: Option<usize>,

    /// Tag reading backend
    #[arg(long, value_enum)]
    tag_backend: Option<Backend>,

    /// Also write the duplicate report as JSON
    #[arg(long, value_name = "PATH")]
    report_json: Option<PathBuf>,

    /// Undo a journaled move by id
    #[arg(long, value_name = "ID")]
    undo_move: Option<i64>,

    /// Write rotating log files to this directory instead of stderr
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Merge command line arguments over the loaded configuration
    fn apply_to(&self, config: &mut Config) {
        if self.apply {
            config.run_mode = RunMode::Live;
        }
        if let Some(dir) = &self.destination {
            config.destination_dir = dir.clone();
        }
        if let Some(dir) = &self.holding {
            config.holding_dir = dir.clone();
        }
        if let Some(dir) = &self.backup_dir {
            config.backup_dir = dir.clone();
        }
        if let Some(dir) = &self.state_dir {
            config.state_dir = Some(dir.clone());
        }
        if let Some(mode) = self.organization_mode {
            config.layout = mode.into();
        }
        if let Some(backend) = self.tag_backend {
            config.tag_backend = backend.into();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(min) = self.min_label_releases {
            config.min_label_releases = min;
        }
        config.incremental |= self.incremental;
        config.enable_electronic |= self.enable_electronic;
        config.rename_tracks |= self.rename_tracks;

        match self.verbose {
            0 => {}
            1 => config.log_level = LogLevel::Debug,
            _ => config.log_level = LogLevel::Trace,
        }
    }
}

fn init_logging(log_dir: Option<&PathBuf>, level: LevelFilter) -> anyhow::Result<()> {
    match log_dir {
        Some(dir) => album_sorter_core::logging::init_logger(dir, level)
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e)),
        None => {
            env_logger::Builder::new()
                .filter_level(level)
                .parse_env(album_sorter_core::logging::LOG_ENV)
                .init();
            Ok(())
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    if let Some(path) = &cli.generate_config {
        Config::default().save_to_file(path)?;
        println!("Configuration file generated at: {}", path.display());
        return Ok(());
    }

    // Set up configuration
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    cli.apply_to(&mut config);

    init_logging(cli.log_dir.as_ref(), config.log_level.to_level_filter())?;

    let has_command = cli.source.is_some()
        || cli.find_duplicates
        || cli.resolve_duplicates
        || cli.undo_move.is_some();
    if !has_command {
        bail!("Nothing to do: pass a source directory or a duplicate/undo command");
    }

    let dry_run = config.run_mode.is_dry_run();
    let organizer = Organizer::new(config)?;
    if let Err(e) = organizer.install_signal_handler() {
        log::warn!("{}", e);
    }
    if dry_run {
        println!("Dry run: no files will be moved (pass --move to apply)");
    }

    if let Some(id) = cli.undo_move {
        match organizer.undo_move(id)? {
            Some(undo_id) => println!("Move #{} undone (journaled as #{})", id, undo_id),
            None => println!("Move #{} would be undone", id),
        }
        return Ok(());
    }

    if let Some(source) = &cli.source {
        info!("Starting organization of {}", source.display());
        let summary = organizer
            .organize(source)
            .with_context(|| format!("Organizing {} failed", source.display()))?;
        println!("{}", summary);
    }

    let report = if cli.resolve_duplicates {
        let (report, summary) = organizer.resolve_duplicates()?;
        println!("{}", report);
        println!(
            "Duplicates moved: {}, failed: {}, groups resolved: {}",
            summary.moved, summary.failed, summary.groups_resolved
        );
        Some(report)
    } else if cli.find_duplicates {
        let report = organizer.find_duplicates()?;
        println!("{}", report);
        Some(report)
    } else {
        None
    };

    if let (Some(report), Some(path)) = (report, &cli.report_json) {
        std::fs::write(path, report.to_json()?)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("Report written to {}", path.display());
    }

    Ok(())
}
