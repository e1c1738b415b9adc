//! File logging for long unattended runs.

use log::{info, LevelFilter};
use std::path::Path;

use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Environment variable that overrides the configured level
pub const LOG_ENV: &str = "ALBUM_SORTER_LOG";

const LOG_FILE: &str = "album-sorter.log";
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
const ARCHIVED_LOGS: u32 = 5;
const LINE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} {l:<5} {M} - {m}{n}";

/// Level from `ALBUM_SORTER_LOG` when set and valid, `fallback` otherwise
pub fn effective_level(fallback: LevelFilter) -> LevelFilter {
    std::env::var(LOG_ENV)
        .ok()
        .and_then(|v| v.trim().parse::<LevelFilter>().ok())
        .unwrap_or(fallback)
}

/// Route all log output to `<log_dir>/album-sorter.log`, rolled over at
/// 10 MiB into `album-sorter.N.log`. Stderr stays free for the progress bar.
pub fn init_logger(log_dir: &Path, level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE);
    let archive_pattern = log_dir.join("album-sorter.{}.log");

    let roller = FixedWindowRoller::builder()
        .build(&archive_pattern.to_string_lossy(), ARCHIVED_LOGS)
        .map_err(|e| format!("log roller: {}", e))?;
    let policy = CompoundPolicy::new(
        Box::new(SizeTrigger::new(MAX_LOG_BYTES)),
        Box::new(roller),
    );
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LINE_PATTERN)))
        .build(&log_path, Box::new(policy))
        .map_err(|e| format!("log file {}: {}", log_path.display(), e))?;

    let level = effective_level(level);
    let config = Config::builder()
        .appender(Appender::builder().build("organizer", Box::new(appender)))
        .build(Root::builder().appender("organizer").build(level))?;
    log4rs::init_config(config)?;

    info!("Logging at {} to {}", level, log_path.display());
    Ok(())
}

/// Log a filesystem operation that failed
#[macro_export]
macro_rules! log_file_error {
    ($path:expr, $operation:expr, $error:expr) => {
        log::error!(
            "File operation failed - Operation: {}, Path: {}, Error: {}",
            $operation,
            $path.display(),
            $error
        )
    };
}

/// Log a filesystem modification
#[macro_export]
macro_rules! log_fs_modification {
    ($operation:expr, $path:expr) => {
        log::info!("FS CHANGE - Operation: {}, Path: {}", $operation, $path.display())
    };
    ($operation:expr, $path:expr, $details:expr) => {
        log::info!(
            "FS CHANGE - Operation: {}, Path: {}, Details: {}",
            $operation,
            $path.display(),
            $details
        )
    };
}
