//! Tracing setup for the command-line tools.
//!
//! A global subscriber writes human-readable lines to stderr and, unless
//! disabled, to a per-run `chirpset_<timestamp>.log` file. Only the newest
//! [`MAX_LOG_FILES`] chirpset log files are kept.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*};

use crate::app_dirs::{self, AppDirError};

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;
const LOG_FILE_PREFIX: &str = "chirpset_";
const FILE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]_[hour]-[minute]-[second]");
const LINE_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

static INSTALLED: OnceLock<Option<WorkerGuard>> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error("Failed to {action} {path}: {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to format log filename time: {0}")]
    FormatTime(#[from] time::error::Format),
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

fn io_error(action: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> LoggingError {
    let path = path.to_path_buf();
    move |source| LoggingError::Io { action, path, source }
}

/// How [`init`] should configure the subscriber.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Directive used when `RUST_LOG` is unset.
    pub default_directive: String,
    /// Also write a log file.
    pub file: bool,
    /// Log directory; defaults to `<config base>/.chirpset/logs`.
    pub directory: Option<PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            file: true,
            directory: None,
        }
    }
}

impl LogOptions {
    /// Default options with `debug` verbosity when `verbose` is set.
    pub fn verbose(verbose: bool) -> Self {
        Self {
            default_directive: if verbose { "debug" } else { "info" }.to_string(),
            ..Self::default()
        }
    }
}

/// Install the global subscriber. Subsequent calls are no-ops.
///
/// Errors are returned so binaries can fall back to plain stderr output.
pub fn init(options: &LogOptions) -> Result<(), LoggingError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&options.default_directive));
    let timer = line_timer();
    let stderr = fmt::layer()
        .with_timer(timer.clone())
        .with_writer(std::io::stderr);

    let log_file = if options.file {
        Some(open_log_file(options.directory.as_deref())?)
    } else {
        None
    };
    let (file_layer, guard) = match &log_file {
        Some((dir, name)) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer().with_ansi(false).with_timer(timer).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing::subscriber::set_global_default(
        Registry::default().with(filter).with(stderr).with(file_layer),
    )?;
    let _ = INSTALLED.set(guard);
    if let Some((dir, name)) = log_file {
        tracing::debug!("Logging to {}", dir.join(name).display());
    }
    Ok(())
}

/// Create this run's log file and prune old ones. Returns the directory and file name.
fn open_log_file(directory: Option<&Path>) -> Result<(PathBuf, String), LoggingError> {
    let dir = match directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(io_error("create log directory", dir))?;
            dir.to_path_buf()
        }
        None => app_dirs::logs_dir()?,
    };
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let name = log_file_name(now)?;
    let path = dir.join(&name);
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(io_error("create log file", &path))?;
    prune_old_logs(&dir, MAX_LOG_FILES)?;
    Ok((dir, name))
}

fn log_file_name(now: OffsetDateTime) -> Result<String, LoggingError> {
    Ok(format!("{LOG_FILE_PREFIX}{}.log", now.format(FILE_STAMP)?))
}

fn is_own_log(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "log")
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX))
}

/// Delete the oldest chirpset log files beyond `keep`.
fn prune_old_logs(dir: &Path, keep: usize) -> Result<(), LoggingError> {
    let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(dir)
        .map_err(io_error("read log directory", dir))?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|kind| kind.is_file()))
        .map(|entry| entry.path())
        .filter(|path| is_own_log(path))
        .map(|path| {
            let modified = fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, path)
        })
        .collect();
    if logs.len() <= keep {
        return Ok(());
    }
    logs.sort();
    let excess = logs.len() - keep;
    for (_, path) in logs.into_iter().take(excess) {
        fs::remove_file(&path).map_err(io_error("remove old log file", &path))?;
    }
    Ok(())
}

fn line_timer() -> OffsetTime<BorrowedFormatItem<'static>> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, LINE_STAMP.into())
}
