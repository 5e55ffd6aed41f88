//! Per-user application folder. Everything chirpset writes outside the dataset
//! output (currently only logs) lives under `<config dir>/.chirpset`, or under
//! `$CHIRPSET_CONFIG_HOME/.chirpset` when that variable is set.

use std::path::{Path, PathBuf};

use directories::BaseDirs;
use thiserror::Error;

pub const APP_DIR_NAME: &str = ".chirpset";
pub const CONFIG_HOME_ENV: &str = "CHIRPSET_CONFIG_HOME";
const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Error)]
pub enum AppDirError {
    #[error("No config directory found; set {CONFIG_HOME_ENV} to choose one")]
    NoBaseDir,
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Layout of the application folder below a chosen base directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    root: PathBuf,
}

impl AppDirs {
    /// Resolve the base from the environment override or the OS config dir.
    pub fn discover() -> Result<Self, AppDirError> {
        let base = std::env::var_os(CONFIG_HOME_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or_else(|| BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf()))
            .ok_or(AppDirError::NoBaseDir)?;
        Ok(Self::under(&base))
    }

    pub fn under(base: &Path) -> Self {
        Self {
            root: base.join(APP_DIR_NAME),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/logs`, created on demand.
    pub fn ensure_logs(&self) -> Result<PathBuf, AppDirError> {
        let logs = self.root.join(LOGS_DIR_NAME);
        std::fs::create_dir_all(&logs).map_err(|source| AppDirError::CreateDir {
            path: logs.clone(),
            source,
        })?;
        Ok(logs)
    }
}

/// Logs directory of the discovered application folder, created if needed.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    AppDirs::discover()?.ensure_logs()
}
