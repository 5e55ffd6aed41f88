//! Pipeline configuration loaded from TOML.
//!
//! Every section falls back to its defaults, so an empty file describes the
//! stock two-species run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::augment::AugmentConfig;
use crate::analysis::features::FeatureConfig;

/// Errors raised while loading or validating configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to parse TOML config.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// A value is out of range or inconsistent with another value.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }
}

/// One labeled input folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Subdirectory name under the input root.
    pub name: String,
    /// Integer class code written to the dataset.
    pub label: u32,
}

impl CategoryConfig {
    pub fn new(name: impl Into<String>, label: u32) -> Self {
        Self {
            name: name.into(),
            label,
        }
    }
}

/// Remote folder fetched into a local category directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFolder {
    /// Path inside the remote repository.
    pub remote: String,
    /// Local category directory name.
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Contents API root, e.g. `https://api.github.com/repos/<owner>/<repo>/contents/`.
    pub api_url: String,
    /// Branch or tag passed as `?ref=`.
    pub reference: Option<String>,
    pub folders: Vec<RemoteFolder>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com/repos/FilipyTav/IdentificadorSom/contents/".into(),
            reference: Some("master".into()),
            folders: vec![
                RemoteFolder {
                    remote: "DadosDeAudio/Bem-te-vi (Pitangus sulphuratus)".into(),
                    category: "bemtevi".into(),
                },
                RemoteFolder {
                    remote: "DadosDeAudio/Sabiá-laranjeira (Turdus rufiventris)".into(),
                    category: "sabia".into(),
                },
            ],
        }
    }
}

/// Full configuration of one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    pub categories: Vec<CategoryConfig>,
    /// Lowercase extensions without the dot, most preferred first.
    pub extension_priority: Vec<String>,
    pub features: FeatureConfig,
    pub augmentation: AugmentConfig,
    pub corpus: Option<CorpusConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("audios_passaros"),
            output: PathBuf::from("features_passaros.csv"),
            categories: vec![CategoryConfig::new("sabia", 1), CategoryConfig::new("bemtevi", 2)],
            extension_priority: ["wav", "mp3", "ogg", "flac"].map(String::from).to_vec(),
            features: FeatureConfig::default(),
            augmentation: AugmentConfig::default(),
            corpus: None,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.normalized().validated()
    }

    /// Lowercase extensions and strip leading dots.
    pub fn normalized(mut self) -> Self {
        self.extension_priority = self
            .extension_priority
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.features.validate()?;
        self.augmentation.validate()?;
        if self.categories.is_empty() {
            return Err(ConfigError::invalid("at least one category is required"));
        }
        let mut names = HashSet::new();
        let mut labels = HashSet::new();
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(ConfigError::invalid("category names must not be empty"));
            }
            if !names.insert(category.name.as_str()) {
                return Err(ConfigError::invalid(format!(
                    "duplicate category {:?}",
                    category.name
                )));
            }
            if !labels.insert(category.label) {
                return Err(ConfigError::invalid(format!(
                    "label {} is assigned to more than one category",
                    category.label
                )));
            }
        }
        if self.extension_priority.is_empty() {
            return Err(ConfigError::invalid("extension_priority must not be empty"));
        }
        if self.extension_priority.iter().any(|ext| ext.is_empty()) {
            return Err(ConfigError::invalid("extension_priority contains an empty entry"));
        }
        Ok(())
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Label configured for `category`, if any.
    pub fn label_for(&self, category: &str) -> Option<u32> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.label)
    }
}
