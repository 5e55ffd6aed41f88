//! Bird-call feature extraction and augmentation pipeline.
//!
//! Turns labeled folders of recordings into a deduplicated table of MFCC
//! statistic vectors, optionally expanded with augmented variants, and exposes
//! the same extractor for scoring single files at inference time.

/// Audio loading, MFCC features and augmentation.
pub mod analysis;
/// Application directories used for logs.
pub mod app_dirs;
/// Pipeline configuration.
pub mod config;
/// Optional download of the raw audio corpus.
pub mod corpus;
/// Dataset assembly and persistence.
pub mod dataset;
/// Error taxonomy.
pub mod error;
mod http_client;
/// Scoring single recordings with a trained model.
pub mod inference;
/// Tracing subscriber setup.
pub mod logging;

pub use analysis::audio::{AudioLoader, DEFAULT_SAMPLE_RATE, Waveform};
pub use analysis::augment::{AugmentConfig, Augmenter};
pub use analysis::features::{FeatureConfig, FeatureExtractor, FeatureMode, FeatureVector, feature_names};
pub use analysis::Statistic;
pub use config::{CategoryConfig, ConfigError, PipelineConfig};
pub use dataset::{
    AssembleError, AssemblyOutput, ContentFingerprint, Dataset, DatasetAssembler, DatasetError,
    DatasetRow, DatasetSplit, DedupSet, Provenance, extract_dataset,
};
pub use error::{ConfigurationMismatch, ExtractionError, SampleError, SampleErrorKind};
pub use inference::{Classifier, FeatureSignature, Score, ScoreError, score_file};
