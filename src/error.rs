//! Error taxonomy shared by the extraction pipeline and the inference path.
//!
//! Per-file failures ([`SampleError`]) are reported and skipped by the dataset
//! assembler. Configuration-level problems ([`ConfigurationMismatch`]) abort the
//! operation that detected them.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure that prevents a single source recording from contributing rows.
#[derive(Debug, Error)]
pub enum SampleError {
    /// The file could not be opened, fingerprinted or decoded.
    #[error("Failed to load {path}: {reason}")]
    Load {
        /// File that failed.
        path: PathBuf,
        /// Decoder or IO message.
        reason: String,
    },
    /// Decoding succeeded but produced no usable samples (zero length or silence).
    #[error("No usable audio in {path}")]
    EmptyAudio {
        /// File that decoded to nothing.
        path: PathBuf,
    },
    /// The byte content was already admitted from another file in this run.
    #[error("{path} duplicates content already admitted from {original}")]
    DuplicateContent {
        /// Rejected file.
        path: PathBuf,
        /// File admitted earlier with the same fingerprint.
        original: PathBuf,
    },
    /// Feature extraction rejected the decoded waveform.
    #[error("Feature extraction failed for {path}: {source}")]
    Extraction {
        /// File whose waveform failed extraction.
        path: PathBuf,
        /// Underlying extraction problem.
        source: ExtractionError,
    },
}

impl SampleError {
    /// Discriminant used when aggregating failures into a run summary.
    pub fn kind(&self) -> SampleErrorKind {
        match self {
            Self::Load { .. } => SampleErrorKind::Load,
            Self::EmptyAudio { .. } => SampleErrorKind::EmptyAudio,
            Self::DuplicateContent { .. } => SampleErrorKind::DuplicateContent,
            Self::Extraction { .. } => SampleErrorKind::Extraction,
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Kind of per-file failure, ordered for stable report output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SampleErrorKind {
    Load,
    EmptyAudio,
    DuplicateContent,
    Extraction,
}

impl SampleErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "LoadError",
            Self::EmptyAudio => "EmptyAudioError",
            Self::DuplicateContent => "DuplicateContentError",
            Self::Extraction => "ExtractionError",
        }
    }
}

impl fmt::Display for SampleErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Problems with the intermediate MFCC matrix or the produced vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    /// Higher-order statistics need more than one analysis frame.
    #[error("{frames} analysis frame(s) available, at least {required} required")]
    TooFewFrames { frames: usize, required: usize },
    /// A feature dimension evaluated to NaN or infinity.
    #[error("feature dimension {dimension} is not finite")]
    NonFinite { dimension: usize },
    /// FFT or resampler failure while transforming the signal.
    #[error("signal transform failed: {0}")]
    Transform(String),
    /// The waveform was not produced at the extractor's canonical rate.
    #[error("waveform is {actual} Hz, extractor expects {expected} Hz")]
    SampleRate { expected: u32, actual: u32 },
}

/// Fatal disagreement between the configured feature layout and its consumer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationMismatch {
    /// Vector length differs from what the consumer was built for.
    #[error("feature length mismatch: expected {expected}, got {actual}")]
    FeatureLength { expected: usize, actual: usize },
    /// Feature procedure version differs from what the consumer was built for.
    #[error("feature version mismatch: expected {expected}, got {actual}")]
    FeatureVersion { expected: String, actual: String },
    /// A row carries a label code with no configured category.
    #[error("label {0} has no configured category")]
    UnknownCategory(u32),
    /// Rows extracted with different feature modes were combined.
    #[error("dataset mixes feature layouts {expected} and {actual}")]
    MixedModes { expected: String, actual: String },
}
