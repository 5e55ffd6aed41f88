//! Inference-time interface: score one recording with a trained model using the
//! same [`FeatureExtractor`] the dataset was built with.
//!
//! Models are external collaborators behind [`Classifier`]. Any disagreement
//! between the extractor and the model's expected input is a
//! [`ConfigurationMismatch`]; vectors are never padded or truncated.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::features::FeatureExtractor;
use crate::error::{ConfigurationMismatch, SampleError};

/// Identity of a feature layout: procedure version plus vector length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSignature {
    version: String,
    dimension: usize,
}

impl FeatureSignature {
    pub fn new(version: impl Into<String>, dimension: usize) -> Self {
        Self {
            version: version.into(),
            dimension,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// `Ok` when `actual` was produced by the same procedure as `self`.
    pub fn ensure_matches(&self, actual: &FeatureSignature) -> Result<(), ConfigurationMismatch> {
        if self.dimension != actual.dimension {
            return Err(ConfigurationMismatch::FeatureLength {
                expected: self.dimension,
                actual: actual.dimension,
            });
        }
        if self.version != actual.version {
            return Err(ConfigurationMismatch::FeatureVersion {
                expected: self.version.clone(),
                actual: actual.version.clone(),
            });
        }
        Ok(())
    }
}

/// A trained model that consumes feature vectors.
pub trait Classifier {
    /// Layout the model was trained on.
    fn signature(&self) -> &FeatureSignature;

    /// Predicted label code for one vector of `signature().dimension()` values.
    fn predict(&self, features: &[f32]) -> u32;
}

#[derive(Debug, Error)]
pub enum ScoreError {
    /// Fatal: the model cannot consume this extractor's vectors.
    #[error(transparent)]
    Mismatch(#[from] ConfigurationMismatch),
    /// The recording itself could not be turned into a vector.
    #[error(transparent)]
    Sample(#[from] SampleError),
}

/// Prediction for one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub label: u32,
    pub features: Vec<f32>,
}

/// Extract `path` with `extractor` and let `classifier` score it.
///
/// The signature check runs before any audio is decoded, and the produced vector
/// length is checked again before the model sees it.
pub fn score_file(
    extractor: &FeatureExtractor,
    classifier: &dyn Classifier,
    path: &Path,
) -> Result<Score, ScoreError> {
    classifier.signature().ensure_matches(&extractor.signature())?;
    let vector = extractor.extract_file(path)?;
    let expected = classifier.signature().dimension();
    if vector.len() != expected {
        return Err(ConfigurationMismatch::FeatureLength {
            expected,
            actual: vector.len(),
        }
        .into());
    }
    let features = vector.into_vec();
    let label = classifier.predict(&features);
    Ok(Score { label, features })
}
