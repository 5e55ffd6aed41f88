//! Feature Extractor shared by dataset assembly and inference.
//!
//! One [`FeatureConfig`] fixes the whole procedure: sample rate, STFT geometry,
//! coefficient count and statistic layout. Both the offline pipeline and
//! [`crate::inference`] build a [`FeatureExtractor`] from it, so a vector produced
//! at training time and one produced at scoring time come from the same code path.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::audio::{AudioLoader, DEFAULT_SAMPLE_RATE, Waveform};
use super::frequency_domain::stats::{self, Statistic};
use super::frequency_domain::{MfccAnalyzer, MfccMatrix};
use crate::config::ConfigError;
use crate::error::{ExtractionError, SampleError};
use crate::inference::FeatureSignature;

/// Feature layout generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureMode {
    /// Seven statistics per coefficient, `coefficient_count * 7` dimensions.
    #[default]
    Statistics,
    /// Legacy per-coefficient mean, `coefficient_count` dimensions.
    MeanOnly,
}

impl FeatureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Statistics => "statistics",
            Self::MeanOnly => "mean_only",
        }
    }

    pub fn dimension(&self, coefficient_count: usize) -> usize {
        match self {
            Self::Statistics => coefficient_count * Statistic::ALL.len(),
            Self::MeanOnly => coefficient_count,
        }
    }

    fn min_frames(&self) -> usize {
        match self {
            Self::Statistics => 2,
            Self::MeanOnly => 1,
        }
    }
}

impl std::fmt::Display for FeatureMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every setting that changes the produced vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub sample_rate: u32,
    pub coefficient_count: usize,
    pub mode: FeatureMode,
    pub fft_size: usize,
    pub hop_size: usize,
    pub mel_bands: usize,
    pub top_db: f32,
    pub peak_normalize: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            coefficient_count: 13,
            mode: FeatureMode::Statistics,
            fft_size: 2048,
            hop_size: 512,
            mel_bands: 128,
            top_db: 80.0,
            peak_normalize: true,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::invalid("features.sample_rate must be positive"));
        }
        if self.mel_bands == 0 {
            return Err(ConfigError::invalid("features.mel_bands must be positive"));
        }
        if self.coefficient_count == 0 || self.coefficient_count > self.mel_bands {
            return Err(ConfigError::invalid(format!(
                "features.coefficient_count must be in 1..={}, got {}",
                self.mel_bands, self.coefficient_count
            )));
        }
        if !self.fft_size.is_power_of_two() {
            return Err(ConfigError::invalid(format!(
                "features.fft_size must be a power of two, got {}",
                self.fft_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.fft_size {
            return Err(ConfigError::invalid(format!(
                "features.hop_size must be in 1..={}, got {}",
                self.fft_size, self.hop_size
            )));
        }
        if !self.top_db.is_finite() || self.top_db <= 0.0 {
            return Err(ConfigError::invalid("features.top_db must be a positive number"));
        }
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.mode.dimension(self.coefficient_count)
    }

    /// Stable identifier of the extraction procedure for this configuration.
    pub fn version(&self) -> String {
        let stat_names: Vec<&str> = Statistic::ALL.iter().map(Statistic::name).collect();
        let payload = format!(
            "mode={}|sr={}|n={}|fft={}|hop={}|mels={}|top_db={}|peak={}|window=hann_periodic|mel=slaney|dct=ortho|stats={}",
            self.mode,
            self.sample_rate,
            self.coefficient_count,
            self.fft_size,
            self.hop_size,
            self.mel_bands,
            self.top_db,
            self.peak_normalize,
            stat_names.join(",")
        );
        let hash = blake3::hash(payload.as_bytes());
        format!("mfcc_v1_{}", &hash.to_hex()[..16])
    }
}

/// Dimension names for a layout, in vector order.
///
/// Statistics mode yields `mfcc_<k>_<stat>` grouped by statistic: all means, then all
/// standard deviations, and so on. Mean-only mode yields `mfcc_<k>`.
pub fn feature_names(mode: FeatureMode, coefficient_count: usize) -> Vec<String> {
    match mode {
        FeatureMode::MeanOnly => (0..coefficient_count).map(|k| format!("mfcc_{k}")).collect(),
        FeatureMode::Statistics => Statistic::ALL
            .iter()
            .flat_map(|stat| (0..coefficient_count).map(move |k| format!("mfcc_{k}_{}", stat.name())))
            .collect(),
    }
}

/// Fixed-length feature vector produced by [`FeatureExtractor`].
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    #[cfg(test)]
    pub(crate) fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Versioned MFCC feature extractor.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    analyzer: MfccAnalyzer,
    names: Vec<String>,
    version: String,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let analyzer = MfccAnalyzer::new(
            config.sample_rate,
            config.fft_size,
            config.hop_size,
            config.mel_bands,
            config.coefficient_count,
            config.top_db,
        );
        let names = feature_names(config.mode, config.coefficient_count);
        let version = config.version();
        Ok(Self {
            config,
            analyzer,
            names,
            version,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn mode(&self) -> FeatureMode {
        self.config.mode
    }

    pub fn dimension(&self) -> usize {
        self.names.len()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn signature(&self) -> FeatureSignature {
        FeatureSignature::new(self.version.clone(), self.dimension())
    }

    /// Loader configured with this extractor's sample rate and normalization.
    pub fn loader(&self) -> AudioLoader {
        AudioLoader::new(self.config.sample_rate, self.config.peak_normalize)
    }

    /// Extract a vector from a loaded waveform. Returns `Ok(None)` for an empty waveform.
    pub fn extract(&self, waveform: &Waveform) -> Result<Option<FeatureVector>, ExtractionError> {
        if waveform.sample_rate() != self.config.sample_rate {
            return Err(ExtractionError::SampleRate {
                expected: self.config.sample_rate,
                actual: waveform.sample_rate(),
            });
        }
        self.extract_samples(waveform.samples())
    }

    /// Extract from raw mono samples already at the canonical rate.
    pub fn extract_samples(&self, samples: &[f32]) -> Result<Option<FeatureVector>, ExtractionError> {
        if samples.is_empty() {
            return Ok(None);
        }
        let matrix = self.analyzer.mfcc(samples);
        if matrix.coefficient_count() != self.config.coefficient_count {
            return Err(ExtractionError::Transform(format!(
                "MFCC matrix has {} coefficient rows, expected {}",
                matrix.coefficient_count(),
                self.config.coefficient_count
            )));
        }
        let required = self.config.mode.min_frames();
        if matrix.frame_count() < required {
            return Err(ExtractionError::TooFewFrames {
                frames: matrix.frame_count(),
                required,
            });
        }
        let values = self.reduce(&matrix);
        self.check_vector(&values)?;
        Ok(Some(FeatureVector(values)))
    }

    /// Inference entry point: load `path` and extract with this configuration.
    pub fn extract_file(&self, path: &Path) -> Result<FeatureVector, SampleError> {
        let waveform = self.loader().load(path)?;
        let vector = self
            .extract(&waveform)
            .map_err(|source| SampleError::Extraction {
                path: path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| SampleError::EmptyAudio {
                path: path.to_path_buf(),
            })?;
        debug!(
            "Extracted {} features from {} ({:.2}s)",
            vector.len(),
            path.display(),
            waveform.duration_seconds()
        );
        Ok(vector)
    }

    fn reduce(&self, matrix: &MfccMatrix) -> Vec<f32> {
        match self.config.mode {
            FeatureMode::MeanOnly => matrix.rows.iter().map(|row| stats::mean(row)).collect(),
            FeatureMode::Statistics => {
                let n = matrix.coefficient_count();
                let mut values = vec![0.0_f32; n * Statistic::ALL.len()];
                for (k, row) in matrix.rows.iter().enumerate() {
                    for (block, value) in stats::summarize(row).into_iter().enumerate() {
                        values[block * n + k] = value;
                    }
                }
                values
            }
        }
    }

    fn check_vector(&self, values: &[f32]) -> Result<(), ExtractionError> {
        if values.len() != self.dimension() {
            return Err(ExtractionError::Transform(format!(
                "produced {} dimensions, expected {}",
                values.len(),
                self.dimension()
            )));
        }
        match values.iter().position(|v| !v.is_finite()) {
            Some(dimension) => Err(ExtractionError::NonFinite { dimension }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chirp(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / 22_050.0;
                0.6 * (2.0 * std::f32::consts::PI * (800.0 + 1_200.0 * t) * t).sin()
            })
            .collect()
    }

    #[test]
    fn statistics_mode_names_are_grouped_by_statistic() {
        let names = feature_names(FeatureMode::Statistics, 13);
        assert_eq!(names.len(), 91);
        assert_eq!(names[0], "mfcc_0_mean");
        assert_eq!(names[12], "mfcc_12_mean");
        assert_eq!(names[13], "mfcc_0_std");
        assert_eq!(names[90], "mfcc_12_kurt");
    }

    #[test]
    fn mean_only_names_have_no_statistic_suffix() {
        assert_eq!(feature_names(FeatureMode::MeanOnly, 3), vec!["mfcc_0", "mfcc_1", "mfcc_2"]);
    }

    #[test]
    fn vector_length_follows_mode() {
        let samples = chirp(22_050);
        let stats = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let vector = stats.extract_samples(&samples).unwrap().unwrap();
        assert_eq!(vector.len(), 91);

        let legacy = FeatureExtractor::new(FeatureConfig {
            mode: FeatureMode::MeanOnly,
            ..FeatureConfig::default()
        })
        .unwrap();
        assert_eq!(legacy.extract_samples(&samples).unwrap().unwrap().len(), 13);
    }

    #[test]
    fn mean_block_matches_mean_only_vector() {
        let samples = chirp(11_025);
        let stats = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let legacy = FeatureExtractor::new(FeatureConfig {
            mode: FeatureMode::MeanOnly,
            ..FeatureConfig::default()
        })
        .unwrap();
        let full = stats.extract_samples(&samples).unwrap().unwrap();
        let means = legacy.extract_samples(&samples).unwrap().unwrap();
        assert_eq!(&full.as_slice()[..13], means.as_slice());
    }

    #[test]
    fn empty_waveform_yields_none() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        assert_eq!(extractor.extract_samples(&[]).unwrap(), None);
    }

    #[test]
    fn single_frame_signal_is_rejected_in_statistics_mode() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let err = extractor.extract_samples(&chirp(100)).unwrap_err();
        assert_eq!(err, ExtractionError::TooFewFrames { frames: 1, required: 2 });
    }

    #[test]
    fn wrong_sample_rate_is_rejected() {
        let extractor = FeatureExtractor::new(FeatureConfig::default()).unwrap();
        let waveform = Waveform::new(chirp(16_000), 16_000);
        assert!(matches!(
            extractor.extract(&waveform),
            Err(ExtractionError::SampleRate { expected: 22_050, actual: 16_000 })
        ));
    }

    #[test]
    fn version_changes_with_any_vector_affecting_setting() {
        let base = FeatureConfig::default();
        let other_mode = FeatureConfig {
            mode: FeatureMode::MeanOnly,
            ..base.clone()
        };
        let other_hop = FeatureConfig {
            hop_size: 256,
            ..base.clone()
        };
        assert_eq!(base.version(), FeatureConfig::default().version());
        assert_ne!(base.version(), other_mode.version());
        assert_ne!(base.version(), other_hop.version());
        assert!(base.version().starts_with("mfcc_v1_"));
    }

    #[test]
    fn peak_normalization_is_on_by_default_and_versioned() {
        let base = FeatureConfig::default();
        assert!(base.peak_normalize);
        let raw = FeatureConfig {
            peak_normalize: false,
            ..base.clone()
        };
        assert_ne!(base.version(), raw.version());
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let cases = [
            FeatureConfig {
                coefficient_count: 0,
                ..FeatureConfig::default()
            },
            FeatureConfig {
                coefficient_count: 200,
                ..FeatureConfig::default()
            },
            FeatureConfig {
                fft_size: 1000,
                ..FeatureConfig::default()
            },
            FeatureConfig {
                hop_size: 4096,
                ..FeatureConfig::default()
            },
            FeatureConfig {
                top_db: f32::NAN,
                ..FeatureConfig::default()
            },
        ];
        for config in cases {
            assert!(FeatureExtractor::new(config).is_err());
        }
    }
}
