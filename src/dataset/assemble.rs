//! Dataset Assembler: walks the labeled category folders and turns every
//! admitted recording into one original row plus its augmented variants.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::discover::{CandidateFile, ExtensionPriority, scan_category};
use super::fingerprint::{ContentFingerprint, DedupSet};
use super::progress::{ExtractionProgress, progress_tick};
use super::report::{CategoryReport, RunReport};
use super::table::{Dataset, DatasetError, DatasetRow, Provenance};
use crate::analysis::augment::Augmenter;
use crate::analysis::features::FeatureExtractor;
use crate::config::{CategoryConfig, ConfigError, PipelineConfig};
use crate::error::{ConfigurationMismatch, SampleError};

/// Run-level failures. Per-file problems never surface here.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("Input directory {0} does not exist")]
    MissingInput(PathBuf),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Mismatch(#[from] ConfigurationMismatch),
    #[error(transparent)]
    Persist(#[from] DatasetError),
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct AssemblyOutput {
    pub dataset: Dataset,
    pub report: RunReport,
}

#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    extractor: FeatureExtractor,
    augmenter: Augmenter,
    categories: Vec<CategoryConfig>,
    priority: ExtensionPriority,
}

impl DatasetAssembler {
    /// Validate `config` and build the extractor and augmenter it describes.
    pub fn new(config: &PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.features.clone())?;
        let augmenter = Augmenter::new(config.augmentation.clone(), config.features.sample_rate);
        Ok(Self::from_parts(
            extractor,
            augmenter,
            config.categories.clone(),
            ExtensionPriority::new(&config.extension_priority),
        ))
    }

    pub fn from_parts(
        extractor: FeatureExtractor,
        augmenter: Augmenter,
        categories: Vec<CategoryConfig>,
        priority: ExtensionPriority,
    ) -> Self {
        Self {
            extractor,
            augmenter,
            categories,
            priority,
        }
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    /// Process every configured category under `root`.
    ///
    /// `dedup` is shared across categories, so identical content in two folders
    /// contributes once. Missing category folders are reported and skipped.
    pub fn assemble<R: Rng>(
        &self,
        root: &Path,
        dedup: &mut DedupSet,
        rng: &mut R,
        mut progress: Option<&mut dyn FnMut(ExtractionProgress<'_>)>,
    ) -> Result<AssemblyOutput, AssembleError> {
        if !root.is_dir() {
            return Err(AssembleError::MissingInput(root.to_path_buf()));
        }
        let label_names: BTreeMap<u32, String> = self
            .categories
            .iter()
            .map(|c| (c.label, c.name.clone()))
            .collect();
        let mut dataset = Dataset::new(&self.extractor, label_names);
        let mut report = RunReport::default();

        for category in &self.categories {
            let summary = self.assemble_category(
                root,
                category,
                dedup,
                rng,
                &mut dataset,
                &mut report,
                &mut progress,
            )?;
            report.categories.push(summary);
        }
        report.label_distribution = dataset.label_distribution();
        Ok(AssemblyOutput { dataset, report })
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_category<R: Rng>(
        &self,
        root: &Path,
        category: &CategoryConfig,
        dedup: &mut DedupSet,
        rng: &mut R,
        dataset: &mut Dataset,
        report: &mut RunReport,
        progress: &mut Option<&mut dyn FnMut(ExtractionProgress<'_>)>,
    ) -> Result<CategoryReport, AssembleError> {
        let mut summary = CategoryReport {
            name: category.name.clone(),
            label: category.label,
            ..CategoryReport::default()
        };
        let dir = root.join(&category.name);
        let candidates = match scan_category(&dir, &self.priority) {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!("Category folder {} unavailable: {err}", dir.display());
                summary.missing = true;
                return Ok(summary);
            }
        };
        summary.candidates = candidates.len();
        summary.shadowed = candidates.iter().map(|c| c.shadowed.len()).sum();
        info!(
            "Processing category {} (label {}): {} unique recordings",
            category.name,
            category.label,
            candidates.len()
        );

        let total = candidates.len();
        for (idx, candidate) in candidates.iter().enumerate() {
            match self.process_file(candidate, category.label, dedup, rng, report) {
                Ok(rows) => {
                    for row in rows {
                        if row.provenance().is_synthetic() {
                            summary.synthetic_rows += 1;
                        } else {
                            summary.original_rows += 1;
                        }
                        dataset.push(row)?;
                    }
                }
                Err(err) => {
                    warn!("Skipping {}: {err}", candidate.path.display());
                    report.record_failure(&err);
                    summary.skipped_files += 1;
                }
            }
            progress_tick(progress, &category.name, idx + 1, total, summary.skipped_files);
        }
        Ok(summary)
    }

    /// Rows for one canonical file, or the reason it contributes none.
    fn process_file<R: Rng>(
        &self,
        candidate: &CandidateFile,
        label: u32,
        dedup: &mut DedupSet,
        rng: &mut R,
        report: &mut RunReport,
    ) -> Result<Vec<DatasetRow>, SampleError> {
        let path = &candidate.path;
        let fingerprint = ContentFingerprint::of_file(path)?;
        dedup.admit(fingerprint, path)?;

        let waveform = self.extractor.loader().load(path)?;
        let base = self
            .extractor
            .extract(&waveform)
            .map_err(|source| SampleError::Extraction {
                path: path.clone(),
                source,
            })?
            .ok_or_else(|| SampleError::EmptyAudio { path: path.clone() })?;

        let file_name = candidate.file_name();
        let mut rows = Vec::with_capacity(1 + self.augmenter.variants());
        rows.push(DatasetRow::new(base, label, Provenance::original(&file_name)));

        for variant in 0..self.augmenter.variants() {
            let augmented = self.augmenter.augment(waveform.samples(), rng);
            match self.extractor.extract_samples(&augmented) {
                Ok(Some(vector)) => rows.push(DatasetRow::new(
                    vector,
                    label,
                    Provenance::synthetic(&file_name, variant),
                )),
                Ok(None) => {
                    warn!("Augmented variant {variant} of {file_name} is empty");
                    report.skipped_variants += 1;
                }
                Err(err) => {
                    warn!("Augmented variant {variant} of {file_name} failed: {err}");
                    report.skipped_variants += 1;
                }
            }
        }
        debug!(
            "Admitted {} ({fingerprint}): 1 original + {} augmented rows",
            path.display(),
            rows.len() - 1
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::augment::AugmentConfig;
    use crate::analysis::features::FeatureConfig;
    use crate::error::SampleErrorKind;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::tempdir;

    fn write_tone(path: &Path, freq: f32, seconds: f32) {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 22_050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        let len = (22_050.0 * seconds) as usize;
        for i in 0..len {
            let s = (2.0 * std::f32::consts::PI * freq * i as f32 / 22_050.0).sin() * 0.5;
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn assembler(variants: usize) -> DatasetAssembler {
        let config = PipelineConfig {
            categories: vec![CategoryConfig::new("sabia", 1), CategoryConfig::new("bemtevi", 2)],
            augmentation: AugmentConfig {
                variants,
                ..AugmentConfig::default()
            },
            features: FeatureConfig::default(),
            ..PipelineConfig::default()
        };
        DatasetAssembler::new(&config).unwrap()
    }

    #[test]
    fn duplicates_across_categories_are_admitted_once() {
        let root = tempdir().unwrap();
        for name in ["sabia", "bemtevi"] {
            std::fs::create_dir(root.path().join(name)).unwrap();
        }
        write_tone(&root.path().join("sabia/one.wav"), 1_000.0, 0.5);
        std::fs::copy(root.path().join("sabia/one.wav"), root.path().join("bemtevi/two.wav")).unwrap();

        let mut dedup = DedupSet::new();
        let mut rng = StdRng::seed_from_u64(1);
        let output = assembler(0)
            .assemble(root.path(), &mut dedup, &mut rng, None)
            .unwrap();
        assert_eq!(output.dataset.len(), 1);
        assert_eq!(output.report.failures_of(SampleErrorKind::DuplicateContent), 1);
        assert_eq!(output.dataset.labels().to_vec(), vec![1]);
    }

    #[test]
    fn missing_category_folder_is_reported_not_fatal() {
        let root = tempdir().unwrap();
        std::fs::create_dir(root.path().join("sabia")).unwrap();
        write_tone(&root.path().join("sabia/call.wav"), 2_000.0, 0.5);

        let mut dedup = DedupSet::new();
        let mut rng = StdRng::seed_from_u64(2);
        let output = assembler(2)
            .assemble(root.path(), &mut dedup, &mut rng, None)
            .unwrap();
        assert_eq!(output.dataset.len(), 3);
        assert!(output.report.categories[1].missing);
        assert_eq!(output.report.label_distribution, BTreeMap::from([(1, 3)]));
    }

    #[test]
    fn missing_input_root_is_fatal() {
        let root = tempdir().unwrap();
        let mut dedup = DedupSet::new();
        let mut rng = StdRng::seed_from_u64(3);
        let err = assembler(0)
            .assemble(&root.path().join("nope"), &mut dedup, &mut rng, None)
            .unwrap_err();
        assert!(matches!(err, AssembleError::MissingInput(_)));
    }

    #[test]
    fn progress_reports_each_file() {
        let root = tempdir().unwrap();
        std::fs::create_dir(root.path().join("sabia")).unwrap();
        write_tone(&root.path().join("sabia/a.wav"), 500.0, 0.3);
        write_tone(&root.path().join("sabia/b.wav"), 700.0, 0.3);

        let mut ticks = Vec::new();
        let mut record = |p: ExtractionProgress<'_>| ticks.push((p.category.to_string(), p.processed, p.total));
        let mut dedup = DedupSet::new();
        let mut rng = StdRng::seed_from_u64(4);
        assembler(0)
            .assemble(root.path(), &mut dedup, &mut rng, Some(&mut record))
            .unwrap();
        assert_eq!(
            ticks,
            vec![("sabia".to_string(), 1, 2), ("sabia".to_string(), 2, 2)]
        );
    }
}
