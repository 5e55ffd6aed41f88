//! The assembled dataset: rows, CSV + manifest persistence, and the handle
//! training code consumes.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::csv;
use crate::analysis::features::{FeatureExtractor, FeatureMode, FeatureVector, feature_names};
use crate::analysis::Statistic;
use crate::error::ConfigurationMismatch;
use crate::inference::FeatureSignature;

/// Dataset layout version written to the manifest.
pub const FORMAT_VERSION: u32 = 1;

const LABEL_COLUMN: &str = "label";
const ORIGIN_COLUMN: &str = "origin";
const SYNTHETIC_COLUMN: &str = "synthetic";
const SYNTHETIC_PREFIX: &str = "AUG_";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid manifest {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Malformed dataset {path} at line {line}: {reason}")]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("Dataset {path} disagrees with its manifest: {reason}")]
    ManifestMismatch { path: PathBuf, reason: String },
    #[error("Split fraction must be in [0, 1), got {0}")]
    InvalidSplit(f64),
    #[error(transparent)]
    Mismatch(#[from] ConfigurationMismatch),
}

/// Where a row came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Provenance {
    source_file: String,
    variant: Option<usize>,
}

impl Provenance {
    pub fn original(source_file: impl Into<String>) -> Self {
        Self {
            source_file: source_file.into(),
            variant: None,
        }
    }

    /// Row produced by augmentation round `variant` of `source_file`.
    pub fn synthetic(source_file: impl Into<String>, variant: usize) -> Self {
        Self {
            source_file: source_file.into(),
            variant: Some(variant),
        }
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn variant(&self) -> Option<usize> {
        self.variant
    }

    pub fn is_synthetic(&self) -> bool {
        self.variant.is_some()
    }

    /// Value of the `origin` column: the file name, or `AUG_<n>_<file>`.
    pub fn origin(&self) -> String {
        match self.variant {
            Some(n) => format!("{SYNTHETIC_PREFIX}{n}_{}", self.source_file),
            None => self.source_file.clone(),
        }
    }

    fn parse(origin: &str, synthetic: bool) -> Option<Self> {
        if !synthetic {
            return Some(Self::original(origin));
        }
        let rest = origin.strip_prefix(SYNTHETIC_PREFIX)?;
        let (n, file) = rest.split_once('_')?;
        Some(Self::synthetic(file, n.parse().ok()?))
    }
}

/// One labeled, fully validated feature row.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    features: Vec<f32>,
    label: u32,
    provenance: Provenance,
}

impl DatasetRow {
    pub fn new(features: FeatureVector, label: u32, provenance: Provenance) -> Self {
        Self {
            features: features.into_vec(),
            label,
            provenance,
        }
    }

    pub fn features(&self) -> &[f32] {
        &self.features
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }
}

/// Sidecar metadata written next to the CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetManifest {
    pub format_version: u32,
    pub feature_version: String,
    pub mode: FeatureMode,
    pub dimension: usize,
    pub sample_rate: u32,
    pub coefficient_count: usize,
    pub row_count: usize,
    /// Label code to category name.
    pub labels: BTreeMap<u32, String>,
}

/// Path of the manifest that accompanies `csv_path`.
pub fn manifest_path(csv_path: &Path) -> PathBuf {
    let mut name = csv_path.as_os_str().to_owned();
    name.push(".manifest.json");
    PathBuf::from(name)
}

/// Ordered collection of rows sharing one feature layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    names: Vec<String>,
    mode: FeatureMode,
    feature_version: String,
    sample_rate: u32,
    coefficient_count: usize,
    label_names: BTreeMap<u32, String>,
    rows: Vec<DatasetRow>,
}

/// Train/test partition produced by [`Dataset::stratified_split`].
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Dataset,
    pub test: Dataset,
}

impl Dataset {
    /// Empty dataset using `extractor`'s layout.
    pub fn new(extractor: &FeatureExtractor, label_names: BTreeMap<u32, String>) -> Self {
        let config = extractor.config();
        Self {
            names: extractor.feature_names().to_vec(),
            mode: config.mode,
            feature_version: extractor.version().to_string(),
            sample_rate: config.sample_rate,
            coefficient_count: config.coefficient_count,
            label_names,
            rows: Vec::new(),
        }
    }

    /// Append a row. Rows of the wrong width or with an unnamed label are refused.
    pub fn push(&mut self, row: DatasetRow) -> Result<(), ConfigurationMismatch> {
        if row.features.len() != self.names.len() {
            return Err(ConfigurationMismatch::FeatureLength {
                expected: self.names.len(),
                actual: row.features.len(),
            });
        }
        if !self.label_names.contains_key(&row.label) {
            return Err(ConfigurationMismatch::UnknownCategory(row.label));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Append every row of `other`, which must share this dataset's layout.
    pub fn merge(&mut self, other: Dataset) -> Result<(), ConfigurationMismatch> {
        if other.mode != self.mode {
            return Err(ConfigurationMismatch::MixedModes {
                expected: self.mode.to_string(),
                actual: other.mode.to_string(),
            });
        }
        if other.feature_version != self.feature_version {
            return Err(ConfigurationMismatch::FeatureVersion {
                expected: self.feature_version.clone(),
                actual: other.feature_version,
            });
        }
        for (label, name) in other.label_names {
            self.label_names.entry(label).or_insert(name);
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn mode(&self) -> FeatureMode {
        self.mode
    }

    pub fn feature_version(&self) -> &str {
        &self.feature_version
    }

    pub fn label_names(&self) -> &BTreeMap<u32, String> {
        &self.label_names
    }

    /// Ordered feature dimension names.
    pub fn feature_names(&self) -> &[String] {
        &self.names
    }

    /// Row-major `rows x dimension` feature matrix.
    pub fn feature_matrix(&self) -> Array2<f32> {
        Array2::from_shape_fn((self.rows.len(), self.names.len()), |(i, j)| {
            self.rows[i].features[j]
        })
    }

    pub fn labels(&self) -> Array1<u32> {
        self.rows.iter().map(|row| row.label).collect()
    }

    pub fn provenance(&self) -> Vec<&Provenance> {
        self.rows.iter().map(|row| &row.provenance).collect()
    }

    /// Row count per label, including synthetic rows.
    pub fn label_distribution(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for row in &self.rows {
            *counts.entry(row.label).or_default() += 1;
        }
        counts
    }

    pub fn signature(&self) -> FeatureSignature {
        FeatureSignature::new(self.feature_version.clone(), self.names.len())
    }

    pub fn manifest(&self) -> DatasetManifest {
        DatasetManifest {
            format_version: FORMAT_VERSION,
            feature_version: self.feature_version.clone(),
            mode: self.mode,
            dimension: self.names.len(),
            sample_rate: self.sample_rate,
            coefficient_count: self.coefficient_count,
            row_count: self.rows.len(),
            labels: self.label_names.clone(),
        }
    }

    /// Deterministic per-label split that keeps every augmented variant on the
    /// same side as its original recording.
    pub fn stratified_split(&self, seed: &str, test_fraction: f64) -> Result<DatasetSplit, DatasetError> {
        if !(0.0..1.0).contains(&test_fraction) {
            return Err(DatasetError::InvalidSplit(test_fraction));
        }
        let mut by_label: BTreeMap<u32, Vec<(u128, &str)>> = BTreeMap::new();
        for row in &self.rows {
            let source = row.provenance.source_file();
            let entries = by_label.entry(row.label).or_default();
            if entries.iter().any(|(_, s)| *s == source) {
                continue;
            }
            let hash = blake3::hash(format!("{seed}|{}|{source}", row.label).as_bytes());
            let mut key = [0u8; 16];
            key.copy_from_slice(&hash.as_bytes()[..16]);
            entries.push((u128::from_le_bytes(key), source));
        }

        let mut in_test: HashMap<(u32, &str), bool> = HashMap::new();
        for (label, mut sources) in by_label {
            sources.sort();
            let n = sources.len();
            let test_n = if n < 2 {
                0
            } else {
                (((n as f64) * test_fraction).round() as usize).min(n - 1)
            };
            for (idx, (_, source)) in sources.into_iter().enumerate() {
                in_test.insert((label, source), idx < test_n);
            }
        }

        let mut train = self.empty_like();
        let mut test = self.empty_like();
        for row in &self.rows {
            let key = (row.label, row.provenance.source_file());
            if in_test.get(&key).copied().unwrap_or(false) {
                test.rows.push(row.clone());
            } else {
                train.rows.push(row.clone());
            }
        }
        Ok(DatasetSplit { train, test })
    }

    fn empty_like(&self) -> Self {
        Self {
            names: self.names.clone(),
            mode: self.mode,
            feature_version: self.feature_version.clone(),
            sample_rate: self.sample_rate,
            coefficient_count: self.coefficient_count,
            label_names: self.label_names.clone(),
            rows: Vec::new(),
        }
    }

    /// Write the CSV table and its manifest.
    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        let io_err = |source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut writer = BufWriter::new(File::create(path).map_err(io_err)?);
        let header = self
            .names
            .iter()
            .map(String::as_str)
            .chain([LABEL_COLUMN, ORIGIN_COLUMN, SYNTHETIC_COLUMN]);
        csv::write_record(&mut writer, header).map_err(io_err)?;
        for row in &self.rows {
            let fields = row
                .features
                .iter()
                .map(|v| v.to_string())
                .chain([
                    row.label.to_string(),
                    row.provenance.origin(),
                    u8::from(row.provenance.is_synthetic()).to_string(),
                ]);
            csv::write_record(&mut writer, fields).map_err(io_err)?;
        }
        writer.flush().map_err(io_err)?;

        let manifest_file = manifest_path(path);
        let bytes = serde_json::to_vec_pretty(&self.manifest()).map_err(|source| DatasetError::Json {
            path: manifest_file.clone(),
            source,
        })?;
        std::fs::write(&manifest_file, bytes).map_err(|source| DatasetError::Io {
            path: manifest_file.clone(),
            source,
        })
    }

    /// Read a dataset written by [`Dataset::save`] verbatim.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let manifest_file = manifest_path(path);
        let manifest_bytes = std::fs::read(&manifest_file).map_err(|source| DatasetError::Io {
            path: manifest_file.clone(),
            source,
        })?;
        let manifest: DatasetManifest =
            serde_json::from_slice(&manifest_bytes).map_err(|source| DatasetError::Json {
                path: manifest_file.clone(),
                source,
            })?;
        let text = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |line: usize, reason: String| DatasetError::Malformed {
            path: path.to_path_buf(),
            line,
            reason,
        };
        let mismatch = |reason: String| DatasetError::ManifestMismatch {
            path: path.to_path_buf(),
            reason,
        };

        let mut records = csv::parse_records(&text)
            .map_err(|(line, reason)| malformed(line, reason))?
            .into_iter();
        let header = records
            .next()
            .ok_or_else(|| malformed(1, "missing header".into()))?;
        let (names, trailer) = header.split_at(header.len().saturating_sub(3));
        if trailer != [LABEL_COLUMN, ORIGIN_COLUMN, SYNTHETIC_COLUMN] {
            return Err(malformed(1, "header must end with label,origin,synthetic".into()));
        }
        let header_mode = detect_mode(names).ok_or_else(|| malformed(1, "unrecognized feature columns".into()))?;
        if header_mode != manifest.mode {
            return Err(ConfigurationMismatch::MixedModes {
                expected: manifest.mode.to_string(),
                actual: header_mode.to_string(),
            }
            .into());
        }
        if names.len() != manifest.dimension
            || manifest.mode.dimension(manifest.coefficient_count) != manifest.dimension
        {
            return Err(mismatch(format!(
                "header has {} feature columns, manifest declares {}",
                names.len(),
                manifest.dimension
            )));
        }

        let mut dataset = Self {
            names: names.to_vec(),
            mode: manifest.mode,
            feature_version: manifest.feature_version.clone(),
            sample_rate: manifest.sample_rate,
            coefficient_count: manifest.coefficient_count,
            label_names: manifest.labels.clone(),
            rows: Vec::with_capacity(manifest.row_count),
        };
        for (idx, record) in records.enumerate() {
            let line = idx + 2;
            if record.len() != header.len() {
                return Err(malformed(
                    line,
                    format!("expected {} fields, found {}", header.len(), record.len()),
                ));
            }
            let (values, trailer) = record.split_at(names.len());
            let features = values
                .iter()
                .map(|v| v.parse::<f32>().ok().filter(|v| v.is_finite()))
                .collect::<Option<Vec<f32>>>()
                .ok_or_else(|| malformed(line, "feature value is not a finite number".into()))?;
            let label = trailer[0]
                .parse::<u32>()
                .map_err(|err| malformed(line, format!("invalid label: {err}")))?;
            if !dataset.label_names.contains_key(&label) {
                return Err(ConfigurationMismatch::UnknownCategory(label).into());
            }
            let synthetic = match trailer[2].as_str() {
                "0" => false,
                "1" => true,
                other => return Err(malformed(line, format!("invalid synthetic flag {other:?}"))),
            };
            let provenance = Provenance::parse(&trailer[1], synthetic)
                .ok_or_else(|| malformed(line, format!("invalid origin {:?}", trailer[1])))?;
            dataset.rows.push(DatasetRow {
                features,
                label,
                provenance,
            });
        }
        if dataset.rows.len() != manifest.row_count {
            return Err(mismatch(format!(
                "{} rows present, manifest declares {}",
                dataset.rows.len(),
                manifest.row_count
            )));
        }
        Ok(dataset)
    }
}

fn detect_mode(names: &[String]) -> Option<FeatureMode> {
    let blocks = Statistic::ALL.len();
    if !names.is_empty()
        && names.len() % blocks == 0
        && names == feature_names(FeatureMode::Statistics, names.len() / blocks).as_slice()
    {
        return Some(FeatureMode::Statistics);
    }
    if names == feature_names(FeatureMode::MeanOnly, names.len()).as_slice() {
        return Some(FeatureMode::MeanOnly);
    }
    None
}
