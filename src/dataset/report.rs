//! End-of-run summary: per-category counts, failures by kind, label distribution.

use std::collections::BTreeMap;

use tracing::info;

use crate::error::{SampleError, SampleErrorKind};

/// Counts for one category folder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub name: String,
    pub label: u32,
    /// The folder was absent or unreadable.
    pub missing: bool,
    /// Canonical files after basename resolution.
    pub candidates: usize,
    /// Lower-priority siblings ignored during basename resolution.
    pub shadowed: usize,
    pub original_rows: usize,
    pub synthetic_rows: usize,
    pub skipped_files: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub categories: Vec<CategoryReport>,
    pub failures: BTreeMap<SampleErrorKind, usize>,
    /// Augmented variants dropped because extraction failed on them.
    pub skipped_variants: usize,
    pub label_distribution: BTreeMap<u32, usize>,
}

impl RunReport {
    pub(crate) fn record_failure(&mut self, error: &SampleError) {
        *self.failures.entry(error.kind()).or_default() += 1;
    }

    pub fn failures_of(&self, kind: SampleErrorKind) -> usize {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_failures(&self) -> usize {
        self.failures.values().sum()
    }

    pub fn total_rows(&self) -> usize {
        self.categories
            .iter()
            .map(|c| c.original_rows + c.synthetic_rows)
            .sum()
    }

    pub fn log_summary(&self) {
        for category in &self.categories {
            if category.missing {
                info!("{} (label {}): folder not found", category.name, category.label);
                continue;
            }
            info!(
                "{} (label {}): {} recordings, {} original + {} augmented rows, {} skipped",
                category.name,
                category.label,
                category.candidates,
                category.original_rows,
                category.synthetic_rows,
                category.skipped_files
            );
        }
        for (kind, count) in &self.failures {
            info!("Skipped {count} file(s): {kind}");
        }
        if self.skipped_variants > 0 {
            info!("Dropped {} augmented variant(s)", self.skipped_variants);
        }
        info!("Total rows: {}", self.total_rows());
        for (label, count) in &self.label_distribution {
            info!("Label {label}: {count} rows");
        }
    }
}
