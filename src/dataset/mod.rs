//! Dataset assembly: discovery, deduplication, row accumulation and persistence.

pub mod assemble;
mod csv;
pub mod discover;
pub mod fingerprint;
pub mod progress;
pub mod report;
pub mod table;

use tracing::info;

use crate::config::PipelineConfig;

pub use assemble::{AssembleError, AssemblyOutput, DatasetAssembler};
pub use fingerprint::{ContentFingerprint, DedupSet};
pub use table::{Dataset, DatasetError, DatasetRow, DatasetSplit, Provenance};

/// Run a full extraction for `config` and persist the dataset to `config.output`.
///
/// The deduplication set lives for this call only. Augmentation randomness is
/// seeded from `augmentation.seed` when set, otherwise from the OS.
pub fn extract_dataset(
    config: &PipelineConfig,
    progress: Option<&mut dyn FnMut(progress::ExtractionProgress<'_>)>,
) -> Result<AssemblyOutput, AssembleError> {
    let assembler = DatasetAssembler::new(config)?;
    let mut dedup = DedupSet::new();
    let mut rng = config.augmentation.rng();
    info!(
        "Extracting {} features ({} dims, version {}) from {}",
        assembler.extractor().mode(),
        assembler.extractor().dimension(),
        assembler.extractor().version(),
        config.input_dir.display()
    );
    let output = assembler.assemble(&config.input_dir, &mut dedup, &mut rng, progress)?;
    output.dataset.save(&config.output)?;
    output.report.log_summary();
    info!(
        "Wrote {} rows to {}",
        output.dataset.len(),
        config.output.display()
    );
    Ok(output)
}
