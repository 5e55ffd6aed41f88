#![allow(dead_code)]

pub mod wav;

use std::path::Path;

use chirpset::PipelineConfig;

/// Default pipeline pointed at `root/input`, writing `root/features.csv`.
pub fn pipeline_config(root: &Path, variants: usize, seed: u64) -> PipelineConfig {
    let mut config = PipelineConfig {
        input_dir: root.join("input"),
        output: root.join("features.csv"),
        ..PipelineConfig::default()
    };
    config.augmentation.variants = variants;
    config.augmentation.seed = Some(seed);
    config
}
