//! Extract the feature vector of one recording with the training-time extractor.

use std::path::PathBuf;

use chirpset::logging::{self, LogOptions};
use chirpset::{Dataset, FeatureExtractor, PipelineConfig};
use serde::Serialize;

#[derive(Serialize)]
struct Report<'a> {
    path: String,
    feature_version: &'a str,
    names: &'a [String],
    values: Vec<f32>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let mut config_path = None;
    let mut dataset_path = None;
    let mut audio = None;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(());
            }
            "--config" => {
                idx += 1;
                config_path = Some(PathBuf::from(args.get(idx).ok_or("--config requires a value")?));
            }
            "--dataset" => {
                idx += 1;
                dataset_path = Some(PathBuf::from(args.get(idx).ok_or("--dataset requires a value")?));
            }
            other if audio.is_none() && !other.starts_with('-') => audio = Some(PathBuf::from(other)),
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    let audio = audio.ok_or_else(|| format!("An audio file is required\n\n{}", help_text()))?;

    let options = LogOptions {
        file: false,
        default_directive: "warn".to_string(),
        ..LogOptions::default()
    };
    if let Err(err) = logging::init(&options) {
        eprintln!("Logging disabled: {err}");
    }

    let config = match config_path {
        Some(path) => PipelineConfig::load(&path).map_err(|err| err.to_string())?,
        None => PipelineConfig::default(),
    };
    let extractor = FeatureExtractor::new(config.features).map_err(|err| err.to_string())?;
    if let Some(path) = dataset_path {
        let dataset = Dataset::load(&path).map_err(|err| err.to_string())?;
        dataset
            .signature()
            .ensure_matches(&extractor.signature())
            .map_err(|err| format!("Extractor does not match {}: {err}", path.display()))?;
    }

    let vector = extractor.extract_file(&audio).map_err(|err| err.to_string())?;
    let report = Report {
        path: audio.display().to_string(),
        feature_version: extractor.version(),
        names: extractor.feature_names(),
        values: vector.into_vec(),
    };
    let json = serde_json::to_string_pretty(&report).map_err(|err| err.to_string())?;
    println!("{json}");
    Ok(())
}

fn help_text() -> String {
    [
        "chirpset-features",
        "",
        "Prints the feature vector of one recording as JSON, using the same extractor",
        "configuration as dataset extraction.",
        "",
        "Usage:",
        "  chirpset-features <audio> [--config <file.toml>] [--dataset <features.csv>]",
        "",
        "Options:",
        "  --config <path>    Pipeline configuration used to build the dataset.",
        "  --dataset <path>   Refuse to run unless the extractor matches this dataset's manifest.",
    ]
    .join("\n")
}
