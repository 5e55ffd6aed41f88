//! `chirpset`: build the labeled feature dataset from category folders.

use std::path::PathBuf;

use chirpset::corpus::{GithubContents, ensure_corpus};
use chirpset::dataset::discover::ExtensionPriority;
use chirpset::dataset::progress::ExtractionProgress;
use chirpset::logging::{self, LogOptions};
use chirpset::{FeatureMode, PipelineConfig, SampleErrorKind, extract_dataset};

struct Options {
    config: Option<PathBuf>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    variants: Option<usize>,
    seed: Option<u64>,
    mode: Option<FeatureMode>,
    download: bool,
    verbose: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        return Ok(());
    };
    if let Err(err) = logging::init(&LogOptions::verbose(options.verbose)) {
        eprintln!("Logging disabled: {err}");
    }

    let mut config = match &options.config {
        Some(path) => PipelineConfig::load(path).map_err(|err| err.to_string())?,
        None => PipelineConfig::default(),
    };
    if let Some(input) = options.input {
        config.input_dir = input;
    }
    if let Some(output) = options.output {
        config.output = output;
    }
    if let Some(variants) = options.variants {
        config.augmentation.variants = variants;
    }
    if options.seed.is_some() {
        config.augmentation.seed = options.seed;
    }
    if let Some(mode) = options.mode {
        config.features.mode = mode;
    }
    config.validate().map_err(|err| err.to_string())?;

    if options.download
        && let Some(corpus) = &config.corpus
    {
        let priority = ExtensionPriority::new(&config.extension_priority);
        let summary = ensure_corpus(&GithubContents::default(), corpus, &priority, &config.input_dir)
            .map_err(|err| err.to_string())?;
        if !summary.already_present {
            println!(
                "Corpus: {} downloaded, {} already present, {} failed",
                summary.downloaded, summary.existing, summary.failed
            );
        }
    }

    let mut on_progress = |p: ExtractionProgress<'_>| {
        if p.processed == p.total || p.processed % 25 == 0 {
            println!("{}", progress_line(&config, &p));
        }
    };
    let output = extract_dataset(&config, Some(&mut on_progress)).map_err(|err| err.to_string())?;

    println!(
        "Wrote {} rows ({} features each) to {}",
        output.dataset.len(),
        output.dataset.feature_names().len(),
        config.output.display()
    );
    for category in &output.report.categories {
        if category.missing {
            println!("  {} (label {}): folder not found", category.name, category.label);
        } else {
            println!(
                "  {} (label {}): {} original + {} augmented rows",
                category.name, category.label, category.original_rows, category.synthetic_rows
            );
        }
    }
    for kind in [
        SampleErrorKind::Load,
        SampleErrorKind::EmptyAudio,
        SampleErrorKind::DuplicateContent,
        SampleErrorKind::Extraction,
    ] {
        let count = output.report.failures_of(kind);
        if count > 0 {
            println!("  skipped {count} file(s): {kind}");
        }
    }
    println!("Label distribution:");
    for (label, count) in &output.report.label_distribution {
        println!("  {label}: {count}");
    }
    Ok(())
}

fn progress_line(config: &PipelineConfig, p: &ExtractionProgress<'_>) -> String {
    let label = config
        .label_for(p.category)
        .map_or_else(|| "?".to_string(), |label| label.to_string());
    format!(
        "  {} (label {label}): {}/{} ({} skipped)",
        p.category, p.processed, p.total, p.skipped
    )
}

fn parse_args(args: Vec<String>) -> Result<Option<Options>, String> {
    let mut options = Options {
        config: None,
        input: None,
        output: None,
        variants: None,
        seed: None,
        mode: None,
        download: true,
        verbose: false,
    };
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => {
                println!("{}", help_text());
                return Ok(None);
            }
            "--config" => options.config = Some(PathBuf::from(value(&args, &mut idx, "--config")?)),
            "--input" => options.input = Some(PathBuf::from(value(&args, &mut idx, "--input")?)),
            "--output" => options.output = Some(PathBuf::from(value(&args, &mut idx, "--output")?)),
            "--variants" => {
                let raw = value(&args, &mut idx, "--variants")?;
                options.variants =
                    Some(raw.parse().map_err(|_| format!("Invalid --variants value: {raw}"))?);
            }
            "--seed" => {
                let raw = value(&args, &mut idx, "--seed")?;
                options.seed = Some(raw.parse().map_err(|_| format!("Invalid --seed value: {raw}"))?);
            }
            "--mode" => {
                options.mode = Some(match value(&args, &mut idx, "--mode")? {
                    "statistics" => FeatureMode::Statistics,
                    "mean_only" => FeatureMode::MeanOnly,
                    other => return Err(format!("Invalid --mode value: {other}")),
                });
            }
            "--no-download" => options.download = false,
            "-v" | "--verbose" => options.verbose = true,
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn value<'a>(args: &'a [String], idx: &mut usize, flag: &str) -> Result<&'a str, String> {
    *idx += 1;
    args.get(*idx)
        .map(String::as_str)
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn help_text() -> String {
    [
        "chirpset",
        "",
        "Extracts MFCC feature vectors (plus augmented variants) from labeled category folders.",
        "",
        "Usage:",
        "  chirpset [--config <file.toml>] [options]",
        "",
        "Options:",
        "  --config <path>      TOML pipeline configuration (defaults apply when omitted).",
        "  --input <dir>        Root folder with one subfolder per category.",
        "  --output <csv>       Dataset file; a .manifest.json is written next to it.",
        "  --variants <usize>   Augmented variants per recording (default: 4).",
        "  --seed <u64>         Seed augmentation for a reproducible run.",
        "  --mode <mode>        statistics (default) or mean_only.",
        "  --no-download        Never fetch the corpus, even when [corpus] is configured.",
        "  -v, --verbose        Debug logging (RUST_LOG overrides).",
    ]
    .join("\n")
}
