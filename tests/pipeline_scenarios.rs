//! End-to-end extraction runs over temporary category folders.

mod support;

use chirpset::{Dataset, SampleErrorKind, extract_dataset};
use support::pipeline_config;
use support::wav::{RATE, chirp, sine, write_test_wav};
use tempfile::tempdir;

#[test]
fn one_recording_yields_original_plus_variants() {
    let dir = tempdir().unwrap();
    let config = pipeline_config(dir.path(), 4, 11);
    write_test_wav(&config.input_dir.join("sabia/call.wav"), RATE, &sine(440.0, RATE, 2.0));

    let output = extract_dataset(&config, None).unwrap();
    let rows = output.dataset.rows();
    assert_eq!(rows.len(), 5);
    assert!(rows.iter().all(|row| row.label() == 1));
    assert!(rows.iter().all(|row| row.features().len() == 91));
    assert_eq!(rows[0].provenance().origin(), "call.wav");
    assert!(!rows[0].provenance().is_synthetic());
    let origins: Vec<String> = rows[1..].iter().map(|row| row.provenance().origin()).collect();
    assert_eq!(
        origins,
        ["AUG_0_call.wav", "AUG_1_call.wav", "AUG_2_call.wav", "AUG_3_call.wav"]
    );

    let sabia = &output.report.categories[0];
    assert_eq!((sabia.original_rows, sabia.synthetic_rows), (1, 4));
    assert!(output.report.categories[1].missing);
    assert_eq!(output.report.label_distribution.get(&1), Some(&5));
    assert!(config.output.is_file());
}

#[test]
fn same_basename_in_two_formats_keeps_preferred_extension() {
    let dir = tempdir().unwrap();
    let config = pipeline_config(dir.path(), 0, 1);
    let wav = config.input_dir.join("bemtevi/a.wav");
    write_test_wav(&wav, RATE, &chirp(2_000.0, 4_000.0, RATE, 1.0));
    std::fs::copy(&wav, config.input_dir.join("bemtevi/a.mp3")).unwrap();

    let output = extract_dataset(&config, None).unwrap();
    assert_eq!(output.dataset.len(), 1);
    assert_eq!(output.dataset.rows()[0].provenance().origin(), "a.wav");
    assert_eq!(output.dataset.rows()[0].label(), 2);
    assert_eq!(output.report.categories[1].shadowed, 1);
    assert_eq!(output.report.total_failures(), 0);
}

#[test]
fn identical_content_under_another_name_is_counted_once() {
    let dir = tempdir().unwrap();
    let config = pipeline_config(dir.path(), 2, 3);
    let first = config.input_dir.join("sabia/a.wav");
    write_test_wav(&first, RATE, &sine(880.0, RATE, 1.0));
    std::fs::create_dir_all(config.input_dir.join("bemtevi")).unwrap();
    std::fs::copy(&first, config.input_dir.join("bemtevi/copy.wav")).unwrap();

    let output = extract_dataset(&config, None).unwrap();
    assert_eq!(output.dataset.len(), 3);
    assert!(output.dataset.rows().iter().all(|row| row.label() == 1));
    assert_eq!(output.report.failures_of(SampleErrorKind::DuplicateContent), 1);
    assert_eq!(output.report.categories[1].skipped_files, 1);
}

#[test]
fn unreadable_files_are_skipped_and_counted() {
    let dir = tempdir().unwrap();
    let config = pipeline_config(dir.path(), 1, 5);
    let sabia = config.input_dir.join("sabia");
    write_test_wav(&sabia.join("good.wav"), RATE, &sine(660.0, RATE, 1.0));
    std::fs::write(sabia.join("empty.wav"), b"").unwrap();
    std::fs::write(sabia.join("garbage.ogg"), b"definitely not an ogg stream").unwrap();
    write_test_wav(&sabia.join("silent.wav"), RATE, &vec![0.0; RATE as usize]);

    let output = extract_dataset(&config, None).unwrap();
    assert_eq!(output.dataset.len(), 2);
    assert_eq!(output.report.failures_of(SampleErrorKind::Load), 2);
    assert_eq!(output.report.failures_of(SampleErrorKind::EmptyAudio), 1);
    assert_eq!(output.report.categories[0].skipped_files, 3);
}

#[test]
fn seeded_runs_are_reproducible() {
    let dir = tempdir().unwrap();
    let config = pipeline_config(dir.path(), 3, 42);
    write_test_wav(&config.input_dir.join("sabia/a.wav"), RATE, &chirp(1_500.0, 3_000.0, RATE, 1.5));
    write_test_wav(&config.input_dir.join("bemtevi/b.wav"), RATE, &sine(2_500.0, RATE, 1.5));

    let first = extract_dataset(&config, None).unwrap();
    let second = extract_dataset(&config, None).unwrap();
    assert_eq!(first.dataset.rows(), second.dataset.rows());

    let mut reseeded = config.clone();
    reseeded.augmentation.seed = Some(43);
    let third = extract_dataset(&reseeded, None).unwrap();
    assert_eq!(first.dataset.rows()[0], third.dataset.rows()[0]);
    assert_ne!(first.dataset.rows()[1..4], third.dataset.rows()[1..4]);
}

#[test]
fn saved_dataset_loads_back_verbatim() {
    let dir = tempdir().unwrap();
    let config = pipeline_config(dir.path(), 2, 9);
    write_test_wav(&config.input_dir.join("sabia/x, y.wav"), RATE, &sine(1_000.0, RATE, 1.0));
    write_test_wav(&config.input_dir.join("bemtevi/z.wav"), RATE, &chirp(3_000.0, 5_000.0, RATE, 1.0));

    let output = extract_dataset(&config, None).unwrap();
    let loaded = Dataset::load(&config.output).unwrap();
    assert_eq!(loaded.rows(), output.dataset.rows());
    assert_eq!(loaded.feature_names(), output.dataset.feature_names());
    assert_eq!(loaded.signature(), output.dataset.signature());
    assert_eq!(loaded.label_names().get(&2).map(String::as_str), Some("bemtevi"));
    assert_eq!(loaded.feature_matrix().dim(), (6, 91));
}

#[test]
fn missing_input_root_fails_the_run() {
    let dir = tempdir().unwrap();
    let config = pipeline_config(dir.path(), 0, 1);
    let err = extract_dataset(&config, None).unwrap_err();
    assert!(matches!(err, chirpset::AssembleError::MissingInput(_)));
    assert!(!config.output.exists());
}
