//! Audio loading: decode, downmix, resample to the canonical rate, normalize.

mod decode;
mod normalize;
mod prep;
mod resample;

use std::path::Path;

use tracing::debug;

use crate::error::SampleError;

pub(crate) use normalize::{normalize_peak_in_place, peak_abs, sanitize_samples_in_place};
pub(crate) use resample::{resample_band_limited, resample_linear_to_len};

/// Canonical analysis sample rate used when no configuration overrides it.
pub const DEFAULT_SAMPLE_RATE: u32 = 22_050;

/// Decoded mono audio at the canonical rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Reads audio files into mono [`Waveform`]s at a fixed sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioLoader {
    sample_rate: u32,
    peak_normalize: bool,
}

impl AudioLoader {
    pub fn new(sample_rate: u32, peak_normalize: bool) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            peak_normalize,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Load `path` as mono audio at the canonical rate.
    ///
    /// Unreadable or corrupt files yield [`SampleError::Load`]; files that decode to
    /// zero samples or pure silence yield [`SampleError::EmptyAudio`].
    pub fn load(&self, path: &Path) -> Result<Waveform, SampleError> {
        let decoded = decode::decode_audio(path).map_err(|reason| SampleError::load(path, reason))?;
        if decoded.samples.is_empty() {
            return Err(SampleError::EmptyAudio {
                path: path.to_path_buf(),
            });
        }
        let mono = prep::downmix_to_mono(&decoded.samples, decoded.channels);
        let mut samples = resample_band_limited(&mono, decoded.sample_rate, self.sample_rate)
            .map_err(|reason| SampleError::load(path, reason))?;
        let peak = peak_abs(&samples);
        if samples.is_empty() || peak <= 0.0 {
            return Err(SampleError::EmptyAudio {
                path: path.to_path_buf(),
            });
        }
        if self.peak_normalize {
            normalize_peak_in_place(&mut samples);
        }
        debug!(
            "Loaded {} ({} Hz, {} ch) -> {} samples at {} Hz",
            path.display(),
            decoded.sample_rate,
            decoded.channels,
            samples.len(),
            self.sample_rate
        );
        Ok(Waveform::new(samples, self.sample_rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: &[Vec<f32>]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &sample in frame {
                writer.write_sample::<f32>(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    fn sine(freq: f32, sample_rate: u32, seconds: f32, amp: f32) -> Vec<f32> {
        let len = (sample_rate as f32 * seconds).round() as usize;
        (0..len)
            .map(|i| amp * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn resamples_to_canonical_rate_and_keeps_duration() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let tone = sine(440.0, 44_100, 1.0, 0.5);
        let frames: Vec<Vec<f32>> = tone.iter().map(|&s| vec![s]).collect();
        write_wav(&path, 44_100, 1, &frames);

        let loader = AudioLoader::new(DEFAULT_SAMPLE_RATE, false);
        let waveform = loader.load(&path).unwrap();
        assert_eq!(waveform.sample_rate(), DEFAULT_SAMPLE_RATE);
        let expected = tone.len() as f32 * (22_050.0 / 44_100.0);
        assert!((waveform.len() as f32 - expected).abs() <= expected * 0.01);
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let frames: Vec<Vec<f32>> = (0..2_205).map(|_| vec![0.5, 0.25]).collect();
        write_wav(&path, DEFAULT_SAMPLE_RATE, 2, &frames);

        let loader = AudioLoader::new(DEFAULT_SAMPLE_RATE, false);
        let waveform = loader.load(&path).unwrap();
        assert_eq!(waveform.len(), 2_205);
        assert!(waveform.samples().iter().all(|&s| (s - 0.375).abs() < 1e-6));
    }

    #[test]
    fn peak_normalization_scales_to_unit_peak() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("quiet.wav");
        let tone = sine(880.0, DEFAULT_SAMPLE_RATE, 0.2, 0.1);
        let frames: Vec<Vec<f32>> = tone.iter().map(|&s| vec![s]).collect();
        write_wav(&path, DEFAULT_SAMPLE_RATE, 1, &frames);

        let waveform = AudioLoader::new(DEFAULT_SAMPLE_RATE, true).load(&path).unwrap();
        let peak = peak_abs(waveform.samples());
        assert!((peak - 1.0).abs() < 1e-6);
    }

    #[test]
    fn silent_file_is_empty_audio() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("silence.wav");
        let frames: Vec<Vec<f32>> = (0..4_000).map(|_| vec![0.0]).collect();
        write_wav(&path, DEFAULT_SAMPLE_RATE, 1, &frames);

        let err = AudioLoader::new(DEFAULT_SAMPLE_RATE, true).load(&path).unwrap_err();
        assert!(matches!(err, SampleError::EmptyAudio { .. }));
    }

    #[test]
    fn garbage_bytes_are_a_load_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        let err = AudioLoader::new(DEFAULT_SAMPLE_RATE, true).load(&path).unwrap_err();
        assert!(matches!(err, SampleError::Load { .. }));
    }
}
