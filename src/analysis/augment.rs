//! Augmentation Engine: randomized perturbations used to synthesize extra rows.
//!
//! Transforms run in a fixed order (noise, pitch shift, time stretch, shift) and
//! each one fires independently with its own probability. Randomness always comes
//! from the caller's RNG so tests can pass a seeded `StdRng`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::audio::{resample_linear_to_len, sanitize_samples_in_place};
use super::time_stretch::Wsola;
use crate::config::ConfigError;

const FALLBACK_GAIN: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentConfig {
    /// Synthetic variants generated per admitted recording.
    pub variants: usize,
    /// Fixed RNG seed; `None` seeds from the operating system.
    pub seed: Option<u64>,
    pub noise: NoiseConfig,
    pub pitch: PitchConfig,
    pub stretch: StretchConfig,
    pub shift: ShiftConfig,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            variants: 4,
            seed: None,
            noise: NoiseConfig::default(),
            pitch: PitchConfig::default(),
            stretch: StretchConfig::default(),
            shift: ShiftConfig::default(),
        }
    }
}

/// Additive Gaussian noise with a uniformly drawn standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub probability: f64,
    pub min_amplitude: f32,
    pub max_amplitude: f32,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            min_amplitude: 0.001,
            max_amplitude: 0.015,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    pub probability: f64,
    pub min_semitones: f32,
    pub max_semitones: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            min_semitones: -2.0,
            max_semitones: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchConfig {
    pub probability: f64,
    pub min_rate: f32,
    pub max_rate: f32,
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            min_rate: 0.8,
            max_rate: 1.2,
        }
    }
}

/// Circular shift by a fraction of the clip length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftConfig {
    pub probability: f64,
    pub min_fraction: f32,
    pub max_fraction: f32,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        Self {
            probability: 0.5,
            min_fraction: -0.5,
            max_fraction: 0.5,
        }
    }
}

impl AugmentConfig {
    /// RNG for one run: seeded when `seed` is set, otherwise from OS entropy.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("noise", self.noise.probability)?;
        check_probability("pitch", self.pitch.probability)?;
        check_probability("stretch", self.stretch.probability)?;
        check_probability("shift", self.shift.probability)?;
        check_range("noise amplitude", self.noise.min_amplitude, self.noise.max_amplitude)?;
        check_range("pitch semitones", self.pitch.min_semitones, self.pitch.max_semitones)?;
        check_range("stretch rate", self.stretch.min_rate, self.stretch.max_rate)?;
        check_range("shift fraction", self.shift.min_fraction, self.shift.max_fraction)?;
        if self.noise.min_amplitude < 0.0 || self.noise.max_amplitude <= 0.0 {
            return Err(ConfigError::invalid(
                "augmentation.noise amplitudes must be non-negative with a positive maximum",
            ));
        }
        if self.stretch.min_rate <= 0.0 {
            return Err(ConfigError::invalid("augmentation.stretch rates must be positive"));
        }
        Ok(())
    }
}

fn check_probability(name: &str, p: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(ConfigError::invalid(format!(
            "augmentation.{name}.probability must be in [0, 1], got {p}"
        )))
    }
}

fn check_range(name: &str, min: f32, max: f32) -> Result<(), ConfigError> {
    if min.is_finite() && max.is_finite() && min <= max {
        Ok(())
    } else {
        Err(ConfigError::invalid(format!(
            "augmentation {name} range is invalid: [{min}, {max}]"
        )))
    }
}

/// Applies a random composition of perturbations to mono samples.
#[derive(Debug, Clone)]
pub struct Augmenter {
    config: AugmentConfig,
    wsola: Wsola,
}

impl Augmenter {
    pub fn new(config: AugmentConfig, sample_rate: u32) -> Self {
        Self {
            config,
            wsola: Wsola::new(sample_rate),
        }
    }

    pub fn config(&self) -> &AugmentConfig {
        &self.config
    }

    pub fn variants(&self) -> usize {
        self.config.variants
    }

    /// Produce one perturbed copy of `samples` with the same length.
    ///
    /// When no transform fires, or every one that fired was inapplicable, noise is
    /// injected anyway; if the result still equals the input it is attenuated. The
    /// output therefore never equals a non-empty input.
    pub fn augment<R: Rng>(&self, samples: &[f32], rng: &mut R) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }
        let mut out = samples.to_vec();
        let mut applied = false;

        if rng.random_bool(self.config.noise.probability) {
            self.add_noise(&mut out, rng);
            applied = true;
        }
        if rng.random_bool(self.config.pitch.probability) {
            let semitones = draw(rng, self.config.pitch.min_semitones, self.config.pitch.max_semitones);
            if let Some(shifted) = self.pitch_shift(&out, semitones) {
                out = shifted;
                applied = true;
            }
        }
        if rng.random_bool(self.config.stretch.probability) {
            let rate = draw(rng, self.config.stretch.min_rate, self.config.stretch.max_rate);
            if let Some(stretched) = self.time_stretch(&out, rate) {
                out = stretched;
                applied = true;
            }
        }
        if rng.random_bool(self.config.shift.probability) {
            let fraction = draw(rng, self.config.shift.min_fraction, self.config.shift.max_fraction);
            applied |= roll(&mut out, fraction);
        }

        if !applied {
            self.add_noise(&mut out, rng);
        }
        sanitize_samples_in_place(&mut out);
        if out == samples {
            for sample in &mut out {
                *sample *= FALLBACK_GAIN;
            }
        }
        out
    }

    fn add_noise<R: Rng>(&self, samples: &mut [f32], rng: &mut R) {
        let amplitude = draw(rng, self.config.noise.min_amplitude, self.config.noise.max_amplitude);
        for sample in samples.iter_mut() {
            *sample += gaussian(rng) * amplitude;
        }
    }

    fn pitch_shift(&self, samples: &[f32], semitones: f32) -> Option<Vec<f32>> {
        let rate = 2.0_f64.powf(-(semitones as f64) / 12.0);
        let stretched = self.wsola.stretch(samples, rate)?;
        Some(resample_linear_to_len(&stretched, samples.len()))
    }

    fn time_stretch(&self, samples: &[f32], rate: f32) -> Option<Vec<f32>> {
        let mut stretched = self.wsola.stretch(samples, rate as f64)?;
        stretched.resize(samples.len(), 0.0);
        Some(stretched)
    }
}

fn draw<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    if max > min { rng.random_range(min..=max) } else { min }
}

/// Standard normal sample via Box-Muller.
fn gaussian<R: Rng>(rng: &mut R) -> f32 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random();
    ((-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()) as f32
}

/// Rotate right by `fraction * len` samples. Returns whether anything moved.
fn roll(samples: &mut [f32], fraction: f32) -> bool {
    let len = samples.len();
    if len < 2 {
        return false;
    }
    let shift = (fraction as f64 * len as f64).round() as i64;
    let shift = shift.rem_euclid(len as i64) as usize;
    if shift == 0 {
        return false;
    }
    samples.rotate_right(shift);
    true
}
