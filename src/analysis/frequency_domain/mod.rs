//! Frequency-domain analysis: centered STFT, mel filterbank, MFCC matrix and the
//! per-coefficient statistics that summarize it over time.

mod mel;
pub(crate) mod stats;
mod stft;

use std::fmt;
use std::sync::Arc;

use rustfft::{Fft, FftPlanner};

use mel::MelBank;

/// MFCC matrix laid out coefficient-major: `rows[k][t]` is coefficient `k` at frame `t`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MfccMatrix {
    pub(crate) rows: Vec<Vec<f32>>,
}

impl MfccMatrix {
    pub(crate) fn coefficient_count(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn frame_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }
}

/// Precomputed STFT plan, window, mel bank and DCT basis for one configuration.
#[derive(Clone)]
pub(crate) struct MfccAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    mel: MelBank,
    dct: Vec<Vec<f32>>,
    fft_size: usize,
    hop_size: usize,
    top_db: f32,
}

impl fmt::Debug for MfccAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MfccAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .field("mel_bands", &self.mel.band_count())
            .field("coefficients", &self.dct.len())
            .field("top_db", &self.top_db)
            .finish()
    }
}

impl MfccAnalyzer {
    pub(crate) fn new(
        sample_rate: u32,
        fft_size: usize,
        hop_size: usize,
        mel_bands: usize,
        coefficients: usize,
        top_db: f32,
    ) -> Self {
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        Self {
            fft,
            window: stft::periodic_hann(fft_size),
            mel: MelBank::new(sample_rate, fft_size, mel_bands),
            dct: mel::dct_ortho_basis(coefficients, mel_bands),
            fft_size,
            hop_size: hop_size.max(1),
            top_db,
        }
    }

    /// Compute the MFCC matrix of `samples`. Empty input yields an empty matrix.
    pub(crate) fn mfcc(&self, samples: &[f32]) -> MfccMatrix {
        if samples.is_empty() {
            return MfccMatrix {
                rows: vec![Vec::new(); self.dct.len()],
            };
        }
        let power_frames = stft::power_frames(
            samples,
            self.fft.as_ref(),
            &self.window,
            self.fft_size,
            self.hop_size,
        );
        let mut mel_db: Vec<Vec<f32>> = power_frames
            .iter()
            .map(|power| self.mel.apply(power))
            .map(|energies| energies.into_iter().map(power_to_db).collect())
            .collect();
        clip_to_top_db(&mut mel_db, self.top_db);

        let mut rows = vec![Vec::with_capacity(mel_db.len()); self.dct.len()];
        for frame in &mel_db {
            for (row, basis) in rows.iter_mut().zip(&self.dct) {
                let value: f64 = basis
                    .iter()
                    .zip(frame)
                    .map(|(&b, &v)| b as f64 * v as f64)
                    .sum();
                row.push(value as f32);
            }
        }
        MfccMatrix { rows }
    }
}

const AMIN: f32 = 1e-10;

fn power_to_db(power: f32) -> f32 {
    10.0 * power.max(AMIN).log10()
}

fn clip_to_top_db(frames: &mut [Vec<f32>], top_db: f32) {
    if top_db.is_nan() || top_db <= 0.0 {
        return;
    }
    let max = frames
        .iter()
        .flat_map(|frame| frame.iter().copied())
        .fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return;
    }
    let floor = max - top_db;
    for value in frames.iter_mut().flat_map(|frame| frame.iter_mut()) {
        *value = value.max(floor);
    }
}
