/// Sparse Slaney-style mel filterbank over a one-sided power spectrum.
#[derive(Debug, Clone)]
pub(super) struct MelBank {
    filters: Vec<Vec<(usize, f32)>>,
}

impl MelBank {
    pub(super) fn new(sample_rate: u32, fft_len: usize, mel_bands: usize) -> Self {
        let sr = sample_rate.max(1) as f64;
        let bins = fft_len / 2 + 1;
        let fft_freqs: Vec<f64> = (0..bins).map(|k| k as f64 * sr / fft_len as f64).collect();

        let mel_min = hz_to_mel(0.0);
        let mel_max = hz_to_mel(sr / 2.0);
        let points: Vec<f64> = (0..mel_bands + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (mel_bands + 1) as f64))
            .collect();

        let mut filters = Vec::with_capacity(mel_bands);
        for m in 0..mel_bands {
            let (left, center, right) = (points[m], points[m + 1], points[m + 2]);
            let enorm = 2.0 / (right - left).max(f64::MIN_POSITIVE);
            let mut weights = Vec::new();
            for (bin, &freq) in fft_freqs.iter().enumerate() {
                let lower = (freq - left) / (center - left).max(f64::MIN_POSITIVE);
                let upper = (right - freq) / (right - center).max(f64::MIN_POSITIVE);
                let w = lower.min(upper).max(0.0);
                if w > 0.0 {
                    weights.push((bin, (w * enorm) as f32));
                }
            }
            filters.push(weights);
        }
        Self { filters }
    }

    pub(super) fn band_count(&self) -> usize {
        self.filters.len()
    }

    pub(super) fn apply(&self, power: &[f32]) -> Vec<f32> {
        self.filters
            .iter()
            .map(|filter| {
                let sum: f64 = filter
                    .iter()
                    .map(|&(bin, weight)| {
                        power.get(bin).copied().unwrap_or(0.0).max(0.0) as f64 * weight as f64
                    })
                    .sum();
                sum as f32
            })
            .collect()
    }
}

/// Orthonormal DCT-II basis, `count` rows of length `size`.
pub(super) fn dct_ortho_basis(count: usize, size: usize) -> Vec<Vec<f32>> {
    let n = size.max(1) as f64;
    (0..count)
        .map(|k| {
            let scale = if k == 0 { (1.0 / n).sqrt() } else { (2.0 / n).sqrt() };
            (0..size)
                .map(|m| {
                    let angle = std::f64::consts::PI * k as f64 * (m as f64 + 0.5) / n;
                    (scale * angle.cos()) as f32
                })
                .collect()
        })
        .collect()
}

const F_SP: f64 = 200.0 / 3.0;
const MIN_LOG_HZ: f64 = 1_000.0;
const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;

fn log_step() -> f64 {
    6.4_f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mel_scale_round_trips_across_the_log_knee() {
        for hz in [0.0, 440.0, 999.0, 1_000.0, 4_000.0, 11_025.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 1e-6);
        }
        assert!((hz_to_mel(1_000.0) - 15.0).abs() < 1e-9);
    }

    #[test]
    fn filterbank_has_requested_band_count() {
        let bank = MelBank::new(22_050, 2048, 128);
        assert_eq!(bank.band_count(), 128);
        let energies = bank.apply(&vec![1.0_f32; 1025]);
        assert_eq!(energies.len(), 128);
        assert!(energies.iter().all(|e| e.is_finite() && *e >= 0.0));
    }

    #[test]
    fn dct_basis_rows_are_orthonormal() {
        let basis = dct_ortho_basis(4, 16);
        for a in 0..4 {
            for b in 0..4 {
                let dot: f32 = basis[a].iter().zip(&basis[b]).map(|(x, y)| x * y).sum();
                let expected = if a == b { 1.0 } else { 0.0 };
                assert!((dot - expected).abs() < 1e-5);
            }
        }
    }
}
