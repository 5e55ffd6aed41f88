use rustfft::Fft;
use rustfft::num_complex::Complex;

pub(super) fn periodic_hann(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0_f32; length.max(1)];
    }
    let n = length as f64;
    (0..length)
        .map(|i| (0.5 - 0.5 * (2.0 * std::f64::consts::PI * i as f64 / n).cos()) as f32)
        .collect()
}

/// One-sided power spectra of centered, zero-padded frames.
///
/// The signal is padded by `fft_size / 2` zeros on both sides, which yields
/// `1 + len / hop_size` frames.
pub(super) fn power_frames(
    samples: &[f32],
    fft: &dyn Fft<f32>,
    window: &[f32],
    fft_size: usize,
    hop_size: usize,
) -> Vec<Vec<f32>> {
    let pad = fft_size / 2;
    let frame_count = 1 + samples.len() / hop_size.max(1);
    let bins = fft_size / 2 + 1;
    let mut buffer = vec![Complex::new(0.0_f32, 0.0); fft_size];
    let mut scratch = vec![Complex::new(0.0_f32, 0.0); fft.get_inplace_scratch_len()];
    let mut frames = Vec::with_capacity(frame_count);
    for frame in 0..frame_count {
        let start = frame * hop_size;
        fill_windowed(&mut buffer, samples, start, pad, window);
        fft.process_with_scratch(&mut buffer, &mut scratch);
        frames.push(buffer[..bins].iter().map(|c| c.norm_sqr()).collect());
    }
    frames
}

fn fill_windowed(
    target: &mut [Complex<f32>],
    samples: &[f32],
    padded_start: usize,
    pad: usize,
    window: &[f32],
) {
    for (i, cell) in target.iter_mut().enumerate() {
        let padded_idx = padded_start + i;
        let sample = padded_idx
            .checked_sub(pad)
            .and_then(|idx| samples.get(idx))
            .copied()
            .unwrap_or(0.0);
        *cell = Complex::new(sample * window.get(i).copied().unwrap_or(0.0), 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;

    #[test]
    fn periodic_hann_starts_at_zero_and_peaks_mid_frame() {
        let w = periodic_hann(8);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[1] - w[7]).abs() < 1e-6);
    }

    #[test]
    fn pure_tone_peaks_in_expected_bin() {
        let fft_size = 1024;
        let sr = 16_000.0_f32;
        let bin = 64;
        let freq = bin as f32 * sr / fft_size as f32;
        let samples: Vec<f32> = (0..4_096)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr).sin())
            .collect();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let frames = power_frames(&samples, fft.as_ref(), &periodic_hann(fft_size), fft_size, 256);
        assert_eq!(frames.len(), 1 + 4_096 / 256);
        let mid = &frames[frames.len() / 2];
        let (peak_bin, _) = mid
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |acc, (i, &p)| if p > acc.1 { (i, p) } else { acc });
        assert_eq!(peak_bin, bin);
    }
}
