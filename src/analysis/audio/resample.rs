use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const SINC_LEN: usize = 256;

/// Band-limited (windowed sinc) resampling of mono audio.
///
/// The output has `round(len * output_rate / input_rate)` samples. A single
/// `process` call over the padded signal already returns delay-compensated
/// output, so sample `i` of the input lands near `i * ratio`.
pub(crate) fn resample_band_limited(
    samples: &[f32],
    input_rate: u32,
    output_rate: u32,
) -> Result<Vec<f32>, String> {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    if samples.is_empty() || input_rate == output_rate {
        return Ok(samples.to_vec());
    }
    let ratio = output_rate as f64 / input_rate as f64;
    let expected_len = (samples.len() as f64 * ratio).round().max(1.0) as usize;

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    // Zero tail so the filter lookahead still covers the last input sample.
    let mut padded = Vec::with_capacity(samples.len() + SINC_LEN);
    padded.extend_from_slice(samples);
    padded.resize(samples.len() + SINC_LEN, 0.0);

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, padded.len(), 1)
        .map_err(|err| format!("Resampler setup failed: {err}"))?;
    let waves_in = vec![padded];
    let output = resampler
        .process(&waves_in, None)
        .map_err(|err| format!("Resampling failed: {err}"))?;
    let mut out = output.into_iter().next().unwrap_or_default();
    out.resize(expected_len, 0.0);
    Ok(out)
}

/// Linear-interpolation resize to an exact length, used for cheap re-timing of
/// augmented signals.
pub(crate) fn resample_linear_to_len(samples: &[f32], target_len: usize) -> Vec<f32> {
    if samples.is_empty() || target_len == 0 {
        return vec![0.0; target_len];
    }
    if samples.len() == target_len {
        return samples.to_vec();
    }
    if target_len == 1 {
        return vec![samples[0]];
    }
    let step = (samples.len() - 1) as f64 / (target_len - 1) as f64;
    (0..target_len)
        .map(|i| lerp_sample(samples, i as f64 * step))
        .collect()
}

fn lerp_sample(samples: &[f32], pos: f64) -> f32 {
    let idx0 = pos.floor().max(0.0) as usize;
    let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
    let idx1 = idx0.saturating_add(1).min(samples.len().saturating_sub(1));
    let a = samples.get(idx0).copied().unwrap_or(0.0);
    let b = samples.get(idx1).copied().unwrap_or(a);
    a + (b - a) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(freq: f32, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn band_limited_length_follows_rate_ratio() {
        let input = tone(440.0, 48_000, 48_000);
        let out = resample_band_limited(&input, 48_000, 22_050).unwrap();
        assert_eq!(out.len(), 22_050);
    }

    #[test]
    fn band_limited_preserves_tone_amplitude() {
        let input = tone(440.0, 44_100, 44_100);
        let out = resample_band_limited(&input, 44_100, 22_050).unwrap();
        let mid = &out[2_000..out.len() - 2_000];
        let peak = mid.iter().copied().map(f32::abs).fold(0.0, f32::max);
        assert!((peak - 0.5).abs() < 0.05, "peak {peak}");
    }

    fn peak_index(samples: &[f32]) -> usize {
        samples
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map_or(0, |(idx, _)| idx)
    }

    #[test]
    fn impulse_keeps_its_position_across_rates() {
        for (input_rate, output_rate) in [(44_100, 22_050), (8_000, 22_050), (48_000, 22_050)] {
            let mut input = vec![0.0_f32; 4_000];
            input[1_000] = 1.0;
            let out = resample_band_limited(&input, input_rate, output_rate).unwrap();
            let expected = (1_000.0 * output_rate as f64 / input_rate as f64).round() as usize;
            let peak = peak_index(&out);
            assert!(
                peak.abs_diff(expected) <= 2,
                "{input_rate}->{output_rate}: peak at {peak}, expected {expected}"
            );
        }
    }

    #[test]
    fn single_sample_survives_resampling() {
        let out = resample_band_limited(&[0.3], 44_100, 22_050).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].abs() > 0.01, "sample {}", out[0]);
    }

    #[test]
    fn same_rate_is_passthrough() {
        let input = vec![0.1_f32, 0.2, 0.3];
        assert_eq!(resample_band_limited(&input, 16_000, 16_000).unwrap(), input);
    }

    #[test]
    fn linear_resize_preserves_endpoints() {
        let input = vec![0.0_f32, 1.0];
        let out = resample_linear_to_len(&input, 4);
        assert_eq!(out.len(), 4);
        assert!((out[0] - 0.0).abs() < 1e-6);
        assert!((out[3] - 1.0).abs() < 1e-6);
    }
}
