use super::normalize::sanitize_sample;

/// Average interleaved channels into one mono channel.
pub(super) fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.iter().copied().map(sanitize_sample).collect();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().copied().map(sanitize_sample).sum::<f32>() / channels as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![1.0_f32, -1.0, 0.5, 0.25];
        let mono = downmix_to_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.0).abs() < 1e-6);
        assert!((mono[1] - 0.375).abs() < 1e-6);
    }

    #[test]
    fn downmix_drops_incomplete_trailing_frame() {
        let interleaved = vec![0.2_f32, 0.4, 0.6, 0.6, 0.6, 1.0, 0.9];
        let mono = downmix_to_mono(&interleaved, 3);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn non_finite_samples_are_zeroed() {
        let mono = downmix_to_mono(&[f32::NAN, 0.5, f32::INFINITY], 1);
        assert_eq!(mono, vec![0.0, 0.5, 0.0]);
    }
}
