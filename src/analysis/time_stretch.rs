//! Pitch-preserving WSOLA time stretch for mono augmentation.

use std::f64::consts::PI;

const MIN_STRETCH_RATE: f64 = 0.5;
const MAX_STRETCH_RATE: f64 = 2.0;
const SILENCE_ENERGY: f32 = 1e-6;
const SIMILARITY_THRESHOLD: f32 = 0.2;

/// WSOLA time-stretcher with a ~25 ms analysis window.
#[derive(Debug, Clone)]
pub(crate) struct Wsola {
    window_size: usize,
    hop: usize,
    search_radius: usize,
    window: Vec<f32>,
}

impl Wsola {
    pub(crate) fn new(sample_rate: u32) -> Self {
        let mut window_size = ((sample_rate.max(1) as f32) * 0.025).round() as usize;
        window_size = window_size.clamp(256, 4096);
        if window_size % 2 != 0 {
            window_size += 1;
        }
        let hop = window_size / 2;
        Self {
            window_size,
            hop,
            search_radius: hop / 2,
            window: hann_window(window_size),
        }
    }

    /// Shortest input the stretcher can work on.
    pub(crate) fn min_input_len(&self) -> usize {
        self.window_size * 2
    }

    /// Stretch `input` so that it plays `rate` times faster; the output has about
    /// `len / rate` samples.
    ///
    /// Returns `None` when the input is shorter than two windows or `rate` is
    /// effectively 1.
    pub(crate) fn stretch(&self, input: &[f32], rate: f64) -> Option<Vec<f32>> {
        if !rate.is_finite() || input.len() < self.min_input_len() {
            return None;
        }
        let rate = rate.clamp(MIN_STRETCH_RATE, MAX_STRETCH_RATE);
        if (rate - 1.0).abs() < 1e-3 {
            return None;
        }
        let output_len = ((input.len() as f64) / rate).round().max(1.0) as usize;
        let mut output = vec![0.0_f32; output_len];

        for i in 0..self.window_size.min(output_len) {
            output[i] = input[i] * self.window[i];
        }

        let mut analysis_pos = self.hop as f64 * rate;
        let mut synthesis_pos = self.hop;
        let max_analysis_start = input.len() - self.window_size;

        while synthesis_pos + self.window_size <= output_len {
            let expected = analysis_pos.round() as isize;
            let expected_clamped = expected.clamp(0, max_analysis_start as isize) as usize;
            let chosen = self
                .best_overlap(input, &output, synthesis_pos, expected, max_analysis_start)
                .unwrap_or(expected_clamped);

            for i in 0..self.window_size {
                output[synthesis_pos + i] += input[chosen + i] * self.window[i];
            }

            analysis_pos += self.hop as f64 * rate;
            synthesis_pos += self.hop;
        }
        Some(output)
    }

    fn best_overlap(
        &self,
        input: &[f32],
        output: &[f32],
        synthesis_pos: usize,
        expected: isize,
        max_analysis_start: usize,
    ) -> Option<usize> {
        let prev_tail = &output[synthesis_pos - self.hop..synthesis_pos];
        let prev_energy = prev_tail.iter().map(|v| v * v).sum::<f32>();
        if prev_energy <= SILENCE_ENERGY {
            return None;
        }
        let search_start = (expected - self.search_radius as isize).max(0) as usize;
        let search_end = (expected + self.search_radius as isize)
            .min(max_analysis_start as isize)
            .max(0) as usize;

        let mut best: Option<(usize, f32)> = None;
        for candidate in search_start..=search_end {
            let next = &input[candidate..candidate + self.hop];
            let sum_xy: f32 = prev_tail.iter().zip(next).map(|(a, b)| a * b).sum();
            let sum_y2: f32 = next.iter().map(|v| v * v).sum();
            if sum_y2 <= SILENCE_ENERGY {
                continue;
            }
            let score = sum_xy / (prev_energy * sum_y2).sqrt();
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }
        best.filter(|&(_, score)| score >= SIMILARITY_THRESHOLD)
            .map(|(pos, _)| pos)
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    if size <= 1 {
        return vec![1.0; size];
    }
    let denom = (size - 1) as f64;
    (0..size)
        .map(|i| {
            let phase = 2.0 * PI * (i as f64) / denom;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 22_050.0).sin() * 0.5)
            .collect()
    }

    #[test]
    fn output_length_follows_rate() {
        let wsola = Wsola::new(22_050);
        let input = tone(22_050);
        for rate in [0.8, 1.2] {
            let output = wsola.stretch(&input, rate).unwrap();
            let expected = (22_050.0 / rate).round() as usize;
            assert_eq!(output.len(), expected);
        }
    }

    #[test]
    fn short_input_is_not_stretched() {
        let wsola = Wsola::new(22_050);
        let input = tone(wsola.min_input_len() - 1);
        assert!(wsola.stretch(&input, 1.2).is_none());
    }

    #[test]
    fn unit_rate_is_not_stretched() {
        let wsola = Wsola::new(22_050);
        assert!(wsola.stretch(&tone(22_050), 1.0).is_none());
    }

    #[test]
    fn silence_stays_silent() {
        let wsola = Wsola::new(44_100);
        let output = wsola.stretch(&vec![0.0_f32; 8_000], 1.5).unwrap();
        assert!(output.iter().all(|s| s.abs() <= 1e-6));
    }
}
