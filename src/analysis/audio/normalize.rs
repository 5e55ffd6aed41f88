/// Scale `samples` so the absolute peak is 1.0. Silent or non-finite input is left untouched.
pub(crate) fn normalize_peak_in_place(samples: &mut [f32]) {
    let peak = peak_abs(samples);
    if !peak.is_finite() || peak <= 0.0 {
        return;
    }
    let gain = 1.0_f32 / peak;
    for sample in samples.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
}

pub(crate) fn peak_abs(samples: &[f32]) -> f32 {
    samples
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .map(f32::abs)
        .fold(0.0, f32::max)
}

pub(crate) fn sanitize_samples_in_place(samples: &mut [f32]) {
    for sample in samples.iter_mut() {
        *sample = sanitize_sample(*sample);
    }
}

pub(super) fn sanitize_sample(sample: f32) -> f32 {
    if !sample.is_finite() {
        return 0.0;
    }
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped != 0.0 && clamped.abs() < f32::MIN_POSITIVE {
        0.0
    } else {
        clamped
    }
}
