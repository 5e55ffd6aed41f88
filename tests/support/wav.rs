use std::path::Path;

pub const RATE: u32 = 22_050;

pub fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let len = (sample_rate as f32 * seconds).round() as usize;
    (0..len)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Chirp sweeping `from`..`to` Hz, closer to a bird call than a steady tone.
pub fn chirp(from: f32, to: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
    let len = (sample_rate as f32 * seconds).round() as usize;
    let sweep = (to - from) / seconds;
    (0..len)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            let phase = 2.0 * std::f32::consts::PI * (from * t + 0.5 * sweep * t * t);
            0.4 * phase.sin()
        })
        .collect()
}

pub fn write_test_wav(path: &Path, sample_rate: u32, samples: &[f32]) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create wav parent dirs");
    }
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav writer");
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).expect("write wav sample");
    }
    writer.finalize().expect("finalize wav");
}
