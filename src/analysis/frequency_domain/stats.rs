use serde::{Deserialize, Serialize};

/// Summary statistic applied to one coefficient's trajectory over time.
///
/// The declaration order is the block order of statistics-mode feature vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Std,
    Max,
    Min,
    Median,
    Skew,
    Kurt,
}

impl Statistic {
    pub const ALL: [Statistic; 7] = [
        Statistic::Mean,
        Statistic::Std,
        Statistic::Max,
        Statistic::Min,
        Statistic::Median,
        Statistic::Skew,
        Statistic::Kurt,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Std => "std",
            Self::Max => "max",
            Self::Min => "min",
            Self::Median => "median",
            Self::Skew => "skew",
            Self::Kurt => "kurt",
        }
    }
}

/// Values of [`Statistic::ALL`] for one coefficient row, in that order.
///
/// Standard deviation is the population value. Skewness is the biased moment
/// ratio and kurtosis is Fisher's excess kurtosis; both are 0 for a constant row.
pub(crate) fn summarize(values: &[f32]) -> [f32; 7] {
    if values.is_empty() {
        return [0.0; 7];
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let (mut m2, mut m3, mut m4) = (0.0_f64, 0.0_f64, 0.0_f64);
    for &v in values {
        let d = v as f64 - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;
    let (skew, kurt) = if m2 <= (mean * mean).max(1.0) * 1e-12 {
        (0.0, 0.0)
    } else {
        (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
    };
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    [
        mean as f32,
        m2.sqrt() as f32,
        max,
        min,
        median(values),
        skew as f32,
        kurt as f32,
    ]
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        ((sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0) as f32
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn summary_of_known_sequence() {
        let s = summarize(&[1.0, 2.0, 3.0, 4.0, 10.0]);
        assert!(close(s[0], 4.0));
        assert!(close(s[1], 10.0_f32.sqrt()));
        assert_eq!(s[2], 10.0);
        assert_eq!(s[3], 1.0);
        assert_eq!(s[4], 3.0);
        // m2 = 10, m3 = 36, m4 = 278.8
        assert!(close(s[5], 36.0 / 10.0_f32.powf(1.5)));
        assert!(close(s[6], 278.8 / 100.0 - 3.0));
    }

    #[test]
    fn median_averages_middle_pair() {
        let s = summarize(&[4.0, 1.0, 3.0, 2.0]);
        assert!(close(s[4], 2.5));
    }

    #[test]
    fn constant_row_has_zero_shape_statistics() {
        let s = summarize(&[-3.5; 12]);
        assert_eq!(s[1], 0.0);
        assert_eq!(s[5], 0.0);
        assert_eq!(s[6], 0.0);
    }

    #[test]
    fn symmetric_row_has_zero_skew() {
        let s = summarize(&[-2.0, -1.0, 0.0, 1.0, 2.0]);
        assert!(close(s[5], 0.0));
        assert!(s[6] < 0.0);
    }
}
