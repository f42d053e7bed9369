//! Summary statistics over latency samples.
//!
//! All functions return `None` for an empty slice instead of a sentinel.

pub fn mean(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    Some(samples.iter().sum::<f64>() / samples.len() as f64)
}

/// Middle value; the average of the two middle values for even lengths.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let len = sorted.len();
    if len % 2 == 0 {
        Some((sorted[len / 2 - 1] + sorted[len / 2]) / 2.0)
    } else {
        Some(sorted[len / 2])
    }
}

/// Sample standard deviation (N-1 divisor). Zero for a single sample.
pub fn sample_stdev(samples: &[f64]) -> Option<f64> {
    let n = samples.len();
    let mean = mean(samples)?;
    if n == 1 {
        return Some(0.0);
    }
    let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);
    Some(variance.sqrt())
}
