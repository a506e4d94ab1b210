//! Signal analysis for integration tests

/// Fractional sample indices of positive-going zero crossings
///
/// Crossing positions are linearly interpolated between the two samples that straddle zero.
pub fn positive_crossings(samples: &[f32]) -> Vec<f64> {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| w[0] < 0.0 && w[1] >= 0.0)
        .map(|(i, w)| {
            let a = w[0] as f64;
            let b = w[1] as f64;
            i as f64 + (-a / (b - a))
        })
        .collect()
}

/// Dominant frequency from the spacing of positive-going zero crossings
///
/// Returns 0.0 when fewer than two crossings exist.
pub fn estimate_frequency(samples: &[f32], sample_rate: u32) -> f64 {
    let crossings = positive_crossings(samples);
    if crossings.len() < 2 {
        return 0.0;
    }
    let first = crossings[0];
    let last = crossings[crossings.len() - 1];
    (crossings.len() - 1) as f64 * sample_rate as f64 / (last - first)
}

/// Largest absolute sample value
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

/// Every sample finite and within [-1, 1]
pub fn all_in_range(samples: &[f32]) -> bool {
    samples
        .iter()
        .all(|s| s.is_finite() && (-1.0..=1.0).contains(s))
}

/// Indices where consecutive samples jump by more than `max_step`
pub fn detect_clicks(samples: &[f32], max_step: f32) -> Vec<usize> {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, w)| (w[1] - w[0]).abs() > max_step)
        .map(|(i, _)| i + 1)
        .collect()
}
