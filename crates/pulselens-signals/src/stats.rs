//! Descriptive and robust statistics over sample slices.
//!
//! All functions return 0.0 for empty input rather than NaN so that the
//! degraded "no signal" state stays numeric.

/// Arithmetic mean.
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population variance.
pub fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f32>() / values.len() as f32
}

/// Population standard deviation.
pub fn std_dev(values: &[f32]) -> f32 {
    variance(values).sqrt()
}

/// Median (mean of the two middle values for even lengths).
pub fn median(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Median absolute deviation: `median(|x - median(x)|)`.
pub fn median_absolute_deviation(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let m = median(values);
    let deviations: Vec<f32> = values.iter().map(|v| (v - m).abs()).collect();
    median(&deviations)
}

/// Standard deviation divided by the mean; 0 when the mean vanishes.
pub fn coefficient_of_variation(values: &[f32]) -> f32 {
    let m = mean(values);
    if m.abs() < f32::EPSILON {
        return 0.0;
    }
    std_dev(values) / m.abs()
}

/// Mean of the second half minus mean of the first half.
///
/// For odd lengths the middle sample belongs to the second half.
pub fn half_trend(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let split = values.len() / 2;
    mean(&values[split..]) - mean(&values[..split])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(variance(&[]), 0.0);
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median_absolute_deviation(&[]), 0.0);
        assert_eq!(half_trend(&[1.0]), 0.0);
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_relative_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_relative_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_mad_ignores_outlier() {
        // median 3, deviations [2,1,0,1,97] -> median 1
        let values = [1.0, 2.0, 3.0, 4.0, 100.0];
        assert_relative_eq!(median_absolute_deviation(&values), 1.0);
    }

    #[test]
    fn test_variance_population() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(variance(&values), 4.0);
        assert_relative_eq!(std_dev(&values), 2.0);
    }

    #[test]
    fn test_half_trend() {
        // first half [190, 195], second half [192, 198, 193]
        let trend = half_trend(&[190.0, 195.0, 192.0, 198.0, 193.0]);
        assert_relative_eq!(trend, 194.333_33 - 192.5, epsilon = 1e-3);
    }
}
