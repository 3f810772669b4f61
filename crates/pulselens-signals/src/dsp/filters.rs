//! Smoothing filters for the extracted intensity stream.
//!
//! The pulse waveform sits on a large DC intensity and is contaminated by
//! sensor noise at frame rate. A short symmetric moving average removes most
//! of the noise without shifting peak positions.

use serde::{Deserialize, Serialize};

/// Moving-average configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Half-width of the averaging window (window = 2 * radius + 1)
    pub radius: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { radius: 5 }
    }
}

/// Symmetric moving-average denoiser
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    radius: usize,
}

impl SmoothingFilter {
    pub fn new() -> Self {
        Self::with_config(&FilterConfig::default())
    }

    pub fn with_config(config: &FilterConfig) -> Self {
        Self { radius: config.radius }
    }

    /// Filter whose radius is scaled by a noise-reduction multiplier.
    pub fn with_noise_reduction(config: &FilterConfig, noise_reduction: f32) -> Self {
        let scaled = (config.radius as f32 * noise_reduction.max(0.0)).round() as usize;
        Self { radius: scaled.max(1) }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Smooth `data`; edges use a shrinking window instead of padding.
    pub fn apply(&self, data: &[f32]) -> Vec<f32> {
        moving_average(data, self.radius)
    }
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Centered moving average with radius `radius`.
///
/// Uses a prefix sum so the cost does not depend on the radius.
pub fn moving_average(data: &[f32], radius: usize) -> Vec<f32> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(n + 1);
    prefix.push(0.0f64);
    for &x in data {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + x as f64);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(n);
            ((prefix[hi] - prefix[lo]) / (hi - lo) as f64) as f32
        })
        .collect()
}

/// Scale the AC component of `signal` around its mean.
pub fn amplify_ac(signal: &[f32], gain: f32) -> Vec<f32> {
    if (gain - 1.0).abs() < f32::EPSILON {
        return signal.to_vec();
    }
    let mean = crate::stats::mean(signal);
    signal.iter().map(|&x| mean + (x - mean) * gain).collect()
}
