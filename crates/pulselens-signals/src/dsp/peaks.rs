//! Statistical peak/valley detection on the smoothed waveform.
//!
//! A sample is a peak when it rises above `mean + k * std` of the window and
//! is strictly greater than both neighbours; valleys mirror this below
//! `mean - k * std`. Beat frequency follows from the mean peak spacing.

use serde::{Deserialize, Serialize};

use crate::stats;

/// Peak detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakDetectorConfig {
    /// Effective sampling rate of the waveform (Hz)
    pub sample_rate: f32,
    /// Threshold factor `k` in `mean ± k * std`
    pub threshold_factor: f32,
}

impl Default for PeakDetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            threshold_factor: 0.5,
        }
    }
}

/// Features extracted from one analysis window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalFeatures {
    /// Peak sample indices, ascending
    pub peaks: Vec<usize>,
    /// Valley sample indices, ascending
    pub valleys: Vec<usize>,
    /// Beat frequency in Hz (0 when fewer than two peaks)
    pub frequency: f32,
    /// `max - min` of the window
    pub amplitude: f32,
    /// `(max - min) / mean`
    pub perfusion_index: f32,
}

#[derive(Debug, Clone)]
pub struct PeakValleyDetector {
    config: PeakDetectorConfig,
}

impl PeakValleyDetector {
    pub fn new() -> Self {
        Self::with_config(PeakDetectorConfig::default())
    }

    pub fn with_config(config: PeakDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeakDetectorConfig {
        &self.config
    }

    fn band(&self, data: &[f32]) -> (f32, f32) {
        let mean = stats::mean(data);
        let spread = self.config.threshold_factor * stats::std_dev(data);
        (mean + spread, mean - spread)
    }

    pub fn find_peaks(&self, data: &[f32]) -> Vec<usize> {
        if data.len() < 3 {
            return Vec::new();
        }
        let (upper, _) = self.band(data);
        (1..data.len() - 1)
            .filter(|&i| data[i] > upper && data[i] > data[i - 1] && data[i] > data[i + 1])
            .collect()
    }

    pub fn find_valleys(&self, data: &[f32]) -> Vec<usize> {
        if data.len() < 3 {
            return Vec::new();
        }
        let (_, lower) = self.band(data);
        (1..data.len() - 1)
            .filter(|&i| data[i] < lower && data[i] < data[i - 1] && data[i] < data[i + 1])
            .collect()
    }

    /// Beat frequency in Hz from peak indices.
    ///
    /// Fewer than two peaks is "no rhythm detected" and yields exactly 0.
    pub fn frequency(&self, peaks: &[usize]) -> f32 {
        if peaks.len() < 2 {
            return 0.0;
        }
        let total: usize = peaks.windows(2).map(|w| w[1] - w[0]).sum();
        let mean_distance = total as f32 / (peaks.len() - 1) as f32;
        if mean_distance <= 0.0 {
            return 0.0;
        }
        self.config.sample_rate / mean_distance
    }

    /// Beats per minute from peak indices.
    pub fn bpm(&self, peaks: &[usize]) -> f32 {
        self.frequency(peaks) * 60.0
    }

    /// Inter-peak intervals in milliseconds.
    pub fn intervals_ms(&self, peaks: &[usize]) -> Vec<f32> {
        let ms_per_sample = 1000.0 / self.config.sample_rate;
        peaks
            .windows(2)
            .map(|w| (w[1] - w[0]) as f32 * ms_per_sample)
            .collect()
    }

    /// Full feature set for one window.
    pub fn features(&self, data: &[f32]) -> SignalFeatures {
        if data.is_empty() {
            return SignalFeatures::default();
        }

        let peaks = self.find_peaks(data);
        let valleys = self.find_valleys(data);
        let frequency = self.frequency(&peaks);

        let (min, max) = data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });
        let amplitude = max - min;
        let mean = stats::mean(data);
        let perfusion_index = if mean.abs() > f32::EPSILON {
            amplitude / mean
        } else {
            0.0
        };

        SignalFeatures {
            peaks,
            valleys,
            frequency,
            amplitude,
            perfusion_index,
        }
    }
}

impl Default for PeakValleyDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    fn pulse(n: usize, hz: f32, fs: f32) -> Vec<f32> {
        (0..n)
            .map(|i| 200.0 + 4.0 * (2.0 * PI * hz * i as f32 / fs).sin())
            .collect()
    }

    #[test]
    fn test_sine_rate_recovered() {
        let detector = PeakValleyDetector::new();
        // 1.25 Hz at 30 fps -> one peak every 24 samples
        let signal = pulse(240, 1.25, 30.0);
        let peaks = detector.find_peaks(&signal);

        assert!(peaks.len() >= 9, "expected ~10 peaks, got {}", peaks.len());
        assert_relative_eq!(detector.bpm(&peaks), 75.0, epsilon = 1.0);
        assert!(!detector.find_valleys(&signal).is_empty());
    }

    #[test]
    fn test_fewer_than_two_peaks_is_zero() {
        let detector = PeakValleyDetector::new();
        assert_eq!(detector.frequency(&[]), 0.0);
        assert_eq!(detector.frequency(&[12]), 0.0);
        assert_eq!(detector.bpm(&[12]), 0.0);
    }

    #[test]
    fn test_flat_signal_has_no_peaks() {
        let detector = PeakValleyDetector::new();
        let features = detector.features(&vec![180.0; 64]);
        assert!(features.peaks.is_empty());
        assert_eq!(features.frequency, 0.0);
        assert_eq!(features.amplitude, 0.0);
    }

    #[test]
    fn test_features_amplitude_and_perfusion() {
        let detector = PeakValleyDetector::new();
        let features = detector.features(&[90.0, 110.0, 100.0]);
        assert_relative_eq!(features.amplitude, 20.0);
        assert_relative_eq!(features.perfusion_index, 0.2);
    }

    #[test]
    fn test_intervals_ms() {
        let detector = PeakValleyDetector::new();
        assert_eq!(detector.intervals_ms(&[0, 30, 45]), vec![1000.0, 500.0]);
    }
}
