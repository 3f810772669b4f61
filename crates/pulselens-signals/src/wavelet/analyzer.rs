//! Wavelet-domain signal quality and pulse peak analysis.
//!
//! Runs a 5-level Daubechies-4 decomposition over the most recent smoothed
//! window and derives:
//! - subband energies and their Shannon entropy
//! - MAD-thresholded peaks per detail subband, merged and validated for
//!   physiological spacing, shape and local magnitude stability
//! - a robust noise estimate `MAD(finest detail) / 0.6745`
//! - a composite quality `0.4 * energy + 0.3 * entropy + 0.3 * peaks`
//!
//! Any failure inside the analysis is contained here: [`WaveletAnalyzer::analyze`]
//! reports it as [`Insufficiency::Failed`] and callers fall back to
//! [`WaveletAnalysis::empty`].

use ndarray::Array1;
use num_complex::Complex32;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use super::dwt::{self, WaveletDecomposition};
use crate::buffer::RingSampleBuffer;
use crate::error::{Result, SignalError};
use crate::outcome::{Empty, Insufficiency, Outcome};
use crate::stats;

/// Configuration for wavelet analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveletConfig {
    /// Decomposition levels
    pub levels: usize,
    /// Analysis window (power of two)
    pub window_size: usize,
    /// Fewest samples worth analysing
    pub min_window: usize,
    /// Sample rate of the smoothed waveform (Hz)
    pub sample_rate: f32,
    /// Slowest plausible heart rate
    pub min_bpm: f32,
    /// Fastest plausible heart rate
    pub max_bpm: f32,
    /// Peak threshold as a multiple of the subband MAD
    pub mad_multiplier: f32,
    /// Same-level peaks closer than this (coefficients) are merged
    pub merge_distance: usize,
    /// Widest acceptable peak as a fraction of its subband length
    pub max_width_ratio: f32,
    /// Same-level neighbours on each side used for the stability check
    pub stability_neighbors: usize,
    /// Largest acceptable coefficient of variation of nearby peak magnitudes
    pub max_magnitude_cv: f32,
    /// MAD to Gaussian sigma conversion
    pub mad_to_sigma: f32,
    /// Validated peaks needed for full peak quality
    pub target_peak_count: usize,
    pub energy_weight: f32,
    pub entropy_weight: f32,
    pub peak_weight: f32,
}

impl Default for WaveletConfig {
    fn default() -> Self {
        Self {
            levels: 5,
            window_size: 256,
            min_window: 64,
            sample_rate: 30.0,
            min_bpm: 45.0,
            max_bpm: 180.0,
            mad_multiplier: 2.5,
            merge_distance: 3,
            max_width_ratio: 0.5,
            stability_neighbors: 2,
            max_magnitude_cv: 0.5,
            mad_to_sigma: 0.6745,
            target_peak_count: 4,
            energy_weight: 0.4,
            entropy_weight: 0.3,
            peak_weight: 0.3,
        }
    }
}

/// Local maximum in one detail subband
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveletPeak {
    /// Coefficient index within its subband
    pub position: usize,
    pub magnitude: f32,
    /// Coefficients above half the peak magnitude, including the peak
    pub width: usize,
    /// Detail level (0 = finest)
    pub level: usize,
}

impl WaveletPeak {
    /// Approximate position in the analysed sample window.
    pub fn sample_position(&self) -> usize {
        self.position << (self.level + 1)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalCharacteristics {
    /// Total energy across subbands
    pub energy: f32,
    /// Subband entropy (bits)
    pub entropy: f32,
    /// Strongest spectral component inside the heart-rate band (Hz)
    pub dominant_frequency: f32,
    /// Window energy over estimated noise energy (dB)
    pub signal_to_noise: f32,
}

/// Result of one analysis cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaveletAnalysis {
    /// Composite quality in [0, 1]
    pub quality: f32,
    /// Validated peaks, strongest first
    pub peaks: Vec<WaveletPeak>,
    /// Robust noise sigma of the finest subband
    pub noise: f32,
    /// Beat frequency from validated peak spacing (Hz)
    pub frequency: f32,
    pub characteristics: SignalCharacteristics,
    /// Per-subband energies, details finest first then approximation
    pub energies: Vec<f32>,
    pub energy_quality: f32,
    pub entropy_quality: f32,
    pub peak_quality: f32,
}

impl WaveletAnalysis {
    /// Quality 0, no peaks, noise 0, frequency 0.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Empty for WaveletAnalysis {
    fn empty() -> Self {
        WaveletAnalysis::empty()
    }
}

/// Multi-resolution quality and peak analyzer
pub struct WaveletAnalyzer {
    config: WaveletConfig,
    window: RingSampleBuffer<f32>,
    last_analysis: Option<WaveletAnalysis>,
    fft_planner: FftPlanner<f32>,
}

impl std::fmt::Debug for WaveletAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaveletAnalyzer")
            .field("config", &self.config)
            .field("window_len", &self.window.len())
            .finish_non_exhaustive()
    }
}

impl WaveletAnalyzer {
    pub fn new() -> Self {
        Self::with_config(WaveletConfig::default())
    }

    pub fn with_config(config: WaveletConfig) -> Self {
        let window = RingSampleBuffer::with_min_capacity(config.window_size);
        Self {
            config,
            window,
            last_analysis: None,
            fft_planner: FftPlanner::new(),
        }
    }

    pub fn config(&self) -> &WaveletConfig {
        &self.config
    }

    pub fn last_analysis(&self) -> Option<&WaveletAnalysis> {
        self.last_analysis.as_ref()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn reset(&mut self) {
        self.window.clear();
        self.last_analysis = None;
    }

    /// Replace the window with the tail of `signal` and analyse it.
    pub fn analyze(&mut self, signal: &[f32]) -> Outcome<WaveletAnalysis> {
        self.load_window(signal);
        self.analyze_current()
    }

    /// Analyse the current window, containing any failure.
    pub fn analyze_current(&mut self) -> Outcome<WaveletAnalysis> {
        match self.try_analyze_current() {
            Ok(analysis) => Outcome::Ready(analysis),
            Err(SignalError::InsufficientSamples { got: 0, .. }) => {
                Outcome::Insufficient(Insufficiency::EmptyWindow)
            }
            Err(SignalError::InsufficientSamples { needed, got }) => {
                Outcome::Insufficient(Insufficiency::TooFewSamples { needed, got })
            }
            Err(e) => {
                log::warn!("wavelet analysis failed: {}", e);
                Outcome::Insufficient(Insufficiency::Failed(e.to_string()))
            }
        }
    }

    /// Replace the window with the tail of `signal` and analyse it, propagating errors.
    pub fn try_analyze(&mut self, signal: &[f32]) -> Result<WaveletAnalysis> {
        self.load_window(signal);
        self.try_analyze_current()
    }

    fn load_window(&mut self, signal: &[f32]) {
        self.window.clear();
        let skip = signal.len().saturating_sub(self.window.capacity());
        for &x in &signal[skip..] {
            self.window.push(x);
        }
    }

    fn try_analyze_current(&mut self) -> Result<WaveletAnalysis> {
        let len = self.window.len();
        let needed = self.config.min_window.max(1 << self.config.levels);
        if len < needed {
            return Err(SignalError::InsufficientSamples { needed, got: len });
        }

        // Largest power-of-two tail keeps every level dyadic.
        let n = 1usize << (usize::BITS - 1 - len.leading_zeros());
        let tail = self.window.last_n(n);
        let mean = stats::mean(&tail);
        let signal: Array1<f32> = tail.iter().map(|x| x - mean).collect();

        let decomposition = dwt::decompose(&signal, self.config.levels)?;
        // Finite coefficients can still square past f32::MAX.
        let energies = decomposition.subband_energies();
        if !energies.iter().sum::<f32>().is_finite() {
            return Err(SignalError::NonFiniteInput("wavelet subband energy"));
        }
        let analysis = self.analyze_decomposition(&signal, &decomposition, energies);

        log::debug!(
            "wavelet: n={} quality={:.3} peaks={} noise={:.3} freq={:.2}Hz",
            n,
            analysis.quality,
            analysis.peaks.len(),
            analysis.noise,
            analysis.frequency
        );

        self.last_analysis = Some(analysis.clone());
        Ok(analysis)
    }

    fn analyze_decomposition(
        &mut self,
        signal: &Array1<f32>,
        decomposition: &WaveletDecomposition,
        energies: Vec<f32>,
    ) -> WaveletAnalysis {
        let entropy = dwt::shannon_entropy(&energies);
        let total_energy: f32 = energies.iter().sum();

        let candidates = self.find_wavelet_peaks(decomposition);
        let mut peaks = self.validate_peaks(candidates, decomposition);
        peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));

        let noise = self.estimate_noise(decomposition);
        let frequency = self.frequency_from_peaks(&peaks);

        let energy_quality = self.energy_quality(&energies);
        let entropy_quality = self.entropy_quality(entropy, decomposition.band_count());
        let peak_quality = self.peak_quality(&peaks, decomposition);
        let quality = (self.config.energy_weight * energy_quality
            + self.config.entropy_weight * entropy_quality
            + self.config.peak_weight * peak_quality)
            .clamp(0.0, 1.0);

        let noise_energy = noise * noise * signal.len() as f32;
        let signal_to_noise = if total_energy > 0.0 && noise_energy > 0.0 {
            10.0 * (total_energy / noise_energy).log10()
        } else {
            0.0
        };

        let characteristics = SignalCharacteristics {
            energy: total_energy,
            entropy,
            dominant_frequency: self.dominant_frequency(signal),
            signal_to_noise,
        };

        WaveletAnalysis {
            quality,
            peaks,
            noise,
            frequency,
            characteristics,
            energies,
            energy_quality,
            entropy_quality,
            peak_quality,
        }
    }

    /// MAD-thresholded local maxima in every detail subband, merged.
    fn find_wavelet_peaks(&self, decomposition: &WaveletDecomposition) -> Vec<WaveletPeak> {
        let mut peaks = Vec::new();

        for (level, band) in decomposition.details.iter().enumerate() {
            let values = band.to_vec();
            if values.len() < 3 {
                continue;
            }
            let threshold = self.config.mad_multiplier * stats::median_absolute_deviation(&values);

            for i in 1..values.len() - 1 {
                if values[i] > threshold && values[i] > values[i - 1] && values[i] > values[i + 1] {
                    peaks.push(WaveletPeak {
                        position: i,
                        magnitude: values[i],
                        width: estimate_peak_width(&values, i),
                        level,
                    });
                }
            }
        }

        merge_similar_peaks(peaks, self.config.merge_distance)
    }

    /// Keep peaks that are physiologically spaced, well shaped and locally stable.
    fn validate_peaks(
        &self,
        candidates: Vec<WaveletPeak>,
        decomposition: &WaveletDecomposition,
    ) -> Vec<WaveletPeak> {
        let mut validated = Vec::new();

        for (level, band) in decomposition.details.iter().enumerate() {
            let mut same_level: Vec<WaveletPeak> =
                candidates.iter().copied().filter(|p| p.level == level).collect();
            same_level.sort_by_key(|p| p.position);

            for (j, peak) in same_level.iter().enumerate() {
                if self.is_physiological(&same_level, j)
                    && self.has_good_shape(peak, band.len())
                    && self.is_stable(&same_level, j)
                {
                    validated.push(*peak);
                }
            }
        }

        validated
    }

    /// Spacing to a same-level neighbour maps into the plausible heart-rate range.
    fn is_physiological(&self, same_level: &[WaveletPeak], j: usize) -> bool {
        let peak = same_level[j];
        let plausible = |other: &WaveletPeak| {
            let coeffs = peak.position.abs_diff(other.position);
            let samples = (coeffs << (peak.level + 1)) as f32;
            if samples <= 0.0 {
                return false;
            }
            let bpm = 60.0 * self.config.sample_rate / samples;
            bpm >= self.config.min_bpm && bpm <= self.config.max_bpm
        };

        let prev = j.checked_sub(1).map(|i| &same_level[i]);
        let next = same_level.get(j + 1);
        prev.is_some_and(plausible) || next.is_some_and(plausible)
    }

    fn has_good_shape(&self, peak: &WaveletPeak, band_len: usize) -> bool {
        peak.magnitude.is_finite()
            && peak.width >= 1
            && (peak.width as f32) <= self.config.max_width_ratio * band_len as f32
    }

    /// Magnitudes of neighbouring same-level peaks do not vary wildly.
    fn is_stable(&self, same_level: &[WaveletPeak], j: usize) -> bool {
        let k = self.config.stability_neighbors;
        let lo = j.saturating_sub(k);
        let hi = (j + k + 1).min(same_level.len());
        let magnitudes: Vec<f32> = same_level[lo..hi].iter().map(|p| p.magnitude).collect();
        if magnitudes.len() < 2 {
            return true;
        }
        stats::coefficient_of_variation(&magnitudes) <= self.config.max_magnitude_cv
    }

    fn estimate_noise(&self, decomposition: &WaveletDecomposition) -> f32 {
        match decomposition.details.first() {
            Some(finest) => {
                stats::median_absolute_deviation(&finest.to_vec()) / self.config.mad_to_sigma
            }
            None => 0.0,
        }
    }

    /// Beat frequency from the level carrying the most validated peaks.
    fn frequency_from_peaks(&self, peaks: &[WaveletPeak]) -> f32 {
        let mut best: Option<(usize, usize, f32)> = None;
        for level in 0..self.config.levels {
            let at_level: Vec<&WaveletPeak> = peaks.iter().filter(|p| p.level == level).collect();
            let count = at_level.len();
            let strength: f32 = at_level.iter().map(|p| p.magnitude).sum();
            let better = match best {
                None => count >= 2,
                Some((_, c, s)) => count > c || (count == c && strength > s),
            };
            if better && count >= 2 {
                best = Some((level, count, strength));
            }
        }

        let Some((level, _, _)) = best else {
            return 0.0;
        };
        let mut positions: Vec<usize> = peaks
            .iter()
            .filter(|p| p.level == level)
            .map(|p| p.sample_position())
            .collect();
        positions.sort_unstable();

        let total: usize = positions.windows(2).map(|w| w[1] - w[0]).sum();
        let spacing = total as f32 / (positions.len() - 1) as f32;
        if spacing <= 0.0 {
            return 0.0;
        }
        self.config.sample_rate / spacing
    }

    /// Share of energy in detail subbands overlapping the heart-rate band.
    fn energy_quality(&self, energies: &[f32]) -> f32 {
        let total: f32 = energies.iter().sum();
        if total <= 0.0 {
            return 0.0;
        }
        let lo_hz = self.config.min_bpm / 60.0;
        let hi_hz = self.config.max_bpm / 60.0;
        let fs = self.config.sample_rate;

        let pulse: f32 = energies
            .iter()
            .take(self.config.levels)
            .enumerate()
            .filter(|(level, _)| {
                let band_lo = fs / (1u32 << (level + 2)) as f32;
                let band_hi = fs / (1u32 << (level + 1)) as f32;
                band_hi > lo_hz && band_lo < hi_hz
            })
            .map(|(_, e)| e)
            .sum();

        (pulse / total).clamp(0.0, 1.0)
    }

    /// Low entropy (energy concentrated in few subbands) scores high.
    fn entropy_quality(&self, entropy: f32, band_count: usize) -> f32 {
        if band_count < 2 {
            return 0.0;
        }
        let max_entropy = (band_count as f32).log2();
        (1.0 - entropy / max_entropy).clamp(0.0, 1.0)
    }

    /// Enough validated peaks, each strong relative to its subband.
    fn peak_quality(&self, peaks: &[WaveletPeak], decomposition: &WaveletDecomposition) -> f32 {
        if peaks.is_empty() || self.config.target_peak_count == 0 {
            return 0.0;
        }
        let count_score = (peaks.len() as f32 / self.config.target_peak_count as f32).min(1.0);

        let strength = peaks
            .iter()
            .map(|p| {
                let band_max = decomposition.details[p.level]
                    .iter()
                    .fold(0.0f32, |m, c| m.max(c.abs()));
                if band_max > 0.0 {
                    (p.magnitude / band_max).min(1.0)
                } else {
                    0.0
                }
            })
            .sum::<f32>()
            / peaks.len() as f32;

        (count_score * (0.5 + 0.5 * strength)).clamp(0.0, 1.0)
    }

    /// Strongest Hamming-windowed FFT bin inside the heart-rate band.
    fn dominant_frequency(&mut self, signal: &Array1<f32>) -> f32 {
        let n = signal.len();
        if n < 2 {
            return 0.0;
        }
        let fs = self.config.sample_rate;

        let mut buffer: Vec<Complex32> = signal
            .iter()
            .enumerate()
            .map(|(i, &s)| {
                let window = 0.54 - 0.46 * (2.0 * PI * i as f32 / (n - 1) as f32).cos();
                Complex32::new(s * window, 0.0)
            })
            .collect();

        let fft = self.fft_planner.plan_fft_forward(n);
        fft.process(&mut buffer);

        let half_n = n / 2;
        let bin_res = fs / n as f32;
        let min_bin = ((self.config.min_bpm / 60.0) / bin_res).ceil() as usize;
        let max_bin = (((self.config.max_bpm / 60.0) / bin_res) as usize).min(half_n);

        let mut peak_bin = 0;
        let mut peak_power = 0.0f32;
        for (i, c) in buffer.iter().enumerate().take(max_bin + 1).skip(min_bin.max(1)) {
            let power = c.norm_sqr();
            if power > peak_power {
                peak_power = power;
                peak_bin = i;
            }
        }

        if peak_power > 0.0 {
            peak_bin as f32 * bin_res
        } else {
            0.0
        }
    }
}

impl Default for WaveletAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count of coefficients above half the peak value, expanding both ways.
pub(crate) fn estimate_peak_width(band: &[f32], index: usize) -> usize {
    let half = band[index] * 0.5;
    let mut width = 1;

    let mut left = index;
    while left > 0 && band[left - 1] > half {
        width += 1;
        left -= 1;
    }
    let mut right = index + 1;
    while right < band.len() && band[right] > half {
        width += 1;
        right += 1;
    }

    width
}

/// Keep the strongest of same-level peaks within `max_distance` coefficients.
pub(crate) fn merge_similar_peaks(
    mut peaks: Vec<WaveletPeak>,
    max_distance: usize,
) -> Vec<WaveletPeak> {
    peaks.sort_by(|a, b| b.magnitude.total_cmp(&a.magnitude));

    let mut merged: Vec<WaveletPeak> = Vec::with_capacity(peaks.len());
    for peak in peaks {
        let similar = merged
            .iter()
            .any(|p| p.level == peak.level && p.position.abs_diff(peak.position) <= max_distance);
        if !similar {
            merged.push(peak);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Deterministic Gaussian noise (LCG + Box-Muller).
    fn gaussian_noise(n: usize, sigma: f32, seed: u64) -> Vec<f32> {
        let mut state = seed;
        let mut uniform = move || {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) as f32 + 1.0) / (1u64 << 31) as f32
        };
        (0..n)
            .map(|_| {
                let (u1, u2) = (uniform().min(1.0), uniform());
                sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
            })
            .collect()
    }

    fn pulse(n: usize, hz: f32) -> Vec<f32> {
        (0..n)
            .map(|i| 200.0 + 4.0 * (2.0 * PI * hz * i as f32 / 30.0).sin())
            .collect()
    }

    fn peak(position: usize, magnitude: f32, level: usize) -> WaveletPeak {
        WaveletPeak {
            position,
            magnitude,
            width: 1,
            level,
        }
    }

    #[test]
    fn test_empty_window_gives_empty_analysis() {
        let mut analyzer = WaveletAnalyzer::new();
        let outcome = analyzer.analyze(&[]);
        assert_eq!(outcome.insufficiency(), Some(&Insufficiency::EmptyWindow));

        let analysis = outcome.or_empty();
        assert_eq!(analysis, WaveletAnalysis::empty());
        assert_eq!(analysis.quality, 0.0);
        assert!(analysis.peaks.is_empty());
        assert_eq!(analysis.noise, 0.0);
        assert_eq!(analysis.frequency, 0.0);
    }

    #[test]
    fn test_short_window_insufficient() {
        let mut analyzer = WaveletAnalyzer::new();
        let outcome = analyzer.analyze(&pulse(40, 1.2));
        assert_eq!(
            outcome.insufficiency(),
            Some(&Insufficiency::TooFewSamples { needed: 64, got: 40 })
        );
        assert!(analyzer.last_analysis().is_none());
    }

    #[test]
    fn test_non_finite_contained() {
        let mut analyzer = WaveletAnalyzer::new();
        let mut signal = pulse(128, 1.2);
        signal[10] = f32::NAN;
        let outcome = analyzer.analyze(&signal);
        assert!(matches!(outcome.insufficiency(), Some(Insufficiency::Failed(_))));
    }

    #[test]
    fn test_overflowing_energy_contained() {
        let mut analyzer = WaveletAnalyzer::new();
        let signal: Vec<f32> = (0..256)
            .map(|i| if i % 2 == 0 { 1e20 } else { -1e20 })
            .collect();

        let outcome = analyzer.analyze(&signal);
        assert!(matches!(outcome.insufficiency(), Some(Insufficiency::Failed(_))));
        let analysis = outcome.or_empty();
        assert_eq!(analysis.quality, 0.0);
        assert_eq!(analysis.energy_quality, 0.0);
    }

    #[test]
    fn test_try_analyze_propagates_errors() {
        let mut analyzer = WaveletAnalyzer::new();
        assert_eq!(
            analyzer.try_analyze(&pulse(40, 1.2)),
            Err(SignalError::InsufficientSamples { needed: 64, got: 40 })
        );

        let mut signal = pulse(128, 1.2);
        signal[3] = f32::INFINITY;
        assert!(matches!(
            analyzer.try_analyze(&signal),
            Err(SignalError::NonFiniteInput(_))
        ));

        let analysis = analyzer.try_analyze(&pulse(256, 1.2)).unwrap();
        assert!((0.0..=1.0).contains(&analysis.quality));
        assert_eq!(analyzer.last_analysis(), Some(&analysis));
    }

    #[test]
    fn test_pulse_scores_above_noise() {
        let mut analyzer = WaveletAnalyzer::new();
        let clean = analyzer.analyze(&pulse(256, 1.2)).ready().unwrap();

        let noise: Vec<f32> = gaussian_noise(256, 4.0, 7).iter().map(|x| 200.0 + x).collect();
        let noisy = analyzer.analyze(&noise).ready().unwrap();

        for q in [clean.quality, noisy.quality, clean.energy_quality, clean.entropy_quality] {
            assert!((0.0..=1.0).contains(&q));
        }
        assert!(
            clean.quality > noisy.quality,
            "clean {} vs noise {}",
            clean.quality,
            noisy.quality
        );
        assert!(clean.energy_quality > 0.8, "energy quality {}", clean.energy_quality);
        assert_eq!(clean.energies.len(), 6);
    }

    #[test]
    fn test_dominant_frequency_of_pulse() {
        let mut analyzer = WaveletAnalyzer::new();
        let analysis = analyzer.analyze(&pulse(256, 1.2)).ready().unwrap();
        // bin resolution 30/256 Hz
        assert_relative_eq!(analysis.characteristics.dominant_frequency, 1.2, epsilon = 0.12);
    }

    #[test]
    fn test_noise_estimate_tracks_sigma() {
        let mut analyzer = WaveletAnalyzer::new();
        let signal = gaussian_noise(256, 2.0, 42);
        let analysis = analyzer.analyze(&signal).ready().unwrap();
        assert!(
            (analysis.noise - 2.0).abs() < 0.7,
            "noise estimate {}",
            analysis.noise
        );
    }

    #[test]
    fn test_window_keeps_most_recent() {
        let mut analyzer = WaveletAnalyzer::new();
        let long: Vec<f32> = (0..400).map(|i| i as f32).collect();
        let _ = analyzer.analyze(&long);
        assert_eq!(analyzer.window_len(), 256);

        analyzer.reset();
        assert_eq!(analyzer.window_len(), 0);
        assert!(analyzer.last_analysis().is_none());
    }

    #[test]
    fn test_peak_width() {
        let band = [0.0, 1.0, 3.0, 4.0, 3.0, 1.0, 0.0];
        assert_eq!(estimate_peak_width(&band, 3), 3);
        assert_eq!(estimate_peak_width(&[0.0, 5.0, 0.0], 1), 1);
    }

    #[test]
    fn test_merge_keeps_strongest_per_level() {
        let merged = merge_similar_peaks(
            vec![peak(10, 1.0, 2), peak(12, 3.0, 2), peak(11, 2.0, 3), peak(20, 0.5, 2)],
            3,
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0], peak(12, 3.0, 2));
        assert!(merged.contains(&peak(11, 2.0, 3)));
        assert!(merged.contains(&peak(20, 0.5, 2)));
        assert!(!merged.contains(&peak(10, 1.0, 2)));
    }

    #[test]
    fn test_frequency_from_peak_spacing() {
        let analyzer = WaveletAnalyzer::new();
        // level 2: 3 coefficients apart = 24 samples = 1.25 Hz at 30 fps
        let peaks = vec![peak(0, 1.0, 2), peak(3, 1.0, 2), peak(6, 1.0, 2), peak(9, 1.0, 2)];
        assert_relative_eq!(analyzer.frequency_from_peaks(&peaks), 1.25);
        assert_eq!(analyzer.frequency_from_peaks(&peaks[..1]), 0.0);
    }

    #[test]
    fn test_physiological_spacing() {
        let analyzer = WaveletAnalyzer::new();
        // level 2, spacing 3 -> 24 samples -> 75 bpm; spacing 1 -> 8 samples -> 225 bpm
        let ok = [peak(0, 1.0, 2), peak(3, 1.0, 2)];
        let fast = [peak(0, 1.0, 2), peak(1, 1.0, 2)];
        assert!(analyzer.is_physiological(&ok, 0));
        assert!(!analyzer.is_physiological(&fast, 0));
        assert!(!analyzer.is_physiological(&ok[..1], 0));
    }

    #[test]
    fn test_stability_rejects_outlier_magnitude() {
        let analyzer = WaveletAnalyzer::new();
        let steady = [peak(0, 1.0, 2), peak(3, 1.1, 2), peak(6, 0.9, 2)];
        let spiky = [peak(0, 0.1, 2), peak(3, 5.0, 2), peak(6, 0.1, 2)];
        assert!(analyzer.is_stable(&steady, 1));
        assert!(!analyzer.is_stable(&spiky, 1));
    }
}
