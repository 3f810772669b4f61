//! Vital-sign estimation from window features.
//!
//! Heart rate follows directly from the detected beat frequency. SpO2 and
//! blood pressure use empirically scaled linear models of signal quality and
//! pulse amplitude; they are heuristic placeholders, not clinical models, and
//! are only produced once quality and sample-count gates are met. A value of 0
//! means "not yet measurable".
//!
//! Rhythm regularity uses inter-beat interval statistics (HRV): a coefficient
//! of variation above the threshold flags the rhythm as irregular.

use serde::{Deserialize, Serialize};

use crate::config::ProcessingSettings;
use crate::dsp::SignalFeatures;
use crate::stats;

/// Estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalsConfig {
    /// Quality SpO2 requires
    pub spo2_quality_gate: f32,
    /// Quality blood pressure requires
    pub bp_quality_gate: f32,
    pub spo2_base: f32,
    pub spo2_quality_gain: f32,
    pub systolic_base: f32,
    pub systolic_amplitude_gain: f32,
    pub diastolic_base: f32,
    pub diastolic_amplitude_gain: f32,
    /// Interval coefficient of variation above which the rhythm is irregular
    pub arrhythmia_cv_threshold: f32,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            spo2_quality_gate: 0.6,
            bp_quality_gate: 0.7,
            spo2_base: 95.0,
            spo2_quality_gain: 4.0,
            systolic_base: 120.0,
            systolic_amplitude_gain: 10.0,
            diastolic_base: 80.0,
            diastolic_amplitude_gain: 5.0,
            arrhythmia_cv_threshold: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArrhythmiaType {
    #[default]
    Normal,
    Irregular,
}

impl ArrhythmiaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrhythmiaType::Normal => "Normal",
            ArrhythmiaType::Irregular => "Irregular",
        }
    }
}

/// Inter-beat interval statistics (milliseconds).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HrvMetrics {
    pub mean_interval_ms: f32,
    /// Standard deviation of intervals
    pub sdnn_ms: f32,
    /// Root mean square of successive differences
    pub rmssd_ms: f32,
    /// `sdnn / mean`
    pub cv: f32,
}

impl HrvMetrics {
    /// Metrics over `intervals_ms`; all zero with fewer than two intervals.
    pub fn from_intervals(intervals_ms: &[f32]) -> Self {
        if intervals_ms.len() < 2 {
            return Self::default();
        }
        let mean_interval_ms = stats::mean(intervals_ms);
        let sdnn_ms = stats::std_dev(intervals_ms);
        let squared_diffs: Vec<f32> = intervals_ms
            .windows(2)
            .map(|w| (w[1] - w[0]).powi(2))
            .collect();
        let rmssd_ms = stats::mean(&squared_diffs).sqrt();

        Self {
            mean_interval_ms,
            sdnn_ms,
            rmssd_ms,
            cv: stats::coefficient_of_variation(intervals_ms),
        }
    }
}

/// Uncalibrated estimates for one window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VitalSigns {
    pub bpm: f32,
    pub spo2: f32,
    pub systolic: f32,
    pub diastolic: f32,
    pub hrv: HrvMetrics,
    pub arrhythmia: ArrhythmiaType,
}

impl VitalSigns {
    pub fn has_arrhythmia(&self) -> bool {
        self.arrhythmia == ArrhythmiaType::Irregular
    }
}

/// What the estimator sees of one analysis window.
#[derive(Debug, Clone, Copy)]
pub struct VitalsInput<'a> {
    pub features: &'a SignalFeatures,
    /// Inter-peak intervals of `features.peaks`
    pub intervals_ms: &'a [f32],
    /// Reconciled signal quality, [0, 1]
    pub quality: f32,
    /// Samples in the analysis window
    pub sample_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct VitalsEstimator {
    config: VitalsConfig,
}

impl VitalsEstimator {
    pub fn new() -> Self {
        Self::with_config(VitalsConfig::default())
    }

    pub fn with_config(config: VitalsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VitalsConfig {
        &self.config
    }

    pub fn estimate(&self, input: &VitalsInput<'_>, settings: &ProcessingSettings) -> VitalSigns {
        let hrv = HrvMetrics::from_intervals(input.intervals_ms);
        let arrhythmia = if hrv.cv > self.config.arrhythmia_cv_threshold {
            ArrhythmiaType::Irregular
        } else {
            ArrhythmiaType::Normal
        };

        let bpm = self.heart_rate(input, settings);

        let enough_readings = input.sample_count >= settings.min_valid_readings;
        let spo2 = if enough_readings && input.quality > self.config.spo2_quality_gate {
            self.spo2_gate(
                self.config.spo2_base + input.quality * self.config.spo2_quality_gain,
                settings,
            )
        } else {
            0.0
        };

        let bp_ready = enough_readings && input.quality > self.config.bp_quality_gate;
        let (systolic, diastolic) = if bp_ready {
            let amplitude = input.features.amplitude;
            (
                self.config.systolic_base + amplitude * self.config.systolic_amplitude_gain,
                self.config.diastolic_base + amplitude * self.config.diastolic_amplitude_gain,
            )
        } else {
            (0.0, 0.0)
        };

        log::trace!(
            "vitals: bpm={:.1} spo2={:.1} bp={:.0}/{:.0} cv={:.3}",
            bpm,
            spo2,
            systolic,
            diastolic,
            hrv.cv
        );

        VitalSigns {
            bpm,
            spo2,
            systolic,
            diastolic,
            hrv,
            arrhythmia,
        }
    }

    /// Beat frequency x 60 once enough frames, peaks and plausible spacing are present.
    fn heart_rate(&self, input: &VitalsInput<'_>, settings: &ProcessingSettings) -> f32 {
        if input.sample_count < settings.min_frames_for_calculation
            || input.features.peaks.len() < settings.min_peaks_for_valid_hr.max(2)
        {
            return 0.0;
        }
        let mean_interval = stats::mean(input.intervals_ms);
        if mean_interval < settings.min_peak_distance_ms
            || mean_interval > settings.max_peak_distance_ms
        {
            log::trace!("mean beat interval {:.0}ms out of range", mean_interval);
            return 0.0;
        }
        input.features.frequency * 60.0
    }

    /// SpO2 below the reportable floor is reported as 0.
    pub fn spo2_gate(&self, spo2: f32, settings: &ProcessingSettings) -> f32 {
        if spo2 < settings.min_spo2 {
            0.0
        } else {
            spo2
        }
    }
}
