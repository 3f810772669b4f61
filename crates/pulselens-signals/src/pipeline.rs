//! Per-frame PPG processing session.
//!
//! [`PpgProcessor`] owns every stage and all session state (sample history,
//! quality history, reading log, calibration history). Each call to
//! [`PpgProcessor::process_frame`] runs one synchronous cycle:
//!
//! ```text
//! frame -> extract -> buffer -> smooth -> {heuristic, wavelet} quality
//!       -> peaks/features -> vitals -> calibration -> record
//! ```
//!
//! The processor is single-owner and not shared between sessions; run one
//! instance per measurement session.

use serde::{Deserialize, Serialize};

use crate::buffer::{RingSampleBuffer, Sample};
use crate::calibration::{AdaptiveCalibrator, MeasurementType, SignalConditions};
use crate::config::{ConfigError, PipelineConfig, SensitivitySettings, SensitivityUpdate};
use crate::dsp::{
    amplify_ac, ChannelExtractor, Frame, FrameStats, HeuristicQuality, PeakDetectorConfig,
    PeakValleyDetector, SignalFeatures, SignalQualityAnalyzer, SmoothingFilter,
};
use crate::physio::{ArrhythmiaType, HrvMetrics, VitalSigns, VitalsEstimator, VitalsInput};
use crate::stats;
use crate::wavelet::WaveletAnalyzer;

/// One charted waveform point.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalReading {
    pub timestamp_ms: i64,
    pub value: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    LowSignalQuality,
    NoFingerDetected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertPriority {
    High,
    Medium,
}

/// User-facing feedback attached to a record; rendering is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAlert {
    pub kind: AlertKind,
    pub message: String,
    pub suggestion: String,
    pub priority: AlertPriority,
}

impl QualityAlert {
    pub fn low_signal_quality() -> Self {
        Self {
            kind: AlertKind::LowSignalQuality,
            message: "Low signal quality".to_string(),
            suggestion: "Adjust finger position over the camera and flash".to_string(),
            priority: AlertPriority::High,
        }
    }

    pub fn no_finger_detected() -> Self {
        Self {
            kind: AlertKind::NoFingerDetected,
            message: "No finger detected".to_string(),
            suggestion: "Cover the camera lens and flash completely with a fingertip".to_string(),
            priority: AlertPriority::Medium,
        }
    }
}

/// Aggregate per-frame output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedPpgSignal {
    /// Smoothed waveform window, oldest first
    pub signal: Vec<f32>,
    /// Reconciled quality, [0, 1]
    pub signal_quality: f32,
    pub heuristic_quality: f32,
    pub wavelet_quality: f32,
    pub features: SignalFeatures,
    pub bpm: u32,
    /// [0, 100]
    pub spo2: u32,
    pub systolic: u32,
    pub diastolic: u32,
    pub has_arrhythmia: bool,
    pub arrhythmia_type: ArrhythmiaType,
    pub hrv: HrvMetrics,
    /// [0, 1]
    pub confidence: f32,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub finger_detected: bool,
    /// Elapsed share of the measurement duration, [0, 1]
    pub measurement_progress: f32,
    pub measurement_complete: bool,
    /// Estimates before calibration
    pub uncalibrated: VitalSigns,
    pub alert: Option<QualityAlert>,
}

impl ProcessedPpgSignal {
    /// "No signal this frame": every value zero.
    pub fn empty(timestamp: i64) -> Self {
        Self {
            signal: Vec::new(),
            signal_quality: 0.0,
            heuristic_quality: 0.0,
            wavelet_quality: 0.0,
            features: SignalFeatures::default(),
            bpm: 0,
            spo2: 0,
            systolic: 0,
            diastolic: 0,
            has_arrhythmia: false,
            arrhythmia_type: ArrhythmiaType::Normal,
            hrv: HrvMetrics::default(),
            confidence: 0.0,
            timestamp,
            finger_detected: false,
            measurement_progress: 0.0,
            measurement_complete: false,
            uncalibrated: VitalSigns::default(),
            alert: None,
        }
    }
}

fn to_count(value: f32) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round() as u32
    } else {
        0
    }
}

/// Stages rebuilt whenever the sensitivity settings change.
#[derive(Debug, Clone)]
struct TunedStages {
    extractor: ChannelExtractor,
    smoother: SmoothingFilter,
    detector: PeakValleyDetector,
}

impl TunedStages {
    fn build(config: &PipelineConfig, sensitivity: &SensitivitySettings) -> Self {
        let extractor =
            ChannelExtractor::with_config(config.processing.extractor_config(sensitivity));
        let smoother =
            SmoothingFilter::with_noise_reduction(&config.filter, sensitivity.noise_reduction);
        let detector = PeakValleyDetector::with_config(PeakDetectorConfig {
            threshold_factor: sensitivity.peak_threshold_factor(),
            ..config.peaks.clone()
        });
        Self {
            extractor,
            smoother,
            detector,
        }
    }
}

/// One measurement session
#[derive(Debug)]
pub struct PpgProcessor {
    config: PipelineConfig,
    stages: TunedStages,
    quality_analyzer: SignalQualityAnalyzer,
    wavelet: WaveletAnalyzer,
    calibrator: AdaptiveCalibrator,
    estimator: VitalsEstimator,
    raw: RingSampleBuffer<Sample>,
    quality_history: RingSampleBuffer<f32>,
    readings: RingSampleBuffer<VitalReading>,
    /// First frame of the current uninterrupted detection
    finger_since_ms: Option<i64>,
    /// First frame after the detection delay elapsed
    measurement_start_ms: Option<i64>,
}

impl PpgProcessor {
    pub fn new() -> Self {
        Self::build(PipelineConfig::default())
    }

    pub fn with_config(config: PipelineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: PipelineConfig) -> Self {
        let stages = TunedStages::build(&config, &config.sensitivity);
        Self {
            stages,
            quality_analyzer: SignalQualityAnalyzer::with_config(config.quality.clone()),
            wavelet: WaveletAnalyzer::with_config(config.wavelet.clone()),
            calibrator: AdaptiveCalibrator::with_config(config.calibration.clone()),
            estimator: VitalsEstimator::with_config(config.vitals.clone()),
            raw: RingSampleBuffer::with_min_capacity(config.raw_capacity),
            quality_history: RingSampleBuffer::with_min_capacity(config.quality_capacity),
            readings: RingSampleBuffer::with_min_capacity(config.reading_capacity),
            finger_since_ms: None,
            measurement_start_ms: None,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sensitivity(&self) -> &SensitivitySettings {
        &self.config.sensitivity
    }

    pub fn calibrator(&self) -> &AdaptiveCalibrator {
        &self.calibrator
    }

    pub fn calibrator_mut(&mut self) -> &mut AdaptiveCalibrator {
        &mut self.calibrator
    }

    /// Reading log, oldest first.
    pub fn readings(&self) -> Vec<VitalReading> {
        self.readings.to_vec()
    }

    pub fn sample_count(&self) -> usize {
        self.raw.len()
    }

    /// Apply a partial sensitivity change and retune the affected stages.
    pub fn update_sensitivity(&mut self, update: &SensitivityUpdate) -> Result<(), ConfigError> {
        let settings = self.config.sensitivity.apply(update);
        settings.validate()?;
        self.stages = TunedStages::build(&self.config, &settings);
        self.config.sensitivity = settings;
        log::info!("sensitivity updated: {:?}", self.config.sensitivity);
        Ok(())
    }

    /// Start a new session: clears sample, quality and reading history and the
    /// calibration history.
    pub fn reset(&mut self) {
        self.clear_window();
        self.readings.clear();
        self.calibrator.clear();
        self.measurement_start_ms = None;
        log::info!("session reset");
    }

    fn clear_window(&mut self) {
        self.raw.clear();
        self.quality_history.clear();
        self.wavelet.reset();
        self.finger_since_ms = None;
    }

    /// Run one processing cycle for `frame` captured at `timestamp_ms`.
    pub fn process_frame(&mut self, frame: &Frame<'_>, timestamp_ms: i64) -> ProcessedPpgSignal {
        let frame_stats = self.stages.extractor.frame_stats(frame).ready();
        let Some(frame_stats) = frame_stats.filter(|s| s.finger_detected) else {
            self.on_finger_lost();
            let mut record = ProcessedPpgSignal::empty(timestamp_ms);
            record.alert = Some(QualityAlert::no_finger_detected());
            return record;
        };

        let since = *self.finger_since_ms.get_or_insert(timestamp_ms);
        if timestamp_ms - since < self.config.processing.finger_detection_delay_ms {
            log::trace!("finger settling ({}ms)", timestamp_ms - since);
            let mut record = ProcessedPpgSignal::empty(timestamp_ms);
            record.finger_detected = true;
            return record;
        }
        let start = *self.measurement_start_ms.get_or_insert(timestamp_ms);

        let red = frame_stats.mean_red * self.stages.extractor.config().red_intensity;
        self.raw.push(Sample::new(red, timestamp_ms));
        self.analyze(&frame_stats, timestamp_ms, start)
    }

    fn on_finger_lost(&mut self) {
        if self.finger_since_ms.is_some() || !self.raw.is_empty() {
            log::info!("finger lost, clearing {} samples", self.raw.len());
            self.clear_window();
            self.measurement_start_ms = None;
        }
    }

    fn analyze(
        &mut self,
        frame_stats: &FrameStats,
        timestamp_ms: i64,
        start_ms: i64,
    ) -> ProcessedPpgSignal {
        let raw_values = self.raw.values();
        let smoothed = amplify_ac(
            &self.stages.smoother.apply(&raw_values),
            self.config.sensitivity.signal_amplification,
        );

        let heuristic = self.quality_analyzer.assess(&raw_values).ready();
        let heuristic_quality = heuristic.as_ref().map_or(0.0, |h| h.score);
        let wavelet = self.wavelet.analyze(&smoothed).or_empty();
        let signal_quality = self.reconcile_quality(heuristic_quality, wavelet.quality);
        self.quality_history.push(signal_quality);

        let features = self.stages.detector.features(&smoothed);
        let intervals = self.stages.detector.intervals_ms(&features.peaks);
        let uncalibrated = self.estimator.estimate(
            &VitalsInput {
                features: &features,
                intervals_ms: &intervals,
                quality: signal_quality,
                sample_count: raw_values.len(),
            },
            &self.config.processing,
        );

        let conditions = self.conditions(frame_stats, heuristic.as_ref(), signal_quality);
        let (calibrated, confidence) = self.calibrate(&uncalibrated, &conditions, timestamp_ms);

        if let Some(&value) = smoothed.last() {
            self.readings.push(VitalReading {
                timestamp_ms,
                value,
            });
        }

        let duration_ms = self.config.processing.measurement_duration_s * 1000.0;
        let measurement_progress = ((timestamp_ms - start_ms) as f32 / duration_ms).clamp(0.0, 1.0);
        let alert = (signal_quality < self.config.low_quality_threshold)
            .then(QualityAlert::low_signal_quality);

        log::trace!(
            "frame {}: q={:.3} (h={:.3} w={:.3}) bpm={:.1} conf={:.3}",
            timestamp_ms,
            signal_quality,
            heuristic_quality,
            wavelet.quality,
            calibrated.bpm,
            confidence
        );

        ProcessedPpgSignal {
            signal: smoothed,
            signal_quality,
            heuristic_quality,
            wavelet_quality: wavelet.quality,
            features,
            bpm: to_count(calibrated.bpm),
            spo2: to_count(calibrated.spo2).min(100),
            systolic: to_count(calibrated.systolic),
            diastolic: to_count(calibrated.diastolic),
            has_arrhythmia: uncalibrated.has_arrhythmia(),
            arrhythmia_type: uncalibrated.arrhythmia,
            hrv: uncalibrated.hrv,
            confidence,
            timestamp: timestamp_ms,
            finger_detected: true,
            measurement_progress,
            measurement_complete: measurement_progress >= 1.0,
            uncalibrated,
            alert,
        }
    }

    /// Heuristic 0 means no usable contact; otherwise a stability-weighted blend.
    fn reconcile_quality(&self, heuristic: f32, wavelet: f32) -> f32 {
        if heuristic <= 0.0 {
            return 0.0;
        }
        let s = self.config.sensitivity.signal_stability;
        (s * heuristic + (1.0 - s) * wavelet).clamp(0.0, 1.0)
    }

    /// `1 - 2 * std` of the most recent quality scores.
    fn quality_stability(&self) -> f32 {
        let window = (self.config.stability_window as f32 * self.config.sensitivity.response_time)
            .round()
            .max(1.0) as usize;
        let recent = self.quality_history.last_n(window);
        if recent.len() < 2 {
            return 0.5;
        }
        (1.0 - 2.0 * stats::std_dev(&recent)).clamp(0.0, 1.0)
    }

    fn conditions(
        &self,
        frame_stats: &FrameStats,
        heuristic: Option<&HeuristicQuality>,
        signal_quality: f32,
    ) -> SignalConditions {
        let trend_limit = self.config.quality.trend_limit.max(f32::EPSILON);
        SignalConditions {
            signal_quality,
            light_level: (frame_stats.brightness / 255.0).clamp(0.0, 1.0),
            movement: heuristic.map_or(0.0, |h| (h.trend.abs() / trend_limit).min(1.0)),
            coverage: frame_stats.valid_pixel_ratio,
            temperature: self.config.ambient_temperature_c,
            stability: self.quality_stability(),
        }
    }

    /// Calibrate every measurable (non-zero) vital; confidence is the mean of
    /// the calibration confidences, or the signal quality when nothing was calibrated.
    fn calibrate(
        &mut self,
        vitals: &VitalSigns,
        conditions: &SignalConditions,
        timestamp_ms: i64,
    ) -> (VitalSigns, f32) {
        let mut calibrated = *vitals;
        let mut confidences = Vec::with_capacity(4);

        let targets: [(MeasurementType, f32); 4] = [
            (MeasurementType::Bpm, vitals.bpm),
            (MeasurementType::Spo2, vitals.spo2),
            (MeasurementType::Systolic, vitals.systolic),
            (MeasurementType::Diastolic, vitals.diastolic),
        ];
        for (measurement, raw) in targets {
            if raw <= 0.0 {
                continue;
            }
            let result = self
                .calibrator
                .calibrate(raw, conditions, measurement, timestamp_ms);
            confidences.push(result.confidence);
            match measurement {
                MeasurementType::Bpm => calibrated.bpm = result.value,
                MeasurementType::Spo2 => {
                    calibrated.spo2 =
                        self.estimator.spo2_gate(result.value, &self.config.processing)
                }
                MeasurementType::Systolic => calibrated.systolic = result.value,
                MeasurementType::Diastolic => calibrated.diastolic = result.value,
            }
        }

        let confidence = if confidences.is_empty() {
            conditions.signal_quality
        } else {
            stats::mean(&confidences)
        };
        (calibrated, confidence.clamp(0.0, 1.0))
    }
}

impl Default for PpgProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::BYTES_PER_PIXEL;

    const W: usize = 8;
    const H: usize = 8;

    fn frame_bytes(red: u8, other: u8) -> Vec<u8> {
        [red, other, other, 255]
            .iter()
            .copied()
            .cycle()
            .take(W * H * BYTES_PER_PIXEL)
            .collect()
    }

    fn feed(processor: &mut PpgProcessor, red: u8, timestamp_ms: i64) -> ProcessedPpgSignal {
        let data = frame_bytes(red, 40);
        let frame = Frame::new(W, H, &data).unwrap();
        processor.process_frame(&frame, timestamp_ms)
    }

    #[test]
    fn test_empty_frame_is_no_signal() {
        let mut processor = PpgProcessor::new();
        let frame = Frame::new(640, 480, &[]).unwrap();
        let record = processor.process_frame(&frame, 1_000);

        assert_eq!(record.bpm, 0);
        assert_eq!(record.signal_quality, 0.0);
        assert!(record.signal.is_empty());
        assert!(!record.finger_detected);
        assert_eq!(record.alert.map(|a| a.kind), Some(AlertKind::NoFingerDetected));
    }

    #[test]
    fn test_dark_frame_is_no_finger() {
        let mut processor = PpgProcessor::new();
        let data = frame_bytes(30, 30);
        let frame = Frame::new(W, H, &data).unwrap();
        let record = processor.process_frame(&frame, 0);
        assert!(!record.finger_detected);
        assert_eq!(processor.sample_count(), 0);
    }

    #[test]
    fn test_finger_detection_delay() {
        let mut processor = PpgProcessor::new();
        for t in (0..500).step_by(33) {
            let record = feed(&mut processor, 190, t);
            assert!(record.finger_detected);
            assert_eq!(record.bpm, 0);
        }
        assert_eq!(processor.sample_count(), 0);

        feed(&mut processor, 190, 500);
        assert_eq!(processor.sample_count(), 1);
    }

    #[test]
    fn test_finger_loss_clears_window_not_calibration() {
        let mut processor = PpgProcessor::new();
        for i in 0..60 {
            feed(&mut processor, 190, i * 33);
        }
        assert!(processor.sample_count() > 0);
        let history = processor.calibrator().history_len();

        let dark = frame_bytes(10, 10);
        processor.process_frame(&Frame::new(W, H, &dark).unwrap(), 2_000);
        assert_eq!(processor.sample_count(), 0);
        assert_eq!(processor.calibrator().history_len(), history);
    }

    #[test]
    fn test_steady_contact_records() {
        let mut processor = PpgProcessor::new();
        let mut last = ProcessedPpgSignal::empty(0);
        for i in 0..40 {
            last = feed(&mut processor, 190, i * 33);
        }

        assert!(last.finger_detected);
        assert!(!last.signal.is_empty());
        assert!((0.0..=1.0).contains(&last.signal_quality));
        assert!((0.0..=1.0).contains(&last.confidence));
        assert!(last.measurement_progress > 0.0 && last.measurement_progress < 1.0);
        assert!(!processor.readings().is_empty());
        // A flat contact has no rhythm
        assert_eq!(last.bpm, 0);
    }

    #[test]
    fn test_reset_clears_session() {
        let mut processor = PpgProcessor::new();
        for i in 0..40 {
            feed(&mut processor, 190, i * 33);
        }
        processor.reset();
        assert_eq!(processor.sample_count(), 0);
        assert!(processor.readings().is_empty());
        assert_eq!(processor.calibrator().history_len(), 0);
    }

    #[test]
    fn test_update_sensitivity() {
        let mut processor = PpgProcessor::new();
        processor
            .update_sensitivity(&SensitivityUpdate {
                noise_reduction: Some(0.4),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(processor.stages.smoother.radius(), 2);
        assert_eq!(processor.sensitivity().noise_reduction, 0.4);
        assert_eq!(processor.sensitivity().signal_amplification, 1.0);

        let rejected = processor.update_sensitivity(&SensitivityUpdate {
            signal_stability: Some(2.0),
            ..Default::default()
        });
        assert!(rejected.is_err());
        assert_eq!(processor.sensitivity().signal_stability, 0.5);
    }

    #[test]
    fn test_quality_reconciliation() {
        let processor = PpgProcessor::new();
        assert_eq!(processor.reconcile_quality(0.0, 0.9), 0.0);
        assert!((processor.reconcile_quality(0.8, 0.4) - 0.6).abs() < 1e-6);
    }
}
