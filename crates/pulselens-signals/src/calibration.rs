//! Adaptive case-based calibration of raw vital measurements.
//!
//! Every calibration is recorded together with the signal conditions it was
//! made under. New measurements reuse the factors of past cases whose
//! conditions are similar (weighted by similarity and recency), or fall back to
//! a baseline factor derived from the conditions alone. Results are softly
//! pulled back into physiological ranges: the excess beyond a bound is halved
//! instead of clipped.
//!
//! History is owned by one calibrator instance and bounded (FIFO eviction).

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignalError};
use crate::stats;

/// Which vital a raw value measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    Bpm,
    Spo2,
    Systolic,
    Diastolic,
}

/// Closed plausibility interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysiologicalRange {
    pub min: f32,
    pub max: f32,
}

impl PhysiologicalRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    /// Pull an out-of-range value toward the nearest bound by `damping` of its excess.
    pub fn soft_clamp(&self, value: f32, damping: f32) -> f32 {
        if value < self.min {
            self.min + (value - self.min) * damping
        } else if value > self.max {
            self.max + (value - self.max) * damping
        } else {
            value
        }
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// Context snapshot a measurement was taken under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalConditions {
    /// Quality of the signal the value came from, [0, 1]
    pub signal_quality: f32,
    /// Normalised scene brightness, [0, 1]
    pub light_level: f32,
    /// Motion estimate, [0, 1]
    pub movement: f32,
    /// Fraction of the lens covered by tissue, [0, 1]
    pub coverage: f32,
    /// Degrees Celsius
    pub temperature: f32,
    /// Short-term quality stability, [0, 1]
    pub stability: f32,
}

impl Default for SignalConditions {
    fn default() -> Self {
        Self {
            signal_quality: 0.0,
            light_level: 0.5,
            movement: 0.0,
            coverage: 0.0,
            temperature: 20.0,
            stability: 0.5,
        }
    }
}

impl SignalConditions {
    fn validate(&self) -> Result<()> {
        let fields = [
            ("signal_quality", self.signal_quality),
            ("light_level", self.light_level),
            ("movement", self.movement),
            ("coverage", self.coverage),
            ("temperature", self.temperature),
            ("stability", self.stability),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(SignalError::InvalidConditions(format!(
                    "{} is not finite",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// One historical calibration case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationEntry {
    pub raw: f32,
    pub calibrated: f32,
    pub conditions: SignalConditions,
    pub factor: f32,
    pub measurement: MeasurementType,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratedResult {
    pub value: f32,
    /// [0, 1]
    pub confidence: f32,
    pub factor: f32,
}

impl CalibratedResult {
    /// Value 0, confidence 0, the given base factor.
    pub fn empty(base_factor: f32) -> Self {
        Self {
            value: 0.0,
            confidence: 0.0,
            factor: base_factor,
        }
    }
}

/// Per-field weights of the condition similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub signal_quality: f32,
    pub light_level: f32,
    pub movement: f32,
    pub coverage: f32,
    pub temperature: f32,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            signal_quality: 0.3,
            light_level: 0.2,
            movement: 0.2,
            coverage: 0.2,
            temperature: 0.1,
        }
    }
}

/// Physiological ranges per measurement type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysiologicalRanges {
    pub bpm: PhysiologicalRange,
    pub spo2: PhysiologicalRange,
    pub systolic: PhysiologicalRange,
    pub diastolic: PhysiologicalRange,
}

impl Default for PhysiologicalRanges {
    fn default() -> Self {
        Self {
            bpm: PhysiologicalRange::new(45.0, 180.0),
            spo2: PhysiologicalRange::new(70.0, 100.0),
            systolic: PhysiologicalRange::new(90.0, 180.0),
            diastolic: PhysiologicalRange::new(60.0, 120.0),
        }
    }
}

impl PhysiologicalRanges {
    pub fn for_measurement(&self, measurement: MeasurementType) -> PhysiologicalRange {
        match measurement {
            MeasurementType::Bpm => self.bpm,
            MeasurementType::Spo2 => self.spo2,
            MeasurementType::Systolic => self.systolic,
            MeasurementType::Diastolic => self.diastolic,
        }
    }
}

/// Calibrator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibratorConfig {
    /// Baseline factor without similar cases
    pub base_factor: f32,
    /// Raised to the signal quality in the baseline factor
    pub quality_factor: f32,
    /// Temperature difference giving zero temperature similarity (°C)
    pub temperature_scale: f32,
    /// Similarity a past case must exceed to be reused
    pub similarity_threshold: f32,
    /// Most recent similar cases considered
    pub max_similar_cases: usize,
    /// History capacity (FIFO)
    pub max_history: usize,
    /// Recency decay scale (ms)
    pub recency_scale_ms: f64,
    pub reference_temperature: f32,
    /// Baseline change per °C away from the reference
    pub temperature_coefficient: f32,
    /// Baseline change per unit of light below 0.5
    pub light_coefficient: f32,
    /// Baseline change per unit of movement
    pub movement_coefficient: f32,
    /// Linear factor adjustments per unit away from 0.5
    pub quality_adjustment: f32,
    pub stability_adjustment: f32,
    pub light_adjustment: f32,
    /// `1 + c * log10(raw / reference)`
    pub nonlinear_coefficient: f32,
    pub nonlinear_reference: f32,
    /// Share of an out-of-range excess that is kept
    pub overflow_damping: f32,
    /// Confidence ceiling without similar cases
    pub min_confidence: f32,
    pub similarity_confidence_weight: f32,
    pub quality_confidence_weight: f32,
    pub stability_confidence_weight: f32,
    /// `exp(-decay * variance(factors))`
    pub stability_decay: f32,
    pub similarity_weights: SimilarityWeights,
    /// Bounds for any resolved factor
    pub factor_range: PhysiologicalRange,
    pub ranges: PhysiologicalRanges,
}

impl Default for CalibratorConfig {
    fn default() -> Self {
        Self {
            base_factor: 1.35,
            quality_factor: 1.0,
            temperature_scale: 5.0,
            similarity_threshold: 0.8,
            max_similar_cases: 10,
            max_history: 100,
            recency_scale_ms: 86_400_000.0,
            reference_temperature: 20.0,
            temperature_coefficient: 0.005,
            light_coefficient: 0.1,
            movement_coefficient: 0.2,
            quality_adjustment: 0.1,
            stability_adjustment: 0.05,
            light_adjustment: 0.03,
            nonlinear_coefficient: 0.1,
            nonlinear_reference: 100.0,
            overflow_damping: 0.5,
            min_confidence: 0.6,
            similarity_confidence_weight: 0.4,
            quality_confidence_weight: 0.4,
            stability_confidence_weight: 0.2,
            stability_decay: 2.0,
            similarity_weights: SimilarityWeights::default(),
            factor_range: PhysiologicalRange::new(0.5, 2.0),
            ranges: PhysiologicalRanges::default(),
        }
    }
}

/// Serializable calibration history, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSnapshot {
    pub entries: Vec<CalibrationEntry>,
}

/// A past case matched against the current conditions.
struct SimilarCase<'a> {
    entry: &'a CalibrationEntry,
    similarity: f32,
}

/// Online case-based calibrator
#[derive(Debug, Clone)]
pub struct AdaptiveCalibrator {
    config: CalibratorConfig,
    history: VecDeque<CalibrationEntry>,
}

impl AdaptiveCalibrator {
    pub fn new() -> Self {
        Self::with_config(CalibratorConfig::default())
    }

    pub fn with_config(config: CalibratorConfig) -> Self {
        let history = VecDeque::with_capacity(config.max_history);
        Self { config, history }
    }

    pub fn config(&self) -> &CalibratorConfig {
        &self.config
    }

    /// Recorded cases, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &CalibrationEntry> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Calibrate `raw`, degrading to [`CalibratedResult::empty`] on failure.
    pub fn calibrate(
        &mut self,
        raw: f32,
        conditions: &SignalConditions,
        measurement: MeasurementType,
        now_ms: i64,
    ) -> CalibratedResult {
        match self.try_calibrate(raw, conditions, measurement, now_ms) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("calibration of {:?} failed: {}", measurement, e);
                CalibratedResult::empty(self.config.base_factor)
            }
        }
    }

    /// Calibrate `raw` and record the case, propagating invalid input.
    pub fn try_calibrate(
        &mut self,
        raw: f32,
        conditions: &SignalConditions,
        measurement: MeasurementType,
        now_ms: i64,
    ) -> Result<CalibratedResult> {
        if !raw.is_finite() {
            return Err(SignalError::NonFiniteInput("raw measurement"));
        }
        conditions.validate()?;

        let similar = self.find_similar_cases(conditions, measurement);
        let factor = self.resolve_factor(&similar, conditions, now_ms);
        let confidence = self.confidence(&similar, conditions);
        let best_similarity = similar.iter().map(|c| c.similarity).fold(0.0f32, f32::max);
        let similar_count = similar.len();

        let adjusted = raw * factor * self.nonlinear_adjustment(raw);
        let range = self.config.ranges.for_measurement(measurement);
        let value = range.soft_clamp(adjusted, self.config.overflow_damping);

        log::debug!(
            "calibrated {:?}: raw={:.2} factor={:.4} value={:.2} similar={} best={:.3} conf={:.3}",
            measurement,
            raw,
            factor,
            value,
            similar_count,
            best_similarity,
            confidence
        );

        self.record(CalibrationEntry {
            raw,
            calibrated: value,
            conditions: *conditions,
            factor,
            measurement,
            timestamp_ms: now_ms,
        });

        Ok(CalibratedResult {
            value,
            confidence,
            factor,
        })
    }

    /// Weighted closeness of two condition snapshots; 1.0 for identical conditions.
    pub fn similarity(&self, a: &SignalConditions, b: &SignalConditions) -> f32 {
        let w = &self.config.similarity_weights;
        w.signal_quality * (1.0 - (a.signal_quality - b.signal_quality).abs())
            + w.light_level * (1.0 - (a.light_level - b.light_level).abs())
            + w.movement * (1.0 - (a.movement - b.movement).abs())
            + w.coverage * (1.0 - (a.coverage - b.coverage).abs())
            + w.temperature
                * (1.0 - (a.temperature - b.temperature).abs() / self.config.temperature_scale)
    }

    /// Same-measurement cases above the similarity threshold, newest first,
    /// at most `max_similar_cases`.
    fn find_similar_cases(
        &self,
        conditions: &SignalConditions,
        measurement: MeasurementType,
    ) -> Vec<SimilarCase<'_>> {
        let mut cases: Vec<SimilarCase<'_>> = self
            .history
            .iter()
            .rev()
            .filter(|entry| entry.measurement == measurement)
            .filter_map(|entry| {
                let similarity = self.similarity(&entry.conditions, conditions);
                (similarity > self.config.similarity_threshold)
                    .then_some(SimilarCase { entry, similarity })
            })
            .collect();
        // Stable: equal timestamps keep newest-inserted first.
        cases.sort_by(|a, b| b.entry.timestamp_ms.cmp(&a.entry.timestamp_ms));
        cases.truncate(self.config.max_similar_cases);
        cases
    }

    fn resolve_factor(
        &self,
        similar: &[SimilarCase<'_>],
        conditions: &SignalConditions,
        now_ms: i64,
    ) -> f32 {
        let factor = if similar.is_empty() {
            self.baseline_factor(conditions)
        } else {
            let average = self.weighted_factor(similar, now_ms);
            self.adjust_factor(average, conditions)
        };
        self.config.factor_range.clamp(factor)
    }

    pub fn baseline_factor(&self, conditions: &SignalConditions) -> f32 {
        let cfg = &self.config;
        let quality = cfg.quality_factor.powf(conditions.signal_quality);
        let temperature_delta = conditions.temperature - cfg.reference_temperature;
        let temperature = 1.0 + temperature_delta * cfg.temperature_coefficient;
        let light = 1.0 + (0.5 - conditions.light_level) * cfg.light_coefficient;
        let movement = 1.0 + conditions.movement * cfg.movement_coefficient;
        cfg.base_factor * quality * temperature * light * movement
    }

    /// Similarity x recency weighted mean of the cases' factors.
    fn weighted_factor(&self, similar: &[SimilarCase<'_>], now_ms: i64) -> f32 {
        let mut total_weight = 0.0f64;
        let mut weighted_sum = 0.0f64;
        for case in similar {
            let age_ms = (now_ms - case.entry.timestamp_ms).max(0) as f64;
            let recency = (-age_ms / self.config.recency_scale_ms).exp();
            let weight = case.similarity as f64 * recency;
            total_weight += weight;
            weighted_sum += case.entry.factor as f64 * weight;
        }

        if total_weight > f64::EPSILON {
            (weighted_sum / total_weight) as f32
        } else {
            // Every case has decayed away; fall back to a plain mean.
            let factors: Vec<f32> = similar.iter().map(|c| c.entry.factor).collect();
            stats::mean(&factors)
        }
    }

    fn adjust_factor(&self, factor: f32, conditions: &SignalConditions) -> f32 {
        let cfg = &self.config;
        factor
            + (conditions.signal_quality - 0.5) * cfg.quality_adjustment
            + (conditions.stability - 0.5) * cfg.stability_adjustment
            + (conditions.light_level - 0.5) * cfg.light_adjustment
    }

    /// `1 + c * log10(raw / reference)`, 1 where the logarithm is undefined.
    fn nonlinear_adjustment(&self, raw: f32) -> f32 {
        if raw <= 0.0 || self.config.nonlinear_reference <= 0.0 {
            return 1.0;
        }
        1.0 + self.config.nonlinear_coefficient * (raw / self.config.nonlinear_reference).log10()
    }

    fn confidence(&self, similar: &[SimilarCase<'_>], conditions: &SignalConditions) -> f32 {
        let cfg = &self.config;
        let quality = conditions.signal_quality.clamp(0.0, 1.0);
        if similar.is_empty() {
            return quality.min(cfg.min_confidence);
        }

        let best_similarity = similar
            .iter()
            .map(|c| c.similarity)
            .fold(0.0f32, f32::max)
            .clamp(0.0, 1.0);
        let stability = if similar.len() < 2 {
            1.0
        } else {
            let factors: Vec<f32> = similar.iter().map(|c| c.entry.factor).collect();
            (-cfg.stability_decay * stats::variance(&factors)).exp()
        };

        (cfg.similarity_confidence_weight * best_similarity
            + cfg.quality_confidence_weight * quality
            + cfg.stability_confidence_weight * stability)
            .clamp(0.0, 1.0)
    }

    fn record(&mut self, entry: CalibrationEntry) {
        self.history.push_back(entry);
        while self.history.len() > self.config.max_history {
            self.history.pop_front();
        }
    }

    pub fn snapshot(&self) -> CalibrationSnapshot {
        CalibrationSnapshot {
            entries: self.history.iter().cloned().collect(),
        }
    }

    /// Replace the history, keeping the newest `max_history` entries.
    pub fn restore(&mut self, snapshot: CalibrationSnapshot) {
        self.history.clear();
        for entry in snapshot.entries {
            self.record(entry);
        }
        log::info!("restored {} calibration cases", self.history.len());
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    pub fn from_json(config: CalibratorConfig, json: &str) -> Result<Self> {
        let snapshot: CalibrationSnapshot = serde_json::from_str(json)?;
        let mut calibrator = Self::with_config(config);
        calibrator.restore(snapshot);
        Ok(calibrator)
    }
}

impl Default for AdaptiveCalibrator {
    fn default() -> Self {
        Self::new()
    }
}
