use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::calibration::CalibratorConfig;
use crate::dsp::{ExtractorConfig, FilterConfig, PeakDetectorConfig, QualityConfig};
use crate::physio::VitalsConfig;
use crate::wavelet::WaveletConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Static measurement-session constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    /// Length of one measurement (seconds)
    pub measurement_duration_s: f32,
    /// Samples needed before a heart rate is reported
    pub min_frames_for_calculation: usize,
    pub min_peaks_for_valid_hr: usize,
    /// Shortest plausible mean beat interval
    pub min_peak_distance_ms: f32,
    /// Longest plausible mean beat interval
    pub max_peak_distance_ms: f32,
    /// Minimum red value of a tissue pixel
    pub min_red_value: f32,
    /// Red must exceed this multiple of max(green, blue)
    pub min_red_dominance: f32,
    pub min_valid_pixels_ratio: f32,
    pub min_brightness: f32,
    /// Samples needed before SpO2 and blood pressure are reported
    pub min_valid_readings: usize,
    /// Continuous detection required before the finger counts as present
    pub finger_detection_delay_ms: i64,
    /// Lower SpO2 values are reported as 0
    pub min_spo2: f32,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            measurement_duration_s: 30.0,
            min_frames_for_calculation: 15,
            min_peaks_for_valid_hr: 2,
            min_peak_distance_ms: 400.0,
            max_peak_distance_ms: 1200.0,
            min_red_value: 15.0,
            min_red_dominance: 1.2,
            min_valid_pixels_ratio: 0.2,
            min_brightness: 80.0,
            min_valid_readings: 30,
            finger_detection_delay_ms: 500,
            min_spo2: 75.0,
        }
    }
}

impl ProcessingSettings {
    /// Finger-detection thresholds with the sensitivity multipliers applied.
    pub fn extractor_config(&self, sensitivity: &SensitivitySettings) -> ExtractorConfig {
        ExtractorConfig {
            min_red_value: self.min_red_value,
            min_red_dominance: self.min_red_dominance,
            min_valid_pixels_ratio: self.min_valid_pixels_ratio,
            min_brightness: self.min_brightness * sensitivity.brightness.unwrap_or(1.0),
            red_intensity: sensitivity.red_intensity.unwrap_or(1.0),
        }
    }
}

/// User-tunable multipliers and thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivitySettings {
    /// Gain on the AC component of the smoothed window
    pub signal_amplification: f32,
    /// Scales the moving-average radius
    pub noise_reduction: f32,
    /// Divides the peak threshold; higher finds more peaks
    pub peak_detection: f32,
    /// Peak threshold in standard deviations above the mean
    pub heartbeat_threshold: f32,
    /// Scales the number of recent quality scores used for stability
    pub response_time: f32,
    /// Weight of the heuristic scorer in the reconciled quality, [0, 1]
    pub signal_stability: f32,
    /// Multiplier on the minimum finger brightness
    pub brightness: Option<f32>,
    /// Multiplier on the extracted red sample
    pub red_intensity: Option<f32>,
}

impl Default for SensitivitySettings {
    fn default() -> Self {
        Self {
            signal_amplification: 1.0,
            noise_reduction: 1.0,
            peak_detection: 1.0,
            heartbeat_threshold: 0.5,
            response_time: 1.0,
            signal_stability: 0.5,
            brightness: None,
            red_intensity: None,
        }
    }
}

/// Partial sensitivity change; `None` fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensitivityUpdate {
    pub signal_amplification: Option<f32>,
    pub noise_reduction: Option<f32>,
    pub peak_detection: Option<f32>,
    pub heartbeat_threshold: Option<f32>,
    pub response_time: Option<f32>,
    pub signal_stability: Option<f32>,
    pub brightness: Option<f32>,
    pub red_intensity: Option<f32>,
}

impl SensitivitySettings {
    /// New settings with every `Some` field of `update` copied over.
    pub fn apply(&self, update: &SensitivityUpdate) -> SensitivitySettings {
        SensitivitySettings {
            signal_amplification: update
                .signal_amplification
                .unwrap_or(self.signal_amplification),
            noise_reduction: update.noise_reduction.unwrap_or(self.noise_reduction),
            peak_detection: update.peak_detection.unwrap_or(self.peak_detection),
            heartbeat_threshold: update.heartbeat_threshold.unwrap_or(self.heartbeat_threshold),
            response_time: update.response_time.unwrap_or(self.response_time),
            signal_stability: update.signal_stability.unwrap_or(self.signal_stability),
            brightness: update.brightness.or(self.brightness),
            red_intensity: update.red_intensity.or(self.red_intensity),
        }
    }

    /// Detector threshold factor `heartbeat_threshold / peak_detection`.
    pub fn peak_threshold_factor(&self) -> f32 {
        if self.peak_detection > 0.0 {
            self.heartbeat_threshold / self.peak_detection
        } else {
            self.heartbeat_threshold
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("signal_amplification", self.signal_amplification),
            ("noise_reduction", self.noise_reduction),
            ("peak_detection", self.peak_detection),
            ("response_time", self.response_time),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::Validation(format!(
                    "sensitivity.{} must be positive",
                    name
                )));
            }
        }
        if !(self.heartbeat_threshold >= 0.0 && self.heartbeat_threshold.is_finite()) {
            return Err(ConfigError::Validation(
                "sensitivity.heartbeat_threshold must be non-negative".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.signal_stability) {
            return Err(ConfigError::Validation(
                "sensitivity.signal_stability must be in [0, 1]".to_string(),
            ));
        }
        for (name, value) in [
            ("brightness", self.brightness),
            ("red_intensity", self.red_intensity),
        ] {
            if let Some(v) = value {
                if !(v > 0.0 && v.is_finite()) {
                    return Err(ConfigError::Validation(format!(
                        "sensitivity.{} must be positive",
                        name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frame rate the pipeline is driven at (Hz)
    pub sample_rate: f32,
    /// Raw sample history (power of two)
    pub raw_capacity: usize,
    /// Recent quality scores (power of two)
    pub quality_capacity: usize,
    /// Reading log for charting (power of two)
    pub reading_capacity: usize,
    /// Quality scores used for the stability estimate, before `response_time`
    pub stability_window: usize,
    /// Assumed device temperature for calibration (°C)
    pub ambient_temperature_c: f32,
    /// Reconciled quality below which a low-quality alert is raised
    pub low_quality_threshold: f32,
    pub processing: ProcessingSettings,
    pub sensitivity: SensitivitySettings,
    pub filter: FilterConfig,
    pub peaks: PeakDetectorConfig,
    pub quality: QualityConfig,
    pub wavelet: WaveletConfig,
    pub calibration: CalibratorConfig,
    pub vitals: VitalsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 30.0,
            raw_capacity: 256,
            quality_capacity: 64,
            reading_capacity: 1024,
            stability_window: 10,
            ambient_temperature_c: 20.0,
            low_quality_threshold: 0.5,
            processing: ProcessingSettings::default(),
            sensitivity: SensitivitySettings::default(),
            filter: FilterConfig::default(),
            peaks: PeakDetectorConfig::default(),
            quality: QualityConfig::default(),
            wavelet: WaveletConfig::default(),
            calibration: CalibratorConfig::default(),
            vitals: VitalsConfig::default(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid {}", name)))
}

impl PipelineConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    /// Environment variables should be prefixed with PULSELENS_
    /// Example: PULSELENS_MIN_SPO2=80
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        use std::env;

        if let Ok(val) = env::var("PULSELENS_SAMPLE_RATE") {
            let rate: f32 = parse_env("PULSELENS_SAMPLE_RATE", &val)?;
            self.sample_rate = rate;
            self.peaks.sample_rate = rate;
            self.wavelet.sample_rate = rate;
        }
        if let Ok(val) = env::var("PULSELENS_MEASUREMENT_DURATION_S") {
            self.processing.measurement_duration_s =
                parse_env("PULSELENS_MEASUREMENT_DURATION_S", &val)?;
        }
        if let Ok(val) = env::var("PULSELENS_MIN_SPO2") {
            self.processing.min_spo2 = parse_env("PULSELENS_MIN_SPO2", &val)?;
        }
        if let Ok(val) = env::var("PULSELENS_SIGNAL_AMPLIFICATION") {
            self.sensitivity.signal_amplification =
                parse_env("PULSELENS_SIGNAL_AMPLIFICATION", &val)?;
        }
        if let Ok(val) = env::var("PULSELENS_NOISE_REDUCTION") {
            self.sensitivity.noise_reduction = parse_env("PULSELENS_NOISE_REDUCTION", &val)?;
        }
        if let Ok(val) = env::var("PULSELENS_CALIBRATION_BASE_FACTOR") {
            self.calibration.base_factor = parse_env("PULSELENS_CALIBRATION_BASE_FACTOR", &val)?;
        }
        if let Ok(val) = env::var("PULSELENS_AMBIENT_TEMPERATURE_C") {
            self.ambient_temperature_c = parse_env("PULSELENS_AMBIENT_TEMPERATURE_C", &val)?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_rate > 0.0 && self.sample_rate.is_finite()) {
            return Err(ConfigError::Validation(
                "sample_rate must be positive".to_string(),
            ));
        }
        if self.peaks.sample_rate != self.sample_rate
            || self.wavelet.sample_rate != self.sample_rate
        {
            return Err(ConfigError::Validation(
                "peaks.sample_rate and wavelet.sample_rate must equal sample_rate".to_string(),
            ));
        }

        // Buffers
        let min_window = 1usize << self.wavelet.levels;
        for (name, capacity) in [
            ("raw_capacity", self.raw_capacity),
            ("quality_capacity", self.quality_capacity),
            ("reading_capacity", self.reading_capacity),
        ] {
            if capacity == 0 || !capacity.is_power_of_two() {
                return Err(ConfigError::Validation(format!(
                    "{} must be a power of two",
                    name
                )));
            }
        }
        if self.raw_capacity < min_window {
            return Err(ConfigError::Validation(format!(
                "raw_capacity must be >= 2^wavelet.levels ({})",
                min_window
            )));
        }
        if self.stability_window == 0 {
            return Err(ConfigError::Validation(
                "stability_window must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.low_quality_threshold) {
            return Err(ConfigError::Validation(
                "low_quality_threshold must be in [0, 1]".to_string(),
            ));
        }

        // Processing
        let p = &self.processing;
        if p.measurement_duration_s <= 0.0 {
            return Err(ConfigError::Validation(
                "processing.measurement_duration_s must be positive".to_string(),
            ));
        }
        if p.min_peak_distance_ms >= p.max_peak_distance_ms {
            return Err(ConfigError::Validation(
                "processing.min_peak_distance_ms must be < max_peak_distance_ms".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&p.min_valid_pixels_ratio) {
            return Err(ConfigError::Validation(
                "processing.min_valid_pixels_ratio must be in [0, 1]".to_string(),
            ));
        }
        if p.finger_detection_delay_ms < 0 {
            return Err(ConfigError::Validation(
                "processing.finger_detection_delay_ms must be non-negative".to_string(),
            ));
        }

        self.sensitivity.validate()?;

        // Wavelet
        let w = &self.wavelet;
        if w.levels == 0 || w.levels > 10 {
            return Err(ConfigError::Validation(
                "wavelet.levels must be in [1, 10]".to_string(),
            ));
        }
        if !w.window_size.is_power_of_two() || w.window_size < min_window {
            return Err(ConfigError::Validation(
                "wavelet.window_size must be a power of two >= 2^levels".to_string(),
            ));
        }
        if w.min_bpm >= w.max_bpm {
            return Err(ConfigError::Validation(
                "wavelet.min_bpm must be < max_bpm".to_string(),
            ));
        }
        let weight_sum = w.energy_weight + w.entropy_weight + w.peak_weight;
        if (weight_sum - 1.0).abs() > 1e-3 {
            return Err(ConfigError::Validation(
                "wavelet quality weights must sum to 1".to_string(),
            ));
        }

        // Heuristic quality
        let q = &self.quality;
        if !(q.min_red_intensity < q.optimal_min
            && q.optimal_min < q.optimal_max
            && q.optimal_max <= q.max_red_intensity)
        {
            return Err(ConfigError::Validation(
                "quality intensity bounds must be ordered".to_string(),
            ));
        }
        if q.optimal_variance <= 0.0 {
            return Err(ConfigError::Validation(
                "quality.optimal_variance must be positive".to_string(),
            ));
        }

        // Calibration
        let c = &self.calibration;
        if c.max_history == 0 || c.max_similar_cases == 0 {
            return Err(ConfigError::Validation(
                "calibration.max_history and max_similar_cases must be > 0".to_string(),
            ));
        }
        if c.factor_range.min <= 0.0 || c.factor_range.min > c.factor_range.max {
            return Err(ConfigError::Validation(
                "calibration.factor_range must be positive and ordered".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&c.overflow_damping) {
            return Err(ConfigError::Validation(
                "calibration.overflow_damping must be in [0, 1]".to_string(),
            ));
        }
        if c.temperature_scale <= 0.0 || c.recency_scale_ms <= 0.0 {
            return Err(ConfigError::Validation(
                "calibration.temperature_scale and recency_scale_ms must be positive".to_string(),
            ));
        }
        let r = &c.ranges;
        for (name, range) in [
            ("bpm", r.bpm),
            ("spo2", r.spo2),
            ("systolic", r.systolic),
            ("diastolic", r.diastolic),
        ] {
            if range.min >= range.max {
                return Err(ConfigError::Validation(format!(
                    "calibration.ranges.{} must be ordered",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Export configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = self
            .to_toml_string()
            .map_err(|e| ConfigError::Validation(format!("TOML serialization error: {}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }
}
