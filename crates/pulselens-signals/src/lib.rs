//! # pulselens-signals
//!
//! Fingertip photoplethysmography (PPG) signal chain.
//!
//! This crate provides:
//! - **Extraction**: red-channel mean and fingertip detection from RGBA frames
//! - **DSP**: moving-average smoothing, statistical peak/valley detection, heuristic quality
//! - **Wavelets**: Daubechies-4 decomposition for quality scoring and robust pulse peaks
//! - **Calibration**: case-based adaptive calibration with physiological soft clamping
//! - **Vitals**: heart rate, heuristic SpO2 and blood pressure, HRV and rhythm regularity
//!
//! ## Example
//!
//! ```ignore
//! use pulselens_signals::{Frame, PpgProcessor};
//!
//! let mut processor = PpgProcessor::new();
//!
//! for (pixels, timestamp_ms) in camera_frames {
//!     let frame = Frame::new(640, 480, &pixels)?;
//!     let record = processor.process_frame(&frame, timestamp_ms);
//!     println!("{} BPM (quality {:.2})", record.bpm, record.signal_quality);
//! }
//! ```

pub mod buffer;
pub mod calibration;
pub mod config;
pub mod dsp;
pub mod error;
pub mod outcome;
pub mod physio;
pub mod pipeline;
pub mod stats;
pub mod wavelet;

#[cfg(test)]
mod tests_proptest;

pub use buffer::{RingSampleBuffer, Sample};
pub use calibration::{
    AdaptiveCalibrator, CalibratedResult, CalibrationEntry, CalibrationSnapshot, CalibratorConfig,
    MeasurementType, PhysiologicalRange, SignalConditions,
};
pub use config::{
    ConfigError, PipelineConfig, ProcessingSettings, SensitivitySettings, SensitivityUpdate,
};
pub use dsp::{
    ChannelExtractor, Frame, FrameStats, PeakValleyDetector, SignalFeatures,
    SignalQualityAnalyzer, SmoothingFilter,
};
pub use error::{Result, SignalError};
pub use outcome::{Empty, Insufficiency, Outcome};
pub use physio::{ArrhythmiaType, HrvMetrics, VitalSigns, VitalsEstimator};
pub use pipeline::{
    AlertKind, AlertPriority, PpgProcessor, ProcessedPpgSignal, QualityAlert, VitalReading,
};
pub use wavelet::{WaveletAnalysis, WaveletAnalyzer, WaveletPeak};
