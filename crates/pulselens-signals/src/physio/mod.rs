//! Physiological estimates derived from the processed waveform.

pub mod vitals;

pub use vitals::{
    ArrhythmiaType, HrvMetrics, VitalSigns, VitalsConfig, VitalsEstimator, VitalsInput,
};
