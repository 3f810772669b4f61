//! Wavelet analysis module
//!
//! - `dwt` - Daubechies-4 multi-level decomposition, subband energy and entropy
//! - `analyzer` - windowed quality scoring and wavelet-domain pulse peaks

pub mod analyzer;
pub mod dwt;

pub use analyzer::{
    SignalCharacteristics, WaveletAnalysis, WaveletAnalyzer, WaveletConfig, WaveletPeak,
};
pub use dwt::{decompose, shannon_entropy, WaveletDecomposition, DB4_SCALING, DB4_WAVELET};
