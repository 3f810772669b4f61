//! DSP (Digital Signal Processing) module
//!
//! Time-domain stages of the fingertip PPG chain:
//! - `ChannelExtractor` - frame to red-intensity sample, fingertip presence
//! - `SmoothingFilter` - symmetric moving-average denoise
//! - `PeakValleyDetector` - threshold extrema, beat frequency, window features
//! - `SignalQualityAnalyzer` - heuristic exposure/stability quality

mod extract;
mod filters;
mod peaks;
mod signal_quality;

pub use extract::{ChannelExtractor, ExtractorConfig, Frame, FrameStats, BYTES_PER_PIXEL};
pub use filters::{amplify_ac, moving_average, FilterConfig, SmoothingFilter};
pub use peaks::{PeakDetectorConfig, PeakValleyDetector, SignalFeatures};
pub use signal_quality::{HeuristicQuality, QualityConfig, QualityStatus, SignalQualityAnalyzer};
