//! Heuristic signal quality from raw red intensity.
//!
//! A fast, model-free score that complements the wavelet analysis. It looks at
//! the newest raw sample to decide whether a fingertip is present and well
//! exposed, then at the last few samples for excess variance and abrupt trend
//! (motion or contact change).

use serde::{Deserialize, Serialize};

use crate::outcome::{Insufficiency, Outcome};
use crate::stats;

/// Configuration for heuristic quality scoring
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Below this intensity no finger is present
    pub min_red_intensity: f32,
    /// Sensor ceiling
    pub max_red_intensity: f32,
    /// Lower bound of the optimal exposure range
    pub optimal_min: f32,
    /// Upper bound of the optimal exposure range
    pub optimal_max: f32,
    /// Multiplier for under-exposed samples
    pub low_penalty: f32,
    /// Multiplier for over-exposed samples
    pub high_penalty: f32,
    /// Number of recent samples for variance and trend
    pub recent_window: usize,
    /// Short-window variance above which quality starts to drop
    pub optimal_variance: f32,
    /// Share of the score controlled by the variance term
    pub variance_weight: f32,
    /// Half-window mean difference treated as abrupt motion
    pub trend_limit: f32,
    /// Multiplier applied on abrupt motion
    pub trend_penalty: f32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            min_red_intensity: 50.0,
            max_red_intensity: 255.0,
            optimal_min: 150.0,
            optimal_max: 230.0,
            low_penalty: 0.5,
            high_penalty: 0.7,
            recent_window: 5,
            optimal_variance: 500.0,
            variance_weight: 0.3,
            trend_limit: 50.0,
            trend_penalty: 0.8,
        }
    }
}

/// Coarse label for a quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityStatus {
    Optimal,
    Good,
    Moderate,
    Weak,
    Insufficient,
}

impl QualityStatus {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.9 {
            Self::Optimal
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.5 {
            Self::Moderate
        } else if score >= 0.2 {
            Self::Weak
        } else {
            Self::Insufficient
        }
    }
}

/// Detailed heuristic assessment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicQuality {
    /// Score in [0, 1]
    pub score: f32,
    /// Newest raw intensity
    pub intensity: f32,
    pub in_optimal_range: bool,
    /// Variance of the recent window (0 when too few samples)
    pub recent_variance: f32,
    /// Half-window trend of the recent window (0 when too few samples)
    pub trend: f32,
    pub status: QualityStatus,
}

/// Heuristic quality scorer
#[derive(Debug, Clone, Default)]
pub struct SignalQualityAnalyzer {
    config: QualityConfig,
}

impl SignalQualityAnalyzer {
    pub fn new() -> Self {
        Self::with_config(QualityConfig::default())
    }

    pub fn with_config(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// Quality score in [0, 1]; 0 for an empty window or no finger.
    pub fn analyze(&self, signal: &[f32]) -> f32 {
        match self.assess(signal) {
            Outcome::Ready(q) => q.score,
            Outcome::Insufficient(_) => 0.0,
        }
    }

    /// Full assessment of the newest raw samples.
    pub fn assess(&self, signal: &[f32]) -> Outcome<HeuristicQuality> {
        let cfg = &self.config;
        let Some(&intensity) = signal.last() else {
            return Outcome::Insufficient(Insufficiency::EmptyWindow);
        };

        if !intensity.is_finite()
            || intensity < cfg.min_red_intensity
            || intensity > cfg.max_red_intensity
        {
            log::trace!("intensity {:.1} outside finger range", intensity);
            return Outcome::Insufficient(Insufficiency::NoFinger);
        }

        let in_optimal_range = intensity >= cfg.optimal_min && intensity <= cfg.optimal_max;
        let mut score = if in_optimal_range {
            let middle = (cfg.optimal_max + cfg.optimal_min) / 2.0;
            let max_distance = (cfg.optimal_max - cfg.optimal_min) / 2.0;
            1.0 - (intensity - middle).abs() / max_distance
        } else {
            let distance = if intensity < cfg.optimal_min {
                cfg.optimal_min - intensity
            } else {
                intensity - cfg.optimal_max
            };
            let max_allowed = cfg.optimal_min - cfg.min_red_intensity;
            (1.0 - distance / max_allowed).max(0.0)
        };

        if intensity < cfg.optimal_min {
            score *= cfg.low_penalty;
        } else if intensity > cfg.optimal_max {
            score *= cfg.high_penalty;
        }

        let mut recent_variance = 0.0;
        let mut trend = 0.0;
        if cfg.recent_window > 0 && signal.len() >= cfg.recent_window {
            let recent = &signal[signal.len() - cfg.recent_window..];
            recent_variance = stats::variance(recent);

            // Only variance above the optimum is penalised; a steady contact is fine.
            let excess = (recent_variance - cfg.optimal_variance).max(0.0);
            let variance_quality = (1.0 - excess / cfg.optimal_variance).max(0.0);
            score *= (1.0 - cfg.variance_weight) + cfg.variance_weight * variance_quality;

            trend = stats::half_trend(recent);
            if trend.abs() > cfg.trend_limit {
                score *= cfg.trend_penalty;
            }
        }

        let score = score.clamp(0.0, 1.0);
        let status = QualityStatus::from_score(score);
        log::trace!(
            "heuristic quality: intensity={:.1} score={:.3} status={:?}",
            intensity,
            score,
            status
        );

        Outcome::Ready(HeuristicQuality {
            score,
            intensity,
            in_optimal_range,
            recent_variance,
            trend,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_window_is_zero() {
        let analyzer = SignalQualityAnalyzer::new();
        assert_eq!(analyzer.analyze(&[]), 0.0);
        assert_eq!(
            analyzer.assess(&[]),
            Outcome::Insufficient(Insufficiency::EmptyWindow)
        );
    }

    #[test]
    fn test_stable_optimal_sequence_scores_high() {
        let analyzer = SignalQualityAnalyzer::new();
        let quality = analyzer.analyze(&[190.0, 195.0, 192.0, 198.0, 193.0]);
        assert!(quality > 0.8, "quality was {}", quality);
    }

    #[test]
    fn test_below_floor_is_zero() {
        let analyzer = SignalQualityAnalyzer::new();
        assert_eq!(analyzer.analyze(&[5.0]), 0.0);
        assert_eq!(analyzer.analyze(&[190.0, 190.0, 5.0]), 0.0);
    }

    #[test]
    fn test_above_ceiling_is_zero() {
        let analyzer = SignalQualityAnalyzer::new();
        assert_eq!(analyzer.analyze(&[256.0]), 0.0);
    }

    #[test]
    fn test_range_midpoint_is_perfect() {
        let analyzer = SignalQualityAnalyzer::new();
        assert_relative_eq!(analyzer.analyze(&[190.0]), 1.0);
        assert_relative_eq!(analyzer.analyze(&[150.0]), 0.0);
    }

    #[test]
    fn test_under_exposed_penalised() {
        let analyzer = SignalQualityAnalyzer::new();
        // distance 50 of 100 allowed -> 0.5, then x0.5
        assert_relative_eq!(analyzer.analyze(&[100.0]), 0.25);
        // distance 10 above -> 0.9, then x0.7
        assert_relative_eq!(analyzer.analyze(&[240.0]), 0.63, epsilon = 1e-5);
    }

    #[test]
    fn test_abrupt_trend_penalised() {
        let analyzer = SignalQualityAnalyzer::new();
        let steady = analyzer.assess(&[190.0, 190.0, 190.0, 190.0, 190.0]).ready().unwrap();
        let jump = analyzer.assess(&[100.0, 100.0, 190.0, 190.0, 190.0]).ready().unwrap();

        assert!(jump.trend > 50.0);
        assert!(jump.score < steady.score);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(QualityStatus::from_score(0.95), QualityStatus::Optimal);
        assert_eq!(QualityStatus::from_score(0.75), QualityStatus::Good);
        assert_eq!(QualityStatus::from_score(0.1), QualityStatus::Insufficient);
    }
}
