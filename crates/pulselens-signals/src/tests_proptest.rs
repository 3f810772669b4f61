use proptest::prelude::*;

/// Property-based tests for the signal-chain invariants

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{AdaptiveCalibrator, MeasurementType, SignalConditions};
    use crate::dsp::{PeakValleyDetector, SignalQualityAnalyzer};
    use crate::wavelet::WaveletAnalyzer;

    fn conditions_strategy() -> impl Strategy<Value = SignalConditions> {
        (
            0.0f32..=1.0,
            0.0f32..=1.0,
            0.0f32..=1.0,
            0.0f32..=1.0,
            10.0f32..40.0,
            0.0f32..=1.0,
        )
            .prop_map(
                |(signal_quality, light_level, movement, coverage, temperature, stability)| {
                    SignalConditions {
                        signal_quality,
                        light_level,
                        movement,
                        coverage,
                        temperature,
                        stability,
                    }
                },
            )
    }

    // =========================================================================
    // Calibrated values: inside the range, or the pre-clamp excess halved
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn test_bpm_soft_range(
            raws in prop::collection::vec(1.0f32..500.0, 1..40),
            conditions in conditions_strategy(),
        ) {
            let mut calibrator = AdaptiveCalibrator::new();
            for (i, raw) in raws.iter().enumerate() {
                let ts = i as i64 * 33;
                let result = calibrator.calibrate(*raw, &conditions, MeasurementType::Bpm, ts);
                let adjusted = raw * result.factor * (1.0 + 0.1 * (raw / 100.0).log10());
                let tolerance = 1e-3 * adjusted.abs().max(1.0);

                if result.value > 180.0 {
                    prop_assert!(adjusted > 180.0);
                    let expected = 180.0 + (adjusted - 180.0) * 0.5;
                    prop_assert!((result.value - expected).abs() <= tolerance);
                } else if result.value < 45.0 {
                    prop_assert!(adjusted < 45.0);
                    let expected = 45.0 + (adjusted - 45.0) * 0.5;
                    prop_assert!((result.value - expected).abs() <= tolerance);
                } else {
                    prop_assert!((result.value - adjusted).abs() <= tolerance);
                }
                prop_assert!((0.0..=1.0).contains(&result.confidence));
            }
        }
    }

    // =========================================================================
    // Quality scores stay in [0, 1]
    // =========================================================================
    proptest! {
        #[test]
        fn test_heuristic_quality_bounded(
            signal in prop::collection::vec(-100.0f32..400.0, 0..50),
        ) {
            let quality = SignalQualityAnalyzer::new().analyze(&signal);
            prop_assert!((0.0..=1.0).contains(&quality));
        }

        #[test]
        fn test_wavelet_quality_bounded(
            signal in prop::collection::vec(
                prop_oneof![0.0f32..255.0, -1e20f32..1e20],
                0..300,
            ),
        ) {
            let mut analyzer = WaveletAnalyzer::new();
            let analysis = analyzer.analyze(&signal).or_empty();
            prop_assert!((0.0..=1.0).contains(&analysis.quality));
            prop_assert!(analysis.noise >= 0.0);
            if signal.len() < 64 {
                prop_assert!(analysis.peaks.is_empty());
                prop_assert_eq!(analysis.quality, 0.0);
            }
        }
    }

    // =========================================================================
    // History keeps exactly the newest 100 cases in insertion order
    // =========================================================================
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        #[test]
        fn test_history_bound(n in 101usize..250, conditions in conditions_strategy()) {
            let mut calibrator = AdaptiveCalibrator::new();
            for i in 0..n {
                calibrator.calibrate(70.0, &conditions, MeasurementType::Bpm, i as i64);
            }
            prop_assert_eq!(calibrator.history_len(), 100);
            let stamps: Vec<i64> = calibrator.history().map(|e| e.timestamp_ms).collect();
            let expected: Vec<i64> = ((n - 100) as i64..n as i64).collect();
            prop_assert_eq!(stamps, expected);
        }

        #[test]
        fn test_calibration_deterministic(
            raws in prop::collection::vec(1.0f32..300.0, 1..30),
            conditions in conditions_strategy(),
        ) {
            let mut a = AdaptiveCalibrator::new();
            let mut b = AdaptiveCalibrator::new();
            for (i, raw) in raws.iter().enumerate() {
                let ts = 1_000 + i as i64 * 33;
                let ra = a.calibrate(*raw, &conditions, MeasurementType::Systolic, ts);
                let rb = b.calibrate(*raw, &conditions, MeasurementType::Systolic, ts);
                prop_assert_eq!(ra, rb);
            }
        }
    }

    // =========================================================================
    // Fewer than two peaks means no rhythm
    // =========================================================================
    proptest! {
        #[test]
        fn test_peak_count_floor(signal in prop::collection::vec(150.0f32..230.0, 0..80)) {
            let detector = PeakValleyDetector::new();
            let features = detector.features(&signal);
            if features.peaks.len() < 2 {
                prop_assert_eq!(features.frequency, 0.0);
                prop_assert_eq!(detector.bpm(&features.peaks), 0.0);
            } else {
                prop_assert!(features.frequency > 0.0);
            }
        }
    }
}
