//! End-to-end runs of the frame pipeline on synthetic fingertip captures.

use std::f32::consts::PI;

use pulselens_signals::{
    AlertKind, Frame, PipelineConfig, PpgProcessor, ProcessedPpgSignal, SensitivityUpdate,
};

const WIDTH: usize = 8;
const HEIGHT: usize = 8;
const FPS: f32 = 30.0;

/// RGBA frame whose mean red is `red`; per-pixel dither keeps sub-integer resolution.
fn fingertip_frame(red: f32) -> Vec<u8> {
    let pixels = WIDTH * HEIGHT;
    let mut data = Vec::with_capacity(pixels * 4);
    for i in 0..pixels {
        let dither = (i as f32 + 0.5) / pixels as f32 - 0.5;
        let r = (red + dither).round().clamp(0.0, 255.0) as u8;
        data.extend_from_slice(&[r, 40, 40, 255]);
    }
    data
}

fn run_pulse(processor: &mut PpgProcessor, bpm: f32, seconds: f32) -> Vec<ProcessedPpgSignal> {
    let frames = (seconds * FPS) as usize;
    let hz = bpm / 60.0;
    (0..frames)
        .map(|i| {
            let t = i as f32 / FPS;
            let red = 190.0 + 6.0 * (2.0 * PI * hz * t).sin();
            let data = fingertip_frame(red);
            let frame = Frame::new(WIDTH, HEIGHT, &data).unwrap();
            processor.process_frame(&frame, (t * 1000.0).round() as i64)
        })
        .collect()
}

#[test]
fn steady_pulse_yields_heart_rate() {
    let mut processor = PpgProcessor::new();
    let records = run_pulse(&mut processor, 72.0, 20.0);
    let last = records.last().unwrap();

    assert!(last.finger_detected);
    assert!(
        (62.0..=82.0).contains(&last.uncalibrated.bpm),
        "uncalibrated bpm {}",
        last.uncalibrated.bpm
    );
    assert!(last.bpm > 0);
    assert!(last.features.peaks.len() >= 2);
    assert!(!last.has_arrhythmia);
    assert!(last.spo2 <= 100);
    assert_eq!(last.signal.len(), 256);
}

#[test]
fn every_record_is_bounded() {
    let mut processor = PpgProcessor::new();
    for record in run_pulse(&mut processor, 90.0, 12.0) {
        assert!((0.0..=1.0).contains(&record.signal_quality));
        assert!((0.0..=1.0).contains(&record.heuristic_quality));
        assert!((0.0..=1.0).contains(&record.wavelet_quality));
        assert!((0.0..=1.0).contains(&record.confidence));
        assert!((0.0..=1.0).contains(&record.measurement_progress));
        assert!(record.spo2 <= 100);
    }
}

#[test]
fn measurement_completes_after_duration() {
    let mut config = PipelineConfig::default();
    config.processing.measurement_duration_s = 5.0;
    let mut processor = PpgProcessor::with_config(config).unwrap();

    let records = run_pulse(&mut processor, 72.0, 7.0);
    assert!(!records[60].measurement_complete);
    assert!(records.last().unwrap().measurement_complete);
}

#[test]
fn missing_finger_raises_alert_and_restarts() {
    let mut processor = PpgProcessor::new();
    run_pulse(&mut processor, 72.0, 4.0);
    assert!(processor.sample_count() > 0);

    let dark = vec![0u8; WIDTH * HEIGHT * 4];
    let record = processor.process_frame(&Frame::new(WIDTH, HEIGHT, &dark).unwrap(), 10_000);
    assert!(!record.finger_detected);
    assert_eq!(record.bpm, 0);
    assert_eq!(
        record.alert.as_ref().map(|a| a.kind),
        Some(AlertKind::NoFingerDetected)
    );
    assert_eq!(processor.sample_count(), 0);
}

#[test]
fn no_frames_at_all_is_fine() {
    let processor = PpgProcessor::new();
    assert_eq!(processor.sample_count(), 0);
    assert!(processor.readings().is_empty());
}

#[test]
fn record_serializes_with_camel_case_keys() {
    let mut processor = PpgProcessor::new();
    let records = run_pulse(&mut processor, 72.0, 3.0);
    let json = serde_json::to_value(records.last().unwrap()).unwrap();

    for key in ["signalQuality", "arrhythmiaType", "hasArrhythmia", "timestamp", "features"] {
        assert!(json.get(key).is_some(), "missing {}", key);
    }
    assert_eq!(json["arrhythmiaType"], "Normal");
}

#[test]
fn calibration_history_survives_snapshot() {
    let mut processor = PpgProcessor::new();
    run_pulse(&mut processor, 72.0, 12.0);
    let json = processor.calibrator().to_json().unwrap();
    assert!(processor.calibrator().history_len() > 0);

    let mut restored = PpgProcessor::new();
    let snapshot = serde_json::from_str(&json).unwrap();
    restored.calibrator_mut().restore(snapshot);
    assert_eq!(
        restored.calibrator().snapshot(),
        processor.calibrator().snapshot()
    );
}

#[test]
fn sensitivity_update_keeps_pipeline_running() {
    let mut processor = PpgProcessor::new();
    processor
        .update_sensitivity(&SensitivityUpdate {
            signal_amplification: Some(2.0),
            noise_reduction: Some(0.6),
            ..Default::default()
        })
        .unwrap();

    let records = run_pulse(&mut processor, 72.0, 15.0);
    let last = records.last().unwrap();
    assert!(
        (62.0..=82.0).contains(&last.uncalibrated.bpm),
        "uncalibrated bpm {}",
        last.uncalibrated.bpm
    );
}
