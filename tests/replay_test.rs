//! Replaying the bundled recording through the full application

use head_coupled_view::{
    app::{AppConfig, HeadCoupledApp, Viewport},
    calibration::MemoryStore,
    camera::PerspectiveCamera,
    detection::TaskState,
    pipeline::TrackingState,
    replay::{Recording, ReplayDetector},
};
use std::path::PathBuf;

fn sample_recording() -> Recording {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/sample_recording.yaml");
    Recording::from_file(path).unwrap()
}

#[test]
fn test_sample_recording_loads() {
    let recording = sample_recording();
    assert_eq!(recording.capture_size, Some((640.0, 480.0)));
    assert_eq!(recording.latency_ticks, 2);
    assert_eq!(recording.frames.len(), 48);
    assert_eq!(recording.frames.iter().filter(|f| f.is_none()).count(), 3);
}

#[test]
fn test_sample_recording_drives_camera() {
    let recording = sample_recording();
    let ticks = (recording.frames.len() + 1) * (recording.latency_ticks + 1);
    let config = AppConfig {
        viewport: Viewport::new(1280, 720),
        debug_overlay: true,
        capture_size: recording.capture_size,
        ..AppConfig::default()
    };
    let mut app = HeadCoupledApp::new(
        config,
        Some(Box::new(ReplayDetector::new(recording, false))),
        Box::<MemoryStore>::default(),
    )
    .unwrap();
    let mut camera = PerspectiveCamera::default();

    let mut xs = Vec::new();
    for _ in 0..ticks {
        let state = app.tick(&mut camera);
        assert!(state.position.iter().all(|v| v.is_finite()));
        assert!(state.position.z > 0.0);
        assert!(state.near > state.position.z);
        xs.push(state.position.x);
    }

    assert_eq!(app.tracking_state(), TrackingState::Tracking);
    assert_eq!(app.detection_state(), Some(TaskState::Idle));
    assert!(app.overlay().is_some());

    // The face sweeps across the frame, so the eye point must move both ways
    let min = xs.iter().copied().fold(f64::INFINITY, f64::min);
    let max = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert!(min < -0.05 && max > 0.05, "x range {min}..{max}");
}
