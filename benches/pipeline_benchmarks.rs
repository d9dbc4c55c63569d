//! Benchmarks for the per-tick tracking work

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use head_coupled_view::{
    calibration::{self, CalibrationParameters, ViewerPosition},
    camera::{CameraRig, OffAxisCameraController, PerspectiveCamera},
    detection::{BoundingBox, RawDetection},
    pipeline::{TrackingContext, TrackingPipeline},
    signal,
    smoother::TemporalSmoother,
};
use nalgebra::Point2;

/// Noisy 68-point detections drifting across a 640x480 frame
fn detections(count: usize) -> Vec<RawDetection> {
    (0..count)
        .map(|i| {
            let t = i as f64 * 0.1;
            let cx = 320.0 + 80.0 * t.sin() + rand::random::<f64>();
            let cy = 240.0 + 40.0 * t.cos() + rand::random::<f64>();
            let side = 120.0 + 10.0 * (t * 0.5).sin();

            let points: Vec<Point2<f64>> = (0..68)
                .map(|k| {
                    let angle = k as f64 / 68.0 * std::f64::consts::TAU;
                    Point2::new(cx + 0.4 * side * angle.cos(), cy + 0.4 * side * angle.sin())
                })
                .collect();
            let bbox = BoundingBox::new(cx - side / 2.0, cy - side / 2.0, side, side);
            RawDetection::from_landmarks68(&points, bbox).expect("68 points")
        })
        .collect()
}

fn benchmark_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    let data = detections(100);
    let calibration = CalibrationParameters::default();

    group.bench_function("extract", |b| {
        b.iter(|| black_box(signal::extract(black_box(&data[0]))));
    });

    for window in [1, 5, 15] {
        let signals: Vec<_> = data.iter().map(signal::extract).collect();
        group.bench_with_input(BenchmarkId::new("smoother_push_100", window), &signals, |b, signals| {
            b.iter(|| {
                let mut smoother = TemporalSmoother::new(window).expect("window > 0");
                for s in signals {
                    black_box(smoother.push(*s));
                }
            });
        });
    }

    let smoothed = TemporalSmoother::default().push(signal::extract(&data[0]));
    group.bench_function("map", |b| {
        b.iter(|| black_box(calibration::map(black_box(&smoothed), black_box(&calibration))));
    });

    group.finish();
}

fn benchmark_camera(c: &mut Criterion) {
    let mut group = c.benchmark_group("camera");
    let mut controller = OffAxisCameraController::default();
    let mut camera = PerspectiveCamera::default();
    let viewer = ViewerPosition::new(0.12, -0.08, 1.4);

    group.bench_function("update_and_apply", |b| {
        b.iter(|| {
            controller.update(black_box(viewer), black_box(0.5625));
            controller.apply(&mut camera as &mut dyn CameraRig);
        });
    });

    group.bench_function("projection_matrix", |b| {
        b.iter(|| black_box(camera.projection_matrix()));
    });

    group.finish();
}

fn benchmark_pipeline(c: &mut Criterion) {
    let data = detections(100);
    let ctx = TrackingContext::new(CalibrationParameters::default());

    c.bench_function("pipeline_sequence_100", |b| {
        b.iter(|| {
            let mut pipeline = TrackingPipeline::new(5).expect("window > 0");
            for detection in &data {
                black_box(pipeline.process(black_box(detection), &ctx));
            }
        });
    });
}

criterion_group!(benches, benchmark_stages, benchmark_camera, benchmark_pipeline);
criterion_main!(benches);
