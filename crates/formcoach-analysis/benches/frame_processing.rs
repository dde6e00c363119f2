//! Benchmarks for per-frame form analysis.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;

use formcoach_analysis::{EngineConfig, FormSession, ViolationDetector};
use formcoach_core::{Landmark, LandmarkPoint, PoseSnapshot, Timestamp};
use formcoach_rules::{Phase, RuleCatalog};

fn create_test_pose(millis: i64, depth: f64) -> PoseSnapshot {
    let mut pose = PoseSnapshot::new(Timestamp::from_millis(millis), 0.9);
    for (i, landmark) in Landmark::ALL.iter().enumerate() {
        let x = 0.3 + (i % 7) as f64 * 0.05;
        let y = 0.1 + (i / 2) as f64 * 0.05 + 0.1 * depth;
        pose = pose.with_landmark(*landmark, LandmarkPoint::new(x, y.min(0.95), 0.0, 0.9));
    }
    pose
}

fn squat_trace(frames: usize) -> Vec<PoseSnapshot> {
    (0..frames)
        .map(|i| {
            let depth = ((i as f64) * 0.2).sin().abs();
            create_test_pose(i as i64 * 33, depth)
        })
        .collect()
}

fn benchmark_process_frame(c: &mut Criterion) {
    let catalog = RuleCatalog::bundled().expect("bundled rules");
    let config = EngineConfig::default();
    let trace = squat_trace(300);

    c.bench_function("process_frame_squat_300", |b| {
        b.iter(|| {
            let mut session =
                FormSession::start(&catalog, "Barbell Squat", &config).expect("session");
            for frame in &trace {
                black_box(session.process_frame(black_box(frame)));
            }
            session.rep_count()
        })
    });
}

fn benchmark_detector(c: &mut Criterion) {
    let catalog = RuleCatalog::bundled().expect("bundled rules");
    let pose = create_test_pose(0, 0.5);

    for id in ["barbell_squat", "push_up", "overhead_press"] {
        let rules = catalog.get(id).expect("bundled exercise");
        let detector = ViolationDetector::new(Arc::clone(&rules), 0.5);
        c.bench_function(&format!("detect_{}", id), |b| {
            b.iter(|| detector.detect(black_box(&pose), Some(Phase::Bottom), None))
        });
    }
}

fn benchmark_name_resolution(c: &mut Criterion) {
    let catalog = RuleCatalog::bundled().expect("bundled rules");

    c.bench_function("resolve_exact", |b| {
        b.iter(|| catalog.resolve(black_box("Barbell Squat")))
    });

    c.bench_function("resolve_typo", |b| {
        b.iter(|| catalog.resolve(black_box("Barrbell Sqaut")))
    });

    c.bench_function("resolve_fallback", |b| {
        b.iter(|| catalog.resolve(black_box("Single Arm Landmine Press")))
    });
}

criterion_group!(
    benches,
    benchmark_process_frame,
    benchmark_detector,
    benchmark_name_resolution
);
criterion_main!(benches);
