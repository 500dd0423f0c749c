//! End-to-end pipeline tests: source → worker → display loop.

use std::time::{Duration, Instant};

use drone_overlay::detect::StubStep;
use drone_overlay::{
    BackendRegistry, ClampPolicy, DetectionWorker, DisplayLoop, FileConfig, FileSource,
    NormalizedRect, Observation, Size, StrokeStyle, StubBackend, SubmitOutcome, WorkerOptions,
};

fn stub_source(width: u32, height: u32) -> FileSource {
    let mut source = FileSource::new(FileConfig {
        path: "stub://test".to_string(),
        width,
        height,
        ..FileConfig::default()
    })
    .expect("stub source");
    source.connect().expect("connect");
    source
}

fn registry_with(backend: StubBackend) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(backend);
    registry
}

fn display(width: f32, height: f32) -> DisplayLoop {
    DisplayLoop::new(
        Size::new(width, height).expect("size"),
        StrokeStyle::camera(),
        ClampPolicy::PassThrough,
    )
}

/// Pump until `done` holds or the deadline passes.
fn pump_until(
    display: &mut DisplayLoop,
    rx: &std::sync::mpsc::Receiver<drone_overlay::DetectionBatch>,
    done: impl Fn(&DisplayLoop) -> bool,
) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        display.pump(rx);
        if done(display) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn detections_reach_display_scaled_to_surface() {
    let box_ = NormalizedRect::new(0.25, 0.25, 0.5, 0.5);
    let backend = StubBackend::scripted(vec![StubStep::Observations(vec![Observation::object(
        "drone", 0.87, box_,
    )])]);
    let (submitter, rx, worker) =
        DetectionWorker::spawn(registry_with(backend), WorkerOptions::default()).expect("spawn");

    let mut source = stub_source(64, 48);
    submitter.submit(source.next_frame().unwrap()).unwrap();

    let mut display = display(1000.0, 500.0);
    assert!(pump_until(&mut display, &rx, |d| d.layer().len() == 1));
    let element = &display.layer().elements()[0];
    assert_eq!(element.rect.x, 250.0);
    assert_eq!(element.rect.y, 125.0);
    assert_eq!(element.rect.width, 500.0);
    assert_eq!(element.rect.height, 250.0);
    assert_eq!(element.label.as_deref(), Some("drone"));
    assert_eq!(element.confidence, Some(0.87));

    drop(submitter);
    worker.stop().unwrap();
}

#[test]
fn overlay_never_accumulates_across_frames() {
    let batch = |n: usize| {
        StubStep::Observations(
            (0..n)
                .map(|i| {
                    Observation::object(
                        "drone",
                        0.9,
                        NormalizedRect::new(0.15 * i as f32, 0.1, 0.1, 0.1),
                    )
                })
                .collect(),
        )
    };
    let sizes = [3usize, 5, 1, 4];
    let backend = StubBackend::scripted(sizes.iter().map(|&n| batch(n)).collect());
    let (submitter, rx, worker) =
        DetectionWorker::spawn(registry_with(backend), WorkerOptions::default()).expect("spawn");

    let mut source = stub_source(16, 16);
    let mut display = display(320.0, 240.0);
    for (i, expected) in sizes.iter().enumerate() {
        submitter.submit(source.next_frame().unwrap()).unwrap();
        let seq = i as u64;
        assert!(pump_until(&mut display, &rx, |d| d.last_frame_seq() == Some(seq)));
        assert_eq!(display.layer().len(), *expected);
    }

    drop(submitter);
    worker.stop().unwrap();
}

#[test]
fn failed_inference_skips_frame_without_touching_overlay() {
    let one = StubStep::Observations(vec![Observation::object(
        "drone",
        0.9,
        NormalizedRect::new(0.1, 0.1, 0.2, 0.2),
    )]);
    let backend = StubBackend::scripted(vec![
        one.clone(),
        StubStep::Fail("model error".to_string()),
        one,
    ]);
    let (submitter, rx, worker) =
        DetectionWorker::spawn(registry_with(backend), WorkerOptions::default()).expect("spawn");

    let mut source = stub_source(8, 8);
    let mut display = display(100.0, 100.0);

    submitter.submit(source.next_frame().unwrap()).unwrap();
    assert!(pump_until(&mut display, &rx, |d| d.last_frame_seq() == Some(0)));

    submitter.submit(source.next_frame().unwrap()).unwrap();
    submitter.submit(source.next_frame().unwrap()).unwrap();
    assert!(pump_until(&mut display, &rx, |d| d.last_frame_seq() == Some(2)));

    assert_eq!(display.rendered_batches(), 2);
    assert_eq!(display.layer().len(), 1);
    let stats = worker.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 2);

    drop(submitter);
    worker.stop().unwrap();
}

#[test]
fn busy_worker_drops_late_frames() {
    let backend = StubBackend::new().with_latency(Duration::from_millis(100));
    let (submitter, rx, worker) =
        DetectionWorker::spawn(registry_with(backend), WorkerOptions::default()).expect("spawn");

    let mut source = stub_source(8, 8);
    let mut outcomes = Vec::new();
    for _ in 0..10 {
        outcomes.push(submitter.try_submit(source.next_frame().unwrap()));
    }
    let accepted = outcomes
        .iter()
        .filter(|o| **o == SubmitOutcome::Accepted)
        .count() as u64;
    let dropped = outcomes
        .iter()
        .filter(|o| **o == SubmitOutcome::DroppedBusy)
        .count() as u64;

    // One frame in flight plus one pending at most.
    assert!(accepted >= 1 && accepted <= 2, "accepted {}", accepted);
    assert_eq!(accepted + dropped, 10);
    assert_eq!(submitter.stats().dropped, dropped);

    let mut display = display(100.0, 100.0);
    assert!(pump_until(&mut display, &rx, |d| d.layer().len() == 1));
    assert!(pump_until(&mut display, &rx, |_| worker.stats().processed == accepted));
    assert_eq!(display.layer().len(), 1);

    drop(submitter);
    worker.stop().unwrap();
}

#[test]
fn worker_stops_when_display_goes_away() {
    let (submitter, rx, worker) =
        DetectionWorker::spawn(registry_with(StubBackend::new()), WorkerOptions::default())
            .expect("spawn");
    drop(rx);
    let mut source = stub_source(8, 8);
    let _ = submitter.submit(source.next_frame().unwrap());
    worker.stop().unwrap();
}
