//! End-to-end: frame source → dispatcher → detector → relay → wheel.

use std::sync::mpsc;
use std::task::Poll;
use std::thread;

use flow_wheel::{Transform, WheelConfig, WheelController};
use hand_flow::{DetectionResult, Hand, Landmark};
use landmark_runner::*;

const DT: f32 = 1.0 / 30.0;

struct Blank {
    pixels: Vec<u8>,
}

impl Blank {
    fn new() -> Self {
        Blank { pixels: vec![0; 4 * 4 * BYTES_PER_PIXEL] }
    }
}

struct Instant(Vec<u8>);

impl PendingReadback for Instant {
    fn poll(&mut self) -> Poll<Result<Vec<u8>, ReadbackError>> {
        Poll::Ready(Ok(std::mem::take(&mut self.0)))
    }
}

impl FrameSource for Blank {
    fn is_ready(&self) -> bool         { true }
    fn dimensions(&self) -> (u32, u32) { (4, 4) }
    fn current_frame(&self) -> RawImage<'_> {
        RawImage { width: 4, height: 4, pixels: &self.pixels }
    }
    fn request_readback(&mut self) -> Box<dyn PendingReadback> {
        Box::new(Instant(self.pixels.clone()))
    }
}

/// Reports the same hand for every frame.
struct Fixed(Option<Hand>);

impl Detector for Fixed {
    fn detect(&mut self, _: &Image, _: Option<i64>, _: &ImageProcessingOptions, out: &mut DetectionResult) -> bool {
        out.clear();
        match &self.0 {
            Some(h) => {
                out.hands.push(h.clone());
                true
            }
            None => false,
        }
    }

    fn detect_async(&mut self, _: Image, _: i64, _: &ImageProcessingOptions) -> Result<(), DetectorError> {
        Err(DetectorError::Closed)
    }
}

/// Thumb exactly on the adjusted index reference.
fn full_open() -> Hand {
    Hand::with_key_points(Landmark::xy(0.0, 0.0), Landmark::xy(0.05, 0.05), Landmark::xy(0.75, 0.05))
}

fn video(acquisition: AcquisitionMode) -> RunnerConfig {
    RunnerConfig { acquisition, running_mode: RunningMode::Video, ..RunnerConfig::default() }
}

#[test]
fn open_hand_drives_wheel_to_z_min() {
    let (tx, mut rx) = flow_relay();
    let mut d = Dispatcher::new(video(AcquisitionMode::CpuAsync), Blank::new(), Fixed(Some(full_open())), tx, None).unwrap();
    let cfg = WheelConfig::default();
    let mut wheel = WheelController::new(cfg, Transform::at(0.3, -1.0, cfg.z_max));

    for _ in 0..120 {
        d.step(Wake::Refresh).unwrap();
        d.step(Wake::EndOfFrame).unwrap();
        wheel.tick(rx.drain_latest(), DT);
    }

    assert!((wheel.z() - cfg.z_min).abs() < 0.001, "z = {}", wheel.z());
    assert!((wheel.percentage() - 100.0).abs() < 0.5);
    assert_eq!(wheel.body().transform().position[0], 0.3);
    assert_eq!(wheel.body().transform().position[1], -1.0);
    assert_eq!(d.stats().submitted, 120);
}

#[test]
fn collapsed_references_give_zero_flow() {
    let p = Landmark::xy(0.4, 0.4);
    let hand = Hand::with_key_points(Landmark::xy(0.4, 0.4), p, p);
    let (tx, mut rx) = flow_relay();
    let mut d = Dispatcher::new(video(AcquisitionMode::Cpu), Blank::new(), Fixed(Some(hand)), tx, None).unwrap();

    d.step(Wake::Refresh).unwrap();
    let step = d.step(Wake::EndOfFrame).unwrap();
    assert!(matches!(step, Step::Submitted(Submission { flow: Some(f), .. }) if f == 0.0));
    assert_eq!(rx.drain_latest(), Some(0.0));
}

#[test]
fn no_hand_publishes_neutral_flow() {
    let (tx, mut rx) = flow_relay();
    let mut d = Dispatcher::new(video(AcquisitionMode::Cpu), Blank::new(), Fixed(None), tx, None).unwrap();
    d.step(Wake::Refresh).unwrap();
    let Step::Submitted(s) = d.step(Wake::EndOfFrame).unwrap() else { panic!("expected submission") };
    assert_eq!(s.outcome, DetectOutcome::NotFound);
    let event = rx.drain_latest_event().unwrap();
    assert!(event.result.is_empty());
    assert_eq!(event.flow, 0.0);
}

#[test]
fn drain_keeps_only_the_last_of_many() {
    let (tx, mut rx) = flow_relay();
    for i in 0..50 {
        tx.publish(FlowEvent { result: DetectionResult::default(), flow: i as f32 / 49.0, timestamp_ms: i });
    }
    let mut wheel = WheelController::new(WheelConfig::default(), Transform::at(0.0, 0.0, 0.0));
    let update = wheel.tick(rx.drain_latest(), DT).unwrap();
    assert!(update.z < 0.0);
    assert_eq!(rx.drain_latest(), None);
    assert!(wheel.tick(rx.drain_latest(), DT).is_none());
}

#[test]
fn pool_of_one_is_held_across_refreshes() {
    let (tx, _rx) = flow_relay();
    let cfg = RunnerConfig { pool_size: 1, ..video(AcquisitionMode::Cpu) };
    let mut d = Dispatcher::new(cfg, Blank::new(), Fixed(Some(full_open())), tx, None).unwrap();
    assert_eq!(d.step(Wake::Refresh).unwrap(), Step::Suspended(Suspension::AwaitingFrameEnd));
    assert_eq!(d.pool().available(), 0);
    assert!(d.pool().try_acquire().is_none());
    assert!(matches!(d.step(Wake::EndOfFrame).unwrap(), Step::Submitted(_)));
    assert_eq!(d.pool().available(), 1);
}

#[test]
fn exhausted_pool_suspends_instead_of_blocking() {
    let (tx, _rx) = flow_relay();
    let cfg = RunnerConfig { pool_size: 1, ..video(AcquisitionMode::Cpu) };
    let mut d = Dispatcher::new(cfg, Blank::new(), Fixed(Some(full_open())), tx, None).unwrap();
    let held = d.pool().try_acquire().unwrap();
    assert_eq!(d.step(Wake::Refresh).unwrap(), Step::Suspended(Suspension::AwaitingBuffer));
    assert_eq!(d.stats().exhausted, 1);
    drop(held);
    assert_eq!(d.step(Wake::Refresh).unwrap(), Step::Suspended(Suspension::AwaitingFrameEnd));
}

#[test]
fn gpu_mode_without_context_fails_at_startup() {
    let (tx, _rx) = flow_relay();
    let cfg = RunnerConfig { acquisition: AcquisitionMode::Gpu, ..RunnerConfig::default() };
    let err = Dispatcher::new(cfg, Blank::new(), Fixed(None), tx, None).err();
    assert!(matches!(err, Some(RunnerError::GpuReadUnsupported)));
}

#[test]
fn refused_stream_submission_is_skipped() {
    let (tx, _rx) = flow_relay();
    let cfg = RunnerConfig { acquisition: AcquisitionMode::Cpu, running_mode: RunningMode::LiveStream, ..RunnerConfig::default() };
    let mut d = Dispatcher::new(cfg, Blank::new(), Fixed(None), tx, None).unwrap();
    d.step(Wake::Refresh).unwrap();
    assert_eq!(d.step(Wake::EndOfFrame).unwrap(), Step::Skipped(SkipReason::DetectorRejected));
}

/// Hands submissions to a worker thread that reports through the callback.
struct Threaded {
    jobs: mpsc::Sender<i64>,
}

impl Threaded {
    fn spawn(mut callback: ResultCallback) -> (Self, thread::JoinHandle<()>) {
        let (jobs, rx) = mpsc::channel::<i64>();
        let worker = thread::spawn(move || {
            for ts in rx {
                callback(DetectionResult::single(full_open()), Image::cpu(0, 0, Vec::new()), ts);
            }
        });
        (Threaded { jobs }, worker)
    }
}

impl Detector for Threaded {
    fn detect(&mut self, _: &Image, _: Option<i64>, _: &ImageProcessingOptions, _: &mut DetectionResult) -> bool {
        false
    }

    fn detect_async(&mut self, _: Image, ts: i64, _: &ImageProcessingOptions) -> Result<(), DetectorError> {
        self.jobs.send(ts).map_err(|_| DetectorError::Closed)
    }
}

#[test]
fn live_stream_results_arrive_from_the_worker() {
    let (tx, mut rx) = flow_relay();
    let (detector, worker) = Threaded::spawn(tx.stream_callback());
    let cfg = RunnerConfig { acquisition: AcquisitionMode::Cpu, running_mode: RunningMode::LiveStream, ..RunnerConfig::default() };
    let mut d = Dispatcher::new(cfg, Blank::new(), detector, tx, None).unwrap();

    for _ in 0..3 {
        d.step(Wake::Refresh).unwrap();
        assert!(matches!(d.step(Wake::EndOfFrame).unwrap(), Step::Submitted(_)));
    }
    // Dropping the dispatcher closes the job channel and ends the worker.
    drop(d);
    worker.join().unwrap();

    let latest = rx.drain_latest().unwrap();
    assert!((latest - 1.0).abs() < 1e-5);
}

#[test]
fn callback_after_consumer_dropped_is_harmless() {
    let (tx, rx) = flow_relay();
    let (detector, worker) = Threaded::spawn(tx.stream_callback());
    let cfg = RunnerConfig { acquisition: AcquisitionMode::Cpu, running_mode: RunningMode::LiveStream, ..RunnerConfig::default() };
    let mut d = Dispatcher::new(cfg, Blank::new(), detector, tx, None).unwrap();

    d.step(Wake::Refresh).unwrap();
    d.stop();
    drop(rx);
    d.detector_mut().jobs.send(99).unwrap();
    drop(d);
    worker.join().unwrap();
}
