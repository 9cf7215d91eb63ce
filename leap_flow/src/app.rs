//! Top-level application state machine.
//!
//! `AppState` owns the landmark dispatcher (simulated camera + marker
//! detector), the flow relay, the wheel, and the drip chamber.  It processes
//! `PoseEvent`s and advances everything once per display refresh.

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::time::Instant;

use anyhow::Context;
use flow_wheel::{
    flow_rate_ml_per_hour, format_flow_rate, format_percentage, DropConfig, TouchPhase,
    TouchWheel, Transform, WaterDrop, WheelBody, WheelConfig, WheelController,
    DEFAULT_MAX_FLOW_RATE,
};
use landmark_runner::{
    flow_relay, AcquisitionMode, Dispatcher, FlowRelay, RunnerConfig, RunningMode, Step, Wake,
};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::camera::{MarkerDetector, SimCamera};
use crate::tracking::{spawn_pose_source, HandPose, PoseEvent, SimInput, SimPoseSource};
use crate::visualizer::Visualizer;

// ════════════════════════════════════════════════════════════════════════════
// AppConfig
// ════════════════════════════════════════════════════════════════════════════

/// Which input moves the wheel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlMode {
    /// Smoothed flow from the hand landmarks.
    #[default]
    Hand,
    /// Direct vertical mouse drags.
    Touch,
}

/// Configuration for the full application.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub runner:        RunnerConfig,
    pub wheel:         WheelConfig,
    pub drop:          DropConfig,
    /// mL/h at 100 %.
    pub max_flow_rate: f32,
    pub control:       ControlMode,
    pub camera_width:  u32,
    pub camera_height: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            runner: RunnerConfig::default(),
            // one degree per metre is invisible on screen; spin faster and let
            // drags cover the track in a few hundred pixels
            wheel: WheelConfig { rotation_speed: 720.0, move_speed: 0.1, ..WheelConfig::default() },
            drop: DropConfig::default(),
            max_flow_rate: DEFAULT_MAX_FLOW_RATE,
            control: ControlMode::Hand,
            camera_width: 320,
            camera_height: 240,
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("invalid application config")
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("in {}", path.display()))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Wheel control
// ════════════════════════════════════════════════════════════════════════════

pub enum Control {
    Hand(WheelController),
    Touch(TouchWheel),
}

impl Control {
    pub fn body(&self) -> &WheelBody {
        match self {
            Control::Hand(w)  => w.body(),
            Control::Touch(t) => t.body(),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// AppState
// ════════════════════════════════════════════════════════════════════════════

pub struct AppState {
    // ── tracking ──────────────────────────────────────────────────────────
    /// `None` once tracking has failed; the readouts freeze.
    dispatcher:    Option<Dispatcher<SimCamera, MarkerDetector>>,
    relay:         FlowRelay,
    last_hands:    Rc<Cell<usize>>,
    last_flow:     Option<f32>,
    tracking_error: Option<String>,

    // ── wheel + readouts ──────────────────────────────────────────────────
    wheel_cfg:     WheelConfig,
    control:       Control,
    drop:          WaterDrop,
    max_flow_rate: f32,
    pointer_down:  bool,

    // ── status message ────────────────────────────────────────────────────
    pub status:    String,
}

impl AppState {
    pub fn new(cfg: &AppConfig) -> anyhow::Result<Self> {
        let (publisher, mut relay) = flow_relay();

        let mut camera = SimCamera::new(cfg.camera_width, cfg.camera_height);
        camera.set_pose(Some(HandPose::resting()));

        let detector = match cfg.runner.running_mode {
            RunningMode::LiveStream => MarkerDetector::streaming(publisher.stream_callback()),
            RunningMode::Image | RunningMode::Video => MarkerDetector::new(),
        };

        // no graphics context in a software-rendered window
        let dispatcher = Dispatcher::new(cfg.runner.clone(), camera, detector, publisher, None)
            .context("cannot start the landmark runner")?;

        let last_hands = Rc::new(Cell::new(0));
        let seen = last_hands.clone();
        relay.subscribe(move |event| {
            if event.result.hands.len() != seen.get() {
                debug!(hands = event.result.hands.len(), flow = event.flow, "hand count changed");
            }
            seen.set(event.result.hands.len());
        });

        let start = Transform::at(0.0, 0.0, cfg.wheel.z_max);
        let control = match cfg.control {
            ControlMode::Hand  => Control::Hand(WheelController::new(cfg.wheel, start)),
            ControlMode::Touch => Control::Touch(TouchWheel::new(cfg.wheel, start)),
        };
        let drop = WaterDrop::new(cfg.drop, 0.0, control.body().percentage());

        info!(control = ?cfg.control, max_flow_rate = cfg.max_flow_rate, "application ready");

        Ok(AppState {
            dispatcher: Some(dispatcher),
            relay,
            last_hands,
            last_flow: None,
            tracking_error: None,
            wheel_cfg: cfg.wheel,
            control,
            drop,
            max_flow_rate: cfg.max_flow_rate,
            pointer_down: false,
            status: format!(
                "Ready: {} / {}  pool {}",
                cfg.runner.acquisition, cfg.runner.running_mode, cfg.runner.pool_size
            ),
        })
    }

    // ── process one PoseEvent ─────────────────────────────────────────────

    pub fn handle_pose(&mut self, event: PoseEvent) {
        match event {
            PoseEvent::Pose(pose) => {
                if let Some(d) = self.dispatcher.as_mut() {
                    d.source_mut().set_pose(Some(pose));
                }
            }
            PoseEvent::Lost => {
                if let Some(d) = self.dispatcher.as_mut() {
                    d.source_mut().set_pose(None);
                }
                self.status = "Hand lost".to_string();
            }
            PoseEvent::Pause => {
                if let Some(d) = self.dispatcher.as_mut() {
                    if d.is_paused() {
                        d.resume();
                        self.status = "Tracking resumed".to_string();
                    } else {
                        d.pause();
                        self.status = "Tracking paused".to_string();
                    }
                }
            }
            PoseEvent::Failed(msg) => self.fail_tracking(msg),
            PoseEvent::Quit => { /* handled in run loop */ }
        }
    }

    fn fail_tracking(&mut self, msg: String) {
        error!(error = %msg, "tracking stopped");
        if let Some(mut d) = self.dispatcher.take() {
            d.stop();
        }
        self.status = format!("TRACKING STOPPED: {}", msg);
        self.tracking_error = Some(msg);
    }

    /// Mouse state for the touch wheel; `y` in pixels, growing upward.
    pub fn pointer(&mut self, down: bool, y: f32) {
        let phase = match (self.pointer_down, down) {
            (false, true) => TouchPhase::Began,
            (true, true)  => TouchPhase::Moved,
            (true, false) => TouchPhase::Ended,
            (false, false) => return,
        };
        self.pointer_down = down;
        if let Control::Touch(t) = &mut self.control {
            t.touch(phase, y);
        }
    }

    // ── Per-frame tick ────────────────────────────────────────────────────

    pub fn tick(&mut self, dt: f32) {
        self.step_tracking();

        // always drain so a touch session never builds a backlog
        let latest = self.relay.drain_latest();
        if latest.is_some() {
            self.last_flow = latest;
        }

        match &mut self.control {
            Control::Hand(w)  => { w.tick(latest, dt); }
            Control::Touch(t) => t.tick(),
        }

        let pct = self.percentage();
        self.drop.tick(pct, dt);
    }

    fn step_tracking(&mut self) {
        let Some(d) = self.dispatcher.as_mut() else { return };
        let mut failure = None;
        for wake in [Wake::Refresh, Wake::EndOfFrame] {
            match d.step(wake) {
                Ok(Step::Skipped(reason)) => warn!(?reason, "frame skipped"),
                Ok(_) => {}
                Err(e) => {
                    failure = Some(e.to_string());
                    break;
                }
            }
        }
        if let Some(msg) = failure {
            self.fail_tracking(msg);
        }
    }

    // ── Accessors for the render loop ─────────────────────────────────────

    pub fn wheel(&self) -> &WheelBody              { self.control.body() }
    pub fn wheel_config(&self) -> &WheelConfig     { &self.wheel_cfg }
    pub fn control(&self) -> &Control              { &self.control }
    pub fn water_drop(&self) -> &WaterDrop         { &self.drop }
    pub fn last_flow(&self) -> Option<f32>         { self.last_flow }
    pub fn hands_seen(&self) -> usize              { self.last_hands.get() }
    pub fn tracking_error(&self) -> Option<&str>   { self.tracking_error.as_deref() }

    pub fn percentage(&self) -> f32 {
        self.control.body().percentage()
    }

    pub fn percentage_text(&self) -> String {
        format_percentage(self.percentage())
    }

    pub fn flow_rate(&self) -> f32 {
        flow_rate_ml_per_hour(self.percentage(), self.max_flow_rate)
    }

    pub fn flow_rate_text(&self) -> String {
        format_flow_rate(self.flow_rate())
    }

    pub fn is_paused(&self) -> bool {
        self.dispatcher.as_ref().is_some_and(|d| d.is_paused())
    }

    pub fn camera(&self) -> Option<&SimCamera> {
        self.dispatcher.as_ref().map(|d| d.source())
    }

    pub fn acquisition(&self) -> Option<AcquisitionMode> {
        self.dispatcher.as_ref().map(|d| d.config().acquisition)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// run(): the main application loop
// ════════════════════════════════════════════════════════════════════════════

/// Run the full application.
///
/// Creates the visualizer, the pose source (keyboard simulation, plus the
/// LeapMotion controller with `--features leap`), and drives the
/// event/render loop at ~60 fps.  A tracking failure freezes the readouts but
/// leaves the window open.
pub fn run(cfg: AppConfig) -> anyhow::Result<()> {
    // ── Sim pose channel ──────────────────────────────────────────────────
    let (sim_tx, sim_rx) = mpsc::channel::<SimInput>();
    #[allow(unused_mut)]
    let mut pose_rxs: Vec<Receiver<PoseEvent>> = vec![spawn_pose_source(SimPoseSource::new(sim_rx))];
    #[cfg(feature = "leap")]
    pose_rxs.push(spawn_pose_source(crate::tracking::LeapPoseSource::default()));

    // ── Visualizer (owns the window and the sim input sender) ────────────
    let mut vis = Visualizer::new(sim_tx).context("cannot open the visualizer window")?;

    // ── App state ─────────────────────────────────────────────────────────
    let mut app = AppState::new(&cfg)?;

    // ── Main loop ─────────────────────────────────────────────────────────
    let mut last = Instant::now();
    while vis.is_open() {
        // 1. Poll window input → SimInput / pointer
        if !vis.poll_input() { break; }
        if let Some((down, y)) = vis.pointer() {
            app.pointer(down, y);
        }

        // 2. Drain pose events
        for rx in &pose_rxs {
            loop {
                match rx.try_recv() {
                    Ok(PoseEvent::Quit)             => return Ok(()),
                    Ok(evt)                         => app.handle_pose(evt),
                    Err(TryRecvError::Empty)        => break,
                    Err(TryRecvError::Disconnected) => break,
                }
            }
        }

        // 3. Per-frame logic
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f32().min(0.1);
        last = now;
        app.tick(dt);

        // 4. Render
        vis.render(&app);
    }

    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 30.0;

    fn video_cfg() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.runner.running_mode = RunningMode::Video;
        cfg
    }

    fn thumb_at_index() -> HandPose {
        let mut p = HandPose::resting();
        p.thumb = p.index_reference();
        p
    }

    #[test]
    fn starts_closed() {
        let app = AppState::new(&video_cfg()).unwrap();
        assert_eq!(app.percentage(), 0.0);
        assert_eq!(app.percentage_text(), "0.0%");
        assert_eq!(app.flow_rate_text(), "Flow Rate: 0 mL/h");
    }

    #[test]
    fn open_hand_opens_the_clamp() {
        let mut app = AppState::new(&video_cfg()).unwrap();
        app.handle_pose(PoseEvent::Pose(thumb_at_index()));
        for _ in 0..150 { app.tick(DT); }
        assert!(app.percentage() > 98.0, "pct = {}", app.percentage());
        assert!(app.flow_rate() > 1450.0);
        assert_eq!(app.hands_seen(), 1);
    }

    #[test]
    fn resting_hand_settles_mid_range() {
        let mut app = AppState::new(&video_cfg()).unwrap();
        for _ in 0..150 { app.tick(DT); }
        assert!((app.percentage() - 50.0).abs() < 5.0, "pct = {}", app.percentage());
    }

    #[test]
    fn lost_hand_closes_the_clamp() {
        let mut app = AppState::new(&video_cfg()).unwrap();
        app.handle_pose(PoseEvent::Pose(thumb_at_index()));
        for _ in 0..60 { app.tick(DT); }
        app.handle_pose(PoseEvent::Lost);
        for _ in 0..150 { app.tick(DT); }
        assert!(app.percentage() < 1.0);
        assert_eq!(app.hands_seen(), 0);
    }

    #[test]
    fn pause_freezes_the_signal() {
        let mut app = AppState::new(&video_cfg()).unwrap();
        for _ in 0..30 { app.tick(DT); }
        app.handle_pose(PoseEvent::Pause);
        assert!(app.is_paused());
        let before = app.percentage();
        app.handle_pose(PoseEvent::Pose(thumb_at_index()));
        for _ in 0..30 { app.tick(DT); }
        assert_eq!(app.percentage(), before);
        app.handle_pose(PoseEvent::Pause);
        assert!(!app.is_paused());
    }

    #[test]
    fn tracking_failure_freezes_readouts() {
        let mut app = AppState::new(&video_cfg()).unwrap();
        for _ in 0..30 { app.tick(DT); }
        app.handle_pose(PoseEvent::Failed("device unplugged".into()));
        let frozen = app.percentage();
        for _ in 0..30 { app.tick(DT); }
        assert_eq!(app.percentage(), frozen);
        assert_eq!(app.tracking_error(), Some("device unplugged"));
        assert!(app.camera().is_none());
    }

    #[test]
    fn gpu_acquisition_is_a_startup_error() {
        let mut cfg = video_cfg();
        cfg.runner.acquisition = AcquisitionMode::Gpu;
        assert!(AppState::new(&cfg).is_err());
    }

    #[test]
    fn touch_drag_moves_the_wheel() {
        let mut cfg = video_cfg();
        cfg.control = ControlMode::Touch;
        let mut app = AppState::new(&cfg).unwrap();
        app.pointer(true, 200.0);
        app.pointer(true, 400.0);
        app.pointer(false, 400.0);
        app.tick(DT);
        // 200 px × 0.1 × 0.01 = 0.2 toward z_min
        assert!((app.wheel().z() - (cfg.wheel.z_max - 0.2)).abs() < 1e-4);
        assert!(app.percentage() > 40.0);
    }

    #[test]
    fn live_stream_reaches_the_wheel() {
        let mut app = AppState::new(&AppConfig::default()).unwrap();
        app.handle_pose(PoseEvent::Pose(thumb_at_index()));
        for _ in 0..400 {
            app.tick(DT);
            if app.percentage() > 50.0 { break; }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        assert!(app.percentage() > 50.0, "pct = {}", app.percentage());
    }

    #[test]
    fn config_from_toml() {
        let cfg = AppConfig::from_toml_str(
            "control = \"touch\"\nmax_flow_rate = 250.0\n\n[runner]\nrunning_mode = \"image\"\n\n[wheel]\nsmoothing_speed = 2.0\n",
        ).unwrap();
        assert_eq!(cfg.control, ControlMode::Touch);
        assert_eq!(cfg.runner.running_mode, RunningMode::Image);
        assert_eq!(cfg.wheel.smoothing_speed, 2.0);
        assert_eq!(cfg.wheel.z_min, WheelConfig::default().z_min);
        assert_eq!(cfg.camera_width, 320);
        assert!(AppConfig::from_file("/nonexistent/leap_flow.toml").is_err());
    }
}
