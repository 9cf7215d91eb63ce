//! Hand tracking — both from LeapMotion hardware and keyboard simulation.
//!
//! The public interface is [`PoseEvent`] delivered over a `mpsc` channel.
//! Consumers don't need to know whether poses came from real hardware or the
//! keyboard simulator; either way the pose is rendered into the simulated
//! camera and goes through the full detection pipeline.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use hand_flow::{Hand, Landmark, REFERENCE_SPAN_CM};

// ════════════════════════════════════════════════════════════════════════════
// HandPose
// ════════════════════════════════════════════════════════════════════════════

/// The three points the flow signal reads, in normalized image coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandPose {
    pub thumb:      (f32, f32),
    pub index_dip:  (f32, f32),
    pub little_tip: (f32, f32),
}

impl HandPose {
    /// Open palm facing the camera, thumb halfway between the references.
    pub fn resting() -> Self {
        let index_dip  = (0.35, 0.40);
        let little_tip = (0.65, 0.40);
        let mut pose = HandPose { thumb: (0.0, 0.0), index_dip, little_tip };
        let (ix, iy) = pose.index_reference();
        let (lx, ly) = pose.little_reference();
        pose.thumb = ((ix + lx) / 2.0, (iy + ly) / 2.0);
        pose
    }

    fn half_unit(&self) -> f32 {
        let dx = self.index_dip.0 - self.little_tip.0;
        let dy = self.index_dip.1 - self.little_tip.1;
        0.5 * ((dx * dx + dy * dy).sqrt() / REFERENCE_SPAN_CM)
    }

    /// Where the thumb must sit for full flow.
    pub fn index_reference(&self) -> (f32, f32) {
        let o = self.half_unit();
        (self.index_dip.0 - o, self.index_dip.1 - o)
    }

    /// Where the thumb must sit for zero flow.
    pub fn little_reference(&self) -> (f32, f32) {
        let o = self.half_unit();
        (self.little_tip.0 + o, self.little_tip.1 + o)
    }

    pub fn to_hand(&self) -> Hand {
        Hand::with_key_points(
            Landmark::xy(self.thumb.0, self.thumb.1),
            Landmark::xy(self.index_dip.0, self.index_dip.1),
            Landmark::xy(self.little_tip.0, self.little_tip.1),
        )
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PoseEvent
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq)]
pub enum PoseEvent {
    /// A new hand pose.
    Pose(HandPose),
    /// The hand left the field of view.
    Lost,
    /// Toggle pause on the detection loop.
    Pause,
    /// The tracker died; tracking stops, the window stays.
    Failed(String),
    /// Quit the application.
    Quit,
}

// ════════════════════════════════════════════════════════════════════════════
// PoseSource trait: unified interface for hw and sim
// ════════════════════════════════════════════════════════════════════════════

/// Anything that can deliver [`PoseEvent`]s over a channel.
pub trait PoseSource: Send + 'static {
    fn run(self: Box<Self>, tx: Sender<PoseEvent>);
}

/// Spawn a pose source on its own thread and return the receiving end.
pub fn spawn_pose_source<P: PoseSource>(source: P) -> Receiver<PoseEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || Box::new(source).run(tx));
    rx
}

// ════════════════════════════════════════════════════════════════════════════
// LeapPoseSource: real hardware (feature = "leap")
// ════════════════════════════════════════════════════════════════════════════

/// Pose source backed by a real LeapMotion controller.
///
/// Requires the `leap` feature flag and the LeapC shared library installed.
///
/// The first hand in each tracking frame is projected onto the camera plane:
/// x from `-x_range_mm..x_range_mm`, height from `y_floor_mm` up to
/// `y_floor_mm + y_range_mm` (image y grows downward).  Thumb tip and little
/// tip are the distal bones' far joints; the index DIP is the index distal
/// bone's near joint.
#[cfg(feature = "leap")]
pub struct LeapPoseSource {
    pub x_range_mm: f32,
    pub y_floor_mm: f32,
    pub y_range_mm: f32,
}

#[cfg(feature = "leap")]
impl Default for LeapPoseSource {
    fn default() -> Self {
        LeapPoseSource { x_range_mm: 150.0, y_floor_mm: 100.0, y_range_mm: 300.0 }
    }
}

#[cfg(feature = "leap")]
impl PoseSource for LeapPoseSource {
    fn run(self: Box<Self>, tx: Sender<PoseEvent>) {
        use leaprs::*;

        let mut connection = match Connection::create(ConnectionConfig::default()) {
            Ok(c)  => c,
            Err(e) => {
                let _ = tx.send(PoseEvent::Failed(format!("cannot create LeapC connection: {:?}", e)));
                return;
            }
        };
        if let Err(e) = connection.open() {
            let _ = tx.send(PoseEvent::Failed(format!("cannot open LeapMotion device: {:?}", e)));
            return;
        }

        let project = |x: f32, y: f32| -> (f32, f32) {
            let nx = (x + self.x_range_mm) / (2.0 * self.x_range_mm);
            let ny = 1.0 - (y - self.y_floor_mm) / self.y_range_mm;
            (nx.clamp(0.0, 1.0), ny.clamp(0.0, 1.0))
        };

        let mut had_hand = false;
        loop {
            let msg = match connection.poll(100) {
                Ok(m)  => m,
                Err(_) => continue,
            };

            if let Event::Tracking(frame) = msg.event() {
                let Some(hand) = frame.hands().next() else {
                    if had_hand {
                        had_hand = false;
                        if tx.send(PoseEvent::Lost).is_err() { return; }
                    }
                    continue;
                };

                let digits: Vec<_> = hand.digits().collect();
                if digits.len() < 5 { continue; }

                let thumb  = digits[0].distal().next_joint();
                let index  = digits[1].distal().prev_joint();
                let little = digits[4].distal().next_joint();

                let pose = HandPose {
                    thumb:      project(thumb.x,  thumb.y),
                    index_dip:  project(index.x,  index.y),
                    little_tip: project(little.x, little.y),
                };
                had_hand = true;
                if tx.send(PoseEvent::Pose(pose)).is_err() { return; }
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SimPoseSource: keyboard simulation (always available)
// ════════════════════════════════════════════════════════════════════════════

/// Raw input event from the simulation window.
#[derive(Clone, Debug)]
pub enum SimInput {
    KeyDown(SimKey),
}

/// Simulated key codes (mapped from minifb Key).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimKey {
    Left,       // ←
    Right,      // →
    Up,         // ↑
    Down,       // ↓
    SnapIndex,  // H
    SnapLittle, // L
    Hide,       // Space
    Pause,      // P
    Quit,       // Q
}

/// Pose source driven by [`SimInput`] events (from the visualizer's window).
/// Arrow keys nudge the thumb; the finger references stay put.
pub struct SimPoseSource {
    pub rx:   Receiver<SimInput>,
    pub pose: HandPose,
    /// Thumb movement per key press, normalized units.
    pub step: f32,
}

impl SimPoseSource {
    pub fn new(rx: Receiver<SimInput>) -> Self {
        SimPoseSource { rx, pose: HandPose::resting(), step: 0.01 }
    }

    /// Fold one key into the pose.  `None` for keys that don't move it.
    fn apply(&mut self, key: SimKey) -> Option<HandPose> {
        let (x, y) = self.pose.thumb;
        self.pose.thumb = match key {
            SimKey::Left       => (x - self.step, y),
            SimKey::Right      => (x + self.step, y),
            SimKey::Up         => (x, y - self.step),
            SimKey::Down       => (x, y + self.step),
            SimKey::SnapIndex  => self.pose.index_reference(),
            SimKey::SnapLittle => self.pose.little_reference(),
            _ => return None,
        };
        self.pose.thumb.0 = self.pose.thumb.0.clamp(0.0, 1.0);
        self.pose.thumb.1 = self.pose.thumb.1.clamp(0.0, 1.0);
        Some(self.pose)
    }
}

impl PoseSource for SimPoseSource {
    fn run(mut self: Box<Self>, tx: Sender<PoseEvent>) {
        if tx.send(PoseEvent::Pose(self.pose)).is_err() { return; }

        let mut hidden = false;
        while let Ok(SimInput::KeyDown(key)) = self.rx.recv() {
            let event = match key {
                SimKey::Quit => {
                    let _ = tx.send(PoseEvent::Quit);
                    return;
                }
                SimKey::Pause => PoseEvent::Pause,
                SimKey::Hide => {
                    hidden = !hidden;
                    if hidden { PoseEvent::Lost } else { PoseEvent::Pose(self.pose) }
                }
                other => match self.apply(other) {
                    Some(pose) if !hidden => PoseEvent::Pose(pose),
                    _ => continue,
                },
            };
            if tx.send(event).is_err() { return; }
        }
    }
}
